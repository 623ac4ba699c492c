use std::time::{Duration, Instant};

use crate::{
    EndpointCategory, RateCeiling, ScopeLimit, WindowSizeMs,
    window::{TimestampWindow, WindowTracker},
};

fn at(t0: Instant, ms: u64) -> Instant {
    t0 + Duration::from_millis(ms)
}

fn window(ms: u64) -> TimestampWindow {
    TimestampWindow::new(WindowSizeMs::try_from(ms).unwrap(), 4)
}

fn tracker() -> WindowTracker {
    WindowTracker::new(
        ScopeLimit::burst(),
        ScopeLimit::global(),
        WindowSizeMs::try_from(60_000).unwrap(),
    )
}

#[test]
fn prune_keeps_entries_exactly_at_the_window_edge() {
    let t0 = Instant::now();
    let mut w = window(1000);

    w.record(t0);
    w.record(at(t0, 500));

    w.prune(at(t0, 1000));
    assert_eq!(w.count(), 2);

    w.prune(at(t0, 1001));
    assert_eq!(w.count(), 1);

    w.prune(at(t0, 1501));
    assert_eq!(w.count(), 0);
}

#[test]
fn prune_on_empty_window_is_a_noop() {
    let mut w = window(10);
    w.prune(Instant::now());
    assert_eq!(w.count(), 0);
    assert_eq!(w.retry_after(Instant::now()), Duration::ZERO);
}

#[test]
fn retry_after_is_time_until_oldest_entry_ages_out() {
    let t0 = Instant::now();
    let mut w = window(10_000);

    w.record(t0);
    w.record(at(t0, 3000));

    assert_eq!(w.retry_after(at(t0, 4000)), Duration::from_millis(6000));
}

#[test]
fn out_of_order_record_keeps_queue_sorted() {
    let t0 = Instant::now();
    let mut w = window(1000);

    w.record(at(t0, 500));
    w.record(t0);

    // Clamped to the newest entry, so both age out together.
    w.prune(at(t0, 1500));
    assert_eq!(w.count(), 2);
    w.prune(at(t0, 1501));
    assert_eq!(w.count(), 0);
}

#[test]
fn record_lands_in_burst_global_and_category_windows() {
    let t0 = Instant::now();
    let tracker = tracker();

    tracker.record(EndpointCategory::Auth, t0);
    tracker.record(EndpointCategory::Search, t0);

    assert_eq!(tracker.burst_usage(t0).count, 2);
    assert_eq!(tracker.global_usage(t0).count, 2);
    assert_eq!(tracker.endpoint_usage(EndpointCategory::Auth, t0).count, 1);
    assert_eq!(tracker.endpoint_usage(EndpointCategory::Search, t0).count, 1);
    assert_eq!(tracker.endpoint_usage(EndpointCategory::User, t0).count, 0);
}

#[test]
fn burst_ages_out_before_global_and_category() {
    let t0 = Instant::now();
    let tracker = tracker();

    for i in 0..5 {
        tracker.record(EndpointCategory::Property, at(t0, i));
    }

    let later = at(t0, 10_005);
    assert_eq!(tracker.burst_usage(later).count, 0);
    assert_eq!(tracker.global_usage(later).count, 5);
    assert_eq!(tracker.endpoint_usage(EndpointCategory::Property, later).count, 5);

    let much_later = at(t0, 60_005);
    assert_eq!(tracker.global_usage(much_later).count, 0);
    assert_eq!(
        tracker
            .endpoint_usage(EndpointCategory::Property, much_later)
            .count,
        0
    );
}

#[test]
fn custom_scope_windows_are_honoured() {
    let t0 = Instant::now();
    let tracker = WindowTracker::new(
        ScopeLimit {
            ceiling: RateCeiling::try_from(3).unwrap(),
            window: WindowSizeMs::try_from(100).unwrap(),
        },
        ScopeLimit {
            ceiling: RateCeiling::try_from(3).unwrap(),
            window: WindowSizeMs::try_from(200).unwrap(),
        },
        WindowSizeMs::try_from(300).unwrap(),
    );

    tracker.record(EndpointCategory::Default, t0);

    let usage = tracker.burst_usage(at(t0, 50));
    assert_eq!(usage.count, 1);
    assert_eq!(usage.retry_after, Duration::from_millis(50));

    assert_eq!(tracker.burst_usage(at(t0, 101)).count, 0);
    assert_eq!(tracker.global_usage(at(t0, 150)).count, 1);
    assert_eq!(tracker.endpoint_usage(EndpointCategory::Default, at(t0, 250)).count, 1);
}
