use crate::{
    CacheCapacity, EndpointCategory, EvictionFraction, Method, RateCeiling, RejectReason,
    UpstreamGuardError, WindowSizeMs,
};

#[test]
fn rate_ceiling_try_from_validates_positive() {
    let c = RateCeiling::try_from(5u32).unwrap();
    assert_eq!(*c, 5);

    assert_eq!(
        RateCeiling::try_from(0u32).unwrap_err(),
        UpstreamGuardError::InvalidRateCeiling("Rate ceiling must be greater than 0".to_string())
    );
}

#[test]
fn window_size_ms_try_from_validates_min_1() {
    let w = WindowSizeMs::try_from(1u64).unwrap();
    assert_eq!(*w, 1);
    assert_eq!(w.as_duration().as_millis(), 1);

    assert_eq!(
        WindowSizeMs::try_from(0u64).unwrap_err(),
        UpstreamGuardError::InvalidWindowSize("Window size must be at least 1ms".to_string())
    );
}

#[test]
fn cache_capacity_default_and_try_from_validate_nonzero() {
    assert_eq!(*CacheCapacity::default(), 1000);
    assert_eq!(*CacheCapacity::try_from(3usize).unwrap(), 3);

    assert!(matches!(
        CacheCapacity::try_from(0usize),
        Err(UpstreamGuardError::InvalidCacheCapacity(_))
    ));
}

#[test]
fn eviction_fraction_validates_range() {
    assert_eq!(*EvictionFraction::default(), 0.2);
    assert_eq!(*EvictionFraction::try_from(1f64).unwrap(), 1f64);

    for bad in [0f64, -0.5, 1.5, f64::NAN] {
        assert!(
            matches!(
                EvictionFraction::try_from(bad),
                Err(UpstreamGuardError::InvalidEvictionFraction(_))
            ),
            "{bad} should be rejected"
        );
    }
}

#[test]
fn eviction_batch_is_fraction_of_capacity_and_at_least_one() {
    let fraction = EvictionFraction::default();

    assert_eq!(fraction.batch_size(CacheCapacity::default()), 200);
    assert_eq!(fraction.batch_size(CacheCapacity::try_from(2).unwrap()), 1);
    assert_eq!(
        EvictionFraction::try_from(1f64)
            .unwrap()
            .batch_size(CacheCapacity::try_from(7).unwrap()),
        7
    );
}

#[test]
fn method_parses_case_insensitively() {
    assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
    assert_eq!("Delete".parse::<Method>().unwrap(), Method::Delete);
    assert_eq!(Method::Patch.to_string(), "PATCH");

    assert_eq!(
        "FETCH".parse::<Method>().unwrap_err(),
        UpstreamGuardError::UnknownMethod("FETCH".to_string())
    );
}

#[test]
fn only_get_is_a_cacheable_read() {
    assert!(Method::Get.is_cacheable_read());
    assert!(!Method::Head.is_cacheable_read());
    assert!(!Method::Post.is_cacheable_read());
}

#[test]
fn reject_reason_messages_name_the_binding_constraint() {
    let backing_off = RejectReason::BackingOff {
        category: EndpointCategory::Search,
        retry_after_ms: 3000,
    };
    assert_eq!(
        backing_off.to_string(),
        "Backing off due to errors on search endpoints (retry after 3000ms)"
    );
    assert_eq!(backing_off.retry_after().as_millis(), 3000);

    let burst = RejectReason::BurstLimit {
        limit: 10,
        window_ms: 10_000,
        retry_after_ms: 1,
    };
    assert_eq!(
        burst.to_string(),
        "Burst limit exceeded (max 10 requests per 10s)"
    );

    let global = RejectReason::GlobalLimit {
        limit: 200,
        window_ms: 60_000,
        retry_after_ms: 1,
    };
    assert_eq!(
        global.to_string(),
        "Global rate limit exceeded (max 200 requests per 60s)"
    );

    let endpoint = RejectReason::EndpointLimit {
        category: EndpointCategory::Auth,
        limit: 5,
        window_ms: 60_000,
        retry_after_ms: 59_400,
    };
    assert_eq!(
        endpoint.to_string(),
        "Endpoint rate limit exceeded (max 5 requests per 60s for auth)"
    );
}
