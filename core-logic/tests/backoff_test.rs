use core_logic::BackoffConfig;
use std::time::Duration;

#[test]
fn test_escalation_schedule_for_oracle_defaults() {
    let backoff = BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(300));

    let schedule: Vec<u64> = (0..10).map(|n| backoff.delay_for(n).as_secs()).collect();
    assert_eq!(schedule, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 300]);
}

#[test]
fn test_custom_multiplier() {
    let backoff = BackoffConfig {
        multiplier: 3.0,
        ..BackoffConfig::new(Duration::from_millis(100), Duration::from_secs(10))
    };

    assert_eq!(backoff.delay_for(1), Duration::from_millis(300));
    assert_eq!(backoff.delay_for(2), Duration::from_millis(900));
}

#[test]
fn test_base_above_max_is_capped() {
    let backoff = BackoffConfig::new(Duration::from_secs(10), Duration::from_secs(5));
    assert_eq!(backoff.delay_for(0), Duration::from_secs(5));
}

#[test]
fn test_jitter_never_exceeds_bounds() {
    let backoff =
        BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(300)).with_jitter(true);

    for _ in 0..100 {
        let delay = backoff.delay_for(2).as_millis();
        assert!((3000..=5000).contains(&delay), "delay {} out of range", delay);
    }
}
