mod common;

use common::*;
use dns_failover::{
    health::HealthVerdict,
    scheduler,
};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn runs_a_pass_per_interval_until_shutdown() {
    let zone = FakeZone::new();
    zone.add_a("a.example.com", PRIMARY);
    let oracle = FakeOracle::new();
    oracle.set("S", HealthVerdict::Up);

    let mut reconciler = reconciler(config(vec![service("S", &["a.example.com"])]), &oracle, &zone);

    // passes at 0s, 60s and 120s
    let passes = scheduler::run(
        &mut reconciler,
        Duration::from_secs(60),
        tokio::time::sleep(Duration::from_secs(150)),
    )
    .await;

    assert_eq!(passes, 3);
    assert_eq!(oracle.calls().len(), 3);
    assert!(zone.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_start_runs_nothing() {
    let zone = FakeZone::new();
    let oracle = FakeOracle::new();
    let mut reconciler = reconciler(config(vec![service("S", &["a.example.com"])]), &oracle, &zone);

    let passes = scheduler::run(&mut reconciler, Duration::from_secs(60), async {}).await;

    assert_eq!(passes, 0);
    assert!(oracle.calls().is_empty());
}
