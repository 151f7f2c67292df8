use crate::reconcile::Reconciler;
use futures::{
    Stream,
    StreamExt as _,
};
use std::{
    future::Future,
    time::Duration,
};
use tokio::time::{
    Instant,
    MissedTickBehavior,
};

/// Yields a tick every `period`, the first one immediately, until `shutdown` resolves.
///
/// Ticks are only produced when the consumer asks for the next one. A pass that overruns the
/// period causes the missed ticks to be skipped, they are never queued up.
pub fn ticks<S>(period: Duration, shutdown: S) -> impl Stream<Item = Instant> + Send + 'static
where
    S: Future<Output = ()> + Send + 'static,
{
    async_stream::stream! {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            let instant = tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested, not scheduling further reconciliation passes");
                    break;
                }

                instant = timer.tick() => instant,
            };

            yield instant;
        }
    }
}

/// Run `reconciler` on every tick until `shutdown` resolves. Returns the number of passes.
///
/// A pass in progress when shutdown is requested runs to completion, every API call in it is
/// bounded by the request timeout.
pub async fn run<S>(reconciler: &mut Reconciler, period: Duration, shutdown: S) -> usize
where
    S: Future<Output = ()> + Send + 'static,
{
    info!(interval = %humantime::format_duration(period), "Starting failover reconciler");

    let ticks = ticks(period, shutdown);
    futures::pin_mut!(ticks);

    let mut passes = 0;
    while let Some(instant) = ticks.next().await {
        trace!(?instant, "tick");
        reconciler.reconcile().await;
        passes += 1;
    }

    info!(passes, "Failover reconciler stopped");

    passes
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt as _;
    use tokio::sync::oneshot;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_every_period() {
        let (_tx, rx) = oneshot::channel::<()>();
        let ticks = ticks(Duration::from_secs(60), async move {
            let _ = rx.await;
        });
        futures::pin_mut!(ticks);

        let start = Instant::now();
        ticks.next().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        ticks.next().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_pass_skips_missed_ticks() {
        let (_tx, rx) = oneshot::channel::<()>();
        let ticks = ticks(Duration::from_secs(60), async move {
            let _ = rx.await;
        });
        futures::pin_mut!(ticks);

        let start = Instant::now();
        ticks.next().await.unwrap();

        // a pass that takes two and a half periods
        tokio::time::sleep(Duration::from_secs(150)).await;

        ticks.next().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(150));

        ticks.next().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_shutdown() {
        let (tx, rx) = oneshot::channel::<()>();
        let ticks = ticks(Duration::from_secs(60), async move {
            let _ = rx.await;
        });
        futures::pin_mut!(ticks);

        ticks.next().await.unwrap();
        tx.send(()).unwrap();
        assert!(ticks.next().await.is_none());
    }
}
