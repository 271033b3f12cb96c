use std::time::Duration;

use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, info};

use crate::state::SharedState;

/// Periodically reclaim matches older than `max_age` until `shutdown` flips to `true`.
///
/// The first pass runs one full `period` after startup. A pass already underway
/// completes before the task returns.
pub async fn run(
    state: SharedState,
    period: Duration,
    max_age: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // interval yields immediately once
    ticker.tick().await;

    info!(
        period_secs = period.as_secs(),
        max_age_secs = max_age.as_secs(),
        "match sweeper started"
    );

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                sweep_once(&state, max_age).await;
            }
        }
    }

    info!("match sweeper stopped");
}

/// Run a single sweep pass and log its outcome. Returns how many matches were removed.
pub async fn sweep_once(state: &SharedState, max_age: Duration) -> usize {
    debug!("clearing stale matches");
    let removed = state.registry().sweep(max_age).await;
    if removed.is_empty() {
        debug!(max_age_secs = max_age.as_secs(), "no stale matches found");
    } else {
        info!(count = removed.len(), "removed stale matches");
    }
    removed.len()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[tokio::test]
    async fn stops_on_shutdown_signal() {
        let state = AppState::new(AppConfig::default());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run(
            Arc::clone(&state),
            Duration::from_secs(3600),
            Duration::from_secs(600),
            rx,
        ));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn ticks_reclaim_expired_matches() {
        let state = AppState::new(AppConfig::default());
        state.registry().create("A").await.unwrap();
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run(
            Arc::clone(&state),
            Duration::from_millis(20),
            Duration::ZERO,
            rx,
        ));

        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if state.registry().is_empty() {
                break;
            }
        }
        assert!(state.registry().is_empty());
        assert_eq!(state.registry().active_match_of("A"), None);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
