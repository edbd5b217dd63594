//! The long running activity feed: polls the workflow status and refreshes the feed
//! whenever the status read succeeds or the wallet changes.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use voting_ethereum::EthereumTransport;

use crate::providers::WalletSession;
use crate::refresh::{FeedSnapshot, RefreshController, RefreshOutcome, Trigger};
use crate::status::StatusTracker;

pub struct Watcher<T> {
    pub controller: Arc<RefreshController<T>>,
    pub tracker: StatusTracker<T>,
    pub wallet: WalletSession,
    pub poll_interval: Duration,
}

impl<T> Watcher<T>
where
    T: EthereumTransport + 'static,
{
    /// Runs until `shutdown` completes, calling `on_feed` every time the feed is replaced.
    ///
    /// Refreshes run as separate tasks so a slow fetch never delays the status polling,
    /// overlapping refreshes are resolved by the [RefreshController].
    pub async fn run<F>(self, shutdown: impl Future<Output = ()>, mut on_feed: F)
    where
        F: FnMut(&FeedSnapshot),
    {
        let Watcher {
            controller,
            mut tracker,
            wallet,
            poll_interval,
        } = self;

        let mut wallet_changes = wallet.subscribe();
        let mut feed = controller.subscribe();
        let mut refreshes: JoinSet<RefreshOutcome> = JoinSet::new();

        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let spawn_refresh = |refreshes: &mut JoinSet<RefreshOutcome>, trigger: Trigger| {
            let controller = controller.clone();
            refreshes.spawn(async move { controller.refresh(trigger).await });
        };

        if let Some(address) = *wallet_changes.borrow_and_update() {
            spawn_refresh(&mut refreshes, Trigger::WalletChanged(address));
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    let poll = tracker.poll().await;
                    if let (true, Some(status)) = (poll.triggers_refresh(), poll.status()) {
                        spawn_refresh(&mut refreshes, Trigger::StatusRead(status));
                    }
                }
                changed = wallet_changes.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Wallet session closed");
                        break;
                    }
                    if let Some(address) = *wallet_changes.borrow_and_update() {
                        spawn_refresh(&mut refreshes, Trigger::WalletChanged(address));
                    }
                }
                changed = feed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = feed.borrow_and_update().clone();
                    on_feed(&snapshot);
                }
                Some(joined) = refreshes.join_next() => {
                    if let Err(error) = joined {
                        tracing::error!(reason=%error, "Refresh task failed");
                    }
                }
            }
        }

        refreshes.shutdown().await;
    }
}
