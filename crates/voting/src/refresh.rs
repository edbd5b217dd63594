//! Decides when the activity feed is refetched and which result gets displayed.
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use voting_common::{checksum_address, Address, WorkflowStatus};
use voting_ethereum::EthereumTransport;

use crate::activity::ActivityRecord;
use crate::aggregator::{EventAggregator, FetchError};

/// What caused a refresh.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    WalletChanged(Address),
    StatusRead(WorkflowStatus),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
}

/// The displayed activity.
#[derive(Clone, Debug, Default)]
pub enum Feed {
    /// Nothing loaded yet, or the contract has no events.
    #[default]
    Empty,
    /// Records ordered newest block first.
    Loaded(Vec<ActivityRecord>),
    Failed(Arc<FetchError>),
}

impl Feed {
    pub fn records(&self) -> &[ActivityRecord] {
        match self {
            Feed::Loaded(records) => records,
            Feed::Empty | Feed::Failed(_) => &[],
        }
    }
}

/// The feed together with the generation of the refresh which produced it.
///
/// Generation `0` is the initial, never refreshed, feed.
#[derive(Clone, Debug, Default)]
pub struct FeedSnapshot {
    pub generation: u64,
    pub feed: Feed,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No wallet is connected so nothing was fetched.
    Skipped,
    Committed { generation: u64, records: usize },
    Failed { generation: u64 },
    /// A later refresh was started while this one was fetching, its result was dropped.
    Superseded { generation: u64 },
}

/// Refetches the contract's activity on demand and publishes it as a [FeedSnapshot].
///
/// Every refresh takes a new generation when it starts. Only the refresh holding the
/// latest generation may replace the feed once its fetch completes, so overlapping
/// refreshes resolve to the one started last regardless of which finishes first.
pub struct RefreshController<T> {
    aggregator: EventAggregator<T>,
    wallet: watch::Receiver<Option<Address>>,
    generation: AtomicU64,
    in_flight: AtomicUsize,
    feed: watch::Sender<FeedSnapshot>,
}

impl<T: EthereumTransport> RefreshController<T> {
    pub fn new(aggregator: EventAggregator<T>, wallet: watch::Receiver<Option<Address>>) -> Self {
        let (feed, _) = watch::channel(FeedSnapshot::default());
        Self {
            aggregator,
            wallet,
            generation: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            feed,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.feed.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.feed.borrow().clone()
    }

    pub fn state(&self) -> RefreshState {
        match self.in_flight.load(Ordering::SeqCst) {
            0 => RefreshState::Idle,
            _ => RefreshState::Fetching,
        }
    }

    pub async fn refresh(&self, trigger: Trigger) -> RefreshOutcome {
        let Some(wallet) = *self.wallet.borrow() else {
            tracing::debug!(?trigger, "No wallet connected, skipping refresh");
            return RefreshOutcome::Skipped;
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _fetching = InFlight::enter(&self.in_flight);
        let wallet = checksum_address(&wallet);
        tracing::debug!(%generation, ?trigger, %wallet, "Refreshing activity");

        let result = self.aggregator.activity().await;

        let mut outcome = RefreshOutcome::Superseded { generation };
        self.feed.send_if_modified(|snapshot| {
            let latest = self.generation.load(Ordering::SeqCst);
            if generation != latest || generation <= snapshot.generation {
                return false;
            }

            let feed = match result {
                Ok(records) => {
                    outcome = RefreshOutcome::Committed {
                        generation,
                        records: records.len(),
                    };
                    if records.is_empty() {
                        Feed::Empty
                    } else {
                        Feed::Loaded(records)
                    }
                }
                Err(error) => {
                    tracing::warn!(%generation, reason=?error, "Refreshing activity failed");
                    outcome = RefreshOutcome::Failed { generation };
                    Feed::Failed(Arc::new(error))
                }
            };

            *snapshot = FeedSnapshot { generation, feed };
            true
        });

        match outcome {
            RefreshOutcome::Committed { records, .. } => {
                tracing::info!(%generation, %records, "Activity refreshed")
            }
            RefreshOutcome::Superseded { .. } => {
                tracing::debug!(%generation, "Discarding superseded refresh")
            }
            RefreshOutcome::Failed { .. } | RefreshOutcome::Skipped => {}
        }

        outcome
    }
}

/// Counts a running fetch for as long as it is alive.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
