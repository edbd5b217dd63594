//! Client for the Voting contract: deployment, provider wiring and the activity feed.
pub mod activity;
pub mod aggregator;
pub mod providers;
pub mod refresh;
pub mod status;
pub mod watch;

pub use activity::{ActivityRecord, ActivityValue, ContractEvents};
pub use aggregator::{EventAggregator, FetchError};
pub use providers::{ProviderConfig, Providers, WalletSession};
pub use refresh::{Feed, FeedSnapshot, RefreshController, RefreshOutcome, RefreshState, Trigger};
pub use status::{StatusPoll, StatusTracker};
pub use watch::Watcher;
