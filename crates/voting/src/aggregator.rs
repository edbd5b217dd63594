use ethers::types::{H256, U256};
use voting_common::{Address, EventKind};
use voting_ethereum::log::{event_filter, ContractEvent};
use voting_ethereum::{EthereumTransport, RpcError};

use crate::activity::{ActivityRecord, ContractEvents};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetching {kind} logs")]
    Query {
        kind: EventKind,
        #[source]
        source: RpcError,
    },
    /// A log matched the event's signature but its payload does not.
    #[error("decoding {kind} log {log_index:?} of transaction {transaction:?}")]
    Decode {
        kind: EventKind,
        transaction: Option<H256>,
        log_index: Option<U256>,
        #[source]
        source: anyhow::Error,
    },
}

impl FetchError {
    /// The event kind whose query failed.
    pub fn kind(&self) -> EventKind {
        match self {
            FetchError::Query { kind, .. } | FetchError::Decode { kind, .. } => *kind,
        }
    }
}

/// Retrieves the full event history of a Voting contract.
///
/// Each event kind is queried from genesis to the latest block. Queries run one after
/// the other in [EventKind::ALL] order and the first failure aborts the cycle.
pub struct EventAggregator<T> {
    transport: T,
    contract: Address,
}

impl<T: EthereumTransport> EventAggregator<T> {
    pub fn new(transport: T, contract: Address) -> Self {
        Self {
            transport,
            contract,
        }
    }

    /// Fetches and decodes every log of kind `E`.
    ///
    /// A single log which fails to decode fails the whole fetch, a partial history
    /// would misreport the contract's state.
    pub async fn fetch<E: ContractEvent>(&self) -> Result<Vec<E>, FetchError> {
        let filter = event_filter(self.contract, E::KIND);
        let logs = self
            .transport
            .logs(&filter)
            .await
            .map_err(|source| FetchError::Query {
                kind: E::KIND,
                source,
            })?;

        let events = logs
            .into_iter()
            .map(|log| {
                let transaction = log.transaction_hash;
                let log_index = log.log_index;
                E::try_from(log).map_err(|source| FetchError::Decode {
                    kind: E::KIND,
                    transaction,
                    log_index,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(kind=%E::KIND, count=%events.len(), "Fetched logs");
        Ok(events)
    }

    /// Runs one fetch cycle over all four event kinds.
    pub async fn fetch_all(&self) -> Result<ContractEvents, FetchError> {
        Ok(ContractEvents {
            status_changes: self.fetch().await?,
            voters: self.fetch().await?,
            proposals: self.fetch().await?,
            votes: self.fetch().await?,
        })
    }

    /// Runs one fetch cycle and merges the results, newest block first.
    pub async fn activity(&self) -> Result<Vec<ActivityRecord>, FetchError> {
        self.fetch_all().await.map(ContractEvents::into_activity)
    }
}
