//! Tracks the contract's `workflowStatus` across repeated reads.
use voting_common::{Address, WorkflowStatus};
use voting_ethereum::contract::workflow_status;
use voting_ethereum::{EthereumTransport, RpcError};

/// The outcome of a single [StatusTracker::poll].
#[derive(Debug)]
pub enum StatusPoll {
    /// The read succeeded after no previous read, or after a failed one.
    Succeeded(WorkflowStatus),
    /// The read succeeded and the value moved on since the last successful read.
    Changed {
        from: WorkflowStatus,
        to: WorkflowStatus,
    },
    /// The read succeeded with the same value as before.
    Unchanged(WorkflowStatus),
    Failed(RpcError),
}

impl StatusPoll {
    /// Whether this read should refresh the activity feed.
    pub fn triggers_refresh(&self) -> bool {
        matches!(self, StatusPoll::Succeeded(_) | StatusPoll::Changed { .. })
    }

    pub fn status(&self) -> Option<WorkflowStatus> {
        match self {
            StatusPoll::Succeeded(status) | StatusPoll::Unchanged(status) => Some(*status),
            StatusPoll::Changed { to, .. } => Some(*to),
            StatusPoll::Failed(_) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ReadState {
    Pending,
    Success(WorkflowStatus),
    Error,
}

/// Repeatedly reads `workflowStatus` and reports how each read relates to the last.
pub struct StatusTracker<T> {
    transport: T,
    contract: Address,
    state: ReadState,
}

impl<T: EthereumTransport> StatusTracker<T> {
    pub fn new(transport: T, contract: Address) -> Self {
        Self {
            transport,
            contract,
            state: ReadState::Pending,
        }
    }

    /// The value of the last successful read, unless a later read failed.
    pub fn current(&self) -> Option<WorkflowStatus> {
        match self.state {
            ReadState::Success(status) => Some(status),
            ReadState::Pending | ReadState::Error => None,
        }
    }

    pub async fn poll(&mut self) -> StatusPoll {
        let result = workflow_status(&self.transport, self.contract).await;

        let (next, poll) = match (self.state, result) {
            (_, Err(error)) => {
                tracing::warn!(%error, "Reading workflow status failed");
                (ReadState::Error, StatusPoll::Failed(error))
            }
            (ReadState::Success(from), Ok(to)) if from != to => {
                tracing::info!(%from, %to, "Workflow status changed");
                (ReadState::Success(to), StatusPoll::Changed { from, to })
            }
            (ReadState::Success(_), Ok(status)) => {
                (ReadState::Success(status), StatusPoll::Unchanged(status))
            }
            (ReadState::Pending | ReadState::Error, Ok(status)) => {
                tracing::debug!(%status, "Workflow status read succeeded");
                (ReadState::Success(status), StatusPoll::Succeeded(status))
            }
        };

        self.state = next;
        poll
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use voting_ethereum::{Bytes, MockEthereumTransport};

    use super::*;

    fn status_word(status: WorkflowStatus) -> Bytes {
        let mut word = vec![0u8; 32];
        word[31] = status.as_u8();
        word.into()
    }

    fn transport(reads: Vec<Result<WorkflowStatus, RpcError>>) -> MockEthereumTransport {
        let mut reads = reads.into_iter();
        let mut transport = MockEthereumTransport::new();
        transport.expect_call().returning(move |_| {
            reads
                .next()
                .expect("unexpected read")
                .map(status_word)
        });
        transport
    }

    #[tokio::test]
    async fn first_success_triggers() {
        let mut tracker = StatusTracker::new(
            transport(vec![Ok(WorkflowStatus::RegisteringVoters)]),
            Address::zero(),
        );

        assert_eq!(tracker.current(), None);
        let poll = tracker.poll().await;
        assert_matches!(poll, StatusPoll::Succeeded(WorkflowStatus::RegisteringVoters));
        assert!(poll.triggers_refresh());
        assert_eq!(tracker.current(), Some(WorkflowStatus::RegisteringVoters));
    }

    #[tokio::test]
    async fn repeated_value_does_not_trigger() {
        let mut tracker = StatusTracker::new(
            transport(vec![
                Ok(WorkflowStatus::VotingSessionStarted),
                Ok(WorkflowStatus::VotingSessionStarted),
            ]),
            Address::zero(),
        );

        tracker.poll().await;
        let poll = tracker.poll().await;
        assert_matches!(poll, StatusPoll::Unchanged(WorkflowStatus::VotingSessionStarted));
        assert!(!poll.triggers_refresh());
    }

    #[tokio::test]
    async fn change_triggers() {
        let mut tracker = StatusTracker::new(
            transport(vec![
                Ok(WorkflowStatus::VotingSessionStarted),
                Ok(WorkflowStatus::VotingSessionEnded),
            ]),
            Address::zero(),
        );

        tracker.poll().await;
        let poll = tracker.poll().await;
        assert_matches!(
            poll,
            StatusPoll::Changed {
                from: WorkflowStatus::VotingSessionStarted,
                to: WorkflowStatus::VotingSessionEnded
            }
        );
        assert!(poll.triggers_refresh());
        assert_eq!(poll.status(), Some(WorkflowStatus::VotingSessionEnded));
    }

    #[tokio::test]
    async fn recovery_after_failure_triggers() {
        let mut tracker = StatusTracker::new(
            transport(vec![
                Ok(WorkflowStatus::VotesTallied),
                Err(RpcError::Timeout),
                Ok(WorkflowStatus::VotesTallied),
            ]),
            Address::zero(),
        );

        tracker.poll().await;

        let poll = tracker.poll().await;
        assert_matches!(poll, StatusPoll::Failed(RpcError::Timeout));
        assert!(!poll.triggers_refresh());
        assert_eq!(tracker.current(), None);

        let poll = tracker.poll().await;
        assert_matches!(poll, StatusPoll::Succeeded(WorkflowStatus::VotesTallied));
    }
}
