use serde::{Deserialize, Serialize};

/// The phases of a voting session, as exposed by the contract's `workflowStatus`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WorkflowStatus {
    RegisteringVoters = 0,
    ProposalsRegistrationStarted = 1,
    ProposalsRegistrationEnded = 2,
    VotingSessionStarted = 3,
    VotingSessionEnded = 4,
    VotesTallied = 5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown workflow status {0}")]
pub struct UnknownWorkflowStatus(pub u8);

impl WorkflowStatus {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human readable description of the phase.
    pub const fn description(self) -> &'static str {
        match self {
            WorkflowStatus::RegisteringVoters => "Registering voters",
            WorkflowStatus::ProposalsRegistrationStarted => "Proposals registration started",
            WorkflowStatus::ProposalsRegistrationEnded => "Proposals registration ended",
            WorkflowStatus::VotingSessionStarted => "Voting session started",
            WorkflowStatus::VotingSessionEnded => "Voting session ended",
            WorkflowStatus::VotesTallied => "Votes tallied",
        }
    }
}

impl TryFrom<u8> for WorkflowStatus {
    type Error = UnknownWorkflowStatus;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => WorkflowStatus::RegisteringVoters,
            1 => WorkflowStatus::ProposalsRegistrationStarted,
            2 => WorkflowStatus::ProposalsRegistrationEnded,
            3 => WorkflowStatus::VotingSessionStarted,
            4 => WorkflowStatus::VotingSessionEnded,
            5 => WorkflowStatus::VotesTallied,
            other => return Err(UnknownWorkflowStatus(other)),
        })
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}
