//! The events emitted by the Voting contract.
use ethers::types::H256;
use serde::{Deserialize, Serialize};

/// The four kinds of events the Voting contract emits.
///
/// The declaration order is the order in which the kinds are queried and
/// concatenated when building the activity feed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    WorkflowStatusChange,
    VoterRegistered,
    ProposalRegistered,
    Voted,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::WorkflowStatusChange,
        EventKind::VoterRegistered,
        EventKind::ProposalRegistered,
        EventKind::Voted,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            EventKind::WorkflowStatusChange => "WorkflowStatusChange",
            EventKind::VoterRegistered => "VoterRegistered",
            EventKind::ProposalRegistered => "ProposalRegistered",
            EventKind::Voted => "Voted",
        }
    }

    /// The canonical ABI signature. Enums are encoded as `uint8`.
    pub const fn signature(&self) -> &'static str {
        match self {
            EventKind::WorkflowStatusChange => "WorkflowStatusChange(uint8,uint8)",
            EventKind::VoterRegistered => "VoterRegistered(address)",
            EventKind::ProposalRegistered => "ProposalRegistered(uint256)",
            EventKind::Voted => "Voted(address,uint256)",
        }
    }

    /// The log's `topic0`, the Keccak-256 of [EventKind::signature].
    pub fn topic(&self) -> H256 {
        H256::from(ethers::utils::keccak256(self.signature()))
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn voter_registered_topic() {
        // keccak256("VoterRegistered(address)")
        assert_eq!(
            format!("{:#x}", EventKind::VoterRegistered.topic()),
            "0xb6be2187d059cc2a55fe29e0e503b566e1e0f8c8780096e185429350acffd3dd"
        );
    }

    #[test]
    fn topics_are_distinct() {
        let topics = EventKind::ALL
            .iter()
            .map(EventKind::topic)
            .collect::<HashSet<_>>();
        assert_eq!(topics.len(), 4);
    }

    #[test]
    fn signature_starts_with_name() {
        for kind in EventKind::ALL {
            assert!(kind.signature().starts_with(kind.name()));
        }
    }
}
