//! Normalization of the Voting contract's events into a single activity feed.
use serde::Serialize;
use voting_common::{checksum_address, BlockNumber, EventKind, WorkflowStatus};
use voting_ethereum::log::{
    ProposalRegisteredLog, VotedLog, VoterRegisteredLog, WorkflowStatusChangeLog,
};

/// The value an [ActivityRecord] displays.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ActivityValue {
    Status(WorkflowStatus),
    Text(String),
}

impl std::fmt::Display for ActivityValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityValue::Status(status) => std::fmt::Display::fmt(status, f),
            ActivityValue::Text(text) => f.write_str(text),
        }
    }
}

/// One on-chain event, normalized for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub event_name: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<WorkflowStatus>,
    pub new_value: ActivityValue,
    pub block_number: BlockNumber,
}

impl std::fmt::Display for ActivityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}: ", self.block_number, self.event_name)?;
        if let Some(old) = self.old_value {
            write!(f, "{old} -> ")?;
        }
        std::fmt::Display::fmt(&self.new_value, f)
    }
}

impl From<WorkflowStatusChangeLog> for ActivityRecord {
    fn from(log: WorkflowStatusChangeLog) -> Self {
        Self {
            event_name: EventKind::WorkflowStatusChange,
            old_value: Some(log.previous_status),
            new_value: ActivityValue::Status(log.new_status),
            block_number: log.origin.block.number,
        }
    }
}

impl From<VoterRegisteredLog> for ActivityRecord {
    fn from(log: VoterRegisteredLog) -> Self {
        Self {
            event_name: EventKind::VoterRegistered,
            old_value: None,
            new_value: ActivityValue::Text(format!(
                "Voter added {}",
                checksum_address(&log.voter)
            )),
            block_number: log.origin.block.number,
        }
    }
}

impl From<ProposalRegisteredLog> for ActivityRecord {
    fn from(log: ProposalRegisteredLog) -> Self {
        Self {
            event_name: EventKind::ProposalRegistered,
            old_value: None,
            new_value: ActivityValue::Text(format!("Proposal added {}", log.proposal_id)),
            block_number: log.origin.block.number,
        }
    }
}

impl From<VotedLog> for ActivityRecord {
    fn from(log: VotedLog) -> Self {
        Self {
            event_name: EventKind::Voted,
            old_value: None,
            new_value: ActivityValue::Text(format!(
                "Voter {} vote for proposal ID {}",
                checksum_address(&log.voter),
                log.proposal_id
            )),
            block_number: log.origin.block.number,
        }
    }
}

/// The decoded result sets of one fetch cycle, one per event kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContractEvents {
    pub status_changes: Vec<WorkflowStatusChangeLog>,
    pub voters: Vec<VoterRegisteredLog>,
    pub proposals: Vec<ProposalRegisteredLog>,
    pub votes: Vec<VotedLog>,
}

impl ContractEvents {
    pub fn len(&self) -> usize {
        self.status_changes.len() + self.voters.len() + self.proposals.len() + self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merges the result sets into one list, newest block first.
    ///
    /// The sets are concatenated in [EventKind::ALL] order before a stable sort, so
    /// records sharing a block keep that order.
    pub fn into_activity(self) -> Vec<ActivityRecord> {
        let mut records = Vec::with_capacity(self.len());
        records.extend(self.status_changes.into_iter().map(ActivityRecord::from));
        records.extend(self.voters.into_iter().map(ActivityRecord::from));
        records.extend(self.proposals.into_iter().map(ActivityRecord::from));
        records.extend(self.votes.into_iter().map(ActivityRecord::from));

        sort_newest_first(&mut records);
        records
    }
}

/// Stable sort by descending block number.
pub fn sort_newest_first(records: &mut [ActivityRecord]) {
    records.sort_by(|a, b| b.block_number.cmp(&a.block_number));
}

#[cfg(test)]
pub(crate) mod test_utils {
    use ethers::types::{H256, U256};
    use voting_common::Address;
    use voting_ethereum::{BlockOrigin, EthOrigin, TransactionOrigin};

    use super::*;

    pub fn origin(block: u64) -> EthOrigin {
        EthOrigin {
            block: BlockOrigin {
                hash: H256::from_low_u64_be(block + 1000),
                number: BlockNumber::new(block),
            },
            transaction: TransactionOrigin {
                hash: H256::from_low_u64_be(block + 2000),
                index: 0,
            },
            log_index: 0,
        }
    }

    pub fn status_change(
        block: u64,
        previous_status: WorkflowStatus,
        new_status: WorkflowStatus,
    ) -> WorkflowStatusChangeLog {
        WorkflowStatusChangeLog {
            origin: origin(block),
            previous_status,
            new_status,
        }
    }

    pub fn voter(block: u64, voter: Address) -> VoterRegisteredLog {
        VoterRegisteredLog {
            origin: origin(block),
            voter,
        }
    }

    pub fn proposal(block: u64, proposal_id: u64) -> ProposalRegisteredLog {
        ProposalRegisteredLog {
            origin: origin(block),
            proposal_id: U256::from(proposal_id),
        }
    }

    pub fn vote(block: u64, voter: Address, proposal_id: u64) -> VotedLog {
        VotedLog {
            origin: origin(block),
            voter,
            proposal_id: U256::from(proposal_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions_sorted::assert_eq;
    use voting_common::{parse_address, Address};

    use super::test_utils::*;
    use super::*;

    fn blocks(records: &[ActivityRecord]) -> Vec<u64> {
        records.iter().map(|r| r.block_number.get()).collect()
    }

    fn kinds(records: &[ActivityRecord]) -> Vec<EventKind> {
        records.iter().map(|r| r.event_name).collect()
    }

    mod normalization {
        use pretty_assertions_sorted::assert_eq;

        use super::*;

        #[test]
        fn status_change() {
            let record = ActivityRecord::from(test_utils::status_change(
                5,
                WorkflowStatus::RegisteringVoters,
                WorkflowStatus::ProposalsRegistrationStarted,
            ));

            assert_eq!(
                record,
                ActivityRecord {
                    event_name: EventKind::WorkflowStatusChange,
                    old_value: Some(WorkflowStatus::RegisteringVoters),
                    new_value: ActivityValue::Status(WorkflowStatus::ProposalsRegistrationStarted),
                    block_number: BlockNumber::new(5),
                }
            );
        }

        #[test]
        fn voter_registered_uses_checksummed_address() {
            let address = parse_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
            let record = ActivityRecord::from(voter(3, address));

            assert_eq!(record.event_name, EventKind::VoterRegistered);
            assert_eq!(record.old_value, None);
            assert_eq!(
                record.new_value,
                ActivityValue::Text(
                    "Voter added 0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_owned()
                )
            );
            assert_eq!(record.block_number, BlockNumber::new(3));
        }

        #[test]
        fn proposal_registered() {
            let record = ActivityRecord::from(proposal(8, 2));

            assert_eq!(record.event_name, EventKind::ProposalRegistered);
            assert_eq!(record.old_value, None);
            assert_eq!(
                record.new_value,
                ActivityValue::Text("Proposal added 2".to_owned())
            );
        }

        #[test]
        fn voted() {
            let address = parse_address("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359").unwrap();
            let record = ActivityRecord::from(vote(11, address, 1));

            assert_eq!(record.event_name, EventKind::Voted);
            assert_eq!(record.old_value, None);
            assert_eq!(
                record.new_value,
                ActivityValue::Text(
                    "Voter 0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359 vote for proposal ID 1"
                        .to_owned()
                )
            );
        }

        #[test]
        fn display() {
            let record = ActivityRecord::from(test_utils::status_change(
                5,
                WorkflowStatus::VotingSessionStarted,
                WorkflowStatus::VotingSessionEnded,
            ));
            assert_eq!(
                record.to_string(),
                format!(
                    "#5 WorkflowStatusChange: {} -> {}",
                    WorkflowStatus::VotingSessionStarted,
                    WorkflowStatus::VotingSessionEnded
                )
            );

            let record = ActivityRecord::from(proposal(8, 2));
            assert_eq!(record.to_string(), "#8 ProposalRegistered: Proposal added 2");
        }

        #[test]
        fn json_shape() {
            let record = ActivityRecord::from(proposal(8, 2));
            let json = serde_json::to_value(&record).unwrap();

            assert_eq!(
                json,
                serde_json::json!({
                    "eventName": "ProposalRegistered",
                    "newValue": "Proposal added 2",
                    "blockNumber": 8,
                })
            );
        }
    }

    #[test]
    fn status_change_and_voter() {
        let events = ContractEvents {
            voters: vec![voter(3, Address::repeat_byte(1))],
            status_changes: vec![test_utils::status_change(
                5,
                WorkflowStatus::RegisteringVoters,
                WorkflowStatus::ProposalsRegistrationStarted,
            )],
            ..Default::default()
        };

        let records = events.into_activity();
        assert_eq!(blocks(&records), vec![5, 3]);
        assert_eq!(
            kinds(&records),
            vec![EventKind::WorkflowStatusChange, EventKind::VoterRegistered]
        );
    }

    #[test]
    fn empty() {
        assert_eq!(ContractEvents::default().into_activity(), vec![]);
    }

    #[test]
    fn same_block_keeps_kind_order() {
        let who = Address::repeat_byte(7);
        let events = ContractEvents {
            status_changes: vec![test_utils::status_change(
                4,
                WorkflowStatus::ProposalsRegistrationEnded,
                WorkflowStatus::VotingSessionStarted,
            )],
            voters: vec![voter(4, who)],
            proposals: vec![proposal(4, 0)],
            votes: vec![vote(4, who, 0)],
        };

        let records = events.into_activity();
        assert_eq!(kinds(&records), EventKind::ALL.to_vec());
    }

    #[test]
    fn same_block_within_kind_keeps_query_order() {
        let events = ContractEvents {
            proposals: vec![proposal(2, 0), proposal(2, 1), proposal(2, 2)],
            ..Default::default()
        };

        let texts = events
            .into_activity()
            .into_iter()
            .map(|r| r.new_value.to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            texts,
            vec!["Proposal added 0", "Proposal added 1", "Proposal added 2"]
        );
    }

    #[rstest::rstest]
    #[case::only_votes(vec![], vec![], vec![], vec![1, 9, 4])]
    #[case::interleaved(vec![1, 10], vec![2, 3], vec![7], vec![12, 5])]
    #[case::ascending_input(vec![1, 2, 3], vec![4, 5, 6], vec![7, 8], vec![9])]
    #[case::duplicates(vec![6, 6], vec![6], vec![0], vec![6, 0])]
    fn sorted_descending(
        #[case] status_blocks: Vec<u64>,
        #[case] voter_blocks: Vec<u64>,
        #[case] proposal_blocks: Vec<u64>,
        #[case] vote_blocks: Vec<u64>,
    ) {
        let who = Address::repeat_byte(3);
        let events = ContractEvents {
            status_changes: status_blocks
                .iter()
                .map(|&b| {
                    test_utils::status_change(
                        b,
                        WorkflowStatus::RegisteringVoters,
                        WorkflowStatus::ProposalsRegistrationStarted,
                    )
                })
                .collect(),
            voters: voter_blocks.iter().map(|&b| voter(b, who)).collect(),
            proposals: proposal_blocks.iter().map(|&b| proposal(b, b)).collect(),
            votes: vote_blocks.iter().map(|&b| vote(b, who, 0)).collect(),
        };
        let expected_len = events.len();

        let records = events.into_activity();
        assert_eq!(records.len(), expected_len);
        assert!(records
            .windows(2)
            .all(|pair| pair[0].block_number >= pair[1].block_number));
    }
}
