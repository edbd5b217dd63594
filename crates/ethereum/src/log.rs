use anyhow::Context;
use ethers::abi::{LogParam, RawLog, Token};
use ethers::types::{BlockNumber, Filter, H256, U256};
use voting_common::{Address, EventKind, WorkflowStatus};

use crate::contract::VOTING_ABI;
use crate::{EthOrigin, Log};

/// A typed event emitted by the Voting contract.
///
/// Implemented for the four event kinds,
///     - [WorkflowStatusChangeLog]
///     - [VoterRegisteredLog]
///     - [ProposalRegisteredLog]
///     - [VotedLog]
pub trait ContractEvent: TryFrom<Log, Error = anyhow::Error> {
    const KIND: EventKind;

    fn signature() -> H256 {
        Self::KIND.topic()
    }
}

/// Matches every log of `kind` emitted by `contract`, from genesis up to the latest block.
pub fn event_filter(contract: Address, kind: EventKind) -> Filter {
    Filter::new()
        .address(contract)
        .topic0(kind.topic())
        .from_block(BlockNumber::Number(0u64.into()))
        .to_block(BlockNumber::Latest)
}

/// `WorkflowStatusChange(WorkflowStatus previousStatus, WorkflowStatus newStatus)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStatusChangeLog {
    pub origin: EthOrigin,
    pub previous_status: WorkflowStatus,
    pub new_status: WorkflowStatus,
}

/// `VoterRegistered(address voterAddress)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterRegisteredLog {
    pub origin: EthOrigin,
    pub voter: Address,
}

/// `ProposalRegistered(uint proposalId)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRegisteredLog {
    pub origin: EthOrigin,
    pub proposal_id: U256,
}

/// `Voted(address voter, uint proposalId)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VotedLog {
    pub origin: EthOrigin,
    pub voter: Address,
    pub proposal_id: U256,
}

impl ContractEvent for WorkflowStatusChangeLog {
    const KIND: EventKind = EventKind::WorkflowStatusChange;
}

impl ContractEvent for VoterRegisteredLog {
    const KIND: EventKind = EventKind::VoterRegistered;
}

impl ContractEvent for ProposalRegisteredLog {
    const KIND: EventKind = EventKind::ProposalRegistered;
}

impl ContractEvent for VotedLog {
    const KIND: EventKind = EventKind::Voted;
}

impl TryFrom<Log> for WorkflowStatusChangeLog {
    type Error = anyhow::Error;

    fn try_from(value: Log) -> Result<Self, Self::Error> {
        let (origin, log) = parse_log(value, EventKind::WorkflowStatusChange)?;

        let previous_status = get_log_param(&log, "previousStatus")?.value;
        let previous_status =
            parse_status(previous_status).context("previous status could not be parsed")?;
        let new_status = get_log_param(&log, "newStatus")?.value;
        let new_status = parse_status(new_status).context("new status could not be parsed")?;

        Ok(Self {
            origin,
            previous_status,
            new_status,
        })
    }
}

impl TryFrom<Log> for VoterRegisteredLog {
    type Error = anyhow::Error;

    fn try_from(value: Log) -> Result<Self, Self::Error> {
        let (origin, log) = parse_log(value, EventKind::VoterRegistered)?;

        let voter = get_log_param(&log, "voterAddress")?
            .value
            .into_address()
            .context("voter address could not be parsed")?;

        Ok(Self { origin, voter })
    }
}

impl TryFrom<Log> for ProposalRegisteredLog {
    type Error = anyhow::Error;

    fn try_from(value: Log) -> Result<Self, Self::Error> {
        let (origin, log) = parse_log(value, EventKind::ProposalRegistered)?;

        let proposal_id = get_log_param(&log, "proposalId")?
            .value
            .into_uint()
            .context("proposal id could not be parsed")?;

        Ok(Self {
            origin,
            proposal_id,
        })
    }
}

impl TryFrom<Log> for VotedLog {
    type Error = anyhow::Error;

    fn try_from(value: Log) -> Result<Self, Self::Error> {
        let (origin, log) = parse_log(value, EventKind::Voted)?;

        let voter = get_log_param(&log, "voter")?
            .value
            .into_address()
            .context("voter address could not be parsed")?;
        let proposal_id = get_log_param(&log, "proposalId")?
            .value
            .into_uint()
            .context("proposal id could not be parsed")?;

        Ok(Self {
            origin,
            voter,
            proposal_id,
        })
    }
}

/// Extracts the [EthOrigin] and decodes the log against `kind`'s ABI.
///
/// Decoding is strict: the signature must match and the data must be exactly the
/// encoding of the event's parameters.
fn parse_log(log: Log, kind: EventKind) -> anyhow::Result<(EthOrigin, ethers::abi::Log)> {
    anyhow::ensure!(log.removed != Some(true), "log was removed by a reorg");
    let origin = EthOrigin::try_from(&log)?;

    let raw_log = RawLog {
        topics: log.topics,
        data: log.data.to_vec(),
    };

    let event = VOTING_ABI.event(kind.name())?;
    let log = event
        .parse_log_whole(raw_log)
        .with_context(|| format!("log does not match {}", kind.signature()))?;

    Ok((origin, log))
}

/// Utility function to retrieve a named parameter from a log.
fn get_log_param(log: &ethers::abi::Log, param: &str) -> anyhow::Result<LogParam> {
    log.params
        .iter()
        .find(|p| p.name == param)
        .cloned()
        .with_context(|| format!("parameter {param} not found"))
}

fn parse_status(token: Token) -> anyhow::Result<WorkflowStatus> {
    let raw = token.into_uint().context("not an unsigned integer")?;
    anyhow::ensure!(raw <= U256::from(u8::MAX), "{raw} is out of range");
    Ok(WorkflowStatus::try_from(raw.low_u32() as u8)?)
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use ethers::abi::Token;
    use ethers::types::{Bytes, H256, U256, U64};

    use super::*;

    /// A mined log at `block` carrying `kind`'s signature and the ABI encoded `params`.
    pub fn create_test_log(kind: EventKind, block: u64, params: &[Token]) -> Log {
        create_raw_test_log(kind, block, ethers::abi::encode(params).into())
    }

    /// Like [create_test_log] but with arbitrary, possibly malformed, data.
    pub fn create_raw_test_log(kind: EventKind, block: u64, data: Bytes) -> Log {
        Log {
            address: Address::from_low_u64_be(123456),
            topics: vec![kind.topic()],
            data,
            block_hash: Some(H256::from_low_u64_be(654321 + block)),
            block_number: Some(U64::from(block)),
            transaction_hash: Some(H256::from_low_u64_be(664433 + block)),
            transaction_index: Some(U64::zero()),
            log_index: Some(U256::from(13)),
            removed: Some(false),
            ..Default::default()
        }
    }

    pub fn status(status: WorkflowStatus) -> Token {
        Token::Uint(status.as_u8().into())
    }

    pub fn uint(value: u64) -> Token {
        Token::Uint(value.into())
    }
}
