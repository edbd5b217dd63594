//! The Voting contract's ABI and read access to its state.
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::types::TransactionRequest;
use voting_common::{Address, WorkflowStatus};

use crate::provider::{EthereumTransport, RpcError};

/// The name under which the contract is compiled and deployed.
pub const CONTRACT_NAME: &str = "Voting";

// Solidity enums are `uint8` on the wire.
ethers::contract::abigen!(
    Voting,
    r#"[
        event WorkflowStatusChange(uint8 previousStatus, uint8 newStatus)
        event VoterRegistered(address voterAddress)
        event ProposalRegistered(uint256 proposalId)
        event Voted(address voter, uint256 proposalId)
        function workflowStatus() external view returns (uint8)
    ]"#
);

/// Reads the public `workflowStatus` field of the contract at `contract`.
pub async fn workflow_status<T>(
    transport: &T,
    contract: Address,
) -> Result<WorkflowStatus, RpcError>
where
    T: EthereumTransport + ?Sized,
{
    let request = TransactionRequest::new()
        .to(contract)
        .data(WorkflowStatusCall.encode());

    let data = transport.call(&request).await?;
    if data.is_empty() {
        return Err(RpcError::InvalidResponse(format!(
            "empty return data, is the contract deployed at {contract:?}?"
        )));
    }

    let WorkflowStatusReturn(raw) = WorkflowStatusReturn::decode(&data)
        .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
    WorkflowStatus::try_from(raw).map_err(|e| RpcError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ethers::contract::{EthCall, EthEvent};
    use ethers::types::Bytes;
    use voting_common::EventKind;

    use super::*;
    use crate::provider::MockEthereumTransport;

    fn status_word(raw: u8) -> Bytes {
        let mut word = vec![0u8; 32];
        word[31] = raw;
        word.into()
    }

    #[test]
    fn abi_matches_event_kinds() {
        assert_eq!(
            EventKind::WorkflowStatusChange.topic(),
            WorkflowStatusChangeFilter::signature()
        );
        assert_eq!(
            EventKind::VoterRegistered.topic(),
            VoterRegisteredFilter::signature()
        );
        assert_eq!(
            EventKind::ProposalRegistered.topic(),
            ProposalRegisteredFilter::signature()
        );
        assert_eq!(EventKind::Voted.topic(), VotedFilter::signature());
    }

    #[test]
    fn workflow_status_selector() {
        // keccak256("workflowStatus()")[..4]
        assert_eq!(WorkflowStatusCall::selector(), [0xa1, 0xed, 0xff, 0xa2]);
    }

    #[tokio::test]
    async fn decodes_status() {
        let contract = Address::repeat_byte(0xcc);
        let mut transport = MockEthereumTransport::new();
        transport
            .expect_call()
            .withf(move |request| {
                request.to == Some(contract.into())
                    && request.data == Some(Bytes::from(WorkflowStatusCall.encode()))
            })
            .times(1)
            .returning(|_| Ok(status_word(3)));

        let status = workflow_status(&transport, contract).await.unwrap();
        assert_eq!(status, WorkflowStatus::VotingSessionStarted);
    }

    #[tokio::test]
    async fn no_contract_deployed() {
        let mut transport = MockEthereumTransport::new();
        transport.expect_call().returning(|_| Ok(Bytes::default()));

        let result = workflow_status(&transport, Address::zero()).await;
        assert_matches!(result, Err(RpcError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn unknown_status() {
        let mut transport = MockEthereumTransport::new();
        transport.expect_call().returning(|_| Ok(status_word(42)));

        let result = workflow_status(&transport, Address::zero()).await;
        assert_matches!(result, Err(RpcError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn short_return_data() {
        let mut transport = MockEthereumTransport::new();
        transport
            .expect_call()
            .returning(|_| Ok(Bytes::from(vec![0u8; 16])));

        let result = workflow_status(&transport, Address::zero()).await;
        assert_matches!(result, Err(RpcError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn revert_is_propagated() {
        let mut transport = MockEthereumTransport::new();
        transport.expect_call().returning(|_| {
            Err(RpcError::Revert {
                message: "execution reverted".to_owned(),
                data: None,
            })
        });

        let result = workflow_status(&transport, Address::zero()).await;
        assert_matches!(result, Err(RpcError::Revert { .. }));
    }
}
