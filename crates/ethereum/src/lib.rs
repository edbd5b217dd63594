use anyhow::Context;
use ethers::types::H256;
use voting_common::BlockNumber;

pub mod contract;
pub mod deploy;
pub mod log;
pub mod provider;

pub use ethers::types::{Bytes, Filter, Log, TransactionReceipt, TransactionRequest};
pub use provider::{EthereumTransport, HttpProvider, RpcError};

#[cfg(any(test, feature = "test-utils"))]
pub use provider::MockEthereumTransport;

/// List of semi-official Ethereum RPC errors taken from [EIP-1474] (which is stagnant),
/// plus the `execution reverted` code used by geth-like nodes.
///
/// [EIP-1474]: https://github.com/ethereum/EIPs/blob/master/EIPS/eip-1474.md#error-codes
#[derive(Debug, Clone, Copy, PartialEq)]
enum RpcErrorCode {
    ExecutionReverted,
    InvalidParams,
    InternalError,
    InvalidInput,
    LimitExceeded,
}

impl RpcErrorCode {
    const fn code(&self) -> i64 {
        match self {
            RpcErrorCode::ExecutionReverted => 3,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::InternalError => -32603,
            RpcErrorCode::InvalidInput => -32000,
            RpcErrorCode::LimitExceeded => -32005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Hash, Eq)]
pub struct BlockOrigin {
    pub hash: H256,
    pub number: BlockNumber,
}

#[derive(Debug, Clone, PartialEq, Hash, Eq)]
pub struct TransactionOrigin {
    pub hash: H256,
    pub index: u64,
}

/// The point on chain at which a log was emitted.
#[derive(Debug, Clone, PartialEq, Hash, Eq)]
pub struct EthOrigin {
    pub block: BlockOrigin,
    pub transaction: TransactionOrigin,
    pub log_index: u64,
}

impl TryFrom<&Log> for BlockOrigin {
    type Error = anyhow::Error;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let hash = log.block_hash.context("missing block hash")?;
        let number = log.block_number.context("missing block number")?.as_u64();
        Ok(Self {
            hash,
            number: BlockNumber::new(number),
        })
    }
}

impl TryFrom<&Log> for TransactionOrigin {
    type Error = anyhow::Error;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let hash = log.transaction_hash.context("missing transaction hash")?;
        let index = log
            .transaction_index
            .context("missing transaction index")?
            .as_u64();
        Ok(Self { hash, index })
    }
}

impl TryFrom<&Log> for EthOrigin {
    type Error = anyhow::Error;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let block = BlockOrigin::try_from(log)?;
        let transaction = TransactionOrigin::try_from(log)?;
        let log_index = log.log_index.context("missing log index")?.as_u64();

        Ok(EthOrigin {
            block,
            transaction,
            log_index,
        })
    }
}
