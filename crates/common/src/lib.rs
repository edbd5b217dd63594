//! Contains core types shared by the Voting contract client crates which have
//! no real home of their own.
use serde::{Deserialize, Serialize};

pub mod address;
pub mod event;
pub mod workflow;

pub use address::{checksum_address, parse_address, Address};
pub use event::EventKind;
pub use workflow::WorkflowStatus;

/// An Ethereum block number.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockNumber(u64);

impl BlockNumber {
    pub const GENESIS: BlockNumber = BlockNumber(0);

    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockNumber {
    fn from(number: u64) -> Self {
        Self(number)
    }
}

impl std::fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// An Ethereum chain, identified by its `eth_chainId`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Chain {
    Sepolia,
    Hardhat,
    Custom(u64),
}

impl Chain {
    pub const SEPOLIA_ID: u64 = 11_155_111;
    pub const HARDHAT_ID: u64 = 31_337;

    pub fn from_id(id: u64) -> Self {
        match id {
            Self::SEPOLIA_ID => Chain::Sepolia,
            Self::HARDHAT_ID => Chain::Hardhat,
            other => Chain::Custom(other),
        }
    }

    pub const fn id(&self) -> u64 {
        match self {
            Chain::Sepolia => Self::SEPOLIA_ID,
            Chain::Hardhat => Self::HARDHAT_ID,
            Chain::Custom(id) => *id,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Chain::Sepolia => "sepolia",
            Chain::Hardhat => "hardhat",
            Chain::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Chain::Custom(id) => write!(f, "custom ({id})"),
            known => f.write_str(known.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case::sepolia(11_155_111, Chain::Sepolia)]
    #[case::hardhat(31_337, Chain::Hardhat)]
    #[case::mainnet(1, Chain::Custom(1))]
    fn chain_from_id(#[case] id: u64, #[case] expected: Chain) {
        let chain = Chain::from_id(id);
        assert_eq!(chain, expected);
        assert_eq!(chain.id(), id);
    }

    #[test]
    fn chain_display() {
        assert_eq!(Chain::Hardhat.to_string(), "hardhat");
        assert_eq!(Chain::Custom(5).to_string(), "custom (5)");
    }

    #[test]
    fn block_number_ordering() {
        assert!(BlockNumber::new(5) > BlockNumber::new(3));
        assert_eq!(BlockNumber::GENESIS, BlockNumber::default());
    }
}
