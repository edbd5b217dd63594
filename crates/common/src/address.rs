//! Ethereum account and contract addresses.
use std::str::FromStr;

pub use ethers::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressParseError {
    #[error("expected 40 hex digits, got {0}")]
    InvalidLength(usize),
    #[error("invalid hex digit")]
    InvalidHex,
    #[error("mixed-case address does not match its EIP-55 checksum")]
    InvalidChecksum,
}

/// Formats an address with its [EIP-55] mixed-case checksum.
///
/// [EIP-55]: https://eips.ethereum.org/EIPS/eip-55
pub fn checksum_address(address: &Address) -> String {
    ethers::utils::to_checksum(address, None)
}

/// Parses a hex address, with or without `0x` prefix.
///
/// All-lowercase and all-uppercase inputs are accepted as is. Mixed-case
/// inputs must carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address, AddressParseError> {
    let digits = input.strip_prefix("0x").unwrap_or(input);
    if digits.len() != 40 {
        return Err(AddressParseError::InvalidLength(digits.len()));
    }

    let address = Address::from_str(digits).map_err(|_| AddressParseError::InvalidHex)?;

    let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && checksum_address(&address)[2..] != *digits {
        return Err(AddressParseError::InvalidChecksum);
    }

    Ok(address)
}
