//! Wiring of the chain client and the connected wallet.
use std::sync::Arc;

use tokio::sync::watch;
use voting_common::{checksum_address, Address, Chain};
use voting_ethereum::{EthereumTransport, RpcError};

/// Names the application and the chains it may operate on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    pub app_name: String,
    /// WalletConnect cloud project identifier, only used for display.
    pub project_id: Option<String>,
    pub chains: Vec<Chain>,
}

impl ProviderConfig {
    pub const DEFAULT_APP_NAME: &'static str = "Projet 3 yf";

    pub fn supports(&self, chain: Chain) -> bool {
        self.chains.contains(&chain)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            app_name: Self::DEFAULT_APP_NAME.to_owned(),
            project_id: None,
            chains: vec![Chain::Sepolia, Chain::Hardhat],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("reading chain id")]
    ChainId(#[from] RpcError),
    #[error("endpoint is on chain {actual} which is not one of the configured chains [{expected}]")]
    UnsupportedChain { actual: Chain, expected: String },
}

/// Checks that `transport` is connected to one of the configured chains.
pub async fn verify_chain<T>(transport: &T, config: &ProviderConfig) -> Result<Chain, ProviderError>
where
    T: EthereumTransport + ?Sized,
{
    let chain = Chain::from_id(transport.chain_id().await?);
    if config.supports(chain) {
        return Ok(chain);
    }

    let expected = config
        .chains
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(ProviderError::UnsupportedChain {
        actual: chain,
        expected,
    })
}

/// The account currently connected, shared with anyone interested in changes.
///
/// Subscribers are only notified when the address actually changes.
#[derive(Clone, Debug)]
pub struct WalletSession {
    sender: Arc<watch::Sender<Option<Address>>>,
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletSession {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn address(&self) -> Option<Address> {
        *self.sender.borrow()
    }

    pub fn connect(&self, address: Address) {
        self.set(Some(address));
    }

    pub fn disconnect(&self) {
        self.set(None);
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Address>> {
        self.sender.subscribe()
    }

    fn set(&self, address: Option<Address>) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == address {
                return false;
            }
            *current = address;
            true
        });

        if changed {
            match address {
                Some(address) => {
                    tracing::info!(address=%checksum_address(&address), "Wallet connected")
                }
                None => tracing::info!("Wallet disconnected"),
            }
        }
    }
}

/// A chain client bound to a verified chain, and the wallet session using it.
pub struct Providers<T> {
    pub config: ProviderConfig,
    pub chain: Chain,
    pub transport: Arc<T>,
    pub wallet: WalletSession,
}

impl<T: EthereumTransport> Providers<T> {
    pub async fn connect(config: ProviderConfig, transport: T) -> Result<Self, ProviderError> {
        let chain = verify_chain(&transport, &config).await?;
        tracing::info!(app=%config.app_name, %chain, "Connected to chain");

        Ok(Self {
            config,
            chain,
            transport: Arc::new(transport),
            wallet: WalletSession::new(),
        })
    }

    /// Connects the wallet to `address`, or to the node's first unlocked account if
    /// none is given. Returns the connected address, if any.
    pub async fn connect_wallet(
        &self,
        address: Option<Address>,
    ) -> Result<Option<Address>, RpcError> {
        let address = match address {
            Some(address) => Some(address),
            None => self.transport.accounts().await?.into_iter().next(),
        };

        match address {
            Some(address) => self.wallet.connect(address),
            None => tracing::warn!("No wallet account available"),
        }

        Ok(address)
    }
}
