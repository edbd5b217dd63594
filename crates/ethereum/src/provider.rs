use std::future::Future;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, JsonRpcError, Middleware, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Bytes, Filter, Log, TransactionReceipt, TransactionRequest, H256};
use tracing::warn;
use url::Url;
use voting_common::Address;
use voting_retry::Retry;

use crate::RpcErrorCode;

/// Error returned by [EthereumTransport] calls.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The endpoint could not be reached or the connection failed.
    #[error("network error: {0}")]
    Network(#[source] ProviderError),
    #[error("request timed out")]
    Timeout,
    /// The call or transaction was reverted by the EVM.
    #[error("execution reverted: {message}")]
    Revert {
        message: String,
        data: Option<Bytes>,
    },
    /// Query exceeded limits (time or result length).
    #[error("query limit exceeded")]
    QueryLimit,
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Whether the failure is in the transport rather than the node's answer.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Network(_) | RpcError::Timeout)
    }
}

impl From<ProviderError> for RpcError {
    fn from(error: ProviderError) -> Self {
        use ethers::providers::RpcError as _;

        if let Some(response) = error.as_error_response() {
            return response.into();
        }
        if let Some(serde) = error.as_serde_error() {
            return RpcError::InvalidResponse(serde.to_string());
        }
        RpcError::Network(error)
    }
}

impl From<&JsonRpcError> for RpcError {
    fn from(error: &JsonRpcError) -> Self {
        const EXECUTION_REVERTED: i64 = RpcErrorCode::ExecutionReverted.code();
        const INVALID_PARAMS: i64 = RpcErrorCode::InvalidParams.code();
        const INTERNAL_ERROR: i64 = RpcErrorCode::InternalError.code();
        const INVALID_INPUT: i64 = RpcErrorCode::InvalidInput.code();
        const LIMIT_EXCEEDED: i64 = RpcErrorCode::LimitExceeded.code();

        let revert = || RpcError::Revert {
            message: error.message.clone(),
            data: error
                .data
                .as_ref()
                .and_then(|data| data.as_str())
                .and_then(|data| data.parse::<Bytes>().ok()),
        };

        match (error.code, error.message.as_str()) {
            (LIMIT_EXCEEDED, _) => RpcError::QueryLimit,
            (INVALID_PARAMS, msg) if msg.starts_with("Log response size exceeded") => {
                RpcError::QueryLimit
            }
            (INVALID_PARAMS, msg) if msg.starts_with("query returned more than") => {
                RpcError::QueryLimit
            }
            (INVALID_INPUT, msg) if msg.starts_with("Query timeout exceeded") => {
                RpcError::QueryLimit
            }
            (EXECUTION_REVERTED, _) => revert(),
            // Hardhat reports reverts as internal errors.
            (INTERNAL_ERROR | INVALID_INPUT, msg) if msg.contains("revert") => revert(),
            (code, _) => RpcError::Rpc {
                code,
                message: error.message.clone(),
            },
        }
    }
}

/// Contains only those Ethereum JSON-RPC methods the client uses.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait::async_trait]
pub trait EthereumTransport: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;
    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError>;
    /// Executes a read-only call against the latest block and returns the raw return data.
    async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcError>;
    async fn accounts(&self) -> Result<Vec<Address>, RpcError>;
    /// Submits a transaction signed by the node and returns its hash without waiting
    /// for it to be mined.
    async fn send_transaction(&self, request: &TransactionRequest) -> Result<H256, RpcError>;
    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, RpcError>;
}

#[async_trait::async_trait]
impl<T: EthereumTransport + ?Sized> EthereumTransport for Arc<T> {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.as_ref().chain_id().await
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        self.as_ref().logs(filter).await
    }

    async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcError> {
        self.as_ref().call(request).await
    }

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        self.as_ref().accounts().await
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<H256, RpcError> {
        self.as_ref().send_transaction(request).await
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.as_ref().transaction_receipt(hash).await
    }
}

/// An implementation of [EthereumTransport] over an [ethers] HTTP provider.
///
/// Every request is bounded by the configured timeout. Transient failures of reads
/// are retried with an exponential backoff of
///
/// `backoff [secs] = min(2 ^ N, 30) [secs]`
///
/// where `N` is the consecutive retry iteration number `{1, 2, ...}`, up to the
/// configured number of retries. By default nothing is retried.
#[derive(Clone, Debug)]
pub struct HttpProvider {
    provider: Provider<Http>,
    timeout: Duration,
    retries: usize,
}

impl HttpProvider {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates new [HttpProvider].
    pub fn new(provider: Provider<Http>) -> Self {
        Self {
            provider,
            timeout: Self::DEFAULT_TIMEOUT,
            retries: 0,
        }
    }

    /// Creates new [HttpProvider] from url and optional password
    ///
    /// This includes setting:
    /// - the [Url]
    /// - the password (if provided)
    /// - the per-request timeout
    pub fn from_config(
        url: Url,
        password: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut url = url;
        url.set_password(password.as_deref())
            .map_err(|_| anyhow::anyhow!("Setting password"))?;

        let provider = Http::new(url);
        let provider = Provider::new(provider);

        Ok(Self {
            timeout,
            ..Self::new(provider)
        })
    }

    /// Retry transient failures up to `retries` times.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Runs a single request, bounded by the timeout.
    async fn request_once<T, Fut>(&self, request: Fut) -> Result<T, RpcError>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(RpcError::from),
            Err(_elapsed) => Err(RpcError::Timeout),
        }
    }

    /// Runs a read-only request, retrying transient failures.
    async fn request<T, Fut, FutureFactory>(
        &self,
        mut future_factory: FutureFactory,
    ) -> Result<T, RpcError>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
        FutureFactory: FnMut() -> Fut,
    {
        retry(|| self.request_once(future_factory()), self.retries).await
    }
}

#[async_trait::async_trait]
impl EthereumTransport for HttpProvider {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let id = self.request(|| self.provider.get_chainid()).await?;
        u64::try_from(id)
            .map_err(|_| RpcError::InvalidResponse(format!("chain id {id} overflows u64")))
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        self.request(|| self.provider.get_logs(filter)).await
    }

    async fn call(&self, request: &TransactionRequest) -> Result<Bytes, RpcError> {
        let tx: TypedTransaction = request.clone().into();
        self.request(|| self.provider.call(&tx, None)).await
    }

    async fn accounts(&self) -> Result<Vec<Address>, RpcError> {
        self.request(|| self.provider.get_accounts()).await
    }

    async fn send_transaction(&self, request: &TransactionRequest) -> Result<H256, RpcError> {
        // Not retried, the node may have accepted the transaction before failing.
        self.request_once(async {
            let pending = self
                .provider
                .send_transaction(request.clone(), None)
                .await?;
            Ok::<_, ProviderError>(pending.tx_hash())
        })
        .await
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, RpcError> {
        self.request(|| self.provider.get_transaction_receipt(hash))
            .await
    }
}

/// A helper function to keep the backoff strategy consistent across different Eth API calls.
async fn retry<T, Fut, FutureFactory>(
    future_factory: FutureFactory,
    max_num_retries: usize,
) -> Result<T, RpcError>
where
    Fut: Future<Output = Result<T, RpcError>>,
    FutureFactory: FnMut() -> Fut,
{
    const BASE: NonZeroU64 = NonZeroU64::MIN.saturating_add(1);

    Retry::exponential(future_factory, BASE)
        .factor(NonZeroU64::MIN)
        .max_delay(Duration::from_secs(30))
        .max_num_retries(max_num_retries)
        .when(log_and_retry_transient)
        .await
}

/// A helper function to log API errors. Yields __true__ for transient errors only.
fn log_and_retry_transient(error: &RpcError) -> bool {
    let transient = error.is_transient();
    if transient {
        warn!(reason=%error, "Ethereum request failed, retrying");
    }
    transient
}
