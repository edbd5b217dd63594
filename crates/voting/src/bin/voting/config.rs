use std::num::NonZeroU64;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use url::Url;
use voting_common::{parse_address, Address, Chain};
use voting_lib::ProviderConfig;

#[derive(Parser)]
#[command(name = "voting")]
#[command(version)]
#[command(about = "Deploys the Voting contract and follows its on-chain activity.")]
struct Cli {
    #[arg(
        long = "ethereum.url",
        long_help = r"This should point to the HTTP RPC endpoint of your Ethereum entry-point, typically a local Hardhat node or a hosted gateway service such as Infura.

Examples:
    infura:  https://sepolia.infura.io/v3/<PROJECT_ID>
    hardhat: http://127.0.0.1:8545",
        value_name = "HTTP(s) URL",
        value_hint = clap::ValueHint::Url,
        default_value = "http://127.0.0.1:8545",
        env = "VOTING_ETHEREUM_API_URL",
    )]
    ethereum_url: Url,

    #[arg(
        long = "ethereum.password",
        long_help = "The optional password to use for the Ethereum API",
        value_name = None,
        env = "VOTING_ETHEREUM_API_PASSWORD",
    )]
    ethereum_password: Option<String>,

    #[arg(
        long = "ethereum.timeout",
        long_help = "Timeout of a single Ethereum API request",
        value_name = "SECONDS",
        default_value = "30",
        env = "VOTING_ETHEREUM_TIMEOUT"
    )]
    ethereum_timeout: NonZeroU64,

    #[arg(
        long = "rpc.retries",
        long_help = "How many times a request failing with a network error or timeout is retried",
        default_value = "0",
        env = "VOTING_RPC_RETRIES"
    )]
    rpc_retries: usize,

    #[arg(
        long = "network",
        long_help = "Restrict the client to a single chain. \
                     By default both sepolia and hardhat are accepted.",
        value_enum,
        env = "VOTING_NETWORK"
    )]
    network: Option<Network>,

    #[arg(
        long = "app-name",
        long_help = "Name the client announces itself with",
        default_value = ProviderConfig::DEFAULT_APP_NAME,
        env = "VOTING_APP_NAME"
    )]
    app_name: String,

    #[arg(
        long = "project-id",
        long_help = "WalletConnect cloud project identifier",
        env = "VOTING_PROJECT_ID"
    )]
    project_id: Option<String>,

    #[arg(
        long = "deployments-dir",
        long_help = "Directory holding the per chain deployment journals",
        value_name = "DIR",
        value_hint = clap::ValueHint::DirPath,
        default_value = "ignition/deployments",
        env = "VOTING_DEPLOYMENTS_DIR"
    )]
    deployments_dir: PathBuf,

    #[command(subcommand)]
    command: CommandCli,
}

#[derive(clap::Subcommand)]
enum CommandCli {
    /// Deploy the Voting module and record the contract's address.
    Deploy {
        #[arg(
            long,
            long_help = "Hardhat compilation artifact of the Voting contract",
            value_name = "FILE",
            value_hint = clap::ValueHint::FilePath,
            default_value = "artifacts/contracts/Voting.sol/Voting.json",
            env = "VOTING_ARTIFACT"
        )]
        artifact: PathBuf,

        #[arg(
            long,
            long_help = "Account to deploy from, defaults to the node's first account",
            value_name = "ADDRESS",
            value_parser = parse_address,
            env = "VOTING_DEPLOYER_ADDRESS"
        )]
        from: Option<Address>,

        #[arg(
            long = "receipt-timeout",
            long_help = "How long to wait for the deployment to be mined",
            value_name = "SECONDS",
            default_value = "120"
        )]
        receipt_timeout: NonZeroU64,
    },
    /// Fetch the contract's activity once and print it.
    Events {
        #[command(flatten)]
        contract: ContractCli,

        #[arg(long, long_help = "Print the records as JSON")]
        json: bool,
    },
    /// Follow the contract's activity, printing it whenever it changes.
    Watch {
        #[command(flatten)]
        contract: ContractCli,

        #[arg(
            long = "wallet-address",
            long_help = "The connected wallet, defaults to the node's first account",
            value_name = "ADDRESS",
            value_parser = parse_address,
            env = "VOTING_WALLET_ADDRESS"
        )]
        wallet: Option<Address>,

        #[arg(
            long = "poll-interval",
            long_help = "How often the workflow status is read",
            value_name = "SECONDS",
            default_value = "4",
            env = "VOTING_POLL_INTERVAL"
        )]
        poll_interval: NonZeroU64,

        #[arg(long, long_help = "Print the records as JSON")]
        json: bool,
    },
}

#[derive(clap::Args)]
struct ContractCli {
    #[arg(
        long = "contract-address",
        long_help = "Address of the Voting contract, defaults to the address recorded by `deploy`",
        value_name = "ADDRESS",
        value_parser = parse_address,
        env = "VOTING_CONTRACT_ADDRESS"
    )]
    contract_address: Option<Address>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Network {
    Sepolia,
    Hardhat,
}

impl From<Network> for Chain {
    fn from(value: Network) -> Self {
        match value {
            Network::Sepolia => Chain::Sepolia,
            Network::Hardhat => Chain::Hardhat,
        }
    }
}

#[derive(Debug)]
pub struct Config {
    pub ethereum: Ethereum,
    pub providers: ProviderConfig,
    pub deployments_dir: PathBuf,
    pub command: Command,
}

#[derive(Debug)]
pub struct Ethereum {
    pub url: Url,
    pub password: Option<String>,
    pub timeout: Duration,
    pub retries: usize,
}

#[derive(Debug)]
pub enum Command {
    Deploy {
        artifact: PathBuf,
        from: Option<Address>,
        receipt_timeout: Duration,
    },
    Events {
        contract: Option<Address>,
        json: bool,
    },
    Watch {
        contract: Option<Address>,
        wallet: Option<Address>,
        poll_interval: Duration,
        json: bool,
    },
}

impl Config {
    pub fn parse() -> Self {
        Self::from_cli(Cli::parse())
    }

    fn from_cli(cli: Cli) -> Self {
        let chains = match cli.network {
            Some(network) => vec![network.into()],
            None => ProviderConfig::default().chains,
        };

        let command = match cli.command {
            CommandCli::Deploy {
                artifact,
                from,
                receipt_timeout,
            } => Command::Deploy {
                artifact,
                from,
                receipt_timeout: Duration::from_secs(receipt_timeout.get()),
            },
            CommandCli::Events { contract, json } => Command::Events {
                contract: contract.contract_address,
                json,
            },
            CommandCli::Watch {
                contract,
                wallet,
                poll_interval,
                json,
            } => Command::Watch {
                contract: contract.contract_address,
                wallet,
                poll_interval: Duration::from_secs(poll_interval.get()),
                json,
            },
        };

        Config {
            ethereum: Ethereum {
                url: cli.ethereum_url,
                password: cli.ethereum_password,
                timeout: Duration::from_secs(cli.ethereum_timeout.get()),
                retries: cli.rpc_retries,
            },
            providers: ProviderConfig {
                app_name: cli.app_name,
                project_id: cli.project_id,
                chains,
            },
            deployments_dir: cli.deployments_dir,
            command,
        }
    }
}
