use crate::consts::{
    DEFAULT_BUNDLER_URL, DEFAULT_EXECUTION_GAS_BUDGET, DEFAULT_FACTORY_ARTIFACT,
    DEFAULT_NETWORK, DEFAULT_OWNER_KEY, DEFAULT_SELF_BUNDLER_ADDR, ENTRY_POINT_ADDRESS,
};
use clap::{value_parser, Parser};
use ethers::types::Address;
use expanded_pathbuf::ExpandedPathBuf;
use std::net::SocketAddr;
use tracing::Level;

/// Provisions a SimpleAccount, funds it and pushes user operations through a bundler
#[derive(Debug, Parser)]
#[clap(name = "uo-diag")]
pub struct Opts {
    /// Node URL, or `localhost`
    #[clap(long, env = "ETH_RPC_URL", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// File holding a mnemonic or a hex private key of the funding account
    #[clap(long, env = "MNEMONIC_FILE")]
    pub mnemonic: Option<ExpandedPathBuf>,

    #[clap(long, env = "BUNDLER_URL", default_value = DEFAULT_BUNDLER_URL)]
    pub bundler_url: String,

    #[clap(long, env = "ENTRY_POINT", default_value = ENTRY_POINT_ADDRESS)]
    pub entry_point: Address,

    /// Account creation index. A fresh account per run when unset
    #[clap(long)]
    pub nonce: Option<u64>,

    /// Deploy the account factory when it is missing
    #[clap(long)]
    pub deploy_factory: bool,

    /// Serve a bundler from this process and send the operations to it
    #[clap(long)]
    pub self_bundler: bool,

    #[clap(long, default_value = DEFAULT_SELF_BUNDLER_ADDR)]
    pub self_bundler_addr: SocketAddr,

    /// Compiled SimpleAccountFactory (Hardhat or Foundry artifact, or raw hex)
    #[clap(long, env = "FACTORY_ARTIFACT", default_value = DEFAULT_FACTORY_ARTIFACT)]
    pub factory_artifact: ExpandedPathBuf,

    /// Private key of the account owner
    #[clap(long, env = "OWNER_KEY", default_value = DEFAULT_OWNER_KEY)]
    pub owner_key: String,

    /// Gas units the account is funded for
    #[clap(long, default_value_t = DEFAULT_EXECUTION_GAS_BUDGET)]
    pub gas_budget: u64,

    /// The verbosity level
    #[clap(long, short, default_value_t = 2, value_parser = value_parser!(u8).range(..=4))]
    verbosity: u8,
}

impl Opts {
    pub fn get_log_level(&self) -> Level {
        log_level(self.verbosity)
    }
}

/// Runs the development bundler on its own
#[derive(Debug, Parser)]
#[clap(name = "dev-bundler")]
pub struct DevBundlerOpts {
    #[clap(long, env = "ETH_RPC_URL", default_value = DEFAULT_NETWORK)]
    pub network: String,

    /// File holding a mnemonic or a hex private key of the account paying for `handleOps`
    #[clap(long, env = "MNEMONIC_FILE")]
    pub mnemonic: Option<ExpandedPathBuf>,

    #[clap(long, env = "ENTRY_POINT", default_value = ENTRY_POINT_ADDRESS)]
    pub entry_point: Address,

    #[clap(long, default_value = DEFAULT_SELF_BUNDLER_ADDR)]
    pub addr: SocketAddr,

    /// The verbosity level
    #[clap(long, short, default_value_t = 2, value_parser = value_parser!(u8).range(..=4))]
    verbosity: u8,
}

impl DevBundlerOpts {
    pub fn get_log_level(&self) -> Level {
        log_level(self.verbosity)
    }
}

fn log_level(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::ERROR,
        1 => Level::WARN,
        2 => Level::INFO,
        3 => Level::DEBUG,
        _ => Level::TRACE,
    }
}
