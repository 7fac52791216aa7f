use ethers::{
    providers::Middleware,
    types::{Address, U256},
};
use thiserror::Error;

/// Error that ends a diagnostic run. `main` is the only place that turns it into an exit status.
#[derive(Debug, Error)]
pub enum RunOpError {
    /// Thrown when the tool cannot be set up, e.g. there is no identity to fund the account
    #[error("fatal: {0}")]
    Configuration(String),
    /// Thrown when the account factory has no code and deploying it was not permitted
    #[error("account factory not deployed at {address:?}. run with --deploy-factory")]
    MissingFactory { address: Address },
    /// Thrown when the factory deployment reverted or left no code behind
    #[error("account factory deployment failed: {0}")]
    DeploymentFailure(String),
    /// Thrown when the bundler refused a user operation
    #[error(transparent)]
    Bundler(#[from] BundlerError),
    /// Thrown when a provider or transport call fails
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A bundler failure after diagnosis
#[derive(Debug, Error)]
pub enum BundlerError {
    /// The bundler reported an underpriced operation (`paid <N> expected <M>`, scaled down by 1e9)
    #[error("Error: Paid {paid}, expected {expected} . Paid {percentage}%, missing {missing} ")]
    GasShortfall {
        paid: U256,
        expected: U256,
        percentage: U256,
        missing: U256,
    },
    /// Any other failure, untouched
    #[error(transparent)]
    Unclassified(anyhow::Error),
}

// Error thrown when the UserOpMiddleware interacts with the bundlers
#[derive(Debug, Error)]
pub enum UserOpMiddlewareError<M: Middleware> {
    /// Thrown when the internal middleware errors
    #[error("Middleware error: {0}")]
    MiddlewareError(M::Error),
    /// Thrown when the bundler answers with a JSON-RPC error object
    #[error("{message} (code {code})")]
    JsonRpc { code: i64, message: String },
    /// Thrown when the bundler cannot be reached
    #[error("Bundler transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Thrown when the bundler response cannot be decoded
    #[error("Invalid bundler response: {0}")]
    Serde(#[from] serde_json::Error),
    /// Thrown when the bundler runs on another chain than the node
    #[error("bundler is on chain id {bundler}, but provider is on chain id {provider}")]
    ChainIdMismatch { bundler: u64, provider: u64 },
    /// Thrown when the bundler does not accept operations for the entry point
    #[error("bundler does not support entry point {0:?}")]
    UnsupportedEntryPoint(Address),
}
