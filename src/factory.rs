//! Makes sure the account factory exists at its deterministic address before anything depends on it.

use crate::{
    errors::RunOpError,
    traits::{Deployer, Funder},
};
use anyhow::Context;
use ethers::{
    abi::{encode, Token},
    types::{Address, Bytes, U64},
};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::info;

/// Everything needed to compute the factory address: creation bytecode and constructor arguments
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FactoryDescriptor {
    pub bytecode: Bytes,
    pub constructor_args: Bytes,
}

impl FactoryDescriptor {
    pub fn new(bytecode: Bytes, constructor_args: Bytes) -> Self {
        Self {
            bytecode,
            constructor_args,
        }
    }

    /// SimpleAccountFactory takes the entry point as its only constructor argument
    pub fn simple_account_factory(bytecode: Bytes, entry_point: Address) -> Self {
        Self::new(bytecode, encode(&[Token::Address(entry_point)]).into())
    }

    /// Loads the creation bytecode from a compiled artifact.
    ///
    /// Accepts a Hardhat artifact (`"bytecode": "0x.."`), a Foundry artifact
    /// (`"bytecode": { "object": "0x.." }`) or a file holding only the hex string.
    pub fn from_artifact(path: &Path, entry_point: Address) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read factory artifact {}", path.display()))?;
        let bytecode = parse_bytecode(&content)
            .with_context(|| format!("no creation bytecode in {}", path.display()))?;
        Ok(Self::simple_account_factory(bytecode, entry_point))
    }

    /// The creation code the deployer runs: bytecode followed by the encoded constructor arguments
    pub fn init_code(&self) -> Bytes {
        [self.bytecode.as_ref(), self.constructor_args.as_ref()]
            .concat()
            .into()
    }
}

fn parse_bytecode(content: &str) -> anyhow::Result<Bytes> {
    let hex = match serde_json::from_str::<Value>(content) {
        Ok(artifact) => match &artifact["bytecode"] {
            Value::String(hex) => hex.clone(),
            Value::Object(obj) => obj
                .get("object")
                .and_then(Value::as_str)
                .context("bytecode.object missing")?
                .to_string(),
            _ => anyhow::bail!("bytecode field missing"),
        },
        Err(_) => content.trim().to_string(),
    };
    let bytecode: Bytes = hex.parse().context("bytecode is not valid hex")?;
    anyhow::ensure!(!bytecode.is_empty(), "bytecode is empty");
    Ok(bytecode)
}

/// Returns the factory address, deploying the factory first when permitted.
///
/// # Arguments
/// * `deployer` - The deterministic deployer
/// * `descriptor` - The factory bytecode and constructor arguments
/// * `funder` - Identity allowed to pay for the deployment. `None` forbids deploying
///
/// # Returns
/// * `Address` - The factory address, with code on chain
/// * `RunOpError::MissingFactory` - No code and no funder
/// * `RunOpError::DeploymentFailure` - The deployment reverted or left no code behind
pub async fn ensure_deployed(
    deployer: &dyn Deployer,
    descriptor: &FactoryDescriptor,
    funder: Option<&dyn Funder>,
) -> Result<Address, RunOpError> {
    let address = deployer.compute_address(descriptor);
    if deployer.is_deployed(address).await? {
        info!("Account factory already deployed at {address:?}");
        return Ok(address);
    }

    let Some(funder) = funder else {
        return Err(RunOpError::MissingFactory { address });
    };

    info!(
        "Deploying account factory to {address:?} from {:?}",
        funder.address()
    );
    let receipt = deployer
        .deploy(descriptor, funder)
        .await
        .map_err(|e| RunOpError::DeploymentFailure(format!("{e:#}")))?;
    if receipt.status == Some(U64::zero()) {
        return Err(RunOpError::DeploymentFailure(format!(
            "transaction {:?} reverted",
            receipt.transaction_hash
        )));
    }
    if !deployer.is_deployed(address).await? {
        return Err(RunOpError::DeploymentFailure(format!(
            "no code at {address:?} after transaction {:?}",
            receipt.transaction_hash
        )));
    }

    info!("Account factory deployed at {address:?}");
    Ok(address)
}
