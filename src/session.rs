//! One diagnostic run: factory, account, funding, then the user operations.

use crate::{
    consts::{DEFAULT_EXECUTION_GAS_BUDGET, DEFAULT_OPERATION_RUNS},
    errors::RunOpError,
    factory::{ensure_deployed, FactoryDescriptor},
    funding::{self, FundingDecision},
    submitter::{OperationSubmitter, SubmittedOperation},
    traits::{AccountApi, BundlerClient, Deployer, Funder, Network},
};
use ethers::{
    types::{Address, Bytes, U256},
    utils::id,
};
use std::sync::Arc;
use tracing::info;

/// The chain-facing services a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub network: Arc<dyn Network>,
    pub deployer: Arc<dyn Deployer>,
    pub funder: Arc<dyn Funder>,
    pub bundler: Arc<dyn BundlerClient>,
}

#[derive(Clone, Debug)]
pub struct RunSettings {
    pub factory: FactoryDescriptor,
    /// Allow deploying the factory when it has no code
    pub deploy_factory: bool,
    /// Gas units the account should be able to pay for
    pub execution_gas_budget: U256,
    /// Contract the operations call. Defaults to the account itself
    pub target: Option<Address>,
    /// Defaults to the `entryPoint()` selector
    pub call_data: Option<Bytes>,
    /// Number of operations submitted one after the other
    pub runs: usize,
}

impl RunSettings {
    pub fn new(factory: FactoryDescriptor) -> Self {
        Self {
            factory,
            deploy_factory: false,
            execution_gas_budget: U256::from(DEFAULT_EXECUTION_GAS_BUDGET),
            target: None,
            call_data: None,
            runs: DEFAULT_OPERATION_RUNS,
        }
    }
}

/// What a successful run did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub account: Address,
    /// Whether the account had code before the run
    pub deployed: bool,
    pub funding: FundingDecision,
    pub operations: Vec<SubmittedOperation>,
}

/// Selector of `entryPoint()`, a view every SimpleAccount answers
pub fn entry_point_selector() -> Bytes {
    Bytes::from(id("entryPoint()").to_vec())
}

/// Runs the whole diagnostic.
///
/// `make_account` is called once with the factory address, only after the factory is known to
/// have code. The bundler is checked after the factory too, so a missing factory is reported
/// first. The first failure ends the run.
pub async fn run<F>(
    collaborators: &Collaborators,
    settings: &RunSettings,
    make_account: F,
) -> Result<RunReport, RunOpError>
where
    F: FnOnce(Address) -> Arc<dyn AccountApi>,
{
    let deploy_funder = settings
        .deploy_factory
        .then(|| collaborators.funder.as_ref());
    let factory = ensure_deployed(
        collaborators.deployer.as_ref(),
        &settings.factory,
        deploy_funder,
    )
    .await?;

    collaborators
        .bundler
        .check_compatible()
        .await
        .map_err(|e| RunOpError::Configuration(format!("{e:#}")))?;

    let account = make_account(factory);
    let address = account.counterfactual_address().await?;
    let deployed = !collaborators.network.get_code(address).await?.is_empty();
    let balance = collaborators.network.get_balance(address).await?;
    info!("account address {address:?} deployed={deployed} balance={balance}");

    let gas_price = collaborators.network.get_gas_price().await?;
    let decision = funding::decide(balance, gas_price, settings.execution_gas_budget);
    funding::fund(collaborators.funder.as_ref(), address, &decision).await?;

    let target = settings.target.unwrap_or(address);
    let call_data = settings
        .call_data
        .clone()
        .unwrap_or_else(entry_point_selector);
    let submitter = OperationSubmitter::new(account.as_ref(), collaborators.bundler.as_ref());
    let mut operations = Vec::with_capacity(settings.runs);
    for run in 1..=settings.runs {
        info!("Submitting user operation {run}/{}", settings.runs);
        operations.push(submitter.submit(target, call_data.clone()).await?);
    }

    Ok(RunReport {
        account: address,
        deployed,
        funding: decision,
        operations,
    })
}
