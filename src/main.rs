use clap::Parser;
use dotenv::dotenv;
use ethers::{
    signers::{LocalWallet, Signer},
    types::U256,
};
use std::{process::ExitCode, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;
use userop_diag::{
    account::SimpleAccountApi,
    bundler::{start_dev_bundler, DevBundler},
    config::Opts,
    deployer::Create2Deployer,
    errors::RunOpError,
    factory::FactoryDescriptor,
    network::NetworkContext,
    session::{self, Collaborators, RunReport, RunSettings},
    traits::AccountApi,
    utils::unix_millis,
    UserOpMiddleware,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let opts = Opts::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(opts.get_log_level())
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("cannot install the logger: {e}");
    }

    match run(opts).await {
        Ok(report) => {
            println!(
                "account {:?} (deployed before run: {}, funded: {})",
                report.account, report.deployed, report.funding.should_fund
            );
            for op in report.operations {
                println!("userOpHash {} txid={:?}", op.hash, op.transaction);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: Opts) -> Result<RunReport, RunOpError> {
    let ctx = NetworkContext::connect(&opts.network).await?;
    let key_file = opts.mnemonic.as_ref().map(|p| p.to_path_buf());
    let funder = ctx.resolve_funder(key_file.as_deref()).await?;

    let descriptor =
        FactoryDescriptor::from_artifact(&opts.factory_artifact.to_path_buf(), opts.entry_point)
            .map_err(|e| RunOpError::Configuration(format!("{e:#}")))?;
    let owner: LocalWallet = opts
        .owner_key
        .parse()
        .map_err(|e| RunOpError::Configuration(format!("invalid --owner-key: {e}")))?;
    let index = opts.nonce.unwrap_or_else(unix_millis);
    info!("Account owner {:?}, index {index}", owner.address());

    let mut bundler_url = opts.bundler_url.clone();
    let dev_bundler = if opts.self_bundler {
        let bundler = DevBundler::new(
            ctx.provider.clone(),
            opts.entry_point,
            ctx.chain_id,
            funder.clone(),
        );
        let (addr, handle) = start_dev_bundler(opts.self_bundler_addr, bundler).await?;
        bundler_url = format!("http://{addr}");
        Some(handle)
    } else {
        None
    };

    let bundler =
        UserOpMiddleware::new(ctx.provider.as_ref().clone(), opts.entry_point, bundler_url);

    let collaborators = Collaborators {
        network: Arc::new(ctx.clone()),
        deployer: Arc::new(Create2Deployer::new(ctx.provider.clone())?),
        funder,
        bundler: Arc::new(bundler),
    };
    let settings = RunSettings {
        deploy_factory: opts.deploy_factory,
        execution_gas_budget: U256::from(opts.gas_budget),
        ..RunSettings::new(descriptor)
    };

    let provider = ctx.provider.clone();
    let (chain_id, entry_point) = (ctx.chain_id, opts.entry_point);
    let report = session::run(&collaborators, &settings, move |factory| {
        Arc::new(SimpleAccountApi::new(
            provider,
            chain_id,
            entry_point,
            factory,
            owner,
            U256::from(index),
        )) as Arc<dyn AccountApi>
    })
    .await;

    if let Some(handle) = dev_bundler {
        if handle.stop().is_err() {
            warn!("dev bundler already stopped");
        }
    }
    report
}
