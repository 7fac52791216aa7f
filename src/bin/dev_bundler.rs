use clap::Parser;
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::FmtSubscriber;
use userop_diag::{
    bundler::{run_until_ctrl_c, start_dev_bundler, DevBundler},
    config::DevBundlerOpts,
    network::NetworkContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let opts = DevBundlerOpts::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(opts.get_log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = NetworkContext::connect(&opts.network).await?;
    let key_file = opts.mnemonic.as_ref().map(|p| p.to_path_buf());
    let funder = ctx.resolve_funder(key_file.as_deref()).await?;
    info!("Bundling with beneficiary {:?}", funder.address());

    let bundler = DevBundler::new(ctx.provider.clone(), opts.entry_point, ctx.chain_id, funder);
    let (_, handle) = start_dev_bundler(opts.addr, bundler).await?;

    let stopped = handle.clone();
    run_until_ctrl_c::<_, anyhow::Error>(async move {
        stopped.stopped().await;
        Ok(())
    })
    .await?;
    handle.stop()?;
    info!("Dev bundler stopped");

    Ok(())
}
