use anyhow::{Context, Result};
use aurand_bot::{
    AurandConfig, AurandContract, Broadcaster, ChainReader, CosmosRpc, Oracle, OracleComponents,
    RandomOrgClient, Registration, TxSigner, TxSubmitter, Wallet,
};
use clap::Parser;
use core_logic::{setup_logger, MetricsCollector};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Randomness oracle bot for the aurand contract", long_about = None)]
struct Args {
    /// TOML config file; environment variables fill unset keys
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the hourly log files
    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Write a JSON metrics snapshot to this file periodically
    #[arg(long)]
    export_metrics: Option<PathBuf>,

    /// Seconds between metrics snapshots
    #[arg(long, default_value = "30")]
    metrics_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let _guard = setup_logger(&args.log_dir)?;

    if let Err(e) = run(args).await {
        error!("FAILED: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    // 1. Config
    let config = AurandConfig::load(args.config.as_deref()).context("Invalid configuration")?;

    // 2. Wallet
    let wallet: Arc<dyn TxSigner> = Arc::new(
        Wallet::from_mnemonic(&config.mnemonic, &config.prefix)
            .context("Failed to load wallet")?,
    );
    let bot_address = wallet.address().to_string();

    // 3. Chain connections
    let primary = Arc::new(
        CosmosRpc::connect(&config.endpoint, config.rpc_timeout)
            .await
            .with_context(|| format!("Failed to connect to {}", config.endpoint))?,
    );
    let chain: Arc<dyn ChainReader> = Arc::new(AurandContract::new(
        Arc::clone(&primary),
        config.contract.to_string(),
    ));

    let mut broadcaster = Broadcaster::new(
        config.endpoint.clone(),
        Arc::clone(&primary) as Arc<dyn TxSubmitter>,
    );
    for url in &config.secondary_endpoints {
        let secondary = CosmosRpc::connect(url, config.rpc_timeout)
            .await
            .with_context(|| format!("Failed to connect to secondary endpoint {}", url))?;
        broadcaster = broadcaster.with_secondary(url.clone(), Arc::new(secondary))?;
    }

    // 4. Startup report
    let chain_id = primary.chain_id().await?;
    let height = primary.latest_height().await?;
    let balance = chain.balance(&bot_address, &config.denom).await?;
    info!("------------------------------------------------------------------------------------");
    info!(chain_id = %chain_id, height, "CosmWasm client CONNECTION Success");
    info!("account: {}", bot_address);
    info!("balance: {}{}", balance, config.denom);
    info!(
        endpoints = broadcaster.endpoint_count(),
        gas_price = %config.gas_price,
        gas_wanted = ?config.gas_wanted,
        "Broadcast setup"
    );

    // 5. Registration
    let fee_policy = config.fee_policy();
    Registration {
        chain: chain.as_ref(),
        simulator: primary.as_ref(),
        signer: wallet.as_ref(),
        broadcaster: &broadcaster,
        fee_policy: &fee_policy,
        contract: &config.contract,
    }
    .ensure_registered(&config.moniker, &config.api_key)
    .await?;

    // 6. Oracle
    let provider = Arc::new(RandomOrgClient::new(
        config.provider_url.clone(),
        config.api_key.clone(),
        config.provider_timeout,
    )?);
    let metrics = Arc::new(MetricsCollector::default());

    let components = OracleComponents {
        chain,
        provider,
        simulator: primary,
        signer: wallet,
        broadcaster,
        fee_policy,
        contract: config.contract.clone(),
        metrics: Arc::clone(&metrics),
    };
    let mut oracle = Oracle::bootstrap(components, config.oracle_settings()).await?;

    // 7. Shutdown + metrics export
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Received Ctrl+C. Finishing current cycle...");
                signal_token.cancel();
            }
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    if let Some(path) = args.export_metrics.clone() {
        spawn_metrics_exporter(
            Arc::clone(&metrics),
            path,
            Duration::from_secs(args.metrics_interval.max(1)),
            token.clone(),
        );
    }

    oracle.run(token).await?;

    let snapshot = metrics.snapshot();
    info!(
        "Total cycles: {} | Fulfilled: {} | Failed: {} | Resyncs: {} | Success Rate: {:.2}%",
        snapshot.cycles.total,
        snapshot.cycles.fulfilled,
        snapshot.cycles.failed,
        snapshot.cycles.resyncs,
        snapshot.cycles.success_rate
    );
    for status in oracle.broadcaster().endpoint_health() {
        info!(
            endpoint = %status.label,
            url = %status.url,
            healthy = status.healthy,
            successes = status.success_count,
            failures = status.failure_count,
            "Endpoint summary"
        );
    }

    if let Some(path) = args.export_metrics {
        export_metrics(&metrics, &path).await;
    }
    Ok(())
}

fn spawn_metrics_exporter(
    metrics: Arc<MetricsCollector>,
    path: PathBuf,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => export_metrics(&metrics, &path).await,
            }
        }
    });
}

async fn export_metrics(metrics: &MetricsCollector, path: &std::path::Path) {
    let path_str = path.to_string_lossy();
    if let Err(e) = metrics.export_to_file(&path_str).await {
        warn!(path = %path_str, error = %e, "Failed to export metrics");
    }
}
