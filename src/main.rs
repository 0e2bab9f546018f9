//! Compound v2 Liquidation Bot
//!
//! Polls the Compound subgraph for borrowers, evaluates their health and
//! submits `liquidateBorrow` for eligible accounts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liqbot_api::{PriceSourceRegistry, SubgraphClient};
use liqbot_chain::{create_gas_strategy, ChainClient, RpcChainClient};
use liqbot_core::{
    verify_connectivity, BotSettings, DeploymentConfig, FixedTerms, LiquidationTerms, Liquidator,
    Monitor,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting liquidation bot");

    let deployment = DeploymentConfig::from_env().context("loading deployment configuration")?;
    deployment.log_config();

    let settings = BotSettings::from_env().context("loading bot settings")?;
    settings.log_settings();

    let cancel = CancellationToken::new();
    install_signal_handlers(cancel.clone())?;

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("building http client")?;

    // Chain client
    let pricing = settings
        .gas
        .pricing_model()
        .map_err(anyhow::Error::msg)?;
    let gas_strategy = create_gas_strategy(
        pricing,
        settings.gas.max_gas_price_gwei,
        settings.gas.priority_fee_gwei,
        settings.gas.max_fee_multiplier,
    );
    let chain: Arc<dyn ChainClient> = Arc::new(
        RpcChainClient::connect(deployment.rpc_url.clone(), deployment.signer.clone(), gas_strategy)
            .with_gas_limit(settings.gas_limit)
            .with_receipt_timeout(settings.receipt_timeout()),
    );

    verify_connectivity(chain.as_ref(), deployment.comptroller, &cancel)
        .await
        .context("comptroller connectivity check failed")?;

    if settings.price_check {
        log_reference_prices(http.clone(), &cancel).await;
    }

    // Account source
    let source = Arc::new(
        SubgraphClient::new(http)
            .with_endpoint(settings.subgraph_url.clone())
            .with_page_size(settings.page_size),
    );

    // Executor
    let terms = Arc::new(FixedTerms(LiquidationTerms {
        collateral: deployment.collateral,
        repay_amount: deployment.repay_amount,
    }));
    let executor = Arc::new(Liquidator::new(chain, deployment.market, terms));

    let monitor = Monitor::new(
        source,
        executor,
        settings.health_policy(),
        deployment.update_interval,
    );

    info!("Starting monitor loop...");
    monitor.run(cancel).await;

    info!("Shutdown complete");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,liqbot_core=debug,liqbot_chain=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
fn install_signal_handlers(cancel: CancellationToken) -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if sigterm.recv().await.is_some() {
                info!("Received SIGTERM, initiating shutdown");
                cancel.cancel();
            }
        });
    }

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, initiating shutdown");
            cancel.cancel();
        }
    });

    Ok(())
}

/// Log one quote per reference price provider.
async fn log_reference_prices(client: reqwest::Client, cancel: &CancellationToken) {
    let registry = PriceSourceRegistry::with_defaults(client);
    for result in registry.quote_all(cancel).await {
        match result {
            Ok(quote) => info!(provider = %quote.provider, price = quote.price, "Reference price"),
            Err(e) => warn!(provider = e.provider(), error = %e, "Reference price unavailable"),
        }
    }
}
