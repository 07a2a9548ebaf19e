use anyhow::{Context, Result};
use checkout::Payment;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod forward;
mod providers;
mod routes;

use config::GatewayConfig;
use forward::Forwarder;

#[derive(Parser)]
#[command(name = "checkout-gateway")]
#[command(about = "Payment notification gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve webhooks for every configured provider
    Serve,
    /// Print a payment link
    Link {
        /// Provider name, e.g. payeer
        provider: String,
        #[arg(long)]
        id: String,
        #[arg(long)]
        amount: String,
        #[arg(long, default_value = checkout::RUB)]
        currency: String,
        #[arg(long, default_value = "")]
        comment: String,
        #[arg(long, default_value = "")]
        success_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "checkout=debug,checkout_gateway=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = GatewayConfig::load()?;
    let checkouts = providers::configured(&config);

    match cli.command {
        Commands::Serve => {
            if checkouts.is_empty() {
                tracing::warn!("No provider configured, only /health is served");
            }

            let callback = Arc::new(Forwarder::new(
                config.forward_url.clone(),
                config.forward_token.clone(),
            ));
            let app = routes::router(&checkouts, callback);

            let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
            tracing::info!("Gateway listening on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {}", addr))?;
            axum::serve(listener, app).await?;
        }
        Commands::Link {
            provider,
            id,
            amount,
            currency,
            comment,
            success_url,
        } => {
            let checkout = providers::find(&checkouts, &provider)
                .with_context(|| format!("provider {} is not configured", provider))?;

            let mut payment = Payment::new(id, amount, currency);
            payment.comment = comment;
            payment.success_url = success_url;

            let url = checkout
                .request(&payment)
                .await
                .with_context(|| format!("requesting {} payment link", provider))?;
            println!("{}", url);
        }
    }

    Ok(())
}
