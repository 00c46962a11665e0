//! feed-sync CLI
//!
//! Connects accounts to the transaction provider, runs syncs and inspects stored transactions.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bank_feed_sync::config::{LogFormat, Settings};
use bank_feed_sync::connect::ConnectionService;
use bank_feed_sync::provider::{MockProvider, ProviderApi, ProviderClient};
use bank_feed_sync::storage::Store;
use bank_feed_sync::sync::{SyncConfig, SyncEngine};
use bank_feed_sync::utils::format_minor_units;
use bank_feed_sync::vault::TokenVault;

#[derive(Parser)]
#[command(name = "feed-sync")]
#[command(version, about = "Synchronize bank transaction feeds into a local store")]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	/// Database file (overrides database_path)
	#[arg(long, global = true)]
	database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
	/// Complete an OAuth connection with an authorization code
	Connect {
		/// Local account identifier
		account_id: String,
		/// Authorization code returned by the provider
		#[arg(long)]
		code: String,
	},

	/// Sync an account's transactions from its checkpoint
	Sync {
		account_id: String,
		/// Ask the provider to simulate rate limiting
		#[arg(long)]
		rate_limit_probe: bool,
	},

	/// List stored transactions, newest first
	Transactions {
		account_id: String,
		#[arg(long, default_value_t = 20)]
		limit: usize,
	},
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	let cli = Cli::parse();
	let mut settings = Settings::load().context("Failed to load settings")?;
	if let Some(database) = cli.database {
		settings.database_path = database;
	}
	init_tracing(&settings)?;

	let store = Arc::new(
		Store::open(&settings.database_path)
			.with_context(|| format!("Failed to open {}", settings.database_path.display()))?,
	);

	match cli.command {
		Commands::Connect { account_id, code } => {
			let service = ConnectionService::new(
				build_provider(&settings)?,
				store,
				TokenVault::new(&settings.token_key),
				provider_name(&settings),
			);
			let summary = service.complete(&account_id, &code).await?;
			println!(
				"Connected {} to {} (refresh token: {}, expires: {})",
				summary.account_id,
				summary.provider,
				if summary.has_refresh_token { "yes" } else { "no" },
				summary
					.expires_at
					.map(|at| at.to_rfc3339())
					.unwrap_or_else(|| "unknown".to_string())
			);
		}
		Commands::Sync {
			account_id,
			rate_limit_probe,
		} => {
			let engine = SyncEngine::new(
				build_provider(&settings)?,
				store,
				TokenVault::new(&settings.token_key),
				SyncConfig {
					max_rate_limit_retries: settings.rate_limit_max_retries,
				},
			);
			let stats = engine
				.run_sync(&account_id, rate_limit_probe)
				.await
				.with_context(|| format!("Sync of account {} failed", account_id))?;
			println!("{}", serde_json::to_string_pretty(&stats)?);
		}
		Commands::Transactions { account_id, limit } => {
			let records = store.list_transactions(&account_id, limit)?;
			if records.is_empty() {
				println!("No transactions stored for {}", account_id);
			}
			for record in records {
				println!(
					"{}  {:>14}  {:<8}  {}  {}",
					record.posted_at.format("%Y-%m-%d %H:%M"),
					format_minor_units(record.amount, &record.currency),
					record.status.as_deref().unwrap_or("-"),
					record.provider_txn_id,
					record.description.as_deref().unwrap_or("")
				);
			}
		}
	}

	Ok(())
}

fn init_tracing(settings: &Settings) -> Result<()> {
	let filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&settings.log_level))
		.context("Invalid log level")?;

	let builder = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_writer(std::io::stderr);

	match settings.log_format {
		LogFormat::Json => builder.json().init(),
		LogFormat::Pretty => builder.with_timer(tracing_subscriber::fmt::time::time()).init(),
	}
	Ok(())
}

fn provider_name(settings: &Settings) -> &str {
	if settings.provider_base_url.is_some() {
		"remote"
	} else {
		"mock"
	}
}

fn build_provider(settings: &Settings) -> Result<Arc<dyn ProviderApi>> {
	match &settings.provider_base_url {
		Some(base_url) => {
			info!("Using provider at {}", base_url);
			let client = ProviderClient::new(
				base_url.clone(),
				settings.provider_client_id.clone(),
				settings.provider_client_secret.clone(),
				settings.http_timeout(),
			)?;
			Ok(Arc::new(client))
		}
		None => {
			info!("No provider_base_url configured, using the mock provider");
			Ok(Arc::new(MockProvider::with_client_credentials(
				&settings.provider_client_id,
				&settings.provider_client_secret,
			)))
		}
	}
}
