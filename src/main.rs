use clap::Parser;
use ledger_monitor::utils::{format_token_amount, index::GAS_DECIMALS};
use ledger_monitor::{MonitorConfig, MonitorPool};
use std::pin::Pin;
use std::time::Duration;
use tracing::{error, info, warn};

/// Watch a Neo ledger node and log every observed change
#[derive(Debug, Parser)]
#[command(name = "ledger-monitor", version)]
struct Args {
	/// JSON-RPC endpoint of the node
	#[arg(long, env = "LEDGER_MONITOR_RPC_URL", default_value = "http://localhost:50012")]
	rpc_url: String,

	/// Address whose NEO and GAS balances are logged on every change
	#[arg(long)]
	address: Option<String>,

	/// Per-request timeout in seconds; requests never time out when omitted
	#[arg(long)]
	request_timeout_secs: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let args = Args::parse();
	let config = MonitorConfig {
		request_timeout: args.request_timeout_secs.map(Duration::from_secs),
		..MonitorConfig::default()
	};

	let pool = MonitorPool::new(config);
	let mut lease = match pool.join(&args.rpc_url) {
		Ok(lease) => lease,
		Err(e) => {
			error!("Failed to start monitor for {}: {}", args.rpc_url, e);
			return;
		}
	};

	info!("Watching {}", lease.url());

	let shutdown = tokio::signal::ctrl_c();
	tokio::pin!(shutdown);

	loop {
		let Some(change) = unless_shutdown(lease.changes().next(), shutdown.as_mut()).await else {
			info!("Shutting down");
			break;
		};
		let Some(height) = change else {
			warn!("Monitor stopped publishing changes");
			break;
		};

		let monitor = lease.monitor();
		info!(
			"Height {} (populated block filter: {})",
			height,
			if monitor.is_population_scan_available() { "available" } else { "unavailable" }
		);
		let Some(address) = &args.address else {
			continue;
		};
		let Some(balances) =
			unless_shutdown(monitor.get_address(address, true), shutdown.as_mut()).await
		else {
			info!("Shutting down");
			break;
		};
		match balances {
			Some(balances) => info!(
				"{}: {} NEO, {} GAS",
				balances.address,
				balances.neo_balance,
				format_token_amount(balances.gas_balance, GAS_DECIMALS)
			),
			None => warn!("Balances of {} unavailable", address),
		}
	}

	lease.dispose();
}

/// Await `work`, or `None` if `shutdown` completes first
async fn unless_shutdown<T, S>(work: impl Future<Output = T>, shutdown: Pin<&mut S>) -> Option<T>
where
	S: Future,
{
	tokio::select! {
		output = work => Some(output),
		_ = shutdown => None,
	}
}
