//! cairn command line.
//!
//! Starts a single-node cluster seeded from configuration, runs one command
//! through the master gate and prints the resulting state as JSON.

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use cairn_cluster::{
	AcceptAllValidator, CairnConfig, ClusterService, ClusterState, DeleteWarmerAction, DeleteWarmerRequest, PutWarmerAction, PutWarmerRequest, StatePublisher,
	execute_master_action,
};
use clap::Parser;
use tracing::info;

mod cli;

use cli::{Cli, Command};

/// Logs every committed state.
struct LogPublisher;

impl StatePublisher for LogPublisher {
	fn publish(&self, state: &Arc<ClusterState>) {
		info!(version = state.version(), indices = state.metadata().len(), "cluster.state.published");
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Cli::parse();

	let subscriber = tracing_subscriber::fmt()
		.with_max_level(if args.verbose {
			tracing::Level::DEBUG
		} else {
			tracing::Level::INFO
		})
		.with_writer(std::io::stderr)
		.finish();
	tracing::subscriber::set_global_default(subscriber)?;

	let config = match &args.config {
		Some(path) => CairnConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
		None => CairnConfig::default(),
	};

	let cluster = ClusterService::from_config(&config).context("seeding cluster")?;
	cluster.add_publisher(Arc::new(LogPublisher));
	info!(node = %config.node.name, indices = config.indices.len(), "cairn started");

	let outcome = run(&cluster, &config, args.command).await;
	cluster.shutdown(config.queue.shutdown_timeout()).await;
	outcome?;

	let json = serde_json::to_string_pretty(&cluster.state().to_value())?;
	println!("{json}");
	Ok(())
}

async fn run(cluster: &ClusterService, config: &CairnConfig, command: Command) -> anyhow::Result<()> {
	match command {
		Command::Show => {}
		Command::PutWarmer { name, indices, types, source } => {
			let action = PutWarmerAction::new(cluster.clone(), Arc::new(AcceptAllValidator))
				.validation_timeout(config.validation.timeout())
				.commit_timeout(config.queue.commit_timeout());
			let mut request = PutWarmerRequest::new(name).indices(indices).types(types);
			request.source = source.map(Bytes::from);
			let response = execute_master_action(&action, request).await.context("put warmer")?;
			info!(acknowledged = response.acknowledged, "put warmer done");
		}
		Command::DeleteWarmer { name, indices } => {
			let action = DeleteWarmerAction::new(cluster.clone()).commit_timeout(config.queue.commit_timeout());
			let response = execute_master_action(&action, DeleteWarmerRequest::new(indices, name))
				.await
				.context("delete warmer")?;
			info!(acknowledged = response.acknowledged, "delete warmer done");
		}
	}
	Ok(())
}
