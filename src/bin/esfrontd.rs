//! `esfrontd`: the standalone server binary. Wires the in-memory reference
//! engine collaborators behind `DocumentHandler`, starts the background task
//! janitor, and serves the router.

use std::sync::Arc;

use clap::Parser;
use esfront::config::{CliArgs, ServerConfig};
use esfront::engine::memory::{MemoryDirectoryManager, MemoryIndexManager, MemoryMetadataStore, MemoryScriptEngine};
use esfront::query::SimpleQueryParser;
use esfront::{DocumentHandler, http};

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
		.init();

	let config = CliArgs::parse().apply_to(ServerConfig::default());

	let directories = Arc::new(MemoryDirectoryManager::new());
	let metadata_store = Arc::new(MemoryMetadataStore::new());
	let index_manager = Arc::new(MemoryIndexManager::new());
	let query_parser = Arc::new(SimpleQueryParser::new());
	let script_engine = Arc::new(MemoryScriptEngine::new());

	let state = Arc::new(DocumentHandler::new(
		directories,
		metadata_store,
		index_manager,
		query_parser,
		script_engine,
		config.clone(),
	));

	spawn_task_janitor(state.clone());

	let listener = tokio::net::TcpListener::bind(config.bind_addr)
		.await
		.unwrap_or_else(|e| panic!("failed to bind {}: {e}", config.bind_addr));
	tracing::info!(addr = %config.bind_addr, "esfrontd listening");

	axum::serve(listener, http::router(state))
		.await
		.expect("server error");
}

/// Periodically evicts tasks the client never polled after they finished.
fn spawn_task_janitor(state: Arc<DocumentHandler>) {
	let max_age = state.config.task_max_age();
	tokio::spawn(async move {
		let mut interval = tokio::time::interval(max_age);
		loop {
			interval.tick().await;
			let dropped = state.task_manager.cleanup_old_tasks(max_age);
			if dropped > 0 {
				tracing::debug!(dropped, "swept completed delete-by-query tasks");
			}
		}
	});
}
