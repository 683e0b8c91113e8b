//! # Configuration
//!
//! ## Purpose
//! The typed surface controlling a deployed `esfrontd`: bind address, base
//! data directory, async-task retention, and the default delete-by-query
//! cap. Layered the way this stack's binaries are: `clap`-derived CLI flags
//! override environment-driven defaults, which `serde` can also deserialize
//! from a config file for non-interactive deployments.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
	pub bind_addr: SocketAddr,
	pub data_dir: String,
	/// How long a terminal `DeleteTask` is retained before the background
	/// cleanup loop evicts it.
	pub task_max_age_secs: u64,
	pub delete_by_query_max_docs: usize,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			bind_addr: "127.0.0.1:9200".parse().expect("static address always parses"),
			data_dir: "./data".to_string(),
			task_max_age_secs: 24 * 60 * 60,
			delete_by_query_max_docs: 10_000_000,
		}
	}
}

impl ServerConfig {
	pub fn task_max_age(&self) -> Duration {
		Duration::from_secs(self.task_max_age_secs)
	}
}

/// CLI overrides, merged over `ServerConfig::default()` (or a config file
/// once loaded). Every field is optional so an absent flag falls through to
/// the environment-backed default via `clap`'s `env` attribute.
#[derive(Debug, Parser)]
#[command(name = "esfrontd", about = "Elasticsearch-wire-compatible front-end")]
pub struct CliArgs {
	#[arg(long, env = "ESFRONTD_BIND_ADDR")]
	pub bind_addr: Option<SocketAddr>,

	#[arg(long, env = "ESFRONTD_DATA_DIR")]
	pub data_dir: Option<String>,

	#[arg(long, env = "ESFRONTD_TASK_MAX_AGE_SECS")]
	pub task_max_age_secs: Option<u64>,

	#[arg(long, env = "ESFRONTD_DELETE_BY_QUERY_MAX_DOCS")]
	pub delete_by_query_max_docs: Option<usize>,
}

impl CliArgs {
	pub fn apply_to(self, mut config: ServerConfig) -> ServerConfig {
		if let Some(v) = self.bind_addr {
			config.bind_addr = v;
		}
		if let Some(v) = self.data_dir {
			config.data_dir = v;
		}
		if let Some(v) = self.task_max_age_secs {
			config.task_max_age_secs = v;
		}
		if let Some(v) = self.delete_by_query_max_docs {
			config.delete_by_query_max_docs = v;
		}
		config
	}
}
