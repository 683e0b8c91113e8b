//! Literal single-node stubs: `_ping`, `_cluster/*`, `_nodes`, `_cat/*`. None
//! of these reach the core subsystems; they exist only so tooling built
//! against a real ES cluster (Kibana, log shippers) doesn't choke on a
//! missing endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::http::state::DocumentHandler;

pub async fn ping() -> StatusCode {
	StatusCode::OK
}

pub async fn cluster_health() -> Json<Value> {
	Json(json!({
		"cluster_name": "esfront",
		"status": "green",
		"timed_out": false,
		"number_of_nodes": 1,
		"number_of_data_nodes": 1,
		"active_primary_shards": 0,
		"active_shards": 0,
		"relocating_shards": 0,
		"initializing_shards": 0,
		"unassigned_shards": 0,
	}))
}

pub async fn cluster_state(State(state): State<Arc<DocumentHandler>>) -> Json<Value> {
	let indices = state.controller.list_indices().await;
	Json(json!({
		"cluster_name": "esfront",
		"version": 1,
		"metadata": { "indices": indices },
	}))
}

pub async fn cluster_stats() -> Json<Value> {
	Json(json!({
		"cluster_name": "esfront",
		"status": "green",
		"nodes": { "count": { "total": 1 } },
	}))
}

pub async fn nodes() -> Json<Value> {
	Json(json!({ "nodes": { "node1": { "name": "node1", "roles": ["master", "data"] } } }))
}

pub async fn cat_indices(State(state): State<Arc<DocumentHandler>>) -> String {
	state
		.controller
		.list_indices()
		.await
		.into_iter()
		.map(|name| format!("green open {name} 1 1 0 0 0b 0b\n"))
		.collect()
}

pub async fn cat_nodes() -> String {
	"127.0.0.1 1 1 d node1\n".to_string()
}

pub async fn cat_shards(State(state): State<Arc<DocumentHandler>>) -> String {
	state
		.controller
		.list_indices()
		.await
		.into_iter()
		.map(|name| format!("{name} 0 p STARTED 0 0b 127.0.0.1 node1\n"))
		.collect()
}
