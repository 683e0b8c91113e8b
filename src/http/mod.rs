//! # HTTP Front End
//!
//! ## Purpose
//! Wires every other module behind an Elasticsearch-compatible REST surface.
//! Each handler module is a thin translation layer: extract, call one
//! collaborator on `DocumentHandler`, shape the JSON response. No handler
//! contains business logic of its own.
//!
//! ## Routes
//! See the route table in the design notes; this module's only job is making
//! the axum `Router` match it exactly.

pub mod bulk;
pub mod delete_by_query;
pub mod health;
pub mod indices;
pub mod search;
pub mod state;
pub mod tasks;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};

use state::DocumentHandler;

pub fn router(state: Arc<DocumentHandler>) -> Router {
	Router::new()
		.route("/_ping", get(health::ping))
		.route("/_cluster/health", get(health::cluster_health))
		.route("/_cluster/state", get(health::cluster_state))
		.route("/_cluster/stats", get(health::cluster_stats))
		.route("/_nodes", get(health::nodes))
		.route("/_cat/indices", get(health::cat_indices))
		.route("/_cat/nodes", get(health::cat_nodes))
		.route("/_cat/shards", get(health::cat_shards))
		.route("/_bulk", post(bulk::bulk_no_index))
		.route("/_msearch", post(search::msearch))
		.route("/_aliases", post(indices::post_aliases))
		.route("/_alias", get(indices::get_alias))
		.route("/_alias/{alias}", get(indices::get_alias_named))
		.route("/_tasks/{id}", get(tasks::get_task))
		.route("/_tasks/{id}/_cancel", post(tasks::cancel_task))
		.route("/_settings", get(indices::get_all_settings))
		.route(
			"/{index}",
			put(indices::create_index)
				.get(indices::get_index)
				.head(indices::head_index)
				.delete(indices::delete_index),
		)
		.route("/{index}/_bulk", post(bulk::bulk_with_index))
		.route("/{index}/_search", post(search::search_post).get(search::search_get))
		.route("/{index}/_delete_by_query", post(delete_by_query::delete_by_query))
		.route("/{index}/_mapping", get(indices::get_mapping).put(indices::update_mapping))
		.route(
			"/{index}/_settings",
			get(indices::get_settings).put(indices::update_settings),
		)
		.route("/{index}/_close", post(indices::close_index))
		.route("/{index}/_open", post(indices::open_index))
		.route("/{index}/_refresh", post(indices::refresh_index))
		.route("/{index}/_flush", post(indices::flush_index))
		.route("/{index}/_forcemerge", post(indices::force_merge_index))
		.route(
			"/{index}/_alias/{alias}",
			put(indices::put_alias).delete(indices::delete_alias).get(indices::get_index_alias),
		)
		.with_state(state)
}
