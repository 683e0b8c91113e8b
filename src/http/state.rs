//! `DocumentHandler`: the top-level composite every HTTP handler reaches
//! through `State<Arc<DocumentHandler>>`. Owns the process-wide Version
//! Manager and Task Manager directly (never behind an ambient singleton, per
//! the design notes) and the collaborators that wrap each capability
//! interface.

use std::sync::Arc;

use crate::aggregation::AggContext;
use crate::bulk::BulkPipeline;
use crate::config::ServerConfig;
use crate::delete_by_query::{DeleteByQueryExecutor, TaskManager};
use crate::engine::{DirectoryManager, IndexManager, MetadataStore, QueryParser, ScriptEngine};
use crate::index_lifecycle::IndexLifecycleController;
use crate::version::VersionManager;

pub struct DocumentHandler {
	pub controller: IndexLifecycleController,
	pub bulk_pipeline: BulkPipeline,
	pub version_manager: Arc<VersionManager>,
	pub index_manager: Arc<dyn IndexManager>,
	pub query_parser: Arc<dyn QueryParser>,
	pub agg_context: AggContext,
	pub task_manager: TaskManager,
	pub delete_by_query: DeleteByQueryExecutor,
	pub config: ServerConfig,
}

impl DocumentHandler {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		directories: Arc<dyn DirectoryManager>,
		metadata_store: Arc<dyn MetadataStore>,
		index_manager: Arc<dyn IndexManager>,
		query_parser: Arc<dyn QueryParser>,
		script_engine: Arc<dyn ScriptEngine>,
		config: ServerConfig,
	) -> Self {
		let version_manager = Arc::new(VersionManager::new());
		Self {
			controller: IndexLifecycleController::new(
				directories,
				metadata_store,
				index_manager.clone(),
				version_manager.clone(),
			),
			bulk_pipeline: BulkPipeline::new(index_manager.clone(), version_manager.clone()),
			task_manager: TaskManager::new("node1"),
			delete_by_query: DeleteByQueryExecutor::new(index_manager.clone(), version_manager.clone()),
			agg_context: AggContext { script_engine },
			version_manager,
			index_manager,
			query_parser,
			config,
		}
	}
}
