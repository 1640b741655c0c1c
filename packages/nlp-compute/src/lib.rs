pub mod dispatch;
pub mod profile;
pub mod spans;
pub mod task;

mod error;

pub use dispatch::{BatchDispatcher, FromTensor, TaskOutcome, into_values};
pub use error::{Error, Result};
pub use profile::{GraphProfile, load_graph};
pub use spans::SpanExtraction;
pub use task::{
	Namespace, OutputFormat, QueueStat, TaskError, TaskId, TaskResponse, TaskStatus, Tensor,
};

use std::{collections::BTreeMap, future::Future, pin::Pin};

use serde_json::Value;
use tokio::time::Instant;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The asynchronous graph execution engine the dispatcher submits work to.
///
/// Scheduling, retries and worker placement live behind this boundary. `clear_task` must be
/// idempotent.
pub trait ComputeBackend
where
	Self: Send + Sync,
{
	fn load_graph<'a>(&'a self, definition: &'a Value) -> BoxFuture<'a, Result<Namespace>>;

	fn main_inputs<'a>(&'a self, ns: &'a Namespace) -> BoxFuture<'a, Result<Vec<String>>>;

	fn main_outputs<'a>(&'a self, ns: &'a Namespace) -> BoxFuture<'a, Result<Vec<String>>>;

	fn output_format<'a>(
		&'a self,
		ns: &'a Namespace,
		field: &'a str,
	) -> BoxFuture<'a, Result<OutputFormat>>;

	fn enqueue_task<'a>(
		&'a self,
		ns: &'a Namespace,
		inputs: BTreeMap<String, Tensor>,
	) -> BoxFuture<'a, Result<TaskId>>;

	fn wait_for<'a>(
		&'a self,
		ids: &'a [TaskId],
		deadline: Instant,
	) -> BoxFuture<'a, Result<Box<dyn Completions + 'a>>>;

	fn clear_task<'a>(&'a self, id: TaskId) -> BoxFuture<'a, Result<()>>;

	fn queue_stats<'a>(&'a self) -> BoxFuture<'a, Result<Vec<QueueStat>>>;
}

/// Lazily yields completions in arrival order. `None` ends the sequence.
pub trait Completions
where
	Self: Send,
{
	fn next<'a>(&'a mut self) -> BoxFuture<'a, Result<Option<(TaskId, TaskResponse)>>>;
}

/// Queue statistics for operators; a backend fault degrades to an empty listing.
pub async fn queue_stats(backend: &dyn ComputeBackend) -> Vec<QueueStat> {
	match backend.queue_stats().await {
		Ok(stats) => stats,
		Err(err) => {
			tracing::error!(error = %err, "Queue stats lookup failed.");

			Vec::new()
		},
	}
}
