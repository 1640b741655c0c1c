use std::{
	collections::{BTreeMap, HashMap},
	mem,
	sync::Arc,
	time::Duration,
};

use tokio::{
	runtime::Handle,
	time::{self, Instant},
};

use crate::{
	ComputeBackend, Error, GraphProfile, Result, TaskError, TaskId, Tensor,
	spans::{self, SpanExtraction},
};

/// Conversion from a backend field value into the caller's expected value shape.
pub trait FromTensor
where
	Self: Sized + Send,
{
	/// Human-readable name of the accepted shape, used in mismatch errors.
	const KIND: &'static str;

	fn from_tensor(value: &Tensor) -> Option<Self>;
}
impl FromTensor for String {
	const KIND: &'static str = "text";

	fn from_tensor(value: &Tensor) -> Option<Self> {
		match value {
			Tensor::Bytes(bytes) => spans::decode_utf8(bytes).ok(),
			_ => None,
		}
	}
}
impl FromTensor for Vec<f32> {
	const KIND: &'static str = "float vector";

	fn from_tensor(value: &Tensor) -> Option<Self> {
		match value {
			Tensor::Float(values) => Some(values.clone()),
			_ => None,
		}
	}
}
impl FromTensor for Vec<i64> {
	const KIND: &'static str = "int vector";

	fn from_tensor(value: &Tensor) -> Option<Self> {
		match value {
			Tensor::Int(values) => Some(values.clone()),
			_ => None,
		}
	}
}

/// Per-item result of a dispatched batch, aligned with the input position.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskOutcome<T> {
	Success(T),
	/// The backend reported an error and returned no result payload.
	BackendError(TaskError),
	/// The batch deadline elapsed before this item completed.
	Timeout,
	/// The completion sequence ended without this item.
	Unretrieved,
}
impl<T> TaskOutcome<T> {
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success(_))
	}

	pub fn value(self) -> Option<T> {
		match self {
			Self::Success(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_value(&self) -> Option<&T> {
		match self {
			Self::Success(value) => Some(value),
			_ => None,
		}
	}
}

/// Collapses outcomes into optional values, keeping every position.
pub fn into_values<T>(outcomes: Vec<TaskOutcome<T>>) -> Vec<Option<T>> {
	outcomes.into_iter().map(TaskOutcome::value).collect()
}

/// Submits batches to the compute backend and correlates results back to input order.
///
/// One deadline bounds the wait for the whole batch. Every submitted task is released from the
/// backend exactly once, on success, on timeout, on errors raised while waiting, and when the
/// dispatching future is dropped.
#[derive(Clone, Debug)]
pub struct BatchDispatcher {
	wait_timeout: Duration,
}
impl BatchDispatcher {
	pub fn new(wait_timeout: Duration) -> Self {
		Self { wait_timeout }
	}

	pub fn from_config(cfg: &nlp_config::Compute) -> Self {
		Self::new(Duration::from_secs(cfg.wait_timeout_secs))
	}

	pub fn wait_timeout(&self) -> Duration {
		self.wait_timeout
	}

	/// Runs `items` through the profile's single output field.
	pub async fn dispatch<T>(
		&self,
		items: &[String],
		profile: &GraphProfile,
	) -> Result<Vec<TaskOutcome<T>>>
	where
		T: FromTensor,
	{
		self.dispatch_until(items, profile, Instant::now() + self.wait_timeout).await
	}

	pub async fn dispatch_until<T>(
		&self,
		items: &[String],
		profile: &GraphProfile,
		deadline: Instant,
	) -> Result<Vec<TaskOutcome<T>>>
	where
		T: FromTensor,
	{
		if items.is_empty() {
			return Ok(Vec::new());
		}

		let output_field = profile.output_field()?.to_string();

		run_batch(items, profile, deadline, |result| {
			let value = result
				.get(&output_field)
				.ok_or_else(|| Error::MissingField { field: output_field.clone() })?;

			T::from_tensor(value).ok_or_else(|| Error::OutputShapeMismatch {
				field: output_field.clone(),
				expected: T::KIND,
				found: value.kind(),
			})
		})
		.await
	}

	/// Runs `items` through a span-extraction graph that reports `ranges` and `text`.
	pub async fn extract_spans(
		&self,
		items: &[String],
		profile: &GraphProfile,
	) -> Result<Vec<TaskOutcome<SpanExtraction>>> {
		self.extract_spans_until(items, profile, Instant::now() + self.wait_timeout).await
	}

	pub async fn extract_spans_until(
		&self,
		items: &[String],
		profile: &GraphProfile,
		deadline: Instant,
	) -> Result<Vec<TaskOutcome<SpanExtraction>>> {
		if items.is_empty() {
			return Ok(Vec::new());
		}

		run_batch(items, profile, deadline, spans::decode_spans).await
	}
}

/// Fixed result slots addressed by submission index, with task ids as keys into them.
struct Batch<T> {
	slots: Vec<TaskOutcome<T>>,
	lookup: HashMap<TaskId, usize>,
	resolved: usize,
}
impl<T> Batch<T> {
	fn new(len: usize) -> Self {
		Self {
			slots: (0..len).map(|_| TaskOutcome::Unretrieved).collect(),
			lookup: HashMap::with_capacity(len),
			resolved: 0,
		}
	}

	fn fill(&mut self, ix: usize, outcome: TaskOutcome<T>) {
		if matches!(self.slots[ix], TaskOutcome::Unretrieved) {
			self.resolved += 1;
		}

		self.slots[ix] = outcome;
	}

	fn is_complete(&self) -> bool {
		self.resolved == self.slots.len()
	}

	fn mark_timed_out(&mut self) {
		for slot in &mut self.slots {
			if matches!(slot, TaskOutcome::Unretrieved) {
				*slot = TaskOutcome::Timeout;
			}
		}
	}
}

/// Owns the ids of every submitted task until they are handed back to the backend.
struct ReleaseGuard {
	backend: Arc<dyn ComputeBackend>,
	ids: Vec<TaskId>,
}
impl ReleaseGuard {
	fn new(backend: Arc<dyn ComputeBackend>, capacity: usize) -> Self {
		Self { backend, ids: Vec::with_capacity(capacity) }
	}

	fn track(&mut self, id: TaskId) {
		self.ids.push(id);
	}

	fn ids(&self) -> &[TaskId] {
		&self.ids
	}

	async fn release(&mut self) {
		let ids = mem::take(&mut self.ids);

		release_all(self.backend.as_ref(), &ids).await;
	}
}
impl Drop for ReleaseGuard {
	fn drop(&mut self) {
		if self.ids.is_empty() {
			return;
		}

		let ids = mem::take(&mut self.ids);
		let backend = self.backend.clone();

		match Handle::try_current() {
			Ok(handle) => {
				tracing::warn!(count = ids.len(), "Dispatch abandoned; releasing tasks in background.");

				handle.spawn(async move { release_all(backend.as_ref(), &ids).await });
			},
			Err(_) => {
				tracing::error!(count = ids.len(), "Dispatch abandoned outside a runtime; tasks leaked.");
			},
		}
	}
}

async fn release_all(backend: &dyn ComputeBackend, ids: &[TaskId]) {
	for id in ids {
		if let Err(err) = backend.clear_task(*id).await {
			tracing::warn!(task_id = %id, error = %err, "Failed to release task.");
		}
	}

	tracing::debug!(count = ids.len(), "Released tasks.");
}

async fn run_batch<T, D>(
	items: &[String],
	profile: &GraphProfile,
	deadline: Instant,
	decode: D,
) -> Result<Vec<TaskOutcome<T>>>
where
	T: Send,
	D: Fn(&BTreeMap<String, Tensor>) -> Result<T> + Sync,
{
	let backend = profile.backend();
	let ns = profile.namespace();
	let input_field = profile.input_field()?;
	let mut batch = Batch::new(items.len());
	let mut guard = ReleaseGuard::new(backend.clone(), items.len());

	for (ix, text) in items.iter().enumerate() {
		let inputs = BTreeMap::from([(input_field.to_string(), Tensor::from_text(text))]);

		match backend.enqueue_task(ns, inputs).await {
			Ok(task_id) => {
				tracing::info!(task_id = %task_id, ns = %ns, len = text.len(), "Enqueued task.");

				guard.track(task_id);
				batch.lookup.insert(task_id, ix);
			},
			Err(err) => {
				guard.release().await;

				return Err(err);
			},
		}
	}

	let waited = wait_batch(backend.as_ref(), guard.ids(), deadline, &decode, &mut batch).await;

	guard.release().await;
	waited?;

	Ok(batch.slots)
}

async fn wait_batch<T, D>(
	backend: &dyn ComputeBackend,
	ids: &[TaskId],
	deadline: Instant,
	decode: &D,
	batch: &mut Batch<T>,
) -> Result<()>
where
	T: Send,
	D: Fn(&BTreeMap<String, Tensor>) -> Result<T> + Sync,
{
	let mut completions = match time::timeout_at(deadline, backend.wait_for(ids, deadline)).await {
		Ok(completions) => completions?,
		Err(_) => {
			tracing::warn!(
				pending = ids.len(),
				"Batch deadline elapsed while waiting for the backend."
			);

			batch.mark_timed_out();

			return Ok(());
		},
	};

	while !batch.is_complete() {
		let next = match time::timeout_at(deadline, completions.next()).await {
			Ok(next) => next?,
			Err(_) => break,
		};
		let Some((task_id, response)) = next else {
			break;
		};
		let Some(&ix) = batch.lookup.get(&task_id) else {
			tracing::warn!(task_id = %task_id, "Completion for unknown task ignored.");

			continue;
		};

		if let Some(error) = &response.error {
			tracing::warn!(
				task_id = %task_id,
				code = %error.code,
				ctx = %error.ctx,
				message = %error.message,
				"Task reported an error."
			);
			tracing::debug!(task_id = %task_id, traceback = %error.traceback.join("\n"));
		}

		tracing::info!(
			task_id = %task_id,
			ns = %response.ns,
			status = response.status.as_str(),
			duration_ms = response.duration.as_millis() as u64,
			retries = response.retries,
			"Retrieved task."
		);

		match (response.result, response.error) {
			(Some(result), _) => batch.fill(ix, TaskOutcome::Success(decode(&result)?)),
			(None, Some(error)) => batch.fill(ix, TaskOutcome::BackendError(error)),
			(None, None) => {},
		}
	}

	if !batch.is_complete() && Instant::now() >= deadline {
		tracing::warn!(
			pending = batch.slots.len() - batch.resolved,
			"Batch deadline elapsed before all tasks completed."
		);

		batch.mark_timed_out();
	}

	Ok(())
}
