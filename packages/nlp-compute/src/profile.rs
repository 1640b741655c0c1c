use std::{fs, sync::Arc};

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{ComputeBackend, Error, Namespace, Result};

/// Introspected view of a graph loaded into the backend.
///
/// Input and output field names are read once on construction. The output width needs another
/// backend round-trip, so it is resolved on first use and kept for the profile's lifetime.
pub struct GraphProfile {
	backend: Arc<dyn ComputeBackend>,
	ns: Namespace,
	inputs: Vec<String>,
	outputs: Vec<String>,
	output_width: OnceCell<usize>,
}
impl GraphProfile {
	pub async fn new(backend: Arc<dyn ComputeBackend>, ns: Namespace) -> Result<Self> {
		let inputs = backend.main_inputs(&ns).await?;
		let outputs = backend.main_outputs(&ns).await?;

		tracing::debug!(ns = %ns, ?inputs, ?outputs, "Graph profile loaded.");

		Ok(Self { backend, ns, inputs, outputs, output_width: OnceCell::new() })
	}

	pub async fn load(backend: Arc<dyn ComputeBackend>, definition: &Value) -> Result<Self> {
		let ns = backend.load_graph(definition).await?;

		Self::new(backend, ns).await
	}

	pub fn backend(&self) -> &Arc<dyn ComputeBackend> {
		&self.backend
	}

	pub fn namespace(&self) -> &Namespace {
		&self.ns
	}

	pub fn input_fields(&self) -> &[String] {
		&self.inputs
	}

	pub fn output_fields(&self) -> &[String] {
		&self.outputs
	}

	pub fn input_field(&self) -> Result<&str> {
		match self.inputs.as_slice() {
			[field] => Ok(field.as_str()),
			fields => Err(Error::InvalidGraph {
				message: format!("graph {} must declare one input, found {fields:?}", self.ns),
			}),
		}
	}

	pub fn output_field(&self) -> Result<&str> {
		match self.outputs.as_slice() {
			[field] => Ok(field.as_str()),
			fields => Err(Error::InvalidGraph {
				message: format!("invalid graph outputs for {}: {fields:?}", self.ns),
			}),
		}
	}

	pub async fn output_width(&self) -> Result<usize> {
		let width = self.output_width.get_or_try_init(|| self.resolve_output_width()).await?;

		Ok(*width)
	}

	async fn resolve_output_width(&self) -> Result<usize> {
		let field = self.output_field()?;
		let format = self.backend.output_format(&self.ns, field).await?;

		match format.shape.as_slice() {
			[Some(width)] => Ok(*width),
			[None] => Err(Error::InvalidGraph {
				message: format!("graph {} has variable shape", self.ns),
			}),
			shape => Err(Error::InvalidGraph {
				message: format!("invalid graph output shape: {shape:?}"),
			}),
		}
	}
}

/// Loads `{graphs_dir}/{file_name}` into the backend and profiles it.
pub async fn load_graph(
	cfg: &nlp_config::Compute,
	backend: Arc<dyn ComputeBackend>,
	file_name: &str,
) -> Result<GraphProfile> {
	let path = cfg.graphs_dir.join(file_name);
	let raw = fs::read(&path).map_err(|err| Error::ReadGraph { path: path.clone(), source: err })?;
	let definition: Value = serde_json::from_slice(&raw)
		.map_err(|err| Error::ParseGraph { path: path.clone(), source: err })?;

	tracing::info!(path = %path.display(), "Loading graph definition.");

	GraphProfile::load(backend, &definition).await
}
