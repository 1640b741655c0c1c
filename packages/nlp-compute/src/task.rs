use std::{fmt, time::Duration};

use serde::Serialize;
use uuid::Uuid;

/// Opaque handle the backend assigns to one submitted unit of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);
impl TaskId {
	pub fn new(id: Uuid) -> Self {
		Self(id)
	}

	pub fn as_uuid(&self) -> Uuid {
		self.0
	}
}
impl fmt::Display for TaskId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Identifies a graph instance loaded into the backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Namespace(String);
impl Namespace {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		self.0.as_str()
	}
}
impl fmt::Display for Namespace {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A field value as exchanged with the backend.
#[derive(Clone, Debug, PartialEq)]
pub enum Tensor {
	/// UTF-8 text, possibly padded with trailing NUL bytes.
	Bytes(Vec<u8>),
	Float(Vec<f32>),
	Int(Vec<i64>),
	/// Row-major: one inner vector per leading index.
	IntMatrix(Vec<Vec<i64>>),
	ByteMatrix(Vec<Vec<u8>>),
}
impl Tensor {
	pub fn from_text(text: &str) -> Self {
		Self::Bytes(text.as_bytes().to_vec())
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Self::Bytes(_) => "text",
			Self::Float(_) => "float vector",
			Self::Int(_) => "int vector",
			Self::IntMatrix(_) => "int matrix",
			Self::ByteMatrix(_) => "byte matrix",
		}
	}
}

/// Declared dtype and shape of a graph output; `None` marks a variable-length dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputFormat {
	pub dtype: String,
	pub shape: Vec<Option<usize>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
	Init,
	Wait,
	Busy,
	Ready,
	Done,
	Error,
	Unknown,
}
impl TaskStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Init => "init",
			Self::Wait => "wait",
			Self::Busy => "busy",
			Self::Ready => "ready",
			Self::Done => "done",
			Self::Error => "error",
			Self::Unknown => "unknown",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskError {
	pub code: String,
	pub ctx: String,
	pub message: String,
	pub traceback: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct TaskResponse {
	pub ns: Namespace,
	pub status: TaskStatus,
	pub duration: Duration,
	pub retries: u32,
	pub error: Option<TaskError>,
	/// Keyed by output field name.
	pub result: Option<std::collections::BTreeMap<String, Tensor>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueStat {
	pub id: String,
	pub name: String,
	pub queue_length: u64,
	pub listeners: u64,
}
