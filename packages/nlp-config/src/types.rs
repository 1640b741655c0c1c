use std::{collections::BTreeMap, path::PathBuf};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub compute: Compute,
	pub storage: Storage,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Compute {
	/// Directory holding the JSON graph definitions loaded into the compute backend.
	pub graphs_dir: PathBuf,
	/// Upper bound for waiting on one whole batch, not on individual items.
	#[serde(default = "default_wait_timeout_secs")]
	pub wait_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
	pub documents: Documents,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub api_key: Option<String>,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Documents {
	pub pool_max_conns: u32,
	pub blog_dsn: String,
	pub login_dsn: String,
	/// Keyed by the store prefix used in document references, e.g. "solution".
	#[serde(default)]
	pub platforms: BTreeMap<String, Platform>,
}

#[derive(Debug, Deserialize)]
pub struct Platform {
	pub dsn: String,
	pub url_base: String,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
	pub fulltext_capacity: usize,
}
impl Default for Cache {
	fn default() -> Self {
		Self { fulltext_capacity: default_fulltext_capacity() }
	}
}

fn default_wait_timeout_secs() -> u64 {
	300
}

fn default_qdrant_timeout_ms() -> u64 {
	10_000
}

fn default_fulltext_capacity() -> usize {
	100
}
