use std::time::Duration;

use crate::Result;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
}
impl QdrantStore {
	pub fn new(cfg: &nlp_config::Qdrant) -> Result<Self> {
		let mut builder = qdrant_client::Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms));

		if let Some(api_key) = &cfg.api_key {
			builder = builder.api_key(api_key.clone());
		}

		let client = builder.build()?;

		tracing::info!(url = %cfg.url, "Qdrant client configured.");

		Ok(Self { client })
	}
}
