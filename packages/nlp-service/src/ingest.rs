use serde::{Deserialize, Serialize};

use nlp_compute::{BatchDispatcher, GraphProfile};

use crate::{
	Result,
	vec::{Collection, EmbedChunk, Meta, ResultChunk, VectorStore},
};

/// Snippets of one document to embed; each snippet's position is its chunk id.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentSnippets {
	pub base: String,
	pub doc_id: i64,
	pub url: String,
	#[serde(default)]
	pub meta: Meta,
	pub snippets: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AddEmbed {
	pub snippets: usize,
	pub failed: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
	Ok,
	Error,
}

#[derive(Clone, Debug, Serialize)]
pub struct QueryEmbed {
	pub hits: Vec<ResultChunk>,
	pub status: QueryStatus,
}

/// An embedding graph together with the dispatcher that runs it.
pub struct Embedder {
	dispatcher: BatchDispatcher,
	profile: GraphProfile,
}
impl Embedder {
	pub fn new(dispatcher: BatchDispatcher, profile: GraphProfile) -> Self {
		Self { dispatcher, profile }
	}

	pub fn profile(&self) -> &GraphProfile {
		&self.profile
	}

	pub async fn embed(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
		let outcomes = self.dispatcher.dispatch::<Vec<f32>>(texts, &self.profile).await?;

		Ok(nlp_compute::into_values(outcomes))
	}
}

pub async fn add_embeds(
	embedder: &Embedder,
	vectors: &VectorStore,
	collection: &Collection,
	doc: &DocumentSnippets,
) -> Result<AddEmbed> {
	let embeds = embedder.embed(&doc.snippets).await?;
	let (chunks, failed) = build_chunks(doc, embeds);
	let snippets = vectors.upsert(collection, &chunks).await?;

	tracing::info!(
		collection = collection.name(),
		base = %doc.base,
		doc_id = doc.doc_id,
		snippets,
		failed,
		"Embedded document snippets."
	);

	Ok(AddEmbed { snippets, failed })
}

/// Embeds `query` and searches `collection`. Failures are logged and reported as an error status.
pub async fn query_embeds(
	embedder: &Embedder,
	vectors: &VectorStore,
	collection: &Collection,
	query: &str,
	limit: u64,
	offset: Option<u64>,
) -> QueryEmbed {
	let failed = QueryEmbed { hits: Vec::new(), status: QueryStatus::Error };
	let embed = match embedder.embed(&[query.to_string()]).await {
		Ok(mut embeds) => embeds.pop().flatten(),
		Err(err) => {
			tracing::error!(collection = collection.name(), error = %err, "Query embedding failed.");

			return failed;
		},
	};
	let Some(embed) = embed else {
		tracing::warn!(collection = collection.name(), "Query embedding was not produced.");

		return failed;
	};

	match vectors.query(collection, embed, limit, offset).await {
		Ok(hits) => QueryEmbed { hits, status: QueryStatus::Ok },
		Err(err) => {
			tracing::error!(collection = collection.name(), error = %err, "Vector query failed.");

			failed
		},
	}
}

fn build_chunks(doc: &DocumentSnippets, embeds: Vec<Option<Vec<f32>>>) -> (Vec<EmbedChunk>, usize) {
	let mut chunks = Vec::with_capacity(embeds.len());
	let mut failed = 0;

	for (chunk_id, (snippet, embed)) in doc.snippets.iter().zip(embeds).enumerate() {
		let Some(embed) = embed else {
			failed += 1;

			continue;
		};

		chunks.push(EmbedChunk {
			base: doc.base.clone(),
			doc_id: doc.doc_id,
			chunk_id: chunk_id as i64,
			embed,
			url: doc.url.clone(),
			snippet: snippet.clone(),
			meta: doc.meta.clone(),
		});
	}

	(chunks, failed)
}
