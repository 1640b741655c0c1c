use std::{
	collections::{BTreeMap, HashMap},
	fmt,
	str::FromStr,
};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		CollectionInfo, CountPointsBuilder, CreateCollectionBuilder, Distance,
		OptimizersConfigDiffBuilder, PointStruct, Query, QueryPointsBuilder, ScoredPoint,
		UpsertPointsBuilder, Value, VectorParamsBuilder, value::Kind, vectors_config,
	},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nlp_storage::qdrant::QdrantStore;

use crate::{Error, Result};

/// Namespace for name-based point ids.
pub const POINT_NAMESPACE: Uuid = Uuid::from_u128(0x5c349547_396f_47e1_b0fb_22ed665bc112);

const META_PREFIX: &str = "meta:";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceFn {
	#[serde(rename = "cos")]
	Cosine,
	#[serde(rename = "dot")]
	Dot,
	#[serde(rename = "euc")]
	Euclid,
	#[serde(rename = "man")]
	Manhattan,
}
impl DistanceFn {
	pub fn code(self) -> &'static str {
		match self {
			Self::Cosine => "cos",
			Self::Dot => "dot",
			Self::Euclid => "euc",
			Self::Manhattan => "man",
		}
	}

	fn to_qdrant(self) -> Distance {
		match self {
			Self::Cosine => Distance::Cosine,
			Self::Dot => Distance::Dot,
			Self::Euclid => Distance::Euclid,
			Self::Manhattan => Distance::Manhattan,
		}
	}
}
impl FromStr for DistanceFn {
	type Err = Error;

	fn from_str(value: &str) -> Result<Self> {
		match value {
			"cos" => Ok(Self::Cosine),
			"dot" => Ok(Self::Dot),
			"euc" => Ok(Self::Euclid),
			"man" => Ok(Self::Manhattan),
			_ => Err(Error::InvalidDistance { value: value.to_string() }),
		}
	}
}
impl fmt::Display for DistanceFn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.code())
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
	Bool(bool),
	Int(i64),
	Str(String),
}
impl From<MetaValue> for Value {
	fn from(value: MetaValue) -> Self {
		match value {
			MetaValue::Bool(value) => Value::from(value),
			MetaValue::Int(value) => Value::from(value),
			MetaValue::Str(value) => Value::from(value),
		}
	}
}

pub type Meta = BTreeMap<String, MetaValue>;

/// One embedded slice of a document, addressed by `(base, doc_id, chunk_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbedChunk {
	pub base: String,
	pub doc_id: i64,
	pub chunk_id: i64,
	pub embed: Vec<f32>,
	pub url: String,
	pub snippet: String,
	#[serde(default)]
	pub meta: Meta,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultChunk {
	pub score: f32,
	pub vector_id: String,
	pub base: String,
	pub doc_id: i64,
	pub url: String,
	pub snippet: String,
	pub meta: Meta,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VecDbStat {
	pub name: String,
	pub status: String,
	pub count: u64,
}

/// A physical collection: `{name}-{distance}` with a fixed vector size.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection {
	name: String,
	distance: DistanceFn,
	size: u64,
}
impl Collection {
	pub(crate) fn new(name: String, distance: DistanceFn, size: u64) -> Self {
		Self { name, distance, size }
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn distance(&self) -> DistanceFn {
		self.distance
	}

	pub fn size(&self) -> u64 {
		self.size
	}
}

pub fn ensure_valid_name(name: &str) -> Result<&str> {
	if name.is_empty() || name.contains(['-', ':']) {
		return Err(Error::InvalidName { name: name.to_string() });
	}

	Ok(name)
}

pub fn collection_name(name: &str, distance: DistanceFn) -> Result<String> {
	Ok(format!("{}-{}", ensure_valid_name(name)?, distance.code()))
}

pub fn vector_id(base: &str, doc_id: i64, chunk_id: i64) -> String {
	format!("{base}:{doc_id}:{chunk_id}")
}

/// Same identity, same point: re-embedding a chunk overwrites its previous vector.
pub fn point_id(vector_id: &str) -> Uuid {
	Uuid::new_v5(&POINT_NAMESPACE, vector_id.as_bytes())
}

pub struct VectorStore {
	qdrant: QdrantStore,
}
impl VectorStore {
	pub fn new(qdrant: QdrantStore) -> Self {
		Self { qdrant }
	}

	pub fn client(&self) -> &Qdrant {
		&self.qdrant.client
	}

	/// Creates `{name}-{distance}` when absent. A concurrent creator winning the race is not an
	/// error. An existing collection must store vectors of `size` dimensions.
	pub async fn ensure_collection(
		&self,
		name: &str,
		distance: DistanceFn,
		size: u64,
	) -> Result<Collection> {
		let collection = Collection::new(collection_name(name, distance)?, distance, size);

		if self.client().collection_exists(collection.name()).await? {
			return self.load_collection(collection).await;
		}

		tracing::info!(
			collection = collection.name(),
			size,
			distance = %distance,
			"Creating collection."
		);

		let create = CreateCollectionBuilder::new(collection.name())
			.vectors_config(VectorParamsBuilder::new(size, distance.to_qdrant()).on_disk(true))
			.optimizers_config(
				OptimizersConfigDiffBuilder::default()
					.deleted_threshold(0.2)
					.vacuum_min_vector_number(1_000)
					.default_segment_number(0)
					.indexing_threshold(512 * 1_024)
					.flush_interval_sec(60),
			)
			.on_disk_payload(true);

		if let Err(err) = self.client().create_collection(create).await {
			if self.client().collection_exists(collection.name()).await? {
				tracing::info!(
					collection = collection.name(),
					"Collection was created concurrently."
				);

				return self.load_collection(collection).await;
			}

			return Err(err.into());
		}

		Ok(collection)
	}

	pub async fn upsert(&self, collection: &Collection, chunks: &[EmbedChunk]) -> Result<usize> {
		tracing::info!(collection = collection.name(), count = chunks.len(), "Upserting chunks.");

		if chunks.is_empty() {
			return Ok(0);
		}

		let mut points = Vec::with_capacity(chunks.len());

		for chunk in chunks {
			if chunk.embed.len() as u64 != collection.size() {
				return Err(Error::InvalidRequest {
					message: format!(
						"embedding for {} has {} dimensions, collection {} expects {}",
						vector_id(&chunk.base, chunk.doc_id, chunk.chunk_id),
						chunk.embed.len(),
						collection.name(),
						collection.size()
					),
				});
			}

			let (id, payload) = chunk_payload(chunk);

			tracing::debug!(vector_id = %id, dims = chunk.embed.len(), "Prepared point.");

			points.push(PointStruct::new(point_id(&id).to_string(), chunk.embed.clone(), payload));
		}

		self.client()
			.upsert_points(UpsertPointsBuilder::new(collection.name(), points).wait(true))
			.await?;

		Ok(chunks.len())
	}

	/// Nearest neighbours, highest similarity first.
	pub async fn query(
		&self,
		collection: &Collection,
		embed: Vec<f32>,
		limit: u64,
		offset: Option<u64>,
	) -> Result<Vec<ResultChunk>> {
		tracing::info!(collection = collection.name(), limit, ?offset, "Querying collection.");

		let mut search = QueryPointsBuilder::new(collection.name())
			.query(Query::new_nearest(embed))
			.limit(limit)
			.with_payload(true);

		if let Some(offset) = offset {
			search = search.offset(offset);
		}

		let response = self.client().query(search).await?;

		Ok(response.result.into_iter().filter_map(result_chunk).collect())
	}

	/// Status and point count of a physical collection, or `None` when it cannot be read.
	pub async fn stats(&self, collection: &str) -> Option<VecDbStat> {
		let status = match self.collection_status(collection).await {
			Ok(status) => status,
			Err(err) => {
				tracing::warn!(collection, error = %err, "Collection status unavailable.");

				return None;
			},
		};
		let count = match self.client().count(CountPointsBuilder::new(collection).exact(true)).await
		{
			Ok(response) => response.result.map(|result| result.count).unwrap_or_default(),
			Err(err) => {
				tracing::warn!(collection, error = %err, "Collection count unavailable.");

				return None;
			},
		};

		Some(VecDbStat { name: collection.to_string(), status, count })
	}

	/// Stats for every readable collection; unreadable ones are left out.
	pub async fn stats_all(&self, collections: &[String]) -> Vec<VecDbStat> {
		let mut stats = Vec::with_capacity(collections.len());

		for collection in collections {
			if let Some(stat) = self.stats(collection).await {
				stats.push(stat);
			}
		}

		stats
	}

	async fn load_collection(&self, collection: Collection) -> Result<Collection> {
		let info = self.client().collection_info(collection.name()).await?.result;
		let status = info
			.as_ref()
			.map(|info| info.status().as_str_name().to_lowercase())
			.unwrap_or_else(|| "unknown".to_string());

		if let Some(stored) = info.as_ref().and_then(stored_vector_size)
			&& stored != collection.size
		{
			return Err(Error::InvalidRequest {
				message: format!(
					"collection {} stores {stored}-dimensional vectors, requested {}",
					collection.name, collection.size
				),
			});
		}

		tracing::info!(collection = collection.name(), status = %status, "Collection loaded.");

		Ok(collection)
	}

	async fn collection_status(&self, collection: &str) -> Result<String> {
		let info = self.client().collection_info(collection).await?;
		let status = info
			.result
			.map(|result| result.status().as_str_name().to_lowercase())
			.unwrap_or_else(|| "unknown".to_string());

		Ok(status)
	}
}

fn stored_vector_size(info: &CollectionInfo) -> Option<u64> {
	let vectors = info.config.as_ref()?.params.as_ref()?.vectors_config.as_ref()?;

	match vectors.config.as_ref()? {
		vectors_config::Config::Params(params) => Some(params.size),
		vectors_config::Config::ParamsMap(map) => map.map.values().next().map(|params| params.size),
	}
}

fn chunk_payload(chunk: &EmbedChunk) -> (String, Payload) {
	let id = vector_id(&chunk.base, chunk.doc_id, chunk.chunk_id);
	let mut payload = Payload::new();

	payload.insert("vector_id", id.clone());
	payload.insert("doc_id", Value::from(chunk.doc_id));
	payload.insert("base", chunk.base.clone());
	payload.insert("url", chunk.url.clone());
	payload.insert("snippet", chunk.snippet.clone());

	for (key, value) in &chunk.meta {
		payload.insert(format!("{META_PREFIX}{key}"), Value::from(value.clone()));
	}

	(id, payload)
}

fn result_chunk(point: ScoredPoint) -> Option<ResultChunk> {
	let payload = &point.payload;
	let Some(vector_id) = payload_string(payload, "vector_id") else {
		tracing::warn!("Query hit missing vector_id.");

		return None;
	};
	let Some(doc_id) = payload_i64(payload, "doc_id") else {
		tracing::warn!(vector_id = %vector_id, "Query hit missing doc_id.");

		return None;
	};

	Some(ResultChunk {
		score: point.score,
		base: payload_string(payload, "base").unwrap_or_default(),
		doc_id,
		url: payload_string(payload, "url").unwrap_or_default(),
		snippet: payload_string(payload, "snippet").unwrap_or_default(),
		meta: payload_meta(payload),
		vector_id,
	})
}

fn payload_meta(payload: &HashMap<String, Value>) -> Meta {
	payload
		.iter()
		.filter_map(|(key, value)| {
			let key = key.strip_prefix(META_PREFIX)?;
			let value = match value.kind.as_ref()? {
				Kind::StringValue(text) => MetaValue::Str(text.clone()),
				Kind::IntegerValue(number) => MetaValue::Int(*number),
				Kind::BoolValue(flag) => MetaValue::Bool(*flag),
				_ => return None,
			};

			Some((key.to_string(), value))
		})
		.collect()
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(meta: Meta) -> EmbedChunk {
		EmbedChunk {
			base: "solution".to_string(),
			doc_id: 42,
			chunk_id: 3,
			embed: vec![0.1, 0.2],
			url: "https://solutions.example/pad?id=42".to_string(),
			snippet: "Solar kiosks".to_string(),
			meta,
		}
	}

	#[test]
	fn point_ids_are_stable_per_identity() {
		let first = point_id(&vector_id("solution", 42, 3));

		assert_eq!(first, point_id("solution:42:3"));
		assert_ne!(first, point_id(&vector_id("solution", 42, 4)));
		assert_ne!(first, point_id(&vector_id("experiment", 42, 3)));
		assert_eq!(first.get_version_num(), 5);
	}

	#[test]
	fn names_with_separators_are_rejected() {
		assert_eq!(collection_name("main", DistanceFn::Dot).expect("valid name"), "main-dot");

		for name in ["main-1", "main:1", ""] {
			assert!(matches!(
				collection_name(name, DistanceFn::Cosine),
				Err(Error::InvalidName { .. })
			));
		}
	}

	#[test]
	fn distance_codes_parse() {
		for distance in
			[DistanceFn::Cosine, DistanceFn::Dot, DistanceFn::Euclid, DistanceFn::Manhattan]
		{
			assert_eq!(distance.code().parse::<DistanceFn>().expect("valid code"), distance);
		}

		assert!(matches!("l2".parse::<DistanceFn>(), Err(Error::InvalidDistance { .. })));
	}

	#[test]
	fn payload_metadata_survives_a_hit() {
		let meta = Meta::from([
			("lang".to_string(), MetaValue::Str("en".to_string())),
			("rank".to_string(), MetaValue::Int(3)),
			("reviewed".to_string(), MetaValue::Bool(true)),
		]);
		let source = chunk(meta.clone());
		let (id, payload) = chunk_payload(&source);
		let hit = ScoredPoint { payload: payload.into(), score: 0.9, ..Default::default() };
		let result = result_chunk(hit).expect("hit should convert");

		assert_eq!(id, "solution:42:3");
		assert_eq!(result.vector_id, id);
		assert_eq!(result.doc_id, 42);
		assert_eq!(result.base, "solution");
		assert_eq!(result.snippet, "Solar kiosks");
		assert_eq!(result.meta, meta);
	}

	#[test]
	fn non_meta_payload_keys_are_not_metadata() {
		let mut payload: HashMap<String, Value> = chunk_payload(&chunk(Meta::new())).1.into();

		payload.insert("lang".to_string(), Value::from("fr".to_string()));

		assert!(payload_meta(&payload).is_empty());
	}

	#[test]
	fn meta_values_deserialize_untagged() {
		let meta: Meta = serde_json::from_str(r#"{"lang":"en","rank":3,"reviewed":false}"#)
			.expect("meta should parse");

		assert_eq!(meta["lang"], MetaValue::Str("en".to_string()));
		assert_eq!(meta["rank"], MetaValue::Int(3));
		assert_eq!(meta["reviewed"], MetaValue::Bool(false));
	}

	#[test]
	fn stored_vector_size_reads_collection_params() {
		use qdrant_client::qdrant::{CollectionConfig, CollectionParams, VectorParams, VectorsConfig};

		let info = |config: Option<vectors_config::Config>| CollectionInfo {
			config: Some(CollectionConfig {
				params: Some(CollectionParams {
					vectors_config: Some(VectorsConfig { config }),
					..Default::default()
				}),
				..Default::default()
			}),
			..Default::default()
		};
		let params = VectorParams { size: 768, ..Default::default() };

		assert_eq!(
			stored_vector_size(&info(Some(vectors_config::Config::Params(params)))),
			Some(768)
		);
		assert_eq!(stored_vector_size(&info(None)), None);
		assert_eq!(stored_vector_size(&CollectionInfo::default()), None);
	}
}
