pub mod cache;
pub mod fulltext;
pub mod ingest;
pub mod sanitize;
pub mod vec;

mod error;

pub use cache::LruCache;
pub use error::{Error, Result};
pub use fulltext::{
	DocumentReference, DocumentResolver, DocumentStore, FullTextCache, Location, ResolveError,
	Tag, TextKey,
};
pub use ingest::{
	AddEmbed, DocumentSnippets, Embedder, QueryEmbed, QueryStatus, add_embeds, query_embeds,
};
pub use sanitize::sanitize;
pub use vec::{
	Collection, DistanceFn, EmbedChunk, Meta, MetaValue, ResultChunk, VecDbStat, VectorStore,
};

use std::{future::Future, pin::Pin};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
