use std::{fmt, str::FromStr, sync::Arc};

use uuid::Uuid;

use nlp_storage::{
	db::DocStores,
	docs,
	models::{ArticleRow, ArticleTextRow, PadRow, UserRow},
};

use crate::{BoxFuture, cache::LruCache, sanitize::sanitize};

pub const BLOG_STORE: &str = "blog";
pub const USERS_TAG_SOURCE: &str = "retrieved from users.iso3";
pub const ARTICLES_TAG_SOURCE: &str = "retrieved from articles.iso3";

// Publication states at or below this value are drafts (pads) or hidden (articles).
const UNPUBLISHED_MAX: i32 = 1;

pub type FullTextCache = LruCache<TextKey, String>;

/// Why a document could not be resolved. `Display` is the reason reported to callers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
	#[error("invalid reference {reference:?}: {reason}")]
	Parse { reference: String, reason: String },
	#[error("unknown base='{store}'")]
	UnknownStore { store: String },
	#[error("could not find doc_id={doc_id}")]
	NotFound { doc_id: i64 },
	#[error("could not find user_id={user_id}")]
	UserNotFound { user_id: String },
	#[error("pad is unpublished")]
	Unpublished,
	#[error("article not relevant")]
	NotRelevant,
	#[error("empty content")]
	EmptyContent,
	#[error("storage failure: {message}")]
	Storage { message: String },
}
impl From<nlp_storage::Error> for ResolveError {
	fn from(err: nlp_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

/// `{store}:{doc_id}`, the address of one document across every backing store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DocumentReference {
	store: String,
	doc_id: i64,
}
impl DocumentReference {
	pub fn new(store: impl Into<String>, doc_id: i64) -> Self {
		Self { store: store.into(), doc_id }
	}

	pub fn store(&self) -> &str {
		&self.store
	}

	pub fn doc_id(&self) -> i64 {
		self.doc_id
	}
}
impl FromStr for DocumentReference {
	type Err = ResolveError;

	fn from_str(reference: &str) -> Result<Self, Self::Err> {
		let parse_error = |reason: String| ResolveError::Parse {
			reference: reference.to_string(),
			reason,
		};
		let parts = reference.split(':').collect::<Vec<_>>();
		let [store, doc_id] = parts.as_slice() else {
			return Err(parse_error(format!("expected 2 parts, found {}", parts.len())));
		};
		let doc_id = doc_id
			.trim()
			.parse::<i64>()
			.map_err(|err| parse_error(format!("invalid doc id: {err}")))?;

		Ok(Self::new(store.trim(), doc_id))
	}
}
impl fmt::Display for DocumentReference {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.store, self.doc_id)
	}
}

/// Cache key for resolved text. The flags change the text, so they are part of the key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextKey {
	pub reference: DocumentReference,
	pub combine_title: bool,
	pub ignore_unpublished: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
	pub url: String,
	pub title: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tag {
	pub value: Option<String>,
	/// Where the value was read from.
	pub source: &'static str,
}

/// Row access for every document store a reference can route to.
pub trait DocumentStore
where
	Self: Send + Sync,
{
	fn has_platform(&self, store: &str) -> bool;

	fn platform_url_base(&self, store: &str) -> Option<&str>;

	fn pad<'a>(
		&'a self,
		store: &'a str,
		doc_id: i64,
	) -> BoxFuture<'a, nlp_storage::Result<Option<PadRow>>>;

	fn article<'a>(&'a self, doc_id: i64) -> BoxFuture<'a, nlp_storage::Result<Option<ArticleRow>>>;

	fn article_text<'a>(
		&'a self,
		doc_id: i64,
	) -> BoxFuture<'a, nlp_storage::Result<Option<ArticleTextRow>>>;

	fn user<'a>(&'a self, user_id: Uuid) -> BoxFuture<'a, nlp_storage::Result<Option<UserRow>>>;
}
impl DocumentStore for DocStores {
	fn has_platform(&self, store: &str) -> bool {
		self.platforms.contains_key(store)
	}

	fn platform_url_base(&self, store: &str) -> Option<&str> {
		self.platforms.get(store).map(|platform| platform.url_base.as_str())
	}

	fn pad<'a>(
		&'a self,
		store: &'a str,
		doc_id: i64,
	) -> BoxFuture<'a, nlp_storage::Result<Option<PadRow>>> {
		Box::pin(async move {
			let platform = self.platform(store)?;

			docs::get_pad(&platform.db.pool, doc_id).await
		})
	}

	fn article<'a>(&'a self, doc_id: i64) -> BoxFuture<'a, nlp_storage::Result<Option<ArticleRow>>> {
		Box::pin(async move { docs::get_article(&self.blog.pool, doc_id).await })
	}

	fn article_text<'a>(
		&'a self,
		doc_id: i64,
	) -> BoxFuture<'a, nlp_storage::Result<Option<ArticleTextRow>>> {
		Box::pin(async move { docs::get_article_text(&self.blog.pool, doc_id).await })
	}

	fn user<'a>(&'a self, user_id: Uuid) -> BoxFuture<'a, nlp_storage::Result<Option<UserRow>>> {
		Box::pin(async move { docs::get_user(&self.login.pool, user_id).await })
	}
}

enum Route<'a> {
	Pad(&'a str),
	Blog,
}

/// Maps document references to text, location and tag through the owning store.
///
/// Only successful text lookups are cached; failures are looked up again on every call since
/// publication state can change.
#[derive(Clone)]
pub struct DocumentResolver {
	store: Arc<dyn DocumentStore>,
	cache: Arc<FullTextCache>,
}
impl DocumentResolver {
	pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<FullTextCache>) -> Self {
		Self { store, cache }
	}

	pub fn cache(&self) -> &FullTextCache {
		&self.cache
	}

	pub async fn resolve_text(
		&self,
		reference: &str,
		combine_title: bool,
		ignore_unpublished: bool,
	) -> Result<String, ResolveError> {
		let key = TextKey { reference: reference.parse()?, combine_title, ignore_unpublished };

		if let Some(text) = self.cache.get(&key) {
			tracing::debug!(reference = %key.reference, "Full text cache hit.");

			return Ok(text);
		}

		let text = match self.route(&key.reference)? {
			Route::Pad(store) =>
				self.read_pad(store, key.reference.doc_id(), combine_title, ignore_unpublished).await,
			Route::Blog =>
				self.read_blog(key.reference.doc_id(), combine_title, ignore_unpublished).await,
		};
		let text = log_failure(&key.reference, "text", text)?;

		self.cache.insert(key, text.clone());

		Ok(text)
	}

	pub async fn resolve_location(
		&self,
		reference: &str,
		ignore_unpublished: bool,
	) -> Result<Location, ResolveError> {
		let reference: DocumentReference = reference.parse()?;
		let location = match self.route(&reference)? {
			Route::Pad(store) => self.pad_location(store, reference.doc_id(), ignore_unpublished).await,
			Route::Blog => self.blog_location(reference.doc_id(), ignore_unpublished).await,
		};

		log_failure(&reference, "location", location)
	}

	pub async fn resolve_tag(
		&self,
		reference: &str,
		ignore_unpublished: bool,
	) -> Result<Tag, ResolveError> {
		let reference: DocumentReference = reference.parse()?;
		let tag = match self.route(&reference)? {
			Route::Pad(store) => self.pad_tag(store, reference.doc_id(), ignore_unpublished).await,
			Route::Blog => self.blog_tag(reference.doc_id(), ignore_unpublished).await,
		};

		log_failure(&reference, "tag", tag)
	}

	fn route<'a>(&self, reference: &'a DocumentReference) -> Result<Route<'a>, ResolveError> {
		let store = reference.store();

		if self.store.has_platform(store) {
			return Ok(Route::Pad(store));
		}
		if store == BLOG_STORE {
			return Ok(Route::Blog);
		}

		Err(ResolveError::UnknownStore { store: store.to_string() })
	}

	async fn published_pad(
		&self,
		store: &str,
		doc_id: i64,
		ignore_unpublished: bool,
	) -> Result<PadRow, ResolveError> {
		let row = self.store.pad(store, doc_id).await?.ok_or(ResolveError::NotFound { doc_id })?;

		if ignore_unpublished && row.status <= UNPUBLISHED_MAX {
			return Err(ResolveError::Unpublished);
		}

		Ok(row)
	}

	async fn relevant_article(
		&self,
		doc_id: i64,
		ignore_unpublished: bool,
	) -> Result<ArticleRow, ResolveError> {
		let row = self.store.article(doc_id).await?.ok_or(ResolveError::NotFound { doc_id })?;

		if ignore_unpublished && row.relevance <= UNPUBLISHED_MAX {
			return Err(ResolveError::NotRelevant);
		}

		Ok(row)
	}

	async fn read_pad(
		&self,
		store: &str,
		doc_id: i64,
		combine_title: bool,
		ignore_unpublished: bool,
	) -> Result<String, ResolveError> {
		let row = self.published_pad(store, doc_id, ignore_unpublished).await?;
		let body = sanitize(row.full_text.as_deref().unwrap_or_default());
		let text = with_title(combine_title, row.title.as_deref(), body);

		if text.is_empty() {
			return Err(ResolveError::EmptyContent);
		}

		Ok(text)
	}

	async fn read_blog(
		&self,
		doc_id: i64,
		combine_title: bool,
		ignore_unpublished: bool,
	) -> Result<String, ResolveError> {
		let row =
			self.store.article_text(doc_id).await?.ok_or(ResolveError::NotFound { doc_id })?;

		if ignore_unpublished && row.relevance <= UNPUBLISHED_MAX {
			return Err(ResolveError::NotRelevant);
		}

		let content = sanitize(row.content.as_deref().unwrap_or_default());

		if content.is_empty() {
			return Err(ResolveError::EmptyContent);
		}

		Ok(with_title(combine_title, row.title.as_deref(), content))
	}

	async fn pad_location(
		&self,
		store: &str,
		doc_id: i64,
		ignore_unpublished: bool,
	) -> Result<Location, ResolveError> {
		let url_base = self
			.store
			.platform_url_base(store)
			.ok_or_else(|| ResolveError::UnknownStore { store: store.to_string() })?
			.to_string();
		let row = self.published_pad(store, doc_id, ignore_unpublished).await?;

		Ok(Location { url: format!("{url_base}{doc_id}"), title: row.title.unwrap_or_default() })
	}

	async fn blog_location(
		&self,
		doc_id: i64,
		ignore_unpublished: bool,
	) -> Result<Location, ResolveError> {
		let row = self.relevant_article(doc_id, ignore_unpublished).await?;

		Ok(Location { url: row.url.unwrap_or_default(), title: row.title.unwrap_or_default() })
	}

	async fn pad_tag(
		&self,
		store: &str,
		doc_id: i64,
		ignore_unpublished: bool,
	) -> Result<Tag, ResolveError> {
		let row = self.published_pad(store, doc_id, ignore_unpublished).await?;
		let Some(owner) = row.owner else {
			return Err(ResolveError::UserNotFound { user_id: "none".to_string() });
		};
		let user = self
			.store
			.user(owner)
			.await?
			.ok_or_else(|| ResolveError::UserNotFound { user_id: owner.to_string() })?;

		Ok(Tag { value: user.iso3, source: USERS_TAG_SOURCE })
	}

	async fn blog_tag(&self, doc_id: i64, ignore_unpublished: bool) -> Result<Tag, ResolveError> {
		let row = self.relevant_article(doc_id, ignore_unpublished).await?;

		Ok(Tag { value: row.iso3, source: ARTICLES_TAG_SOURCE })
	}
}

fn with_title(combine_title: bool, title: Option<&str>, body: String) -> String {
	match title {
		Some(title) if combine_title && !title.is_empty() => format!("{}\n\n{body}", sanitize(title)),
		_ => body,
	}
}

fn log_failure<T>(
	reference: &DocumentReference,
	lookup: &'static str,
	result: Result<T, ResolveError>,
) -> Result<T, ResolveError> {
	if let Err(err) = &result {
		match err {
			ResolveError::Storage { message } => tracing::warn!(
				reference = %reference,
				lookup,
				error = %message,
				"Document lookup failed."
			),
			reason => tracing::debug!(
				reference = %reference,
				lookup,
				reason = %reason,
				"Document not resolved."
			),
		}
	}

	result
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_and_trims_references() {
		let reference: DocumentReference = " solution : 42 ".parse().expect("parse failed");

		assert_eq!(reference, DocumentReference::new("solution", 42));
		assert_eq!(reference.to_string(), "solution:42");
	}

	#[test]
	fn rejects_malformed_references() {
		for input in ["solution", "solution:42:1", "solution:abc", ":", ""] {
			let err = input.parse::<DocumentReference>().expect_err("expected parse error");

			assert!(matches!(err, ResolveError::Parse { .. }), "unexpected error for {input:?}");
		}
	}

	#[test]
	fn reasons_match_caller_facing_text() {
		assert_eq!(ResolveError::NotFound { doc_id: 42 }.to_string(), "could not find doc_id=42");
		assert_eq!(ResolveError::Unpublished.to_string(), "pad is unpublished");
		assert_eq!(
			ResolveError::UnknownStore { store: "bogus".to_string() }.to_string(),
			"unknown base='bogus'"
		);
	}
}
