use std::{
	collections::{BTreeMap, HashMap},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};

use uuid::Uuid;

use nlp_service::{
	BoxFuture, DocumentResolver, DocumentStore, FullTextCache, Location, ResolveError, Tag,
	fulltext::{ARTICLES_TAG_SOURCE, USERS_TAG_SOURCE},
};
use nlp_storage::models::{ArticleRow, ArticleTextRow, PadRow, UserRow};

const SOLUTION_URL: &str = "https://solutions.sdg-innovation-commons.org/en/view/pad?id=";

#[derive(Default)]
struct SpyStore {
	url_bases: BTreeMap<String, String>,
	pads: HashMap<(String, i64), PadRow>,
	articles: HashMap<i64, ArticleRow>,
	article_texts: HashMap<i64, ArticleTextRow>,
	users: HashMap<Uuid, UserRow>,
	failing: bool,
	reads: AtomicUsize,
}
impl SpyStore {
	fn reads(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}

	fn with_platform(mut self, name: &str) -> Self {
		self.url_bases.insert(name.to_string(), SOLUTION_URL.to_string());

		self
	}

	fn with_pad(mut self, store: &str, row: PadRow) -> Self {
		self.pads.insert((store.to_string(), row.id), row);

		self
	}

	fn with_article(mut self, row: ArticleRow, content: Option<&str>) -> Self {
		self.article_texts.insert(
			row.id,
			ArticleTextRow {
				id: row.id,
				title: row.title.clone(),
				relevance: row.relevance,
				content: content.map(str::to_string),
			},
		);
		self.articles.insert(row.id, row);

		self
	}

	fn with_user(mut self, uuid: Uuid, iso3: &str) -> Self {
		self.users.insert(uuid, UserRow { uuid, iso3: Some(iso3.to_string()) });

		self
	}

	fn read<T>(&self, row: Option<T>) -> nlp_storage::Result<Option<T>> {
		self.reads.fetch_add(1, Ordering::SeqCst);

		if self.failing {
			return Err(nlp_storage::Error::Sqlx(sqlx::Error::PoolTimedOut));
		}

		Ok(row)
	}
}
impl DocumentStore for SpyStore {
	fn has_platform(&self, store: &str) -> bool {
		self.url_bases.contains_key(store)
	}

	fn platform_url_base(&self, store: &str) -> Option<&str> {
		self.url_bases.get(store).map(String::as_str)
	}

	fn pad<'a>(
		&'a self,
		store: &'a str,
		doc_id: i64,
	) -> BoxFuture<'a, nlp_storage::Result<Option<PadRow>>> {
		let row = self.pads.get(&(store.to_string(), doc_id)).map(clone_pad);

		Box::pin(async move { self.read(row) })
	}

	fn article<'a>(&'a self, doc_id: i64) -> BoxFuture<'a, nlp_storage::Result<Option<ArticleRow>>> {
		let row = self.articles.get(&doc_id).map(|row| ArticleRow {
			id: row.id,
			title: row.title.clone(),
			url: row.url.clone(),
			iso3: row.iso3.clone(),
			relevance: row.relevance,
		});

		Box::pin(async move { self.read(row) })
	}

	fn article_text<'a>(
		&'a self,
		doc_id: i64,
	) -> BoxFuture<'a, nlp_storage::Result<Option<ArticleTextRow>>> {
		let row = self.article_texts.get(&doc_id).map(|row| ArticleTextRow {
			id: row.id,
			title: row.title.clone(),
			relevance: row.relevance,
			content: row.content.clone(),
		});

		Box::pin(async move { self.read(row) })
	}

	fn user<'a>(&'a self, user_id: Uuid) -> BoxFuture<'a, nlp_storage::Result<Option<UserRow>>> {
		let row = self.users.get(&user_id).map(|row| UserRow { uuid: row.uuid, iso3: row.iso3.clone() });

		Box::pin(async move { self.read(row) })
	}
}

fn clone_pad(row: &PadRow) -> PadRow {
	PadRow {
		id: row.id,
		status: row.status,
		title: row.title.clone(),
		full_text: row.full_text.clone(),
		owner: row.owner,
	}
}

fn pad(id: i64, status: i32, title: Option<&str>, body: &str, owner: Option<Uuid>) -> PadRow {
	PadRow {
		id,
		status,
		title: title.map(str::to_string),
		full_text: Some(body.to_string()),
		owner,
	}
}

fn article(id: i64, relevance: i32) -> ArticleRow {
	ArticleRow {
		id,
		title: Some("Mapping informal markets".to_string()),
		url: Some(format!("https://blog.example/articles/{id}")),
		iso3: Some("GHA".to_string()),
		relevance,
	}
}

fn resolver(store: SpyStore) -> (DocumentResolver, Arc<SpyStore>) {
	let store = Arc::new(store);
	let resolver = DocumentResolver::new(store.clone(), Arc::new(FullTextCache::new(16)));

	(resolver, store)
}

#[tokio::test]
async fn draft_pad_is_reported_unpublished() {
	let (resolver, _) =
		resolver(SpyStore::default().with_platform("pad").with_pad("pad", pad(42, 1, Some("T"), "B", None)));
	let err = resolver.resolve_text("pad:42", true, true).await.expect_err("Expected a failure.");

	assert_eq!(err, ResolveError::Unpublished);
	assert_eq!(err.to_string(), "pad is unpublished");

	let text = resolver.resolve_text("pad:42", true, false).await.expect("Draft should resolve.");

	assert_eq!(text, "T\n\nB");
}

#[tokio::test]
async fn missing_pad_reason_names_the_id() {
	let (resolver, _) = resolver(SpyStore::default().with_platform("pad"));
	let err = resolver.resolve_text("pad:42", true, true).await.expect_err("Expected a failure.");

	assert_eq!(err.to_string(), "could not find doc_id=42");
}

#[tokio::test]
async fn published_pad_combines_title_and_body() {
	let (resolver, _) = resolver(
		SpyStore::default()
			.with_platform("pad")
			.with_pad("pad", pad(42, 2, Some("T"), "B", None))
			.with_pad("pad", pad(43, 2, Some("Title"), "  Body\r\n\r\n\r\nmore\u{200B} ", None)),
	);

	assert_eq!(resolver.resolve_text("pad:42", true, true).await.as_deref(), Ok("T\n\nB"));
	assert_eq!(resolver.resolve_text("pad:42", false, true).await.as_deref(), Ok("B"));
	assert_eq!(
		resolver.resolve_text(" pad : 43 ", true, true).await.as_deref(),
		Ok("Title\n\nBody\n\nmore")
	);
}

#[tokio::test]
async fn successful_text_is_served_from_cache() {
	let (resolver, store) = resolver(
		SpyStore::default().with_platform("solution").with_pad(
			"solution",
			pad(7, 3, None, "Clean cookstoves", None),
		),
	);
	let first = resolver.resolve_text("solution:7", true, true).await.expect("First lookup failed.");
	let second =
		resolver.resolve_text("solution:7", true, true).await.expect("Second lookup failed.");

	assert_eq!(first, second);
	assert_eq!(store.reads(), 1);
	assert_eq!(resolver.cache().len(), 1);
}

#[tokio::test]
async fn failures_are_retried_every_call() {
	let (resolver, store) = resolver(
		SpyStore::default().with_platform("pad").with_pad("pad", pad(42, 0, None, "B", None)),
	);

	for _ in 0..3 {
		assert_eq!(
			resolver.resolve_text("pad:42", false, true).await,
			Err(ResolveError::Unpublished)
		);
	}

	assert_eq!(store.reads(), 3);
	assert!(resolver.cache().is_empty());
}

#[tokio::test]
async fn storage_faults_become_reasons() {
	let (resolver, store) = resolver(SpyStore { failing: true, ..SpyStore::default().with_platform("pad") });

	for _ in 0..2 {
		let err = resolver.resolve_text("pad:1", true, true).await.expect_err("Expected a failure.");

		assert!(matches!(err, ResolveError::Storage { .. }), "Unexpected error: {err}");
	}

	assert_eq!(store.reads(), 2);
}

#[tokio::test]
async fn unknown_prefix_and_bad_ids_never_reach_stores() {
	let (resolver, store) = resolver(SpyStore::default().with_platform("pad"));
	let err = resolver.resolve_text("bogus:1", true, true).await.expect_err("Expected a failure.");

	assert_eq!(err.to_string(), "unknown base='bogus'");
	assert!(matches!(
		resolver.resolve_location("login:1", true).await,
		Err(ResolveError::UnknownStore { .. })
	));

	for reference in ["pad", "pad:x", "pad:1:2"] {
		assert!(matches!(
			resolver.resolve_tag(reference, true).await,
			Err(ResolveError::Parse { .. })
		));
	}

	assert_eq!(store.reads(), 0);
}

#[tokio::test]
async fn blog_gates_relevance_and_empty_content() {
	let (resolver, _) = resolver(
		SpyStore::default()
			.with_article(article(1, 1), Some("Hidden body"))
			.with_article(article(2, 2), Some(" \u{200B}\n "))
			.with_article(article(3, 2), Some("Market stalls")),
	);

	assert_eq!(resolver.resolve_text("blog:1", true, true).await, Err(ResolveError::NotRelevant));
	assert_eq!(
		resolver.resolve_text("blog:1", true, true).await.map_err(|err| err.to_string()),
		Err("article not relevant".to_string())
	);
	assert_eq!(resolver.resolve_text("blog:2", true, true).await, Err(ResolveError::EmptyContent));
	assert_eq!(
		resolver.resolve_text("blog:3", true, true).await.as_deref(),
		Ok("Mapping informal markets\n\nMarket stalls")
	);
}

#[tokio::test]
async fn locations_follow_store_rules() {
	let (resolver, _) = resolver(
		SpyStore::default()
			.with_platform("solution")
			.with_pad("solution", pad(42, 2, Some("Solar kiosks"), "B", None))
			.with_article(article(9, 2), Some("Body")),
	);

	assert_eq!(
		resolver.resolve_location("solution:42", true).await,
		Ok(Location { url: format!("{SOLUTION_URL}42"), title: "Solar kiosks".to_string() })
	);
	assert_eq!(
		resolver.resolve_location("blog:9", true).await,
		Ok(Location {
			url: "https://blog.example/articles/9".to_string(),
			title: "Mapping informal markets".to_string(),
		})
	);
	assert_eq!(
		resolver.resolve_location("solution:43", true).await,
		Err(ResolveError::NotFound { doc_id: 43 })
	);
}

#[tokio::test]
async fn tags_report_their_source() {
	let owner = Uuid::new_v4();
	let stranger = Uuid::new_v4();
	let (resolver, _) = resolver(
		SpyStore::default()
			.with_platform("experiment")
			.with_pad("experiment", pad(5, 2, None, "B", Some(owner)))
			.with_pad("experiment", pad(6, 2, None, "B", Some(stranger)))
			.with_user(owner, "KEN")
			.with_article(article(9, 2), Some("Body")),
	);

	assert_eq!(
		resolver.resolve_tag("experiment:5", true).await,
		Ok(Tag { value: Some("KEN".to_string()), source: USERS_TAG_SOURCE })
	);
	assert_eq!(
		resolver.resolve_tag("blog:9", true).await,
		Ok(Tag { value: Some("GHA".to_string()), source: ARTICLES_TAG_SOURCE })
	);
	assert_eq!(
		resolver.resolve_tag("experiment:6", true).await.map_err(|err| err.to_string()),
		Err(format!("could not find user_id={stranger}"))
	);
}
