use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct PadRow {
	pub id: i64,
	/// Publication state; values at or below 1 are drafts.
	pub status: i32,
	pub title: Option<String>,
	pub full_text: Option<String>,
	pub owner: Option<Uuid>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ArticleRow {
	pub id: i64,
	pub title: Option<String>,
	pub url: Option<String>,
	pub iso3: Option<String>,
	/// Editorial relevance; values at or below 1 are hidden.
	pub relevance: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ArticleTextRow {
	pub id: i64,
	pub title: Option<String>,
	pub relevance: i32,
	pub content: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
	pub uuid: Uuid,
	pub iso3: Option<String>,
}
