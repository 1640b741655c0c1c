use sqlx::PgExecutor;
use uuid::Uuid;

use crate::{
	Result,
	models::{ArticleRow, ArticleTextRow, PadRow, UserRow},
};

pub async fn get_pad<'e, E>(executor: E, doc_id: i64) -> Result<Option<PadRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, PadRow>(
		"\
SELECT
\tid::INT8 AS id,
\tstatus::INT4 AS status,
\ttitle,
\tfull_text,
\towner
FROM pads
WHERE id = $1
LIMIT 1",
	)
	.bind(doc_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn get_article<'e, E>(executor: E, doc_id: i64) -> Result<Option<ArticleRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, ArticleRow>(
		"\
SELECT
\tid::INT8 AS id,
\ttitle,
\turl,
\tiso3,
\trelevance::INT4 AS relevance
FROM articles
WHERE id = $1
LIMIT 1",
	)
	.bind(doc_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

/// Articles without a content row are reported as missing.
pub async fn get_article_text<'e, E>(executor: E, doc_id: i64) -> Result<Option<ArticleTextRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, ArticleTextRow>(
		"\
SELECT
\ta.id::INT8 AS id,
\ta.title,
\ta.relevance::INT4 AS relevance,
\tc.content
FROM articles a
JOIN article_content c ON c.article_id = a.id
WHERE a.id = $1
LIMIT 1",
	)
	.bind(doc_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}

pub async fn get_user<'e, E>(executor: E, user_id: Uuid) -> Result<Option<UserRow>>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, UserRow>(
		"\
SELECT uuid, iso3
FROM users
WHERE uuid = $1
LIMIT 1",
	)
	.bind(user_id)
	.fetch_optional(executor)
	.await?;

	Ok(row)
}
