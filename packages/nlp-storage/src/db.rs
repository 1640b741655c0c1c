use std::collections::BTreeMap;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{Error, Result};

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	pub async fn connect(dsn: &str, max_conns: u32) -> Result<Self> {
		let pool = PgPoolOptions::new().max_connections(max_conns).connect(dsn).await?;

		Ok(Self { pool })
	}

	/// Builds the pool without opening a connection; the first query connects.
	pub fn connect_lazy(dsn: &str, max_conns: u32) -> Result<Self> {
		let pool = PgPoolOptions::new().max_connections(max_conns).connect_lazy(dsn)?;

		Ok(Self { pool })
	}
}

/// One pad platform: its database and the public URL prefix for its documents.
pub struct PlatformDb {
	pub db: Db,
	pub url_base: String,
}

/// Every backing document store, keyed the way document references address them.
pub struct DocStores {
	pub platforms: BTreeMap<String, PlatformDb>,
	pub blog: Db,
	pub login: Db,
}
impl DocStores {
	/// Pools are lazy so an unreachable store only fails the lookups routed to it.
	pub fn connect(cfg: &nlp_config::Documents) -> Result<Self> {
		let mut platforms = BTreeMap::new();

		for (name, platform) in &cfg.platforms {
			let db = Db::connect_lazy(&platform.dsn, cfg.pool_max_conns)?;

			platforms.insert(name.clone(), PlatformDb { db, url_base: platform.url_base.clone() });
		}

		let blog = Db::connect_lazy(&cfg.blog_dsn, cfg.pool_max_conns)?;
		let login = Db::connect_lazy(&cfg.login_dsn, cfg.pool_max_conns)?;

		tracing::info!(platforms = platforms.len(), "Document stores configured.");

		Ok(Self { platforms, blog, login })
	}

	pub fn platform(&self, name: &str) -> Result<&PlatformDb> {
		self.platforms.get(name).ok_or_else(|| Error::NotFound(format!("platform {name:?}")))
	}
}
