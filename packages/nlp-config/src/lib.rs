mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Cache, Compute, Config, Documents, Platform, Qdrant, Service, Storage};

use std::{fs, path::Path};

/// Store prefixes that are routed to dedicated stores and cannot name a pad platform.
pub const RESERVED_PREFIXES: [&str; 2] = ["blog", "login"];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.compute.wait_timeout_secs == 0 {
		return Err(Error::Validation {
			message: "compute.wait_timeout_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.documents.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.documents.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	for (label, dsn) in [
		("storage.documents.blog_dsn", &cfg.storage.documents.blog_dsn),
		("storage.documents.login_dsn", &cfg.storage.documents.login_dsn),
	] {
		if dsn.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	for (name, platform) in &cfg.storage.documents.platforms {
		if RESERVED_PREFIXES.contains(&name.as_str()) {
			return Err(Error::Validation {
				message: format!("Platform name {name:?} is reserved."),
			});
		}
		if name.trim().is_empty() || name.contains(':') {
			return Err(Error::Validation {
				message: format!("Platform name {name:?} must be non-empty and must not contain ':'."),
			});
		}
		if platform.dsn.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("storage.documents.platforms.{name}.dsn must be non-empty."),
			});
		}
		if platform.url_base.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("storage.documents.platforms.{name}.url_base must be non-empty."),
			});
		}
	}

	if cfg.cache.fulltext_capacity == 0 {
		return Err(Error::Validation {
			message: "cache.fulltext_capacity must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.storage.qdrant.api_key = None;
	}
}
