use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use serde_json::{Value, json};

use nlp_config::Config;
use nlp_service::{
	DistanceFn, DocumentResolver, FullTextCache, VectorStore, vec::collection_name,
};
use nlp_storage::{db::DocStores, qdrant::QdrantStore};

const ALL_DISTANCES: [DistanceFn; 4] =
	[DistanceFn::Cosine, DistanceFn::Dot, DistanceFn::Euclid, DistanceFn::Manhattan];

#[derive(Debug, Parser)]
#[command(
	version = nlp_cli::VERSION,
	rename_all = "kebab",
	styles = nlp_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Print status and point count for a collection.
	Stats {
		name: String,
		/// Limit to one distance function; all four are listed otherwise.
		#[arg(long, short = 'd', value_parser = parse_distance)]
		distance: Option<DistanceFn>,
	},
	/// Print the sanitized text of a document reference such as `solution:42`.
	Fulltext {
		reference: String,
		#[arg(long)]
		title: bool,
		/// Include unpublished documents.
		#[arg(long)]
		all: bool,
	},
	/// Print the public URL and title of a document.
	Location {
		reference: String,
		#[arg(long)]
		all: bool,
	},
	/// Print the country tag of a document.
	Tag {
		reference: String,
		#[arg(long)]
		all: bool,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let cfg = nlp_config::load(&args.config)?;

	nlp_cli::init_tracing(&cfg.service.log_level);

	let output = match args.command {
		Command::Stats { name, distance } => stats(&cfg, &name, distance).await?,
		Command::Fulltext { reference, title, all } => {
			let outcome = resolver(&cfg)?.resolve_text(&reference, title, !all).await;

			match outcome {
				Ok(text) => json!({ "reference": reference, "text": text, "error": null }),
				Err(err) =>
					json!({ "reference": reference, "text": null, "error": err.to_string() }),
			}
		},
		Command::Location { reference, all } => {
			match resolver(&cfg)?.resolve_location(&reference, !all).await {
				Ok(location) => json!({
					"reference": reference,
					"url": location.url,
					"title": location.title,
					"error": null,
				}),
				Err(err) => json!({
					"reference": reference,
					"url": null,
					"title": null,
					"error": err.to_string(),
				}),
			}
		},
		Command::Tag { reference, all } => match resolver(&cfg)?.resolve_tag(&reference, !all).await
		{
			Ok(tag) => json!({ "reference": reference, "tag": tag.value, "source": tag.source }),
			Err(err) => json!({ "reference": reference, "tag": null, "source": err.to_string() }),
		},
	};

	println!("{}", serde_json::to_string_pretty(&output)?);

	Ok(())
}

fn resolver(cfg: &Config) -> color_eyre::Result<DocumentResolver> {
	let stores = DocStores::connect(&cfg.storage.documents)?;
	let cache = FullTextCache::new(cfg.cache.fulltext_capacity);

	Ok(DocumentResolver::new(Arc::new(stores), Arc::new(cache)))
}

async fn stats(cfg: &Config, name: &str, distance: Option<DistanceFn>) -> color_eyre::Result<Value> {
	let vectors = VectorStore::new(QdrantStore::new(&cfg.storage.qdrant)?);
	let distances = match distance {
		Some(distance) => vec![distance],
		None => ALL_DISTANCES.to_vec(),
	};
	let mut collections = Vec::with_capacity(distances.len());

	for distance in distances {
		collections.push(collection_name(name, distance)?);
	}

	let stats = vectors.stats_all(&collections).await;

	tracing::debug!(requested = collections.len(), found = stats.len(), "Collected stats.");

	Ok(serde_json::to_value(stats)?)
}

fn parse_distance(value: &str) -> Result<DistanceFn, String> {
	value.parse::<DistanceFn>().map_err(|err| err.to_string())
}
