pub mod db;
pub mod docs;
pub mod models;
pub mod qdrant;

mod error;

pub use error::{Error, Result};
