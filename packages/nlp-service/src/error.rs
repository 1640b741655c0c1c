pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid collection name {name:?}; names must not contain '-' or ':'.")]
	InvalidName { name: String },
	#[error("Invalid distance function {value:?}; expected one of cos, dot, euc, man.")]
	InvalidDistance { value: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error(transparent)]
	Compute(#[from] nlp_compute::Error),
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
