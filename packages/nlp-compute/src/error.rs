pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Compute backend error: {message}")]
	Backend { message: String },
	#[error("Invalid graph: {message}")]
	InvalidGraph { message: String },
	#[error("Output field {field} is {found}, expected {expected}.")]
	OutputShapeMismatch { field: String, expected: &'static str, found: &'static str },
	#[error("Result is missing output field {field}.")]
	MissingField { field: String },
	#[error("Failed to decode output field {field}: {message}")]
	Decode { field: String, message: String },
	#[error("Failed to read graph definition at {path:?}.")]
	ReadGraph { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse graph definition at {path:?}.")]
	ParseGraph { path: std::path::PathBuf, source: serde_json::Error },
}
