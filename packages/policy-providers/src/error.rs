pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidRequest { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
	#[error("Provider call timed out after {timeout_ms} ms.")]
	Timeout { timeout_ms: u64 },
}
impl Error {
	pub fn is_timeout(&self) -> bool {
		match self {
			Self::Timeout { .. } => true,
			Self::Reqwest(err) => err.is_timeout(),
			_ => false,
		}
	}
}
