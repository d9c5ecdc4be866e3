//! Crate-level error types shared by the session, store, and transport layers.

// crates.io
use http::{Method, StatusCode};
// self
use crate::{_prelude::*, transport::HttpResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced to callers of a service client.
///
/// Recoverable authorization failures never show up here; they are absorbed by the refresh
/// coordinator. Everything that does reach the caller falls into one of these variants.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Token store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Network failure while sending a request to a backend service.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Non-authorization HTTP failure, passed through untouched.
	#[error(transparent)]
	Status(StatusError),
	/// Authorization failure that will not be recovered (the request was already replayed once).
	#[error("Request is still unauthorized: {0}")]
	Unauthorized(StatusError),
	/// Token refresh failed; see [`RefreshError::is_expired`] for whether the session was torn
	/// down.
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	/// The request that was driving a refresh was dropped before the refresh settled.
	#[error("Token refresh was abandoned before it completed.")]
	RefreshAbandoned,
}
impl Error {
	/// Returns `true` when the session was lost and the user must sign in again.
	pub fn is_session_expired(&self) -> bool {
		matches!(self, Self::Refresh(err) if err.is_expired())
	}

	/// HTTP status attached to the error, when one exists.
	pub fn status(&self) -> Option<StatusCode> {
		match self {
			Self::Status(err) | Self::Unauthorized(err) => Some(err.status()),
			Self::Refresh(err) => err.status().and_then(|code| StatusCode::from_u16(code).ok()),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// The stored access token cannot be rendered as a header value.
	#[error("Access token contains characters that are not valid in an HTTP header.")]
	InvalidBearer(#[from] http::header::InvalidHeaderValue),
	/// A request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[from] serde_json::Error),
	/// A request path could not be joined onto the service base URL.
	#[error("Path `{path}` cannot be joined onto the service base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Service descriptor validation failed.
	#[error(transparent)]
	Descriptor(#[from] crate::service::ServiceDescriptorError),
	/// Credential record builder validation failed.
	#[error("Unable to build credential record.")]
	CredentialBuild(#[from] crate::auth::CredentialRecordBuilderError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Non-success response returned by a backend service, kept whole for the caller.
#[derive(Clone, Debug, ThisError)]
#[error("Backend returned HTTP {} for {method} {url}.", .response.status)]
pub struct StatusError {
	/// Method of the failing request.
	pub method: Method,
	/// Target of the failing request.
	pub url: Url,
	/// Response exactly as the server sent it.
	pub response: HttpResponse,
}
impl StatusError {
	/// Response status.
	pub fn status(&self) -> StatusCode {
		self.response.status
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.response.is_unauthorized()
	}
}

/// Failure of the token refresh operation.
///
/// The type is `Clone` because one refresh failure is delivered to the request that triggered the
/// refresh and to every request queued behind it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// The refresh token is invalid or expired; the session has been torn down.
	#[error("Session expired: {reason}.")]
	Expired {
		/// Server-supplied (or locally derived) reason.
		reason: String,
	},
	/// Refresh endpoint failed in a way that does not prove the session is gone.
	#[error("Refresh endpoint returned an unexpected response: {message}.")]
	Endpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from the endpoint, if supplied.
		retry_after: Option<Duration>,
	},
	/// Refresh endpoint answered 2xx with a body that does not match the expected shape.
	#[error("Refresh endpoint returned a malformed body: {message}.")]
	Malformed {
		/// Parser diagnostic including the failing path.
		message: String,
		/// HTTP status code of the response.
		status: Option<u16>,
	},
	/// The refresh call never produced a response.
	#[error("Network error occurred while calling the refresh endpoint: {message}.")]
	Network {
		/// Transport diagnostic.
		message: String,
	},
	/// New tokens were issued but could not be persisted.
	#[error("Refreshed tokens could not be stored: {0}")]
	Storage(crate::store::StoreError),
}
impl RefreshError {
	/// Returns `true` when the failure proves the session cannot be recovered.
	pub fn is_expired(&self) -> bool {
		matches!(self, Self::Expired { .. })
	}

	/// HTTP status reported by the refresh endpoint, when available.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Endpoint { status, .. } | Self::Malformed { status, .. } => *status,
			_ => None,
		}
	}
}
