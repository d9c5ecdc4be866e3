//! Token store contract and the built-in backends.
//!
//! The store is the only state shared between every service client of a session. Reads happen on
//! every outgoing request, writes happen on sign-in, on a successful refresh, and on teardown.
//! Backends are expected to be last-write-wins; no transactional guarantee is made across
//! concurrent refreshes.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, TokenSecret},
};

/// Boxed future returned by [`TokenStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for the session's [`CredentialRecord`].
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Returns the current record, if a session exists.
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>>;

	/// Persists or replaces the whole record (sign-in).
	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()>;

	/// Rotates the tokens of the existing record, leaving role, company, and store assignments
	/// untouched. `refresh_token` is only replaced when `Some`.
	fn update_tokens(
		&self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		instant: OffsetDateTime,
	) -> StoreFuture<'_, TokenUpdateOutcome>;

	/// Removes the record. Clearing an empty store is not an error.
	fn clear(&self) -> StoreFuture<'_, ()>;
}

/// Result of a [`TokenStore::update_tokens`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenUpdateOutcome {
	/// The stored record was rotated.
	Updated,
	/// No record existed, so nothing was written.
	Missing,
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
