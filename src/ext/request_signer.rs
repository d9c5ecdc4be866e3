//! Request interceptor that attaches the session's access token to outgoing calls.

// self
use crate::{
	_prelude::*, auth::CredentialRecord, error::ConfigError, transport::OutgoingRequest,
};

/// Describes how to authorize an [`OutgoingRequest`] from the current [`CredentialRecord`].
///
/// Implementations must be pure: mutate headers, nothing else. They run synchronously on every
/// outgoing request, for every service client of a session.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Injects authorization state into `request`. `credentials` is `None` when no session
	/// exists, in which case the request goes out unauthenticated.
	fn sign(
		&self,
		request: &mut OutgoingRequest,
		credentials: Option<&CredentialRecord>,
	) -> Result<(), ConfigError>;
}

/// Default signer: `Authorization: Bearer <access token>` when a session exists.
///
/// Any caller-supplied `Authorization` header is replaced, and removed when there is no session,
/// so a request never carries a token the store no longer holds.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl RequestSigner for BearerSigner {
	fn sign(
		&self,
		request: &mut OutgoingRequest,
		credentials: Option<&CredentialRecord>,
	) -> Result<(), ConfigError> {
		match credentials {
			Some(record) if !record.access_token.is_empty() =>
				request.set_bearer(&record.access_token)?,
			_ => request.clear_authorization(),
		}

		Ok(())
	}
}
