//! Classification of refresh-endpoint failures.
//!
//! The backend does not return structured error codes for a dead refresh token, only a handful of
//! literal phrases. Those phrases live here, in one place, behind [`RefreshClassifier`] so they
//! can be swapped once the backend grows proper codes.

// self
use crate::_prelude::*;

/// `detail` value the backend returns for a dead refresh token.
pub const INVALID_OR_EXPIRED_DETAIL: &str = "Invalid or expired token";
/// `error` value the backend returns for an unknown refresh token.
pub const INVALID_TOKEN_ERROR: &str = "Invalid token";
/// Substring of `error` values that report an expired refresh token.
pub const EXPIRED_ERROR_FRAGMENT: &str = "expired";

/// Strategy hook deciding whether a refresh failure ends the session.
pub trait RefreshClassifier
where
	Self: Send + Sync,
{
	/// Maps a failed refresh call onto [`RefreshFailureKind`].
	fn classify(&self, ctx: &RefreshFailureContext) -> RefreshFailureKind;
}

/// Outcome of classifying a failed refresh call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshFailureKind {
	/// The refresh token is invalid or expired; the session must be torn down.
	Expired,
	/// Anything else (network error, 5xx, malformed body); the session is kept.
	Other,
}

/// Primitive view of a failed refresh call handed to a [`RefreshClassifier`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RefreshFailureContext {
	/// HTTP status code, when a response arrived.
	pub http_status: Option<u16>,
	/// Body `detail` field, when present and a string.
	pub detail: Option<String>,
	/// Body `error` field, when present and a string.
	pub error: Option<String>,
	/// Truncated raw body for diagnostics.
	pub body_preview: Option<String>,
	/// Set when the call failed before any response arrived.
	pub network_error: bool,
}
impl RefreshFailureContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Context for a call that never produced a response.
	pub fn network_failure() -> Self {
		Self { network_error: true, ..Self::default() }
	}

	/// Adds the HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the body `detail` field.
	pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
		self.detail = Some(detail.into());

		self
	}

	/// Adds the body `error` field.
	pub fn with_error(mut self, error: impl Into<String>) -> Self {
		self.error = Some(error.into());

		self
	}

	/// Adds a body preview, truncated to a bounded length.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Best human-readable reason carried by the context.
	pub fn reason(&self) -> String {
		self.detail
			.clone()
			.or_else(|| self.error.clone())
			.or_else(|| self.body_preview.clone().filter(|body| !body.is_empty()))
			.unwrap_or_else(|| match self.http_status {
				Some(status) => format!("HTTP {status}"),
				None => "no response".into(),
			})
	}
}

/// Literal-match rules documented by the backend.
///
/// A failure is [`RefreshFailureKind::Expired`] only when the status is 400 or 401 **and** one
/// of the following holds: `detail` equals [`INVALID_OR_EXPIRED_DETAIL`], `error` equals
/// [`INVALID_TOKEN_ERROR`], or `error` contains [`EXPIRED_ERROR_FRAGMENT`]. Matching is
/// case-sensitive.
#[derive(Debug, Default)]
pub struct DefaultRefreshClassifier;
impl Display for DefaultRefreshClassifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-refresh-classifier")
	}
}
impl RefreshClassifier for DefaultRefreshClassifier {
	fn classify(&self, ctx: &RefreshFailureContext) -> RefreshFailureKind {
		if ctx.network_error || !matches!(ctx.http_status, Some(400 | 401)) {
			return RefreshFailureKind::Other;
		}

		let detail_matches = ctx.detail.as_deref() == Some(INVALID_OR_EXPIRED_DETAIL);
		let error_matches = ctx.error.as_deref().is_some_and(|error| {
			error == INVALID_TOKEN_ERROR || error.contains(EXPIRED_ERROR_FRAGMENT)
		});

		if detail_matches || error_matches {
			RefreshFailureKind::Expired
		} else {
			RefreshFailureKind::Other
		}
	}
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= RefreshFailureContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf: String = body.chars().take(RefreshFailureContext::BODY_PREVIEW_LIMIT).collect();

	buf.push('…');

	buf
}
