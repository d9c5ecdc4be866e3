//! Observability helpers for session flows.
//!
//! - Every refresh episode runs inside a `console_session.refresh` span carrying the `service`
//!   and `stage` fields.
//! - Enable the `metrics` feature to increment the `console_session_refresh_total` counter,
//!   labeled by `service` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for refresh episodes and the requests around them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeLabel {
	/// A refresh call was started.
	Attempt,
	/// A request was parked behind an in-flight refresh.
	Queued,
	/// The refresh produced a new access token.
	Recovered,
	/// The refresh token was dead; the session was torn down.
	Expired,
	/// The refresh failed for another reason; the session was kept.
	Failed,
}
impl OutcomeLabel {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OutcomeLabel::Attempt => "attempt",
			OutcomeLabel::Queued => "queued",
			OutcomeLabel::Recovered => "recovered",
			OutcomeLabel::Expired => "expired",
			OutcomeLabel::Failed => "failed",
		}
	}
}
impl Display for OutcomeLabel {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
