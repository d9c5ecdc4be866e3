// self
use crate::{auth::ServiceId, obs::OutcomeLabel};

/// Records a refresh outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(service: &ServiceId, outcome: OutcomeLabel) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"console_session_refresh_total",
			"service" => service.to_string(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (service, outcome);
	}
}
