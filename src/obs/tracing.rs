// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, auth::ServiceId};

/// Span wrapper shared by the refresh coordinator and the service clients.
#[derive(Clone, Debug)]
pub struct SessionSpan {
	span: Span,
}
impl SessionSpan {
	/// Creates a span tagged with the service and stage.
	pub fn new(service: &ServiceId, stage: &'static str) -> Self {
		let span = tracing::info_span!("console_session.refresh", service = %service, stage);

		Self { span }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
