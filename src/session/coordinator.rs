//! Single-flight refresh coordination for one backend service.
//!
//! The first request whose call fails with `401` becomes the *leader* of a refresh episode: it
//! runs the refresh operation while every other request failing on the same service parks in a
//! FIFO queue. When the episode settles the leader re-dispatches itself first, then the queue in
//! enqueue order, all with the new token. If the refresh fails the queue is rejected with the same
//! error, and an expired session is torn down before anyone observes the rejection.
//!
//! A `401` that arrives while no session is stored has nothing to refresh or tear down; it is
//! returned as [`Error::Unauthorized`] without touching the queue.
//!
//! State lives in a short synchronous critical section (`parking_lot::Mutex`), never held across
//! an `.await`. A drop guard returns the coordinator to idle if the leader's future is cancelled.

// std
use std::mem;
// crates.io
use futures::{channel::oneshot, future};
// self
use crate::{
	_prelude::*,
	auth::{ServiceId, TokenSecret},
	error::{ConfigError, RefreshError, StatusError},
	obs::{self, OutcomeLabel, SessionSpan},
	session::{
		refresh::{RefreshMetrics, RefreshedTokens, Refresher},
		teardown::SessionTeardown,
	},
	store::TokenStore,
	transport::{HttpResponse, HttpTransport, OutgoingRequest},
};

/// Boxed response future handed back to callers and replays.
pub type ResponseFuture = Pin<Box<dyn Future<Output = Result<HttpResponse>> + 'static + Send>>;

/// Re-dispatches a request through the owning client without running the signer again.
///
/// Calling the function must start the request; the returned future only observes it.
pub type Replay = Arc<dyn Fn(OutgoingRequest) -> ResponseFuture + Send + Sync>;

/// Tagged result of one refresh episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
	/// A new access token was issued and persisted.
	Recovered(TokenSecret),
	/// The refresh token is dead; the session must be torn down.
	Expired(RefreshError),
	/// The refresh failed for another reason; the session is kept.
	Failed(RefreshError),
}
impl RefreshOutcome {
	/// Metrics label for the outcome.
	pub fn label(&self) -> OutcomeLabel {
		match self {
			Self::Recovered(_) => OutcomeLabel::Recovered,
			Self::Expired(_) => OutcomeLabel::Expired,
			Self::Failed(_) => OutcomeLabel::Failed,
		}
	}
}
impl From<Result<RefreshedTokens, RefreshError>> for RefreshOutcome {
	fn from(result: Result<RefreshedTokens, RefreshError>) -> Self {
		match result {
			Ok(tokens) => Self::Recovered(tokens.access_token),
			Err(e) if e.is_expired() => Self::Expired(e),
			Err(e) => Self::Failed(e),
		}
	}
}

type Responder = oneshot::Sender<Result<ResponseFuture>>;

struct PendingRequest {
	request: OutgoingRequest,
	failure: StatusError,
	replay: Replay,
	responder: Responder,
}

#[derive(Default)]
struct CoordinatorState {
	refreshing: bool,
	queue: VecDeque<PendingRequest>,
}

enum Entry {
	Lead(OutgoingRequest, StatusError, Replay),
	Wait(oneshot::Receiver<Result<ResponseFuture>>),
}

/// Per-service refresh coordinator.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	service: ServiceId,
	refresher: Refresher<T>,
	store: Arc<dyn TokenStore>,
	teardown: SessionTeardown,
	metrics: RefreshMetrics,
	state: Mutex<CoordinatorState>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an idle coordinator.
	pub fn new(
		service: ServiceId,
		refresher: Refresher<T>,
		store: Arc<dyn TokenStore>,
		teardown: SessionTeardown,
	) -> Self {
		Self {
			service,
			refresher,
			store,
			teardown,
			metrics: RefreshMetrics::default(),
			state: Mutex::new(CoordinatorState::default()),
		}
	}

	/// Service this coordinator guards.
	pub fn service(&self) -> &ServiceId {
		&self.service
	}

	/// Returns `true` while a refresh episode is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.state.lock().refreshing
	}

	/// Number of requests currently parked behind the in-flight refresh.
	pub fn queued(&self) -> usize {
		self.state.lock().queue.len()
	}

	/// Counters for this coordinator's episodes.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Recovers a request whose call failed with `failure`.
	///
	/// Failures other than `401`, `401`s on requests that were already replayed once, and `401`s
	/// received while no session is stored are returned to the caller untouched. Everything else
	/// either leads a refresh episode or waits for the one in flight, and resolves with the
	/// replayed response.
	pub async fn handle_unauthorized(
		&self,
		mut request: OutgoingRequest,
		failure: StatusError,
		replay: Replay,
	) -> Result<HttpResponse> {
		if !failure.is_unauthorized() {
			return Err(Error::Status(failure));
		}
		if request.is_retried() {
			tracing::debug!(service = %self.service, url = %request.url, "replayed request was rejected again");

			return Err(Error::Unauthorized(failure));
		}

		if let Ok(None) = self.store.load().await {
			tracing::debug!(service = %self.service, url = %request.url, "401 received without a stored session");

			return Err(Error::Unauthorized(failure));
		}

		request.mark_retried();

		let entry = {
			let mut state = self.state.lock();

			if state.refreshing {
				let (responder, receiver) = oneshot::channel();

				state.queue.push_back(PendingRequest { request, failure, replay, responder });

				Entry::Wait(receiver)
			} else {
				state.refreshing = true;

				Entry::Lead(request, failure, replay)
			}
		};

		match entry {
			Entry::Wait(receiver) => {
				self.metrics.record_queued();
				obs::record_refresh_outcome(&self.service, OutcomeLabel::Queued);
				tracing::debug!(service = %self.service, "request queued behind in-flight refresh");

				match receiver.await {
					Ok(Ok(response)) => response.await,
					Ok(Err(e)) => Err(e),
					Err(oneshot::Canceled) => Err(Error::RefreshAbandoned),
				}
			},
			Entry::Lead(request, failure, replay) => self.lead(request, failure, replay).await,
		}
	}

	async fn lead(
		&self,
		request: OutgoingRequest,
		failure: StatusError,
		replay: Replay,
	) -> Result<HttpResponse> {
		let mut episode = Episode { coordinator: self, settled: false };
		let span = SessionSpan::new(&self.service, "refresh");
		let Some(outcome) = span.instrument(self.run_refresh()).await else {
			tracing::debug!(service = %self.service, "session ended before the refresh started");

			for pending in episode.settle() {
				let _ = pending.responder.send(Err(Error::Unauthorized(pending.failure)));
			}

			return Err(Error::Unauthorized(failure));
		};

		match outcome {
			RefreshOutcome::Recovered(token) => {
				let original = redispatch(&token, request, &replay);
				let queue = episode.settle();

				tracing::debug!(
					service = %self.service,
					replays = queue.len() + 1,
					"refresh recovered; replaying requests"
				);

				for pending in queue {
					let response = redispatch(&token, pending.request, &pending.replay);

					// A waiter that went away simply never observes its replay.
					let _ = pending.responder.send(Ok(response));
				}

				original.await
			},
			RefreshOutcome::Expired(e) => {
				span.instrument(self.teardown.teardown()).await;

				reject(episode.settle(), &e);

				Err(e.into())
			},
			RefreshOutcome::Failed(e) => {
				reject(episode.settle(), &e);

				Err(e.into())
			},
		}
	}

	/// Returns `None` when the session was cleared before the episode could read it.
	async fn run_refresh(&self) -> Option<RefreshOutcome> {
		let loaded = self.store.load().await.transpose()?;

		self.metrics.record_attempt();
		obs::record_refresh_outcome(&self.service, OutcomeLabel::Attempt);

		let result = match loaded {
			Ok(record) => self.refresher.refresh(&record.refresh_token).await,
			Err(e) => Err(RefreshError::Storage(e)),
		};
		let outcome = RefreshOutcome::from(result);

		match &outcome {
			RefreshOutcome::Recovered(_) => {
				self.metrics.record_recovered();
				tracing::info!(service = %self.service, "access token refreshed");
			},
			RefreshOutcome::Expired(e) => {
				self.metrics.record_expired();
				tracing::warn!(service = %self.service, error = %e, "refresh token rejected; ending session");
			},
			RefreshOutcome::Failed(e) => {
				self.metrics.record_failed();
				tracing::warn!(service = %self.service, error = %e, "token refresh failed");
			},
		}

		obs::record_refresh_outcome(&self.service, outcome.label());

		Some(outcome)
	}

	fn release(&self) -> VecDeque<PendingRequest> {
		let mut state = self.state.lock();

		state.refreshing = false;

		mem::take(&mut state.queue)
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("service", &self.service)
			.field("refreshing", &state.refreshing)
			.field("queued", &state.queue.len())
			.finish()
	}
}

/// Returns the coordinator to idle when the leader goes away mid-episode.
struct Episode<'a, T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: &'a RefreshCoordinator<T>,
	settled: bool,
}
impl<T> Episode<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn settle(&mut self) -> VecDeque<PendingRequest> {
		self.settled = true;

		self.coordinator.release()
	}
}
impl<T> Drop for Episode<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		if self.settled {
			return;
		}

		let abandoned = self.coordinator.release();

		tracing::warn!(
			service = %self.coordinator.service,
			abandoned = abandoned.len(),
			"refresh leader dropped before the episode settled"
		);

		// Dropping the responders wakes every waiter with `RefreshAbandoned`.
		drop(abandoned);
	}
}

fn redispatch(token: &TokenSecret, mut request: OutgoingRequest, replay: &Replay) -> ResponseFuture {
	match request.set_bearer(token) {
		Ok(()) => replay(request),
		Err(e) => Box::pin(future::ready(Err::<HttpResponse, _>(Error::from(ConfigError::from(e))))),
	}
}

fn reject(queue: VecDeque<PendingRequest>, error: &RefreshError) {
	for pending in queue {
		let _ = pending.responder.send(Err(error.clone().into()));
	}
}
