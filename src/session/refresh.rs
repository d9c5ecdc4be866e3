//! The refresh operation: one network call that trades a refresh token for a new access token.
//!
//! [`Refresher::refresh`] posts `{ "refresh_token": … }` to the service's refresh endpoint,
//! persists the returned tokens on success, and otherwise reports a [`RefreshError`] whose
//! [`is_expired`](RefreshError::is_expired) flag comes from the configured
//! [`RefreshClassifier`]. It never tears the session down itself; that is the coordinator's job.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{ServiceId, TokenSecret},
	error::{RefreshError, TransportError},
	service::{RefreshClassifier, RefreshFailureContext, RefreshFailureKind},
	store::{TokenStore, TokenUpdateOutcome},
	transport::{HttpResponse, HttpTransport, OutgoingRequest},
};

/// Tokens issued by a successful refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshedTokens {
	/// New access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token, when the endpoint issued one.
	pub refresh_token: Option<TokenSecret>,
}

#[derive(Serialize)]
struct RefreshRequestBody<'a> {
	refresh_token: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponseBody {
	access: String,
	#[serde(default)]
	refresh: Option<String>,
}

#[derive(Default, Deserialize)]
struct RefreshErrorBody {
	#[serde(default)]
	detail: Option<serde_json::Value>,
	#[serde(default)]
	error: Option<serde_json::Value>,
}

/// Executes refresh calls against one service's refresh endpoint.
pub struct Refresher<T>
where
	T: ?Sized + HttpTransport,
{
	service: ServiceId,
	endpoint: Url,
	transport: Arc<T>,
	store: Arc<dyn TokenStore>,
	classifier: Arc<dyn RefreshClassifier>,
}
impl<T> Refresher<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a refresher for `endpoint`.
	pub fn new(
		service: ServiceId,
		endpoint: Url,
		transport: Arc<T>,
		store: Arc<dyn TokenStore>,
		classifier: Arc<dyn RefreshClassifier>,
	) -> Self {
		Self { service, endpoint, transport, store, classifier }
	}

	/// Endpoint the refresh call is posted to.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	/// Exchanges `refresh_token` for new tokens and persists them.
	///
	/// On success only the tokens are written; role, company, and store assignments stay as they
	/// were. When the endpoint omits a new refresh token the stored one is kept.
	pub async fn refresh(
		&self,
		refresh_token: &TokenSecret,
	) -> Result<RefreshedTokens, RefreshError> {
		let tokens = self.exchange(refresh_token).await?;
		let outcome = self
			.store
			.update_tokens(
				tokens.access_token.clone(),
				tokens.refresh_token.clone(),
				OffsetDateTime::now_utc(),
			)
			.await
			.map_err(|e| {
				tracing::warn!(
					service = %self.service,
					error = %e,
					"refreshed tokens could not be stored; the stored refresh token may be spent"
				);

				RefreshError::Storage(e)
			})?;

		match outcome {
			TokenUpdateOutcome::Updated => Ok(tokens),
			TokenUpdateOutcome::Missing => Err(RefreshError::Expired {
				reason: "Session was cleared while the refresh was in flight".into(),
			}),
		}
	}

	async fn exchange(&self, refresh_token: &TokenSecret) -> Result<RefreshedTokens, RefreshError> {
		let request = OutgoingRequest::post(self.endpoint.clone())
			.json(&RefreshRequestBody { refresh_token: refresh_token.expose() })
			.map_err(|e| RefreshError::Endpoint {
				message: format!("Refresh request could not be encoded: {e}"),
				status: None,
				retry_after: None,
			})?;
		let response = match self.transport.send(request).await {
			Ok(response) => response,
			Err(err) => return Err(self.network_failure(&err)),
		};

		if response.is_success() {
			return parse_success(&response);
		}

		Err(self.endpoint_failure(&response))
	}

	fn network_failure(&self, err: &TransportError) -> RefreshError {
		let message = match StdError::source(err) {
			Some(source) => format!("{err} {source}"),
			None => err.to_string(),
		};

		tracing::debug!(service = %self.service, error = %message, "refresh call failed in transport");

		match self.classifier.classify(&RefreshFailureContext::network_failure()) {
			RefreshFailureKind::Expired => RefreshError::Expired { reason: message },
			RefreshFailureKind::Other => RefreshError::Network { message },
		}
	}

	fn endpoint_failure(&self, response: &HttpResponse) -> RefreshError {
		let status = response.status.as_u16();
		let body = serde_json::from_slice::<RefreshErrorBody>(&response.body).unwrap_or_default();
		let mut ctx = RefreshFailureContext::default()
			.with_http_status(status)
			.with_body_preview(response.text());

		if let Some(detail) = body.detail.as_ref().and_then(serde_json::Value::as_str) {
			ctx = ctx.with_detail(detail);
		}
		if let Some(error) = body.error.as_ref().and_then(serde_json::Value::as_str) {
			ctx = ctx.with_error(error);
		}

		let kind = self.classifier.classify(&ctx);

		tracing::debug!(service = %self.service, status, ?kind, "refresh endpoint rejected the call");

		match kind {
			RefreshFailureKind::Expired => RefreshError::Expired { reason: ctx.reason() },
			RefreshFailureKind::Other => RefreshError::Endpoint {
				message: ctx.reason(),
				status: Some(status),
				retry_after: response.retry_after(),
			},
		}
	}
}
impl<T> Debug for Refresher<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Refresher")
			.field("service", &self.service)
			.field("endpoint", &self.endpoint.as_str())
			.finish()
	}
}

fn parse_success(response: &HttpResponse) -> Result<RefreshedTokens, RefreshError> {
	let status = Some(response.status.as_u16());
	let body: RefreshResponseBody = response
		.json()
		.map_err(|e| RefreshError::Malformed { message: e.to_string(), status })?;
	let access_token = TokenSecret::new(body.access);

	if access_token.is_empty() || access_token.bearer_header().is_err() {
		return Err(RefreshError::Malformed {
			message: "access: token is empty or not usable as a header value".into(),
			status,
		});
	}

	let refresh_token = body.refresh.filter(|value| !value.is_empty()).map(TokenSecret::new);

	Ok(RefreshedTokens { access_token, refresh_token })
}
