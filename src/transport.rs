//! Request/response model and the transport contract used by every service client.
//!
//! [`HttpTransport::send`] is the dispatch point: the coordinator calls it in the order it
//! promises to replay requests, so implementations should start (or at least enqueue) the
//! request before returning the future. The crate ships [`ReqwestTransport`] behind the default
//! `reqwest` feature; tests and embedders can plug in any other client.

// crates.io
use http::{
	HeaderMap, Method, StatusCode,
	header::{AUTHORIZATION, HeaderName, HeaderValue, InvalidHeaderValue, RETRY_AFTER},
};
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, auth::TokenSecret, error::TransportError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'static + Send>>;

/// Abstraction over the HTTP stack that carries console requests.
///
/// Implementations must be `Send + Sync + 'static` and return owned futures so replayed requests
/// can be handed from the coordinator to the task awaiting them.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Dispatches `request` and resolves with whatever response the server produced, regardless
	/// of status. Only network-level failures map to [`TransportError`].
	fn send(&self, request: OutgoingRequest) -> TransportFuture;
}

/// Outgoing call to a backend service.
#[derive(Clone, Debug)]
pub struct OutgoingRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers; `Authorization` is managed by the request signer.
	pub headers: HeaderMap,
	/// Raw request body.
	pub body: Option<Vec<u8>>,
	retried: bool,
}
impl OutgoingRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, retried: false }
	}

	/// Shorthand for a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Shorthand for a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::POST, url)
	}

	/// Adds or replaces a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Serializes `body` as JSON and sets the matching content type.
	pub fn json<T>(mut self, body: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(body)?);
		self.headers
			.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Returns `true` once the request has been replayed after a refresh.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Marks the request as already replayed; a later authorization failure is then surfaced to
	/// the caller instead of triggering another refresh.
	pub fn mark_retried(&mut self) {
		self.retried = true;
	}

	/// Current `Authorization` header, if any.
	pub fn authorization(&self) -> Option<&HeaderValue> {
		self.headers.get(AUTHORIZATION)
	}

	/// Sets `Authorization: Bearer <token>`.
	pub fn set_bearer(&mut self, token: &TokenSecret) -> Result<(), InvalidHeaderValue> {
		self.headers.insert(AUTHORIZATION, token.bearer_header()?);

		Ok(())
	}

	/// Removes any `Authorization` header.
	pub fn clear_authorization(&mut self) {
		self.headers.remove(AUTHORIZATION);
	}
}

/// Fully buffered response from a backend service.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Creates a response with empty headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Decodes the body as JSON, reporting the failing path on error.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}

	/// Lossy UTF-8 view of the body.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// `Retry-After` hint as a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		parse_retry_after(&self.headers, OffsetDateTime::now_utc())
	}
}

/// reqwest-backed [`HttpTransport`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: OutgoingRequest) -> TransportFuture {
		let OutgoingRequest { method, url, headers, body, .. } = request;
		let mut builder = self.0.request(method, url).headers(headers);

		if let Some(body) = body {
			builder = builder.body(body);
		}

		let pending = builder.send();

		Box::pin(async move {
			let response = pending.await.map_err(TransportError::from)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(HttpResponse { status, headers, body })
		})
	}
}

fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
