//! Authenticated client for one backend service.

// crates.io
use http::Method;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, StatusError},
	ext::RequestSigner,
	service::ServiceDescriptor,
	session::coordinator::{RefreshCoordinator, Replay, ResponseFuture},
	store::TokenStore,
	transport::{HttpTransport, OutgoingRequest},
};

/// Sends requests to one service, signing them with the session token and recovering from
/// expired access tokens through the service's [`RefreshCoordinator`].
///
/// Cloning is cheap; clones share the coordinator.
pub struct ServiceClient<T>
where
	T: ?Sized + HttpTransport,
{
	inner: Arc<ClientInner<T>>,
}
impl<T> ServiceClient<T>
where
	T: ?Sized + HttpTransport,
{
	pub(crate) fn new(
		descriptor: ServiceDescriptor,
		transport: Arc<T>,
		store: Arc<dyn TokenStore>,
		signer: Arc<dyn RequestSigner>,
		coordinator: RefreshCoordinator<T>,
	) -> Self {
		Self { inner: Arc::new(ClientInner { descriptor, transport, store, signer, coordinator }) }
	}

	/// Descriptor this client was built from.
	pub fn descriptor(&self) -> &ServiceDescriptor {
		&self.inner.descriptor
	}

	/// Refresh coordinator owned by this service.
	pub fn coordinator(&self) -> &RefreshCoordinator<T> {
		&self.inner.coordinator
	}

	/// Builds a request for `path`, resolved against the service base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<OutgoingRequest> {
		let url = self
			.inner
			.descriptor
			.url(path)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })?;

		Ok(OutgoingRequest::new(method, url))
	}

	/// Shorthand for a `GET` to `path`.
	pub fn get(&self, path: &str) -> Result<OutgoingRequest> {
		self.request(Method::GET, path)
	}

	/// Shorthand for a `POST` to `path`.
	pub fn post(&self, path: &str) -> Result<OutgoingRequest> {
		self.request(Method::POST, path)
	}

	/// Signs and sends `request`.
	///
	/// Resolves with the 2xx response, possibly after a transparent refresh and replay. Any other
	/// status comes back as [`Error::Status`] with the response untouched.
	pub fn send(&self, request: OutgoingRequest) -> ResponseFuture {
		let client = self.clone();

		Box::pin(async move {
			let mut request = request;
			let credentials = client.inner.store.load().await?;

			client.inner.signer.sign(&mut request, credentials.as_ref())?;

			client.transmit(request).await
		})
	}

	/// Dispatches an already-signed request; the transport call starts before this returns.
	fn transmit(&self, request: OutgoingRequest) -> ResponseFuture {
		let dispatched = self.inner.transport.send(request.clone());
		let client = self.clone();

		Box::pin(async move {
			let response = dispatched.await?;

			if response.is_success() {
				return Ok(response);
			}

			let failure = StatusError {
				method: request.method.clone(),
				url: request.url.clone(),
				response,
			};

			if !failure.is_unauthorized() {
				return Err(Error::Status(failure));
			}

			let replay = client.replayer();

			client.inner.coordinator.handle_unauthorized(request, failure, replay).await
		})
	}

	fn replayer(&self) -> Replay {
		let client = self.clone();

		Arc::new(move |request: OutgoingRequest| client.transmit(request))
	}
}
impl<T> Clone for ServiceClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { inner: self.inner.clone() }
	}
}
impl<T> Debug for ServiceClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceClient")
			.field("service", &self.inner.descriptor.id)
			.field("base_url", &self.inner.descriptor.base_url.as_str())
			.field("coordinator", &self.inner.coordinator)
			.finish()
	}
}

struct ClientInner<T>
where
	T: ?Sized + HttpTransport,
{
	descriptor: ServiceDescriptor,
	transport: Arc<T>,
	store: Arc<dyn TokenStore>,
	signer: Arc<dyn RequestSigner>,
	coordinator: RefreshCoordinator<T>,
}
