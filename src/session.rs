//! Session facade wiring the token store, signer, classifier, and teardown into per-service
//! clients.
//!
//! A [`Session`] is created once per application. Each backend service gets its own
//! [`ServiceClient`] from [`Session::service`], and with it its own [`RefreshCoordinator`]; the
//! store is the only state the services share.

pub mod client;
pub mod coordinator;
pub mod refresh;
pub mod teardown;

pub use client::*;
pub use coordinator::*;
pub use refresh::*;
pub use teardown::*;

// self
use crate::{
	_prelude::*,
	auth::CredentialRecord,
	ext::{BearerSigner, RequestSigner},
	service::{DefaultRefreshClassifier, RefreshClassifier, ServiceDescriptor},
	store::TokenStore,
	transport::HttpTransport,
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

/// Host-level session settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Route the navigator is sent to on teardown.
	#[serde(default = "SessionConfig::default_sign_in_route")]
	pub sign_in_route: String,
}
impl SessionConfig {
	/// Sign-in route used when none is configured.
	pub const DEFAULT_SIGN_IN_ROUTE: &'static str = "/login";

	fn default_sign_in_route() -> String {
		Self::DEFAULT_SIGN_IN_ROUTE.into()
	}
}
impl Default for SessionConfig {
	fn default() -> Self {
		Self { sign_in_route: Self::default_sign_in_route() }
	}
}

/// Authenticated session shared by every service client of the console.
#[derive(Clone)]
pub struct Session {
	store: Arc<dyn TokenStore>,
	signer: Arc<dyn RequestSigner>,
	classifier: Arc<dyn RefreshClassifier>,
	teardown: SessionTeardown,
	config: SessionConfig,
}
impl Session {
	/// Starts a builder around the shared store and the navigator used on teardown.
	pub fn builder(store: Arc<dyn TokenStore>, navigator: Arc<dyn Navigator>) -> SessionBuilder {
		SessionBuilder::new(store, navigator)
	}

	/// Active configuration.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// Token store shared by every service client.
	pub fn store(&self) -> &Arc<dyn TokenStore> {
		&self.store
	}

	/// Creates a client for `descriptor` with its own refresh coordinator.
	pub fn service<T>(
		&self,
		descriptor: ServiceDescriptor,
		transport: impl Into<Arc<T>>,
	) -> ServiceClient<T>
	where
		T: ?Sized + HttpTransport,
	{
		let transport = transport.into();
		let refresher = Refresher::new(
			descriptor.id.clone(),
			descriptor.refresh_endpoint.clone(),
			transport.clone(),
			self.store.clone(),
			self.classifier.clone(),
		);
		let coordinator = RefreshCoordinator::new(
			descriptor.id.clone(),
			refresher,
			self.store.clone(),
			self.teardown.clone(),
		);

		tracing::debug!(service = %descriptor.id, base_url = %descriptor.base_url, "service client created");

		ServiceClient::new(descriptor, transport, self.store.clone(), self.signer.clone(), coordinator)
	}

	/// Creates a reqwest-backed client for `descriptor`.
	#[cfg(feature = "reqwest")]
	pub fn reqwest_service(&self, descriptor: ServiceDescriptor) -> ServiceClient<ReqwestTransport> {
		self.service(descriptor, ReqwestTransport::default())
	}

	/// Persists the record produced by a login or OTP verification.
	pub async fn sign_in(&self, record: CredentialRecord) -> Result<()> {
		self.store.save(record).await?;

		tracing::info!("session established");

		Ok(())
	}

	/// Ends the session: clears the store and navigates to the sign-in route.
	pub async fn sign_out(&self) {
		self.teardown.teardown().await;
	}

	/// Current credential record, if signed in.
	pub async fn credentials(&self) -> Result<Option<CredentialRecord>> {
		Ok(self.store.load().await?)
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session").field("config", &self.config).finish()
	}
}

/// Builder for [`Session`].
pub struct SessionBuilder {
	store: Arc<dyn TokenStore>,
	navigator: Arc<dyn Navigator>,
	signer: Option<Arc<dyn RequestSigner>>,
	classifier: Option<Arc<dyn RefreshClassifier>>,
	config: SessionConfig,
}
impl SessionBuilder {
	/// Creates a builder with the bearer signer, the default classifier, and default config.
	pub fn new(store: Arc<dyn TokenStore>, navigator: Arc<dyn Navigator>) -> Self {
		Self { store, navigator, signer: None, classifier: None, config: SessionConfig::default() }
	}

	/// Replaces the request signer.
	pub fn signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
		self.signer = Some(signer);

		self
	}

	/// Replaces the refresh-failure classifier.
	pub fn classifier(mut self, classifier: Arc<dyn RefreshClassifier>) -> Self {
		self.classifier = Some(classifier);

		self
	}

	/// Replaces the whole configuration.
	pub fn config(mut self, config: SessionConfig) -> Self {
		self.config = config;

		self
	}

	/// Overrides the sign-in route.
	pub fn sign_in_route(mut self, route: impl Into<String>) -> Self {
		self.config.sign_in_route = route.into();

		self
	}

	/// Finalizes the session.
	pub fn build(self) -> Session {
		let teardown =
			SessionTeardown::new(self.store.clone(), self.navigator, self.config.sign_in_route.clone());

		Session {
			store: self.store,
			signer: self.signer.unwrap_or_else(|| Arc::new(BearerSigner)),
			classifier: self.classifier.unwrap_or_else(|| Arc::new(DefaultRefreshClassifier)),
			teardown,
			config: self.config,
		}
	}
}
impl Debug for SessionBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionBuilder")
			.field("custom_signer", &self.signer.is_some())
			.field("custom_classifier", &self.classifier.is_some())
			.field("config", &self.config)
			.finish()
	}
}
