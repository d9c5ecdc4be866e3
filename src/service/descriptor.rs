//! Validated description of one backend service.

// self
use crate::{_prelude::*, auth::ServiceId};

/// Path of the refresh endpoint relative to a service base URL.
pub const DEFAULT_REFRESH_PATH: &str = "auth/refresh-token/";

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ServiceDescriptorError {
	/// Base URL is mandatory.
	#[error("Missing base URL.")]
	MissingBaseUrl,
	/// The base URL cannot have relative paths joined onto it.
	#[error("The base URL cannot be used as a base: {url}.")]
	CannotBeABase {
		/// Offending URL.
		url: String,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The default refresh endpoint could not be derived from the base URL.
	#[error("Refresh endpoint could not be derived from {url}.")]
	InvalidRefreshEndpoint {
		/// Base URL used for the derivation.
		url: String,
	},
}

/// Immutable description of a backend service consumed by service clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
	/// Descriptor identifier, used in logs and metrics.
	pub id: ServiceId,
	/// Base URL that request paths are joined onto.
	pub base_url: Url,
	/// Endpoint that exchanges a refresh token for a new access token.
	pub refresh_endpoint: Url,
}
impl ServiceDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ServiceId) -> ServiceDescriptorBuilder {
		ServiceDescriptorBuilder::new(id)
	}

	/// Resolves `path` against the base URL.
	pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
		self.base_url.join(path.trim_start_matches('/'))
	}
}

/// Builder for [`ServiceDescriptor`] values.
#[derive(Debug)]
pub struct ServiceDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ServiceId,
	/// Base URL for the service.
	pub base_url: Option<Url>,
	/// Explicit refresh endpoint; derived from the base URL when absent.
	pub refresh_endpoint: Option<Url>,
}
impl ServiceDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ServiceId) -> Self {
		Self { id, base_url: None, refresh_endpoint: None }
	}

	/// Sets the base URL. A trailing slash is added when missing so relative joins keep the
	/// last path segment.
	pub fn base_url(mut self, mut url: Url) -> Self {
		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		self.base_url = Some(url);

		self
	}

	/// Overrides the refresh endpoint.
	pub fn refresh_endpoint(mut self, url: Url) -> Self {
		self.refresh_endpoint = Some(url);

		self
	}

	/// Validates the configuration and produces a [`ServiceDescriptor`].
	pub fn build(self) -> Result<ServiceDescriptor, ServiceDescriptorError> {
		let base_url = self.base_url.ok_or(ServiceDescriptorError::MissingBaseUrl)?;

		if base_url.cannot_be_a_base() {
			return Err(ServiceDescriptorError::CannotBeABase { url: base_url.to_string() });
		}

		validate_endpoint("base", &base_url)?;

		let refresh_endpoint = match self.refresh_endpoint {
			Some(url) => url,
			None => base_url.join(DEFAULT_REFRESH_PATH).map_err(|_| {
				ServiceDescriptorError::InvalidRefreshEndpoint { url: base_url.to_string() }
			})?,
		};

		validate_endpoint("refresh", &refresh_endpoint)?;

		Ok(ServiceDescriptor { id: self.id, base_url, refresh_endpoint })
	}
}

fn validate_endpoint(endpoint: &'static str, url: &Url) -> Result<(), ServiceDescriptorError> {
	if url.scheme() == "https" || is_loopback(url) {
		return Ok(());
	}

	Err(ServiceDescriptorError::InsecureEndpoint { endpoint, url: url.to_string() })
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(addr)) => addr.is_loopback(),
		Some(url::Host::Ipv6(addr)) => addr.is_loopback(),
		None => false,
	}
}
