//! Credential record persisted for a signed-in console user, plus its builder.

// self
use crate::{
	_prelude::*,
	auth::{CompanyId, StoreId, token::secret::TokenSecret},
};

/// Reference to a store (branch) the user may operate on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRef {
	/// Store identifier.
	pub id: StoreId,
	/// Human-readable store name.
	pub name: String,
}
impl StoreRef {
	/// Creates a store reference.
	pub fn new(id: StoreId, name: impl Into<String>) -> Self {
		Self { id, name: name.into() }
	}
}

/// Errors produced by [`CredentialRecordBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum CredentialRecordBuilderError {
	/// No access token was supplied.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// No refresh token was supplied.
	#[error("Refresh token is required.")]
	MissingRefreshToken,
	/// No company identifier was supplied.
	#[error("Company identifier is required.")]
	MissingCompanyId,
}

/// Session credentials for one signed-in user.
///
/// Both tokens are mandatory, so a record either carries a full session or does not exist at
/// all. Only the refresh operation rotates the tokens; role, company, and store assignments
/// change only when a new record is saved at sign-in.
#[derive(Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Short-lived bearer credential.
	pub access_token: TokenSecret,
	/// Longer-lived credential exchanged for new access tokens.
	pub refresh_token: TokenSecret,
	/// Role label assigned by the backend (e.g. `admin`).
	pub role: String,
	/// Company the user acts for.
	pub company_id: CompanyId,
	/// Store the user is currently assigned to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub assigned_store: Option<StoreRef>,
	/// Stores the user may switch between.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub stores: Vec<StoreRef>,
	/// Instant the session was established.
	#[serde(with = "time::serde::rfc3339")]
	pub signed_in_at: OffsetDateTime,
	/// Instant of the most recent successful token refresh.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub refreshed_at: Option<OffsetDateTime>,
}
impl CredentialRecord {
	/// Returns a builder for a freshly signed-in session.
	pub fn builder() -> CredentialRecordBuilder {
		CredentialRecordBuilder::default()
	}

	/// Replaces the access token and, when supplied, the refresh token.
	pub fn rotate(
		&mut self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		instant: OffsetDateTime,
	) {
		self.access_token = access_token;

		if let Some(refresh_token) = refresh_token {
			self.refresh_token = refresh_token;
		}

		self.refreshed_at = Some(instant);
	}
}
impl Debug for CredentialRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialRecord")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("role", &self.role)
			.field("company_id", &self.company_id)
			.field("assigned_store", &self.assigned_store)
			.field("stores", &self.stores)
			.field("signed_in_at", &self.signed_in_at)
			.field("refreshed_at", &self.refreshed_at)
			.finish()
	}
}

/// Builder for [`CredentialRecord`].
#[derive(Clone, Debug, Default)]
pub struct CredentialRecordBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	role: String,
	company_id: Option<CompanyId>,
	assigned_store: Option<StoreRef>,
	stores: Vec<StoreRef>,
	signed_in_at: Option<OffsetDateTime>,
}
impl CredentialRecordBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Sets the role label.
	pub fn role(mut self, role: impl Into<String>) -> Self {
		self.role = role.into();

		self
	}

	/// Sets the company identifier.
	pub fn company_id(mut self, company_id: CompanyId) -> Self {
		self.company_id = Some(company_id);

		self
	}

	/// Sets the store the user is assigned to.
	pub fn assigned_store(mut self, store: StoreRef) -> Self {
		self.assigned_store = Some(store);

		self
	}

	/// Replaces the list of stores the user may switch between.
	pub fn stores(mut self, stores: impl IntoIterator<Item = StoreRef>) -> Self {
		self.stores = stores.into_iter().collect();

		self
	}

	/// Overrides the sign-in instant (defaults to now).
	pub fn signed_in_at(mut self, instant: OffsetDateTime) -> Self {
		self.signed_in_at = Some(instant);

		self
	}

	/// Consumes the builder and produces a [`CredentialRecord`].
	pub fn build(self) -> Result<CredentialRecord, CredentialRecordBuilderError> {
		let access_token =
			self.access_token.ok_or(CredentialRecordBuilderError::MissingAccessToken)?;
		let refresh_token =
			self.refresh_token.ok_or(CredentialRecordBuilderError::MissingRefreshToken)?;
		let company_id = self.company_id.ok_or(CredentialRecordBuilderError::MissingCompanyId)?;

		Ok(CredentialRecord {
			access_token,
			refresh_token,
			role: self.role,
			company_id,
			assigned_store: self.assigned_store,
			stores: self.stores,
			signed_in_at: self.signed_in_at.unwrap_or_else(OffsetDateTime::now_utc),
			refreshed_at: None,
		})
	}
}
