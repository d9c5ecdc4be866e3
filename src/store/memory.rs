//! In-process [`TokenStore`] for tests, demos, and hosts without durable storage.

// self
use crate::{
	_prelude::*,
	auth::{CredentialRecord, TokenSecret},
	store::{StoreError, StoreFuture, TokenStore, TokenUpdateOutcome},
};

type Slot = Arc<RwLock<Option<CredentialRecord>>>;

/// Thread-safe store keeping the record in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(Slot);
impl MemoryStore {
	/// Creates a store already holding `record`.
	pub fn with_record(record: CredentialRecord) -> Self {
		Self(Arc::new(RwLock::new(Some(record))))
	}

	/// Returns a copy of the current record without going through the async contract.
	pub fn snapshot(&self) -> Option<CredentialRecord> {
		self.0.read().clone()
	}

	fn update_now(
		slot: Slot,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		instant: OffsetDateTime,
	) -> TokenUpdateOutcome {
		let mut guard = slot.write();

		match guard.as_mut() {
			Some(record) => {
				record.rotate(access_token, refresh_token, instant);

				TokenUpdateOutcome::Updated
			},
			None => TokenUpdateOutcome::Missing,
		}
	}
}
impl TokenStore for MemoryStore {
	fn load(&self) -> StoreFuture<'_, Option<CredentialRecord>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok::<_, StoreError>(slot.read().clone()) })
	}

	fn save(&self, record: CredentialRecord) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.write() = Some(record);

			Ok(())
		})
	}

	fn update_tokens(
		&self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		instant: OffsetDateTime,
	) -> StoreFuture<'_, TokenUpdateOutcome> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(Self::update_now(slot, access_token, refresh_token, instant)) })
	}

	fn clear(&self) -> StoreFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.write().take();

			Ok(())
		})
	}
}
