//! Session teardown: wipe the token store, then leave the app through a full navigation.

// self
use crate::{_prelude::*, store::TokenStore};

/// Performs the full (non client-side) navigation that ends a session.
///
/// Hosts implement this with whatever reloads the application shell, discarding in-memory state.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to `location`.
	fn navigate(&self, location: &str);
}

/// Adapter turning a closure into a [`Navigator`].
#[derive(Clone, Copy)]
pub struct NavigatorFn<F>(pub F);
impl<F> Navigator for NavigatorFn<F>
where
	F: Fn(&str) + Send + Sync,
{
	fn navigate(&self, location: &str) {
		(self.0)(location)
	}
}
impl<F> Debug for NavigatorFn<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("NavigatorFn")
	}
}

/// [`Navigator`] that only remembers where it was sent. Useful for headless hosts and tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingNavigator(Arc<Mutex<Vec<String>>>);
impl RecordingNavigator {
	/// Every location navigated to, oldest first.
	pub fn visits(&self) -> Vec<String> {
		self.0.lock().clone()
	}

	/// Number of navigations performed so far.
	pub fn count(&self) -> usize {
		self.0.lock().len()
	}
}
impl Navigator for RecordingNavigator {
	fn navigate(&self, location: &str) {
		self.0.lock().push(location.to_owned());
	}
}

/// Clears the credential record and redirects to the sign-in route.
#[derive(Clone)]
pub struct SessionTeardown {
	store: Arc<dyn TokenStore>,
	navigator: Arc<dyn Navigator>,
	sign_in_route: String,
}
impl SessionTeardown {
	/// Creates a teardown bound to `store` and `navigator`.
	pub fn new(
		store: Arc<dyn TokenStore>,
		navigator: Arc<dyn Navigator>,
		sign_in_route: impl Into<String>,
	) -> Self {
		Self { store, navigator, sign_in_route: sign_in_route.into() }
	}

	/// Route the navigator is sent to.
	pub fn sign_in_route(&self) -> &str {
		&self.sign_in_route
	}

	/// Clears the store and navigates to the sign-in route.
	///
	/// Store failures are logged, not returned; the navigation happens regardless.
	pub async fn teardown(&self) {
		if let Err(e) = self.store.clear().await {
			tracing::warn!(error = %e, "token store could not be cleared during teardown");
		}

		tracing::info!(route = %self.sign_in_route, "session torn down");

		self.navigator.navigate(&self.sign_in_route);
	}
}
impl Debug for SessionTeardown {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTeardown").field("sign_in_route", &self.sign_in_route).finish()
	}
}
