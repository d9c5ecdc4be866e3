//! Demonstrates one console session driving two backend services against a mock server.
//!
//! Both services start with an access token the backend no longer accepts. Each one refreshes
//! through its own coordinator, replays the failed call, and the final sign-out navigates to the
//! sign-in route through a closure navigator.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use url::Url;
// self
use console_session::{
	auth::{CompanyId, CredentialRecord, ServiceId},
	service::ServiceDescriptor,
	session::{NavigatorFn, Session},
	store::{MemoryStore, TokenStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;

	for (prefix, body) in [("/sales", "[{\"order\":1}]"), ("/inventory", "[{\"sku\":\"X-1\"}]")] {
		server
			.mock_async(|when, then| {
				when.method(GET)
					.path(format!("{prefix}/api/list/"))
					.header("authorization", "Bearer stale");
				then.status(401);
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(GET)
					.path(format!("{prefix}/api/list/"))
					.header("authorization", "Bearer fresh");
				then.status(200).header("content-type", "application/json").body(body);
			})
			.await;
		server
			.mock_async(|when, then| {
				when.method(POST).path(format!("{prefix}/api/auth/refresh-token/"));
				then.status(200)
					.header("content-type", "application/json")
					.body("{\"access\":\"fresh\"}");
			})
			.await;
	}

	let store: Arc<dyn TokenStore> = Arc::new(MemoryStore::default());
	let navigator = NavigatorFn(|route: &str| println!("navigating to {route}"));
	let session = Session::builder(store, Arc::new(navigator)).build();

	session
		.sign_in(
			CredentialRecord::builder()
				.access_token("stale")
				.refresh_token("demo-refresh")
				.role("admin")
				.company_id(CompanyId::new("acme")?)
				.build()?,
		)
		.await?;

	let sales = session.reqwest_service(
		ServiceDescriptor::builder(ServiceId::new("sales")?)
			.base_url(Url::parse(&server.url("/sales/api/"))?)
			.build()?,
	);
	let inventory = session.reqwest_service(
		ServiceDescriptor::builder(ServiceId::new("inventory")?)
			.base_url(Url::parse(&server.url("/inventory/api/"))?)
			.build()?,
	);
	let (orders, items) =
		tokio::join!(sales.send(sales.get("list/")?), inventory.send(inventory.get("list/")?));

	println!("sales: {}", orders?.text());
	println!("inventory: {}", items?.text());
	println!(
		"refreshes: sales={} inventory={}",
		sales.coordinator().metrics().recovered(),
		inventory.coordinator().metrics().recovered()
	);

	session.sign_out().await;

	Ok(())
}
