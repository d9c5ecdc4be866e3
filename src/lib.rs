//! Session-keeping HTTP client layer for the business console.
//!
//! Every call to a backend service is signed with the session's bearer token. When a call comes
//! back `401`, the service's [`RefreshCoordinator`](session::RefreshCoordinator) runs exactly one
//! refresh for all concurrent failures, replays them in order with the new token, and tears the
//! session down when the refresh token itself is dead.
//!
//! ```no_run
//! # async fn demo() -> console_session::error::Result<()> {
//! use std::sync::Arc;
//!
//! use console_session::{
//! 	auth::ServiceId,
//! 	service::ServiceDescriptor,
//! 	session::{RecordingNavigator, Session},
//! 	store::MemoryStore,
//! 	url::Url,
//! };
//!
//! let session =
//! 	Session::builder(Arc::new(MemoryStore::default()), Arc::new(RecordingNavigator::default()))
//! 		.build();
//! let sales = session.reqwest_service(
//! 	ServiceDescriptor::builder(ServiceId::new("sales").expect("valid id"))
//! 		.base_url(Url::parse("https://sales.example.com/api/").expect("valid url"))
//! 		.build()
//! 		.expect("valid descriptor"),
//! );
//! let orders = sales.send(sales.get("orders/")?).await?;
//! # let _ = orders;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod error;
pub mod ext;
pub mod obs;
pub mod service;
pub mod session;
pub mod store;
pub mod transport;

mod _prelude {
	pub use std::{
		collections::{HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use http;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
