#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	io,
	sync::Arc,
};
// crates.io
use futures::channel::oneshot;
use parking_lot::Mutex;
// self
use console_session::{
	auth::{CompanyId, CredentialRecord, ServiceId},
	error::TransportError,
	http::{
		HeaderValue, Method, StatusCode,
		header::RETRY_AFTER,
	},
	service::ServiceDescriptor,
	session::{RecordingNavigator, ServiceClient, Session},
	store::MemoryStore,
	transport::{HttpResponse, HttpTransport, OutgoingRequest, TransportFuture},
	url::Url,
};

pub const REFRESH_PATH: &str = "/api/auth/refresh-token/";

/// One call observed by [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatch {
	pub method: Method,
	pub path: String,
	pub authorization: Option<String>,
	pub body: Option<String>,
}

/// Scripted answer for the next refresh call.
#[derive(Clone, Debug)]
pub enum RefreshReply {
	Issue { access: &'static str, refresh: Option<&'static str> },
	Fail { status: StatusCode, body: &'static str, retry_after: Option<&'static str> },
	Network,
}

#[derive(Default)]
struct Backend {
	accepted_token: Option<String>,
	replies: VecDeque<RefreshReply>,
	gate: Option<oneshot::Receiver<()>>,
	resource_gate: Option<oneshot::Receiver<()>>,
	fixed: HashMap<String, StatusCode>,
	log: Vec<Dispatch>,
}

/// In-process backend for one service.
///
/// Resource calls succeed only when they carry the currently accepted token; refresh calls
/// follow the scripted replies and switch the accepted token when they issue one.
#[derive(Clone, Default)]
pub struct ScriptedTransport(Arc<Mutex<Backend>>);
impl ScriptedTransport {
	pub fn accepting(token: &str) -> Self {
		let transport = Self::default();

		transport.0.lock().accepted_token = Some(token.to_owned());

		transport
	}

	pub fn reply(&self, reply: RefreshReply) -> &Self {
		self.0.lock().replies.push_back(reply);

		self
	}

	/// Holds the next refresh call until the returned sender fires or is dropped.
	pub fn gate_next_refresh(&self) -> oneshot::Sender<()> {
		let (sender, receiver) = oneshot::channel();

		self.0.lock().gate = Some(receiver);

		sender
	}

	/// Holds the response to the next resource call; the call itself is logged right away.
	pub fn hold_next_response(&self) -> oneshot::Sender<()> {
		let (sender, receiver) = oneshot::channel();

		self.0.lock().resource_gate = Some(receiver);

		sender
	}

	/// Answers every call to `path` with `status`, whatever token it carries.
	pub fn fix_status(&self, path: &str, status: StatusCode) -> &Self {
		self.0.lock().fixed.insert(path.to_owned(), status);

		self
	}

	pub fn log(&self) -> Vec<Dispatch> {
		self.0.lock().log.clone()
	}

	pub fn refresh_calls(&self) -> usize {
		self.0.lock().log.iter().filter(|dispatch| dispatch.path == REFRESH_PATH).count()
	}

	/// Resource dispatches (refresh calls excluded) in dispatch order.
	pub fn resource_log(&self) -> Vec<Dispatch> {
		self.0.lock().log.iter().filter(|dispatch| dispatch.path != REFRESH_PATH).cloned().collect()
	}
}
impl HttpTransport for ScriptedTransport {
	fn send(&self, request: OutgoingRequest) -> TransportFuture {
		let dispatch = Dispatch {
			method: request.method.clone(),
			path: request.url.path().to_owned(),
			authorization: request
				.authorization()
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned),
			body: request.body.as_ref().map(|body| String::from_utf8_lossy(body).into_owned()),
		};
		let mut backend = self.0.lock();

		backend.log.push(dispatch.clone());

		if dispatch.path == REFRESH_PATH {
			let reply = backend.replies.pop_front();
			let gate = backend.gate.take();
			let shared = self.0.clone();

			return Box::pin(async move {
				if let Some(gate) = gate {
					let _ = gate.await;
				}

				match reply {
					Some(RefreshReply::Issue { access, refresh }) => {
						shared.lock().accepted_token = Some(access.to_owned());

						let body = match refresh {
							Some(refresh) => format!(r#"{{"access":"{access}","refresh":"{refresh}"}}"#),
							None => format!(r#"{{"access":"{access}"}}"#),
						};

						Ok(HttpResponse::new(StatusCode::OK, body))
					},
					Some(RefreshReply::Fail { status, body, retry_after }) => {
						let mut response = HttpResponse::new(status, body);

						if let Some(value) = retry_after {
							response.headers.insert(RETRY_AFTER, HeaderValue::from_static(value));
						}

						Ok(response)
					},
					Some(RefreshReply::Network) => Err(TransportError::network(io::Error::new(
						io::ErrorKind::ConnectionReset,
						"connection reset by peer",
					))),
					None => Ok(HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR, "unscripted")),
				}
			});
		}

		let response = if let Some(status) = backend.fixed.get(&dispatch.path) {
			HttpResponse::new(*status, "{}")
		} else {
			let expected = backend.accepted_token.as_ref().map(|token| format!("Bearer {token}"));

			if expected.is_some() && dispatch.authorization == expected {
				HttpResponse::new(StatusCode::OK, dispatch.path.clone())
			} else {
				HttpResponse::new(StatusCode::UNAUTHORIZED, r#"{"detail":"Token is invalid"}"#)
			}
		};

		let gate = backend.resource_gate.take();

		Box::pin(async move {
			if let Some(gate) = gate {
				let _ = gate.await;
			}

			Ok::<_, TransportError>(response)
		})
	}
}

pub struct Harness {
	pub session: Session,
	pub client: ServiceClient<ScriptedTransport>,
	pub transport: ScriptedTransport,
	pub store: MemoryStore,
	pub navigator: RecordingNavigator,
}

pub fn record(access: &str, refresh: &str) -> CredentialRecord {
	CredentialRecord::builder()
		.access_token(access)
		.refresh_token(refresh)
		.role("admin")
		.company_id(CompanyId::new("C1").expect("Company fixture should be valid."))
		.build()
		.expect("Credential record fixture should build successfully.")
}

pub fn descriptor(service: &str) -> ServiceDescriptor {
	let base = format!("https://{service}.example.com/api/");

	ServiceDescriptor::builder(ServiceId::new(service).expect("Service fixture should be valid."))
		.base_url(Url::parse(&base).expect("Fixture URL should parse."))
		.build()
		.expect("Service descriptor fixture should build successfully.")
}

/// Signed-in session with one `sales` service whose backend accepts `accepted` only.
pub fn harness(accepted: &str) -> Harness {
	let store = MemoryStore::with_record(record("A1", "R1"));
	let navigator = RecordingNavigator::default();
	let session = Session::builder(Arc::new(store.clone()), Arc::new(navigator.clone())).build();
	let transport = ScriptedTransport::accepting(accepted);
	let client: ServiceClient<ScriptedTransport> =
		session.service(descriptor("sales"), transport.clone());

	Harness { session, client, transport, store, navigator }
}
