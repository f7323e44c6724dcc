//! Admission middleware
//!
//! Tower layer running every request of an axum router through the [`Gate`].

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use tower::{Layer, Service};

use crate::extract::{self, ServerMode};
use crate::gate::Gate;

#[derive(Clone, Debug)]
pub struct AdmissionLayer {
	gate: Gate,
	mode: ServerMode,
}

impl AdmissionLayer {
	pub fn new(gate: Gate, mode: ServerMode) -> Self {
		Self { gate, mode }
	}
}

impl<S> Layer<S> for AdmissionLayer {
	type Service = AdmissionService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		AdmissionService { inner, gate: self.gate.clone(), mode: self.mode }
	}
}

#[derive(Clone, Debug)]
pub struct AdmissionService<S> {
	inner: S,
	gate: Gate,
	mode: ServerMode,
}

impl<S> Service<Request<Body>> for AdmissionService<S>
where
	S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
	S::Future: Send + 'static,
	S::Error: Send + 'static,
{
	type Response = Response;
	type Error = S::Error;
	type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, req: Request<Body>) -> Self::Future {
		let gate = self.gate.clone();
		let mode = self.mode;
		// Keep the service that was polled ready
		let clone = self.inner.clone();
		let mut inner = std::mem::replace(&mut self.inner, clone);

		Box::pin(async move {
			let client = extract::client_id(&req, mode);
			let target = extract::request_target(&req);

			match gate.intercept(&client, &target, move || inner.call(req)).await {
				Ok(result) => result,
				Err(rejection) => Ok(rejection.into_response()),
			}
		})
	}
}

// vim: ts=4
