//! Capturing transport.
//!
//! # Responsibilities
//! - Wrap any [`Transport`] with the same send signature
//! - Buffer the full response body, capture it, hand back a replayable body
//!
//! # Design Decisions
//! - A capture is emitted only once the whole body is in memory, so a
//!   record is either complete or absent
//! - Any error while sending or buffering propagates unchanged and emits
//!   nothing
//! - No size cap: memory use follows the response size

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

use crate::capture::dump::dump_response;
use crate::capture::record::{CaptureRecord, ExchangeId};
use crate::capture::sink::CaptureSink;
use crate::error::{ProxyError, Result};

/// Something that can send a request and produce a response.
pub trait Transport: Send + Sync {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>>> {
        (**self).send(request)
    }
}

/// Records every successful response passing through `inner`.
pub struct CapturingTransport<T> {
    inner: T,
    sink: Arc<dyn CaptureSink>,
}

impl<T: Transport> CapturingTransport<T> {
    pub fn new(inner: T, sink: Arc<dyn CaptureSink>) -> Self {
        Self { inner, sink }
    }

    async fn send_and_capture(&self, request: Request<Body>) -> Result<Response<Body>> {
        // Carried from the dispatcher so both halves share one ID.
        let exchange = request
            .extensions()
            .get::<ExchangeId>()
            .copied()
            .unwrap_or_else(ExchangeId::next);

        let response = self.inner.send(request).await?;
        let (parts, body) = response.into_parts();

        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(ProxyError::Capture)?;

        self.sink
            .emit(&CaptureRecord::response(exchange, dump_response(&parts, &bytes)));
        tracing::trace!(exchange = %exchange, body_len = bytes.len(), "Response captured");

        Ok(Response::from_parts(parts, Body::from(bytes)))
    }
}

impl<T: Transport> Transport for CapturingTransport<T> {
    fn send(&self, request: Request<Body>) -> BoxFuture<'_, Result<Response<Body>>> {
        Box::pin(self.send_and_capture(request))
    }
}
