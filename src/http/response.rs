//! Response relay.
//!
//! # Responsibilities
//! - Commit the upstream status and (flattened) headers to the client
//! - Stream the upstream body to the client chunk by chunk
//! - Produce the generic failure response
//!
//! # Design Decisions
//! - Status is relayed verbatim; the gateway never rewrites it
//! - Streaming responses avoid buffering the body
//! - Once headers are committed a failure can only be logged: the client
//!   observes a truncated body
//! - The upstream body is owned by the relay and dropped on every exit path

use std::future::Future;

use axum::http::{HeaderMap, Response, StatusCode};
use bytes::Bytes;
use h3::server::RequestStream;
use http_body_util::BodyExt;
use hyper::body::Incoming;

use crate::http::headers::flatten_headers;

/// Response received from the upstream. The body has not been read yet.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Incoming,
}

impl UpstreamResponse {
    pub fn from_http(response: Response<Incoming>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }

    /// Response head as it will be sent to the client.
    pub fn client_head(&self) -> Response<()> {
        let mut head = Response::new(());
        *head.status_mut() = self.status;
        *head.headers_mut() = flatten_headers(&self.headers);
        head
    }
}

/// Where a response is written back to the client.
///
/// Implemented for the send half of an HTTP/3 request stream.
pub trait ResponseSink: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Commit status and headers.
    fn send_response(
        &mut self,
        head: Response<()>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn send_data(&mut self, data: Bytes) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Signal end of body.
    fn finish(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Send half of an HTTP/3 request stream.
pub type H3SendStream = RequestStream<h3_quinn::SendStream<Bytes>, Bytes>;

impl ResponseSink for H3SendStream {
    type Error = h3::Error;

    async fn send_response(&mut self, head: Response<()>) -> Result<(), h3::Error> {
        RequestStream::send_response(self, head).await
    }

    async fn send_data(&mut self, data: Bytes) -> Result<(), h3::Error> {
        RequestStream::send_data(self, data).await
    }

    async fn finish(&mut self) -> Result<(), h3::Error> {
        RequestStream::finish(self).await
    }
}

/// Failure while relaying a response.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The head could not be written; nothing reached the client.
    #[error("failed to send response head: {0}")]
    Commit(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The upstream body failed after the head was committed.
    #[error("upstream body failed after {bytes_sent} bytes: {source}")]
    UpstreamBody {
        bytes_sent: u64,
        #[source]
        source: hyper::Error,
    },
    /// Writing to the client failed after the head was committed.
    #[error("client write failed after {bytes_sent} bytes: {source}")]
    Downstream {
        bytes_sent: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// The client connection closed while the body was being relayed.
    #[error("client disconnected during relay")]
    ClientDisconnected,
}

impl RelayError {
    /// Whether the client already received the response head.
    pub fn is_committed(&self) -> bool {
        !matches!(self, RelayError::Commit(_))
    }
}

/// Copy `response` to `sink`: head first, then the body until end of stream.
///
/// Returns the number of body bytes written.
pub async fn relay<S: ResponseSink>(
    response: UpstreamResponse,
    sink: &mut S,
) -> Result<u64, RelayError> {
    let head = response.client_head();
    let mut body = response.body;

    sink.send_response(head)
        .await
        .map_err(|e| RelayError::Commit(Box::new(e)))?;

    let mut bytes_sent = 0u64;
    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(|source| RelayError::UpstreamBody { bytes_sent, source })?;
        let Ok(data) = frame.into_data() else {
            tracing::debug!("Ignoring upstream trailers");
            continue;
        };
        let len = data.len() as u64;
        sink.send_data(data)
            .await
            .map_err(|e| RelayError::Downstream {
                bytes_sent,
                source: Box::new(e),
            })?;
        bytes_sent += len;
    }

    sink.finish().await.map_err(|e| RelayError::Downstream {
        bytes_sent,
        source: Box::new(e),
    })?;

    Ok(bytes_sent)
}

/// Head of the generic failure response. Details go to the log only.
pub fn failure_head() -> Response<()> {
    let mut head = Response::new(());
    *head.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    head
}

/// Send the generic failure response. Best effort: the client may be gone.
pub async fn send_failure<S: ResponseSink>(sink: &mut S) {
    if let Err(e) = sink.send_response(failure_head()).await {
        tracing::debug!(error = %e, "Could not send failure response");
        return;
    }
    if let Err(e) = sink.finish().await {
        tracing::debug!(error = %e, "Could not finish failure response");
    }
}

/// Turn an upstream response into an axum response with a streaming body.
pub fn into_axum_response(response: UpstreamResponse) -> axum::response::Response {
    let head = response.client_head();
    let (parts, ()) = head.into_parts();
    Response::from_parts(parts, axum::body::Body::new(response.body))
}
