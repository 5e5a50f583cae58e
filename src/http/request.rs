//! Request translation.
//!
//! # Responsibilities
//! - Capture an inbound request (HTTP/3 or the TCP listener) with its arrival time
//! - Map it onto exactly one outbound HTTP/1.1 request for the upstream
//!
//! # Design Decisions
//! - Method copied verbatim; target is `scheme://upstream` + inbound path
//! - The query component is not carried over (current, documented behavior)
//! - Headers are flattened, never filtered
//! - The body is moved, not copied; it is read once, by the upstream client

use std::time::Duration;

use axum::http::{
    uri::{Authority, PathAndQuery, Scheme},
    HeaderMap, Method, Request, Uri,
};
use tokio::time::Instant;

use crate::config::UpstreamConfig;
use crate::http::body::GatewayBody;
use crate::http::headers::flatten_headers;

/// A request as received from a client.
pub struct InboundRequest {
    pub method: Method,
    /// Path only; the query component is not part of the inbound request.
    pub path: String,
    pub headers: HeaderMap,
    pub body: GatewayBody,
    pub received_at: Instant,
}

impl InboundRequest {
    /// Capture `request`, stamping it with the current instant as arrival time.
    pub fn from_http(request: Request<GatewayBody>) -> Self {
        let received_at = Instant::now();
        let (parts, body) = request.into_parts();

        if let Some(query) = parts.uri.query() {
            tracing::debug!(path = parts.uri.path(), query, "Dropping query component");
        }

        Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            headers: parts.headers,
            body,
            received_at,
        }
    }
}

impl std::fmt::Debug for InboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("received_at", &self.received_at)
            .finish_non_exhaustive()
    }
}

/// A request ready to be dispatched to the upstream.
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: GatewayBody,
    /// Absolute forwarding deadline: arrival time + configured budget.
    pub deadline: Instant,
}

impl OutboundRequest {
    /// Convert into a hyper request. The deadline stays with the caller.
    pub fn into_http(self) -> (Request<GatewayBody>, Instant) {
        let mut request = Request::new(self.body);
        *request.method_mut() = self.method;
        *request.uri_mut() = self.uri;
        *request.headers_mut() = self.headers;
        (request, self.deadline)
    }
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &self.headers)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Maps inbound requests onto the configured upstream.
#[derive(Debug, Clone)]
pub struct RequestTranslator {
    scheme: Scheme,
    authority: Authority,
    forward_timeout: Duration,
}

impl RequestTranslator {
    /// Build a translator for `upstream`. The address must be a valid authority;
    /// config validation guarantees that for loaded configurations.
    pub fn new(
        upstream: &UpstreamConfig,
        forward_timeout: Duration,
    ) -> Result<Self, axum::http::uri::InvalidUri> {
        let authority = upstream.address.trim().parse::<Authority>()?;
        let scheme = match upstream.scheme {
            crate::config::UpstreamScheme::Http => Scheme::HTTP,
            crate::config::UpstreamScheme::Https => Scheme::HTTPS,
        };

        Ok(Self {
            scheme,
            authority,
            forward_timeout,
        })
    }

    /// Produce the outbound request for `inbound`.
    pub fn translate(&self, inbound: InboundRequest) -> Result<OutboundRequest, axum::http::Error> {
        let path = if inbound.path.is_empty() {
            PathAndQuery::from_static("/")
        } else {
            inbound.path.parse::<PathAndQuery>()?
        };

        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path)
            .build()?;

        Ok(OutboundRequest {
            method: inbound.method,
            uri,
            headers: flatten_headers(&inbound.headers),
            body: inbound.body,
            deadline: inbound.received_at + self.forward_timeout,
        })
    }
}
