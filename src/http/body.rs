//! Streaming body plumbing shared by both listeners and the upstream client.
//!
//! Bodies are never buffered: the inbound stream is handed to the upstream
//! client as-is and read exactly once, by hyper.

use bytes::{Buf, Bytes};
use futures_util::stream;
use h3::server::RequestStream;
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;

/// Boxed error type carried by streaming bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request body type forwarded to the upstream.
pub type GatewayBody = UnsyncBoxBody<Bytes, BoxError>;

/// Receive half of an HTTP/3 request stream.
pub type H3RecvStream = RequestStream<h3_quinn::RecvStream, Bytes>;

/// Expose the receive half of an HTTP/3 request as a streaming body.
///
/// The stream ends after the first error.
pub fn from_h3(recv: H3RecvStream) -> GatewayBody {
    let frames = stream::unfold(Some(recv), |state| async move {
        let mut recv = state?;
        match recv.recv_data().await {
            Ok(Some(mut chunk)) => {
                let data = chunk.copy_to_bytes(chunk.remaining());
                Some((Ok(Frame::data(data)), Some(recv)))
            }
            Ok(None) => None,
            Err(e) => Some((Err(BoxError::from(e)), None)),
        }
    });

    StreamBody::new(Box::pin(frames)).boxed_unsync()
}

/// Adapt any body whose error converts into [`BoxError`].
pub fn boxed<B>(body: B) -> GatewayBody
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

pub fn empty() -> GatewayBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn full<T: Into<Bytes>>(chunk: T) -> GatewayBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}
