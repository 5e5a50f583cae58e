//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::{Method, Request, Response};
use bytes::Bytes;
use h3_gateway::config::{GatewayConfig, UpstreamConfig, UpstreamScheme};
use h3_gateway::http::body::{self, GatewayBody};
use h3_gateway::http::request::InboundRequest;
use h3_gateway::http::response::ResponseSink;
use h3_gateway::Gateway;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A request as observed by a mock backend.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// What a mock backend answers with.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status_line: &'static str,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
    /// Declared Content-Length, when it should differ from the real body.
    pub content_length: Option<usize>,
    pub delay: Duration,
}

impl MockResponse {
    pub fn ok(body: &str) -> Self {
        Self {
            status_line: "200 OK",
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
            content_length: None,
            delay: Duration::ZERO,
        }
    }
}

async fn read_request(socket: &mut TcpStream) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let mut body = buf[head_end + 4..].to_vec();
    let content_length = headers
        .iter()
        .find(|(n, _)| n == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok());
    let chunked = headers
        .iter()
        .any(|(n, v)| n == "transfer-encoding" && v.contains("chunked"));

    if let Some(len) = content_length {
        while body.len() < len {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    } else if chunked {
        while !body.ends_with(b"0\r\n\r\n") {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }

    Some(CapturedRequest {
        method,
        target,
        headers,
        body,
    })
}

/// Start a backend that records every request and answers with `response`.
pub async fn start_backend(response: MockResponse) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let tx = tx.clone();
                    let response = response.clone();
                    tokio::spawn(async move {
                        let Some(captured) = read_request(&mut socket).await else {
                            return;
                        };
                        let _ = tx.send(captured);
                        tokio::time::sleep(response.delay).await;

                        let mut raw = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            response.status_line,
                            response.content_length.unwrap_or(response.body.len()),
                        );
                        for (name, value) in &response.headers {
                            raw.push_str(&format!("{name}: {value}\r\n"));
                        }
                        raw.push_str("\r\n");

                        let _ = socket.write_all(raw.as_bytes()).await;
                        let _ = socket.write_all(&response.body).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    (addr, rx)
}

/// Start a backend that reads a request, never answers, and reports when
/// the gateway closes the connection.
pub async fn start_stalled_backend() -> (SocketAddr, mpsc::UnboundedReceiver<&'static str>) {
    start_stalled_backend_with(b"").await
}

/// Like [`start_stalled_backend`], but writes `prefix` (for example a response
/// head and part of its body) before stalling.
pub async fn start_stalled_backend_with(
    prefix: &'static [u8],
) -> (SocketAddr, mpsc::UnboundedReceiver<&'static str>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if read_request(&mut socket).await.is_none() {
                    return;
                }
                let _ = tx.send("request");
                if !prefix.is_empty() && socket.write_all(prefix).await.is_err() {
                    return;
                }

                let mut sink = [0u8; 1024];
                loop {
                    match socket.read(&mut sink).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => continue,
                    }
                }
                let _ = tx.send("closed");
            });
        }
    });

    (addr, rx)
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn config_for(addr: SocketAddr, forward_ms: u64) -> GatewayConfig {
    let mut config = GatewayConfig::for_upstream(UpstreamConfig {
        address: addr.to_string(),
        scheme: UpstreamScheme::Http,
        insecure_skip_verify: true,
    });
    config.timeouts.forward_ms = forward_ms;
    config
}

pub fn gateway_for(addr: SocketAddr, forward_ms: u64) -> Gateway {
    Gateway::new(&config_for(addr, forward_ms)).unwrap()
}

pub fn inbound(method: Method, uri: &str, headers: &[(&str, &str)], body: GatewayBody) -> InboundRequest {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    InboundRequest::from_http(builder.body(body).unwrap())
}

pub fn get(uri: &str) -> InboundRequest {
    inbound(Method::GET, uri, &[], body::empty())
}

/// Records what the gateway writes back to the client.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub head: Option<Response<()>>,
    pub body: Vec<u8>,
    pub finished: bool,
}

impl RecordingSink {
    pub fn status(&self) -> u16 {
        self.head.as_ref().expect("no response head").status().as_u16()
    }

    pub fn header_values(&self, name: &str) -> Vec<String> {
        self.head
            .as_ref()
            .expect("no response head")
            .headers()
            .get_all(name)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }
}

impl ResponseSink for RecordingSink {
    type Error = std::io::Error;

    async fn send_response(&mut self, head: Response<()>) -> Result<(), Self::Error> {
        self.head = Some(head);
        Ok(())
    }

    async fn send_data(&mut self, data: Bytes) -> Result<(), Self::Error> {
        self.body.extend_from_slice(&data);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), Self::Error> {
        self.finished = true;
        Ok(())
    }
}

/// In-memory log writer for asserting on emitted events.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
