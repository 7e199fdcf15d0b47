//! HTTP/1.1 transport over plain TCP sockets.

use crate::config::TransportConfig;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tgql_core::{Error, ErrorCode, Result};
use tgql_runtime::{RawResponse, RequestPayload, Transport};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// POSTs requests as JSON to one endpoint.
///
/// Retryable failures (network, timeout, refused connection) are retried as
/// the configured [`RetryPolicy`](crate::config::RetryPolicy) allows. Only
/// `http://` URLs are accepted.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: TransportConfig,
    endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoint {
    host: String,
    port: u16,
    path: String,
}

impl HttpTransport {
    /// Creates a transport, validating the configured URL and headers.
    pub fn new(config: TransportConfig) -> Result<Self> {
        let endpoint = parse_url(&config.url)?;
        config.validate_headers()?;
        Ok(Self { config, endpoint })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn post(&self, body: &str) -> Result<Vec<u8>> {
        let Endpoint { host, port, path } = &self.endpoint;

        let mut stream = with_timeout(self.config.connect_timeout, TcpStream::connect((host.as_str(), *port)))
            .await?
            .map_err(|e| Error::new(ErrorCode::ConnectionRefused, format!("Connection failed: {e}")))?;

        let mut request = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Content-Type: application/json\r\n\
             Accept: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n",
            body.len()
        );
        for (key, value) in &self.config.headers {
            request.push_str(&format!("{key}: {value}\r\n"));
        }
        request.push_str("\r\n");
        request.push_str(body);

        let exchange = async {
            stream
                .write_all(request.as_bytes())
                .await
                .map_err(|e| Error::network(format!("Write failed: {e}")))?;
            let mut response = Vec::new();
            stream
                .read_to_end(&mut response)
                .await
                .map_err(|e| Error::network(format!("Read failed: {e}")))?;
            Ok::<_, Error>(response)
        };
        let response = with_timeout(self.config.request_timeout, exchange).await??;

        parse_http_response(&response)
    }

    async fn attempt(&self, body: &str) -> Result<RawResponse> {
        let bytes = self.post(body).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            Error::new(
                ErrorCode::InvalidResponse,
                format!(
                    "Failed to parse response: {e}. Body: {}",
                    String::from_utf8_lossy(&bytes).chars().take(200).collect::<String>()
                ),
            )
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &RequestPayload, cancel: &CancellationToken) -> Result<RawResponse> {
        let body = serde_json::json!({
            "query": request.document,
            "operationName": request.operation_name,
            "variables": request.variables,
        });
        let body = serde_json::to_string(&body).map_err(|e| Error::serialize(e.to_string()))?;
        trace!(bytes = body.len(), "request body encoded");

        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                result = self.attempt(&body) => result,
            };

            match result {
                Ok(response) => {
                    debug!(attempt, "request delivered");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.config.retry.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry.delay(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying request");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(Error::cancelled()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

async fn with_timeout<F: Future>(limit: Duration, future: F) -> Result<F::Output> {
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Error::timeout())
}

fn parse_url(url: &str) -> Result<Endpoint> {
    let url = url.trim();

    let rest = if url.starts_with("https://") {
        return Err(Error::new(
            ErrorCode::HttpsNotSupported,
            "HTTPS is not supported by the plain HTTP transport. Use a proxy or an http:// endpoint.",
        ));
    } else if let Some(rest) = url.strip_prefix("http://") {
        rest
    } else {
        url
    };

    let (authority, path) = match rest.find('/') {
        Some(slash) => (&rest[..slash], &rest[slash..]),
        None => (rest, "/"),
    };

    let (host, port) = match authority.rfind(':') {
        Some(colon) => {
            let port = &authority[colon + 1..];
            let port = port
                .parse()
                .map_err(|_| Error::new(ErrorCode::InvalidUrl, format!("Invalid port: {port}")))?;
            (&authority[..colon], port)
        }
        None => (authority, 80),
    };

    if host.is_empty() {
        return Err(Error::new(ErrorCode::InvalidUrl, format!("Missing host in `{url}`")));
    }

    Ok(Endpoint {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

/// Splits a raw response, checks its status and returns the decoded body.
///
/// The body stays raw bytes; the head is ASCII and is read leniently.
fn parse_http_response(response: &[u8]) -> Result<Vec<u8>> {
    let (head, body) = split_head(response)
        .ok_or_else(|| Error::new(ErrorCode::InvalidResponse, "Could not find response body"))?;
    let head = String::from_utf8_lossy(head);

    let mut lines = head.lines();
    let status_line = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| Error::new(ErrorCode::InvalidResponse, "Empty response"))?;

    let status = parse_status(status_line)?;
    if !(200..300).contains(&status) {
        return Err(Error::new(ErrorCode::HttpError, format!("HTTP error: {status_line}"))
            .with_extension("status", status));
    }

    let chunked = lines.any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value.trim().eq_ignore_ascii_case("chunked")
        })
    });

    if chunked {
        parse_chunked_body(body)
    } else {
        Ok(body.to_vec())
    }
}

fn split_head(response: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(at) = find(response, b"\r\n\r\n") {
        return Some((&response[..at], &response[at + 4..]));
    }
    find(response, b"\n\n").map(|at| (&response[..at], &response[at + 2..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Takes one line off `input`, accepting `\r\n` or a bare `\n`.
fn take_line(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = input.iter().position(|&b| b == b'\n')?;
    let line = &input[..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, &input[end + 1..]))
}

fn parse_status(status_line: &str) -> Result<u16> {
    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    let code = parts.next().unwrap_or_default();

    if !version.starts_with("HTTP/") || code.len() != 3 {
        return Err(Error::new(
            ErrorCode::InvalidResponse,
            format!("Malformed status line: {status_line}"),
        ));
    }
    code.parse().map_err(|_| {
        Error::new(
            ErrorCode::InvalidResponse,
            format!("Malformed status code: {status_line}"),
        )
    })
}

fn parse_chunked_body(body: &[u8]) -> Result<Vec<u8>> {
    let truncated = || Error::new(ErrorCode::InvalidResponse, "Truncated chunked body");
    let mut result = Vec::with_capacity(body.len());
    let mut remaining = body;

    loop {
        let (size_line, rest) = take_line(remaining).ok_or_else(truncated)?;
        let size_line = String::from_utf8_lossy(size_line);

        // Chunk extensions follow a `;`.
        let size = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size, 16).map_err(|_| {
            Error::new(ErrorCode::InvalidResponse, format!("Invalid chunk size: {size_line}"))
        })?;
        if size == 0 {
            return Ok(result);
        }

        let chunk = rest.get(..size).ok_or_else(truncated)?;
        result.extend_from_slice(chunk);

        remaining = &rest[size..];
        remaining = remaining
            .strip_prefix(b"\r\n")
            .or_else(|| remaining.strip_prefix(b"\n"))
            .unwrap_or(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_url() {
        let endpoint = parse_url("http://localhost:4000/graphql").unwrap();
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 4000);
        assert_eq!(endpoint.path, "/graphql");

        let endpoint = parse_url("http://example.com/api/graphql").unwrap();
        assert_eq!(endpoint.host, "example.com");
        assert_eq!(endpoint.port, 80);
        assert_eq!(endpoint.path, "/api/graphql");

        let endpoint = parse_url("example.com").unwrap();
        assert_eq!(endpoint.path, "/");
    }

    #[test]
    fn test_parse_url_rejects() {
        assert_eq!(parse_url("https://example.com").unwrap_err().code, ErrorCode::HttpsNotSupported);
        assert_eq!(parse_url("http://example.com:abc/").unwrap_err().code, ErrorCode::InvalidUrl);
        assert_eq!(parse_url("http://:80/").unwrap_err().code, ErrorCode::InvalidUrl);
    }

    #[test]
    fn test_parse_http_response() {
        let response = "HTTP/1.1 200 OK\r\n\
                        Content-Type: application/json\r\n\
                        \r\n\
                        {\"data\":{\"hello\":\"world\"}}";
        assert_eq!(
            parse_http_response(response.as_bytes()).unwrap(),
            b"{\"data\":{\"hello\":\"world\"}}"
        );
    }

    #[test]
    fn test_status_is_parsed_strictly() {
        // A 2xx whose reason phrase mentions other digits is still a success.
        let ok = b"HTTP/1.1 204 No Content 500\r\n\r\n";
        assert!(parse_http_response(ok).unwrap().is_empty());

        let err = parse_http_response(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpError);
        assert_eq!(err.extensions.as_ref().unwrap()["status"], 502);

        let err = parse_http_response(b"HTTP/1.1 302 Found\r\n\r\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::HttpError);

        let err = parse_http_response(b"garbage\r\n\r\n").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponse);
    }

    #[test]
    fn test_chunked_body() {
        assert_eq!(
            parse_chunked_body(b"5\r\nhello\r\n5\r\nworld\r\n0\r\n\r\n").unwrap(),
            b"helloworld"
        );
        assert_eq!(parse_chunked_body(b"5;ext=1\r\nhello\r\n0\r\n\r\n").unwrap(), b"hello");

        let response = b"HTTP/1.1 200 OK\r\ntransfer-encoding: Chunked\r\n\r\n2\r\n{}\r\n0\r\n\r\n";
        assert_eq!(parse_http_response(response).unwrap(), b"{}");
    }

    #[test]
    fn test_chunk_boundary_inside_multibyte_char() {
        // `é` is 0xC3 0xA9; the first chunk ends between the two bytes.
        let mut response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
        response.extend_from_slice(b"f\r\n{\"data\":{\"n\":\"\xC3\r\n");
        response.extend_from_slice(b"4\r\n\xA9\"}}\r\n0\r\n\r\n");

        let body = parse_http_response(&response).unwrap();
        assert_eq!(String::from_utf8(body.clone()).unwrap(), "{\"data\":{\"n\":\"é\"}}");
        let parsed: RawResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.data.unwrap()["n"], "é");
    }

    #[test]
    fn test_chunked_body_errors() {
        assert_eq!(parse_chunked_body(b"zz\r\nhello\r\n").unwrap_err().code, ErrorCode::InvalidResponse);
        assert_eq!(parse_chunked_body(b"a\r\nhello").unwrap_err().code, ErrorCode::InvalidResponse);
        assert_eq!(parse_chunked_body(b"5\r\nhello\r\n").unwrap_err().code, ErrorCode::InvalidResponse);
    }

    fn payload() -> RequestPayload {
        RequestPayload {
            operation_name: "Hello".to_string(),
            document: "query Hello { hello }".to_string(),
            variables: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_refused_connection_is_retried_then_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(
            TransportConfig::new(format!("http://{addr}/graphql"))
                .retry(RetryPolicy::new(1, Duration::from_millis(1))),
        )
        .unwrap();
        let err = transport.send(&payload(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConnectionRefused);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_new_rejects_injected_header() {
        let config = TransportConfig::new("http://localhost:4000/graphql")
            .header("Authorization", "Bearer x\r\nX-Admin: true");
        let err = HttpTransport::new(config).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidHeader);
    }

    #[tokio::test]
    async fn test_cancel_aborts_send() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer.
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let transport = HttpTransport::new(TransportConfig::new(format!("http://{addr}/graphql"))).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = transport.send(&payload(), &cancel).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Cancelled);
        server.abort();
    }
}
