//! HTTP client construction and the exchange itself

use std::time::{Duration, Instant};

use async_trait::async_trait;
use barrage_core::{
    BenchError, BenchResult, ExchangeResponse, PhaseTimings, RequestTemplate, Transport,
    TransportError, TransportOptions, WorkloadConfig,
};
use reqwest::header::{HeaderValue, CONNECTION, HOST};
use reqwest::{redirect, Client, Proxy};

use crate::error::classify;

/// Redirect hops followed when redirects are enabled
pub const MAX_REDIRECTS: usize = 10;

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-exchange timeout; `None` means no timeout
    pub request_timeout: Option<Duration>,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Idle connection timeout
    pub pool_idle_timeout: Duration,

    /// Transport toggles
    pub options: TransportOptions,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(20)),
            pool_max_idle_per_host: 50,
            pool_idle_timeout: Duration::from_secs(90),
            options: TransportOptions::default(),
        }
    }
}

impl HttpConfig {
    /// Derive the client configuration from a workload
    ///
    /// The idle pool holds one connection per worker.
    pub fn from_workload(config: &WorkloadConfig) -> Self {
        Self {
            request_timeout: config.timeout,
            pool_max_idle_per_host: config.concurrency,
            options: config.transport.clone(),
            ..Default::default()
        }
    }

    /// Set the request timeout (`None` disables it)
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the transport toggles
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }
}

/// reqwest-backed [`Transport`]
///
/// Cheap to share: the underlying client is a connection pool behind an
/// `Arc`.
///
/// Reported phases: `first_byte` (send until response headers) and `read`
/// (headers until end of body). reqwest does not expose connection setup or
/// request write timings, so those stay empty.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    /// Build a transport from the given configuration
    ///
    /// # Errors
    ///
    /// Returns a transport error if the proxy is malformed or the client
    /// cannot be built.
    pub fn new(config: &HttpConfig) -> BenchResult<Self> {
        let options = &config.options;

        let mut builder = Client::builder()
            .pool_idle_timeout(config.pool_idle_timeout)
            .gzip(!options.disable_compression)
            .danger_accept_invalid_certs(options.accept_invalid_certs);

        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        builder = if options.disable_keep_alives {
            builder.pool_max_idle_per_host(0)
        } else {
            builder.pool_max_idle_per_host(config.pool_max_idle_per_host)
        };

        builder = builder.redirect(if options.disable_redirects {
            redirect::Policy::none()
        } else {
            redirect::Policy::limited(MAX_REDIRECTS)
        });

        if let Some(proxy) = &options.proxy {
            let proxy = Proxy::all(proxy.as_str())
                .map_err(|e| BenchError::transport(format!("invalid proxy {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        builder = if options.h2 {
            builder.http2_prior_knowledge()
        } else {
            builder.http1_only()
        };

        let client = builder
            .build()
            .map_err(|e| BenchError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            timeout = ?config.request_timeout,
            pool_max_idle_per_host = config.pool_max_idle_per_host,
            h2 = options.h2,
            proxy = ?options.proxy,
            "HTTP client ready"
        );

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Build a transport for a workload
    pub fn from_workload(config: &WorkloadConfig) -> BenchResult<Self> {
        Self::new(&HttpConfig::from_workload(config))
    }

    /// Get the configuration for this transport
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn prepare(&self, template: &RequestTemplate) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .request(template.method.clone(), template.url.clone())
            .headers(template.headers.clone());

        if !template.body.is_empty() {
            request = request.body(template.body.clone());
        }
        if let Some((user, password)) = &template.basic_auth {
            request = request.basic_auth(user, Some(password));
        }
        if let Some(host) = &template.host {
            request = request.header(HOST, host.as_str());
        }
        if self.config.options.disable_keep_alives {
            request = request.header(CONNECTION, HeaderValue::from_static("close"));
        }
        request
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn execute(&self, template: &RequestTemplate) -> Result<ExchangeResponse, TransportError> {
        let request = self.prepare(template);

        let sent = Instant::now();
        let mut response = request.send().await.map_err(classify)?;
        let first_byte = sent.elapsed();
        let status = response.status().as_u16();

        // Drain without buffering: only the size matters.
        let headers_done = Instant::now();
        let mut size = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(classify)? {
            size += chunk.len() as u64;
        }
        let read = headers_done.elapsed();

        Ok(ExchangeResponse::new(status, size).with_phases(PhaseTimings {
            first_byte: Some(first_byte),
            read: Some(read),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barrage_core::ErrorKind;
    use bytes::Bytes;
    use reqwest::header::HeaderName;
    use reqwest::Method;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    // ========================================================================
    // Throwaway HTTP/1.1 responder
    // ========================================================================

    struct Reply {
        delay: Duration,
        raw: String,
    }

    fn reply(status: &str, extra_headers: &str, body: &str) -> Reply {
        Reply {
            delay: Duration::ZERO,
            raw: format!(
                "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n{}\r\n{}",
                status,
                body.len(),
                extra_headers,
                body
            ),
        }
    }

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let l = l.to_ascii_lowercase();
                        l.strip_prefix("content-length:")
                            .and_then(|v| v.trim().parse::<usize>().ok())
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serve every connection with `respond(request_text)`; forward each
    /// request's text to the returned receiver.
    async fn serve<F>(respond: F) -> (SocketAddr, mpsc::UnboundedReceiver<String>)
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let respond = Arc::new(respond);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let tx = tx.clone();
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let request = read_request(&mut stream).await;
                    let reply = (respond.as_ref())(&request);
                    let _ = tx.send(request);
                    tokio::time::sleep(reply.delay).await;
                    let _ = stream.write_all(reply.raw.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (addr, rx)
    }

    fn template(addr: SocketAddr, path: &str) -> RequestTemplate {
        RequestTemplate::get(format!("http://{}{}", addr, path).parse().unwrap())
    }

    fn transport(options: TransportOptions, timeout: Option<Duration>) -> HttpTransport {
        let config = HttpConfig::default()
            .with_request_timeout(timeout)
            .with_options(options);
        HttpTransport::new(&config).unwrap()
    }

    // ========================================================================
    // Tests
    // ========================================================================

    #[tokio::test]
    async fn test_successful_exchange() {
        let (addr, _rx) = serve(|_| reply("200 OK", "", "hello world")).await;
        let http = transport(TransportOptions::default(), None);

        let response = http.execute(&template(addr, "/")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.size, 11);
        assert!(response.phases.first_byte.is_some());
        assert!(response.phases.read.is_some());
        assert!(response.phases.connect.is_none());
    }

    #[tokio::test]
    async fn test_non_2xx_is_a_response() {
        let (addr, _rx) = serve(|_| reply("503 Service Unavailable", "", "busy")).await;
        let http = transport(TransportOptions::default(), None);

        let response = http.execute(&template(addr, "/")).await.unwrap();
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let http = transport(TransportOptions::default(), Some(Duration::from_secs(5)));
        let err = http.execute(&template(addr, "/")).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Connect);
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let (addr, _rx) = serve(|_| Reply {
            delay: Duration::from_millis(500),
            ..reply("200 OK", "", "late")
        })
        .await;
        let http = transport(TransportOptions::default(), Some(Duration::from_millis(50)));

        let start = Instant::now();
        let err = http.execute(&template(addr, "/")).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(start.elapsed() < Duration::from_millis(450));
    }

    #[tokio::test]
    async fn test_redirects_followed_by_default() {
        let (addr, _rx) = serve(|request| {
            if request.starts_with("GET /final") {
                reply("200 OK", "", "done")
            } else {
                reply("302 Found", "location: /final\r\n", "")
            }
        })
        .await;
        let http = transport(TransportOptions::default(), None);

        let response = http.execute(&template(addr, "/start")).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.size, 4);
    }

    #[tokio::test]
    async fn test_redirects_disabled() {
        let (addr, _rx) = serve(|_| reply("302 Found", "location: /final\r\n", "")).await;
        let options = TransportOptions {
            disable_redirects: true,
            ..Default::default()
        };
        let http = transport(options, None);

        let response = http.execute(&template(addr, "/start")).await.unwrap();
        assert_eq!(response.status, 302);
    }

    #[tokio::test]
    async fn test_template_is_sent_verbatim() {
        let (addr, mut rx) = serve(|_| reply("201 Created", "", "")).await;
        let http = transport(TransportOptions::default(), None);

        let request = RequestTemplate::new(
            Method::POST,
            format!("http://{}/submit", addr).parse().unwrap(),
        )
        .with_header(
            HeaderName::from_static("x-test"),
            HeaderValue::from_static("1"),
        )
        .with_body(Bytes::from_static(b"payload"))
        .with_basic_auth("user", "secret")
        .with_host("example.test");

        let response = http.execute(&request).await.unwrap();
        assert_eq!(response.status, 201);

        let seen = rx.recv().await.unwrap().to_ascii_lowercase();
        assert!(seen.starts_with("post /submit http/1.1"));
        assert!(seen.contains("x-test: 1"));
        assert!(seen.contains("authorization: basic "));
        assert!(seen.contains("host: example.test"));
        assert!(seen.ends_with("payload"));
    }

    #[tokio::test]
    async fn test_disable_keep_alives_sends_connection_close() {
        let (addr, mut rx) = serve(|_| reply("200 OK", "", "")).await;
        let options = TransportOptions {
            disable_keep_alives: true,
            ..Default::default()
        };
        let http = transport(options, None);

        http.execute(&template(addr, "/")).await.unwrap();

        let seen = rx.recv().await.unwrap().to_ascii_lowercase();
        assert!(seen.contains("connection: close"));
    }

    #[tokio::test]
    async fn test_compression_negotiated_unless_disabled() {
        let (addr, mut rx) = serve(|_| reply("200 OK", "", "")).await;

        transport(TransportOptions::default(), None)
            .execute(&template(addr, "/"))
            .await
            .unwrap();
        let seen = rx.recv().await.unwrap().to_ascii_lowercase();
        assert!(seen.contains("accept-encoding: gzip"));

        let options = TransportOptions {
            disable_compression: true,
            ..Default::default()
        };
        transport(options, None)
            .execute(&template(addr, "/"))
            .await
            .unwrap();
        let seen = rx.recv().await.unwrap().to_ascii_lowercase();
        assert!(!seen.contains("accept-encoding: gzip"));
    }

    #[test]
    fn test_from_workload() {
        let workload = WorkloadConfig::new(16).with_timeout(Duration::ZERO);
        let http = HttpTransport::from_workload(&workload).unwrap();

        assert_eq!(http.config().pool_max_idle_per_host, 16);
        assert!(http.config().request_timeout.is_none());
        assert_eq!(http.name(), "http");
    }

    #[test]
    fn test_proxy_is_accepted() {
        let options = TransportOptions {
            proxy: Some("http://127.0.0.1:3128".into()),
            ..Default::default()
        };
        assert!(HttpTransport::new(&HttpConfig::default().with_options(options)).is_ok());
    }
}
