//! CLI argument parsing and translation into engine inputs

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use barrage_core::{OutputMode, RequestTemplate, RunMode, TransportOptions, WorkloadConfig};
use bytes::Bytes;
use clap::Parser;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Url};

/// User-Agent sent with every request (appended to a user-supplied one)
pub const DEFAULT_USER_AGENT: &str = concat!("barrage/", env!("CARGO_PKG_VERSION"));

#[derive(Parser, Debug)]
#[command(name = "barrage")]
#[command(author, version, about = "Send load to an HTTP endpoint and report latencies", long_about = None)]
pub struct Cli {
    /// Target URL
    pub url: String,

    /// Number of requests to run
    #[arg(short = 'n', long = "requests", default_value_t = 200)]
    pub requests: usize,

    /// Number of workers to run concurrently; cannot exceed the request count
    #[arg(short = 'c', long, default_value_t = 50)]
    pub concurrency: usize,

    /// Global rate limit in queries per second (0 = no limit)
    #[arg(short = 'q', long = "rate", default_value_t = 0.0)]
    pub rate: f64,

    /// Run for this long instead of a fixed request count (e.g. 10s, 3m)
    #[arg(short = 'z', long, value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Output type; "csv" prints one row per request
    #[arg(short = 'o', long, value_parser = parse_output, default_value = "summary")]
    pub output: OutputMode,

    /// HTTP method
    #[arg(short = 'm', long, default_value = "GET")]
    pub method: String,

    /// Custom header, repeatable ("Name: value")
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Per-request timeout in seconds (0 = no timeout)
    #[arg(short = 't', long, default_value_t = 20)]
    pub timeout: u64,

    /// Accept header
    #[arg(short = 'A', long)]
    pub accept: Option<String>,

    /// Request body
    #[arg(short = 'd', long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Request body read from a file
    #[arg(short = 'D', long)]
    pub body_file: Option<PathBuf>,

    /// Content-Type header
    #[arg(short = 'T', long, default_value = "text/html")]
    pub content_type: String,

    /// Basic authentication, "username:password"
    #[arg(short = 'a', long)]
    pub auth: Option<String>,

    /// Proxy address, "host:port" or a URL
    #[arg(short = 'x', long)]
    pub proxy: Option<String>,

    /// Use HTTP/2
    #[arg(long)]
    pub h2: bool,

    /// Host header override
    #[arg(long)]
    pub host: Option<String>,

    /// Do not request compressed responses
    #[arg(long)]
    pub disable_compression: bool,

    /// Open a new connection for every request
    #[arg(long)]
    pub disable_keepalive: bool,

    /// Do not follow redirects
    #[arg(long)]
    pub disable_redirects: bool,

    /// Number of runtime worker threads (defaults to the number of CPUs)
    #[arg(long)]
    pub cpus: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_output(s: &str) -> Result<OutputMode, String> {
    s.parse().map_err(|e: barrage_core::ConfigError| e.to_string())
}

impl Cli {
    /// Build the workload configuration (validated later by the engine)
    pub fn workload_config(&self) -> WorkloadConfig {
        let run_mode = match self.duration {
            Some(d) => RunMode::Duration(d),
            None => RunMode::Count(self.requests),
        };

        let transport = TransportOptions {
            disable_compression: self.disable_compression,
            disable_keep_alives: self.disable_keepalive,
            disable_redirects: self.disable_redirects,
            proxy: self.proxy.as_deref().map(normalize_proxy),
            h2: self.h2,
            ..Default::default()
        };

        WorkloadConfig::new(self.concurrency)
            .with_run_mode(run_mode)
            .with_rate_limit(self.rate)
            .with_timeout(Duration::from_secs(self.timeout))
            .with_transport(transport)
            .with_output(self.output)
    }

    /// Build the request every worker repeats
    pub fn request_template(&self) -> Result<RequestTemplate> {
        let url = Url::parse(&self.url).with_context(|| format!("invalid URL '{}'", self.url))?;
        let method = Method::from_bytes(self.method.to_uppercase().as_bytes())
            .with_context(|| format!("invalid method '{}'", self.method))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&self.content_type).context("invalid content type")?,
        );
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            headers.insert(name, value);
        }
        if let Some(accept) = &self.accept {
            headers.insert(ACCEPT, HeaderValue::from_str(accept).context("invalid accept header")?);
        }

        let user_agent = match headers.get(USER_AGENT).and_then(|v| v.to_str().ok()) {
            Some(ua) => format!("{} {}", ua, DEFAULT_USER_AGENT),
            None => DEFAULT_USER_AGENT.to_string(),
        };
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent).context("invalid user agent")?,
        );

        let mut template = RequestTemplate::new(method, url).with_body(self.body_bytes()?);
        template.headers = headers;

        if let Some(auth) = &self.auth {
            let (user, password) = auth
                .split_once(':')
                .ok_or_else(|| anyhow!("basic auth must be 'username:password'"))?;
            template = template.with_basic_auth(user, password);
        }
        if let Some(host) = &self.host {
            template = template.with_host(host.clone());
        }

        Ok(template)
    }

    fn body_bytes(&self) -> Result<Bytes> {
        match (&self.body, &self.body_file) {
            (Some(body), _) => Ok(Bytes::from(body.clone())),
            (None, Some(path)) => std::fs::read(path)
                .map(Bytes::from)
                .with_context(|| format!("failed to read body file {}", path.display())),
            (None, None) => Ok(Bytes::new()),
        }
    }
}

/// Parse `Name: value`
fn parse_header(raw: &str) -> Result<(HeaderName, HeaderValue)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("could not parse header '{}'; expected 'Name: value'", raw);
    };
    let name = name.trim();
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        bail!("could not parse header '{}'; expected 'Name: value'", raw);
    }

    let name = HeaderName::from_bytes(name.as_bytes())
        .with_context(|| format!("invalid header name '{}'", name))?;
    let value =
        HeaderValue::from_str(value).with_context(|| format!("invalid header value '{}'", value))?;
    Ok((name, value))
}

/// Accept bare `host:port` proxies
fn normalize_proxy(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{}", proxy)
    }
}
