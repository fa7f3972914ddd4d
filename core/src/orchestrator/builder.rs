//! Builder pattern for Orchestrator construction

use std::sync::Arc;
use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::config::{OutputMode, RunMode, TransportOptions, WorkloadConfig};
use crate::error::{BenchError, BenchResult};
use crate::request::RequestTemplate;
use crate::traits::Transport;

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .concurrency(10)
///     .run_mode(RunMode::Count(1000))
///     .rate_limit(100.0)
///     .transport(transport)
///     .template(RequestTemplate::get(url))
///     .build()?;
///
/// let report = orchestrator.run_with_signal_handling().await?;
/// ```
pub struct OrchestratorBuilder {
    config: WorkloadConfig,
    transport: Option<Arc<dyn Transport>>,
    template: Option<RequestTemplate>,
    channel_config: Option<ChannelConfig>,
}

impl OrchestratorBuilder {
    /// Create a new orchestrator builder with default configuration
    pub fn new() -> Self {
        Self {
            config: WorkloadConfig::default(),
            transport: None,
            template: None,
            channel_config: None,
        }
    }

    /// Set the full workload configuration
    pub fn config(mut self, config: WorkloadConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the concurrency level
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the termination mode
    pub fn run_mode(mut self, mode: RunMode) -> Self {
        self.config.run_mode = mode;
        self
    }

    /// Set the global rate limit (requests per second, 0 = unlimited)
    pub fn rate_limit(mut self, rps: f64) -> Self {
        self.config = self.config.with_rate_limit(rps);
        self
    }

    /// Set the per-request timeout (zero = none)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Set the transport toggles
    pub fn transport_options(mut self, options: TransportOptions) -> Self {
        self.config.transport = options;
        self
    }

    /// Set the report flavour
    pub fn output(mut self, output: OutputMode) -> Self {
        self.config.output = output;
        self
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the request template
    pub fn template(mut self, template: RequestTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Override queue sizing; sized from concurrency when unset
    pub fn channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = Some(config);
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if transport or template are not set, or if
    /// configuration validation fails.
    pub fn build(self) -> BenchResult<Orchestrator> {
        let transport = self
            .transport
            .ok_or_else(|| BenchError::missing_config("transport"))?;

        let template = self
            .template
            .ok_or_else(|| BenchError::missing_config("template"))?;

        let channel_config = self
            .channel_config
            .unwrap_or_else(|| ChannelConfig::for_concurrency(self.config.concurrency));

        Orchestrator::new(self.config, transport, template, channel_config)
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
