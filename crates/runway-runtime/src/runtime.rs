use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::config::RuntimeConfig;
use crate::context::Context;
use crate::endpoint::{REQUEST_ID_HEADER, TRACE_ID_HEADER};
use crate::error::RuntimeError;
use crate::handler::HandlerDescriptor;
use crate::logger::Logger;
use crate::registry::HandlerRegistry;
use crate::report::{ErrorReport, ErrorReporter};
use crate::wire::{HttpWireClient, WireClient};

/// Pause before fetching again after a failed fetch in continuous mode.
pub const FETCH_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Dispatching,
    Reporting,
    Terminated,
}

/// One event handed out by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationEnvelope {
    pub request_id: String,
    pub trace_id: Option<String>,
    pub body: String,
}

/// How a completed cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Responded { request_id: String },
    Failed { request_id: String, message: String },
}

type TraceHook = Box<dyn Fn(&str) + Send + Sync>;

/// The invocation loop.
///
/// Resolves the configured handler once, then repeatedly fetches an event,
/// dispatches it and posts the result or the failure.
pub struct Runtime {
    config: RuntimeConfig,
    registry: HandlerRegistry,
    wire: Arc<dyn WireClient>,
    reporter: ErrorReporter,
    logger: Logger,
    trace_hook: Option<TraceHook>,
    retry_delay: Duration,
    state: LoopState,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, registry: HandlerRegistry) -> Self {
        let wire: Arc<dyn WireClient> = Arc::new(HttpWireClient::new());
        let reporter = ErrorReporter::new(Arc::clone(&wire), config.endpoint.clone());
        let logger = Logger::stdout(config.log_format);
        Self {
            config,
            registry,
            wire,
            reporter,
            logger,
            trace_hook: None,
            retry_delay: FETCH_RETRY_DELAY,
            state: LoopState::Idle,
        }
    }

    pub fn with_wire_client(mut self, wire: Arc<dyn WireClient>) -> Self {
        self.reporter = ErrorReporter::new(Arc::clone(&wire), self.config.endpoint.clone());
        self.wire = wire;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Called with the trace id of every event that carries one, before the
    /// handler runs.
    pub fn on_trace(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.trace_hook = Some(Box::new(hook));
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Resolve the configured handler.
    pub fn bootstrap(&self) -> Result<HandlerDescriptor, RuntimeError> {
        let specifier = self
            .config
            .handler
            .as_deref()
            .ok_or_else(|| RuntimeError::Config("no handler configured (HANDLER)".into()))?;
        self.registry.resolve(specifier, self.config.instance_policy)
    }

    /// Run until terminated.
    ///
    /// Returns the init error if the handler cannot be resolved. In
    /// single-loop mode returns after one cycle, or with the fetch error if
    /// that cycle could not get an event. In continuous mode only an init
    /// error ends the loop.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        let handler = match self.bootstrap() {
            Ok(handler) => handler,
            Err(e) => {
                self.state = LoopState::Reporting;
                self.reporter
                    .report(&ErrorReport::init(e.to_string()), &self.logger)
                    .await;
                self.state = LoopState::Terminated;
                return Err(e);
            }
        };

        tracing::info!(
            handler = %handler.type_name(),
            member = %handler.member(),
            offline = self.config.is_offline(),
            single_loop = self.config.single_loop,
            "Runtime started"
        );

        loop {
            match self.run_cycle(&handler).await {
                Ok(outcome) => tracing::debug!(?outcome, "Cycle complete"),
                Err(e) => {
                    tracing::error!(error = %e, "Cycle aborted");
                    if self.config.single_loop {
                        self.state = LoopState::Terminated;
                        return Err(e);
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }

            if self.config.single_loop {
                self.state = LoopState::Terminated;
                return Ok(());
            }
        }
    }

    /// Fetch one event, dispatch it and report the outcome.
    ///
    /// Handler failures are reported and returned as [`CycleOutcome::Failed`];
    /// `Err` means the cycle never got an event or could not post the result.
    pub async fn run_cycle(
        &mut self,
        handler: &HandlerDescriptor,
    ) -> Result<CycleOutcome, RuntimeError> {
        self.state = LoopState::Fetching;
        let envelope = match self.next_invocation().await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.state = LoopState::Idle;
                return Err(e);
            }
        };

        let span = tracing::info_span!(
            "invocation",
            request_id = %envelope.request_id,
            trace_id = envelope.trace_id.as_deref().unwrap_or("")
        );
        let result = self.dispatch(handler, envelope).instrument(span).await;
        self.state = LoopState::Idle;
        result
    }

    async fn dispatch(
        &mut self,
        handler: &HandlerDescriptor,
        envelope: InvocationEnvelope,
    ) -> Result<CycleOutcome, RuntimeError> {
        if let (Some(trace_id), Some(hook)) = (&envelope.trace_id, &self.trace_hook) {
            hook(trace_id);
        }

        self.state = LoopState::Dispatching;
        let context = Context::new(envelope.request_id.clone(), self.logger.clone())
            .with_trace_id(envelope.trace_id.clone())
            .with_function(self.config.function.clone());
        let result = handler.invoke(&envelope.body, &context);

        self.state = LoopState::Reporting;
        match result {
            Ok(payload) => {
                self.post_response(&envelope.request_id, &payload, &context)
                    .await?;
                Ok(CycleOutcome::Responded {
                    request_id: envelope.request_id,
                })
            }
            Err(e) => {
                let report = ErrorReport::invocation(&envelope.request_id, e.to_string());
                self.reporter.report(&report, context.logger()).await;
                Ok(CycleOutcome::Failed {
                    request_id: envelope.request_id,
                    message: report.message,
                })
            }
        }
    }

    async fn next_invocation(&self) -> Result<InvocationEnvelope, RuntimeError> {
        let Some(endpoint) = &self.config.endpoint else {
            return Ok(InvocationEnvelope {
                request_id: uuid::Uuid::new_v4().to_string(),
                trace_id: None,
                body: self.config.local_event.clone().unwrap_or_default(),
            });
        };

        let url = endpoint.next_invocation_url();
        let response = self.wire.get(&url).await?;
        if !response.is_success() {
            return Err(RuntimeError::Transport(format!(
                "next invocation returned {}: {}",
                response.status, response.body
            )));
        }

        let request_id = response
            .header(REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                RuntimeError::Transport(format!("next invocation is missing {REQUEST_ID_HEADER}"))
            })?
            .to_string();
        let trace_id = response.header(TRACE_ID_HEADER).map(str::to_string);
        tracing::debug!(request_id = %request_id, "Received invocation");

        Ok(InvocationEnvelope {
            request_id,
            trace_id,
            body: response.body,
        })
    }

    async fn post_response(
        &self,
        request_id: &str,
        payload: &str,
        context: &Context,
    ) -> Result<(), RuntimeError> {
        let Some(endpoint) = &self.config.endpoint else {
            context.logger().log(payload);
            return Ok(());
        };

        let url = endpoint.response_url(request_id);
        let response = self.wire.post(&url, payload).await?;
        if response.is_success() {
            tracing::info!(request_id = %request_id, "Invocation response posted");
        } else {
            tracing::warn!(
                request_id = %request_id,
                status = response.status,
                body = %response.body,
                "Runtime API rejected invocation response"
            );
        }
        Ok(())
    }
}
