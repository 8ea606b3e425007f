use crate::config::FunctionMetadata;
use crate::logger::Logger;

/// Per-invocation view handed to handlers.
#[derive(Debug, Clone)]
pub struct Context {
    request_id: String,
    trace_id: Option<String>,
    function: FunctionMetadata,
    logger: Logger,
}

impl Context {
    pub fn new(request_id: impl Into<String>, logger: Logger) -> Self {
        Self {
            request_id: request_id.into(),
            trace_id: None,
            function: FunctionMetadata::default(),
            logger,
        }
    }

    pub fn with_trace_id(mut self, trace_id: Option<String>) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn with_function(mut self, function: FunctionMetadata) -> Self {
        self.function = function;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function.function_name.as_deref()
    }

    pub fn function_version(&self) -> Option<&str> {
        self.function.function_version.as_deref()
    }

    pub fn memory_limit_mb(&self) -> Option<u32> {
        self.function.memory_limit_mb
    }

    pub fn log_group_name(&self) -> Option<&str> {
        self.function.log_group_name.as_deref()
    }

    pub fn log_stream_name(&self) -> Option<&str> {
        self.function.log_stream_name.as_deref()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}
