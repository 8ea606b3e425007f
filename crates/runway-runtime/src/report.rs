use std::fmt;
use std::sync::Arc;

use runway_codec::CodecError;
use serde::Serialize;

use crate::endpoint::RuntimeEndpoint;
use crate::error::RuntimeError;
use crate::logger::Logger;
use crate::wire::WireClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    InitError,
    RuntimeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InitError => f.write_str("InitError"),
            ErrorKind::RuntimeError => f.write_str("RuntimeError"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub message: String,
    pub kind: ErrorKind,
    /// Set for invocation failures only.
    pub request_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error_message: &'a str,
    error_type: ErrorKind,
}

impl ErrorReport {
    pub fn init(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::InitError,
            request_id: None,
        }
    }

    pub fn invocation(request_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ErrorKind::RuntimeError,
            request_id: Some(request_id.into()),
        }
    }

    /// Wire body: `{"errorMessage":"..","errorType":".."}`.
    pub fn to_body(&self) -> Result<String, RuntimeError> {
        let body = ErrorBody {
            error_message: &self.message,
            error_type: self.kind,
        };
        serde_json::to_string(&body)
            .map_err(|e| RuntimeError::Codec(CodecError::Serialization(e.to_string())))
    }
}

/// Logs failures and forwards them to the runtime API.
#[derive(Clone)]
pub struct ErrorReporter {
    wire: Arc<dyn WireClient>,
    endpoint: Option<RuntimeEndpoint>,
}

impl ErrorReporter {
    pub fn new(wire: Arc<dyn WireClient>, endpoint: Option<RuntimeEndpoint>) -> Self {
        Self { wire, endpoint }
    }

    /// Log the failure locally, then POST it when an endpoint is configured.
    ///
    /// Never fails: a report that cannot be delivered is only logged.
    pub async fn report(&self, report: &ErrorReport, logger: &Logger) {
        logger.error(&report.message);
        tracing::error!(
            kind = %report.kind,
            request_id = report.request_id.as_deref().unwrap_or("-"),
            error = %report.message,
            "Reporting failure"
        );

        let Some(endpoint) = &self.endpoint else {
            return;
        };

        let url = match (report.kind, report.request_id.as_deref()) {
            (ErrorKind::InitError, _) => endpoint.init_error_url(),
            (ErrorKind::RuntimeError, Some(request_id)) => {
                endpoint.invocation_error_url(request_id)
            }
            (ErrorKind::RuntimeError, None) => {
                tracing::warn!("Invocation failure has no request id; not reporting");
                return;
            }
        };

        let body = match report.to_body() {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode error report");
                return;
            }
        };

        match self.wire.post(&url, &body).await {
            Ok(resp) if resp.is_success() => {
                tracing::debug!(endpoint = %url, status = resp.status, "Error report accepted");
            }
            Ok(resp) => {
                tracing::warn!(
                    endpoint = %url,
                    status = resp.status,
                    body = %resp.body,
                    "Runtime API rejected error report"
                );
            }
            Err(e) => {
                tracing::error!(endpoint = %url, error = %e, "Failed to send error report");
            }
        }
    }
}
