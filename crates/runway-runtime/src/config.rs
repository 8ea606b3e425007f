use std::collections::HashMap;

use crate::endpoint::RuntimeEndpoint;
use crate::error::RuntimeError;

pub const RUNTIME_API_AUTHORITY: &str = "RUNTIME_API_AUTHORITY";
pub const HANDLER: &str = "HANDLER";
pub const SINGLE_LOOP: &str = "SINGLE_LOOP";
pub const LOG_FORMAT: &str = "LOG_FORMAT";
pub const LOCAL_EVENT: &str = "LOCAL_EVENT";
pub const HANDLER_INSTANCE: &str = "HANDLER_INSTANCE";

const RUNTIME_API_FALLBACK: &str = "AWS_LAMBDA_RUNTIME_API";
const HANDLER_FALLBACK: &str = "_HANDLER";
const LOG_FORMAT_FALLBACK: &str = "AWS_LAMBDA_LOG_FORMAT";

const FUNCTION_NAME: &str = "AWS_LAMBDA_FUNCTION_NAME";
const FUNCTION_VERSION: &str = "AWS_LAMBDA_FUNCTION_VERSION";
const FUNCTION_MEMORY_SIZE: &str = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE";
const LOG_GROUP_NAME: &str = "AWS_LAMBDA_LOG_GROUP_NAME";
const LOG_STREAM_NAME: &str = "AWS_LAMBDA_LOG_STREAM_NAME";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `JSON` selects the envelope format; any other value falls back to text.
    pub fn from_env_map(env: &HashMap<String, String>) -> Self {
        let lookup = |key: &str| env.get(key).filter(|v| !v.is_empty());
        match lookup(LOG_FORMAT).or_else(|| lookup(LOG_FORMAT_FALLBACK)) {
            Some(format) if format == "JSON" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// How long a resolved handler instance lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstancePolicy {
    /// One instance, built before the loop starts, serves every invocation.
    #[default]
    Shared,
    /// A fresh instance per invocation.
    PerInvocation,
}

/// Function metadata the platform publishes through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub function_name: Option<String>,
    pub function_version: Option<String>,
    pub memory_limit_mb: Option<u32>,
    pub log_group_name: Option<String>,
    pub log_stream_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// `None` runs the loop offline against `local_event`.
    pub endpoint: Option<RuntimeEndpoint>,
    pub handler: Option<String>,
    pub single_loop: bool,
    pub log_format: LogFormat,
    pub local_event: Option<String>,
    pub instance_policy: InstancePolicy,
    pub function: FunctionMetadata,
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, RuntimeError> {
        Self::from_env_map(&std::env::vars().collect())
    }

    /// Unreadable optional settings are logged and replaced by their defaults.
    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self, RuntimeError> {
        let lookup = |key: &str| env.get(key).filter(|v| !v.is_empty()).cloned();
        let lookup_or = |key: &str, fallback: &str| lookup(key).or_else(|| lookup(fallback));

        let endpoint =
            lookup_or(RUNTIME_API_AUTHORITY, RUNTIME_API_FALLBACK).map(RuntimeEndpoint::new);

        let instance_policy = match lookup(HANDLER_INSTANCE).as_deref() {
            None | Some("shared") => InstancePolicy::Shared,
            Some("per-invocation") => InstancePolicy::PerInvocation,
            Some(other) => {
                tracing::warn!(
                    value = other,
                    "Unknown {HANDLER_INSTANCE}, falling back to `shared`"
                );
                InstancePolicy::Shared
            }
        };

        let memory_limit_mb = lookup(FUNCTION_MEMORY_SIZE).and_then(|raw| {
            raw.trim()
                .parse::<u32>()
                .inspect_err(|e| {
                    tracing::warn!(
                        value = %raw,
                        error = %e,
                        "Ignoring invalid {FUNCTION_MEMORY_SIZE}"
                    );
                })
                .ok()
        });

        // Without a runtime API there is nothing to fetch a second event from.
        let single_loop = endpoint.is_none() || lookup(SINGLE_LOOP).as_deref() == Some("true");

        Ok(Self {
            endpoint,
            handler: lookup_or(HANDLER, HANDLER_FALLBACK),
            single_loop,
            log_format: LogFormat::from_env_map(env),
            local_event: lookup(LOCAL_EVENT),
            instance_policy,
            function: FunctionMetadata {
                function_name: lookup(FUNCTION_NAME),
                function_version: lookup(FUNCTION_VERSION),
                memory_limit_mb,
                log_group_name: lookup(LOG_GROUP_NAME),
                log_stream_name: lookup(LOG_STREAM_NAME),
            },
        })
    }

    pub fn is_offline(&self) -> bool {
        self.endpoint.is_none()
    }
}
