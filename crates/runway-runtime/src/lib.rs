//! Invocation loop for runway.
//!
//! Pulls events from the platform's runtime API, hands each one to a handler
//! resolved by name from a [`HandlerRegistry`], and posts back either the
//! encoded result or a structured error. Without a runtime API the loop runs
//! once, offline, against a locally supplied event.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use runway_runtime::{
//!     Context, HandlerRegistry, HandlerType, RequestHandler, Runtime, RuntimeConfig,
//! };
//!
//! #[derive(Default)]
//! struct Hello;
//!
//! impl RequestHandler for Hello {
//!     type Input = String;
//!     type Output = String;
//!
//!     fn handle_request(&self, name: String, ctx: &Context) -> anyhow::Result<String> {
//!         ctx.logger().log(&format!("greeting {name}"));
//!         Ok(format!("hello {name}"))
//!     }
//! }
//!
//! # async fn start() -> Result<(), runway_runtime::RuntimeError> {
//! let mut registry = HandlerRegistry::new();
//! registry.register("example.Hello", HandlerType::<Hello>::with_default().request_handler());
//!
//! let config = RuntimeConfig::from_env()?;
//! Runtime::new(config, registry).run().await
//! # }
//! ```

pub mod config;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod logger;
pub mod registry;
pub mod report;
pub mod runtime;
pub mod wire;

pub use config::{FunctionMetadata, InstancePolicy, LogFormat, RuntimeConfig};
pub use context::Context;
pub use endpoint::RuntimeEndpoint;
pub use error::RuntimeError;
pub use handler::{
    HandlerDescriptor, HandlerShape, InputType, RequestHandler, RequestStreamHandler,
};
pub use logger::{Logger, MemorySink};
pub use registry::{HandlerRegistry, HandlerSpecifier, HandlerType};
pub use report::{ErrorKind, ErrorReport, ErrorReporter};
pub use runtime::{CycleOutcome, InvocationEnvelope, LoopState, Runtime};
pub use wire::{HttpWireClient, StubWireClient, WireClient, WireResponse};
