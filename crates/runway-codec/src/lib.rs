//! Payload codec for runway.
//!
//! Converts between the JSON text exchanged with the runtime API and the
//! native input/output types of handlers. Platform event payloads use
//! inconsistent wire naming (`Records`, `eventSourceARN`, `x-amz-id-2`), so
//! types bound to a [`SchemaSet`] are reconciled field by field before serde
//! maps them.
//!
//! # Quick start
//!
//! ```rust
//! use runway_codec::PayloadCodec;
//! use runway_codec::events::SqsEvent;
//!
//! let codec = PayloadCodec::with_platform_events();
//! let event: SqsEvent = codec
//!     .decode(r#"{"Records":[{"body":"hi","eventSourceARN":"arn:q"}]}"#)
//!     .unwrap();
//! assert_eq!(event.records[0].event_source_arn.as_deref(), Some("arn:q"));
//!
//! // Plain strings go back out unquoted.
//! assert_eq!(codec.encode(&"done").unwrap(), "done");
//! ```

pub mod codec;
pub mod error;
pub mod events;
pub mod naming;
pub mod scalar;
pub mod schema;

pub use codec::PayloadCodec;
pub use error::CodecError;
pub use scalar::{DateTimeCodec, ScalarCodec};
pub use schema::{FieldShape, SchemaSet, TypeSchema};
