use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};

use runway_codec::PayloadCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::Context;
use crate::error::RuntimeError;

/// Member name the capability traits are exposed under.
pub const DEFAULT_MEMBER: &str = "handleRequest";

/// A handler that takes a decoded input and returns a value to encode.
///
/// ```rust
/// use runway_runtime::{Context, RequestHandler};
///
/// struct Greeter;
///
/// impl RequestHandler for Greeter {
///     type Input = String;
///     type Output = String;
///
///     fn handle_request(&self, name: String, _ctx: &Context) -> anyhow::Result<String> {
///         Ok(format!("hello {name}"))
///     }
/// }
/// ```
pub trait RequestHandler: Send + Sync + 'static {
    type Input: DeserializeOwned + 'static;
    type Output: Serialize + 'static;

    fn handle_request(&self, input: Self::Input, context: &Context)
    -> anyhow::Result<Self::Output>;
}

/// A handler that works on the raw payload bytes.
pub trait RequestStreamHandler: Send + Sync + 'static {
    fn handle_request(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        context: &Context,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerShape {
    Typed,
    Stream,
}

/// What a resolved handler expects as input. Computed once at resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    Bytes,
    Text,
    UntypedMap,
    Json,
    Unit,
    Typed(&'static str),
}

impl InputType {
    pub fn of<T: 'static>() -> Self {
        let id = TypeId::of::<T>();
        if id == TypeId::of::<String>() {
            InputType::Text
        } else if id == TypeId::of::<serde_json::Map<String, Value>>()
            || id == TypeId::of::<HashMap<String, Value>>()
            || id == TypeId::of::<BTreeMap<String, Value>>()
        {
            InputType::UntypedMap
        } else if id == TypeId::of::<Value>() {
            InputType::Json
        } else if id == TypeId::of::<()>() {
            InputType::Unit
        } else {
            InputType::Typed(std::any::type_name::<T>())
        }
    }
}

pub(crate) type Invoke =
    Box<dyn Fn(&str, &Context) -> Result<String, RuntimeError> + Send + Sync>;

/// A resolved entry point, ready to be invoked once per event.
pub struct HandlerDescriptor {
    type_name: String,
    member: String,
    shape: HandlerShape,
    input_type: InputType,
    invoke: Invoke,
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("type_name", &self.type_name)
            .field("member", &self.member)
            .field("shape", &self.shape)
            .field("input_type", &self.input_type)
            .finish_non_exhaustive()
    }
}

impl HandlerDescriptor {
    pub(crate) fn new(
        type_name: String,
        member: String,
        shape: HandlerShape,
        input_type: InputType,
        invoke: Invoke,
    ) -> Self {
        Self {
            type_name,
            member,
            shape,
            input_type,
            invoke,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn shape(&self) -> HandlerShape {
        self.shape
    }

    pub fn input_type(&self) -> &InputType {
        &self.input_type
    }

    /// Run the handler on a raw payload and return the encoded result.
    ///
    /// A panic in handler code is caught and returned as
    /// [`RuntimeError::Handler`] carrying the panic message.
    pub fn invoke(&self, payload: &str, context: &Context) -> Result<String, RuntimeError> {
        panic::catch_unwind(AssertUnwindSafe(|| (self.invoke)(payload, context))).unwrap_or_else(
            |cause| {
                Err(RuntimeError::Handler(anyhow::anyhow!(
                    "handler panicked: {}",
                    panic_message(cause.as_ref())
                )))
            },
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

pub(crate) fn invoke_stream<H: RequestStreamHandler>(
    handler: &H,
    payload: &str,
    context: &Context,
) -> Result<String, RuntimeError> {
    let mut input = payload.as_bytes();
    let mut output = Vec::new();
    handler
        .handle_request(&mut input, &mut output, context)
        .map_err(RuntimeError::Handler)?;
    Ok(String::from_utf8_lossy(&output).into_owned())
}

pub(crate) fn invoke_typed<I, O>(
    codec: &PayloadCodec,
    payload: &str,
    context: &Context,
    call: impl FnOnce(I, &Context) -> anyhow::Result<O>,
) -> Result<String, RuntimeError>
where
    I: DeserializeOwned + 'static,
    O: Serialize + 'static,
{
    let input: I = codec.decode(payload)?;
    let output = call(input, context).map_err(RuntimeError::Handler)?;
    Ok(codec.encode(&output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use crate::logger::{Logger, MemorySink};

    fn context() -> Context {
        Context::new("req-1", Logger::with_sink(LogFormat::Text, MemorySink::new()))
    }

    #[derive(serde::Deserialize)]
    struct Order {
        #[allow(dead_code)]
        id: u32,
    }

    #[test]
    fn input_type_classification() {
        assert_eq!(InputType::of::<String>(), InputType::Text);
        assert_eq!(
            InputType::of::<HashMap<String, Value>>(),
            InputType::UntypedMap
        );
        assert_eq!(
            InputType::of::<serde_json::Map<String, Value>>(),
            InputType::UntypedMap
        );
        assert_eq!(InputType::of::<Value>(), InputType::Json);
        assert_eq!(InputType::of::<()>(), InputType::Unit);
        assert!(matches!(
            InputType::of::<Order>(),
            InputType::Typed(name) if name.ends_with("Order")
        ));
    }

    struct Upper;

    impl RequestStreamHandler for Upper {
        fn handle_request(
            &self,
            input: &mut dyn Read,
            output: &mut dyn Write,
            _context: &Context,
        ) -> anyhow::Result<()> {
            let mut text = String::new();
            input.read_to_string(&mut text)?;
            output.write_all(text.to_uppercase().as_bytes())?;
            Ok(())
        }
    }

    #[test]
    fn stream_invocation_bypasses_codec() {
        let out = invoke_stream(&Upper, "{\"a\": 1}", &context()).unwrap();
        assert_eq!(out, "{\"A\": 1}");
    }

    #[test]
    fn typed_invocation_uses_codec() {
        let codec = PayloadCodec::new();
        let out =
            invoke_typed(&codec, "21", &context(), |n: i64, _ctx: &Context| Ok(n * 2)).unwrap();
        assert_eq!(out, "42");

        let out = invoke_typed(&codec, "plain text", &context(), |s: String, _ctx: &Context| {
            Ok(s.len())
        })
        .unwrap();
        assert_eq!(out, "10");
    }

    #[test]
    fn handler_errors_keep_their_message() {
        let codec = PayloadCodec::new();
        let fail = |_: String, _ctx: &Context| -> anyhow::Result<()> {
            anyhow::bail!("card declined")
        };
        let err = invoke_typed(&codec, "x", &context(), fail).unwrap_err();
        assert!(matches!(err, RuntimeError::Handler(_)));
        assert_eq!(err.to_string(), "card declined");
    }

    #[test]
    fn decode_failures_are_codec_errors() {
        let codec = PayloadCodec::new();
        let ignore = |_: HashMap<String, Value>, _ctx: &Context| Ok(());
        let err = invoke_typed(&codec, "[1,2]", &context(), ignore).unwrap_err();
        assert!(matches!(err, RuntimeError::Codec(_)));
    }

    fn descriptor(invoke: Invoke) -> HandlerDescriptor {
        HandlerDescriptor::new(
            "demo.Fragile".into(),
            DEFAULT_MEMBER.into(),
            HandlerShape::Typed,
            InputType::Json,
            invoke,
        )
    }

    #[test]
    fn panics_become_handler_errors() {
        let codec = PayloadCodec::new();
        let handler = descriptor(Box::new(move |payload: &str, context: &Context| {
            invoke_typed(&codec, payload, context, |items: Vec<i64>, _ctx: &Context| {
                Ok(items[3])
            })
        }));

        let err = handler.invoke("[1]", &context()).unwrap_err();
        assert!(matches!(err, RuntimeError::Handler(_)));
        assert!(
            err.to_string()
                .starts_with("handler panicked: index out of bounds"),
            "{err}"
        );

        // The descriptor stays usable after a caught panic.
        assert_eq!(handler.invoke("[1,2,3,4]", &context()).unwrap(), "4");
    }

    #[test]
    fn formatted_and_opaque_panic_payloads() {
        let formatted = descriptor(Box::new(
            |_: &str, ctx: &Context| -> Result<String, RuntimeError> {
                panic!("no stock for {}", ctx.request_id())
            },
        ));
        let err = formatted.invoke("", &context()).unwrap_err();
        assert_eq!(err.to_string(), "handler panicked: no stock for req-1");

        let opaque = descriptor(Box::new(
            |_: &str, _: &Context| -> Result<String, RuntimeError> { panic::panic_any(7_u8) },
        ));
        let err = opaque.invoke("", &context()).unwrap_err();
        assert_eq!(err.to_string(), "handler panicked: non-string panic payload");
    }
}
