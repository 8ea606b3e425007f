use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use runway_codec::PayloadCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::InstancePolicy;
use crate::context::Context;
use crate::error::RuntimeError;
use crate::handler::{
    DEFAULT_MEMBER, HandlerDescriptor, HandlerShape, InputType, Invoke, RequestHandler,
    RequestStreamHandler, invoke_stream, invoke_typed,
};

/// Parsed `"<type>"` or `"<type>::<member>"` handler specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpecifier {
    pub type_name: String,
    pub member: Option<String>,
}

impl HandlerSpecifier {
    /// Split at the first `::`. An empty member counts as no member.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once("::") {
            Some((type_name, member)) => {
                let member = member.trim();
                Self {
                    type_name: type_name.trim().to_string(),
                    member: (!member.is_empty()).then(|| member.to_string()),
                }
            }
            None => Self {
                type_name: raw.trim().to_string(),
                member: None,
            },
        }
    }
}

impl fmt::Display for HandlerSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}::{member}", self.type_name),
            None => f.write_str(&self.type_name),
        }
    }
}

type Constructor<H> = Arc<dyn Fn() -> anyhow::Result<H> + Send + Sync>;
type TypedCall<H> =
    Arc<dyn Fn(&H, &PayloadCodec, &str, &Context) -> Result<String, RuntimeError> + Send + Sync>;
type StreamCall<H> = Arc<dyn Fn(&H, &str, &Context) -> Result<String, RuntimeError> + Send + Sync>;

enum Call<H> {
    Typed(TypedCall<H>),
    Stream(StreamCall<H>),
}

impl<H> Clone for Call<H> {
    fn clone(&self) -> Self {
        match self {
            Call::Typed(call) => Call::Typed(Arc::clone(call)),
            Call::Stream(call) => Call::Stream(Arc::clone(call)),
        }
    }
}

impl<H> Call<H> {
    fn shape(&self) -> HandlerShape {
        match self {
            Call::Typed(_) => HandlerShape::Typed,
            Call::Stream(_) => HandlerShape::Stream,
        }
    }
}

struct Member<H> {
    name: String,
    input_type: InputType,
    call: Call<H>,
}

impl<H> Member<H> {
    fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Registration of one handler type: how to build it and what it exposes.
///
/// ```rust
/// use runway_runtime::{Context, HandlerType, RequestHandler};
///
/// #[derive(Default)]
/// struct Orders;
///
/// impl RequestHandler for Orders {
///     type Input = String;
///     type Output = String;
///
///     fn handle_request(&self, id: String, _ctx: &Context) -> anyhow::Result<String> {
///         Ok(format!("order {id}"))
///     }
/// }
///
/// let orders = HandlerType::<Orders>::with_default()
///     .request_handler()
///     .method("cancel", |_orders: &Orders, id: String, _ctx: &Context| {
///         Ok(format!("cancelled {id}"))
///     });
/// ```
pub struct HandlerType<H> {
    constructor: Constructor<H>,
    stream: Option<Member<H>>,
    typed: Option<Member<H>>,
    methods: Vec<Member<H>>,
}

impl<H: Send + Sync + 'static> HandlerType<H> {
    pub fn new(constructor: impl Fn() -> anyhow::Result<H> + Send + Sync + 'static) -> Self {
        Self {
            constructor: Arc::new(constructor),
            stream: None,
            typed: None,
            methods: Vec::new(),
        }
    }

    pub fn with_default() -> Self
    where
        H: Default,
    {
        Self::new(|| Ok(H::default()))
    }

    /// Expose the type's [`RequestHandler`] implementation.
    pub fn request_handler(mut self) -> Self
    where
        H: RequestHandler,
    {
        let call: TypedCall<H> = Arc::new(
            |handler: &H, codec: &PayloadCodec, payload: &str, context: &Context| {
                invoke_typed(
                    codec,
                    payload,
                    context,
                    |input: <H as RequestHandler>::Input, ctx: &Context| {
                        <H as RequestHandler>::handle_request(handler, input, ctx)
                    },
                )
            },
        );
        self.typed = Some(Member {
            name: DEFAULT_MEMBER.to_string(),
            input_type: InputType::of::<<H as RequestHandler>::Input>(),
            call: Call::Typed(call),
        });
        self
    }

    /// Expose the type's [`RequestStreamHandler`] implementation.
    pub fn stream_handler(mut self) -> Self
    where
        H: RequestStreamHandler,
    {
        let call: StreamCall<H> =
            Arc::new(|handler: &H, payload: &str, context: &Context| {
                invoke_stream(handler, payload, context)
            });
        self.stream = Some(Member {
            name: DEFAULT_MEMBER.to_string(),
            input_type: InputType::Bytes,
            call: Call::Stream(call),
        });
        self
    }

    /// Expose an additional typed entry point, addressable as `Type::name`.
    pub fn method<I, O, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        I: DeserializeOwned + 'static,
        O: Serialize + 'static,
        F: Fn(&H, I, &Context) -> anyhow::Result<O> + Send + Sync + 'static,
    {
        let call: TypedCall<H> = Arc::new(
            move |handler: &H, codec: &PayloadCodec, payload: &str, context: &Context| {
                invoke_typed(codec, payload, context, |input: I, ctx: &Context| {
                    f(handler, input, ctx)
                })
            },
        );
        self.methods.push(Member {
            name: name.into(),
            input_type: InputType::of::<I>(),
            call: Call::Typed(call),
        });
        self
    }

    fn capabilities(&self) -> impl Iterator<Item = &Member<H>> {
        self.stream.iter().chain(self.typed.iter())
    }

    fn find(&self, name: &str) -> Option<&Member<H>> {
        self.methods
            .iter()
            .find(|m| m.is_named(name))
            .or_else(|| self.capabilities().find(|m| m.is_named(name)))
    }

    /// Entry point used when the specifier names no member.
    fn default_member(&self) -> Option<&Member<H>> {
        self.capabilities()
            .next()
            .or_else(|| self.methods.iter().find(|m| m.is_named(DEFAULT_MEMBER)))
    }
}

enum Instance<H> {
    Shared(Arc<H>),
    Fresh(Constructor<H>),
}

impl<H> Instance<H> {
    fn get(&self, type_name: &str) -> Result<Arc<H>, RuntimeError> {
        match self {
            Instance::Shared(handler) => Ok(Arc::clone(handler)),
            Instance::Fresh(constructor) => constructor().map(Arc::new).map_err(|e| {
                let e = e.context(format!("could not construct handler `{type_name}`"));
                RuntimeError::Handler(e)
            }),
        }
    }
}

trait Registration: Send + Sync {
    fn resolve(
        &self,
        type_name: &str,
        member: Option<&str>,
        codec: &Arc<PayloadCodec>,
        policy: InstancePolicy,
    ) -> Result<HandlerDescriptor, RuntimeError>;

    fn member_names(&self) -> Vec<String>;
}

impl<H: Send + Sync + 'static> Registration for HandlerType<H> {
    fn resolve(
        &self,
        type_name: &str,
        member: Option<&str>,
        codec: &Arc<PayloadCodec>,
        policy: InstancePolicy,
    ) -> Result<HandlerDescriptor, RuntimeError> {
        let instance = (self.constructor)().map_err(|e| RuntimeError::Construction {
            type_name: type_name.to_string(),
            reason: format!("{e:#}"),
        })?;

        let selected = match member {
            Some(name) => self.find(name).ok_or_else(|| RuntimeError::HandlerNotFound {
                specifier: format!("{type_name}::{name}"),
            })?,
            None => self
                .default_member()
                .ok_or_else(|| RuntimeError::UnsupportedHandler(type_name.to_string()))?,
        };

        let source = match policy {
            InstancePolicy::Shared => Instance::Shared(Arc::new(instance)),
            InstancePolicy::PerInvocation => Instance::Fresh(Arc::clone(&self.constructor)),
        };
        let call = selected.call.clone();
        let codec = Arc::clone(codec);
        let label = type_name.to_string();

        let invoke: Invoke = Box::new(move |payload: &str, context: &Context| {
            let handler = source.get(&label)?;
            match &call {
                Call::Typed(call) => call(&*handler, &codec, payload, context),
                Call::Stream(call) => call(&*handler, payload, context),
            }
        });

        Ok(HandlerDescriptor::new(
            type_name.to_string(),
            selected.name.clone(),
            selected.call.shape(),
            selected.input_type.clone(),
            invoke,
        ))
    }

    fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .capabilities()
            .chain(self.methods.iter())
            .map(|m| m.name.clone())
            .collect();
        names.dedup();
        names
    }
}

/// Name-addressable handler types.
///
/// Every type the runtime can dispatch to must be registered under the name
/// used in handler specifiers.
pub struct HandlerRegistry {
    types: HashMap<String, Box<dyn Registration>>,
    codec: Arc<PayloadCodec>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("types", &self.type_names())
            .field("codec", &self.codec)
            .finish()
    }
}

impl HandlerRegistry {
    /// Registry whose codec understands the built-in platform event types.
    pub fn new() -> Self {
        Self::with_codec(PayloadCodec::with_platform_events())
    }

    pub fn with_codec(codec: PayloadCodec) -> Self {
        Self {
            types: HashMap::new(),
            codec: Arc::new(codec),
        }
    }

    pub fn register<H: Send + Sync + 'static>(
        &mut self,
        type_name: impl Into<String>,
        handler: HandlerType<H>,
    ) -> &mut Self {
        let type_name = type_name.into();
        if self.types.insert(type_name.clone(), Box::new(handler)).is_some() {
            tracing::warn!(handler = %type_name, "Replaced existing handler registration");
        }
        self
    }

    pub fn codec(&self) -> &PayloadCodec {
        &self.codec
    }

    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Every addressable `Type::member`, sorted.
    pub fn specifiers(&self) -> Vec<String> {
        let mut specifiers: Vec<String> = self
            .types
            .iter()
            .flat_map(|(type_name, registration)| {
                registration
                    .member_names()
                    .into_iter()
                    .map(move |member| format!("{type_name}::{member}"))
            })
            .collect();
        specifiers.sort_unstable();
        specifiers
    }

    /// Resolve a specifier to a ready-to-invoke handler.
    ///
    /// The type is constructed here, once, even under
    /// [`InstancePolicy::PerInvocation`], so a broken constructor surfaces as
    /// an init error rather than on the first event.
    pub fn resolve(
        &self,
        specifier: &str,
        policy: InstancePolicy,
    ) -> Result<HandlerDescriptor, RuntimeError> {
        let parsed = HandlerSpecifier::parse(specifier);
        let registration =
            self.types
                .get(&parsed.type_name)
                .ok_or_else(|| RuntimeError::HandlerNotFound {
                    specifier: specifier.to_string(),
                })?;

        let descriptor = registration.resolve(
            &parsed.type_name,
            parsed.member.as_deref(),
            &self.codec,
            policy,
        )?;

        tracing::info!(
            handler = %parsed,
            member = %descriptor.member(),
            shape = ?descriptor.shape(),
            input = ?descriptor.input_type(),
            "Resolved handler"
        );
        Ok(descriptor)
    }
}
