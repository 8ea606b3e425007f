//! Drives the loop over real HTTP against an in-process mock of the runtime API.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use runway_codec::events::SqsEvent;
use runway_runtime::{
    Context, CycleOutcome, HandlerRegistry, HandlerType, LogFormat, Logger, MemorySink,
    RequestHandler, RequestStreamHandler, Runtime, RuntimeConfig, RuntimeError,
};
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Posted {
    path: String,
    body: String,
}

#[derive(Default)]
struct MockApi {
    events: Mutex<VecDeque<(String, String)>>,
    posts: Mutex<Vec<Posted>>,
}

impl MockApi {
    fn push_event(&self, request_id: &str, body: &str) {
        self.events
            .lock()
            .unwrap()
            .push_back((request_id.to_string(), body.to_string()));
    }

    fn posts(&self) -> Vec<Posted> {
        self.posts.lock().unwrap().clone()
    }

    fn record(&self, path: String, body: String) {
        self.posts.lock().unwrap().push(Posted { path, body });
    }
}

async fn next_invocation(State(api): State<Arc<MockApi>>) -> Response {
    let event = api.events.lock().unwrap().pop_front();
    match event {
        Some((request_id, body)) => (
            [
                ("Lambda-Runtime-Aws-Request-Id", request_id),
                ("Lambda-Runtime-Trace-Id", "Root=1-65f1a2b3-test".to_string()),
            ],
            body,
        )
            .into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn invocation_response(
    State(api): State<Arc<MockApi>>,
    Path(request_id): Path<String>,
    body: String,
) -> StatusCode {
    api.record(format!("/invocation/{request_id}/response"), body);
    StatusCode::ACCEPTED
}

async fn invocation_error(
    State(api): State<Arc<MockApi>>,
    Path(request_id): Path<String>,
    body: String,
) -> StatusCode {
    api.record(format!("/invocation/{request_id}/error"), body);
    StatusCode::ACCEPTED
}

async fn init_error(State(api): State<Arc<MockApi>>, body: String) -> StatusCode {
    api.record("/init/error".to_string(), body);
    StatusCode::ACCEPTED
}

async fn serve_mock() -> (Arc<MockApi>, String) {
    let api = Arc::new(MockApi::default());
    let app = Router::new()
        .route("/2018-06-01/runtime/invocation/next", get(next_invocation))
        .route(
            "/2018-06-01/runtime/invocation/{request_id}/response",
            post(invocation_response),
        )
        .route(
            "/2018-06-01/runtime/invocation/{request_id}/error",
            post(invocation_error),
        )
        .route("/2018-06-01/runtime/init/error", post(init_error))
        .with_state(Arc::clone(&api));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let authority = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (api, authority)
}

#[derive(Default)]
struct DataStream;

impl RequestStreamHandler for DataStream {
    fn handle_request(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        _context: &Context,
    ) -> anyhow::Result<()> {
        let mut body = String::new();
        input.read_to_string(&mut body)?;
        write!(output, "{body} result")?;
        Ok(())
    }
}

#[derive(Default)]
struct Success;

impl RequestStreamHandler for Success {
    fn handle_request(
        &self,
        _input: &mut dyn Read,
        output: &mut dyn Write,
        _context: &Context,
    ) -> anyhow::Result<()> {
        output.write_all(b"SUCCESS")?;
        Ok(())
    }
}

#[derive(Default)]
struct Strings;

impl RequestHandler for Strings {
    type Input = String;
    type Output = String;

    fn handle_request(&self, input: String, context: &Context) -> anyhow::Result<String> {
        if input == "explode" {
            anyhow::bail!("handler exploded on {}", context.request_id());
        }
        Ok(input)
    }
}

#[derive(Default)]
struct Sink;

impl RequestHandler for Sink {
    type Input = HashMap<String, serde_json::Value>;
    type Output = ();

    fn handle_request(&self, _input: Self::Input, _context: &Context) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Queue;

impl RequestHandler for Queue {
    type Input = SqsEvent;
    type Output = Vec<String>;

    fn handle_request(&self, event: SqsEvent, _context: &Context) -> anyhow::Result<Vec<String>> {
        Ok(event
            .records
            .into_iter()
            .filter_map(|r| r.event_source_arn)
            .collect())
    }
}

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(
            "test.DataStream",
            HandlerType::<DataStream>::with_default().stream_handler(),
        )
        .register(
            "test.Success",
            HandlerType::<Success>::with_default().stream_handler(),
        )
        .register(
            "test.Strings",
            HandlerType::<Strings>::with_default()
                .request_handler()
                .method("run", |_: &Strings, _: String, _: &Context| {
                    Ok("this is a run string")
                })
                .method("length", |_: &Strings, _: String, _: &Context| Ok(98))
                .method("map", |_: &Strings, _: String, _: &Context| {
                    Ok(HashMap::from([("test", "123")]))
                })
                .method("pick", |_: &Strings, items: Vec<i64>, _: &Context| {
                    Ok(items[3])
                }),
        )
        .register(
            "test.Sink",
            HandlerType::<Sink>::with_default().request_handler(),
        )
        .register(
            "test.Queue",
            HandlerType::<Queue>::with_default().request_handler(),
        );
    registry
}

fn environment(authority: &str, handler: &str, single_loop: bool) -> HashMap<String, String> {
    let mut env = HashMap::from([
        ("RUNTIME_API_AUTHORITY".to_string(), authority.to_string()),
        ("HANDLER".to_string(), handler.to_string()),
    ]);
    if single_loop {
        env.insert("SINGLE_LOOP".to_string(), "true".to_string());
    }
    env
}

fn runtime_from(env: &HashMap<String, String>) -> Runtime {
    let config = RuntimeConfig::from_env_map(env).unwrap();
    Runtime::new(config, registry())
        .with_logger(Logger::with_sink(LogFormat::Text, MemorySink::new()))
}

fn runtime(authority: &str, handler: &str, single_loop: bool) -> Runtime {
    runtime_from(&environment(authority, handler, single_loop))
}

async fn single_response(handler: &str, payload: &str) -> String {
    let (api, authority) = serve_mock().await;
    api.push_event("req-1", payload);

    runtime(&authority, handler, true).run().await.unwrap();

    let posts = api.posts();
    assert_eq!(posts.len(), 1, "{posts:?}");
    assert_eq!(posts[0].path, "/invocation/req-1/response");
    posts[0].body.clone()
}

#[tokio::test]
async fn stream_handler_round_trip() {
    assert_eq!(
        single_response("test.DataStream", "test data").await,
        "test data result"
    );
}

#[tokio::test]
async fn stream_handler_output_is_posted_verbatim() {
    assert_eq!(single_response("test.Success", "{}").await, "SUCCESS");
}

#[tokio::test]
async fn unknown_handler_posts_init_error() {
    let (api, authority) = serve_mock().await;
    api.push_event("req-1", "unused");

    let err = runtime(&authority, "test.DoesNotExist", true)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::HandlerNotFound { .. }));
    assert_eq!(
        api.posts(),
        vec![Posted {
            path: "/init/error".into(),
            body: r#"{"errorMessage":"Could not find handler method","errorType":"InitError"}"#
                .into(),
        }]
    );
    assert_eq!(api.events.lock().unwrap().len(), 1, "no event should be fetched");
}

#[tokio::test]
async fn unit_output_posts_empty_body() {
    assert_eq!(single_response("test.Sink", r#"{"key":"value"}"#).await, "");
}

#[tokio::test]
async fn typed_handler_variants() {
    assert_eq!(
        single_response("test.Strings", "this is a test string").await,
        "this is a test string"
    );
    assert_eq!(
        single_response("test.Strings::handleRequest", "this is a test string").await,
        "this is a test string"
    );
    assert_eq!(single_response("test.Strings::length", "abc").await, "98");
    assert_eq!(
        single_response("test.Strings::map", "abc").await,
        r#"{"test":"123"}"#
    );
    assert_eq!(
        single_response("test.Strings::run", "abc").await,
        "this is a run string"
    );
}

#[tokio::test]
async fn platform_event_payload() {
    let payload = r#"{
        "Records": [
            {"messageId": "m1", "body": "a", "eventSourceARN": "arn:aws:sqs:eu-west-1:1:orders"},
            {"messageId": "m2", "body": "b", "eventSourceARN": "arn:aws:sqs:eu-west-1:1:refunds"}
        ]
    }"#;
    assert_eq!(
        single_response("test.Queue", payload).await,
        r#"["arn:aws:sqs:eu-west-1:1:orders","arn:aws:sqs:eu-west-1:1:refunds"]"#
    );
}

#[tokio::test]
async fn failure_then_success() {
    let (api, authority) = serve_mock().await;
    api.push_event("req-1", "explode");
    api.push_event("req-2", "fine");

    let mut runtime = runtime(&authority, "test.Strings", false);
    let handler = runtime.bootstrap().unwrap();
    let first = runtime.run_cycle(&handler).await.unwrap();
    let second = runtime.run_cycle(&handler).await.unwrap();

    assert_eq!(
        first,
        CycleOutcome::Failed {
            request_id: "req-1".into(),
            message: "handler exploded on req-1".into(),
        }
    );
    assert_eq!(
        second,
        CycleOutcome::Responded {
            request_id: "req-2".into()
        }
    );
    assert_eq!(
        api.posts(),
        vec![
            Posted {
                path: "/invocation/req-1/error".into(),
                body: r#"{"errorMessage":"handler exploded on req-1","errorType":"RuntimeError"}"#
                    .into(),
            },
            Posted {
                path: "/invocation/req-2/response".into(),
                body: "fine".into(),
            },
        ]
    );
}

#[tokio::test]
async fn empty_poll_is_a_transport_error() {
    let (api, authority) = serve_mock().await;

    let err = runtime(&authority, "test.Strings", true)
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::Transport(_)));
    assert!(api.posts().is_empty());
}

#[tokio::test]
async fn panicking_handler_reports_and_keeps_serving() {
    let (api, authority) = serve_mock().await;
    api.push_event("req-1", "[1]");
    api.push_event("req-2", "[1,2,3,4]");

    let mut runtime = runtime(&authority, "test.Strings::pick", false);
    let handler = runtime.bootstrap().unwrap();
    let first = runtime.run_cycle(&handler).await.unwrap();
    let second = runtime.run_cycle(&handler).await.unwrap();

    assert!(
        matches!(
            &first,
            CycleOutcome::Failed { request_id, message }
                if request_id == "req-1" && message.starts_with("handler panicked")
        ),
        "{first:?}"
    );
    assert_eq!(
        second,
        CycleOutcome::Responded {
            request_id: "req-2".into()
        }
    );

    let posts = api.posts();
    assert_eq!(posts.len(), 2, "{posts:?}");
    assert_eq!(posts[0].path, "/invocation/req-1/error");
    let report: serde_json::Value = serde_json::from_str(&posts[0].body).unwrap();
    assert_eq!(report["errorType"], "RuntimeError");
    assert!(
        report["errorMessage"]
            .as_str()
            .unwrap()
            .contains("index out of bounds")
    );
    assert_eq!(
        posts[1],
        Posted {
            path: "/invocation/req-2/response".into(),
            body: "4".into(),
        }
    );
}

#[tokio::test]
async fn malformed_function_metadata_does_not_block_serving() {
    let (api, authority) = serve_mock().await;
    api.push_event("req-1", "still here");

    let mut env = environment(&authority, "test.Strings", true);
    env.insert("AWS_LAMBDA_FUNCTION_MEMORY_SIZE".into(), "lots".into());
    env.insert("HANDLER_INSTANCE".into(), "sometimes".into());
    runtime_from(&env).run().await.unwrap();

    assert_eq!(
        api.posts(),
        vec![Posted {
            path: "/invocation/req-1/response".into(),
            body: "still here".into(),
        }]
    );
}
