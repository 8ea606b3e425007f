//! Handlers shipped with the bootstrap binary.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use runway_codec::events::{DynamodbEvent, SqsEvent};
use runway_runtime::{
    Context, HandlerRegistry, HandlerType, RequestHandler, RequestStreamHandler,
};
use serde::Serialize;

/// Returns its input unchanged.
#[derive(Default)]
pub struct Echo;

impl RequestHandler for Echo {
    type Input = String;
    type Output = String;

    fn handle_request(&self, input: String, context: &Context) -> anyhow::Result<String> {
        tracing::debug!(request_id = %context.request_id(), bytes = input.len(), "Echoing");
        Ok(input)
    }
}

/// Reports the size of the raw payload without decoding it.
#[derive(Default)]
pub struct ByteCount;

impl RequestStreamHandler for ByteCount {
    fn handle_request(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        _context: &Context,
    ) -> anyhow::Result<()> {
        let mut raw = Vec::new();
        input.read_to_end(&mut raw)?;
        let lines = raw.iter().filter(|&&b| b == b'\n').count();
        let summary = serde_json::json!({ "bytes": raw.len(), "lines": lines });
        serde_json::to_writer(&mut *output, &summary)?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub messages: usize,
    pub sources: Vec<String>,
}

/// Summarises an SQS batch.
#[derive(Default)]
pub struct QueueReport;

impl RequestHandler for QueueReport {
    type Input = SqsEvent;
    type Output = QueueSummary;

    fn handle_request(&self, event: SqsEvent, context: &Context) -> anyhow::Result<QueueSummary> {
        let mut sources: Vec<String> = event
            .records
            .iter()
            .filter_map(|m| m.event_source_arn.clone())
            .collect();
        sources.sort();
        sources.dedup();
        context
            .logger()
            .log(&format!("received {} messages", event.records.len()));
        Ok(QueueSummary {
            messages: event.records.len(),
            sources,
        })
    }
}

/// Counts DynamoDB stream records by event name.
#[derive(Default)]
pub struct StreamReport;

impl RequestHandler for StreamReport {
    type Input = DynamodbEvent;
    type Output = BTreeMap<String, usize>;

    fn handle_request(
        &self,
        event: DynamodbEvent,
        _context: &Context,
    ) -> anyhow::Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for record in event.records {
            let name = record.event_name.unwrap_or_else(|| "UNKNOWN".into());
            *counts.entry(name).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

/// Always fails; exercises the error path end to end.
#[derive(Default)]
pub struct Fail;

impl RequestHandler for Fail {
    type Input = serde_json::Value;
    type Output = ();

    fn handle_request(&self, input: serde_json::Value, _context: &Context) -> anyhow::Result<()> {
        let reason = input
            .get("reason")
            .and_then(|r| r.as_str())
            .unwrap_or("requested failure");
        anyhow::bail!("{reason}")
    }
}

pub fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry
        .register(
            "demo.Echo",
            HandlerType::<Echo>::with_default()
                .request_handler()
                .method("upper", |_: &Echo, input: String, _: &Context| {
                    Ok(input.to_uppercase())
                }),
        )
        .register(
            "demo.ByteCount",
            HandlerType::<ByteCount>::with_default().stream_handler(),
        )
        .register(
            "demo.QueueReport",
            HandlerType::<QueueReport>::with_default().request_handler(),
        )
        .register(
            "demo.StreamReport",
            HandlerType::<StreamReport>::with_default().request_handler(),
        )
        .register(
            "demo.Fail",
            HandlerType::<Fail>::with_default().request_handler(),
        );
    registry
}
