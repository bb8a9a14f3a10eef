use crate::error::DuffelError;
use crate::otel;
use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;
use std::sync::OnceLock;

pub fn inc_duffel_request_success() {
    duffel_request_success().add(1, &[])
}

pub fn inc_duffel_request_error(error: &DuffelError) {
    let attributes = vec![
        KeyValue::new("status", error.status().to_string()),
        KeyValue::new("kind", error.kind().to_string()),
    ];
    duffel_request_error().add(1, &attributes)
}

pub fn inc_tool_call(tool: &'static str) {
    tool_calls().add(1, &[KeyValue::new("tool", tool)])
}

fn duffel_request_success() -> &'static Counter<u64> {
    static COUNTER: OnceLock<Counter<u64>> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let meter = otel::get_meter();
        meter
            .u64_counter("duffel_request_success")
            .with_description("Number of successful Duffel API requests")
            .build()
    })
}

fn duffel_request_error() -> &'static Counter<u64> {
    static COUNTER: OnceLock<Counter<u64>> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let meter = otel::get_meter();
        meter
            .u64_counter("duffel_request_error")
            .with_description("Number of failed Duffel API requests")
            .build()
    })
}

fn tool_calls() -> &'static Counter<u64> {
    static COUNTER: OnceLock<Counter<u64>> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let meter = otel::get_meter();
        meter
            .u64_counter("tool_calls")
            .with_description("Number of tool calls dispatched from model responses")
            .build()
    })
}
