/*
[INPUT]:  Raw inbound frames (text / binary)
[OUTPUT]: JSON payloads (raw string fallback) + sampled diagnostics
[POS]:    WebSocket layer - inbound payload preparation
[UPDATE]: When changing the fallback rule or log sampling limits
*/

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, SocketError};

const MESSAGE_SAMPLE_LIMIT: usize = 3;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static MESSAGE_SAMPLE_COUNT: AtomicUsize = AtomicUsize::new(0);
static PARSE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Parse a text frame as JSON, keeping the raw text when it is not JSON.
pub fn decode_text(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(parsed) => {
            log_message_sample_once(&parsed);
            parsed
        }
        Err(err) => {
            log_parse_fail_once(&err, &text);
            Value::String(text)
        }
    }
}

/// Binary frames must hold UTF-8 text; anything else is a decode error.
pub fn decode_binary(bytes: Vec<u8>) -> Result<Value> {
    let text = String::from_utf8(bytes).map_err(|err| SocketError::Decode(err.to_string()))?;
    Ok(decode_text(text))
}

fn log_message_sample_once(message: &Value) {
    let count = MESSAGE_SAMPLE_COUNT.fetch_add(1, Ordering::Relaxed);
    if count >= MESSAGE_SAMPLE_LIMIT {
        return;
    }

    let kind = message
        .get("type")
        .or_else(|| message.get("txType"))
        .or_else(|| message.get("method"))
        .and_then(|value| value.as_str())
        .unwrap_or("unknown");
    info!(
        sample_index = count + 1,
        sample_limit = MESSAGE_SAMPLE_LIMIT,
        kind,
        "ws message sample"
    );
}

fn log_parse_fail_once(err: &serde_json::Error, raw: &str) {
    let count = PARSE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < PARSE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message not json; delivering raw text"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            message = %preview,
            "ws message not json; delivering raw text"
        );
    }
}

pub(crate) fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
