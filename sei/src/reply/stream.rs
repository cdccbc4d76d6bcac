//! Response body decoding
//!
//! The chat endpoint answers either with one JSON document or with
//! newline-delimited JSON chunks, and nothing in the response says which.
//! [`decode_body`] autodetects the shape from the number of non-empty lines.

use serde::Deserialize;
use tracing::debug;

/// Lines containing this marker are kept verbatim even when they are not JSON
const TASK_MARKER: &str = "\"task\":";

/// One chunk (or the whole document) of a chat response
#[derive(Debug, Deserialize)]
struct ChatChunk {
    message: Option<ChatChunkMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChunkMessage {
    content: Option<String>,
}

/// Decode a raw response body into a single trimmed reply string
///
/// - More than one non-empty line: each line is a chunk whose
///   `message.content` is appended in line order. Lines that yield no
///   content are dropped, except bare `{` / `}` lines and lines containing
///   `"task":`, which are appended verbatim.
/// - Otherwise: the whole body is parsed once; if that fails or has no
///   `message.content`, the raw body is the reply.
///
/// An empty return value means the model produced nothing usable.
pub fn decode_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().filter(|line| !line.trim().is_empty()).collect();
    debug!(body_len = body.len(), line_count = lines.len(), "decode_body: called");

    let reply = if lines.len() > 1 {
        decode_chunks(&lines)
    } else {
        message_content(body).unwrap_or_else(|| {
            debug!("decode_body: single document without message.content, using raw body");
            body.to_string()
        })
    };

    reply.trim().to_string()
}

fn decode_chunks(lines: &[&str]) -> String {
    let mut reply = String::new();

    for (index, line) in lines.iter().enumerate() {
        match message_content(line) {
            Some(fragment) => reply.push_str(&fragment),
            None if is_boundary_line(line) => {
                debug!(index, "decode_chunks: recovered boundary line");
                reply.push_str(line);
            }
            None => {
                debug!(index, "decode_chunks: dropping line without content");
            }
        }
    }

    reply
}

fn message_content(text: &str) -> Option<String> {
    let chunk: ChatChunk = serde_json::from_str(text).ok()?;
    chunk.message?.content
}

fn is_boundary_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed == "{" || trimmed == "}" || line.contains(TASK_MARKER)
}
