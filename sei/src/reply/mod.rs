//! Model reply decoding
//!
//! Three leaf steps, applied in order by the chat session:
//!
//! - [`decode_body`] turns a raw response body into one reply string
//! - [`extract_json_object`] finds the embedded JSON object in that reply
//! - [`decode_breakdown`] decodes the object into a [`TaskBreakdown`]

mod breakdown;
mod extract;
mod stream;

pub use breakdown::{DecodeError, SubtaskSuggestion, TaskBreakdown, decode_breakdown};
pub use extract::extract_json_object;
pub use stream::decode_body;
