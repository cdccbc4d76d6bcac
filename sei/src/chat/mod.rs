//! Chat session: prompts in, routed replies and confirmed commits out

mod error;
mod events;
mod message;
mod session;

pub use error::ChatError;
pub use events::{EVENT_CHANNEL_CAPACITY, SessionEvent, SessionPhase};
pub use message::{ChatMessage, FALLBACK_REPLY, MessageContent, MessageId, route_reply};
pub use session::{ChatSession, SendOutcome, SessionSettings};
