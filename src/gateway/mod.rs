//! The gateway core: routing, transcoding and response framing.

pub mod emitter;
pub mod error;
pub mod router;
pub mod sink;
pub mod transcode;

pub use emitter::{DONE_FRAME, SseEmitter, StreamOutcome, sse_frame};
pub use error::GatewayError;
pub use router::{ConversationOp, ConversationResponse, Gateway, Route};
pub use sink::{MemorySink, ResponseHead, ResponseSink, SinkError};
pub use transcode::Transcoder;
