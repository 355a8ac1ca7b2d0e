//! Interactive chat with the AI manager
//!
//! Line editing and history come from rustyline; answers stream to stdout
//! when the assistant is configured to stream.

mod session;

pub use session::{ChatSession, ask, print_reply, stream_to_stdout};
