//! Command transport over a notification link.

pub mod chunked;
pub mod command;
pub mod link;

pub use chunked::ChunkedTransfer;
pub use command::{CommandOutcome, CommandTransport};
pub use link::{connect_within, disconnect_within, Inbox, Link};
