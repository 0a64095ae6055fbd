//! Textual request/reply command protocol for a Kademlia DHT resolver
//! node: argv tokenizer, dispatcher, reply builder, and the console
//! transport that carries it. The loopback-UDP transport is driven
//! inline by the node's event loop instead of from a module here (see
//! `transport`'s module docs) because it has to be raced against the
//! tick timer and the console rather than looped on its own.

mod context;
mod dispatch;
mod reply;
mod tokenize;

pub mod transport;

pub use context::{CommandContext, ImportError, ListError, LookupOutcome, RequestedLifetime};
pub use dispatch::{dispatch, dispatch_bytes};
pub use reply::{Reply, REPLY_CAP};
pub use tokenize::{tokenize, MAX_ARGV};
