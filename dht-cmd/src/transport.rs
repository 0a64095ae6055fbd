pub mod console;

/// Requests over 1499 bytes are never produced by a well-behaved client
/// (spec.md §6, "Transport rules"); anything longer is simply not read.
pub const MAX_REQUEST: usize = 1499;

// There is deliberately no standalone `transport::udp::run` loop here.
// The command socket has to be raced against the tick timer and the
// console in a single `select`-style multiplexer (spec.md §2, §5), so
// the bind/receive/dispatch/send sequence lives inline in the node
// binary's event loop (`src/main.rs`) where it can sit next to those
// other readiness sources as one arm of a `.or()` chain, instead of
// being a `loop { .. }` of its own that would block the other two.
