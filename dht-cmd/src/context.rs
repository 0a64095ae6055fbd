use dht_ids::Addr;

/// A requested announcement lifetime, as it comes off the wire, before
/// the implementer turns it into an absolute instant (spec.md §4.E,
/// `announce` row):
///
/// - `minutes < 0` -> [`Forever`](Self::Forever)
/// - `minutes == 0` or absent -> [`Once`](Self::Once)
/// - otherwise -> [`Minutes`](Self::Minutes), already rounded up to the
///   next multiple of 30.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedLifetime {
    Once,
    Forever,
    Minutes(u32),
}

impl RequestedLifetime {
    /// `minutes` is the raw, unrounded value from the wire (may be
    /// negative or zero).
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes < 0 {
            Self::Forever
        } else if minutes == 0 {
            Self::Once
        } else {
            // Mirrors the original's `30 * (minutes / 30 + 1)`: always
            // strictly rounds up, even for an already-exact multiple of 30.
            let rounded = 30 * (minutes as u32 / 30 + 1);
            Self::Minutes(rounded)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Error,
    InProgress,
    Started,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportError {
    Parse,
    Resolve,
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListError {
    UnknownTopic,
}

/// The narrow operational surface the command dispatcher calls into
/// (spec.md §6.4). Implemented once, by the node binary, by wiring
/// together the announcement registry, the forwarding loop and the DHT
/// collaborator; the dispatcher itself never sees those types directly.
pub trait CommandContext {
    fn status(&self) -> String;

    /// Sanitized, validated query in, resolved addresses out (capped by
    /// the implementer to 16, spec.md §4.E).
    fn lookup(&mut self, query: &str, out: &mut Vec<Addr>) -> LookupOutcome;

    /// Re-announce every registry entry once; returns the count.
    fn announce_all(&mut self) -> usize;

    /// Register an announcement for `query` (already sanitized) at
    /// `port` (`0` = none published) with the given lifetime. Also wires
    /// up port forwarding when `port != 0`, per spec.md's `announce` row.
    fn announce(&mut self, query: &str, port: u16, lifetime: RequestedLifetime) -> Result<(), ()>;

    /// Parse `addr_str` (DHT port as default), then ping the peer.
    fn import(&mut self, addr_str: &str) -> Result<Addr, ImportError>;

    /// Up to 32 known-good addresses (spec.md §4.E).
    fn export(&mut self, out: &mut Vec<Addr>);

    fn blacklist(&mut self, addr_str: &str) -> Result<Addr, ()>;

    fn list(&mut self, topic: &str, out: &mut dyn std::io::Write) -> Result<(), ListError>;

    fn is_daemon(&self) -> bool;

    /// The `	list [...]` usage line, tailored to whichever optional
    /// modules (forwarding, auth) are compiled in (spec.md §9,
    /// "Conditional feature compilation").
    fn debug_usage(&self) -> String;
}
