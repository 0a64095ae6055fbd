//! The narrow operational surface the core calls into the DHT module
//! through (spec.md §6.4). The Kademlia routing table, bucket maintenance
//! and the on-wire message codec are external collaborators whose
//! internals are out of scope here (spec.md §1) — this crate only hosts
//! the trait boundary, plus an in-memory stand-in ([`NullDht`]) that lets
//! the rest of the workspace build and test without a real overlay.

use std::io::Write;

use dht_ids::{Addr, Id};

/// Outcome of a `lookup` call.
///
/// The original C source conflates two branches of its `rc`/`num` pair
/// (spec.md §9, "Open question — `lookup` return codes"): `rc > 0` with
/// `num == 0` is reachable both via the "positive success" branch and the
/// "otherwise" branch. This core resolves the ambiguity by making that
/// case an explicit variant, [`LookupOutcome::Started`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Error,
    InProgress,
    Started,
    Resolved,
}

/// Debug dump topics accepted by the `list` command (spec.md §4.E).
/// `Forwardings` is only meaningful when the forwarding module is
/// compiled in; `PKeys`/`SKeys` only when the auth extension is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Blacklist,
    Buckets,
    Constants,
    Forwardings,
    PKeys,
    SKeys,
    Results,
    Searches,
    Storage,
    Values,
}

impl Topic {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "blacklist" => Self::Blacklist,
            "buckets" => Self::Buckets,
            "constants" => Self::Constants,
            "forwardings" => Self::Forwardings,
            "pkeys" => Self::PKeys,
            "skeys" => Self::SKeys,
            "results" => Self::Results,
            "searches" => Self::Searches,
            "storage" => Self::Storage,
            "values" => Self::Values,
            _ => return None,
        })
    }
}

/// The DHT collaborator interface (spec.md §4.F).
pub trait DhtHandle {
    /// `ping(addr) -> 0|err`
    fn ping(&mut self, addr: Addr) -> Result<(), String>;

    /// `lookup(query, out[], &n) -> {neg=error, 0=in-progress, 1=started, >=1=resolved count}`,
    /// disambiguated per [`LookupOutcome`]. Resolved addresses are
    /// appended to `out`, capped by its capacity.
    fn lookup(&mut self, query: &str, out: &mut Vec<Addr>) -> LookupOutcome;

    /// `announce(query, port, lifetime) -> {-1 err, >=0 ok}`
    fn announce(&mut self, id: Id, port: u16, lifetime_secs: Option<u64>) -> Result<(), String>;

    /// `announce_once(id, port)` — fire-and-forget periodic republish.
    fn announce_once(&mut self, id: Id, port: u16);

    fn blacklist(&mut self, addr: Addr);

    /// Up to 32 known-good addresses (more would not fit a UDP reply).
    fn export_nodes(&mut self, max: usize) -> Vec<Addr>;

    /// Human-readable status line: node id, peer/bucket counts.
    fn status(&self) -> String;

    /// Debug dump of one topic to the given writer. `Err` means the
    /// topic is not implemented/compiled in.
    fn debug(&self, topic: Topic, out: &mut dyn Write) -> std::io::Result<()>;
}

/// In-memory [`DhtHandle`] stand-in: no real Kademlia routing table, no
/// wire I/O. Used by the workspace's own tests, and by `dhtnode` until a
/// real DHT implementation is plugged in (spec.md §1 explicitly keeps the
/// routing table and codec external to this core).
#[derive(Default)]
pub struct NullDht {
    pub blacklisted: Vec<Addr>,
    pub announced: Vec<(Id, u16)>,
    pub known_nodes: Vec<Addr>,
    pub local_id: Id,
}

impl NullDht {
    pub fn new(local_id: Id) -> Self {
        Self {
            local_id,
            ..Default::default()
        }
    }
}

impl DhtHandle for NullDht {
    fn ping(&mut self, _addr: Addr) -> Result<(), String> {
        Ok(())
    }

    fn lookup(&mut self, _query: &str, out: &mut Vec<Addr>) -> LookupOutcome {
        out.extend(self.known_nodes.iter().take(16).copied());
        if out.is_empty() {
            LookupOutcome::InProgress
        } else {
            LookupOutcome::Resolved
        }
    }

    fn announce(&mut self, id: Id, port: u16, _lifetime_secs: Option<u64>) -> Result<(), String> {
        self.announced.push((id, port));
        Ok(())
    }

    fn announce_once(&mut self, id: Id, port: u16) {
        self.announced.push((id, port));
    }

    fn blacklist(&mut self, addr: Addr) {
        self.blacklisted.push(addr);
    }

    fn export_nodes(&mut self, max: usize) -> Vec<Addr> {
        self.known_nodes.iter().take(max).copied().collect()
    }

    fn status(&self) -> String {
        format!(
            "id: {}\nnodes: {}\n",
            self.local_id,
            self.known_nodes.len()
        )
    }

    fn debug(&self, topic: Topic, out: &mut dyn Write) -> std::io::Result<()> {
        match topic {
            Topic::Blacklist => {
                for addr in &self.blacklisted {
                    writeln!(out, "{addr}")?;
                }
                Ok(())
            }
            Topic::Values => {
                for (id, port) in &self.announced {
                    writeln!(out, "{id} {port}")?;
                }
                Ok(())
            }
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "topic not implemented by NullDht",
            )),
        }
    }
}

/// Extension surface for the signed/verified-query authentication module
/// (feature `auth`; spec.md §1, §4.F — body is external to this core).
pub trait AuthHandle {
    fn debug_pkeys(&self, out: &mut dyn Write) -> std::io::Result<()>;
    fn debug_skeys(&self, out: &mut dyn Write) -> std::io::Result<()>;
}
