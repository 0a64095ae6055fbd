//! Wires the announcement registry, the forwarding loop and a DHT
//! collaborator together behind the single [`CommandContext`] surface
//! the command protocol dispatches against (spec.md §5, §6.4).

use std::time::{Duration, Instant};

use dht_announce::{Lifetime as AnnounceLifetime, Registry};
use dht_cmd::{CommandContext, ImportError, ListError, LookupOutcome as CmdLookupOutcome, RequestedLifetime};
use dht_dht::{DhtHandle, LookupOutcome as DhtLookupOutcome, Topic};
use dht_forward::backend::natpmp::NatPmpBackend;
use dht_forward::backend::upnp::UpnpBackend;
use dht_forward::{ForwardingLoop, Lifetime as ForwardLifetime};
use dht_ids::{is_valid_hostname, parse_addr, sanitize_query, Addr, AddrParseError, Family, Id};
use edge_nal::Dns;
use futures_lite::future::block_on;

/// Everything the event loop owns, passed `&mut` into each tick and each
/// dispatched command — never shared behind a lock (spec.md §5).
pub struct NodeState<D, Dht> {
    query_tld: String,
    family: Family,
    daemon: bool,
    dht_port: u16,
    dns: D,
    registry: Registry,
    forwarding: ForwardingLoop<NatPmpBackend, UpnpBackend>,
    dht: Dht,
}

impl<D, Dht> NodeState<D, Dht>
where
    D: Dns,
    Dht: DhtHandle,
{
    pub fn new(query_tld: String, family: Family, daemon: bool, dht_port: u16, dns: D, dht: Dht) -> Self {
        Self {
            query_tld,
            family,
            daemon,
            dht_port,
            dns,
            registry: Registry::new(),
            forwarding: ForwardingLoop::new().with_dht_port(dht_port),
            dht,
        }
    }

    /// One tick: drive the forwarding state machine, then republish any
    /// announcement entries that are due (spec.md §2, §4.B, §4.C).
    pub fn tick(&mut self, now: Instant) {
        self.forwarding.tick(now);
        self.registry.tick(now, &mut self.dht);
    }
}

/// The node's own id-assignment policy: a sanitized query maps onto a
/// node identifier via SHA-1, the same digest the teacher workspace
/// reaches for elsewhere (`edge-http`'s WebSocket handshake uses
/// `sha1_smol` for the same reason — a fixed-size binary digest of a
/// string, no streaming needed).
fn query_to_id(query: &str) -> Id {
    let mut hasher = sha1_smol::Sha1::new();
    hasher.update(query.as_bytes());
    Id::from_bytes(hasher.digest().bytes())
}

impl<D, Dht> CommandContext for NodeState<D, Dht>
where
    D: Dns,
    Dht: DhtHandle,
{
    fn status(&self) -> String {
        self.dht.status()
    }

    fn lookup(&mut self, query: &str, out: &mut Vec<Addr>) -> CmdLookupOutcome {
        let Ok(query) = sanitize_query(query, &self.query_tld) else {
            return CmdLookupOutcome::Error;
        };

        if !is_valid_hostname(&query) {
            return CmdLookupOutcome::Error;
        }

        match self.dht.lookup(&query, out) {
            DhtLookupOutcome::Error => CmdLookupOutcome::Error,
            DhtLookupOutcome::InProgress => CmdLookupOutcome::InProgress,
            DhtLookupOutcome::Started => CmdLookupOutcome::Started,
            DhtLookupOutcome::Resolved => CmdLookupOutcome::Resolved,
        }
    }

    fn announce_all(&mut self) -> usize {
        self.registry.announce_all(&mut self.dht)
    }

    fn announce(&mut self, query: &str, port: u16, lifetime: RequestedLifetime) -> Result<(), ()> {
        let query = sanitize_query(query, &self.query_tld).map_err(|_| ())?;
        if !is_valid_hostname(&query) {
            return Err(());
        }

        let id = query_to_id(&query);
        let now = Instant::now();

        // A single-shot request is literally that: one fire-and-forget
        // publish, with nothing left behind for the periodic scheduler
        // to pick up (spec.md §4.E reply text: "Start single
        // announcement now." vs. "Start regular announcements...").
        if matches!(lifetime, RequestedLifetime::Once) {
            self.dht.announce_once(id, port);

            if port != 0 {
                self.forwarding.add(port, ForwardLifetime::Until(now));
            }

            return Ok(());
        }

        let (announce_lifetime, forward_lifetime, lifetime_secs) = match lifetime {
            RequestedLifetime::Once => unreachable!(),
            RequestedLifetime::Forever => {
                (AnnounceLifetime::Forever, ForwardLifetime::Forever, None)
            }
            RequestedLifetime::Minutes(minutes) => {
                let secs = minutes as u64 * 60;
                let until = now + Duration::from_secs(secs);
                (
                    AnnounceLifetime::Until(until),
                    ForwardLifetime::Until(until),
                    Some(secs),
                )
            }
        };

        self.dht.announce(id, port, lifetime_secs).map_err(|_| ())?;
        self.registry.add(id, port, announce_lifetime);

        if port != 0 {
            self.forwarding.add(port, forward_lifetime);
        }

        Ok(())
    }

    fn import(&mut self, addr_str: &str) -> Result<Addr, ImportError> {
        let default_port = self.dht_port.to_string();
        let addr = block_on(parse_addr(&self.dns, addr_str, &default_port, self.family)).map_err(
            |err| match err {
                AddrParseError::Syntax => ImportError::Parse,
                AddrParseError::Resolve | AddrParseError::Family => ImportError::Resolve,
            },
        )?;

        self.dht.ping(addr).map_err(|_| ImportError::Send)?;
        Ok(addr)
    }

    fn export(&mut self, out: &mut Vec<Addr>) {
        out.extend(self.dht.export_nodes(32));
    }

    fn blacklist(&mut self, addr_str: &str) -> Result<Addr, ()> {
        // Port is irrelevant for a blacklist entry (spec.md §4.E); "0"
        // is as good a placeholder default as any.
        let addr = block_on(parse_addr(&self.dns, addr_str, "0", self.family)).map_err(|_| ())?;
        self.dht.blacklist(addr);
        Ok(addr)
    }

    fn list(&mut self, topic: &str, out: &mut dyn std::io::Write) -> Result<(), ListError> {
        let topic = Topic::parse(topic).ok_or(ListError::UnknownTopic)?;

        if matches!(topic, Topic::Forwardings) {
            return self.forwarding.debug(out).map_err(|_| ListError::UnknownTopic);
        }

        self.dht.debug(topic, out).map_err(|_| ListError::UnknownTopic)
    }

    fn is_daemon(&self) -> bool {
        self.daemon
    }

    fn debug_usage(&self) -> String {
        "\tlist [blacklist|buckets|constants|forwardings|results|searches|storage|values]\n"
            .to_string()
    }
}
