//! The set of local `(id, port)` bindings that must periodically
//! re-publish themselves into the DHT (spec.md §4.B).

use std::io::Write;
use std::time::Instant;

use dht_dht::DhtHandle;
use dht_ids::Id;
use log::debug;

/// `lifetime == 0 / ∞ / T` from spec.md §3, made explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// Publish exactly once, then drop.
    Once,
    /// Publish every cycle for the lifetime of the process.
    Forever,
    /// Publish while `now <= until`; dropped once exceeded.
    Until(Instant),
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub id: Id,
    pub port: u16,
    pub lifetime: Lifetime,
}

/// The registry owns its entries exclusively; every other component only
/// references them transiently during a single tick (spec.md §3).
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append; no deduplication (spec.md §4.B).
    pub fn add(&mut self, id: Id, port: u16, lifetime: Lifetime) {
        self.entries.push(Entry { id, port, lifetime });
    }

    /// Ordered sequence of current entries, in stable insertion order.
    pub fn get(&self) -> &[Entry] {
        &self.entries
    }

    /// One pass: publish entries whose lifetime has not elapsed, drop
    /// single-shot entries after publishing, and drop expired entries
    /// without publishing. The scheduler is external — the registry does
    /// not decide how often `tick` runs (spec.md §4.B).
    pub fn tick(&mut self, now: Instant, dht: &mut impl DhtHandle) {
        self.entries.retain(|entry| match entry.lifetime {
            Lifetime::Once => {
                dht.announce_once(entry.id, entry.port);
                false
            }
            Lifetime::Forever => {
                dht.announce_once(entry.id, entry.port);
                true
            }
            Lifetime::Until(until) => {
                if until >= now {
                    dht.announce_once(entry.id, entry.port);
                    true
                } else {
                    debug!("announce: entry for {} expired, dropping", entry.id);
                    false
                }
            }
        });
    }

    /// Re-publish every current entry once, without touching its
    /// lifetime or dropping it (spec.md §4.E, bare `announce` command).
    /// Returns the number of entries republished.
    pub fn announce_all(&self, dht: &mut impl DhtHandle) -> usize {
        for entry in &self.entries {
            dht.announce_once(entry.id, entry.port);
        }
        self.entries.len()
    }

    pub fn debug(&self, out: &mut dyn Write) -> std::io::Result<()> {
        for entry in &self.entries {
            let lifetime = match entry.lifetime {
                Lifetime::Once => "once".to_string(),
                Lifetime::Forever => "forever".to_string(),
                Lifetime::Until(until) => {
                    let now = Instant::now();
                    let remaining = until.saturating_duration_since(now).as_secs() / 60;
                    format!("{remaining} min. remaining")
                }
            };
            writeln!(out, "id: {}, port: {}, lifetime: {}", entry.id, entry.port, lifetime)?;
        }
        Ok(())
    }
}
