//! Stand-in NAT-PMP-style adapter.
//!
//! The real NAT-PMP wire exchange (UDP request/response against the
//! default gateway) is an external collaborator (spec.md §1, §4.D). This
//! stub simulates a two-round handshake (one `Retry`, then `Done`) so the
//! forwarding loop's multi-tick resume path is exercised without a real
//! router on hand, per SPEC_FULL.md §4.

use std::time::{Duration, Instant};

use super::{Backend, Outcome};

pub struct NatPmpBackend {
    handshake_done: bool,
}

impl Backend for NatPmpBackend {
    fn init() -> Self {
        log::info!("FWD: enable NAT-PMP");
        Self {
            handshake_done: false,
        }
    }

    fn uninit(self) {
        log::info!("FWD: disable NAT-PMP - not available");
    }

    fn handler(&mut self, port: u16, lifespan: Option<Duration>, _now: Instant) -> Outcome {
        if !self.handshake_done {
            self.handshake_done = true;
            return Outcome::Retry;
        }

        match lifespan {
            Some(_) => log::debug!("FWD: add NAT-PMP forwarding for port {port}"),
            None => log::debug!("FWD: remove NAT-PMP forwarding for port {port}"),
        }

        Outcome::Done
    }
}
