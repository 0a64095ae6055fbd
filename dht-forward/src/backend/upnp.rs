//! Stand-in UPnP-style adapter.
//!
//! The real UPnP exchange (SSDP discovery, then a SOAP `AddPortMapping`
//! session) is an external collaborator (spec.md §1, §4.D). This stub
//! completes in one tick, unlike [`super::natpmp::NatPmpBackend`], so the
//! forwarding loop's two back-ends exercise different timing shapes in
//! tests.

use std::time::{Duration, Instant};

use super::{Backend, Outcome};

pub struct UpnpBackend;

impl Backend for UpnpBackend {
    fn init() -> Self {
        log::info!("FWD: enable UPnP");
        Self
    }

    fn uninit(self) {
        log::info!("FWD: disable UPnP - not available");
    }

    fn handler(&mut self, port: u16, lifespan: Option<Duration>, _now: Instant) -> Outcome {
        match lifespan {
            Some(_) => log::debug!("FWD: add UPnP forwarding for port {port}"),
            None => log::debug!("FWD: remove UPnP forwarding for port {port}"),
        }

        Outcome::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_immediately() {
        let mut backend = UpnpBackend::init();
        let now = Instant::now();
        assert_eq!(backend.handler(5000, Some(Duration::from_secs(1)), now), Outcome::Done);
    }
}
