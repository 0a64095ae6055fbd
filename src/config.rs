//! Process configuration surface (spec.md §6). The teacher workspace has
//! no CLI layer of its own (its consumers are embedded firmware); `clap`
//! is the crate the sibling retrieval-pack repo `dandyvica-dnsquery`
//! reaches for to parse argv, so that is what this binary uses too.

use clap::{Parser, ValueEnum};

use dht_ids::Family;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FamilyArg {
    V4,
    V6,
    Any,
}

impl From<FamilyArg> for Family {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::V4 => Family::V4,
            FamilyArg::V6 => Family::V6,
            FamilyArg::Any => Family::Any,
        }
    }
}

/// No config-file parsing here — explicitly out of scope (spec.md §1).
#[derive(Debug, Parser)]
#[command(name = "dhtnode", version, about = "Kademlia-DHT name resolver node")]
pub struct Config {
    /// UDP port the DHT collaborator listens on.
    #[arg(long, default_value_t = 6881)]
    pub dht_port: u16,

    /// Address family filter applied to address resolution.
    #[arg(long, value_enum, default_value_t = FamilyArg::Any)]
    pub family: FamilyArg,

    /// TLD suffix stripped from query strings before they are hashed
    /// (e.g. `.p2p`).
    #[arg(long, default_value = ".p2p")]
    pub query_tld: String,

    /// Port for the loopback (`::1`) administrative UDP command socket.
    /// `0` disables the socket entirely (spec.md §4.E).
    #[arg(long, default_value_t = 0)]
    pub cmd_port: u16,

    /// Run without a console: disables the `list` command everywhere
    /// and the startup banner (spec.md §6, "Console").
    #[arg(long)]
    pub daemon: bool,

    /// Disable the console transport even when not daemonized.
    #[arg(long)]
    pub no_stdin: bool,
}
