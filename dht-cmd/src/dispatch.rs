use crate::context::{CommandContext, ImportError, ListError, LookupOutcome, RequestedLifetime};
use crate::reply::Reply;
use crate::tokenize::tokenize;

const USAGE: &str = "Usage:\n\tstatus\n\tlookup <query>\n\tannounce [<query>[:<port>] [<minutes>]]\n\timport <addr>\n\texport\n\tblacklist <addr>\n";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Lookup(String),
    AnnounceAll,
    Announce { hostport: String, minutes: i64 },
    Import(String),
    Export,
    Blacklist(String),
    List(String),
    Usage,
}

fn parse(argv: &[String]) -> Command {
    match argv {
        [cmd] if cmd == "status" => Command::Status,
        [cmd] if cmd == "announce" => Command::AnnounceAll,
        [cmd] if cmd == "export" => Command::Export,
        [cmd, arg] if cmd == "lookup" => Command::Lookup(arg.clone()),
        [cmd, arg] if cmd == "import" => Command::Import(arg.clone()),
        [cmd, arg] if cmd == "blacklist" => Command::Blacklist(arg.clone()),
        [cmd, arg] if cmd == "list" => Command::List(arg.clone()),
        [cmd, arg] if cmd == "announce" => Command::Announce {
            hostport: arg.clone(),
            minutes: 0,
        },
        [cmd, arg, minutes] if cmd == "announce" => match minutes.parse::<i64>() {
            Ok(minutes) => Command::Announce {
                hostport: arg.clone(),
                minutes,
            },
            Err(_) => Command::Usage,
        },
        _ => Command::Usage,
    }
}

/// `"%255[^:]:%d%s"` semantics (spec.md §4.E): host is up to 255
/// non-colon bytes, an optional port follows a single colon, any
/// trailing garbage after the port digits is a parse error. Port `0` is
/// legal and means "no port published".
fn parse_host_port(s: &str) -> Result<(String, u16), ()> {
    match s.find(':') {
        Some(idx) => {
            let host = &s[..idx];
            if host.is_empty() || host.len() > 255 {
                return Err(());
            }
            let port: u16 = s[idx + 1..].parse().map_err(|_| ())?;
            Ok((host.to_string(), port))
        }
        None => {
            if s.is_empty() || s.len() > 255 {
                return Err(());
            }
            Ok((s.to_string(), 0))
        }
    }
}

/// Parse and run one command line, writing into a fresh [`Reply`].
/// Returns the reply together with the overall success flag; the caller
/// (a transport) decides how to turn that into wire bytes or
/// stdout/stderr text.
pub fn dispatch<C: CommandContext>(ctx: &mut C, argv: &[String], allow_debug: bool) -> (Reply, bool) {
    let mut reply = Reply::new(allow_debug);
    let command = parse(argv);

    let success = match command {
        Command::Usage => {
            reply.push_str(USAGE);
            if allow_debug {
                reply.push_str(&ctx.debug_usage());
            }
            false
        }
        Command::List(_) if !allow_debug => {
            // The `list` command is refused on non-debug transports
            // (spec.md §4.E); per the original, that refusal is
            // indistinguishable from an unrecognized command.
            reply.push_str(USAGE);
            false
        }
        Command::Status => {
            reply.push_str(&ctx.status());
            true
        }
        Command::Lookup(query) => handle_lookup(ctx, &query, &mut reply),
        Command::AnnounceAll => {
            let count = ctx.announce_all();
            reply.push_fmt(format_args!("{count} announcements started.\n"));
            true
        }
        Command::Announce { hostport, minutes } => handle_announce(ctx, &hostport, minutes, &mut reply),
        Command::Import(addr) => handle_import(ctx, &addr, &mut reply),
        Command::Export => handle_export(ctx, &mut reply),
        Command::Blacklist(addr) => handle_blacklist(ctx, &addr, &mut reply),
        Command::List(topic) => handle_list(ctx, &topic, &mut reply),
    };

    (reply, success)
}

/// Tokenize a request buffer and dispatch it in one step.
pub fn dispatch_bytes<C: CommandContext>(ctx: &mut C, request: &[u8], allow_debug: bool) -> (Reply, bool) {
    let argv = tokenize(request);
    dispatch(ctx, &argv, allow_debug)
}

fn handle_lookup<C: CommandContext>(ctx: &mut C, query: &str, reply: &mut Reply) -> bool {
    let mut addrs = Vec::new();
    match ctx.lookup(query, &mut addrs) {
        LookupOutcome::Error => {
            reply.push_str("Some error occured.\n");
            false
        }
        LookupOutcome::InProgress => {
            reply.push_str("Search in progress.\n");
            false
        }
        LookupOutcome::Started => {
            reply.push_str("Search started.\n");
            false
        }
        LookupOutcome::Resolved => {
            for addr in addrs.iter().take(16) {
                // A line that does not fit whole is omitted rather than
                // split (spec.md §8); any later line is skipped too once
                // one fails, since lines only grow less likely to fit.
                if !reply.push_line(&format!("{addr}\n")) {
                    break;
                }
            }
            true
        }
    }
}

fn handle_announce<C: CommandContext>(ctx: &mut C, hostport: &str, minutes: i64, reply: &mut Reply) -> bool {
    let (host, port) = match parse_host_port(hostport) {
        Ok(v) => v,
        Err(()) => {
            reply.push_str("Invalid port or query too long.\n");
            return false;
        }
    };

    let lifetime = RequestedLifetime::from_minutes(minutes);

    match ctx.announce(&host, port, lifetime) {
        Ok(()) => {
            match lifetime {
                RequestedLifetime::Once => reply.push_str("Start single announcement now.\n"),
                RequestedLifetime::Forever => reply.push_fmt(format_args!(
                    "Start regular announcements for the entire run time (port {port}).\n"
                )),
                RequestedLifetime::Minutes(minutes) => reply.push_fmt(format_args!(
                    "Start regular announcements for {minutes} minutes (port {port}).\n"
                )),
            }
            true
        }
        Err(()) => {
            reply.push_str("Invalid port or query too long.\n");
            false
        }
    }
}

fn handle_import<C: CommandContext>(ctx: &mut C, addr_str: &str, reply: &mut Reply) -> bool {
    match ctx.import(addr_str) {
        Ok(addr) => {
            reply.push_fmt(format_args!("Send ping to: {addr}\n"));
            true
        }
        Err(ImportError::Parse) => {
            reply.push_str("Failed to parse address.\n");
            false
        }
        Err(ImportError::Resolve) => {
            reply.push_str("Failed to resolve address.\n");
            false
        }
        Err(ImportError::Send) => {
            reply.push_str("Failed to send ping.\n");
            false
        }
    }
}

fn handle_export<C: CommandContext>(ctx: &mut C, reply: &mut Reply) -> bool {
    let mut addrs = Vec::new();
    ctx.export(&mut addrs);

    if addrs.is_empty() {
        reply.push_str("No good nodes found.\n");
        false
    } else {
        for addr in addrs.iter().take(32) {
            if !reply.push_line(&format!("{addr}\n")) {
                break;
            }
        }
        true
    }
}

fn handle_blacklist<C: CommandContext>(ctx: &mut C, addr_str: &str, reply: &mut Reply) -> bool {
    match ctx.blacklist(addr_str) {
        Ok(addr) => {
            reply.push_fmt(format_args!("Added to blacklist: {addr}\n"));
            true
        }
        Err(()) => {
            reply.push_str("Invalid address.\n");
            false
        }
    }
}

fn handle_list<C: CommandContext>(ctx: &mut C, topic: &str, reply: &mut Reply) -> bool {
    if ctx.is_daemon() {
        reply.push_str("The 'list' command is not available while running as a daemon.\n");
        return false;
    }

    // The dump always goes to the process console, regardless of which
    // transport carried the request (spec.md §4.E).
    let ok = ctx.list(topic, &mut std::io::stdout()).is_ok();

    // The original prints this line even for an unknown topic, after
    // already having written an "Unknown argument" line to the console
    // (ext-cmd.c's `cmd_exec`); preserved here for fidelity.
    reply.push_str("Output sent to console.\n");

    let _ = ListError::UnknownTopic; // silence unused-variant warnings pre-match-exhaustiveness
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandContext;
    use dht_ids::Addr;
    use std::cell::Cell;

    #[derive(Default)]
    struct FakeCtx {
        daemon: bool,
        lookup_outcome: Option<LookupOutcome>,
        announced: Vec<(String, u16, RequestedLifetime)>,
        exported: Vec<Addr>,
        announce_all_calls: Cell<u32>,
    }

    impl CommandContext for FakeCtx {
        fn status(&self) -> String {
            "id: 0000000000000000000000000000000000000000\nnodes: 0\n".to_string()
        }

        fn lookup(&mut self, _query: &str, out: &mut Vec<Addr>) -> LookupOutcome {
            if let Some(LookupOutcome::Resolved) = self.lookup_outcome {
                out.push(Addr::V4(core::net::SocketAddrV4::new(
                    core::net::Ipv4Addr::new(1, 2, 3, 4),
                    7000,
                )));
            }
            self.lookup_outcome.unwrap_or(LookupOutcome::Error)
        }

        fn announce_all(&mut self) -> usize {
            self.announce_all_calls.set(self.announce_all_calls.get() + 1);
            3
        }

        fn announce(&mut self, query: &str, port: u16, lifetime: RequestedLifetime) -> Result<(), ()> {
            if query == "bad" {
                return Err(());
            }
            self.announced.push((query.to_string(), port, lifetime));
            Ok(())
        }

        fn import(&mut self, addr_str: &str) -> Result<Addr, ImportError> {
            if addr_str == "bad" {
                Err(ImportError::Parse)
            } else {
                Ok(Addr::V4(core::net::SocketAddrV4::new(
                    core::net::Ipv4Addr::new(10, 0, 0, 1),
                    6881,
                )))
            }
        }

        fn export(&mut self, out: &mut Vec<Addr>) {
            out.extend(self.exported.iter().copied());
        }

        fn blacklist(&mut self, addr_str: &str) -> Result<Addr, ()> {
            if addr_str == "bad" {
                Err(())
            } else {
                Ok(Addr::V4(core::net::SocketAddrV4::new(
                    core::net::Ipv4Addr::new(10, 0, 0, 1),
                    0,
                )))
            }
        }

        fn list(&mut self, topic: &str, _out: &mut dyn std::io::Write) -> Result<(), ListError> {
            if topic == "blacklist" {
                Ok(())
            } else {
                Err(ListError::UnknownTopic)
            }
        }

        fn is_daemon(&self) -> bool {
            self.daemon
        }

        fn debug_usage(&self) -> String {
            "\tlist [blacklist]\n".to_string()
        }
    }

    #[test]
    fn status_always_succeeds() {
        let mut ctx = FakeCtx::default();
        let (reply, success) = dispatch(&mut ctx, &["status".to_string()], false);
        assert!(success);
        assert!(reply.body().contains("id:"));
    }

    #[test]
    fn empty_argv_is_usage_failure() {
        let mut ctx = FakeCtx::default();
        let (reply, success) = dispatch(&mut ctx, &[], false);
        assert!(!success);
        assert!(reply.body().starts_with("Usage:"));
    }

    #[test]
    fn list_without_debug_falls_back_to_usage() {
        let mut ctx = FakeCtx::default();
        let argv = vec!["list".to_string(), "skeys".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(!success);
        assert!(reply.body().starts_with("Usage:"));
    }

    #[test]
    fn list_while_daemon_is_refused() {
        let mut ctx = FakeCtx {
            daemon: true,
            ..Default::default()
        };
        let argv = vec!["list".to_string(), "blacklist".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, true);
        assert!(!success);
        assert!(reply.body().contains("daemon"));
    }

    #[test]
    fn list_unknown_topic_still_says_sent_to_console() {
        let mut ctx = FakeCtx::default();
        let argv = vec!["list".to_string(), "nonsense".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, true);
        assert!(!success);
        assert_eq!(reply.body(), "Output sent to console.\n");
    }

    #[test]
    fn lookup_progression() {
        let mut ctx = FakeCtx {
            lookup_outcome: Some(LookupOutcome::Started),
            ..Default::default()
        };
        let argv = vec!["lookup".to_string(), "bar.p2p".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(!success);
        assert_eq!(reply.body(), "Search started.\n");

        ctx.lookup_outcome = Some(LookupOutcome::InProgress);
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(!success);
        assert_eq!(reply.body(), "Search in progress.\n");

        ctx.lookup_outcome = Some(LookupOutcome::Resolved);
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(success);
        assert!(reply.body().contains("1.2.3.4:7000"));
    }

    #[test]
    fn announce_single_shot() {
        let mut ctx = FakeCtx::default();
        let argv = vec!["announce".to_string(), "foo.p2p:0".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(success);
        assert_eq!(reply.body(), "Start single announcement now.\n");
    }

    #[test]
    fn announce_forever() {
        let mut ctx = FakeCtx::default();
        let argv = vec![
            "announce".to_string(),
            "foo.p2p:5000".to_string(),
            "-1".to_string(),
        ];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(success);
        assert!(reply
            .body()
            .contains("Start regular announcements for the entire run time (port 5000)."));
    }

    #[test]
    fn announce_rounds_minutes_up_to_multiple_of_30() {
        let mut ctx = FakeCtx::default();
        let argv = vec![
            "announce".to_string(),
            "foo.p2p:5000".to_string(),
            "45".to_string(),
        ];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(success);
        assert_eq!(
            reply.body(),
            "Start regular announcements for 60 minutes (port 5000).\n"
        );
    }

    #[test]
    fn announce_31_minutes_rounds_to_60() {
        assert_eq!(RequestedLifetime::from_minutes(31), RequestedLifetime::Minutes(60));
    }

    #[test]
    fn blacklist_roundtrip() {
        let mut ctx = FakeCtx::default();
        let argv = vec!["blacklist".to_string(), "10.0.0.1".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(success);
        assert_eq!(reply.body(), "Added to blacklist: 10.0.0.1:0\n");
    }

    #[test]
    fn export_empty_fails() {
        let mut ctx = FakeCtx::default();
        let argv = vec!["export".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(!success);
        assert_eq!(reply.body(), "No good nodes found.\n");
    }

    #[test]
    fn export_overflow_truncates_at_last_full_line_not_mid_line() {
        // Full-width IPv6 lines are ~48 bytes each; 32 of them (the
        // `export` cap) overflow the 1472-byte reply, so this exercises
        // the real truncation boundary rather than just the helper.
        let mut ctx = FakeCtx::default();
        for _ in 0..32 {
            ctx.exported.push(Addr::V6(core::net::SocketAddrV6::new(
                core::net::Ipv6Addr::new(
                    0x1234, 0x5678, 0x9abc, 0xdef0, 0x1234, 0x5678, 0x9abc, 0xdef0,
                ),
                65535,
                0,
                0,
            )));
        }
        let argv = vec!["export".to_string()];
        let (reply, success) = dispatch(&mut ctx, &argv, false);
        assert!(success);
        let body = reply.body();
        assert!(body.ends_with('\n'));
        assert!(!body.is_empty());
        // Every emitted line must be a whole, well-formed address line;
        // none may be cut mid-field.
        for line in body.lines() {
            assert!(line.starts_with('[') && line.contains("]:65535"));
        }
    }

    #[test]
    fn host_port_rejects_trailing_garbage() {
        assert_eq!(parse_host_port("foo:5000x"), Err(()));
        assert_eq!(parse_host_port("foo:5000"), Ok(("foo".to_string(), 5000)));
        assert_eq!(parse_host_port("foo"), Ok(("foo".to_string(), 0)));
    }
}
