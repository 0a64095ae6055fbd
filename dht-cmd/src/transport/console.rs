use std::io::{BufRead, Write};

use blocking::unblock;

use crate::context::CommandContext;
use crate::dispatch::dispatch;
use crate::tokenize::tokenize;

/// A console request line longer than this is truncated before parsing
/// (spec.md §6, "Transport rules": "reads a single line up to 511
/// bytes").
pub const MAX_LINE: usize = 511;

/// Block on a single line of stdin on a blocking thread, so the event
/// loop keeps racing the other readiness sources while waiting. Returns
/// `Ok(None)` at EOF.
pub async fn read_line() -> std::io::Result<Option<String>> {
    unblock(|| {
        let stdin = std::io::stdin();
        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }

        while line.ends_with(['\n', '\r']) {
            line.pop();
        }
        line.truncate(MAX_LINE);

        Ok(Some(line))
    })
    .await
}

/// Run one console request line to completion: tokenize, dispatch with
/// `allow_debug = true`, and write the reply body to stdout (success) or
/// stderr (failure). The leading status byte is consumed here and never
/// shown (spec.md §6, "Reply form").
pub fn handle_line<C: CommandContext>(ctx: &mut C, line: &str) -> std::io::Result<()> {
    let argv = tokenize(line.as_bytes());
    let (reply, success) = dispatch(ctx, &argv, true);

    if success {
        let mut out = std::io::stdout();
        out.write_all(reply.body().as_bytes())?;
        out.flush()
    } else {
        let mut err = std::io::stderr();
        err.write_all(reply.body().as_bytes())?;
        err.flush()
    }
}

/// `"Press Enter for help.\n"`, printed once at startup after the grace
/// period that lets earlier log output flush (spec.md §6, "Console").
pub fn print_banner() {
    println!("Press Enter for help.");
}
