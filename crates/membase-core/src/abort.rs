//! Fatal abort: the one exit path for broken heap invariants.
//!
//! Nothing here allocates once a hook is registered, so aborting from inside
//! a failing allocator is safe.

use std::fmt;
use std::io::{self, Write};

use parking_lot::Mutex;

/// Prefix of every abort message.
pub const ABORT_PREFIX: &str = "membase: fatal: ";

// Hooks run most-recent first, like atexit handlers.
static ABORT_HOOKS: Mutex<Vec<fn(&str)>> = Mutex::new(Vec::new());

/// Registers `hook` to run with the abort message before the process ends.
pub fn register_abort_hook(hook: fn(&str)) {
    ABORT_HOOKS.lock().push(hook);
}

/// Writes `membase: fatal: <message>\n` to `out` in three writes, without
/// formatting.
pub fn write_abort_message<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
    out.write_all(ABORT_PREFIX.as_bytes())?;
    out.write_all(message.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Runs abort hooks, reports `message` on stderr and terminates the process.
///
/// A hook that aborts again re-enters here; the hook list is only tried, not
/// waited on, so that cannot deadlock.
pub fn fatal_abort(message: &str) -> ! {
    if let Some(mut hooks) = ABORT_HOOKS.try_lock() {
        let taken = std::mem::take(&mut *hooks);
        drop(hooks);
        for hook in taken.into_iter().rev() {
            hook(message);
        }
    }
    let stderr = io::stderr();
    let mut lock = stderr.lock();
    let _ = write_abort_message(&mut lock, message);
    std::process::abort()
}

/// Like [`fatal_abort`] for a value that still needs formatting. The text is
/// rendered into a fixed stack buffer (truncated if longer).
pub fn fatal_abort_with(reason: &dyn fmt::Display) -> ! {
    let mut buf = [0u8; 192];
    let len = render_into(&mut buf, reason);
    let message = std::str::from_utf8(&buf[..len]).unwrap_or("unprintable abort reason");
    fatal_abort(message)
}

fn render_into(buf: &mut [u8], reason: &dyn fmt::Display) -> usize {
    let mut cursor = io::Cursor::new(buf);
    // A full buffer just truncates the message.
    let _ = write!(cursor, "{reason}");
    cursor.position() as usize
}
