//! Interactive command loop (`intake shell`).

use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::commands::Command;
use crate::watcher::Watcher;

const PROMPT: &str = "intake> ";

/// Reads commands line by line until `exit`, end of input, or `shutdown`.
///
/// Handlers run on a blocking thread since `scan` walks the filesystem. The
/// watcher is left running; stopping it is the caller's job.
pub async fn run_shell<R, W>(
    watcher: Arc<Watcher>,
    input: R,
    out: &mut W,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    writeln!(out, "Type 'help' for commands.")?;
    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => None,
        };
        let Some(line) = line else {
            writeln!(out)?;
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };
        if command == Command::Exit {
            break;
        }

        let integrator = watcher.integrator().clone();
        match tokio::task::spawn_blocking(move || command.execute(&integrator)).await? {
            Ok(Some(output)) => write!(out, "{}", output)?,
            Ok(None) => {}
            Err(e) => writeln!(out, "error: {:#}", e)?,
        }
    }
    Ok(())
}
