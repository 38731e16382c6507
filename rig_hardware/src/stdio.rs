//! Line console over stdin/stdout.

use std::io::{BufRead, Write};

use crossbeam_channel as xch;

/// `Console` backed by the process stdin/stdout.
///
/// A reader thread owns stdin and pushes complete lines through a bounded
/// channel, so `poll_line` is a lock-free `try_recv`. The thread exits on
/// EOF or when the console is dropped; it is not joined because a blocking
/// stdin read cannot be interrupted portably.
pub struct StdioConsole {
    rx: xch::Receiver<String>,
}

impl StdioConsole {
    pub fn new() -> Self {
        let (tx, rx) = xch::bounded(64);
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    tracing::debug!("stdio consumer disconnected, exiting reader thread");
                    break;
                }
            }
            tracing::trace!("stdin reader thread exiting");
        });
        Self { rx }
    }
}

impl Default for StdioConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl rig_traits::Console for StdioConsole {
    fn poll_line(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    fn write_line(
        &mut self,
        line: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}
