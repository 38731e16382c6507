//! Test and helper mocks for rig_core.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A PWM output that accepts every command and remembers the last duty.
#[derive(Debug, Default)]
pub struct NoopPwm {
    pub last_duty: u8,
    pub disabled: bool,
}

impl rig_traits::PwmOutput for NoopPwm {
    fn set_duty_pct(
        &mut self,
        pct: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.last_duty = pct;
        self.disabled = false;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.last_duty = 0;
        self.disabled = true;
        Ok(())
    }
}

/// A console fed from a fixed script, recording everything written.
///
/// The output log is behind a shared handle so tests can keep reading it
/// after the console has been moved into the component under test.
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<String>,
    output: Arc<Mutex<Vec<String>>>,
}

impl ScriptedConsole {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: lines.into_iter().map(Into::into).collect(),
            output: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle onto the written-line log.
    pub fn output_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.output.clone()
    }

    /// Snapshot of everything written so far.
    pub fn output(&self) -> Vec<String> {
        self.output.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl rig_traits::Console for ScriptedConsole {
    fn poll_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    fn write_line(
        &mut self,
        line: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut out) = self.output.lock() {
            out.push(line.to_string());
        }
        Ok(())
    }
}
