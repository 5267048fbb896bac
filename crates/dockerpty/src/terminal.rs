//! Terminal mode guard.
//!
//! [`RawSession`] owns the local terminal for the duration of a session: it
//! switches the device into raw mode on entry and restores the original mode
//! exactly once, either explicitly or on drop (including unwinding).

use std::io::IsTerminal;
use std::sync::Arc;

use crossterm::terminal;
use tracing::{debug, warn};

use dockerpty_core::{Dimension, PtyError, PtyResult, TerminalDevice};

/// The process's controlling terminal, reached through stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdTerminal;

impl TerminalDevice for StdTerminal {
    fn is_terminal(&self) -> bool {
        std::io::stdout().is_terminal()
    }

    fn enter_raw(&self) -> PtyResult<()> {
        terminal::enable_raw_mode()
            .map_err(|e| PtyError::ModeSwitch(format!("failed to enable raw terminal mode: {e}")))
    }

    fn restore(&self) -> PtyResult<()> {
        terminal::disable_raw_mode()
            .map_err(|e| PtyError::ModeSwitch(format!("failed to disable raw terminal mode: {e}")))
    }

    fn size(&self) -> PtyResult<Dimension> {
        let (cols, rows) = terminal::size()?;
        Ok(Dimension::new(rows, cols))
    }
}

/// RAII guard holding a terminal in raw mode.
pub struct RawSession {
    device: Arc<dyn TerminalDevice>,
    restored: bool,
}

impl RawSession {
    /// Put `device` into raw mode.
    ///
    /// Fails with [`PtyError::NotATerminal`] when the device is not a real
    /// terminal and [`PtyError::ModeSwitch`] when the mode change fails.
    pub fn enter(device: Arc<dyn TerminalDevice>) -> PtyResult<Self> {
        if !device.is_terminal() {
            return Err(PtyError::NotATerminal);
        }
        device.enter_raw().map_err(|e| match e {
            PtyError::ModeSwitch(_) => e,
            other => PtyError::ModeSwitch(other.to_string()),
        })?;
        debug!("terminal switched to raw mode");
        Ok(Self {
            device,
            restored: false,
        })
    }

    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Return the terminal to its original mode. Later calls are no-ops.
    ///
    /// A failed restore is logged, not returned.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        match self.device.restore() {
            Ok(()) => debug!("terminal mode restored"),
            Err(e) => warn!("failed to restore terminal mode: {e}"),
        }
    }
}

impl Drop for RawSession {
    fn drop(&mut self) {
        self.restore();
    }
}
