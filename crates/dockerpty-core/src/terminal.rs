//! Local terminal collaborator.

use std::fmt;

use crate::error::PtyResult;

/// Terminal size in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension {
    pub rows: u16,
    pub cols: u16,
}

impl Dimension {
    /// The value reported when the size could not be read.
    pub const ZERO: Dimension = Dimension { rows: 0, cols: 0 };

    pub const fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }

    pub fn is_zero(&self) -> bool {
        self.rows == 0 && self.cols == 0
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// The local controlling terminal.
///
/// Raw mode is process-wide state: `enter_raw` captures the current mode and
/// switches to raw, `restore` puts the captured mode back. Callers are
/// expected to pair them exactly once (see `dockerpty::terminal::RawSession`).
pub trait TerminalDevice: Send + Sync {
    /// Whether the device is backed by a real terminal.
    fn is_terminal(&self) -> bool;

    /// Switch to character-at-a-time, no-echo mode, remembering the
    /// previous mode for [`restore`](Self::restore).
    fn enter_raw(&self) -> PtyResult<()>;

    /// Return to the mode captured by [`enter_raw`](Self::enter_raw).
    fn restore(&self) -> PtyResult<()>;

    /// Current size of the terminal.
    fn size(&self) -> PtyResult<Dimension>;
}
