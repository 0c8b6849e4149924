//! Interrupt lines and the relay handler attached to every exposed window.

use core::fmt;

/// An interrupt line number. Negative values mean the window has no interrupt.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IrqLine(i32);

impl IrqLine {
    /// The "no interrupt" line.
    pub const NONE: Self = Self(-1);

    /// Creates a line from its raw number.
    pub const fn new(line: i32) -> Self {
        Self(line)
    }

    /// Returns the raw line number.
    pub const fn value(&self) -> i32 {
        self.0
    }

    /// Returns true if this line means "no interrupt".
    pub const fn is_none(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Debug for IrqLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "IrqLine::NONE({})", self.0)
        } else {
            write!(f, "IrqLine({})", self.0)
        }
    }
}

impl fmt::Display for IrqLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a handler reports back to the host after an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqReturn {
    /// The interrupt was not for this window.
    None,
    /// The interrupt was acknowledged; the host should wake userspace waiters.
    Handled,
}

/// Whether a line may be shared with other windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSharing {
    Shared,
    Exclusive,
}

/// Interrupt handler signature the host invokes for a registered window.
pub type IrqHandler = fn(IrqLine) -> IrqReturn;

/// Handler attached to every window with an interrupt line.
///
/// Does no register-level work: acknowledging is enough for the host to unblock whoever
/// is reading or polling the window. Runs in interrupt context, so it must not block,
/// allocate, or touch the registry.
pub fn relay(line: IrqLine) -> IrqReturn {
    log::trace!("interrupt relayed on line {}", line);
    IrqReturn::Handled
}
