//! Boundary to the host device-exposure framework.
//!
//! The host turns a named memory map plus an interrupt line into an object userspace can
//! open, memory-map, and poll. The driver only ever registers and unregisters through
//! [`ExposureFramework`]; the scoped registration guards in this module make sure every
//! successful registration is paired with exactly one unregistration.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use iomem::PhysicalAddress;

use crate::{IrqHandler, IrqLine, IrqSharing};

/// Opaque token for a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdentityToken(u64);

impl IdentityToken {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

/// Opaque handle for an exposed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExposureHandle(u64);

impl ExposureHandle {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

/// How the host should map a window's address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    /// A physical address, mapped uncached.
    Physical,
    /// A kernel logical address.
    Logical,
}

/// The single memory map exposed for a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    pub name: String,
    pub address: PhysicalAddress,
    pub size: usize,
    pub memtype: MemoryType,
}

/// Everything the host needs to expose one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureInfo {
    pub name: String,
    pub version: String,
    pub map: MemoryMap,
    pub irq: IrqLine,
    pub sharing: IrqSharing,
}

/// Reasons the host can reject a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// Another object already uses this name.
    DuplicateName,
    /// The name is empty or contains characters the host cannot publish.
    InvalidName,
    /// The host refused for its own reasons (no free minors, irq request failed, ...).
    Rejected,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::DuplicateName => write!(f, "name already registered"),
            RegistrationError::InvalidName => write!(f, "invalid name"),
            RegistrationError::Rejected => write!(f, "rejected by host"),
        }
    }
}

/// The host device-exposure framework.
///
/// Implementations are called with the driver's registry lock held and must not call back
/// into the driver.
pub trait ExposureFramework: Send + Sync {
    /// Registers a named device identity.
    fn register_identity(&self, name: &str) -> Result<IdentityToken, RegistrationError>;

    /// Releases an identity returned by [`register_identity`](Self::register_identity).
    fn unregister_identity(&self, token: IdentityToken);

    /// Exposes a memory map and interrupt line. `handler` runs for every interrupt on
    /// `info.irq` unless the line is [`IrqLine::NONE`].
    fn register_region(
        &self,
        info: &ExposureInfo,
        handler: IrqHandler,
    ) -> Result<ExposureHandle, RegistrationError>;

    /// Withdraws a window returned by [`register_region`](Self::register_region).
    fn unregister_region(&self, handle: ExposureHandle);
}

/// A registered identity, released when dropped.
pub(crate) struct IdentityRegistration {
    framework: Arc<dyn ExposureFramework>,
    token: IdentityToken,
}

impl IdentityRegistration {
    pub(crate) fn acquire(
        framework: &Arc<dyn ExposureFramework>,
        name: &str,
    ) -> Result<Self, RegistrationError> {
        let token = framework.register_identity(name)?;
        Ok(Self {
            framework: Arc::clone(framework),
            token,
        })
    }
}

impl Drop for IdentityRegistration {
    fn drop(&mut self) {
        self.framework.unregister_identity(self.token);
    }
}

/// An exposed window, withdrawn when dropped.
pub(crate) struct RegionRegistration {
    framework: Arc<dyn ExposureFramework>,
    handle: ExposureHandle,
}

impl RegionRegistration {
    pub(crate) fn acquire(
        framework: &Arc<dyn ExposureFramework>,
        info: &ExposureInfo,
        handler: IrqHandler,
    ) -> Result<Self, RegistrationError> {
        let handle = framework.register_region(info, handler)?;
        Ok(Self {
            framework: Arc::clone(framework),
            handle,
        })
    }

    pub(crate) fn handle(&self) -> ExposureHandle {
        self.handle
    }
}

impl Drop for RegionRegistration {
    fn drop(&mut self) {
        self.framework.unregister_region(self.handle);
    }
}
