//! A live exposed window.

use alloc::string::String;

use iomem::{BackingBuffer, PhysicalAddress};

use crate::framework::{IdentityRegistration, RegionRegistration};
use crate::{ExposureHandle, IrqLine, RegionDescriptor};

/// One exposed window and every resource it holds.
///
/// Fields drop in declaration order, which is also the teardown order: the window is
/// withdrawn from userspace, its identity is released, and only then is the backing
/// memory returned.
pub(crate) struct Instance {
    pub(crate) exposure: RegionRegistration,
    /// Held only so it is released on drop.
    pub(crate) _identity: IdentityRegistration,
    pub(crate) backing: Option<BackingBuffer>,
    pub(crate) name: String,
    pub(crate) serial: u64,
    pub(crate) irq: IrqLine,
    pub(crate) region_start: PhysicalAddress,
    pub(crate) region_size: usize,
}

impl Instance {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// The physical address userspace maps: the backing buffer when there is one.
    pub(crate) fn mapped_address(&self) -> PhysicalAddress {
        self.backing
            .as_ref()
            .map_or(self.region_start, BackingBuffer::physical_address)
    }

    /// The triplet that recreates this window.
    pub(crate) fn descriptor(&self) -> RegionDescriptor {
        RegionDescriptor::new(self.irq, self.region_start, self.region_size)
    }

    pub(crate) fn info(&self) -> InstanceInfo {
        InstanceInfo {
            name: self.name.clone(),
            serial: self.serial,
            irq: self.irq,
            region_start: self.region_start,
            region_size: self.region_size,
            mapped_address: self.mapped_address(),
            handle: self.exposure.handle(),
        }
    }
}

/// Observable state of a live window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub name: String,
    /// Creation serial; strictly increasing across the driver's lifetime.
    pub serial: u64,
    pub irq: IrqLine,
    /// Configured fixed start, zero for windows backed by allocated memory.
    pub region_start: PhysicalAddress,
    /// Size in bytes, always a positive page multiple.
    pub region_size: usize,
    /// Physical address exposed to userspace.
    pub mapped_address: PhysicalAddress,
    pub handle: ExposureHandle,
}

impl InstanceInfo {
    /// Returns true if the window is backed by allocated memory.
    pub fn is_allocated(&self) -> bool {
        self.region_start.is_zero()
    }
}
