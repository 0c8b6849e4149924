//! Ordered collection of live windows.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use crate::error::{Allocation, RegionError};
use crate::instance::Instance;
use crate::RegionDescriptor;

/// Live windows in creation order, plus the state derived from them.
///
/// The registry owns every [`Instance`]; the driver keeps it behind its one lock, so
/// nothing here needs to be thread-safe on its own.
pub(crate) struct Registry {
    instances: Vec<Instance>,
    next_serial: u64,
    snapshot: String,
}

impl Registry {
    pub(crate) const fn new() -> Self {
        Self {
            instances: Vec::new(),
            next_serial: 1,
            snapshot: String::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&Instance> {
        self.instances.get(index)
    }

    /// Makes room for one more instance so the following [`push`](Self::push) cannot
    /// fail.
    pub(crate) fn reserve_slot(&mut self) -> Result<(), RegionError> {
        self.instances
            .try_reserve(1)
            .map_err(|_| RegionError::OutOfMemory(Allocation::ControlStructure))
    }

    /// Hands out the next creation serial. Serials are never reused.
    pub(crate) fn take_serial(&mut self) -> u64 {
        let serial = self.next_serial;
        self.next_serial += 1;
        serial
    }

    pub(crate) fn push(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    /// Unlinks the instance at `index`, keeping the order of the rest.
    pub(crate) fn remove(&mut self, index: usize) -> Result<Instance, RegionError> {
        if index >= self.instances.len() {
            return Err(RegionError::IndexOutOfRange {
                index,
                count: self.instances.len(),
            });
        }
        Ok(self.instances.remove(index))
    }

    /// Unlinks every instance, first to last.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = Instance> + '_ {
        self.instances.drain(..)
    }

    pub(crate) fn snapshot(&self) -> &str {
        &self.snapshot
    }

    /// Regenerates the textual snapshot from the live instances.
    pub(crate) fn refresh_snapshot(&mut self) {
        self.snapshot = format_snapshot(self.instances.iter().map(Instance::descriptor));
    }
}

/// Joins descriptors into the `irq,addr,size[,...]` form the parser accepts.
pub(crate) fn format_snapshot(descriptors: impl Iterator<Item = RegionDescriptor>) -> String {
    let mut out = String::new();
    for (i, descriptor) in descriptors.enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{}", descriptor);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Descriptors, IrqLine};
    use iomem::PhysicalAddress;

    fn desc(irq: i32, base: usize, size: usize) -> RegionDescriptor {
        RegionDescriptor::new(IrqLine::new(irq), PhysicalAddress::new(base), size)
    }

    #[test]
    fn empty_snapshot() {
        assert_eq!(format_snapshot(core::iter::empty()), "");
    }

    #[test]
    fn snapshot_joins_triplets() {
        let descriptors = [desc(5, 0, 4096), desc(-1, 0x8000_0000, 8192)];
        assert_eq!(
            format_snapshot(descriptors.iter().copied()),
            "5,0,4096,-1,80000000,8192"
        );
    }

    #[test]
    fn snapshot_reparses() {
        let descriptors = vec![desc(5, 0, 4096), desc(7, 0x1000, 4096), desc(-3, 0, 12288)];
        let text = format_snapshot(descriptors.iter().copied());
        let parsed: Vec<_> = Descriptors::new(&text).collect();
        assert_eq!(parsed, descriptors);
    }

    #[test]
    fn serials_increase() {
        let mut registry = Registry::new();
        assert_eq!(registry.take_serial(), 1);
        assert_eq!(registry.take_serial(), 2);
        assert_eq!(registry.take_serial(), 3);
    }

    #[test]
    fn remove_out_of_range() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.remove(0),
            Err(RegionError::IndexOutOfRange { index: 0, count: 0 })
        ));
        assert_eq!(registry.len(), 0);
    }
}
