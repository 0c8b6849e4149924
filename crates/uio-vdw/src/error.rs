//! Errors reported by the driver's lifecycle and reconfiguration operations.

use core::fmt;

use iomem::{AllocError, PhysicalAddress};

use crate::RegistrationError;

/// Which allocation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    /// The registry slot holding the window's control structure.
    ControlStructure,
    /// The zeroed buffer backing a window with no fixed address.
    BackingBuffer,
}

/// Which host registration was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    /// Registration of the window's name.
    Identity,
    /// Registration of the memory map and interrupt line.
    Region,
}

/// Errors that can occur while adding or removing windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionError {
    /// A fixed base address is not page-aligned.
    Alignment { address: PhysicalAddress },
    /// The size is zero or cannot be rounded up to a page multiple.
    InvalidSize { size: usize },
    /// An allocation failed.
    OutOfMemory(Allocation),
    /// The host rejected a registration.
    Registration {
        stage: RegistrationStage,
        source: RegistrationError,
    },
    /// The descriptor text is malformed from `offset` onwards and nothing was parsed.
    Parse { offset: usize },
    /// A remove position is not below the current window count.
    IndexOutOfRange { index: usize, count: usize },
    /// The descriptor text is empty.
    Usage,
}

const EFAULT: i32 = 14;
const ENOMEM: i32 = 12;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;

impl RegionError {
    /// Returns the negative errno a parameter write would fail with.
    pub const fn errno(&self) -> i32 {
        match self {
            RegionError::Alignment { .. } => -EFAULT,
            RegionError::OutOfMemory(_) => -ENOMEM,
            RegionError::Registration { .. } | RegionError::IndexOutOfRange { .. } => -ENODEV,
            RegionError::InvalidSize { .. } | RegionError::Parse { .. } | RegionError::Usage => {
                -EINVAL
            }
        }
    }
}

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionError::Alignment { address } => {
                write!(f, "region start {} is not page-aligned", address)
            }
            RegionError::InvalidSize { size } => write!(f, "invalid region size {}", size),
            RegionError::OutOfMemory(Allocation::ControlStructure) => {
                write!(f, "out of memory for instance control structure")
            }
            RegionError::OutOfMemory(Allocation::BackingBuffer) => {
                write!(f, "out of memory for mappable backing buffer")
            }
            RegionError::Registration { stage, source } => match stage {
                RegistrationStage::Identity => write!(f, "failed to register device: {}", source),
                RegistrationStage::Region => {
                    write!(f, "failed to register uio device: {}", source)
                }
            },
            RegionError::Parse { offset } => {
                write!(f, "malformed region descriptor at offset {}", offset)
            }
            RegionError::IndexOutOfRange { index, count } => {
                write!(f, "index {} out of bounds ({} instances)", index, count)
            }
            RegionError::Usage => write!(f, "expected irq,addr,size[,irq,addr,size]..."),
        }
    }
}

impl From<AllocError> for RegionError {
    fn from(err: AllocError) -> Self {
        log::warn!("backing allocation failed: {}", err);
        RegionError::OutOfMemory(Allocation::BackingBuffer)
    }
}
