#![cfg_attr(not(test), no_std)]

//! # uio-vdw
//!
//! Exposes fixed-size register windows, each paired with an interrupt line, to userspace
//! through a host device-exposure framework. The set of windows can change while the
//! driver runs: a descriptor string `irq,addr,size[,irq,addr,size]...` adds windows and a
//! position removes one.
//!
//! The host framework is reached through [`ExposureFramework`]. With the `software-host`
//! feature (always on in tests) an in-memory [`SoftwareHost`] implements it.

extern crate alloc;

mod config;
mod descriptor;
mod driver;
mod error;
mod framework;
mod instance;
mod irq;
mod lifecycle;
mod registry;
#[cfg(any(test, feature = "software-host"))]
mod software;

pub use config::{DEFAULT_PREFIX, DEFAULT_REGIONS, DEFAULT_VERSION, DriverConfig};
pub use descriptor::{Descriptors, RegionDescriptor};
pub use driver::RegionDriver;
pub use error::{Allocation, RegionError, RegistrationStage};
pub use framework::{
    ExposureFramework, ExposureHandle, ExposureInfo, IdentityToken, MemoryMap, MemoryType,
    RegistrationError,
};
pub use instance::InstanceInfo;
pub use irq::{IrqHandler, IrqLine, IrqReturn, IrqSharing, relay};
#[cfg(any(test, feature = "software-host"))]
pub use software::{ExposedDevice, SoftwareHost};
