//! Driver configuration.

use alloc::format;
use alloc::string::String;

use iomem::PhysicalAddress;

/// Device-class prefix shared by every exposed window's name.
///
/// Userspace finds its devices by matching this prefix against the names the host
/// publishes.
pub const DEFAULT_PREFIX: &str = "uio_vdw_device";

/// Version string reported to the host for every window.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Windows created at load time when nothing else is configured: one allocated page with
/// no interrupt.
pub const DEFAULT_REGIONS: &str = "-1,0,4096";

/// Settings for a [`RegionDriver`](crate::RegionDriver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    prefix: String,
    version: String,
    regions: String,
}

impl DriverConfig {
    /// Creates a configuration with the default prefix, version and load-time regions.
    pub fn new() -> Self {
        Self {
            prefix: String::from(DEFAULT_PREFIX),
            version: String::from(DEFAULT_VERSION),
            regions: String::from(DEFAULT_REGIONS),
        }
    }

    /// Sets the device-class prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the version string reported to the host.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the descriptor string applied by
    /// [`RegionDriver::load_configured`](crate::RegionDriver::load_configured).
    pub fn with_regions(mut self, regions: impl Into<String>) -> Self {
        self.regions = regions.into();
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn regions(&self) -> &str {
        &self.regions
    }

    /// Name for a window: the prefix plus the fixed base address as `0x`-prefixed hex,
    /// or the serial in decimal when the window is backed by allocated memory.
    ///
    /// A decimal serial never contains an `x`, so the two forms cannot collide.
    pub(crate) fn instance_name(&self, base: PhysicalAddress, serial: u64) -> String {
        if base.is_zero() {
            format!("{}_{}", self.prefix, serial)
        } else {
            format!("{}_{}", self.prefix, base)
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.prefix(), "uio_vdw_device");
        assert_eq!(config.version(), "1.0.0");
        assert_eq!(config.regions(), "-1,0,4096");
    }

    #[test]
    fn builder_overrides() {
        let config = DriverConfig::new()
            .with_prefix("board")
            .with_version("2.1")
            .with_regions("3,0,100");
        assert_eq!(config.prefix(), "board");
        assert_eq!(config.version(), "2.1");
        assert_eq!(config.regions(), "3,0,100");
    }

    #[test]
    fn names_use_base_or_serial() {
        let config = DriverConfig::new();
        assert_eq!(
            config.instance_name(PhysicalAddress::new(0x8000_0000), 7),
            "uio_vdw_device_0x80000000"
        );
        assert_eq!(
            config.instance_name(PhysicalAddress::ZERO, 26),
            "uio_vdw_device_26"
        );
    }

    #[test]
    fn serial_and_address_names_never_collide() {
        let config = DriverConfig::new();
        assert_ne!(
            config.instance_name(PhysicalAddress::ZERO, 0x1000),
            config.instance_name(PhysicalAddress::new(0x1000), 1)
        );
        assert_ne!(
            config.instance_name(PhysicalAddress::ZERO, 1000),
            config.instance_name(PhysicalAddress::new(0x1000), 1)
        );
    }
}
