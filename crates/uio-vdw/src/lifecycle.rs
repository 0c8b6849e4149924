//! Creating and destroying windows.
//!
//! Creation acquires resources in a fixed order (registry slot, identity, backing memory,
//! exposure) and each one is held by a guard that releases it on drop. If any step fails
//! the `?` returns early and the guards already taken unwind in reverse, so a failed
//! creation leaves the registry and the host exactly as they were.

use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;

use iomem::{BackingPool, page_round_up};

use crate::error::RegistrationStage;
use crate::framework::{IdentityRegistration, RegionRegistration};
use crate::instance::Instance;
use crate::registry::Registry;
use crate::{
    DriverConfig, ExposureFramework, ExposureInfo, InstanceInfo, IrqSharing, MemoryMap,
    MemoryType, RegionDescriptor, RegionError, relay,
};

pub(crate) struct Lifecycle {
    config: DriverConfig,
    framework: Arc<dyn ExposureFramework>,
    pool: Arc<BackingPool>,
}

impl Lifecycle {
    pub(crate) fn new(
        config: DriverConfig,
        framework: Arc<dyn ExposureFramework>,
        pool: Arc<BackingPool>,
    ) -> Self {
        Self {
            config,
            framework,
            pool,
        }
    }

    pub(crate) fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Creates a window and appends it to `registry`.
    pub(crate) fn create(
        &self,
        registry: &mut Registry,
        descriptor: RegionDescriptor,
    ) -> Result<InstanceInfo, RegionError> {
        log::info!(
            "instance init irq={} start={:x} size={}",
            descriptor.irq,
            descriptor.base,
            descriptor.size
        );

        if !descriptor.base.is_page_aligned() {
            log::warn!("region start {} must be page-aligned", descriptor.base);
            return Err(RegionError::Alignment {
                address: descriptor.base,
            });
        }

        let region_size = page_round_up(descriptor.size)
            .filter(|size| *size != 0)
            .ok_or_else(|| {
                log::warn!("region size {} cannot be exposed", descriptor.size);
                RegionError::InvalidSize {
                    size: descriptor.size,
                }
            })?;

        registry.reserve_slot()?;
        let serial = registry.take_serial();
        let name = self.config.instance_name(descriptor.base, serial);
        log::debug!("instance {} will be {}", serial, name);

        let identity = IdentityRegistration::acquire(&self.framework, &name).map_err(|source| {
            log::error!("failed to register device {}: {}", name, source);
            RegionError::Registration {
                stage: RegistrationStage::Identity,
                source,
            }
        })?;

        let backing = if descriptor.allocates() {
            let buffer = self.pool.allocate(region_size)?;
            log::debug!(
                "backing memory at {} ({} bytes)",
                buffer.physical_address(),
                buffer.size()
            );
            Some(buffer)
        } else {
            None
        };
        let mapped_address = backing
            .as_ref()
            .map_or(descriptor.base, |buffer| buffer.physical_address());

        let info = ExposureInfo {
            map: MemoryMap {
                name: map_name(&name),
                address: mapped_address,
                size: region_size,
                memtype: MemoryType::Physical,
            },
            name,
            version: String::from(self.config.version()),
            irq: descriptor.irq,
            sharing: IrqSharing::Shared,
        };
        let exposure = RegionRegistration::acquire(&self.framework, &info, relay).map_err(|source| {
            log::error!("failed to register uio device {}: {}", info.name, source);
            RegionError::Registration {
                stage: RegistrationStage::Region,
                source,
            }
        })?;

        let instance = Instance {
            exposure,
            _identity: identity,
            backing,
            name: info.name,
            serial,
            irq: descriptor.irq,
            region_start: descriptor.base,
            region_size,
        };
        let created = instance.info();
        registry.push(instance);

        log::info!(
            "registered {} at {} for irq {} ({} instances)",
            created.name,
            created.mapped_address,
            created.irq,
            registry.len()
        );
        Ok(created)
    }

    /// Unlinks the window at `index` and releases everything it holds.
    pub(crate) fn destroy(
        &self,
        registry: &mut Registry,
        index: usize,
    ) -> Result<InstanceInfo, RegionError> {
        log::info!(
            "instance remove {} of {} instances",
            index,
            registry.len()
        );

        let instance = registry.remove(index).inspect_err(|err| {
            log::error!("instance remove: {}", err);
        })?;
        let removed = instance.info();
        log::info!("unregister {} for irq {}", instance.name(), removed.irq);
        drop(instance);

        log::info!("instance remove: {} instances left", registry.len());
        Ok(removed)
    }

    /// Destroys every window, first to last. Returns how many were destroyed.
    pub(crate) fn teardown(&self, registry: &mut Registry) -> usize {
        let total = registry.len();
        log::info!("teardown begin, {} instances", total);
        for instance in registry.drain() {
            log::info!("unregister {} for irq {}", instance.name(), instance.irq);
        }
        log::info!("teardown done");
        total
    }
}

fn map_name(name: &str) -> String {
    format!("{}_map0", name)
}
