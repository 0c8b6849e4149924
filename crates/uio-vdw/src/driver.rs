//! The driver's public entry points.
//!
//! These correspond to the driver's parameters: the load-time region list, the runtime
//! "add" parameter that takes more triplets, and the runtime "remove" parameter that
//! takes a position. Every entry point takes the registry lock for its whole duration,
//! so concurrent requests are applied one after another and the snapshot read back
//! afterwards always matches the live windows.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use iomem::BackingPool;

use crate::lifecycle::Lifecycle;
use crate::registry::Registry;
use crate::{
    Descriptors, DriverConfig, ExposureFramework, InstanceInfo, RegionDescriptor, RegionError,
};

/// A set of exposed register windows that can change at runtime.
///
/// Dropping the driver destroys every remaining window.
pub struct RegionDriver {
    registry: spin::Mutex<Registry>,
    lifecycle: Lifecycle,
}

impl RegionDriver {
    /// Creates a driver with no windows.
    ///
    /// Windows without a fixed address get their memory from `pool`.
    pub fn new(
        config: DriverConfig,
        framework: Arc<dyn ExposureFramework>,
        pool: Arc<BackingPool>,
    ) -> Self {
        Self {
            registry: spin::Mutex::new(Registry::new()),
            lifecycle: Lifecycle::new(config, framework, pool),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        self.lifecycle.config()
    }

    /// Creates the windows listed in the configuration.
    pub fn load_configured(&self) -> Result<usize, RegionError> {
        self.load(self.config().regions())
    }

    /// Bulk load: creates one window per triplet in `regions`.
    ///
    /// Stops at the first failure. Windows created before the failure stay live. Returns
    /// the number of windows created.
    pub fn load(&self, regions: &str) -> Result<usize, RegionError> {
        log::info!("loading regions (irq,start,size[,...]) = {}", regions);
        self.reconfigure(regions)
    }

    /// Runtime add: same grammar and semantics as [`load`](Self::load), applied to a
    /// running driver.
    pub fn add(&self, regions: &str) -> Result<usize, RegionError> {
        log::info!("adding regions (irq,start,size[,...]) = {}", regions);
        self.reconfigure(regions)
    }

    /// Creates a single window from an already parsed descriptor.
    pub fn create(&self, descriptor: RegionDescriptor) -> Result<InstanceInfo, RegionError> {
        let mut registry = self.registry.lock();
        let result = self.lifecycle.create(&mut registry, descriptor);
        registry.refresh_snapshot();
        result
    }

    /// Runtime remove: destroys the window at `index` in the current order.
    ///
    /// Positions shift after every removal, so repeating the same index targets a
    /// different window.
    pub fn remove(&self, index: usize) -> Result<InstanceInfo, RegionError> {
        let mut registry = self.registry.lock();
        let result = self.lifecycle.destroy(&mut registry, index);
        registry.refresh_snapshot();
        result
    }

    /// Destroys every window. Returns how many were destroyed.
    pub fn teardown(&self) -> usize {
        let mut registry = self.registry.lock();
        let destroyed = self.lifecycle.teardown(&mut registry);
        registry.refresh_snapshot();
        destroyed
    }

    /// Returns the number of live windows.
    pub fn count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns the live windows as an `irq,addr,size[,...]` string, in order.
    pub fn snapshot(&self) -> String {
        String::from(self.registry.lock().snapshot())
    }

    /// Returns the window at `index`, if any.
    pub fn instance(&self, index: usize) -> Option<InstanceInfo> {
        self.registry.lock().get(index).map(|instance| instance.info())
    }

    /// Returns every live window, in order.
    pub fn instances(&self) -> Vec<InstanceInfo> {
        self.registry.lock().iter().map(|instance| instance.info()).collect()
    }

    fn reconfigure(&self, regions: &str) -> Result<usize, RegionError> {
        let mut registry = self.registry.lock();
        let result = self.apply(&mut registry, regions);
        registry.refresh_snapshot();
        result
    }

    fn apply(&self, registry: &mut Registry, regions: &str) -> Result<usize, RegionError> {
        if regions.trim().is_empty() {
            log::warn!("no regions given");
            return Err(RegionError::Usage);
        }

        let mut descriptors = Descriptors::new(regions);
        let mut created = 0;
        for descriptor in descriptors.by_ref() {
            self.lifecycle
                .create(registry, descriptor)
                .inspect_err(|err| {
                    log::warn!("stopped after {} new instance(s): {}", created, err);
                })?;
            created += 1;
        }

        let rest = descriptors.remainder();
        if created == 0 {
            log::warn!("malformed regions: {:?}", rest);
            return Err(RegionError::Parse {
                offset: descriptors.offset(),
            });
        }
        if !rest.is_empty() {
            log::warn!("ignoring trailing text {:?}", rest);
        }
        Ok(created)
    }
}

impl Drop for RegionDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}
