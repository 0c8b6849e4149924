//! In-memory host exposure framework.
//!
//! Stands in for the real host so the driver can run anywhere: it keeps the registered
//! identities and exposed windows in maps, numbers windows like `/dev/uioN`, and models
//! interrupt delivery with per-window event counters. One-shot failure injection lets
//! callers exercise the driver's rollback paths.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::{
    ExposureFramework, ExposureHandle, ExposureInfo, IdentityToken, IrqHandler, IrqLine,
    IrqReturn, RegistrationError,
};

/// A window as the software host sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposedDevice {
    /// Minor number; the window appears as `/dev/uio<minor>`.
    pub minor: u64,
    pub info: ExposureInfo,
    /// Interrupts delivered and acknowledged since registration.
    pub events: u32,
}

impl ExposedDevice {
    /// Returns the device node path userspace would open.
    pub fn node(&self) -> String {
        format!("/dev/uio{}", self.minor)
    }
}

struct Device {
    exposed: ExposedDevice,
    handler: Option<IrqHandler>,
}

#[derive(Default)]
struct HostState {
    identities: BTreeMap<u64, String>,
    names: BTreeSet<String>,
    next_identity: u64,
    devices: BTreeMap<u64, Device>,
    fail_identity: Option<RegistrationError>,
    fail_region: Option<RegistrationError>,
}

/// In-memory implementation of [`ExposureFramework`].
#[derive(Default)]
pub struct SoftwareHost {
    state: spin::Mutex<HostState>,
}

impl SoftwareHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next identity registration fail with `error`.
    pub fn fail_next_identity(&self, error: RegistrationError) {
        self.state.lock().fail_identity = Some(error);
    }

    /// Makes the next region registration fail with `error`.
    pub fn fail_next_region(&self, error: RegistrationError) {
        self.state.lock().fail_region = Some(error);
    }

    /// Returns the number of registered identities.
    pub fn identity_count(&self) -> usize {
        self.state.lock().identities.len()
    }

    /// Returns the number of exposed windows.
    pub fn device_count(&self) -> usize {
        self.state.lock().devices.len()
    }

    /// Returns every exposed window in minor order.
    pub fn devices(&self) -> Vec<ExposedDevice> {
        self.state
            .lock()
            .devices
            .values()
            .map(|d| d.exposed.clone())
            .collect()
    }

    /// Returns the window behind `handle`, if it is still exposed.
    pub fn device(&self, handle: ExposureHandle) -> Option<ExposedDevice> {
        self.state
            .lock()
            .devices
            .get(&handle.value())
            .map(|d| d.exposed.clone())
    }

    /// Delivers an interrupt on `line` to every window registered on it.
    ///
    /// Lines are shared, so each window's handler runs; every window whose handler
    /// reports [`IrqReturn::Handled`] gets its event counter bumped. Returns the number
    /// of windows that handled the interrupt.
    pub fn raise(&self, line: IrqLine) -> usize {
        let mut state = self.state.lock();
        let mut handled = 0;
        for device in state.devices.values_mut() {
            if device.exposed.info.irq != line {
                continue;
            }
            let Some(handler) = device.handler else {
                continue;
            };
            if handler(line) == IrqReturn::Handled {
                device.exposed.events = device.exposed.events.wrapping_add(1);
                handled += 1;
            }
        }
        log::debug!("irq {} handled by {} device(s)", line, handled);
        handled
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\0'])
}

impl ExposureFramework for SoftwareHost {
    fn register_identity(&self, name: &str) -> Result<IdentityToken, RegistrationError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_identity.take() {
            return Err(error);
        }
        if !valid_name(name) {
            return Err(RegistrationError::InvalidName);
        }
        if state.names.contains(name) {
            return Err(RegistrationError::DuplicateName);
        }

        let token = state.next_identity;
        state.next_identity += 1;
        state.identities.insert(token, String::from(name));
        state.names.insert(String::from(name));
        log::debug!("registered identity {} as token {}", name, token);
        Ok(IdentityToken::new(token))
    }

    fn unregister_identity(&self, token: IdentityToken) {
        let mut state = self.state.lock();
        match state.identities.remove(&token.value()) {
            Some(name) => {
                state.names.remove(&name);
                log::debug!("unregistered identity {}", name);
            }
            None => log::warn!("unregister of unknown identity token {}", token.value()),
        }
    }

    fn register_region(
        &self,
        info: &ExposureInfo,
        handler: IrqHandler,
    ) -> Result<ExposureHandle, RegistrationError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_region.take() {
            return Err(error);
        }
        if !valid_name(&info.name) || !valid_name(&info.map.name) {
            return Err(RegistrationError::InvalidName);
        }
        if state.devices.values().any(|d| d.exposed.info.name == info.name) {
            return Err(RegistrationError::DuplicateName);
        }

        // Lowest free minor, like the host's idr allocation.
        let minor = (0..)
            .find(|m| !state.devices.contains_key(m))
            .ok_or(RegistrationError::Rejected)?;
        let device = Device {
            exposed: ExposedDevice {
                minor,
                info: info.clone(),
                events: 0,
            },
            handler: (!info.irq.is_none()).then_some(handler),
        };
        state.devices.insert(minor, device);
        log::debug!(
            "exposed {} as /dev/uio{} (map {} at {} size {})",
            info.name,
            minor,
            info.map.name,
            info.map.address,
            info.map.size
        );
        Ok(ExposureHandle::new(minor))
    }

    fn unregister_region(&self, handle: ExposureHandle) {
        match self.state.lock().devices.remove(&handle.value()) {
            Some(device) => log::debug!(
                "withdrew {} from /dev/uio{}",
                device.exposed.info.name,
                device.exposed.minor
            ),
            None => log::warn!("unregister of unknown device handle {}", handle.value()),
        }
    }
}
