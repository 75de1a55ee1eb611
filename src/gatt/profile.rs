//! Live GATT profile: the handles of the currently registered services.
//!
//! Building is all-or-nothing. A failure part way removes what was already
//! registered, so the stack never holds a half-built profile.

use heapless::Vec;
use log::{debug, info, warn};

use super::{CharRole, InitialValue, profile_for};
use crate::app::ports::{AdvertisingData, BleStackPort, CharHandle, ServiceHandle};
use crate::error::StackError;
use crate::gatt::encoder::encode_battery_level;
use crate::model::{DeviceIdentity, SimulatedValues};

/// Upper bound on services per profile.
const MAX_SERVICES: usize = 4;
/// Upper bound on characteristics per profile.
const MAX_CHARACTERISTICS: usize = 8;

#[derive(Debug, Default)]
pub struct GattProfile {
    identity: DeviceIdentity,
    services: Vec<ServiceHandle, MAX_SERVICES>,
    characteristics: Vec<(CharRole, CharHandle), MAX_CHARACTERISTICS>,
}

impl GattProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity of the registered profile, `None` when nothing is registered.
    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn is_built(&self) -> bool {
        !self.services.is_empty()
    }

    pub fn characteristic(&self, role: CharRole) -> Option<CharHandle> {
        self.characteristics
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, h)| *h)
    }

    pub fn characteristic_count(&self) -> usize {
        self.characteristics.len()
    }

    /// Advertising payload for the registered profile.
    pub fn advertising(&self) -> Option<AdvertisingData> {
        let layout = profile_for(self.identity)?;
        self.is_built().then_some(AdvertisingData {
            device_name: layout.device_name,
            service_uuids: layout.advertised,
        })
    }

    /// Register every service and characteristic of `identity`.
    ///
    /// Any profile still registered is removed first, so calling this twice
    /// for the same identity never duplicates handles.
    pub fn build(
        &mut self,
        identity: DeviceIdentity,
        values: &SimulatedValues,
        stack: &mut impl BleStackPort,
    ) -> Result<(), StackError> {
        self.remove(stack);

        let Some(layout) = profile_for(identity) else {
            return Ok(());
        };

        self.identity = identity;
        if let Err(e) = self.register(layout.services, values, stack) {
            warn!("GATT build for {:?} failed: {}", identity, e);
            self.remove(stack);
            return Err(e);
        }

        info!(
            "GATT profile {:?} built: {} services, {} characteristics",
            identity,
            self.services.len(),
            self.characteristics.len()
        );
        Ok(())
    }

    fn register(
        &mut self,
        services: &'static [super::ServiceLayout],
        values: &SimulatedValues,
        stack: &mut impl BleStackPort,
    ) -> Result<(), StackError> {
        for svc in services {
            let service = stack.create_service(svc.uuid)?;
            self.services
                .push(service)
                .map_err(|_| StackError::ServiceCreateFailed)?;

            for ch in svc.characteristics {
                let handle = stack.create_characteristic(service, ch.uuid, ch.props)?;
                self.characteristics
                    .push((ch.role, handle))
                    .map_err(|_| StackError::CharacteristicCreateFailed)?;

                match ch.initial {
                    InitialValue::Empty => {}
                    InitialValue::Static(bytes) => stack.set_value(handle, bytes),
                    InitialValue::Battery => {
                        stack.set_value(handle, &encode_battery_level(values.battery_pct()));
                    }
                }
            }

            stack.start_service(service)?;
        }
        Ok(())
    }

    /// Remove every registered service. Idempotent.
    pub fn remove(&mut self, stack: &mut impl BleStackPort) {
        if self.services.is_empty() && self.characteristics.is_empty() {
            self.identity = DeviceIdentity::None;
            return;
        }
        debug!("Removing GATT profile {:?}", self.identity);
        for service in self.services.iter().rev() {
            stack.remove_service(*service);
        }
        self.forget();
    }

    /// Drop all handles without touching the stack (it was released).
    pub fn forget(&mut self) {
        self.services.clear();
        self.characteristics.clear();
        self.identity = DeviceIdentity::None;
    }
}
