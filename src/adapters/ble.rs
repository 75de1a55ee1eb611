//! BLE GATT server adapter.
//!
//! Implements [`BleStackPort`] — the hexagonal boundary between the simulator
//! core and the BLE host stack.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: NimBLE GATT server via `esp32_nimble`.
//! - **all other targets**: in-memory simulation that records the registry,
//!   advertising state and notifications for host-side tests.
//!
//! Connection callbacks run on the NimBLE host task. They only push into the
//! shared [`StackEventQueue`]; the core drains it from the main loop.
//!
//! Handles are issued by this adapter, not by NimBLE: esp32-nimble exposes
//! services and characteristics as shared objects, so the adapter keeps a
//! table from handle to object.

use log::{debug, info, warn};

use crate::app::ports::{
    AdvertisingData, BleStackPort, CharHandle, ConnHandle, ServiceHandle,
};
use crate::error::StackError;
use crate::events::{StackEvent, StackEventQueue};
use crate::gatt::CharProps;

#[cfg(target_os = "espidf")]
use esp32_nimble::{
    BLEAdvertisementData, BLECharacteristic, BLEDevice, BLEService, NimbleProperties,
    utilities::{BleUuid, mutex::Mutex as NimbleMutex},
};
#[cfg(target_os = "espidf")]
use std::sync::Arc;

// ───────────────────────────────────────────────────────────────
// Registry entries
// ───────────────────────────────────────────────────────────────

struct ServiceEntry {
    handle: ServiceHandle,
    uuid: u16,
    started: bool,
    #[cfg(target_os = "espidf")]
    inner: Arc<NimbleMutex<BLEService>>,
}

struct CharEntry {
    handle: CharHandle,
    service: ServiceHandle,
    uuid: u16,
    props: CharProps,
    value: Vec<u8>,
    #[cfg(target_os = "espidf")]
    inner: Arc<NimbleMutex<BLECharacteristic>>,
}

/// Snapshot of one registered characteristic, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub handle: CharHandle,
    pub uuid: u16,
    pub props: CharProps,
    pub value: Vec<u8>,
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

pub struct BleAdapter {
    events: &'static StackEventQueue,
    initialised: bool,
    advertising: bool,
    next_handle: u16,
    services: Vec<ServiceEntry>,
    characteristics: Vec<CharEntry>,
    /// NimBLE cannot drop a single service; removed ones linger until the
    /// host is reset before the next registration.
    #[cfg(target_os = "espidf")]
    stale_services: bool,
    #[cfg(target_os = "espidf")]
    device_name: heapless::String<24>,
    /// Simulation: every notification pushed to the (virtual) central.
    #[cfg(not(target_os = "espidf"))]
    sim_notifications: Vec<(CharHandle, Vec<u8>)>,
    /// Simulation: current central, if any.
    #[cfg(not(target_os = "espidf"))]
    sim_peer: Option<ConnHandle>,
}

impl BleAdapter {
    pub fn new(events: &'static StackEventQueue) -> Self {
        Self {
            events,
            initialised: false,
            advertising: false,
            next_handle: 0,
            services: Vec::new(),
            characteristics: Vec::new(),
            #[cfg(target_os = "espidf")]
            stale_services: false,
            #[cfg(target_os = "espidf")]
            device_name: heapless::String::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_notifications: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_peer: None,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    /// Registered characteristics with `uuid`.
    pub fn characteristics_with_uuid(&self, uuid: u16) -> Vec<CharacteristicInfo> {
        self.characteristics
            .iter()
            .filter(|c| c.uuid == uuid)
            .map(|c| CharacteristicInfo {
                handle: c.handle,
                uuid: c.uuid,
                props: c.props,
                value: c.value.clone(),
            })
            .collect()
    }

    fn issue_handle(&mut self) -> u16 {
        self.next_handle = self.next_handle.wrapping_add(1).max(1);
        self.next_handle
    }

    fn require_init(&self) -> Result<(), StackError> {
        if self.initialised {
            Ok(())
        } else {
            Err(StackError::NotInitialised)
        }
    }

    fn char_entry_mut(&mut self, handle: CharHandle) -> Option<&mut CharEntry> {
        self.characteristics.iter_mut().find(|c| c.handle == handle)
    }

    fn forward(&self, event: StackEvent) {
        if !self.events.push(event) {
            warn!("BLE: stack event queue full, dropped {:?}", event);
        }
    }

    // ── Simulation controls ───────────────────────────────────

    /// Simulate a central connecting. Ignored unless advertising.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_connect(&mut self, conn: ConnHandle) {
        if !self.advertising {
            debug!("BLE(sim): connect from {:?} ignored, not advertising", conn);
            return;
        }
        // A connectable advertiser stops once a link is established.
        self.advertising = false;
        self.sim_peer = Some(conn);
        self.forward(StackEvent::Connected { conn });
    }

    /// Simulate the central leaving on its own.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_peer_leaves(&mut self) {
        if let Some(conn) = self.sim_peer.take() {
            self.forward(StackEvent::Disconnected { conn });
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_notifications(&self) -> &[(CharHandle, Vec<u8>)] {
        &self.sim_notifications
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_clear_notifications(&mut self) {
        self.sim_notifications.clear();
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_init(&mut self, device_name: &str) -> Result<(), StackError> {
        let device = BLEDevice::take();
        BLEDevice::set_device_name(device_name).map_err(|e| {
            warn!("BLE(espidf): set_device_name failed: {:?}", e);
            StackError::InitFailed
        })?;

        let server = device.get_server();
        // Re-advertising is the state machine's decision, not NimBLE's.
        server.advertise_on_disconnect(false);

        let events = self.events;
        server.on_connect(move |_server, desc| {
            if !events.push(StackEvent::Connected {
                conn: ConnHandle(desc.conn_handle()),
            }) {
                warn!("BLE(espidf): event queue full on connect");
            }
        });
        server.on_disconnect(move |desc, reason| {
            debug!("BLE(espidf): disconnect reason {:?}", reason);
            if !events.push(StackEvent::Disconnected {
                conn: ConnHandle(desc.conn_handle()),
            }) {
                warn!("BLE(espidf): event queue full on disconnect");
            }
        });

        self.device_name.clear();
        for c in device_name.chars() {
            if self.device_name.push(c).is_err() {
                break;
            }
        }
        self.stale_services = false;
        info!("BLE(espidf): NimBLE host up as '{}'", device_name);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init(&mut self, device_name: &str) -> Result<(), StackError> {
        info!("BLE(sim): stack up as '{}'", device_name);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_deinit(&mut self) {
        if let Err(e) = BLEDevice::deinit() {
            warn!("BLE(espidf): deinit failed: {:?}", e);
        }
        self.stale_services = false;
        info!("BLE(espidf): stack released");
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_deinit(&mut self) {
        if let Some(conn) = self.sim_peer.take() {
            // Releasing the host drops the link; the callback is gone too.
            debug!("BLE(sim): link {:?} dropped by deinit", conn);
        }
        info!("BLE(sim): stack released");
    }

    /// NimBLE keeps removed services registered; reset the host so the next
    /// profile starts from an empty attribute table.
    #[cfg(target_os = "espidf")]
    fn platform_reset_if_stale(&mut self) -> Result<(), StackError> {
        if !self.stale_services {
            return Ok(());
        }
        debug!("BLE(espidf): resetting host to drop removed services");
        if let Err(e) = BLEDevice::deinit() {
            warn!("BLE(espidf): deinit during reset failed: {:?}", e);
        }
        let name = self.device_name.clone();
        self.platform_init(&name)
    }

    #[cfg(target_os = "espidf")]
    fn platform_create_service(&mut self, uuid: u16) -> Result<ServiceEntry, StackError> {
        self.platform_reset_if_stale()
            .map_err(|_| StackError::ServiceCreateFailed)?;
        let server = BLEDevice::take().get_server();
        let inner = server.create_service(BleUuid::from_uuid16(uuid));
        Ok(ServiceEntry {
            handle: ServiceHandle(self.issue_handle()),
            uuid,
            started: false,
            inner,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_create_service(&mut self, uuid: u16) -> Result<ServiceEntry, StackError> {
        Ok(ServiceEntry {
            handle: ServiceHandle(self.issue_handle()),
            uuid,
            started: false,
        })
    }

    #[cfg(target_os = "espidf")]
    fn platform_create_characteristic(
        &mut self,
        service: ServiceHandle,
        uuid: u16,
        props: CharProps,
    ) -> Result<CharEntry, StackError> {
        let svc = self
            .services
            .iter()
            .find(|s| s.handle == service)
            .ok_or(StackError::UnknownHandle)?;
        let mut flags = NimbleProperties::empty();
        if props.read {
            flags |= NimbleProperties::READ;
        }
        if props.notify {
            flags |= NimbleProperties::NOTIFY;
        }
        let inner = svc
            .inner
            .lock()
            .create_characteristic(BleUuid::from_uuid16(uuid), flags);
        Ok(CharEntry {
            handle: CharHandle(self.issue_handle()),
            service,
            uuid,
            props,
            value: Vec::new(),
            inner,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_create_characteristic(
        &mut self,
        service: ServiceHandle,
        uuid: u16,
        props: CharProps,
    ) -> Result<CharEntry, StackError> {
        if !self.services.iter().any(|s| s.handle == service) {
            return Err(StackError::UnknownHandle);
        }
        Ok(CharEntry {
            handle: CharHandle(self.issue_handle()),
            service,
            uuid,
            props,
            value: Vec::new(),
        })
    }

    #[cfg(target_os = "espidf")]
    fn platform_set_value(entry: &mut CharEntry, value: &[u8]) {
        entry.inner.lock().set_value(value);
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_value(_entry: &mut CharEntry, _value: &[u8]) {}

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, handle: CharHandle, value: &[u8]) -> Result<(), StackError> {
        let entry = self.char_entry_mut(handle).ok_or(StackError::UnknownHandle)?;
        let mut ch = entry.inner.lock();
        ch.set_value(value);
        ch.notify();
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, handle: CharHandle, value: &[u8]) -> Result<(), StackError> {
        if self.sim_peer.is_some() {
            self.sim_notifications.push((handle, value.to_vec()));
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_start_advertising(&mut self, data: &AdvertisingData) -> Result<(), StackError> {
        let device = BLEDevice::take();
        BLEDevice::set_device_name(data.device_name).map_err(|_| StackError::AdvertisingFailed)?;
        let mut payload = BLEAdvertisementData::new();
        payload.name(data.device_name);
        for uuid in data.service_uuids {
            payload.add_service_uuid(BleUuid::from_uuid16(*uuid));
        }
        let mut advertising = device.get_advertising().lock();
        advertising
            .set_data(&mut payload)
            .map_err(|_| StackError::AdvertisingFailed)?;
        advertising.start().map_err(|_| StackError::AdvertisingFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start_advertising(&mut self, data: &AdvertisingData) -> Result<(), StackError> {
        info!(
            "BLE(sim): advertising '{}' (services {:04X?})",
            data.device_name, data.service_uuids
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop_advertising(&mut self) {
        if let Err(e) = BLEDevice::take().get_advertising().lock().stop() {
            debug!("BLE(espidf): stop advertising: {:?}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop_advertising(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self, conn: ConnHandle) -> Result<(), StackError> {
        BLEDevice::take()
            .get_server()
            .disconnect(conn.0)
            .map_err(|_| StackError::DisconnectFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self, conn: ConnHandle) -> Result<(), StackError> {
        if self.sim_peer != Some(conn) {
            return Err(StackError::DisconnectFailed);
        }
        self.sim_peer = None;
        // The host reports the termination back like any other disconnect.
        self.forward(StackEvent::Disconnected { conn });
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// BleStackPort implementation
// ───────────────────────────────────────────────────────────────

impl BleStackPort for BleAdapter {
    fn init(&mut self, device_name: &str) -> Result<(), StackError> {
        if self.initialised {
            debug!("BLE: already initialised");
            return Ok(());
        }
        self.platform_init(device_name)?;
        self.initialised = true;
        Ok(())
    }

    fn deinit(&mut self) {
        if !self.initialised {
            return;
        }
        self.platform_deinit();
        self.initialised = false;
        self.advertising = false;
        self.services.clear();
        self.characteristics.clear();
    }

    fn create_service(&mut self, uuid: u16) -> Result<ServiceHandle, StackError> {
        self.require_init()?;
        let entry = self.platform_create_service(uuid)?;
        let handle = entry.handle;
        debug!("BLE: service {:04X} -> {:?}", uuid, handle);
        self.services.push(entry);
        Ok(handle)
    }

    fn create_characteristic(
        &mut self,
        service: ServiceHandle,
        uuid: u16,
        props: CharProps,
    ) -> Result<CharHandle, StackError> {
        self.require_init()?;
        let entry = self.platform_create_characteristic(service, uuid, props)?;
        let handle = entry.handle;
        debug!("BLE: characteristic {:04X} -> {:?}", uuid, handle);
        self.characteristics.push(entry);
        Ok(handle)
    }

    fn start_service(&mut self, service: ServiceHandle) -> Result<(), StackError> {
        self.require_init()?;
        let entry = self
            .services
            .iter_mut()
            .find(|s| s.handle == service)
            .ok_or(StackError::ServiceCreateFailed)?;
        // NimBLE registers services when the server starts with advertising.
        entry.started = true;
        debug!("BLE: service {:04X} started", entry.uuid);
        Ok(())
    }

    fn remove_service(&mut self, service: ServiceHandle) {
        let before = self.services.len();
        self.services.retain(|s| s.handle != service);
        if self.services.len() == before {
            return;
        }
        self.characteristics.retain(|c| c.service != service);
        #[cfg(target_os = "espidf")]
        {
            self.stale_services = true;
        }
    }

    fn set_value(&mut self, characteristic: CharHandle, value: &[u8]) {
        match self.char_entry_mut(characteristic) {
            Some(entry) => {
                entry.value.clear();
                entry.value.extend_from_slice(value);
                Self::platform_set_value(entry, value);
            }
            None => debug!("BLE: set_value on unknown {:?}", characteristic),
        }
    }

    fn notify(&mut self, characteristic: CharHandle, value: &[u8]) -> Result<(), StackError> {
        self.require_init()?;
        let entry = self
            .char_entry_mut(characteristic)
            .ok_or(StackError::UnknownHandle)?;
        if !entry.props.notify {
            return Err(StackError::NotifyFailed);
        }
        entry.value.clear();
        entry.value.extend_from_slice(value);
        self.platform_notify(characteristic, value)
    }

    fn start_advertising(&mut self, data: &AdvertisingData) -> Result<(), StackError> {
        self.require_init()
            .map_err(|_| StackError::AdvertisingFailed)?;
        if self.services.iter().any(|s| !s.started) {
            return Err(StackError::AdvertisingFailed);
        }
        self.platform_start_advertising(data)?;
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) {
        if !self.advertising {
            return;
        }
        self.platform_stop_advertising();
        self.advertising = false;
    }

    fn disconnect(&mut self, conn: ConnHandle) -> Result<(), StackError> {
        self.require_init()
            .map_err(|_| StackError::DisconnectFailed)?;
        self.platform_disconnect(conn)
    }
}
