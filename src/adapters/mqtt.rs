//! MQTT control-channel adapter.
//!
//! Receives commands on `ble-sim/{id}/{config,set,disconnect}` and
//! implements [`EventSink`] to publish status, values and errors.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//!   The client callback runs on the MQTT task; it only flips link flags and
//!   forwards received messages into a bounded [`InboundChannel`] drained by
//!   [`MqttTransport::next_command`]. A full channel drops the message.
//! - **all other targets**: simulation with injectable inbound messages and a
//!   log of everything published.
//!
//! Publishing while the broker link is down drops the message, as the
//! status topic is retained and re-sent on every (re)connect.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::app::commands::Command;
use crate::app::events::CoreEvent;
use crate::app::ports::EventSink;
use crate::config::NetworkConfig;
use crate::error::CommandError;
use crate::protocol::{
    self, InboundTopic, LWT_PAYLOAD, OutboundTopic, Topic, decode_command, parse_topic,
};

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};
#[cfg(target_os = "espidf")]
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Messages buffered between the MQTT task and the main loop.
pub const INBOUND_DEPTH: usize = 8;

/// Largest command payload accepted, in bytes.
pub const INBOUND_PAYLOAD_MAX: usize = 512;

/// A message received on one of the command topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: Topic,
    pub payload: heapless::Vec<u8, INBOUND_PAYLOAD_MAX>,
}

/// Inbound channel: MQTT task → main loop.
pub type InboundChannel = Channel<CriticalSectionRawMutex, Inbound, INBOUND_DEPTH>;

/// Copy a broker message into `channel`. Returns `false` when it was dropped.
fn forward_inbound(channel: &InboundChannel, topic: &str, data: &[u8]) -> bool {
    let mut t = Topic::new();
    if t.push_str(topic).is_err() {
        debug!("MQTT: dropping message on over-long topic {}", topic);
        return false;
    }
    let Ok(payload) = heapless::Vec::from_slice(data) else {
        warn!("MQTT: {} byte payload on {} exceeds {}", data.len(), topic, INBOUND_PAYLOAD_MAX);
        return false;
    };
    if channel.try_send(Inbound { topic: t, payload }).is_err() {
        warn!("MQTT: inbound queue full, dropping message on {}", topic);
        return false;
    }
    true
}

/// A message handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: Topic,
    pub payload: String,
    pub retain: bool,
}

#[cfg(target_os = "espidf")]
#[derive(Default)]
struct LinkFlags {
    connected: AtomicBool,
    /// Set on every broker (re)connect; subscriptions are lost with the session.
    resubscribe: AtomicBool,
}

pub struct MqttTransport {
    device_id: heapless::String<32>,
    broker_url: String,
    reconnect_interval_ms: u64,
    last_attempt_ms: Option<u64>,
    connected: bool,
    status_topic: Topic,
    values_topic: Topic,
    error_topic: Topic,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    link: Arc<LinkFlags>,
    inbound: &'static InboundChannel,
    #[cfg(not(target_os = "espidf"))]
    sim_broker_up: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_session: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_resubscribe: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<Published>,
    #[cfg(not(target_os = "espidf"))]
    sim_subscriptions: Vec<Topic>,
}

impl MqttTransport {
    pub fn new(
        device_id: &str,
        network: &NetworkConfig,
        inbound: &'static InboundChannel,
    ) -> Self {
        let mut id = heapless::String::new();
        for c in device_id.chars() {
            if id.push(c).is_err() {
                warn!("MQTT: device id '{}' truncated", device_id);
                break;
            }
        }
        Self {
            status_topic: protocol::topic(&id, OutboundTopic::Status.suffix()),
            values_topic: protocol::topic(&id, OutboundTopic::Values.suffix()),
            error_topic: protocol::topic(&id, OutboundTopic::Error.suffix()),
            device_id: id,
            broker_url: network.broker_url(),
            reconnect_interval_ms: u64::from(network.mqtt_reconnect_interval_ms),
            last_attempt_ms: None,
            connected: false,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            link: Arc::new(LinkFlags::default()),
            inbound,
            #[cfg(not(target_os = "espidf"))]
            sim_broker_up: true,
            #[cfg(not(target_os = "espidf"))]
            sim_session: false,
            #[cfg(not(target_os = "espidf"))]
            sim_resubscribe: false,
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_subscriptions: Vec::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Drive the broker session. Returns `true` when the connected flag
    /// changed, so the caller can report connectivity.
    pub fn poll(&mut self, now_ms: u64, network_up: bool) -> bool {
        let was = self.connected;

        if network_up && !self.platform_session_open() {
            let due = self
                .last_attempt_ms
                .is_none_or(|t| now_ms.saturating_sub(t) >= self.reconnect_interval_ms);
            if due {
                self.last_attempt_ms = Some(now_ms);
                info!("MQTT: connecting to {}", self.broker_url);
                if let Err(e) = self.platform_open_session() {
                    warn!("MQTT: connect failed: {}", e);
                }
            }
        }

        self.connected = network_up && self.platform_link_up();
        if self.connected && self.platform_take_resubscribe() {
            self.subscribe_all();
        }
        if self.connected != was {
            info!("MQTT: {}", if self.connected { "connected" } else { "disconnected" });
        }
        self.connected != was
    }

    /// Next decoded command, if any message is waiting. Messages on foreign
    /// topics are skipped.
    pub fn next_command(&mut self) -> Option<Result<Command, CommandError>> {
        loop {
            let msg = self.platform_next_inbound()?;
            match parse_topic(&self.device_id, &msg.topic) {
                Ok(topic) => {
                    debug!("MQTT: {} bytes on {}", msg.payload.len(), msg.topic);
                    return Some(decode_command(topic, &msg.payload));
                }
                Err(_) => debug!("MQTT: ignoring message on {}", msg.topic),
            }
        }
    }

    fn subscribe_all(&mut self) {
        for inbound in InboundTopic::ALL {
            let topic = protocol::topic(&self.device_id, inbound.suffix());
            if let Err(e) = self.platform_subscribe(&topic) {
                warn!("MQTT: subscribe {} failed: {}", topic, e);
            }
        }
    }

    fn publish(&mut self, which: OutboundTopic, payload: &str) {
        if !self.connected {
            return;
        }
        let topic = match which {
            OutboundTopic::Status => self.status_topic.clone(),
            OutboundTopic::Values => self.values_topic.clone(),
            OutboundTopic::Error => self.error_topic.clone(),
        };
        if let Err(e) = self.platform_publish(&topic, payload, which.retained()) {
            warn!("MQTT: publish to {} failed: {}", topic, e);
        }
    }

    // ── Simulation controls ───────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_broker_up(&mut self, up: bool) {
        self.sim_broker_up = up;
        if !up {
            self.sim_session = false;
        }
    }

    /// Queue a message as if the broker delivered it. Returns `false` when
    /// the inbound channel dropped it.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&mut self, topic: &str, payload: &[u8]) -> bool {
        forward_inbound(self.inbound, topic, payload)
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_published(&self) -> &[Published] {
        &self.sim_published
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_clear_published(&mut self) {
        self.sim_published.clear();
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_subscriptions(&self) -> &[Topic] {
        &self.sim_subscriptions
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_session_open(&self) -> bool {
        self.client.is_some()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_session_open(&self) -> bool {
        self.sim_session
    }

    /// esp-mqtt reconnects on its own once the client exists.
    #[cfg(target_os = "espidf")]
    fn platform_open_session(&mut self) -> Result<(), esp_idf_svc::sys::EspError> {
        let config = MqttClientConfiguration {
            client_id: Some(self.device_id.as_str()),
            lwt: Some(LwtConfiguration {
                topic: self.status_topic.as_str(),
                payload: LWT_PAYLOAD,
                qos: QoS::AtLeastOnce,
                retain: true,
            }),
            ..Default::default()
        };
        let link = self.link.clone();
        let inbound = self.inbound;
        let client = EspMqttClient::new_cb(&self.broker_url, &config, move |event| {
            match event.payload() {
                EventPayload::Connected(_) => {
                    link.connected.store(true, Ordering::Release);
                    link.resubscribe.store(true, Ordering::Release);
                }
                EventPayload::Disconnected => {
                    link.connected.store(false, Ordering::Release);
                }
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    forward_inbound(inbound, topic, data);
                }
                _ => {}
            }
        })?;
        self.client = Some(client);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_open_session(&mut self) -> Result<(), &'static str> {
        if !self.sim_broker_up {
            return Err("broker unreachable");
        }
        debug!(
            "MQTT(sim): session open, last-will {} on {}",
            String::from_utf8_lossy(LWT_PAYLOAD),
            self.status_topic
        );
        self.sim_session = true;
        self.sim_resubscribe = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_link_up(&self) -> bool {
        self.link.connected.load(Ordering::Acquire)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_link_up(&self) -> bool {
        self.sim_session
    }

    #[cfg(target_os = "espidf")]
    fn platform_take_resubscribe(&mut self) -> bool {
        self.link.resubscribe.swap(false, Ordering::AcqRel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_take_resubscribe(&mut self) -> bool {
        core::mem::take(&mut self.sim_resubscribe)
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), esp_idf_svc::sys::EspError> {
        if let Some(client) = self.client.as_mut() {
            client.subscribe(topic, QoS::AtLeastOnce)?;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), &'static str> {
        let mut t = Topic::new();
        t.push_str(topic).map_err(|_| "topic too long")?;
        self.sim_subscriptions.retain(|s| s != &t);
        self.sim_subscriptions.push(t);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(
        &mut self,
        topic: &str,
        payload: &str,
        retain: bool,
    ) -> Result<(), esp_idf_svc::sys::EspError> {
        if let Some(client) = self.client.as_mut() {
            client.enqueue(topic, QoS::AtLeastOnce, retain, payload.as_bytes())?;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(
        &mut self,
        topic: &str,
        payload: &str,
        retain: bool,
    ) -> Result<(), &'static str> {
        let mut t = Topic::new();
        t.push_str(topic).map_err(|_| "topic too long")?;
        self.sim_published.push(Published {
            topic: t,
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_next_inbound(&mut self) -> Option<Inbound> {
        self.inbound.try_receive().ok()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_next_inbound(&mut self) -> Option<Inbound> {
        if !self.connected {
            return None;
        }
        self.inbound.try_receive().ok()
    }
}

// ───────────────────────────────────────────────────────────────
// EventSink
// ───────────────────────────────────────────────────────────────

impl EventSink for MqttTransport {
    fn emit(&mut self, event: &CoreEvent) {
        let (which, encoded) = match event {
            CoreEvent::Status(s) => (OutboundTopic::Status, protocol::encode_status(s)),
            CoreEvent::Values(v) => (OutboundTopic::Values, protocol::encode_values(v)),
            CoreEvent::Fault(e) if !e.is_informational() => {
                (OutboundTopic::Error, protocol::encode_error(e))
            }
            CoreEvent::Fault(_) | CoreEvent::StateChanged { .. } | CoreEvent::Started(_) => {
                return;
            }
        };
        match encoded {
            Ok(payload) => self.publish(which, &payload),
            Err(e) => warn!("MQTT: encode for {:?} failed: {}", which, e),
        }
    }
}
