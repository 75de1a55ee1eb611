//! GATT layout of the simulated peripherals.
//!
//! Static tables describing which services and characteristics each
//! [`DeviceIdentity`] exposes. [`profile::GattProfile`] walks these tables
//! against the stack port; [`encoder`] produces the characteristic payloads.

pub mod encoder;
pub mod profile;

use crate::model::DeviceIdentity;

// ── Assigned numbers ──────────────────────────────────────────

pub const HEART_RATE_SERVICE_UUID: u16 = 0x180D;
pub const HEART_RATE_MEASUREMENT_UUID: u16 = 0x2A37;
pub const BODY_SENSOR_LOCATION_UUID: u16 = 0x2A38;

pub const BATTERY_SERVICE_UUID: u16 = 0x180F;
pub const BATTERY_LEVEL_UUID: u16 = 0x2A19;

pub const FITNESS_MACHINE_SERVICE_UUID: u16 = 0x1826;
pub const FITNESS_MACHINE_FEATURE_UUID: u16 = 0x2ACC;
pub const TREADMILL_DATA_UUID: u16 = 0x2ACD;

/// Body Sensor Location: chest.
pub const BODY_SENSOR_LOCATION_CHEST: [u8; 1] = [0x01];

/// Fitness Machine Feature: u32 LE machine features, u32 LE target settings.
pub const FITNESS_MACHINE_FEATURES: [u8; 8] = [0x0B, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

// ── Characteristic description ────────────────────────────────

/// Access properties requested from the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharProps {
    pub read: bool,
    pub notify: bool,
}

impl CharProps {
    pub const READ: Self = Self {
        read: true,
        notify: false,
    };
    pub const NOTIFY: Self = Self {
        read: false,
        notify: true,
    };
    pub const READ_NOTIFY: Self = Self {
        read: true,
        notify: true,
    };
}

/// Characteristics the core addresses by role rather than by handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharRole {
    HeartRateMeasurement,
    BodySensorLocation,
    BatteryLevel,
    FitnessMachineFeature,
    TreadmillData,
}

/// Value installed on a characteristic when the profile is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialValue {
    Empty,
    Static(&'static [u8]),
    /// Current battery level from the value model.
    Battery,
}

#[derive(Debug)]
pub struct CharacteristicLayout {
    pub role: CharRole,
    pub uuid: u16,
    pub props: CharProps,
    pub initial: InitialValue,
}

#[derive(Debug)]
pub struct ServiceLayout {
    pub uuid: u16,
    pub characteristics: &'static [CharacteristicLayout],
}

/// Everything needed to stand up one identity on the radio.
#[derive(Debug)]
pub struct ProfileLayout {
    pub identity: DeviceIdentity,
    pub device_name: &'static str,
    pub services: &'static [ServiceLayout],
    /// Service UUIDs placed in the advertising payload.
    pub advertised: &'static [u16],
}

// ── Tables ────────────────────────────────────────────────────

static HEART_RATE_SERVICES: [ServiceLayout; 2] = [
    ServiceLayout {
        uuid: HEART_RATE_SERVICE_UUID,
        characteristics: &[
            CharacteristicLayout {
                role: CharRole::HeartRateMeasurement,
                uuid: HEART_RATE_MEASUREMENT_UUID,
                props: CharProps::NOTIFY,
                initial: InitialValue::Empty,
            },
            CharacteristicLayout {
                role: CharRole::BodySensorLocation,
                uuid: BODY_SENSOR_LOCATION_UUID,
                props: CharProps::READ,
                initial: InitialValue::Static(&BODY_SENSOR_LOCATION_CHEST),
            },
        ],
    },
    ServiceLayout {
        uuid: BATTERY_SERVICE_UUID,
        characteristics: &[CharacteristicLayout {
            role: CharRole::BatteryLevel,
            uuid: BATTERY_LEVEL_UUID,
            props: CharProps::READ_NOTIFY,
            initial: InitialValue::Battery,
        }],
    },
];

static TREADMILL_SERVICES: [ServiceLayout; 1] = [ServiceLayout {
    uuid: FITNESS_MACHINE_SERVICE_UUID,
    characteristics: &[
        CharacteristicLayout {
            role: CharRole::FitnessMachineFeature,
            uuid: FITNESS_MACHINE_FEATURE_UUID,
            props: CharProps::READ,
            initial: InitialValue::Static(&FITNESS_MACHINE_FEATURES),
        },
        CharacteristicLayout {
            role: CharRole::TreadmillData,
            uuid: TREADMILL_DATA_UUID,
            props: CharProps::NOTIFY,
            initial: InitialValue::Empty,
        },
    ],
}];

static HEART_RATE_PROFILE: ProfileLayout = ProfileLayout {
    identity: DeviceIdentity::HeartRate,
    device_name: "HR Simulator",
    services: &HEART_RATE_SERVICES,
    advertised: &[HEART_RATE_SERVICE_UUID, BATTERY_SERVICE_UUID],
};

static TREADMILL_PROFILE: ProfileLayout = ProfileLayout {
    identity: DeviceIdentity::Treadmill,
    device_name: "Treadmill Sim",
    services: &TREADMILL_SERVICES,
    advertised: &[FITNESS_MACHINE_SERVICE_UUID],
};

/// Look up the GATT layout for an identity. `None` has no profile.
pub fn profile_for(identity: DeviceIdentity) -> Option<&'static ProfileLayout> {
    match identity {
        DeviceIdentity::None => None,
        DeviceIdentity::HeartRate => Some(&HEART_RATE_PROFILE),
        DeviceIdentity::Treadmill => Some(&TREADMILL_PROFILE),
    }
}
