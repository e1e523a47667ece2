//! Command class catalog: frame schemas, class-level state and the
//! interview/dispatch registry.
//!
//! Each sub-module covers one command class: its frame structs (wire
//! schemas in declared attribute order) and, for classes a node can
//! support, its [`ClassSpec`] entry providing per-class state, interview
//! steps and report handling.

pub mod application_status;
pub mod association;
pub mod association_grp_info;
pub mod basic;
pub mod battery;
pub mod configuration;
pub mod indicator;
pub mod mailbox;
pub mod manufacturer_specific;
pub mod meter;
pub mod multi_channel;
pub mod network_management_inclusion;
pub mod network_management_proxy;
pub mod node_provisioning;
pub mod sensor_multilevel;
pub mod supervision;
pub mod switch_binary;
pub mod version;
pub mod zip;
pub mod zip_gateway;
pub mod zip_nd;
pub mod zwave_plus_info;

use crate::command::Command;
use crate::error::Error;
use crate::node::Node;
use crate::BoxFuture;
use core::fmt;

pub const COMMAND_CLASS_BASIC: u8 = 0x20;
pub const COMMAND_CLASS_APPLICATION_STATUS: u8 = 0x22;
pub const COMMAND_CLASS_ZIP: u8 = 0x23;
pub const COMMAND_CLASS_SWITCH_BINARY: u8 = 0x25;
pub const COMMAND_CLASS_SENSOR_MULTILEVEL: u8 = 0x31;
pub const COMMAND_CLASS_METER: u8 = 0x32;
pub const COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION: u8 = 0x34;
pub const COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY: u8 = 0x52;
pub const COMMAND_CLASS_ZIP_ND: u8 = 0x58;
pub const COMMAND_CLASS_ASSOCIATION_GRP_INFO: u8 = 0x59;
pub const COMMAND_CLASS_ZWAVEPLUS_INFO: u8 = 0x5e;
pub const COMMAND_CLASS_ZIP_GATEWAY: u8 = 0x5f;
pub const COMMAND_CLASS_MULTI_CHANNEL_V2: u8 = 0x60;
pub const COMMAND_CLASS_SUPERVISION: u8 = 0x6c;
pub const COMMAND_CLASS_MAILBOX: u8 = 0x69;
pub const COMMAND_CLASS_CONFIGURATION: u8 = 0x70;
pub const COMMAND_CLASS_MANUFACTURER_SPECIFIC: u8 = 0x72;
pub const COMMAND_CLASS_NODE_PROVISIONING: u8 = 0x78;
pub const COMMAND_CLASS_BATTERY: u8 = 0x80;
pub const COMMAND_CLASS_ASSOCIATION: u8 = 0x85;
pub const COMMAND_CLASS_VERSION: u8 = 0x86;
pub const COMMAND_CLASS_INDICATOR: u8 = 0x87;

/// NIF marker: classes after this byte are controlled, not supported.
pub(crate) const MARK_SUPPORT_CONTROL: u8 = 0xef;

/// NIF marker pair: classes after `0xf1 0x00` require Security Scheme 0.
pub(crate) const MARK_SECURITY_SCHEME_0: [u8; 2] = [0xf1, 0x00];

/// Generate a u8-backed wire enum with an `Unknown` catch-all that
/// formats as `UNKNOWN(hex)`.
macro_rules! zw_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        $vis enum $name {
            $($(#[$vmeta])* $variant,)+
            /// A value the Z-Wave specification does not name.
            Unknown(u8),
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                match value {
                    $($value => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> Self {
                match value {
                    $($name::$variant => $value,)+
                    $name::Unknown(other) => other,
                }
            }
        }

        impl ::zipcrab_wire::ZipWireWrite for $name {
            fn serialize(
                &self,
                writer: &mut ::zipcrab_wire::BitWriter,
            ) -> Result<(), ::zipcrab_wire::WireError> {
                ::zipcrab_wire::ZipWireWrite::serialize(&u8::from(*self), writer)
            }
        }

        impl ::zipcrab_wire::ZipWireRead for $name {
            fn deserialize(
                reader: &mut ::zipcrab_wire::BitReader<'_>,
            ) -> Result<Self, ::zipcrab_wire::WireError> {
                <u8 as ::zipcrab_wire::ZipWireRead>::deserialize(reader).map(Self::from)
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $($name::$variant => f.write_str(stringify!($variant)),)+
                    $name::Unknown(value) => write!(f, "UNKNOWN(0x{:02X})", value),
                }
            }
        }
    };
}

pub(crate) use zw_enum;

/// Typed attribute storage for one command class instance. The variant is
/// fixed by the class id at load time; classes with nothing worth keeping
/// between reports use [`ClassState::None`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "class")
)]
#[non_exhaustive]
pub enum ClassState {
    Basic(basic::BasicState),
    Battery(battery::BatteryState),
    Configuration(configuration::ConfigurationState),
    Association(association::AssociationState),
    AssociationGrpInfo(association_grp_info::AssociationGrpInfoState),
    Indicator(indicator::IndicatorState),
    ManufacturerSpecific(manufacturer_specific::ManufacturerSpecificState),
    Meter(meter::MeterState),
    SensorMultilevel(sensor_multilevel::SensorMultilevelState),
    SwitchBinary(switch_binary::SwitchBinaryState),
    Version(version::VersionState),
    ZwavePlusInfo(zwave_plus_info::ZwavePlusInfoState),
    /// A class with no typed attributes (including unregistered classes).
    None,
}

/// Registry entry for a command class a node can support.
pub(crate) struct ClassSpec {
    pub id: u8,
    pub name: &'static str,
    pub new_state: fn() -> ClassState,
    /// Class-specific interview steps. Version probing, timeout
    /// containment and `interviewed` bookkeeping are handled by the
    /// caller in [`Node`].
    pub interview: for<'a> fn(&'a Node, u8) -> BoxFuture<'a, Result<(), Error>>,
    /// Per-type message handler; returns whether the message was consumed.
    pub handle: fn(&mut CommandClass, &Command) -> bool,
}

pub(crate) static REGISTRY: &[&ClassSpec] = &[
    &association::SPEC,
    &association_grp_info::SPEC,
    &basic::SPEC,
    &battery::SPEC,
    &configuration::SPEC,
    &indicator::SPEC,
    &manufacturer_specific::SPEC,
    &meter::SPEC,
    &sensor_multilevel::SPEC,
    &switch_binary::SPEC,
    &version::SPEC,
    &zwave_plus_info::SPEC,
];

pub(crate) fn class_spec(id: u8) -> Option<&'static ClassSpec> {
    REGISTRY.iter().find(|spec| spec.id == id).copied()
}

/// The specification name of a command class id, if this stack knows it.
pub fn class_name(id: u8) -> Option<&'static str> {
    match id {
        COMMAND_CLASS_BASIC => Some("COMMAND_CLASS_BASIC"),
        COMMAND_CLASS_APPLICATION_STATUS => Some("COMMAND_CLASS_APPLICATION_STATUS"),
        COMMAND_CLASS_ZIP => Some("COMMAND_CLASS_ZIP"),
        COMMAND_CLASS_SWITCH_BINARY => Some("COMMAND_CLASS_SWITCH_BINARY"),
        COMMAND_CLASS_SENSOR_MULTILEVEL => Some("COMMAND_CLASS_SENSOR_MULTILEVEL"),
        COMMAND_CLASS_METER => Some("COMMAND_CLASS_METER"),
        COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION => {
            Some("COMMAND_CLASS_NETWORK_MANAGEMENT_INCLUSION")
        }
        COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY => Some("COMMAND_CLASS_NETWORK_MANAGEMENT_PROXY"),
        COMMAND_CLASS_ZIP_ND => Some("COMMAND_CLASS_ZIP_ND"),
        COMMAND_CLASS_ASSOCIATION_GRP_INFO => Some("COMMAND_CLASS_ASSOCIATION_GRP_INFO"),
        COMMAND_CLASS_ZWAVEPLUS_INFO => Some("COMMAND_CLASS_ZWAVEPLUS_INFO"),
        COMMAND_CLASS_ZIP_GATEWAY => Some("COMMAND_CLASS_ZIP_GATEWAY"),
        COMMAND_CLASS_MULTI_CHANNEL_V2 => Some("COMMAND_CLASS_MULTI_CHANNEL_V2"),
        COMMAND_CLASS_SUPERVISION => Some("COMMAND_CLASS_SUPERVISION"),
        COMMAND_CLASS_MAILBOX => Some("COMMAND_CLASS_MAILBOX"),
        COMMAND_CLASS_CONFIGURATION => Some("COMMAND_CLASS_CONFIGURATION"),
        COMMAND_CLASS_MANUFACTURER_SPECIFIC => Some("COMMAND_CLASS_MANUFACTURER_SPECIFIC"),
        COMMAND_CLASS_NODE_PROVISIONING => Some("COMMAND_CLASS_NODE_PROVISIONING"),
        COMMAND_CLASS_BATTERY => Some("COMMAND_CLASS_BATTERY"),
        COMMAND_CLASS_ASSOCIATION => Some("COMMAND_CLASS_ASSOCIATION"),
        COMMAND_CLASS_VERSION => Some("COMMAND_CLASS_VERSION"),
        COMMAND_CLASS_INDICATOR => Some("COMMAND_CLASS_INDICATOR"),
        _ => None,
    }
}

/// One command class instance, owned by its node.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandClass {
    id: u8,
    security_s0: bool,
    version: u8,
    interviewed: bool,
    state: ClassState,
}

impl CommandClass {
    /// Build an instance for `id`, registered or not.
    pub(crate) fn load(id: u8, security_s0: bool) -> Self {
        let state = class_spec(id)
            .map(|spec| (spec.new_state)())
            .unwrap_or(ClassState::None);

        Self {
            id,
            security_s0,
            version: 0,
            interviewed: false,
            state,
        }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Reported class version; 0 until the version interview ran.
    pub fn version(&self) -> u8 {
        self.version
    }

    pub(crate) fn set_version(&mut self, version: u8) {
        self.version = version;
    }

    pub fn interviewed(&self) -> bool {
        self.interviewed
    }

    pub(crate) fn set_interviewed(&mut self, interviewed: bool) {
        self.interviewed = interviewed;
    }

    /// Whether Security Scheme 0 is required to access this class.
    pub fn security_s0(&self) -> bool {
        self.security_s0
    }

    pub fn state(&self) -> &ClassState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut ClassState {
        &mut self.state
    }

    /// Dispatch a message to this class's registered handler.
    pub(crate) fn handle_message(&mut self, message: &Command) -> bool {
        match class_spec(self.id) {
            Some(spec) => (spec.handle)(self, message),
            None => false,
        }
    }
}

impl fmt::Display for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match class_name(self.id) {
            Some(name) => f.write_str(name),
            None => write!(f, "COMMAND_CLASS_UNKNOWN(0x{:02X})", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_unknown_class() {
        let cc = CommandClass::load(0xee, false);

        assert_eq!(cc.id(), 0xee);
        assert_eq!(cc.version(), 0);
        assert!(!cc.interviewed());
        assert_eq!(*cc.state(), ClassState::None);
        assert_eq!(cc.to_string(), "COMMAND_CLASS_UNKNOWN(0xEE)");
    }

    #[test]
    fn load_registered_class() {
        let cc = CommandClass::load(COMMAND_CLASS_BATTERY, true);

        assert!(cc.security_s0());
        assert!(matches!(cc.state(), ClassState::Battery(_)));
        assert_eq!(cc.to_string(), "COMMAND_CLASS_BATTERY");
    }

    #[test]
    fn registry_ids_are_consistent() {
        for spec in REGISTRY {
            assert_eq!(class_name(spec.id), Some(spec.name));
        }
    }
}
