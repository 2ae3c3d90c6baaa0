/// Identify fallback contract
///
/// When the device advertises SMART (ATA) or NVMe SMART capability the
/// builder may ask an external identify collaborator for the controller's
/// identity strings. Any failure is treated as "no data available".
use super::DeviceType;
use crate::registry::value::{ascii_bytes, hex_bytes};
use crate::registry::PropertyBag;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Device property listing the plug-in user clients a device offers.
pub const PLUGIN_TYPES_KEY: &str = "IOCFPlugInTypes";

const ATA_SMART_USER_CLIENT: Uuid = Uuid::from_u128(0x24514B7A_2804_11D6_8A02_003065704866);
const NVME_SMART_USER_CLIENT: Uuid = Uuid::from_u128(0xAA0FA6F9_C2D6_457F_B10B_59A13253292F);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifyProtocol {
    AtaSmart,
    NvmeSmart,
}

impl IdentifyProtocol {
    /// Boolean device property advertising this protocol.
    pub fn capability_key(self) -> &'static str {
        match self {
            IdentifyProtocol::AtaSmart => "SMART Capable",
            IdentifyProtocol::NvmeSmart => "NVMe SMART Capable",
        }
    }

    pub fn user_client_type(self) -> Uuid {
        match self {
            IdentifyProtocol::AtaSmart => ATA_SMART_USER_CLIENT,
            IdentifyProtocol::NvmeSmart => NVME_SMART_USER_CLIENT,
        }
    }

    /// Transport implied by a successful identify over this protocol.
    pub fn implied_type(self) -> DeviceType {
        match self {
            IdentifyProtocol::AtaSmart => DeviceType::ATA,
            IdentifyProtocol::NvmeSmart => DeviceType::NVMe,
        }
    }

    /// Whether the device property bag advertises this protocol: the
    /// capability flag must be true and the plug-in table must list the
    /// matching user client.
    pub fn is_advertised_by(self, device: &PropertyBag) -> bool {
        if device.get_bool(self.capability_key()) != Some(true) {
            return false;
        }

        let Some(plugin_types) = device.get_map(PLUGIN_TYPES_KEY) else {
            return false;
        };

        let wanted = self.user_client_type();
        plugin_types
            .keys()
            .filter_map(|key| Uuid::parse_str(key).ok())
            .any(|id| id == wanted)
    }
}

/// Identity fields returned by an identify query. Byte fields are copied
/// verbatim, up to each descriptor field's capacity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyData {
    #[serde(with = "ascii_bytes")]
    pub serial_number: Vec<u8>,
    #[serde(with = "ascii_bytes")]
    pub firmware_revision: Vec<u8>,
    #[serde(with = "ascii_bytes")]
    pub model_number: Vec<u8>,
    #[serde(with = "hex_bytes", default)]
    pub world_wide_name: Vec<u8>,
}

impl IdentifyData {
    pub fn new(serial: &str, firmware: &str, model: &str, world_wide_name: &[u8]) -> Self {
        Self {
            serial_number: serial.as_bytes().to_vec(),
            firmware_revision: firmware.as_bytes().to_vec(),
            model_number: model.as_bytes().to_vec(),
            world_wide_name: world_wide_name.to_vec(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentifyError {
    #[error("Identify not supported: {0}")]
    Unsupported(String),

    #[error("Identify user client unavailable: {0}")]
    UserClientUnavailable(String),

    #[error("Identify command failed: {0}")]
    CommandFailed(String),
}

/// External identify collaborator, addressed by registry handle.
pub trait IdentifyQuery<H> {
    fn query_identify(
        &self,
        handle: &H,
        protocol: IdentifyProtocol,
        namespace: u32,
    ) -> Result<IdentifyData, IdentifyError>;
}

/// Identify collaborator already bound to one device.
pub trait IdentifySource {
    fn identify(
        &self,
        protocol: IdentifyProtocol,
        namespace: u32,
    ) -> Result<IdentifyData, IdentifyError>;
}

/// Binds an `IdentifyQuery` to the handle of the candidate being built.
pub struct BoundIdentify<'a, H> {
    query: &'a dyn IdentifyQuery<H>,
    handle: &'a H,
}

impl<'a, H> BoundIdentify<'a, H> {
    pub fn new(query: &'a dyn IdentifyQuery<H>, handle: &'a H) -> Self {
        Self { query, handle }
    }
}

impl<H> IdentifySource for BoundIdentify<'_, H> {
    fn identify(
        &self,
        protocol: IdentifyProtocol,
        namespace: u32,
    ) -> Result<IdentifyData, IdentifyError> {
        self.query.query_identify(self.handle, protocol, namespace)
    }
}
