// Canonical device descriptor and the rules that build it
//
// Organized structure:
// - fixed_ascii.rs: bounded ASCII fields and the truncation rule
// - record.rs: persisted binary layout (cached-blob fast path)
// - builder.rs: property-bag merge, transport classification
// - normalize.rs: USB model-name composition
// - identify.rs: optional identify fallback contract

pub mod builder;
pub mod fixed_ascii;
pub mod identify;
pub mod normalize;
pub mod record;


pub use builder::{classify_interconnect, DescriptorBuilder, PropertySources};
pub use fixed_ascii::{truncate_ascii, FixedAscii};
pub use identify::{
    BoundIdentify, IdentifyData, IdentifyError, IdentifyProtocol, IdentifyQuery, IdentifySource,
};
pub use normalize::compose_usb_model;
pub use record::DESCRIPTOR_RECORD_LEN;

use serde::{Deserialize, Serialize};

pub const VENDOR_NAME_LEN: usize = 8;
pub const MODEL_NUM_LEN: usize = 40;
pub const FIRMWARE_REV_LEN: usize = 8;
pub const SERIAL_NUM_LEN: usize = 20;
pub const INTERCONNECT_LEN: usize = 8;
pub const INTERCONNECT_LOCATION_LEN: usize = 8;
pub const WORLD_WIDE_NAME_LEN: usize = 8;

/// Transport of a block-storage device.
///
/// The discriminants are the tags of the persisted record; tag 1 (SAS) is
/// reserved and reads as `Other`, though a replayed record keeps the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum DeviceType {
    ATA = 0,
    NVMe = 2,
    USB = 3,
    #[default]
    Other = 4,
}

impl DeviceType {
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Unknown tags fall back to `Other` so a descriptor is never unset.
    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0 => DeviceType::ATA,
            2 => DeviceType::NVMe,
            3 => DeviceType::USB,
            _ => DeviceType::Other,
        }
    }
}

/// SED capability and locking state, passed through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SedFlags {
    pub opal10: bool,
    pub opal20: bool,
    pub enterprise: bool,
    pub any_opal_ssc: bool,
    pub locking_mbr_enabled: bool,
    pub locking_mbr_done: bool,
    pub locking_locked: bool,
    pub locking_enabled: bool,
}

/// One device's canonical identity record.
///
/// Equality and hashing follow the persisted record, so a replayed
/// descriptor equals any descriptor that serializes to the same bytes.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DeviceDescriptor {
    pub dev_type: DeviceType,
    pub dev_size: u64,
    pub vendor_name: FixedAscii<VENDOR_NAME_LEN>,
    pub model_num: FixedAscii<MODEL_NUM_LEN>,
    pub firmware_rev: FixedAscii<FIRMWARE_REV_LEN>,
    pub serial_num: FixedAscii<SERIAL_NUM_LEN>,
    pub physical_interconnect: FixedAscii<INTERCONNECT_LEN>,
    pub physical_interconnect_location: FixedAscii<INTERCONNECT_LOCATION_LEN>,
    pub sed: SedFlags,
    #[serde(serialize_with = "serialize_wwn")]
    pub world_wide_name: [u8; WORLD_WIDE_NAME_LEN],
    /// Driver-cached record this descriptor was read from.
    #[serde(skip)]
    pub(crate) replayed: Option<[u8; DESCRIPTOR_RECORD_LEN]>,
}

fn serialize_wwn<S: serde::Serializer>(
    wwn: &[u8; WORLD_WIDE_NAME_LEN],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(wwn))
}

impl DeviceDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached record this descriptor was replayed from, if any.
    pub fn replayed_record(&self) -> Option<&[u8; DESCRIPTOR_RECORD_LEN]> {
        self.replayed.as_ref()
    }
}
