use crate::descriptor::{DeviceDescriptor, DeviceType};
use crate::registry::memory::bounded_name;
use crate::registry::PropertyBag;
use serde::Serialize;

/// Longest device path handed to the security-session layer.
pub const MAX_DEV_NAME_LEN: usize = 25;

/// Whether a vendor security-subsystem (TPer) driver sits above the device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceKind {
    Generic,
    /// Keeps the driver's property bag for the session layer.
    SecurityCapable { tper_properties: PropertyBag },
}

impl DeviceKind {
    pub fn is_security_capable(&self) -> bool {
        matches!(self, DeviceKind::SecurityCapable { .. })
    }
}

/// A discovered block-storage device and its descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStorageDevice {
    descriptor: DeviceDescriptor,
    reference_name: String,
    display_name: String,
    kind: DeviceKind,
    device_properties: PropertyBag,
    media_properties: PropertyBag,
}

impl BlockStorageDevice {
    /// The variant follows from whether driver properties were captured.
    pub fn new(
        descriptor: DeviceDescriptor,
        reference_name: String,
        display_name: String,
        device_properties: PropertyBag,
        media_properties: PropertyBag,
        tper_properties: Option<PropertyBag>,
    ) -> Self {
        let kind = match tper_properties {
            Some(tper_properties) => DeviceKind::SecurityCapable { tper_properties },
            None => DeviceKind::Generic,
        };
        Self {
            descriptor,
            reference_name,
            display_name,
            kind,
            device_properties,
            media_properties,
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Stable reference name (the BSD name of the media, e.g. `disk2`).
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    /// Registry entry name of the media object.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn kind(&self) -> &DeviceKind {
        &self.kind
    }

    pub fn device_properties(&self) -> &PropertyBag {
        &self.device_properties
    }

    pub fn media_properties(&self) -> &PropertyBag {
        &self.media_properties
    }

    pub fn tper_properties(&self) -> Option<&PropertyBag> {
        match &self.kind {
            DeviceKind::SecurityCapable { tper_properties } => Some(tper_properties),
            DeviceKind::Generic => None,
        }
    }

    /// `/dev/` path of the device, cut to 25 bytes on a char boundary.
    pub fn dev_name(&self) -> String {
        let path = format!("/dev/{}", self.reference_name);
        bounded_name(&path, MAX_DEV_NAME_LEN).to_string()
    }

    pub fn dev_type(&self) -> DeviceType {
        self.descriptor.dev_type
    }

    pub fn size(&self) -> u64 {
        self.descriptor.dev_size
    }

    pub fn vendor_name(&self) -> &str {
        self.descriptor.vendor_name.as_str()
    }

    pub fn model_num(&self) -> &str {
        self.descriptor.model_num.as_str()
    }

    pub fn firmware_rev(&self) -> &str {
        self.descriptor.firmware_rev.as_str()
    }

    pub fn serial_num(&self) -> &str {
        self.descriptor.serial_num.as_str()
    }

    pub fn physical_interconnect(&self) -> &str {
        self.descriptor.physical_interconnect.as_str()
    }

    pub fn physical_interconnect_location(&self) -> &str {
        self.descriptor.physical_interconnect_location.as_str()
    }

    pub fn is_opal1(&self) -> bool {
        self.descriptor.sed.opal10
    }

    pub fn is_opal2(&self) -> bool {
        self.descriptor.sed.opal20
    }

    pub fn is_enterprise(&self) -> bool {
        self.descriptor.sed.enterprise
    }

    pub fn is_any_ssc(&self) -> bool {
        self.descriptor.sed.any_opal_ssc
    }

    pub fn mbr_enabled(&self) -> bool {
        self.descriptor.sed.locking_mbr_enabled
    }

    pub fn mbr_done(&self) -> bool {
        self.descriptor.sed.locking_mbr_done
    }

    pub fn locked(&self) -> bool {
        self.descriptor.sed.locking_locked
    }

    pub fn locking_enabled(&self) -> bool {
        self.descriptor.sed.locking_enabled
    }

    pub fn summary(&self) -> DeviceSummary<'_> {
        DeviceSummary {
            reference_name: &self.reference_name,
            dev_name: self.dev_name(),
            display_name: &self.display_name,
            security_capable: self.kind.is_security_capable(),
            descriptor: &self.descriptor,
        }
    }
}

/// Serializable view used by the CLI's JSON output.
#[derive(Debug, Serialize)]
pub struct DeviceSummary<'a> {
    pub reference_name: &'a str,
    pub dev_name: String,
    pub display_name: &'a str,
    pub security_capable: bool,
    pub descriptor: &'a DeviceDescriptor,
}
