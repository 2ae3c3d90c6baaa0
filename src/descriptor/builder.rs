use super::identify::{IdentifyData, IdentifyProtocol, IdentifySource};
use super::normalize::compose_usb_model;
use super::{DeviceDescriptor, DeviceType, FixedAscii, MODEL_NUM_LEN, WORLD_WIDE_NAME_LEN};
use crate::config::ScanConfig;
use crate::registry::PropertyBag;

pub const DEVICE_CHARACTERISTICS_KEY: &str = "Device Characteristics";
pub const VENDOR_NAME_KEY: &str = "Vendor Name";
pub const PRODUCT_NAME_KEY: &str = "Product Name";
pub const PRODUCT_REVISION_KEY: &str = "Product Revision Level";
pub const SERIAL_NUMBER_KEY: &str = "Serial Number";

pub const PROTOCOL_CHARACTERISTICS_KEY: &str = "Protocol Characteristics";
pub const PHYSICAL_INTERCONNECT_KEY: &str = "Physical Interconnect";
pub const PHYSICAL_INTERCONNECT_LOCATION_KEY: &str = "Physical Interconnect Location";

pub const MEDIA_SIZE_KEY: &str = "Size";

/// Driver property holding a previously serialized descriptor record.
pub const CACHED_DESCRIPTOR_KEY: &str = "IODtaDeviceInfo";

/// The up to three property bags collected for one candidate device.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertySources<'a> {
    pub device: Option<&'a PropertyBag>,
    pub media: Option<&'a PropertyBag>,
    pub driver: Option<&'a PropertyBag>,
}

impl<'a> PropertySources<'a> {
    pub fn new(
        device: Option<&'a PropertyBag>,
        media: Option<&'a PropertyBag>,
        driver: Option<&'a PropertyBag>,
    ) -> Self {
        Self {
            device,
            media,
            driver,
        }
    }

    /// Interconnect name reported under the device's protocol characteristics.
    pub fn interconnect(&self) -> Option<&'a str> {
        self.device?
            .get_nested_string(PROTOCOL_CHARACTERISTICS_KEY, PHYSICAL_INTERCONNECT_KEY)
    }
}

/// Map a physical-interconnect name to a transport.
///
/// Matching is exact. "PCI-Express" has its own arm even though it lands on
/// `Other` like any unknown name: NVMe controllers and other PCIe storage
/// both report it, so the transport is left for the identify fallback to
/// settle rather than guessed here.
pub fn classify_interconnect(interconnect: &str) -> DeviceType {
    match interconnect {
        "USB" => DeviceType::USB,
        "Apple Fabric" => DeviceType::NVMe,
        "SATA" => DeviceType::ATA,
        "PCI-Express" => DeviceType::Other,
        _ => DeviceType::Other,
    }
}

/// Merges property bags into one `DeviceDescriptor`.
///
/// Building never fails: anything missing or malformed leaves the
/// corresponding field at its default.
pub struct DescriptorBuilder<'a> {
    identify_fallback: bool,
    identify: Option<&'a dyn IdentifySource>,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new() -> Self {
        Self {
            identify_fallback: false,
            identify: None,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new().identify_fallback(config.identify_fallback)
    }

    pub fn identify_fallback(mut self, enabled: bool) -> Self {
        self.identify_fallback = enabled;
        self
    }

    pub fn with_identify(mut self, source: &'a dyn IdentifySource) -> Self {
        self.identify = Some(source);
        self
    }

    pub fn build(&self, sources: &PropertySources<'_>) -> DeviceDescriptor {
        // A cached record from the driver wins over everything else and is
        // replayed byte for byte
        if let Some(blob) = sources.driver.and_then(cached_record) {
            tracing::trace!(len = blob.len(), "Using cached descriptor record");
            return DeviceDescriptor::from_record(blob);
        }

        let mut descriptor = DeviceDescriptor::new();
        descriptor.dev_type = sources
            .interconnect()
            .map(classify_interconnect)
            .unwrap_or_default();

        if let Some(media) = sources.media {
            descriptor.dev_size = media_size(media);
        }

        if let Some(device) = sources.device {
            fill_identity(&mut descriptor, device);
            fill_interconnect(&mut descriptor, device);
        }

        if self.identify_fallback {
            if let Some(source) = self.identify {
                apply_identify(&mut descriptor, sources, source);
            }
        }

        if descriptor.dev_type == DeviceType::USB {
            normalize_usb_model(&mut descriptor);
        }

        descriptor
    }
}

impl Default for DescriptorBuilder<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn cached_record(driver: &PropertyBag) -> Option<&[u8]> {
    driver
        .get_bytes(CACHED_DESCRIPTOR_KEY)
        .filter(|blob| !blob.is_empty())
}

fn media_size(media: &PropertyBag) -> u64 {
    let Some(size) = media.get_number(MEDIA_SIZE_KEY) else {
        return 0;
    };
    size.as_byte_count().unwrap_or_else(|| {
        tracing::debug!(encoding = size.type_name(), "Unsupported media size encoding");
        0
    })
}

fn ascii_field<const N: usize>(bag: &PropertyBag, key: &str) -> Option<FixedAscii<N>> {
    let value = bag.get_string(key)?;
    let field = FixedAscii::from_str_truncated(value);
    if field.is_none() {
        tracing::debug!(key, "Ignoring non-ASCII property value");
    }
    field
}

fn fill_identity(descriptor: &mut DeviceDescriptor, device: &PropertyBag) {
    let Some(characteristics) = device.get_map(DEVICE_CHARACTERISTICS_KEY) else {
        return;
    };

    if let Some(vendor) = ascii_field(characteristics, VENDOR_NAME_KEY) {
        descriptor.vendor_name = vendor;
    }
    if let Some(model) = ascii_field(characteristics, PRODUCT_NAME_KEY) {
        descriptor.model_num = model;
    }
    if let Some(firmware) = ascii_field(characteristics, PRODUCT_REVISION_KEY) {
        descriptor.firmware_rev = firmware;
    }
    if let Some(serial) = ascii_field(characteristics, SERIAL_NUMBER_KEY) {
        descriptor.serial_num = serial;
    }
}

fn fill_interconnect(descriptor: &mut DeviceDescriptor, device: &PropertyBag) {
    let Some(protocol) = device.get_map(PROTOCOL_CHARACTERISTICS_KEY) else {
        return;
    };

    if let Some(interconnect) = ascii_field(protocol, PHYSICAL_INTERCONNECT_KEY) {
        descriptor.physical_interconnect = interconnect;
    }
    if let Some(location) = ascii_field(protocol, PHYSICAL_INTERCONNECT_LOCATION_KEY) {
        descriptor.physical_interconnect_location = location;
    }
}

fn apply_identify(
    descriptor: &mut DeviceDescriptor,
    sources: &PropertySources<'_>,
    source: &dyn IdentifySource,
) {
    for protocol in [IdentifyProtocol::AtaSmart, IdentifyProtocol::NvmeSmart] {
        let advertised = [sources.device, sources.driver]
            .into_iter()
            .flatten()
            .any(|bag| protocol.is_advertised_by(bag));
        if !advertised {
            continue;
        }

        match source.identify(protocol, 0) {
            Ok(data) => {
                copy_identify(descriptor, &data);
                if descriptor.dev_type == DeviceType::Other {
                    descriptor.dev_type = protocol.implied_type();
                }
            }
            Err(e) => {
                tracing::debug!(?protocol, error = %e, "Identify query failed; keeping property data");
            }
        }
    }
}

fn copy_identify(descriptor: &mut DeviceDescriptor, data: &IdentifyData) {
    descriptor.serial_num = FixedAscii::from_bytes_truncated(&data.serial_number);
    descriptor.firmware_rev = FixedAscii::from_bytes_truncated(&data.firmware_revision);
    descriptor.model_num = FixedAscii::from_bytes_truncated(&data.model_number);

    let mut wwn = [0u8; WORLD_WIDE_NAME_LEN];
    let len = data.world_wide_name.len().min(WORLD_WIDE_NAME_LEN);
    wwn[..len].copy_from_slice(&data.world_wide_name[..len]);
    descriptor.world_wide_name = wwn;
}

fn normalize_usb_model(descriptor: &mut DeviceDescriptor) {
    let composed = compose_usb_model(
        descriptor.vendor_name.as_str(),
        descriptor.model_num.as_str(),
        MODEL_NUM_LEN,
    );
    if composed.is_empty() {
        return;
    }
    if let Some(model) = FixedAscii::from_str_truncated(&composed) {
        descriptor.model_num = model;
    }
}
