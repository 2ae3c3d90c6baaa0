use crate::config::ScanConfig;
use crate::descriptor::builder::{PHYSICAL_INTERCONNECT_LOCATION_KEY, PROTOCOL_CHARACTERISTICS_KEY};
use crate::descriptor::{BoundIdentify, DescriptorBuilder, IdentifyQuery, PropertySources};
use crate::device::BlockStorageDevice;
use crate::registry::memory::bounded_name;
use crate::registry::{HandleGuard, Registry};
use crate::DiscoveryResult;
use std::cmp::Ordering;

/// Interconnect location reported by disk-image and other virtual devices.
pub const FILE_LOCATION: &str = "File";

/// Media property holding the stable reference name.
pub const BSD_NAME_KEY: &str = "BSD Name";

/// Order reference names shortest first, then lexicographically.
///
/// `sda` sorts before `disk2`, which sorts before `nvme0n1`.
pub fn compare_reference_names(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Walks the registry and turns each qualifying device into a
/// `BlockStorageDevice`.
pub struct DeviceEnumerator<'r, R: Registry> {
    registry: &'r R,
    config: ScanConfig,
    identify: Option<&'r dyn IdentifyQuery<R::Handle>>,
}

impl<'r, R: Registry> DeviceEnumerator<'r, R> {
    pub fn new(registry: &'r R, config: ScanConfig) -> Self {
        Self {
            registry,
            config,
            identify: None,
        }
    }

    /// Attach the identify collaborator used when the fallback is enabled.
    pub fn with_identify(mut self, identify: &'r dyn IdentifyQuery<R::Handle>) -> Self {
        self.identify = Some(identify);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Start a traversal over candidate devices, for use with `lookup_in`.
    pub fn candidates(&self) -> DiscoveryResult<R::Iter> {
        self.registry.iterate_matching(&self.config.device_class)
    }

    /// Enumerate every qualifying device, ordered by reference name.
    ///
    /// A traversal fault aborts the whole call.
    pub fn enumerate(&self) -> DiscoveryResult<Vec<BlockStorageDevice>> {
        let mut devices = Vec::new();

        for candidate in self.candidates()? {
            let handle = match candidate {
                Ok(handle) => HandleGuard::new(self.registry, handle),
                Err(e) => {
                    tracing::error!(error = %e, "Device traversal failed");
                    return Err(e);
                }
            };

            if let Some(device) = self.examine(&handle, None) {
                devices.push(device);
            }
        }

        devices.sort_by(|a, b| compare_reference_names(a.reference_name(), b.reference_name()));
        tracing::debug!(count = devices.len(), "Enumeration complete");
        Ok(devices)
    }

    /// Find the device whose reference name equals `target`.
    pub fn lookup(&self, target: &str) -> DiscoveryResult<Option<BlockStorageDevice>> {
        let mut candidates = self.candidates()?;
        self.lookup_in(&mut candidates, target)
    }

    /// Continue a traversal until `target` is found. Candidates after the
    /// match stay in `candidates` for the caller.
    pub fn lookup_in<I>(
        &self,
        candidates: &mut I,
        target: &str,
    ) -> DiscoveryResult<Option<BlockStorageDevice>>
    where
        I: Iterator<Item = DiscoveryResult<R::Handle>>,
    {
        for candidate in candidates {
            let handle = match candidate {
                Ok(handle) => HandleGuard::new(self.registry, handle),
                Err(e) => {
                    tracing::error!(error = %e, target, "Device traversal failed during lookup");
                    return Err(e);
                }
            };

            if let Some(device) = self.examine(&handle, Some(target)) {
                return Ok(Some(device));
            }
        }
        Ok(None)
    }

    /// Run the per-candidate procedure. Every handle acquired here is
    /// released on return, whichever path is taken.
    fn examine(
        &self,
        device: &HandleGuard<'r, R>,
        target: Option<&str>,
    ) -> Option<BlockStorageDevice> {
        let registry = self.registry;

        let Some(device_properties) = registry.property_bag_of(device.handle()) else {
            tracing::debug!(handle = ?device.handle(), "Skipping device without properties");
            return None;
        };

        let location = device_properties
            .get_nested_string(PROTOCOL_CHARACTERISTICS_KEY, PHYSICAL_INTERCONNECT_LOCATION_KEY);
        match location {
            None => {
                tracing::debug!(
                    handle = ?device.handle(),
                    "Skipping device without interconnect location"
                );
                return None;
            }
            Some(FILE_LOCATION) => {
                tracing::debug!(handle = ?device.handle(), "Skipping file-backed device");
                return None;
            }
            Some(_) => {}
        }

        let media = registry.find_child_of_class(device.handle(), &self.config.media_class);
        let Some(media) = HandleGuard::adopt(registry, media) else {
            tracing::debug!(handle = ?device.handle(), "Skipping device without media");
            return None;
        };
        let Some(media_properties) = registry.property_bag_of(media.handle()) else {
            tracing::debug!(handle = ?device.handle(), "Skipping device without media properties");
            return None;
        };

        let Some(bsd_name) = media_properties.get_string(BSD_NAME_KEY) else {
            tracing::debug!(handle = ?device.handle(), "Skipping media without BSD name");
            return None;
        };
        let reference_name = bounded_name(bsd_name, self.config.max_name_len).to_string();

        if let Some(target) = target {
            if reference_name != target {
                return None;
            }
        }

        let parent = registry.find_parent(device.handle());
        let tper_properties = HandleGuard::adopt(registry, parent)
            .filter(|parent| registry.conforms_to_class(parent.handle(), &self.config.driver_class))
            .and_then(|parent| registry.property_bag_of(parent.handle()));

        let display_name =
            bounded_name(&registry.name_of(media.handle()), self.config.max_name_len).to_string();

        let sources = PropertySources::new(
            Some(&device_properties),
            Some(&media_properties),
            tper_properties.as_ref(),
        );
        let bound = self
            .identify
            .map(|query| BoundIdentify::new(query, device.handle()));
        let mut builder = DescriptorBuilder::from_config(&self.config);
        if let Some(bound) = bound.as_ref() {
            builder = builder.with_identify(bound);
        }
        let descriptor = builder.build(&sources);

        tracing::debug!(
            device = %reference_name,
            dev_type = ?descriptor.dev_type,
            security_capable = tper_properties.is_some(),
            "Discovered block storage device"
        );

        Some(BlockStorageDevice::new(
            descriptor,
            reference_name,
            display_name,
            device_properties,
            media_properties,
            tper_properties,
        ))
    }
}
