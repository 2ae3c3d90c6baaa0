/// Integration tests for device enumeration
///
/// Covers candidate rejection, ordering, the security-capable variant, the
/// cached-record fast path, traversal faults and handle accounting.
use crate::common::assertions::*;
use crate::common::registry_builders::*;
use sed_device_scan::{
    DeviceDescriptor, DeviceEnumerator, DeviceKind, DeviceType, DiscoveryError, FixedAscii,
    PropertyNumber, ScanConfig,
};

fn enumerate(devices: &[MockDeviceBuilder]) -> (Vec<sed_device_scan::BlockStorageDevice>, usize) {
    let registry = registry_with(devices);
    let found = DeviceEnumerator::new(&registry, ScanConfig::default())
        .enumerate()
        .unwrap();
    assert_no_handle_leaks(&registry);
    let retained = registry.retained_handles();
    (found, retained)
}

#[cfg(test)]
mod ordering_tests {
    use super::*;

    #[test]
    fn test_devices_sorted_length_first() {
        let (devices, _) = enumerate(&[
            MockDeviceBuilder::nvme("nvme0n1"),
            MockDeviceBuilder::sata("sda"),
            MockDeviceBuilder::usb("disk2"),
        ]);
        assert_eq!(reference_names(&devices), vec!["sda", "disk2", "nvme0n1"]);
        assert_sorted_by_reference_name(&devices);
    }

    #[test]
    fn test_disk10_sorts_after_disk9() {
        let (devices, _) = enumerate(&[
            MockDeviceBuilder::sata("disk10"),
            MockDeviceBuilder::sata("disk9"),
            MockDeviceBuilder::sata("disk0"),
        ]);
        assert_eq!(reference_names(&devices), vec!["disk0", "disk9", "disk10"]);
    }

    #[test]
    fn test_empty_registry_yields_empty_list() {
        let (devices, retained) = enumerate(&[]);
        assert!(devices.is_empty());
        assert_eq!(retained, 0);
    }

    #[test]
    fn test_enumeration_is_repeatable() {
        let registry = registry_with(&[
            MockDeviceBuilder::usb("disk4"),
            MockDeviceBuilder::sata("disk0").security_capable(),
            MockDeviceBuilder::nvme("disk1"),
        ]);
        let enumerator = DeviceEnumerator::new(&registry, ScanConfig::default());
        let first = enumerator.enumerate().unwrap();
        let second = enumerator.enumerate().unwrap();
        assert_eq!(first, second);
        assert_no_handle_leaks(&registry);
    }
}

#[cfg(test)]
mod rejection_tests {
    use super::*;

    #[test]
    fn test_file_backed_device_excluded() {
        let (devices, _) = enumerate(&[
            MockDeviceBuilder::sata("disk0"),
            MockDeviceBuilder::disk_image("disk5"),
        ]);
        assert_eq!(reference_names(&devices), vec!["disk0"]);
    }

    #[test]
    fn test_device_without_properties_excluded() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata("disk0").no_device_properties()]);
        assert!(devices.is_empty());
    }

    #[test]
    fn test_device_without_location_excluded() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata("disk0").no_location()]);
        assert!(devices.is_empty());
    }

    #[test]
    fn test_device_without_media_excluded() {
        let (devices, _) = enumerate(&[
            MockDeviceBuilder::sata("disk0").no_media(),
            MockDeviceBuilder::sata("disk1"),
        ]);
        assert_eq!(reference_names(&devices), vec!["disk1"]);
    }

    #[test]
    fn test_media_without_properties_excluded() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata("disk0").no_media_properties()]);
        assert!(devices.is_empty());
    }

    #[test]
    fn test_media_without_bsd_name_excluded() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata("disk0").no_bsd_name()]);
        assert!(devices.is_empty());
    }

    #[test]
    fn test_rejected_candidates_release_handles() {
        let registry = registry_with(&[
            MockDeviceBuilder::sata("disk0").no_device_properties(),
            MockDeviceBuilder::sata("disk1").no_location(),
            MockDeviceBuilder::disk_image("disk2"),
            MockDeviceBuilder::sata("disk3").no_media(),
            MockDeviceBuilder::sata("disk4").no_media_properties(),
            MockDeviceBuilder::sata("disk5").no_bsd_name(),
            MockDeviceBuilder::sata("disk6").security_capable(),
        ]);
        let devices = DeviceEnumerator::new(&registry, ScanConfig::default())
            .enumerate()
            .unwrap();
        assert_eq!(reference_names(&devices), vec!["disk6"]);
        assert!(registry.retained_handles() > 7);
        assert_no_handle_leaks(&registry);
    }
}

#[cfg(test)]
mod descriptor_tests {
    use super::*;

    #[test]
    fn test_sata_descriptor_from_properties() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata("disk0")]);
        let device = &devices[0];
        assert_eq!(device.dev_type(), DeviceType::ATA);
        assert_eq!(device.size(), 500_107_862_016);
        assert_eq!(device.vendor_name(), "ATA");
        assert_eq!(device.model_num(), "Samsung SSD 860 EVO 500GB");
        assert_eq!(device.firmware_rev(), "RVT04B6Q");
        assert_eq!(device.serial_num(), "S3Z2NB0K123456X");
        assert_eq!(device.physical_interconnect(), "SATA");
        assert_eq!(device.physical_interconnect_location(), "Internal");
        assert_eq!(device.dev_name(), "/dev/disk0");
        assert_fields_bounded(device);
    }

    #[test]
    fn test_nvme_descriptor_uses_long_long_size() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::nvme("disk0")]);
        assert_eq!(devices[0].dev_type(), DeviceType::NVMe);
        assert_eq!(devices[0].size(), 500_277_792_768);
        assert_eq!(devices[0].vendor_name(), "");
        assert_eq!(devices[0].physical_interconnect(), "Apple Fa");
    }

    #[test]
    fn test_usb_descriptor_composes_model() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::usb("disk3")]);
        assert_eq!(devices[0].dev_type(), DeviceType::USB);
        assert_eq!(devices[0].model_num(), "SeagateExpansion HDD");
    }

    #[test]
    fn test_pci_express_stays_other() {
        let (devices, _) =
            enumerate(&[MockDeviceBuilder::sata("disk0").interconnect("PCI-Express")]);
        assert_eq!(devices[0].dev_type(), DeviceType::Other);
    }

    #[test]
    fn test_unsupported_size_encoding_is_zero() {
        let (devices, _) =
            enumerate(&[MockDeviceBuilder::sata("disk0").size(PropertyNumber::SInt32(1 << 30))]);
        assert_eq!(devices[0].size(), 0);
    }

    #[test]
    fn test_whole_disk_media_chosen_over_partitions() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata("disk0").partitions(3)]);
        assert_eq!(reference_names(&devices), vec!["disk0"]);
        assert_eq!(devices[0].media_properties().get_bool("Whole"), Some(true));
    }

    #[test]
    fn test_display_name_from_media_entry() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::usb("disk3")]);
        assert_eq!(devices[0].display_name(), "Seagate Expansion HDD Media");
    }

    #[test]
    fn test_long_bsd_name_bounded() {
        let long_name = "d".repeat(200);
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata(&long_name)]);
        assert_eq!(devices[0].reference_name().len(), 128);
        assert_eq!(devices[0].dev_name().len(), 25);
    }
}

#[cfg(test)]
mod security_subsystem_tests {
    use super::*;

    #[test]
    fn test_generic_without_tper_driver() {
        let (devices, _) = enumerate(&[MockDeviceBuilder::sata("disk0")]);
        assert_eq!(devices[0].kind(), &DeviceKind::Generic);
        assert!(devices[0].tper_properties().is_none());
    }

    #[test]
    fn test_security_capable_under_tper_driver() {
        let (devices, _) = enumerate(&[
            MockDeviceBuilder::sata("disk0").security_capable(),
            MockDeviceBuilder::sata("disk1"),
        ]);
        assert!(devices[0].kind().is_security_capable());
        assert_eq!(
            devices[0]
                .tper_properties()
                .and_then(|bag| bag.get_string("IOClass")),
            Some(TPER_DRIVER_CLASS)
        );
        assert!(!devices[1].kind().is_security_capable());
    }

    #[test]
    fn test_cached_descriptor_replayed_verbatim() {
        let mut cached = DeviceDescriptor::default();
        cached.dev_type = DeviceType::ATA;
        cached.dev_size = 1_000_204_886_016;
        cached.vendor_name = FixedAscii::from_str_truncated("ATA").unwrap();
        cached.model_num = FixedAscii::from_str_truncated("Crucial CT1000MX500SSD1").unwrap();
        cached.serial_num = FixedAscii::from_str_truncated("1904E1E2A3B4").unwrap();
        cached.sed.opal20 = true;
        cached.sed.any_opal_ssc = true;
        cached.sed.locking_enabled = true;
        cached.sed.locking_locked = true;

        let (devices, _) = enumerate(&[MockDeviceBuilder::usb("disk2").cached_descriptor(&cached)]);
        let device = &devices[0];

        assert_eq!(device.descriptor(), &cached);
        assert_eq!(device.descriptor().to_record(), cached.to_record());
        assert_eq!(device.dev_type(), DeviceType::ATA);
        assert!(device.is_opal2());
        assert!(device.locked());
        assert!(device.locking_enabled());
        assert!(!device.mbr_enabled());
    }

    #[test]
    fn test_empty_cached_descriptor_falls_back_to_properties() {
        let (devices, _) =
            enumerate(&[MockDeviceBuilder::sata("disk0").tper_with_raw_cache(Vec::new())]);
        assert!(devices[0].kind().is_security_capable());
        assert_eq!(devices[0].dev_type(), DeviceType::ATA);
        assert_eq!(devices[0].serial_num(), "S3Z2NB0K123456X");
    }

    #[test]
    fn test_custom_driver_class_from_config() {
        let registry = registry_with(&[MockDeviceBuilder::sata("disk0").security_capable()]);
        let config = ScanConfig {
            driver_class: "com_example_OtherDriver".to_string(),
            ..ScanConfig::default()
        };
        let devices = DeviceEnumerator::new(&registry, config).enumerate().unwrap();
        assert_eq!(devices[0].kind(), &DeviceKind::Generic);
        assert_no_handle_leaks(&registry);
    }
}

#[cfg(test)]
mod traversal_fault_tests {
    use super::*;

    #[test]
    fn test_fault_mid_traversal_is_an_error() {
        let mut registry = registry_with(&[
            MockDeviceBuilder::sata("disk0"),
            MockDeviceBuilder::sata("disk1"),
            MockDeviceBuilder::sata("disk2"),
        ]);
        registry.set_traversal_fault(Some(2));

        let result = DeviceEnumerator::new(&registry, ScanConfig::default()).enumerate();
        assert!(matches!(result, Err(DiscoveryError::TraversalFault(_))));
        assert_no_handle_leaks(&registry);
    }

    #[test]
    fn test_fault_before_first_candidate_is_an_error() {
        let mut registry = registry_with(&[MockDeviceBuilder::sata("disk0")]);
        registry.set_traversal_fault(Some(0));

        let result = DeviceEnumerator::new(&registry, ScanConfig::default()).enumerate();
        assert!(matches!(result, Err(DiscoveryError::TraversalFault(_))));
        assert_eq!(registry.retained_handles(), 0);
    }

    #[test]
    fn test_fault_never_looks_like_empty_result() {
        let mut registry = registry_with(&[]);
        registry.set_traversal_fault(Some(0));
        assert!(DeviceEnumerator::new(&registry, ScanConfig::default())
            .enumerate()
            .is_err());
    }

    #[test]
    fn test_fault_after_last_candidate_is_not_reached() {
        let mut registry = registry_with(&[MockDeviceBuilder::sata("disk0")]);
        registry.set_traversal_fault(Some(5));
        let devices = DeviceEnumerator::new(&registry, ScanConfig::default())
            .enumerate()
            .unwrap();
        assert_eq!(devices.len(), 1);
    }
}
