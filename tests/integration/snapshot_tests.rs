/// Integration tests for registry snapshots
///
/// Snapshots are how captured registries are replayed by the CLI, so these
/// tests go through JSON text and files rather than the builder API.
use crate::common::assertions::*;
use crate::common::registry_builders::*;
use sed_device_scan::{
    DeviceEnumerator, DeviceType, DiscoveryError, MemoryRegistry, ScanConfig,
};
use std::io::Write;
use tempfile::NamedTempFile;

const CAPTURED_REGISTRY: &str = r#"{
  "nodes": [
    {
      "id": "tper0",
      "name": "BPTperDriver",
      "classes": ["com_brightplaza_BPTperDriver", "IOService"],
      "properties": {
        "IOClass": {"string": "com_brightplaza_BPTperDriver"}
      }
    },
    {
      "id": "dev0",
      "name": "IOBlockStorageServices",
      "classes": ["IOBlockStorageServices", "IOBlockStorageDevice"],
      "parent": "tper0",
      "properties": {
        "Device Characteristics": {"map": {
          "Vendor Name": {"string": "ATA"},
          "Product Name": {"string": "Samsung SSD 870 QVO 1TB"},
          "Product Revision Level": {"string": "SVQ02B6Q"},
          "Serial Number": {"string": "S5RRNF0R123456"}
        }},
        "Protocol Characteristics": {"map": {
          "Physical Interconnect": {"string": "SATA"},
          "Physical Interconnect Location": {"string": "Internal"}
        }}
      }
    },
    {
      "id": "media0",
      "name": "Samsung SSD 870 QVO 1TB Media",
      "classes": ["IOMedia"],
      "parent": "dev0",
      "properties": {
        "BSD Name": {"string": "disk0"},
        "Size": {"number": {"sint64": 1000204886016}}
      }
    },
    {
      "id": "dev1",
      "name": "IOBlockStorageServices",
      "classes": ["IOBlockStorageDevice"],
      "properties": {
        "Protocol Characteristics": {"map": {
          "Physical Interconnect": {"string": "Virtual Interface"},
          "Physical Interconnect Location": {"string": "File"}
        }}
      }
    },
    {
      "id": "media1",
      "name": "Apple Disk Image Media",
      "classes": ["IOMedia"],
      "parent": "dev1",
      "properties": {
        "BSD Name": {"string": "disk4"}
      }
    }
  ]
}"#;

fn write_snapshot(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_captured_registry_enumerates() {
    let registry = MemoryRegistry::from_json(CAPTURED_REGISTRY).unwrap();
    let devices = DeviceEnumerator::new(&registry, ScanConfig::default())
        .enumerate()
        .unwrap();

    assert_eq!(reference_names(&devices), vec!["disk0"]);
    let device = &devices[0];
    assert_eq!(device.dev_type(), DeviceType::ATA);
    assert_eq!(device.size(), 1_000_204_886_016);
    assert_eq!(device.model_num(), "Samsung SSD 870 QVO 1TB");
    assert_eq!(device.display_name(), "Samsung SSD 870 QVO 1TB Media");
    assert!(device.kind().is_security_capable());
    assert_no_handle_leaks(&registry);
}

#[test]
fn test_snapshot_round_trip_preserves_enumeration() {
    let original = registry_with(&[
        MockDeviceBuilder::usb("disk3").security_capable(),
        MockDeviceBuilder::nvme("disk0").partitions(2),
        MockDeviceBuilder::disk_image("disk5"),
    ]);
    let json = serde_json::to_string(&original.snapshot()).unwrap();
    let replayed = MemoryRegistry::from_json(&json).unwrap();

    let before = DeviceEnumerator::new(&original, ScanConfig::default())
        .enumerate()
        .unwrap();
    let after = DeviceEnumerator::new(&replayed, ScanConfig::default())
        .enumerate()
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(replayed.len(), original.len());
}

#[test]
fn test_load_from_file() {
    let file = write_snapshot(CAPTURED_REGISTRY);
    let registry = MemoryRegistry::load(file.path()).unwrap();
    assert_eq!(registry.len(), 5);
}

#[test]
fn test_load_missing_file_is_io_error() {
    let result = MemoryRegistry::load(std::path::Path::new("/nonexistent/registry.json"));
    assert!(matches!(result, Err(DiscoveryError::IoError(_))));
}

#[test]
fn test_malformed_json_is_snapshot_error() {
    let result = MemoryRegistry::from_json("{\"nodes\": [");
    assert!(matches!(result, Err(DiscoveryError::Snapshot(_))));
}

#[test]
fn test_duplicate_node_id_rejected() {
    let json = r#"{"nodes": [{"id": "a"}, {"id": "a"}]}"#;
    let result = MemoryRegistry::from_json(json);
    assert!(matches!(result, Err(DiscoveryError::Snapshot(msg)) if msg.contains("duplicate")));
}

#[test]
fn test_unknown_parent_rejected() {
    let json = r#"{"nodes": [{"id": "a", "parent": "missing"}]}"#;
    let result = MemoryRegistry::from_json(json);
    assert!(matches!(result, Err(DiscoveryError::Snapshot(msg)) if msg.contains("missing")));
}

#[test]
fn test_parent_may_follow_child() {
    let json = r#"{"nodes": [
        {"id": "child", "classes": ["IOMedia"], "parent": "root"},
        {"id": "root", "classes": ["IOBlockStorageDevice"]}
    ]}"#;
    let registry = MemoryRegistry::from_json(json).unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_traversal_fault_in_snapshot() {
    let mut value: serde_json::Value = serde_json::from_str(CAPTURED_REGISTRY).unwrap();
    value["fail_traversal_at"] = serde_json::json!(1);
    let registry = MemoryRegistry::from_json(&value.to_string()).unwrap();

    let result = DeviceEnumerator::new(&registry, ScanConfig::default()).enumerate();
    assert!(matches!(result, Err(DiscoveryError::TraversalFault(_))));
    assert_no_handle_leaks(&registry);
}
