// Allow uppercase acronyms for industry-standard terms like ATA, NVMe, USB, SSC
#![allow(clippy::upper_case_acronyms)]

pub mod config;
pub mod descriptor;
pub mod device;
pub mod enumerate;
pub mod logging;
pub mod registry;

// Re-export the discovery surface for convenience
pub use config::ScanConfig;
pub use descriptor::{
    DescriptorBuilder, DeviceDescriptor, DeviceType, FixedAscii, IdentifyData, IdentifyError,
    IdentifyProtocol, IdentifySource, PropertySources,
};
pub use device::{BlockStorageDevice, DeviceKind};
pub use enumerate::{compare_reference_names, DeviceEnumerator};
pub use registry::{
    HandleGuard, MemoryRegistry, PropertyBag, PropertyNumber, PropertyValue, Registry,
};

use thiserror::Error;

/// Failures that abort a discovery call.
///
/// Absent property bags, children or parents are not errors: they are
/// expressed as `Option` and cause the candidate to be skipped or the
/// field to keep its default.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Registry traversal failed: {0}")]
    TraversalFault(String),

    #[error("Invalid registry snapshot: {0}")]
    Snapshot(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// Manual Clone implementation because std::io::Error doesn't implement Clone
impl Clone for DiscoveryError {
    fn clone(&self) -> Self {
        match self {
            DiscoveryError::TraversalFault(s) => DiscoveryError::TraversalFault(s.clone()),
            DiscoveryError::Snapshot(s) => DiscoveryError::Snapshot(s.clone()),
            DiscoveryError::Config(s) => DiscoveryError::Config(s.clone()),
            DiscoveryError::IoError(e) => {
                DiscoveryError::IoError(std::io::Error::new(e.kind(), e.to_string()))
            }
        }
    }
}

impl From<serde_json::Error> for DiscoveryError {
    fn from(err: serde_json::Error) -> Self {
        DiscoveryError::Snapshot(err.to_string())
    }
}

impl From<::config::ConfigError> for DiscoveryError {
    fn from(err: ::config::ConfigError) -> Self {
        DiscoveryError::Config(err.to_string())
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
