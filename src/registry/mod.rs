// Property-source collaborator and its value model
//
// Organized structure:
// - value.rs: tagged property values and property bags with total accessors
// - memory.rs: in-memory registry loaded from JSON snapshots
//
// The platform registry binding itself lives outside this crate; anything
// that implements `Registry` can drive the enumerator.

pub mod memory;
pub mod value;


use crate::DiscoveryResult;
use std::fmt;
use std::ops::Deref;

pub use memory::{MemoryRegistry, NodeId, NodeSpec, RegistrySnapshot};
pub use value::{PropertyBag, PropertyNumber, PropertyValue};

/// Registry/property-source collaborator.
///
/// Every handle returned by `iterate_matching`, `find_child_of_class` and
/// `find_parent` is retained and must be handed back through `release`.
/// Implementations are not required to be reentrant.
pub trait Registry {
    type Handle: Clone + fmt::Debug + 'static;
    type Iter: Iterator<Item = DiscoveryResult<Self::Handle>>;

    /// Start a traversal over every object of `class_name` or a subclass.
    fn iterate_matching(&self, class_name: &str) -> DiscoveryResult<Self::Iter>;

    fn property_bag_of(&self, handle: &Self::Handle) -> Option<PropertyBag>;

    /// First descendant conforming to `class_name`, searched breadth-first.
    fn find_child_of_class(&self, handle: &Self::Handle, class_name: &str)
        -> Option<Self::Handle>;

    fn find_parent(&self, handle: &Self::Handle) -> Option<Self::Handle>;

    fn conforms_to_class(&self, handle: &Self::Handle, class_name: &str) -> bool;

    /// Registry entry name, at most 128 bytes.
    fn name_of(&self, handle: &Self::Handle) -> String;

    fn release(&self, handle: &Self::Handle);
}

/// Retained registry handle, released when dropped.
pub struct HandleGuard<'r, R: Registry + ?Sized> {
    registry: &'r R,
    handle: R::Handle,
}

impl<'r, R: Registry + ?Sized> HandleGuard<'r, R> {
    pub fn new(registry: &'r R, handle: R::Handle) -> Self {
        Self { registry, handle }
    }

    /// Wrap an optional lookup result.
    pub fn adopt(registry: &'r R, handle: Option<R::Handle>) -> Option<Self> {
        handle.map(|h| Self::new(registry, h))
    }

    pub fn handle(&self) -> &R::Handle {
        &self.handle
    }
}

impl<R: Registry + ?Sized> Deref for HandleGuard<'_, R> {
    type Target = R::Handle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<R: Registry + ?Sized> Drop for HandleGuard<'_, R> {
    fn drop(&mut self) {
        self.registry.release(&self.handle);
    }
}

impl<R: Registry + ?Sized> fmt::Debug for HandleGuard<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandleGuard").field(&self.handle).finish()
    }
}
