/// In-memory registry
///
/// Holds a tree of registry objects (class lineage, entry name, optional
/// property bag, optional identify payload) and implements the `Registry`
/// collaborator over it. Snapshots are plain JSON so a traversal captured
/// on one machine can be replayed anywhere. Handle retains and releases are
/// counted so callers can check that nothing leaks.
use super::{PropertyBag, Registry};
use crate::descriptor::{IdentifyData, IdentifyError, IdentifyProtocol, IdentifyQuery};
use crate::{DiscoveryError, DiscoveryResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Registry entry names are bounded like the platform's fixed name buffers.
pub const MAX_ENTRY_NAME_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One registry object as described in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Class lineage, most derived first.
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub properties: Option<PropertyBag>,
    #[serde(default)]
    pub identify: Option<IdentifyData>,
}

impl NodeSpec {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn class(mut self, class_name: &str) -> Self {
        self.classes.push(class_name.to_string());
        self
    }

    pub fn parent(mut self, parent_id: &str) -> Self {
        self.parent = Some(parent_id.to_string());
        self
    }

    pub fn properties(mut self, properties: PropertyBag) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn identify(mut self, data: IdentifyData) -> Self {
        self.identify = Some(data);
        self
    }
}

/// Serialized form of a whole registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    /// Inject a traversal fault after this many candidates have been yielded.
    #[serde(default)]
    pub fail_traversal_at: Option<usize>,
}

#[derive(Debug)]
struct Node {
    spec: NodeSpec,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct HandleCounters {
    retained: AtomicUsize,
    released: AtomicUsize,
}

impl HandleCounters {
    fn retain(&self) {
        self.retained.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    fail_traversal_at: Option<usize>,
    counters: Arc<HandleCounters>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a snapshot. Parents may be declared after
    /// their children.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> DiscoveryResult<Self> {
        let mut registry = Self::new();
        registry.fail_traversal_at = snapshot.fail_traversal_at;

        for spec in &snapshot.nodes {
            if registry.index.contains_key(&spec.id) {
                return Err(DiscoveryError::Snapshot(format!(
                    "duplicate node id '{}'",
                    spec.id
                )));
            }
            let id = NodeId(registry.nodes.len());
            registry.index.insert(spec.id.clone(), id);
            registry.nodes.push(Node {
                spec: spec.clone(),
                parent: None,
                children: Vec::new(),
            });
        }

        for position in 0..registry.nodes.len() {
            if let Some(parent_key) = registry.nodes[position].spec.parent.clone() {
                let parent = registry.lookup_id(&parent_key)?;
                registry.link(NodeId(position), parent);
            }
        }

        Ok(registry)
    }

    pub fn from_json(text: &str) -> DiscoveryResult<Self> {
        let snapshot: RegistrySnapshot = serde_json::from_str(text)?;
        Self::from_snapshot(snapshot)
    }

    pub fn load(path: &Path) -> DiscoveryResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            nodes: self.nodes.iter().map(|n| n.spec.clone()).collect(),
            fail_traversal_at: self.fail_traversal_at,
        }
    }

    /// Add one node. Its parent, if any, must already exist.
    pub fn insert(&mut self, spec: NodeSpec) -> DiscoveryResult<NodeId> {
        if self.index.contains_key(&spec.id) {
            return Err(DiscoveryError::Snapshot(format!(
                "duplicate node id '{}'",
                spec.id
            )));
        }
        let parent = match &spec.parent {
            Some(key) => Some(self.lookup_id(key)?),
            None => None,
        };

        let id = NodeId(self.nodes.len());
        self.index.insert(spec.id.clone(), id);
        self.nodes.push(Node {
            spec,
            parent: None,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.link(id, parent);
        }
        Ok(id)
    }

    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn set_traversal_fault(&mut self, after: Option<usize>) {
        self.fail_traversal_at = after;
    }

    /// Handles retained and not yet released.
    pub fn outstanding_handles(&self) -> usize {
        let retained = self.counters.retained.load(Ordering::SeqCst);
        let released = self.counters.released.load(Ordering::SeqCst);
        retained.saturating_sub(released)
    }

    pub fn retained_handles(&self) -> usize {
        self.counters.retained.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn lookup_id(&self, key: &str) -> DiscoveryResult<NodeId> {
        self.node_id(key)
            .ok_or_else(|| DiscoveryError::Snapshot(format!("unknown parent node '{}'", key)))
    }

    fn link(&mut self, child: NodeId, parent: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn retained(&self, id: NodeId) -> NodeId {
        self.counters.retain();
        id
    }
}

/// Traversal over matching nodes; each yielded handle is retained.
#[derive(Debug)]
pub struct MemoryIter {
    pending: VecDeque<NodeId>,
    yielded: usize,
    fail_at: Option<usize>,
    finished: bool,
    counters: Arc<HandleCounters>,
}

impl Iterator for MemoryIter {
    type Item = DiscoveryResult<NodeId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.fail_at == Some(self.yielded) {
            self.finished = true;
            return Some(Err(DiscoveryError::TraversalFault(format!(
                "iterator invalidated after {} entries",
                self.yielded
            ))));
        }

        let next = self.pending.pop_front()?;
        self.yielded += 1;
        self.counters.retain();
        Some(Ok(next))
    }
}

impl Registry for MemoryRegistry {
    type Handle = NodeId;
    type Iter = MemoryIter;

    fn iterate_matching(&self, class_name: &str) -> DiscoveryResult<Self::Iter> {
        let pending = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.spec.classes.iter().any(|c| c == class_name))
            .map(|(position, _)| NodeId(position))
            .collect();

        Ok(MemoryIter {
            pending,
            yielded: 0,
            fail_at: self.fail_traversal_at,
            finished: false,
            counters: Arc::clone(&self.counters),
        })
    }

    fn property_bag_of(&self, handle: &NodeId) -> Option<PropertyBag> {
        self.node(handle)?.spec.properties.clone()
    }

    fn find_child_of_class(&self, handle: &NodeId, class_name: &str) -> Option<NodeId> {
        let mut queue: VecDeque<NodeId> = self.node(handle)?.children.iter().copied().collect();

        while let Some(candidate) = queue.pop_front() {
            if self.conforms_to_class(&candidate, class_name) {
                return Some(self.retained(candidate));
            }
            if let Some(node) = self.node(&candidate) {
                queue.extend(node.children.iter().copied());
            }
        }
        None
    }

    fn find_parent(&self, handle: &NodeId) -> Option<NodeId> {
        let parent = self.node(handle)?.parent?;
        Some(self.retained(parent))
    }

    fn conforms_to_class(&self, handle: &NodeId, class_name: &str) -> bool {
        self.node(handle)
            .map(|node| node.spec.classes.iter().any(|c| c == class_name))
            .unwrap_or(false)
    }

    fn name_of(&self, handle: &NodeId) -> String {
        let name = self
            .node(handle)
            .map(|node| node.spec.name.as_str())
            .unwrap_or_default();
        bounded_name(name, MAX_ENTRY_NAME_LEN).to_string()
    }

    fn release(&self, _handle: &NodeId) {
        self.counters.release();
    }
}

impl IdentifyQuery<NodeId> for MemoryRegistry {
    fn query_identify(
        &self,
        handle: &NodeId,
        protocol: IdentifyProtocol,
        namespace: u32,
    ) -> Result<IdentifyData, IdentifyError> {
        if namespace != 0 {
            return Err(IdentifyError::Unsupported(format!(
                "namespace {} not present",
                namespace
            )));
        }

        let node = self
            .node(handle)
            .ok_or_else(|| IdentifyError::UserClientUnavailable(format!("{:?}", handle)))?;

        node.spec.identify.clone().ok_or_else(|| {
            IdentifyError::CommandFailed(format!(
                "{:?} identify returned no data for '{}'",
                protocol, node.spec.name
            ))
        })
    }
}

/// Longest prefix of `name` that fits in `max_len` bytes without splitting a
/// character.
pub fn bounded_name(name: &str, max_len: usize) -> &str {
    if name.len() <= max_len {
        return name;
    }
    let mut end = max_len;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
