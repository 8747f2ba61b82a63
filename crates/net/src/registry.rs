//! Object and type registries
//!
//! `ObjectRegistry` is the authoritative id → entity mapping, ordered by
//! id so that enumeration follows spawn order (late-joiner sync depends
//! on this). It also owns the per-type RPC descriptor cache.
//!
//! `TypeRegistry` maps stable type names to entity factories, populated
//! at startup, so the spawn protocol can materialize entities for frames
//! arriving by name.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::entity::{Entity, EntityType};
use crate::error::NetError;
use crosswire_protocol::rpc::RpcDescriptor;

/// A registered entity together with its network identity.
pub struct NetObject {
    id: u32,
    owner: u32,
    type_name: String,
    entity: Box<dyn Entity>,
    descriptors: Arc<[RpcDescriptor]>,
    rpc_cache: HashMap<String, bool>,
}

impl NetObject {
    pub(crate) fn new(
        id: u32,
        owner: u32,
        type_name: String,
        entity: Box<dyn Entity>,
        descriptors: Arc<[RpcDescriptor]>,
    ) -> Self {
        Self {
            id,
            owner,
            type_name,
            entity,
            descriptors,
            rpc_cache: HashMap::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: u32) {
        self.owner = owner;
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn descriptors(&self) -> &[RpcDescriptor] {
        &self.descriptors
    }

    pub(crate) fn descriptors_arc(&self) -> Arc<[RpcDescriptor]> {
        Arc::clone(&self.descriptors)
    }

    /// Typed view of the wrapped entity.
    pub fn entity<E: Entity>(&self) -> Option<&E> {
        self.entity.as_any().downcast_ref::<E>()
    }

    /// Splits the object into the disjoint parts an invocation needs.
    pub(crate) fn split_mut(
        &mut self,
    ) -> (
        &mut dyn Entity,
        &[RpcDescriptor],
        &mut HashMap<String, bool>,
    ) {
        (
            self.entity.as_mut(),
            &self.descriptors,
            &mut self.rpc_cache,
        )
    }
}

impl std::fmt::Debug for NetObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetObject")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Id → entity mapping plus the per-type descriptor cache.
#[derive(Default)]
pub struct ObjectRegistry {
    objects: BTreeMap<u32, NetObject>,
    descriptor_cache: HashMap<String, Arc<[RpcDescriptor]>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&NetObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut NetObject> {
        self.objects.get_mut(&id)
    }

    /// Removes the object for an invocation, to be re-inserted after.
    pub(crate) fn take(&mut self, id: u32) -> Option<NetObject> {
        self.objects.remove(&id)
    }

    /// Registers an object under its id, silently replacing any prior
    /// binding (the spawn protocol relies on this when reassigning ids).
    pub fn insert(&mut self, object: NetObject) {
        self.objects.insert(object.id, object);
    }

    pub fn remove(&mut self, id: u32) -> Option<NetObject> {
        self.objects.remove(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.objects.contains_key(&id)
    }

    /// Iterates objects in id order, which is spawn order.
    pub fn iter(&self) -> impl Iterator<Item = &NetObject> {
        self.objects.values()
    }

    pub fn ids(&self) -> Vec<u32> {
        self.objects.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    /// Builds and caches the descriptor table for `E`. Idempotent per
    /// type; the table is validated on first call and a bad table is a
    /// configuration error surfaced at the type's first instantiation.
    pub fn cache_descriptors<E: EntityType>(&mut self) -> Result<Arc<[RpcDescriptor]>, NetError> {
        self.cache_descriptors_named(E::TYPE_NAME, E::descriptors)
    }

    /// Name-keyed variant used by the spawn protocol, which only has the
    /// wire type name.
    pub fn cache_descriptors_named(
        &mut self,
        type_name: &str,
        build: impl FnOnce() -> Vec<RpcDescriptor>,
    ) -> Result<Arc<[RpcDescriptor]>, NetError> {
        if let Some(cached) = self.descriptor_cache.get(type_name) {
            return Ok(Arc::clone(cached));
        }
        let table = build();
        validate_descriptors(type_name, &table)?;
        let table: Arc<[RpcDescriptor]> = table.into();
        self.descriptor_cache
            .insert(type_name.to_string(), Arc::clone(&table));
        Ok(table)
    }
}

fn validate_descriptors(type_name: &str, table: &[RpcDescriptor]) -> Result<(), NetError> {
    let mut seen = HashMap::new();
    for desc in table {
        if desc.name.is_empty() {
            return Err(NetError::InvalidDescriptorTable {
                type_name: type_name.to_string(),
                reason: "empty method name".to_string(),
            });
        }
        if seen.insert(desc.name.as_str(), ()).is_some() {
            return Err(NetError::InvalidDescriptorTable {
                type_name: type_name.to_string(),
                reason: format!("duplicate method name: {}", desc.name),
            });
        }
    }
    Ok(())
}

type Factory = Box<dyn Fn() -> Box<dyn Entity>>;
type DescriptorBuilder = Box<dyn Fn() -> Vec<RpcDescriptor>>;

struct TypeEntry {
    factory: Factory,
    descriptors: DescriptorBuilder,
}

/// Stable type name → factory map for spawn-by-name.
#[derive(Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeEntry>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type under its stable name.
    ///
    /// Every type a peer may spawn must be registered on every process
    /// before the session starts; spawn frames naming unregistered types
    /// are dropped.
    pub fn register<E: EntityType>(&mut self) {
        self.types.insert(
            E::TYPE_NAME.to_string(),
            TypeEntry {
                factory: Box::new(|| -> Box<dyn Entity> { Box::new(E::default()) }),
                descriptors: Box::new(E::descriptors),
            },
        );
    }

    /// Instantiates an entity of the named type.
    pub fn create(&self, type_name: &str) -> Option<Box<dyn Entity>> {
        self.types.get(type_name).map(|entry| (entry.factory)())
    }

    /// Builds the declared descriptor table of the named type.
    pub fn descriptors_for(&self, type_name: &str) -> Option<Vec<RpcDescriptor>> {
        self.types.get(type_name).map(|entry| (entry.descriptors)())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
