//! Data context
//!
//! Identity-mapped store of managed entities with change tracking. Detached
//! graphs are folded in by [`DataContext::merge`]; mutations made through the
//! context are tracked until [`DataContext::commit`] hands them to a
//! [`CommitDelegate`].
//!
//! Managed instances live in an arena keyed by entity name and id. References
//! between entities are [`EntityKey`] values, so a managed reference and the
//! source reference it was merged from carry the same key.

pub mod events;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::error::DataContextError;
use crate::models::entity::{Entity, EntityGraph, EntityId, EntityKey, Value};
use crate::models::metadata::{Metadata, PropertyKind};

pub use events::{ChangeEvent, PostCommitEvent, PreCommitEvent, Subscription};
use events::EventHub;

type Result<T, E = DataContextError> = std::result::Result<T, E>;

/// Keys of managed entities, ordered.
pub type EntitySet = BTreeSet<EntityKey>;

/// Entities handed to the commit delegate.
#[derive(Debug, Clone, Default)]
pub struct CommitContext {
    pub commit_instances: Vec<Entity>,
    pub remove_instances: Vec<Entity>,
}

/// Persists a commit context and returns the saved instances.
pub trait CommitDelegate {
    fn commit(&mut self, context: &CommitContext) -> Result<Vec<Entity>>;
}

impl<F> CommitDelegate for F
where
    F: FnMut(&CommitContext) -> Result<Vec<Entity>>,
{
    fn commit(&mut self, context: &CommitContext) -> Result<Vec<Entity>> {
        self(context)
    }
}

pub struct DataContext {
    metadata: Arc<Metadata>,
    content: HashMap<String, HashMap<EntityId, Entity>>,
    modified: BTreeSet<EntityKey>,
    removed: BTreeMap<EntityKey, Entity>,
    /// embedded instance -> owning entity
    embedded_owners: HashMap<EntityKey, EntityKey>,
    /// managed instances created by the running merge pass
    inserted: Vec<EntityKey>,
    disable_listeners: bool,
    events: EventHub,
    commit_delegate: Option<Box<dyn CommitDelegate>>,
}

impl DataContext {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        Self {
            metadata,
            content: HashMap::new(),
            modified: BTreeSet::new(),
            removed: BTreeMap::new(),
            embedded_owners: HashMap::new(),
            inserted: Vec::new(),
            disable_listeners: false,
            events: EventHub::default(),
            commit_delegate: None,
        }
    }

    pub fn with_commit_delegate(mut self, delegate: impl CommitDelegate + 'static) -> Self {
        self.set_commit_delegate(delegate);
        self
    }

    pub fn set_commit_delegate(&mut self, delegate: impl CommitDelegate + 'static) {
        self.commit_delegate = Some(Box::new(delegate));
    }

    /// 按实体名和 ID 查找受管实例
    pub fn find(&self, entity_name: &str, id: &EntityId) -> Option<&Entity> {
        self.content.get(entity_name)?.get(id)
    }

    pub fn find_by_key(&self, key: &EntityKey) -> Option<&Entity> {
        self.find(&key.entity_name, &key.id)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.find_by_key(key).is_some()
    }

    /// All managed instances ordered by key.
    pub fn all(&self) -> Vec<&Entity> {
        let mut entities: Vec<&Entity> = self.content.values().flat_map(|m| m.values()).collect();
        entities.sort_by(|a, b| a.key.cmp(&b.key));
        entities
    }

    /// Merges the entity at `root` and everything reachable from it, returning
    /// the managed instance.
    pub fn merge(&mut self, root: &EntityKey, graph: &EntityGraph) -> Result<&Entity> {
        if graph.get(root).is_none() {
            return Err(DataContextError::UnknownEntity(root.clone()));
        }

        let mut merged = HashSet::new();
        self.merging(|ctx| ctx.internal_merge(root, graph, &mut merged))?;

        self.find_by_key(root)
            .ok_or_else(|| DataContextError::NotManaged(root.clone()))
    }

    /// Merges a single instance whose references are already managed.
    pub fn merge_entity(&mut self, entity: Entity) -> Result<&Entity> {
        let key = entity.key.clone();
        let graph = EntityGraph::new().with(entity);
        self.merge(&key, &graph)
    }

    /// Merges every entity of the graph within one merge pass.
    pub fn merge_all(&mut self, graph: &EntityGraph) -> Result<EntitySet> {
        let mut roots: Vec<&EntityKey> = graph.keys().collect();
        roots.sort();

        let mut merged = HashSet::new();
        self.merging(|ctx| {
            for root in &roots {
                ctx.internal_merge(root, graph, &mut merged)?;
            }
            Ok(())
        })?;

        Ok(roots.into_iter().cloned().collect())
    }

    /// Runs a merge with change tracking suspended. A failed pass forgets the
    /// instances it created.
    fn merging<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.disable_listeners = true;
        self.inserted.clear();
        let result = f(self);
        self.disable_listeners = false;

        let inserted = std::mem::take(&mut self.inserted);
        if result.is_err() {
            self.rollback(&inserted);
        }
        result
    }

    fn rollback(&mut self, inserted: &[EntityKey]) {
        for key in inserted {
            if let Some(instances) = self.content.get_mut(key.entity_name.as_str()) {
                instances.remove(&key.id);
                if instances.is_empty() {
                    self.content.remove(key.entity_name.as_str());
                }
            }
            self.modified.remove(key);
            self.embedded_owners.remove(key);
        }
        self.embedded_owners
            .retain(|_, owner| !inserted.contains(owner));
        tracing::debug!(count = inserted.len(), "Rolled back instances of a failed merge");
    }

    fn internal_merge(&mut self, key: &EntityKey, graph: &EntityGraph, merged: &mut HashSet<EntityKey>) -> Result<()> {
        let managed_exists = self.contains(key);

        let Some(source) = graph.get(key) else {
            // reference leaving the graph must point at a managed instance
            return if managed_exists {
                Ok(())
            } else {
                Err(DataContextError::UnresolvedReference(key.clone()))
            };
        };

        if merged.contains(key) {
            if managed_exists {
                return Ok(());
            }
            tracing::debug!(entity = %key, "Instance was merged but managed instance is missing");
        }
        merged.insert(key.clone());

        if managed_exists {
            return self.merge_state(source, graph, merged);
        }

        self.content
            .entry(key.entity_name.clone())
            .or_default()
            .insert(key.id.clone(), source.bare_copy());
        self.inserted.push(key.clone());

        self.merge_state(source, graph, merged)?;
        metrics::counter!("security.data_context.merged").increment(1);

        if self.find_by_key(key).is_some_and(Entity::is_new) {
            self.modified.insert(key.clone());
            self.fire_change(key);
        }

        Ok(())
    }

    fn merge_state(&mut self, src: &Entity, graph: &EntityGraph, merged: &mut HashSet<EntityKey>) -> Result<()> {
        let key = &src.key;
        let (dst_new, dst_version) = {
            let dst = self.managed_nn(key)?;
            (dst.is_new(), dst.version)
        };
        let src_new = src.is_new();

        if src_new && !dst_new {
            return Ok(());
        }

        let metadata = self.metadata.clone();
        let meta_class = metadata.class_nn(key.entity_name.as_str())?;

        let mut replace = dst_new && !src_new;
        if !src_new && !dst_new && meta_class.versioned {
            let src_version = src.version.unwrap_or(0);
            let dst_version = dst_version.unwrap_or(0);
            if src_version < dst_version {
                tracing::debug!(
                    entity = %key,
                    src_version,
                    dst_version,
                    "Skipping merge of stale instance"
                );
                return Ok(());
            }
            replace = src_version > dst_version;
        }

        self.copy_system_state(src, dst_new)?;

        for property in &meta_class.properties {
            if property.read_only || !src.is_loaded(&property.name) {
                continue;
            }
            if !dst_new && !self.managed_nn(key)?.is_loaded(&property.name) {
                continue;
            }

            let name = property.name.as_str();
            let value = src.value(name);

            match (property.kind, value) {
                // a new source never clears a destination value
                (_, None) if src_new => {}
                (_, None) => self.managed_mut_nn(key)?.set_value(name, None),
                (PropertyKind::Reference | PropertyKind::Embedded, Some(Value::Reference(target))) => {
                    self.internal_merge(target, graph, merged)?;
                    self.managed_mut_nn(key)?
                        .set_value(name, Some(Value::Reference(target.clone())));
                    if property.is_embedded() {
                        self.embedded_owners.insert(target.clone(), key.clone());
                    }
                }
                (PropertyKind::List, Some(Value::List(items))) => {
                    self.merge_list(key, name, items, replace, graph, merged)?;
                }
                (PropertyKind::Set, Some(Value::Set(items))) => {
                    self.merge_set(key, name, items, replace, graph, merged)?;
                }
                (_, Some(value)) => self.managed_mut_nn(key)?.set_value(name, Some(value.clone())),
            }
        }

        Ok(())
    }

    /// Copies the new/detached state and version; loaded attributes become
    /// the union of both sides, or fully loaded if either side is.
    fn copy_system_state(&mut self, src: &Entity, dst_new: bool) -> Result<()> {
        let dst = self.managed_mut_nn(&src.key)?;
        dst.state = src.state;
        if src.version.is_some() || !src.is_new() {
            dst.version = src.version;
        }

        let fetch_group = if dst_new {
            src.fetch_group().cloned()
        } else {
            match (src.fetch_group(), dst.fetch_group()) {
                (Some(src_group), Some(dst_group)) => Some(src_group.union(dst_group).cloned().collect()),
                _ => None,
            }
        };
        dst.set_fetch_group(fetch_group);
        Ok(())
    }

    fn merge_list(
        &mut self,
        key: &EntityKey,
        property: &str,
        items: &[EntityKey],
        replace: bool,
        graph: &EntityGraph,
        merged: &mut HashSet<EntityKey>,
    ) -> Result<()> {
        for item in items {
            self.internal_merge(item, graph, merged)?;
        }

        let dst = self.managed_mut_nn(key)?;
        if replace {
            dst.set_value(property, Some(Value::List(items.to_vec())));
            return Ok(());
        }

        match dst.value_mut(property) {
            Some(Value::List(existing)) if existing.is_empty() => existing.extend(items.iter().cloned()),
            Some(Value::List(existing)) => {
                for item in items {
                    if !existing.contains(item) {
                        existing.push(item.clone());
                    }
                }
            }
            _ => dst.set_value(property, Some(Value::List(items.to_vec()))),
        }
        Ok(())
    }

    fn merge_set(
        &mut self,
        key: &EntityKey,
        property: &str,
        items: &[EntityKey],
        replace: bool,
        graph: &EntityGraph,
        merged: &mut HashSet<EntityKey>,
    ) -> Result<()> {
        for item in items {
            self.internal_merge(item, graph, merged)?;
        }

        let dst = self.managed_mut_nn(key)?;
        if replace || !matches!(dst.value(property), Some(Value::Set(_))) {
            dst.set_value(property, Some(Value::Set(Vec::new())));
        }
        if let Some(Value::Set(existing)) = dst.value_mut(property) {
            for item in items {
                if !existing.contains(item) {
                    existing.push(item.clone());
                }
            }
        }
        Ok(())
    }

    /// 设置属性值并记录修改
    pub fn set_value(&mut self, key: &EntityKey, property: &str, value: Option<Value>) -> Result<()> {
        self.managed_mut_nn(key)?.set_value(property, value);
        self.mark_modified(key);
        Ok(())
    }

    /// Appends a reference to a list or set property. Adding an item a set
    /// already holds changes nothing.
    pub fn add_to_collection(&mut self, key: &EntityKey, property: &str, item: EntityKey) -> Result<()> {
        let kind = self.collection_kind(key, property)?;
        let dst = self.managed_mut_nn(key)?;

        if dst.value(property).is_none() {
            let empty = match kind {
                PropertyKind::Set => Value::Set(Vec::new()),
                _ => Value::List(Vec::new()),
            };
            dst.set_value(property, Some(empty));
        }

        let changed = match dst.value_mut(property) {
            Some(Value::List(items)) => {
                items.push(item);
                true
            }
            Some(Value::Set(items)) if !items.contains(&item) => {
                items.push(item);
                true
            }
            Some(Value::Set(_)) => false,
            _ => {
                return Err(DataContextError::NotACollection {
                    entity: key.clone(),
                    property: property.to_string(),
                })
            }
        };

        if changed {
            self.mark_modified(key);
        }
        Ok(())
    }

    /// Removes every occurrence of `item`; returns whether anything was removed.
    pub fn remove_from_collection(&mut self, key: &EntityKey, property: &str, item: &EntityKey) -> Result<bool> {
        self.collection_kind(key, property)?;
        let dst = self.managed_mut_nn(key)?;

        let removed = match dst.value_mut(property) {
            Some(Value::List(items)) | Some(Value::Set(items)) => {
                let before = items.len();
                items.retain(|i| i != item);
                items.len() != before
            }
            None => false,
            Some(_) => {
                return Err(DataContextError::NotACollection {
                    entity: key.clone(),
                    property: property.to_string(),
                })
            }
        };

        if removed {
            self.mark_modified(key);
        }
        Ok(removed)
    }

    fn collection_kind(&self, key: &EntityKey, property: &str) -> Result<PropertyKind> {
        let kind = self
            .metadata
            .class(&key.entity_name)
            .and_then(|c| c.property(property))
            .map(|p| p.kind);

        match kind {
            Some(kind @ (PropertyKind::List | PropertyKind::Set)) => Ok(kind),
            _ => Err(DataContextError::NotACollection {
                entity: key.clone(),
                property: property.to_string(),
            }),
        }
    }

    /// Removes a managed instance. New instances are simply forgotten;
    /// persisted ones are queued for deletion on commit. References to it
    /// are dropped from collections of other managed instances.
    pub fn remove(&mut self, key: &EntityKey) -> Result<()> {
        let entity = self
            .content
            .get_mut(&key.entity_name)
            .and_then(|m| m.remove(&key.id))
            .ok_or_else(|| DataContextError::NotManaged(key.clone()))?;

        self.modified.remove(key);
        self.embedded_owners.remove(key);
        if !entity.is_new() {
            self.removed.insert(key.clone(), entity);
        }

        self.remove_from_collections(key);
        self.fire_change(key);
        Ok(())
    }

    fn remove_from_collections(&mut self, removed: &EntityKey) {
        let mut holders = Vec::new();
        for entity in self.content.values_mut().flat_map(|m| m.values_mut()) {
            let names: Vec<String> = entity.values().keys().cloned().collect();
            let mut changed = false;
            for name in names {
                if let Some(Value::List(items) | Value::Set(items)) = entity.value_mut(&name) {
                    let before = items.len();
                    items.retain(|i| i != removed);
                    changed |= items.len() != before;
                }
            }
            if changed {
                holders.push(entity.key.clone());
            }
        }

        for holder in holders {
            self.mark_modified(&holder);
        }
    }

    /// Forgets an instance without tracking the removal.
    pub fn evict(&mut self, key: &EntityKey) {
        if let Some(entities) = self.content.get_mut(&key.entity_name) {
            entities.remove(&key.id);
        }
        self.modified.remove(key);
        self.removed.remove(key);
        self.embedded_owners.remove(key);
    }

    pub fn has_changes(&self) -> bool {
        !self.modified.is_empty() || !self.removed.is_empty()
    }

    pub fn is_modified(&self, key: &EntityKey) -> bool {
        self.modified.contains(key)
    }

    pub fn is_removed(&self, key: &EntityKey) -> bool {
        self.removed.contains_key(key)
    }

    pub fn modified_instances(&self) -> Vec<&Entity> {
        self.modified.iter().filter_map(|key| self.find_by_key(key)).collect()
    }

    pub fn removed_instances(&self) -> Vec<&Entity> {
        self.removed.values().collect()
    }

    /// 提交所有修改
    ///
    /// Pre-commit listeners may prevent the commit, in which case nothing is
    /// sent and an empty set is returned. Instances returned by the delegate
    /// are merged back before the change sets are cleared.
    pub fn commit(&mut self) -> Result<EntitySet> {
        let event = PreCommitEvent::new(
            self.modified.iter().cloned().collect(),
            self.removed.keys().cloned().collect(),
        );
        self.events.publish_pre_commit(&event);
        if event.is_commit_prevented() {
            tracing::debug!("Commit prevented by listener");
            return Ok(EntitySet::new());
        }

        let context = CommitContext {
            commit_instances: self.modified_instances().into_iter().cloned().collect(),
            remove_instances: self.removed.values().cloned().collect(),
        };

        let delegate = self
            .commit_delegate
            .as_mut()
            .ok_or(DataContextError::NoCommitDelegate)?;
        let saved = delegate.commit(&context)?;

        let graph: EntityGraph = saved.into_iter().collect();
        let committed = self.merge_all(&graph)?;

        self.modified.clear();
        self.removed.clear();

        metrics::counter!("security.data_context.commits").increment(1);
        tracing::debug!(
            committed = committed.len(),
            removed = context.remove_instances.len(),
            "Committed data context"
        );

        self.events.publish_post_commit(&PostCommitEvent {
            committed: committed.clone(),
        });
        Ok(committed)
    }

    pub fn add_change_listener(&mut self, listener: impl FnMut(&ChangeEvent) + 'static) -> Subscription {
        self.events.subscribe_change(listener)
    }

    pub fn add_pre_commit_listener(&mut self, listener: impl FnMut(&PreCommitEvent) + 'static) -> Subscription {
        self.events.subscribe_pre_commit(listener)
    }

    pub fn add_post_commit_listener(&mut self, listener: impl FnMut(&PostCommitEvent) + 'static) -> Subscription {
        self.events.subscribe_post_commit(listener)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.events.unsubscribe(subscription)
    }

    /// Marks the instance, and the owner of an embedded instance, modified.
    fn mark_modified(&mut self, key: &EntityKey) {
        if self.disable_listeners {
            return;
        }
        self.modified.insert(key.clone());
        self.fire_change(key);

        if let Some(owner) = self.embedded_owners.get(key).cloned() {
            self.modified.insert(owner.clone());
            self.fire_change(&owner);
        }
    }

    fn fire_change(&mut self, key: &EntityKey) {
        self.events.publish_change(&ChangeEvent { entity: key.clone() });
    }

    fn managed_nn(&self, key: &EntityKey) -> Result<&Entity> {
        self.find_by_key(key)
            .ok_or_else(|| DataContextError::NotManaged(key.clone()))
    }

    fn managed_mut_nn(&mut self, key: &EntityKey) -> Result<&mut Entity> {
        self.content
            .get_mut(&key.entity_name)
            .and_then(|m| m.get_mut(&key.id))
            .ok_or_else(|| DataContextError::NotManaged(key.clone()))
    }
}
