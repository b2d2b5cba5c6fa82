//! Entities: storage, resolution and write-through views
//!
//! An [`Entity`] is a cheap handle. The owner (created with [`Entity::new`] or
//! by the catalog) holds one [`Stratum`] per stratum name. Nested entities are
//! views that share the owner's storage and carry a path into it.
//!
//! # Locking
//!
//! All handles of one owner share:
//!
//! - `storage`: `RwLock` over the strata and a version counter bumped by
//!   every write
//! - `views`: `Mutex` over the view cache (path to `Weak` handle)
//! - `element_ids`: `Mutex` over memoized object-array id lists, tagged with
//!   the storage version they were computed at
//!
//! Lock order is always `storage` then one of the mutexes. Listeners are
//! called after `storage` is released.

use crate::notify::{ListenerSet, SubscriptionId, TraitChanged};
use crate::resolve::{self, ElementSpec, Layer};
use crate::serialize::{self, stratum_to_json};
use crate::view::{self, PathSegment, ViewPath, ViewStep};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use strata_core::{
    ModelReference, StrataError, StrataResult, Stratum, StratumOrder, TraitValue,
};
use strata_schema::{IdProperty, TraitKind, TraitSchema};
use tracing::{debug, trace};

/// Strata of one owner
#[derive(Debug, Default)]
struct Storage {
    strata: HashMap<String, Stratum>,
    version: u64,
}

/// State shared by an owner and all of its views
struct Owner {
    id: String,
    kind: Option<String>,
    order: StratumOrder,
    storage: RwLock<Storage>,
    views: Mutex<ViewCache>,
    element_ids: Mutex<HashMap<ViewPath, (u64, Arc<Vec<String>>)>>,
    listeners: ListenerSet,
}

/// Path to `Weak` handle; dead entries are pruned whenever the map doubles
#[derive(Default)]
struct ViewCache {
    views: HashMap<ViewPath, Weak<EntityInner>>,
    prune_at: usize,
}

impl ViewCache {
    fn get(&self, path: &ViewPath) -> Option<Arc<EntityInner>> {
        self.views.get(path).and_then(Weak::upgrade)
    }

    fn insert(&mut self, path: ViewPath, inner: &Arc<EntityInner>) {
        if self.views.len() >= self.prune_at {
            self.views.retain(|_, weak| weak.strong_count() > 0);
            self.prune_at = (self.views.len() * 2).max(MIN_VIEW_PRUNE);
        }
        self.views.insert(path, Arc::downgrade(inner));
    }
}

const MIN_VIEW_PRUNE: usize = 64;

struct EntityInner {
    owner: Arc<Owner>,
    schema: Arc<TraitSchema>,
    steps: SmallVec<[ViewStep; 4]>,
    path: ViewPath,
}

/// Handle to an entity or to a view nested inside one
///
/// Cloning is cheap and clones compare equal under [`Entity::ptr_eq`].
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    /// Create a standalone owner with a random id
    pub fn new(schema: Arc<TraitSchema>, order: StratumOrder) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), schema, order)
    }

    /// Create a standalone owner with the given id
    pub fn with_id(id: impl Into<String>, schema: Arc<TraitSchema>, order: StratumOrder) -> Self {
        Self::create(id.into(), None, schema, order)
    }

    pub(crate) fn create(
        id: String,
        kind: Option<String>,
        schema: Arc<TraitSchema>,
        order: StratumOrder,
    ) -> Self {
        debug!(id = %id, kind = ?kind, schema = schema.name(), "Created entity");
        let owner = Arc::new(Owner {
            id,
            kind,
            order,
            storage: RwLock::new(Storage::default()),
            views: Mutex::new(ViewCache::default()),
            element_ids: Mutex::new(HashMap::new()),
            listeners: ListenerSet::default(),
        });
        Entity {
            inner: Arc::new(EntityInner {
                owner,
                schema,
                steps: SmallVec::new(),
                path: ViewPath::new(),
            }),
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Id of the owner (views report their owner's id)
    pub fn id(&self) -> &str {
        &self.inner.owner.id
    }

    /// Kind the catalog created this entity as
    pub fn kind(&self) -> Option<&str> {
        self.inner.owner.kind.as_deref()
    }

    /// Schema this handle resolves against
    pub fn schema(&self) -> &Arc<TraitSchema> {
        &self.inner.schema
    }

    /// Stratum order of the owner
    pub fn order(&self) -> &StratumOrder {
        &self.inner.owner.order
    }

    /// Path from the owner to this view (empty for the owner)
    pub fn path(&self) -> &[PathSegment] {
        &self.inner.path
    }

    /// True for nested views
    pub fn is_view(&self) -> bool {
        !self.inner.path.is_empty()
    }

    /// True if both handles are the same entity or view
    pub fn ptr_eq(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True if both handles share storage
    pub fn same_owner(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner.owner, &other.inner.owner)
    }

    /// Storage version, bumped by every write to the owner
    pub fn version(&self) -> u64 {
        self.inner.owner.storage.read().version
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Projected layers for this handle, highest priority first
    fn layers<'s>(&self, storage: &'s Storage) -> Vec<Layer<'s>> {
        let order = &self.inner.owner.order;
        let names = order.sort_top_to_bottom(storage.strata.keys().map(String::as_str));
        let root: Vec<Layer<'s>> = names
            .into_iter()
            .filter_map(|name| storage.strata.get_key_value(name))
            .map(|(name, bag)| (name.as_str(), bag))
            .collect();
        view::project_layers(root, &self.inner.steps)
    }

    /// Resolved value of a trait
    ///
    /// Scalars, opaque values and primitive arrays take the first value found
    /// top to bottom, else the declared default. Object traits resolve to the
    /// flattened nested view, object arrays to the flattened elements and
    /// reference arrays to the surviving ids. `None` if the trait is unknown
    /// or nothing (not even a default) supplies it.
    pub fn get(&self, trait_id: &str) -> Option<TraitValue> {
        let Some(decl) = self.inner.schema.get(trait_id) else {
            debug!(schema = self.inner.schema.name(), trait_id, "Read of undeclared trait");
            return None;
        };

        let top = {
            let storage = self.inner.owner.storage.read();
            let layers = self.layers(&storage);
            resolve::resolve_first(&layers, trait_id).cloned()
        };

        match decl.kind() {
            TraitKind::Scalar { .. } | TraitKind::PrimitiveArray { .. } | TraitKind::Opaque => {
                top.or_else(|| decl.default_value().cloned())
            }
            TraitKind::Object { .. } => match top {
                None | Some(TraitValue::Null) => top,
                Some(_) => self
                    .get_object(trait_id)
                    .map(|nested| TraitValue::Object(nested.resolved_bag())),
            },
            TraitKind::ObjectArray { .. } => match top {
                None | Some(TraitValue::Null) => top,
                Some(_) => Some(TraitValue::ObjectArray(
                    self.get_object_array(trait_id)
                        .iter()
                        .map(Entity::resolved_bag)
                        .collect(),
                )),
            },
            TraitKind::ReferenceArray { .. } => match top {
                None | Some(TraitValue::Null) => top,
                Some(_) => Some(TraitValue::References(
                    self.get_references(trait_id)
                        .into_iter()
                        .map(ModelReference::Id)
                        .collect(),
                )),
            },
        }
    }

    /// Resolved string trait
    pub fn get_string(&self, trait_id: &str) -> Option<String> {
        self.get(trait_id).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Resolved numeric trait (integers widen)
    pub fn get_number(&self, trait_id: &str) -> Option<f64> {
        self.get(trait_id).and_then(|v| v.as_number())
    }

    /// Resolved boolean trait
    pub fn get_bool(&self, trait_id: &str) -> Option<bool> {
        self.get(trait_id).and_then(|v| v.as_bool())
    }

    /// Name of the stratum supplying the resolved value of a trait
    ///
    /// `None` if no stratum sets it (the default, if any, applies).
    pub fn source_stratum(&self, trait_id: &str) -> Option<String> {
        let storage = self.inner.owner.storage.read();
        let layers = self.layers(&storage);
        resolve::source_of(&layers, trait_id).map(str::to_string)
    }

    /// Nested view for an object trait
    ///
    /// Always available for a declared object trait, even when no stratum sets
    /// it yet: writes through the view allocate the path. Repeated calls return
    /// the same handle while any clone of it is alive.
    pub fn get_object(&self, trait_id: &str) -> Option<Entity> {
        let decl = self.inner.schema.get(trait_id)?;
        let TraitKind::Object { schema } = decl.kind() else {
            debug!(trait_id, kind = %decl.kind().kind_name(), "Not an object trait");
            return None;
        };
        let schema = schema.get()?.clone();
        Some(self.view(
            ViewStep::Field {
                trait_id: trait_id.to_string(),
            },
            schema,
        ))
    }

    /// Views of the resolved elements of an object-array trait
    pub fn get_object_array(&self, trait_id: &str) -> Vec<Entity> {
        let Some(template) = self.element_template(trait_id) else {
            return Vec::new();
        };
        self.element_ids(trait_id)
            .iter()
            .map(|id| self.element_view(&template, id))
            .collect()
    }

    /// View of one resolved element of an object-array trait
    pub fn get_element(&self, trait_id: &str, element_id: &str) -> Option<Entity> {
        let template = self.element_template(trait_id)?;
        if !self.element_ids(trait_id).iter().any(|id| id == element_id) {
            return None;
        }
        Some(self.element_view(&template, element_id))
    }

    /// Resolved element ids of an object-array trait
    ///
    /// Memoized per storage version.
    pub fn element_ids(&self, trait_id: &str) -> Arc<Vec<String>> {
        let Some(template) = self.element_template(trait_id) else {
            return Arc::new(Vec::new());
        };
        let ViewStep::Element {
            id_property,
            merge,
            schema,
            ..
        } = &template
        else {
            return Arc::new(Vec::new());
        };

        let mut key = self.inner.path.clone();
        key.push(PathSegment::Field(trait_id.to_string()));

        let storage = self.inner.owner.storage.read();
        if let Some((version, ids)) = self.inner.owner.element_ids.lock().get(&key) {
            if *version == storage.version {
                trace!(trait_id, "Element ids cache hit");
                return ids.clone();
            }
        }

        let layers = self.layers(&storage);
        let ids = Arc::new(resolve::resolve_element_ids(
            &layers,
            ElementSpec {
                trait_id,
                id_property,
                schema,
                merge: *merge,
            },
        ));
        self.inner
            .owner
            .element_ids
            .lock()
            .insert(key, (storage.version, ids.clone()));
        ids
    }

    /// Resolved ids of a reference-array trait
    pub fn get_references(&self, trait_id: &str) -> Vec<String> {
        match self.inner.schema.get(trait_id).map(|d| d.kind()) {
            Some(TraitKind::ReferenceArray { .. }) => {}
            _ => return Vec::new(),
        }
        let storage = self.inner.owner.storage.read();
        let layers = self.layers(&storage);
        resolve::resolve_reference_ids(&layers, trait_id)
    }

    /// Names of the strata this handle sees, highest priority first
    ///
    /// For a view, only the strata where its path exists (and is not cut off
    /// by a tombstone).
    pub fn strata_top_to_bottom(&self) -> Vec<String> {
        let storage = self.inner.owner.storage.read();
        self.layers(&storage)
            .into_iter()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Copy of this handle's bag in one stratum
    pub fn stratum(&self, name: &str) -> Option<Stratum> {
        let storage = self.inner.owner.storage.read();
        let bag = storage.strata.get(name)?;
        view::locate(bag, &self.inner.steps).cloned()
    }

    /// Every trait that resolves to a value, flattened
    ///
    /// Nested objects and arrays are flattened recursively.
    pub fn resolved_bag(&self) -> Stratum {
        self.inner
            .schema
            .traits()
            .iter()
            .filter_map(|decl| self.get(decl.id()).map(|value| (decl.id().to_string(), value)))
            .collect()
    }

    /// [`Entity::resolved_bag`] as JSON
    pub fn resolved_json(&self) -> Value {
        stratum_to_json(&self.inner.schema, &self.resolved_bag())
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Set a trait in one stratum
    ///
    /// The stratum must be registered and the value must fit the declaration.
    /// For a view, the path is allocated inside the owner's stratum.
    pub fn set_trait(
        &self,
        stratum: &str,
        trait_id: &str,
        value: impl Into<TraitValue>,
    ) -> StrataResult<()> {
        let value = value.into();
        self.inner.owner.order.require(stratum)?;
        let decl = self.inner.schema.require(trait_id, stratum)?;
        serialize::validate_value(&self.inner.schema, decl, stratum, &value)?;

        self.write(stratum, |bag| {
            bag.set(trait_id.to_string(), value);
        });
        trace!(id = %self.id(), stratum, trait_id, "Set trait");
        self.notify(stratum, Some(trait_id));
        Ok(())
    }

    /// Remove a trait from one stratum, returning the old value
    ///
    /// Clearing never allocates: clearing a path that doesn't exist is a no-op.
    pub fn clear_trait(&self, stratum: &str, trait_id: &str) -> StrataResult<Option<TraitValue>> {
        self.inner.schema.require(trait_id, stratum)?;
        let previous = {
            let mut storage = self.inner.owner.storage.write();
            let previous = storage
                .strata
                .get_mut(stratum)
                .and_then(|bag| view::locate_mut(bag, &self.inner.steps))
                .and_then(|bag| bag.remove(trait_id));
            if previous.is_some() {
                storage.version += 1;
            }
            previous
        };
        if previous.is_some() {
            trace!(id = %self.id(), stratum, trait_id, "Cleared trait");
            self.notify(stratum, Some(trait_id));
        }
        Ok(previous)
    }

    /// Set several traits in one stratum, keeping the others
    ///
    /// The whole bag is validated before anything is written.
    pub fn merge_stratum(&self, stratum: &str, bag: Stratum) -> StrataResult<()> {
        self.inner.owner.order.require(stratum)?;
        serialize::validate_stratum(&self.inner.schema, stratum, &bag)?;
        if bag.is_empty() {
            return Ok(());
        }
        let written: Vec<String> = bag.iter().map(|(k, _)| k.clone()).collect();
        self.write(stratum, |target| {
            for (key, value) in bag.iter() {
                target.set(key.clone(), value.clone());
            }
        });
        for trait_id in &written {
            self.notify(stratum, Some(trait_id));
        }
        Ok(())
    }

    /// Replace a whole stratum of the owner
    pub fn set_stratum(&self, name: &str, bag: Stratum) -> StrataResult<()> {
        self.require_owner("set_stratum")?;
        self.inner.owner.order.require(name)?;
        serialize::validate_stratum(&self.inner.schema, name, &bag)?;
        {
            let mut storage = self.inner.owner.storage.write();
            storage.strata.insert(name.to_string(), bag);
            storage.version += 1;
        }
        debug!(id = %self.id(), stratum = name, "Replaced stratum");
        self.notify(name, None);
        Ok(())
    }

    /// Drop a whole stratum of the owner, returning it
    pub fn remove_stratum(&self, name: &str) -> StrataResult<Option<Stratum>> {
        self.require_owner("remove_stratum")?;
        let removed = {
            let mut storage = self.inner.owner.storage.write();
            let removed = storage.strata.remove(name);
            if removed.is_some() {
                storage.version += 1;
            }
            removed
        };
        if removed.is_some() {
            debug!(id = %self.id(), stratum = name, "Removed stratum");
            self.notify(name, None);
        }
        Ok(removed)
    }

    /// Add an element to an object-array trait in one stratum
    ///
    /// With an id, the element is created (or reused, if that stratum already
    /// has it) with its id field set; a reused removal marker is turned back
    /// into a live element. Without one, a fresh id is generated: a uuid for
    /// field ids, one past the largest id in any stratum for index ids.
    /// Returns the element's view.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the trait is not an object array, `InvalidOperation`
    /// for an index id that is not a non-negative integer or a removal marker
    /// that cannot be revived.
    pub fn add_object(
        &self,
        stratum: &str,
        trait_id: &str,
        element_id: Option<&str>,
    ) -> StrataResult<Entity> {
        self.inner.owner.order.require(stratum)?;
        let decl = self.inner.schema.require(trait_id, stratum)?;
        let Some(template) = self.element_template(trait_id) else {
            return Err(StrataError::type_mismatch(
                self.inner.schema.name(),
                trait_id,
                stratum,
                "objectArray",
                decl.kind().kind_name(),
            ));
        };
        let ViewStep::Element {
            id_property,
            schema,
            ..
        } = &template
        else {
            return Err(StrataError::invalid_operation("object array without element step"));
        };
        let requested = match (element_id, id_property) {
            (Some(id), IdProperty::Index) => Some(
                view::parse_index(id)
                    .ok_or_else(|| {
                        StrataError::invalid_operation(format!(
                            "'{id}' is not a valid index id for '{trait_id}'"
                        ))
                    })?
                    .to_string(),
            ),
            (id, _) => id.map(str::to_string),
        };

        let element_id = {
            let mut storage = self.inner.owner.storage.write();
            let element_id = match (requested, id_property) {
                (Some(id), _) => id,
                (None, IdProperty::Field(_)) => uuid::Uuid::new_v4().to_string(),
                (None, IdProperty::Index) => self.next_index(&storage, trait_id).to_string(),
            };

            let bag = storage.strata.entry(stratum.to_string()).or_default();
            let elements = view::allocate(bag, &self.inner.steps)
                .entry(trait_id.to_string())
                .or_insert(TraitValue::Null)
                .make_object_array();
            let live = match resolve::find_element(elements, id_property, &element_id) {
                Some(position) => view::revive_element(schema, &mut elements[position]),
                None => {
                    view::push_element(elements, id_property, schema, &element_id);
                    true
                }
            };
            storage.version += 1;
            if !live {
                return Err(StrataError::invalid_operation(format!(
                    "element '{element_id}' of '{trait_id}' is a removal marker in '{stratum}'"
                )));
            }
            element_id
        };
        debug!(id = %self.id(), stratum, trait_id, element_id = %element_id, "Added element");
        self.notify(stratum, Some(trait_id));

        Ok(self.element_view(&template, &element_id))
    }

    /// Import a JSON stratum and merge it into this handle (strict)
    pub fn update_from_json(&self, stratum: &str, json: &Value) -> StrataResult<()> {
        let bag = serialize::stratum_from_json(&self.inner.schema, stratum, json)?;
        self.merge_stratum(stratum, bag)
    }

    /// Export the owner as `{id, type, strata: {name: {...}}}`
    ///
    /// Empty strata are omitted. For a view, exports the view's bags.
    pub fn to_json(&self) -> Value {
        let storage = self.inner.owner.storage.read();
        let names = self
            .inner
            .owner
            .order
            .sort_top_to_bottom(storage.strata.keys().map(String::as_str));
        let mut strata = Map::new();
        for name in names {
            let Some(bag) = storage
                .strata
                .get(name)
                .and_then(|bag| view::locate(bag, &self.inner.steps))
            else {
                continue;
            };
            if bag.is_empty() {
                continue;
            }
            strata.insert(name.to_string(), stratum_to_json(&self.inner.schema, bag));
        }

        let mut out = Map::new();
        out.insert("id".into(), Value::String(self.id().to_string()));
        if let Some(kind) = self.kind() {
            out.insert("type".into(), Value::String(kind.to_string()));
        }
        out.insert("strata".into(), Value::Object(strata));
        Value::Object(out)
    }

    /// Export one stratum of this handle, `None` if it has no bag there
    pub fn stratum_to_json(&self, name: &str) -> Option<Value> {
        self.stratum(name)
            .map(|bag| stratum_to_json(&self.inner.schema, &bag))
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    /// Register a listener for every write to the owner or any of its views
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&TraitChanged) + Send + Sync + 'static,
    {
        self.inner.owner.listeners.subscribe(Arc::new(listener))
    }

    /// Remove a listener, returning false if it was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.owner.listeners.unsubscribe(id)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn require_owner(&self, operation: &str) -> StrataResult<()> {
        if self.is_view() {
            return Err(StrataError::invalid_operation(format!(
                "{operation} is only valid on the owning entity, not on a nested view"
            )));
        }
        Ok(())
    }

    /// Run `f` on this handle's bag in `stratum`, allocating the path
    fn write<R>(&self, stratum: &str, f: impl FnOnce(&mut Stratum) -> R) -> R {
        let mut storage = self.inner.owner.storage.write();
        let result = {
            let bag = storage.strata.entry(stratum.to_string()).or_default();
            f(view::allocate(bag, &self.inner.steps))
        };
        storage.version += 1;
        result
    }

    fn notify(&self, stratum: &str, trait_id: Option<&str>) {
        self.inner.owner.listeners.notify(&TraitChanged {
            entity_id: self.id().to_string(),
            stratum: stratum.to_string(),
            path: self.inner.path.to_vec(),
            trait_id: trait_id.map(str::to_string),
        });
    }

    /// Next free index id of `trait_id`, across every stratum of the owner
    fn next_index(&self, storage: &Storage, trait_id: &str) -> usize {
        resolve::next_index(
            storage
                .strata
                .values()
                .filter_map(|bag| view::locate(bag, &self.inner.steps))
                .filter_map(|bag| bag.get(trait_id)?.as_object_array()),
        )
    }

    /// An element step for `trait_id` with a blank element id
    fn element_template(&self, trait_id: &str) -> Option<ViewStep> {
        let decl = self.inner.schema.get(trait_id)?;
        match decl.kind() {
            TraitKind::ObjectArray {
                schema,
                id_property,
                merge,
            } => Some(ViewStep::Element {
                trait_id: trait_id.to_string(),
                element_id: String::new(),
                id_property: id_property.clone(),
                merge: *merge,
                schema: schema.get()?.clone(),
            }),
            _ => None,
        }
    }

    fn element_view(&self, template: &ViewStep, element_id: &str) -> Entity {
        let mut step = template.clone();
        if let ViewStep::Element { element_id: id, .. } = &mut step {
            *id = element_id.to_string();
        }
        let schema = match &step {
            ViewStep::Element { schema, .. } => schema.clone(),
            ViewStep::Field { .. } => self.inner.schema.clone(),
        };
        self.view(step, schema)
    }

    /// Cached view one step below this handle
    fn view(&self, step: ViewStep, schema: Arc<TraitSchema>) -> Entity {
        let mut path = self.inner.path.clone();
        path.push(step.segment());

        let mut views = self.inner.owner.views.lock();
        if let Some(inner) = views.get(&path) {
            return Entity { inner };
        }

        let mut steps = self.inner.steps.clone();
        steps.push(step);
        let inner = Arc::new(EntityInner {
            owner: self.inner.owner.clone(),
            schema,
            steps,
            path: path.clone(),
        });
        trace!(id = %self.id(), depth = path.len(), "Created view");
        views.insert(path, &inner);
        Entity { inner }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("schema", &self.inner.schema.name())
            .field("path", &self.inner.path)
            .finish()
    }
}
