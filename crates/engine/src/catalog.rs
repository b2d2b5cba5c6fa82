//! Catalog: process-scoped context for entities
//!
//! Owns the shared [`StratumOrder`], the kind factory (kind name to schema)
//! and the entity registry used to resolve reference arrays. There is no
//! implicit global: the application creates one catalog at startup, registers
//! its kinds and strata, and passes it where lookups are needed.

use crate::config::CatalogConfig;
use crate::entity::Entity;
use crate::serialize::{import_stratum, json_type_name};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use strata_core::{Limits, StrataError, StrataResult, StratumOrder};
use strata_schema::{describe_with, DescribeOptions, TraitKind, TraitSchema};
use tracing::{debug, info, warn};

struct CatalogInner {
    order: StratumOrder,
    kinds: RwLock<HashMap<String, Arc<TraitSchema>>>,
    entities: DashMap<String, Entity>,
    config: CatalogConfig,
    limits: Limits,
}

/// Handle to a catalog; clones share state
#[derive(Clone)]
pub struct Catalog {
    inner: Arc<CatalogInner>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Catalog with the default configuration (common strata, strict import)
    pub fn new() -> Self {
        Self::build(StratumOrder::with_common_strata(), CatalogConfig::default())
    }

    /// Catalog configured from `config`
    ///
    /// # Errors
    ///
    /// `StratumOrderConflict` if an extra stratum collides with a registered one.
    pub fn from_config(config: &CatalogConfig) -> StrataResult<Self> {
        let order = if config.register_common_strata {
            StratumOrder::with_common_strata()
        } else {
            StratumOrder::new()
        };
        for stratum in &config.strata {
            order.register(&stratum.name, stratum.priority)?;
        }
        Ok(Self::build(order, config.clone()))
    }

    fn build(order: StratumOrder, config: CatalogConfig) -> Self {
        Catalog {
            inner: Arc::new(CatalogInner {
                order,
                kinds: RwLock::new(HashMap::new()),
                entities: DashMap::new(),
                config,
                limits: Limits::default(),
            }),
        }
    }

    /// Shared stratum order
    pub fn order(&self) -> &StratumOrder {
        &self.inner.order
    }

    /// Active configuration
    pub fn config(&self) -> &CatalogConfig {
        &self.inner.config
    }

    // ========================================================================
    // Kinds
    // ========================================================================

    /// Register the schema used for entities of `kind`
    ///
    /// Re-registering a kind replaces its schema for entities created later.
    pub fn register_kind(&self, kind: &str, schema: Arc<TraitSchema>) {
        info!(kind, schema = schema.name(), traits = schema.len(), "Registered entity kind");
        if let Some(previous) = self.inner.kinds.write().insert(kind.to_string(), schema) {
            warn!(kind, previous = previous.name(), "Replaced entity kind schema");
        }
    }

    /// Schema registered for `kind`
    pub fn schema_for(&self, kind: &str) -> Option<Arc<TraitSchema>> {
        self.inner.kinds.read().get(kind).cloned()
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.inner.kinds.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// JSON-Schema-shaped description of a kind's schema
    pub fn describe_kind(&self, kind: &str) -> Option<Value> {
        let schema = self.schema_for(kind)?;
        let options = DescribeOptions {
            schema_uri: self.inner.config.describe.schema_uri.clone(),
        };
        Some(describe_with(&schema, &options))
    }

    // ========================================================================
    // Entities
    // ========================================================================

    /// Create and register an entity of `kind`
    ///
    /// Without an id, a random UUID is used.
    pub fn create_entity(&self, kind: &str, id: Option<&str>) -> StrataResult<Entity> {
        let schema = self
            .schema_for(kind)
            .ok_or_else(|| StrataError::UnknownEntityKind {
                kind: kind.to_string(),
            })?;
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        match self.inner.entities.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StrataError::DuplicateEntity { id }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let entity = Entity::create(
                    id,
                    Some(kind.to_string()),
                    schema,
                    self.inner.order.clone(),
                );
                slot.insert(entity.clone());
                Ok(entity)
            }
        }
    }

    /// Look up an entity by id
    pub fn get(&self, id: &str) -> Option<Entity> {
        self.inner.entities.get(id).map(|e| e.value().clone())
    }

    /// Look up an entity by id, failing with `EntityNotFound`
    pub fn require(&self, id: &str) -> StrataResult<Entity> {
        self.get(id).ok_or_else(|| StrataError::EntityNotFound { id: id.to_string() })
    }

    /// Unregister an entity; existing handles keep working
    pub fn remove(&self, id: &str) -> Option<Entity> {
        let removed = self.inner.entities.remove(id).map(|(_, e)| e);
        if removed.is_some() {
            debug!(id, "Removed entity");
        }
        removed
    }

    /// Registered entity ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.entities.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.inner.entities.len()
    }

    /// True if no entity is registered
    pub fn is_empty(&self) -> bool {
        self.inner.entities.is_empty()
    }

    /// Resolve a reference-array trait to live entities
    ///
    /// Ids with no registered entity, or whose kind doesn't match the
    /// declared target kind, are skipped.
    pub fn resolve_references(&self, entity: &Entity, trait_id: &str) -> Vec<Entity> {
        let target_kind = match entity.schema().get(trait_id).map(|d| d.kind()) {
            Some(TraitKind::ReferenceArray { target_kind }) => target_kind.clone(),
            _ => return Vec::new(),
        };
        entity
            .get_references(trait_id)
            .into_iter()
            .filter_map(|id| {
                let Some(found) = self.get(&id) else {
                    debug!(trait_id, id = %id, "Skipping reference to unknown entity");
                    return None;
                };
                if let Some(expected) = &target_kind {
                    if found.kind() != Some(expected.as_str()) {
                        debug!(trait_id, id = %id, expected = %expected, actual = ?found.kind(), "Skipping reference of wrong kind");
                        return None;
                    }
                }
                Some(found)
            })
            .collect()
    }

    // ========================================================================
    // JSON
    // ========================================================================

    /// Load `{id, type, ...traits}` into `stratum`
    ///
    /// Creates the entity if the id is new; otherwise merges into it. Any
    /// rejected key fails the load before anything is written, whatever
    /// `strict_import` says: this call has no way to hand dropped keys back.
    /// Lenient callers use [`Catalog::load_json_with_report`].
    pub fn load_json(&self, stratum: &str, json: &Value) -> StrataResult<Entity> {
        self.load(stratum, json, true).map(|(entity, _)| entity)
    }

    /// [`Catalog::load_json`] following `strict_import`
    ///
    /// When strict, any problem fails the load before anything is written.
    /// When lenient, the valid subset loads and the rejected keys are returned.
    pub fn load_json_with_report(
        &self,
        stratum: &str,
        json: &Value,
    ) -> StrataResult<(Entity, Vec<StrataError>)> {
        self.load(stratum, json, self.inner.config.strict_import)
    }

    fn load(&self, stratum: &str, json: &Value, strict: bool) -> StrataResult<(Entity, Vec<StrataError>)> {
        self.inner.order.require(stratum)?;
        let object = json.as_object().ok_or_else(|| {
            StrataError::type_mismatch("catalog", "(root)", stratum, "object", json_type_name(json))
        })?;
        let id = string_field(object, "id", stratum)?;
        let kind = string_field(object, "type", stratum)?;
        let schema = self.schema_for(kind).ok_or_else(|| StrataError::UnknownEntityKind {
            kind: kind.to_string(),
        })?;

        let traits: Map<String, Value> = object
            .iter()
            .filter(|(key, _)| key.as_str() != "id" && key.as_str() != "type")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let report = import_stratum(&schema, stratum, &Value::Object(traits), &self.inner.limits);

        if strict && !report.is_clean() {
            return Err(report.into_result().err().unwrap_or_else(|| {
                StrataError::invalid_operation("import reported errors but none were kept")
            }));
        }
        for err in &report.errors {
            warn!(id, kind, stratum, error = %err, "Dropped key during import");
        }

        let entity = match self.get(id) {
            Some(existing) if existing.kind() == Some(kind) => existing,
            Some(_) => return Err(StrataError::DuplicateEntity { id: id.to_string() }),
            None => self.create_entity(kind, Some(id))?,
        };
        entity.merge_stratum(stratum, report.stratum)?;
        debug!(id, kind, stratum, "Loaded entity");
        Ok((entity, report.errors))
    }
}

fn string_field<'a>(object: &'a Map<String, Value>, field: &str, stratum: &str) -> StrataResult<&'a str> {
    match object.get(field) {
        Some(Value::String(value)) => Ok(value),
        other => Err(StrataError::type_mismatch(
            "catalog",
            field,
            stratum,
            "string",
            other.map(json_type_name).unwrap_or("missing"),
        )),
    }
}
