//! Stratum order registry
//!
//! Every stratum name an entity can hold must be registered here with a
//! priority before anything is written into it. Higher priorities sit nearer
//! the top: resolution walks strata from the highest priority down.
//!
//! ## Bands
//!
//! | Band | Priority | Names |
//! |------|----------|-------|
//! | defaults | 0 | `defaults` |
//! | inherited | 50 | `inheritedFromParentGroup` |
//! | load | 100..=499 | assigned by [`StratumOrder::add_load_stratum`] |
//! | underride | 500 | `underride` |
//! | definition | 1000..=1999 | `definition`, then [`StratumOrder::add_definition_stratum`] |
//! | user | 2000..=2999 | `user`, then [`StratumOrder::add_user_stratum`] |
//! | override | 3000 | `override` |
//!
//! Registration is append-only. Registering the same name with the same priority
//! again is a no-op; a different priority is a `StratumOrderConflict`.

use crate::error::{StrataError, StrataResult};
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Names of the strata shared by every entity kind
#[derive(Debug, Clone, Copy)]
pub struct CommonStrata;

impl CommonStrata {
    /// Values built into the application
    pub const DEFAULTS: &'static str = "defaults";
    /// Values copied from the group an entity was loaded from
    pub const INHERITED_FROM_PARENT_GROUP: &'static str = "inheritedFromParentGroup";
    /// Values that sit below the definition but above loaded metadata
    pub const UNDERRIDE: &'static str = "underride";
    /// Values from the catalog definition
    pub const DEFINITION: &'static str = "definition";
    /// Values set by the user
    pub const USER: &'static str = "user";
    /// Values that win over everything else
    pub const OVERRIDE: &'static str = "override";
}

/// Priority of the `defaults` stratum
pub const DEFAULTS_PRIORITY: i32 = 0;
/// Priority of the `inheritedFromParentGroup` stratum
pub const INHERITED_PRIORITY: i32 = 50;
/// First priority handed out to load strata
pub const LOAD_BAND_START: i32 = 100;
/// Last priority available to load strata
pub const LOAD_BAND_END: i32 = 499;
/// Priority of the `underride` stratum
pub const UNDERRIDE_PRIORITY: i32 = 500;
/// Priority of the `definition` stratum
pub const DEFINITION_PRIORITY: i32 = 1000;
/// Last priority available to definition strata
pub const DEFINITION_BAND_END: i32 = 1999;
/// Priority of the `user` stratum
pub const USER_PRIORITY: i32 = 2000;
/// Last priority available to user strata
pub const USER_BAND_END: i32 = 2999;
/// Priority of the `override` stratum
pub const OVERRIDE_PRIORITY: i32 = 3000;

const COMMON_STRATA: [(&str, i32); 6] = [
    (CommonStrata::DEFAULTS, DEFAULTS_PRIORITY),
    (CommonStrata::INHERITED_FROM_PARENT_GROUP, INHERITED_PRIORITY),
    (CommonStrata::UNDERRIDE, UNDERRIDE_PRIORITY),
    (CommonStrata::DEFINITION, DEFINITION_PRIORITY),
    (CommonStrata::USER, USER_PRIORITY),
    (CommonStrata::OVERRIDE, OVERRIDE_PRIORITY),
];

#[derive(Debug)]
struct OrderState {
    priorities: HashMap<String, i32>,
    next_load: i32,
    next_definition: i32,
    next_user: i32,
}

impl Default for OrderState {
    fn default() -> Self {
        Self {
            priorities: HashMap::new(),
            next_load: LOAD_BAND_START,
            next_definition: DEFINITION_PRIORITY + 1,
            next_user: USER_PRIORITY + 1,
        }
    }
}

/// Top-to-bottom priority ranking of stratum names
///
/// Cheap to clone: clones share the same registrations. A catalog owns one and
/// hands it to every entity it creates.
#[derive(Debug, Clone, Default)]
pub struct StratumOrder {
    state: Arc<RwLock<OrderState>>,
}

impl StratumOrder {
    /// Create an empty order
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an order with every [`CommonStrata`] name registered
    pub fn with_common_strata() -> Self {
        let mut state = OrderState::default();
        for (name, priority) in COMMON_STRATA {
            state.priorities.insert(name.to_string(), priority);
        }
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Register every [`CommonStrata`] name at its standard priority
    ///
    /// # Errors
    ///
    /// Returns `StratumOrderConflict` if one of the names is already
    /// registered with a different priority. Names before it stay registered.
    pub fn register_common_strata(&self) -> StrataResult<()> {
        COMMON_STRATA
            .into_iter()
            .try_for_each(|(name, priority)| self.register(name, priority))
    }

    /// Register `name` at `priority`
    ///
    /// # Errors
    ///
    /// Returns `StratumOrderConflict` if `name` is already registered with a
    /// different priority.
    pub fn register(&self, name: &str, priority: i32) -> StrataResult<()> {
        let mut state = self.state.write();
        match state.priorities.get(name) {
            Some(&existing) if existing == priority => Ok(()),
            Some(&existing) => Err(StrataError::StratumOrderConflict {
                name: name.to_string(),
                existing,
                requested: priority,
            }),
            None => {
                info!(stratum = name, priority, "Registered stratum");
                state.priorities.insert(name.to_string(), priority);
                Ok(())
            }
        }
    }

    /// Register `name` in the defaults band
    pub fn add_default_stratum(&self, name: &str) -> StrataResult<i32> {
        self.register(name, DEFAULTS_PRIORITY)?;
        Ok(DEFAULTS_PRIORITY)
    }

    /// Register a stratum holding data loaded from a remote source
    ///
    /// Each new name gets the next free priority in the load band, so later
    /// load strata sit above earlier ones. Returns the existing priority if the
    /// name is already registered.
    pub fn add_load_stratum(&self, name: &str) -> StrataResult<i32> {
        self.add_in_band(name, Band::Load)
    }

    /// Register an extra stratum in the definition band
    pub fn add_definition_stratum(&self, name: &str) -> StrataResult<i32> {
        self.add_in_band(name, Band::Definition)
    }

    /// Register an extra stratum in the user band
    pub fn add_user_stratum(&self, name: &str) -> StrataResult<i32> {
        self.add_in_band(name, Band::User)
    }

    fn add_in_band(&self, name: &str, band: Band) -> StrataResult<i32> {
        let mut state = self.state.write();
        if let Some(&existing) = state.priorities.get(name) {
            return Ok(existing);
        }

        let (next, end) = match band {
            Band::Load => (&mut state.next_load, LOAD_BAND_END),
            Band::Definition => (&mut state.next_definition, DEFINITION_BAND_END),
            Band::User => (&mut state.next_user, USER_BAND_END),
        };
        if *next > end {
            return Err(StrataError::invalid_operation(format!(
                "no free priority left in the {:?} band for stratum '{}'",
                band, name
            )));
        }
        let priority = *next;
        *next += 1;

        info!(stratum = name, priority, band = ?band, "Registered stratum");
        state.priorities.insert(name.to_string(), priority);
        Ok(priority)
    }

    /// Priority of `name`, if registered
    pub fn priority(&self, name: &str) -> Option<i32> {
        self.state.read().priorities.get(name).copied()
    }

    /// True if `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.state.read().priorities.contains_key(name)
    }

    /// Ensure `name` is registered
    ///
    /// # Errors
    ///
    /// Returns `UnregisteredStratum` otherwise.
    pub fn require(&self, name: &str) -> StrataResult<i32> {
        self.priority(name)
            .ok_or_else(|| StrataError::UnregisteredStratum {
                name: name.to_string(),
            })
    }

    /// Sort stratum names highest priority first
    ///
    /// Ties are broken by name so the order is deterministic. Unregistered names
    /// sort below everything; writes reject them, so seeing one here means the
    /// caller bypassed registration.
    pub fn sort_top_to_bottom<'a, I>(&self, names: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let state = self.state.read();
        let mut names: Vec<(&'a str, Option<i32>)> = names
            .into_iter()
            .map(|name| (name, state.priorities.get(name).copied()))
            .collect();
        for (name, priority) in &names {
            if priority.is_none() {
                warn!(stratum = *name, "Sorting unregistered stratum");
            }
        }
        names.sort_by_key(|(name, priority)| (Reverse(*priority), *name));
        names.into_iter().map(|(name, _)| name).collect()
    }

    /// Sort stratum names lowest priority first
    pub fn sort_bottom_to_top<'a, I>(&self, names: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names = self.sort_top_to_bottom(names);
        names.reverse();
        names
    }
}

#[derive(Debug, Clone, Copy)]
enum Band {
    Load,
    Definition,
    User,
}
