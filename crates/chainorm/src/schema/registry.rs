use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use super::{Model, Schema};
use crate::error::OrmResult;

type Slot = Arc<OnceLock<OrmResult<Arc<Schema>>>>;

/// Process-wide schema cache keyed by type identity.
///
/// Readers share the map lock; the first caller for a type parses the schema
/// inside that type's `OnceLock`, and concurrent callers for the same type block
/// on it instead of parsing again. Failed resolutions are cached too.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    slots: RwLock<HashMap<TypeId, Slot>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static SchemaRegistry {
        static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SchemaRegistry::new)
    }

    pub fn resolve<M: Model>(&self) -> OrmResult<Arc<Schema>> {
        let slot = self.slot(TypeId::of::<M>());
        slot.get_or_init(|| Schema::parse(M::NAME, M::TABLE, M::FIELDS).map(Arc::new))
            .clone()
    }

    /// Number of types seen so far.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: TypeId) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return Arc::clone(slot);
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(id).or_default())
    }
}
