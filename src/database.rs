//! Main database entry point.
//!
//! A [`Bitempo`] handle binds a relational store to a set of registered
//! versioned-table schemas. Create one with [`Bitempo::in_memory`] for the
//! reference store, or [`Bitempo::builder`] with any store implementing the
//! contract.

use crate::error::{Error, Result};
use crate::table::VersionedTable;
use bitempo_core::row::VersionedRow;
use bitempo_core::schema::TableSchema;
use bitempo_engine::writer::DestroyHook;
use bitempo_store::{MemoryStore, RelationalStore};
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) struct TableEntry {
    pub(crate) schema: TableSchema,
    pub(crate) hooks: Vec<DestroyHook>,
}

/// A database of versioned tables over one relational store.
///
/// # Example
///
/// ```ignore
/// use bitempo::prelude::*;
///
/// let db = Bitempo::in_memory()
///     .table(TableSchema::new("employees").unique(["name"]))
///     .open()?;
///
/// let employees = db.table("employees")?;
/// let record = employees.create(payload_from_json(json!({"name": "Alice"}))?)?;
/// ```
pub struct Bitempo<S: RelationalStore = MemoryStore> {
    store: Arc<S>,
    tables: BTreeMap<String, TableEntry>,
}

impl Bitempo<MemoryStore> {
    /// A builder over a fresh in-memory reference store.
    pub fn in_memory() -> BitempoBuilder<MemoryStore> {
        BitempoBuilder::new(MemoryStore::new())
    }
}

impl<S: RelationalStore> Bitempo<S> {
    /// A builder over a caller-supplied store.
    pub fn builder(store: S) -> BitempoBuilder<S> {
        BitempoBuilder::new(store)
    }

    /// The versioned-table surface for a registered table.
    pub fn table(&self, name: &str) -> Result<VersionedTable<'_, S>> {
        let entry = self.tables.get(name).ok_or_else(|| {
            Error::Validation(format!("table {name} is not registered with this database"))
        })?;
        Ok(VersionedTable::new(self.store.as_ref(), entry))
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        self.store.as_ref()
    }
}

/// Configures a [`Bitempo`] database before opening it.
pub struct BitempoBuilder<S: RelationalStore> {
    store: S,
    tables: BTreeMap<String, TableEntry>,
    pending_hooks: Vec<(String, DestroyHook)>,
}

impl<S: RelationalStore> BitempoBuilder<S> {
    /// Start from a store.
    pub fn new(store: S) -> Self {
        BitempoBuilder {
            store,
            tables: BTreeMap::new(),
            pending_hooks: Vec::new(),
        }
    }

    /// Register a versioned table.
    pub fn table(mut self, schema: TableSchema) -> Self {
        self.tables.insert(
            schema.name().to_string(),
            TableEntry {
                schema,
                hooks: Vec::new(),
            },
        );
        self
    }

    /// Register a destroy hook for a table. Hooks run inside the destroy
    /// transaction, after the trimmed history copy is inserted and before
    /// the current row is closed; an error from a hook rolls the whole
    /// destroy back.
    pub fn destroy_hook(
        mut self,
        table: impl Into<String>,
        hook: impl Fn(&VersionedRow) -> bitempo_core::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.pending_hooks.push((table.into(), Arc::new(hook)));
        self
    }

    /// Validate the configuration and open the database.
    pub fn open(mut self) -> Result<Bitempo<S>> {
        for (table, hook) in self.pending_hooks {
            let entry = self.tables.get_mut(&table).ok_or_else(|| {
                Error::Validation(format!(
                    "destroy hook registered for unknown table {table}"
                ))
            })?;
            entry.hooks.push(hook);
        }
        Ok(Bitempo {
            store: Arc::new(self.store),
            tables: self.tables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_table_is_rejected() {
        let db = Bitempo::in_memory().open().unwrap();
        let err = db.table("nope").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn hook_for_unknown_table_fails_at_open() {
        let result = Bitempo::in_memory()
            .destroy_hook("ghost", |_| Ok(()))
            .open();
        assert!(result.is_err());
    }

    #[test]
    fn registered_table_is_reachable() {
        let db = Bitempo::in_memory()
            .table(TableSchema::new("employees"))
            .open()
            .unwrap();
        assert!(db.table("employees").is_ok());
    }
}
