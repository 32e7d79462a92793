//! Hospital id to source code mapping
//!
//! Populated once at startup; a duplicate id or code is a startup error,
//! never a silent overwrite.

use std::collections::BTreeMap;
use std::collections::HashMap;
use thiserror::Error;

use super::SourceCode;

/// Registry and factory misconfiguration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Hospital {id} is already registered to {existing}")]
    DuplicateHospital { id: i64, existing: SourceCode },

    #[error("Source code {code} is already registered to hospital {existing}")]
    DuplicateSource { code: SourceCode, existing: i64 },

    #[error("A strategy is already registered for {0}")]
    DuplicateStrategy(SourceCode),

    #[error("No source registered for hospital {0}")]
    HospitalNotRegistered(i64),

    #[error("No strategy registered for {0}")]
    NoStrategy(SourceCode),

    #[error("Unknown source code '{0}'")]
    UnknownSourceCode(String),
}

/// Bidirectional id <-> code mapping
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    by_id: BTreeMap<i64, SourceCode>,
    by_code: HashMap<SourceCode, i64>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The fixed production mapping, ids 1..=21 in [`SourceCode::ALL`] order
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for (index, code) in SourceCode::ALL.into_iter().enumerate() {
            registry.by_id.insert(index as i64 + 1, code);
            registry.by_code.insert(code, index as i64 + 1);
        }
        registry
    }

    /// Register a pair
    ///
    /// # Errors
    ///
    /// Fails if either the id or the code is already claimed
    pub fn register(&mut self, id: i64, code: SourceCode) -> Result<(), RegistryError> {
        if let Some(existing) = self.by_id.get(&id) {
            return Err(RegistryError::DuplicateHospital {
                id,
                existing: *existing,
            });
        }
        if let Some(existing) = self.by_code.get(&code) {
            return Err(RegistryError::DuplicateSource {
                code,
                existing: *existing,
            });
        }

        self.by_id.insert(id, code);
        self.by_code.insert(code, id);
        Ok(())
    }

    pub fn code_for(&self, id: i64) -> Option<SourceCode> {
        self.by_id.get(&id).copied()
    }

    pub fn id_for(&self, code: SourceCode) -> Option<i64> {
        self.by_code.get(&code).copied()
    }

    /// Pairs ordered by hospital id
    pub fn entries(&self) -> impl Iterator<Item = (i64, SourceCode)> + '_ {
        self.by_id.iter().map(|(id, code)| (*id, *code))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_code.clear();
    }
}
