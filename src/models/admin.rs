//! Sub-national administrative hierarchy.

use serde::Serialize;
use std::collections::BTreeMap;

use super::ModelError;

/// Highest admin level a provider may report.
pub const MAX_ADMIN_LEVEL: u8 = 5;

/// One tier of the hierarchy below the country.
///
/// Level 1 is the broadest (region / state / province), level 5 the finest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminLevel {
    level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl AdminLevel {
    pub fn new(level: u8, name: Option<String>, code: Option<String>) -> Result<Self, ModelError> {
        if !(1..=MAX_ADMIN_LEVEL).contains(&level) {
            return Err(ModelError::AdminLevelOutOfRange(level));
        }
        Ok(Self { level, name, code })
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Level-unique admin levels, iterated in level order.
///
/// Levels are sparse: a provider may report 1 and 3 without 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminLevelCollection {
    levels: BTreeMap<u8, AdminLevel>,
}

impl AdminLevelCollection {
    pub fn new(levels: impl IntoIterator<Item = AdminLevel>) -> Result<Self, ModelError> {
        let mut collection = Self::default();
        for level in levels {
            collection.insert(level)?;
        }
        Ok(collection)
    }

    pub(crate) fn insert(&mut self, level: AdminLevel) -> Result<(), ModelError> {
        if self.levels.contains_key(&level.level) {
            return Err(ModelError::DuplicateAdminLevel(level.level));
        }
        self.levels.insert(level.level, level);
        Ok(())
    }

    pub fn get(&self, level: u8) -> Option<&AdminLevel> {
        self.levels.get(&level)
    }

    pub fn has(&self, level: u8) -> bool {
        self.levels.contains_key(&level)
    }

    pub fn first(&self) -> Option<&AdminLevel> {
        self.levels.values().next()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AdminLevel> {
        self.levels.values()
    }
}

impl Serialize for AdminLevelCollection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.levels.values())
    }
}
