//! Configuration module for the Snapshotter
//!
//! This module provides the configuration structure and the enums selecting
//! how tracked values are identified, how snapshots are taken and which
//! casing the identifier property uses.

use crate::{ObjsError, Result};
use serde::{Deserialize, Serialize};

/// Default maximum number of snapshots kept per tracked value
pub const DEFAULT_HISTORY_DEPTH: usize = 7;

/// How a tracked value is identified
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentificationKind {
    /// Rely on the value's reference identity
    #[default]
    Reference,
    /// Rely on the value's id property
    Id,
}

/// Kind of clone stored as a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotKind {
    /// Copy the whole reachable graph
    #[default]
    DeepClone,
    /// Copy one level, sharing nested values with the live object
    ShallowClone,
}

/// Casing of the identifier property name used by id tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyNameCasingKind {
    /// `id`
    #[default]
    LowerCamelCase,
    /// `Id`
    UpperCamelCase,
}

impl PropertyNameCasingKind {
    /// Name of the property holding a value's identifier
    pub fn id_property_name(self) -> &'static str {
        match self {
            PropertyNameCasingKind::LowerCamelCase => "id",
            PropertyNameCasingKind::UpperCamelCase => "Id",
        }
    }
}

/// Configuration structure for Snapshotter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SnapshotterConfig {
    /// The maximum snapshots to store for a value (at least 1)
    pub history_depth: usize,
    /// The way to identify a tracked value
    pub identification_kind: IdentificationKind,
    /// The kind of snapshots to store
    pub snapshot_kind: SnapshotKind,
    /// The casing used to find the identifier property
    pub property_name_casing_kind: PropertyNameCasingKind,
}

impl SnapshotterConfig {
    /// Create the default configuration: depth 7, reference tracking, deep clones
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_depth(mut self, history_depth: usize) -> Self {
        self.history_depth = history_depth;
        self
    }

    pub fn with_identification_kind(mut self, identification_kind: IdentificationKind) -> Self {
        self.identification_kind = identification_kind;
        self
    }

    pub fn with_snapshot_kind(mut self, snapshot_kind: SnapshotKind) -> Self {
        self.snapshot_kind = snapshot_kind;
        self
    }

    pub fn with_property_name_casing_kind(
        mut self,
        property_name_casing_kind: PropertyNameCasingKind,
    ) -> Self {
        self.property_name_casing_kind = property_name_casing_kind;
        self
    }

    /// Parse a configuration from JSON and validate it
    ///
    /// Missing fields take their default value. A JSON `null` is rejected.
    ///
    /// # Example
    /// ```rust
    /// use objs_core::{IdentificationKind, SnapshotterConfig};
    ///
    /// let config = SnapshotterConfig::from_json(r#"{"historyDepth": 3, "identificationKind": "Id"}"#)?;
    /// assert_eq!(config.history_depth, 3);
    /// assert_eq!(config.identification_kind, IdentificationKind::Id);
    /// # Ok::<(), objs_core::ObjsError>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Option<SnapshotterConfig> = serde_json::from_str(json)?;
        let config = config.ok_or_else(|| ObjsError::configuration("configuration can not be null"))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.history_depth < 1 {
            return Err(ObjsError::configuration(
                "historyDepth could not be less than 1",
            ));
        }
        Ok(())
    }

    /// Name of the identifier property for the configured casing
    pub fn id_property_name(&self) -> &'static str {
        self.property_name_casing_kind.id_property_name()
    }
}

impl Default for SnapshotterConfig {
    fn default() -> Self {
        SnapshotterConfig {
            history_depth: DEFAULT_HISTORY_DEPTH,
            identification_kind: IdentificationKind::Reference,
            snapshot_kind: SnapshotKind::DeepClone,
            property_name_casing_kind: PropertyNameCasingKind::LowerCamelCase,
        }
    }
}
