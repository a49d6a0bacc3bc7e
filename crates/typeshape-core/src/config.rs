//! Engine configuration
//!
//! `EngineConfig` gathers the knobs callers usually want to set once per
//! application and turns them into the per-call option structs. It loads
//! from TOML or JSON; absent keys take their defaults.
//!
//! ```toml
//! validation_mode = "collect_all"
//! keep_undefined = false
//! enforce_uniqueness = true
//! trusted_deserialize = false
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::codec::deserialize::DeserializeOptions;
use crate::codec::serialize::SerializeOptions;
use crate::errors::Result;
use crate::ops::construct::ConstructOptions;
use crate::ops::uniqueness::UniquenessIndex;

/// Stop at the first violation or report all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    #[default]
    FailFast,
    CollectAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub validation_mode: ValidationMode,
    /// Emit `Undefined` fields as null instead of omitting them
    pub keep_undefined: bool,
    /// Attach a uniqueness index to construction and deserialization
    pub enforce_uniqueness: bool,
    /// Deserialize top-level records through the trusted path
    pub trusted_deserialize: bool,
}

impl EngineConfig {
    /// # Errors
    ///
    /// `Serialization` if the text is not valid TOML for this shape.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// # Errors
    ///
    /// `Serialization` if the text is not valid JSON for this shape.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Index to share between the option structs, when uniqueness is on
    pub fn uniqueness_index(&self) -> Option<Arc<UniquenessIndex>> {
        self.enforce_uniqueness.then(UniquenessIndex::shared)
    }

    pub fn construct_options(&self, index: Option<Arc<UniquenessIndex>>) -> ConstructOptions {
        ConstructOptions {
            mode: self.validation_mode,
            uniqueness: index,
        }
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            keep_undefined: self.keep_undefined,
        }
    }

    pub fn deserialize_options(&self, index: Option<Arc<UniquenessIndex>>) -> DeserializeOptions {
        DeserializeOptions {
            mode: self.validation_mode,
            trusted: self.trusted_deserialize,
            uniqueness: index,
        }
    }
}
