//! Shared domain enumerations. The persisted ones live in the wire-types crate
//! so that API clients and the server agree on their spelling.

use serde::{Deserialize, Serialize};

pub use tessera_api_types::{
    ContentFormat, MenuLocation, PageOrderEntry, PageStatus, SessionPhase,
};

/// Why a page write is happening. Only explicit saves append to version history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    Explicit,
    Autosave,
}

impl SaveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SaveMode::Explicit => "explicit",
            SaveMode::Autosave => "autosave",
        }
    }

    pub fn creates_version(self) -> bool {
        matches!(self, SaveMode::Explicit)
    }
}
