//! The profile document (a parsed CV).
//!
//! Only the fields the server reasons about are typed. Everything else in the
//! source document is carried through untouched so the document can be served
//! back verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured profile document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Display name of the profile owner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Skill list, in the order the owner wants them presented
    #[serde(default)]
    pub skills: Vec<String>,
    /// Work history, most recent position first
    #[serde(default)]
    pub experience: Vec<Experience>,
    /// Untyped remainder of the document (summary, contact, education, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Profile {
    /// The most recent position, if any is recorded.
    pub fn last_position(&self) -> Option<&Experience> {
        self.experience.first()
    }
}

/// One position in the work history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub role: String,
    pub company: String,
    /// Free-form period, e.g. "2021 - present"
    pub period: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
