//! Schema revisions
//!
//! The wire format only ever grew. Each revision adds optional sections on
//! top of the previous one:
//!
//! | Revision | Adds                                                   |
//! |----------|--------------------------------------------------------|
//! | v1       | `title`, `theme`, `ui.background`, `ui.font`, `services`, `themeVars` |
//! | v2       | `weather`, `docker`                                    |
//! | v3       | `system`, `sections`, `ui.clock`, `docker.agentsConfigured` |

use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum SchemaVersion {
    V1,
    V2,
    V3,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion::V3;

    pub fn number(&self) -> u8 {
        match self {
            SchemaVersion::V1 => 1,
            SchemaVersion::V2 => 2,
            SchemaVersion::V3 => 3,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Newest revision whose fields appear in the payload
pub fn detect_version(raw: &Value) -> SchemaVersion {
    let Some(obj) = raw.as_object() else {
        return SchemaVersion::V1;
    };

    let has = |key: &str| obj.get(key).is_some_and(|v| !v.is_null());
    let nested = |outer: &str, inner: &str| {
        obj.get(outer)
            .and_then(Value::as_object)
            .and_then(|o| o.get(inner))
            .is_some_and(|v| !v.is_null())
    };

    if has("system") || has("sections") || nested("ui", "clock") || nested("docker", "agentsConfigured") {
        SchemaVersion::V3
    } else if has("weather") || has("docker") {
        SchemaVersion::V2
    } else {
        SchemaVersion::V1
    }
}
