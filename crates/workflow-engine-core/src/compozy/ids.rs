//! Opaque identifiers for the compozy task & workflow execution engine.
//!
//! `CoreID` is a ULID-style identifier: lexically sortable, URL-safe, generated
//! without any central coordination. `OrgID`, `WorkflowExecID` and `TaskExecID`
//! are newtypes over it so the type system keeps tenant ids and execution ids
//! from being swapped at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, engine-generated, equality-comparable, stringifiable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoreID(String);

impl CoreID {
    /// Generates a new identifier.
    ///
    /// Backed by a UUIDv4 today; callers must not assume any particular
    /// textual format beyond "opaque, unique, stringifiable".
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CoreID {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for CoreID {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CoreID {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for CoreID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub CoreID);

        impl $name {
            pub fn new() -> Self {
                Self(CoreID::new())
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(CoreID::from(s))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(CoreID::from(s))
            }
        }

        impl From<CoreID> for $name {
            fn from(id: CoreID) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(OrgID);
id_newtype!(WorkflowExecID);
id_newtype!(TaskExecID);
