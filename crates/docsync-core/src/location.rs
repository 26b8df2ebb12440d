use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

/// Attributes a location accepts from the host.
pub const LOCATION_ATTRIBUTES: &[&str] = &[
    "href", "protocol", "hostname", "port", "pathname", "search", "hash", "reload",
];

/// Navigation state mirrored from the host page.
///
/// The runtime treats it as read-only; host updates go through
/// [`Location::edit_readonly`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    values: BTreeMap<String, Value>,
    #[serde(skip, default = "read_only_default")]
    read_only: bool,
}

fn read_only_default() -> bool {
    true
}

impl Default for Location {
    fn default() -> Self {
        Self::new()
    }
}

impl Location {
    /// Create an empty, read-only location.
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            read_only: true,
        }
    }

    /// Whether `key` is a recognized location attribute.
    pub fn recognizes(key: &str) -> bool {
        LOCATION_ATTRIBUTES.contains(&key)
    }

    /// Current value of an attribute.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether updates are currently rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Merge recognized keys from `data`, ignoring the rest.
    ///
    /// Returns the keys that were applied.
    pub fn update(&mut self, data: &Map<String, Value>) -> Result<Vec<String>> {
        if self.read_only {
            return Err(Error::ReadOnly(
                data.keys().cloned().collect::<Vec<_>>().join(","),
            ));
        }

        let mut applied = Vec::new();
        for (key, value) in data {
            if !Self::recognizes(key) {
                log::debug!("ignoring unrecognized location key: {}", key);
                continue;
            }
            self.values.insert(key.clone(), value.clone());
            applied.push(key.clone());
        }
        Ok(applied)
    }

    /// Temporarily lift the read-only flag.
    ///
    /// The previous flag is restored when the guard drops, whatever happened
    /// while it was held.
    pub fn edit_readonly(&mut self) -> ReadonlyGuard<'_> {
        let previous = self.read_only;
        self.read_only = false;
        ReadonlyGuard {
            location: self,
            previous,
        }
    }
}

/// Scoped write access to a [`Location`].
pub struct ReadonlyGuard<'a> {
    location: &'a mut Location,
    previous: bool,
}

impl Deref for ReadonlyGuard<'_> {
    type Target = Location;

    fn deref(&self) -> &Location {
        self.location
    }
}

impl DerefMut for ReadonlyGuard<'_> {
    fn deref_mut(&mut self) -> &mut Location {
        self.location
    }
}

impl Drop for ReadonlyGuard<'_> {
    fn drop(&mut self) {
        self.location.read_only = self.previous;
    }
}
