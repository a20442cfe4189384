//! GUID to display-name lookup.
//!
//! Folder, control panel and some unknown entries identify themselves only
//! by GUID. The table that maps those GUIDs to names is supplied by the
//! caller; the decoder only needs [`GuidNames::lookup`].

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

/// A read-only mapping from canonical lowercase GUID text to a display name.
pub trait GuidNames {
    /// Returns the display name for `guid`, if the table has one.
    fn lookup(&self, guid: &str) -> Option<&str>;
}

/// A table with no entries. Every GUID is reported unresolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGuidNames;

impl GuidNames for NoGuidNames {
    fn lookup(&self, _guid: &str) -> Option<&str> {
        None
    }
}

impl<K, V, S> GuidNames for HashMap<K, V, S>
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
    S: BuildHasher,
{
    fn lookup(&self, guid: &str) -> Option<&str> {
        self.get(guid).map(AsRef::as_ref)
    }
}

impl<K, V> GuidNames for BTreeMap<K, V>
where
    K: Borrow<str> + Ord,
    V: AsRef<str>,
{
    fn lookup(&self, guid: &str) -> Option<&str> {
        self.get(guid).map(AsRef::as_ref)
    }
}

impl<'t> GuidNames for [(&'t str, &'t str)] {
    fn lookup(&self, guid: &str) -> Option<&str> {
        self.iter().find(|(key, _)| *key == guid).map(|(_, name)| *name)
    }
}

impl<'t, const N: usize> GuidNames for [(&'t str, &'t str); N] {
    fn lookup(&self, guid: &str) -> Option<&str> {
        self.as_slice().lookup(guid)
    }
}

impl<T: GuidNames + ?Sized> GuidNames for &T {
    fn lookup(&self, guid: &str) -> Option<&str> {
        (**self).lookup(guid)
    }
}
