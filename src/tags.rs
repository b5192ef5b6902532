//! Tag resolution for upload clients.
//!
//! A note only carries tag names. Before upload, the client matches each name
//! against the tags that exist on the service, reusing a match and creating
//! the tag otherwise. Names match case-insensitively.
use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{normalize_tag_names, Result};

/// A tag as known to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub guid: String,
    pub name: String,
}

/// Lookup and creation of tags, provided by an upload client.
pub trait TagStore {
    /// Finds an existing tag by name, ignoring case.
    fn find_tag(&self, name: &str) -> Option<Tag>;

    /// Creates a tag with exactly this name.
    fn create_tag(&mut self, name: &str) -> Result<Tag>;
}

/// Resolves tag names to tags, creating the ones that do not exist yet.
///
/// Invalid names are skipped and duplicates collapse, following
/// [`normalize_tag_names`]. The result keeps the order of first appearance.
pub fn resolve_tag_names<S: TagStore + ?Sized>(
    store: &mut S,
    names: &[String],
) -> Result<Vec<Tag>> {
    let mut tags = Vec::with_capacity(names.len());
    for name in normalize_tag_names(names) {
        let tag = match store.find_tag(&name) {
            Some(existing) => {
                debug!("Reusing tag {:?} ({})", existing.name, existing.guid);
                existing
            }
            None => {
                let created = store.create_tag(&name)?;
                info!("Created tag {:?} ({})", created.name, created.guid);
                created
            }
        };
        tags.push(tag);
    }
    Ok(tags)
}

/// An in-process [`TagStore`], for previews and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryTagStore {
    by_name: HashMap<String, Tag>,
    next_id: u64,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already knows the given names.
    pub fn with_existing(names: &[String]) -> Result<Self> {
        let mut store = Self::new();
        for name in normalize_tag_names(names) {
            store.create_tag(&name)?;
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl TagStore for MemoryTagStore {
    fn find_tag(&self, name: &str) -> Option<Tag> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    fn create_tag(&mut self, name: &str) -> Result<Tag> {
        self.next_id += 1;
        let tag = Tag {
            guid: format!("local-tag-{}", self.next_id),
            name: name.to_string(),
        };
        self.by_name.insert(name.to_lowercase(), tag.clone());
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reuses_existing_and_creates_missing() {
        let mut store = MemoryTagStore::with_existing(&names(&["Work"])).unwrap();
        let tags = resolve_tag_names(&mut store, &names(&["work", "home"])).unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "Work");
        assert_eq!(tags[0].guid, "local-tag-1");
        assert_eq!(tags[1].name, "home");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn duplicate_and_invalid_names_collapse() {
        let mut store = MemoryTagStore::new();
        let tags = resolve_tag_names(&mut store, &names(&["a", "A", " a ", "b,c", ""])).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resolving_twice_creates_nothing_new() {
        let mut store = MemoryTagStore::new();
        let first = resolve_tag_names(&mut store, &names(&["x", "y"])).unwrap();
        let second = resolve_tag_names(&mut store, &names(&["Y", "X"])).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(first[0], second[1]);
        assert_eq!(first[1], second[0]);
    }

    struct FailingStore;

    impl TagStore for FailingStore {
        fn find_tag(&self, _name: &str) -> Option<Tag> {
            None
        }

        fn create_tag(&mut self, name: &str) -> Result<Tag> {
            Err(crate::NoteError::InvalidTag {
                name: name.to_string(),
            })
        }
    }

    #[test]
    fn creation_errors_propagate() {
        let err = resolve_tag_names(&mut FailingStore, &names(&["t"])).unwrap_err();
        assert!(matches!(err, crate::NoteError::InvalidTag { .. }));
    }
}
