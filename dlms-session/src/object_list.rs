//! Lookup of the COSEM objects of an association

use dlms_core::ObisCode;
use serde::{Deserialize, Serialize};

/// Identity of one COSEM object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub class_id: u16,
    pub version: u8,
    pub logical_name: ObisCode,
    /// Base name with short name referencing, zero otherwise
    pub short_name: u16,
}

/// Objects visible in the current association
#[cfg_attr(test, mockall::automock)]
pub trait ObjectList: Send {
    /// Object of `class_id` named `logical_name`; class 0 matches any class.
    fn find_by_logical_name(&self, class_id: u16, logical_name: &ObisCode) -> Option<ObjectEntry>;

    fn find_by_short_name(&self, short_name: u16) -> Option<ObjectEntry>;
}

/// `ObjectList` over a plain vector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectCollection {
    objects: Vec<ObjectEntry>,
}

impl ObjectCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ObjectEntry) {
        self.objects.push(entry);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectEntry> {
        self.objects.iter()
    }
}

impl FromIterator<ObjectEntry> for ObjectCollection {
    fn from_iter<I: IntoIterator<Item = ObjectEntry>>(iter: I) -> Self {
        Self {
            objects: iter.into_iter().collect(),
        }
    }
}

impl ObjectList for ObjectCollection {
    fn find_by_logical_name(&self, class_id: u16, logical_name: &ObisCode) -> Option<ObjectEntry> {
        self.objects
            .iter()
            .find(|o| (class_id == 0 || o.class_id == class_id) && &o.logical_name == logical_name)
            .copied()
    }

    fn find_by_short_name(&self, short_name: u16) -> Option<ObjectEntry> {
        self.objects.iter().find(|o| o.short_name == short_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> ObjectEntry {
        ObjectEntry {
            class_id: 8,
            version: 0,
            logical_name: ObisCode::new(0, 0, 1, 0, 0, 255),
            short_name: 0x2BC0,
        }
    }

    #[test]
    fn test_collection_lookup() {
        let objects: ObjectCollection = vec![clock()].into_iter().collect();
        let ln = ObisCode::new(0, 0, 1, 0, 0, 255);
        assert_eq!(objects.find_by_logical_name(8, &ln), Some(clock()));
        assert_eq!(objects.find_by_logical_name(0, &ln), Some(clock()));
        assert_eq!(objects.find_by_logical_name(1, &ln), None);
        assert_eq!(objects.find_by_short_name(0x2BC0), Some(clock()));
        assert_eq!(objects.len(), 1);
    }
}
