//! Module: document
//! Responsibility: index-only attribute accumulation for the current match.
//! Does not own: event-resident fields, which the caller reads from the raw event.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

///
/// Attribute
///
/// One index-only value observed at `source`. Visibility is carried through
/// untouched.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Attribute<K> {
    pub field: String,
    pub value: String,
    pub visibility: String,
    pub timestamp: u64,
    pub source: K,
}

///
/// Document
///
/// Field name to attribute set. Identical attributes collapse on merge.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(bound(
    serialize = "K: Serialize + Ord",
    deserialize = "K: Deserialize<'de> + Ord"
))]
pub struct Document<K> {
    fields: BTreeMap<String, BTreeSet<Attribute<K>>>,
}

impl<K: Ord + Clone> Document<K> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }

    pub fn put(&mut self, attribute: Attribute<K>) {
        self.fields
            .entry(attribute.field.clone())
            .or_default()
            .insert(attribute);
    }

    /// Union `other` into this document.
    pub fn merge(&mut self, other: &Self) {
        for (field, attributes) in &other.fields {
            self.fields
                .entry(field.clone())
                .or_default()
                .extend(attributes.iter().cloned());
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&BTreeSet<Attribute<K>>> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute<K>> {
        self.fields.values().flatten()
    }

    /// Total attribute count across all fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.values().map(BTreeSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

impl<K: Ord + Clone> Default for Document<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(field: &str, value: &str, source: u32) -> Attribute<u32> {
        Attribute {
            field: field.to_string(),
            value: value.to_string(),
            visibility: "PUBLIC".to_string(),
            timestamp: 7,
            source,
        }
    }

    #[test]
    fn merge_is_a_set_union() {
        let mut left = Document::new();
        left.put(attr("FIELD_A", "x", 1));

        let mut right = Document::new();
        right.put(attr("FIELD_A", "x", 1));
        right.put(attr("FIELD_B", "y", 1));

        left.merge(&right);

        assert_eq!(left.len(), 2, "duplicate attribute must collapse");
        assert_eq!(left.fields().collect::<Vec<_>>(), vec!["FIELD_A", "FIELD_B"]);
        assert!(left.contains_field("FIELD_B"));
        assert!(!left.contains_field("FIELD_C"));
    }

    #[test]
    fn document_serializes_field_map() {
        let mut doc = Document::new();
        doc.put(attr("FIELD_A", "x", 4));

        let json = serde_json::to_value(&doc).expect("document should serialize");

        assert_eq!(json["fields"]["FIELD_A"][0]["source"], 4);
        assert_eq!(json["fields"]["FIELD_A"][0]["visibility"], "PUBLIC");
    }
}
