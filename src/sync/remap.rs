//! Dataset and column id translation for cloned dashboards
//!
//! Rewrites walk the JSON tree and replace a string value or object key only
//! when it is exactly a mapped id, so an id that happens to be a substring of
//! other content is left alone.

use log::debug;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::api::models::{DashboardDataset, DatasetSchema, localized_name};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdRemapTable {
    entries: BTreeMap<String, String>,
    unresolved: Vec<String>,
}

impl IdRemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a translation. A missing new id is remembered as unresolved
    /// and never applied.
    pub fn insert(&mut self, old_id: impl Into<String>, new_id: Option<String>) {
        let old_id = old_id.into();
        match new_id {
            Some(new_id) => {
                self.entries.insert(old_id, new_id);
            }
            None => {
                debug!("No destination id for {}, leaving it unmapped", old_id);
                self.unresolved.push(old_id);
            }
        }
    }

    pub fn extend(&mut self, other: IdRemapTable) {
        self.entries.extend(other.entries);
        self.unresolved.extend(other.unresolved);
    }

    pub fn get(&self, old_id: &str) -> Option<&str> {
        self.entries.get(old_id).map(String::as_str)
    }

    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrite every mapped id in `value` in place, returning how many
    /// strings and keys were replaced
    pub fn rewrite(&self, value: &mut Value) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        match value {
            Value::String(text) => match self.entries.get(text.as_str()) {
                Some(new_id) => {
                    *text = new_id.clone();
                    1
                }
                None => 0,
            },
            Value::Array(items) => items.iter_mut().map(|item| self.rewrite(item)).sum(),
            Value::Object(map) => self.rewrite_object(map),
            _ => 0,
        }
    }

    fn rewrite_object(&self, map: &mut Map<String, Value>) -> usize {
        let mut replaced = 0;
        let original = std::mem::take(map);
        for (key, mut child) in original {
            replaced += self.rewrite(&mut child);
            let key = match self.entries.get(&key) {
                Some(new_key) => {
                    replaced += 1;
                    new_key.clone()
                }
                None => key,
            };
            map.insert(key, child);
        }
        replaced
    }
}

/// Lowercased display name to id. When names collide the last column wins.
fn lowercase_name_index<'a>(
    pairs: impl Iterator<Item = (Option<&'a str>, &'a str)>,
) -> HashMap<String, String> {
    let mut index = HashMap::new();
    for (name, id) in pairs {
        if let Some(name) = name {
            if let Some(shadowed) = index.insert(name.to_lowercase(), id.to_string()) {
                debug!("Column {} shadowed by {} under name '{}'", shadowed, id, name);
            }
        }
    }
    index
}

/// Translation for one dataset a dashboard uses: the dataset id itself plus
/// every embedded column whose lowercase name also exists in the new schema
pub fn build_dataset_remap(
    old_dataset: &DashboardDataset,
    new_schema: &DatasetSchema,
) -> IdRemapTable {
    let new_ids = lowercase_name_index(
        new_schema
            .columns
            .iter()
            .map(|c| (c.name.as_deref(), c.id.as_str())),
    );

    let mut table = IdRemapTable::new();
    table.insert(old_dataset.id.clone(), Some(new_schema.dataset_id.clone()));

    for column in &old_dataset.columns {
        let new_id = localized_name(&column.name)
            .and_then(|name| new_ids.get(&name.to_lowercase()))
            .cloned();
        table.insert(column.id.clone(), new_id);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::DashboardColumn;
    use serde_json::json;

    fn table(pairs: &[(&str, &str)]) -> IdRemapTable {
        let mut table = IdRemapTable::new();
        for (old, new) in pairs {
            table.insert(*old, Some(new.to_string()));
        }
        table
    }

    #[test]
    fn test_dataset_id_rewritten_everywhere() {
        let mut document = json!({"datasets": [{"id": "A"}], "contents": {"ref": "A"}});

        let replaced = table(&[("A", "B")]).rewrite(&mut document);

        assert_eq!(replaced, 2);
        assert_eq!(document, json!({"datasets": [{"id": "B"}], "contents": {"ref": "B"}}));
        assert!(!document.to_string().contains("\"A\""));
    }

    #[test]
    fn test_substrings_are_not_touched() {
        let mut document = json!({
            "title": "A report about A",
            "ids": ["A", "AB", "xA"],
            "n": 1
        });

        table(&[("A", "B")]).rewrite(&mut document);

        assert_eq!(document["title"], "A report about A");
        assert_eq!(document["ids"], json!(["B", "AB", "xA"]));
        assert_eq!(document["n"], 1);
    }

    #[test]
    fn test_object_keys_are_rewritten() {
        let mut document = json!({"formats": {"col-1": {"decimals": 2}, "other": "col-1"}});

        let replaced = table(&[("col-1", "col-9")]).rewrite(&mut document);

        assert_eq!(replaced, 2);
        assert_eq!(document, json!({"formats": {"col-9": {"decimals": 2}, "other": "col-9"}}));
    }

    #[test]
    fn test_mapping_is_not_chained() {
        let mut document = json!(["x", "y"]);
        table(&[("x", "y"), ("y", "z")]).rewrite(&mut document);
        assert_eq!(document, json!(["y", "z"]));
    }

    #[test]
    fn test_unresolved_entries_are_not_applied() {
        let mut remap = IdRemapTable::new();
        remap.insert("old", None);
        let mut document = json!({"id": "old"});

        assert_eq!(remap.rewrite(&mut document), 0);
        assert_eq!(document["id"], "old");
        assert_eq!(remap.unresolved(), ["old".to_string()]);
        assert!(remap.is_empty());
    }

    #[test]
    fn test_build_dataset_remap_matches_lowercase_names() {
        let old_dataset = DashboardDataset {
            id: "old-ds".to_string(),
            name: json!({"en": "Sales"}),
            columns: vec![
                DashboardColumn { id: "old-rev".to_string(), name: json!({"en": "Revenue"}) },
                DashboardColumn { id: "old-gone".to_string(), name: json!({"en": "Dropped"}) },
            ],
        };
        let new_schema = DatasetSchema::from_row(
            "new-ds",
            &json!({"columns": [
                {"id": "new-rev", "name": {"en": "REVENUE"}},
                {"id": "new-extra", "name": {"en": "Extra"}}
            ]}),
        )
        .unwrap();

        let remap = build_dataset_remap(&old_dataset, &new_schema);

        assert_eq!(remap.get("old-ds"), Some("new-ds"));
        assert_eq!(remap.get("old-rev"), Some("new-rev"));
        assert_eq!(remap.get("old-gone"), None);
        assert_eq!(remap.unresolved(), ["old-gone".to_string()]);
        assert_eq!(remap.len(), 2);
    }

    #[test]
    fn test_duplicate_names_map_to_last_new_column() {
        let old_dataset = DashboardDataset {
            id: "old-ds".to_string(),
            name: json!({"en": "Sales"}),
            columns: vec![
                DashboardColumn { id: "old-a".to_string(), name: json!({"en": "Region"}) },
                DashboardColumn { id: "old-b".to_string(), name: json!({"en": "region"}) },
            ],
        };
        let new_schema = DatasetSchema::from_row(
            "new-ds",
            &json!({"columns": [
                {"id": "new-1", "name": {"en": "Region"}},
                {"id": "new-2", "name": {"en": "REGION"}}
            ]}),
        )
        .unwrap();

        let remap = build_dataset_remap(&old_dataset, &new_schema);

        assert_eq!(remap.get("old-a"), Some("new-2"));
        assert_eq!(remap.get("old-b"), Some("new-2"));
        assert!(remap.unresolved().is_empty());
    }
}
