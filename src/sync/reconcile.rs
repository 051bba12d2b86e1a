//! Match source columns to destination columns by display name

use log::{debug, warn};
use std::collections::HashMap;

use crate::api::models::{
    ColumnDetail, ColumnProperties, DatasetSchema, HierarchyDetail, HierarchyNode,
};

/// Column properties that describe the source column itself and are never
/// copied onto the destination
pub const EXCLUDED_FIELDS: [&str; 13] = [
    "id",
    "name",
    "source_name",
    "minBound",
    "maxBound",
    "cardinality",
    "highestLevel",
    "minimum",
    "maximum",
    "version",
    "created_at",
    "updated_at",
    "securable_id",
];

/// Destination column ids keyed by display name.
///
/// When several columns share a name the last one in service order is kept
/// and the name is recorded in `duplicates` once per extra column.
#[derive(Debug, Clone, Default)]
pub struct ReverseNameIndex {
    by_name: HashMap<String, String>,
    duplicates: Vec<String>,
}

impl ReverseNameIndex {
    pub fn from_schema(schema: &DatasetSchema) -> Self {
        let pairs = schema
            .columns
            .iter()
            .filter_map(|c| c.name.as_deref().map(|name| (name, c.id.as_str())));
        let index = Self::from_pairs(pairs);
        for name in &index.duplicates {
            warn!(
                "Dataset {} has more than one column named '{}', using the last",
                schema.dataset_id, name
            );
        }
        index
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut index = Self::default();
        for (name, id) in pairs {
            if index.by_name.insert(name.to_string(), id.to_string()).is_some() {
                index.duplicates.push(name.to_string());
            }
        }
        index
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Index the destination schema by name for matching source columns against it
pub fn reconcile(source: &DatasetSchema, destination: &DatasetSchema) -> ReverseNameIndex {
    let index = ReverseNameIndex::from_schema(destination);
    let unmatched = source
        .columns
        .iter()
        .filter_map(|c| c.name.as_deref())
        .filter(|name| index.lookup(name).is_none())
        .count();
    debug!(
        "Reconciled {} -> {}: {} destination names, {} source names without a match",
        source.dataset_id,
        destination.dataset_id,
        index.len(),
        unmatched
    );
    index
}

/// Update for one destination column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnUpdatePayload {
    pub target_column_id: String,
    pub source_column_id: String,
    pub name: String,
    pub properties: ColumnProperties,
}

/// Update for one destination hierarchy column
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyUpdatePayload {
    pub target_column_id: String,
    pub source_column_id: String,
    pub updates: Vec<HierarchyNode>,
}

/// Copy of a column's properties without the excluded fields
pub fn strip_excluded(properties: &ColumnProperties) -> ColumnProperties {
    properties
        .iter()
        .filter(|(field, _)| !EXCLUDED_FIELDS.contains(&field.as_str()))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

/// Pair every source column with the destination column of the same name.
/// Columns without a match are logged and left out.
pub fn match_columns(
    details: &[ColumnDetail],
    index: &ReverseNameIndex,
) -> Vec<ColumnUpdatePayload> {
    details
        .iter()
        .filter_map(|detail| {
            let Some(name) = detail.name.as_deref() else {
                warn!("Column {} has no name, skipping", detail.column_id);
                return None;
            };
            let Some(target) = index.lookup(name) else {
                warn!(
                    "No destination column named '{}' (source column {}), skipping",
                    name, detail.column_id
                );
                return None;
            };
            Some(ColumnUpdatePayload {
                target_column_id: target.to_string(),
                source_column_id: detail.column_id.clone(),
                name: name.to_string(),
                properties: strip_excluded(&detail.properties),
            })
        })
        .collect()
}

/// Pair every source hierarchy with the destination column of the same name.
///
/// The updates are the children of the first root node with placeholder
/// (null id) nodes pruned at every depth.
pub fn match_hierarchies(
    details: &[HierarchyDetail],
    source: &DatasetSchema,
    index: &ReverseNameIndex,
) -> Vec<HierarchyUpdatePayload> {
    details
        .iter()
        .filter_map(|detail| {
            let Some(name) = source.column_name(&detail.column_id) else {
                warn!("Hierarchy column {} has no name, skipping", detail.column_id);
                return None;
            };
            let Some(target) = index.lookup(name) else {
                warn!(
                    "No destination column named '{}' for hierarchy {}, skipping",
                    name, detail.column_id
                );
                return None;
            };
            let Some(root) = detail.roots.first() else {
                warn!("Hierarchy {} returned no root node, skipping", detail.column_id);
                return None;
            };
            let updates = root
                .children()
                .iter()
                .cloned()
                .filter_map(HierarchyNode::prune_unassigned)
                .collect();
            Some(HierarchyUpdatePayload {
                target_column_id: target.to_string(),
                source_column_id: detail.column_id.clone(),
                updates,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(dataset_id: &str, columns: serde_json::Value) -> DatasetSchema {
        DatasetSchema::from_row(dataset_id, &json!({ "columns": columns })).unwrap()
    }

    fn detail(id: &str, name: &str, properties: serde_json::Value) -> ColumnDetail {
        ColumnDetail {
            column_id: id.to_string(),
            name: Some(name.to_string()),
            properties: properties.as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_last_duplicate_wins() {
        let index =
            ReverseNameIndex::from_pairs([("Revenue", "d1"), ("Revenue", "d2"), ("Cost", "d3")]);

        assert_eq!(index.lookup("Revenue"), Some("d2"));
        assert_eq!(index.lookup("Cost"), Some("d3"));
        assert_eq!(index.duplicates(), ["Revenue".to_string()]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_match_columns_strips_excluded_fields() {
        let destination = schema("dest", json!([
            {"id": "d-rev", "name": {"en": "Revenue"}, "type": "numeric"}
        ]));
        let index = ReverseNameIndex::from_schema(&destination);

        let payloads = match_columns(
            &[detail("s-rev", "Revenue", json!({
                "id": "s-rev",
                "name": {"en": "Revenue"},
                "minimum": 0,
                "maximum": 10,
                "cardinality": 4,
                "format": ",.2f",
                "description": {"en": "Total revenue"}
            }))],
            &index,
        );

        assert_eq!(payloads.len(), 1);
        let payload = &payloads[0];
        assert_eq!(payload.target_column_id, "d-rev");
        assert_eq!(payload.source_column_id, "s-rev");
        let mut fields: Vec<&str> = payload.properties.keys().map(String::as_str).collect();
        fields.sort();
        assert_eq!(fields, vec!["description", "format"]);
    }

    #[test]
    fn test_unmatched_column_is_omitted() {
        let index = ReverseNameIndex::from_pairs([("Revenue", "d-rev")]);
        let payloads = match_columns(
            &[
                detail("s-rev", "Revenue", json!({"format": "x"})),
                detail("s-mystery", "Mystery", json!({"format": "y"})),
                ColumnDetail {
                    column_id: "s-anon".to_string(),
                    name: None,
                    properties: Default::default(),
                },
            ],
            &index,
        );

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].name, "Revenue");
    }

    #[test]
    fn test_match_hierarchies_prunes_placeholders() {
        let source = schema("src", json!([
            {"id": "s-geo", "name": {"en": "Geography"}, "type": "hierarchy"}
        ]));
        let index = ReverseNameIndex::from_pairs([("Geography", "d-geo")]);
        let roots: Vec<HierarchyNode> = serde_json::from_value(json!([{
            "id": "root",
            "children": [
                {"id": "eu", "children": [{"id": "be"}, {"id": null}]},
                {"id": null, "name": {"en": "Unassigned"}}
            ]
        }]))
        .unwrap();

        let payloads = match_hierarchies(
            &[HierarchyDetail { column_id: "s-geo".to_string(), roots }],
            &source,
            &index,
        );

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].target_column_id, "d-geo");
        assert_eq!(payloads[0].updates.len(), 1);
        assert_eq!(payloads[0].updates[0].id.as_deref(), Some("eu"));
        assert_eq!(payloads[0].updates[0].children().len(), 1);
    }

    #[test]
    fn test_hierarchy_without_roots_is_skipped() {
        let source = schema("src", json!([
            {"id": "s-geo", "name": {"en": "Geography"}, "type": "hierarchy"}
        ]));
        let index = ReverseNameIndex::from_pairs([("Geography", "d-geo")]);

        let payloads = match_hierarchies(
            &[HierarchyDetail { column_id: "s-geo".to_string(), roots: vec![] }],
            &source,
            &index,
        );
        assert!(payloads.is_empty());
    }

    #[test]
    fn test_reconcile_indexes_destination() {
        let source = schema(
            "src",
            json!([{"id": "s1", "name": {"en": "A"}}, {"id": "s2", "name": {"en": "B"}}]),
        );
        let destination = schema("dest", json!([{"id": "d1", "name": {"en": "A"}}]));

        let index = reconcile(&source, &destination);
        assert_eq!(index.lookup("A"), Some("d1"));
        assert_eq!(index.lookup("B"), None);
    }
}
