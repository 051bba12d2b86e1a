use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

use super::constants::{HIERARCHY_COLUMN_TYPE, NAME_LOCALE};

/// API key/token pair attached to every request body
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub key: String,
    pub token: String,
}

impl CredentialPair {
    pub fn new(key: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("key", &"[REDACTED]")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Read the English label out of a localized name object (`{"en": "Revenue"}`)
pub fn localized_name(name: &Value) -> Option<&str> {
    name.get(NAME_LOCALE).and_then(|v| v.as_str())
}

/// First element of the `rows` array returned by every `get` action
pub fn first_row(body: &Value) -> Option<&Value> {
    body.get("rows").and_then(|rows| rows.as_array()).and_then(|rows| rows.first())
}

/// A column as listed in a dataset schema
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaColumn {
    pub id: String,
    pub name: Option<String>,
    pub column_type: Option<String>,
}

impl SchemaColumn {
    pub fn is_hierarchy(&self) -> bool {
        self.column_type.as_deref() == Some(HIERARCHY_COLUMN_TYPE)
    }
}

/// Columns of one dataset, in the order the service returned them
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSchema {
    pub dataset_id: String,
    pub columns: Vec<SchemaColumn>,
    pub hierarchy_column_ids: BTreeSet<String>,
}

impl DatasetSchema {
    /// Build a schema from a securable row carrying a `columns` array.
    /// Columns without an id are skipped.
    pub fn from_row(dataset_id: &str, row: &Value) -> Result<Self, String> {
        let raw_columns = row
            .get("columns")
            .and_then(|c| c.as_array())
            .ok_or_else(|| format!("Dataset {} response has no 'columns' array", dataset_id))?;

        let mut columns = Vec::with_capacity(raw_columns.len());
        let mut hierarchy_column_ids = BTreeSet::new();

        for item in raw_columns {
            let Some(id) = item.get("id").and_then(|v| v.as_str()) else {
                log::debug!("Skipping column without id in dataset {}", dataset_id);
                continue;
            };
            let column = SchemaColumn {
                id: id.to_string(),
                name: item.get("name").and_then(localized_name).map(str::to_string),
                column_type: item.get("type").and_then(|v| v.as_str()).map(str::to_string),
            };
            if column.is_hierarchy() {
                hierarchy_column_ids.insert(column.id.clone());
            }
            columns.push(column);
        }

        Ok(Self {
            dataset_id: dataset_id.to_string(),
            columns,
            hierarchy_column_ids,
        })
    }

    pub fn column_name(&self, column_id: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.id == column_id)
            .and_then(|c| c.name.as_deref())
    }

    pub fn hierarchy_columns(&self) -> impl Iterator<Item = &SchemaColumn> {
        self.columns.iter().filter(|c| self.hierarchy_column_ids.contains(&c.id))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Full property bag of a column as returned by the column resource
pub type ColumnProperties = Map<String, Value>;

/// A fetched source column together with the name it was listed under
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDetail {
    pub column_id: String,
    pub name: Option<String>,
    pub properties: ColumnProperties,
}

/// One level of a hierarchy column's drill-down tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyNode {
    #[serde(default)]
    pub id: Option<String>,
    /// `None` when the service sent no `children` key; an empty list is kept
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<HierarchyNode>>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl HierarchyNode {
    pub fn children(&self) -> &[HierarchyNode] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Drop this node if it is an unassigned placeholder (null id), and
    /// recursively drop placeholder descendants otherwise.
    pub fn prune_unassigned(self) -> Option<Self> {
        self.id.as_ref()?;
        let children = self.children.map(|children| {
            children
                .into_iter()
                .filter_map(HierarchyNode::prune_unassigned)
                .collect()
        });
        Some(Self { children, ..self })
    }
}

/// Hierarchy tree of one column, fetched from the source dataset
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyDetail {
    pub column_id: String,
    pub roots: Vec<HierarchyNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardColumn {
    pub id: String,
    #[serde(default)]
    pub name: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDataset {
    pub id: String,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub columns: Vec<DashboardColumn>,
}

/// Dashboard securable with its referenced datasets embedded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDocument {
    pub id: String,
    #[serde(default)]
    pub name: Value,
    #[serde(default)]
    pub datasets: Vec<DashboardDataset>,
    #[serde(default)]
    pub contents: Value,
    #[serde(default)]
    pub css: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DashboardDocument {
    pub fn dataset(&self, dataset_id: &str) -> Option<&DashboardDataset> {
        self.datasets.iter().find(|d| d.id == dataset_id)
    }

    pub fn display_name(&self) -> Option<&str> {
        localized_name(&self.name)
    }
}

/// Filter widget found on a dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_from_row_records_hierarchies() {
        let row = json!({
            "id": "ds-1",
            "columns": [
                {"id": "c1", "name": {"en": "Country"}, "type": "hierarchy"},
                {"id": "c2", "name": {"en": "Revenue"}, "type": "numeric"},
                {"name": {"en": "No id"}, "type": "numeric"},
                {"id": "c3", "type": "datetime"}
            ]
        });

        let schema = DatasetSchema::from_row("ds-1", &row).unwrap();
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.column_name("c1"), Some("Country"));
        assert_eq!(schema.column_name("c3"), None);
        assert!(schema.hierarchy_column_ids.contains("c1"));
        assert_eq!(schema.hierarchy_columns().count(), 1);
    }

    #[test]
    fn test_schema_without_columns_is_error() {
        assert!(DatasetSchema::from_row("ds-1", &json!({"id": "ds-1"})).is_err());
    }

    #[test]
    fn test_prune_unassigned_nodes() {
        let node: HierarchyNode = serde_json::from_value(json!({
            "id": "root",
            "children": [
                {"id": "us", "name": {"en": "US"}, "children": [{"id": null}, {"id": "ca"}]},
                {"id": null, "name": {"en": "Unassigned"}}
            ]
        }))
        .unwrap();

        let pruned = node.prune_unassigned().unwrap();
        assert_eq!(pruned.children().len(), 1);
        assert_eq!(pruned.children()[0].id.as_deref(), Some("us"));
        assert_eq!(pruned.children()[0].children().len(), 1);
        assert_eq!(pruned.children()[0].attributes["name"]["en"], "US");

        let placeholder = HierarchyNode { id: None, children: None, attributes: Map::new() };
        assert!(placeholder.prune_unassigned().is_none());
    }

    #[test]
    fn test_hierarchy_node_keeps_source_shape() {
        let leaf = json!({"id": "h1", "name": {"en": "A"}, "children": []});
        let node: HierarchyNode = serde_json::from_value(leaf.clone()).unwrap();
        assert_eq!(serde_json::to_value(&node).unwrap(), leaf);

        let bare = json!({"id": "h2", "name": {"en": "B"}});
        let node: HierarchyNode = serde_json::from_value(bare.clone()).unwrap();
        assert_eq!(node.children, None);
        assert_eq!(serde_json::to_value(&node).unwrap(), bare);

        let tree = json!({"id": "root", "children": [{"id": "x", "children": []}, {"id": null}]});
        let node: HierarchyNode = serde_json::from_value(tree).unwrap();
        let pruned = serde_json::to_value(node.prune_unassigned().unwrap()).unwrap();
        assert_eq!(pruned, json!({"id": "root", "children": [{"id": "x", "children": []}]}));
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let pair = CredentialPair::new("my-key", "my-token");
        let printed = format!("{:?}", pair);
        assert!(!printed.contains("my-key"));
        assert!(!printed.contains("my-token"));
    }
}
