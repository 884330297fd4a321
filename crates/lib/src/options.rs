//! Store configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration for a [`DataSet`](crate::DataSet).
///
/// All settings have defaults; a plain `Options::new()` yields a flat store
/// keyed by an `id` field with no typed fields.
///
/// # Examples
///
/// ```
/// use rowset::Options;
///
/// let options = Options::new()
///     .tree(true)
///     .id_field("_id")
///     .field_type("created", "Date");
/// assert!(options.tree);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Field holding the record identifier.
    pub id_field: String,
    /// Field holding the parent identifier (tree mode). `0`, null or absent
    /// means the record is a root.
    pub parent_field: String,
    /// Field under which hierarchical payloads embed their children.
    pub child_field: String,
    /// Field holding the sibling sequence number (tree mode).
    pub order_field: String,
    /// Field holding the depth, root = 0 (tree mode).
    pub level_field: String,
    /// Field flagging records that currently have children (tree mode).
    pub has_children_field: String,
    /// Whether the store maintains the tree overlay.
    pub tree: bool,
    /// Field name -> type name, compiled into a schema at construction.
    pub types: HashMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            id_field: "id".to_string(),
            parent_field: "parent".to_string(),
            child_field: "nodes".to_string(),
            order_field: "order".to_string(),
            level_field: "level".to_string(),
            has_children_field: "has_children".to_string(),
            tree: false,
            types: HashMap::new(),
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = name.into();
        self
    }

    pub fn parent_field(mut self, name: impl Into<String>) -> Self {
        self.parent_field = name.into();
        self
    }

    pub fn child_field(mut self, name: impl Into<String>) -> Self {
        self.child_field = name.into();
        self
    }

    pub fn order_field(mut self, name: impl Into<String>) -> Self {
        self.order_field = name.into();
        self
    }

    pub fn level_field(mut self, name: impl Into<String>) -> Self {
        self.level_field = name.into();
        self
    }

    pub fn has_children_field(mut self, name: impl Into<String>) -> Self {
        self.has_children_field = name.into();
        self
    }

    pub fn tree(mut self, tree: bool) -> Self {
        self.tree = tree;
        self
    }

    /// Declares a typed field. The type name is validated when the store is
    /// constructed.
    pub fn field_type(mut self, field: impl Into<String>, ty: impl Into<String>) -> Self {
        self.types.insert(field.into(), ty.into());
        self
    }
}
