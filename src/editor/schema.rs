// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Editor schemas.
//!
//! A schema lists the node and mark types a document may contain, the
//! attributes each accepts, and which nodes are leaves. Nodes built through
//! a schema are validated; building an invalid node fails with a
//! `SchemaError`. An open schema accepts any name and attribute.
//!
//! The `ychange` attribute and mark are always accepted: they carry
//! attribution when rendering history.

use std::collections::BTreeMap;
use std::rc::Rc;

use thiserror::Error;

use crate::Attrs;
use crate::Value;
use super::node::Mark;
use super::node::Node;

/// Name of the attribute and mark reserved for synchronization metadata.
pub const SYNC_MARKER: &str = "ychange";

/// Errors raised when a node does not fit the schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("unknown node type {0:?}")]
    UnknownNode(String),

    #[error("unknown mark type {0:?}")]
    UnknownMark(String),

    #[error("node {node:?} has no attribute {attr:?}")]
    UnknownAttribute { node: String, attr: String },

    #[error("node {node:?} requires attribute {attr:?}")]
    MissingAttribute { node: String, attr: String },

    #[error("leaf node {0:?} cannot have content")]
    LeafWithContent(String),

    #[error("text nodes cannot be empty")]
    EmptyText,
}

/// Specification of one node type.
#[derive(Clone, Debug, Default)]
pub struct NodeSpec {
    /// Accepted attributes with their defaults. `None` marks a required
    /// attribute.
    pub attrs: BTreeMap<String, Option<Value>>,
    pub leaf: bool,
}

impl NodeSpec {
    pub fn new() -> NodeSpec {
        return NodeSpec::default();
    }

    pub fn leaf() -> NodeSpec {
        return NodeSpec { leaf: true, ..NodeSpec::default() };
    }

    /// Accept `name`, defaulting to `default` when absent.
    pub fn attr(mut self, name: &str, default: Value) -> NodeSpec {
        self.attrs.insert(name.to_string(), Some(default));
        return self;
    }

    /// Require `name`.
    pub fn required(mut self, name: &str) -> NodeSpec {
        self.attrs.insert(name.to_string(), None);
        return self;
    }
}

/// Specification of one mark type.
#[derive(Clone, Debug, Default)]
pub struct MarkSpec {
    pub attrs: BTreeMap<String, Option<Value>>,
}

impl MarkSpec {
    pub fn new() -> MarkSpec {
        return MarkSpec::default();
    }

    pub fn attr(mut self, name: &str, default: Value) -> MarkSpec {
        self.attrs.insert(name.to_string(), Some(default));
        return self;
    }
}

/// The set of node and mark types a document may contain.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    nodes: BTreeMap<String, NodeSpec>,
    marks: BTreeMap<String, MarkSpec>,
    open: bool,
}

/// Builds a closed schema.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn node(mut self, name: &str, spec: NodeSpec) -> SchemaBuilder {
        self.schema.nodes.insert(name.to_string(), spec);
        return self;
    }

    pub fn mark(mut self, name: &str, spec: MarkSpec) -> SchemaBuilder {
        self.schema.marks.insert(name.to_string(), spec);
        return self;
    }

    pub fn build(self) -> Schema {
        return self.schema;
    }
}

impl Schema {
    /// A schema accepting every node, mark and attribute.
    pub fn open() -> Schema {
        return Schema { open: true, ..Schema::default() };
    }

    pub fn builder() -> SchemaBuilder {
        return SchemaBuilder::default();
    }

    pub fn is_open(&self) -> bool {
        return self.open;
    }

    /// Whether `name` is a leaf node type.
    pub fn is_leaf(&self, name: &str) -> bool {
        return self.nodes.get(name).map_or(false, |spec| spec.leaf);
    }

    fn fill_attrs(
        owner: &str,
        specs: &BTreeMap<String, Option<Value>>,
        mut attrs: Attrs,
    ) -> Result<Attrs, SchemaError> {
        for key in attrs.keys() {
            if key != SYNC_MARKER && !specs.contains_key(key) {
                return Err(SchemaError::UnknownAttribute { node: owner.to_string(), attr: key.clone() });
            }
        }
        for (key, default) in specs {
            let present = attrs.get(key).map_or(false, |v| !v.is_null());
            if present {
                continue;
            }
            match default {
                Some(value) => {
                    attrs.insert(key.clone(), value.clone());
                }
                None => {
                    return Err(SchemaError::MissingAttribute { node: owner.to_string(), attr: key.clone() });
                }
            }
        }
        return Ok(attrs);
    }

    /// Build a validated element.
    pub fn node(&self, name: &str, attrs: Attrs, content: Vec<Rc<Node>>) -> Result<Rc<Node>, SchemaError> {
        if self.open {
            return Ok(Node::element(name, attrs, content));
        }
        let spec = self.nodes.get(name).ok_or_else(|| SchemaError::UnknownNode(name.to_string()))?;
        let attrs = Schema::fill_attrs(name, &spec.attrs, attrs)?;
        if spec.leaf {
            if !content.is_empty() {
                return Err(SchemaError::LeafWithContent(name.to_string()));
            }
            return Ok(Node::leaf(name, attrs));
        }
        return Ok(Node::element(name, attrs, content));
    }

    /// Build a validated text run.
    pub fn text(&self, text: &str, marks: Vec<Mark>) -> Result<Rc<Node>, SchemaError> {
        if text.is_empty() {
            return Err(SchemaError::EmptyText);
        }
        let mut checked = Vec::with_capacity(marks.len());
        for mark in marks {
            checked.push(self.mark(&mark.name, mark.attrs)?);
        }
        return Ok(Node::text(text, checked));
    }

    /// Build a validated mark.
    pub fn mark(&self, name: &str, attrs: Attrs) -> Result<Mark, SchemaError> {
        if self.open || name == SYNC_MARKER {
            return Ok(Mark::with_attrs(name, attrs));
        }
        let spec = self.marks.get(name).ok_or_else(|| SchemaError::UnknownMark(name.to_string()))?;
        let attrs = Schema::fill_attrs(name, &spec.attrs, attrs)?;
        return Ok(Mark::with_attrs(name, attrs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        return Schema::builder()
            .node("paragraph", NodeSpec::new())
            .node("heading", NodeSpec::new().attr("level", Value::from(1)))
            .node("image", NodeSpec::leaf().required("src"))
            .mark("bold", MarkSpec::new())
            .build();
    }

    #[test]
    fn defaults_are_filled() {
        let heading = schema().node("heading", Attrs::new(), vec![]).unwrap();
        assert_eq!(heading.attrs().unwrap().get("level"), Some(&Value::from(1)));
    }

    #[test]
    fn unknown_types_and_attrs_are_rejected() {
        let schema = schema();
        assert_eq!(
            schema.node("table", Attrs::new(), vec![]),
            Err(SchemaError::UnknownNode("table".to_string()))
        );
        let mut attrs = Attrs::new();
        attrs.insert("color".to_string(), Value::from("red"));
        assert!(matches!(
            schema.node("paragraph", attrs, vec![]),
            Err(SchemaError::UnknownAttribute { .. })
        ));
        assert!(matches!(schema.mark("italic", Attrs::new()), Err(SchemaError::UnknownMark(_))));
    }

    #[test]
    fn leaf_rules_are_enforced() {
        let schema = schema();
        assert!(matches!(
            schema.node("image", Attrs::new(), vec![]),
            Err(SchemaError::MissingAttribute { .. })
        ));
        let mut attrs = Attrs::new();
        attrs.insert("src".to_string(), Value::from("a.png"));
        let image = schema.node("image", attrs.clone(), vec![]).unwrap();
        assert_eq!(image.node_size(), 1);
        let text = schema.text("x", vec![]).unwrap();
        assert_eq!(
            schema.node("image", attrs, vec![text]),
            Err(SchemaError::LeafWithContent("image".to_string()))
        );
    }

    #[test]
    fn sync_marker_is_always_accepted() {
        let schema = schema();
        let mut attrs = Attrs::new();
        attrs.insert(SYNC_MARKER.to_string(), Value::from("x"));
        assert!(schema.node("paragraph", attrs, vec![]).is_ok());
        assert!(schema.mark(SYNC_MARKER, Attrs::new()).is_ok());
    }

    #[test]
    fn open_schema_accepts_anything() {
        let schema = Schema::open();
        assert!(schema.node("anything", Attrs::new(), vec![]).is_ok());
        assert!(schema.mark("whatever", Attrs::new()).is_ok());
        assert_eq!(schema.text("", vec![]), Err(SchemaError::EmptyText));
    }
}
