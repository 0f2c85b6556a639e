// model = "claude-opus-4-5"
// created = "2026-10-15"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Editor tree nodes.
//!
//! Nodes are immutable and shared through `Rc`; an edit rebuilds the path
//! from the root to the change and reuses every other subtree. Two nodes are
//! the *same* node iff they are the same allocation (`Rc::ptr_eq`).
//!
//! Text is stored one node per run of equally-marked characters. Content
//! lists are kept normalized: adjacent text nodes with equal marks are
//! merged and empty text nodes are dropped.
//!
//! # Sizes
//!
//! Positions count tokens: every character of text is one token, a leaf
//! element is one token, and any other element is its content plus an
//! opening and a closing token.

use std::rc::Rc;

use crate::Attrs;

/// A formatting mark on a text run (bold, link, comment, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct Mark {
    pub name: String,
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(name: &str) -> Mark {
        return Mark { name: name.to_string(), attrs: Attrs::new() };
    }

    pub fn with_attrs(name: &str, attrs: Attrs) -> Mark {
        return Mark { name: name.to_string(), attrs };
    }
}

/// Sort marks by name, keeping the last mark of each name.
pub fn normalize_marks(marks: Vec<Mark>) -> Vec<Mark> {
    let mut out: Vec<Mark> = Vec::with_capacity(marks.len());
    for mark in marks {
        match out.iter_mut().find(|m| m.name == mark.name) {
            Some(existing) => *existing = mark,
            None => out.push(mark),
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    return out;
}

/// A node of the editor tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Element {
        name: String,
        attrs: Attrs,
        content: Vec<Rc<Node>>,
        /// Leaf elements hold no content and occupy a single position.
        leaf: bool,
    },
    Text {
        text: String,
        marks: Vec<Mark>,
    },
}

impl Node {
    /// An element with normalized content. Not validated against a schema.
    pub fn element(name: &str, attrs: Attrs, content: Vec<Rc<Node>>) -> Rc<Node> {
        return Rc::new(Node::Element {
            name: name.to_string(),
            attrs,
            content: normalize_content(content),
            leaf: false,
        });
    }

    /// A leaf element. Not validated against a schema.
    pub fn leaf(name: &str, attrs: Attrs) -> Rc<Node> {
        return Rc::new(Node::Element {
            name: name.to_string(),
            attrs,
            content: Vec::new(),
            leaf: true,
        });
    }

    /// A text run. Not validated against a schema.
    pub fn text(text: &str, marks: Vec<Mark>) -> Rc<Node> {
        return Rc::new(Node::Text { text: text.to_string(), marks: normalize_marks(marks) });
    }

    pub fn is_text(&self) -> bool {
        return matches!(self, Node::Text { .. });
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            Node::Element { leaf, .. } => return *leaf,
            Node::Text { .. } => return true,
        }
    }

    /// The node type name. Text runs are named `text`.
    pub fn name(&self) -> &str {
        match self {
            Node::Element { name, .. } => return name,
            Node::Text { .. } => return "text",
        }
    }

    pub fn attrs(&self) -> Option<&Attrs> {
        match self {
            Node::Element { attrs, .. } => return Some(attrs),
            Node::Text { .. } => return None,
        }
    }

    pub fn content(&self) -> &[Rc<Node>] {
        match self {
            Node::Element { content, .. } => return content,
            Node::Text { .. } => return &[],
        }
    }

    pub fn marks(&self) -> &[Mark] {
        match self {
            Node::Element { .. } => return &[],
            Node::Text { marks, .. } => return marks,
        }
    }

    /// The string of a text run.
    pub fn text_str(&self) -> Option<&str> {
        match self {
            Node::Element { .. } => return None,
            Node::Text { text, .. } => return Some(text),
        }
    }

    pub fn child_count(&self) -> usize {
        return self.content().len();
    }

    /// Concatenated text of the whole subtree.
    pub fn text_content(&self) -> String {
        match self {
            Node::Text { text, .. } => return text.clone(),
            Node::Element { content, .. } => {
                return content.iter().map(|c| c.text_content()).collect();
            }
        }
    }

    /// Tokens this node occupies in its parent.
    pub fn node_size(&self) -> usize {
        match self {
            Node::Text { text, .. } => return text.chars().count(),
            Node::Element { leaf: true, .. } => return 1,
            Node::Element { .. } => return self.content_size() + 2,
        }
    }

    /// Tokens of this node's content.
    pub fn content_size(&self) -> usize {
        return self.content().iter().map(|c| c.node_size()).sum();
    }

    /// A copy of this element with different content. Text runs are
    /// returned unchanged.
    pub fn with_content(&self, content: Vec<Rc<Node>>) -> Rc<Node> {
        match self {
            Node::Element { name, attrs, leaf, .. } => {
                return Rc::new(Node::Element {
                    name: name.clone(),
                    attrs: attrs.clone(),
                    content: normalize_content(content),
                    leaf: *leaf,
                });
            }
            Node::Text { .. } => return Rc::new(self.clone()),
        }
    }

    /// A copy of this element with different attributes.
    pub fn with_attrs(&self, attrs: Attrs) -> Rc<Node> {
        match self {
            Node::Element { name, content, leaf, .. } => {
                return Rc::new(Node::Element {
                    name: name.clone(),
                    attrs,
                    content: content.clone(),
                    leaf: *leaf,
                });
            }
            Node::Text { .. } => return Rc::new(self.clone()),
        }
    }

    /// A copy of this text run with different marks.
    pub fn with_marks(&self, marks: Vec<Mark>) -> Rc<Node> {
        match self {
            Node::Text { text, .. } => return Node::text(text, marks),
            Node::Element { .. } => return Rc::new(self.clone()),
        }
    }

    /// The characters `from..to` of a text run, as a new run with the same
    /// marks.
    pub fn cut_text(&self, from: usize, to: usize) -> Rc<Node> {
        let text: String = self.text_str().unwrap_or("").chars().skip(from).take(to.saturating_sub(from)).collect();
        return Rc::new(Node::Text { text, marks: self.marks().to_vec() });
    }

    /// Depth of the deepest element below this node.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack: Vec<(&Node, usize)> = vec![(self, 0)];
        while let Some((node, depth)) = stack.pop() {
            max = max.max(depth);
            for child in node.content() {
                stack.push((child, depth + 1));
            }
        }
        return max;
    }
}

/// Merge adjacent equally-marked text runs and drop empty ones.
/// Nodes that need no change keep their identity.
pub fn normalize_content(content: Vec<Rc<Node>>) -> Vec<Rc<Node>> {
    let mut out: Vec<Rc<Node>> = Vec::with_capacity(content.len());
    for node in content {
        if let Node::Text { text, marks } = &*node {
            if text.is_empty() {
                continue;
            }
            if let Some(last) = out.last_mut() {
                if let Node::Text { text: last_text, marks: last_marks } = &**last {
                    if last_marks == marks {
                        let merged = format!("{}{}", last_text, text);
                        *last = Rc::new(Node::Text { text: merged, marks: marks.clone() });
                        continue;
                    }
                }
            }
        }
        out.push(node);
    }
    return out;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(text: &str) -> Rc<Node> {
        return Node::element("paragraph", Attrs::new(), vec![Node::text(text, vec![])]);
    }

    #[test]
    fn sizes_follow_token_rules() {
        let doc = Node::element(
            "doc",
            Attrs::new(),
            vec![paragraph("abc"), Node::leaf("image", Attrs::new()), paragraph("")],
        );
        assert_eq!(doc.content()[0].node_size(), 5);
        assert_eq!(doc.content()[1].node_size(), 1);
        assert_eq!(doc.content()[2].node_size(), 2);
        assert_eq!(doc.content_size(), 8);
    }

    #[test]
    fn normalization_merges_and_drops_runs() {
        let bold = vec![Mark::new("bold")];
        let content = vec![
            Node::text("a", vec![]),
            Node::text("b", vec![]),
            Node::text("", vec![]),
            Node::text("c", bold.clone()),
        ];
        let para = Node::element("paragraph", Attrs::new(), content);
        assert_eq!(para.child_count(), 2);
        assert_eq!(para.content()[0].text_str(), Some("ab"));
        assert_eq!(para.content()[1].marks(), &bold[..]);
    }

    #[test]
    fn normalization_keeps_identity_of_untouched_nodes() {
        let kept = paragraph("x");
        let doc = Node::element("doc", Attrs::new(), vec![kept.clone()]);
        assert!(Rc::ptr_eq(&doc.content()[0], &kept));
    }

    #[test]
    fn marks_are_sorted_and_deduplicated() {
        let marks = normalize_marks(vec![Mark::new("italic"), Mark::new("bold"), Mark::new("italic")]);
        let names: Vec<&str> = marks.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["bold", "italic"]);
    }

    #[test]
    fn cut_text_counts_chars() {
        let text = Node::text("héllo", vec![]);
        assert_eq!(text.cut_text(1, 3).text_str(), Some("él"));
        assert_eq!(text.node_size(), 5);
    }
}
