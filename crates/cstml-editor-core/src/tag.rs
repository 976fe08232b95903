//! Tag stream vocabulary.
//!
//! A parser describes a tree as a flat sequence of tags:
//!
//! ```text
//! node := Open (Literal | slot)* Close
//! slot := (Reference | Shift) (node | Gap | Null | Embedded)
//!       | Reference ArrayInitializer
//! ```
//!
//! An `Open` without a type begins a fragment, which is only valid as the root.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};

use crate::node::Node;

/// Reference name marking formatting/whitespace content.
pub const TRIVIA_REFERENCE: &str = "#";

/// Reference name marking escape-sequence content.
pub const ESCAPE_REFERENCE: &str = "@";

/// Suffix on a printed reference whose value was supplied out of band.
pub const EXPRESSION_MARKER: char = '$';

/// Classification flags carried by an open tag and derived onto its node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFlags {
    /// Terminal lexical unit, editable as text.
    pub token: bool,
    /// Reached through a formatting/whitespace reference.
    pub trivia: bool,
    /// Reached through an escape reference.
    pub escape: bool,
    /// Built-in literal value.
    pub intrinsic: bool,
    /// Embedded-language boundary.
    pub expression: bool,
    /// The node or one of its descendants still holds an unresolved gap.
    #[serde(rename = "hasGap")]
    pub has_gap: bool,
}

impl NodeFlags {
    pub fn token() -> Self {
        Self {
            token: true,
            ..Self::default()
        }
    }

    pub fn trivia() -> Self {
        Self {
            trivia: true,
            ..Self::default()
        }
    }

    pub fn escape() -> Self {
        Self {
            escape: true,
            ..Self::default()
        }
    }

    /// Trivia and escape nodes sit off the primary derivation path.
    pub fn is_boundary(&self) -> bool {
        self.trivia || self.escape
    }
}

/// Begins a node. `node_type` is absent for a bare fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTag {
    #[serde(default, rename = "type")]
    pub node_type: Option<SmolStr>,
    #[serde(default)]
    pub flags: NodeFlags,
    #[serde(default)]
    pub attributes: BTreeMap<SmolStr, SmolStr>,
    #[serde(default)]
    pub language: Option<SmolStr>,
}

impl OpenTag {
    pub fn fragment() -> Self {
        Self::default()
    }

    pub fn node(node_type: impl Into<SmolStr>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            ..Self::default()
        }
    }

    pub fn token(node_type: impl Into<SmolStr>) -> Self {
        Self::node(node_type).with_flags(NodeFlags::token())
    }

    pub fn with_flags(mut self, flags: NodeFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_language(mut self, language: impl Into<SmolStr>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn is_fragment(&self) -> bool {
        self.node_type.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceFlags {
    /// The slot's value came from the expression list rather than the source.
    pub expression: bool,
}

/// Names the upcoming child slot on the enclosing node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceTag {
    pub name: SmolStr,
    #[serde(default, rename = "isArray")]
    pub is_array: bool,
    #[serde(default)]
    pub flags: ReferenceFlags,
}

impl ReferenceTag {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            is_array: false,
            flags: ReferenceFlags::default(),
        }
    }

    pub fn array(name: impl Into<SmolStr>) -> Self {
        Self {
            is_array: true,
            ..Self::new(name)
        }
    }

    pub fn with_expression(mut self, expression: bool) -> Self {
        self.flags.expression = expression;
        self
    }

    pub fn is_expression(&self) -> bool {
        self.flags.expression
    }

    pub fn is_trivia(&self) -> bool {
        self.name == TRIVIA_REFERENCE
    }

    pub fn is_escape(&self) -> bool {
        self.name == ESCAPE_REFERENCE
    }

    /// The printed reference without its trailing colon, e.g. `elements[]$`.
    ///
    /// This is what visuals carry as their `data-path`.
    pub fn label(&self) -> SmolStr {
        let array = if self.is_array { "[]" } else { "" };
        if self.flags.expression {
            format_smolstr!("{}{}{}", self.name, array, EXPRESSION_MARKER)
        } else {
            format_smolstr!("{}{}", self.name, array)
        }
    }
}

impl fmt::Display for ReferenceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.label())
    }
}

/// One element of a tag stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Tag {
    Open(OpenTag),
    Close,
    Literal(SmolStr),
    Reference(ReferenceTag),
    /// Relay slot that re-targets the preceding reference.
    Shift,
    Gap,
    Null,
    ArrayInitializer,
    /// A pre-built subtree spliced in by identity.
    #[serde(skip)]
    Embedded(Rc<Node>),
}

impl Tag {
    pub fn open(node_type: impl Into<SmolStr>) -> Self {
        Tag::Open(OpenTag::node(node_type))
    }

    pub fn open_token(node_type: impl Into<SmolStr>) -> Self {
        Tag::Open(OpenTag::token(node_type))
    }

    pub fn open_fragment() -> Self {
        Tag::Open(OpenTag::fragment())
    }

    pub fn literal(value: impl Into<SmolStr>) -> Self {
        Tag::Literal(value.into())
    }

    pub fn reference(name: impl Into<SmolStr>) -> Self {
        Tag::Reference(ReferenceTag::new(name))
    }

    pub fn array_reference(name: impl Into<SmolStr>) -> Self {
        Tag::Reference(ReferenceTag::array(name))
    }

    /// True for tags that introduce a child slot.
    pub fn is_slot(&self) -> bool {
        matches!(self, Tag::Reference(_) | Tag::Shift)
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Tag::Open(a), Tag::Open(b)) => a == b,
            (Tag::Literal(a), Tag::Literal(b)) => a == b,
            (Tag::Reference(a), Tag::Reference(b)) => a == b,
            (Tag::Embedded(a), Tag::Embedded(b)) => Rc::ptr_eq(a, b),
            (Tag::Close, Tag::Close)
            | (Tag::Shift, Tag::Shift)
            | (Tag::Gap, Tag::Gap)
            | (Tag::Null, Tag::Null)
            | (Tag::ArrayInitializer, Tag::ArrayInitializer) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_label() {
        assert_eq!(ReferenceTag::new("value").label(), "value");
        assert_eq!(ReferenceTag::array("elements").label(), "elements[]");
        assert_eq!(
            ReferenceTag::array("elements").with_expression(true).label(),
            "elements[]$"
        );
        assert_eq!(ReferenceTag::new("key").to_string(), "key:");
    }

    #[test]
    fn test_trivia_and_escape_names() {
        assert!(ReferenceTag::new("#").is_trivia());
        assert!(ReferenceTag::new("@").is_escape());
        assert!(!ReferenceTag::new("value").is_trivia());
    }

    #[test]
    fn test_tag_json_shape() {
        let tags = vec![
            Tag::open_token("Num"),
            Tag::literal("1"),
            Tag::Close,
            Tag::array_reference("elements"),
            Tag::Gap,
        ];
        let json = serde_json::to_string(&tags).unwrap();
        let back: Vec<Tag> = serde_json::from_str(&json).unwrap();
        assert_eq!(tags, back);
        assert!(json.contains(r#"{"type":"Close"}"#));
        assert!(json.contains(r#""isArray":true"#));
    }

    #[test]
    fn test_open_tag_defaults_from_json() {
        let tag: Tag = serde_json::from_str(r#"{"type":"Open","value":{"type":"List"}}"#).unwrap();
        assert_eq!(tag, Tag::open("List"));
        let fragment: Tag = serde_json::from_str(r#"{"type":"Open","value":{}}"#).unwrap();
        assert_eq!(fragment, Tag::open_fragment());
    }
}
