//! Turning trees back into source text.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::error::SerializeError;
use crate::node::Node;
use crate::stream::{WalkEvent, Walker};

/// Sigil printed in place of a gap.
pub const GAP_SIGIL: &str = "<//>";

/// Produces source text from a tree.
///
/// Every gap and every expression-flagged slot must print as exactly one
/// gap sigil, in document order, so the expression list built alongside the
/// text lines up with the gaps a parser will report.
pub trait Serializer {
    fn serialize(&self, root: &Rc<Node>) -> Result<String, SerializeError>;
}

impl<F> Serializer for F
where
    F: Fn(&Rc<Node>) -> Result<String, SerializeError>,
{
    fn serialize(&self, root: &Rc<Node>) -> Result<String, SerializeError> {
        self(root)
    }
}

/// Prints literals verbatim, in tag order.
#[derive(Debug, Clone)]
pub struct SourcePrinter {
    gap_sigil: SmolStr,
}

impl Default for SourcePrinter {
    fn default() -> Self {
        Self {
            gap_sigil: SmolStr::new_static(GAP_SIGIL),
        }
    }
}

impl SourcePrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gap_sigil(mut self, sigil: impl Into<SmolStr>) -> Self {
        self.gap_sigil = sigil.into();
        self
    }
}

impl Serializer for SourcePrinter {
    fn serialize(&self, root: &Rc<Node>) -> Result<String, SerializeError> {
        let mut out = String::new();
        for event in Walker::new(root.clone()).embed_expressions() {
            match event {
                WalkEvent::Literal(value) => out.push_str(&value),
                WalkEvent::Gap { .. } | WalkEvent::Embedded { .. } => out.push_str(&self.gap_sigil),
                _ => {}
            }
        }
        Ok(out)
    }
}
