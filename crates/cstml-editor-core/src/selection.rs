//! Selection ranges over visual ids and their resolution to a tree node.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::bindings::BindingTable;
use crate::node::{Node, NodeId};

/// A pair of visual element ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRange {
    pub start: Option<SmolStr>,
    pub end: Option<SmolStr>,
}

impl SelectionRange {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(id: impl Into<SmolStr>) -> Self {
        let id = id.into();
        Self {
            start: Some(id.clone()),
            end: Some(id),
        }
    }

    pub fn new(start: impl Into<SmolStr>, end: impl Into<SmolStr>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn is_single(&self) -> bool {
        self.start.is_some() && self.start == self.end
    }

    /// The node the range selects: the common ancestor of both endpoints.
    ///
    /// `None` when either endpoint is missing or not bound.
    pub fn resolve(&self, bindings: &BindingTable) -> Option<Rc<Node>> {
        let start = bindings.node_for_visual(self.start.as_deref()?)?;
        let end = bindings.node_for_visual(self.end.as_deref()?)?;
        common_ancestor(bindings, start.id(), end.id())
    }
}

/// Deepest node that is an ancestor of (or equal to) both `a` and `b`.
pub fn common_ancestor(bindings: &BindingTable, a: NodeId, b: NodeId) -> Option<Rc<Node>> {
    let a = bindings.ancestors(a);
    let b = bindings.ancestors(b);
    if a.is_empty() || b.is_empty() {
        return None;
    }

    // Walk both chains up from the leaves, trimming the longer one first so
    // both indices sit at the same depth.
    let mut i = a.len();
    let mut j = b.len();
    while i > 0 && j > 0 {
        if i == j && a[i - 1].id() == b[j - 1].id() {
            return Some(a[i - 1].clone());
        }
        if i >= j {
            i -= 1;
        }
        if j > i {
            j -= 1;
        }
    }
    None
}
