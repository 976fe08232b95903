//! Visual fragment tree produced by the renderer.
//!
//! Visuals never own tree nodes; an element only records the `NodeId` it was
//! rendered from; the [`BindingTable`](crate::bindings::BindingTable) is the
//! lookup between the two.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::node::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Text(SmolStr),
    LineBreak,
    Element(Rc<VisualElement>),
}

/// Classification and interaction classes of an element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisualClasses {
    pub gap: bool,
    pub escape: bool,
    pub token: bool,
    pub trivia: bool,
    pub has_gap: bool,
    pub selected: bool,
    pub highlighted: bool,
    pub dragging: bool,
}

impl VisualClasses {
    /// Class names in output order, always starting with `node`.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        [
            ("node", true),
            ("gap", self.gap),
            ("escape", self.escape),
            ("token", self.token),
            ("trivia", self.trivia),
            ("hasGap", self.has_gap),
            ("selected", self.selected),
            ("highlighted", self.highlighted),
            ("dragging", self.dragging),
        ]
        .into_iter()
        .filter_map(|(name, on)| on.then_some(name))
    }
}

/// A rendered node.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualElement {
    /// Element id, unique across render passes of one binding table lineage.
    pub id: SmolStr,
    pub node: NodeId,
    /// `data-type`: the node type, absent for gaps.
    pub node_type: Option<SmolStr>,
    /// `data-path`: the printed reference that reached the node.
    pub path: SmolStr,
    pub classes: VisualClasses,
    pub contenteditable: bool,
    pub draggable: bool,
    pub width: usize,
    pub children: Vec<Visual>,
}

impl VisualElement {
    /// Rendered text content, with line breaks as `\n`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        push_text(&self.children, &mut out);
        out
    }
}

fn push_text(visuals: &[Visual], out: &mut String) {
    for visual in visuals {
        match visual {
            Visual::Text(text) => out.push_str(text),
            Visual::LineBreak => out.push('\n'),
            Visual::Element(element) => push_text(&element.children, out),
        }
    }
}

/// Root output of a render pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub children: Vec<Visual>,
}

impl Fragment {
    pub fn text(&self) -> String {
        let mut out = String::new();
        push_text(&self.children, &mut out);
        out
    }

    /// All elements, outermost first, in document order.
    pub fn elements(&self) -> Vec<Rc<VisualElement>> {
        let mut out = Vec::new();
        let mut stack: Vec<std::slice::Iter<'_, Visual>> = vec![self.children.iter()];
        while let Some(iter) = stack.last_mut() {
            match iter.next() {
                Some(Visual::Element(element)) => {
                    out.push(element.clone());
                    stack.push(element.children.iter());
                }
                Some(_) => {}
                None => {
                    stack.pop();
                }
            }
        }
        out
    }

    pub fn find(&self, id: &str) -> Option<Rc<VisualElement>> {
        self.elements().into_iter().find(|element| element.id == id)
    }
}

/// Present literal text: spaces become non-breaking, newlines become breaks.
///
/// Applied to every literal regardless of nesting.
pub fn present_literal(value: &str) -> Vec<Visual> {
    let mut out = Vec::new();
    for (i, line) in value.split('\n').enumerate() {
        if i > 0 {
            out.push(Visual::LineBreak);
        }
        if !line.is_empty() {
            out.push(Visual::Text(line.replace(' ', "\u{a0}").into()));
        }
    }
    out
}
