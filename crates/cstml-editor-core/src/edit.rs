//! Structural edits: Set and Move.
//!
//! An edit never mutates the tree. It rebuilds only the nodes on the ancestor
//! chains of the affected locations, attaching every other child by identity,
//! then serializes the rebuilt root. Alongside the text it builds the
//! expression list: one entry per gap sigil, in document order, holding the
//! node that should fill that gap when the text is parsed again (or a gap stub
//! for a gap that stays empty).

use std::collections::HashSet;
use std::rc::Rc;

use crate::bindings::BindingTable;
use crate::error::{EditorError, Result};
use crate::node::{ChildCursor, Node, NodeBuilder, NodeId, Step};
use crate::serialize::Serializer;
use crate::tag::{EXPRESSION_MARKER, ReferenceTag};

/// What to put at the edit target.
#[derive(Debug, Clone)]
pub enum Replacement {
    /// A newly built value.
    Fresh(Rc<Node>),
    /// An existing bound node, whose old location becomes a gap.
    Relocated(NodeId),
}

/// Result of a structural edit, ready to be parsed back into a tree.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub source: String,
    pub expressions: Vec<Rc<Node>>,
    /// The rebuilt tree the source was printed from.
    pub root: Rc<Node>,
}

struct Level {
    source: Rc<Node>,
    cursor: ChildCursor,
    builder: NodeBuilder,
    /// Slot the rebuilt node fills in its parent; `None` at the root.
    slot: Option<ReferenceTag>,
    /// Inside an out-of-band value, whose gaps are not part of the printed
    /// document and so get no expression entries.
    in_expression: bool,
    /// Expression entry the rebuilt node replaces.
    reserved: Option<usize>,
}

impl Level {
    fn new(
        source: Rc<Node>,
        slot: Option<ReferenceTag>,
        in_expression: bool,
        reserved: Option<usize>,
    ) -> Result<Self> {
        let open = source.open().cloned().ok_or_else(|| {
            EditorError::invariant(format!("ancestor {} has no open tag", source.id()))
        })?;
        Ok(Self {
            source,
            cursor: ChildCursor::default(),
            builder: NodeBuilder::new(open),
            slot,
            in_expression,
            reserved,
        })
    }
}

/// Applies structural edits against the bindings of the latest render.
pub struct EditEngine<'a, S> {
    bindings: &'a BindingTable,
    serializer: &'a S,
}

impl<'a, S: Serializer> EditEngine<'a, S> {
    pub fn new(bindings: &'a BindingTable, serializer: &'a S) -> Self {
        Self {
            bindings,
            serializer,
        }
    }

    /// Replace `target` with `value`.
    pub fn set(&self, target: NodeId, value: Rc<Node>) -> Result<EditOutcome> {
        self.apply(target, Replacement::Fresh(value))
    }

    /// Relocate `source` into `dest`, leaving a gap where `source` was.
    pub fn move_node(&self, source: NodeId, dest: NodeId) -> Result<EditOutcome> {
        self.apply(dest, Replacement::Relocated(source))
    }

    pub fn apply(&self, target: NodeId, replacement: Replacement) -> Result<EditOutcome> {
        let root = self
            .bindings
            .root()
            .cloned()
            .ok_or_else(|| EditorError::invariant("no rendered tree to edit"))?;
        let target_chain = self.chain(target, &root)?;
        if target == root.id() {
            return Err(EditorError::unsupported("replacing the root node"));
        }

        let mut on_chain: HashSet<NodeId> = target_chain.iter().map(|node| node.id()).collect();
        let (value, relocated, carries_expression) = match replacement {
            Replacement::Fresh(value) => (value, None, false),
            Replacement::Relocated(source) => {
                if on_chain.contains(&source) {
                    return Err(EditorError::invariant(format!(
                        "cannot move {source} into its own subtree"
                    )));
                }
                let source_chain = self.chain(source, &root)?;
                on_chain.extend(source_chain.iter().map(|node| node.id()));
                let value = source_chain
                    .last()
                    .cloned()
                    .ok_or_else(|| EditorError::invariant(format!("{source} is not bound")))?;
                let carries_expression = self.is_expression(&value, None);
                (value, Some(source), carries_expression)
            }
        };

        tracing::debug!(
            target: "cstml::edit",
            target_node = %target,
            relocated = ?relocated,
            chain = on_chain.len(),
            "rebuilding ancestor chain"
        );

        let mut expressions: Vec<Rc<Node>> = Vec::new();
        let mut stack = vec![Level::new(root, None, false, None)?];
        let rebuilt = loop {
            let level = stack
                .last_mut()
                .ok_or_else(|| EditorError::invariant("edit walk lost its root"))?;
            let Some(step) = level.cursor.next(&level.source) else {
                return Err(EditorError::invariant(format!(
                    "node {} ended without a close tag",
                    level.source.id()
                )));
            };

            match step {
                Step::Open(_) => {}
                Step::Literal(value) => {
                    level.builder.literal(value.clone());
                }
                Step::ArrayInitializer(reference) => {
                    level.builder.init_array(reference.clone());
                }
                Step::Close => {
                    let Some(done) = stack.pop() else {
                        return Err(EditorError::invariant("edit walk lost its root"));
                    };
                    let node = done.builder.finish();
                    if let Some(index) = done.reserved {
                        if let Some(entry) = expressions.get_mut(index) {
                            *entry = node.clone();
                        }
                    }
                    match (stack.last_mut(), done.slot) {
                        (Some(parent), Some(slot)) => {
                            parent.builder.add(slot, node);
                        }
                        (None, _) => break node,
                        (Some(_), None) => {
                            return Err(EditorError::invariant("rebuilt node has no slot"));
                        }
                    }
                }
                Step::Slot(slot) => {
                    if slot.shifted {
                        return Err(EditorError::unsupported(format!(
                            "editing through a shift reference in {}",
                            level.source.id()
                        )));
                    }
                    let child = slot.value.clone();
                    let reference = slot.reference;
                    let id = child.id();
                    let in_expression = level.in_expression;

                    if id == target {
                        if !in_expression {
                            if carries_expression {
                                expressions.push(value.clone());
                            } else {
                                collect_expressions(&value, &mut expressions);
                            }
                        }
                        level
                            .builder
                            .add(reference.with_expression(carries_expression), value.clone());
                    } else if Some(id) == relocated {
                        let gap = Node::gap();
                        if !in_expression {
                            expressions.push(gap.clone());
                        }
                        level.builder.add(reference.with_expression(false), gap);
                    } else if on_chain.contains(&id) {
                        // An expression on the chain keeps its sigil; its entry
                        // is filled with the rebuilt node on close.
                        let reserved = (!in_expression
                            && self.is_expression(&child, Some(&reference)))
                        .then(|| {
                            expressions.push(child.clone());
                            expressions.len() - 1
                        });
                        let nested = in_expression || reserved.is_some();
                        stack.push(Level::new(child, Some(reference), nested, reserved)?);
                    } else if in_expression {
                        level.builder.add(reference, child);
                    } else if self.is_expression(&child, Some(&reference)) {
                        expressions.push(child);
                        level
                            .builder
                            .add(reference.with_expression(false), Node::gap());
                    } else {
                        if child.is_gap() {
                            expressions.push(child.clone());
                        } else {
                            collect_expressions(&child, &mut expressions);
                        }
                        level.builder.add(reference, child);
                    }
                }
            }
        };

        while expressions.last().is_some_and(|node| node.is_gap()) {
            expressions.pop();
        }

        let source = self.serializer.serialize(&rebuilt)?;
        tracing::debug!(
            target: "cstml::edit",
            expressions = expressions.len(),
            len = source.len(),
            "edit serialized"
        );

        Ok(EditOutcome {
            source,
            expressions,
            root: rebuilt,
        })
    }

    /// Root-first ancestor chain of `id`, checked against the bound root.
    fn chain(&self, id: NodeId, root: &Rc<Node>) -> Result<Vec<Rc<Node>>> {
        let chain = self.bindings.ancestors(id);
        match chain.first() {
            Some(first) if Rc::ptr_eq(first, root) => Ok(chain),
            Some(_) => Err(EditorError::invariant(format!(
                "{id} is bound under a different root"
            ))),
            None => Err(EditorError::invariant(format!(
                "{id} is not bound by the latest render"
            ))),
        }
    }

    /// Whether `node` was supplied out of band.
    ///
    /// The bound visual's path label is authoritative; the slot's reference
    /// flag covers nodes without a visual.
    fn is_expression(&self, node: &Rc<Node>, reference: Option<&ReferenceTag>) -> bool {
        let by_visual = self
            .bindings
            .visual_for_node(node.id())
            .is_some_and(|visual| visual.path.ends_with(EXPRESSION_MARKER));
        let by_reference = match reference {
            Some(reference) => reference.is_expression(),
            None => self
                .bindings
                .path_of(node.id())
                .and_then(|path| path.reference.as_ref())
                .is_some_and(ReferenceTag::is_expression),
        };
        by_visual || by_reference
    }
}

/// Append the expression entries of an unchanged subtree, in document order.
fn collect_expressions(node: &Rc<Node>, out: &mut Vec<Rc<Node>>) {
    if node.sigil_count() == 0 {
        return;
    }
    if node.is_gap() {
        out.push(node.clone());
        return;
    }

    let mut stack: Vec<(Rc<Node>, ChildCursor)> = vec![(node.clone(), ChildCursor::default())];
    while let Some((current, cursor)) = stack.last_mut() {
        match cursor.next(current) {
            Some(Step::Slot(slot)) => {
                if slot.reference.is_expression() || slot.value.is_gap() {
                    out.push(slot.value.clone());
                } else if slot.value.sigil_count() > 0 {
                    let value = slot.value.clone();
                    stack.push((value, ChildCursor::default()));
                }
            }
            Some(_) => {}
            None => {
                stack.pop();
            }
        }
    }
}
