//! Conversion between flat tag streams and trees.
//!
//! Both directions run on explicit stacks rather than recursion: building
//! keeps one `NodeBuilder` per open node, walking keeps one parked
//! `ChildCursor` per level so a level can be resumed after a deeper one ends.

use std::rc::Rc;

use crate::error::{EditorError, Result};
use crate::node::{ChildCursor, Node, NodeBuilder, NodeId, Step};
use crate::tag::{ReferenceTag, Tag};

/// Locates a node by the slot that reached it.
///
/// Two visits of the same node at different depths are different paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub node: NodeId,
    pub reference: Option<ReferenceTag>,
    pub depth: usize,
    pub parent: Option<NodeId>,
}

impl Path {
    pub fn root(node: NodeId) -> Self {
        Self {
            node,
            reference: None,
            depth: 0,
            parent: None,
        }
    }

    fn child(&self, node: NodeId, reference: ReferenceTag) -> Self {
        Self {
            node,
            reference: Some(reference),
            depth: self.depth + 1,
            parent: Some(self.node),
        }
    }
}

struct BuildFrame {
    builder: NodeBuilder,
    slot: Option<PendingSlot>,
}

#[derive(Clone)]
struct PendingSlot {
    reference: ReferenceTag,
    shifted: bool,
}

fn attach(builder: &mut NodeBuilder, slot: PendingSlot, value: Rc<Node>, index: usize) -> Result<()> {
    if slot.shifted {
        builder
            .shift(value)
            .map(|_| ())
            .ok_or_else(|| EditorError::malformed(index, "shift without a preceding reference"))
    } else {
        builder.add(slot.reference, value);
        Ok(())
    }
}

/// Build a tree from a tag stream.
///
/// The k-th `Gap` consumes the k-th entry of `expressions`. A gap stub entry,
/// or running out of entries, leaves the slot as a plain gap; any other entry
/// is embedded by identity and its reference is flagged as an expression.
pub fn tree_from_stream<'t>(
    tags: impl IntoIterator<Item = &'t Tag>,
    expressions: &[Rc<Node>],
) -> Result<Rc<Node>> {
    let mut stack: Vec<BuildFrame> = Vec::new();
    let mut pending: Option<PendingSlot> = None;
    let mut root: Option<Rc<Node>> = None;
    let mut expressions = expressions.iter();
    let mut count = 0;

    for (index, tag) in tags.into_iter().enumerate() {
        count = index + 1;
        if root.is_some() {
            return Err(EditorError::malformed(index, "content after the root node"));
        }

        // Stub streams: a lone gap or null stands for itself.
        if stack.is_empty() {
            match tag {
                Tag::Gap => {
                    root = Some(Node::gap());
                    continue;
                }
                Tag::Null => {
                    root = Some(Node::null());
                    continue;
                }
                Tag::Embedded(node) => {
                    root = Some(node.clone());
                    continue;
                }
                Tag::Open(_) => {}
                _ => return Err(EditorError::malformed(index, "stream must begin with an open tag")),
            }
        }

        match tag {
            Tag::Open(open) => {
                if !stack.is_empty() && pending.is_none() {
                    return Err(EditorError::malformed(index, "open tag without a reference"));
                }
                if !stack.is_empty() && open.is_fragment() {
                    return Err(EditorError::malformed(index, "nested fragment"));
                }
                stack.push(BuildFrame {
                    builder: NodeBuilder::new(open.clone()),
                    slot: pending.take(),
                });
            }
            Tag::Literal(value) => {
                if pending.is_some() {
                    return Err(EditorError::malformed(index, "literal where a slot value was expected"));
                }
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| EditorError::malformed(index, "literal outside a node"))?;
                frame.builder.literal(value.clone());
            }
            Tag::Reference(reference) => {
                if pending.is_some() {
                    return Err(EditorError::malformed(index, "reference where a slot value was expected"));
                }
                pending = Some(PendingSlot {
                    reference: reference.clone(),
                    shifted: false,
                });
            }
            Tag::Shift => {
                if pending.is_some() {
                    return Err(EditorError::malformed(index, "shift where a slot value was expected"));
                }
                let reference = stack
                    .last()
                    .and_then(|frame| frame.builder.last_reference())
                    .cloned()
                    .ok_or_else(|| EditorError::malformed(index, "shift without a preceding reference"))?;
                pending = Some(PendingSlot {
                    reference,
                    shifted: true,
                });
            }
            Tag::ArrayInitializer => {
                let slot = pending
                    .take()
                    .ok_or_else(|| EditorError::malformed(index, "array initializer without a reference"))?;
                if slot.shifted || !slot.reference.is_array {
                    return Err(EditorError::malformed(index, "array initializer on a non-array reference"));
                }
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| EditorError::malformed(index, "array initializer outside a node"))?;
                frame.builder.init_array(slot.reference);
            }
            Tag::Gap | Tag::Null | Tag::Embedded(_) => {
                let mut slot = pending
                    .take()
                    .ok_or_else(|| EditorError::malformed(index, "value without a reference"))?;
                let value = match tag {
                    Tag::Gap => match expressions.next() {
                        Some(expression) if !expression.is_gap() => {
                            slot.reference = slot.reference.with_expression(true);
                            expression.clone()
                        }
                        _ => Node::gap(),
                    },
                    Tag::Embedded(node) => node.clone(),
                    _ => Node::null(),
                };
                let frame = stack
                    .last_mut()
                    .ok_or_else(|| EditorError::malformed(index, "value outside a node"))?;
                attach(&mut frame.builder, slot, value, index)?;
            }
            Tag::Close => {
                if pending.is_some() {
                    return Err(EditorError::malformed(index, "close where a slot value was expected"));
                }
                let frame = stack
                    .pop()
                    .ok_or_else(|| EditorError::malformed(index, "close without open"))?;
                let node = frame.builder.finish();
                match (frame.slot, stack.last_mut()) {
                    (Some(slot), Some(parent)) => attach(&mut parent.builder, slot, node, index)?,
                    (None, None) => root = Some(node),
                    _ => return Err(EditorError::malformed(index, "unbalanced node nesting")),
                }
            }
        }
    }

    if !stack.is_empty() {
        return Err(EditorError::malformed(count, "stream ended inside an open node"));
    }
    root.ok_or_else(|| EditorError::malformed(count, "empty stream"))
}

/// One step of a depth-first walk over a tree.
#[derive(Debug, Clone)]
pub enum WalkEvent {
    Open { node: Rc<Node>, path: Path },
    Literal(smol_str::SmolStr),
    Reference { reference: ReferenceTag, shifted: bool },
    ArrayInitializer,
    Gap { node: Rc<Node>, path: Path },
    Null { node: Rc<Node>, path: Path },
    /// An out-of-band value left unexpanded.
    Embedded { node: Rc<Node>, path: Path },
    Close { node: Rc<Node>, path: Path },
}

struct Level {
    node: Rc<Node>,
    path: Path,
    cursor: ChildCursor,
}

/// Explicit-stack walk producing the flat tag order of a tree.
pub struct Walker {
    stack: Vec<Level>,
    queued: Option<WalkEvent>,
    expand_expressions: bool,
}

impl Walker {
    pub fn new(root: Rc<Node>) -> Self {
        let path = Path::root(root.id());
        let mut walker = Self {
            stack: Vec::new(),
            queued: None,
            expand_expressions: true,
        };
        if root.is_gap() {
            walker.queued = Some(WalkEvent::Gap { node: root, path });
        } else if root.is_null() {
            walker.queued = Some(WalkEvent::Null { node: root, path });
        } else {
            walker.stack.push(Level {
                node: root,
                path,
                cursor: ChildCursor::default(),
            });
        }
        walker
    }

    /// Emit expression-flagged slots as `Embedded` instead of walking them.
    pub fn embed_expressions(mut self) -> Self {
        self.expand_expressions = false;
        self
    }

    /// Abandon the node whose `Open` was just yielded.
    ///
    /// The walk resumes after that node's `Close`, which is not yielded.
    pub fn skip_subtree(&mut self) {
        self.stack.pop();
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl Iterator for Walker {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        if let Some(event) = self.queued.take() {
            return Some(event);
        }

        let level = self.stack.last_mut()?;
        let step = level.cursor.next(&level.node);
        match step {
            Some(Step::Open(_)) => Some(WalkEvent::Open {
                node: level.node.clone(),
                path: level.path.clone(),
            }),
            Some(Step::Literal(value)) => Some(WalkEvent::Literal(value.clone())),
            Some(Step::ArrayInitializer(reference)) => {
                let reference = reference.clone();
                self.queued = Some(WalkEvent::ArrayInitializer);
                Some(WalkEvent::Reference {
                    reference,
                    shifted: false,
                })
            }
            Some(Step::Slot(slot)) => {
                let value = slot.value.clone();
                let path = level.path.child(value.id(), slot.reference.clone());
                let event = WalkEvent::Reference {
                    reference: slot.reference.clone(),
                    shifted: slot.shifted,
                };

                if value.is_gap() {
                    self.queued = Some(WalkEvent::Gap { node: value, path });
                } else if value.is_null() {
                    self.queued = Some(WalkEvent::Null { node: value, path });
                } else if slot.reference.is_expression() && !self.expand_expressions {
                    self.queued = Some(WalkEvent::Embedded { node: value, path });
                } else {
                    self.stack.push(Level {
                        node: value,
                        path,
                        cursor: ChildCursor::default(),
                    });
                }
                Some(event)
            }
            Some(Step::Close) | None => {
                let level = self.stack.pop()?;
                Some(WalkEvent::Close {
                    node: level.node,
                    path: level.path,
                })
            }
        }
    }
}

impl Node {
    /// The flat tag stream of this subtree.
    ///
    /// Expression-flagged slots stream as `Embedded` so their values keep
    /// their identity when the stream is rebuilt into a tree.
    pub fn stream(self: &Rc<Self>) -> impl Iterator<Item = Tag> + use<> {
        Walker::new(self.clone())
            .embed_expressions()
            .filter_map(|event| match event {
                WalkEvent::Open { node, .. } => node.open().cloned().map(Tag::Open),
                WalkEvent::Literal(value) => Some(Tag::Literal(value)),
                WalkEvent::Reference { shifted: true, .. } => Some(Tag::Shift),
                WalkEvent::Reference { reference, .. } => Some(Tag::Reference(reference)),
                WalkEvent::ArrayInitializer => Some(Tag::ArrayInitializer),
                WalkEvent::Gap { .. } => Some(Tag::Gap),
                WalkEvent::Null { .. } => Some(Tag::Null),
                WalkEvent::Embedded { node, .. } => Some(Tag::Embedded(node)),
                WalkEvent::Close { .. } => Some(Tag::Close),
            })
    }

    /// Same tag sequence, ignoring node identity outside embedded values.
    pub fn structurally_eq(self: &Rc<Self>, other: &Rc<Node>) -> bool {
        self.stream().eq(other.stream())
    }
}
