//! Immutable tree nodes.
//!
//! A node keeps the raw tags that produced it (`children`) and a `properties`
//! index from reference names to resolved child values. The index is always
//! derivable from the tags: a `Reference` (or `Shift`) tag in `children` marks
//! a slot, and the k-th slot naming `elements` resolves to the k-th value
//! stored under `elements`.
//!
//! Gaps and nulls are stub nodes (`children == [Gap]` / `[Null]`) so they can
//! be bound to visuals like any other node.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use smol_str::SmolStr;

use crate::tag::{NodeFlags, OpenTag, ReferenceTag, Tag};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Value stored under one reference name.
#[derive(Debug, Clone)]
pub enum Property {
    Single(Rc<Node>),
    Array(Vec<Rc<Node>>),
}

impl Property {
    pub fn get(&self, index: usize) -> Option<&Rc<Node>> {
        match self {
            Property::Single(node) if index == 0 => Some(node),
            Property::Single(_) => None,
            Property::Array(nodes) => nodes.get(index),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rc<Node>> {
        match self {
            Property::Single(node) => std::slice::from_ref(node).iter(),
            Property::Array(nodes) => nodes.iter(),
        }
    }
}

#[derive(Debug)]
pub struct Node {
    id: NodeId,
    open: Option<OpenTag>,
    flags: NodeFlags,
    children: Vec<Tag>,
    properties: Vec<(SmolStr, Property)>,
    /// Number of gap sigils this subtree prints as.
    sigils: usize,
}

impl Node {
    fn stub(tag: Tag) -> Rc<Node> {
        let is_gap = matches!(tag, Tag::Gap);
        Rc::new(Node {
            id: NodeId::next(),
            open: None,
            flags: NodeFlags {
                has_gap: is_gap,
                ..NodeFlags::default()
            },
            children: vec![tag],
            properties: Vec::new(),
            sigils: usize::from(is_gap),
        })
    }

    /// A fresh unresolved gap.
    pub fn gap() -> Rc<Node> {
        Self::stub(Tag::Gap)
    }

    /// A fresh absent value.
    pub fn null() -> Rc<Node> {
        Self::stub(Tag::Null)
    }

    /// A leaf node holding a single literal.
    pub fn token(open: OpenTag, text: impl Into<SmolStr>) -> Rc<Node> {
        let mut builder = NodeBuilder::new(open);
        builder.literal(text);
        builder.finish()
    }

    /// Rebuild this node's open tag around new literal text.
    ///
    /// Returns `None` for stubs, which have no open tag to reuse.
    pub fn with_text(&self, text: impl Into<SmolStr>) -> Option<Rc<Node>> {
        self.open.clone().map(|open| Node::token(open, text))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn open(&self) -> Option<&OpenTag> {
        self.open.as_ref()
    }

    pub fn node_type(&self) -> Option<&SmolStr> {
        self.open.as_ref().and_then(|open| open.node_type.as_ref())
    }

    pub fn language(&self) -> Option<&SmolStr> {
        self.open.as_ref().and_then(|open| open.language.as_ref())
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_token(&self) -> bool {
        self.flags.token
    }

    pub fn is_gap(&self) -> bool {
        matches!(self.children.as_slice(), [Tag::Gap])
    }

    pub fn is_null(&self) -> bool {
        matches!(self.children.as_slice(), [Tag::Null])
    }

    pub fn is_stub(&self) -> bool {
        self.open.is_none()
    }

    pub fn children(&self) -> &[Tag] {
        &self.children
    }

    /// Properties in the order their names first appeared.
    pub fn properties(&self) -> impl Iterator<Item = (&SmolStr, &Property)> {
        self.properties.iter().map(|(name, value)| (name, value))
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn value_at(&self, name: &str, index: usize) -> Option<&Rc<Node>> {
        self.get(name).and_then(|property| property.get(index))
    }

    /// All resolved child values, in property order.
    pub fn values(&self) -> impl Iterator<Item = &Rc<Node>> {
        self.properties.iter().flat_map(|(_, property)| property.iter())
    }

    /// Number of gap sigils the serialized subtree contains: plain gaps plus
    /// slots whose value was supplied out of band.
    pub fn sigil_count(&self) -> usize {
        self.sigils
    }

    /// Concatenated literal text directly inside this node.
    pub fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|tag| match tag {
                Tag::Literal(value) => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Accumulates a node's tags and properties.
#[derive(Debug)]
pub struct NodeBuilder {
    open: OpenTag,
    children: Vec<Tag>,
    properties: Vec<(SmolStr, Property)>,
    last_reference: Option<ReferenceTag>,
}

impl NodeBuilder {
    pub fn new(open: OpenTag) -> Self {
        Self {
            children: vec![Tag::Open(open.clone())],
            open,
            properties: Vec::new(),
            last_reference: None,
        }
    }

    pub fn open(&self) -> &OpenTag {
        &self.open
    }

    pub fn last_reference(&self) -> Option<&ReferenceTag> {
        self.last_reference.as_ref()
    }

    pub fn literal(&mut self, value: impl Into<SmolStr>) -> &mut Self {
        self.children.push(Tag::Literal(value.into()));
        self
    }

    /// Bind the next slot named by `reference` to `value`.
    pub fn add(&mut self, reference: ReferenceTag, value: Rc<Node>) -> &mut Self {
        self.store(&reference.name, reference.is_array, value);
        self.children.push(Tag::Reference(reference.clone()));
        self.last_reference = Some(reference);
        self
    }

    /// Bind a relay slot under the preceding reference.
    ///
    /// Returns `None` when there is no preceding reference to relay.
    pub fn shift(&mut self, value: Rc<Node>) -> Option<&mut Self> {
        let name = self.last_reference.as_ref()?.name.clone();
        self.store(&name, true, value);
        self.children.push(Tag::Shift);
        Some(self)
    }

    /// Declare an array slot without binding an element.
    pub fn init_array(&mut self, reference: ReferenceTag) -> &mut Self {
        if !self.properties.iter().any(|(key, _)| *key == reference.name) {
            self.properties
                .push((reference.name.clone(), Property::Array(Vec::new())));
        }
        self.children.push(Tag::Reference(reference.clone()));
        self.children.push(Tag::ArrayInitializer);
        self.last_reference = Some(reference);
        self
    }

    fn store(&mut self, name: &SmolStr, is_array: bool, value: Rc<Node>) {
        match self.properties.iter_mut().find(|(key, _)| key == name) {
            None if is_array => self
                .properties
                .push((name.clone(), Property::Array(vec![value]))),
            None => self.properties.push((name.clone(), Property::Single(value))),
            Some((_, property)) => {
                let mut values = match std::mem::replace(property, Property::Array(Vec::new())) {
                    Property::Single(previous) => vec![previous],
                    Property::Array(values) => values,
                };
                values.push(value);
                *property = Property::Array(values);
            }
        }
    }

    /// Close the node and derive its aggregate flags.
    pub fn finish(mut self) -> Rc<Node> {
        self.children.push(Tag::Close);

        let mut node = Node {
            id: NodeId::next(),
            flags: self.open.flags,
            open: Some(self.open),
            children: self.children,
            properties: self.properties,
            sigils: 0,
        };

        let mut has_gap = false;
        let mut sigils = 0;
        let mut cursor = ChildCursor::default();
        while let Some(step) = cursor.next(&node) {
            if let Step::Slot(slot) = step {
                has_gap |= slot.value.flags.has_gap;
                sigils += if slot.reference.is_expression() {
                    1
                } else {
                    slot.value.sigils
                };
            }
        }

        node.flags.has_gap = has_gap;
        node.sigils = sigils;
        Rc::new(node)
    }
}

/// Tracks array-slot occurrence indices while scanning a node's tags.
#[derive(Debug, Clone, Default)]
pub struct SlotResolver {
    seen: Vec<(SmolStr, usize)>,
    last: Option<ReferenceTag>,
}

impl SlotResolver {
    /// The reference governing a slot tag and its occurrence index.
    pub fn resolve(&mut self, tag: &Tag) -> Option<(ReferenceTag, usize)> {
        let reference = match tag {
            Tag::Reference(reference) => reference.clone(),
            Tag::Shift => self.last.clone()?,
            _ => return None,
        };

        let index = match self.seen.iter_mut().find(|(name, _)| *name == reference.name) {
            Some((_, count)) => {
                *count += 1;
                *count - 1
            }
            None => {
                self.seen.push((reference.name.clone(), 1));
                0
            }
        };

        self.last = Some(reference.clone());
        Some((reference, index))
    }

    /// Record a reference that declares an array without consuming a value.
    pub fn declare(&mut self, reference: &ReferenceTag) {
        self.last = Some(reference.clone());
    }
}

/// A resolved child slot.
#[derive(Debug, Clone)]
pub struct Slot<'a> {
    pub reference: ReferenceTag,
    pub shifted: bool,
    pub value: &'a Rc<Node>,
}

#[derive(Debug, Clone)]
pub enum Step<'a> {
    Open(&'a OpenTag),
    Literal(&'a SmolStr),
    Slot(Slot<'a>),
    ArrayInitializer(&'a ReferenceTag),
    Close,
}

/// Resumable left-to-right scan over one node's tags.
///
/// The cursor owns no borrow of the node, so it can be parked on an explicit
/// stack while a deeper level is scanned and resumed afterwards with its
/// array-slot indices intact.
#[derive(Debug, Clone, Default)]
pub struct ChildCursor {
    pos: usize,
    resolver: SlotResolver,
}

impl ChildCursor {
    pub fn next<'a>(&mut self, node: &'a Node) -> Option<Step<'a>> {
        loop {
            let tag = node.children.get(self.pos)?;
            self.pos += 1;

            match tag {
                Tag::Open(open) => return Some(Step::Open(open)),
                Tag::Literal(value) => return Some(Step::Literal(value)),
                Tag::Close => return Some(Step::Close),
                Tag::Reference(reference)
                    if matches!(node.children.get(self.pos), Some(Tag::ArrayInitializer)) =>
                {
                    self.pos += 1;
                    self.resolver.declare(reference);
                    return Some(Step::ArrayInitializer(reference));
                }
                Tag::Reference(_) | Tag::Shift => {
                    let Some((reference, index)) = self.resolver.resolve(tag) else {
                        tracing::warn!(node = %node.id, "shift without a preceding reference");
                        continue;
                    };
                    let Some(value) = node.value_at(&reference.name, index) else {
                        tracing::warn!(
                            node = %node.id,
                            reference = %reference,
                            index,
                            "slot has no resolved value"
                        );
                        continue;
                    };
                    return Some(Step::Slot(Slot {
                        reference,
                        shifted: matches!(tag, Tag::Shift),
                        value,
                    }));
                }
                Tag::Gap | Tag::Null | Tag::ArrayInitializer | Tag::Embedded(_) => continue,
            }
        }
    }
}
