//! Bidirectional node ↔ visual bindings.
//!
//! Each render pass builds a fresh table seeded from the previous one, so
//! bindings for nodes that are no longer reachable drop out on their own and a
//! failed pass leaves the previous table untouched.

use std::collections::HashMap;
use std::rc::Rc;

use smol_str::{SmolStr, format_smolstr};

use crate::node::{Node, NodeId};
use crate::stream::Path;
use crate::visual::{Visual, VisualElement};

#[derive(Debug, Clone)]
pub struct Binding {
    pub node: Rc<Node>,
    pub path: Path,
    /// `None` for a root node, which renders as the fragment itself.
    pub visual: Option<Rc<VisualElement>>,
}

#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    nodes: HashMap<NodeId, Binding>,
    visuals: HashMap<SmolStr, NodeId>,
    root: Option<NodeId>,
    /// Visual id counter, carried across passes so ids never repeat.
    next_visual: usize,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty table that continues this table's visual id sequence.
    pub(crate) fn successor(&self) -> Self {
        Self {
            next_visual: self.next_visual,
            ..Self::default()
        }
    }

    pub(crate) fn next_visual_id(&mut self, prefix: Option<&str>) -> SmolStr {
        let id = match prefix {
            Some(prefix) => format_smolstr!("{}-n{}", prefix, self.next_visual),
            None => format_smolstr!("n{}", self.next_visual),
        };
        self.next_visual += 1;
        id
    }

    /// Bind the root. It has a visual only when the whole tree is a gap.
    pub(crate) fn bind_root(&mut self, node: Rc<Node>, visual: Option<Rc<VisualElement>>) {
        let id = node.id();
        self.root = Some(id);
        if let Some(visual) = &visual {
            self.visuals.insert(visual.id.clone(), id);
        }
        self.nodes.insert(
            id,
            Binding {
                path: Path::root(id),
                node,
                visual,
            },
        );
    }

    pub(crate) fn bind(&mut self, node: Rc<Node>, path: Path, visual: Rc<VisualElement>) {
        self.visuals.insert(visual.id.clone(), node.id());
        self.nodes.insert(
            node.id(),
            Binding {
                node,
                path,
                visual: Some(visual),
            },
        );
    }

    /// Carry over the bindings of a reused visual subtree.
    ///
    /// `path` is where the subtree's top node sits now; descendants keep their
    /// references and parents but are re-based to the new depth. Returns the
    /// ids of every adopted node.
    pub(crate) fn adopt(
        &mut self,
        previous: &BindingTable,
        element: &Rc<VisualElement>,
        path: Path,
    ) -> Vec<NodeId> {
        let Some(top) = previous.nodes.get(&element.node) else {
            return Vec::new();
        };
        let mut adopted = vec![top.node.id()];
        self.bind(top.node.clone(), path.clone(), element.clone());

        let mut stack: Vec<(&Rc<VisualElement>, usize)> = vec![(element, path.depth)];
        while let Some((parent, depth)) = stack.pop() {
            for child in &parent.children {
                let Visual::Element(child) = child else {
                    continue;
                };
                if let Some(binding) = previous.nodes.get(&child.node) {
                    let mut path = binding.path.clone();
                    path.depth = depth + 1;
                    adopted.push(binding.node.id());
                    self.bind(binding.node.clone(), path, child.clone());
                }
                stack.push((child, depth + 1));
            }
        }
        adopted
    }

    pub fn root(&self) -> Option<&Rc<Node>> {
        self.root.and_then(|id| self.node(id))
    }

    pub fn get(&self, id: NodeId) -> Option<&Binding> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Rc<Node>> {
        self.nodes.get(&id).map(|binding| &binding.node)
    }

    pub fn node_for_visual(&self, visual: &str) -> Option<&Rc<Node>> {
        self.visuals.get(visual).and_then(|id| self.node(*id))
    }

    pub fn visual_for_node(&self, id: NodeId) -> Option<&Rc<VisualElement>> {
        self.nodes.get(&id).and_then(|binding| binding.visual.as_ref())
    }

    pub fn path_of(&self, id: NodeId) -> Option<&Path> {
        self.nodes.get(&id).map(|binding| &binding.path)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<&Rc<Node>> {
        self.path_of(id)
            .and_then(|path| path.parent)
            .and_then(|parent| self.node(parent))
    }

    /// Ancestor chain from the root down to and including `id`.
    ///
    /// Empty when `id` is not bound.
    pub fn ancestors(&self, id: NodeId) -> Vec<Rc<Node>> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(binding) = self.nodes.get(&id) else {
                break;
            };
            chain.push(binding.node.clone());
            current = binding.path.parent;
        }
        chain.reverse();
        chain
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.path_of(id).and_then(|path| path.parent);
        }
        false
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
