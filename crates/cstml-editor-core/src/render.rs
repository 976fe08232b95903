//! Tree → visual fragment rendering.
//!
//! The renderer walks the tree with an explicit frame stack. A `Reference`
//! opens a slot frame; the node that fills the slot either takes that frame
//! over or, for trivia and escape boundaries, opens its own on top of it.
//! Closing a node wraps the frame's collected visuals in an element, binds
//! it, records its width and appends it to the enclosing frame.
//!
//! When a previous render is supplied, any subtree whose node still has a
//! bound visual from that pass (and is untouched by selection changes) is
//! spliced in as-is instead of being walked again.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::bindings::BindingTable;
use crate::error::{EditorError, Result};
use crate::node::{Node, NodeId};
use crate::options::RenderOptions;
use crate::selection::SelectionRange;
use crate::stream::{Path, WalkEvent, Walker};
use crate::tag::ReferenceTag;
use crate::visual::{Fragment, Visual, VisualClasses, VisualElement, present_literal};
use crate::width::WidthIndex;

/// Where a pointer-driven selection currently stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    None,
    /// Pointer is down and the range is still being extended.
    Selecting,
    Selected,
}

/// Interaction state that affects how elements are classed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionState {
    pub selected_range: SelectionRange,
    /// Node the current range resolved to.
    pub selection_root: Option<NodeId>,
    pub editing: bool,
    pub selection_state: SelectionState,
    /// Visual id of the current drop target while dragging.
    pub drag_target: Option<SmolStr>,
}

/// Output of one render pass.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub fragment: Fragment,
    pub bindings: BindingTable,
    pub widths: WidthIndex,
    state: InteractionState,
    highlighted: Option<NodeId>,
}

impl Rendered {
    pub fn to_html(&self) -> String {
        self.fragment.to_html()
    }

    /// Interaction state this pass was rendered with.
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn highlighted(&self) -> Option<NodeId> {
        self.highlighted
    }
}

struct Frame {
    node: Option<(Rc<Node>, Path)>,
    children: Vec<Visual>,
}

impl Frame {
    fn is_slot(&self) -> bool {
        self.node.is_none()
    }
}

/// Render pass configuration.
pub struct Renderer<'a> {
    options: &'a RenderOptions,
    previous: Option<&'a Rendered>,
    state: InteractionState,
}

impl<'a> Renderer<'a> {
    pub fn new(options: &'a RenderOptions) -> Self {
        Self {
            options,
            previous: None,
            state: InteractionState::default(),
        }
    }

    /// Reuse visuals and continue visual ids from an earlier pass.
    pub fn with_previous(mut self, previous: &'a Rendered) -> Self {
        self.previous = Some(previous);
        self
    }

    pub fn with_state(mut self, state: &InteractionState) -> Self {
        self.state = state.clone();
        self
    }

    /// Render `tree` into a fresh fragment, binding table and width index.
    ///
    /// Nothing is shared with the previous pass except reused visuals, so a
    /// failure leaves the previous output intact.
    pub fn render(&self, tree: &Rc<Node>) -> Result<Rendered> {
        let mut bindings = self
            .previous
            .map(|previous| previous.bindings.successor())
            .unwrap_or_default();
        let mut widths = WidthIndex::new();
        let highlighted = self.highlighted();

        let mut frames: Vec<Frame> = Vec::new();
        let mut output: Option<Vec<Visual>> = None;
        let mut reused = 0usize;

        let mut walker = Walker::new(tree.clone());
        while let Some(event) = walker.next() {
            match event {
                WalkEvent::Open { node, path } => {
                    if path.depth == 0 {
                        bindings.bind_root(node.clone(), None);
                        frames.push(Frame {
                            node: Some((node, path)),
                            children: Vec::new(),
                        });
                        continue;
                    }

                    if let Some((cached, previous)) = self.reusable(&node, &path, highlighted) {
                        walker.skip_subtree();
                        for id in bindings.adopt(&previous.bindings, &cached, path) {
                            widths.adopt(&previous.widths, id);
                        }
                        attach(&mut frames, Visual::Element(cached))?;
                        reused += 1;
                        tracing::trace!(target: "cstml::render", node = %node.id(), "reused cached visual");
                        continue;
                    }

                    let boundary = node.flags().is_boundary()
                        || path.reference.as_ref().is_some_and(|reference| {
                            reference.name == self.options.trivia_reference
                                || reference.name == self.options.escape_reference
                        });
                    match frames.last_mut() {
                        Some(top) if top.is_slot() && !boundary => top.node = Some((node, path)),
                        _ => frames.push(Frame {
                            node: Some((node, path)),
                            children: Vec::new(),
                        }),
                    }
                }
                WalkEvent::Literal(value) => {
                    let top = frames
                        .last_mut()
                        .ok_or_else(|| EditorError::invariant("literal outside a render frame"))?;
                    top.children.extend(present_literal(&value));
                }
                WalkEvent::Reference { .. } => frames.push(Frame {
                    node: None,
                    children: Vec::new(),
                }),
                WalkEvent::ArrayInitializer | WalkEvent::Null { .. } | WalkEvent::Embedded { .. } => {
                    if frames.last().is_some_and(Frame::is_slot) {
                        frames.pop();
                    }
                }
                WalkEvent::Gap { node, path } => {
                    if let Some((cached, previous)) = self.reusable(&node, &path, highlighted) {
                        for id in bindings.adopt(&previous.bindings, &cached, path) {
                            widths.adopt(&previous.widths, id);
                        }
                        attach(&mut frames, Visual::Element(cached))?;
                        reused += 1;
                        continue;
                    }
                    let width = widths.width(&node)?;
                    let children = vec![Visual::Text(self.options.gap_placeholder.clone())];
                    let element = self.element(&mut bindings, &node, &path, children, width, highlighted);
                    if path.depth == 0 {
                        bindings.bind_root(node, Some(element.clone()));
                        output = Some(vec![Visual::Element(element)]);
                    } else {
                        bindings.bind(node, path, element.clone());
                        attach(&mut frames, Visual::Element(element))?;
                    }
                }
                WalkEvent::Close { node, path } => {
                    let frame = frames
                        .pop()
                        .ok_or_else(|| EditorError::invariant("close without a render frame"))?;
                    let width = widths.width(&node)?;
                    if path.depth == 0 {
                        output = Some(frame.children);
                        continue;
                    }
                    let element =
                        self.element(&mut bindings, &node, &path, frame.children, width, highlighted);
                    bindings.bind(node, path, element.clone());
                    attach(&mut frames, Visual::Element(element))?;
                }
            }
        }

        let children =
            output.ok_or_else(|| EditorError::invariant("render walk ended without a root"))?;
        tracing::debug!(
            target: "cstml::render",
            nodes = bindings.len(),
            reused,
            "render complete"
        );

        Ok(Rendered {
            fragment: Fragment { children },
            bindings,
            widths,
            state: self.state.clone(),
            highlighted,
        })
    }

    /// Node the single-point selection sits on, looked up in the previous pass.
    fn highlighted(&self) -> Option<NodeId> {
        let range = &self.state.selected_range;
        if !range.is_single() {
            return None;
        }
        let start = range.start.as_deref()?;
        self.previous?
            .bindings
            .node_for_visual(start)
            .map(|node| node.id())
    }

    fn reusable(
        &self,
        node: &Rc<Node>,
        path: &Path,
        highlighted: Option<NodeId>,
    ) -> Option<(Rc<VisualElement>, &'a Rendered)> {
        let previous = self.previous?;
        if path.depth == 0 {
            return None;
        }
        let binding = previous.bindings.get(node.id())?;
        let visual = binding.visual.clone()?;
        if binding.path.reference != path.reference {
            return None;
        }

        // Any node whose classes change between the passes invalidates the
        // cached subtrees containing it.
        let interactive = [
            previous.state.selection_root,
            previous.highlighted,
            self.state.selection_root,
            highlighted,
        ];
        if interactive
            .into_iter()
            .flatten()
            .any(|id| previous.bindings.is_within(id, node.id()))
        {
            return None;
        }
        Some((visual, previous))
    }

    fn element(
        &self,
        bindings: &mut BindingTable,
        node: &Rc<Node>,
        path: &Path,
        children: Vec<Visual>,
        width: usize,
        highlighted: Option<NodeId>,
    ) -> Rc<VisualElement> {
        let flags = node.flags();
        let reference = path.reference.as_ref();
        let selected = self.state.selection_root == Some(node.id());
        let token = flags.token;

        let classes = VisualClasses {
            gap: node.is_gap(),
            escape: flags.escape
                || reference.is_some_and(|r| r.name == self.options.escape_reference),
            token,
            trivia: flags.trivia
                || reference.is_some_and(|r| r.name == self.options.trivia_reference),
            has_gap: flags.has_gap && !node.is_gap(),
            selected,
            highlighted: !selected && highlighted == Some(node.id()),
            dragging: selected && self.state.drag_target.is_some(),
        };

        // A node re-rendered across passes keeps its element id, so
        // selections made against the previous pass stay valid.
        let id = self
            .previous
            .and_then(|previous| previous.bindings.visual_for_node(node.id()))
            .map(|visual| visual.id.clone())
            .unwrap_or_else(|| bindings.next_visual_id(self.options.id_prefix.as_deref()));

        Rc::new(VisualElement {
            id,
            node: node.id(),
            node_type: node.node_type().cloned(),
            path: reference.map(ReferenceTag::label).unwrap_or_default(),
            classes,
            contenteditable: selected && self.state.editing && token,
            draggable: selected
                && !self.state.editing
                && self.state.selection_state == SelectionState::Selected,
            width,
            children,
        })
    }
}

/// Append a finished visual to the enclosing node frame, retiring the slot
/// frame it filled.
fn attach(frames: &mut Vec<Frame>, visual: Visual) -> Result<()> {
    if frames.last().is_some_and(Frame::is_slot) {
        frames.pop();
    }
    let parent = frames
        .last_mut()
        .ok_or_else(|| EditorError::invariant("visual without an enclosing frame"))?;
    parent.children.push(visual);
    Ok(())
}

/// Render `tree` with no previous pass and no interaction state.
pub fn render(tree: &Rc<Node>, options: &RenderOptions) -> Result<Rendered> {
    Renderer::new(options).render(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::tree_from_stream;
    use crate::tag::{OpenTag, Tag};

    // [1, <gap>]
    fn list_tags() -> Vec<Tag> {
        vec![
            Tag::open_fragment(),
            Tag::reference("value"),
            Tag::open("List"),
            Tag::literal("["),
            Tag::array_reference("elements"),
            Tag::open_token("Num"),
            Tag::literal("1"),
            Tag::Close,
            Tag::literal(", "),
            Tag::array_reference("elements"),
            Tag::Gap,
            Tag::literal("]"),
            Tag::Close,
            Tag::Close,
        ]
    }

    fn list() -> Rc<Node> {
        tree_from_stream(&list_tags(), &[]).unwrap()
    }

    #[test]
    fn test_render_list_with_gap() {
        let rendered = render(&list(), &RenderOptions::default()).unwrap();
        insta::assert_snapshot!(
            rendered.to_html().replace('\u{a0}', "&nbsp;"),
            @r#"<span id="n2" class="node hasGap" data-type="List" data-path="value">[<span id="n0" class="node token" data-type="Num" data-path="elements[]">1</span>,&nbsp;<span id="n1" class="node gap" data-path="elements[]">&nbsp;&nbsp;</span>]</span>"#
        );
        assert_eq!(rendered.bindings.len(), 4);
    }

    #[test]
    fn test_bindings_round_trip() {
        let tree = list();
        let rendered = render(&tree, &RenderOptions::default()).unwrap();
        for element in rendered.fragment.elements() {
            let node = rendered.bindings.node_for_visual(&element.id).unwrap();
            let back = rendered.bindings.visual_for_node(node.id()).unwrap();
            assert!(Rc::ptr_eq(back, &element));
        }
        assert!(Rc::ptr_eq(rendered.bindings.root().unwrap(), &tree));
    }

    #[test]
    fn test_widths_recorded() {
        let tree = list();
        let rendered = render(&tree, &RenderOptions::default()).unwrap();
        assert_eq!(rendered.widths.width_of(tree.id()), Some(2));
        let list = tree.value_at("value", 0).unwrap();
        let element = rendered.bindings.visual_for_node(list.id()).unwrap();
        assert_eq!(element.width, 2);
    }

    #[test]
    fn test_selection_classes_and_reuse() {
        let options = RenderOptions::default();
        let tree = list();
        let first = render(&tree, &options).unwrap();

        let list = tree.value_at("value", 0).unwrap();
        let one = list.value_at("elements", 0).unwrap();
        let gap = list.value_at("elements", 1).unwrap();
        let one_visual = first.bindings.visual_for_node(one.id()).unwrap().id.clone();

        let state = InteractionState {
            selected_range: SelectionRange::single(one_visual),
            selection_root: Some(one.id()),
            editing: true,
            selection_state: SelectionState::Selected,
            drag_target: None,
        };
        let second = Renderer::new(&options)
            .with_previous(&first)
            .with_state(&state)
            .render(&tree)
            .unwrap();

        let selected = second.bindings.visual_for_node(one.id()).unwrap();
        assert!(selected.classes.selected);
        assert!(!selected.classes.highlighted);
        assert!(selected.contenteditable);
        assert!(!selected.draggable);

        // The gap is outside the selection and keeps its visual.
        let before = first.bindings.visual_for_node(gap.id()).unwrap();
        let after = second.bindings.visual_for_node(gap.id()).unwrap();
        assert!(Rc::ptr_eq(before, after));
        assert!(!Rc::ptr_eq(
            first.bindings.visual_for_node(list.id()).unwrap(),
            second.bindings.visual_for_node(list.id()).unwrap()
        ));
        assert_eq!(
            selected.id,
            first.bindings.visual_for_node(one.id()).unwrap().id
        );
    }

    #[test]
    fn test_unchanged_tree_reuses_top_visual() {
        let options = RenderOptions::default();
        let tree = list();
        let first = render(&tree, &options).unwrap();
        let second = Renderer::new(&options).with_previous(&first).render(&tree).unwrap();

        let list = tree.value_at("value", 0).unwrap();
        assert!(Rc::ptr_eq(
            first.bindings.visual_for_node(list.id()).unwrap(),
            second.bindings.visual_for_node(list.id()).unwrap()
        ));
        assert_eq!(second.bindings.len(), first.bindings.len());
        assert_eq!(second.widths.width_of(list.id()), Some(2));
    }

    #[test]
    fn test_trivia_reference_is_classed() {
        let tags = vec![
            Tag::open_fragment(),
            Tag::reference("#"),
            Tag::open_token("Space"),
            Tag::literal(" \n"),
            Tag::Close,
            Tag::Close,
        ];
        let tree = tree_from_stream(&tags, &[]).unwrap();
        let rendered = render(&tree, &RenderOptions::default()).unwrap();
        let elements = rendered.fragment.elements();
        assert_eq!(elements.len(), 1);
        assert!(elements[0].classes.trivia);
        assert_eq!(
            elements[0].children,
            vec![Visual::Text("\u{a0}".into()), Visual::LineBreak]
        );
    }

    #[test]
    fn test_gap_root() {
        let rendered = render(&Node::gap(), &RenderOptions::default()).unwrap();
        let elements = rendered.fragment.elements();
        assert_eq!(elements.len(), 1);
        assert!(elements[0].classes.gap);
        assert_eq!(elements[0].path, "");
        assert!(rendered.bindings.root().unwrap().is_gap());
    }

    #[test]
    fn test_reference_inside_token_fails_render() {
        let tags = vec![
            Tag::open_fragment(),
            Tag::reference("value"),
            Tag::Open(OpenTag::token("Str")),
            Tag::reference("value"),
            Tag::open_token("Num"),
            Tag::literal("1"),
            Tag::Close,
            Tag::Close,
            Tag::Close,
        ];
        let tree = tree_from_stream(&tags, &[]).unwrap();
        let err = render(&tree, &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, EditorError::Unsupported(_)));
    }
}
