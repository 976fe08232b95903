//! Editor session over a source document.
//!
//! The session owns the parser and serializer collaborators, the current
//! document, its tree and the latest render. Every structural edit follows the
//! same pipeline: rebuild and serialize, parse the new source, build the tree
//! with the new expression list, render. State is only replaced once every
//! step has succeeded.

use std::rc::Rc;

use smol_str::SmolStr;

use crate::edit::{EditEngine, EditOutcome, Replacement};
use crate::error::{EditorError, ParseError, Result};
use crate::node::{Node, NodeId};
use crate::options::RenderOptions;
use crate::render::{InteractionState, Rendered, Renderer, SelectionState};
use crate::selection::SelectionRange;
use crate::serialize::{Serializer, SourcePrinter};
use crate::stream::tree_from_stream;
use crate::tag::Tag;

/// Produces a tag stream from source text.
pub trait Parser {
    fn parse(&self, source: &str) -> Result<Vec<Tag>, ParseError>;
}

impl<F> Parser for F
where
    F: Fn(&str) -> Result<Vec<Tag>, ParseError>,
{
    fn parse(&self, source: &str) -> Result<Vec<Tag>, ParseError> {
        self(source)
    }
}

/// Source text plus the out-of-band values filling its gaps, in order.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub source: String,
    pub expressions: Vec<Rc<Node>>,
}

impl Document {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            expressions: Vec::new(),
        }
    }

    pub fn with_expressions(mut self, expressions: Vec<Rc<Node>>) -> Self {
        self.expressions = expressions;
        self
    }
}

impl From<EditOutcome> for Document {
    fn from(outcome: EditOutcome) -> Self {
        Self {
            source: outcome.source,
            expressions: outcome.expressions,
        }
    }
}

pub struct EditorSession<P, S = SourcePrinter> {
    parser: P,
    serializer: S,
    options: RenderOptions,
    document: Document,
    tree: Rc<Node>,
    rendered: Rendered,
    state: InteractionState,
}

impl<P: Parser> EditorSession<P> {
    /// Open a document with the default serializer and options.
    pub fn open(parser: P, document: Document) -> Result<Self> {
        Self::with_serializer(parser, SourcePrinter::default(), RenderOptions::default(), document)
    }
}

impl<P: Parser, S: Serializer> EditorSession<P, S> {
    pub fn with_serializer(
        parser: P,
        serializer: S,
        options: RenderOptions,
        document: Document,
    ) -> Result<Self> {
        let tree = build(&parser, &document)?;
        let state = InteractionState::default();
        let rendered = Renderer::new(&options).with_state(&state).render(&tree)?;
        tracing::debug!(
            target: "cstml::edit",
            len = document.source.len(),
            expressions = document.expressions.len(),
            "document opened"
        );
        Ok(Self {
            parser,
            serializer,
            options,
            document,
            tree,
            rendered,
            state,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn source(&self) -> &str {
        &self.document.source
    }

    pub fn tree(&self) -> &Rc<Node> {
        &self.tree
    }

    pub fn rendered(&self) -> &Rendered {
        &self.rendered
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn to_html(&self) -> String {
        self.rendered.to_html()
    }

    pub fn node_for_visual(&self, visual: &str) -> Option<&Rc<Node>> {
        self.rendered.bindings.node_for_visual(visual)
    }

    /// Visual id currently bound to `node`.
    pub fn visual_id(&self, node: NodeId) -> Option<&SmolStr> {
        self.rendered
            .bindings
            .visual_for_node(node)
            .map(|visual| &visual.id)
    }

    /// Node the current selection resolved to.
    pub fn selection_root(&self) -> Option<&Rc<Node>> {
        self.state
            .selection_root
            .and_then(|id| self.rendered.bindings.node(id))
    }

    /// Select a range of visuals and re-render.
    ///
    /// Returns the resolved selection root; an unresolvable range clears it.
    pub fn select(&mut self, range: SelectionRange) -> Result<Option<Rc<Node>>> {
        let root = range.resolve(&self.rendered.bindings);
        let mut state = self.state.clone();
        state.selection_root = root.as_ref().map(|node| node.id());
        state.selection_state = if root.is_some() {
            SelectionState::Selected
        } else {
            SelectionState::None
        };
        state.selected_range = range;
        self.update_state(state)?;
        Ok(root)
    }

    pub fn set_editing(&mut self, editing: bool) -> Result<()> {
        let mut state = self.state.clone();
        state.editing = editing;
        self.update_state(state)
    }

    pub fn set_selection_state(&mut self, selection_state: SelectionState) -> Result<()> {
        let mut state = self.state.clone();
        state.selection_state = selection_state;
        self.update_state(state)
    }

    pub fn set_drag_target(&mut self, target: Option<SmolStr>) -> Result<()> {
        let mut state = self.state.clone();
        state.drag_target = target;
        self.update_state(state)
    }

    fn update_state(&mut self, state: InteractionState) -> Result<()> {
        let rendered = Renderer::new(&self.options)
            .with_previous(&self.rendered)
            .with_state(&state)
            .render(&self.tree)?;
        self.rendered = rendered;
        self.state = state;
        Ok(())
    }

    /// Replace the node bound to `target` with `value`.
    pub fn set(&mut self, target: &str, value: Rc<Node>) -> Result<()> {
        let target = self.bound(target)?;
        self.apply(target, Replacement::Fresh(value))
    }

    /// Move the node bound to `source` into the slot of the node bound to
    /// `dest`, leaving a gap behind.
    pub fn move_node(&mut self, source: &str, dest: &str) -> Result<()> {
        let source = self.bound(source)?;
        let dest = self.bound(dest)?;
        self.apply(dest, Replacement::Relocated(source))
    }

    /// Replace the text of the single selected token.
    pub fn commit_text(&mut self, text: &str) -> Result<()> {
        let range = &self.state.selected_range;
        let (Some(start), Some(end)) = (&range.start, &range.end) else {
            return Err(EditorError::invariant("text commit without a selection"));
        };
        if start != end {
            return Err(EditorError::invariant(
                "text commit needs exactly one selected node",
            ));
        }
        let token = self.bound(start)?;
        let node = self
            .rendered
            .bindings
            .node(token)
            .ok_or_else(|| EditorError::invariant(format!("{token} is not bound")))?;
        if !node.is_token() {
            return Err(EditorError::invariant(format!(
                "text commit target {token} is not a token"
            )));
        }
        let value = node
            .with_text(text)
            .ok_or_else(|| EditorError::invariant(format!("{token} has no open tag")))?;
        self.apply(token, Replacement::Fresh(value))
    }

    fn bound(&self, visual: &str) -> Result<NodeId> {
        self.rendered
            .bindings
            .node_for_visual(visual)
            .map(|node| node.id())
            .ok_or_else(|| EditorError::invariant(format!("no node is bound to visual {visual}")))
    }

    fn apply(&mut self, target: NodeId, replacement: Replacement) -> Result<()> {
        let outcome =
            EditEngine::new(&self.rendered.bindings, &self.serializer).apply(target, replacement)?;
        let document = Document::from(outcome);
        let tree = build(&self.parser, &document)?;

        // Visual ids in the old selection do not survive the edit.
        let state = InteractionState::default();
        let rendered = Renderer::new(&self.options)
            .with_previous(&self.rendered)
            .with_state(&state)
            .render(&tree)?;

        tracing::debug!(
            target: "cstml::edit",
            len = document.source.len(),
            expressions = document.expressions.len(),
            "edit applied"
        );
        self.document = document;
        self.tree = tree;
        self.rendered = rendered;
        self.state = state;
        Ok(())
    }
}

fn build(parser: &impl Parser, document: &Document) -> Result<Rc<Node>> {
    let tags = parser.parse(&document.source)?;
    tree_from_stream(&tags, &document.expressions)
}
