//! cstml-editor-core: structural editing over concrete syntax tag streams.
//!
//! This crate provides:
//! - `Tag` / `Node` - the flat tag grammar and the immutable trees built from it
//! - `Renderer` - tree → visual fragment with node ↔ visual bindings and widths
//! - `EditEngine` - Set and Move, rebuilding only the affected ancestor chains
//! - `common_ancestor` / `SelectionRange` - selection resolution
//! - `EditorSession` - parse → render → edit → serialize → reparse loop over
//!   pluggable `Parser` and `Serializer` collaborators

pub mod bindings;
pub mod document;
pub mod edit;
pub mod error;
pub mod node;
pub mod options;
pub mod render;
pub mod selection;
pub mod serialize;
pub mod stream;
pub mod tag;
pub mod visual;
pub mod width;
pub mod writer;

pub use bindings::{Binding, BindingTable};
pub use document::{Document, EditorSession, Parser};
pub use edit::{EditEngine, EditOutcome, Replacement};
pub use error::{EditorError, ParseError, Result, SerializeError};
pub use node::{Node, NodeBuilder, NodeId, Property};
pub use options::RenderOptions;
pub use render::{InteractionState, Rendered, Renderer, SelectionState, render};
pub use selection::{SelectionRange, common_ancestor};
pub use serialize::{GAP_SIGIL, Serializer, SourcePrinter};
pub use smol_str::SmolStr;
pub use stream::{Path, WalkEvent, Walker, tree_from_stream};
pub use tag::{NodeFlags, OpenTag, ReferenceFlags, ReferenceTag, Tag};
pub use visual::{Fragment, Visual, VisualClasses, VisualElement};
pub use width::{Metrics, WidthIndex};
pub use writer::HtmlWriter;
