#![allow(dead_code)]

pub mod json;

use std::rc::Rc;

use cstml_editor_core::{Document, EditorSession, Node, OpenTag, SmolStr};

pub use json::JsonParser;

pub type Session = EditorSession<JsonParser>;

pub fn open(source: &str) -> Session {
    EditorSession::open(JsonParser, Document::new(source)).unwrap()
}

pub fn open_with(source: &str, expressions: Vec<Rc<Node>>) -> Session {
    EditorSession::open(JsonParser, Document::new(source).with_expressions(expressions)).unwrap()
}

pub fn number(text: &str) -> Rc<Node> {
    Node::token(OpenTag::token("Number"), text)
}

/// Follow `(reference, index)` steps down from the root.
pub fn node_at(session: &Session, steps: &[(&str, usize)]) -> Rc<Node> {
    let mut node = session.tree().clone();
    for (name, index) in steps {
        node = node
            .value_at(name, *index)
            .unwrap_or_else(|| panic!("no {name}[{index}] under {}", node.id()))
            .clone();
    }
    node
}

pub fn visual_at(session: &Session, steps: &[(&str, usize)]) -> SmolStr {
    let node = node_at(session, steps);
    session
        .visual_id(node.id())
        .unwrap_or_else(|| panic!("{} is not rendered", node.id()))
        .clone()
}

/// Parse a standalone value to use as an out-of-band expression.
pub fn value_of(source: &str) -> Rc<Node> {
    let tags = json::parse(source).unwrap();
    let root = cstml_editor_core::tree_from_stream(&tags, &[]).unwrap();
    root.value_at("value", 0).unwrap().clone()
}
