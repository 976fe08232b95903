mod common;

use std::rc::Rc;

use common::{json, node_at, number, open, open_with, value_of};
use cstml_editor_core::{
    EditEngine, Node, RenderOptions, Serializer, SourcePrinter, common_ancestor, render,
    tree_from_stream,
};

const DOCUMENTS: &[&str] = &[
    "1",
    "[1, <//>]",
    "[ ]",
    r#"{ "a": <//>, "b": 5 }"#,
    r#"{}"#,
    r#"  [[1, 2], { "k": [true, null] }, "s \" q", -3.5]  "#,
    "[<//>, <//>,\n  <//>]",
];

#[test]
fn test_serialize_parse_round_trip() {
    let printer = SourcePrinter::new();
    for source in DOCUMENTS {
        let tags = json::parse(source).unwrap();
        let tree = tree_from_stream(&tags, &[]).unwrap();
        assert_eq!(printer.serialize(&tree).unwrap(), *source);

        let streamed: Vec<_> = tree.stream().collect();
        assert_eq!(streamed, tags, "stream of {source:?}");
    }
}

#[test]
fn test_width_is_sum_of_children() {
    for source in DOCUMENTS {
        let tree = tree_from_stream(&json::parse(source).unwrap(), &[]).unwrap();
        let rendered = render(&tree, &RenderOptions::default()).unwrap();

        for element in rendered.fragment.elements() {
            let node = rendered.bindings.node(element.node).unwrap();
            let width = rendered.widths.width_of(node.id()).unwrap();
            assert_eq!(element.width, width);

            if node.is_gap() {
                assert_eq!(width, 1);
            } else if node.is_token() {
                assert_eq!(width, node.own_text().chars().count());
            } else {
                let sum: usize = node
                    .values()
                    .map(|value| rendered.widths.width_of(value.id()).unwrap_or(0))
                    .sum();
                assert_eq!(width, sum, "width of {:?} in {source:?}", node.node_type());
            }
        }
    }
}

#[test]
fn test_edit_rebuilds_only_the_ancestor_chain() {
    let session = open(r#"[[1, 2], <//>, { "k": 3 }]"#);
    let bindings = &session.rendered().bindings;
    let gap = node_at(&session, &[("value", 0), ("elements", 1)]);

    let printer = SourcePrinter::new();
    let outcome = EditEngine::new(bindings, &printer)
        .set(gap.id(), number("9"))
        .unwrap();
    assert_eq!(outcome.source, r#"[[1, 2], 9, { "k": 3 }]"#);

    let old = node_at(&session, &[("value", 0)]);
    let new = outcome.root.value_at("value", 0).unwrap();
    assert!(!Rc::ptr_eq(&old, new));
    assert!(!Rc::ptr_eq(session.tree(), &outcome.root));
    for index in [0, 2] {
        assert!(Rc::ptr_eq(
            old.value_at("elements", index).unwrap(),
            new.value_at("elements", index).unwrap()
        ));
    }
}

#[test]
fn test_move_conserves_nodes() {
    let session = open("[[1, 2], <//>, 3]");
    let bindings = &session.rendered().bindings;
    let inner = node_at(&session, &[("value", 0), ("elements", 0)]);
    let gap = node_at(&session, &[("value", 0), ("elements", 1)]);

    let printer = SourcePrinter::new();
    let outcome = EditEngine::new(bindings, &printer)
        .move_node(inner.id(), gap.id())
        .unwrap();
    assert_eq!(outcome.source, "[<//>, [1, 2], 3]");

    let array = outcome.root.value_at("value", 0).unwrap();
    assert!(array.value_at("elements", 0).unwrap().is_gap());
    assert!(Rc::ptr_eq(array.value_at("elements", 1).unwrap(), &inner));
    // One gap filled, one gap left behind.
    assert_eq!(outcome.root.sigil_count(), session.tree().sigil_count());
    assert_eq!(
        outcome.expressions.len(),
        session.document().expressions.len()
    );
}

#[test]
fn test_move_conserves_expressions() {
    let expression = value_of("[7]");
    // Moving forward and backward past an empty gap, with an expression after both.
    for (source, from, to) in [
        ("[<//>, 1, <//>]", 1, 0),
        ("[1, <//>, <//>]", 0, 1),
    ] {
        let session = open_with(source, vec![Node::gap(), expression.clone()]);
        let bindings = &session.rendered().bindings;
        let moved = node_at(&session, &[("value", 0), ("elements", from)]);
        let gap = node_at(&session, &[("value", 0), ("elements", to)]);

        let printer = SourcePrinter::new();
        let outcome = EditEngine::new(bindings, &printer)
            .move_node(moved.id(), gap.id())
            .unwrap();

        assert_eq!(outcome.root.sigil_count(), session.tree().sigil_count());
        assert_eq!(
            outcome.expressions.len(),
            session.document().expressions.len(),
            "expressions after moving in {source:?}"
        );
        assert!(outcome.expressions[0].is_gap());
        assert!(Rc::ptr_eq(&outcome.expressions[1], &expression));
    }
}

#[test]
fn test_common_ancestor_is_symmetric() {
    let session = open(r#"[[1, 2], { "k": [3, <//>] }, 4]"#);
    let rendered = session.rendered();
    let elements = rendered.fragment.elements();

    for a in &elements {
        for b in &elements {
            let ab = common_ancestor(&rendered.bindings, a.node, b.node).map(|n| n.id());
            let ba = common_ancestor(&rendered.bindings, b.node, a.node).map(|n| n.id());
            assert_eq!(ab, ba);
            assert!(ab.is_some());
        }
        let own = common_ancestor(&rendered.bindings, a.node, a.node).unwrap();
        assert_eq!(own.id(), a.node);
    }
}

#[test]
fn test_unbound_nodes_have_no_common_ancestor() {
    let session = open("[1]");
    let one = node_at(&session, &[("value", 0), ("elements", 0)]);
    let stranger = Node::gap();
    assert!(common_ancestor(&session.rendered().bindings, one.id(), stranger.id()).is_none());
}
