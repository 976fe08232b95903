//! Per-node width and flag index.
//!
//! Width is the number of source characters a node contributes, with a gap
//! counting as one. It is additive: a non-token node's width is the sum of its
//! resolved child values, so literals owned by a container do not count.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{EditorError, Result};
use crate::node::{Node, NodeId};
use crate::tag::{NodeFlags, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub width: usize,
    pub flags: NodeFlags,
}

#[derive(Debug, Clone, Default)]
pub struct WidthIndex {
    entries: HashMap<NodeId, Metrics>,
}

impl WidthIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<Metrics> {
        self.entries.get(&id).copied()
    }

    pub fn width_of(&self, id: NodeId) -> Option<usize> {
        self.get(id).map(|metrics| metrics.width)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy an entry computed by an earlier pass.
    pub(crate) fn adopt(&mut self, previous: &WidthIndex, id: NodeId) {
        if let Some(metrics) = previous.get(id) {
            self.entries.insert(id, metrics);
        }
    }

    /// Width of `node`, computing and recording any missing entries of its
    /// subtree bottom-up.
    pub fn width(&mut self, node: &Rc<Node>) -> Result<usize> {
        if let Some(width) = self.width_of(node.id()) {
            return Ok(width);
        }

        let mut stack: Vec<(Rc<Node>, bool)> = vec![(node.clone(), false)];
        while let Some((current, expanded)) = stack.pop() {
            if self.entries.contains_key(&current.id()) {
                continue;
            }
            let width = if current.is_gap() {
                1
            } else if current.is_null() {
                0
            } else if current.is_token() {
                token_width(&current)?
            } else if !expanded {
                stack.push((current.clone(), true));
                for value in current.values() {
                    if !self.entries.contains_key(&value.id()) {
                        stack.push((value.clone(), false));
                    }
                }
                continue;
            } else {
                current
                    .values()
                    .map(|value| self.width_of(value.id()).unwrap_or(0))
                    .sum()
            };
            self.entries.insert(
                current.id(),
                Metrics {
                    width,
                    flags: current.flags(),
                },
            );
        }

        Ok(self.width_of(node.id()).unwrap_or(0))
    }
}

fn token_width(node: &Node) -> Result<usize> {
    let mut width = 0;
    for tag in node.children() {
        match tag {
            Tag::Literal(value) => width += value.chars().count(),
            Tag::Reference(_) | Tag::Shift | Tag::Embedded(_) => {
                return Err(EditorError::unsupported(format!(
                    "token node {} contains a reference",
                    node.id()
                )));
            }
            _ => {}
        }
    }
    Ok(width)
}
