//! Cursor and message bus: the live ancestor path during one traversal.
//!
//! A [`Cursor`] is rebuilt on each descent as a stack of frames, one per
//! ancestor of the node currently being visited. Each frame carries a scoped
//! message map, letting a rule discover a fact deep in a subtree and have an
//! ancestor's post-order step consult it later in the same pass, with no
//! global state.
//!
//! Messages live exactly as long as their owning frame: when a subtree's
//! traversal completes its frame is discarded along with its messages, unless
//! the frame was explicitly retained with [`Cursor::drop_parent_until`], in
//! which case leftover messages are lifted into the enclosing frame and
//! survive for the remainder of that scope.
//!
//! One cursor belongs to exactly one single-threaded traversal of one tree.
//! Independent trees use independent cursors and may run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::tree::Node;

/// Structural invariant violations inside the cursor core.
///
/// Unlike rule- or edit-scoped failures, these are fatal to the whole run.
#[derive(Debug, Error)]
pub enum CursorError {
    /// Frame stack underflow: a subtree exit without a matching entry.
    #[error("corrupt cursor frame stack: exited more frames than were entered")]
    FrameUnderflow,

    /// An operation that requires an active frame ran outside a traversal.
    #[error("no active cursor frame")]
    NoActiveFrame,
}

#[derive(Debug)]
struct Frame {
    node: Arc<Node>,
    messages: HashMap<String, Value>,
    retained: bool,
}

/// Ordered stack of `(node, message map)` frames from root to current node.
#[derive(Debug, Default)]
pub struct Cursor {
    frames: Vec<Frame>,
}

impl Cursor {
    pub fn new() -> Self {
        Cursor::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Enter a node: push a frame for it.
    pub fn enter(&mut self, node: Arc<Node>) {
        self.frames.push(Frame {
            node,
            messages: HashMap::new(),
            retained: false,
        });
    }

    /// Exit the current node's subtree, discarding its frame.
    ///
    /// A retained frame lifts its remaining messages into the enclosing
    /// frame instead of discarding them.
    pub fn exit(&mut self) -> Result<(), CursorError> {
        let frame = self.frames.pop().ok_or(CursorError::FrameUnderflow)?;
        if frame.retained && !frame.messages.is_empty() {
            if let Some(parent) = self.frames.last_mut() {
                parent.messages.extend(frame.messages);
            }
        }
        Ok(())
    }

    /// The node currently being visited.
    pub fn current(&self) -> Option<&Arc<Node>> {
        self.frames.last().map(|f| &f.node)
    }

    /// Ancestors of the current node, nearest first (including the current
    /// node itself).
    pub fn ancestors(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.frames.iter().rev().map(|f| &f.node)
    }

    /// Nearest enclosing node (including the current one) satisfying the
    /// predicate.
    pub fn first_enclosing(&self, pred: impl Fn(&Node) -> bool) -> Option<Arc<Node>> {
        self.ancestors().find(|n| pred(n)).cloned()
    }

    /// Retain the nearest proper ancestor frame satisfying the predicate for
    /// the remainder of its enclosing scope.
    ///
    /// Returns `false` when no ancestor satisfies the predicate.
    pub fn drop_parent_until(&mut self, pred: impl Fn(&Node) -> bool) -> bool {
        let len = self.frames.len();
        if len < 2 {
            return false;
        }
        for frame in self.frames[..len - 1].iter_mut().rev() {
            if pred(&frame.node) {
                frame.retained = true;
                return true;
            }
        }
        false
    }

    /// Store a message into the nearest ancestor frame (including the
    /// current one) whose node satisfies `until`. Falls back to the root
    /// frame when no ancestor satisfies the predicate.
    pub fn put_message(
        &mut self,
        key: impl Into<String>,
        value: Value,
        until: impl Fn(&Node) -> bool,
    ) -> Result<(), CursorError> {
        if self.frames.is_empty() {
            return Err(CursorError::NoActiveFrame);
        }
        let idx = self
            .frames
            .iter()
            .rposition(|f| until(&f.node))
            .unwrap_or(0);
        self.frames[idx].messages.insert(key.into(), value);
        Ok(())
    }

    /// Read and clear the nearest message with the given key, searching from
    /// the current frame toward the root.
    pub fn poll_message(&mut self, key: &str) -> Option<Value> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(value) = frame.messages.remove(key) {
                return Some(value);
            }
        }
        None
    }

    /// Read the nearest message with the given key without clearing it.
    pub fn peek_message(&self, key: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| f.messages.get(key))
    }
}
