//! KLV record tree
//!
//! Records are stored in an arena and addressed by [`NodeId`] handles. Each
//! node knows its parent, its first and last child, and its two siblings, so
//! a child chain is a doubly linked list threaded through the arena. All
//! links are plain indices into the same `Vec`, which rules out dangling
//! references, and the only way to add nodes ([`KlvTree::append_child`] and
//! [`KlvTree::graft`]) appends them at the end of a chain, which rules out
//! cycles.
//!
//! # Serialization
//!
//! [`KlvTree::to_bytes`] flattens the children of a node into its value when
//! the node has children. The stored value of a parent is therefore only
//! informational once children have been appended by hand.

use crate::record::KlvRecord;
use bytes::{BufMut, Bytes, BytesMut};
use klv_ber::BerLength;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::ops::Index;

/// Handle to a record inside a [`KlvTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena
    pub fn index(self) -> usize {
        self.0
    }

    fn offset(self, by: usize) -> Self {
        NodeId(self.0 + by)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    record: KlvRecord,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    previous_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    fn new(record: KlvRecord, parent: Option<NodeId>) -> Self {
        Self {
            record,
            parent,
            first_child: None,
            last_child: None,
            previous_sibling: None,
            next_sibling: None,
        }
    }

    fn offset(mut self, by: usize) -> Self {
        let shift = |id: Option<NodeId>| id.map(|id| id.offset(by));
        self.parent = shift(self.parent);
        self.first_child = shift(self.first_child);
        self.last_child = shift(self.last_child);
        self.previous_sibling = shift(self.previous_sibling);
        self.next_sibling = shift(self.next_sibling);
        self
    }
}

/// A root KLV record together with all of its embedded records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlvTree {
    nodes: Vec<Node>,
}

impl KlvTree {
    /// Create a tree holding a single leaf record
    pub fn new(root: KlvRecord) -> Self {
        Self {
            nodes: vec![Node::new(root, None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_record(&self) -> &KlvRecord {
        &self.nodes[0].record
    }

    /// Record stored at `id`, if the handle belongs to this tree
    pub fn get(&self, id: NodeId) -> Option<&KlvRecord> {
        self.nodes.get(id.0).map(|node| &node.record)
    }

    /// Number of records in the tree, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.parent)
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.first_child)
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.last_child)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.previous_sibling)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|node| node.next_sibling)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.first_child(id).is_none()
    }

    /// Number of parents between `id` and the root
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(parent) = current {
            depth += 1;
            current = self.parent(parent);
        }
        depth
    }

    /// Direct children of `id`, in stream order
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(id),
        }
    }

    /// `id` and everything below it, depth first, in stream order
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let stack = if id.0 < self.nodes.len() { vec![id] } else { Vec::new() };
        Descendants { tree: self, stack }
    }

    /// Append `record` as the last child of `parent`
    ///
    /// # Panics
    /// Panics if `parent` does not belong to this tree.
    pub fn append_child(&mut self, parent: NodeId, record: KlvRecord) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(record, Some(parent)));
        self.link_last_child(parent, id);
        id
    }

    /// Move `subtree` under `parent` as its last child
    ///
    /// # Returns
    /// The handle of the former subtree root inside this tree.
    ///
    /// # Panics
    /// Panics if `parent` does not belong to this tree.
    pub fn graft(&mut self, parent: NodeId, subtree: KlvTree) -> NodeId {
        let offset = self.nodes.len();
        let id = NodeId(offset);
        self.nodes
            .extend(subtree.nodes.into_iter().map(|node| node.offset(offset)));
        self.nodes[offset].parent = Some(parent);
        self.link_last_child(parent, id);
        id
    }

    fn link_last_child(&mut self, parent: NodeId, id: NodeId) {
        match self.nodes[parent.0].last_child {
            Some(last) => {
                self.nodes[last.0].next_sibling = Some(id);
                self.nodes[id.0].previous_sibling = Some(last);
            }
            None => self.nodes[parent.0].first_child = Some(id),
        }
        self.nodes[parent.0].last_child = Some(id);
    }

    /// Take the root record, dropping any embedded records
    pub fn into_root_record(mut self) -> KlvRecord {
        self.nodes.swap_remove(0).record
    }

    /// Serialize the record at `id` and everything below it
    pub fn to_bytes(&self, id: NodeId) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(id, &mut buf);
        buf.freeze()
    }

    /// Append the serialized record at `id` to `buf`
    ///
    /// A leaf is written as stored, with the same empty guard as
    /// [`KlvRecord::encode_into`]. A node with children is written with its
    /// key, then the length and concatenation of its serialized children.
    /// Children are always written in full, zero-length values included.
    pub fn encode_into(&self, id: NodeId, buf: &mut BytesMut) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        if node.first_child.is_none() || node.record.key().is_empty() {
            node.record.encode_into(buf);
            return;
        }
        self.put_flattened(id, buf);
    }

    fn put_node(&self, id: NodeId, buf: &mut BytesMut) {
        let node = &self.nodes[id.0];
        if node.first_child.is_none() {
            node.record.put_fields(buf);
        } else {
            self.put_flattened(id, buf);
        }
    }

    fn put_flattened(&self, id: NodeId, buf: &mut BytesMut) {
        let mut value = BytesMut::new();
        for child in self.children(id) {
            self.put_node(child, &mut value);
        }

        let key = self.nodes[id.0].record.key();
        let length = BerLength::new(value.len() as u64);
        buf.reserve(key.len() + length.encoded_len() + value.len());
        buf.put_slice(key);
        buf.put_slice(&length.encode());
        buf.put_slice(&value);
    }
}

impl Index<NodeId> for KlvTree {
    type Output = KlvRecord;

    fn index(&self, id: NodeId) -> &KlvRecord {
        &self.nodes[id.0].record
    }
}

impl From<KlvRecord> for KlvTree {
    fn from(record: KlvRecord) -> Self {
        Self::new(record)
    }
}

/// Iterator over the direct children of a node
pub struct Children<'a> {
    tree: &'a KlvTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.tree.next_sibling(current);
        Some(current)
    }
}

/// Depth-first iterator over a node and its descendants
pub struct Descendants<'a> {
    tree: &'a KlvTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        let mut child = self.tree.last_child(current);
        while let Some(id) = child {
            self.stack.push(id);
            child = self.tree.previous_sibling(id);
        }
        Some(current)
    }
}

struct NodeView<'a> {
    tree: &'a KlvTree,
    id: NodeId,
}

struct ChildrenView<'a> {
    tree: &'a KlvTree,
    id: NodeId,
}

impl Serialize for NodeView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("KlvNode", 2)?;
        state.serialize_field("record", &self.tree[self.id])?;
        state.serialize_field(
            "children",
            &ChildrenView {
                tree: self.tree,
                id: self.id,
            },
        )?;
        state.end()
    }
}

impl Serialize for ChildrenView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.tree.children(self.id).map(|id| NodeView {
            tree: self.tree,
            id,
        }))
    }
}

/// Serialized as nested `{ "record": .., "children": [..] }` objects
impl Serialize for KlvTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        NodeView {
            tree: self,
            id: self.root(),
        }
        .serialize(serializer)
    }
}
