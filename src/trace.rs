//! Execution trace tree model
//!
//! A session's execution trace is a rooted tree: the root represents the
//! whole session, intermediate nodes represent structural groupings
//! (sections), and leaves represent individual steps with observable
//! metadata (status, duration, input/output).
//!
//! The tree is mutated only through [`TraceTree::load`] (wholesale replace
//! after a fresh fetch) and [`TraceTree::merge_fragment`] (append-only,
//! idempotent insertion of incremental updates). The transport may redeliver
//! the same fragment, so merging twice with identical input must apply once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use uuid::Uuid;

/// Depth bound for the opening-message fallback search.
///
/// Covers the observed root -> agent -> section -> step nesting with one
/// level of slack.
pub const FALLBACK_SEARCH_DEPTH: usize = 4;

/// A single node in the execution trace tree
///
/// Invariant: node `id` is unique within the tree; a node with no children
/// is a leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceNode {
    /// Unique identifier within the tree
    pub id: String,
    /// Human-readable label for the node
    #[serde(default)]
    pub name: String,
    /// Node kind: agent, section, step, action, ...
    #[serde(rename = "type", default)]
    pub node_type: String,
    /// Observable per-node data (status, duration, input, output)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, Value>>,
    /// Ordered child nodes; empty for leaves
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TraceNode>,
}

impl TraceNode {
    /// Creates a new leaf node
    ///
    /// # Examples
    ///
    /// ```
    /// use playpen::trace::TraceNode;
    ///
    /// let node = TraceNode::new("step-1", "Greet the user", "step");
    /// assert!(node.children.is_empty());
    /// ```
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: node_type.into(),
            metadata: None,
            children: Vec::new(),
        }
    }

    /// Attaches a metadata entry, returning self for builder-style use
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.into(), value);
        self
    }

    /// Attaches children, returning self for builder-style use
    pub fn with_children(mut self, children: Vec<TraceNode>) -> Self {
        self.children = children;
        self
    }

    /// Looks up a metadata value as a string
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// The node's `metadata.output`, if present
    ///
    /// Used by the chat reconciler's fallback search for an opening message.
    pub fn output(&self) -> Option<&str> {
        self.metadata_str("output")
    }

    /// Builds a node from a loosely-shaped backend value
    ///
    /// Backend trace items are tolerated with missing fields: an absent `id`
    /// gets a locally generated one, `content` stands in for a missing
    /// `name`, and an absent `type` defaults to `"step"`. Non-object values
    /// yield `None` and are skipped by the caller.
    pub fn from_value(value: &Value) -> Option<TraceNode> {
        let obj = value.as_object()?;
        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let name = obj
            .get("name")
            .or_else(|| obj.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let node_type = obj
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("step")
            .to_string();
        let metadata = obj.get("metadata").and_then(Value::as_object).cloned();
        let children = obj
            .get("children")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(TraceNode::from_value).collect())
            .unwrap_or_default();

        Some(TraceNode {
            id,
            name,
            node_type,
            metadata,
            children,
        })
    }
}

/// Selects the node under which a fragment is inserted
///
/// The default anchor is the first child of the root, i.e. the first
/// section of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AnchorPath {
    /// First child of the root
    #[default]
    FirstSection,
    /// Walk from the root through children matching each id in order
    Ids(Vec<String>),
}

/// Result of a merge attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The fragment was appended to the anchor's children
    Inserted,
    /// A child with the same id already exists; nothing changed
    Duplicate,
    /// The anchor path did not resolve; the fragment was dropped
    NoAnchor,
}

impl MergeOutcome {
    /// True when the merge changed the tree
    pub fn inserted(self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// The trace tree for one session
///
/// Owned by whichever component binds it to a session id; emptied whenever
/// that session is stopped or replaced.
#[derive(Debug, Clone, Default)]
pub struct TraceTree {
    root: Option<TraceNode>,
}

impl TraceTree {
    /// Creates an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the tree wholesale
    ///
    /// Used after a fresh fetch of the full trace; always succeeds.
    pub fn load(&mut self, root: TraceNode) {
        self.root = Some(root);
    }

    /// Drops all trace data
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// The current root, if any trace has been loaded
    pub fn root(&self) -> Option<&TraceNode> {
        self.root.as_ref()
    }

    /// True when no trace has been loaded (or it was cleared)
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Inserts `fragment` as a new child under the anchor node
    ///
    /// The call is idempotent: if a child with the fragment's id already
    /// exists at the anchor, nothing changes and [`MergeOutcome::Duplicate`]
    /// is returned. Fragments are appended at the end of the child sequence;
    /// no reordering is performed.
    ///
    /// An unresolvable anchor (for example, the root has no children yet) is
    /// not an error: out-of-order updates may arrive before the structural
    /// skeleton exists, so the merge is dropped and reported as
    /// [`MergeOutcome::NoAnchor`].
    ///
    /// # Examples
    ///
    /// ```
    /// use playpen::trace::{AnchorPath, MergeOutcome, TraceNode, TraceTree};
    ///
    /// let mut tree = TraceTree::new();
    /// tree.load(TraceNode::new("root", "Session", "agent").with_children(vec![
    ///     TraceNode::new("sec-1", "Main", "section"),
    /// ]));
    ///
    /// let fragment = TraceNode::new("step-1", "Greet", "step");
    /// assert_eq!(
    ///     tree.merge_fragment(&AnchorPath::FirstSection, fragment.clone()),
    ///     MergeOutcome::Inserted
    /// );
    /// assert_eq!(
    ///     tree.merge_fragment(&AnchorPath::FirstSection, fragment),
    ///     MergeOutcome::Duplicate
    /// );
    /// ```
    pub fn merge_fragment(&mut self, anchor: &AnchorPath, fragment: TraceNode) -> MergeOutcome {
        let Some(target) = self.resolve_anchor_mut(anchor) else {
            tracing::debug!(
                fragment_id = %fragment.id,
                "trace anchor not resolvable yet, dropping fragment"
            );
            return MergeOutcome::NoAnchor;
        };

        if target.children.iter().any(|child| child.id == fragment.id) {
            tracing::debug!(fragment_id = %fragment.id, "duplicate trace fragment ignored");
            return MergeOutcome::Duplicate;
        }

        target.children.push(fragment);
        MergeOutcome::Inserted
    }

    fn resolve_anchor_mut(&mut self, anchor: &AnchorPath) -> Option<&mut TraceNode> {
        let root = self.root.as_mut()?;
        match anchor {
            AnchorPath::FirstSection => root.children.first_mut(),
            AnchorPath::Ids(ids) => {
                let mut current = root;
                for id in ids {
                    current = current.children.iter_mut().find(|child| &child.id == id)?;
                }
                Some(current)
            }
        }
    }

    /// Finds the first node matching `predicate`, breadth-first, visiting
    /// nodes at most `max_depth` levels below the root
    ///
    /// Depth 0 is the root itself. Returns `None` on an empty tree or when
    /// no node within the bound matches.
    pub fn find_first<P>(&self, max_depth: usize, predicate: P) -> Option<&TraceNode>
    where
        P: Fn(&TraceNode) -> bool,
    {
        let root = self.root.as_ref()?;
        let mut queue = VecDeque::new();
        queue.push_back((root, 0usize));

        while let Some((node, depth)) = queue.pop_front() {
            if predicate(node) {
                return Some(node);
            }
            if depth < max_depth {
                for child in &node.children {
                    queue.push_back((child, depth + 1));
                }
            }
        }
        None
    }

    /// The first `metadata.output` observable in the tree, if any
    ///
    /// This is the source for the chat reconciler's synthetic opening
    /// message when the backend has no history for a resumed session.
    pub fn first_output(&self) -> Option<&str> {
        self.find_first(FALLBACK_SEARCH_DEPTH, |node| node.output().is_some())
            .and_then(TraceNode::output)
    }
}

/// Normalizes a backend trace payload into a list of nodes
///
/// The backend has been observed delivering traces in three shapes: a bare
/// array, `{"root": [...]}`, and `{"root": {"traces": [...]}}`. All three
/// normalize to the same node list; anything else yields an empty list.
pub fn extract_trace_nodes(value: &Value) -> Vec<TraceNode> {
    let items = if let Some(array) = value.as_array() {
        array
    } else if let Some(array) = value.get("root").and_then(Value::as_array) {
        array
    } else if let Some(array) = value
        .get("root")
        .and_then(|root| root.get("traces"))
        .and_then(Value::as_array)
    {
        array
    } else {
        return Vec::new();
    };

    items.iter().filter_map(TraceNode::from_value).collect()
}

/// Wraps extracted nodes under a synthetic session root
///
/// The backend delivers a forest; the model wants a rooted tree whose root
/// represents the whole session.
pub fn session_root(session_id: &str, nodes: Vec<TraceNode>) -> TraceNode {
    TraceNode::new(format!("session-{session_id}"), session_id, "agent").with_children(nodes)
}
