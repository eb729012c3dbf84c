use indexmap::IndexMap;

use crate::compose;
use crate::error::ComposerError;
use crate::parser::Parser;
use crate::value::{Value, ValueData, ValueStore};
use crate::{
    MappingStyle, Mark, ScalarStyle, SequenceStyle, TagDirective, VersionDirective,
    DEFAULT_MAPPING_TAG, DEFAULT_SCALAR_TAG, DEFAULT_SEQUENCE_TAG,
};

/// Node ids are 1-based indices into the document's node table; 0 is "no
/// node".
pub type NodeId = i32;

/// Highest user-marker bit; the marker set is 24 bits wide.
pub const MAX_MARKER: u32 = 23;

/// The document structure: a table of nodes owned by the document, a root
/// (the first node), the document state (version and tag directives) and the
/// anchor index.
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct Document {
    /// The document nodes.
    pub nodes: Vec<Node>,
    /// The version directive.
    pub version_directive: Option<VersionDirective>,
    /// The list of tag directives.
    pub tag_directives: Vec<TagDirective>,
    /// Is the document start indicator implicit?
    pub start_implicit: bool,
    /// Is the document end indicator implicit?
    pub end_implicit: bool,
    /// The beginning of the document.
    pub start_mark: Mark,
    /// The end of the document.
    pub end_mark: Mark,
    /// Anchor name → defining node. Redefinition rebinds for later lookups.
    pub(crate) anchors: IndexMap<String, NodeId>,
}

/// The node structure.
#[derive(Clone, Default, Debug)]
#[non_exhaustive]
pub struct Node {
    /// The node content.
    pub data: NodeData,
    /// The node tag.
    pub tag: Option<String>,
    /// The anchor decorating this node, if any.
    pub anchor: Option<String>,
    /// A comment attached to this node, if captured.
    pub comment: Option<String>,
    /// The beginning of the node.
    pub start_mark: Mark,
    /// The end of the node.
    pub end_mark: Mark,
    /// 24-bit user marker set for traversal state; never interpreted by the
    /// library.
    pub markers: u32,
}

/// Node content.
#[derive(Clone, Default, Debug)]
pub enum NodeData {
    /// An empty slot left behind by `detach`.
    #[default]
    NoNode,
    /// A scalar node.
    Scalar {
        /// The scalar value.
        value: String,
        /// The scalar style.
        style: ScalarStyle,
    },
    /// A sequence node.
    Sequence {
        /// The ordered sequence items.
        items: Vec<NodeId>,
        /// The sequence style.
        style: SequenceStyle,
    },
    /// A mapping node. Insertion order of pairs is preserved and observable.
    Mapping {
        /// The ordered mapping pairs (key, value).
        pairs: Vec<NodePair>,
        /// The mapping style.
        style: MappingStyle,
    },
}

/// An element of a mapping node.
#[derive(Copy, Clone, Default, Debug)]
#[non_exhaustive]
pub struct NodePair {
    /// The key of the element.
    pub key: NodeId,
    /// The value of the element.
    pub value: NodeId,
}

impl Document {
    /// Create an empty document.
    pub fn new(
        version_directive: Option<VersionDirective>,
        tag_directives: &[TagDirective],
        start_implicit: bool,
        end_implicit: bool,
    ) -> Document {
        Document {
            nodes: Vec::with_capacity(16),
            version_directive,
            tag_directives: tag_directives.to_vec(),
            start_implicit,
            end_implicit,
            start_mark: Mark::default(),
            end_mark: Mark::default(),
            anchors: IndexMap::new(),
        }
    }

    /// Parse the input stream and compose the next document.
    ///
    /// Call repeatedly to compose a sequence of documents from one stream. A
    /// document without a root node signifies the end of the stream.
    pub fn load(parser: &mut Parser<'_>) -> Result<Document, ComposerError> {
        compose::load_document(parser)
    }

    /// Get a node by id, or `None` if `id` is out of range.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize - 1)
    }

    /// Get a node by id, or `None` if `id` is out of range.
    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id as usize - 1)
    }

    /// The root node is the first node added to the document. An empty
    /// document produced by the parser signifies the end of a stream.
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// The id of the root node, if the document is not empty.
    pub fn root_id(&self) -> Option<NodeId> {
        if self.nodes.is_empty() {
            None
        } else {
            Some(1)
        }
    }

    /// Look up the node currently bound to `anchor`.
    pub fn anchor(&self, name: &str) -> Option<NodeId> {
        self.anchors.get(name).copied()
    }

    /// Bind `anchor` to `node`, replacing any earlier binding for subsequent
    /// lookups.
    pub fn set_anchor(&mut self, name: &str, node: NodeId) {
        self.anchors.insert(String::from(name), node);
    }

    /// Create a SCALAR node and attach it to the document.
    ///
    /// Returns the node id, which is a nonzero integer.
    #[must_use]
    pub fn add_scalar(&mut self, tag: Option<&str>, value: &str, style: ScalarStyle) -> NodeId {
        let tag = tag.unwrap_or(DEFAULT_SCALAR_TAG);
        self.push_node(Node {
            data: NodeData::Scalar {
                value: String::from(value),
                style,
            },
            tag: Some(String::from(tag)),
            ..Default::default()
        })
    }

    /// Create a SEQUENCE node and attach it to the document.
    ///
    /// Returns the node id, which is a nonzero integer.
    #[must_use]
    pub fn add_sequence(&mut self, tag: Option<&str>, style: SequenceStyle) -> NodeId {
        let tag = tag.unwrap_or(DEFAULT_SEQUENCE_TAG);
        self.push_node(Node {
            data: NodeData::Sequence {
                items: Vec::with_capacity(16),
                style,
            },
            tag: Some(String::from(tag)),
            ..Default::default()
        })
    }

    /// Create a MAPPING node and attach it to the document.
    ///
    /// Returns the node id, which is a nonzero integer.
    #[must_use]
    pub fn add_mapping(&mut self, tag: Option<&str>, style: MappingStyle) -> NodeId {
        let tag = tag.unwrap_or(DEFAULT_MAPPING_TAG);
        self.push_node(Node {
            data: NodeData::Mapping {
                pairs: Vec::with_capacity(16),
                style,
            },
            tag: Some(String::from(tag)),
            ..Default::default()
        })
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() as NodeId
    }

    /// Add an item to a SEQUENCE node.
    pub fn append_sequence_item(&mut self, sequence: NodeId, item: NodeId) {
        assert!(sequence > 0 && (sequence as usize) <= self.nodes.len());
        assert!(item > 0 && (item as usize) <= self.nodes.len());
        if let NodeData::Sequence { items, .. } = &mut self.nodes[sequence as usize - 1].data {
            items.push(item);
        } else {
            panic!("node {sequence} is not a sequence");
        }
    }

    /// Add a pair of a key and a value to a MAPPING node.
    pub fn append_mapping_pair(&mut self, mapping: NodeId, key: NodeId, value: NodeId) {
        assert!(mapping > 0 && (mapping as usize) <= self.nodes.len());
        assert!(key > 0 && (key as usize) <= self.nodes.len());
        assert!(value > 0 && (value as usize) <= self.nodes.len());
        if let NodeData::Mapping { pairs, .. } = &mut self.nodes[mapping as usize - 1].data {
            pairs.push(NodePair { key, value });
        } else {
            panic!("node {mapping} is not a mapping");
        }
    }

    /// Detach the item at `index` from a SEQUENCE node. The detached node
    /// stays in the table without a parent; its slot is reclaimed when the
    /// document is dropped.
    pub fn detach_sequence_item(&mut self, sequence: NodeId, index: usize) -> Option<NodeId> {
        if let Some(Node {
            data: NodeData::Sequence { items, .. },
            ..
        }) = self.get_node_mut(sequence)
        {
            if index < items.len() {
                return Some(items.remove(index));
            }
        }
        None
    }

    /// Detach the pair at `index` from a MAPPING node.
    pub fn detach_mapping_pair(&mut self, mapping: NodeId, index: usize) -> Option<NodePair> {
        if let Some(Node {
            data: NodeData::Mapping { pairs, .. },
            ..
        }) = self.get_node_mut(mapping)
        {
            if index < pairs.len() {
                return Some(pairs.remove(index));
            }
        }
        None
    }

    /// Set a user-marker bit on a node. Marker bits are for caller traversal
    /// state; the library never reads them.
    pub fn set_marker(&mut self, node: NodeId, bit: u32) {
        assert!(bit <= MAX_MARKER, "marker bit out of range");
        if let Some(node) = self.get_node_mut(node) {
            node.markers |= 1 << bit;
        }
    }

    /// Clear a user-marker bit on a node.
    pub fn clear_marker(&mut self, node: NodeId, bit: u32) {
        assert!(bit <= MAX_MARKER, "marker bit out of range");
        if let Some(node) = self.get_node_mut(node) {
            node.markers &= !(1 << bit);
        }
    }

    /// Test a user-marker bit on a node.
    pub fn test_marker(&self, node: NodeId, bit: u32) -> bool {
        assert!(bit <= MAX_MARKER, "marker bit out of range");
        self.get_node(node)
            .is_some_and(|node| node.markers & (1 << bit) != 0)
    }

    /// Structural depth of the subtree under `node`.
    pub fn depth(&self, node: NodeId) -> usize {
        match self.get_node(node).map(|n| &n.data) {
            Some(NodeData::Sequence { items, .. }) => {
                1 + items.iter().map(|&i| self.depth(i)).max().unwrap_or(0)
            }
            Some(NodeData::Mapping { pairs, .. }) => {
                1 + pairs
                    .iter()
                    .map(|p| self.depth(p.key).max(self.depth(p.value)))
                    .max()
                    .unwrap_or(0)
            }
            _ => 1,
        }
    }

    /// Cross-representation equality: does the subtree under `node` carry the
    /// same content as `value` in `store`? Styles, anchors and comments are
    /// ignored; scalar text is compared after tag resolution.
    pub fn matches_value(&self, node: NodeId, store: &ValueStore, value: Value) -> bool {
        let Some(node) = self.get_node(node) else {
            return false;
        };
        let data = store.resolve_data(value);
        match (&node.data, data) {
            (NodeData::Scalar { value: text, .. }, data) => crate::value::scalar_matches(text, &data),
            (NodeData::Sequence { items, .. }, ValueData::Sequence(values)) => {
                items.len() == values.len()
                    && items
                        .iter()
                        .zip(values.iter())
                        .all(|(&item, &value)| self.matches_value(item, store, value))
            }
            (NodeData::Mapping { pairs, .. }, ValueData::Mapping(entries)) => {
                pairs.len() == entries.len()
                    && pairs.iter().zip(entries.iter()).all(|(pair, &(k, v))| {
                        self.matches_value(pair.key, store, k)
                            && self.matches_value(pair.value, store, v)
                    })
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_built_document() {
        let mut doc = Document::new(None, &[], true, true);
        let map = doc.add_mapping(None, MappingStyle::Block);
        let key = doc.add_scalar(None, "a", ScalarStyle::Plain);
        let value = doc.add_scalar(None, "1", ScalarStyle::Plain);
        doc.append_mapping_pair(map, key, value);
        assert_eq!(doc.root_id(), Some(map));
        match &doc.get_node(map).unwrap().data {
            NodeData::Mapping { pairs, .. } => assert_eq!(pairs.len(), 1),
            _ => panic!("root is not a mapping"),
        }
    }

    #[test]
    fn anchors_rebind_on_redefinition() {
        let mut doc = Document::new(None, &[], true, true);
        let first = doc.add_scalar(None, "1", ScalarStyle::Plain);
        let second = doc.add_scalar(None, "2", ScalarStyle::Plain);
        doc.set_anchor("x", first);
        assert_eq!(doc.anchor("x"), Some(first));
        doc.set_anchor("x", second);
        assert_eq!(doc.anchor("x"), Some(second));
    }

    #[test]
    fn markers_round_trip() {
        let mut doc = Document::new(None, &[], true, true);
        let node = doc.add_scalar(None, "x", ScalarStyle::Plain);
        assert!(!doc.test_marker(node, 5));
        doc.set_marker(node, 5);
        assert!(doc.test_marker(node, 5));
        doc.clear_marker(node, 5);
        assert!(!doc.test_marker(node, 5));
    }

    #[test]
    fn detach_removes_the_parent_edge() {
        let mut doc = Document::new(None, &[], true, true);
        let seq = doc.add_sequence(None, SequenceStyle::Block);
        let item = doc.add_scalar(None, "x", ScalarStyle::Plain);
        doc.append_sequence_item(seq, item);
        assert_eq!(doc.detach_sequence_item(seq, 0), Some(item));
        match &doc.get_node(seq).unwrap().data {
            NodeData::Sequence { items, .. } => assert!(items.is_empty()),
            _ => unreachable!(),
        }
    }
}
