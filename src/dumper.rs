//! Serialize composed documents and generic values back into the emitter's
//! event stream, generating anchors for shared nodes.

use std::collections::{HashMap, HashSet};

use crate::document::{Document, NodeData, NodeId};
use crate::emitter::{EmitOptions, Emitter};
use crate::error::EmitterError;
use crate::event::Event;
use crate::value::{
    format_float, format_int, resolve_plain, Resolved, StyleHint, Value, ValueData, ValueStore,
};
use crate::{
    MappingStyle, ScalarStyle, SequenceStyle, DEFAULT_MAPPING_TAG, DEFAULT_SCALAR_TAG,
    DEFAULT_SEQUENCE_TAG,
};

impl<'w> Emitter<'w> {
    /// Start a YAML stream. Called implicitly by the dump entry points.
    pub fn open(&mut self) -> Result<(), EmitterError> {
        assert!(!self.opened, "emitter is already open");
        self.emit(Event::stream_start())?;
        self.opened = true;
        Ok(())
    }

    /// Finish a YAML stream.
    pub fn close(&mut self) -> Result<(), EmitterError> {
        assert!(self.opened, "emitter was never opened");
        if self.closed {
            return Ok(());
        }
        self.emit(Event::stream_end())?;
        self.closed = true;
        Ok(())
    }

    /// Emit one document from its tree form. Call repeatedly to write a
    /// multi-document stream, then [`Emitter::close`].
    pub fn dump_document(&mut self, document: &Document) -> Result<(), EmitterError> {
        if !self.opened {
            self.open()?;
        }
        let Some(root) = document.root_id() else {
            return self.close();
        };
        self.emit(Event::document_start(
            document.version_directive,
            &document.tag_directives,
            document.start_implicit,
        ))?;
        let mut dumper = DocumentDumper::new(document);
        dumper.count_node(root);
        dumper.dump_node(self, root)?;
        self.emit(Event::document_end(document.end_implicit))
    }

    /// Emit one document from a generic value.
    pub fn dump_value(&mut self, store: &ValueStore, value: Value) -> Result<(), EmitterError> {
        if !self.opened {
            self.open()?;
        }
        self.emit(Event::document_start(None, &[], true))?;
        dump_value_events(self, store, value)?;
        self.emit(Event::document_end(true))
    }
}

/// Serialize a value to an in-memory string with the given options.
pub(crate) fn emit_value_to_string(
    store: &ValueStore,
    value: Value,
    options: &EmitOptions,
) -> Result<String, EmitterError> {
    let mut output = Vec::new();
    let mut emitter = Emitter::with_options(options.clone());
    emitter.set_output(&mut output);
    emitter.open()?;
    emitter.emit(Event::document_start(None, &[], true))?;
    dump_value_events(&mut emitter, store, value)?;
    emitter.emit(Event::document_end(true))?;
    emitter.close()?;
    drop(emitter);
    Ok(String::from_utf8(output).expect("emitter produces UTF-8"))
}

// Document tree dumping.

#[derive(Default, Clone, Copy)]
struct NodeAnchor {
    references: usize,
    serialized: bool,
    generated: usize,
}

struct DocumentDumper<'a> {
    document: &'a Document,
    anchors: Vec<NodeAnchor>,
    last_generated: usize,
}

impl<'a> DocumentDumper<'a> {
    fn new(document: &'a Document) -> Self {
        Self {
            document,
            anchors: vec![NodeAnchor::default(); document.nodes.len()],
            last_generated: 0,
        }
    }

    fn count_node(&mut self, index: NodeId) {
        let slot = index as usize - 1;
        self.anchors[slot].references += 1;
        if self.anchors[slot].references > 1 {
            if self.anchors[slot].generated == 0 && self.document.nodes[slot].anchor.is_none() {
                self.last_generated += 1;
                self.anchors[slot].generated = self.last_generated;
            }
            return;
        }
        match &self.document.nodes[index as usize - 1].data {
            NodeData::Sequence { items, .. } => {
                for &item in items.clone().iter() {
                    self.count_node(item);
                }
            }
            NodeData::Mapping { pairs, .. } => {
                for pair in pairs.clone() {
                    self.count_node(pair.key);
                    self.count_node(pair.value);
                }
            }
            _ => {}
        }
    }

    fn anchor_name(&self, index: NodeId) -> Option<String> {
        let node = &self.document.nodes[index as usize - 1];
        let slot = &self.anchors[index as usize - 1];
        if let Some(anchor) = &node.anchor {
            return Some(anchor.clone());
        }
        if slot.generated != 0 {
            return Some(format!("id{:03}", slot.generated));
        }
        None
    }

    fn dump_node(&mut self, emitter: &mut Emitter<'_>, index: NodeId) -> Result<(), EmitterError> {
        let anchor = self.anchor_name(index);
        let slot = index as usize - 1;
        if self.anchors[slot].serialized {
            return match anchor {
                Some(anchor) => emitter.emit(Event::alias(&anchor)),
                // A node can be referenced twice without an anchor only by
                // detached manual edits; re-serialize it.
                None => self.dump_fresh(emitter, index, None),
            };
        }
        self.anchors[slot].serialized = true;
        self.dump_fresh(emitter, index, anchor)
    }

    fn dump_fresh(
        &mut self,
        emitter: &mut Emitter<'_>,
        index: NodeId,
        anchor: Option<String>,
    ) -> Result<(), EmitterError> {
        let node = &self.document.nodes[index as usize - 1];
        let comment = node.comment.clone();
        match &node.data {
            NodeData::Scalar { value, style } => {
                let implicit = node.tag.as_deref() == Some(DEFAULT_SCALAR_TAG);
                let mut event = Event::scalar(
                    anchor.as_deref(),
                    node.tag.as_deref(),
                    value,
                    implicit,
                    implicit,
                    *style,
                );
                event.comment = comment;
                emitter.emit(event)
            }
            NodeData::Sequence { items, style } => {
                let implicit = node.tag.as_deref() == Some(DEFAULT_SEQUENCE_TAG);
                let mut event =
                    Event::sequence_start(anchor.as_deref(), node.tag.as_deref(), implicit, *style);
                event.comment = comment;
                emitter.emit(event)?;
                for item in items.clone() {
                    self.dump_node(emitter, item)?;
                }
                emitter.emit(Event::sequence_end())
            }
            NodeData::Mapping { pairs, style } => {
                let implicit = node.tag.as_deref() == Some(DEFAULT_MAPPING_TAG);
                let mut event =
                    Event::mapping_start(anchor.as_deref(), node.tag.as_deref(), implicit, *style);
                event.comment = comment;
                emitter.emit(event)?;
                for pair in pairs.clone() {
                    self.dump_node(emitter, pair.key)?;
                    self.dump_node(emitter, pair.value)?;
                }
                emitter.emit(Event::mapping_end())
            }
            NodeData::NoNode => Ok(()),
        }
    }
}

// Generic value dumping.

pub(crate) fn dump_value_events(
    emitter: &mut Emitter<'_>,
    store: &ValueStore,
    value: Value,
) -> Result<(), EmitterError> {
    // JSON has no aliases; stripped anchors leave aliases dangling. Both
    // expand shared values in place instead.
    let expand = emitter.options().mode.is_json() || emitter.options().strip_anchors;
    let mut dumper = ValueDumper {
        store,
        original: matches!(emitter.options().mode, crate::emitter::EmitMode::Original),
        sort_keys: emitter.options().sort_keys,
        expand,
        json: emitter.options().mode.is_json(),
        references: HashMap::new(),
        anchors: HashMap::new(),
        emitted: HashSet::new(),
        last_generated: 0,
    };
    if !expand {
        dumper.count(value);
    }
    dumper.dump(emitter, value)
}

struct ValueDumper<'a> {
    store: &'a ValueStore,
    original: bool,
    sort_keys: bool,
    expand: bool,
    /// JSON output has no tag syntax; dropping tags keeps the implicit flags
    /// honest so scalars still resolve to their JSON types.
    json: bool,
    /// Occurrences per handle; identity here is the raw handle, so shared
    /// subtrees and resolved aliases count together.
    references: HashMap<Value, usize>,
    anchors: HashMap<Value, String>,
    emitted: HashSet<Value>,
    last_generated: usize,
}

impl<'a> ValueDumper<'a> {
    fn count(&mut self, value: Value) {
        let seen = self.references.entry(value).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            return;
        }
        match self.store.resolve_data(value) {
            ValueData::Sequence(items) => {
                for &item in items {
                    self.count(item);
                }
            }
            ValueData::Mapping(pairs) => {
                for &(key, item) in pairs {
                    self.count(key);
                    self.count(item);
                }
            }
            _ => {}
        }
    }

    fn dump(&mut self, emitter: &mut Emitter<'_>, value: Value) -> Result<(), EmitterError> {
        if !self.expand && self.emitted.contains(&value) {
            if let Some(anchor) = self.anchors.get(&value) {
                let anchor = anchor.clone();
                return emitter.emit(Event::alias(&anchor));
            }
        }
        self.emitted.insert(value);
        let meta = self.store.metadata(value);
        let tag = if self.json {
            None
        } else {
            meta.and_then(|m| m.tag.clone())
        };
        let comment = meta.and_then(|m| m.comment.clone());
        let style_hint = meta.and_then(|m| m.style);
        let anchor = self.anchor_for(value);
        if let Some(anchor) = &anchor {
            self.anchors.insert(value, anchor.clone());
        }

        match self.store.resolve_data(value) {
            ValueData::Sequence(items) => {
                let style = self.collection_style(style_hint, SequenceStyle::Block, SequenceStyle::Flow);
                let mut event =
                    Event::sequence_start(anchor.as_deref(), tag.as_deref(), tag.is_none(), style);
                event.comment = comment;
                emitter.emit(event)?;
                for &item in items.to_vec().iter() {
                    self.dump(emitter, item)?;
                }
                emitter.emit(Event::sequence_end())
            }
            ValueData::Mapping(pairs) => {
                let style = self.collection_style(style_hint, MappingStyle::Block, MappingStyle::Flow);
                let mut event =
                    Event::mapping_start(anchor.as_deref(), tag.as_deref(), tag.is_none(), style);
                event.comment = comment;
                emitter.emit(event)?;
                let mut pairs = pairs.to_vec();
                if self.sort_keys {
                    pairs.sort_by_key(|&(key, _)| self.key_sort_string(key));
                }
                for (key, item) in pairs {
                    self.dump(emitter, key)?;
                    self.dump(emitter, item)?;
                }
                emitter.emit(Event::mapping_end())
            }
            ValueData::Alias(name) => emitter.emit(Event::alias(name)),
            data => {
                let mut event = self.scalar_event(&data, anchor.as_deref(), tag.as_deref(), style_hint);
                event.comment = comment;
                emitter.emit(event)
            }
        }
    }

    fn anchor_for(&mut self, value: Value) -> Option<String> {
        if self.expand {
            return None;
        }
        if let Some(meta) = self.store.metadata(value) {
            if let Some(anchor) = &meta.anchor {
                return Some(anchor.clone());
            }
        }
        let shared = self.references.get(&value).copied().unwrap_or(0) > 1;
        let composite = matches!(
            self.store.resolve_data(value),
            ValueData::Sequence(_) | ValueData::Mapping(_)
        );
        if shared && composite {
            self.last_generated += 1;
            return Some(format!("id{:03}", self.last_generated));
        }
        None
    }

    fn collection_style<S: Copy>(&self, hint: Option<StyleHint>, block: S, flow: S) -> S {
        if self.original && hint == Some(StyleHint::Flow) {
            flow
        } else {
            block
        }
    }

    fn scalar_event(
        &self,
        data: &ValueData<'_>,
        anchor: Option<&str>,
        tag: Option<&str>,
        style_hint: Option<StyleHint>,
    ) -> Event {
        let (text, safe_plain) = match data {
            ValueData::Null => (String::from("null"), true),
            ValueData::Bool(true) => (String::from("true"), true),
            ValueData::Bool(false) => (String::from("false"), true),
            ValueData::Int(i) => (format_int(*i), true),
            ValueData::Float(f) => (format_float(*f), true),
            ValueData::Str(s) => {
                // Text that resolves to a different type must not re-enter
                // the stream plain.
                let safe = matches!(resolve_plain(s, true), Resolved::Str);
                ((*s).to_string(), safe)
            }
            _ => unreachable!("composite handled by the caller"),
        };
        let style = match style_hint {
            Some(StyleHint::Scalar(style)) if self.original => style,
            _ => ScalarStyle::Any,
        };
        // An explicit tag must actually be written; implicit flags would let
        // the emitter drop it.
        let (plain_implicit, quoted_implicit) = if tag.is_some() {
            (false, false)
        } else {
            (safe_plain, true)
        };
        Event::scalar(anchor, tag, &text, plain_implicit, quoted_implicit, style)
    }

    fn key_sort_string(&self, key: Value) -> String {
        match self.store.resolve_data(key) {
            ValueData::Str(s) => s.to_string(),
            ValueData::Int(i) => format_int(i),
            ValueData::Float(f) => format_float(f),
            ValueData::Bool(b) => b.to_string(),
            ValueData::Null => String::from("null"),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{EmitMode, EmitOptions};
    use crate::parser::{ParseOptions, Parser};
    use crate::reader::Input;
    use pretty_assertions::assert_eq;

    fn parse_value(input: &str) -> (ValueStore, Value) {
        let mut store = ValueStore::with_dedup();
        let value = store.parse_str(input, ParseOptions::default()).unwrap();
        (store, value)
    }

    fn emit(store: &ValueStore, value: Value, options: &EmitOptions) -> String {
        store.emit_string(value, options).unwrap()
    }

    #[test]
    fn anchored_scalar_round_trips_byte_identical() {
        let input = "a: &x 1\nb: *x\n";
        let (store, value) = parse_value(input);
        let output = emit(&store, value, &EmitOptions::default());
        assert_eq!(output, input);
    }

    #[test]
    fn flow_style_survives_original_mode() {
        let input = "[1, 2, {a: b}]\n";
        let (store, value) = parse_value(input);
        let output = emit(&store, value, &EmitOptions::default());
        assert_eq!(output, input);
    }

    #[test]
    fn block_forced_reshapes_flow_input() {
        let (store, value) = parse_value("[1, 2]\n");
        let mut options = EmitOptions::default();
        options.mode = EmitMode::Block;
        assert_eq!(emit(&store, value, &options), "- 1\n- 2\n");
    }

    #[test]
    fn strings_that_look_like_numbers_are_quoted() {
        let mut store = ValueStore::new();
        let value = store.string("17");
        let output = emit(&store, value, &EmitOptions::default());
        assert_eq!(output, "'17'\n");
    }

    #[test]
    fn sort_keys_orders_output() {
        let (store, value) = parse_value("b: 2\na: 1\nc: 3\n");
        let mut options = EmitOptions::default();
        options.sort_keys = true;
        assert_eq!(emit(&store, value, &options), "a: 1\nb: 2\nc: 3\n");
    }

    #[test]
    fn strip_anchors_expands_aliases() {
        let (store, value) = parse_value("a: &x [1]\nb: *x\n");
        let mut options = EmitOptions::default();
        options.strip_anchors = true;
        assert_eq!(emit(&store, value, &options), "a: [1]\nb: [1]\n");
    }

    #[test]
    fn json_mode_expands_and_quotes() {
        let (store, value) = parse_value("a: &x hi\nb: *x\n");
        let mut options = EmitOptions::default();
        options.mode = EmitMode::JsonOneline;
        assert_eq!(emit(&store, value, &options), "{\"a\":\"hi\",\"b\":\"hi\"}\n");
    }

    #[test]
    fn shared_composites_get_generated_anchors() {
        let mut store = ValueStore::with_dedup();
        let one = store.int(1);
        let inner = store.sequence(vec![one]);
        let key_a = store.string("a");
        let key_b = store.string("b");
        let root = store.mapping(vec![(key_a, inner), (key_b, inner)]);
        let output = emit(&store, root, &EmitOptions::default());
        assert_eq!(output, "a: &id001\n- 1\nb: *id001\n");
    }

    #[test]
    fn document_tree_round_trip() {
        let input = "name: test\nitems:\n- 1\n- 2\n";
        let mut parser = Parser::new();
        parser.set_input(Input::from_str(input));
        let document = Document::load(&mut parser).unwrap();
        let mut output = Vec::new();
        {
            let mut emitter = Emitter::new();
            emitter.set_output(&mut output);
            emitter.dump_document(&document).unwrap();
            emitter.close().unwrap();
        }
        assert_eq!(String::from_utf8(output).unwrap(), input);
    }
}
