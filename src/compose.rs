//! The composer folds the event stream into a [`Document`] tree or an
//! interned generic value, resolving anchors, aliases and merge keys.

use crate::document::{Document, Node, NodeData, NodeId, NodePair};
use crate::error::ComposerError;
use crate::event::{Event, EventData};
use crate::parser::Parser;
use crate::value::{
    resolve_plain, Indirect, Resolved, StyleHint, Value, ValueData, ValueStore,
};
use crate::{
    Mark, ScalarStyle, SequenceStyle, BOOL_TAG, DEFAULT_MAPPING_TAG, DEFAULT_SCALAR_TAG,
    DEFAULT_SEQUENCE_TAG, FLOAT_TAG, INT_TAG, MERGE_TAG, NULL_TAG, STR_TAG,
};

const MERGE_KEY: &str = "<<";

fn error<T>(problem: &'static str, mark: Mark) -> Result<T, ComposerError> {
    Err(ComposerError::Problem { problem, mark })
}

fn error_context<T>(
    context: &'static str,
    context_mark: Mark,
    problem: &'static str,
    mark: Mark,
) -> Result<T, ComposerError> {
    Err(ComposerError::ProblemWithContext {
        context,
        context_mark,
        problem,
        mark,
    })
}

// Document tree composition.

/// Compose the next document from the parser's event stream. A document with
/// no nodes signifies the end of the stream.
pub(crate) fn load_document(parser: &mut Parser<'_>) -> Result<Document, ComposerError> {
    let mut document = Document::new(None, &[], false, false);
    if !parser.stream_start_produced() {
        let event = parser.parse()?;
        assert!(
            matches!(event.data, EventData::StreamStart),
            "expected stream start"
        );
    }
    if parser.stream_end_produced() {
        return Ok(document);
    }
    let event = parser.parse()?;
    if matches!(event.data, EventData::StreamEnd) {
        return Ok(document);
    }
    load_document_content(parser, event, &mut document)?;
    if parser.options().resolve_merge_keys {
        resolve_document_merges(&mut document)?;
    }
    log::debug!(
        "composed document with {} nodes at {}",
        document.nodes.len(),
        document.start_mark
    );
    Ok(document)
}

fn load_document_content(
    parser: &mut Parser<'_>,
    event: Event,
    document: &mut Document,
) -> Result<(), ComposerError> {
    let EventData::DocumentStart {
        version_directive,
        tag_directives,
        implicit,
    } = event.data
    else {
        panic!("expected a document start event");
    };
    document.version_directive = version_directive;
    document.tag_directives = tag_directives;
    document.start_implicit = implicit;
    document.start_mark = event.start_mark;

    let mut ctx: Vec<NodeId> = Vec::with_capacity(16);
    loop {
        let event = parser.parse()?;
        match event.data {
            EventData::DocumentEnd { implicit } => {
                document.end_implicit = implicit;
                document.end_mark = event.end_mark;
                return Ok(());
            }
            EventData::Alias { .. } => load_alias(event, document, &ctx)?,
            EventData::Scalar { .. } => {
                load_scalar(parser, event, document, &ctx)?;
            }
            EventData::SequenceStart { .. } => load_sequence(parser, event, document, &mut ctx)?,
            EventData::SequenceEnd => load_collection_end(event, document, &mut ctx, false),
            EventData::MappingStart { .. } => load_mapping(parser, event, document, &mut ctx)?,
            EventData::MappingEnd => load_collection_end(event, document, &mut ctx, true),
            EventData::StreamStart | EventData::StreamEnd | EventData::DocumentStart { .. } => {
                panic!("unexpected event while composing a document")
            }
        }
    }
}

fn register_anchor(
    parser: &Parser<'_>,
    document: &mut Document,
    index: NodeId,
    anchor: Option<String>,
) -> Result<(), ComposerError> {
    let Some(anchor) = anchor else {
        return Ok(());
    };
    let mark = document.nodes[index as usize - 1].start_mark;
    if parser.options().strict_anchors {
        if let Some(existing) = document.anchor(&anchor) {
            let first_mark = document.nodes[existing as usize - 1].start_mark;
            return error_context(
                "found duplicate anchor; first occurrence",
                first_mark,
                "second occurrence",
                mark,
            );
        }
    }
    document.nodes[index as usize - 1].anchor = Some(anchor.clone());
    // Redefinition rebinds for subsequent lookups; aliases already resolved
    // keep their earlier target.
    document.set_anchor(&anchor, index);
    Ok(())
}

fn add_to_parent(document: &mut Document, ctx: &[NodeId], index: NodeId) {
    let Some(&parent_index) = ctx.last() else {
        return;
    };
    let parent = &mut document.nodes[parent_index as usize - 1];
    match &mut parent.data {
        NodeData::Sequence { items, .. } => items.push(index),
        NodeData::Mapping { pairs, .. } => {
            if let Some(pair) = pairs.last_mut() {
                if pair.key != 0 && pair.value == 0 {
                    pair.value = index;
                    return;
                }
            }
            pairs.push(NodePair {
                key: index,
                value: 0,
            });
        }
        _ => panic!("parent node is not a collection"),
    }
}

fn load_alias(
    event: Event,
    document: &mut Document,
    ctx: &[NodeId],
) -> Result<(), ComposerError> {
    let EventData::Alias { anchor } = &event.data else {
        unreachable!()
    };
    match document.anchor(anchor) {
        Some(index) => {
            add_to_parent(document, ctx, index);
            Ok(())
        }
        None => error("found undefined alias", event.start_mark),
    }
}

fn load_scalar(
    parser: &Parser<'_>,
    event: Event,
    document: &mut Document,
    ctx: &[NodeId],
) -> Result<NodeId, ComposerError> {
    let comment = event.comment;
    let EventData::Scalar {
        anchor,
        mut tag,
        value,
        style,
        ..
    } = event.data
    else {
        unreachable!()
    };
    if tag.is_none() || tag.as_deref() == Some("!") {
        tag = Some(String::from(DEFAULT_SCALAR_TAG));
    }
    let node = Node {
        data: NodeData::Scalar { value, style },
        tag,
        comment,
        start_mark: event.start_mark,
        end_mark: event.end_mark,
        ..Default::default()
    };
    let index = document.push_node(node);
    register_anchor(parser, document, index, anchor)?;
    add_to_parent(document, ctx, index);
    Ok(index)
}

fn load_sequence(
    parser: &Parser<'_>,
    event: Event,
    document: &mut Document,
    ctx: &mut Vec<NodeId>,
) -> Result<(), ComposerError> {
    let comment = event.comment;
    let EventData::SequenceStart {
        anchor, mut tag, style, ..
    } = event.data
    else {
        unreachable!()
    };
    if tag.is_none() || tag.as_deref() == Some("!") {
        tag = Some(String::from(DEFAULT_SEQUENCE_TAG));
    }
    let node = Node {
        data: NodeData::Sequence {
            items: Vec::with_capacity(16),
            style,
        },
        tag,
        comment,
        start_mark: event.start_mark,
        end_mark: event.end_mark,
        ..Default::default()
    };
    let index = document.push_node(node);
    register_anchor(parser, document, index, anchor)?;
    add_to_parent(document, ctx, index);
    ctx.push(index);
    Ok(())
}

fn load_mapping(
    parser: &Parser<'_>,
    event: Event,
    document: &mut Document,
    ctx: &mut Vec<NodeId>,
) -> Result<(), ComposerError> {
    let comment = event.comment;
    let EventData::MappingStart {
        anchor, mut tag, style, ..
    } = event.data
    else {
        unreachable!()
    };
    if tag.is_none() || tag.as_deref() == Some("!") {
        tag = Some(String::from(DEFAULT_MAPPING_TAG));
    }
    let node = Node {
        data: NodeData::Mapping {
            pairs: Vec::with_capacity(16),
            style,
        },
        tag,
        comment,
        start_mark: event.start_mark,
        end_mark: event.end_mark,
        ..Default::default()
    };
    let index = document.push_node(node);
    register_anchor(parser, document, index, anchor)?;
    add_to_parent(document, ctx, index);
    ctx.push(index);
    Ok(())
}

fn load_collection_end(
    event: Event,
    document: &mut Document,
    ctx: &mut Vec<NodeId>,
    mapping: bool,
) {
    let index = *ctx.last().expect("collection end without a start");
    let node = &mut document.nodes[index as usize - 1];
    debug_assert!(match (&node.data, mapping) {
        (NodeData::Mapping { .. }, true) | (NodeData::Sequence { .. }, false) => true,
        _ => false,
    });
    node.end_mark = event.end_mark;
    let _ = ctx.pop();
}

/// Expand `<<` keys in every mapping of the composed tree. Anchors are
/// defined before the aliases that merge them, so ascending node order
/// expands sources before their consumers.
fn resolve_document_merges(document: &mut Document) -> Result<(), ComposerError> {
    for index in 1..=document.nodes.len() as NodeId {
        let NodeData::Mapping { pairs, .. } = &document.nodes[index as usize - 1].data else {
            continue;
        };
        let has_merge = pairs
            .iter()
            .any(|pair| scalar_text(document, pair.key) == Some(MERGE_KEY));
        if !has_merge {
            continue;
        }
        let pairs = pairs.clone();
        let mut merged: Vec<NodePair> = Vec::with_capacity(pairs.len());
        let explicit: Vec<String> = pairs
            .iter()
            .filter(|pair| scalar_text(document, pair.key) != Some(MERGE_KEY))
            .filter_map(|pair| scalar_text(document, pair.key).map(String::from))
            .collect();
        let mut seen: Vec<String> = Vec::new();
        for pair in &pairs {
            if scalar_text(document, pair.key) == Some(MERGE_KEY) {
                let sources = merge_sources(document, pair.value)?;
                for source in sources {
                    let NodeData::Mapping {
                        pairs: source_pairs, ..
                    } = &document.nodes[source as usize - 1].data
                    else {
                        unreachable!("merge sources were checked to be mappings")
                    };
                    for source_pair in source_pairs.clone() {
                        let Some(key) = scalar_text(document, source_pair.key) else {
                            continue;
                        };
                        let key = String::from(key);
                        if explicit.contains(&key) || seen.contains(&key) {
                            continue;
                        }
                        seen.push(key);
                        merged.push(source_pair);
                    }
                }
            } else {
                let key = scalar_text(document, pair.key).map(String::from);
                if let Some(key) = key {
                    if seen.contains(&key) {
                        continue;
                    }
                    seen.push(key);
                }
                merged.push(*pair);
            }
        }
        if let NodeData::Mapping { pairs, .. } = &mut document.nodes[index as usize - 1].data {
            *pairs = merged;
        }
    }
    Ok(())
}

fn merge_sources(document: &Document, value: NodeId) -> Result<Vec<NodeId>, ComposerError> {
    let node = &document.nodes[value as usize - 1];
    match &node.data {
        NodeData::Mapping { .. } => Ok(vec![value]),
        NodeData::Sequence { items, .. } => {
            for &item in items {
                if !matches!(
                    document.nodes[item as usize - 1].data,
                    NodeData::Mapping { .. }
                ) {
                    return error(
                        "merge value must be a mapping or a sequence of mappings",
                        document.nodes[item as usize - 1].start_mark,
                    );
                }
            }
            Ok(items.clone())
        }
        _ => error(
            "merge value must be a mapping or a sequence of mappings",
            node.start_mark,
        ),
    }
}

fn scalar_text(document: &Document, node: NodeId) -> Option<&str> {
    match &document.nodes[node as usize - 1].data {
        NodeData::Scalar { value, .. } => Some(value),
        _ => None,
    }
}

// Generic value composition.

enum FrameKind {
    Sequence {
        items: Vec<Value>,
    },
    Mapping {
        pairs: Vec<(Value, Value)>,
        pending_key: Option<Value>,
    },
}

struct Frame {
    kind: FrameKind,
    anchor: Option<String>,
    tag: Option<String>,
    flow: bool,
    comment: Option<String>,
    mark: Mark,
}

/// Compose the next document into an interned value. `None` signifies the
/// end of the stream.
pub(crate) fn build_value(
    parser: &mut Parser<'_>,
    store: &mut ValueStore,
) -> Result<Option<Value>, ComposerError> {
    if !parser.stream_start_produced() {
        let event = parser.parse()?;
        assert!(
            matches!(event.data, EventData::StreamStart),
            "expected stream start"
        );
    }
    if parser.stream_end_produced() {
        return Ok(None);
    }
    let event = parser.parse()?;
    match event.data {
        EventData::StreamEnd => Ok(None),
        EventData::DocumentStart { .. } => Ok(Some(build_document_value(parser, store)?)),
        _ => panic!("expected a document start event"),
    }
}

fn build_document_value(
    parser: &mut Parser<'_>,
    store: &mut ValueStore,
) -> Result<Value, ComposerError> {
    let mut anchors: Vec<(String, Value)> = Vec::new();
    let mut frames: Vec<Frame> = Vec::with_capacity(16);
    let mut root: Option<Value> = None;

    loop {
        let event = parser.parse()?;
        let mark = event.start_mark;
        match event.data {
            EventData::DocumentEnd { .. } => {
                return Ok(root.unwrap_or(Value::NULL));
            }
            EventData::Scalar {
                anchor,
                tag,
                value,
                plain_implicit,
                quoted_implicit,
                style,
            } => {
                let explicit_tag = explicit_tag(tag, plain_implicit, quoted_implicit);
                let base = scalar_value(store, parser.in_v11(), &value, style, explicit_tag.as_deref());
                let needs_wrap = anchor.is_some()
                    || explicit_tag.is_some()
                    || event.comment.is_some()
                    || style != ScalarStyle::Plain;
                let built = if needs_wrap {
                    store.indirect(Indirect {
                        base,
                        tag: explicit_tag,
                        anchor: anchor.clone(),
                        mark: Some(mark),
                        comment: event.comment,
                        style: Some(StyleHint::Scalar(style)),
                    })
                } else {
                    base
                };
                bind_anchor(parser, &mut anchors, anchor, built, mark)?;
                place(&mut frames, &mut root, built);
            }
            EventData::SequenceStart {
                anchor, tag, implicit, style,
            } => {
                frames.push(Frame {
                    kind: FrameKind::Sequence {
                        items: Vec::with_capacity(16),
                    },
                    anchor,
                    tag: explicit_tag(tag, implicit, implicit),
                    flow: style == SequenceStyle::Flow,
                    comment: event.comment,
                    mark,
                });
            }
            EventData::MappingStart {
                anchor, tag, implicit, style,
            } => {
                let flow = style == crate::MappingStyle::Flow;
                frames.push(Frame {
                    kind: FrameKind::Mapping {
                        pairs: Vec::with_capacity(16),
                        pending_key: None,
                    },
                    anchor,
                    tag: explicit_tag(tag, implicit, implicit),
                    flow,
                    comment: event.comment,
                    mark,
                });
            }
            EventData::SequenceEnd | EventData::MappingEnd => {
                let frame = frames.pop().expect("collection end without a start");
                let base = match frame.kind {
                    FrameKind::Sequence { items } => store.sequence(items),
                    FrameKind::Mapping { pairs, pending_key } => {
                        debug_assert!(pending_key.is_none(), "mapping ended on a key");
                        let pairs = if parser.options().resolve_merge_keys {
                            expand_value_merges(store, pairs, frame.mark)?
                        } else {
                            pairs
                        };
                        store.mapping(pairs)
                    }
                };
                let needs_wrap = frame.anchor.is_some()
                    || frame.tag.is_some()
                    || frame.comment.is_some()
                    || frame.flow;
                let built = if needs_wrap {
                    store.indirect(Indirect {
                        base,
                        tag: frame.tag,
                        anchor: frame.anchor.clone(),
                        mark: Some(frame.mark),
                        comment: frame.comment,
                        style: Some(if frame.flow {
                            StyleHint::Flow
                        } else {
                            StyleHint::Block
                        }),
                    })
                } else {
                    base
                };
                bind_anchor(parser, &mut anchors, frame.anchor, built, frame.mark)?;
                place(&mut frames, &mut root, built);
            }
            EventData::Alias { anchor } => {
                let bound = anchors
                    .iter()
                    .rev()
                    .find(|(name, _)| *name == anchor)
                    .map(|&(_, value)| value);
                match bound {
                    Some(value) => place(&mut frames, &mut root, value),
                    None => {
                        // An alias may not point into a node that is still
                        // being composed; that is a reference cycle.
                        if frames.iter().any(|f| f.anchor.as_deref() == Some(&*anchor)) {
                            return error(
                                "alias would create a reference cycle",
                                mark,
                            );
                        }
                        return error("found undefined alias", mark);
                    }
                }
            }
            EventData::StreamStart
            | EventData::StreamEnd
            | EventData::DocumentStart { .. } => {
                panic!("unexpected event while composing a value")
            }
        }
    }
}

/// The tag worth keeping on the value: explicit tags survive, implicit and
/// non-specific ones do not.
fn explicit_tag(tag: Option<String>, plain_implicit: bool, quoted_implicit: bool) -> Option<String> {
    match tag {
        Some(tag) if tag != "!" && !plain_implicit && !quoted_implicit => Some(tag),
        _ => None,
    }
}

fn bind_anchor(
    parser: &Parser<'_>,
    anchors: &mut Vec<(String, Value)>,
    anchor: Option<String>,
    value: Value,
    mark: Mark,
) -> Result<(), ComposerError> {
    let Some(anchor) = anchor else {
        return Ok(());
    };
    if parser.options().strict_anchors && anchors.iter().any(|(name, _)| *name == anchor) {
        return error("found duplicate anchor", mark);
    }
    anchors.push((anchor, value));
    Ok(())
}

fn place(frames: &mut [Frame], root: &mut Option<Value>, value: Value) {
    match frames.last_mut() {
        None => *root = Some(value),
        Some(frame) => match &mut frame.kind {
            FrameKind::Sequence { items } => items.push(value),
            FrameKind::Mapping { pairs, pending_key } => match pending_key.take() {
                None => *pending_key = Some(value),
                Some(key) => pairs.push((key, value)),
            },
        },
    }
}

/// Expand `<<` merge pairs: merged entries surface at the position of the
/// merge key; explicit keys always win; earlier merge sources take
/// precedence over later ones.
fn expand_value_merges(
    store: &ValueStore,
    pairs: Vec<(Value, Value)>,
    mark: Mark,
) -> Result<Vec<(Value, Value)>, ComposerError> {
    let is_merge =
        |store: &ValueStore, key: Value| matches!(store.resolve_data(key), ValueData::Str(MERGE_KEY));
    if !pairs.iter().any(|&(k, _)| is_merge(store, k)) {
        return Ok(pairs);
    }

    let explicit: Vec<Value> = pairs
        .iter()
        .filter(|&&(k, _)| !is_merge(store, k))
        .map(|&(k, _)| k)
        .collect();
    let contains = |store: &ValueStore, set: &[Value], key: Value| {
        set.iter().any(|&existing| store.equal(existing, key))
    };

    let mut result: Vec<(Value, Value)> = Vec::with_capacity(pairs.len());
    let mut seen: Vec<Value> = Vec::new();
    for (key, value) in pairs {
        if is_merge(store, key) {
            let sources: Vec<Value> = match store.resolve_data(value) {
                ValueData::Mapping(_) => vec![value],
                ValueData::Sequence(items) => items.to_vec(),
                _ => {
                    return error(
                        "merge value must be a mapping or a sequence of mappings",
                        mark,
                    )
                }
            };
            for source in sources {
                let ValueData::Mapping(source_pairs) = store.resolve_data(source) else {
                    return error(
                        "merge value must be a mapping or a sequence of mappings",
                        mark,
                    );
                };
                for &(source_key, source_value) in source_pairs.to_vec().iter() {
                    if contains(store, &explicit, source_key)
                        || contains(store, &seen, source_key)
                    {
                        continue;
                    }
                    seen.push(source_key);
                    result.push((source_key, source_value));
                }
            }
        } else {
            if contains(store, &seen, key) {
                continue;
            }
            seen.push(key);
            result.push((key, value));
        }
    }
    Ok(result)
}

fn scalar_value(
    store: &mut ValueStore,
    v11: bool,
    text: &str,
    style: ScalarStyle,
    tag: Option<&str>,
) -> Value {
    if let Some(tag) = tag {
        return match tag {
            NULL_TAG => Value::NULL,
            BOOL_TAG => match resolve_plain(text, true) {
                Resolved::Bool(b) => Value::bool(b),
                _ => store.string(text),
            },
            INT_TAG => match resolve_plain(text, v11) {
                Resolved::Int(i) => store.int(i),
                _ => store.string(text),
            },
            FLOAT_TAG => match resolve_plain(text, v11) {
                Resolved::Float(f) => store.float(f),
                Resolved::Int(i) => store.float(i as f64),
                _ => store.string(text),
            },
            MERGE_TAG => store.string(MERGE_KEY),
            STR_TAG => store.string(text),
            // Application tags keep the text; the tag survives on the
            // indirect wrapper.
            _ => store.string(text),
        };
    }
    if style == ScalarStyle::Plain {
        return match resolve_plain(text, v11) {
            Resolved::Null => Value::NULL,
            Resolved::Bool(b) => Value::bool(b),
            Resolved::Int(i) => store.int(i),
            Resolved::Float(f) => store.float(f),
            Resolved::Str => store.string(text),
        };
    }
    store.string(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseOptions;
    use crate::reader::Input;
    use crate::value::ValueData;

    fn value_of(input: &str) -> (ValueStore, Value) {
        let mut store = ValueStore::with_dedup();
        let value = store.parse_str(input, ParseOptions::default()).unwrap();
        (store, value)
    }

    #[test]
    fn scalars_resolve_implicitly() {
        let (store, value) = value_of("x: [1, 1.5, true, null, hello]\n");
        let list = store.get_str(value, "x").unwrap();
        let expect = [
            matches!(store.resolve_data(store.get_index(list, 0).unwrap()), ValueData::Int(1)),
            matches!(store.resolve_data(store.get_index(list, 1).unwrap()), ValueData::Float(f) if f == 1.5),
            matches!(store.resolve_data(store.get_index(list, 2).unwrap()), ValueData::Bool(true)),
            matches!(store.resolve_data(store.get_index(list, 3).unwrap()), ValueData::Null),
            matches!(store.resolve_data(store.get_index(list, 4).unwrap()), ValueData::Str("hello")),
        ];
        assert!(expect.iter().all(|&ok| ok), "implicit resolution failed");
    }

    #[test]
    fn quoted_scalars_stay_strings() {
        let (store, value) = value_of("a: '1'\nb: \"true\"\n");
        assert!(matches!(
            store.resolve_data(store.get_str(value, "a").unwrap()),
            ValueData::Str("1")
        ));
        assert!(matches!(
            store.resolve_data(store.get_str(value, "b").unwrap()),
            ValueData::Str("true")
        ));
    }

    #[test]
    fn aliases_share_handles_under_dedup() {
        let (store, value) = value_of("a: &x 1\nb: *x\n");
        let a = store.resolve(store.get_str(value, "a").unwrap());
        let b = store.resolve(store.get_str(value, "b").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn anchor_metadata_is_preserved() {
        let (store, value) = value_of("a: &x 1\n");
        let a = store.get_str(value, "a").unwrap();
        let meta = store.metadata(a).expect("anchored value lost its wrapper");
        assert_eq!(meta.anchor.as_deref(), Some("x"));
    }

    #[test]
    fn merge_key_expansion() {
        let (store, value) = value_of("defaults: &d {x: 1, y: 2}\nthing: { <<: *d, y: 99 }\n");
        let thing = store.get_str(value, "thing").unwrap();
        assert_eq!(store.len(thing), 2);
        assert!(matches!(
            store.resolve_data(store.get_str(thing, "x").unwrap()),
            ValueData::Int(1)
        ));
        assert!(matches!(
            store.resolve_data(store.get_str(thing, "y").unwrap()),
            ValueData::Int(99)
        ));
        // Merged keys surface at the merge key's position: x before y.
        let ValueData::Mapping(pairs) = store.resolve_data(thing) else {
            panic!("thing is not a mapping");
        };
        assert!(matches!(store.resolve_data(pairs[0].0), ValueData::Str("x")));
        assert!(matches!(store.resolve_data(pairs[1].0), ValueData::Str("y")));
    }

    #[test]
    fn earlier_merge_sources_win() {
        let (store, value) =
            value_of("a: &a {k: first}\nb: &b {k: second, extra: 1}\nm: { <<: [*a, *b] }\n");
        let m = store.get_str(value, "m").unwrap();
        assert!(matches!(
            store.resolve_data(store.get_str(m, "k").unwrap()),
            ValueData::Str("first")
        ));
        assert!(matches!(
            store.resolve_data(store.get_str(m, "extra").unwrap()),
            ValueData::Int(1)
        ));
    }

    #[test]
    fn merge_into_nested_mapping_via_document_tree() {
        let mut parser = Parser::new();
        parser.set_input(Input::from_str(
            "defaults: &d {x: 1, y: 2}\nthing: { <<: *d, y: 99 }\n",
        ));
        let doc = Document::load(&mut parser).unwrap();
        let root = doc.root_id().unwrap();
        let NodeData::Mapping { pairs, .. } = &doc.get_node(root).unwrap().data else {
            panic!("root is not a mapping");
        };
        let thing = pairs[1].value;
        let NodeData::Mapping { pairs: thing_pairs, .. } = &doc.get_node(thing).unwrap().data
        else {
            panic!("thing is not a mapping");
        };
        assert_eq!(thing_pairs.len(), 2);
        let keys: Vec<_> = thing_pairs
            .iter()
            .map(|p| scalar_text(&doc, p.key).unwrap())
            .collect();
        assert_eq!(keys, vec!["x", "y"]);
        let y = thing_pairs[1].value;
        assert_eq!(scalar_text(&doc, y), Some("99"));
    }

    #[test]
    fn merge_value_must_be_mapping_like() {
        let mut store = ValueStore::new();
        let err = store
            .parse_str("m: { <<: 5 }\n", ParseOptions::default())
            .unwrap_err();
        assert!(matches!(err, ComposerError::Problem { .. }));
    }

    #[test]
    fn self_alias_is_a_cycle_error() {
        let mut store = ValueStore::new();
        let err = store
            .parse_str("&a [ *a ]\n", ParseOptions::default())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("cycle"), "unexpected error: {message}");
    }

    #[test]
    fn forward_alias_is_undefined() {
        let mut store = ValueStore::new();
        let err = store
            .parse_str("a: *later\nlater: &later 1\n", ParseOptions::default())
            .unwrap_err();
        assert!(err.to_string().contains("undefined alias"));
    }

    #[test]
    fn anchor_redefinition_rebinds() {
        let (store, value) = value_of("a: &x 1\nb: *x\nc: &x 2\nd: *x\n");
        assert!(matches!(
            store.resolve_data(store.get_str(value, "b").unwrap()),
            ValueData::Int(1)
        ));
        assert!(matches!(
            store.resolve_data(store.get_str(value, "d").unwrap()),
            ValueData::Int(2)
        ));
    }

    #[test]
    fn strict_anchors_reject_redefinition() {
        let mut options = ParseOptions::default();
        options.strict_anchors = true;
        let mut store = ValueStore::new();
        let err = store.parse_str("a: &x 1\nc: &x 2\n", options).unwrap_err();
        assert!(err.to_string().contains("duplicate anchor"));
    }

    #[test]
    fn empty_document_is_null() {
        let (store, value) = value_of("---\n");
        assert!(matches!(store.resolve_data(value), ValueData::Null));
    }

    #[test]
    fn tree_and_value_forms_agree() {
        let input = "name: test\nitems: [1, 2.5, true]\nnested:\n  inner: value\n";
        let mut parser = Parser::new();
        parser.set_input(Input::from_str(input));
        let doc = Document::load(&mut parser).unwrap();
        let (store, value) = value_of(input);
        assert!(doc.matches_value(doc.root_id().unwrap(), &store, value));
    }
}
