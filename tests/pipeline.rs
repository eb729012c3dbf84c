//! End-to-end pipeline tests: parse → compose → emit → parse, across the
//! tree and generic value representations.

use anchorite::{
    parse_path, Document, EmitMode, EmitOptions, Event, EventData, Input, ParseOptions, Parser,
    ValueStore,
};
use indoc::indoc;
use pretty_assertions::assert_eq;

fn parse_into(store: &mut ValueStore, input: &str) -> anchorite::Value {
    store.parse_str(input, ParseOptions::default()).unwrap()
}

fn events_of(input: &str, options: ParseOptions) -> Vec<EventData> {
    let mut parser = Parser::with_options(options);
    parser.set_input(Input::from_str(input));
    let mut events = Vec::new();
    loop {
        let event = parser.parse().unwrap();
        let done = matches!(event.data, EventData::StreamEnd);
        events.push(event.data);
        if done {
            return events;
        }
    }
}

/// parse ∘ emit ∘ parse = parse: emitting a parsed value and re-parsing it
/// yields an equal structure.
#[test]
fn canonicalization_is_idempotent() {
    let inputs = [
        "a: 1\nb: [x, y, {deep: true}]\n",
        "- 1\n- two\n- 3.5\n- null\n",
        "text: |\n  line one\n  line two\n",
        "folded: >\n  joined\n  lines\n",
        "quoted: 'single'\nother: \"double\\ttab\"\n",
        "empty: {}\nlist: []\n",
    ];
    for input in inputs {
        let mut store = ValueStore::with_dedup();
        let first = parse_into(&mut store, input);
        let emitted = store.emit_string(first, &EmitOptions::default()).unwrap();
        let second = parse_into(&mut store, &emitted);
        assert!(
            store.equal(first, second),
            "canonical round trip changed structure for {input:?}: emitted {emitted:?}"
        );
    }
}

/// Emitting any value produced by parse succeeds, in every mode.
#[test]
fn every_parsed_value_emits() {
    let input = "a: &x [1, {b: 2.5}]\nc: *x\nd: !custom tagged\n";
    let mut store = ValueStore::with_dedup();
    let value = parse_into(&mut store, input);
    for mode in [
        EmitMode::Original,
        EmitMode::Block,
        EmitMode::Flow,
        EmitMode::FlowOneline,
        EmitMode::Json,
        EmitMode::JsonOneline,
        EmitMode::Pretty,
    ] {
        let mut options = EmitOptions::default();
        options.mode = mode;
        store
            .emit_string(value, &options)
            .unwrap_or_else(|err| panic!("emit failed in {mode:?}: {err}"));
    }
}

/// Structurally equal composites built through a dedup store share handles.
#[test]
fn dedup_collapses_equal_structures() {
    let mut store = ValueStore::with_dedup();
    let build = |store: &mut ValueStore| {
        let one = store.int(1);
        let a = store.string("a");
        let b = store.string("b");
        let inner_map = store.mapping(vec![(a, b)]);
        let two = store.int(2);
        let inner_seq = store.sequence(vec![two]);
        store.sequence(vec![one, inner_map, inner_seq])
    };
    let first = build(&mut store);
    let second = build(&mut store);
    assert_eq!(first, second);
    assert!(store.equal(first, second));
}

/// Tree and generic forms of an alias-free document agree.
#[test]
fn tree_and_value_representations_agree() {
    let input = indoc! {"
        server:
          host: localhost
          ports: [8080, 8081]
          tls: true
        paths:
        - /status
        - /metrics
    "};
    let mut parser = Parser::new();
    parser.set_input(Input::from_str(input));
    let document = Document::load(&mut parser).unwrap();
    let mut store = ValueStore::new();
    let value = parse_into(&mut store, input);
    assert!(document.matches_value(document.root_id().unwrap(), &store, value));
}

/// Mapping insertion order is preserved across parse → emit → parse.
#[test]
fn insertion_order_survives_round_trips() {
    let input = "zebra: 1\napple: 2\nmango: 3\nberry: 4\n";
    let mut store = ValueStore::new();
    let value = parse_into(&mut store, input);
    let emitted = store.emit_string(value, &EmitOptions::default()).unwrap();
    assert_eq!(emitted, input);
}

/// Nesting beyond the configured depth limit fails with a syntactic error.
#[test]
fn depth_limit_bounds_composition() {
    let mut options = ParseOptions::default();
    options.depth_limit = 4;
    let input = "a: [[[[[[1]]]]]]\n";
    let mut store = ValueStore::new();
    let err = store.parse_str(input, options).unwrap_err();
    assert!(err.to_string().contains("depth"));

    let mut options = ParseOptions::default();
    options.depth_limit = 64;
    let mut store = ValueStore::new();
    store.parse_str(input, options).unwrap();
}

/// get_at_path(set_at_path(v, p, x), p) == x.
#[test]
fn set_then_get_at_path() {
    let mut store = ValueStore::new();
    let root = parse_into(&mut store, "a:\n  b: [1, 2, 3]\n");
    let path = parse_path("/a/b/1");
    let replacement = store.string("replaced");
    let new_root = store.set_at_path(root, &path, replacement).unwrap();
    let got = store.get_at_path(new_root, &path).unwrap();
    assert!(store.equal(got, replacement));
}

/// Mapping length equals the distinct key count after merge resolution.
#[test]
fn merge_resolution_controls_len() {
    let input = indoc! {"
        base: &base {a: 1, b: 2, c: 3}
        derived:
          <<: *base
          b: 20
          d: 4
    "};
    let mut store = ValueStore::new();
    let value = parse_into(&mut store, input);
    let derived = store.get_str(value, "derived").unwrap();
    // a, b, c, d — the merge key itself is gone and b is not duplicated.
    assert_eq!(store.len(derived), 4);
    assert!(matches!(
        store.resolve_data(store.get_str(derived, "b").unwrap()),
        anchorite::ValueData::Int(20)
    ));
}

/// Scenario: anchors and aliases share a handle under dedup and round-trip
/// byte-identically in block mode.
#[test]
fn anchor_alias_scenario() {
    let input = "a: &x 1\nb: *x\n";
    let mut store = ValueStore::with_dedup();
    let value = parse_into(&mut store, input);
    let a = store.resolve(store.get_str(value, "a").unwrap());
    let b = store.resolve(store.get_str(value, "b").unwrap());
    assert_eq!(a, b);
    assert_eq!(
        store.emit_string(value, &EmitOptions::default()).unwrap(),
        input
    );
}

/// Scenario: flow input reproduces flow in original mode, block in
/// block-forced mode, and both re-parse to equal structure.
#[test]
fn flow_block_round_trip_scenario() {
    let input = "[1, 2, {a: b}]\n";
    let mut store = ValueStore::with_dedup();
    let value = parse_into(&mut store, input);

    let original = store.emit_string(value, &EmitOptions::default()).unwrap();
    assert_eq!(original, input);

    let mut block = EmitOptions::default();
    block.mode = EmitMode::Block;
    let block_output = store.emit_string(value, &block).unwrap();
    assert_eq!(block_output, "- 1\n- 2\n- a: b\n");

    let reparsed_flow = parse_into(&mut store, &original);
    let reparsed_block = parse_into(&mut store, &block_output);
    assert!(store.equal(value, reparsed_flow));
    assert!(store.equal(value, reparsed_block));
}

/// Scenario: JSON input parses in JSON mode, re-emits as JSON, and renders
/// as untagged YAML.
#[test]
fn json_scenario() {
    let input = r#"{"n": 1.5, "s": "hi", "l": [true, null]}"#;
    let mut options = ParseOptions::default();
    options.json = true;
    let mut store = ValueStore::new();
    let value = store.parse_str(input, options).unwrap();

    let mut json = EmitOptions::default();
    json.mode = EmitMode::JsonOneline;
    assert_eq!(
        store.emit_string(value, &json).unwrap(),
        "{\"n\":1.5,\"s\":\"hi\",\"l\":[true,null]}\n"
    );

    let yaml = store.emit_string(value, &EmitOptions::default()).unwrap();
    assert!(!yaml.contains("!!"), "yaml output should be untagged: {yaml}");
    let reparsed = parse_into(&mut store, &yaml);
    assert!(store.equal(value, reparsed));
}

/// Scenario: a self-referential anchor is a cycle error with no partial
/// result.
#[test]
fn cycle_error_scenario() {
    let mut store = ValueStore::new();
    let err = store
        .parse_str("&a [ *a ]\n", ParseOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

/// Scenario: set_at_path creates intermediate containers, with integer
/// components forcing sequences.
#[test]
fn path_creation_scenario() {
    let mut store = ValueStore::new();
    let root = store.parse_str("{}\n", ParseOptions::default()).unwrap();
    let forty_two = store.int(42);
    let new_root = store
        .set_at_path(root, &parse_path("/a/b"), forty_two)
        .unwrap();
    let emitted = store.emit_string(new_root, &EmitOptions::default()).unwrap();
    assert_eq!(emitted, "a:\n  b: 42\n");
}

/// Boundary: an empty explicit document has a null root.
#[test]
fn empty_document_boundary() {
    let mut store = ValueStore::new();
    let value = store.parse_str("---\n", ParseOptions::default()).unwrap();
    assert!(matches!(
        store.resolve_data(value),
        anchorite::ValueData::Null
    ));
}

/// Boundary: each document in a multi-document stream carries its own state.
#[test]
fn multi_document_boundary() {
    let input = "%YAML 1.1\n---\nfirst: yes\n...\n---\nsecond: yes\n";
    let events = events_of(input, ParseOptions::default());
    let versions: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            EventData::DocumentStart {
                version_directive, ..
            } => Some(*version_directive),
            _ => None,
        })
        .collect();
    assert_eq!(versions.len(), 2);
    assert!(versions[0].is_some());
    assert!(versions[1].is_none());

    // Documents compose independently: `yes` is a boolean only under the
    // first document's 1.1 directive.
    let mut parser = Parser::new();
    parser.set_input(Input::from_str(input));
    let mut store = ValueStore::new();
    let first = store.build_from(&mut parser).unwrap().unwrap();
    let second = store.build_from(&mut parser).unwrap().unwrap();
    assert!(store.build_from(&mut parser).unwrap().is_none());
    assert!(matches!(
        store.resolve_data(store.get_str(first, "first").unwrap()),
        anchorite::ValueData::Bool(true)
    ));
    assert!(matches!(
        store.resolve_data(store.get_str(second, "second").unwrap()),
        anchorite::ValueData::Str("yes")
    ));
}

/// Boundary: a plain scalar longer than the width folds instead of being
/// truncated, and still re-parses to the same text.
#[test]
fn width_overflow_restyles_not_truncates() {
    let long = "word ".repeat(40);
    let long = long.trim_end();
    let mut store = ValueStore::new();
    let value = store.string(long);
    let mut options = EmitOptions::default();
    options.width = 20;
    let emitted = store.emit_string(value, &options).unwrap();
    let mut reparse_store = ValueStore::new();
    let reparsed = reparse_store
        .parse_str(&emitted, ParseOptions::default())
        .unwrap();
    assert!(matches!(
        reparse_store.resolve_data(reparse_store.resolve(reparsed)),
        anchorite::ValueData::Str(text) if text == long
    ));
}

/// Comments survive a round trip when both capture and output are on.
#[test]
fn comment_round_trip() {
    let input = "# configuration\nkey: value\n";
    let mut options = ParseOptions::default();
    options.capture_comments = true;
    let mut store = ValueStore::new();
    let value = store.parse_str(input, options).unwrap();
    let mut emit = EmitOptions::default();
    emit.output_comments = true;
    let emitted = store.emit_string(value, &emit).unwrap();
    assert_eq!(emitted, input);
}

/// The emitter rejects events after STREAM-END.
#[test]
fn emitter_is_strict_about_stream_shape() {
    let mut output = Vec::new();
    let mut emitter = anchorite::Emitter::new();
    emitter.set_output(&mut output);
    emitter.emit(Event::stream_start()).unwrap();
    emitter.emit(Event::stream_end()).unwrap();
    assert!(emitter.emit(Event::stream_start()).is_err());
}
