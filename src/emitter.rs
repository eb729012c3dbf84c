use std::collections::VecDeque;

use crate::chars::{is_alpha, is_ascii, is_blank, is_blankz, is_bom, is_break, is_breakz, is_printable, is_space};
use crate::error::{EmitterError, WriterError};
use crate::event::{Event, EventData};
use crate::{Break, MappingStyle, ScalarStyle, SequenceStyle, TagDirective, VersionDirective};

pub(crate) const OUTPUT_BUFFER_SIZE: usize = 16384;

/// Output form selection.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum EmitMode {
    /// Honor the style each event carries.
    #[default]
    Original,
    /// Force block style onto collections.
    Block,
    /// Force flow style onto collections.
    Flow,
    /// Force flow style and keep everything on one line.
    FlowOneline,
    /// RFC 8259 JSON; non-JSON scalars are quoted, mapping keys coerced to
    /// strings.
    Json,
    /// JSON without any whitespace.
    JsonOneline,
    /// JSON that re-renders resolved numbers canonically and rejects
    /// non-string mapping keys instead of coercing them.
    JsonTypePreserving,
    /// Pretty block YAML for JSON inputs.
    Pretty,
}

impl EmitMode {
    pub(crate) fn is_json(self) -> bool {
        matches!(self, EmitMode::Json | EmitMode::JsonOneline | EmitMode::JsonTypePreserving)
    }

    fn forces_flow(self) -> bool {
        matches!(self, EmitMode::Flow | EmitMode::FlowOneline)
    }

    fn forces_block(self) -> bool {
        matches!(self, EmitMode::Block | EmitMode::Pretty)
    }
}

/// Three-state policy for optional syntax.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum MarkerPolicy {
    /// Emit when the event stream asks for it.
    #[default]
    Auto,
    /// Never emit.
    Off,
    /// Always emit.
    On,
}

/// Emitter configuration, threaded through the constructor.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct EmitOptions {
    pub mode: EmitMode,
    /// Indentation increment, clamped to 1..=9.
    pub indent: i32,
    /// Preferred line width; 0 (or anything at least 255) means unbounded.
    pub width: i32,
    /// `---`/`...` document marker policy.
    pub doc_markers: MarkerPolicy,
    /// `%YAML`/`%TAG` directive emission policy.
    pub directives: MarkerPolicy,
    /// Order mapping keys lexicographically (applied while serializing
    /// values; the event emitter itself writes keys in arrival order).
    pub sort_keys: bool,
    /// Drop anchors and aliases from the output.
    pub strip_anchors: bool,
    /// Drop tags from the output.
    pub strip_tags: bool,
    /// Drop document markers and directives entirely.
    pub strip_docs: bool,
    /// Write captured comments back out.
    pub output_comments: bool,
    /// End the stream with a newline.
    pub trailing_newline: bool,
    /// Allow unescaped non-ASCII characters.
    pub unicode: bool,
    /// Line break style.
    pub line_break: Break,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            mode: EmitMode::default(),
            indent: 2,
            width: 80,
            doc_markers: MarkerPolicy::default(),
            directives: MarkerPolicy::default(),
            sort_keys: false,
            strip_anchors: false,
            strip_tags: false,
            strip_docs: false,
            output_comments: false,
            trailing_newline: true,
            unicode: false,
            line_break: Break::default(),
        }
    }
}

#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
enum EmitterState {
    /// Expect STREAM-START.
    #[default]
    StreamStart,
    /// Expect the first DOCUMENT-START or STREAM-END.
    FirstDocumentStart,
    /// Expect DOCUMENT-START or STREAM-END.
    DocumentStart,
    /// Expect the content of a document.
    DocumentContent,
    /// Expect DOCUMENT-END.
    DocumentEnd,
    /// Expect the first item of a flow sequence.
    FlowSequenceFirstItem,
    /// Expect an item of a flow sequence.
    FlowSequenceItem,
    /// Expect the first key of a flow mapping.
    FlowMappingFirstKey,
    /// Expect a key of a flow mapping.
    FlowMappingKey,
    /// Expect a value for a simple key of a flow mapping.
    FlowMappingSimpleValue,
    /// Expect a value of a flow mapping.
    FlowMappingValue,
    /// Expect the first item of a block sequence.
    BlockSequenceFirstItem,
    /// Expect an item of a block sequence.
    BlockSequenceItem,
    /// Expect the first key of a block mapping.
    BlockMappingFirstKey,
    /// Expect the key of a block mapping.
    BlockMappingKey,
    /// Expect a value for a simple key of a block mapping.
    BlockMappingSimpleValue,
    /// Expect a value of a block mapping.
    BlockMappingValue,
    /// Expect nothing.
    End,
}

#[derive(Default)]
struct Analysis<'a> {
    anchor: Option<AnchorAnalysis<'a>>,
    tag: Option<TagAnalysis<'a>>,
    scalar: Option<ScalarAnalysis<'a>>,
}

struct AnchorAnalysis<'a> {
    anchor: &'a str,
    alias: bool,
}

struct TagAnalysis<'a> {
    handle: &'a str,
    suffix: &'a str,
}

struct ScalarAnalysis<'a> {
    /// The scalar value.
    value: &'a str,
    /// Does the scalar contain line breaks?
    multiline: bool,
    /// Can the scalar be expressed in the flow plain style?
    flow_plain_allowed: bool,
    /// Can the scalar be expressed in the block plain style?
    block_plain_allowed: bool,
    /// Can the scalar be expressed in the single quoted style?
    single_quoted_allowed: bool,
    /// Can the scalar be expressed in the literal or folded styles?
    block_allowed: bool,
    /// The output style.
    style: ScalarStyle,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum JsonContext {
    Sequence,
    Mapping,
}

struct JsonFrame {
    context: JsonContext,
    /// Number of children written so far; in mappings a key and its value
    /// count as one entry once complete.
    count: usize,
    /// A key was written and the value is pending.
    expect_value: bool,
}

/// The emitter: accepts the canonical event stream and serializes YAML or
/// JSON to a writer.
pub struct Emitter<'w> {
    write_handler: Option<&'w mut dyn std::io::Write>,
    options: EmitOptions,
    buffer: String,
    states: Vec<EmitterState>,
    state: EmitterState,
    events: VecDeque<Event>,
    indents: Vec<i32>,
    indent: i32,
    flow_level: i32,
    root_context: bool,
    sequence_context: bool,
    mapping_context: bool,
    simple_key_context: bool,
    line: i32,
    column: i32,
    whitespace: bool,
    indention: bool,
    open_ended: i32,
    pub(crate) opened: bool,
    pub(crate) closed: bool,
    tag_directives: Vec<TagDirective>,
    best_indent: i32,
    best_width: i32,
    line_break: Break,
    json_stack: Vec<JsonFrame>,
    json_document_done: bool,
}

impl<'w> Default for Emitter<'w> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'w> Emitter<'w> {
    /// Create an emitter with default options.
    pub fn new() -> Emitter<'w> {
        Self::with_options(EmitOptions::default())
    }

    /// Create an emitter with explicit options.
    pub fn with_options(options: EmitOptions) -> Emitter<'w> {
        let best_indent = if (1..=9).contains(&options.indent) {
            options.indent
        } else {
            2
        };
        let best_width = if matches!(options.mode, EmitMode::FlowOneline | EmitMode::JsonOneline)
            || options.width <= 0
            || options.width >= 255
        {
            i32::MAX
        } else if options.width <= best_indent * 2 {
            80
        } else {
            options.width
        };
        let line_break = if options.line_break == Break::Any {
            Break::Ln
        } else {
            options.line_break
        };
        Emitter {
            write_handler: None,
            options,
            buffer: String::with_capacity(OUTPUT_BUFFER_SIZE),
            states: Vec::with_capacity(16),
            state: EmitterState::default(),
            events: VecDeque::with_capacity(16),
            indents: Vec::with_capacity(16),
            indent: -1,
            flow_level: 0,
            root_context: false,
            sequence_context: false,
            mapping_context: false,
            simple_key_context: false,
            line: 0,
            column: 0,
            whitespace: true,
            indention: true,
            open_ended: 0,
            opened: false,
            closed: false,
            tag_directives: Vec::with_capacity(16),
            best_indent,
            best_width,
            line_break,
            json_stack: Vec::new(),
            json_document_done: false,
        }
    }

    /// Reset the emitter, keeping the options.
    pub fn reset(&mut self) {
        *self = Self::with_options(self.options.clone());
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Direct the output to a writer.
    pub fn set_output(&mut self, writer: &'w mut dyn std::io::Write) {
        assert!(self.write_handler.is_none(), "output is already set");
        self.write_handler = Some(writer);
    }

    /// Flush the accumulated characters to the output.
    pub fn flush(&mut self) -> Result<(), WriterError> {
        assert!(self.write_handler.is_some(), "no output set");
        if self.buffer.is_empty() {
            return Ok(());
        }
        log::trace!("flushing {} bytes of output", self.buffer.len());
        self.write_handler
            .as_mut()
            .expect("output was checked")
            .write_all(self.buffer.as_bytes())?;
        self.buffer.clear();
        Ok(())
    }

    /// Emit an event. The emitter takes ownership of the event; some events
    /// are buffered until enough lookahead exists to pick a form.
    pub fn emit(&mut self, event: Event) -> Result<(), EmitterError> {
        if self.options.mode.is_json() {
            return self.json_emit(event);
        }
        self.events.push_back(event);
        while let Some(event) = self.next_emittable_event() {
            let tag_directives = core::mem::take(&mut self.tag_directives);
            let mut analysis = self.analyze_event(&event, &tag_directives)?;
            self.state_machine(&event, &mut analysis)?;
            // The DOCUMENT-START event repopulates the tag directives; keep
            // them in that case.
            if self.tag_directives.is_empty() {
                self.tag_directives = tag_directives;
            }
        }
        Ok(())
    }

    /// An event can be processed once we know whether its collection is
    /// empty and whether it fits a simple key.
    fn next_emittable_event(&mut self) -> Option<Event> {
        let first = self.events.front()?;
        let accumulate = match &first.data {
            EventData::DocumentStart { .. } => 1,
            EventData::SequenceStart { .. } => 2,
            EventData::MappingStart { .. } => 3,
            _ => return self.events.pop_front(),
        };
        if self.events.len() > accumulate {
            return self.events.pop_front();
        }
        let mut level = 0;
        for event in &self.events {
            match event.data {
                EventData::StreamStart
                | EventData::DocumentStart { .. }
                | EventData::SequenceStart { .. }
                | EventData::MappingStart { .. } => level += 1,
                EventData::StreamEnd
                | EventData::DocumentEnd { .. }
                | EventData::SequenceEnd
                | EventData::MappingEnd => level -= 1,
                _ => {}
            }
            if level == 0 {
                return self.events.pop_front();
            }
        }
        None
    }

    fn error<T>(problem: &'static str) -> Result<T, EmitterError> {
        Err(EmitterError::Problem(problem))
    }

    fn state_machine<'a>(
        &mut self,
        event: &'a Event,
        analysis: &mut Analysis<'a>,
    ) -> Result<(), EmitterError> {
        match self.state {
            EmitterState::StreamStart => self.emit_stream_start(event),
            EmitterState::FirstDocumentStart => self.emit_document_start(event, true),
            EmitterState::DocumentStart => self.emit_document_start(event, false),
            EmitterState::DocumentContent => self.emit_document_content(event, analysis),
            EmitterState::DocumentEnd => self.emit_document_end(event),
            EmitterState::FlowSequenceFirstItem => {
                self.emit_flow_sequence_item(event, true, analysis)
            }
            EmitterState::FlowSequenceItem => self.emit_flow_sequence_item(event, false, analysis),
            EmitterState::FlowMappingFirstKey => self.emit_flow_mapping_key(event, true, analysis),
            EmitterState::FlowMappingKey => self.emit_flow_mapping_key(event, false, analysis),
            EmitterState::FlowMappingSimpleValue => {
                self.emit_flow_mapping_value(event, true, analysis)
            }
            EmitterState::FlowMappingValue => self.emit_flow_mapping_value(event, false, analysis),
            EmitterState::BlockSequenceFirstItem => {
                self.emit_block_sequence_item(event, true, analysis)
            }
            EmitterState::BlockSequenceItem => {
                self.emit_block_sequence_item(event, false, analysis)
            }
            EmitterState::BlockMappingFirstKey => {
                self.emit_block_mapping_key(event, true, analysis)
            }
            EmitterState::BlockMappingKey => self.emit_block_mapping_key(event, false, analysis),
            EmitterState::BlockMappingSimpleValue => {
                self.emit_block_mapping_value(event, true, analysis)
            }
            EmitterState::BlockMappingValue => self.emit_block_mapping_value(event, false, analysis),
            EmitterState::End => Self::error("expected nothing after STREAM-END"),
        }
    }

    fn emit_stream_start(&mut self, event: &Event) -> Result<(), EmitterError> {
        self.open_ended = 0;
        if let EventData::StreamStart = &event.data {
            self.indent = -1;
            self.line = 0;
            self.column = 0;
            self.whitespace = true;
            self.indention = true;
            self.state = EmitterState::FirstDocumentStart;
            return Ok(());
        }
        Self::error("expected STREAM-START")
    }

    fn emit_document_start(&mut self, event: &Event, first: bool) -> Result<(), EmitterError> {
        if let EventData::DocumentStart {
            version_directive,
            tag_directives,
            implicit,
        } = &event.data
        {
            let default_tag_directives: [TagDirective; 2] = [
                TagDirective {
                    handle: String::from("!"),
                    prefix: String::from("!"),
                },
                TagDirective {
                    handle: String::from("!!"),
                    prefix: String::from("tag:yaml.org,2002:"),
                },
            ];
            let write_directives = !self.options.strip_docs
                && match self.options.directives {
                    MarkerPolicy::Auto => {
                        version_directive.is_some() || !tag_directives.is_empty()
                    }
                    MarkerPolicy::Off => false,
                    MarkerPolicy::On => true,
                };
            let mut implicit = *implicit;
            if let Some(version_directive) = version_directive {
                Self::analyze_version_directive(*version_directive)?;
            }
            for tag_directive in tag_directives {
                Self::analyze_tag_directive(tag_directive)?;
                self.append_tag_directive(tag_directive.clone(), false)?;
            }
            for tag_directive in default_tag_directives {
                self.append_tag_directive(tag_directive, true)?;
            }
            match self.options.doc_markers {
                MarkerPolicy::Auto => {
                    if !first {
                        implicit = false;
                    }
                }
                MarkerPolicy::Off => implicit = true,
                MarkerPolicy::On => implicit = false,
            }
            if self.options.strip_docs {
                implicit = true;
            }
            if write_directives && self.open_ended != 0 {
                self.write_indicator("...", true, false, false)?;
                self.write_indent()?;
            }
            self.open_ended = 0;
            if write_directives {
                if let Some(version_directive) = version_directive {
                    implicit = false;
                    self.write_indicator("%YAML", true, false, false)?;
                    if version_directive.minor == 1 {
                        self.write_indicator("1.1", true, false, false)?;
                    } else {
                        self.write_indicator("1.2", true, false, false)?;
                    }
                    self.write_indent()?;
                } else if self.options.directives == MarkerPolicy::On {
                    implicit = false;
                    self.write_indicator("%YAML", true, false, false)?;
                    self.write_indicator("1.2", true, false, false)?;
                    self.write_indent()?;
                }
                if !tag_directives.is_empty() {
                    implicit = false;
                    for tag_directive in tag_directives {
                        self.write_indicator("%TAG", true, false, false)?;
                        self.write_tag_handle(&tag_directive.handle)?;
                        self.write_tag_content(&tag_directive.prefix, true)?;
                        self.write_indent()?;
                    }
                }
            }
            if !implicit {
                self.write_indent()?;
                self.write_indicator("---", true, false, false)?;
            }
            self.state = EmitterState::DocumentContent;
            self.open_ended = 0;
            return Ok(());
        }
        if let EventData::StreamEnd = &event.data {
            if self.open_ended == 2 {
                self.write_indicator("...", true, false, false)?;
                self.open_ended = 0;
                self.write_indent()?;
            }
            if !self.options.trailing_newline {
                while self.buffer.ends_with('\n') || self.buffer.ends_with('\r') {
                    self.buffer.pop();
                }
            }
            self.flush()?;
            self.state = EmitterState::End;
            return Ok(());
        }
        Self::error("expected DOCUMENT-START or STREAM-END")
    }

    fn emit_document_content(
        &mut self,
        event: &Event,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        self.states.push(EmitterState::DocumentEnd);
        self.emit_node(event, true, false, false, false, analysis)
    }

    fn emit_document_end(&mut self, event: &Event) -> Result<(), EmitterError> {
        if let EventData::DocumentEnd { implicit } = &event.data {
            let implicit = match self.options.doc_markers {
                MarkerPolicy::Auto => *implicit,
                MarkerPolicy::Off => true,
                MarkerPolicy::On => false,
            } || self.options.strip_docs;
            self.write_indent()?;
            if !implicit {
                self.write_indicator("...", true, false, false)?;
                self.open_ended = 0;
                self.write_indent()?;
            } else if self.open_ended == 0 {
                self.open_ended = 1;
            }
            // With the trailing newline suppressed the final break must stay
            // in the buffer until STREAM-END trims it.
            if self.options.trailing_newline {
                self.flush()?;
            }
            self.state = EmitterState::DocumentStart;
            self.tag_directives.clear();
            return Ok(());
        }
        Self::error("expected DOCUMENT-END")
    }

    fn emit_flow_sequence_item(
        &mut self,
        event: &Event,
        first: bool,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        if first {
            self.write_indicator("[", true, true, false)?;
            self.increase_indent(true, false);
            self.flow_level += 1;
        }
        if let EventData::SequenceEnd = &event.data {
            self.flow_level -= 1;
            self.indent = self.indents.pop().expect("indent stack is empty");
            self.write_indicator("]", false, false, false)?;
            self.state = self.states.pop().expect("state stack is empty");
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.column > self.best_width {
            self.write_indent()?;
        }
        self.states.push(EmitterState::FlowSequenceItem);
        self.emit_node(event, false, true, false, false, analysis)
    }

    fn emit_flow_mapping_key(
        &mut self,
        event: &Event,
        first: bool,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        if first {
            self.write_indicator("{", true, true, false)?;
            self.increase_indent(true, false);
            self.flow_level += 1;
        }
        if let EventData::MappingEnd = &event.data {
            self.flow_level -= 1;
            self.indent = self.indents.pop().expect("indent stack is empty");
            self.write_indicator("}", false, false, false)?;
            self.state = self.states.pop().expect("state stack is empty");
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false)?;
        }
        if self.column > self.best_width {
            self.write_indent()?;
        }
        if self.check_simple_key(event, analysis) {
            self.states.push(EmitterState::FlowMappingSimpleValue);
            self.emit_node(event, false, false, true, true, analysis)
        } else {
            self.write_indicator("?", true, false, false)?;
            self.states.push(EmitterState::FlowMappingValue);
            self.emit_node(event, false, false, true, false, analysis)
        }
    }

    fn emit_flow_mapping_value(
        &mut self,
        event: &Event,
        simple: bool,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        if simple {
            self.write_indicator(":", false, false, false)?;
        } else {
            if self.column > self.best_width {
                self.write_indent()?;
            }
            self.write_indicator(":", true, false, false)?;
        }
        self.states.push(EmitterState::FlowMappingKey);
        self.emit_node(event, false, false, true, false, analysis)
    }

    fn emit_block_sequence_item(
        &mut self,
        event: &Event,
        first: bool,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        if first {
            self.increase_indent(false, self.mapping_context && !self.indention);
        }
        if let EventData::SequenceEnd = &event.data {
            self.indent = self.indents.pop().expect("indent stack is empty");
            self.state = self.states.pop().expect("state stack is empty");
            return Ok(());
        }
        self.write_comment_for(event)?;
        self.write_indent()?;
        self.write_indicator("-", true, false, true)?;
        self.states.push(EmitterState::BlockSequenceItem);
        self.emit_node(event, false, true, false, false, analysis)
    }

    fn emit_block_mapping_key(
        &mut self,
        event: &Event,
        first: bool,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        if first {
            self.increase_indent(false, false);
        }
        if let EventData::MappingEnd = &event.data {
            self.indent = self.indents.pop().expect("indent stack is empty");
            self.state = self.states.pop().expect("state stack is empty");
            return Ok(());
        }
        self.write_comment_for(event)?;
        self.write_indent()?;
        if self.check_simple_key(event, analysis) {
            self.states.push(EmitterState::BlockMappingSimpleValue);
            self.emit_node(event, false, false, true, true, analysis)
        } else {
            self.write_indicator("?", true, false, true)?;
            self.states.push(EmitterState::BlockMappingValue);
            self.emit_node(event, false, false, true, false, analysis)
        }
    }

    fn emit_block_mapping_value(
        &mut self,
        event: &Event,
        simple: bool,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        if simple {
            self.write_indicator(":", false, false, false)?;
        } else {
            self.write_indent()?;
            self.write_indicator(":", true, false, true)?;
        }
        self.states.push(EmitterState::BlockMappingKey);
        self.emit_node(event, false, false, true, false, analysis)
    }

    fn emit_node(
        &mut self,
        event: &Event,
        root: bool,
        sequence: bool,
        mapping: bool,
        simple_key: bool,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        self.root_context = root;
        self.sequence_context = sequence;
        self.mapping_context = mapping;
        self.simple_key_context = simple_key;
        if root && self.flow_level == 0 {
            self.write_comment_for(event)?;
        }

        match event.data {
            EventData::Alias { .. } => self.emit_alias(&analysis.anchor),
            EventData::Scalar { .. } => self.emit_scalar(event, analysis),
            EventData::SequenceStart { .. } => self.emit_sequence_start(event, analysis),
            EventData::MappingStart { .. } => self.emit_mapping_start(event, analysis),
            _ => Self::error("expected SCALAR, SEQUENCE-START, MAPPING-START, or ALIAS"),
        }
    }

    fn emit_alias(&mut self, analysis: &Option<AnchorAnalysis<'_>>) -> Result<(), EmitterError> {
        if self.options.strip_anchors {
            return Self::error("aliases cannot be emitted when anchors are stripped");
        }
        self.process_anchor(analysis)?;
        if self.simple_key_context {
            self.put(' ')?;
        }
        self.state = self.states.pop().expect("state stack is empty");
        Ok(())
    }

    fn emit_scalar(
        &mut self,
        event: &Event,
        analysis: &mut Analysis<'_>,
    ) -> Result<(), EmitterError> {
        let Analysis {
            anchor,
            tag,
            scalar: Some(scalar),
        } = analysis
        else {
            unreachable!("no scalar analysis");
        };
        Self::select_scalar_style(event, scalar, tag, self.simple_key_context, self.flow_level != 0)?;
        self.process_anchor(anchor)?;
        self.process_tag(tag)?;
        self.increase_indent(true, false);
        self.process_scalar(scalar)?;
        self.indent = self.indents.pop().expect("indent stack is empty");
        self.state = self.states.pop().expect("state stack is empty");
        Ok(())
    }

    fn emit_sequence_start(
        &mut self,
        event: &Event,
        analysis: &Analysis<'_>,
    ) -> Result<(), EmitterError> {
        let Analysis { anchor, tag, .. } = analysis;
        self.process_anchor(anchor)?;
        self.process_tag(tag)?;
        let EventData::SequenceStart { style, .. } = &event.data else {
            unreachable!()
        };
        let flow = self.collection_flow(*style == SequenceStyle::Flow)
            || self.check_empty_sequence(event);
        self.state = if flow {
            EmitterState::FlowSequenceFirstItem
        } else {
            EmitterState::BlockSequenceFirstItem
        };
        Ok(())
    }

    fn emit_mapping_start(
        &mut self,
        event: &Event,
        analysis: &Analysis<'_>,
    ) -> Result<(), EmitterError> {
        let Analysis { anchor, tag, .. } = analysis;
        self.process_anchor(anchor)?;
        self.process_tag(tag)?;
        let EventData::MappingStart { style, .. } = &event.data else {
            unreachable!()
        };
        let flow =
            self.collection_flow(*style == MappingStyle::Flow) || self.check_empty_mapping(event);
        self.state = if flow {
            EmitterState::FlowMappingFirstKey
        } else {
            EmitterState::BlockMappingFirstKey
        };
        Ok(())
    }

    /// Whether a collection should render in flow form, considering the
    /// forcing mode and the enclosing context.
    fn collection_flow(&self, event_flow: bool) -> bool {
        if self.flow_level != 0 {
            return true;
        }
        if self.options.mode.forces_flow() {
            return true;
        }
        if self.options.mode.forces_block() {
            return false;
        }
        event_flow
    }

    fn check_empty_sequence(&self, event: &Event) -> bool {
        if self.events.is_empty() {
            return false;
        }
        matches!(event.data, EventData::SequenceStart { .. })
            && matches!(self.events[0].data, EventData::SequenceEnd)
    }

    fn check_empty_mapping(&self, event: &Event) -> bool {
        if self.events.is_empty() {
            return false;
        }
        matches!(event.data, EventData::MappingStart { .. })
            && matches!(self.events[0].data, EventData::MappingEnd)
    }

    fn check_simple_key(&self, event: &Event, analysis: &Analysis<'_>) -> bool {
        let Analysis {
            tag,
            anchor,
            scalar,
        } = analysis;
        let mut length = anchor.as_ref().map_or(0, |a| a.anchor.len())
            + tag.as_ref().map_or(0, |t| t.handle.len() + t.suffix.len());
        match event.data {
            EventData::Alias { .. } => {
                length = anchor.as_ref().map_or(0, |a| a.anchor.len());
            }
            EventData::Scalar { .. } => {
                let Some(scalar) = scalar else {
                    panic!("no analysis for scalar")
                };
                if scalar.multiline {
                    return false;
                }
                length += scalar.value.len();
            }
            EventData::SequenceStart { .. } => {
                if !self.check_empty_sequence(event) {
                    return false;
                }
            }
            EventData::MappingStart { .. } => {
                if !self.check_empty_mapping(event) {
                    return false;
                }
            }
            _ => return false,
        }
        length <= 128
    }

    fn select_scalar_style(
        event: &Event,
        scalar: &mut ScalarAnalysis<'_>,
        tag: &mut Option<TagAnalysis<'_>>,
        simple_key_context: bool,
        in_flow: bool,
    ) -> Result<(), EmitterError> {
        let EventData::Scalar {
            plain_implicit,
            quoted_implicit,
            style,
            ..
        } = &event.data
        else {
            unreachable!()
        };
        let mut style = *style;
        let no_tag = tag.is_none();
        if no_tag && !*plain_implicit && !*quoted_implicit {
            return Self::error("neither tag nor implicit flags are specified");
        }
        if style == ScalarStyle::Any {
            style = ScalarStyle::Plain;
        }
        if simple_key_context && scalar.multiline {
            style = ScalarStyle::DoubleQuoted;
        }
        if style == ScalarStyle::Plain {
            if in_flow && !scalar.flow_plain_allowed || !in_flow && !scalar.block_plain_allowed {
                style = ScalarStyle::SingleQuoted;
            }
            if scalar.value.is_empty() && (in_flow || simple_key_context) {
                style = ScalarStyle::SingleQuoted;
            }
            if no_tag && !*plain_implicit {
                style = ScalarStyle::SingleQuoted;
            }
        }
        if style == ScalarStyle::SingleQuoted && !scalar.single_quoted_allowed {
            style = ScalarStyle::DoubleQuoted;
        }
        if (style == ScalarStyle::Literal || style == ScalarStyle::Folded)
            && (!scalar.block_allowed || in_flow || simple_key_context)
        {
            style = ScalarStyle::DoubleQuoted;
        }
        if no_tag && !*quoted_implicit && style != ScalarStyle::Plain {
            *tag = Some(TagAnalysis {
                handle: "!",
                suffix: "",
            });
        }
        scalar.style = style;
        Ok(())
    }

    fn process_anchor(&mut self, analysis: &Option<AnchorAnalysis<'_>>) -> Result<(), EmitterError> {
        let Some(analysis) = analysis.as_ref() else {
            return Ok(());
        };
        if self.options.strip_anchors && !analysis.alias {
            return Ok(());
        }
        self.write_indicator(if analysis.alias { "*" } else { "&" }, true, false, false)?;
        self.write_anchor(analysis.anchor)
    }

    fn process_tag(&mut self, analysis: &Option<TagAnalysis<'_>>) -> Result<(), EmitterError> {
        let Some(analysis) = analysis.as_ref() else {
            return Ok(());
        };
        if self.options.strip_tags {
            return Ok(());
        }
        if analysis.handle.is_empty() && analysis.suffix.is_empty() {
            return Ok(());
        }
        if analysis.handle.is_empty() {
            self.write_indicator("!<", true, false, false)?;
            self.write_tag_content(analysis.suffix, false)?;
            self.write_indicator(">", false, false, false)?;
        } else {
            self.write_tag_handle(analysis.handle)?;
            if !analysis.suffix.is_empty() {
                self.write_tag_content(analysis.suffix, false)?;
            }
        }
        Ok(())
    }

    fn process_scalar(&mut self, analysis: &ScalarAnalysis<'_>) -> Result<(), EmitterError> {
        match analysis.style {
            ScalarStyle::Plain => self.write_plain_scalar(analysis.value, !self.simple_key_context),
            ScalarStyle::SingleQuoted => {
                self.write_single_quoted_scalar(analysis.value, !self.simple_key_context)
            }
            ScalarStyle::DoubleQuoted => {
                self.write_double_quoted_scalar(analysis.value, !self.simple_key_context)
            }
            ScalarStyle::Literal => self.write_literal_scalar(analysis.value),
            ScalarStyle::Folded => self.write_folded_scalar(analysis.value),
            ScalarStyle::Any => unreachable!("no scalar style chosen"),
        }
    }

    fn analyze_version_directive(version: VersionDirective) -> Result<(), EmitterError> {
        if version.major != 1 || version.minor > 3 {
            return Self::error("incompatible %YAML directive");
        }
        Ok(())
    }

    fn analyze_tag_directive(tag_directive: &TagDirective) -> Result<(), EmitterError> {
        if tag_directive.handle.is_empty() {
            return Self::error("tag handle must not be empty");
        }
        if !tag_directive.handle.starts_with('!') {
            return Self::error("tag handle must start with '!'");
        }
        if !tag_directive.handle.ends_with('!') {
            return Self::error("tag handle must end with '!'");
        }
        if tag_directive.handle.len() > 2 {
            let content = &tag_directive.handle[1..tag_directive.handle.len() - 1];
            if !content.chars().all(is_alpha) {
                return Self::error("tag handle must contain alphanumerical characters only");
            }
        }
        if tag_directive.prefix.is_empty() {
            return Self::error("tag prefix must not be empty");
        }
        Ok(())
    }

    fn analyze_anchor<'a>(anchor: &'a str, alias: bool) -> Result<AnchorAnalysis<'a>, EmitterError> {
        if anchor.is_empty() {
            return Self::error(if alias {
                "alias value must not be empty"
            } else {
                "anchor value must not be empty"
            });
        }
        if !anchor.chars().all(is_alpha) {
            return Self::error(if alias {
                "alias value must contain alphanumerical characters only"
            } else {
                "anchor value must contain alphanumerical characters only"
            });
        }
        Ok(AnchorAnalysis { anchor, alias })
    }

    fn analyze_tag<'a>(
        tag: &'a str,
        tag_directives: &'a [TagDirective],
    ) -> Result<TagAnalysis<'a>, EmitterError> {
        if tag.is_empty() {
            return Self::error("tag value must not be empty");
        }
        let mut handle = "";
        let mut suffix = tag;
        for tag_directive in tag_directives {
            let prefix_len = tag_directive.prefix.len();
            if prefix_len < tag.len() && tag_directive.prefix == tag[0..prefix_len] {
                handle = &tag_directive.handle;
                suffix = &tag[prefix_len..];
                break;
            }
        }
        Ok(TagAnalysis { handle, suffix })
    }

    fn analyze_scalar<'a>(&self, value: &'a str) -> ScalarAnalysis<'a> {
        let mut block_indicators = false;
        let mut flow_indicators = false;
        let mut line_breaks = false;
        let mut special_characters = false;
        let mut leading_space = false;
        let mut leading_break = false;
        let mut trailing_space = false;
        let mut trailing_break = false;
        let mut break_space = false;
        let mut space_break = false;
        let mut preceded_by_whitespace = true;
        let mut previous_space = false;
        let mut previous_break = false;

        if value.is_empty() {
            return ScalarAnalysis {
                value: "",
                multiline: false,
                flow_plain_allowed: false,
                block_plain_allowed: true,
                single_quoted_allowed: true,
                block_allowed: false,
                style: ScalarStyle::Any,
            };
        }

        if value.starts_with("---") || value.starts_with("...") {
            block_indicators = true;
            flow_indicators = true;
        }

        let mut chars = value.chars();
        let mut first = true;
        while let Some(ch) = chars.next() {
            let next = chars.clone().next();
            let followed_by_whitespace = is_blankz(next);
            if first {
                match ch {
                    '#' | ',' | '[' | ']' | '{' | '}' | '&' | '*' | '!' | '|' | '>' | '\''
                    | '"' | '%' | '@' | '`' => {
                        flow_indicators = true;
                        block_indicators = true;
                    }
                    '?' | ':' => {
                        flow_indicators = true;
                        if followed_by_whitespace {
                            block_indicators = true;
                        }
                    }
                    '-' if followed_by_whitespace => {
                        flow_indicators = true;
                        block_indicators = true;
                    }
                    _ => {}
                }
            } else {
                match ch {
                    ',' | '?' | '[' | ']' | '{' | '}' => flow_indicators = true,
                    ':' => {
                        flow_indicators = true;
                        if followed_by_whitespace {
                            block_indicators = true;
                        }
                    }
                    '#' if preceded_by_whitespace => {
                        flow_indicators = true;
                        block_indicators = true;
                    }
                    _ => {}
                }
            }

            if !is_printable(ch) || !is_ascii(ch) && !self.options.unicode {
                special_characters = true;
            }
            if is_break(ch) {
                line_breaks = true;
            }

            if is_space(ch) {
                if first {
                    leading_space = true;
                }
                if next.is_none() {
                    trailing_space = true;
                }
                if previous_break {
                    break_space = true;
                }
                previous_space = true;
                previous_break = false;
            } else if is_break(ch) {
                if first {
                    leading_break = true;
                }
                if next.is_none() {
                    trailing_break = true;
                }
                if previous_space {
                    space_break = true;
                }
                previous_space = false;
                previous_break = true;
            } else {
                previous_space = false;
                previous_break = false;
            }

            preceded_by_whitespace = is_blankz(ch);
            first = false;
        }

        let mut analysis = ScalarAnalysis {
            value,
            multiline: line_breaks,
            flow_plain_allowed: true,
            block_plain_allowed: true,
            single_quoted_allowed: true,
            block_allowed: true,
            style: ScalarStyle::Any,
        };
        if leading_space || leading_break || trailing_space || trailing_break {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
        }
        if trailing_space {
            analysis.block_allowed = false;
        }
        if break_space {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
            analysis.single_quoted_allowed = false;
        }
        if space_break || special_characters {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
            analysis.single_quoted_allowed = false;
            analysis.block_allowed = false;
        }
        if line_breaks {
            analysis.flow_plain_allowed = false;
            analysis.block_plain_allowed = false;
        }
        if flow_indicators {
            analysis.flow_plain_allowed = false;
        }
        if block_indicators {
            analysis.block_plain_allowed = false;
        }
        analysis
    }

    fn analyze_event<'a>(
        &mut self,
        event: &'a Event,
        tag_directives: &'a [TagDirective],
    ) -> Result<Analysis<'a>, EmitterError> {
        let mut analysis = Analysis::default();
        match &event.data {
            EventData::Alias { anchor } => {
                analysis.anchor = Some(Self::analyze_anchor(anchor, true)?);
            }
            EventData::Scalar {
                anchor,
                tag,
                value,
                plain_implicit,
                quoted_implicit,
                ..
            } => {
                let (plain_implicit, quoted_implicit) = (*plain_implicit, *quoted_implicit);
                if let Some(anchor) = anchor {
                    analysis.anchor = Some(Self::analyze_anchor(anchor, false)?);
                }
                if tag.is_some() && !plain_implicit && !quoted_implicit {
                    analysis.tag = Some(Self::analyze_tag(
                        tag.as_deref().expect("tag was checked"),
                        tag_directives,
                    )?);
                }
                analysis.scalar = Some(self.analyze_scalar(value));
            }
            EventData::SequenceStart { anchor, tag, implicit, .. }
            | EventData::MappingStart { anchor, tag, implicit, .. } => {
                if let Some(anchor) = anchor {
                    analysis.anchor = Some(Self::analyze_anchor(anchor, false)?);
                }
                if tag.is_some() && !*implicit {
                    analysis.tag = Some(Self::analyze_tag(
                        tag.as_deref().expect("tag was checked"),
                        tag_directives,
                    )?);
                }
            }
            _ => {}
        }
        Ok(analysis)
    }

    // Low-level writing.

    fn maybe_flush(&mut self) -> Result<(), WriterError> {
        if self.buffer.len() >= OUTPUT_BUFFER_SIZE - 5 {
            self.flush()?;
        }
        Ok(())
    }

    fn put(&mut self, ch: char) -> Result<(), WriterError> {
        self.maybe_flush()?;
        self.buffer.push(ch);
        self.column += 1;
        Ok(())
    }

    fn put_break(&mut self) -> Result<(), WriterError> {
        self.maybe_flush()?;
        match self.line_break {
            Break::Cr => self.buffer.push('\r'),
            Break::CrLn => self.buffer.push_str("\r\n"),
            Break::Ln | Break::Any => self.buffer.push('\n'),
        }
        self.column = 0;
        self.line += 1;
        Ok(())
    }

    fn write_break_char(&mut self, ch: char) -> Result<(), WriterError> {
        if ch == '\n' {
            self.put_break()?;
        } else {
            self.put(ch)?;
            self.column = 0;
            self.line += 1;
        }
        Ok(())
    }

    fn write_raw_str(&mut self, string: &str) -> Result<(), WriterError> {
        for ch in string.chars() {
            self.put(ch)?;
        }
        Ok(())
    }

    fn write_indent(&mut self) -> Result<(), EmitterError> {
        let indent = self.indent.max(0);
        if !self.indention || self.column > indent || self.column == indent && !self.whitespace {
            self.put_break()?;
        }
        while self.column < indent {
            self.put(' ')?;
        }
        self.whitespace = true;
        self.indention = true;
        Ok(())
    }

    fn write_indicator(
        &mut self,
        indicator: &str,
        need_whitespace: bool,
        is_whitespace: bool,
        is_indention: bool,
    ) -> Result<(), EmitterError> {
        if need_whitespace && !self.whitespace {
            self.put(' ')?;
        }
        self.write_raw_str(indicator)?;
        self.whitespace = is_whitespace;
        self.indention = self.indention && is_indention;
        Ok(())
    }

    fn write_anchor(&mut self, value: &str) -> Result<(), EmitterError> {
        self.write_raw_str(value)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_tag_handle(&mut self, value: &str) -> Result<(), EmitterError> {
        if !self.whitespace {
            self.put(' ')?;
        }
        self.write_raw_str(value)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_tag_content(
        &mut self,
        value: &str,
        need_whitespace: bool,
    ) -> Result<(), EmitterError> {
        if need_whitespace && !self.whitespace {
            self.put(' ')?;
        }
        for ch in value.chars() {
            if is_alpha(ch)
                || matches!(
                    ch,
                    ';' | '/'
                        | '?'
                        | ':'
                        | '@'
                        | '&'
                        | '='
                        | '+'
                        | '$'
                        | ','
                        | '_'
                        | '.'
                        | '~'
                        | '*'
                        | '\''
                        | '('
                        | ')'
                        | '['
                        | ']'
                )
            {
                self.put(ch)?;
                continue;
            }
            // URI escape.
            let mut encode_buffer = [0u8; 4];
            for byte in ch.encode_utf8(&mut encode_buffer).bytes() {
                self.put('%')?;
                for digit in [byte >> 4, byte & 0x0F] {
                    let digit = char::from_digit(u32::from(digit), 16)
                        .expect("nibble is in range")
                        .to_ascii_uppercase();
                    self.put(digit)?;
                }
            }
        }
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    /// Write a captured comment ahead of a node, block context only.
    fn write_comment_for(&mut self, event: &Event) -> Result<(), EmitterError> {
        if !self.options.output_comments || self.flow_level != 0 {
            return Ok(());
        }
        let Some(comment) = &event.comment else {
            return Ok(());
        };
        let lines: Vec<String> = comment.lines().map(String::from).collect();
        for line in lines {
            self.write_indent()?;
            self.write_raw_str("# ")?;
            self.write_raw_str(&line)?;
            self.whitespace = false;
            self.indention = false;
            self.write_indent()?;
        }
        Ok(())
    }

    fn increase_indent(&mut self, flow: bool, indentless: bool) {
        self.indents.push(self.indent);
        if self.indent < 0 {
            self.indent = if flow { self.best_indent } else { 0 };
        } else if !indentless {
            self.indent += self.best_indent;
        }
    }

    fn append_tag_directive(
        &mut self,
        value: TagDirective,
        allow_duplicates: bool,
    ) -> Result<(), EmitterError> {
        for tag_directive in &self.tag_directives {
            if value.handle == tag_directive.handle {
                if allow_duplicates {
                    return Ok(());
                }
                return Self::error("duplicate %TAG directive");
            }
        }
        self.tag_directives.push(value);
        Ok(())
    }

    // Scalar writers.

    fn write_plain_scalar(&mut self, value: &str, allow_breaks: bool) -> Result<(), EmitterError> {
        let mut spaces = false;
        let mut breaks = false;
        if !self.whitespace && (!value.is_empty() || self.flow_level != 0) {
            self.put(' ')?;
        }
        let mut chars = value.chars();
        while let Some(ch) = chars.next() {
            let next = chars.clone().next();
            if is_space(ch) {
                if allow_breaks && !spaces && self.column > self.best_width && !is_space(next) {
                    self.write_indent()?;
                } else {
                    self.put(ch)?;
                }
                spaces = true;
            } else if is_break(ch) {
                if !breaks && ch == '\n' {
                    self.put_break()?;
                }
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                self.put(ch)?;
                self.indention = false;
                spaces = false;
                breaks = false;
            }
        }
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_single_quoted_scalar(
        &mut self,
        value: &str,
        allow_breaks: bool,
    ) -> Result<(), EmitterError> {
        let mut spaces = false;
        let mut breaks = false;
        self.write_indicator("'", true, false, false)?;
        let mut chars = value.chars();
        let mut is_first = true;
        while let Some(ch) = chars.next() {
            let next = chars.clone().next();
            let is_last = next.is_none();
            if is_space(ch) {
                if allow_breaks
                    && !spaces
                    && self.column > self.best_width
                    && !is_first
                    && !is_last
                    && !is_space(next)
                {
                    self.write_indent()?;
                } else {
                    self.put(ch)?;
                }
                spaces = true;
            } else if is_break(ch) {
                if !breaks && ch == '\n' {
                    self.put_break()?;
                }
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                if ch == '\'' {
                    self.put('\'')?;
                }
                self.put(ch)?;
                self.indention = false;
                spaces = false;
                breaks = false;
            }
            is_first = false;
        }
        if breaks {
            self.write_indent()?;
        }
        self.write_indicator("'", false, false, false)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_double_quoted_scalar(
        &mut self,
        value: &str,
        allow_breaks: bool,
    ) -> Result<(), EmitterError> {
        let mut spaces = false;
        self.write_indicator("\"", true, false, false)?;
        let mut chars = value.chars();
        let mut first = true;
        while let Some(ch) = chars.next() {
            if !is_printable(ch)
                || !self.options.unicode && !is_ascii(ch)
                || is_bom(ch)
                || is_break(ch)
                || ch == '"'
                || ch == '\\'
            {
                self.put('\\')?;
                match ch {
                    '\0' => self.put('0')?,
                    '\x07' => self.put('a')?,
                    '\x08' => self.put('b')?,
                    '\x09' => self.put('t')?,
                    '\x0A' => self.put('n')?,
                    '\x0B' => self.put('v')?,
                    '\x0C' => self.put('f')?,
                    '\x0D' => self.put('r')?,
                    '\x1B' => self.put('e')?,
                    '\x22' => self.put('"')?,
                    '\x5C' => self.put('\\')?,
                    '\u{0085}' => self.put('N')?,
                    '\u{00A0}' => self.put('_')?,
                    '\u{2028}' => self.put('L')?,
                    '\u{2029}' => self.put('P')?,
                    _ => {
                        let (prefix, width) = if ch <= '\u{00ff}' {
                            ('x', 2)
                        } else if ch <= '\u{ffff}' {
                            ('u', 4)
                        } else {
                            ('U', 8)
                        };
                        self.put(prefix)?;
                        let value = ch as u32;
                        let mut k = (width - 1) * 4;
                        loop {
                            let digit = (value >> k) & 0x0F;
                            let digit_char = char::from_digit(digit, 16)
                                .expect("nibble is in range")
                                .to_ascii_uppercase();
                            self.put(digit_char)?;
                            if k == 0 {
                                break;
                            }
                            k -= 4;
                        }
                    }
                }
                spaces = false;
            } else if is_space(ch) {
                if allow_breaks
                    && !spaces
                    && self.column > self.best_width
                    && !first
                    && chars.clone().next().is_some()
                {
                    self.write_indent()?;
                    if is_space(chars.clone().next()) {
                        self.put('\\')?;
                    }
                } else {
                    self.put(ch)?;
                }
                spaces = true;
            } else {
                self.put(ch)?;
                spaces = false;
            }
            first = false;
        }
        self.write_indicator("\"", false, false, false)?;
        self.whitespace = false;
        self.indention = false;
        Ok(())
    }

    fn write_block_scalar_hints(&mut self, string: &str) -> Result<(), EmitterError> {
        let mut chomp_hint: Option<&str> = None;
        let first = string.chars().next();
        if is_space(first) || is_break(first) {
            let indent_hint =
                char::from_digit(self.best_indent as u32, 10).expect("indent is in range");
            let mut buffer = [0u8; 1];
            let indent_hint: &str = indent_hint.encode_utf8(&mut buffer);
            self.write_indicator(indent_hint, false, false, false)?;
        }
        self.open_ended = 0;
        if string.is_empty() {
            chomp_hint = Some("-");
        } else {
            let mut chars_rev = string.chars().rev();
            let last = chars_rev.next();
            let before_last = chars_rev.next();
            if !is_break(last) {
                chomp_hint = Some("-");
            } else if is_breakz(before_last) {
                chomp_hint = Some("+");
                self.open_ended = 2;
            }
        }
        if let Some(chomp_hint) = chomp_hint {
            self.write_indicator(chomp_hint, false, false, false)?;
        }
        Ok(())
    }

    fn write_literal_scalar(&mut self, value: &str) -> Result<(), EmitterError> {
        let mut breaks = true;
        self.write_indicator("|", true, false, false)?;
        self.write_block_scalar_hints(value)?;
        self.put_break()?;
        self.indention = true;
        self.whitespace = true;
        for ch in value.chars() {
            if is_break(ch) {
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                }
                self.put(ch)?;
                self.indention = false;
                breaks = false;
            }
        }
        Ok(())
    }

    fn write_folded_scalar(&mut self, value: &str) -> Result<(), EmitterError> {
        let mut breaks = true;
        let mut leading_spaces = true;
        self.write_indicator(">", true, false, false)?;
        self.write_block_scalar_hints(value)?;
        self.put_break()?;
        self.indention = true;
        self.whitespace = true;
        let mut chars = value.chars();
        while let Some(ch) = chars.next() {
            if is_break(ch) {
                if !breaks && !leading_spaces && ch == '\n' {
                    let mut skip_breaks = chars.clone();
                    while is_break(skip_breaks.next()) {}
                    if !is_blankz(skip_breaks.next()) {
                        self.put_break()?;
                    }
                }
                self.write_break_char(ch)?;
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent()?;
                    leading_spaces = is_blank(ch);
                }
                if !breaks
                    && is_space(ch)
                    && !is_space(chars.clone().next())
                    && self.column > self.best_width
                {
                    self.write_indent()?;
                } else {
                    self.put(ch)?;
                }
                self.indention = false;
                breaks = false;
            }
        }
        Ok(())
    }

    // JSON output path.

    fn json_emit(&mut self, event: Event) -> Result<(), EmitterError> {
        let oneline = self.options.mode == EmitMode::JsonOneline;
        match event.data {
            EventData::StreamStart => Ok(()),
            EventData::StreamEnd => {
                if self.options.trailing_newline && !self.buffer.is_empty() {
                    self.buffer.push('\n');
                }
                self.flush()?;
                self.state = EmitterState::End;
                Ok(())
            }
            EventData::DocumentStart { .. } => {
                if self.json_document_done {
                    return Self::error("JSON output supports a single document");
                }
                Ok(())
            }
            EventData::DocumentEnd { .. } => {
                self.json_document_done = true;
                Ok(())
            }
            EventData::Alias { .. } => {
                Self::error("aliases cannot be represented in JSON output")
            }
            EventData::SequenceStart { .. } => {
                self.json_open(JsonContext::Sequence, '[', oneline)
            }
            EventData::SequenceEnd => self.json_close(']', oneline),
            EventData::MappingStart { .. } => self.json_open(JsonContext::Mapping, '{', oneline),
            EventData::MappingEnd => self.json_close('}', oneline),
            EventData::Scalar {
                value,
                style,
                plain_implicit,
                ..
            } => self.json_scalar(&value, style, plain_implicit, oneline),
        }
    }

    fn json_indent(&mut self, oneline: bool) -> Result<(), WriterError> {
        if oneline {
            return Ok(());
        }
        self.put_break()?;
        for _ in 0..(self.json_stack.len() as i32 * self.best_indent) {
            self.put(' ')?;
        }
        Ok(())
    }

    /// Position bookkeeping before a child value is written. Returns true if
    /// the child sits in key position.
    fn json_before_child(&mut self, oneline: bool) -> Result<bool, EmitterError> {
        let Some(frame) = self.json_stack.last_mut() else {
            return Ok(false);
        };
        match frame.context {
            JsonContext::Sequence => {
                let needs_comma = frame.count > 0;
                frame.count += 1;
                if needs_comma {
                    self.put(',')?;
                }
                self.json_indent(oneline)?;
                Ok(false)
            }
            JsonContext::Mapping => {
                if frame.expect_value {
                    frame.expect_value = false;
                    frame.count += 1;
                    Ok(false)
                } else {
                    let needs_comma = frame.count > 0;
                    frame.expect_value = true;
                    if needs_comma {
                        self.put(',')?;
                    }
                    self.json_indent(oneline)?;
                    Ok(true)
                }
            }
        }
    }

    fn json_open(
        &mut self,
        context: JsonContext,
        open: char,
        oneline: bool,
    ) -> Result<(), EmitterError> {
        let key_position = self.json_before_child(oneline)?;
        if key_position {
            return Self::error("mappings can only be keyed by strings in JSON output");
        }
        self.put(open)?;
        self.json_stack.push(JsonFrame {
            context,
            count: 0,
            expect_value: false,
        });
        Ok(())
    }

    fn json_close(&mut self, close: char, oneline: bool) -> Result<(), EmitterError> {
        let frame = self
            .json_stack
            .pop()
            .expect("collection end without a start");
        if frame.count > 0 {
            self.json_indent(oneline)?;
        }
        self.put(close)?;
        Ok(())
    }

    fn json_scalar(
        &mut self,
        value: &str,
        style: ScalarStyle,
        plain_implicit: bool,
        oneline: bool,
    ) -> Result<(), EmitterError> {
        use crate::value::{format_float, format_int, resolve_plain, Resolved};

        let key_position = self.json_before_child(oneline)?;
        let resolved = if matches!(style, ScalarStyle::Plain | ScalarStyle::Any) && plain_implicit {
            resolve_plain(value, false)
        } else {
            Resolved::Str
        };
        if key_position {
            if self.options.mode == EmitMode::JsonTypePreserving
                && !matches!(resolved, Resolved::Str)
            {
                return Self::error("mappings can only be keyed by strings in JSON output");
            }
            self.json_string(value)?;
            self.put(':')?;
            if !oneline {
                self.put(' ')?;
            }
            return Ok(());
        }
        match resolved {
            Resolved::Null => self.write_raw_str("null")?,
            Resolved::Bool(true) => self.write_raw_str("true")?,
            Resolved::Bool(false) => self.write_raw_str("false")?,
            Resolved::Int(i) => {
                if is_json_number(value) {
                    self.write_raw_str(value)?;
                } else if self.options.mode == EmitMode::JsonTypePreserving {
                    let rendered = format_int(i);
                    self.write_raw_str(&rendered)?;
                } else {
                    self.json_string(value)?;
                }
            }
            Resolved::Float(f) => {
                if is_json_number(value) {
                    self.write_raw_str(value)?;
                } else if self.options.mode == EmitMode::JsonTypePreserving && f.is_finite() {
                    let rendered = format_float(f);
                    self.write_raw_str(&rendered)?;
                } else {
                    self.json_string(value)?;
                }
            }
            Resolved::Str => self.json_string(value)?,
        }
        Ok(())
    }

    fn json_string(&mut self, value: &str) -> Result<(), WriterError> {
        self.put('"')?;
        for ch in value.chars() {
            match ch {
                '"' => self.write_raw_str("\\\"")?,
                '\\' => self.write_raw_str("\\\\")?,
                '\n' => self.write_raw_str("\\n")?,
                '\r' => self.write_raw_str("\\r")?,
                '\t' => self.write_raw_str("\\t")?,
                '\x08' => self.write_raw_str("\\b")?,
                '\x0C' => self.write_raw_str("\\f")?,
                ch if (ch as u32) < 0x20 => {
                    let code = ch as u32;
                    self.write_raw_str("\\u")?;
                    for k in [12, 8, 4, 0] {
                        let digit = char::from_digit((code >> k) & 0xF, 16)
                            .expect("nibble is in range");
                        self.put(digit)?;
                    }
                }
                ch => self.put(ch)?,
            }
        }
        self.put('"')?;
        Ok(())
    }
}

/// RFC 8259 number grammar.
pub(crate) fn is_json_number(value: &str) -> bool {
    let mut rest = value.strip_prefix('-').unwrap_or(value).as_bytes();
    match rest {
        [b'0', tail @ ..] => rest = tail,
        [b'1'..=b'9', tail @ ..] => {
            rest = tail;
            while let [b'0'..=b'9', tail @ ..] = rest {
                rest = tail;
            }
        }
        _ => return false,
    }
    if let [b'.', tail @ ..] = rest {
        rest = tail;
        let mut digits = 0;
        while let [b'0'..=b'9', tail @ ..] = rest {
            rest = tail;
            digits += 1;
        }
        if digits == 0 {
            return false;
        }
    }
    if let [b'e' | b'E', tail @ ..] = rest {
        rest = tail;
        if let [b'+' | b'-', tail @ ..] = rest {
            rest = tail;
        }
        let mut digits = 0;
        while let [b'0'..=b'9', tail @ ..] = rest {
            rest = tail;
            digits += 1;
        }
        if digits == 0 {
            return false;
        }
    }
    rest.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use pretty_assertions::assert_eq;

    fn emit_events(options: EmitOptions, events: Vec<Event>) -> String {
        let mut output = Vec::new();
        let mut emitter = Emitter::with_options(options);
        emitter.set_output(&mut output);
        for event in events {
            emitter.emit(event).unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    fn scalar_doc_events(value: &str, style: ScalarStyle) -> Vec<Event> {
        vec![
            Event::stream_start(),
            Event::document_start(None, &[], true),
            Event::scalar(None, None, value, true, true, style),
            Event::document_end(true),
            Event::stream_end(),
        ]
    }

    #[test]
    fn plain_scalar_document() {
        let output = emit_events(
            EmitOptions::default(),
            scalar_doc_events("hello", ScalarStyle::Plain),
        );
        assert_eq!(output, "hello\n");
    }

    #[test]
    fn multiline_plain_scalar_folds_with_blank_line() {
        let output = emit_events(
            EmitOptions::default(),
            scalar_doc_events(
                "1st non-empty\n2nd non-empty 3rd non-empty",
                ScalarStyle::Plain,
            ),
        );
        assert_eq!(output, "'1st non-empty\n\n  2nd non-empty 3rd non-empty'\n");
    }

    #[test]
    fn block_mapping_output() {
        let events = vec![
            Event::stream_start(),
            Event::document_start(None, &[], true),
            Event::mapping_start(None, None, true, MappingStyle::Block),
            Event::scalar(None, None, "a", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "1", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "b", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "2", true, true, ScalarStyle::Plain),
            Event::mapping_end(),
            Event::document_end(true),
            Event::stream_end(),
        ];
        let output = emit_events(EmitOptions::default(), events);
        assert_eq!(output, "a: 1\nb: 2\n");
    }

    #[test]
    fn flow_forced_mode() {
        let events = vec![
            Event::stream_start(),
            Event::document_start(None, &[], true),
            Event::sequence_start(None, None, true, SequenceStyle::Block),
            Event::scalar(None, None, "1", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "2", true, true, ScalarStyle::Plain),
            Event::sequence_end(),
            Event::document_end(true),
            Event::stream_end(),
        ];
        let mut options = EmitOptions::default();
        options.mode = EmitMode::Flow;
        let output = emit_events(options, events);
        assert_eq!(output, "[1, 2]\n");
    }

    #[test]
    fn block_forced_mode() {
        let events = vec![
            Event::stream_start(),
            Event::document_start(None, &[], true),
            Event::sequence_start(None, None, true, SequenceStyle::Flow),
            Event::scalar(None, None, "1", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "2", true, true, ScalarStyle::Plain),
            Event::sequence_end(),
            Event::document_end(true),
            Event::stream_end(),
        ];
        let mut options = EmitOptions::default();
        options.mode = EmitMode::Block;
        let output = emit_events(options, events);
        assert_eq!(output, "- 1\n- 2\n");
    }

    #[test]
    fn anchors_and_aliases_round_trip() {
        let events = vec![
            Event::stream_start(),
            Event::document_start(None, &[], true),
            Event::mapping_start(None, None, true, MappingStyle::Block),
            Event::scalar(None, None, "a", true, true, ScalarStyle::Plain),
            Event::scalar(Some("x"), None, "1", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "b", true, true, ScalarStyle::Plain),
            Event::alias("x"),
            Event::mapping_end(),
            Event::document_end(true),
            Event::stream_end(),
        ];
        let output = emit_events(EmitOptions::default(), events);
        assert_eq!(output, "a: &x 1\nb: *x\n");
    }

    #[test]
    fn explicit_document_markers() {
        let mut options = EmitOptions::default();
        options.doc_markers = MarkerPolicy::On;
        let output = emit_events(options, scalar_doc_events("x", ScalarStyle::Plain));
        assert_eq!(output, "--- x\n...\n");
    }

    #[test]
    fn no_trailing_newline_option() {
        let mut options = EmitOptions::default();
        options.trailing_newline = false;
        let output = emit_events(options, scalar_doc_events("x", ScalarStyle::Plain));
        assert_eq!(output, "x");
    }

    #[test]
    fn quoting_guards_reserved_text() {
        let output = emit_events(
            EmitOptions::default(),
            scalar_doc_events("- not a list", ScalarStyle::Plain),
        );
        assert_eq!(output, "'- not a list'\n");
    }

    #[test]
    fn control_characters_force_double_quotes() {
        let output = emit_events(
            EmitOptions::default(),
            scalar_doc_events("bell\x07", ScalarStyle::Plain),
        );
        assert_eq!(output, "\"bell\\a\"\n");
    }

    #[test]
    fn json_output() {
        let events = vec![
            Event::stream_start(),
            Event::document_start(None, &[], true),
            Event::mapping_start(None, None, true, MappingStyle::Flow),
            Event::scalar(None, None, "n", true, true, ScalarStyle::DoubleQuoted),
            Event::scalar(None, None, "1.5", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "l", true, true, ScalarStyle::DoubleQuoted),
            Event::sequence_start(None, None, true, SequenceStyle::Flow),
            Event::scalar(None, None, "true", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "null", true, true, ScalarStyle::Plain),
            Event::sequence_end(),
            Event::mapping_end(),
            Event::document_end(true),
            Event::stream_end(),
        ];
        let mut options = EmitOptions::default();
        options.mode = EmitMode::Json;
        let output = emit_events(options, events);
        assert_eq!(output, "{\n  \"n\": 1.5,\n  \"l\": [\n    true,\n    null\n  ]\n}\n");
    }

    #[test]
    fn json_oneline_output() {
        let events = vec![
            Event::stream_start(),
            Event::document_start(None, &[], true),
            Event::sequence_start(None, None, true, SequenceStyle::Flow),
            Event::scalar(None, None, "1", true, true, ScalarStyle::Plain),
            Event::scalar(None, None, "hi", true, true, ScalarStyle::Plain),
            Event::sequence_end(),
            Event::document_end(true),
            Event::stream_end(),
        ];
        let mut options = EmitOptions::default();
        options.mode = EmitMode::JsonOneline;
        let output = emit_events(options, events);
        assert_eq!(output, "[1,\"hi\"]\n");
    }

    #[test]
    fn json_quotes_non_json_numbers() {
        let events = scalar_doc_events("0x1F", ScalarStyle::Plain);
        let mut options = EmitOptions::default();
        options.mode = EmitMode::Json;
        let output = emit_events(options, events);
        assert_eq!(output, "\"0x1F\"\n");
    }

    #[test]
    fn json_type_preserving_renders_resolved_numbers() {
        let events = scalar_doc_events("0x1F", ScalarStyle::Plain);
        let mut options = EmitOptions::default();
        options.mode = EmitMode::JsonTypePreserving;
        let output = emit_events(options, events);
        assert_eq!(output, "31\n");
    }

    #[test]
    fn json_number_grammar() {
        assert!(is_json_number("0"));
        assert!(is_json_number("-1.5e3"));
        assert!(!is_json_number("01"));
        assert!(!is_json_number("0x1F"));
        assert!(!is_json_number("1."));
        assert!(!is_json_number("+1"));
    }
}
