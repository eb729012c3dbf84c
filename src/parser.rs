use crate::error::ParserError;
use crate::event::{Event, EventData};
use crate::reader::Input;
use crate::scanner::{Scanner, TabPolicy};
use crate::token::{Token, TokenData};
use crate::{
    Encoding, MappingStyle, Mark, ScalarStyle, SequenceStyle, TagDirective, VersionDirective,
};

/// Which YAML version's rules apply when the document carries no `%YAML`
/// directive.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum YamlVersion {
    /// YAML 1.1: merge keys and the extended boolean forms are in effect.
    V1_1,
    /// YAML 1.2 (default).
    #[default]
    V1_2,
}

/// Parser configuration, threaded through the constructor. There is no
/// module-level default state; callers wanting a global default wrap one.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct ParseOptions {
    /// Version rules in effect when no `%YAML` directive is present.
    pub version: YamlVersion,
    /// Enforce strict JSON lexical rules.
    pub json: bool,
    /// Produce and attach comments.
    pub capture_comments: bool,
    /// Tab handling around block indentation.
    pub tab_policy: TabPolicy,
    /// Reject anchor redefinition instead of rebinding.
    pub strict_anchors: bool,
    /// Expand `<<` merge keys while composing.
    pub resolve_merge_keys: bool,
    /// Maximum nesting depth before a syntactic error is raised.
    pub depth_limit: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            version: YamlVersion::default(),
            json: false,
            capture_comments: false,
            tab_policy: TabPolicy::default(),
            strict_anchors: false,
            resolve_merge_keys: true,
            depth_limit: 64,
        }
    }
}

/// The states of the parser.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ParserState {
    /// Expect STREAM-START.
    #[default]
    StreamStart,
    /// Expect the beginning of an implicit document.
    ImplicitDocumentStart,
    /// Expect DOCUMENT-START.
    DocumentStart,
    /// Expect the content of a document.
    DocumentContent,
    /// Expect DOCUMENT-END.
    DocumentEnd,
    /// Expect a block node.
    BlockNode,
    /// Expect a block node or indentless sequence.
    BlockNodeOrIndentlessSequence,
    /// Expect a flow node.
    FlowNode,
    /// Expect the first entry of a block sequence.
    BlockSequenceFirstEntry,
    /// Expect an entry of a block sequence.
    BlockSequenceEntry,
    /// Expect an entry of an indentless sequence.
    IndentlessSequenceEntry,
    /// Expect the first key of a block mapping.
    BlockMappingFirstKey,
    /// Expect a block mapping key.
    BlockMappingKey,
    /// Expect a block mapping value.
    BlockMappingValue,
    /// Expect the first entry of a flow sequence.
    FlowSequenceFirstEntry,
    /// Expect an entry of a flow sequence.
    FlowSequenceEntry,
    /// Expect a key of an ordered mapping.
    FlowSequenceEntryMappingKey,
    /// Expect a value of an ordered mapping.
    FlowSequenceEntryMappingValue,
    /// Expect the end of an ordered mapping entry.
    FlowSequenceEntryMappingEnd,
    /// Expect the first key of a flow mapping.
    FlowMappingFirstKey,
    /// Expect a key of a flow mapping.
    FlowMappingKey,
    /// Expect a value of a flow mapping.
    FlowMappingValue,
    /// Expect an empty value of a flow mapping.
    FlowMappingEmptyValue,
    /// Expect nothing.
    End,
}

/// The parser: drives the scanner and produces the canonical event stream.
pub struct Parser<'r> {
    pub(crate) scanner: Scanner<'r>,
    options: ParseOptions,
    states: Vec<ParserState>,
    state: ParserState,
    marks: Vec<Mark>,
    tag_directives: Vec<TagDirective>,
    /// Effective `%YAML` version of the current document.
    document_version: Option<VersionDirective>,
    pending_comment: Option<String>,
}

impl<'r> Default for Parser<'r> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Parser<'r> {
    /// Create a parser with default options.
    pub fn new() -> Parser<'r> {
        Self::with_options(ParseOptions::default())
    }

    /// Create a parser with explicit options.
    pub fn with_options(options: ParseOptions) -> Parser<'r> {
        let mut scanner = Scanner::new();
        scanner.set_json_mode(options.json);
        scanner.set_capture_comments(options.capture_comments);
        scanner.set_tab_policy(options.tab_policy);
        Parser {
            scanner,
            options,
            states: Vec::with_capacity(16),
            state: ParserState::default(),
            marks: Vec::with_capacity(16),
            tag_directives: Vec::with_capacity(16),
            document_version: None,
            pending_comment: None,
        }
    }

    /// Reset the parser state, keeping the options.
    pub fn reset(&mut self) {
        *self = Self::with_options(self.options.clone());
    }

    /// Set the input source.
    pub fn set_input(&mut self, input: Input<'r>) {
        self.scanner.set_input(input);
    }

    /// Set the source encoding explicitly.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.scanner.set_encoding(encoding);
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub(crate) fn stream_start_produced(&self) -> bool {
        self.state != ParserState::StreamStart
    }

    pub(crate) fn stream_end_produced(&self) -> bool {
        self.scanner.stream_end_produced
    }

    /// Are YAML 1.1 rules (merge keys, extended booleans) in effect for the
    /// current document?
    pub(crate) fn in_v11(&self) -> bool {
        match self.document_version {
            Some(version) => version.major == 1 && version.minor <= 1,
            None => self.options.version == YamlVersion::V1_1,
        }
    }

    /// Parse the input stream and produce the next parsing event.
    ///
    /// The initial event is STREAM-START and the final event is STREAM-END,
    /// which repeats on subsequent calls.
    pub fn parse(&mut self) -> Result<Event, ParserError> {
        if self.scanner.stream_end_produced || self.state == ParserState::End {
            return Ok(Event::stream_end());
        }
        let mut event = self.state_machine()?;
        if self.pending_comment.is_some()
            && matches!(
                event.data,
                EventData::Scalar { .. }
                    | EventData::SequenceStart { .. }
                    | EventData::MappingStart { .. }
                    | EventData::Alias { .. }
            )
        {
            event.comment = self.pending_comment.take();
        }
        Ok(event)
    }

    fn error<T>(problem: &'static str, mark: Mark) -> Result<T, ParserError> {
        Err(ParserError::Problem { problem, mark })
    }

    fn error_context<T>(
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        mark: Mark,
    ) -> Result<T, ParserError> {
        Err(ParserError::ProblemWithContext {
            context,
            context_mark,
            problem,
            mark,
        })
    }

    /// Make the next non-comment token available at the front of the queue.
    /// Comments are folded into `pending_comment` on the way.
    fn ensure_token(&mut self) -> Result<(), ParserError> {
        loop {
            if !self.scanner.token_available {
                self.scanner.fetch_more_tokens()?;
                if !self.scanner.token_available {
                    return Err(ParserError::UnexpectedEof);
                }
            }
            let front_is_comment = matches!(
                self.scanner.tokens.front(),
                Some(Token {
                    data: TokenData::Comment { .. },
                    ..
                })
            );
            if !front_is_comment {
                return Ok(());
            }
            let token = self.scanner.tokens.pop_front().expect("front was checked");
            self.scanner.token_available = false;
            self.scanner.tokens_parsed += 1;
            if let TokenData::Comment { value } = token.data {
                match &mut self.pending_comment {
                    Some(text) => {
                        text.push('\n');
                        text.push_str(&value);
                    }
                    None => self.pending_comment = Some(value),
                }
            }
        }
    }

    fn peek(&mut self) -> Result<&Token, ParserError> {
        self.ensure_token()?;
        Ok(self.scanner.tokens.front().expect("token is available"))
    }

    fn peek_mut(&mut self) -> Result<&mut Token, ParserError> {
        self.ensure_token()?;
        Ok(self.scanner.tokens.front_mut().expect("token is available"))
    }

    fn skip_token(&mut self) {
        self.scanner.token_available = false;
        self.scanner.tokens_parsed += 1;
        let skipped = self
            .scanner
            .tokens
            .pop_front()
            .expect("skip_token called on an empty queue");
        self.scanner.stream_end_produced = matches!(skipped.data, TokenData::StreamEnd);
    }

    fn push_state(&mut self, state: ParserState) -> Result<(), ParserError> {
        if self.states.len() >= self.options.depth_limit {
            return Self::error("exceeded the configured nesting depth limit", self.scanner.mark);
        }
        self.states.push(state);
        Ok(())
    }

    fn pop_state(&mut self) -> ParserState {
        self.states.pop().expect("state stack is empty")
    }

    fn state_machine(&mut self) -> Result<Event, ParserError> {
        match self.state {
            ParserState::StreamStart => self.parse_stream_start(),
            ParserState::ImplicitDocumentStart => self.parse_document_start(true),
            ParserState::DocumentStart => self.parse_document_start(false),
            ParserState::DocumentContent => self.parse_document_content(),
            ParserState::DocumentEnd => self.parse_document_end(),
            ParserState::BlockNode => self.parse_node(true, false),
            ParserState::BlockNodeOrIndentlessSequence => self.parse_node(true, true),
            ParserState::FlowNode => self.parse_node(false, false),
            ParserState::BlockSequenceFirstEntry => self.parse_block_sequence_entry(true),
            ParserState::BlockSequenceEntry => self.parse_block_sequence_entry(false),
            ParserState::IndentlessSequenceEntry => self.parse_indentless_sequence_entry(),
            ParserState::BlockMappingFirstKey => self.parse_block_mapping_key(true),
            ParserState::BlockMappingKey => self.parse_block_mapping_key(false),
            ParserState::BlockMappingValue => self.parse_block_mapping_value(),
            ParserState::FlowSequenceFirstEntry => self.parse_flow_sequence_entry(true),
            ParserState::FlowSequenceEntry => self.parse_flow_sequence_entry(false),
            ParserState::FlowSequenceEntryMappingKey => {
                self.parse_flow_sequence_entry_mapping_key()
            }
            ParserState::FlowSequenceEntryMappingValue => {
                self.parse_flow_sequence_entry_mapping_value()
            }
            ParserState::FlowSequenceEntryMappingEnd => {
                self.parse_flow_sequence_entry_mapping_end()
            }
            ParserState::FlowMappingFirstKey => self.parse_flow_mapping_key(true),
            ParserState::FlowMappingKey => self.parse_flow_mapping_key(false),
            ParserState::FlowMappingValue => self.parse_flow_mapping_value(false),
            ParserState::FlowMappingEmptyValue => self.parse_flow_mapping_value(true),
            ParserState::End => panic!("parser end state reached unexpectedly"),
        }
    }

    fn parse_stream_start(&mut self) -> Result<Event, ParserError> {
        let token = self.peek()?;
        if let TokenData::StreamStart { .. } = &token.data {
            let event = Event::spanning(EventData::StreamStart, token.start_mark, token.end_mark);
            self.state = ParserState::ImplicitDocumentStart;
            self.skip_token();
            Ok(event)
        } else {
            let mark = token.start_mark;
            Self::error("did not find expected <stream-start>", mark)
        }
    }

    fn parse_document_start(&mut self, implicit: bool) -> Result<Event, ParserError> {
        let mut token = self.peek()?;
        if !implicit {
            while let TokenData::DocumentEnd = &token.data {
                self.skip_token();
                token = self.peek()?;
            }
        }
        if implicit
            && !matches!(
                token.data,
                TokenData::VersionDirective { .. }
                    | TokenData::TagDirective { .. }
                    | TokenData::DocumentStart
                    | TokenData::StreamEnd
            )
        {
            let start_mark = token.start_mark;
            let end_mark = token.end_mark;
            self.process_directives(false)?;
            let event = Event::spanning(
                EventData::DocumentStart {
                    version_directive: None,
                    tag_directives: vec![],
                    implicit: true,
                },
                start_mark,
                end_mark,
            );
            self.push_state(ParserState::DocumentEnd)?;
            self.state = ParserState::BlockNode;
            Ok(event)
        } else if !matches!(token.data, TokenData::StreamEnd) {
            let start_mark = token.start_mark;
            let (version_directive, tag_directives) = self.process_directives(true)?;
            let token = self.peek()?;
            if let TokenData::DocumentStart = token.data {
                let end_mark = token.end_mark;
                let event = Event::spanning(
                    EventData::DocumentStart {
                        version_directive,
                        tag_directives,
                        implicit: false,
                    },
                    start_mark,
                    end_mark,
                );
                self.push_state(ParserState::DocumentEnd)?;
                self.state = ParserState::DocumentContent;
                self.skip_token();
                Ok(event)
            } else {
                Self::error("did not find expected <document start>", token.start_mark)
            }
        } else {
            let event = Event::spanning(EventData::StreamEnd, token.start_mark, token.end_mark);
            self.state = ParserState::End;
            self.skip_token();
            Ok(event)
        }
    }

    fn parse_document_content(&mut self) -> Result<Event, ParserError> {
        let token = self.peek()?;
        if let TokenData::VersionDirective { .. }
        | TokenData::TagDirective { .. }
        | TokenData::DocumentStart
        | TokenData::DocumentEnd
        | TokenData::StreamEnd = &token.data
        {
            let mark = token.start_mark;
            self.state = self.pop_state();
            Ok(Self::empty_scalar(mark))
        } else {
            self.parse_node(true, false)
        }
    }

    fn parse_document_end(&mut self) -> Result<Event, ParserError> {
        let token = self.peek()?;
        let start_mark = token.start_mark;
        let mut end_mark = start_mark;
        let mut implicit = true;
        if let TokenData::DocumentEnd = &token.data {
            end_mark = token.end_mark;
            self.skip_token();
            implicit = false;
        }
        self.tag_directives.clear();
        self.document_version = None;
        self.state = ParserState::DocumentStart;
        Ok(Event::spanning(
            EventData::DocumentEnd { implicit },
            start_mark,
            end_mark,
        ))
    }

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> Result<Event, ParserError> {
        let mut anchor: Option<String> = None;
        let mut tag_handle: Option<String> = None;
        let mut tag_suffix: Option<String> = None;
        let mut tag: Option<String> = None;
        let mut tag_mark = Mark::default();

        let mut token = self.peek_mut()?;

        if let TokenData::Alias { value } = &mut token.data {
            let event = Event::spanning(
                EventData::Alias {
                    anchor: core::mem::take(value),
                },
                token.start_mark,
                token.end_mark,
            );
            self.state = self.pop_state();
            self.skip_token();
            return Ok(event);
        }

        let mut start_mark = token.start_mark;
        let mut end_mark = token.start_mark;
        // Node properties: anchor and tag, in either order, once each.
        if let TokenData::Anchor { value } = &mut token.data {
            anchor = Some(core::mem::take(value));
            start_mark = token.start_mark;
            end_mark = token.end_mark;
            self.skip_token();
            token = self.peek_mut()?;
            if let TokenData::Tag { handle, suffix } = &mut token.data {
                tag_handle = Some(core::mem::take(handle));
                tag_suffix = Some(core::mem::take(suffix));
                tag_mark = token.start_mark;
                end_mark = token.end_mark;
                self.skip_token();
            }
        } else if let TokenData::Tag { handle, suffix } = &mut token.data {
            tag_handle = Some(core::mem::take(handle));
            tag_suffix = Some(core::mem::take(suffix));
            tag_mark = token.start_mark;
            start_mark = tag_mark;
            end_mark = token.end_mark;
            self.skip_token();
            token = self.peek_mut()?;
            if let TokenData::Anchor { value } = &mut token.data {
                anchor = Some(core::mem::take(value));
                end_mark = token.end_mark;
                self.skip_token();
            }
        }

        if let Some(tag_handle_value) = &tag_handle {
            if tag_handle_value.is_empty() {
                tag = tag_suffix;
            } else {
                for tag_directive in &self.tag_directives {
                    if tag_directive.handle == *tag_handle_value {
                        let suffix = tag_suffix.as_deref().unwrap_or("");
                        tag = Some(format!("{}{}", tag_directive.prefix, suffix));
                        break;
                    }
                }
                if tag.is_none() {
                    return Self::error_context(
                        "while parsing a node",
                        start_mark,
                        "found undefined tag handle",
                        tag_mark,
                    );
                }
            }
        }

        let token = self.peek_mut()?;
        let implicit = tag.is_none() || tag.as_deref() == Some("");

        if indentless_sequence && matches!(token.data, TokenData::BlockEntry) {
            end_mark = token.end_mark;
            self.state = ParserState::IndentlessSequenceEntry;
            return Ok(Event::spanning(
                EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    style: SequenceStyle::Block,
                },
                start_mark,
                end_mark,
            ));
        }
        if let TokenData::Scalar { value, style } = &mut token.data {
            let mut plain_implicit = false;
            let mut quoted_implicit = false;
            end_mark = token.end_mark;
            if *style == ScalarStyle::Plain && tag.is_none() || tag.as_deref() == Some("!") {
                plain_implicit = true;
            } else if tag.is_none() {
                quoted_implicit = true;
            }
            let event = Event::spanning(
                EventData::Scalar {
                    anchor,
                    tag,
                    value: core::mem::take(value),
                    plain_implicit,
                    quoted_implicit,
                    style: *style,
                },
                start_mark,
                end_mark,
            );
            self.state = self.pop_state();
            self.skip_token();
            return Ok(event);
        }
        if let TokenData::FlowSequenceStart = &token.data {
            end_mark = token.end_mark;
            self.state = ParserState::FlowSequenceFirstEntry;
            return Ok(Event::spanning(
                EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    style: SequenceStyle::Flow,
                },
                start_mark,
                end_mark,
            ));
        }
        if let TokenData::FlowMappingStart = &token.data {
            end_mark = token.end_mark;
            self.state = ParserState::FlowMappingFirstKey;
            return Ok(Event::spanning(
                EventData::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    style: MappingStyle::Flow,
                },
                start_mark,
                end_mark,
            ));
        }
        if block && matches!(token.data, TokenData::BlockSequenceStart) {
            end_mark = token.end_mark;
            self.state = ParserState::BlockSequenceFirstEntry;
            return Ok(Event::spanning(
                EventData::SequenceStart {
                    anchor,
                    tag,
                    implicit,
                    style: SequenceStyle::Block,
                },
                start_mark,
                end_mark,
            ));
        }
        if block && matches!(token.data, TokenData::BlockMappingStart) {
            end_mark = token.end_mark;
            self.state = ParserState::BlockMappingFirstKey;
            return Ok(Event::spanning(
                EventData::MappingStart {
                    anchor,
                    tag,
                    implicit,
                    style: MappingStyle::Block,
                },
                start_mark,
                end_mark,
            ));
        }
        if anchor.is_some() || tag.is_some() {
            self.state = self.pop_state();
            return Ok(Event::spanning(
                EventData::Scalar {
                    anchor,
                    tag,
                    value: String::new(),
                    plain_implicit: implicit,
                    quoted_implicit: false,
                    style: ScalarStyle::Plain,
                },
                start_mark,
                end_mark,
            ));
        }
        Self::error_context(
            if block {
                "while parsing a block node"
            } else {
                "while parsing a flow node"
            },
            start_mark,
            "did not find expected node content",
            token.start_mark,
        )
    }

    fn parse_block_sequence_entry(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let mut token = self.peek()?;
        if let TokenData::BlockEntry = &token.data {
            let mark = token.end_mark;
            self.skip_token();
            token = self.peek()?;
            if matches!(token.data, TokenData::BlockEntry | TokenData::BlockEnd) {
                self.state = ParserState::BlockSequenceEntry;
                Ok(Self::empty_scalar(mark))
            } else {
                self.push_state(ParserState::BlockSequenceEntry)?;
                self.parse_node(true, false)
            }
        } else if let TokenData::BlockEnd = token.data {
            let event = Event::spanning(EventData::SequenceEnd, token.start_mark, token.end_mark);
            self.state = self.pop_state();
            let _ = self.marks.pop();
            self.skip_token();
            Ok(event)
        } else {
            let token_mark = token.start_mark;
            let mark = self.marks.pop().expect("mark stack is empty");
            Self::error_context(
                "while parsing a block collection",
                mark,
                "did not find expected '-' indicator",
                token_mark,
            )
        }
    }

    fn parse_indentless_sequence_entry(&mut self) -> Result<Event, ParserError> {
        let mut token = self.peek()?;
        if let TokenData::BlockEntry = token.data {
            let mark = token.end_mark;
            self.skip_token();
            token = self.peek()?;
            if matches!(
                token.data,
                TokenData::BlockEntry | TokenData::Key | TokenData::Value | TokenData::BlockEnd
            ) {
                self.state = ParserState::IndentlessSequenceEntry;
                Ok(Self::empty_scalar(mark))
            } else {
                self.push_state(ParserState::IndentlessSequenceEntry)?;
                self.parse_node(true, false)
            }
        } else {
            let event = Event::spanning(EventData::SequenceEnd, token.start_mark, token.end_mark);
            self.state = self.pop_state();
            Ok(event)
        }
    }

    fn parse_block_mapping_key(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let mut token = self.peek()?;
        if let TokenData::Key = token.data {
            let mark = token.end_mark;
            self.skip_token();
            token = self.peek()?;
            if matches!(
                token.data,
                TokenData::Key | TokenData::Value | TokenData::BlockEnd
            ) {
                self.state = ParserState::BlockMappingValue;
                Ok(Self::empty_scalar(mark))
            } else {
                self.push_state(ParserState::BlockMappingValue)?;
                self.parse_node(true, true)
            }
        } else if let TokenData::BlockEnd = token.data {
            let event = Event::spanning(EventData::MappingEnd, token.start_mark, token.end_mark);
            self.state = self.pop_state();
            let _ = self.marks.pop();
            self.skip_token();
            Ok(event)
        } else {
            let token_mark = token.start_mark;
            let mark = self.marks.pop().expect("mark stack is empty");
            Self::error_context(
                "while parsing a block mapping",
                mark,
                "did not find expected key",
                token_mark,
            )
        }
    }

    fn parse_block_mapping_value(&mut self) -> Result<Event, ParserError> {
        let mut token = self.peek()?;
        if let TokenData::Value = token.data {
            let mark = token.end_mark;
            self.skip_token();
            token = self.peek()?;
            if matches!(
                token.data,
                TokenData::Key | TokenData::Value | TokenData::BlockEnd
            ) {
                self.state = ParserState::BlockMappingKey;
                Ok(Self::empty_scalar(mark))
            } else {
                self.push_state(ParserState::BlockMappingKey)?;
                self.parse_node(true, true)
            }
        } else {
            let mark = token.start_mark;
            self.state = ParserState::BlockMappingKey;
            Ok(Self::empty_scalar(mark))
        }
    }

    fn parse_flow_sequence_entry(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let mut token = self.peek()?;
        if !matches!(token.data, TokenData::FlowSequenceEnd) {
            if !first {
                if let TokenData::FlowEntry = token.data {
                    self.skip_token();
                    token = self.peek()?;
                } else {
                    let token_mark = token.start_mark;
                    let mark = self.marks.pop().expect("mark stack is empty");
                    return Self::error_context(
                        "while parsing a flow sequence",
                        mark,
                        "did not find expected ',' or ']'",
                        token_mark,
                    );
                }
            }
            if let TokenData::Key = token.data {
                let event = Event::spanning(
                    EventData::MappingStart {
                        anchor: None,
                        tag: None,
                        implicit: true,
                        style: MappingStyle::Flow,
                    },
                    token.start_mark,
                    token.end_mark,
                );
                self.state = ParserState::FlowSequenceEntryMappingKey;
                self.skip_token();
                return Ok(event);
            } else if !matches!(token.data, TokenData::FlowSequenceEnd) {
                self.push_state(ParserState::FlowSequenceEntry)?;
                return self.parse_node(false, false);
            }
        }
        let event = Event::spanning(EventData::SequenceEnd, token.start_mark, token.end_mark);
        self.state = self.pop_state();
        let _ = self.marks.pop();
        self.skip_token();
        Ok(event)
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> Result<Event, ParserError> {
        let token = self.peek()?;
        if matches!(
            token.data,
            TokenData::Value | TokenData::FlowEntry | TokenData::FlowSequenceEnd
        ) {
            let mark = token.end_mark;
            self.skip_token();
            self.state = ParserState::FlowSequenceEntryMappingValue;
            Ok(Self::empty_scalar(mark))
        } else {
            self.push_state(ParserState::FlowSequenceEntryMappingValue)?;
            self.parse_node(false, false)
        }
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> Result<Event, ParserError> {
        let mut token = self.peek()?;
        if let TokenData::Value = token.data {
            self.skip_token();
            token = self.peek()?;
            if !matches!(
                token.data,
                TokenData::FlowEntry | TokenData::FlowSequenceEnd
            ) {
                self.push_state(ParserState::FlowSequenceEntryMappingEnd)?;
                return self.parse_node(false, false);
            }
        }
        let mark = token.start_mark;
        self.state = ParserState::FlowSequenceEntryMappingEnd;
        Ok(Self::empty_scalar(mark))
    }

    fn parse_flow_sequence_entry_mapping_end(&mut self) -> Result<Event, ParserError> {
        let token = self.peek()?;
        let start_mark = token.start_mark;
        let end_mark = token.end_mark;
        self.state = ParserState::FlowSequenceEntry;
        Ok(Event::spanning(EventData::MappingEnd, start_mark, end_mark))
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> Result<Event, ParserError> {
        if first {
            let token = self.peek()?;
            let mark = token.start_mark;
            self.marks.push(mark);
            self.skip_token();
        }

        let mut token = self.peek()?;
        if !matches!(token.data, TokenData::FlowMappingEnd) {
            if !first {
                if let TokenData::FlowEntry = token.data {
                    self.skip_token();
                    token = self.peek()?;
                } else {
                    let token_mark = token.start_mark;
                    let mark = self.marks.pop().expect("mark stack is empty");
                    return Self::error_context(
                        "while parsing a flow mapping",
                        mark,
                        "did not find expected ',' or '}'",
                        token_mark,
                    );
                }
            }
            if let TokenData::Key = token.data {
                self.skip_token();
                token = self.peek()?;
                if !matches!(
                    token.data,
                    TokenData::Value | TokenData::FlowEntry | TokenData::FlowMappingEnd
                ) {
                    self.push_state(ParserState::FlowMappingValue)?;
                    return self.parse_node(false, false);
                }
                let mark = token.start_mark;
                self.state = ParserState::FlowMappingValue;
                return Ok(Self::empty_scalar(mark));
            } else if !matches!(token.data, TokenData::FlowMappingEnd) {
                self.push_state(ParserState::FlowMappingEmptyValue)?;
                return self.parse_node(false, false);
            }
        }
        let event = Event::spanning(EventData::MappingEnd, token.start_mark, token.end_mark);
        self.state = self.pop_state();
        let _ = self.marks.pop();
        self.skip_token();
        Ok(event)
    }

    fn parse_flow_mapping_value(&mut self, empty: bool) -> Result<Event, ParserError> {
        let mut token = self.peek()?;
        if empty {
            let mark = token.start_mark;
            self.state = ParserState::FlowMappingKey;
            return Ok(Self::empty_scalar(mark));
        }
        if let TokenData::Value = token.data {
            self.skip_token();
            token = self.peek()?;
            if !matches!(token.data, TokenData::FlowEntry | TokenData::FlowMappingEnd) {
                self.push_state(ParserState::FlowMappingKey)?;
                return self.parse_node(false, false);
            }
        }
        let mark = token.start_mark;
        self.state = ParserState::FlowMappingKey;
        Ok(Self::empty_scalar(mark))
    }

    fn empty_scalar(mark: Mark) -> Event {
        Event::spanning(
            EventData::Scalar {
                anchor: None,
                tag: None,
                value: String::new(),
                plain_implicit: true,
                quoted_implicit: false,
                style: ScalarStyle::Plain,
            },
            mark,
            mark,
        )
    }

    /// Install pending `%YAML`/`%TAG` directives into the new document state.
    fn process_directives(
        &mut self,
        wanted: bool,
    ) -> Result<(Option<VersionDirective>, Vec<TagDirective>), ParserError> {
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
        let mut version_directive: Option<VersionDirective> = None;
        let mut tag_directives = Vec::new();

        let mut token = self.peek_mut()?;
        loop {
            match &mut token.data {
                TokenData::VersionDirective { major, minor } => {
                    let mark = token.start_mark;
                    if version_directive.is_some() {
                        return Self::error("found duplicate %YAML directive", mark);
                    }
                    // 1.0 through 1.3 are accepted; 1.3 parses as 1.2.
                    if *major != 1 || *minor > 3 {
                        return Self::error("found incompatible YAML document", mark);
                    }
                    version_directive = Some(VersionDirective {
                        major: *major,
                        minor: *minor,
                    });
                }
                TokenData::TagDirective { handle, prefix } => {
                    let value = TagDirective {
                        handle: core::mem::take(handle),
                        prefix: core::mem::take(prefix),
                    };
                    let mark = token.start_mark;
                    self.append_tag_directive(value.clone(), false, mark)?;
                    tag_directives.push(value);
                }
                _ => break,
            }
            self.skip_token();
            token = self.peek_mut()?;
        }

        let start_mark = token.start_mark;
        for default_tag_directive in default_tag_directives {
            self.append_tag_directive(default_tag_directive, true, start_mark)?;
        }

        self.document_version = version_directive;
        if wanted {
            Ok((version_directive, tag_directives))
        } else {
            Ok((None, Vec::new()))
        }
    }

    fn append_tag_directive(
        &mut self,
        value: TagDirective,
        allow_duplicates: bool,
        mark: Mark,
    ) -> Result<(), ParserError> {
        for tag_directive in &self.tag_directives {
            if value.handle == tag_directive.handle {
                if allow_duplicates {
                    return Ok(());
                }
                return Self::error("found duplicate %TAG directive", mark);
            }
        }
        self.tag_directives.push(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_all(input: &str) -> Result<Vec<EventData>, ParserError> {
        let mut parser = Parser::new();
        parser.set_input(Input::from_str(input));
        let mut events = Vec::new();
        loop {
            let event = parser.parse()?;
            let done = matches!(event.data, EventData::StreamEnd);
            events.push(event.data);
            if done {
                return Ok(events);
            }
        }
    }

    fn plain(value: &str) -> EventData {
        EventData::Scalar {
            anchor: None,
            tag: None,
            value: value.into(),
            plain_implicit: true,
            quoted_implicit: false,
            style: ScalarStyle::Plain,
        }
    }

    #[test]
    fn block_mapping_events() {
        let events = parse_all("a: 1\nb: 2\n").unwrap();
        assert_eq!(
            events,
            vec![
                EventData::StreamStart,
                EventData::DocumentStart {
                    version_directive: None,
                    tag_directives: vec![],
                    implicit: true,
                },
                EventData::MappingStart {
                    anchor: None,
                    tag: None,
                    implicit: true,
                    style: MappingStyle::Block,
                },
                plain("a"),
                plain("1"),
                plain("b"),
                plain("2"),
                EventData::MappingEnd,
                EventData::DocumentEnd { implicit: true },
                EventData::StreamEnd,
            ]
        );
    }

    #[test]
    fn anchor_and_alias_events() {
        let events = parse_all("a: &x 1\nb: *x\n").unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            EventData::Scalar { anchor: Some(anchor), .. } if anchor == "x"
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, EventData::Alias { anchor } if anchor == "x")));
    }

    #[test]
    fn explicit_document_carries_its_state() {
        let events =
            parse_all("%YAML 1.1\n%TAG !e! tag:example.com,2024:\n---\n!e!thing {}\n").unwrap();
        let doc = events
            .iter()
            .find_map(|e| match e {
                EventData::DocumentStart {
                    version_directive,
                    tag_directives,
                    implicit,
                } => Some((version_directive, tag_directives, implicit)),
                _ => None,
            })
            .expect("no document start event");
        assert_eq!(
            *doc.0,
            Some(VersionDirective { major: 1, minor: 1 })
        );
        assert_eq!(doc.1.len(), 1);
        assert!(!doc.2);
        // The %TAG directive resolves the shorthand.
        assert!(events.iter().any(|e| matches!(
            e,
            EventData::MappingStart { tag: Some(tag), .. }
                if tag == "tag:example.com,2024:thing"
        )));
    }

    #[test]
    fn version_2_is_rejected() {
        let err = parse_all("%YAML 2.0\n---\nx\n").unwrap_err();
        assert!(matches!(err, ParserError::Problem { .. }));
    }

    #[test]
    fn version_1_3_is_accepted() {
        parse_all("%YAML 1.3\n---\nx\n").unwrap();
    }

    #[test]
    fn undefined_tag_handle_is_an_error() {
        let err = parse_all("!u!thing value\n").unwrap_err();
        assert!(matches!(err, ParserError::ProblemWithContext { .. }));
    }

    #[test]
    fn empty_document_produces_a_null_scalar() {
        let events = parse_all("---\n").unwrap();
        assert!(events.contains(&plain("")));
    }

    #[test]
    fn multiple_documents_each_get_their_own_state() {
        let events = parse_all("---\na\n---\nb\n").unwrap();
        let doc_starts = events
            .iter()
            .filter(|e| matches!(e, EventData::DocumentStart { .. }))
            .count();
        assert_eq!(doc_starts, 2);
    }

    #[test]
    fn depth_limit_is_enforced() {
        let mut options = ParseOptions::default();
        options.depth_limit = 8;
        let input = "[".repeat(64);
        let mut parser = Parser::with_options(options);
        let mut bytes = input.as_bytes().to_vec();
        bytes.extend_from_slice(&"]".repeat(64).into_bytes());
        let owned = Input::from_buffer(bytes);
        parser.set_input(owned);
        let mut result = Ok(());
        for _ in 0..256 {
            match parser.parse() {
                Ok(event) if matches!(event.data, EventData::StreamEnd) => break,
                Ok(_) => {}
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        let err = result.unwrap_err();
        assert!(matches!(err, ParserError::Problem { .. }));
    }

    #[test]
    fn comments_attach_to_the_following_node() {
        let mut options = ParseOptions::default();
        options.capture_comments = true;
        let mut parser = Parser::with_options(options);
        parser.set_input(Input::from_str("# top comment\nkey: value\n"));
        let mut commented = None;
        loop {
            let event = parser.parse().unwrap();
            if event.comment.is_some() {
                commented = Some((event.comment.clone().unwrap(), event));
                break;
            }
            if matches!(event.data, EventData::StreamEnd) {
                break;
            }
        }
        let (comment, event) = commented.expect("no event carried the comment");
        assert_eq!(comment, "top comment");
        assert!(matches!(event.data, EventData::MappingStart { .. }));
    }
}
