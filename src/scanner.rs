use std::collections::VecDeque;

use crate::chars::{
    as_digit, as_hex, is_alpha, is_blank, is_blankz, is_bom, is_break, is_breakz, is_digit,
    is_flow_indicator, is_hex, is_space, is_tab,
};
use crate::error::{ReaderError, ScannerError};
use crate::reader::{Input, Reader};
use crate::token::{Token, TokenData};
use crate::{Encoding, Mark, ScalarStyle};

/// Simple keys older than one line, or further than this many characters from
/// their start, can no longer be keys.
const MAX_SIMPLE_KEY_LENGTH: u64 = 1024;

/// How tabs around block indentation are treated.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
pub enum TabPolicy {
    /// Tabs never count as indentation; a tab where indentation is expected
    /// is an error.
    #[default]
    Forbid,
    /// Tabs are additionally accepted as inter-token whitespace in block
    /// context, where they cannot be indentation-significant.
    Tolerate,
}

/// A potential simple key: a `key:` candidate that has not yet been
/// disambiguated. A simple key is valid iff it sits on top of this stack and
/// its indent matches the current block context.
#[derive(Copy, Clone, Default, Debug)]
pub(crate) struct SimpleKey {
    /// Is a simple key possible at this point?
    pub possible: bool,
    /// Must this position produce a key (after `?` or in flow mappings)?
    pub required: bool,
    /// The queue position where the KEY token would be inserted.
    pub token_number: usize,
    /// Where the candidate starts.
    pub mark: Mark,
}

/// The scanner: turns decoded characters into a restartable token stream.
pub struct Scanner<'r> {
    reader: Reader<'r>,
    /// Current position in the input.
    pub(crate) mark: Mark,
    stream_start_produced: bool,
    pub(crate) stream_end_produced: bool,
    failed: bool,
    /// Produced but unconsumed tokens.
    pub(crate) tokens: VecDeque<Token>,
    /// Number of tokens already handed out.
    pub(crate) tokens_parsed: usize,
    pub(crate) token_available: bool,
    indent: i64,
    indents: Vec<i64>,
    flow_level: usize,
    simple_key_allowed: bool,
    simple_keys: Vec<SimpleKey>,
    json_mode: bool,
    capture_comments: bool,
    tab_policy: TabPolicy,
}

impl<'r> Default for Scanner<'r> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Scanner<'r> {
    pub fn new() -> Scanner<'r> {
        Scanner {
            reader: Reader::new(),
            mark: Mark::default(),
            stream_start_produced: false,
            stream_end_produced: false,
            failed: false,
            tokens: VecDeque::with_capacity(16),
            tokens_parsed: 0,
            token_available: false,
            indent: 0,
            indents: Vec::with_capacity(16),
            flow_level: 0,
            simple_key_allowed: false,
            simple_keys: Vec::with_capacity(16),
            json_mode: false,
            capture_comments: false,
            tab_policy: TabPolicy::default(),
        }
    }

    /// Reset the scanner to its initial state, dropping the input.
    pub fn reset(&mut self) {
        let json_mode = self.json_mode;
        let capture_comments = self.capture_comments;
        let tab_policy = self.tab_policy;
        *self = Self::new();
        self.json_mode = json_mode;
        self.capture_comments = capture_comments;
        self.tab_policy = tab_policy;
    }

    /// Set the input source. An input opened from a `.json` path switches the
    /// scanner into JSON mode.
    pub fn set_input(&mut self, input: Input<'r>) {
        self.reader.set_input(input);
        if self.reader.json_hint() {
            self.json_mode = true;
        }
    }

    /// Set the source encoding explicitly instead of detecting it.
    pub fn set_encoding(&mut self, encoding: Encoding) {
        self.reader.set_encoding(encoding);
    }

    /// Enable strict JSON lexical rules.
    pub fn set_json_mode(&mut self, json: bool) {
        self.json_mode = json;
    }

    /// Produce COMMENT tokens instead of consuming comments as whitespace.
    pub fn set_capture_comments(&mut self, capture: bool) {
        self.capture_comments = capture;
    }

    pub fn set_tab_policy(&mut self, policy: TabPolicy) {
        self.tab_policy = policy;
    }

    /// Scan the input stream and produce the next token.
    ///
    /// The initial token is STREAM-START and the final token is STREAM-END,
    /// which repeats on subsequent calls. After an error the scanner is
    /// terminal and refuses further work until [`Scanner::reset`].
    pub fn next_token(&mut self) -> Result<Token, ScannerError> {
        if self.failed {
            return Err(ScannerError::Failed);
        }
        if self.stream_end_produced {
            return Ok(Token {
                data: TokenData::StreamEnd,
                start_mark: self.mark,
                end_mark: self.mark,
            });
        }
        if !self.token_available {
            if let Err(err) = self.fetch_more_tokens() {
                self.failed = true;
                return Err(err);
            }
        }
        let token = self
            .tokens
            .pop_front()
            .expect("token is available but the queue is empty");
        self.token_available = false;
        self.tokens_parsed += 1;
        if let TokenData::StreamEnd = &token.data {
            self.stream_end_produced = true;
        }
        Ok(token)
    }

    fn error<T>(
        &self,
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
    ) -> Result<T, ScannerError> {
        Err(ScannerError::Problem {
            context,
            context_mark,
            problem,
            problem_mark: self.mark,
        })
    }

    pub(crate) fn fetch_more_tokens(&mut self) -> Result<(), ScannerError> {
        loop {
            let mut need_more_tokens = self.tokens.is_empty();
            if !need_more_tokens {
                self.stale_simple_keys()?;
                for simple_key in &self.simple_keys {
                    if simple_key.possible && simple_key.token_number == self.tokens_parsed {
                        need_more_tokens = true;
                        break;
                    }
                }
            }
            if !need_more_tokens {
                break;
            }
            self.fetch_next_token()?;
        }
        self.token_available = true;
        Ok(())
    }

    // Cursor primitives over the decoded character buffer.

    fn cache(&mut self, length: usize) -> Result<(), ReaderError> {
        self.reader.cache(length)
    }

    fn ch(&self, offset: usize) -> Option<char> {
        self.reader.buffer.get(offset).copied()
    }

    fn check(&self, wanted: char) -> bool {
        self.ch(0) == Some(wanted)
    }

    fn check_at(&self, wanted: char, offset: usize) -> bool {
        self.ch(offset) == Some(wanted)
    }

    fn at_end(&self) -> bool {
        self.reader.buffer.is_empty()
    }

    fn skip(&mut self) {
        let popped = self
            .reader
            .buffer
            .pop_front()
            .expect("unexpected end of input");
        self.mark.index += popped.len_utf8() as u64;
        self.mark.column += 1;
        self.reader.unread -= 1;
    }

    fn skip_line(&mut self) {
        if self.check('\r') && self.check_at('\n', 1) {
            self.mark.index += 2;
            self.mark.column = 0;
            self.mark.line += 1;
            self.reader.unread -= 2;
            self.reader.buffer.drain(0..2);
        } else if let Some(front) = self.ch(0) {
            if is_break(front) {
                self.mark.index += front.len_utf8() as u64;
                self.mark.column = 0;
                self.mark.line += 1;
                self.reader.unread -= 1;
                self.reader.buffer.pop_front();
            }
        }
    }

    fn read_into(&mut self, string: &mut String) {
        let popped = self
            .reader
            .buffer
            .pop_front()
            .expect("unexpected end of input");
        string.push(popped);
        self.mark.index += popped.len_utf8() as u64;
        self.mark.column += 1;
        self.reader.unread -= 1;
    }

    fn read_line_into(&mut self, string: &mut String) {
        if self.check('\r') && self.check_at('\n', 1) {
            string.push('\n');
            self.reader.buffer.drain(0..2);
            self.mark.index += 2;
            self.mark.column = 0;
            self.mark.line += 1;
            self.reader.unread -= 2;
        } else {
            let Some(front) = self.ch(0) else {
                panic!("unexpected end of input");
            };
            if is_break(front) {
                self.reader.buffer.pop_front();
                let width = front.len_utf8();
                // Unicode line separators are preserved verbatim; ASCII
                // breaks normalize to '\n'.
                if width == 3 {
                    string.push(front);
                } else {
                    string.push('\n');
                }
                self.mark.index += width as u64;
                self.mark.column = 0;
                self.mark.line += 1;
                self.reader.unread -= 1;
            }
        }
    }

    // Token dispatch.

    fn fetch_next_token(&mut self) -> Result<(), ScannerError> {
        self.cache(1)?;
        if !self.stream_start_produced {
            self.fetch_stream_start();
            return Ok(());
        }
        self.scan_to_next_token()?;
        self.stale_simple_keys()?;
        self.unroll_indent(self.mark.column as i64);
        self.cache(4)?;
        if self.at_end() {
            return self.fetch_stream_end();
        }
        if self.mark.column == 0 && self.check('%') {
            if self.json_mode {
                return self.error("while scanning", self.mark, "directives are not allowed in JSON mode");
            }
            return self.fetch_directive();
        }
        if self.mark.column == 0 && self.check_document_indicator('-') {
            if self.json_mode {
                return self.error("while scanning", self.mark, "document markers are not allowed in JSON mode");
            }
            return self.fetch_document_indicator(TokenData::DocumentStart);
        }
        if self.mark.column == 0 && self.check_document_indicator('.') {
            if self.json_mode {
                return self.error("while scanning", self.mark, "document markers are not allowed in JSON mode");
            }
            return self.fetch_document_indicator(TokenData::DocumentEnd);
        }
        if self.check('[') {
            return self.fetch_flow_collection_start(TokenData::FlowSequenceStart);
        }
        if self.check('{') {
            return self.fetch_flow_collection_start(TokenData::FlowMappingStart);
        }
        if self.check(']') {
            return self.fetch_flow_collection_end(TokenData::FlowSequenceEnd);
        }
        if self.check('}') {
            return self.fetch_flow_collection_end(TokenData::FlowMappingEnd);
        }
        if self.check(',') {
            return self.fetch_flow_entry();
        }
        if self.check('-') && is_blankz(self.ch(1)) {
            if self.json_mode {
                return self.error("while scanning", self.mark, "block entries are not allowed in JSON mode");
            }
            return self.fetch_block_entry();
        }
        if self.check('?') && (self.flow_level != 0 || is_blankz(self.ch(1))) {
            if self.json_mode {
                return self.error("while scanning", self.mark, "explicit keys are not allowed in JSON mode");
            }
            return self.fetch_key();
        }
        if self.check(':') && (self.flow_level != 0 || is_blankz(self.ch(1))) {
            return self.fetch_value();
        }
        if self.check('*') || self.check('&') {
            if self.json_mode {
                return self.error("while scanning", self.mark, "anchors and aliases are not allowed in JSON mode");
            }
            let alias = self.check('*');
            return self.fetch_anchor(alias);
        }
        if self.check('!') {
            if self.json_mode {
                return self.error("while scanning", self.mark, "tags are not allowed in JSON mode");
            }
            return self.fetch_tag();
        }
        if (self.check('|') || self.check('>')) && self.flow_level == 0 {
            if self.json_mode {
                return self.error("while scanning", self.mark, "block scalars are not allowed in JSON mode");
            }
            let literal = self.check('|');
            return self.fetch_block_scalar(literal);
        }
        if self.check('\'') {
            if self.json_mode {
                return self.error("while scanning", self.mark, "single-quoted strings are not allowed in JSON mode");
            }
            return self.fetch_flow_scalar(true);
        }
        if self.check('"') {
            return self.fetch_flow_scalar(false);
        }
        if self.can_start_plain_scalar() {
            return self.fetch_plain_scalar();
        }
        self.error(
            "while scanning for the next token",
            self.mark,
            "found character that cannot start any token",
        )
    }

    fn check_document_indicator(&self, marker: char) -> bool {
        self.check_at(marker, 0)
            && self.check_at(marker, 1)
            && self.check_at(marker, 2)
            && is_blankz(self.ch(3))
    }

    fn can_start_plain_scalar(&self) -> bool {
        let not_indicator = !(is_blankz(self.ch(0))
            || matches!(
                self.ch(0),
                Some(
                    '-' | '?'
                        | ':'
                        | ','
                        | '['
                        | ']'
                        | '{'
                        | '}'
                        | '#'
                        | '&'
                        | '*'
                        | '!'
                        | '|'
                        | '>'
                        | '\''
                        | '"'
                        | '%'
                        | '@'
                        | '`'
                )
            ));
        not_indicator
            || self.check('-') && !is_blank(self.ch(1))
            || self.flow_level == 0
                && (self.check('?') || self.check(':'))
                && !is_blankz(self.ch(1))
    }

    // Simple key bookkeeping.

    fn stale_simple_keys(&mut self) -> Result<(), ScannerError> {
        let current = self.mark;
        for simple_key in &mut self.simple_keys {
            let mark = simple_key.mark;
            if simple_key.possible
                && (mark.line < current.line || mark.index + MAX_SIMPLE_KEY_LENGTH < current.index)
            {
                if simple_key.required {
                    return Err(ScannerError::Problem {
                        context: "while scanning a simple key",
                        context_mark: mark,
                        problem: "could not find expected ':'",
                        problem_mark: current,
                    });
                }
                simple_key.possible = false;
            }
        }
        Ok(())
    }

    fn save_simple_key(&mut self) -> Result<(), ScannerError> {
        let required = self.flow_level == 0 && self.indent == self.mark.column as i64;
        if self.simple_key_allowed {
            let simple_key = SimpleKey {
                possible: true,
                required,
                token_number: self.tokens_parsed + self.tokens.len(),
                mark: self.mark,
            };
            self.remove_simple_key()?;
            *self
                .simple_keys
                .last_mut()
                .expect("simple key stack is empty") = simple_key;
        }
        Ok(())
    }

    fn remove_simple_key(&mut self) -> Result<(), ScannerError> {
        let simple_key = self
            .simple_keys
            .last_mut()
            .expect("simple key stack is empty");
        if simple_key.possible && simple_key.required {
            let mark = simple_key.mark;
            return Err(ScannerError::Problem {
                context: "while scanning a simple key",
                context_mark: mark,
                problem: "could not find expected ':'",
                problem_mark: self.mark,
            });
        }
        simple_key.possible = false;
        Ok(())
    }

    fn increase_flow_level(&mut self) {
        self.simple_keys.push(SimpleKey::default());
        self.flow_level += 1;
    }

    fn decrease_flow_level(&mut self) {
        if self.flow_level != 0 {
            self.flow_level -= 1;
            let _ = self.simple_keys.pop();
        }
    }

    fn roll_indent(&mut self, column: i64, number: Option<usize>, data: TokenData, mark: Mark) {
        if self.flow_level != 0 {
            return;
        }
        if self.indent < column {
            self.indents.push(self.indent);
            self.indent = column;
            let token = Token {
                data,
                start_mark: mark,
                end_mark: mark,
            };
            match number {
                None => self.tokens.push_back(token),
                Some(number) => self.tokens.insert(number - self.tokens_parsed, token),
            }
        }
    }

    fn unroll_indent(&mut self, column: i64) {
        if self.flow_level != 0 {
            return;
        }
        while self.indent > column {
            let token = Token {
                data: TokenData::BlockEnd,
                start_mark: self.mark,
                end_mark: self.mark,
            };
            self.tokens.push_back(token);
            self.indent = self.indents.pop().expect("indent stack is empty");
        }
    }

    // Token producers.

    fn fetch_stream_start(&mut self) {
        self.indent = -1;
        self.simple_keys.push(SimpleKey::default());
        self.simple_key_allowed = true;
        self.stream_start_produced = true;
        let token = Token {
            data: TokenData::StreamStart {
                encoding: self.reader.encoding,
            },
            start_mark: self.mark,
            end_mark: self.mark,
        };
        self.tokens.push_back(token);
    }

    fn fetch_stream_end(&mut self) -> Result<(), ScannerError> {
        if self.mark.column != 0 {
            self.mark.column = 0;
            self.mark.line += 1;
        }
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let token = Token {
            data: TokenData::StreamEnd,
            start_mark: self.mark,
            end_mark: self.mark,
        };
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_directive()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_document_indicator(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let start_mark = self.mark;
        self.skip();
        self.skip();
        self.skip();
        let end_mark = self.mark;
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.increase_flow_level();
        self.simple_key_allowed = true;
        let start_mark = self.mark;
        self.skip();
        let end_mark = self.mark;
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, data: TokenData) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.decrease_flow_level();
        self.simple_key_allowed = false;
        let start_mark = self.mark;
        self.skip();
        let end_mark = self.mark;
        self.tokens.push_back(Token {
            data,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.mark;
        self.skip();
        let end_mark = self.mark;
        self.tokens.push_back(Token {
            data: TokenData::FlowEntry,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<(), ScannerError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return self.error(
                    "",
                    self.mark,
                    "block sequence entries are not allowed in this context",
                );
            }
            self.roll_indent(
                self.mark.column as i64,
                None,
                TokenData::BlockSequenceStart,
                self.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start_mark = self.mark;
        self.skip();
        let end_mark = self.mark;
        self.tokens.push_back(Token {
            data: TokenData::BlockEntry,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<(), ScannerError> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return self.error("", self.mark, "mapping keys are not allowed in this context");
            }
            self.roll_indent(
                self.mark.column as i64,
                None,
                TokenData::BlockMappingStart,
                self.mark,
            );
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = self.flow_level == 0;
        let start_mark = self.mark;
        self.skip();
        let end_mark = self.mark;
        self.tokens.push_back(Token {
            data: TokenData::Key,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<(), ScannerError> {
        let simple_key = *self
            .simple_keys
            .last()
            .expect("simple key stack is empty");
        if simple_key.possible {
            let token = Token {
                data: TokenData::Key,
                start_mark: simple_key.mark,
                end_mark: simple_key.mark,
            };
            self.tokens
                .insert(simple_key.token_number - self.tokens_parsed, token);
            self.simple_keys
                .last_mut()
                .expect("simple key stack is empty")
                .possible = false;
            self.roll_indent(
                simple_key.mark.column as i64,
                Some(simple_key.token_number),
                TokenData::BlockMappingStart,
                simple_key.mark,
            );
            self.simple_key_allowed = false;
        } else {
            if self.flow_level == 0 {
                if !self.simple_key_allowed {
                    return self.error(
                        "",
                        self.mark,
                        "mapping values are not allowed in this context",
                    );
                }
                self.roll_indent(
                    self.mark.column as i64,
                    None,
                    TokenData::BlockMappingStart,
                    self.mark,
                );
            }
            self.simple_key_allowed = self.flow_level == 0;
        }
        let start_mark = self.mark;
        self.skip();
        let end_mark = self.mark;
        self.tokens.push_back(Token {
            data: TokenData::Value,
            start_mark,
            end_mark,
        });
        Ok(())
    }

    fn fetch_anchor(&mut self, alias: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_anchor(alias)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, literal: bool) -> Result<(), ScannerError> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(literal)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, single: bool) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(single)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> Result<(), ScannerError> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_plain_scalar()?;
        if self.json_mode {
            if let TokenData::Scalar { value, .. } = &token.data {
                if !json_plain_ok(value) {
                    return self.error(
                        "while scanning a JSON value",
                        token.start_mark,
                        "expected true, false, null or a number",
                    );
                }
            }
        }
        self.tokens.push_back(token);
        Ok(())
    }

    /// Eat whitespace, line breaks and (uncaptured) comments up to the next
    /// token.
    fn scan_to_next_token(&mut self) -> Result<(), ScannerError> {
        loop {
            self.cache(1)?;
            if is_bom(self.ch(0)) {
                // The reader strips a legal leading BOM during encoding
                // detection; one can still reach the buffer here when the
                // encoding was set explicitly.
                if self.mark.index == 0 {
                    self.skip();
                } else {
                    return self.error(
                        "while scanning",
                        self.mark,
                        "byte order mark is only legal at stream start",
                    );
                }
            }
            self.cache(1)?;
            let tabs_ok = self.tab_policy == TabPolicy::Tolerate
                || self.flow_level != 0
                || !self.simple_key_allowed;
            while self.check(' ') || (tabs_ok && self.check('\t')) {
                self.skip();
                self.cache(1)?;
            }
            if self.check('#') {
                if self.capture_comments {
                    let start_mark = self.mark;
                    self.skip();
                    let mut text = String::new();
                    self.cache(1)?;
                    while !is_breakz(self.ch(0)) {
                        self.read_into(&mut text);
                        self.cache(1)?;
                    }
                    self.tokens.push_back(Token {
                        data: TokenData::Comment {
                            value: text.trim().to_string(),
                        },
                        start_mark,
                        end_mark: self.mark,
                    });
                } else {
                    while !is_breakz(self.ch(0)) {
                        self.skip();
                        self.cache(1)?;
                    }
                }
            }
            if !is_break(self.ch(0)) {
                break;
            }
            self.cache(2)?;
            self.skip_line();
            if self.flow_level == 0 {
                self.simple_key_allowed = true;
            }
        }
        Ok(())
    }

    fn scan_directive(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        self.skip();
        let name = self.scan_directive_name(start_mark)?;
        let data = if name == "YAML" {
            let (major, minor) = self.scan_version_directive_value(start_mark)?;
            TokenData::VersionDirective { major, minor }
        } else if name == "TAG" {
            let (handle, prefix) = self.scan_tag_directive_value(start_mark)?;
            TokenData::TagDirective { handle, prefix }
        } else {
            return self.error(
                "while scanning a directive",
                start_mark,
                "found unknown directive name",
            );
        };
        self.cache(1)?;
        while is_blank(self.ch(0)) {
            self.skip();
            self.cache(1)?;
        }
        if self.check('#') {
            while !is_breakz(self.ch(0)) {
                self.skip();
                self.cache(1)?;
            }
        }
        if !is_breakz(self.ch(0)) {
            return self.error(
                "while scanning a directive",
                start_mark,
                "did not find expected comment or line break",
            );
        }
        if is_break(self.ch(0)) {
            self.cache(2)?;
            self.skip_line();
        }
        Ok(Token {
            data,
            start_mark,
            end_mark: self.mark,
        })
    }

    fn scan_directive_name(&mut self, start_mark: Mark) -> Result<String, ScannerError> {
        let mut string = String::new();
        self.cache(1)?;
        while is_alpha(self.ch(0)) {
            self.read_into(&mut string);
            self.cache(1)?;
        }
        if string.is_empty() {
            self.error(
                "while scanning a directive",
                start_mark,
                "could not find expected directive name",
            )
        } else if !is_blankz(self.ch(0)) {
            self.error(
                "while scanning a directive",
                start_mark,
                "found unexpected non-alphabetical character",
            )
        } else {
            Ok(string)
        }
    }

    fn scan_version_directive_value(
        &mut self,
        start_mark: Mark,
    ) -> Result<(i32, i32), ScannerError> {
        self.cache(1)?;
        while is_blank(self.ch(0)) {
            self.skip();
            self.cache(1)?;
        }
        let major = self.scan_version_directive_number(start_mark)?;
        if !self.check('.') {
            return self.error(
                "while scanning a %YAML directive",
                start_mark,
                "did not find expected digit or '.' character",
            );
        }
        self.skip();
        let minor = self.scan_version_directive_number(start_mark)?;
        Ok((major, minor))
    }

    fn scan_version_directive_number(&mut self, start_mark: Mark) -> Result<i32, ScannerError> {
        const MAX_NUMBER_LENGTH: usize = 9;
        let mut value: i32 = 0;
        let mut length = 0;
        self.cache(1)?;
        while is_digit(self.ch(0)) {
            length += 1;
            if length > MAX_NUMBER_LENGTH {
                return self.error(
                    "while scanning a %YAML directive",
                    start_mark,
                    "found extremely long version number",
                );
            }
            value = value * 10 + as_digit(self.ch(0).expect("digit was checked")) as i32;
            self.skip();
            self.cache(1)?;
        }
        if length == 0 {
            return self.error(
                "while scanning a %YAML directive",
                start_mark,
                "did not find expected version number",
            );
        }
        Ok(value)
    }

    fn scan_tag_directive_value(
        &mut self,
        start_mark: Mark,
    ) -> Result<(String, String), ScannerError> {
        self.cache(1)?;
        while is_blank(self.ch(0)) {
            self.skip();
            self.cache(1)?;
        }
        let handle = self.scan_tag_handle(true, start_mark)?;
        self.cache(1)?;
        if !is_blank(self.ch(0)) {
            return self.error(
                "while scanning a %TAG directive",
                start_mark,
                "did not find expected whitespace",
            );
        }
        while is_blank(self.ch(0)) {
            self.skip();
            self.cache(1)?;
        }
        let prefix = self.scan_tag_uri(true, true, None, start_mark)?;
        self.cache(1)?;
        if !is_blankz(self.ch(0)) {
            return self.error(
                "while scanning a %TAG directive",
                start_mark,
                "did not find expected whitespace or line break",
            );
        }
        Ok((handle, prefix))
    }

    fn scan_anchor(&mut self, alias: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let start_mark = self.mark;
        self.skip();
        self.cache(1)?;
        while is_alpha(self.ch(0)) {
            self.read_into(&mut string);
            self.cache(1)?;
        }
        let end_mark = self.mark;
        let terminated = is_blankz(self.ch(0))
            || matches!(self.ch(0), Some('?' | ':' | ',' | ']' | '}' | '%' | '@' | '`'));
        if string.is_empty() || !terminated {
            return self.error(
                if alias {
                    "while scanning an alias"
                } else {
                    "while scanning an anchor"
                },
                start_mark,
                "did not find expected alphabetic or numeric character",
            );
        }
        Ok(Token {
            data: if alias {
                TokenData::Alias { value: string }
            } else {
                TokenData::Anchor { value: string }
            },
            start_mark,
            end_mark,
        })
    }

    fn scan_tag(&mut self) -> Result<Token, ScannerError> {
        let start_mark = self.mark;
        self.cache(2)?;

        let (handle, suffix) = if self.check_at('<', 1) {
            // Verbatim tag: !<uri>
            self.skip();
            self.skip();
            let suffix = self.scan_tag_uri(true, false, None, start_mark)?;
            if !self.check('>') {
                return self.error(
                    "while scanning a tag",
                    start_mark,
                    "did not find the expected '>'",
                );
            }
            self.skip();
            (String::new(), suffix)
        } else {
            let handle = self.scan_tag_handle(false, start_mark)?;
            if handle.starts_with('!') && handle.len() > 1 && handle.ends_with('!') {
                let suffix = self.scan_tag_uri(false, false, None, start_mark)?;
                (handle, suffix)
            } else {
                let mut suffix = self.scan_tag_uri(false, false, Some(&handle), start_mark)?;
                let mut handle = String::from("!");
                if suffix.is_empty() {
                    core::mem::swap(&mut handle, &mut suffix);
                }
                (handle, suffix)
            }
        };

        self.cache(1)?;
        if !is_blankz(self.ch(0)) && (self.flow_level == 0 || !self.check(',')) {
            return self.error(
                "while scanning a tag",
                start_mark,
                "did not find expected whitespace or line break",
            );
        }
        Ok(Token {
            data: TokenData::Tag { handle, suffix },
            start_mark,
            end_mark: self.mark,
        })
    }

    fn scan_tag_handle(&mut self, directive: bool, start_mark: Mark) -> Result<String, ScannerError> {
        let context = if directive {
            "while scanning a tag directive"
        } else {
            "while scanning a tag"
        };
        let mut string = String::new();
        self.cache(1)?;
        if !self.check('!') {
            return self.error(context, start_mark, "did not find expected '!'");
        }
        self.read_into(&mut string);
        self.cache(1)?;
        while is_alpha(self.ch(0)) {
            self.read_into(&mut string);
            self.cache(1)?;
        }
        if self.check('!') {
            self.read_into(&mut string);
        } else if directive && string != "!" {
            return self.error(context, start_mark, "did not find expected '!'");
        }
        Ok(string)
    }

    fn scan_tag_uri(
        &mut self,
        uri_char: bool,
        directive: bool,
        head: Option<&str>,
        start_mark: Mark,
    ) -> Result<String, ScannerError> {
        let head = head.unwrap_or("");
        let mut length = head.len();
        // The handle's '!' prefix was consumed with the handle; the rest of
        // the head belongs to the suffix.
        let mut string = if length > 1 {
            String::from(&head[1..])
        } else {
            String::new()
        };
        self.cache(1)?;

        let is_uri_char = |scanner: &Self| {
            is_alpha(scanner.ch(0))
                || matches!(
                    scanner.ch(0),
                    Some(
                        ';' | '/'
                            | '?'
                            | ':'
                            | '@'
                            | '&'
                            | '='
                            | '+'
                            | '$'
                            | '.'
                            | '%'
                            | '!'
                            | '~'
                            | '*'
                            | '\''
                            | '('
                            | ')'
                    )
                )
                || uri_char && matches!(scanner.ch(0), Some(',' | '[' | ']'))
        };

        while is_uri_char(self) {
            if self.check('%') {
                self.scan_uri_escapes(directive, start_mark, &mut string)?;
            } else {
                self.read_into(&mut string);
            }
            length += 1;
            self.cache(1)?;
        }
        if length == 0 {
            return self.error(
                if directive {
                    "while parsing a %TAG directive"
                } else {
                    "while parsing a tag"
                },
                start_mark,
                "did not find expected tag URI",
            );
        }
        Ok(string)
    }

    fn scan_uri_escapes(
        &mut self,
        directive: bool,
        start_mark: Mark,
        string: &mut String,
    ) -> Result<(), ScannerError> {
        let context = if directive {
            "while parsing a %TAG directive"
        } else {
            "while parsing a tag"
        };
        let mut width = 0usize;
        let mut value: u32 = 0;
        loop {
            self.cache(3)?;
            if !(self.check('%') && is_hex(self.ch(1)) && is_hex(self.ch(2))) {
                return self.error(context, start_mark, "did not find URI escaped octet");
            }
            let octet =
                (as_hex(self.ch(1).expect("hex was checked")) << 4) | as_hex(self.ch(2).expect("hex was checked"));
            if width == 0 {
                (width, value) = match octet {
                    o if o & 0x80 == 0 => (1, o),
                    o if o & 0xE0 == 0xC0 => (2, o & 0x1F),
                    o if o & 0xF0 == 0xE0 => (3, o & 0x0F),
                    o if o & 0xF8 == 0xF0 => (4, o & 0x07),
                    _ => {
                        return self.error(
                            context,
                            start_mark,
                            "found an incorrect leading UTF-8 octet",
                        )
                    }
                };
            } else {
                if octet & 0xC0 != 0x80 {
                    return self.error(
                        context,
                        start_mark,
                        "found an incorrect trailing UTF-8 octet",
                    );
                }
                value = (value << 6) | (octet & 0x3F);
            }
            self.skip();
            self.skip();
            self.skip();
            width -= 1;
            if width == 0 {
                break;
            }
        }
        let Some(ch) = char::from_u32(value) else {
            return self.error(context, start_mark, "found an invalid URI escape sequence");
        };
        string.push(ch);
        Ok(())
    }

    fn scan_block_scalar(&mut self, literal: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        // -1 strip, 0 clip, +1 keep.
        let mut chomping = 0i32;
        let mut increment = 0i64;
        let mut indent = 0i64;
        let mut leading_blank = false;
        let start_mark = self.mark;
        self.skip();
        self.cache(1)?;

        // Indicators: chomping and explicit indent, in either order.
        if self.check('+') || self.check('-') {
            chomping = if self.check('+') { 1 } else { -1 };
            self.skip();
            self.cache(1)?;
            if is_digit(self.ch(0)) {
                if self.check('0') {
                    return self.error(
                        "while scanning a block scalar",
                        start_mark,
                        "found an indentation indicator equal to 0",
                    );
                }
                increment = as_digit(self.ch(0).expect("digit was checked")) as i64;
                self.skip();
            }
        } else if is_digit(self.ch(0)) {
            if self.check('0') {
                return self.error(
                    "while scanning a block scalar",
                    start_mark,
                    "found an indentation indicator equal to 0",
                );
            }
            increment = as_digit(self.ch(0).expect("digit was checked")) as i64;
            self.skip();
            self.cache(1)?;
            if self.check('+') || self.check('-') {
                chomping = if self.check('+') { 1 } else { -1 };
                self.skip();
            }
        }

        self.cache(1)?;
        while is_blank(self.ch(0)) {
            self.skip();
            self.cache(1)?;
        }
        if self.check('#') {
            while !is_breakz(self.ch(0)) {
                self.skip();
                self.cache(1)?;
            }
        }
        if !is_breakz(self.ch(0)) {
            return self.error(
                "while scanning a block scalar",
                start_mark,
                "did not find expected comment or line break",
            );
        }
        if is_break(self.ch(0)) {
            self.cache(2)?;
            self.skip_line();
        }

        let mut end_mark = self.mark;
        if increment != 0 {
            indent = if self.indent >= 0 {
                self.indent + increment
            } else {
                increment
            };
        }
        self.scan_block_scalar_breaks(&mut indent, &mut trailing_breaks, start_mark, &mut end_mark)?;

        self.cache(1)?;
        while self.mark.column as i64 == indent && !self.at_end() {
            let trailing_blank = is_blank(self.ch(0));
            if !literal && leading_break.starts_with('\n') && !leading_blank && !trailing_blank {
                if trailing_breaks.is_empty() {
                    string.push(' ');
                }
                leading_break.clear();
            } else {
                string.push_str(&leading_break);
                leading_break.clear();
            }
            string.push_str(&trailing_breaks);
            trailing_breaks.clear();
            leading_blank = is_blank(self.ch(0));
            while !is_breakz(self.ch(0)) {
                self.read_into(&mut string);
                self.cache(1)?;
            }
            self.cache(2)?;
            self.read_line_into(&mut leading_break);
            self.scan_block_scalar_breaks(
                &mut indent,
                &mut trailing_breaks,
                start_mark,
                &mut end_mark,
            )?;
        }

        if chomping != -1 {
            string.push_str(&leading_break);
        }
        if chomping == 1 {
            string.push_str(&trailing_breaks);
        }

        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: if literal {
                    ScalarStyle::Literal
                } else {
                    ScalarStyle::Folded
                },
            },
            start_mark,
            end_mark,
        })
    }

    fn scan_block_scalar_breaks(
        &mut self,
        indent: &mut i64,
        breaks: &mut String,
        start_mark: Mark,
        end_mark: &mut Mark,
    ) -> Result<(), ScannerError> {
        let mut max_indent = 0i64;
        *end_mark = self.mark;
        loop {
            self.cache(1)?;
            while (*indent == 0 || (self.mark.column as i64) < *indent) && is_space(self.ch(0)) {
                self.skip();
                self.cache(1)?;
            }
            if self.mark.column as i64 > max_indent {
                max_indent = self.mark.column as i64;
            }
            if (*indent == 0 || (self.mark.column as i64) < *indent) && is_tab(self.ch(0)) {
                return self.error(
                    "while scanning a block scalar",
                    start_mark,
                    "found a tab character where an indentation space is expected",
                );
            }
            if !is_break(self.ch(0)) {
                break;
            }
            self.cache(2)?;
            self.read_line_into(breaks);
            *end_mark = self.mark;
        }
        if *indent == 0 {
            *indent = max_indent.max(self.indent + 1).max(1);
        }
        Ok(())
    }

    fn scan_flow_scalar(&mut self, single: bool) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks;

        let start_mark = self.mark;
        self.skip();
        loop {
            self.cache(4)?;
            if self.mark.column == 0
                && (self.check_document_indicator('-') || self.check_document_indicator('.'))
            {
                return self.error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected document indicator",
                );
            }
            if self.at_end() {
                return self.error(
                    "while scanning a quoted scalar",
                    start_mark,
                    "found unexpected end of stream",
                );
            }
            self.cache(2)?;
            leading_blanks = false;
            while !is_blankz(self.ch(0)) {
                if single && self.check('\'') && self.check_at('\'', 1) {
                    string.push('\'');
                    self.skip();
                    self.skip();
                } else if self.check(if single { '\'' } else { '"' }) {
                    break;
                } else if !single && self.check('\\') && is_break(self.ch(1)) {
                    // Escaped line break: eat it and fold nothing.
                    self.cache(3)?;
                    self.skip();
                    self.skip_line();
                    leading_blanks = true;
                    break;
                } else if !single && self.check('\\') {
                    self.scan_double_quoted_escape(start_mark, &mut string)?;
                } else {
                    self.read_into(&mut string);
                }
                self.cache(2)?;
            }
            self.cache(1)?;
            if self.check(if single { '\'' } else { '"' }) {
                break;
            }
            self.cache(1)?;
            while is_blank(self.ch(0)) || is_break(self.ch(0)) {
                if is_blank(self.ch(0)) {
                    if leading_blanks {
                        self.skip();
                    } else {
                        self.read_into(&mut whitespaces);
                    }
                } else {
                    self.cache(2)?;
                    if leading_blanks {
                        self.read_line_into(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.read_line_into(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.cache(1)?;
            }
            if leading_blanks {
                fold_breaks(&mut string, &mut leading_break, &mut trailing_breaks);
            } else {
                string.push_str(&whitespaces);
                whitespaces.clear();
            }
        }

        self.skip();
        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: if single {
                    ScalarStyle::SingleQuoted
                } else {
                    ScalarStyle::DoubleQuoted
                },
            },
            start_mark,
            end_mark: self.mark,
        })
    }

    fn scan_double_quoted_escape(
        &mut self,
        start_mark: Mark,
        string: &mut String,
    ) -> Result<(), ScannerError> {
        let mut code_length = 0usize;
        match self.ch(1) {
            Some('0') => string.push('\0'),
            Some('a') => string.push('\x07'),
            Some('b') => string.push('\x08'),
            Some('t' | '\t') => string.push('\t'),
            Some('n') => string.push('\n'),
            Some('v') => string.push('\x0B'),
            Some('f') => string.push('\x0C'),
            Some('r') => string.push('\r'),
            Some('e') => string.push('\x1B'),
            Some(' ') => string.push(' '),
            Some('"') => string.push('"'),
            Some('/') => string.push('/'),
            Some('\\') => string.push('\\'),
            Some('N') => string.push('\u{0085}'),
            Some('_') => string.push('\u{00A0}'),
            Some('L') => string.push('\u{2028}'),
            Some('P') => string.push('\u{2029}'),
            Some('x') => code_length = 2,
            Some('u') => code_length = 4,
            Some('U') => code_length = 8,
            _ => {
                return self.error(
                    "while parsing a quoted scalar",
                    start_mark,
                    "found unknown escape character",
                )
            }
        }
        self.skip();
        self.skip();
        if code_length != 0 {
            let mut value: u32 = 0;
            self.cache(code_length)?;
            for k in 0..code_length {
                if !is_hex(self.ch(k)) {
                    return self.error(
                        "while parsing a quoted scalar",
                        start_mark,
                        "did not find expected hexadecimal number",
                    );
                }
                value = (value << 4) + as_hex(self.ch(k).expect("hex was checked"));
            }
            let Some(ch) = char::from_u32(value) else {
                return self.error(
                    "while parsing a quoted scalar",
                    start_mark,
                    "found invalid Unicode character escape code",
                );
            };
            string.push(ch);
            for _ in 0..code_length {
                self.skip();
            }
        }
        Ok(())
    }

    fn scan_plain_scalar(&mut self) -> Result<Token, ScannerError> {
        let mut string = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;
        let indent = self.indent + 1;
        let start_mark = self.mark;
        let mut end_mark = start_mark;
        loop {
            self.cache(4)?;
            if self.mark.column == 0
                && (self.check_document_indicator('-') || self.check_document_indicator('.'))
            {
                break;
            }
            if self.check('#') {
                break;
            }
            while !is_blankz(self.ch(0)) {
                if self.flow_level != 0
                    && self.check(':')
                    && (is_flow_indicator(self.ch(1)) || self.check_at('?', 1))
                {
                    return self.error(
                        "while scanning a plain scalar",
                        start_mark,
                        "found unexpected ':'",
                    );
                }
                if self.check(':') && is_blankz(self.ch(1))
                    || self.flow_level != 0 && is_flow_indicator(self.ch(0))
                {
                    break;
                }
                if leading_blanks || !whitespaces.is_empty() {
                    if leading_blanks {
                        fold_breaks(&mut string, &mut leading_break, &mut trailing_breaks);
                        leading_blanks = false;
                    } else {
                        string.push_str(&whitespaces);
                        whitespaces.clear();
                    }
                }
                self.read_into(&mut string);
                end_mark = self.mark;
                self.cache(2)?;
            }
            if !(is_blank(self.ch(0)) || is_break(self.ch(0))) {
                break;
            }
            self.cache(1)?;
            while is_blank(self.ch(0)) || is_break(self.ch(0)) {
                if is_blank(self.ch(0)) {
                    if leading_blanks && (self.mark.column as i64) < indent && is_tab(self.ch(0)) {
                        return self.error(
                            "while scanning a plain scalar",
                            start_mark,
                            "found a tab character that violates indentation",
                        );
                    }
                    if leading_blanks {
                        self.skip();
                    } else {
                        self.read_into(&mut whitespaces);
                    }
                } else {
                    self.cache(2)?;
                    if leading_blanks {
                        self.read_line_into(&mut trailing_breaks);
                    } else {
                        whitespaces.clear();
                        self.read_line_into(&mut leading_break);
                        leading_blanks = true;
                    }
                }
                self.cache(1)?;
            }
            if self.flow_level == 0 && (self.mark.column as i64) < indent {
                break;
            }
        }

        if leading_blanks {
            self.simple_key_allowed = true;
        }
        Ok(Token {
            data: TokenData::Scalar {
                value: string,
                style: ScalarStyle::Plain,
            },
            start_mark,
            end_mark,
        })
    }
}

/// Fold a run of line breaks per the flow/plain folding rules: a single break
/// becomes a space; additional breaks are kept.
fn fold_breaks(string: &mut String, leading_break: &mut String, trailing_breaks: &mut String) {
    if leading_break.starts_with('\n') {
        if trailing_breaks.is_empty() {
            string.push(' ');
        } else {
            string.push_str(trailing_breaks);
            trailing_breaks.clear();
        }
        leading_break.clear();
    } else {
        string.push_str(leading_break);
        string.push_str(trailing_breaks);
        leading_break.clear();
        trailing_breaks.clear();
    }
}

/// Is this plain token a legal JSON literal (`true`, `false`, `null` or a
/// number per RFC 8259)?
fn json_plain_ok(value: &str) -> bool {
    if matches!(value, "true" | "false" | "null") {
        return true;
    }
    let mut rest = value.strip_prefix('-').unwrap_or(value).as_bytes();
    // Integer part: 0, or a nonzero digit followed by digits.
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
    use pretty_assertions::assert_eq;

    fn scan_all(input: &str) -> Result<Vec<TokenData>, ScannerError> {
        let mut scanner = Scanner::new();
        scanner.set_input(Input::from_str(input));
        let mut tokens = Vec::new();
        loop {
            let token = scanner.next_token()?;
            let done = matches!(token.data, TokenData::StreamEnd);
            tokens.push(token.data);
            if done {
                return Ok(tokens);
            }
        }
    }

    #[test]
    fn simple_block_mapping() {
        let tokens = scan_all("key: value\n").unwrap();
        assert_eq!(
            tokens,
            vec![
                TokenData::StreamStart {
                    encoding: Encoding::Utf8
                },
                TokenData::BlockMappingStart,
                TokenData::Key,
                TokenData::Scalar {
                    value: "key".into(),
                    style: ScalarStyle::Plain
                },
                TokenData::Value,
                TokenData::Scalar {
                    value: "value".into(),
                    style: ScalarStyle::Plain
                },
                TokenData::BlockEnd,
                TokenData::StreamEnd,
            ]
        );
    }

    #[test]
    fn double_quoted_escapes() {
        let tokens = scan_all(r#""a\tb\u0041\x2D\U0001F600""#).unwrap();
        assert!(tokens.iter().any(|t| matches!(
            t,
            TokenData::Scalar { value, style: ScalarStyle::DoubleQuoted } if value == "a\tbA-\u{1F600}"
        )));
    }

    #[test]
    fn single_quote_escape() {
        let tokens = scan_all("'it''s'").unwrap();
        assert!(tokens.iter().any(|t| matches!(
            t,
            TokenData::Scalar { value, style: ScalarStyle::SingleQuoted } if value == "it's"
        )));
    }

    #[test]
    fn literal_block_scalar_keeps_breaks() {
        let tokens = scan_all("key: |\n  line1\n  line2\n").unwrap();
        assert!(tokens.iter().any(|t| matches!(
            t,
            TokenData::Scalar { value, style: ScalarStyle::Literal } if value == "line1\nline2\n"
        )));
    }

    #[test]
    fn folded_block_scalar_joins_lines() {
        let tokens = scan_all("key: >\n  line1\n  line2\n").unwrap();
        assert!(tokens.iter().any(|t| matches!(
            t,
            TokenData::Scalar { value, style: ScalarStyle::Folded } if value == "line1 line2\n"
        )));
    }

    #[test]
    fn chomping_indicators() {
        let kept = scan_all("key: |+\n  text\n\n\n").unwrap();
        assert!(kept.iter().any(|t| matches!(
            t,
            TokenData::Scalar { value, .. } if value == "text\n\n\n"
        )));
        let stripped = scan_all("key: |-\n  text\n\n\n").unwrap();
        assert!(stripped.iter().any(|t| matches!(
            t,
            TokenData::Scalar { value, .. } if value == "text"
        )));
    }

    #[test]
    fn flow_collection_tokens() {
        let tokens = scan_all("[a, {b: c}]").unwrap();
        assert_eq!(
            tokens,
            vec![
                TokenData::StreamStart {
                    encoding: Encoding::Utf8
                },
                TokenData::FlowSequenceStart,
                TokenData::Scalar {
                    value: "a".into(),
                    style: ScalarStyle::Plain
                },
                TokenData::FlowEntry,
                TokenData::FlowMappingStart,
                TokenData::Key,
                TokenData::Scalar {
                    value: "b".into(),
                    style: ScalarStyle::Plain
                },
                TokenData::Value,
                TokenData::Scalar {
                    value: "c".into(),
                    style: ScalarStyle::Plain
                },
                TokenData::FlowMappingEnd,
                TokenData::FlowSequenceEnd,
                TokenData::StreamEnd,
            ]
        );
    }

    #[test]
    fn anchors_and_aliases() {
        let tokens = scan_all("a: &x 1\nb: *x\n").unwrap();
        assert!(tokens
            .iter()
            .any(|t| matches!(t, TokenData::Anchor { value } if value == "x")));
        assert!(tokens
            .iter()
            .any(|t| matches!(t, TokenData::Alias { value } if value == "x")));
    }

    #[test]
    fn directives_and_document_markers() {
        let tokens = scan_all("%YAML 1.2\n%TAG !e! tag:example.com,2024:\n---\nx\n...\n").unwrap();
        assert!(tokens
            .iter()
            .any(|t| matches!(t, TokenData::VersionDirective { major: 1, minor: 2 })));
        assert!(tokens.iter().any(|t| matches!(
            t,
            TokenData::TagDirective { handle, prefix }
                if handle == "!e!" && prefix == "tag:example.com,2024:"
        )));
        assert!(tokens.iter().any(|t| matches!(t, TokenData::DocumentStart)));
        assert!(tokens.iter().any(|t| matches!(t, TokenData::DocumentEnd)));
    }

    #[test]
    fn comments_are_skipped_by_default() {
        let tokens = scan_all("a: 1 # trailing\n# leading\nb: 2\n").unwrap();
        assert!(!tokens
            .iter()
            .any(|t| matches!(t, TokenData::Comment { .. })));
    }

    #[test]
    fn comments_are_captured_on_request() {
        let mut scanner = Scanner::new();
        scanner.set_capture_comments(true);
        scanner.set_input(Input::from_str("# leading\na: 1\n"));
        let mut comments = Vec::new();
        loop {
            let token = scanner.next_token().unwrap();
            match token.data {
                TokenData::Comment { value } => comments.push(value),
                TokenData::StreamEnd => break,
                _ => {}
            }
        }
        assert_eq!(comments, vec!["leading".to_string()]);
    }

    #[test]
    fn tab_indentation_is_rejected() {
        let err = scan_all("a:\n\tb: 1\n").unwrap_err();
        assert!(matches!(err, ScannerError::Problem { .. }));
    }

    #[test]
    fn scanner_is_terminal_after_an_error() {
        let mut scanner = Scanner::new();
        scanner.set_input(Input::from_str("'unterminated"));
        let mut saw_error = false;
        for _ in 0..4 {
            match scanner.next_token() {
                Ok(_) => {}
                Err(ScannerError::Failed) => {
                    assert!(saw_error);
                    return;
                }
                Err(_) => saw_error = true,
            }
        }
        panic!("scanner did not enter the terminal error state");
    }

    #[test]
    fn json_mode_rejects_anchors() {
        let mut scanner = Scanner::new();
        scanner.set_json_mode(true);
        scanner.set_input(Input::from_str("[&a 1]"));
        let mut result = Ok(());
        for _ in 0..8 {
            match scanner.next_token() {
                Ok(token) if matches!(token.data, TokenData::StreamEnd) => break,
                Ok(_) => {}
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        assert!(result.is_err());
    }

    #[test]
    fn json_mode_accepts_strict_literals() {
        let mut scanner = Scanner::new();
        scanner.set_json_mode(true);
        scanner.set_input(Input::from_str(r#"{"n": 1.5, "t": true, "z": null}"#));
        loop {
            let token = scanner.next_token().unwrap();
            if matches!(token.data, TokenData::StreamEnd) {
                break;
            }
        }
    }

    #[test]
    fn json_plain_literals() {
        assert!(json_plain_ok("true"));
        assert!(json_plain_ok("-12.5e3"));
        assert!(json_plain_ok("0"));
        assert!(!json_plain_ok("01"));
        assert!(!json_plain_ok("yes"));
        assert!(!json_plain_ok(".5"));
        assert!(!json_plain_ok("1."));
    }
}
