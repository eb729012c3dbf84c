use std::collections::VecDeque;
use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use crate::error::ReaderError;
use crate::Encoding;

pub(crate) const RAW_BUFFER_SIZE: usize = 16384;
pub(crate) const BUFFER_SIZE: usize = RAW_BUFFER_SIZE;

const BOM_UTF8: &[u8] = b"\xEF\xBB\xBF";
const BOM_UTF16LE: &[u8] = b"\xFF\xFE";
const BOM_UTF16BE: &[u8] = b"\xFE\xFF";

enum Source<'r> {
    Slice(&'r [u8]),
    Owned(Vec<u8>),
    Mapped(memmap2::Mmap),
    Stream(&'r mut dyn BufRead),
}

/// A byte source for the scanner.
///
/// In-memory inputs (slices, owned buffers, memory-mapped files) are consumed
/// without copying beyond the decode buffer; stream inputs are pulled through
/// a fixed-size raw buffer.
pub struct Input<'r> {
    source: Source<'r>,
    cursor: usize,
    json_hint: bool,
}

impl<'r> Input<'r> {
    /// Borrow a string as input.
    pub fn from_str(input: &'r str) -> Self {
        Self::from_slice(input.as_bytes())
    }

    /// Borrow a byte slice as input.
    pub fn from_slice(input: &'r [u8]) -> Self {
        Self {
            source: Source::Slice(input),
            cursor: 0,
            json_hint: false,
        }
    }

    /// Take ownership of a byte buffer. The buffer lives as long as the
    /// scanner that consumes it.
    pub fn from_buffer(input: Vec<u8>) -> Self {
        Self {
            source: Source::Owned(input),
            cursor: 0,
            json_hint: false,
        }
    }

    /// Read from a generic buffered reader.
    pub fn from_reader(input: &'r mut dyn BufRead) -> Self {
        Self {
            source: Source::Stream(input),
            cursor: 0,
            json_hint: false,
        }
    }

    /// Memory-map a file as input. A `.json` extension switches the scanner
    /// into JSON mode unless the parse options say otherwise.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let json_hint = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let file = File::open(path)?;
        let source = if file.metadata()?.len() == 0 {
            Source::Owned(Vec::new())
        } else {
            // The mapping must outlive every token scanned from it, which the
            // Input's ownership guarantees; the file must not be truncated
            // while the map is alive.
            #[allow(unsafe_code)]
            let map = unsafe { memmap2::Mmap::map(&file)? };
            Source::Mapped(map)
        };
        log::trace!("opened input {:?} (json hint: {json_hint})", path);
        Ok(Self {
            source,
            cursor: 0,
            json_hint,
        })
    }

    /// Force or clear the JSON-mode hint carried by this input.
    pub fn set_json_hint(&mut self, json: bool) {
        self.json_hint = json;
    }

    pub(crate) fn json_hint(&self) -> bool {
        self.json_hint
    }

    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        let bytes = match &mut self.source {
            Source::Slice(data) => &data[self.cursor.min(data.len())..],
            Source::Owned(data) => &data[self.cursor.min(data.len())..],
            Source::Mapped(map) => &map[self.cursor.min(map.len())..],
            Source::Stream(reader) => return reader.read(out),
        };
        let n = bytes.len().min(out.len());
        out[..n].copy_from_slice(&bytes[..n]);
        self.cursor += n;
        Ok(n)
    }
}

/// Incremental decoder feeding the scanner's character buffer.
pub(crate) struct Reader<'r> {
    input: Option<Input<'r>>,
    raw: VecDeque<u8>,
    /// Decoded characters not yet consumed by the scanner.
    pub(crate) buffer: VecDeque<char>,
    /// Number of characters in `buffer`.
    pub(crate) unread: usize,
    pub(crate) encoding: Encoding,
    /// Byte offset of the next character to decode.
    pub(crate) offset: usize,
    eof: bool,
}

impl<'r> Reader<'r> {
    pub(crate) fn new() -> Self {
        Self {
            input: None,
            raw: VecDeque::with_capacity(RAW_BUFFER_SIZE),
            buffer: VecDeque::with_capacity(BUFFER_SIZE),
            unread: 0,
            encoding: Encoding::Any,
            offset: 0,
            eof: false,
        }
    }

    pub(crate) fn set_input(&mut self, input: Input<'r>) {
        assert!(self.input.is_none(), "input is already set");
        self.input = Some(input);
    }

    pub(crate) fn set_encoding(&mut self, encoding: Encoding) {
        assert!(self.encoding == Encoding::Any, "encoding is already set");
        self.encoding = encoding;
    }

    /// Ensure at least `length` characters are decoded, or end of input has
    /// been reached.
    pub(crate) fn cache(&mut self, length: usize) -> Result<(), ReaderError> {
        if self.unread >= length {
            return Ok(());
        }
        self.update(length)
    }

    fn update(&mut self, length: usize) -> Result<(), ReaderError> {
        assert!(self.input.is_some(), "no input set");
        if self.eof && self.raw.is_empty() {
            return Ok(());
        }
        if self.encoding == Encoding::Any {
            self.determine_encoding()?;
        }
        let mut first = true;
        while self.unread < length {
            if self.eof && self.raw.is_empty() {
                return Ok(());
            }
            if !first || self.raw.is_empty() {
                self.update_raw()?;
            }
            first = false;
            match self.encoding {
                Encoding::Utf8 => self.decode_utf8()?,
                Encoding::Utf16Le => self.decode_utf16(false)?,
                Encoding::Utf16Be => self.decode_utf16(true)?,
                Encoding::Any => unreachable!("encoding was determined above"),
            }
        }
        if self.offset >= usize::MAX / 2 {
            return Err(ReaderError::Problem {
                problem: "input is too long",
                offset: self.offset,
            });
        }
        Ok(())
    }

    fn determine_encoding(&mut self) -> Result<(), ReaderError> {
        while !self.eof && self.raw.len() < 3 {
            self.update_raw()?;
        }
        if self.raw_starts_with(BOM_UTF16LE) {
            self.encoding = Encoding::Utf16Le;
            self.raw.drain(0..2);
            self.offset += 2;
        } else if self.raw_starts_with(BOM_UTF16BE) {
            self.encoding = Encoding::Utf16Be;
            self.raw.drain(0..2);
            self.offset += 2;
        } else if self.raw_starts_with(BOM_UTF8) {
            self.encoding = Encoding::Utf8;
            self.raw.drain(0..3);
            self.offset += 3;
        } else {
            self.encoding = Encoding::Utf8;
        }
        Ok(())
    }

    fn raw_starts_with(&self, needle: &[u8]) -> bool {
        self.raw.len() >= needle.len() && self.raw.iter().take(needle.len()).eq(needle.iter())
    }

    fn update_raw(&mut self) -> Result<(), ReaderError> {
        if self.raw.len() >= RAW_BUFFER_SIZE || self.eof {
            return Ok(());
        }
        let len_before = self.raw.len();
        self.raw.resize(RAW_BUFFER_SIZE, 0);
        let contiguous = self.raw.make_contiguous();
        let size_read = self
            .input
            .as_mut()
            .expect("input was checked above")
            .read(&mut contiguous[len_before..])?;
        self.raw.truncate(len_before + size_read);
        if size_read == 0 {
            self.eof = true;
        }
        Ok(())
    }

    fn decode_utf8(&mut self) -> Result<(), ReaderError> {
        let Some(first) = self.raw.front().copied() else {
            return Ok(());
        };
        let (width, mut value) = match first {
            b if b & 0x80 == 0 => (1, u32::from(b)),
            b if b & 0xE0 == 0xC0 => (2, u32::from(b & 0x1F)),
            b if b & 0xF0 == 0xE0 => (3, u32::from(b & 0x0F)),
            b if b & 0xF8 == 0xF0 => (4, u32::from(b & 0x07)),
            b => {
                return Err(ReaderError::InvalidUtf8 {
                    offset: self.offset,
                    value: b,
                })
            }
        };
        if self.raw.len() < width {
            if self.eof {
                return Err(ReaderError::Problem {
                    problem: "incomplete UTF-8 octet sequence",
                    offset: self.offset,
                });
            }
            return Ok(());
        }
        for i in 1..width {
            let trailing = self.raw[i];
            if trailing & 0xC0 != 0x80 {
                return Err(ReaderError::InvalidUtf8 {
                    offset: self.offset + i,
                    value: trailing,
                });
            }
            value = (value << 6) | u32::from(trailing & 0x3F);
        }
        let overlong = !(width == 1
            || width == 2 && value >= 0x80
            || width == 3 && value >= 0x800
            || width == 4 && value >= 0x10000);
        if overlong {
            return Err(ReaderError::Problem {
                problem: "overlong UTF-8 sequence",
                offset: self.offset,
            });
        }
        let Some(ch) = char::from_u32(value) else {
            return Err(ReaderError::Problem {
                problem: "invalid Unicode character",
                offset: self.offset,
            });
        };
        self.raw.drain(..width);
        self.push_char(ch)
    }

    fn decode_utf16(&mut self, big_endian: bool) -> Result<(), ReaderError> {
        if self.raw.is_empty() {
            return Ok(());
        }
        let incomplete = |offset| ReaderError::Problem {
            problem: "incomplete UTF-16 character",
            offset,
        };
        if self.raw.len() < 2 {
            if self.eof {
                return Err(incomplete(self.offset));
            }
            return Ok(());
        }
        let unit = |bytes: [u8; 2]| {
            if big_endian {
                u16::from_be_bytes(bytes)
            } else {
                u16::from_le_bytes(bytes)
            }
        };
        let first = unit([self.raw[0], self.raw[1]]);
        if first & 0xFC00 == 0xDC00 {
            return Err(ReaderError::InvalidUtf16 { value: first });
        }
        let (width, value) = if first & 0xFC00 == 0xD800 {
            if self.raw.len() < 4 {
                if self.eof {
                    return Err(incomplete(self.offset));
                }
                return Ok(());
            }
            let second = unit([self.raw[2], self.raw[3]]);
            if second & 0xFC00 != 0xDC00 {
                return Err(ReaderError::InvalidUtf16 { value: second });
            }
            let value = 0x10000
                + ((u32::from(first) & 0x3FF) << 10)
                + (u32::from(second) & 0x3FF);
            (4, value)
        } else {
            (2, u32::from(first))
        };
        let Some(ch) = char::from_u32(value) else {
            return Err(ReaderError::Problem {
                problem: "invalid Unicode character",
                offset: self.offset,
            });
        };
        self.raw.drain(..width);
        self.push_char(ch)
    }

    fn push_char(&mut self, ch: char) -> Result<(), ReaderError> {
        let allowed = ch == '\x09'
            || ch == '\x0A'
            || ch == '\x0D'
            || ('\x20'..='\x7E').contains(&ch)
            || ch == '\u{0085}'
            || ('\u{00A0}'..='\u{D7FF}').contains(&ch)
            || ('\u{E000}'..='\u{FFFD}').contains(&ch)
            || ('\u{10000}'..='\u{10FFFF}').contains(&ch);
        if !allowed {
            return Err(ReaderError::Problem {
                problem: "control characters are not allowed",
                offset: self.offset,
            });
        }
        self.buffer.push_back(ch);
        self.offset += if self.encoding == Encoding::Utf8 {
            ch.len_utf8()
        } else {
            ch.len_utf16() * 2
        };
        self.unread += 1;
        Ok(())
    }

    pub(crate) fn json_hint(&self) -> bool {
        self.input.as_ref().is_some_and(Input::json_hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: Input<'_>) -> Result<String, ReaderError> {
        let mut reader = Reader::new();
        reader.set_input(input);
        reader.cache(usize::MAX / 4)?;
        Ok(reader.buffer.iter().collect())
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let text = decode_all(Input::from_slice(b"\xEF\xBB\xBFkey: value")).unwrap();
        assert_eq!(text, "key: value");
    }

    #[test]
    fn utf16le_is_transcoded() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "a: b".encode_utf16() {
            bytes.extend(unit.to_le_bytes());
        }
        let text = decode_all(Input::from_buffer(bytes)).unwrap();
        assert_eq!(text, "a: b");
    }

    #[test]
    fn invalid_utf8_is_reported_at_its_offset() {
        let err = decode_all(Input::from_slice(b"ab\xFFcd")).unwrap_err();
        match err {
            ReaderError::InvalidUtf8 { offset, value } => {
                assert_eq!(offset, 2);
                assert_eq!(value, 0xFF);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn control_characters_are_rejected() {
        let err = decode_all(Input::from_slice(b"a\x01b")).unwrap_err();
        assert!(matches!(err, ReaderError::Problem { .. }));
    }
}
