//! anchorite — a YAML 1.1/1.2 and JSON processor.
//!
//! The crate is organized as a pull pipeline: a [`Scanner`] turns bytes into
//! tokens, a [`Parser`] turns tokens into the canonical libyaml-compatible
//! event stream, and the composer folds events into either a [`Document`]
//! tree or an interned generic value inside a [`ValueStore`]. The [`Emitter`]
//! runs the other way, serializing events as YAML or JSON.
//!
//! ```
//! use anchorite::{ParseOptions, EmitOptions, ValueStore};
//!
//! let mut store = ValueStore::with_dedup();
//! let root = store
//!     .parse_str("a: &x 1\nb: *x\n", ParseOptions::default())
//!     .unwrap();
//! let a = store.get_str(root, "a").unwrap();
//! let b = store.get_str(root, "b").unwrap();
//! assert!(store.equal(a, b));
//! assert_eq!(store.emit_string(root, &EmitOptions::default()).unwrap(), "a: &x 1\nb: *x\n");
//! ```

#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_lossless,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::fn_params_excessive_bools,
    clippy::manual_range_contains,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::unnecessary_wraps
)]
#![deny(unsafe_code)]

mod atom;
mod chars;
mod compose;
mod document;
mod dumper;
mod emitter;
mod error;
mod event;
mod parser;
mod path;
mod reader;
mod scanner;
mod token;
mod value;

pub use crate::atom::{AtomId, AtomMode, AtomTag, Atoms, TagStats};
pub use crate::document::{Document, Node, NodeData, NodeId, NodePair, MAX_MARKER};
pub use crate::emitter::{EmitMode, EmitOptions, Emitter, MarkerPolicy};
pub use crate::error::{
    ComposerError, EmitterError, Mark, ParserError, ReaderError, ScannerError, StoreError,
    WriterError,
};
pub use crate::event::{Event, EventData};
pub use crate::parser::{ParseOptions, Parser, ParserState, YamlVersion};
pub use crate::path::{parse_path, path_to_string, PathSegment};
pub use crate::reader::Input;
pub use crate::scanner::{Scanner, TabPolicy};
pub use crate::token::{Token, TokenData};
pub use crate::value::{Indirect, StyleHint, Value, ValueData, ValueStore};

/// The tag `!!null` with the only possible value: `null`.
pub const NULL_TAG: &str = "tag:yaml.org,2002:null";
/// The tag `!!bool` with the values: `true` and `false`.
pub const BOOL_TAG: &str = "tag:yaml.org,2002:bool";
/// The tag `!!str` for string values.
pub const STR_TAG: &str = "tag:yaml.org,2002:str";
/// The tag `!!int` for integer values.
pub const INT_TAG: &str = "tag:yaml.org,2002:int";
/// The tag `!!float` for float values.
pub const FLOAT_TAG: &str = "tag:yaml.org,2002:float";
/// The tag `!!merge` for the `<<` merge key.
pub const MERGE_TAG: &str = "tag:yaml.org,2002:merge";
/// The tag `!!timestamp` for date and time values.
pub const TIMESTAMP_TAG: &str = "tag:yaml.org,2002:timestamp";

/// The tag `!!seq` is used to denote sequences.
pub const SEQ_TAG: &str = "tag:yaml.org,2002:seq";
/// The tag `!!map` is used to denote mapping.
pub const MAP_TAG: &str = "tag:yaml.org,2002:map";

/// The default scalar tag is `!!str`.
pub const DEFAULT_SCALAR_TAG: &str = STR_TAG;
/// The default sequence tag is `!!seq`.
pub const DEFAULT_SEQUENCE_TAG: &str = SEQ_TAG;
/// The default mapping tag is `!!map`.
pub const DEFAULT_MAPPING_TAG: &str = MAP_TAG;

/// The version directive data.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub struct VersionDirective {
    /// The major version number.
    pub major: i32,
    /// The minor version number.
    pub minor: i32,
}

/// The tag directive data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct TagDirective {
    /// The tag handle.
    pub handle: String,
    /// The tag prefix.
    pub prefix: String,
}

/// The stream encoding.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum Encoding {
    /// Let the scanner detect the encoding.
    #[default]
    Any,
    /// The default UTF-8 encoding.
    Utf8,
    /// The UTF-16-LE encoding with BOM.
    Utf16Le,
    /// The UTF-16-BE encoding with BOM.
    Utf16Be,
}

/// Line break type.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum Break {
    /// Let the emitter choose the break type.
    #[default]
    Any,
    /// Use CR for line breaks (Mac style).
    Cr,
    /// Use LN for line breaks (Unix style).
    Ln,
    /// Use CR LN for line breaks (DOS style).
    CrLn,
}

/// Scalar styles.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum ScalarStyle {
    /// Let the emitter choose the style.
    #[default]
    Any,
    /// The plain scalar style.
    Plain,
    /// The single-quoted scalar style.
    SingleQuoted,
    /// The double-quoted scalar style.
    DoubleQuoted,
    /// The literal scalar style.
    Literal,
    /// The folded scalar style.
    Folded,
}

/// Sequence styles.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum SequenceStyle {
    /// Let the emitter choose the style.
    Any,
    /// The block sequence style.
    Block,
    /// The flow sequence style.
    Flow,
}

/// Mapping styles.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum MappingStyle {
    /// Let the emitter choose the style.
    Any,
    /// The block mapping style.
    Block,
    /// The flow mapping style.
    Flow,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SANITY_INPUT: &str = r#"
unicode: "Sosa did fine.\u263A"
control: "\b1998\t1999\t2000\n"
hex esc: "\x0d\x0a is \r\n"

single: '"Howdy!" he cried.'
quoted: ' # Not a ''comment''.'
tie-fighter: '|\-*-/|'
"#;

    #[test]
    fn sanity() {
        let mut parser = Parser::new();
        parser.set_input(Input::from_str(SANITY_INPUT));
        let document = Document::load(&mut parser).unwrap();
        assert!(document.root_id().is_some());
    }

    #[test]
    fn sequence_with_single_pair_mapping() {
        const INPUT: &str = "[\nfoo: bar\n]\n";
        let mut parser = Parser::new();
        parser.set_input(Input::from_str(INPUT));
        let _document = Document::load(&mut parser).unwrap();
    }

    #[test]
    fn multiline_plain_scalar_emission() {
        let mut emitter = Emitter::new();
        let mut output = Vec::new();
        emitter.set_output(&mut output);
        emitter.emit(Event::stream_start()).unwrap();
        emitter.emit(Event::document_start(None, &[], true)).unwrap();
        emitter
            .emit(Event::scalar(
                None,
                None,
                "1st non-empty\n2nd non-empty 3rd non-empty",
                true,
                true,
                ScalarStyle::Plain,
            ))
            .unwrap();
        emitter.emit(Event::document_end(true)).unwrap();
        emitter.emit(Event::stream_end()).unwrap();
        assert_eq!(
            core::str::from_utf8(&output),
            Ok("'1st non-empty\n\n  2nd non-empty 3rd non-empty'\n")
        );
    }
}
