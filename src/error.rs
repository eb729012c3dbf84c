/// A position in the input or output stream.
///
/// `column` counts decoded characters, not bytes.
#[derive(Copy, Clone, Default, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub struct Mark {
    /// The position index in bytes.
    pub index: u64,
    /// The position line, zero indexed.
    pub line: u64,
    /// The position column in characters, zero indexed.
    pub column: u64,
}

impl std::fmt::Display for Mark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("{problem} at offset {offset}")]
    Problem {
        problem: &'static str,
        offset: usize,
    },
    #[error("byte order mark is only permitted at the start of the stream")]
    MisplacedBom,
    #[error("invalid UTF-8 byte at offset {offset}: {value:#x}")]
    InvalidUtf8 { offset: usize, value: u8 },
    #[error("invalid UTF-16 unpaired surrogate: {value:#x}")]
    InvalidUtf16 { value: u16 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ScannerError {
    #[error("{}:{}: {} {} ({}:{})", problem_mark.line, problem_mark.column, problem, context, context_mark.line, context_mark.column)]
    Problem {
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        problem_mark: Mark,
    },
    #[error("scanner has already failed; reset it before scanning again")]
    Failed,
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("no more tokens")]
    UnexpectedEof,
    #[error("{}:{}: {}", mark.line, mark.column, problem)]
    Problem { problem: &'static str, mark: Mark },
    #[error("{}:{}: {} {} ({}:{})", mark.line, mark.column, problem, context, context_mark.line, context_mark.column)]
    ProblemWithContext {
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        mark: Mark,
    },
    #[error(transparent)]
    Scanner(#[from] ScannerError),
}

#[derive(Debug, thiserror::Error)]
pub enum ComposerError {
    #[error("{}:{}: {}", mark.line, mark.column, problem)]
    Problem { problem: &'static str, mark: Mark },
    #[error("{}:{}: {} {} ({}:{})", mark.line, mark.column, problem, context, context_mark.line, context_mark.column)]
    ProblemWithContext {
        context: &'static str,
        context_mark: Mark,
        problem: &'static str,
        mark: Mark,
    },
    #[error(transparent)]
    Parser(#[from] ParserError),
}

#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    #[error("{0}")]
    Problem(&'static str),
    #[error(transparent)]
    Writer(#[from] WriterError),
}

/// Errors raised by generic value store operations outside the parse and
/// emit pipelines.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("path does not address a location in the value")]
    PathNotFound,
    #[error("expected a sequence or mapping along the path")]
    NotAContainer,
    #[error("sequence index {0} is out of bounds")]
    IndexOutOfBounds(usize),
    #[error(transparent)]
    Compose(#[from] ComposerError),
    #[error(transparent)]
    Emit(#[from] EmitterError),
}
