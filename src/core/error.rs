// Error kinds, the builder-style error value, and exit code mapping.
use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Io,
    Corrupt,
    InvalidMagic,
    UnsupportedVersion,
    UnknownTypeTag,
    ColumnNotFound,
    IntegrityMismatch,
    EmptyInput,
    NonUniformLength,
    InvalidValueForType,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    column: Option<String>,
    offset: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            column: None,
            offset: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn column(&self) -> Option<&str> {
        self.column.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub(crate) fn io(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io).with_source(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(column) = &self.column {
            write!(f, " (column: {column})")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Io => 3,
        ErrorKind::Corrupt => 4,
        ErrorKind::InvalidMagic => 5,
        ErrorKind::UnsupportedVersion => 6,
        ErrorKind::UnknownTypeTag => 7,
        ErrorKind::ColumnNotFound => 8,
        ErrorKind::IntegrityMismatch => 9,
        ErrorKind::EmptyInput => 10,
        ErrorKind::NonUniformLength => 11,
        ErrorKind::InvalidValueForType => 12,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, to_exit_code};

    #[test]
    fn exit_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::Internal, 1),
            (ErrorKind::Usage, 2),
            (ErrorKind::Io, 3),
            (ErrorKind::Corrupt, 4),
            (ErrorKind::InvalidMagic, 5),
            (ErrorKind::UnsupportedVersion, 6),
            (ErrorKind::UnknownTypeTag, 7),
            (ErrorKind::ColumnNotFound, 8),
            (ErrorKind::IntegrityMismatch, 9),
            (ErrorKind::EmptyInput, 10),
            (ErrorKind::NonUniformLength, 11),
            (ErrorKind::InvalidValueForType, 12),
        ];

        for (kind, code) in cases {
            assert_eq!(to_exit_code(kind), code);
        }
    }

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::ColumnNotFound)
            .with_message("no such column")
            .with_column("age")
            .with_offset(20);
        let text = err.to_string();
        assert_eq!(text, "ColumnNotFound: no such column (column: age) (offset: 20)");
    }

    #[test]
    fn source_is_exposed() {
        use std::error::Error as _;
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::io(io);
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("disk gone"));
    }
}
