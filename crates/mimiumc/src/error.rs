use std::fmt;

use mimium_common::Span;
use mimium_mir::MirError;
use mimium_typeck::TypeError;

/// A pipeline failure, tagged with the stage that raised it.
#[derive(Clone, Debug, PartialEq)]
pub enum CompileError {
    Type(TypeError),
    Mir(MirError),
}

impl CompileError {
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Type(_) => "type inference",
            CompileError::Mir(_) => "mir generation",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            CompileError::Type(e) => e.span(),
            CompileError::Mir(e) => e.span(),
        }
    }

    /// One-line report prefixed with `file:line:col`.
    pub fn located(&self, file_name: &str, source: &str) -> String {
        let (line, col) = self.span().line_col(source);
        format!("{}:{}:{}: {}", file_name, line, col, self)
    }
}

impl From<TypeError> for CompileError {
    fn from(e: TypeError) -> Self {
        CompileError::Type(e)
    }
}

impl From<MirError> for CompileError {
    fn from(e: MirError) -> Self {
        CompileError::Mir(e)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Type(e) => write!(f, "{}: {}", self.stage(), e),
            CompileError::Mir(e) => write!(f, "{}: {}", self.stage(), e),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Type(e) => Some(e),
            CompileError::Mir(e) => Some(e),
        }
    }
}
