use std::fmt;
use std::path::{Path, PathBuf};

use super::types::Error;

/// Where an error happened: the crate area, the step it was taking and,
/// for file-backed configuration, the file involved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub component: &'static str,
    pub operation: String,
    pub file: Option<PathBuf>,
}

impl ErrorContext {
    pub fn new(component: &'static str, operation: impl Into<String>) -> Self {
        ErrorContext {
            component,
            operation: operation.into(),
            file: None,
        }
    }

    pub fn in_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.operation)?;
        match &self.file {
            Some(file) => write!(f, " ({})", file.display()),
            None => Ok(()),
        }
    }
}

/// Turns any displayable error into an [`Error::WithContext`]
pub trait ErrorExt: fmt::Display + Sized {
    fn context(self, context: ErrorContext) -> Error {
        Error::WithContext {
            message: self.to_string(),
            context,
        }
    }

    fn with_context(self, component: &'static str, operation: impl Into<String>) -> Error {
        self.context(ErrorContext::new(component, operation))
    }
}

impl<E: fmt::Display> ErrorExt for E {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_names_file() {
        let err = Error::Config("t1 must be positive".to_string())
            .context(ErrorContext::new("dialog-core", "load endpoint config").in_file("endpoint.toml"));

        assert_eq!(
            err.to_string(),
            "Configuration error: t1 must be positive [dialog-core: load endpoint config (endpoint.toml)]"
        );
    }

    #[test]
    fn test_with_context_on_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match io.with_context("config", "read jitter.toml") {
            Error::WithContext { message, context } => {
                assert_eq!(message, "gone");
                assert_eq!(context.component, "config");
                assert!(context.file.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
