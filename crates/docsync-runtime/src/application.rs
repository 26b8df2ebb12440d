use docsync_core::Document;
use thiserror::Error;

/// Failure raised while executing an application definition.
///
/// The description is free text, typically a multi-line traceback whose last
/// line names the actual error.
#[derive(Debug, Clone, Error)]
#[error("{description}")]
pub struct ApplicationError {
    description: String,
}

impl ApplicationError {
    /// Create an error from its textual description.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Full description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Last non-empty line of the description.
    pub fn summary(&self) -> &str {
        last_meaningful_line(&self.description)
    }
}

impl From<docsync_core::Error> for ApplicationError {
    fn from(err: docsync_core::Error) -> Self {
        Self::new(format!("DocumentError: {}", err))
    }
}

/// The vendored application: builds the document and binds its callbacks.
pub trait Application: Send {
    /// Populate `document`.
    fn build(&mut self, document: &mut Document) -> Result<(), ApplicationError>;
}

impl<F> Application for F
where
    F: FnMut(&mut Document) -> Result<(), ApplicationError> + Send,
{
    fn build(&mut self, document: &mut Document) -> Result<(), ApplicationError> {
        self(document)
    }
}

/// Last line of `text` that is not blank, trimmed.
pub fn last_meaningful_line(text: &str) -> &str {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_skips_trailing_blank_lines() {
        let err = ApplicationError::new(
            "Traceback (most recent call last):\n  File \"app\", line 3\nKeyError: 'Sales'\n\n",
        );
        assert_eq!(err.summary(), "KeyError: 'Sales'");
    }

    #[test]
    fn summary_of_blank_text_is_empty() {
        assert_eq!(last_meaningful_line(" \n\t\n"), "");
    }
}
