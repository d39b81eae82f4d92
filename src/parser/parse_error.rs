use std::fmt::{self, Display};

use crate::parser::QueryParser;

/// Syntax error with the character range of the offending text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// Source text from `start` through the cursor.
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl ParseError {
    pub fn new(message: &str, pivot: usize, parser: &QueryParser) -> Self {
        Self {
            message: message.to_string(),
            text: parser.text_from_range(pivot, parser.position + 1),
            start: pivot,
            end: parser.position,
        }
    }

    pub fn err<T>(self) -> Result<T, ParseError> {
        Err(self)
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error: {} at {}..{}", self.message, self.start, self.end)?;
        if !self.text.trim().is_empty() {
            write!(f, " near '{}'", self.text.trim())?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_range_and_text() {
        let err = ParseError { message: "Expected FROM".into(), text: "form ".into(), start: 9, end: 13 };
        assert_eq!(err.to_string(), "syntax error: Expected FROM at 9..13 near 'form'");

        let at_end = ParseError { message: "Unexpected end of expression".into(), text: String::new(), start: 7, end: 7 };
        assert_eq!(at_end.to_string(), "syntax error: Unexpected end of expression at 7..7");
    }
}
