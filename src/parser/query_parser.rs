use crate::parser::{ParseError, QueryComparers, WordComparer, COMPARERS};

/// Character cursor over a SQL text.
///
/// All parse routines take `&mut QueryParser`, advance it past what they
/// consumed and leave it on the first character they did not understand.
#[derive(Debug, Default)]
pub struct QueryParser {
    pub position: usize,
    pub length: usize,
    pub text_v: Vec<char>,
    pub text: String,
}

impl QueryParser {
    pub fn new(query: &str) -> Self {
        let text_v: Vec<char> = query.chars().collect();
        Self {
            position: 0,
            length: text_v.len(),
            text_v,
            text: query.to_string(),
        }
    }

    pub fn eof(&self) -> bool {
        self.position >= self.length
    }

    pub fn current(&self) -> char {
        if self.position < self.length {
            return self.text_v[self.position];
        }

        '\0'
    }

    pub fn peek(&self, ahead: usize) -> char {
        self.text_v.get(self.position + ahead).copied().unwrap_or('\0')
    }

    pub fn next(&mut self) {
        if self.position < self.length {
            self.position += 1;
        }
    }

    /// Skips whitespace and `--` line comments.
    pub fn next_non_whitespace(&mut self) {
        loop {
            while self.current().is_whitespace() {
                self.next();
            }
            if self.current() == '-' && self.peek(1) == '-' {
                while !self.eof() && self.current() != '\n' {
                    self.next();
                }
                continue;
            }
            break;
        }
    }

    pub fn jump(&mut self, ahead: usize) {
        self.position = (self.position + ahead).min(self.length);
    }

    pub fn text_from_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.length);
        let start = start.min(end);
        self.text_v[start..end].iter().collect()
    }

    pub fn text_from_pivot(&self, pivot: usize) -> String {
        self.text_from_range(pivot, self.position)
    }

    /// Consumes the keyword or symbol if it is next, after whitespace.
    pub fn consume(&mut self, comparer: &WordComparer) -> bool {
        self.next_non_whitespace();
        if comparer.compare(self) {
            self.jump(comparer.length);
            return true;
        }
        false
    }

    /// True when the keyword or symbol is next, without consuming it.
    pub fn check(&mut self, comparer: &WordComparer) -> bool {
        self.next_non_whitespace();
        comparer.compare(self)
    }

    pub fn consume_char(&mut self, ch: char) -> bool {
        self.next_non_whitespace();
        if self.current() == ch {
            self.next();
            return true;
        }
        false
    }

    pub fn expect_char(&mut self, ch: char) -> Result<(), ParseError> {
        let pivot = self.position;
        if !self.consume_char(ch) {
            return ParseError::new(&format!("Expected '{ch}'"), pivot, self).err();
        }
        Ok(())
    }

    pub fn expect(&mut self, comparer: &WordComparer) -> Result<(), ParseError> {
        let pivot = self.position;
        if !self.consume(comparer) {
            let word: String = comparer.word.iter().collect();
            return ParseError::new(&format!("Expected {word}"), pivot, self).err();
        }
        Ok(())
    }

    pub fn is_identifier_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    pub fn is_identifier_char(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_'
    }

    pub fn at_identifier(&mut self) -> bool {
        self.next_non_whitespace();
        Self::is_identifier_start(self.current()) || self.current() == '"'
    }

    /// Parses a bare identifier (lowercased) or a double quoted one (kept verbatim).
    pub fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.next_non_whitespace();
        let pivot = self.position;

        if self.current() == '"' {
            self.next();
            let start = self.position;
            while !self.eof() && self.current() != '"' {
                self.next();
            }
            if self.eof() {
                return ParseError::new("Unterminated quoted identifier", pivot, self).err();
            }
            let name = self.text_from_pivot(start);
            self.next();
            if name.is_empty() {
                return ParseError::new("Empty quoted identifier", pivot, self).err();
            }
            return Ok(name);
        }

        if !Self::is_identifier_start(self.current()) {
            return ParseError::new("Expected identifier", pivot, self).err();
        }
        while Self::is_identifier_char(self.current()) {
            self.next();
        }
        Ok(self.text_from_pivot(pivot).to_ascii_lowercase())
    }

    /// Identifier that is not a reserved keyword, used for implicit aliases.
    pub fn try_parse_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.consume(&COMPARERS.r#as) {
            return self.parse_identifier().map(Some);
        }
        if !self.at_identifier() {
            return Ok(None);
        }
        if self.current() != '"' && QueryComparers::is_reserved(self) {
            return Ok(None);
        }
        self.parse_identifier().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::*;

    #[test]
    fn cursor_skips_whitespace_and_comments() {
        let mut parser = QueryParser::new("  -- leading comment\n  select");
        parser.next_non_whitespace();
        assert_eq!(parser.current(), 's');
        assert_eq!(parser.peek(100), '\0');
    }

    #[test]
    fn identifiers_are_lowercased_unless_quoted() {
        let mut parser = QueryParser::new("Users \"MixedCase\"");
        assert_eq!(parser.parse_identifier().unwrap(), "users");
        assert_eq!(parser.parse_identifier().unwrap(), "MixedCase");
        assert!(parser.parse_identifier().is_err());
    }

    #[test]
    fn aliases_skip_reserved_words() {
        let mut parser = QueryParser::new("u where");
        assert_eq!(parser.try_parse_alias().unwrap(), Some("u".to_string()));
        assert_eq!(parser.try_parse_alias().unwrap(), None);

        let mut parser = QueryParser::new("as total");
        assert_eq!(parser.try_parse_alias().unwrap(), Some("total".to_string()));
    }

    #[test]
    fn jump_never_passes_the_end() {
        let mut parser = QueryParser::new("ab");
        parser.jump(10);
        assert!(parser.eof());
        assert_eq!(parser.current(), '\0');
    }
}
