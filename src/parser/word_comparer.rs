use crate::parser::QueryParser;

/// Case-insensitive matcher for one keyword or symbol at the cursor.
///
/// Keywords only match on a word boundary, so `order` never matches the
/// start of `orders`. Symbols match wherever their characters appear.
#[derive(Debug, Clone, Default)]
pub struct WordComparer {
    pub length: usize,
    pub word: Vec<char>,
    symbol: bool,
}

impl WordComparer {
    pub fn new(word: &str) -> Self {
        let word: Vec<char> = word.to_uppercase().chars().collect();
        Self { length: word.len(), word, symbol: false }
    }

    pub fn symbol(symbol: &str) -> Self {
        Self { symbol: true, ..Self::new(symbol) }
    }

    pub fn compare(&self, parser: &QueryParser) -> bool {
        for (offset, expected) in self.word.iter().enumerate() {
            if parser.peek(offset).to_ascii_uppercase() != *expected {
                return false;
            }
        }

        if self.symbol {
            return true;
        }

        !QueryParser::is_identifier_char(parser.peek(self.length))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::*;

    #[test]
    fn keyword_requires_word_boundary() {
        let order = WordComparer::new("order");
        assert!(order.compare(&QueryParser::new("ORDER BY x")));
        assert!(order.compare(&QueryParser::new("order")));
        assert!(!order.compare(&QueryParser::new("orders")));
        assert!(!order.compare(&QueryParser::new("ord")));
    }

    #[test]
    fn symbols_match_anywhere() {
        let cast = WordComparer::symbol("::");
        assert!(cast.compare(&QueryParser::new("::int")));
        assert!(!cast.compare(&QueryParser::new(":int")));
    }
}
