use once_cell::sync::Lazy;

use crate::parser::{QueryParser, WordComparer};

/// Shared keyword and symbol matchers.
pub static COMPARERS: Lazy<QueryComparers> = Lazy::new(QueryComparers::new);

/// Words that never start an implicit alias.
const RESERVED: &[&str] = &[
    "all", "and", "array", "as", "asc", "between", "by", "case", "collate", "delete", "desc",
    "distinct", "else", "end", "except", "exists", "false", "from", "full", "group", "having",
    "ilike", "in", "inner", "insert", "intersect", "is", "join", "left", "like", "limit", "not",
    "null", "nulls", "offset", "on", "or", "order", "outer", "right", "select", "then", "true",
    "union", "update", "when", "where", "with",
];

#[derive(Debug)]
pub struct QueryComparers {
    pub with: WordComparer,
    pub recursive: WordComparer,
    pub select: WordComparer,
    pub distinct: WordComparer,
    pub all: WordComparer,
    pub r#as: WordComparer,
    pub from: WordComparer,
    pub join: WordComparer,
    pub inner: WordComparer,
    pub left: WordComparer,
    pub right: WordComparer,
    pub full: WordComparer,
    pub outer: WordComparer,
    pub on: WordComparer,
    pub r#where: WordComparer,
    pub group: WordComparer,
    pub by: WordComparer,
    pub having: WordComparer,
    pub union: WordComparer,
    pub intersect: WordComparer,
    pub except: WordComparer,
    pub order: WordComparer,
    pub asc: WordComparer,
    pub desc: WordComparer,
    pub nulls: WordComparer,
    pub first: WordComparer,
    pub last: WordComparer,
    pub limit: WordComparer,
    pub offset: WordComparer,
    pub insert: WordComparer,
    pub update: WordComparer,
    pub delete: WordComparer,
    pub into: WordComparer,
    pub and: WordComparer,
    pub or: WordComparer,
    pub not: WordComparer,
    pub is: WordComparer,
    pub between: WordComparer,
    pub r#in: WordComparer,
    pub like: WordComparer,
    pub ilike: WordComparer,
    pub collate: WordComparer,
    pub exists: WordComparer,
    pub case: WordComparer,
    pub when: WordComparer,
    pub then: WordComparer,
    pub r#else: WordComparer,
    pub end: WordComparer,
    pub array: WordComparer,
    pub b_true: WordComparer,
    pub b_false: WordComparer,
    pub null: WordComparer,
    pub cast: WordComparer,
    pub equal: WordComparer,
    pub not_equal_b: WordComparer, // basic
    pub not_equal_c: WordComparer, // c
    pub greater_than: WordComparer,
    pub greater_than_or_equal: WordComparer,
    pub less_than: WordComparer,
    pub less_than_or_equal: WordComparer,
}

impl Default for QueryComparers {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryComparers {
    pub fn new() -> Self {
        Self {
            with: WordComparer::new("WITH"),
            recursive: WordComparer::new("RECURSIVE"),
            select: WordComparer::new("SELECT"),
            distinct: WordComparer::new("DISTINCT"),
            all: WordComparer::new("ALL"),
            r#as: WordComparer::new("AS"),
            from: WordComparer::new("FROM"),
            join: WordComparer::new("JOIN"),
            inner: WordComparer::new("INNER"),
            left: WordComparer::new("LEFT"),
            right: WordComparer::new("RIGHT"),
            full: WordComparer::new("FULL"),
            outer: WordComparer::new("OUTER"),
            on: WordComparer::new("ON"),
            r#where: WordComparer::new("WHERE"),
            group: WordComparer::new("GROUP"),
            by: WordComparer::new("BY"),
            having: WordComparer::new("HAVING"),
            union: WordComparer::new("UNION"),
            intersect: WordComparer::new("INTERSECT"),
            except: WordComparer::new("EXCEPT"),
            order: WordComparer::new("ORDER"),
            asc: WordComparer::new("ASC"),
            desc: WordComparer::new("DESC"),
            nulls: WordComparer::new("NULLS"),
            first: WordComparer::new("FIRST"),
            last: WordComparer::new("LAST"),
            limit: WordComparer::new("LIMIT"),
            offset: WordComparer::new("OFFSET"),
            insert: WordComparer::new("INSERT"),
            update: WordComparer::new("UPDATE"),
            delete: WordComparer::new("DELETE"),
            into: WordComparer::new("INTO"),
            and: WordComparer::new("AND"),
            or: WordComparer::new("OR"),
            not: WordComparer::new("NOT"),
            is: WordComparer::new("IS"),
            between: WordComparer::new("BETWEEN"),
            r#in: WordComparer::new("IN"),
            like: WordComparer::new("LIKE"),
            ilike: WordComparer::new("ILIKE"),
            collate: WordComparer::new("COLLATE"),
            exists: WordComparer::new("EXISTS"),
            case: WordComparer::new("CASE"),
            when: WordComparer::new("WHEN"),
            then: WordComparer::new("THEN"),
            r#else: WordComparer::new("ELSE"),
            end: WordComparer::new("END"),
            array: WordComparer::new("ARRAY"),
            b_true: WordComparer::new("TRUE"),
            b_false: WordComparer::new("FALSE"),
            null: WordComparer::new("NULL"),
            cast: WordComparer::symbol("::"),
            equal: WordComparer::symbol("="),
            not_equal_b: WordComparer::symbol("<>"),
            not_equal_c: WordComparer::symbol("!="),
            greater_than: WordComparer::symbol(">"),
            greater_than_or_equal: WordComparer::symbol(">="),
            less_than: WordComparer::symbol("<"),
            less_than_or_equal: WordComparer::symbol("<="),
        }
    }

    /// True when the identifier under the cursor is a reserved keyword.
    pub fn is_reserved(parser: &QueryParser) -> bool {
        let mut offset = 0;
        while QueryParser::is_identifier_char(parser.peek(offset)) {
            offset += 1;
        }
        let word = parser
            .text_from_range(parser.position, parser.position + offset)
            .to_ascii_lowercase();
        RESERVED.contains(&word.as_str())
    }
}
