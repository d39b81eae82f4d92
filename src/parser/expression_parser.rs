use ordered_float::NotNan;

use crate::{
    catalog::DataType,
    parser::{
        ast::{BinaryOperator, Expression, ExpressionKind, ForeignContext, FunctionCall, Literal, PrefixOperator, SelectStatement, WhenThen},
        ParseError, QueryComparers, QueryParser, COMPARERS,
    },
};

impl Expression {
    /// Parses a full expression, lowest precedence first:
    /// `OR`, `AND`, `NOT`, comparisons, `+ -`, `* / %`, unary signs, postfix.
    pub fn parse(parser: &mut QueryParser) -> Result<Expression, ParseError> {
        parse_or(parser)
    }

    /// Comma separated list of expressions.
    pub fn parse_list(parser: &mut QueryParser) -> Result<Vec<Expression>, ParseError> {
        let mut list = vec![Expression::parse(parser)?];
        while parser.consume_char(',') {
            list.push(Expression::parse(parser)?);
        }
        Ok(list)
    }
}

fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Expression {
    Expression::new(ExpressionKind::Binary { left: Box::new(left), op, right: Box::new(right) })
}

fn parse_or(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let mut left = parse_and(parser)?;
    while parser.consume(&COMPARERS.or) {
        let right = parse_and(parser)?;
        left = binary(left, BinaryOperator::Or, right);
    }
    Ok(left)
}

fn parse_and(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let mut left = parse_not(parser)?;
    while parser.consume(&COMPARERS.and) {
        let right = parse_not(parser)?;
        left = binary(left, BinaryOperator::And, right);
    }
    Ok(left)
}

fn parse_not(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let pivot = parser.position;
    if parser.consume(&COMPARERS.not) {
        // NOT EXISTS is a primary
        if parser.check(&COMPARERS.exists) {
            parser.position = pivot;
            return parse_comparison(parser);
        }
        let expr = parse_not(parser)?;
        return Ok(Expression::new(ExpressionKind::Prefix { op: PrefixOperator::Not, expr: Box::new(expr) }));
    }
    parse_comparison(parser)
}

fn parse_comparison(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let left = parse_additive(parser)?;

    let operators = [
        (&COMPARERS.less_than_or_equal, BinaryOperator::LessThanOrEqual),
        (&COMPARERS.greater_than_or_equal, BinaryOperator::GreaterThanOrEqual),
        (&COMPARERS.not_equal_b, BinaryOperator::NotEqual),
        (&COMPARERS.not_equal_c, BinaryOperator::NotEqual),
        (&COMPARERS.equal, BinaryOperator::Equal),
        (&COMPARERS.less_than, BinaryOperator::LessThan),
        (&COMPARERS.greater_than, BinaryOperator::GreaterThan),
    ];
    for (comparer, op) in operators {
        if parser.consume(comparer) {
            let right = parse_additive(parser)?;
            return Ok(binary(left, op, right));
        }
    }

    if parser.consume(&COMPARERS.is) {
        let not = parser.consume(&COMPARERS.not);
        let distinct = parser.consume(&COMPARERS.distinct);
        if distinct {
            parser.expect(&COMPARERS.from)?;
        }
        let right = parse_additive(parser)?;
        return Ok(Expression::new(ExpressionKind::Is {
            left: Box::new(left),
            not,
            distinct,
            right: Box::new(right),
        }));
    }

    let pivot = parser.position;
    let not = parser.consume(&COMPARERS.not);

    if parser.consume(&COMPARERS.between) {
        let lower = parse_additive(parser)?;
        parser.expect(&COMPARERS.and)?;
        let upper = parse_additive(parser)?;
        return Ok(Expression::new(ExpressionKind::Between {
            expr: Box::new(left),
            not,
            lower: Box::new(lower),
            upper: Box::new(upper),
        }));
    }

    if parser.consume(&COMPARERS.r#in) {
        parser.expect_char('(')?;
        if parser.check(&COMPARERS.select) {
            let subquery = SelectStatement::parse(parser)?;
            parser.expect_char(')')?;
            return Ok(Expression::new(ExpressionKind::InSubquery {
                expr: Box::new(left),
                not,
                subquery: Box::new(subquery),
            }));
        }
        let list = Expression::parse_list(parser)?;
        parser.expect_char(')')?;
        return Ok(Expression::new(ExpressionKind::InList { expr: Box::new(left), not, list }));
    }

    let like = parser.consume(&COMPARERS.like);
    if like || parser.consume(&COMPARERS.ilike) {
        let pattern = parse_additive(parser)?;
        return Ok(Expression::new(ExpressionKind::Like {
            expr: Box::new(left),
            not,
            case_insensitive: !like,
            pattern: Box::new(pattern),
        }));
    }

    if not {
        parser.position = pivot;
    }
    Ok(left)
}

fn parse_additive(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let mut left = parse_multiplicative(parser)?;
    loop {
        let op = if parser.consume_char('+') {
            BinaryOperator::Add
        } else if parser.consume_char('-') {
            BinaryOperator::Subtract
        } else {
            return Ok(left);
        };
        let right = parse_multiplicative(parser)?;
        left = binary(left, op, right);
    }
}

fn parse_multiplicative(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let mut left = parse_unary(parser)?;
    loop {
        let op = if parser.consume_char('*') {
            BinaryOperator::Multiply
        } else if parser.consume_char('/') {
            BinaryOperator::Divide
        } else if parser.consume_char('%') {
            BinaryOperator::Modulo
        } else {
            return Ok(left);
        };
        let right = parse_unary(parser)?;
        left = binary(left, op, right);
    }
}

fn parse_unary(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let op = if parser.consume_char('-') {
        PrefixOperator::Minus
    } else if parser.consume_char('+') {
        PrefixOperator::Plus
    } else {
        return parse_postfix(parser);
    };
    let expr = parse_unary(parser)?;
    Ok(Expression::new(ExpressionKind::Prefix { op, expr: Box::new(expr) }))
}

fn parse_postfix(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let mut expr = parse_primary(parser)?;
    loop {
        if parser.consume(&COMPARERS.cast) {
            let data_type = parse_type_name(parser)?;
            if expr.type_cast.is_some() {
                expr = Expression::new(ExpressionKind::Parenthesized(Box::new(expr)));
            }
            expr.type_cast = Some(data_type);
        } else if parser.consume_char('[') {
            let index = Expression::parse(parser)?;
            parser.expect_char(']')?;
            expr = Expression::new(ExpressionKind::ArrayAccess { array: Box::new(expr), index: Box::new(index) });
        } else if parser.current() == '.' && (QueryParser::is_identifier_start(parser.peek(1)) || parser.peek(1) == '"') {
            parser.next();
            let field = parser.parse_identifier()?;
            expr = Expression::new(ExpressionKind::FieldAccess { object: Box::new(expr), field });
        } else if parser.consume(&COMPARERS.collate) {
            let collation = parser.parse_identifier()?;
            expr = Expression::new(ExpressionKind::Collate { expr: Box::new(expr), collation });
        } else {
            return Ok(expr);
        }
    }
}

fn parse_primary(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    parser.next_non_whitespace();
    let pivot = parser.position;

    if parser.eof() {
        return ParseError::new("Unexpected end of expression", pivot, parser).err();
    }

    if parser.consume_char('(') {
        if parser.check(&COMPARERS.select) {
            let query = SelectStatement::parse(parser)?;
            parser.expect_char(')')?;
            return Ok(Expression::new(ExpressionKind::Subquery { query: Box::new(query), exists: false, not: false }));
        }
        let inner = Expression::parse(parser)?;
        parser.expect_char(')')?;
        return Ok(Expression::new(ExpressionKind::Parenthesized(Box::new(inner))));
    }

    let current = parser.current();
    if current.is_ascii_digit() {
        return parse_number(parser).map(Expression::literal);
    }
    if current == '\'' {
        return parse_string(parser).map(|s| Expression::literal(Literal::Text(s)));
    }
    if current == '$' || current == '@' {
        parser.next();
        if !QueryParser::is_identifier_start(parser.current()) {
            return ParseError::new("Invalid variable name", pivot, parser).err();
        }
        while QueryParser::is_identifier_char(parser.current()) {
            parser.next();
        }
        let name = parser.text_from_pivot(pivot).to_ascii_lowercase();
        return Ok(Expression::new(ExpressionKind::Variable(name)));
    }

    if parser.consume(&COMPARERS.b_true) {
        return Ok(Expression::literal(Literal::Bool(true)));
    }
    if parser.consume(&COMPARERS.b_false) {
        return Ok(Expression::literal(Literal::Bool(false)));
    }
    if parser.consume(&COMPARERS.null) {
        return Ok(Expression::literal(Literal::Null));
    }

    let not = parser.consume(&COMPARERS.not);
    if parser.consume(&COMPARERS.exists) {
        parser.expect_char('(')?;
        let query = SelectStatement::parse(parser)?;
        parser.expect_char(')')?;
        return Ok(Expression::new(ExpressionKind::Subquery { query: Box::new(query), exists: true, not }));
    }
    if not {
        return ParseError::new("Expected EXISTS after NOT", pivot, parser).err();
    }

    if parser.consume(&COMPARERS.case) {
        return parse_case(parser);
    }

    if parser.consume(&COMPARERS.array) {
        parser.expect_char('[')?;
        let elements = if parser.consume_char(']') {
            vec![]
        } else {
            let list = Expression::parse_list(parser)?;
            parser.expect_char(']')?;
            list
        };
        return Ok(Expression::new(ExpressionKind::Array(elements)));
    }

    if parser.at_identifier() {
        if parser.current() != '"' && QueryComparers::is_reserved(parser) {
            return ParseError::new("Unexpected keyword", pivot, parser).err();
        }
        let name = parser.parse_identifier()?;

        if let Some(call) = parse_call_suffix(parser, &name)? {
            return Ok(Expression::new(ExpressionKind::FunctionCall(call)));
        }

        if parser.current() == '.' && (QueryParser::is_identifier_start(parser.peek(1)) || parser.peek(1) == '"') {
            parser.next();
            let column = parser.parse_identifier()?;
            return Ok(Expression::new(ExpressionKind::Column { table: Some(name), column }));
        }

        return Ok(Expression::new(ExpressionKind::Column { table: None, column: name }));
    }

    ParseError::new("Invalid expression", pivot, parser).err()
}

/// After an identifier, parses `(args)` or `['dbid', 'proc'](args)`.
///
/// Returns `None`, with the cursor untouched, when no call follows.
pub(crate) fn parse_call_suffix(parser: &mut QueryParser, name: &str) -> Result<Option<FunctionCall>, ParseError> {
    let pivot = parser.position;
    let foreign = parse_foreign_context(parser);
    if foreign.is_none() {
        parser.position = pivot;
    }

    if !parser.consume_char('(') {
        parser.position = pivot;
        return Ok(None);
    }

    let mut call = FunctionCall { name: name.to_string(), args: vec![], distinct: false, star: false, foreign };

    if parser.consume_char(')') {
        return Ok(Some(call));
    }
    if parser.consume_char('*') {
        call.star = true;
        parser.expect_char(')')?;
        return Ok(Some(call));
    }
    call.distinct = parser.consume(&COMPARERS.distinct);
    call.args = Expression::parse_list(parser)?;
    parser.expect_char(')')?;

    Ok(Some(call))
}

fn parse_foreign_context(parser: &mut QueryParser) -> Option<ForeignContext> {
    if !parser.consume_char('[') {
        return None;
    }
    let dbid = Expression::parse(parser).ok()?;
    if !parser.consume_char(',') {
        return None;
    }
    let procedure = Expression::parse(parser).ok()?;
    if !parser.consume_char(']') {
        return None;
    }
    parser.next_non_whitespace();
    if parser.current() != '(' {
        return None;
    }
    Some(ForeignContext { dbid: Box::new(dbid), procedure: Box::new(procedure) })
}

fn parse_case(parser: &mut QueryParser) -> Result<Expression, ParseError> {
    let operand = if parser.check(&COMPARERS.when) {
        None
    } else {
        Some(Box::new(Expression::parse(parser)?))
    };

    let mut branches = vec![];
    while parser.consume(&COMPARERS.when) {
        let when = Expression::parse(parser)?;
        parser.expect(&COMPARERS.then)?;
        let then = Expression::parse(parser)?;
        branches.push(WhenThen { when, then });
    }
    if branches.is_empty() {
        return ParseError::new("CASE requires at least one WHEN", parser.position, parser).err();
    }

    let else_expr = if parser.consume(&COMPARERS.r#else) {
        Some(Box::new(Expression::parse(parser)?))
    } else {
        None
    };
    parser.expect(&COMPARERS.end)?;

    Ok(Expression::new(ExpressionKind::Case { operand, branches, else_expr }))
}

fn parse_number(parser: &mut QueryParser) -> Result<Literal, ParseError> {
    let pivot = parser.position;

    if parser.current() == '0' && matches!(parser.peek(1), 'x' | 'X') {
        parser.jump(2);
        let start = parser.position;
        while parser.current().is_ascii_hexdigit() {
            parser.next();
        }
        let digits = parser.text_from_pivot(start);
        if digits.len() % 2 != 0 {
            return ParseError::new("Blob literal must have an even number of hex digits", pivot, parser).err();
        }
        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| ParseError::new("Invalid blob literal", pivot, parser))?;
        return Ok(Literal::Blob(bytes));
    }

    while parser.current().is_ascii_digit() {
        parser.next();
    }
    let int_digits = parser.position - pivot;

    if parser.current() == '.' && parser.peek(1).is_ascii_digit() {
        parser.next();
        let fraction_start = parser.position;
        while parser.current().is_ascii_digit() {
            parser.next();
        }
        let scale = parser.position - fraction_start;
        let text = parser.text_from_pivot(pivot);
        let value = text
            .parse::<f64>()
            .ok()
            .and_then(|v| NotNan::new(v).ok())
            .ok_or_else(|| ParseError::new("Invalid decimal literal", pivot, parser))?;
        let precision = u16::try_from(int_digits + scale)
            .map_err(|_| ParseError::new("Decimal literal too long", pivot, parser))?;
        return Ok(Literal::Decimal { value, precision, scale: scale as u16 });
    }

    let text = parser.text_from_pivot(pivot);
    text.parse::<i64>()
        .map(Literal::Int)
        .map_err(|_| ParseError::new("Integer literal out of range", pivot, parser))
}

fn parse_string(parser: &mut QueryParser) -> Result<String, ParseError> {
    let pivot = parser.position;
    parser.next();

    let mut value = String::new();
    loop {
        if parser.eof() {
            return ParseError::new("Unterminated string literal", pivot, parser).err();
        }
        let ch = parser.current();
        parser.next();
        if ch == '\'' {
            // '' is an escaped quote
            if parser.current() == '\'' {
                value.push('\'');
                parser.next();
                continue;
            }
            return Ok(value);
        }
        value.push(ch);
    }
}

/// Parses a type name such as `int8`, `text[]` or `numeric(10, 2)`.
pub(crate) fn parse_type_name(parser: &mut QueryParser) -> Result<DataType, ParseError> {
    let pivot = parser.position;
    let mut name = parser.parse_identifier()?;

    if parser.consume_char('(') {
        let precision = parse_digits(parser)?;
        parser.expect_char(',')?;
        let scale = parse_digits(parser)?;
        parser.expect_char(')')?;
        name.push_str(&format!("({precision},{scale})"));
    }
    if parser.consume_char('[') {
        parser.expect_char(']')?;
        name.push_str("[]");
    }

    DataType::parse(&name).map_err(|e| ParseError::new(&e.to_string(), pivot, parser))
}

fn parse_digits(parser: &mut QueryParser) -> Result<String, ParseError> {
    parser.next_non_whitespace();
    let pivot = parser.position;
    while parser.current().is_ascii_digit() {
        parser.next();
    }
    if parser.position == pivot {
        return ParseError::new("Expected number", pivot, parser).err();
    }
    Ok(parser.text_from_pivot(pivot))
}

#[cfg(test)]
mod tests {
    use crate::{catalog::DataType, parser::{ast::*, QueryParser}};

    fn parse(text: &str) -> Expression {
        let mut parser = QueryParser::new(text);
        match Expression::parse(&mut parser) {
            Ok(expr) => expr,
            Err(e) => panic!("{e}"),
        }
    }

    #[test]
    fn test_column_with_table() {
        match parse("u.id").kind {
            ExpressionKind::Column { table, column } => {
                assert_eq!(table.as_deref(), Some("u"));
                assert_eq!(column, "id");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        match parse("1 + 2 * 3").kind {
            ExpressionKind::Binary { op: BinaryOperator::Add, right, .. } => match right.kind {
                ExpressionKind::Binary { op: BinaryOperator::Multiply, .. } => {}
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        match parse("a = 1 or b = 2 and c = 3").kind {
            ExpressionKind::Binary { op: BinaryOperator::Or, right, .. } => {
                assert!(matches!(right.kind, ExpressionKind::Binary { op: BinaryOperator::And, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_type_cast_and_array_access() {
        let expr = parse("$ids[1]::text");
        assert_eq!(expr.type_cast, Some(DataType::TEXT));
        match expr.kind {
            ExpressionKind::ArrayAccess { array, .. } => {
                assert_eq!(array.kind, ExpressionKind::Variable("$ids".into()));
            }
            other => panic!("unexpected {other:?}"),
        }

        let expr = parse("'1.5'::numeric(10, 2)");
        assert_eq!(expr.type_cast, Some(DataType::numeric(10, 2)));
    }

    #[test]
    fn test_function_calls() {
        match parse("count(*)").kind {
            ExpressionKind::FunctionCall(call) => {
                assert_eq!(call.name, "count");
                assert!(call.star);
            }
            other => panic!("unexpected {other:?}"),
        }

        match parse("SUM(DISTINCT age)").kind {
            ExpressionKind::FunctionCall(call) => {
                assert_eq!(call.name, "sum");
                assert!(call.distinct);
                assert_eq!(call.args.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        match parse("car_count['dbid', 'proc']($id)").kind {
            ExpressionKind::FunctionCall(call) => {
                assert!(call.foreign.is_some());
                assert_eq!(call.args.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_between_is_and_in() {
        assert!(matches!(parse("age not between 1 and 5").kind, ExpressionKind::Between { not: true, .. }));
        assert!(matches!(
            parse("a is not distinct from b").kind,
            ExpressionKind::Is { not: true, distinct: true, .. }
        ));
        assert!(matches!(parse("a is null").kind, ExpressionKind::Is { not: false, distinct: false, .. }));
        match parse("id in (1, 2, 3)").kind {
            ExpressionKind::InList { list, not: false, .. } => assert_eq!(list.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(parse("name not like 'a%'").kind, ExpressionKind::Like { not: true, .. }));
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("'it''s'").kind, ExpressionKind::Literal(Literal::Text("it's".into())));
        assert_eq!(parse("0x0aff").kind, ExpressionKind::Literal(Literal::Blob(vec![0x0a, 0xff])));
        assert_eq!(parse("TRUE").kind, ExpressionKind::Literal(Literal::Bool(true)));
        assert_eq!(parse("null").kind, ExpressionKind::Literal(Literal::Null));
        match parse("12.50").kind {
            ExpressionKind::Literal(Literal::Decimal { precision, scale, .. }) => {
                assert_eq!((precision, scale), (4, 2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_subqueries() {
        assert!(matches!(
            parse("not exists (select 1)").kind,
            ExpressionKind::Subquery { exists: true, not: true, .. }
        ));
        assert!(matches!(
            parse("(select 1)").kind,
            ExpressionKind::Subquery { exists: false, not: false, .. }
        ));
        assert!(matches!(parse("not a").kind, ExpressionKind::Prefix { op: PrefixOperator::Not, .. }));
    }

    #[test]
    fn test_invalid_expression_reports_position() {
        let mut parser = QueryParser::new("1 + ");
        let err = Expression::parse(&mut parser).unwrap_err();
        assert_eq!(err.message, "Unexpected end of expression");
        assert_eq!(err.start, 4);
    }
}
