use crate::parser::{
    ast::{
        CommonTableExpression, CompoundOperator, Expression, Join, JoinType, NullOrder, OrderType, OrderingTerm,
        ResultColumn, SelectCore, SelectStatement, SqlStatement, StatementBody, TableSource,
    },
    expression_parser::parse_call_suffix,
    ParseError, QueryParser, COMPARERS,
};

/// Parses one statement, with an optional trailing `;`, and requires the
/// whole text to be consumed.
pub fn parse_sql(text: &str) -> Result<SqlStatement, ParseError> {
    let mut parser = QueryParser::new(text);
    let statement = SqlStatement::parse(&mut parser)?;
    parser.consume_char(';');
    parser.next_non_whitespace();
    if !parser.eof() {
        return ParseError::new("Unexpected trailing input", parser.position, &parser).err();
    }
    Ok(statement)
}

impl SqlStatement {
    pub fn parse(parser: &mut QueryParser) -> Result<SqlStatement, ParseError> {
        let mut ctes = vec![];
        if parser.consume(&COMPARERS.with) {
            parser.consume(&COMPARERS.recursive);
            loop {
                ctes.push(parse_cte(parser)?);
                if !parser.consume_char(',') {
                    break;
                }
            }
        }

        let pivot = parser.position;
        let body = if parser.check(&COMPARERS.select) {
            StatementBody::Select(SelectStatement::parse(parser)?)
        } else if parser.consume(&COMPARERS.insert) {
            parser.expect(&COMPARERS.into)?;
            let table = parser.parse_identifier()?;
            skip_statement(parser);
            StatementBody::Insert { table }
        } else if parser.consume(&COMPARERS.update) {
            let table = parser.parse_identifier()?;
            skip_statement(parser);
            StatementBody::Update { table }
        } else if parser.consume(&COMPARERS.delete) {
            parser.expect(&COMPARERS.from)?;
            let table = parser.parse_identifier()?;
            skip_statement(parser);
            StatementBody::Delete { table }
        } else {
            return ParseError::new("Expected SELECT, INSERT, UPDATE or DELETE", pivot, parser).err();
        };

        Ok(SqlStatement { ctes, body })
    }
}

fn parse_cte(parser: &mut QueryParser) -> Result<CommonTableExpression, ParseError> {
    let name = parser.parse_identifier()?;
    let mut columns = vec![];
    if parser.consume_char('(') {
        loop {
            columns.push(parser.parse_identifier()?);
            if !parser.consume_char(',') {
                break;
            }
        }
        parser.expect_char(')')?;
    }
    parser.expect(&COMPARERS.r#as)?;
    parser.expect_char('(')?;
    let query = SelectStatement::parse(parser)?;
    parser.expect_char(')')?;
    Ok(CommonTableExpression { name, columns, query })
}

// DML bodies are never planned; skip to the end of the statement.
fn skip_statement(parser: &mut QueryParser) {
    let mut in_string = false;
    while !parser.eof() {
        let ch = parser.current();
        if ch == '\'' {
            in_string = !in_string;
        } else if ch == ';' && !in_string {
            return;
        }
        parser.next();
    }
}

impl SelectStatement {
    pub fn parse(parser: &mut QueryParser) -> Result<SelectStatement, ParseError> {
        let mut cores = vec![SelectCore::parse(parser)?];
        let mut compound_ops = vec![];

        loop {
            let op = if parser.consume(&COMPARERS.union) {
                if parser.consume(&COMPARERS.all) { CompoundOperator::UnionAll } else { CompoundOperator::Union }
            } else if parser.consume(&COMPARERS.intersect) {
                CompoundOperator::Intersect
            } else if parser.consume(&COMPARERS.except) {
                CompoundOperator::Except
            } else {
                break;
            };
            compound_ops.push(op);
            cores.push(SelectCore::parse(parser)?);
        }

        let mut ordering = vec![];
        if parser.consume(&COMPARERS.order) {
            parser.expect(&COMPARERS.by)?;
            loop {
                ordering.push(parse_ordering_term(parser)?);
                if !parser.consume_char(',') {
                    break;
                }
            }
        }

        let mut limit = None;
        let mut offset = None;
        if parser.consume(&COMPARERS.limit) {
            limit = Some(Expression::parse(parser)?);
            if parser.consume(&COMPARERS.offset) {
                offset = Some(Expression::parse(parser)?);
            }
        }

        Ok(SelectStatement { cores, compound_ops, ordering, limit, offset })
    }
}

fn parse_ordering_term(parser: &mut QueryParser) -> Result<OrderingTerm, ParseError> {
    let expr = Expression::parse(parser)?;

    let order = if parser.consume(&COMPARERS.asc) {
        Some(OrderType::Asc)
    } else if parser.consume(&COMPARERS.desc) {
        Some(OrderType::Desc)
    } else {
        None
    };

    let mut nulls = None;
    if parser.consume(&COMPARERS.nulls) {
        if parser.consume(&COMPARERS.first) {
            nulls = Some(NullOrder::First);
        } else {
            parser.expect(&COMPARERS.last)?;
            nulls = Some(NullOrder::Last);
        }
    }

    Ok(OrderingTerm { expr, order, nulls })
}

impl SelectCore {
    pub fn parse(parser: &mut QueryParser) -> Result<SelectCore, ParseError> {
        parser.expect(&COMPARERS.select)?;

        let mut core = SelectCore { distinct: parser.consume(&COMPARERS.distinct), ..Default::default() };

        loop {
            core.columns.push(parse_result_column(parser)?);
            if !parser.consume_char(',') {
                break;
            }
        }

        if parser.consume(&COMPARERS.from) {
            core.from = Some(TableSource::parse(parser)?);

            while let Some(join_type) = parse_join_type(parser)? {
                let source = TableSource::parse(parser)?;
                parser.expect(&COMPARERS.on)?;
                let on = Expression::parse(parser)?;
                core.joins.push(Join { join_type, source, on });
            }
        }

        if parser.consume(&COMPARERS.r#where) {
            core.where_clause = Some(Expression::parse(parser)?);
        }

        if parser.consume(&COMPARERS.group) {
            parser.expect(&COMPARERS.by)?;
            core.group_by = Expression::parse_list(parser)?;

            if parser.consume(&COMPARERS.having) {
                core.having = Some(Expression::parse(parser)?);
            }
        }

        Ok(core)
    }
}

fn parse_result_column(parser: &mut QueryParser) -> Result<ResultColumn, ParseError> {
    if parser.consume_char('*') {
        return Ok(ResultColumn::Wildcard { table: None });
    }

    if parser.at_identifier() {
        let pivot = parser.position;
        let table = parser.parse_identifier()?;
        if parser.current() == '.' && parser.peek(1) == '*' {
            parser.jump(2);
            return Ok(ResultColumn::Wildcard { table: Some(table) });
        }
        parser.position = pivot;
    }

    let expr = Expression::parse(parser)?;
    let alias = parser.try_parse_alias()?;
    Ok(ResultColumn::Expression { expr, alias })
}

fn parse_join_type(parser: &mut QueryParser) -> Result<Option<JoinType>, ParseError> {
    let join_type = if parser.consume(&COMPARERS.join) {
        return Ok(Some(JoinType::Inner));
    } else if parser.consume(&COMPARERS.inner) {
        JoinType::Inner
    } else if parser.consume(&COMPARERS.left) {
        JoinType::Left
    } else if parser.consume(&COMPARERS.right) {
        JoinType::Right
    } else if parser.consume(&COMPARERS.full) {
        JoinType::Full
    } else {
        return Ok(None);
    };

    if join_type != JoinType::Inner {
        parser.consume(&COMPARERS.outer);
    }
    parser.expect(&COMPARERS.join)?;
    Ok(Some(join_type))
}

impl TableSource {
    pub fn parse(parser: &mut QueryParser) -> Result<TableSource, ParseError> {
        parser.next_non_whitespace();
        let pivot = parser.position;

        if parser.consume_char('(') {
            let query = SelectStatement::parse(parser)?;
            parser.expect_char(')')?;
            let alias = parser.try_parse_alias()?;
            return Ok(TableSource::Subquery { query: Box::new(query), alias });
        }

        if !parser.at_identifier() {
            return ParseError::new("Expected table, subquery or function", pivot, parser).err();
        }
        let name = parser.parse_identifier()?;

        if let Some(call) = parse_call_suffix(parser, &name)? {
            let alias = parser.try_parse_alias()?;
            return Ok(TableSource::FunctionCall { call, alias });
        }

        let alias = parser.try_parse_alias()?;
        Ok(TableSource::Table { name, alias })
    }
}
