//! Structural validation using sqlparser-rs.
//!
//! Tokenizes and parses the statement so that keywords and terminators
//! inside string literals and comments are not mistaken for real ones.
//! A statement that parses gets its verdict here. One that does not parse
//! falls back to the keyword checks.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use tracing::debug;

use super::textual::is_select;
use super::Rejection;

/// Result of inspecting a statement's parse tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    /// A single read-only SELECT.
    Read,
    /// The parse tree breaks a rule.
    Rejected(Rejection),
    /// The statement did not tokenize or parse.
    Unparsed,
}

/// Inspects an already trimmed statement.
pub fn inspect(sql: &str) -> Inspection {
    let dialect = SQLiteDialect {};
    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!("Statement did not tokenize: {e}");
            return Inspection::Unparsed;
        }
    };
    let terminators = tokens.iter().filter(|t| **t == Token::SemiColon).count();

    let statements = match Parser::new(&dialect).with_tokens(tokens).parse_statements() {
        Ok(statements) => statements,
        Err(e) => {
            debug!("Statement did not parse: {e}");
            return Inspection::Unparsed;
        }
    };

    if statements.iter().any(statement_writes) {
        return Inspection::Rejected(Rejection::WriteOperationDenied);
    }
    if statements.len() > 1 || terminators > 0 {
        return Inspection::Rejected(Rejection::MultipleStatementsDenied);
    }

    match statements.as_slice() {
        [Statement::Query(_)] if is_select(sql) => Inspection::Read,
        _ => Inspection::Rejected(Rejection::NonSelectDenied),
    }
}

fn statement_writes(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => query_mutates(query),
        Statement::Insert { .. }
        | Statement::Update { .. }
        | Statement::Delete { .. }
        | Statement::Merge { .. }
        | Statement::Truncate { .. }
        | Statement::Drop { .. }
        | Statement::AlterTable { .. }
        | Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateVirtualTable { .. } => true,
        _ => false,
    }
}

/// Returns true if any part of the query modifies data.
fn query_mutates(query: &Query) -> bool {
    let cte_mutates = query
        .with
        .as_ref()
        .is_some_and(|with| with.cte_tables.iter().any(|cte| query_mutates(&cte.query)));

    cte_mutates || set_expr_mutates(&query.body)
}

fn set_expr_mutates(set_expr: &SetExpr) -> bool {
    match set_expr {
        SetExpr::Select(select) => select_mutates(select),
        SetExpr::Query(query) => query_mutates(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_mutates(left) || set_expr_mutates(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => false,
        // INSERT/UPDATE/DELETE/MERGE bodies and anything newer than this match.
        _ => true,
    }
}

fn select_mutates(select: &Select) -> bool {
    // SELECT ... INTO creates a table.
    select.into.is_some() || select.from.iter().any(table_with_joins_mutates)
}

fn table_with_joins_mutates(twj: &TableWithJoins) -> bool {
    table_factor_mutates(&twj.relation)
        || twj
            .joins
            .iter()
            .any(|join| table_factor_mutates(&join.relation))
}

fn table_factor_mutates(factor: &TableFactor) -> bool {
    match factor {
        TableFactor::Derived { subquery, .. } => query_mutates(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => table_with_joins_mutates(table_with_joins),
        _ => false,
    }
}
