//! SQL dialects.
//!
//! A dialect decides how identifiers and literals are quoted and how a
//! page of results is requested:
//!
//! | Dialect | Identifiers | Booleans | Pagination |
//! |---------|-------------|----------|------------|
//! | DuckDB | `"x"` | `true` | `LIMIT n OFFSET m` |
//! | PostgreSQL | `"x"` | `true` | `LIMIT n OFFSET m` |
//! | MySQL | `` `x` `` | `1` | `LIMIT n OFFSET m` |
//! | T-SQL | `[x]` | `1` | `OFFSET m ROWS FETCH NEXT n ROWS ONLY` |

use serde::{Deserialize, Serialize};

use super::token::{Token, TokenStream};

/// Rendering rules of one SQL dialect.
///
/// Defaults follow ANSI SQL; dialects override what differs.
pub trait SqlDialect: std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String;

    /// Single quotes, doubled inside.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "true"
        } else {
            "false"
        }
    }

    /// `LIMIT n OFFSET m`.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        let mut ts = TokenStream::new();

        if let Some(lim) = limit {
            ts.push(Token::Limit).space().push(Token::LitInt(clamp(lim)));
        }

        if let Some(off) = offset {
            if limit.is_some() {
                ts.space();
            }
            ts.push(Token::Offset).space().push(Token::LitInt(clamp(off)));
        }

        ts
    }

    /// Whether OFFSET/FETCH is only legal after an ORDER BY.
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    fn supports_nulls_ordering(&self) -> bool {
        true
    }
}

/// Row counts past `i64::MAX` saturate; no engine takes a larger BIGINT.
fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn quote_with(ident: &str, open: char, close: char) -> String {
    let escaped = ident.replace(close, &format!("{close}{close}"));
    format!("{open}{escaped}{close}")
}

/// DuckDB.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '"', '"')
    }
}

/// PostgreSQL.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '"', '"')
    }
}

/// MySQL. No native booleans and no NULLS FIRST/LAST.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '`', '`')
    }

    /// Backslash is an escape character inside MySQL literals.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "1"
        } else {
            "0"
        }
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }
}

/// SQL Server.
#[derive(Debug, Clone, Copy)]
pub struct TSql;

impl SqlDialect for TSql {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_with(ident, '[', ']')
    }

    fn quote_string(&self, s: &str) -> String {
        format!("N'{}'", s.replace('\'', "''"))
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "1"
        } else {
            "0"
        }
    }

    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`; OFFSET is mandatory once
    /// FETCH is present.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        let mut ts = TokenStream::new();
        if limit.is_none() && offset.is_none() {
            return ts;
        }

        ts.push(Token::Offset)
            .space()
            .push(Token::LitInt(clamp(offset.unwrap_or(0))))
            .space()
            .push(Token::Rows);

        if let Some(lim) = limit {
            ts.space()
                .push(Token::Fetch)
                .space()
                .push(Token::Next)
                .space()
                .push(Token::LitInt(clamp(lim)))
                .space()
                .push(Token::Rows)
                .space()
                .push(Token::Only);
        }

        ts
    }

    fn requires_order_by_for_offset(&self) -> bool {
        true
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }
}

/// Dialects the statement builder can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    DuckDb,
    Postgres,
    MySql,
    TSql,
}

impl Dialect {
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::TSql => &TSql,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn requires_order_by_for_offset(&self) -> bool {
        self.dialect().requires_order_by_for_offset()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }
}
