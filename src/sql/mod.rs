//! Statement rendering for the browser.
//!
//! Cell conditions, grouped aggregations and fact lookups are assembled as
//! values and only turn into text for a chosen [`Dialect`]:
//!
//! - [`expr`]: conditions, aggregate calls and flag columns
//! - [`query`]: one SELECT with joins, grouping and paging
//! - [`token`]: the rendered vocabulary
//! - [`dialect`]: quoting and paging per engine

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    and_all, avg, case_flag, col, count, count_distinct, count_star, func, lit_bool, lit_int,
    lit_null, lit_str, max, min, or_any, qualified_col, raw_sql, star, sum, table_col,
    BinaryOperator, Expr, ExprExt, Literal, UnaryOperator,
};
pub use query::{
    FromItem, Join, JoinType, LimitOffset, NullsOrder, OrderByExpr, Query, SelectExpr, SortDir,
    TableRef,
};
pub use token::{Token, TokenStream};
