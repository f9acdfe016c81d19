//! # Dicer
//!
//! Multidimensional cell algebra and an aggregation query compiler for
//! star and snowflake schemas.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Cut string / dict  ("date:2010,5|geo:EU")       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [cell::codec]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Cell (point, range and set cuts) + Drilldown      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [browser::compiler + star]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Query (conditions, joins, GROUP BY, ORDER, LIMIT)      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [Executor]
//! ┌─────────────────────────────────────────────────────────┐
//! │   ResultStream (batched records, null exclusion,         │
//! │                 moving-window calculators)               │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod cell;
pub mod config;
pub mod diagnostics;
pub mod drilldown;
pub mod model;
pub mod sql;
pub mod star;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::browser::{
        AggregateQuery, AggregationResult, CompileError, CompileResult, Cursor, ExecutionError,
        ExecutionResult, Executor, MemoryCursor, OrderItem, Record, ResultStream, SqlBrowser,
    };
    pub use crate::cell::{
        cut_from_string, cuts_from_string, cuts_to_string, Cell, CellError, Cut, CutKind,
        RollupSpec,
    };
    pub use crate::config::Settings;
    pub use crate::drilldown::{Drilldown, DrilldownRequest};
    pub use crate::model::{
        Attribute, Cardinality, Cube, CubeJoin, Dimension, Hierarchy, Level, MeasureAggregate,
    };
    pub use crate::sql::{Dialect, Query, SortDir};
}

// Also export at crate root for convenience
pub use browser::{AggregateQuery, SqlBrowser};
pub use cell::{Cell, Cut};
pub use config::Settings;
pub use model::Cube;
