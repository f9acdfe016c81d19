//! Aggregation browser: compiles cells into statements and runs them.
//!
//! - [`compiler`] - conditions, aggregate columns and statement assembly
//! - [`functions`] - database aggregate functions by name
//! - [`calculators`] - moving-window calculators over result records
//! - [`result`] - executor contract, result stream and aggregation result
//!
//! # Flow
//!
//! ```text
//! AggregateQuery
//!   │  cell, aggregates, drilldown, split, order, page
//!   ▼
//! SqlBrowser::aggregate
//!   ├─► cardinality guard (unpaginated drilldown)
//!   ├─► summary statement ──► Executor ──► one record
//!   └─► drilldown statement ─► Executor ──► ResultStream
//!                                            ├─ exclude_if_null
//!                                            └─ calculators
//! ```

pub mod calculators;
pub mod compiler;
pub mod functions;
pub mod result;

pub use calculators::{WindowCalculator, WindowFunction, CALCULATOR_NAMES};
pub use compiler::{paginate, OrderItem, QueryCompiler};
pub use functions::{AggregateFunction, FunctionRegistry};
pub use result::{
    AggregationResult, Cursor, ExecutionError, ExecutionResult, Executor, MemoryCursor, Record,
    ResultStream,
};

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::cell::{Cell, CellError, CutParser, MemberConverters};
use crate::config::Settings;
use crate::diagnostics::{default_sink, DiagnosticSink};
use crate::drilldown::{Drilldown, DrilldownError, DrilldownRequest, SPLIT_DIMENSION_NAME};
use crate::model::{Cube, MeasureAggregate, ModelError};
use crate::sql::{ExprExt, Expr, Query};
use crate::star::{mapper_for, StarError, StarSchema};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Cell(#[from] CellError),

    #[error(transparent)]
    Drilldown(#[from] DrilldownError),

    #[error(transparent)]
    Star(#[from] StarError),

    #[error("No aggregates to compute")]
    EmptyAggregates,

    #[error("Expression aggregates are not supported (aggregate '{0}')")]
    ExpressionNotSupported(String),

    #[error("Unknown function '{function}' of aggregate '{aggregate}'")]
    UnknownFunction { function: String, aggregate: String },

    #[error("Aggregate '{0}' needs a measure")]
    MissingMeasure(String),

    #[error("Aggregate '{aggregate}' is computed from calculated aggregate '{measure}'")]
    CalculatedSource { aggregate: String, measure: String },

    #[error("Page {page} of size {page_size} is out of range")]
    PageOutOfRange { page: u64, page_size: u64 },

    #[error("Drilldown of high cardinality levels {levels:?} needs pagination")]
    UnboundedDrilldown { levels: Vec<String> },

    #[error("Drill-across is not supported")]
    DrillAcrossNotSupported,

    #[error("Invalid order '{0}'")]
    InvalidOrder(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

pub type CompileResult<T> = Result<T, CompileError>;

// =============================================================================
// Aggregate query
// =============================================================================

/// Everything one aggregation call needs.
#[derive(Debug, Clone, Default)]
#[must_use = "builders have no effect until used"]
pub struct AggregateQuery {
    pub cell: Cell,
    /// Aggregate names; every cube aggregate when `None`.
    pub aggregates: Option<Vec<String>>,
    pub drilldown: Vec<DrilldownRequest>,
    pub split: Option<Cell>,
    pub order: Vec<OrderItem>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    /// Cubes to drill across. Rejected.
    pub across: Vec<String>,
}

impl AggregateQuery {
    pub fn new(cell: Cell) -> Self {
        Self {
            cell,
            ..Default::default()
        }
    }

    pub fn with_aggregates(mut self, names: &[&str]) -> Self {
        self.aggregates = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_drilldown(mut self, request: DrilldownRequest) -> Self {
        self.drilldown.push(request);
        self
    }

    pub fn with_split(mut self, split: Cell) -> Self {
        self.split = Some(split);
        self
    }

    pub fn with_order(mut self, item: OrderItem) -> Self {
        self.order.push(item);
        self
    }

    pub fn with_page(mut self, page: u64, page_size: u64) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    pub fn with_across(mut self, cube: &str) -> Self {
        self.across.push(cube.into());
        self
    }

    /// A zero page size counts as no pagination.
    fn is_paginated(&self) -> bool {
        self.page.is_some() && self.page_size.is_some_and(|size| size > 0)
    }
}

/// Capabilities advertised to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Features {
    pub actions: Vec<String>,
    pub aggregate_functions: Vec<String>,
    pub post_aggregate_functions: Vec<String>,
}

/// Aggregates split by where they are computed.
struct AggregatePlan {
    database: Vec<MeasureAggregate>,
    calculated: Vec<MeasureAggregate>,
}

// =============================================================================
// Browser
// =============================================================================

/// Aggregation browser over one cube.
pub struct SqlBrowser {
    cube: Cube,
    star: StarSchema,
    settings: Settings,
    functions: FunctionRegistry,
    executor: Arc<dyn Executor>,
    diagnostics: Arc<dyn DiagnosticSink>,
    converters: MemberConverters,
}

impl SqlBrowser {
    pub fn new(cube: Cube, executor: Arc<dyn Executor>, settings: Settings) -> CompileResult<Self> {
        let mapper = mapper_for(&cube, &settings);
        let star = StarSchema::new(&cube, mapper.as_ref(), settings.dialect)?;

        Ok(Self {
            cube,
            star,
            settings,
            functions: FunctionRegistry::default(),
            executor,
            diagnostics: default_sink(),
            converters: MemberConverters::new(),
        })
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_converters(mut self, converters: MemberConverters) -> Self {
        self.converters = converters;
        self
    }

    pub fn cube(&self) -> &Cube {
        &self.cube
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Parse a cut string against the cube, applying member converters.
    pub fn parse_cell(&self, s: &str) -> CompileResult<Cell> {
        let cuts = CutParser::new()
            .with_cube(&self.cube)
            .with_converters(&self.converters)
            .parse_cuts(s)?;
        Ok(Cell::from_cuts(cuts))
    }

    pub fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(
            &self.cube,
            &self.star,
            &self.functions,
            self.diagnostics.as_ref(),
        )
    }

    pub fn features(&self) -> Features {
        Features {
            actions: vec!["aggregate".into(), "fact".into(), "facts".into()],
            aggregate_functions: self.functions.names(),
            post_aggregate_functions: CALCULATOR_NAMES.iter().map(|n| n.to_string()).collect(),
        }
    }

    // =========================================================================
    // Aggregation
    // =========================================================================

    pub fn aggregate(&self, query: &AggregateQuery) -> CompileResult<AggregationResult> {
        if !query.across.is_empty() {
            return Err(CompileError::DrillAcrossNotSupported);
        }

        let compiler = self.compiler();
        let cell = &query.cell;
        let drilldown = Drilldown::new(&query.drilldown, &self.cube, cell)?;
        let split = query.split.as_ref();
        let has_groups = !drilldown.is_empty() || split.is_some();

        if has_groups && !query.is_paginated() {
            let levels: Vec<String> = drilldown
                .high_cardinality_levels(&self.cube, cell)?
                .iter()
                .map(|l| l.name.clone())
                .collect();
            if !levels.is_empty() {
                return Err(CompileError::UnboundedDrilldown { levels });
            }
        }

        let plan = self.plan_aggregates(query.aggregates.as_deref())?;
        let exclude_if_null: Vec<String> = if self.settings.exclude_null_aggregates {
            plan.database.iter().map(|a| a.name.clone()).collect()
        } else {
            vec![]
        };

        let mut result = AggregationResult::new(
            cell.clone(),
            plan.database
                .iter()
                .chain(&plan.calculated)
                .map(|a| a.name.clone())
                .collect(),
        );
        result.calculators = plan.calculated.iter().map(|a| a.name.clone()).collect();
        result.exclude_if_null = exclude_if_null.clone();

        if self.settings.include_summary || !has_groups {
            let statement =
                compiler.aggregation_statement(cell, &plan.database, &drilldown, split, true)?;
            let mut summary = self.fetch_one(&statement, "aggregate_summary")?;
            if let Some(record) = summary.as_mut().filter(|_| !has_groups) {
                for mut calculator in self.calculators(&plan.calculated, &drilldown, split) {
                    calculator.apply(record);
                }
            }
            result.summary = summary;
        }

        if has_groups {
            let statement =
                compiler.aggregation_statement(cell, &plan.database, &drilldown, split, false)?;
            let statement = compiler.order(statement, &query.order, &drilldown.natural_order(), false)?;
            let statement = paginate(statement, query.page, query.page_size)?;

            result.levels = drilldown.result_levels(split.is_some());
            result.labels = statement.labels();

            let cursor = self.execute(&statement, "aggregate")?;
            result.cells = Some(
                ResultStream::new(cursor, statement.labels(), self.settings.batch_size)
                    .with_exclude_if_null(exclude_if_null)
                    .with_calculators(self.calculators(&plan.calculated, &drilldown, split)),
            );

            if self.settings.include_cell_count {
                let count = compiler.cell_count_statement(&statement);
                result.total_cell_count = self
                    .fetch_one(&count, "aggregate_count")?
                    .and_then(|r| r.get("count").and_then(Value::as_u64));
            }
        }

        Ok(result)
    }

    /// Requested aggregates split into database and calculated ones.
    ///
    /// A calculated aggregate's source aggregate is computed by the database
    /// even when it was not requested.
    fn plan_aggregates(&self, names: Option<&[String]>) -> CompileResult<AggregatePlan> {
        let names: Option<Vec<&str>> = names.map(|n| n.iter().map(String::as_str).collect());
        let requested = self.cube.aggregates_for(names.as_deref())?;

        let (calculated, mut database): (Vec<_>, Vec<_>) =
            requested.into_iter().partition(|a| is_calculated(a));

        for aggregate in &calculated {
            let Some(source) = aggregate.measure.as_deref() else {
                return Err(CompileError::MissingMeasure(aggregate.name.clone()));
            };
            if database.iter().any(|a| a.name == source) {
                continue;
            }
            let source = self.cube.aggregate(source)?;
            if is_calculated(source) {
                return Err(CompileError::CalculatedSource {
                    aggregate: aggregate.name.clone(),
                    measure: source.name.clone(),
                });
            }
            database.push(source.clone());
        }

        if database.is_empty() {
            return Err(CompileError::EmptyAggregates);
        }
        Ok(AggregatePlan {
            database,
            calculated,
        })
    }

    /// Fresh window calculators, keyed by the non-series drilldown keys.
    fn calculators(
        &self,
        calculated: &[MeasureAggregate],
        drilldown: &Drilldown,
        split: Option<&Cell>,
    ) -> Vec<WindowCalculator> {
        let mut key: Vec<String> = vec![];
        let mut series_units = None;
        for item in drilldown.items() {
            match item.deepest_level().and_then(|l| l.aggregation_units) {
                Some(units) => series_units = Some(units),
                None => key.extend(item.keys.iter().cloned()),
            }
        }
        if split.is_some() {
            key.push(SPLIT_DIMENSION_NAME.into());
        }

        calculated
            .iter()
            .filter_map(|aggregate| {
                let function = WindowFunction::from_name(aggregate.function.as_deref()?)?;
                let source = aggregate.measure.as_deref()?;
                let window = series_units
                    .or(aggregate.window_size)
                    .unwrap_or(self.settings.default_window_size);
                Some(WindowCalculator::new(
                    function,
                    key.clone(),
                    source,
                    &aggregate.name,
                    window,
                ))
            })
            .collect()
    }

    // =========================================================================
    // Facts
    // =========================================================================

    /// Denormalized fact rows of `cell`.
    ///
    /// `fields` are attribute references; every cube attribute when `None`.
    pub fn facts(
        &self,
        cell: &Cell,
        fields: Option<&[String]>,
        order: &[OrderItem],
        page: Option<u64>,
        page_size: Option<u64>,
    ) -> CompileResult<ResultStream> {
        let compiler = self.compiler();
        let statement = compiler.denormalized_statement(Some(cell), fields, true)?;
        let statement = compiler.order(statement, order, &[], true)?;
        let statement = paginate(statement, page, page_size)?;

        let cursor = self.execute(&statement, "facts")?;
        Ok(ResultStream::new(
            cursor,
            statement.labels(),
            self.settings.batch_size,
        ))
    }

    /// The fact with `key`, if any.
    pub fn fact(&self, key: impl Into<Expr>) -> CompileResult<Option<Record>> {
        let statement = self
            .compiler()
            .denormalized_statement(None, None, true)?
            .filter(self.star.fact_key_column().eq(key.into()));
        self.fetch_one(&statement, "fact")
    }

    // =========================================================================
    // Execution
    // =========================================================================

    fn execute(&self, query: &Query, label: &str) -> CompileResult<Box<dyn Cursor>> {
        tracing::debug!(
            label,
            sql = %query.to_sql(self.settings.dialect),
            "executing statement"
        );
        Ok(self.executor.execute(query, label)?)
    }

    /// First record of `query`; the cursor is closed afterwards.
    fn fetch_one(&self, query: &Query, label: &str) -> CompileResult<Option<Record>> {
        let cursor = self.execute(query, label)?;
        let mut stream = ResultStream::new(cursor, query.labels(), 1);
        let record = stream.next().transpose()?;
        stream.close();
        Ok(record)
    }
}

impl std::fmt::Debug for SqlBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlBrowser")
            .field("cube", &self.cube.name)
            .field("settings", &self.settings)
            .finish()
    }
}

fn is_calculated(aggregate: &MeasureAggregate) -> bool {
    aggregate
        .function
        .as_deref()
        .is_some_and(|f| WindowFunction::from_name(f).is_some())
}
