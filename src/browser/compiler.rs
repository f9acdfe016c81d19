//! Statement compiler: cells, drilldowns and aggregates to SELECT queries.
//!
//! ```text
//! Cell ──► condition_for_cell ─────────────┐
//! Drilldown ──► group-by selection ────────┼──► Query ──► paginate/order
//! aggregates ──► FunctionRegistry ─────────┤
//! split Cell ──► CASE WHEN .. END flag ────┘
//! ```

use std::str::FromStr;

use super::calculators::WindowFunction;
use super::functions::FunctionRegistry;
use super::{CompileError, CompileResult};
use crate::cell::{Cell, Cut, CutKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use crate::drilldown::{Drilldown, SPLIT_DIMENSION_NAME};
use crate::model::{Cube, Level, MeasureAggregate, ModelError};
use crate::sql::{
    and_all, case_flag, count_star, lit_bool, lit_str, or_any, Expr, ExprExt, OrderByExpr, Query,
    SelectExpr, SortDir,
};
use crate::star::{StarSchema, FACT_KEY_LABEL};

/// Alias of the sub-query the cell count runs over.
const CELL_COUNT_SUBQUERY: &str = "__cells__";

/// An explicit ORDER BY request: `attribute[:asc|desc]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub attribute: String,
    pub dir: Option<SortDir>,
}

impl OrderItem {
    pub fn new(attribute: &str) -> Self {
        Self {
            attribute: attribute.into(),
            dir: None,
        }
    }

    pub fn with_dir(mut self, dir: SortDir) -> Self {
        self.dir = Some(dir);
        self
    }
}

impl FromStr for OrderItem {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((attribute, dir)) => {
                let dir = SortDir::parse(dir).ok_or_else(|| CompileError::InvalidOrder(s.into()))?;
                Ok(Self::new(attribute).with_dir(dir))
            }
            None => Ok(Self::new(s)),
        }
    }
}

/// Which bound of a range a boundary condition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Lower,
    Upper,
}

/// Builds statements for one cube over its star schema.
pub struct QueryCompiler<'a> {
    cube: &'a Cube,
    star: &'a StarSchema,
    functions: &'a FunctionRegistry,
    diagnostics: &'a dyn DiagnosticSink,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(
        cube: &'a Cube,
        star: &'a StarSchema,
        functions: &'a FunctionRegistry,
        diagnostics: &'a dyn DiagnosticSink,
    ) -> Self {
        Self {
            cube,
            star,
            functions,
            diagnostics,
        }
    }

    // =========================================================================
    // Conditions
    // =========================================================================

    /// Conjunction of every cut's condition; `None` for an empty cell.
    pub fn condition_for_cell(&self, cell: &Cell) -> CompileResult<Option<Expr>> {
        let conditions = cell
            .cuts()
            .iter()
            .map(|cut| self.condition_for_cut(cut))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(and_all(conditions))
    }

    pub fn condition_for_cut(&self, cut: &Cut) -> CompileResult<Expr> {
        let condition = match &cut.kind {
            CutKind::Point { path } => self.point_condition(cut, path)?,
            CutKind::Set { paths } => {
                let members = paths
                    .iter()
                    .map(|path| self.point_condition(cut, path))
                    .collect::<CompileResult<Vec<_>>>()?;
                or_any(members).unwrap_or_else(|| lit_bool(false))
            }
            CutKind::Range { from, to } => {
                let lower = match from {
                    Some(from) => Some(self.boundary_condition(cut, from, Bound::Lower, true)?),
                    None => None,
                };
                let upper = match to {
                    Some(to) => Some(self.boundary_condition(cut, to, Bound::Upper, true)?),
                    None => None,
                };
                match (lower, upper) {
                    (Some(lower), Some(upper)) => lower.paren().and(upper.paren()),
                    (Some(bound), None) | (None, Some(bound)) => bound,
                    (None, None) => lit_bool(true),
                }
            }
        };

        Ok(if cut.invert {
            condition.not()
        } else {
            condition
        })
    }

    /// Key columns of the levels `path` spans.
    fn path_levels(&self, cut: &Cut, path: &[String]) -> CompileResult<Vec<Level>> {
        let hierarchy = self
            .cube
            .dimension(&cut.dimension)?
            .hierarchy(cut.hierarchy.as_deref())?;
        Ok(hierarchy.levels_for_depth(path.len())?.to_vec())
    }

    fn key_column(&self, level: &Level) -> CompileResult<Expr> {
        Ok(self.star.column(&level.key().reference())?)
    }

    /// Equality of every level key with its path member.
    fn point_condition(&self, cut: &Cut, path: &[String]) -> CompileResult<Expr> {
        let levels = self.path_levels(cut, path)?;
        let conditions = levels
            .iter()
            .zip(path)
            .map(|(level, value)| Ok(self.key_column(level)?.eq(lit_str(value))))
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(and_all(conditions).unwrap_or_else(|| lit_bool(true)))
    }

    /// Lexicographic bound over the path: equal prefix and a comparison on
    /// the last level, OR-ed with the strict bound of the shorter prefix.
    fn boundary_condition(
        &self,
        cut: &Cut,
        path: &[String],
        bound: Bound,
        inclusive: bool,
    ) -> CompileResult<Expr> {
        let levels = self.path_levels(cut, path)?;
        let (last_level, prefix_levels) = match levels.split_last() {
            Some(split) => split,
            None => return Ok(lit_bool(true)),
        };
        let (last_value, prefix) = match path.split_last() {
            Some(split) => split,
            None => return Ok(lit_bool(true)),
        };

        let mut conditions = prefix_levels
            .iter()
            .zip(prefix)
            .map(|(level, value)| Ok(self.key_column(level)?.eq(lit_str(value))))
            .collect::<CompileResult<Vec<_>>>()?;

        let column = self.key_column(last_level)?;
        let value = lit_str(last_value);
        conditions.push(match (bound, inclusive) {
            (Bound::Lower, true) => column.gte(value),
            (Bound::Lower, false) => column.gt(value),
            (Bound::Upper, true) => column.lte(value),
            (Bound::Upper, false) => column.lt(value),
        });

        let condition = and_all(conditions).unwrap_or_else(|| lit_bool(true));
        if prefix.is_empty() {
            return Ok(condition);
        }

        let shorter = self.boundary_condition(cut, prefix, bound, false)?;
        Ok(condition.paren().or(shorter.paren()))
    }

    /// `CASE WHEN <split condition> THEN true ELSE false END`
    pub fn split_column(&self, split: &Cell) -> CompileResult<Expr> {
        let condition = self
            .condition_for_cell(split)?
            .unwrap_or_else(|| lit_bool(true));
        Ok(case_flag(condition))
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Aggregate expression labelled with the aggregate name; `None` for
    /// aggregates computed by calculators.
    pub fn aggregate_column(&self, aggregate: &MeasureAggregate) -> CompileResult<Option<SelectExpr>> {
        if aggregate.function.is_none() && aggregate.expression.is_none() {
            return Err(ModelError::MissingAggregateDefinition(aggregate.name.clone()).into());
        }
        if aggregate.expression.is_some() {
            return Err(CompileError::ExpressionNotSupported(aggregate.name.clone()));
        }

        let function_name = aggregate.function.as_deref().unwrap_or_default();
        let Some(function) = self.functions.get(function_name) else {
            if WindowFunction::from_name(function_name).is_some() {
                return Ok(None);
            }
            return Err(CompileError::UnknownFunction {
                function: function_name.into(),
                aggregate: aggregate.name.clone(),
            });
        };

        let measure = match &aggregate.measure {
            Some(measure) => Some(self.star.column(measure)?),
            None if function.requires_measure() => {
                return Err(CompileError::MissingMeasure(aggregate.name.clone()))
            }
            None => None,
        };

        Ok(Some(function.expression(measure).alias(&aggregate.name)))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    /// Aggregation of `cell`, grouped by the drilldown (and split flag)
    /// unless `for_summary`.
    ///
    /// A summary still joins the drilldown's tables so it covers the same
    /// rows as the drilldown.
    pub fn aggregation_statement(
        &self,
        cell: &Cell,
        aggregates: &[MeasureAggregate],
        drilldown: &Drilldown,
        split: Option<&Cell>,
        for_summary: bool,
    ) -> CompileResult<Query> {
        if aggregates.is_empty() {
            return Err(CompileError::EmptyAggregates);
        }

        let drilled: Vec<String> = dedup(
            drilldown
                .all_attributes()
                .iter()
                .map(|a| a.reference()),
        );

        let mut references: Vec<String> = cell
            .all_attributes(self.cube)?
            .iter()
            .map(|a| a.reference())
            .collect();
        references.extend(drilled.iter().cloned());
        if let Some(split) = split {
            references.extend(split.all_attributes(self.cube)?.iter().map(|a| a.reference()));
        }
        references.extend(aggregates.iter().filter_map(|a| a.measure.clone()));

        let base = self.star.base_references(&references)?;
        let star = self.star.get_star(&base)?;

        let mut selection: Vec<SelectExpr> = vec![];
        let mut group_by: Vec<Expr> = vec![];
        if !for_summary {
            for reference in &drilled {
                let column = self.star.column(reference)?;
                group_by.push(column.clone());
                selection.push(column.alias(reference));
            }
            if let Some(split) = split {
                let column = self.split_column(split)?;
                group_by.push(column.clone());
                selection.push(column.alias(SPLIT_DIMENSION_NAME));
            }
        }

        for aggregate in aggregates {
            if let Some(column) = self.aggregate_column(aggregate)? {
                selection.push(column);
            }
        }

        let mut query = star.apply(Query::new().select(selection)).group_by(group_by);
        if let Some(condition) = self.condition_for_cell(cell)? {
            query = query.filter(condition);
        }
        Ok(query)
    }

    /// Row-level statement over the star: the requested attributes (every
    /// cube attribute by default), optionally the fact key, filtered by
    /// `cell`.
    pub fn denormalized_statement(
        &self,
        cell: Option<&Cell>,
        attributes: Option<&[String]>,
        include_fact_key: bool,
    ) -> CompileResult<Query> {
        let attributes: Vec<String> = match attributes {
            Some(refs) => refs.to_vec(),
            None => self
                .cube
                .all_fact_attributes()
                .iter()
                .map(|a| a.reference())
                .collect(),
        };

        let mut references = attributes.clone();
        if let Some(cell) = cell {
            references.extend(cell.all_attributes(self.cube)?.iter().map(|a| a.reference()));
        }
        let base = self.star.base_references(&references)?;
        let star = self.star.get_star(&base)?;

        let mut selection = vec![];
        if include_fact_key {
            selection.push(self.star.fact_key_column().alias(FACT_KEY_LABEL));
        }
        for reference in &attributes {
            selection.push(self.star.column(reference)?.alias(reference));
        }

        let mut query = star.apply(Query::new().select(selection));
        if let Some(condition) = match cell {
            Some(cell) => self.condition_for_cell(cell)?,
            None => None,
        } {
            query = query.filter(condition);
        }
        Ok(query)
    }

    /// COUNT(*) over `query` without its ordering and pagination.
    pub fn cell_count_statement(&self, query: &Query) -> Query {
        let mut inner = query.clone();
        inner.order_by.clear();
        inner.limit_offset = None;

        Query::new()
            .select(vec![count_star().alias("count")])
            .from_subquery(inner, CELL_COUNT_SUBQUERY)
    }

    /// Explicit order first, then natural order for selected attributes not
    /// already ordered.
    ///
    /// Explicit items must name a selected label; with `allow_unselected`
    /// any star attribute is accepted. Anything else is reported and
    /// skipped.
    pub fn order(
        &self,
        query: Query,
        order: &[OrderItem],
        natural_order: &[(String, SortDir)],
        allow_unselected: bool,
    ) -> CompileResult<Query> {
        let labels = query.labels();
        let selected = |name: &str| -> Option<Expr> {
            labels
                .iter()
                .position(|l| l == name)
                .map(|i| query.select[i].expr.clone())
        };

        let mut ordered: Vec<String> = vec![];
        let mut order_by: Vec<OrderByExpr> = vec![];

        for item in order {
            if ordered.contains(&item.attribute) {
                continue;
            }
            let column = match selected(&item.attribute) {
                Some(expr) => Some(expr),
                None if allow_unselected => self.star.column(&item.attribute).ok(),
                None => None,
            };
            let Some(column) = column else {
                self.diagnostics.report(Diagnostic::new(
                    DiagnosticCode::UnknownOrderAttribute,
                    format!("Ignoring unknown order attribute '{}'", item.attribute),
                ));
                continue;
            };
            let mut expr = OrderByExpr::new(column);
            if let Some(dir) = item.dir {
                expr = expr.with_dir(dir);
            }
            order_by.push(expr);
            ordered.push(item.attribute.clone());
        }

        for (attribute, dir) in natural_order {
            if ordered.contains(attribute) {
                continue;
            }
            if let Some(column) = selected(attribute) {
                order_by.push(OrderByExpr::new(column).with_dir(*dir));
                ordered.push(attribute.clone());
            }
        }

        Ok(query.order_by(order_by))
    }
}

/// LIMIT `page_size` OFFSET `page * page_size`, when both are given and
/// the page size is not zero.
///
/// Offsets the database cannot represent are rejected.
pub fn paginate(query: Query, page: Option<u64>, page_size: Option<u64>) -> CompileResult<Query> {
    let (Some(page), Some(size)) = (page, page_size.filter(|s| *s > 0)) else {
        return Ok(query);
    };
    let offset = page
        .checked_mul(size)
        .filter(|o| i64::try_from(*o).is_ok() && i64::try_from(size).is_ok())
        .ok_or(CompileError::PageOutOfRange {
            page,
            page_size: size,
        })?;

    let query = query.limit(size);
    Ok(if offset > 0 { query.offset(offset) } else { query })
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = vec![];
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
