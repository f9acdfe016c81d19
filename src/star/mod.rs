//! Star schema: logical attribute references to physical columns and the
//! joins needed to reach them.
//!
//! ```text
//! Cube + Mapper ──► StarSchema ──► column(ref)   : Expr
//!                              └─► get_star(refs): FROM fact + JOIN chain
//! ```
//!
//! Joins are walked from each required table back to the fact table, so
//! snowflaked dimensions pull in their intermediate tables.

pub mod mapper;

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::model::{Attribute, Cube, JoinMethod, ModelError};
use crate::sql::{table_col, Dialect, Expr, ExprExt, JoinType, Query, TableRef};

pub use mapper::{mapper_for, Column, DenormalizedMapper, Mapper, SnowflakeMapper};

/// Label of the fact key column in denormalized statements.
pub const FACT_KEY_LABEL: &str = "__fact_key__";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StarError {
    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("No join leads to table '{0}'")]
    NoJoinForTable(String),

    #[error("Joins form a cycle through table '{0}'")]
    CircularJoin(String),

    #[error("Derived attribute '{0}' depends on itself")]
    CircularDependency(String),

    #[error("Invalid physical mapping '{0}'")]
    InvalidMapping(String),

    #[error("Join detail '{0}' does not name a table")]
    InvalidJoin(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type StarResult<T> = Result<T, StarError>;

#[derive(Debug, Clone)]
struct StarJoin {
    master: Column,
    detail: Column,
    table: TableRef,
    join_type: JoinType,
}

/// The FROM clause and join chain covering a set of attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    pub from: TableRef,
    pub joins: Vec<(JoinType, TableRef, Expr)>,
}

impl Star {
    /// Attach FROM and the joins to `query`.
    pub fn apply(self, query: Query) -> Query {
        self.joins
            .into_iter()
            .fold(query.from(self.from), |q, (join_type, table, on)| {
                q.join(join_type, table, on)
            })
    }
}

/// Physical layout of one cube.
#[derive(Debug, Clone)]
pub struct StarSchema {
    name: String,
    fact: TableRef,
    fact_key: String,
    columns: HashMap<String, Column>,
    derived: HashMap<String, Attribute>,
    /// Keyed by the detail table's name in the star.
    joins: HashMap<String, StarJoin>,
    dialect: Dialect,
}

impl StarSchema {
    pub fn new(cube: &Cube, mapper: &dyn Mapper, dialect: Dialect) -> StarResult<Self> {
        let fact_name = mapper.fact_name().to_string();

        let mut columns = HashMap::new();
        let mut derived = HashMap::new();
        for attribute in cube.all_fact_attributes() {
            if attribute.is_base() {
                columns.insert(attribute.reference(), mapper.physical(attribute)?);
            } else {
                derived.insert(attribute.reference(), attribute.clone());
            }
        }

        let mut joins = HashMap::new();
        for join in &cube.joins {
            let detail_table = join
                .detail
                .table
                .as_deref()
                .ok_or_else(|| StarError::InvalidJoin(join.detail.column.clone()))?;
            let key = join.detail_name().unwrap_or(detail_table).to_string();

            let mut table = TableRef::new(detail_table)
                .with_schema_opt(join.detail.schema.as_deref().or(mapper.schema()));
            if let Some(alias) = &join.alias {
                table = table.with_alias(alias);
            }

            let master = Column::new(
                join.master.schema.as_deref(),
                join.master.table.as_deref().unwrap_or(&fact_name),
                &join.master.column,
            );
            let detail = Column::new(None, &key, &join.detail.column);

            joins.insert(
                key,
                StarJoin {
                    master,
                    detail,
                    table,
                    join_type: join_type(join.method),
                },
            );
        }

        Ok(Self {
            name: cube.name.clone(),
            fact: TableRef::new(&fact_name).with_schema_opt(mapper.schema()),
            fact_key: cube.key.clone(),
            columns,
            derived,
            joins,
            dialect,
        })
    }

    pub fn fact_name(&self) -> &str {
        &self.fact.table
    }

    pub fn is_derived(&self, reference: &str) -> bool {
        self.derived.contains_key(reference)
    }

    pub fn physical(&self, reference: &str) -> StarResult<&Column> {
        self.columns
            .get(reference)
            .ok_or_else(|| StarError::UnknownAttribute(reference.into()))
    }

    /// Column expression for a reference. Derived attributes render as
    /// their expression with every reference replaced by its column.
    pub fn column(&self, reference: &str) -> StarResult<Expr> {
        self.column_inner(reference, &mut vec![])
    }

    fn column_inner(&self, reference: &str, visiting: &mut Vec<String>) -> StarResult<Expr> {
        if let Some(column) = self.columns.get(reference) {
            return Ok(table_col(&column.table, &column.column));
        }

        let attribute = self
            .derived
            .get(reference)
            .ok_or_else(|| StarError::UnknownAttribute(reference.into()))?;
        if visiting.iter().any(|v| v == reference) {
            return Err(StarError::CircularDependency(reference.into()));
        }
        visiting.push(reference.into());

        let mut failure = None;
        let sql = attribute.expression_with(|token| {
            if !self.is_known(token) || failure.is_some() {
                return None;
            }
            match self.column_inner(token, visiting) {
                Ok(expr) => Some(expr.to_sql(self.dialect)),
                Err(e) => {
                    failure = Some(e);
                    None
                }
            }
        });
        visiting.pop();

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(Expr::Raw(sql.unwrap_or_default()).paren())
    }

    fn is_known(&self, reference: &str) -> bool {
        self.columns.contains_key(reference) || self.derived.contains_key(reference)
    }

    /// Base references `references` resolve to, derived ones replaced by
    /// their dependencies. Order of first appearance, no duplicates.
    pub fn base_references(&self, references: &[String]) -> StarResult<Vec<String>> {
        let mut result = vec![];
        for reference in references {
            self.collect_base(reference, &mut result, &mut vec![])?;
        }
        Ok(result)
    }

    fn collect_base(
        &self,
        reference: &str,
        out: &mut Vec<String>,
        visiting: &mut Vec<String>,
    ) -> StarResult<()> {
        if self.columns.contains_key(reference) {
            if !out.iter().any(|r| r == reference) {
                out.push(reference.into());
            }
            return Ok(());
        }

        let attribute = self
            .derived
            .get(reference)
            .ok_or_else(|| StarError::UnknownAttribute(reference.into()))?;
        if visiting.iter().any(|v| v == reference) {
            return Err(StarError::CircularDependency(reference.into()));
        }
        visiting.push(reference.into());
        for token in attribute.expression_tokens() {
            if self.is_known(&token) {
                self.collect_base(&token, out, visiting)?;
            }
        }
        visiting.pop();
        Ok(())
    }

    /// `fact.key AS __fact_key__` source column.
    pub fn fact_key_column(&self) -> Expr {
        table_col(&self.fact.table, &self.fact_key)
    }

    /// FROM the fact table, joined with every table holding one of the
    /// base `references`.
    pub fn get_star(&self, references: &[String]) -> StarResult<Star> {
        let fact = self.fact.table.clone();

        let mut needed: Vec<&str> = vec![];
        for reference in references {
            let table = self.physical(reference)?.table.as_str();
            if table != fact && !needed.contains(&table) {
                needed.push(table);
            }
        }

        let mut joined: HashSet<String> = HashSet::from([fact]);
        let mut joins = vec![];
        for table in needed {
            self.join_chain(table, &mut joined, &mut joins, &mut vec![])?;
        }

        tracing::trace!(cube = %self.name, joins = joins.len(), "resolved star");

        Ok(Star {
            from: self.fact.clone(),
            joins,
        })
    }

    fn join_chain(
        &self,
        table: &str,
        joined: &mut HashSet<String>,
        out: &mut Vec<(JoinType, TableRef, Expr)>,
        visiting: &mut Vec<String>,
    ) -> StarResult<()> {
        if joined.contains(table) {
            return Ok(());
        }
        if visiting.iter().any(|v| v == table) {
            return Err(StarError::CircularJoin(table.into()));
        }

        let join = self
            .joins
            .get(table)
            .ok_or_else(|| StarError::NoJoinForTable(table.into()))?;

        visiting.push(table.into());
        self.join_chain(&join.master.table, joined, out, visiting)?;
        visiting.pop();

        let on = table_col(&join.master.table, &join.master.column)
            .eq(table_col(&join.detail.table, &join.detail.column));
        out.push((join.join_type, join.table.clone(), on));
        joined.insert(table.into());
        Ok(())
    }
}

fn join_type(method: JoinMethod) -> JoinType {
    match method {
        JoinMethod::Match => JoinType::Inner,
        JoinMethod::Master => JoinType::Left,
        JoinMethod::Detail => JoinType::Right,
    }
}
