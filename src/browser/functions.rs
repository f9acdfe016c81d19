//! Aggregate functions evaluated by the database.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::sql::{count, count_distinct, count_star, func, Expr};

type Builder = Arc<dyn Fn(Option<Expr>) -> Expr + Send + Sync>;

/// Turns the measure column into an aggregate expression.
#[derive(Clone)]
pub struct AggregateFunction {
    name: String,
    requires_measure: bool,
    build: Builder,
}

impl AggregateFunction {
    /// A function applied to the aggregate's measure column.
    pub fn unary<F>(name: &str, build: F) -> Self
    where
        F: Fn(Expr) -> Expr + Send + Sync + 'static,
    {
        Self {
            name: name.to_lowercase(),
            requires_measure: true,
            build: Arc::new(move |measure| match measure {
                Some(m) => build(m),
                None => count_star(),
            }),
        }
    }

    /// A function over fact rows, ignoring any measure.
    pub fn nullary<F>(name: &str, build: F) -> Self
    where
        F: Fn() -> Expr + Send + Sync + 'static,
    {
        Self {
            name: name.to_lowercase(),
            requires_measure: false,
            build: Arc::new(move |_| build()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requires_measure(&self) -> bool {
        self.requires_measure
    }

    /// Callers check [`requires_measure`](Self::requires_measure) first.
    pub fn expression(&self, measure: Option<Expr>) -> Expr {
        (self.build)(measure)
    }
}

impl fmt::Debug for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateFunction")
            .field("name", &self.name)
            .field("requires_measure", &self.requires_measure)
            .finish()
    }
}

/// Aggregate functions by case-insensitive name.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, AggregateFunction>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::empty()
            .with(AggregateFunction::unary("sum", |m| func("SUM", vec![m])))
            .with(AggregateFunction::nullary("count", count_star))
            .with(AggregateFunction::unary("count_nonempty", count))
            .with(AggregateFunction::unary("count_distinct", count_distinct))
            .with(AggregateFunction::unary("min", |m| func("MIN", vec![m])))
            .with(AggregateFunction::unary("max", |m| func("MAX", vec![m])))
            .with(AggregateFunction::unary("avg", |m| func("AVG", vec![m])))
            .with(AggregateFunction::unary("average", |m| func("AVG", vec![m])))
            .with(AggregateFunction::unary("stddev", |m| func("STDDEV", vec![m])))
            .with(AggregateFunction::unary("variance", |m| func("VARIANCE", vec![m])))
    }
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Register a function, replacing one of the same name.
    pub fn with(mut self, function: AggregateFunction) -> Self {
        self.functions.insert(function.name.clone(), function);
        self
    }

    pub fn get(&self, name: &str) -> Option<&AggregateFunction> {
        self.functions.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}
