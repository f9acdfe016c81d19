//! Cubes: the fact, its measures and aggregates, and the dimensions around it.

use std::collections::HashMap;

use super::dimension::{Attribute, Dimension};
use super::{ModelError, ModelResult};

/// An aggregate of a measure, or a record-level calculation over another
/// aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureAggregate {
    pub name: String,
    /// Aggregate or calculator function name, case-insensitive.
    pub function: Option<String>,
    /// Measure (or, for calculators, source aggregate) the function applies to.
    pub measure: Option<String>,
    pub expression: Option<String>,
    /// Window for moving calculators.
    pub window_size: Option<usize>,
}

impl MeasureAggregate {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            function: None,
            measure: None,
            expression: None,
            window_size: None,
        }
    }

    /// `function(measure)` named `measure_function`, e.g. `amount_sum`.
    pub fn of(measure: &str, function: &str) -> Self {
        Self::new(&format!("{measure}_{function}"))
            .with_function(function)
            .with_measure(measure)
    }

    pub fn with_function(mut self, function: &str) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_measure(mut self, measure: &str) -> Self {
        self.measure = Some(measure.into());
        self
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.expression = Some(expression.into());
        self
    }

    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = Some(size);
        self
    }
}

/// How a detail table is joined to its master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinMethod {
    /// Rows present on both sides (INNER).
    #[default]
    Match,
    /// Every master row (LEFT OUTER).
    Master,
    /// Every detail row (RIGHT OUTER).
    Detail,
}

/// One side of a join: `[schema.]table.column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinKey {
    pub schema: Option<String>,
    /// `None` means the fact table.
    pub table: Option<String>,
    pub column: String,
}

impl JoinKey {
    /// Parse `column`, `table.column` or `schema.table.column`.
    pub fn parse(s: &str) -> ModelResult<JoinKey> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [column] if !column.is_empty() => Ok(JoinKey {
                schema: None,
                table: None,
                column: column.to_string(),
            }),
            [table, column] => Ok(JoinKey {
                schema: None,
                table: Some(table.to_string()),
                column: column.to_string(),
            }),
            [schema, table, column] => Ok(JoinKey {
                schema: Some(schema.to_string()),
                table: Some(table.to_string()),
                column: column.to_string(),
            }),
            _ => Err(ModelError::InvalidJoinKey(s.into())),
        }
    }
}

/// A master/detail join description.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeJoin {
    pub master: JoinKey,
    pub detail: JoinKey,
    /// Alias under which the detail table is known to mappings.
    pub alias: Option<String>,
    pub method: JoinMethod,
}

impl CubeJoin {
    pub fn new(master: &str, detail: &str) -> ModelResult<Self> {
        Ok(Self {
            master: JoinKey::parse(master)?,
            detail: JoinKey::parse(detail)?,
            alias: None,
            method: JoinMethod::Match,
        })
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_method(mut self, method: JoinMethod) -> Self {
        self.method = method;
        self
    }

    /// Name the detail table is referred to by: its alias, else its table.
    pub fn detail_name(&self) -> Option<&str> {
        self.alias.as_deref().or(self.detail.table.as_deref())
    }
}

/// A fact with its dimensions, measures and aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct Cube {
    pub name: String,
    pub dimensions: Vec<Dimension>,
    pub measures: Vec<Attribute>,
    pub aggregates: Vec<MeasureAggregate>,
    pub joins: Vec<CubeJoin>,
    /// Physical fact table; derived from the cube name when absent.
    pub fact: Option<String>,
    /// Fact key column.
    pub key: String,
    /// Explicit physical locations: reference -> `[schema.]table.column`.
    pub mappings: HashMap<String, String>,
}

impl Cube {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            dimensions: vec![],
            measures: vec![],
            aggregates: vec![],
            joins: vec![],
            fact: None,
            key: "id".into(),
            mappings: HashMap::new(),
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimensions.push(dimension);
        self
    }

    pub fn with_measure(mut self, measure: Attribute) -> Self {
        self.measures.push(measure);
        self
    }

    pub fn with_aggregate(mut self, aggregate: MeasureAggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn with_join(mut self, join: CubeJoin) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_fact(mut self, fact: &str) -> Self {
        self.fact = Some(fact.into());
        self
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_mapping(mut self, reference: &str, location: &str) -> Self {
        self.mappings.insert(reference.into(), location.into());
        self
    }

    pub fn dimension(&self, name: &str) -> ModelResult<&Dimension> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ModelError::NoSuchDimension {
                dimension: name.into(),
                cube: self.name.clone(),
            })
    }

    pub fn measure(&self, name: &str) -> ModelResult<&Attribute> {
        self.measures
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| ModelError::NoSuchAttribute(name.into()))
    }

    pub fn aggregate(&self, name: &str) -> ModelResult<&MeasureAggregate> {
        self.aggregates
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| ModelError::NoSuchAggregate {
                aggregate: name.into(),
                cube: self.name.clone(),
            })
    }

    /// Aggregates by name, in the requested order; every aggregate for `None`.
    pub fn aggregates_for(&self, names: Option<&[&str]>) -> ModelResult<Vec<MeasureAggregate>> {
        match names {
            None => Ok(self.aggregates.clone()),
            Some(names) => names.iter().map(|n| self.aggregate(n).cloned()).collect(),
        }
    }

    /// Resolve a logical reference: `dim.attr`, flat `dim`, or a measure.
    pub fn attribute(&self, reference: &str) -> ModelResult<&Attribute> {
        if let Some((dim, attr)) = reference.split_once('.') {
            if let Ok(dimension) = self.dimension(dim) {
                if let Some(found) = dimension.attributes().find(|a| a.name == attr) {
                    return Ok(found);
                }
            }
        } else if let Ok(dimension) = self.dimension(reference) {
            if let Some(found) = dimension
                .attributes()
                .find(|a| a.reference() == reference)
            {
                return Ok(found);
            }
        } else if let Ok(measure) = self.measure(reference) {
            return Ok(measure);
        }

        Err(ModelError::NoSuchAttribute(reference.into()))
    }

    /// Every dimension attribute followed by every measure.
    pub fn all_fact_attributes(&self) -> Vec<&Attribute> {
        self.dimensions
            .iter()
            .flat_map(|d| d.attributes())
            .chain(self.measures.iter())
            .collect()
    }
}
