//! Logical to physical mapping of cube attributes.

use std::fmt::Debug;

use super::{StarError, StarResult};
use crate::config::{MapperKind, Settings};
use crate::model::{Attribute, Cube, JoinKey};

/// Physical location of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub schema: Option<String>,
    /// Table name as known in the star: a join alias or the table itself.
    pub table: String,
    pub column: String,
}

impl Column {
    pub fn new(schema: Option<&str>, table: &str, column: &str) -> Self {
        Self {
            schema: schema.map(String::from),
            table: table.into(),
            column: column.into(),
        }
    }

    /// Parse an explicit `[[schema.]table.]column` mapping; a bare column
    /// lives on `fact`.
    pub fn parse(location: &str, fact: &str, schema: Option<&str>) -> StarResult<Self> {
        let key =
            JoinKey::parse(location).map_err(|_| StarError::InvalidMapping(location.into()))?;
        let schema = key.schema.as_deref().or(schema);
        Ok(Self::new(
            schema,
            key.table.as_deref().unwrap_or(fact),
            &key.column,
        ))
    }
}

/// Maps logical attributes of one cube to physical columns.
pub trait Mapper: Debug + Send + Sync {
    fn physical(&self, attribute: &Attribute) -> StarResult<Column>;

    /// Name of the table every query starts from.
    fn fact_name(&self) -> &str;

    /// Schema of the fact table.
    fn schema(&self) -> Option<&str>;
}

/// Build the mapper the settings ask for.
pub fn mapper_for(cube: &Cube, settings: &Settings) -> Box<dyn Mapper> {
    match settings.mapper {
        MapperKind::Snowflake => Box::new(SnowflakeMapper::new(cube, settings)),
        MapperKind::Denormalized => Box::new(DenormalizedMapper::new(cube, settings)),
    }
}

// =============================================================================
// Snowflake
// =============================================================================

/// Fact table plus one table per dimension.
///
/// Dimension tables are named `dimension_prefix + dimension + dimension_suffix`
/// with a column per attribute. Measures live on the fact table, and so does
/// a flat dimension without details, as a column named like the dimension.
/// Explicit cube mappings override both.
#[derive(Debug, Clone)]
pub struct SnowflakeMapper {
    cube: Cube,
    fact_name: String,
    schema: Option<String>,
    dimension_prefix: String,
    dimension_suffix: String,
    dimension_schema: Option<String>,
}

impl SnowflakeMapper {
    pub fn new(cube: &Cube, settings: &Settings) -> Self {
        let fact_name = cube.fact.clone().unwrap_or_else(|| {
            format!("{}{}{}", settings.fact_prefix, cube.name, settings.fact_suffix)
        });

        Self {
            cube: cube.clone(),
            fact_name,
            schema: settings.schema.clone(),
            dimension_prefix: settings.dimension_prefix.clone(),
            dimension_suffix: settings.dimension_suffix.clone(),
            dimension_schema: settings.effective_dimension_schema().map(String::from),
        }
    }

    fn dimension_table(&self, dimension: &str) -> String {
        format!("{}{}{}", self.dimension_prefix, dimension, self.dimension_suffix)
    }
}

impl Mapper for SnowflakeMapper {
    fn physical(&self, attribute: &Attribute) -> StarResult<Column> {
        let reference = attribute.reference();
        if let Some(location) = self.cube.mappings.get(&reference) {
            return Column::parse(location, &self.fact_name, self.schema.as_deref());
        }

        let Some(dim_name) = &attribute.dimension else {
            return Ok(Column::new(
                self.schema.as_deref(),
                &self.fact_name,
                &attribute.name,
            ));
        };

        let dimension = self.cube.dimension(dim_name)?;
        if dimension.is_flat() && !dimension.has_details() {
            return Ok(Column::new(
                self.schema.as_deref(),
                &self.fact_name,
                &dimension.name,
            ));
        }

        Ok(Column::new(
            self.dimension_schema.as_deref(),
            &self.dimension_table(dim_name),
            &attribute.name,
        ))
    }

    fn fact_name(&self) -> &str {
        &self.fact_name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}

// =============================================================================
// Denormalized
// =============================================================================

/// A single view per cube, `denormalized_view_prefix + cube`, with one
/// column per attribute reference.
#[derive(Debug, Clone)]
pub struct DenormalizedMapper {
    view_name: String,
    schema: Option<String>,
}

impl DenormalizedMapper {
    pub fn new(cube: &Cube, settings: &Settings) -> Self {
        Self {
            view_name: format!("{}{}", settings.denormalized_view_prefix, cube.name),
            schema: settings.effective_view_schema().map(String::from),
        }
    }
}

impl Mapper for DenormalizedMapper {
    fn physical(&self, attribute: &Attribute) -> StarResult<Column> {
        Ok(Column::new(
            self.schema.as_deref(),
            &self.view_name,
            &attribute.reference(),
        ))
    }

    fn fact_name(&self) -> &str {
        &self.view_name
    }

    fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }
}
