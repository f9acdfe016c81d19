//! Drilldown: the dimension levels results are grouped by.

use std::collections::BTreeMap;
use std::str::FromStr;

use thiserror::Error;

use crate::cell::{Cell, CellError};
use crate::model::{Attribute, Cube, Dimension, Hierarchy, Level, ModelError};
use crate::sql::SortDir;

/// Label of the split flag column, also reported as a pseudo-dimension
/// in result levels.
pub const SPLIT_DIMENSION_NAME: &str = "__within_split__";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DrilldownError {
    #[error("Invalid drilldown '{0}', expected 'dimension[@hierarchy][:level]'")]
    InvalidRequest(String),

    #[error("Dimension '{0}' is drilled-down more than once")]
    DuplicateDimension(String),

    #[error(
        "Cut hierarchy '{cut}' of dimension '{dimension}' differs from drilldown hierarchy '{drilldown}', can not determine implicit next level"
    )]
    HierarchyMismatch {
        dimension: String,
        cut: String,
        drilldown: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Cell(#[from] CellError),
}

pub type DrilldownResult<T> = Result<T, DrilldownError>;

/// One requested drilldown: `dimension[@hierarchy][:level]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrilldownRequest {
    pub dimension: String,
    pub hierarchy: Option<String>,
    /// `None` drills one level below the cell's current depth.
    pub level: Option<String>,
}

impl DrilldownRequest {
    pub fn new(dimension: &str) -> Self {
        Self {
            dimension: dimension.into(),
            hierarchy: None,
            level: None,
        }
    }

    pub fn with_hierarchy(mut self, hierarchy: &str) -> Self {
        self.hierarchy = Some(hierarchy.into());
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = Some(level.into());
        self
    }
}

impl FromStr for DrilldownRequest {
    type Err = DrilldownError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DrilldownError::InvalidRequest(s.into());
        let (dim_spec, level) = match s.split_once(':') {
            Some((d, l)) if !l.is_empty() => (d, Some(l.to_string())),
            Some(_) => return Err(invalid()),
            None => (s, None),
        };
        let (dimension, hierarchy) = match dim_spec.split_once('@') {
            Some((d, h)) if !h.is_empty() => (d, Some(h.to_string())),
            Some(_) => return Err(invalid()),
            None => (dim_spec, None),
        };
        if dimension.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            dimension: dimension.into(),
            hierarchy,
            level,
        })
    }
}

/// A resolved drilldown entry: every level from the top down to the
/// drilled one.
#[derive(Debug, Clone, PartialEq)]
pub struct DrilldownItem {
    pub dimension: Dimension,
    pub hierarchy: Hierarchy,
    pub levels: Vec<Level>,
    /// References of the levels' key attributes.
    pub keys: Vec<String>,
}

impl DrilldownItem {
    pub fn deepest_level(&self) -> Option<&Level> {
        self.levels.last()
    }

    fn uses_default_hierarchy(&self) -> bool {
        self.dimension
            .default_hierarchy_name()
            .map(|name| name == self.hierarchy.name)
            .unwrap_or(false)
    }
}

/// Normalized drilldown over a cube.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Drilldown {
    items: Vec<DrilldownItem>,
}

impl Drilldown {
    /// Resolve `requests` against `cube`, using `cell` for implicit levels.
    pub fn new(requests: &[DrilldownRequest], cube: &Cube, cell: &Cell) -> DrilldownResult<Self> {
        let mut items: Vec<DrilldownItem> = vec![];

        for request in requests {
            if items.iter().any(|i| i.dimension.name == request.dimension) {
                return Err(DrilldownError::DuplicateDimension(request.dimension.clone()));
            }

            let dimension = cube.dimension(&request.dimension)?;
            let hierarchy = dimension.hierarchy(request.hierarchy.as_deref())?;

            let depth = match &request.level {
                Some(level) => hierarchy.level_index(level)? + 1,
                None if dimension.is_flat() => hierarchy.levels.len(),
                None => implicit_depth(dimension, hierarchy, cell)?,
            };

            let levels = hierarchy.levels_for_depth(depth)?.to_vec();
            let keys = levels.iter().map(|l| l.key().reference()).collect();

            items.push(DrilldownItem {
                dimension: dimension.clone(),
                hierarchy: hierarchy.clone(),
                levels,
                keys,
            });
        }

        Ok(Self { items })
    }

    /// Parse `dimension[@hierarchy][:level]` strings and resolve them.
    pub fn parse(requests: &[&str], cube: &Cube, cell: &Cell) -> DrilldownResult<Self> {
        let requests = requests
            .iter()
            .map(|r| r.parse())
            .collect::<DrilldownResult<Vec<DrilldownRequest>>>()?;
        Self::new(&requests, cube, cell)
    }

    pub fn items(&self) -> &[DrilldownItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, dimension: &str) -> bool {
        self.items.iter().any(|i| i.dimension.name == dimension)
    }

    pub fn item(&self, dimension: &str) -> Option<&DrilldownItem> {
        self.items.iter().find(|i| i.dimension.name == dimension)
    }

    /// Every attribute of every drilled level, in drilldown order.
    pub fn all_attributes(&self) -> Vec<&Attribute> {
        self.items
            .iter()
            .flat_map(|i| i.levels.iter())
            .flat_map(|l| l.attributes.iter())
            .collect()
    }

    /// Key attribute of every drilled level.
    pub fn key_attributes(&self) -> Vec<&Attribute> {
        self.items
            .iter()
            .flat_map(|i| i.levels.iter())
            .map(|l| l.key())
            .collect()
    }

    /// Hierarchical order: each level's order attribute and direction.
    pub fn natural_order(&self) -> Vec<(String, SortDir)> {
        self.items
            .iter()
            .flat_map(|i| i.levels.iter())
            .map(|l| (l.order_attribute().reference(), l.order))
            .collect()
    }

    /// Drilled level names per dimension (`dim@hier` for a non-default
    /// hierarchy).
    pub fn result_levels(&self, include_split: bool) -> BTreeMap<String, Vec<String>> {
        let mut result: BTreeMap<String, Vec<String>> = self
            .items
            .iter()
            .map(|item| {
                let key = if item.uses_default_hierarchy() {
                    item.dimension.name.clone()
                } else {
                    format!("{}@{}", item.dimension.name, item.hierarchy.name)
                };
                (key, item.levels.iter().map(|l| l.name.clone()).collect())
            })
            .collect();

        if include_split {
            result.insert(
                SPLIT_DIMENSION_NAME.into(),
                vec![SPLIT_DIMENSION_NAME.into()],
            );
        }
        result
    }

    /// `dimension[@hierarchy]:level` for every item.
    pub fn items_as_strings(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| {
                let hierarchy = if item.uses_default_hierarchy() {
                    String::new()
                } else {
                    format!("@{}", item.hierarchy.name)
                };
                let level = item.deepest_level().map(|l| l.name.as_str()).unwrap_or("");
                format!("{}{}:{}", item.dimension.name, hierarchy, level)
            })
            .collect()
    }

    /// Drilled levels with high cardinality that `cell` does not pin down.
    pub fn high_cardinality_levels(&self, cube: &Cube, cell: &Cell) -> DrilldownResult<Vec<&Level>> {
        let mut unbounded = vec![];
        for item in &self.items {
            for level in &item.levels {
                let high = item.dimension.is_high_cardinality()
                    || level.cardinality == Some(crate::model::Cardinality::High);
                if high
                    && !cell.contains_level(
                        cube,
                        &item.dimension.name,
                        &level.name,
                        Some(&item.hierarchy.name),
                    )?
                {
                    unbounded.push(level);
                }
            }
        }
        Ok(unbounded)
    }
}

/// One level below the cell's point cut, or the first level.
///
/// An inverted cut does not advance the depth.
fn implicit_depth(dimension: &Dimension, hierarchy: &Hierarchy, cell: &Cell) -> DrilldownResult<usize> {
    let depth = match cell.point_cut_for_dimension(&dimension.name) {
        Some(cut) => {
            let cut_hierarchy = dimension.hierarchy(cut.hierarchy.as_deref())?;
            if cut_hierarchy.name != hierarchy.name {
                return Err(DrilldownError::HierarchyMismatch {
                    dimension: dimension.name.clone(),
                    cut: cut_hierarchy.name.clone(),
                    drilldown: hierarchy.name.clone(),
                });
            }
            let depth = cut.level_depth();
            if cut.invert {
                depth.saturating_sub(1)
            } else {
                depth
            }
        }
        None => 0,
    };

    if depth >= hierarchy.levels.len() {
        return Err(ModelError::DrilldownTooDeep {
            dimension: dimension.name.clone(),
        }
        .into());
    }
    Ok(depth + 1)
}
