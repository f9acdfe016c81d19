//! Cells: multidimensional selections made of cuts.
//!
//! A [`Cell`] is an immutable conjunction of [`Cut`]s. Every operation
//! returns a new cell:
//!
//! ```text
//! "date:2010|geo:EU"  --cuts_from_string-->  Cell [date:2010, geo:EU]
//!        .drilldown("date", "5")      -> [geo:EU, date:2010,5]
//!        .rollup_dim(date, None)      -> [geo:EU, date:2010]
//!        .slice(Cut::point("geo",..)) -> [date:2010, geo:US]
//! ```

pub mod codec;
pub mod convert;
pub mod cut;

pub use codec::{
    cut_from_string, cuts_from_string, cuts_to_string, decode_dimension, decode_path,
    encode_dimension, encode_path, string_from_cut, string_from_cuts, CutParser, DimensionSpec,
    NULL_PATH_VALUE,
};
pub use convert::{MemberConverter, MemberConverters};
pub use cut::{cut_from_dict, Cut, CutKind, Path};

use std::collections::HashMap;
use std::ops::BitAnd;

use serde_json::{json, Value};
use thiserror::Error;

use crate::model::{Attribute, Cube, Dimension, Hierarchy, Level, ModelError};

/// Errors from parsing cuts and cell algebra.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CellError {
    #[error("Wrong dimension cut string: '{0}'")]
    WrongDimensionCut(String),

    #[error("Dimension spec '{0}' does not match pattern 'dimension@hierarchy'")]
    InvalidDimensionSpec(String),

    #[error("Unknown cut format (check that keys consist only of alphanumeric characters and underscore): '{0}'")]
    UnknownCutFormat(String),

    #[error("Set cut of dimension '{0}' has no paths")]
    EmptySet(String),

    #[error("Set cut of dimension '{0}' contains an empty path")]
    EmptySetMember(String),

    #[error("Unknown cut type '{0}'")]
    UnknownCutType(String),

    #[error("Invalid cut description: {0}")]
    InvalidCutDict(String),

    #[error("Only point cuts are supported for {operation} (dimension '{dimension}' has a {kind} cut)")]
    UnsupportedCut {
        operation: &'static str,
        dimension: String,
        kind: &'static str,
    },

    #[error("No cut to roll-up for dimension '{0}'")]
    NoCutForDimension(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type CellResult<T> = Result<T, CellError>;

/// What [`Cell::rollup`] rolls up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollupSpec {
    /// One level up in one dimension.
    Dimension(String),
    /// One level up in each dimension; dimensions without a cut are skipped.
    Dimensions(Vec<String>),
    /// Dimension -> level to roll up to; every dimension must have a cut.
    Levels(Vec<(String, String)>),
}

/// The deepest level a cut reaches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeepestLevel<'a> {
    pub dimension: &'a Dimension,
    pub hierarchy: &'a Hierarchy,
    /// `None` for a cut with an empty path.
    pub level: Option<&'a Level>,
}

/// An ordered list of cuts; equality ignores the order.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    cuts: Vec<Cut>,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cuts(cuts: Vec<Cut>) -> Self {
        Self { cuts }
    }

    /// Parse a cut string list.
    pub fn parse(s: &str) -> CellResult<Self> {
        Ok(Self::from_cuts(cuts_from_string(s)?))
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Cuts of both cells, not deduplicated.
    pub fn conjunction(&self, other: &Cell) -> Cell {
        let mut cuts = self.cuts.clone();
        cuts.extend(other.cuts.iter().cloned());
        Cell { cuts }
    }

    /// Replace the first cut of `cut.dimension`, or append `cut`.
    pub fn slice(&self, cut: Cut) -> Cell {
        let mut cuts = self.cuts.clone();
        match cuts.iter().position(|c| c.dimension == cut.dimension) {
            Some(index) => cuts[index] = cut,
            None => cuts.push(cut),
        }
        Cell { cuts }
    }

    pub fn multi_slice(&self, cuts: impl IntoIterator<Item = Cut>) -> Cell {
        cuts.into_iter().fold(self.clone(), |cell, cut| cell.slice(cut))
    }

    /// Drop every cut of `dimension`, then add a point cut at `path` unless
    /// it is empty.
    pub fn point_slice<S: AsRef<str>>(&self, dimension: &str, path: &[S]) -> Cell {
        let mut cuts: Vec<Cut> = self
            .cuts
            .iter()
            .filter(|c| c.dimension != dimension)
            .cloned()
            .collect();
        if !path.is_empty() {
            cuts.push(Cut::point(dimension, path));
        }
        Cell { cuts }
    }

    /// Go one level deeper in `dimension` at member `value`.
    pub fn drilldown(&self, dimension: &str, value: &str, hierarchy: Option<&str>) -> CellResult<Cell> {
        if let Some(cut) = self.cut_for_dimension(dimension) {
            if !cut.is_point() && self.point_cut_for_dimension(dimension).is_none() {
                return Err(CellError::UnsupportedCut {
                    operation: "drill-down",
                    dimension: dimension.into(),
                    kind: cut.kind_name(),
                });
            }
        }

        let existing = self.point_cut_index(dimension);
        let mut path = existing
            .and_then(|i| self.cuts[i].path().cloned())
            .unwrap_or_default();
        path.push(value.into());

        let mut cuts = self.cuts.clone();
        if let Some(i) = existing {
            cuts.remove(i);
        }
        cuts.push(Cut::point(dimension, &path).with_hierarchy(hierarchy));
        Ok(Cell { cuts })
    }

    /// Go up in `dimension`: to `level`, or one level when `None`.
    ///
    /// A cut whose path becomes empty is removed. A cell without a point
    /// cut for the dimension is returned unchanged.
    pub fn rollup_dim(
        &self,
        dimension: &Dimension,
        level: Option<&str>,
        hierarchy: Option<&str>,
    ) -> CellResult<Cell> {
        let Some(index) = self.point_cut_index(&dimension.name) else {
            return Ok(self.clone());
        };

        let cut = &self.cuts[index];
        let hierarchy = hierarchy.or(cut.hierarchy.as_deref());
        let path = cut.path().cloned().unwrap_or_default();
        let rolled = dimension.hierarchy(hierarchy)?.rollup(&path, level)?;

        let mut cuts = self.cuts.clone();
        cuts.remove(index);
        if !rolled.is_empty() {
            cuts.push(Cut::point(&dimension.name, &rolled).with_hierarchy(hierarchy));
        }
        Ok(Cell { cuts })
    }

    /// Roll up several dimensions at once. Cuts of other dimensions are kept.
    pub fn rollup(&self, spec: &RollupSpec, cube: &Cube) -> CellResult<Cell> {
        let targets: Vec<(&str, Option<&str>, bool)> = match spec {
            RollupSpec::Dimension(d) => vec![(d.as_str(), None, false)],
            RollupSpec::Dimensions(ds) => ds.iter().map(|d| (d.as_str(), None, false)).collect(),
            RollupSpec::Levels(levels) => levels
                .iter()
                .map(|(d, l)| (d.as_str(), Some(l.as_str()), true))
                .collect(),
        };

        let mut cuts = self.cuts.clone();
        for (dim_name, level, required) in targets {
            let Some(index) = cuts.iter().position(|c| c.dimension == dim_name) else {
                if required {
                    return Err(CellError::NoCutForDimension(dim_name.into()));
                }
                continue;
            };

            let cut = &cuts[index];
            let CutKind::Point { path } = &cut.kind else {
                return Err(CellError::UnsupportedCut {
                    operation: "roll-up",
                    dimension: dim_name.into(),
                    kind: cut.kind_name(),
                });
            };

            let hierarchy = cube
                .dimension(dim_name)?
                .hierarchy(cut.hierarchy.as_deref())?;
            let rolled = hierarchy.rollup(path, level)?;

            if rolled.is_empty() {
                cuts.remove(index);
            } else {
                let replacement = Cut::point(dim_name, &rolled)
                    .with_hierarchy(cut.hierarchy.as_deref())
                    .inverted(cut.invert)
                    .hidden(cut.hidden);
                cuts[index] = replacement;
            }
        }

        Ok(Cell { cuts })
    }

    pub fn cut_for_dimension(&self, dimension: &str) -> Option<&Cut> {
        self.cuts.iter().find(|c| c.dimension == dimension)
    }

    pub fn point_cut_for_dimension(&self, dimension: &str) -> Option<&Cut> {
        self.point_cut_index(dimension).map(|i| &self.cuts[i])
    }

    fn point_cut_index(&self, dimension: &str) -> Option<usize> {
        self.cuts
            .iter()
            .position(|c| c.dimension == dimension && c.is_point())
    }

    /// Matching cuts in order; with `exclude`, the non-matching ones.
    pub fn dimension_cuts(&self, dimension: &str, exclude: bool) -> Vec<&Cut> {
        self.cuts
            .iter()
            .filter(|c| (c.dimension == dimension) != exclude)
            .collect()
    }

    /// The cell without hidden cuts.
    pub fn public_cell(&self) -> Cell {
        Cell {
            cuts: self.cuts.iter().filter(|c| !c.hidden).cloned().collect(),
        }
    }

    /// Deepest cut depth per dimension.
    pub fn level_depths(&self) -> HashMap<String, usize> {
        let mut depths = HashMap::new();
        for cut in &self.cuts {
            let depth = depths.entry(cut.dimension.clone()).or_insert(0);
            *depth = (*depth).max(cut.level_depth());
        }
        depths
    }

    /// Deepest level of every cut, in cut order.
    pub fn deepest_levels<'a>(
        &self,
        cube: &'a Cube,
        include_empty: bool,
    ) -> CellResult<Vec<DeepestLevel<'a>>> {
        let mut levels = vec![];
        for cut in &self.cuts {
            let dimension = cube.dimension(&cut.dimension)?;
            let hierarchy = dimension.hierarchy(cut.hierarchy.as_deref())?;
            let depth = cut.level_depth();

            if depth > 0 {
                let level = hierarchy.levels_for_depth(depth)?.last();
                levels.push(DeepestLevel {
                    dimension,
                    hierarchy,
                    level,
                });
            } else if include_empty {
                levels.push(DeepestLevel {
                    dimension,
                    hierarchy,
                    level: None,
                });
            }
        }
        Ok(levels)
    }

    /// Key attributes of every level the cuts reach, without duplicates.
    pub fn all_attributes(&self, cube: &Cube) -> CellResult<Vec<Attribute>> {
        let mut attributes: Vec<Attribute> = vec![];
        for cut in &self.cuts {
            let depth = cut.level_depth();
            if depth == 0 {
                continue;
            }
            let hierarchy = cube
                .dimension(&cut.dimension)?
                .hierarchy(cut.hierarchy.as_deref())?;
            for key in hierarchy.keys(depth)? {
                if !attributes.contains(key) {
                    attributes.push(key.clone());
                }
            }
        }
        Ok(attributes)
    }

    /// Whether a point or set cut of `dimension` pins `level`.
    pub fn contains_level(
        &self,
        cube: &Cube,
        dimension: &str,
        level: &str,
        hierarchy: Option<&str>,
    ) -> CellResult<bool> {
        let dim = cube.dimension(dimension)?;
        let hier = dim.hierarchy(hierarchy)?;
        let required = hier.level_index(level)? + 1;

        for cut in self.dimension_cuts(dimension, false) {
            if dim.hierarchy(cut.hierarchy.as_deref())?.name != hier.name {
                continue;
            }
            let reaches = match &cut.kind {
                CutKind::Point { path } => path.len() >= required,
                CutKind::Set { paths } => paths.iter().any(|p| p.len() >= required),
                CutKind::Range { .. } => false,
            };
            if reaches {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn to_dict(&self) -> Value {
        json!({ "cuts": self.cuts.iter().map(Cut::to_dict).collect::<Vec<_>>() })
    }
}

/// Build a cell from `{"cuts": [...]}`.
pub fn cell_from_dict(value: &Value, cube: Option<&Cube>) -> CellResult<Cell> {
    let cuts = match value.get("cuts") {
        None | Some(Value::Null) => vec![],
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| cut_from_dict(item, cube))
            .collect::<CellResult<Vec<_>>>()?,
        Some(other) => {
            return Err(CellError::InvalidCutDict(format!(
                "'cuts' must be a list, got {other}"
            )))
        }
    };
    Ok(Cell::from_cuts(cuts))
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cuts.len() == other.cuts.len()
            && self.cuts.iter().all(|c| other.cuts.contains(c))
            && other.cuts.iter().all(|c| self.cuts.contains(c))
    }
}

impl BitAnd for &Cell {
    type Output = Cell;

    fn bitand(self, rhs: Self) -> Cell {
        self.conjunction(rhs)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", cuts_to_string(&self.cuts))
    }
}

impl From<Vec<Cut>> for Cell {
    fn from(cuts: Vec<Cut>) -> Self {
        Cell::from_cuts(cuts)
    }
}
