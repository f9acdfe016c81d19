//! Cuts: one dimension's selection predicate.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use super::codec;
use super::{CellError, CellResult};
use crate::model::Cube;

/// Member keys from the top level down.
pub type Path = Vec<String>;

/// What a cut selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CutKind {
    /// A single member.
    Point { path: Path },
    /// Members between two bounds; a missing bound is open.
    Range {
        from: Option<Path>,
        to: Option<Path>,
    },
    /// Any of several members. Never empty; no member path is empty.
    Set { paths: Vec<Path> },
}

/// A selection on one dimension.
///
/// Equality compares dimension, invert flag and the selection; hierarchy
/// and the hidden flag are ignored.
#[derive(Debug, Clone)]
pub struct Cut {
    pub dimension: String,
    /// `None` means the dimension's default hierarchy.
    pub hierarchy: Option<String>,
    /// Select everything except the described members.
    pub invert: bool,
    /// Left out of the public view of a cell.
    pub hidden: bool,
    pub kind: CutKind,
}

impl Cut {
    fn with_kind(dimension: &str, kind: CutKind) -> Self {
        Self {
            dimension: dimension.into(),
            hierarchy: None,
            invert: false,
            hidden: false,
            kind,
        }
    }

    pub fn point<S: AsRef<str>>(dimension: &str, path: &[S]) -> Self {
        Self::with_kind(
            dimension,
            CutKind::Point {
                path: to_path(path),
            },
        )
    }

    /// An empty bound is the same as an open one.
    pub fn range(dimension: &str, from: Option<Path>, to: Option<Path>) -> Self {
        Self::with_kind(
            dimension,
            CutKind::Range {
                from: from.filter(|p| !p.is_empty()),
                to: to.filter(|p| !p.is_empty()),
            },
        )
    }

    pub fn set(dimension: &str, paths: Vec<Path>) -> CellResult<Self> {
        if paths.is_empty() {
            return Err(CellError::EmptySet(dimension.into()));
        }
        if paths.iter().any(|p| p.is_empty()) {
            return Err(CellError::EmptySetMember(dimension.into()));
        }
        Ok(Self::with_kind(dimension, CutKind::Set { paths }))
    }

    #[must_use]
    pub fn with_hierarchy(mut self, hierarchy: Option<&str>) -> Self {
        self.hierarchy = hierarchy.map(String::from);
        self
    }

    #[must_use]
    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// Number of levels the deepest path reaches.
    pub fn level_depth(&self) -> usize {
        match &self.kind {
            CutKind::Point { path } => path.len(),
            CutKind::Range { from, to } => {
                let from = from.as_ref().map_or(0, Vec::len);
                let to = to.as_ref().map_or(0, Vec::len);
                from.max(to)
            }
            CutKind::Set { paths } => paths.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            CutKind::Point { .. } => "point",
            CutKind::Range { .. } => "range",
            CutKind::Set { .. } => "set",
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            CutKind::Point { path } => Some(path),
            _ => None,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self.kind, CutKind::Point { .. })
    }

    /// Dictionary form: `type`, `dimension`, `hierarchy`, `level_depth`,
    /// `invert`, `hidden` and the kind's paths.
    pub fn to_dict(&self) -> Value {
        let mut dict = json!({
            "type": self.kind_name(),
            "dimension": self.dimension,
            "hierarchy": self.hierarchy,
            "level_depth": self.level_depth(),
            "invert": self.invert,
            "hidden": self.hidden,
        });

        if let Value::Object(map) = &mut dict {
            match &self.kind {
                CutKind::Point { path } => {
                    map.insert("path".into(), json!(path));
                }
                CutKind::Range { from, to } => {
                    map.insert("from".into(), json!(from));
                    map.insert("to".into(), json!(to));
                }
                CutKind::Set { paths } => {
                    map.insert("paths".into(), json!(paths));
                }
            }
        }

        dict
    }
}

fn to_path<S: AsRef<str>>(items: &[S]) -> Path {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}

impl PartialEq for Cut {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension && self.invert == other.invert && self.kind == other.kind
    }
}

impl Eq for Cut {}

impl std::fmt::Display for Cut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", codec::string_from_cut(self, &crate::diagnostics::NullSink))
    }
}

// =============================================================================
// Dictionary form
// =============================================================================

/// Wire shape of [`Cut::to_dict`]; `level_depth` is accepted and ignored.
#[derive(Debug, Deserialize)]
struct CutDict {
    #[serde(rename = "type")]
    kind: String,
    dimension: String,
    #[serde(default)]
    hierarchy: Option<String>,
    #[serde(default)]
    invert: bool,
    #[serde(default)]
    hidden: bool,
    #[serde(default)]
    path: Option<Path>,
    #[serde(default)]
    from: Option<Path>,
    #[serde(default)]
    to: Option<Path>,
    #[serde(default)]
    paths: Option<Vec<Path>>,
}

impl CutDict {
    fn into_cut(self) -> CellResult<Cut> {
        let cut = match self.kind.to_lowercase().as_str() {
            "point" => Cut::point(&self.dimension, &self.path.unwrap_or_default()),
            "range" => Cut::range(&self.dimension, self.from, self.to),
            "set" => Cut::set(&self.dimension, self.paths.unwrap_or_default())?,
            _ => return Err(CellError::UnknownCutType(self.kind)),
        };

        Ok(cut
            .with_hierarchy(self.hierarchy.as_deref())
            .inverted(self.invert)
            .hidden(self.hidden))
    }
}

/// Build a cut from its dictionary form.
///
/// `type` is required and case-insensitive. With a cube, the dimension must
/// exist in it.
pub fn cut_from_dict(value: &Value, cube: Option<&Cube>) -> CellResult<Cut> {
    let dict: CutDict = serde_json::from_value(value.clone())
        .map_err(|e| CellError::InvalidCutDict(e.to_string()))?;

    if let Some(cube) = cube {
        cube.dimension(&dict.dimension)?;
    }

    dict.into_cut()
}

impl Serialize for Cut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_dict().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cut {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let dict = CutDict::deserialize(deserializer)?;
        dict.into_cut().map_err(serde::de::Error::custom)
    }
}
