//! Dimensional model: cubes, dimensions, hierarchies, levels, attributes.
//!
//! These are plain values built by the caller; nothing here loads or
//! validates model files.

pub mod cube;
pub mod dimension;

pub use cube::{Cube, CubeJoin, JoinKey, JoinMethod, MeasureAggregate};
pub use dimension::{Attribute, Cardinality, Dimension, Hierarchy, Level};

use thiserror::Error;

/// Lookup and configuration errors of the dimensional model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Cube '{cube}' has no dimension '{dimension}'")]
    NoSuchDimension { dimension: String, cube: String },

    #[error("No hierarchy '{hierarchy}' in dimension '{dimension}'")]
    NoSuchHierarchy { hierarchy: String, dimension: String },

    #[error("No level '{level}' in '{hierarchy}'")]
    NoSuchLevel { level: String, hierarchy: String },

    #[error("Unknown attribute '{0}'")]
    NoSuchAttribute(String),

    #[error("Cube '{cube}' has no aggregate '{aggregate}'")]
    NoSuchAggregate { aggregate: String, cube: String },

    #[error("Depth {depth} exceeds the {levels} levels of hierarchy '{hierarchy}'")]
    DepthOutOfRange {
        depth: usize,
        hierarchy: String,
        levels: usize,
    },

    #[error("Can not roll-up: level '{level}' is deeper than path {path:?}")]
    RollupTooDeep { level: String, path: Vec<String> },

    #[error("Can not drill down '{dimension}' past its last level")]
    DrilldownTooDeep { dimension: String },

    #[error("Aggregate '{0}' has neither a function nor an expression")]
    MissingAggregateDefinition(String),

    #[error("Invalid join key '{0}'")]
    InvalidJoinKey(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
