//! Member converters: turn user-facing path values into member keys.

use std::collections::HashMap;
use std::sync::Arc;

use super::cut::Path;

/// Converts one parsed path of `dimension` (in `hierarchy`, when given)
/// into the canonical path used for the cut.
pub type MemberConverter = Arc<dyn Fn(&str, Option<&str>, Path) -> Path + Send + Sync>;

/// Converter lookup by dimension name, then by dimension role.
///
/// A converter registered for the dimension always wins over one registered
/// for its role.
#[derive(Clone, Default)]
pub struct MemberConverters {
    by_dimension: HashMap<String, MemberConverter>,
    by_role: HashMap<String, MemberConverter>,
}

impl MemberConverters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dimension<F>(mut self, dimension: &str, converter: F) -> Self
    where
        F: Fn(&str, Option<&str>, Path) -> Path + Send + Sync + 'static,
    {
        self.by_dimension
            .insert(dimension.into(), Arc::new(converter));
        self
    }

    pub fn with_role<F>(mut self, role: &str, converter: F) -> Self
    where
        F: Fn(&str, Option<&str>, Path) -> Path + Send + Sync + 'static,
    {
        self.by_role.insert(role.into(), Arc::new(converter));
        self
    }

    pub fn lookup(&self, dimension: &str, role: Option<&str>) -> Option<&MemberConverter> {
        self.by_dimension
            .get(dimension)
            .or_else(|| role.and_then(|r| self.by_role.get(r)))
    }

    pub fn is_empty(&self) -> bool {
        self.by_dimension.is_empty() && self.by_role.is_empty()
    }
}

impl std::fmt::Debug for MemberConverters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberConverters")
            .field("by_dimension", &self.by_dimension.keys().collect::<Vec<_>>())
            .field("by_role", &self.by_role.keys().collect::<Vec<_>>())
            .finish()
    }
}
