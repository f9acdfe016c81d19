//! Dimensions, hierarchies, levels and attributes.

use std::sync::LazyLock;

use regex::Regex;

use super::{ModelError, ModelResult};
use crate::sql::SortDir;

/// Expected number of members at a level or in a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cardinality {
    Tiny,
    Low,
    Medium,
    High,
}

/// A named value of a dimension level, a measure, or a derived expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// Owning dimension; `None` for fact attributes and measures.
    pub dimension: Option<String>,
    /// SQL expression over other attribute references.
    pub expression: Option<String>,
}

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)?").unwrap()
});

impl Attribute {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            dimension: None,
            expression: None,
        }
    }

    pub fn with_expression(mut self, expression: &str) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Logical reference: `dim.attr`, `dim` when the attribute is named
    /// like its dimension, the bare name otherwise.
    pub fn reference(&self) -> String {
        match &self.dimension {
            Some(dim) if *dim == self.name => dim.clone(),
            Some(dim) => format!("{}.{}", dim, self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_base(&self) -> bool {
        self.expression.is_none()
    }

    /// Identifier-shaped tokens of the expression, in order of appearance.
    ///
    /// Callers decide which of them are attribute references.
    pub fn expression_tokens(&self) -> Vec<String> {
        match &self.expression {
            Some(expr) => REFERENCE
                .find_iter(expr)
                .map(|m| m.as_str().to_string())
                .collect(),
            None => vec![],
        }
    }

    /// The expression with each identifier token passed through `replace`;
    /// tokens it returns `None` for are kept as written.
    pub fn expression_with<F>(&self, mut replace: F) -> Option<String>
    where
        F: FnMut(&str) -> Option<String>,
    {
        self.expression.as_ref().map(|expr| {
            REFERENCE
                .replace_all(expr, |caps: &regex::Captures| {
                    let token = &caps[0];
                    replace(token).unwrap_or_else(|| token.to_string())
                })
                .into_owned()
        })
    }
}

/// One level of a hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub name: String,
    /// Attributes of the level; the key is always among them.
    pub attributes: Vec<Attribute>,
    key: String,
    order_attribute: Option<String>,
    pub order: SortDir,
    pub cardinality: Option<Cardinality>,
    /// Window of moving calculators when this level is the series.
    pub aggregation_units: Option<usize>,
}

impl Level {
    /// Level with a single attribute named like the level, acting as key.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            attributes: vec![Attribute::new(name)],
            key: name.into(),
            order_attribute: None,
            order: SortDir::Asc,
            cardinality: None,
            aggregation_units: None,
        }
    }

    /// Replace the attribute list. The first attribute becomes the key.
    pub fn with_attributes(mut self, names: &[&str]) -> Self {
        if !names.is_empty() {
            self.attributes = names.iter().map(|n| Attribute::new(n)).collect();
            self.key = names[0].into();
        }
        self
    }

    pub fn with_key(mut self, key: &str) -> Self {
        if !self.attributes.iter().any(|a| a.name == key) {
            self.attributes.insert(0, Attribute::new(key));
        }
        self.key = key.into();
        self
    }

    pub fn with_order_attribute(mut self, name: &str, order: SortDir) -> Self {
        self.order_attribute = Some(name.into());
        self.order = order;
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    pub fn with_aggregation_units(mut self, units: usize) -> Self {
        self.aggregation_units = Some(units);
        self
    }

    pub fn key(&self) -> &Attribute {
        self.attribute(&self.key).unwrap_or(&self.attributes[0])
    }

    /// Attribute used for natural ordering; the key unless set otherwise.
    pub fn order_attribute(&self) -> &Attribute {
        self.order_attribute
            .as_deref()
            .and_then(|name| self.attribute(name))
            .unwrap_or_else(|| self.key())
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    fn bind(&mut self, dimension: &str) {
        for attr in &mut self.attributes {
            attr.dimension = Some(dimension.into());
        }
    }
}

/// An ordered list of levels, from the most general to the most specific.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    pub name: String,
    pub levels: Vec<Level>,
}

impl Hierarchy {
    pub fn new(name: &str, levels: Vec<Level>) -> Self {
        Self {
            name: name.into(),
            levels,
        }
    }

    pub fn level_index(&self, name: &str) -> ModelResult<usize> {
        self.levels
            .iter()
            .position(|l| l.name == name)
            .ok_or_else(|| ModelError::NoSuchLevel {
                level: name.into(),
                hierarchy: self.name.clone(),
            })
    }

    pub fn level(&self, name: &str) -> ModelResult<&Level> {
        self.level_index(name).map(|i| &self.levels[i])
    }

    /// The first `depth` levels.
    pub fn levels_for_depth(&self, depth: usize) -> ModelResult<&[Level]> {
        if depth > self.levels.len() {
            return Err(ModelError::DepthOutOfRange {
                depth,
                hierarchy: self.name.clone(),
                levels: self.levels.len(),
            });
        }
        Ok(&self.levels[..depth])
    }

    /// Key attributes of the first `depth` levels.
    pub fn keys(&self, depth: usize) -> ModelResult<Vec<&Attribute>> {
        Ok(self
            .levels_for_depth(depth)?
            .iter()
            .map(|l| l.key())
            .collect())
    }

    /// Level following `level`; the first level for `None`, `None` past
    /// the last one.
    pub fn next_level(&self, level: Option<&str>) -> ModelResult<Option<&Level>> {
        match level {
            None => Ok(self.levels.first()),
            Some(name) => {
                let index = self.level_index(name)?;
                Ok(self.levels.get(index + 1))
            }
        }
    }

    /// Truncate `path` so it ends at `level`, or drop its last element
    /// when no level is given.
    pub fn rollup(&self, path: &[String], level: Option<&str>) -> ModelResult<Vec<String>> {
        match level {
            Some(name) => {
                let last = self.level_index(name)? + 1;
                if last > path.len() {
                    return Err(ModelError::RollupTooDeep {
                        level: name.into(),
                        path: path.to_vec(),
                    });
                }
                Ok(path[..last].to_vec())
            }
            None if path.is_empty() => Ok(vec![]),
            None => Ok(path[..path.len() - 1].to_vec()),
        }
    }
}

/// A dimension with one or more hierarchies over a shared set of levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub name: String,
    /// Coarser classification used for member converter lookup.
    pub role: Option<String>,
    pub levels: Vec<Level>,
    pub hierarchies: Vec<Hierarchy>,
    default_hierarchy_name: Option<String>,
    pub cardinality: Option<Cardinality>,
}

impl Dimension {
    /// Dimension with a single `default` hierarchy over `levels`.
    pub fn new(name: &str, mut levels: Vec<Level>) -> Self {
        for level in &mut levels {
            level.bind(name);
        }
        Self {
            name: name.into(),
            role: None,
            hierarchies: vec![Hierarchy::new("default", levels.clone())],
            levels,
            default_hierarchy_name: None,
            cardinality: None,
        }
    }

    /// Flat dimension: one level named like the dimension.
    pub fn flat(name: &str) -> Self {
        Self::new(name, vec![Level::new(name)])
    }

    /// Add a hierarchy over levels of this dimension, by level name.
    ///
    /// The first hierarchy added replaces the implicit `default` one.
    pub fn with_hierarchy(mut self, name: &str, level_names: &[&str]) -> ModelResult<Self> {
        let levels = level_names
            .iter()
            .map(|n| self.level(n).cloned())
            .collect::<ModelResult<Vec<_>>>()?;

        if self.hierarchies.len() == 1
            && self.hierarchies[0].name == "default"
            && self.default_hierarchy_name.is_none()
        {
            self.hierarchies.clear();
        }
        self.hierarchies.push(Hierarchy::new(name, levels));
        Ok(self)
    }

    pub fn with_default_hierarchy(mut self, name: &str) -> Self {
        self.default_hierarchy_name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Named hierarchy, or the default one for `None`.
    pub fn hierarchy(&self, name: Option<&str>) -> ModelResult<&Hierarchy> {
        let name = name.or(self.default_hierarchy_name.as_deref());
        match name {
            Some(n) => self
                .hierarchies
                .iter()
                .find(|h| h.name == n)
                .ok_or_else(|| ModelError::NoSuchHierarchy {
                    hierarchy: n.into(),
                    dimension: self.name.clone(),
                }),
            None => self
                .hierarchies
                .first()
                .ok_or_else(|| ModelError::NoSuchHierarchy {
                    hierarchy: "default".into(),
                    dimension: self.name.clone(),
                }),
        }
    }

    pub fn default_hierarchy_name(&self) -> ModelResult<&str> {
        self.hierarchy(None).map(|h| h.name.as_str())
    }

    pub fn level(&self, name: &str) -> ModelResult<&Level> {
        self.levels
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| ModelError::NoSuchLevel {
                level: name.into(),
                hierarchy: self.name.clone(),
            })
    }

    pub fn is_flat(&self) -> bool {
        self.levels.len() == 1
    }

    /// Whether any level carries attributes beyond its key.
    pub fn has_details(&self) -> bool {
        self.levels.iter().any(|l| l.attributes.len() > 1)
    }

    /// Every attribute of every level.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.levels.iter().flat_map(|l| l.attributes.iter())
    }

    pub fn is_high_cardinality(&self) -> bool {
        self.cardinality == Some(Cardinality::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> Dimension {
        Dimension::new(
            "date",
            vec![Level::new("year"), Level::new("month"), Level::new("day")],
        )
    }

    fn path(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_attribute_reference() {
        let dim = date();
        assert_eq!(dim.level("year").unwrap().key().reference(), "date.year");
        assert_eq!(
            Dimension::flat("flag").levels[0].key().reference(),
            "flag"
        );
        assert_eq!(Attribute::new("amount").reference(), "amount");
    }

    #[test]
    fn test_rollup_without_level_drops_last() {
        let hier = date().hierarchy(None).unwrap().clone();
        assert_eq!(
            hier.rollup(&path(&["2010", "5", "1"]), None).unwrap(),
            path(&["2010", "5"])
        );
        assert!(hier.rollup(&[], None).unwrap().is_empty());
    }

    #[test]
    fn test_rollup_to_level() {
        let hier = date().hierarchy(None).unwrap().clone();
        assert_eq!(
            hier.rollup(&path(&["2010", "5", "1"]), Some("year")).unwrap(),
            path(&["2010"])
        );
        let err = hier.rollup(&path(&["2010"]), Some("month")).unwrap_err();
        assert!(matches!(err, ModelError::RollupTooDeep { .. }));
    }

    #[test]
    fn test_named_hierarchy_replaces_implicit_default() {
        let dim = date()
            .with_hierarchy("ym", &["year", "month"])
            .unwrap()
            .with_hierarchy("ymd", &["year", "month", "day"])
            .unwrap()
            .with_default_hierarchy("ymd");

        assert_eq!(dim.hierarchies.len(), 2);
        assert_eq!(dim.default_hierarchy_name().unwrap(), "ymd");
        assert_eq!(dim.hierarchy(Some("ym")).unwrap().levels.len(), 2);
        assert!(dim.hierarchy(Some("nope")).is_err());
    }

    #[test]
    fn test_level_key_and_order() {
        let level = Level::new("month")
            .with_attributes(&["month", "month_name"])
            .with_order_attribute("month_name", SortDir::Desc);
        assert_eq!(level.key().name, "month");
        assert_eq!(level.order_attribute().name, "month_name");
        assert_eq!(level.order, SortDir::Desc);
    }

    #[test]
    fn test_expression_tokens() {
        let attr = Attribute::new("margin").with_expression("price - cost");
        assert_eq!(attr.expression_tokens(), vec!["price", "cost"]);

        let replaced = attr.expression_with(|t| (t == "price").then(|| "\"f\".\"price\"".into()));
        assert_eq!(replaced.as_deref(), Some("\"f\".\"price\" - cost"));
    }
}
