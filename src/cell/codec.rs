//! Cut string codec.
//!
//! ```text
//! list      ::= cut ( '|' cut )*
//! cut       ::= [ '!' ] dimension [ '@' hierarchy ] ':' payload
//! payload   ::= path                       point
//!             | path? '-' path?            range
//!             | path ( ';' path )+         set
//! path      ::= element ( ',' element )*
//! ```
//!
//! Reserved characters and the backslash are escaped with a backslash inside
//! elements. An empty element is written as [`NULL_PATH_VALUE`].
//!
//! A set cut with a single path has the same string form as a point cut and
//! decodes as one.

use std::sync::LazyLock;

use regex::Regex;

use super::convert::MemberConverters;
use super::cut::{Cut, CutKind, Path};
use super::{CellError, CellResult};
use crate::diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink, NullSink};
use crate::model::Cube;

pub const CUT_SEPARATOR: char = '|';
pub const DIMENSION_SEPARATOR: char = ':';
pub const PATH_SEPARATOR: char = ',';
pub const RANGE_SEPARATOR: char = '-';
pub const SET_SEPARATOR: char = ';';
pub const INVERT_PREFIX: char = '!';
pub const HIERARCHY_SEPARATOR: char = '@';

/// Wire token for an empty path element.
pub const NULL_PATH_VALUE: &str = "__null__";

const ESCAPED: &[char] = &['\\', '!', '|', ':', ';', ',', '-'];

const ELEMENT: &str = r"(?:\\.|[^:;|\-\\])*";

static RE_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{ELEMENT}$")).unwrap());
static RE_SET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{ELEMENT}(?:;{ELEMENT})*$")).unwrap());
static RE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^(?:{ELEMENT})?-(?:{ELEMENT})?$")).unwrap());
static RE_DIMENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(!)?(\w+)(?:@(\w+))?$").unwrap());

// =============================================================================
// Elements and paths
// =============================================================================

pub fn escape(element: &str) -> String {
    let mut out = String::with_capacity(element.len());
    for c in element.chars() {
        if ESCAPED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn unescape(element: &str) -> String {
    let mut out = String::with_capacity(element.len());
    let mut chars = element.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Split on `sep` where it is not preceded by an escaping backslash.
/// Parts keep their escapes.
pub fn split_unescaped(s: &str, sep: char) -> Vec<&str> {
    let mut parts = vec![];
    let mut start = 0;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

fn encode_element(element: &str, sink: &dyn DiagnosticSink) -> String {
    if element.is_empty() {
        return NULL_PATH_VALUE.into();
    }
    if element == NULL_PATH_VALUE {
        sink.report(Diagnostic::new(
            DiagnosticCode::SentinelCollision,
            format!("path element '{NULL_PATH_VALUE}' will decode as an empty value"),
        ));
    }
    escape(element)
}

fn decode_element(element: &str) -> String {
    if element == NULL_PATH_VALUE {
        String::new()
    } else {
        unescape(element)
    }
}

/// `,`-joined escaped elements; empty for an empty path.
pub fn encode_path(path: &[String], sink: &dyn DiagnosticSink) -> String {
    path.iter()
        .map(|e| encode_element(e, sink))
        .collect::<Vec<_>>()
        .join(",")
}

/// Inverse of [`encode_path`]; the empty string is the empty path.
pub fn decode_path(s: &str) -> Path {
    if s.is_empty() {
        return vec![];
    }
    split_unescaped(s, PATH_SEPARATOR)
        .into_iter()
        .map(decode_element)
        .collect()
}

/// `dimension` or `dimension@hierarchy`.
pub fn encode_dimension(dimension: &str, hierarchy: Option<&str>) -> String {
    match hierarchy {
        Some(h) => format!("{}@{}", escape(dimension), escape(h)),
        None => escape(dimension),
    }
}

/// Parsed `[!]dimension[@hierarchy]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionSpec {
    pub invert: bool,
    pub dimension: String,
    pub hierarchy: Option<String>,
}

/// Parse a dimension spec; `default_hierarchy` applies when there is no `@`.
pub fn decode_dimension(spec: &str, default_hierarchy: Option<&str>) -> CellResult<DimensionSpec> {
    let caps = RE_DIMENSION
        .captures(spec)
        .ok_or_else(|| CellError::InvalidDimensionSpec(spec.into()))?;

    Ok(DimensionSpec {
        invert: caps.get(1).is_some(),
        dimension: caps[2].to_string(),
        hierarchy: caps
            .get(3)
            .map(|m| m.as_str().to_string())
            .or_else(|| default_hierarchy.map(String::from)),
    })
}

// =============================================================================
// Cuts
// =============================================================================

/// String form of one cut. The hidden flag is not encoded.
pub fn string_from_cut(cut: &Cut, sink: &dyn DiagnosticSink) -> String {
    let payload = match &cut.kind {
        CutKind::Point { path } => encode_path(path, sink),
        CutKind::Range { from, to } => format!(
            "{}{}{}",
            from.as_deref().map(|p| encode_path(p, sink)).unwrap_or_default(),
            RANGE_SEPARATOR,
            to.as_deref().map(|p| encode_path(p, sink)).unwrap_or_default(),
        ),
        CutKind::Set { paths } => paths
            .iter()
            .map(|p| encode_path(p, sink))
            .collect::<Vec<_>>()
            .join(";"),
    };

    format!(
        "{}{}{}{}",
        if cut.invert { "!" } else { "" },
        encode_dimension(&cut.dimension, cut.hierarchy.as_deref()),
        DIMENSION_SEPARATOR,
        payload
    )
}

/// `|`-joined string form of `cuts`.
pub fn string_from_cuts(cuts: &[Cut], sink: &dyn DiagnosticSink) -> String {
    cuts.iter()
        .map(|c| string_from_cut(c, sink))
        .collect::<Vec<_>>()
        .join("|")
}

/// Parses cut strings, optionally against a cube and with member converters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CutParser<'a> {
    cube: Option<&'a Cube>,
    converters: Option<&'a MemberConverters>,
}

impl<'a> CutParser<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensions must exist in `cube`; cuts without `@` get the
    /// dimension's default hierarchy.
    pub fn with_cube(mut self, cube: &'a Cube) -> Self {
        self.cube = Some(cube);
        self
    }

    pub fn with_converters(mut self, converters: &'a MemberConverters) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Parse a `|`-separated list. The empty string is no cuts.
    pub fn parse_cuts(&self, s: &str) -> CellResult<Vec<Cut>> {
        if s.is_empty() {
            return Ok(vec![]);
        }
        split_unescaped(s, CUT_SEPARATOR)
            .into_iter()
            .map(|part| self.parse_cut(part))
            .collect()
    }

    pub fn parse_cut(&self, s: &str) -> CellResult<Cut> {
        let parts = split_unescaped(s, DIMENSION_SEPARATOR);
        let [spec, payload] = parts.as_slice() else {
            return Err(CellError::WrongDimensionCut(s.into()));
        };

        let (default_hierarchy, role) = match self.cube {
            Some(cube) => {
                let name = RE_DIMENSION
                    .captures(spec)
                    .map(|c| c[2].to_string())
                    .ok_or_else(|| CellError::InvalidDimensionSpec(spec.to_string()))?;
                let dimension = cube.dimension(&name)?;
                (
                    Some(dimension.default_hierarchy_name()?.to_string()),
                    dimension.role.clone(),
                )
            }
            None => (None, None),
        };

        let spec = decode_dimension(spec, default_hierarchy.as_deref())?;

        if let (Some(cube), Some(hierarchy)) = (self.cube, spec.hierarchy.as_deref()) {
            cube.dimension(&spec.dimension)?
                .hierarchy(Some(hierarchy))?;
        }

        let convert = |path: Path| -> Path {
            match self
                .converters
                .and_then(|c| c.lookup(&spec.dimension, role.as_deref()))
            {
                Some(conv) => conv(&spec.dimension, spec.hierarchy.as_deref(), path),
                None => path,
            }
        };

        let kind = classify(payload)?;
        let cut = match kind {
            PayloadKind::Empty => Cut::point(&spec.dimension, &[""]),
            PayloadKind::Point => Cut::point(&spec.dimension, &convert(decode_path(payload))),
            PayloadKind::Set => {
                let paths = split_unescaped(payload, SET_SEPARATOR)
                    .into_iter()
                    .map(decode_path)
                    .collect::<Vec<_>>();
                if paths.iter().any(|p| p.is_empty()) {
                    return Err(CellError::EmptySetMember(spec.dimension.clone()));
                }
                Cut::set(&spec.dimension, paths.into_iter().map(convert).collect())?
            }
            PayloadKind::Range => {
                let bounds = split_unescaped(payload, RANGE_SEPARATOR);
                let bound = |i: usize| -> Option<Path> {
                    let path = decode_path(bounds.get(i).copied().unwrap_or(""));
                    if path.is_empty() {
                        None
                    } else {
                        Some(convert(path))
                    }
                };
                Cut::range(&spec.dimension, bound(0), bound(1))
            }
        };

        Ok(cut
            .with_hierarchy(spec.hierarchy.as_deref())
            .inverted(spec.invert))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    Empty,
    Point,
    Set,
    Range,
}

/// Point, then set, then range.
fn classify(payload: &str) -> CellResult<PayloadKind> {
    if payload.is_empty() {
        Ok(PayloadKind::Empty)
    } else if RE_POINT.is_match(payload) {
        Ok(PayloadKind::Point)
    } else if RE_SET.is_match(payload) {
        Ok(PayloadKind::Set)
    } else if RE_RANGE.is_match(payload) {
        Ok(PayloadKind::Range)
    } else {
        Err(CellError::UnknownCutFormat(payload.into()))
    }
}

/// Parse one cut without a cube or converters.
pub fn cut_from_string(s: &str) -> CellResult<Cut> {
    CutParser::new().parse_cut(s)
}

/// Parse a `|`-separated list of cuts without a cube or converters.
pub fn cuts_from_string(s: &str) -> CellResult<Vec<Cut>> {
    CutParser::new().parse_cuts(s)
}

/// String form of `cuts`, discarding diagnostics.
pub fn cuts_to_string(cuts: &[Cut]) -> String {
    string_from_cuts(cuts, &NullSink)
}
