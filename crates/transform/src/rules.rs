use anyhow::{Context, Result};
use serde::Deserialize;

/// Pattern over a tag key or value. `*` matches anything, a trailing `*`
/// matches by prefix, anything else matches exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Any,
    Exact(String),
    Prefix(String),
}

impl Matcher {
    pub fn parse(pattern: &str) -> Matcher {
        if pattern == "*" {
            Matcher::Any
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            Matcher::Prefix(prefix.to_string())
        } else {
            Matcher::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Exact(exact) => candidate == exact,
            Matcher::Prefix(prefix) => candidate.starts_with(prefix),
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Matcher::Exact(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleAction {
    Include,
    Exclude,
    #[serde(alias = "include-and-mark-polygon")]
    IncludePolygon,
    #[serde(alias = "include-and-mark-road")]
    IncludeRoad,
}

#[derive(Debug, Clone)]
pub struct ExportRule {
    pub key: Matcher,
    pub value: Matcher,
    pub action: RuleAction,
}

/// Ordered export rule table; the first matching rule wins and unmatched
/// keys drop. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct ExportTable {
    rules: Vec<ExportRule>,
}

#[derive(Deserialize)]
struct RuleSpec {
    key: String,
    #[serde(default = "any_pattern")]
    value: String,
    action: RuleAction,
}

fn any_pattern() -> String {
    "*".to_string()
}

impl ExportTable {
    pub fn new(rules: Vec<ExportRule>) -> Self {
        ExportTable { rules }
    }

    /// First matching rule for a tag. In strict mode only exact-key rules
    /// are considered; wildcard key matches are ambiguous for relation
    /// members and must not silently pass.
    pub fn match_tag(&self, key: &str, value: &str, strict: bool) -> Option<RuleAction> {
        self.rules
            .iter()
            .find(|rule| {
                if strict && !rule.key.is_exact() {
                    return false;
                }
                rule.key.matches(key) && rule.value.matches(value)
            })
            .map(|rule| rule.action)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let specs: Vec<RuleSpec> =
            serde_json::from_str(json).context("parsing export rule table")?;
        Ok(ExportTable::new(
            specs
                .into_iter()
                .map(|spec| ExportRule {
                    key: Matcher::parse(&spec.key),
                    value: Matcher::parse(&spec.value),
                    action: spec.action,
                })
                .collect(),
        ))
    }

    pub fn from_json_file(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading export rule table {path}"))?;
        ExportTable::from_json(&json)
    }

    /// Built-in table mirroring the classic OSM rendering schema: feature
    /// keys decide inclusion and shape, annotation keys ride along, and
    /// editor bookkeeping is excluded.
    pub fn default_table() -> Self {
        fn rule(key: &str, value: &str, action: RuleAction) -> ExportRule {
            ExportRule {
                key: Matcher::parse(key),
                value: Matcher::parse(value),
                action,
            }
        }

        ExportTable::new(vec![
            rule("created_by", "*", RuleAction::Exclude),
            rule("source", "*", RuleAction::Exclude),
            rule("note", "*", RuleAction::Exclude),
            rule("building", "*", RuleAction::IncludePolygon),
            rule("landuse", "*", RuleAction::IncludePolygon),
            rule("natural", "coastline", RuleAction::Include),
            rule("natural", "*", RuleAction::IncludePolygon),
            rule("leisure", "*", RuleAction::IncludePolygon),
            rule("amenity", "*", RuleAction::IncludePolygon),
            rule("shop", "*", RuleAction::IncludePolygon),
            rule("tourism", "*", RuleAction::IncludePolygon),
            rule("boundary", "*", RuleAction::IncludePolygon),
            rule("area", "*", RuleAction::IncludePolygon),
            rule("waterway", "riverbank", RuleAction::IncludePolygon),
            rule("waterway", "*", RuleAction::Include),
            rule("highway", "*", RuleAction::IncludeRoad),
            rule("railway", "*", RuleAction::IncludeRoad),
            rule("aeroway", "*", RuleAction::Include),
            rule("barrier", "*", RuleAction::Include),
            rule("power", "*", RuleAction::Include),
            rule("man_made", "*", RuleAction::Include),
            rule("place", "*", RuleAction::Include),
            rule("name", "*", RuleAction::Include),
            rule("ref", "*", RuleAction::Include),
            rule("addr:*", "*", RuleAction::Include),
            rule("admin_level", "*", RuleAction::Include),
            rule("surface", "*", RuleAction::Include),
            rule("access", "*", RuleAction::Include),
            rule("oneway", "*", RuleAction::Include),
            rule("bridge", "*", RuleAction::Include),
            rule("tunnel", "*", RuleAction::Include),
            rule("layer", "*", RuleAction::Include),
            rule("religion", "*", RuleAction::Include),
        ])
    }
}
