mod builtin;
mod rules;
mod script;

pub use builtin::RuleTableTransform;
pub use rules::{ExportRule, ExportTable, Matcher, RuleAction};
pub use script::ScriptTransform;

use anyhow::Result;
use types::{ElementKind, TagList};

/// Outcome of the single-element tag path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredTags {
    pub tags: TagList,
    pub polygon: bool,
    pub roads: bool,
}

/// Outcome of the relation tag path. `superseded` is aligned 1:1 with the
/// member tag sets handed in.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationTags {
    pub tags: TagList,
    pub superseded: Vec<bool>,
    pub boundary: bool,
    pub polygon: bool,
    pub roads: bool,
}

/// Rule evaluation over element tags. Implementations are immutable after
/// construction and evaluate as a pure function of (element, rules, strict),
/// so they can be shared read-only across worker streams.
pub trait TagTransform: Send + Sync {
    /// Filters one element's tags. `None` means the element contributes
    /// nothing to output, which is a normal outcome, not an error.
    ///
    /// `strict` tightens key matching and is used for relation members,
    /// where an ambiguous wildcard match must not silently pass.
    fn filter_tags(
        &self,
        kind: ElementKind,
        tags: &TagList,
        rules: &ExportTable,
        strict: bool,
    ) -> Option<FilteredTags>;

    /// Resolves tag authority between a relation and its member ways and
    /// decides which members are superseded by the relation's own output.
    fn filter_relation_tags(
        &self,
        relation_tags: &TagList,
        member_tags: &[TagList],
        member_roles: &[String],
        rules: &ExportTable,
        allow_typeless: bool,
    ) -> Option<RelationTags>;
}

/// Backend selection happens once at configuration time; a missing or
/// invalid script is fatal here, never per element.
pub fn create(tag_script: Option<&str>) -> Result<Box<dyn TagTransform>> {
    match tag_script {
        Some(path) => Ok(Box::new(ScriptTransform::from_file(path)?)),
        None => Ok(Box::new(RuleTableTransform::new())),
    }
}
