use anyhow::{Context, Result, anyhow, bail};
use log::warn;
use rhai::{AST, Array, Dynamic, Engine, Map, Scope};
use types::{ElementKind, TagList};

use crate::rules::ExportTable;
use crate::{FilteredTags, RelationTags, TagTransform};

const FILTER_TAGS_FN: &str = "filter_tags";
const FILTER_RELATION_TAGS_FN: &str = "filter_relation_tags";
const CAPABILITIES_FN: &str = "transform_capabilities";

/// User-scriptable transform backend embedding a rhai interpreter.
///
/// The script owns the keep/flag decisions outright; the export rule table
/// is not consulted on this path. Scripts return object maps:
///
/// ```rhai
/// fn transform_capabilities() { #{version: 1} }
///
/// fn filter_tags(kind, tags) {
///     #{keep: tags.contains("highway"), polygon: false, roads: true, tags: tags}
/// }
///
/// fn filter_relation_tags(tags, member_tags, member_roles) {
///     #{keep: true, tags: tags, superseded: [], boundary: false,
///       polygon: true, roads: false}
/// }
/// ```
pub struct ScriptTransform {
    engine: Engine,
    ast: AST,
}

impl ScriptTransform {
    pub fn from_file(path: &str) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("reading tag transform script {path}"))?;
        ScriptTransform::from_source(&source)
    }

    /// Compiles the script and verifies the required entry points, failing
    /// fatally before any element is processed.
    pub fn from_source(source: &str) -> Result<Self> {
        let engine = Engine::new();
        let ast = engine
            .compile(source)
            .map_err(|err| anyhow!("compiling tag transform script: {err}"))?;

        for (name, arity) in [
            (FILTER_TAGS_FN, 2),
            (FILTER_RELATION_TAGS_FN, 3),
            (CAPABILITIES_FN, 0),
        ] {
            let defined = ast
                .iter_functions()
                .any(|func| func.name == name && func.params.len() == arity);
            if !defined {
                bail!("tag transform script does not define {name} with {arity} parameter(s)");
            }
        }

        // invoked once so a script that cannot even run fails the setup
        let mut scope = Scope::new();
        engine
            .call_fn::<Dynamic>(&mut scope, &ast, CAPABILITIES_FN, ())
            .map_err(|err| anyhow!("calling {CAPABILITIES_FN}: {err}"))?;

        Ok(ScriptTransform { engine, ast })
    }

    fn call(&self, name: &str, args: impl rhai::FuncArgs) -> Option<Map> {
        let mut scope = Scope::new();
        match self
            .engine
            .call_fn::<Dynamic>(&mut scope, &self.ast, name, args)
        {
            Ok(result) => result.try_cast::<Map>(),
            Err(err) => {
                // per-element script failures drop the element, never the run
                warn!("tag transform script {name} failed: {err}");
                None
            }
        }
    }
}

fn tags_to_map(tags: &TagList) -> Map {
    let mut map = Map::new();
    for tag in tags {
        map.insert(tag.key.as_str().into(), tag.value.clone().into());
    }
    map
}

fn map_to_tags(map: &Map) -> TagList {
    let mut tags = TagList::new();
    for (key, value) in map {
        tags.push(key.as_str(), value.to_string());
    }
    tags
}

fn tags_field(map: &Map) -> TagList {
    map.get("tags")
        .cloned()
        .and_then(|value| value.try_cast::<Map>())
        .map(|tags| map_to_tags(&tags))
        .unwrap_or_default()
}

fn bool_field(map: &Map, name: &str) -> bool {
    map.get(name)
        .map(|value| value.as_bool().unwrap_or(false))
        .unwrap_or(false)
}

impl TagTransform for ScriptTransform {
    fn filter_tags(
        &self,
        kind: ElementKind,
        tags: &TagList,
        _rules: &ExportTable,
        _strict: bool,
    ) -> Option<FilteredTags> {
        let result = self.call(
            FILTER_TAGS_FN,
            (kind.name().to_string(), tags_to_map(tags)),
        )?;
        if !bool_field(&result, "keep") {
            return None;
        }
        Some(FilteredTags {
            tags: tags_field(&result),
            polygon: bool_field(&result, "polygon"),
            roads: bool_field(&result, "roads"),
        })
    }

    fn filter_relation_tags(
        &self,
        relation_tags: &TagList,
        member_tags: &[TagList],
        member_roles: &[String],
        _rules: &ExportTable,
        _allow_typeless: bool,
    ) -> Option<RelationTags> {
        let members: Array = member_tags
            .iter()
            .map(|tags| Dynamic::from_map(tags_to_map(tags)))
            .collect();
        let roles: Array = member_roles
            .iter()
            .map(|role| role.clone().into())
            .collect();
        let result = self.call(
            FILTER_RELATION_TAGS_FN,
            (tags_to_map(relation_tags), members, roles),
        )?;
        if !bool_field(&result, "keep") {
            return None;
        }

        let mut superseded: Vec<bool> = result
            .get("superseded")
            .cloned()
            .and_then(|value| value.try_cast::<Array>())
            .map(|flags| {
                flags
                    .iter()
                    .map(|flag| flag.as_bool().unwrap_or(false))
                    .collect()
            })
            .unwrap_or_default();
        // keep the bitmap aligned with the member list no matter what the
        // script returned
        superseded.resize(member_tags.len(), false);

        Some(RelationTags {
            tags: tags_field(&result),
            superseded,
            boundary: bool_field(&result, "boundary"),
            polygon: bool_field(&result, "polygon"),
            roads: bool_field(&result, "roads"),
        })
    }
}
