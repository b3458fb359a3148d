use types::{ElementKind, TagList};

use crate::rules::{ExportTable, RuleAction};
use crate::{FilteredTags, RelationTags, TagTransform};

/// Built-in rule table backend: evaluates the export table directly,
/// without any scripting engine.
#[derive(Debug, Default)]
pub struct RuleTableTransform;

impl RuleTableTransform {
    pub fn new() -> Self {
        RuleTableTransform
    }
}

fn apply_rules(tags: &TagList, rules: &ExportTable, strict: bool) -> FilteredTags {
    let mut out = FilteredTags::default();
    for tag in tags {
        match rules.match_tag(&tag.key, &tag.value, strict) {
            Some(RuleAction::Include) => out.tags.push(tag.key.clone(), tag.value.clone()),
            Some(RuleAction::IncludePolygon) => {
                out.tags.push(tag.key.clone(), tag.value.clone());
                out.polygon = true;
            }
            Some(RuleAction::IncludeRoad) => {
                out.tags.push(tag.key.clone(), tag.value.clone());
                out.roads = true;
            }
            Some(RuleAction::Exclude) | None => {}
        }
    }
    out
}

/// True when every member tag is present in the merged set with the same
/// value, i.e. the member's standalone emission would be redundant.
fn is_rule_equivalent_subset(member: &TagList, merged: &TagList) -> bool {
    member
        .iter()
        .all(|tag| merged.get(&tag.key) == Some(tag.value.as_str()))
}

fn contributes(role: &str) -> bool {
    role.is_empty() || role == "outer"
}

impl TagTransform for RuleTableTransform {
    fn filter_tags(
        &self,
        _kind: ElementKind,
        tags: &TagList,
        rules: &ExportTable,
        strict: bool,
    ) -> Option<FilteredTags> {
        let filtered = apply_rules(tags, rules, strict);
        if filtered.tags.is_empty() {
            return None;
        }
        Some(filtered)
    }

    fn filter_relation_tags(
        &self,
        relation_tags: &TagList,
        member_tags: &[TagList],
        member_roles: &[String],
        rules: &ExportTable,
        allow_typeless: bool,
    ) -> Option<RelationTags> {
        debug_assert_eq!(member_tags.len(), member_roles.len());

        let mut boundary = false;
        let mut polygon = false;
        let mut typed = false;
        match relation_tags.get("type") {
            Some("boundary") => {
                boundary = true;
                typed = true;
            }
            Some("multipolygon") => {
                typed = true;
                if relation_tags.get("boundary") == Some("administrative") {
                    boundary = true;
                } else {
                    polygon = true;
                }
            }
            _ => {}
        }
        if !typed && !allow_typeless {
            return None;
        }

        // the type tag is classification, not output
        let mut own = TagList::new();
        for tag in relation_tags {
            if tag.key != "type" {
                own.push(tag.key.clone(), tag.value.clone());
            }
        }

        let mut merged = apply_rules(&own, rules, false).tags;

        // A relation carrying nothing but its type inherits the tags of its
        // contributing members; member tags never override relation tags.
        if merged.is_empty() {
            for (tags, role) in member_tags.iter().zip(member_roles) {
                if contributes(role) {
                    for tag in tags {
                        merged.push_if_absent(tag.key.clone(), tag.value.clone());
                    }
                }
            }
        }

        // Inner members never contribute and are never superseded here;
        // their fate is geometry-driven and decided downstream.
        let superseded: Vec<bool> = member_tags
            .iter()
            .zip(member_roles)
            .map(|(tags, role)| {
                contributes(role)
                    && !tags.is_empty()
                    && is_rule_equivalent_subset(tags, &merged)
            })
            .collect();

        if merged.is_empty() {
            return None;
        }
        if !typed {
            let contributed = member_tags
                .iter()
                .zip(member_roles)
                .any(|(tags, role)| contributes(role) && !tags.is_empty());
            if !contributed {
                return None;
            }
        }

        // flags re-derived from the merged set so member-inherited keys count
        let flags = apply_rules(&merged, rules, false);

        Some(RelationTags {
            tags: merged,
            superseded,
            boundary,
            polygon: polygon || flags.polygon,
            roads: flags.roads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExportTable;

    fn transform() -> RuleTableTransform {
        RuleTableTransform::new()
    }

    fn rules() -> ExportTable {
        ExportTable::default_table()
    }

    #[test]
    fn no_matching_rule_drops_the_element() {
        let tags = TagList::from_pairs([("private_key", "private_value")]);
        let result = transform().filter_tags(ElementKind::Way, &tags, &rules(), false);
        assert!(result.is_none());
    }

    #[test]
    fn excluded_only_tags_drop_the_element() {
        let tags = TagList::from_pairs([("created_by", "JOSM"), ("source", "survey")]);
        let result = transform().filter_tags(ElementKind::Way, &tags, &rules(), false);
        assert!(result.is_none());
    }

    #[test]
    fn polygon_rule_sets_the_flag_regardless_of_other_tags() {
        let tags = TagList::from_pairs([("name", "town hall"), ("building", "yes")]);
        let result = transform()
            .filter_tags(ElementKind::Way, &tags, &rules(), false)
            .unwrap();
        assert!(result.polygon);
        assert!(!result.roads);
        assert_eq!(result.tags.get("building"), Some("yes"));
        assert_eq!(result.tags.get("name"), Some("town hall"));
    }

    #[test]
    fn road_rule_sets_the_road_flag() {
        let tags = TagList::from_pairs([("highway", "residential")]);
        let result = transform()
            .filter_tags(ElementKind::Way, &tags, &rules(), false)
            .unwrap();
        assert!(result.roads);
        assert!(!result.polygon);
    }

    #[test]
    fn first_match_wins_for_value_specific_rules() {
        let riverbank = TagList::from_pairs([("waterway", "riverbank")]);
        let stream = TagList::from_pairs([("waterway", "stream")]);
        let transform = transform();
        assert!(
            transform
                .filter_tags(ElementKind::Way, &riverbank, &rules(), false)
                .unwrap()
                .polygon
        );
        assert!(
            !transform
                .filter_tags(ElementKind::Way, &stream, &rules(), false)
                .unwrap()
                .polygon
        );
    }

    #[test]
    fn filtering_is_a_pure_function_of_its_inputs() {
        let tags = TagList::from_pairs([("highway", "residential"), ("name", "High Street")]);
        let transform = transform();
        let rules = rules();
        let first = transform.filter_tags(ElementKind::Way, &tags, &rules, false);
        let second = transform.filter_tags(ElementKind::Way, &tags, &rules, false);
        assert_eq!(first, second);
    }

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn identical_outer_member_is_superseded() {
        let rel = TagList::from_pairs([("type", "multipolygon"), ("building", "yes")]);
        let members = vec![TagList::from_pairs([("building", "yes")])];
        let result = transform()
            .filter_relation_tags(&rel, &members, &roles(&["outer"]), &rules(), false)
            .unwrap();
        assert_eq!(result.superseded, vec![true]);
        assert!(result.polygon);
        assert_eq!(result.tags.get("building"), Some("yes"));
        assert!(!result.tags.contains_key("type"));
    }

    #[test]
    fn member_with_independent_extra_tag_is_not_superseded() {
        let rel = TagList::from_pairs([("type", "multipolygon"), ("building", "yes")]);
        let members = vec![TagList::from_pairs([
            ("building", "yes"),
            ("shop", "bakery"),
        ])];
        let result = transform()
            .filter_relation_tags(&rel, &members, &roles(&["outer"]), &rules(), false)
            .unwrap();
        assert_eq!(result.superseded, vec![false]);
    }

    #[test]
    fn inner_members_never_contribute_or_supersede() {
        let rel = TagList::from_pairs([("type", "multipolygon"), ("landuse", "forest")]);
        let members = vec![
            TagList::from_pairs([("landuse", "forest")]),
            TagList::from_pairs([("natural", "water")]),
        ];
        let result = transform()
            .filter_relation_tags(&rel, &members, &roles(&["outer", "inner"]), &rules(), false)
            .unwrap();
        assert_eq!(result.superseded, vec![true, false]);
        assert!(!result.tags.contains_key("natural"));
    }

    #[test]
    fn bare_relation_inherits_member_tags_and_supersedes_them() {
        let rel = TagList::from_pairs([("type", "multipolygon")]);
        let members = vec![
            TagList::from_pairs([("landuse", "meadow")]),
            TagList::from_pairs([("landuse", "meadow")]),
        ];
        let result = transform()
            .filter_relation_tags(&rel, &members, &roles(&["outer", "outer"]), &rules(), false)
            .unwrap();
        assert_eq!(result.tags.get("landuse"), Some("meadow"));
        assert_eq!(result.superseded, vec![true, true]);
        assert!(result.polygon);
    }

    #[test]
    fn typeless_relation_is_rejected_unless_allowed() {
        let rel = TagList::from_pairs([("building", "yes")]);
        let members = vec![TagList::from_pairs([("building", "yes")])];
        let member_roles = roles(&["outer"]);
        let transform = transform();
        let rules = rules();

        assert!(
            transform
                .filter_relation_tags(&rel, &members, &member_roles, &rules, false)
                .is_none()
        );
        let allowed = transform
            .filter_relation_tags(&rel, &members, &member_roles, &rules, true)
            .unwrap();
        assert!(allowed.polygon);
        assert_eq!(allowed.superseded, vec![true]);
    }

    #[test]
    fn boundary_type_sets_the_boundary_flag() {
        let rel = TagList::from_pairs([
            ("type", "boundary"),
            ("boundary", "administrative"),
            ("admin_level", "8"),
        ]);
        let result = transform()
            .filter_relation_tags(&rel, &[], &[], &rules(), false)
            .unwrap();
        assert!(result.boundary);
        assert_eq!(result.tags.get("admin_level"), Some("8"));
        // the boundary tag itself carries a polygon rule; the two flags
        // stay independent
        assert!(result.polygon);
    }

    #[test]
    fn administrative_multipolygon_is_flagged_as_boundary() {
        let rel = TagList::from_pairs([("type", "multipolygon"), ("boundary", "administrative")]);
        let result = transform()
            .filter_relation_tags(&rel, &[], &[], &rules(), false)
            .unwrap();
        assert!(result.boundary);
    }
}
