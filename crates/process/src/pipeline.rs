use geo::Geometry;
use geojson::{Feature, feature::Id};
use log::debug;

use transform::{ExportTable, TagTransform};
use types::{Element, ElementKind, Node, Relation, TagList, Way, WayId};
use util::ElementStore;

use crate::assemble::{RelationAssembler, WayAssembler};
use crate::dispatcher::GeometryProcessor;
use crate::projection::Projection;

/// One output record: encoded geometry plus the surviving tags and
/// classification of the element that produced it.
#[derive(Debug, Clone)]
pub struct ProcessedElement {
    pub id: i64,
    pub kind: ElementKind,
    pub tags: TagList,
    pub geometry: Geometry,
    pub polygon: bool,
    pub roads: bool,
    pub boundary: bool,
    /// Member ways whose standalone emission this relation supersedes.
    pub superseded_ways: Vec<WayId>,
}

/// One worker stream: owns its assemblers (stateful scratch buffers) and
/// its transform instance, and borrows the shared immutable processor,
/// rules, and store. Within a stream, results come out in submission order.
pub struct Stream<'a, S: ElementStore> {
    processor: &'a GeometryProcessor,
    transform: Box<dyn TagTransform>,
    rules: &'a ExportTable,
    store: &'a S,
    projection: Projection,
    allow_typeless: bool,
    ways: WayAssembler,
    relations: RelationAssembler,
}

impl<'a, S: ElementStore> Stream<'a, S> {
    pub fn new(
        processor: &'a GeometryProcessor,
        transform: Box<dyn TagTransform>,
        rules: &'a ExportTable,
        store: &'a S,
        projection: Projection,
        allow_typeless: bool,
    ) -> Self {
        Stream {
            processor,
            transform,
            rules,
            store,
            projection,
            allow_typeless,
            ways: WayAssembler::new(),
            relations: RelationAssembler::new(),
        }
    }

    /// Runs one element through filter, assembly, and dispatch. An empty
    /// result means the element contributes nothing; nothing here fails.
    pub fn process(&mut self, element: &Element) -> Vec<ProcessedElement> {
        if !self.processor.interests_in(element.kind()) {
            return Vec::new();
        }
        match element {
            Element::Node(node) => self.process_node(node).into_iter().collect(),
            Element::Way(way) => self.process_way(way).into_iter().collect(),
            Element::Relation(relation) => self.process_relation(relation),
        }
    }

    fn process_node(&mut self, node: &Node) -> Option<ProcessedElement> {
        let filtered = self
            .transform
            .filter_tags(ElementKind::Node, &node.tags, self.rules, false)?;
        let geometry = self
            .processor
            .process_node(node.lat, node.lon, &self.projection)?;
        Some(ProcessedElement {
            id: node.id,
            kind: ElementKind::Node,
            tags: filtered.tags,
            geometry,
            polygon: filtered.polygon,
            roads: filtered.roads,
            boundary: false,
            superseded_ways: Vec::new(),
        })
    }

    fn process_way(&mut self, way: &Way) -> Option<ProcessedElement> {
        let filtered = self
            .transform
            .filter_tags(ElementKind::Way, &way.tags, self.rules, false)?;
        self.ways.set(&way.node_ids, self.store, &self.projection);
        let geometry = self.processor.process_way(self.ways.coords())?;
        Some(ProcessedElement {
            id: way.id,
            kind: ElementKind::Way,
            tags: filtered.tags,
            geometry,
            polygon: filtered.polygon,
            roads: filtered.roads,
            boundary: false,
            superseded_ways: Vec::new(),
        })
    }

    fn process_relation(&mut self, relation: &Relation) -> Vec<ProcessedElement> {
        self.relations.set(&relation.members, self.store);
        let member_tags = self
            .relations
            .filtered_tags(self.transform.as_ref(), self.rules);
        let Some(outcome) = self.transform.filter_relation_tags(
            &relation.tags,
            &member_tags,
            self.relations.roles(),
            self.rules,
            self.allow_typeless,
        ) else {
            return Vec::new();
        };
        self.relations.mark_superseded(&outcome.superseded);

        let sequences = self.relations.nodes(self.store, &self.projection);
        let geometries = self.processor.process_relation(&sequences);
        if geometries.is_empty() {
            // without geometry the relation represents nothing, so its
            // members stay independent
            debug!("relation {} assembled no geometry", relation.id);
            return Vec::new();
        }

        let superseded_ways = self.relations.superseded_way_ids();
        geometries
            .into_iter()
            .map(|geometry| ProcessedElement {
                id: relation.id,
                kind: ElementKind::Relation,
                tags: outcome.tags.clone(),
                geometry,
                polygon: outcome.polygon,
                roads: outcome.roads,
                boundary: outcome.boundary,
                superseded_ways: superseded_ways.clone(),
            })
            .collect()
    }
}

/// Builds the sink record for one processed element.
pub fn to_feature(processed: &ProcessedElement) -> Feature {
    let mut properties = geojson::JsonObject::new();
    for tag in &processed.tags {
        properties.insert(
            tag.key.clone(),
            serde_json::Value::String(tag.value.clone()),
        );
    }

    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(
            &processed.geometry,
        ))),
        id: Some(Id::String(format!(
            "{}/{}",
            processed.kind.name(),
            processed.id
        ))),
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transform::RuleTableTransform;
    use types::{Member, MemberKind};
    use util::MemStore;

    fn store_with_square() -> MemStore {
        let mut store = MemStore::new();
        store.insert_node(1, 0.0, 0.0);
        store.insert_node(2, 0.0, 1.0);
        store.insert_node(3, 1.0, 1.0);
        store.insert_node(4, 1.0, 0.0);
        store.insert_way(Way {
            id: 20,
            node_ids: vec![1, 2, 3, 4, 1],
            tags: TagList::from_pairs([("building", "yes")]),
        });
        store
    }

    fn stream<'a>(
        processor: &'a GeometryProcessor,
        rules: &'a ExportTable,
        store: &'a MemStore,
        allow_typeless: bool,
    ) -> Stream<'a, MemStore> {
        Stream::new(
            processor,
            Box::new(RuleTableTransform::new()),
            rules,
            store,
            Projection::LatLon,
            allow_typeless,
        )
    }

    #[test]
    fn resolved_way_with_road_rule_produces_a_flagged_line() {
        let mut store = MemStore::new();
        store.insert_node(1, 0.0, 0.0);
        store.insert_node(2, 0.0, 1.0);
        store.insert_node(3, 0.0, 2.0);
        store.insert_node(4, 0.0, 3.0);

        let processor = GeometryProcessor::create("line", 4326).unwrap();
        let rules = ExportTable::default_table();
        let mut stream = stream(&processor, &rules, &store, false);

        let results = stream.process(&Element::Way(Way {
            id: 42,
            node_ids: vec![1, 2, 3, 4],
            tags: TagList::from_pairs([("highway", "residential")]),
        }));

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.roads);
        assert_eq!(result.tags.get("highway"), Some("residential"));
        match &result.geometry {
            Geometry::LineString(line) => assert_eq!(line.coords().count(), 4),
            other => panic!("expected line, got {other:?}"),
        }
    }

    #[test]
    fn uninteresting_kinds_are_ignored() {
        let store = MemStore::new();
        let processor = GeometryProcessor::create("line", 4326).unwrap();
        let rules = ExportTable::default_table();
        let mut stream = stream(&processor, &rules, &store, false);

        let results = stream.process(&Element::Node(Node {
            id: 1,
            lat: 0.0,
            lon: 0.0,
            tags: TagList::from_pairs([("highway", "crossing")]),
        }));
        assert!(results.is_empty());
    }

    #[test]
    fn unmatched_tags_produce_no_output() {
        let store = store_with_square();
        let processor = GeometryProcessor::create("polygon", 4326).unwrap();
        let rules = ExportTable::default_table();
        let mut stream = stream(&processor, &rules, &store, false);

        let results = stream.process(&Element::Way(Way {
            id: 30,
            node_ids: vec![1, 2, 3, 4, 1],
            tags: TagList::from_pairs([("obscure", "value")]),
        }));
        assert!(results.is_empty());
    }

    #[test]
    fn multipolygon_relation_supersedes_its_covered_member() {
        let store = store_with_square();
        let processor = GeometryProcessor::create("multipolygon", 4326).unwrap();
        let rules = ExportTable::default_table();
        let mut stream = stream(&processor, &rules, &store, false);

        let results = stream.process(&Element::Relation(Relation {
            id: 7,
            members: vec![Member {
                id: 20,
                kind: MemberKind::Way,
                role: "outer".to_string(),
            }],
            tags: TagList::from_pairs([("type", "multipolygon"), ("building", "yes")]),
        }));

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.polygon);
        assert_eq!(result.superseded_ways, vec![20]);
        assert!(matches!(result.geometry, Geometry::MultiPolygon(_)));
    }

    #[test]
    fn typeless_relation_emits_zero_geometries() {
        let store = store_with_square();
        let processor = GeometryProcessor::create("multipolygon", 4326).unwrap();
        let rules = ExportTable::default_table();
        let mut stream = stream(&processor, &rules, &store, false);

        let results = stream.process(&Element::Relation(Relation {
            id: 8,
            members: vec![Member {
                id: 20,
                kind: MemberKind::Way,
                role: "outer".to_string(),
            }],
            tags: TagList::from_pairs([("name", "untyped")]),
        }));
        assert!(results.is_empty());
    }

    #[test]
    fn relation_without_geometry_leaves_members_independent() {
        let mut store = MemStore::new();
        // open way that cannot close into a ring
        store.insert_node(1, 0.0, 0.0);
        store.insert_node(2, 0.0, 1.0);
        store.insert_way(Way {
            id: 21,
            node_ids: vec![1, 2],
            tags: TagList::from_pairs([("building", "yes")]),
        });

        let processor = GeometryProcessor::create("multipolygon", 4326).unwrap();
        let rules = ExportTable::default_table();
        let mut stream = stream(&processor, &rules, &store, false);

        let results = stream.process(&Element::Relation(Relation {
            id: 9,
            members: vec![Member {
                id: 21,
                kind: MemberKind::Way,
                role: "outer".to_string(),
            }],
            tags: TagList::from_pairs([("type", "multipolygon"), ("building", "yes")]),
        }));
        assert!(results.is_empty());
    }

    #[test]
    fn features_carry_tags_as_properties() {
        let store = MemStore::new();
        let processor = GeometryProcessor::create("point", 4326).unwrap();
        let rules = ExportTable::default_table();
        let mut stream = stream(&processor, &rules, &store, false);

        let results = stream.process(&Element::Node(Node {
            id: 3,
            lat: 51.5,
            lon: -0.12,
            tags: TagList::from_pairs([("amenity", "cafe"), ("name", "Roast")]),
        }));
        assert_eq!(results.len(), 1);

        let feature = to_feature(&results[0]);
        let properties = feature.properties.unwrap();
        assert_eq!(
            properties.get("amenity"),
            Some(&serde_json::Value::String("cafe".to_string()))
        );
        assert_eq!(feature.id, Some(Id::String("node/3".to_string())));
    }
}
