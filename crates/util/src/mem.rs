use std::collections::HashMap;

use types::{Member, NodeId, Relation, RelationId, Way, WayId};

use crate::ElementStore;

/// HashMap-backed element store for tests and small in-process runs.
#[derive(Debug, Default)]
pub struct MemStore {
    nodes: HashMap<NodeId, (f64, f64)>,
    ways: HashMap<WayId, Way>,
    relations: HashMap<RelationId, Vec<Member>>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }

    pub fn insert_node(&mut self, id: NodeId, lat: f64, lon: f64) {
        self.nodes.insert(id, (lat, lon));
    }

    pub fn insert_way(&mut self, way: Way) {
        self.ways.insert(way.id, way);
    }

    pub fn insert_relation(&mut self, relation: &Relation) {
        self.relations.insert(relation.id, relation.members.clone());
    }
}

impl ElementStore for MemStore {
    fn node_coords(&self, id: NodeId) -> Option<(f64, f64)> {
        self.nodes.get(&id).copied()
    }

    fn way(&self, id: WayId) -> Option<Way> {
        self.ways.get(&id).cloned()
    }

    fn relation_members(&self, id: RelationId) -> Option<Vec<Member>> {
        self.relations.get(&id).cloned()
    }
}
