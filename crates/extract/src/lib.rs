mod block_reader;

pub use block_reader::BlockReader;

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use log::info;
use osmpbf::{Element as PbfElement, RelMemberType};
use types::{Element, Member, MemberKind, Node, Relation, TagList, Way};
use util::StoreWriter;

fn tag_list<'a>(tags: impl Iterator<Item = (&'a str, &'a str)>) -> TagList {
    TagList::from_pairs(tags)
}

/// Maps a PBF element into the pipeline's element model.
pub fn convert(element: PbfElement<'_>) -> Element {
    match element {
        PbfElement::Node(node) => Element::Node(Node {
            id: node.id(),
            lat: node.lat(),
            lon: node.lon(),
            tags: tag_list(node.tags()),
        }),
        PbfElement::DenseNode(node) => Element::Node(Node {
            id: node.id(),
            lat: node.lat(),
            lon: node.lon(),
            tags: tag_list(node.tags()),
        }),
        PbfElement::Way(way) => Element::Way(Way {
            id: way.id(),
            node_ids: way.refs().collect(),
            tags: tag_list(way.tags()),
        }),
        PbfElement::Relation(relation) => Element::Relation(Relation {
            id: relation.id(),
            members: relation
                .members()
                .map(|member| Member {
                    id: member.member_id,
                    kind: match member.member_type {
                        RelMemberType::Node => MemberKind::Node,
                        RelMemberType::Way => MemberKind::Way,
                        RelMemberType::Relation => MemberKind::Relation,
                    },
                    role: member.role().unwrap_or_default().to_string(),
                })
                .collect(),
            tags: tag_list(relation.tags()),
        }),
    }
}

pub fn read_nodes(path: &str) -> Result<Vec<Node>> {
    let nodes = BlockReader::from_path(path)?.elements(|element| match element {
        PbfElement::Node(_) | PbfElement::DenseNode(_) => match convert(element) {
            Element::Node(node) => Some(node),
            _ => None,
        },
        _ => None,
    })?;
    Ok(nodes)
}

pub fn read_ways(path: &str) -> Result<Vec<Way>> {
    let ways = BlockReader::from_path(path)?.elements(|element| match element {
        PbfElement::Way(_) => match convert(element) {
            Element::Way(way) => Some(way),
            _ => None,
        },
        _ => None,
    })?;
    Ok(ways)
}

pub fn read_relations(path: &str) -> Result<Vec<Relation>> {
    let relations = BlockReader::from_path(path)?.elements(|element| match element {
        PbfElement::Relation(_) => match convert(element) {
            Element::Relation(relation) => Some(relation),
            _ => None,
        },
        _ => None,
    })?;
    Ok(relations)
}

#[derive(Debug, Default)]
pub struct LoadStats {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
}

/// Bulk-loads every element of a PBF file into the element store.
pub fn load_store(path: &str, writer: &StoreWriter) -> Result<LoadStats> {
    let nodes = AtomicU64::new(0);
    let ways = AtomicU64::new(0);
    let relations = AtomicU64::new(0);

    BlockReader::from_path(path)?.try_for_each_element(|element| {
        match convert(element) {
            Element::Node(node) => {
                writer.put_node(node.id, node.lat, node.lon)?;
                nodes.fetch_add(1, Ordering::Relaxed);
            }
            Element::Way(way) => {
                writer.put_way(&way)?;
                ways.fetch_add(1, Ordering::Relaxed);
            }
            Element::Relation(relation) => {
                writer.put_relation_members(relation.id, &relation.members)?;
                relations.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    })?;
    writer.flush()?;

    let stats = LoadStats {
        nodes: nodes.into_inner(),
        ways: ways.into_inner(),
        relations: relations.into_inner(),
    };
    info!(
        "loaded {} nodes, {} ways, {} relations",
        stats.nodes, stats.ways, stats.relations
    );
    Ok(stats)
}
