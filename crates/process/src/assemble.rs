use geo::Coord;

use transform::{ExportTable, TagTransform};
use types::{ElementKind, Member, MemberKind, NodeId, TagList, Way};
use util::ElementStore;

use crate::projection::Projection;

/// Resolves a way's node ids into projected coordinates.
///
/// The coordinate cache is a scratch buffer: every `set` call discards the
/// previous contents. One assembler per worker stream, never shared.
#[derive(Debug, Default)]
pub struct WayAssembler {
    node_cache: Vec<Coord>,
}

impl WayAssembler {
    pub fn new() -> Self {
        WayAssembler::default()
    }

    /// Resolves and reprojects `node_ids`, returning how many were found.
    /// Missing nodes shrink the way; they are skipped, never retried.
    pub fn set(
        &mut self,
        node_ids: &[NodeId],
        store: &impl ElementStore,
        projection: &Projection,
    ) -> usize {
        self.node_cache.clear();
        for id in node_ids {
            if let Some((lat, lon)) = store.node_coords(*id) {
                self.node_cache.push(projection.project(lat, lon));
            }
        }
        self.node_cache.len()
    }

    pub fn coords(&self) -> &[Coord] {
        &self.node_cache
    }
}

/// Resolves a relation's member list into way buffers plus aligned role and
/// superseding metadata.
///
/// `ways`, `roles`, `superseded`, and the outputs of [`filtered_tags`] and
/// [`nodes`] all share one length between one `set` call and the next;
/// outputs from different `set` calls must not be mixed.
///
/// [`filtered_tags`]: RelationAssembler::filtered_tags
/// [`nodes`]: RelationAssembler::nodes
#[derive(Debug, Default)]
pub struct RelationAssembler {
    ways: Vec<Way>,
    roles: Vec<String>,
    superseded: Vec<bool>,
    scratch: WayAssembler,
}

impl RelationAssembler {
    pub fn new() -> Self {
        RelationAssembler::default()
    }

    /// Resolves way members into full elements. Node and sub-relation
    /// members are not expanded, and unresolvable ways are skipped for
    /// good; `roles` aligns with the resolved members only. Returns the
    /// resolved count.
    pub fn set(&mut self, member_list: &[Member], store: &impl ElementStore) -> usize {
        self.ways.clear();
        self.roles.clear();
        for member in member_list {
            if member.kind != MemberKind::Way {
                continue;
            }
            if let Some(way) = store.way(member.id) {
                self.ways.push(way);
                self.roles.push(member.role.clone());
            }
        }
        self.superseded = vec![false; self.ways.len()];
        self.ways.len()
    }

    /// Each resolved member's tags through the single-element path, with
    /// strict matching. A member that is filtered out keeps its slot as an
    /// empty tag list.
    pub fn filtered_tags(
        &self,
        transform: &dyn TagTransform,
        rules: &ExportTable,
    ) -> Vec<TagList> {
        self.ways
            .iter()
            .map(|way| {
                transform
                    .filter_tags(ElementKind::Way, &way.tags, rules, true)
                    .map(|filtered| filtered.tags)
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Coordinate sequence per resolved member, in member order. A way with
    /// no resolvable nodes keeps its slot as an empty sequence.
    pub fn nodes(
        &mut self,
        store: &impl ElementStore,
        projection: &Projection,
    ) -> Vec<Vec<Coord>> {
        let Self { ways, scratch, .. } = self;
        ways.iter()
            .map(|way| {
                scratch.set(&way.node_ids, store, projection);
                scratch.coords().to_vec()
            })
            .collect()
    }

    pub fn ways(&self) -> &[Way] {
        &self.ways
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn superseded(&self) -> &[bool] {
        &self.superseded
    }

    /// Applies the transform's superseded bitmap. A length mismatch is a
    /// caller bug (outputs mixed across `set` calls) and panics in debug
    /// builds; in release the shorter prefix is applied.
    pub fn mark_superseded(&mut self, flags: &[bool]) {
        debug_assert_eq!(flags.len(), self.superseded.len());
        for (slot, flag) in self.superseded.iter_mut().zip(flags) {
            *slot = *flag;
        }
    }

    /// Way ids whose standalone emission the relation has superseded.
    pub fn superseded_way_ids(&self) -> Vec<i64> {
        self.ways
            .iter()
            .zip(&self.superseded)
            .filter(|(_, superseded)| **superseded)
            .map(|(way, _)| way.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ways.is_empty()
    }
}
