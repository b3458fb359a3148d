mod mem;
mod rocks;
mod rocksdb_helper;

pub use mem::MemStore;
pub use rocks::{RocksStore, StoreWriter};
pub use rocksdb_helper::rocksdb_options;

use types::{Member, NodeId, RelationId, Way, WayId};

/// Read side of the element store.
///
/// Missing ids resolve to `None`; the store is assumed consistent for the
/// duration of a run, so a miss is permanent and never retried.
pub trait ElementStore {
    /// Raw (lat, lon) of a node.
    fn node_coords(&self, id: NodeId) -> Option<(f64, f64)>;

    /// Full way element, node id list plus tags.
    fn way(&self, id: WayId) -> Option<Way>;

    /// Ordered member list of a relation.
    fn relation_members(&self, id: RelationId) -> Option<Vec<Member>>;
}
