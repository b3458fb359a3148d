use anyhow::{anyhow, Result};
use log::debug;
use rocksdb::{Options, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use types::{Member, NodeId, RelationId, Way, WayId};

use crate::rocksdb_helper::rocksdb_options;
use crate::ElementStore;

const NODE_PREFIX: u8 = b'n';
const WAY_PREFIX: u8 = b'w';
const RELATION_PREFIX: u8 = b'r';

fn element_key(prefix: u8, id: i64) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = prefix;
    key[1..].copy_from_slice(&id.to_be_bytes());
    key
}

/// Write side of the RocksDB element store, used by the loader.
pub struct StoreWriter {
    db: DB,
}

impl StoreWriter {
    pub fn create(path: &str) -> Result<Self> {
        let db = DB::open(&rocksdb_options(), path)?;
        Ok(StoreWriter { db })
    }

    pub fn put_node(&self, id: NodeId, lat: f64, lon: f64) -> Result<()> {
        self.put(element_key(NODE_PREFIX, id), &(lat, lon))
    }

    pub fn put_way(&self, way: &Way) -> Result<()> {
        self.put(element_key(WAY_PREFIX, way.id), way)
    }

    pub fn put_relation_members(&self, id: RelationId, members: &[Member]) -> Result<()> {
        self.put(element_key(RELATION_PREFIX, id), &members.to_vec())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn put<T: Serialize>(&self, key: [u8; 9], value: &T) -> Result<()> {
        let encoded =
            bitcode::serialize(value).map_err(|err| anyhow!("bitcode encode: {err}"))?;
        self.db.put(key, encoded)?;
        Ok(())
    }
}

/// Read-only RocksDB element store shared across worker streams.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open_read_only(path: &str) -> Result<Self> {
        let options = Options::default();
        let db = DB::open_for_read_only(&options, path, false)?;
        Ok(RocksStore { db })
    }

    fn get<T: DeserializeOwned>(&self, key: [u8; 9]) -> Option<T> {
        let bytes = self.db.get(key).ok().flatten()?;
        match bitcode::deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("undecodable store record for key {:?}: {err}", key);
                None
            }
        }
    }
}

impl ElementStore for RocksStore {
    fn node_coords(&self, id: NodeId) -> Option<(f64, f64)> {
        self.get(element_key(NODE_PREFIX, id))
    }

    fn way(&self, id: WayId) -> Option<Way> {
        self.get(element_key(WAY_PREFIX, id))
    }

    fn relation_members(&self, id: RelationId) -> Option<Vec<Member>> {
        self.get(element_key(RELATION_PREFIX, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_keys_are_disjoint_per_kind() {
        assert_ne!(element_key(NODE_PREFIX, 7), element_key(WAY_PREFIX, 7));
        assert_ne!(element_key(WAY_PREFIX, 7), element_key(RELATION_PREFIX, 7));
    }

    #[test]
    fn element_keys_order_by_id() {
        // big-endian ids keep the keyspace sorted within one prefix
        assert!(element_key(WAY_PREFIX, 1) < element_key(WAY_PREFIX, 2));
        assert!(element_key(WAY_PREFIX, 2) < element_key(WAY_PREFIX, 300));
    }
}
