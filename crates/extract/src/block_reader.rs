use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use osmpbf::{BlobDecode, BlobReader, Element};
use rayon::iter::{ParallelBridge, ParallelIterator};

/// Parallel reader over the primitive blocks of a PBF file. Blobs that fail
/// to read or decode are skipped.
pub struct BlockReader<R: Read + Send> {
    blob_iter: BlobReader<R>,
}

impl BlockReader<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, osmpbf::Error> {
        Ok(BlockReader {
            blob_iter: BlobReader::from_path(path)?,
        })
    }

    /// Collects the elements `filter_map_op` keeps, in block-parallel
    /// fashion.
    pub fn elements<T, FMO>(self, filter_map_op: FMO) -> Result<Vec<T>, osmpbf::Error>
    where
        T: Send,
        FMO: for<'a> Fn(Element<'a>) -> Option<T> + Send + Sync,
    {
        let result: Vec<T> = self
            .blob_iter
            .par_bridge()
            .filter_map(Result::ok)
            .flat_map(|blob| match blob.decode() {
                Ok(BlobDecode::OsmData(block)) => Some(
                    block
                        .elements()
                        .filter_map(&filter_map_op)
                        .collect::<Vec<T>>(),
                ),
                _ => None,
            })
            .flatten()
            .collect();
        Ok(result)
    }

    /// Runs `op` over every element, stopping on the first error. Used by
    /// the store loader, where the sink itself can fail.
    pub fn try_for_each_element<F>(self, op: F) -> anyhow::Result<()>
    where
        F: for<'a> Fn(Element<'a>) -> anyhow::Result<()> + Send + Sync,
    {
        self.blob_iter
            .par_bridge()
            .filter_map(Result::ok)
            .try_for_each(|blob| match blob.decode() {
                Ok(BlobDecode::OsmData(block)) => {
                    for element in block.elements() {
                        op(element)?;
                    }
                    Ok(())
                }
                _ => Ok(()),
            })
    }
}
