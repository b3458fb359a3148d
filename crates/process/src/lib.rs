mod assemble;
mod dispatcher;
mod encoder;
mod pipeline;
mod projection;

pub use assemble::{RelationAssembler, WayAssembler};
pub use dispatcher::{GeometryKind, GeometryProcessor};
pub use encoder::{assemble_multipolygon, assemble_polygons, close_ring, join_rings};
pub use pipeline::{ProcessedElement, Stream, to_feature};
pub use projection::Projection;
