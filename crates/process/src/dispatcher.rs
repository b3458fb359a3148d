use anyhow::{Result, bail};
use geo::{Coord, Geometry, LineString, Point};

use types::{ElementKind, Interest};

use crate::encoder;
use crate::projection::Projection;

/// The geometry representations this pipeline can emit. The set is closed,
/// so dispatch is a plain match per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
    MultiPolygon,
}

/// Single entry point for turning resolved coordinates into output
/// geometry. Immutable after creation and shared read-only across worker
/// streams.
#[derive(Debug, Clone)]
pub struct GeometryProcessor {
    kind: GeometryKind,
    srid: i32,
    interests: Interest,
}

impl GeometryProcessor {
    /// Factory keyed by geometry-type name. An unknown name is fatal;
    /// nothing else in this component ever fails.
    pub fn create(geometry_type: &str, srid: i32) -> Result<Self> {
        let (kind, interests) = match geometry_type {
            "point" => (GeometryKind::Point, Interest::NODE),
            "line" => (GeometryKind::Line, Interest::WAY),
            "polygon" => (GeometryKind::Polygon, Interest::WAY | Interest::RELATION),
            "multipolygon" => (
                GeometryKind::MultiPolygon,
                Interest::WAY | Interest::RELATION,
            ),
            other => bail!("unknown geometry type {other:?}"),
        };
        Ok(GeometryProcessor {
            kind,
            srid,
            interests,
        })
    }

    pub fn interests(&self) -> Interest {
        self.interests
    }

    pub fn interests_in(&self, kind: ElementKind) -> bool {
        self.interests.contains(kind)
    }

    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Output column type name for the sink.
    pub fn geometry_type(&self) -> &'static str {
        match self.kind {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::Polygon => "polygon",
            GeometryKind::MultiPolygon => "multipolygon",
        }
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn process_node(&self, lat: f64, lon: f64, projection: &Projection) -> Option<Geometry> {
        match self.kind {
            GeometryKind::Point => Some(Geometry::Point(Point::from(projection.project(lat, lon)))),
            _ => None,
        }
    }

    pub fn process_way(&self, coords: &[Coord]) -> Option<Geometry> {
        if coords.len() < 2 {
            return None;
        }
        match self.kind {
            GeometryKind::Point => None,
            GeometryKind::Line => Some(Geometry::LineString(LineString::new(coords.to_vec()))),
            GeometryKind::Polygon | GeometryKind::MultiPolygon => {
                encoder::close_ring(coords).map(Geometry::Polygon)
            }
        }
    }

    /// Each inner sequence is one ring candidate; empty sequences are
    /// discarded here, ring joining and hole assignment happen in the
    /// encoder.
    pub fn process_relation(&self, sequences: &[Vec<Coord>]) -> Vec<Geometry> {
        match self.kind {
            GeometryKind::Polygon => encoder::assemble_polygons(sequences)
                .into_iter()
                .map(Geometry::Polygon)
                .collect(),
            GeometryKind::MultiPolygon => encoder::assemble_multipolygon(sequences)
                .map(Geometry::MultiPolygon)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn c(x: f64, y: f64) -> Coord {
        coord! { x: x, y: y }
    }

    #[test]
    fn unknown_geometry_type_fails_at_construction() {
        assert!(GeometryProcessor::create("hexagon", 4326).is_err());
    }

    #[test]
    fn interest_masks_follow_the_geometry_kind() {
        let point = GeometryProcessor::create("point", 4326).unwrap();
        assert!(point.interests_in(ElementKind::Node));
        assert!(!point.interests_in(ElementKind::Way));
        assert!(!point.interests_in(ElementKind::Relation));

        let line = GeometryProcessor::create("line", 4326).unwrap();
        assert_eq!(line.interests(), Interest::WAY);

        let multipolygon = GeometryProcessor::create("multipolygon", 3857).unwrap();
        assert!(multipolygon.interests_in(ElementKind::Way));
        assert!(multipolygon.interests_in(ElementKind::Relation));
        assert!(!multipolygon.interests_in(ElementKind::Node));
    }

    #[test]
    fn only_the_point_kind_produces_node_geometry() {
        let projection = Projection::LatLon;
        let point = GeometryProcessor::create("point", 4326).unwrap();
        assert!(point.process_node(51.5, -0.12, &projection).is_some());

        let line = GeometryProcessor::create("line", 4326).unwrap();
        assert!(line.process_node(51.5, -0.12, &projection).is_none());
    }

    #[test]
    fn degenerate_ways_produce_no_geometry() {
        let line = GeometryProcessor::create("line", 4326).unwrap();
        assert!(line.process_way(&[]).is_none());
        assert!(line.process_way(&[c(0.0, 0.0)]).is_none());
        assert!(line.process_way(&[c(0.0, 0.0), c(1.0, 1.0)]).is_some());
    }

    #[test]
    fn polygon_way_closes_its_ring() {
        let polygon = GeometryProcessor::create("polygon", 4326).unwrap();
        let geometry = polygon
            .process_way(&[c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0)])
            .unwrap();
        match geometry {
            Geometry::Polygon(polygon) => {
                let exterior: Vec<Coord> = polygon.exterior().coords().copied().collect();
                assert_eq!(exterior.first(), exterior.last());
            }
            other => panic!("expected polygon, got {other:?}"),
        }
    }

    #[test]
    fn relation_with_only_empty_sequences_emits_nothing() {
        let multipolygon = GeometryProcessor::create("multipolygon", 3857).unwrap();
        assert!(multipolygon.process_relation(&[Vec::new()]).is_empty());
    }

    #[test]
    fn line_kind_ignores_relations() {
        let line = GeometryProcessor::create("line", 4326).unwrap();
        let square = vec![
            c(0.0, 0.0),
            c(1.0, 0.0),
            c(1.0, 1.0),
            c(0.0, 1.0),
            c(0.0, 0.0),
        ];
        assert!(line.process_relation(&[square]).is_empty());
    }
}
