use geo::{Coord, LineString, MultiPolygon, Polygon, Within};
use log::debug;

/// Closes a coordinate sequence into a ring polygon. Sequences that cannot
/// form a ring (fewer than 4 closed points) yield nothing.
pub fn close_ring(coords: &[Coord]) -> Option<Polygon> {
    if coords.len() < 3 {
        return None;
    }
    let mut ring = coords.to_vec();
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }
    if ring.len() < 4 {
        return None;
    }
    Some(Polygon::new(LineString::new(ring), vec![]))
}

fn is_closed(part: &[Coord]) -> bool {
    part.len() > 1 && part.first() == part.last()
}

/// Takes the part starting or ending at `link`, reversed when needed so it
/// continues from `link`.
fn take_continuation(link: Coord, parts: &mut Vec<Vec<Coord>>) -> Option<Vec<Coord>> {
    for (index, part) in parts.iter().enumerate() {
        if part.first() == Some(&link) {
            return Some(parts.swap_remove(index));
        }
        if part.last() == Some(&link) {
            let mut part = parts.swap_remove(index);
            part.reverse();
            return Some(part);
        }
    }
    None
}

/// Joins open member sequences end-to-end into closed rings. Sequences that
/// never close are dropped.
pub fn join_rings(parts: Vec<Vec<Coord>>) -> Vec<Vec<Coord>> {
    let mut parts: Vec<Vec<Coord>> = parts.into_iter().filter(|part| part.len() > 1).collect();
    let mut rings = Vec::new();

    while !parts.is_empty() {
        let mut current = parts.swap_remove(0);

        while !is_closed(&current) {
            let link = match current.last() {
                Some(link) => *link,
                None => break,
            };
            match take_continuation(link, &mut parts) {
                Some(next) => current.extend(next.into_iter().skip(1)),
                None => break,
            }
        }

        if is_closed(&current) && current.len() >= 4 {
            rings.push(current);
        } else {
            debug!("dropping unclosable ring candidate of {} points", current.len());
        }
    }

    rings
}

/// Assembles closed rings into polygons, assigning each enclosed ring as a
/// hole of the ring containing it.
pub fn assemble_polygons(sequences: &[Vec<Coord>]) -> Vec<Polygon> {
    let candidates: Vec<Vec<Coord>> = sequences
        .iter()
        .filter(|sequence| !sequence.is_empty())
        .cloned()
        .collect();
    let rings: Vec<Polygon> = join_rings(candidates)
        .iter()
        .filter_map(|ring| close_ring(ring))
        .collect();

    let inner: Vec<bool> = rings
        .iter()
        .enumerate()
        .map(|(index, ring)| {
            rings
                .iter()
                .enumerate()
                .any(|(other, outer)| other != index && ring.is_within(outer))
        })
        .collect();

    let mut polygons = Vec::new();
    for (index, ring) in rings.iter().enumerate() {
        if inner[index] {
            continue;
        }
        let mut polygon = ring.clone();
        for (other, hole) in rings.iter().enumerate() {
            if inner[other] && hole.is_within(ring) {
                polygon.interiors_push(hole.exterior().clone());
            }
        }
        polygons.push(polygon);
    }
    polygons
}

pub fn assemble_multipolygon(sequences: &[Vec<Coord>]) -> Option<MultiPolygon> {
    let polygons = assemble_polygons(sequences);
    if polygons.is_empty() {
        return None;
    }
    Some(MultiPolygon::new(polygons))
}
