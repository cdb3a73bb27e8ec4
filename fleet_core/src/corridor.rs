//! Deviation-corridor geometry.
//!
//! Buffers each route segment into a closed ring offset perpendicular to
//! the segment by the configured radius. Meters convert to degrees with the
//! flat 111 km-per-degree approximation, so the rings are a visual aid for
//! "how far off-route is tolerated", not geodesically exact, and adjacent
//! rings overlap at sharp turns. Not suitable as authoritative geofencing.

use fleet_proto::LatLon;

/// Flat-earth meters-per-degree factor used for the buffer offset.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Closed 5-point ring buffering one route segment.
#[derive(Debug, Clone, PartialEq)]
pub struct CorridorRing {
    /// First and last points are identical.
    pub points: [LatLon; 5],
}

impl CorridorRing {
    pub fn is_closed(&self) -> bool {
        self.points[0] == self.points[4]
    }
}

/// Buffer every segment of `path` by `radius_m` on both sides.
///
/// One ring per consecutive point pair; zero-length segments emit nothing,
/// and fewer than two path points yield an empty corridor.
pub fn build_corridor(path: &[LatLon], radius_m: f64) -> Vec<CorridorRing> {
    if path.len() < 2 {
        return Vec::new();
    }

    let buffer_deg = radius_m / METERS_PER_DEGREE;
    let mut rings = Vec::with_capacity(path.len() - 1);

    for pair in path.windows(2) {
        let (p1, p2) = (pair[0], pair[1]);
        let dx = p2.lon - p1.lon;
        let dy = p2.lat - p1.lat;
        let length = (dx * dx + dy * dy).sqrt();
        if length == 0.0 {
            continue;
        }

        let nx = (-dy / length) * buffer_deg;
        let ny = (dx / length) * buffer_deg;

        rings.push(CorridorRing {
            points: [
                LatLon::new(p1.lat + ny, p1.lon + nx),
                LatLon::new(p2.lat + ny, p2.lon + nx),
                LatLon::new(p2.lat - ny, p2.lon - nx),
                LatLon::new(p1.lat - ny, p1.lon - nx),
                LatLon::new(p1.lat + ny, p1.lon + nx),
            ],
        });
    }

    rings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_path() -> Vec<LatLon> {
        vec![
            LatLon::new(-6.2088, 106.8456),
            LatLon::new(-6.19, 106.85),
            LatLon::new(-6.17, 106.87),
        ]
    }

    #[test]
    fn one_ring_per_segment() {
        let rings = build_corridor(&sample_path(), 2000.0);
        assert_eq!(rings.len(), 2);
    }

    #[test]
    fn every_ring_is_closed() {
        for ring in build_corridor(&sample_path(), 2000.0) {
            assert!(ring.is_closed());
        }
    }

    #[test]
    fn short_paths_have_no_corridor() {
        assert!(build_corridor(&[], 2000.0).is_empty());
        assert!(build_corridor(&[LatLon::new(0.0, 0.0)], 2000.0).is_empty());
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        let point = LatLon::new(-6.2, 106.8);
        let path = vec![point, point, LatLon::new(-6.3, 106.9)];
        let rings = build_corridor(&path, 2000.0);
        assert_eq!(rings.len(), 1);
    }

    #[test]
    fn offset_is_perpendicular_and_scaled() {
        // due-east segment: the offset is purely in latitude
        let path = vec![LatLon::new(0.0, 0.0), LatLon::new(0.0, 1.0)];
        let rings = build_corridor(&path, 111_000.0 / 2.0);
        assert_eq!(rings.len(), 1);

        let ring = &rings[0];
        assert_eq!(ring.points[0], LatLon::new(0.5, 0.0));
        assert_eq!(ring.points[1], LatLon::new(0.5, 1.0));
        assert_eq!(ring.points[2], LatLon::new(-0.5, 1.0));
        assert_eq!(ring.points[3], LatLon::new(-0.5, 0.0));
    }
}
