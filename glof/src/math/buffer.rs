//! Planar buffers built from round-capped segment capsules.

use crate::C;
use geo::geometry::{Coord, LineString, MultiPolygon, Polygon};
use std::f64::consts::{FRAC_PI_2, PI};

/// Returns the buffer of `path` at `radius` as one capsule per
/// non-degenerate segment. A path without such segments buffers to a
/// disc around its first vertex, and an empty path to nothing.
///
/// `quadrant_segments` sets how many chords approximate each quarter
/// circle of the caps.
pub fn buffer_path(path: &[Coord<C>], radius: C, quadrant_segments: usize) -> MultiPolygon<C> {
    let q = quadrant_segments.max(1);
    let mut capsules: Vec<Polygon<C>> = path
        .windows(2)
        .filter(|w| w[0] != w[1])
        .map(|w| capsule(w[0], w[1], radius, q))
        .collect();
    if capsules.is_empty() {
        if let Some(&center) = path.first() {
            capsules.push(disc(center, radius, q));
        }
    }
    MultiPolygon::new(capsules)
}

/// Returns a counter-clockwise polygon approximating a circle.
pub fn disc(center: Coord<C>, radius: C, quadrant_segments: usize) -> Polygon<C> {
    let n = 4 * quadrant_segments.max(1);
    let mut ring = arc(center, radius, 0.0, 2.0 * PI, n);
    // `Polygon::new` closes the ring exactly.
    ring.pop();
    Polygon::new(LineString::from(ring), vec![])
}

fn capsule(a: Coord<C>, b: Coord<C>, radius: C, q: usize) -> Polygon<C> {
    let heading = (b.y - a.y).atan2(b.x - a.x);
    // Half circle around `b` facing forward, then around `a` facing back.
    let mut ring = arc(b, radius, heading - FRAC_PI_2, PI, 2 * q);
    ring.extend(arc(a, radius, heading + FRAC_PI_2, PI, 2 * q));
    Polygon::new(LineString::from(ring), vec![])
}

/// `segments + 1` points from `start` sweeping `sweep` radians CCW.
#[allow(clippy::cast_precision_loss)]
fn arc(center: Coord<C>, radius: C, start: C, sweep: C, segments: usize) -> Vec<Coord<C>> {
    (0..=segments)
        .map(|i| {
            let (sin, cos) = (start + sweep * i as C / segments as C).sin_cos();
            Coord {
                x: center.x + radius * cos,
                y: center.y + radius * sin,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{buffer_path, disc};
    use approx::assert_relative_eq;
    use geo::{
        algorithm::{Area, Intersects},
        coord, point,
    };
    use std::f64::consts::PI;

    #[test]
    fn test_capsule_area() {
        let buf = buffer_path(&[coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 0.0 }], 1.0, 64);
        assert_eq!(buf.0.len(), 1);
        // Rectangle plus one full circle.
        assert_relative_eq!(buf.unsigned_area(), 20.0 + PI, epsilon = 1e-2);
    }

    #[test]
    fn test_containment() {
        let buf = buffer_path(
            &[
                coord! { x: 0.0, y: 0.0 },
                coord! { x: 1.0, y: 0.0 },
                coord! { x: 1.0, y: 1.0 },
            ],
            0.1,
            8,
        );
        assert_eq!(buf.0.len(), 2);
        assert!(buf.intersects(&point!(x: 0.5, y: 0.05)));
        assert!(buf.intersects(&point!(x: 1.05, y: 0.5)));
        assert!(buf.intersects(&point!(x: -0.09, y: 0.0)));
        assert!(!buf.intersects(&point!(x: 0.5, y: 0.5)));
        assert!(!buf.intersects(&point!(x: 0.5, y: -0.2)));
    }

    #[test]
    fn test_degenerate_paths() {
        let single = buffer_path(&[coord! { x: 3.0, y: 4.0 }], 1.0, 8);
        assert_eq!(single.0.len(), 1);
        assert!(single.intersects(&point!(x: 3.5, y: 4.5)));
        assert!(!single.intersects(&point!(x: 4.0, y: 5.0)));

        let repeated = buffer_path(&[coord! { x: 3.0, y: 4.0 }, coord! { x: 3.0, y: 4.0 }], 1.0, 8);
        assert_eq!(repeated, single);

        assert!(buffer_path(&[], 1.0, 8).0.is_empty());
    }

    #[test]
    fn test_disc_is_closed() {
        let d = disc(coord! { x: 0.0, y: 0.0 }, 2.0, 8);
        assert!(d.exterior().is_closed());
        assert_eq!(d.exterior().0.len(), 33);
    }
}
