//! Minimal element geometry: enough to compare entities that are not
//! literally shared and to detect coplanar/parallel correspondences.

use nalgebra::{Point3, Unit, Vector3};

use crate::types::Location;

/// Carrier geometry of an element, in world coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point3<f64>),
    Line {
        origin: Point3<f64>,
        direction: Unit<Vector3<f64>>,
    },
    Plane {
        origin: Point3<f64>,
        normal: Unit<Vector3<f64>>,
    },
}

/// Fixed geometric relation between a generated element and its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Coplanar,
    Parallel,
}

impl Geometry {
    pub fn point(p: [f64; 3]) -> Self {
        Geometry::Point(Point3::from(p))
    }

    /// Line through `a` towards `b`. None when the points coincide.
    pub fn line(a: [f64; 3], b: [f64; 3]) -> Option<Self> {
        let origin = Point3::from(a);
        let direction = Unit::try_new(Point3::from(b) - origin, 1e-12)?;
        Some(Geometry::Line { origin, direction })
    }

    pub fn plane(origin: [f64; 3], normal: Vector3<f64>) -> Option<Self> {
        let normal = Unit::try_new(normal, 1e-12)?;
        Some(Geometry::Plane {
            origin: Point3::from(origin),
            normal,
        })
    }

    pub fn transformed(&self, location: &Location) -> Geometry {
        match self {
            Geometry::Point(p) => Geometry::Point(location.apply_point(p)),
            Geometry::Line { origin, direction } => Geometry::Line {
                origin: location.apply_point(origin),
                direction: Unit::new_normalize(location.apply_vector(direction)),
            },
            Geometry::Plane { origin, normal } => Geometry::Plane {
                origin: location.apply_point(origin),
                normal: Unit::new_normalize(location.apply_vector(normal)),
            },
        }
    }

    /// True if both describe the same carrier within tolerance.
    pub fn coincides(&self, other: &Geometry, tol: f64, angular: f64) -> bool {
        match (self, other) {
            (Geometry::Point(a), Geometry::Point(b)) => (a - b).norm() <= tol,
            (
                Geometry::Line { origin, direction },
                Geometry::Line {
                    origin: o2,
                    direction: d2,
                },
            ) => parallel(direction, d2, angular) && line_distance(origin, direction, o2) <= tol,
            (
                Geometry::Plane { origin, normal },
                Geometry::Plane {
                    origin: o2,
                    normal: n2,
                },
            ) => parallel(normal, n2, angular) && plane_distance(origin, normal, o2) <= tol,
            _ => false,
        }
    }
}

fn parallel(a: &Unit<Vector3<f64>>, b: &Unit<Vector3<f64>>, angular: f64) -> bool {
    a.as_ref().cross(b.as_ref()).norm() <= angular
}

fn perpendicular(a: &Unit<Vector3<f64>>, b: &Unit<Vector3<f64>>, angular: f64) -> bool {
    a.as_ref().dot(b.as_ref()).abs() <= angular
}

fn plane_distance(origin: &Point3<f64>, normal: &Unit<Vector3<f64>>, p: &Point3<f64>) -> f64 {
    (p - origin).dot(normal.as_ref()).abs()
}

fn line_distance(origin: &Point3<f64>, direction: &Unit<Vector3<f64>>, p: &Point3<f64>) -> f64 {
    (p - origin).cross(direction.as_ref()).norm()
}

/// Classify how `target` sits relative to `source`.
///
/// Coplanar means the target contains (or lies in) the source carrier;
/// parallel means same direction but offset.
pub fn relation(source: &Geometry, target: &Geometry, tol: f64, angular: f64) -> Option<Relation> {
    match (source, target) {
        (Geometry::Line { origin, direction }, Geometry::Plane { origin: po, normal })
        | (Geometry::Plane { origin: po, normal }, Geometry::Line { origin, direction }) => {
            if !perpendicular(direction, normal, angular) {
                return None;
            }
            if plane_distance(po, normal, origin) <= tol {
                Some(Relation::Coplanar)
            } else {
                Some(Relation::Parallel)
            }
        }
        (
            Geometry::Plane { origin, normal },
            Geometry::Plane {
                origin: o2,
                normal: n2,
            },
        ) => {
            if !parallel(normal, n2, angular) {
                return None;
            }
            if plane_distance(origin, normal, o2) <= tol {
                Some(Relation::Coplanar)
            } else {
                Some(Relation::Parallel)
            }
        }
        (
            Geometry::Line { origin, direction },
            Geometry::Line {
                origin: o2,
                direction: d2,
            },
        ) => {
            if !parallel(direction, d2, angular) {
                return None;
            }
            if line_distance(origin, direction, o2) <= tol {
                Some(Relation::Coplanar)
            } else {
                Some(Relation::Parallel)
            }
        }
        (Geometry::Point(p), Geometry::Plane { origin, normal })
        | (Geometry::Plane { origin, normal }, Geometry::Point(p)) => {
            (plane_distance(origin, normal, p) <= tol).then_some(Relation::Coplanar)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TOL: f64 = 1e-7;
    const ANG: f64 = 1e-9;

    #[test]
    fn edge_in_side_face_is_coplanar() {
        let edge = Geometry::line([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        let side = Geometry::plane([0.0, 0.0, 0.0], Vector3::new(0.0, -1.0, 0.0)).unwrap();
        assert_eq!(relation(&edge, &side, TOL, ANG), Some(Relation::Coplanar));
    }

    #[test]
    fn cap_face_is_parallel() {
        let bottom = Geometry::plane([0.0, 0.0, 0.0], Vector3::z()).unwrap();
        let top = Geometry::plane([0.0, 0.0, 5.0], Vector3::z()).unwrap();
        assert_eq!(relation(&bottom, &top, TOL, ANG), Some(Relation::Parallel));

        let tilted = Geometry::plane([0.0, 0.0, 5.0], Vector3::new(0.0, 1.0, 1.0)).unwrap();
        assert_eq!(relation(&bottom, &tilted, TOL, ANG), None);
    }

    #[test]
    fn transform_moves_carrier() {
        let line = Geometry::line([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]).unwrap();
        let moved = line.transformed(&Location::translation(2.0, 0.0, 0.0));
        match &moved {
            Geometry::Line { origin, direction } => {
                assert_relative_eq!(origin.x, 2.0);
                assert_relative_eq!(direction.z, 1.0);
            }
            other => panic!("unexpected geometry {other:?}"),
        }
        assert!(!line.coincides(&moved, TOL, ANG));
        assert!(line.coincides(&line.clone(), TOL, ANG));
    }

    #[test]
    fn degenerate_line_is_rejected() {
        assert!(Geometry::line([1.0, 1.0, 1.0], [1.0, 1.0, 1.0]).is_none());
    }
}
