//! MockKernel: deterministic test double for the geometry kernel.
//!
//! Builds planar polygonal topology with predictable entity order and
//! records the correspondence of every operation in a RecordedMapper.
//! Used by naming-ops, feature-engine and the scenario tests.

use std::collections::HashMap;
use std::rc::Rc;

use nalgebra::{Point3, Vector3};

use crate::geometry::Geometry;
use crate::mapper::RecordedMapper;
use crate::shape::TopoShape;
use crate::traits::Topology;
use crate::types::*;

/// Kernel version folded into element map versions of mock shapes.
pub const MOCK_KERNEL_VERSION: &str = "mock-1";

const TOL: f64 = 1e-9;

#[derive(Debug, Clone)]
struct MockNode {
    kind: ShapeKind,
    /// Children placed relative to this node.
    children: Vec<SubShape>,
    /// Carrier geometry in this node's frame.
    geometry: Option<Geometry>,
}

/// Frozen topology of one mock shape value.
#[derive(Debug)]
pub struct MockTopology {
    nodes: Rc<HashMap<PartnerId, MockNode>>,
    root: SubShape,
}

impl Topology for MockTopology {
    fn root(&self) -> Option<SubShape> {
        Some(self.root.clone())
    }

    fn children(&self, shape: &SubShape) -> Vec<SubShape> {
        self.nodes
            .get(&shape.partner)
            .map(|node| node.children.iter().map(|c| shape.child(c)).collect())
            .unwrap_or_default()
    }

    fn geometry(&self, shape: &SubShape) -> Option<Geometry> {
        let geometry = self.nodes.get(&shape.partner)?.geometry.as_ref()?;
        if shape.location.is_identity() {
            Some(geometry.clone())
        } else {
            Some(geometry.transformed(&shape.location))
        }
    }

    fn kernel_version(&self) -> &str {
        MOCK_KERNEL_VERSION
    }
}

/// Deterministic test double for the geometry kernel.
///
/// Every entity ever created lives in one arena; shape values freeze the part
/// reachable from their root. Two kernels running the same operations
/// allocate the same partner ids.
#[derive(Debug)]
pub struct MockKernel {
    next_id: u64,
    nodes: HashMap<PartnerId, MockNode>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            nodes: HashMap::new(),
        }
    }

    fn alloc_id(&mut self) -> PartnerId {
        let id = PartnerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn add_node(
        &mut self,
        kind: ShapeKind,
        children: Vec<SubShape>,
        geometry: Option<Geometry>,
    ) -> SubShape {
        let id = self.alloc_id();
        self.nodes.insert(
            id,
            MockNode {
                kind,
                children,
                geometry,
            },
        );
        SubShape::new(kind, id)
    }

    fn node(&self, shape: &SubShape) -> Result<&MockNode, KernelError> {
        self.nodes
            .get(&shape.partner)
            .filter(|node| node.kind == shape.kind)
            .ok_or_else(|| KernelError::EntityNotFound {
                name: format!("{} #{}", shape.kind, shape.partner.0),
            })
    }

    fn point_of(&self, vertex: &SubShape) -> Result<Point3<f64>, KernelError> {
        match &self.node(vertex)?.geometry {
            Some(Geometry::Point(p)) => Ok(*p),
            _ => Err(KernelError::InvalidInput {
                reason: format!("vertex #{} has no position", vertex.partner.0),
            }),
        }
    }

    fn edge_ends(&self, edge: &SubShape) -> Result<(SubShape, SubShape), KernelError> {
        match self.node(edge)?.children.as_slice() {
            [start, end] => Ok((start.clone(), end.clone())),
            _ => Err(KernelError::InvalidInput {
                reason: format!("edge #{} is not bounded by two vertices", edge.partner.0),
            }),
        }
    }

    /// Snapshot everything reachable from `root` into a shape value.
    fn freeze(&self, root: SubShape) -> Result<TopoShape, KernelError> {
        let mut nodes = HashMap::new();
        let mut stack = vec![root.clone()];
        while let Some(shape) = stack.pop() {
            if nodes.contains_key(&shape.partner) {
                continue;
            }
            let node = self.node(&shape)?;
            stack.extend(node.children.iter().cloned());
            nodes.insert(shape.partner, node.clone());
        }
        Ok(TopoShape::new(Rc::new(MockTopology {
            nodes: Rc::new(nodes),
            root,
        })))
    }

    fn vertex(&mut self, p: Point3<f64>) -> SubShape {
        self.add_node(ShapeKind::Vertex, Vec::new(), Some(Geometry::Point(p)))
    }

    fn edge(&mut self, a: &SubShape, b: &SubShape) -> Result<SubShape, KernelError> {
        let pa = self.point_of(a)?;
        let pb = self.point_of(b)?;
        let line = Geometry::line(pa.into(), pb.into()).ok_or_else(|| KernelError::InvalidInput {
            reason: "degenerate edge".into(),
        })?;
        Ok(self.add_node(ShapeKind::Edge, vec![a.clone(), b.clone()], Some(line)))
    }

    fn polygon_wire(&mut self, points: &[[f64; 3]]) -> Result<SubShape, KernelError> {
        if points.len() < 3 {
            return Err(KernelError::InvalidInput {
                reason: format!("polygon needs at least 3 points, got {}", points.len()),
            });
        }
        let mut vertices = Vec::with_capacity(points.len());
        for p in points {
            vertices.push(self.vertex(Point3::from(*p)));
        }
        let mut edges = Vec::with_capacity(points.len());
        for i in 0..vertices.len() {
            let next = &vertices[(i + 1) % vertices.len()];
            edges.push(self.edge(&vertices[i], next)?);
        }
        Ok(self.add_node(ShapeKind::Wire, edges, None))
    }

    /// Planar face bounded by the `outer` polygon with optional `holes`.
    ///
    /// Entity order: outer loop first, then holes, each as vertices and edges
    /// in point order.
    pub fn polygon_face(
        &mut self,
        outer: &[[f64; 3]],
        holes: &[Vec<[f64; 3]>],
    ) -> Result<TopoShape, KernelError> {
        let mut wires = vec![self.polygon_wire(outer)?];
        for hole in holes {
            wires.push(self.polygon_wire(hole)?);
        }
        let normal = newell_normal(outer).ok_or_else(|| KernelError::InvalidInput {
            reason: "polygon has no area".into(),
        })?;
        let plane = Geometry::plane(outer[0], normal);
        let face = self.add_node(ShapeKind::Face, wires, plane);
        self.freeze(face)
    }

    /// Extrude a planar face along `direction` into a solid.
    ///
    /// The profile face and its elements are reused as the bottom cap. Each
    /// profile vertex generates a vertical edge, each profile edge generates
    /// a side face and the profile face generates the top cap.
    pub fn prism(
        &mut self,
        profile: &TopoShape,
        direction: [f64; 3],
    ) -> Result<(TopoShape, RecordedMapper), KernelError> {
        let face = profile
            .root()
            .filter(|root| root.kind == ShapeKind::Face)
            .ok_or_else(|| KernelError::InvalidInput {
                reason: "prism profile must be a face".into(),
            })?;
        let d = Vector3::from(direction);
        let face_node = self.node(&face)?.clone();
        let (origin, normal) = match &face_node.geometry {
            Some(Geometry::Plane { origin, normal }) => (*origin, *normal),
            _ => {
                return Err(KernelError::InvalidInput {
                    reason: "prism profile is not planar".into(),
                })
            }
        };
        if normal.dot(&d).abs() <= TOL {
            return Err(KernelError::InvalidInput {
                reason: "extrusion direction lies in the profile plane".into(),
            });
        }

        let mut mapper = RecordedMapper::new();
        let mut lifted: HashMap<PartnerId, (SubShape, SubShape)> = HashMap::new();
        let mut sides = Vec::new();
        let mut top_wires = Vec::new();
        for wire in &face_node.children {
            let edges = self.node(wire)?.children.clone();
            let mut top_edges = Vec::with_capacity(edges.len());
            for edge in &edges {
                let (start, end) = self.edge_ends(edge)?;
                let (start_top, start_vertical) = self.lift(&start, &d, &mut lifted, &mut mapper)?;
                let (end_top, end_vertical) = self.lift(&end, &d, &mut lifted, &mut mapper)?;
                let top_edge = self.edge(&start_top, &end_top)?;

                let pa = self.point_of(&start)?;
                let pb = self.point_of(&end)?;
                let side_wire = self.add_node(
                    ShapeKind::Wire,
                    vec![edge.clone(), end_vertical, top_edge.clone(), start_vertical],
                    None,
                );
                let side_plane = Geometry::plane(pa.into(), (pb - pa).cross(&d));
                let side = self.add_node(ShapeKind::Face, vec![side_wire], side_plane);
                mapper.record_generated(edge, side.clone());
                sides.push(side);
                top_edges.push(top_edge);
            }
            top_wires.push(self.add_node(ShapeKind::Wire, top_edges, None));
        }
        let top = self.add_node(
            ShapeKind::Face,
            top_wires,
            Some(Geometry::Plane {
                origin: origin + d,
                normal,
            }),
        );
        mapper.record_generated(&face, top.clone());

        let mut faces = vec![SubShape::new(ShapeKind::Face, face.partner).reversed()];
        faces.extend(sides);
        faces.push(top);
        let shell = self.add_node(ShapeKind::Shell, faces, None);
        let solid = self.add_node(ShapeKind::Solid, vec![shell], None);
        let shape = self.freeze(solid.located(&face.location))?;
        Ok((shape, mapper))
    }

    // Top vertex and vertical edge of a profile vertex, created once.
    fn lift(
        &mut self,
        vertex: &SubShape,
        d: &Vector3<f64>,
        lifted: &mut HashMap<PartnerId, (SubShape, SubShape)>,
        mapper: &mut RecordedMapper,
    ) -> Result<(SubShape, SubShape), KernelError> {
        if let Some(found) = lifted.get(&vertex.partner) {
            return Ok(found.clone());
        }
        let p = self.point_of(vertex)?;
        let top = self.vertex(p + *d);
        let vertical = self.edge(vertex, &top)?;
        mapper.record_generated(vertex, vertical.clone());
        lifted.insert(vertex.partner, (top.clone(), vertical.clone()));
        Ok((top, vertical))
    }

    /// Fuse `a` with the face `b`, where `b` is split by the plane `x = cut_x`.
    ///
    /// Stands in for a boolean whose result imprints one shape on the other:
    /// `a` passes through untouched, the two crossing edges of `b` are each
    /// modified into two halves, the face of `b` is modified into the two
    /// sides (lower x first) and generates the cutting edge. The result is a
    /// compound `[a, low side, high side]`.
    pub fn fuse_split(
        &mut self,
        a: &TopoShape,
        b: &TopoShape,
        cut_x: f64,
    ) -> Result<(TopoShape, RecordedMapper), KernelError> {
        let keep = a.root().ok_or_else(|| KernelError::InvalidInput {
            reason: "fuse argument is null".into(),
        })?;
        let face = b
            .root()
            .filter(|root| root.kind == ShapeKind::Face)
            .ok_or_else(|| KernelError::InvalidInput {
                reason: "split tool must be a face".into(),
            })?;
        let face_node = self.node(&face)?.clone();
        let [wire] = face_node.children.as_slice() else {
            return Err(KernelError::NotSupported {
                operation: "splitting a face with holes".into(),
            });
        };

        let edges = self.node(wire)?.children.clone();
        let mut starts = Vec::with_capacity(edges.len());
        let mut positions = Vec::with_capacity(edges.len());
        for edge in &edges {
            let (start, _) = self.edge_ends(edge)?;
            positions.push(self.point_of(&start)?);
            starts.push(start);
        }
        let n = edges.len();
        let offset = |i: usize| positions[i % n].x - cut_x;
        if (0..n).any(|i| offset(i).abs() <= TOL) {
            return Err(KernelError::NotSupported {
                operation: "splitting through a vertex".into(),
            });
        }
        let crossings: Vec<usize> = (0..n)
            .filter(|&i| offset(i).signum() != offset(i + 1).signum())
            .collect();
        let &[i, j] = crossings.as_slice() else {
            return Err(KernelError::InvalidInput {
                reason: format!("split plane crosses the boundary {} times", crossings.len()),
            });
        };

        let mut mapper = RecordedMapper::new();
        let cross = |k: usize| {
            let (p, q) = (positions[k], positions[(k + 1) % n]);
            let t = (cut_x - p.x) / (q.x - p.x);
            p + (q - p) * t
        };
        let (pi, pj) = (cross(i), cross(j));
        let p = self.vertex(pi);
        let q = self.vertex(pj);
        let (i_low, i_high) = self.split_edge(&edges[i], &starts[i], &starts[(i + 1) % n], &p, &mut mapper)?;
        let (j_low, j_high) = self.split_edge(&edges[j], &starts[j], &starts[(j + 1) % n], &q, &mut mapper)?;
        let middle = self.edge(&p, &q)?;
        mapper.record_generated(&face, middle.clone());

        let mut first = vec![i_high];
        first.extend(edges[i + 1..j].iter().cloned());
        first.push(j_low);
        first.push(middle.clone());
        let mut second = vec![j_high];
        second.extend(edges[j + 1..].iter().cloned());
        second.extend(edges[..i].iter().cloned());
        second.push(i_low);
        second.push(middle);

        let first = self.face_from_edges(first, face_node.geometry.clone());
        let second = self.face_from_edges(second, face_node.geometry.clone());
        let (low, high) = if offset(i + 1) < 0.0 {
            (first, second)
        } else {
            (second, first)
        };
        mapper.record_modified(&face, low.clone());
        mapper.record_modified(&face, high.clone());

        let compound = self.add_node(
            ShapeKind::Compound,
            vec![keep, low.located(&face.location), high.located(&face.location)],
            None,
        );
        Ok((self.freeze(compound)?, mapper))
    }

    // Halves of `edge` split at vertex `at`: (start -> at, at -> end).
    fn split_edge(
        &mut self,
        edge: &SubShape,
        start: &SubShape,
        end: &SubShape,
        at: &SubShape,
        mapper: &mut RecordedMapper,
    ) -> Result<(SubShape, SubShape), KernelError> {
        let low = self.edge(start, at)?;
        let high = self.edge(at, end)?;
        mapper.record_modified(edge, low.clone());
        mapper.record_modified(edge, high.clone());
        Ok((low, high))
    }

    fn face_from_edges(&mut self, edges: Vec<SubShape>, plane: Option<Geometry>) -> SubShape {
        let wire = self.add_node(ShapeKind::Wire, edges, None);
        self.add_node(ShapeKind::Face, vec![wire], plane)
    }

    /// Group shapes into a compound. Shared entities stay shared.
    pub fn compound(&mut self, parts: &[TopoShape]) -> Result<TopoShape, KernelError> {
        let mut children = Vec::with_capacity(parts.len());
        for part in parts {
            let root = part.root().ok_or_else(|| KernelError::InvalidInput {
                reason: "compound part is null".into(),
            })?;
            self.node(&root)?;
            children.push(root);
        }
        let compound = self.add_node(ShapeKind::Compound, children, None);
        self.freeze(compound)
    }

    /// Rigidly move a shape. The result shares every entity with the input and
    /// starts with an empty element map.
    pub fn transform(&self, shape: &TopoShape, location: &Location) -> Result<TopoShape, KernelError> {
        let root = shape.root().ok_or_else(|| KernelError::InvalidInput {
            reason: "cannot transform a null shape".into(),
        })?;
        let mut moved = self.freeze(root.located(location))?.with_tag(shape.tag());
        moved.set_hasher(shape.hasher().cloned());
        Ok(moved)
    }
}

impl Default for MockKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn newell_normal(points: &[[f64; 3]]) -> Option<Vector3<f64>> {
    let mut n = Vector3::zeros();
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        n.x += (a[1] - b[1]) * (a[2] + b[2]);
        n.y += (a[2] - b[2]) * (a[0] + b[0]);
        n.z += (a[0] - b[0]) * (a[1] + b[1]);
    }
    (n.norm() > TOL).then_some(n)
}
