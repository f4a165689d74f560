//! Per-shape index tables: O(1) index <-> sub-entity resolution and lazily
//! built ancestor tables.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use nalgebra::Point3;
use tracing::{debug, instrument};

use crate::geometry::Geometry;
use crate::traits::Topology;
use crate::types::{IndexedName, Location, PartnerId, ShapeKind, SubShape};

#[derive(Debug, Default)]
struct KindTable {
    shapes: Vec<SubShape>,
    lookup: HashMap<PartnerId, u32>,
}

/// Index tables of one shape value.
///
/// Built once against a root handle and never patched: a shape whose raw
/// structure changes gets a new cache.
#[derive(Debug)]
pub struct ShapeIndexCache {
    topology: Rc<dyn Topology>,
    root: SubShape,
    tables: HashMap<ShapeKind, KindTable>,
    ancestors: RefCell<HashMap<(ShapeKind, ShapeKind), Rc<Vec<Vec<u32>>>>>,
}

impl ShapeIndexCache {
    /// Enumerate every sub-entity reachable from `root`, the root included,
    /// in pre-order. Uses of the same partner share one index.
    #[instrument(skip(topology))]
    pub fn build(topology: Rc<dyn Topology>, root: SubShape) -> Self {
        let mut tables: HashMap<ShapeKind, KindTable> = HashMap::new();
        let mut stack = vec![root.clone()];
        while let Some(shape) = stack.pop() {
            let table = tables.entry(shape.kind).or_default();
            if table.lookup.contains_key(&shape.partner) {
                continue;
            }
            table.shapes.push(shape.clone());
            table.lookup.insert(shape.partner, table.shapes.len() as u32);
            let mut children = topology.children(&shape);
            children.reverse();
            stack.extend(children);
        }
        debug!(
            faces = tables.get(&ShapeKind::Face).map_or(0, |t| t.shapes.len()),
            edges = tables.get(&ShapeKind::Edge).map_or(0, |t| t.shapes.len()),
            vertices = tables.get(&ShapeKind::Vertex).map_or(0, |t| t.shapes.len()),
            "built shape index cache"
        );
        Self {
            topology,
            root,
            tables,
            ancestors: RefCell::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &SubShape {
        &self.root
    }

    pub fn topology(&self) -> &Rc<dyn Topology> {
        &self.topology
    }

    pub fn count_of(&self, kind: ShapeKind) -> usize {
        self.tables.get(&kind).map_or(0, |t| t.shapes.len())
    }

    /// All sub-entities of `kind`, in index order.
    pub fn shapes(&self, kind: ShapeKind) -> &[SubShape] {
        self.tables
            .get(&kind)
            .map(|t| t.shapes.as_slice())
            .unwrap_or(&[])
    }

    /// Sub-entity at 1-based `index`.
    pub fn at(&self, kind: ShapeKind, index: u32) -> Option<&SubShape> {
        let slot = usize::try_from(index).ok()?.checked_sub(1)?;
        self.tables.get(&kind)?.shapes.get(slot)
    }

    pub fn element(&self, name: IndexedName) -> Option<&SubShape> {
        self.at(name.kind, name.index)
    }

    /// 1-based index of `shape`, or 0 if it is not part of this shape.
    /// Placement and orientation are ignored.
    pub fn index_of(&self, shape: &SubShape) -> u32 {
        self.tables
            .get(&shape.kind)
            .and_then(|t| t.lookup.get(&shape.partner))
            .copied()
            .unwrap_or(0)
    }

    /// Find `shape` and return its stored handle moved to `shape`'s placement.
    pub fn find(&self, shape: &SubShape) -> Option<(u32, SubShape)> {
        let index = self.index_of(shape);
        let stored = self.at(shape.kind, index)?;
        let delta = relocation(stored, shape);
        Some((index, relocated(stored, &delta)))
    }

    /// Distinct sub-entities of `kind` below `shape` (not `shape` itself), in
    /// traversal order.
    pub fn descendants(&self, shape: &SubShape, kind: ShapeKind) -> Vec<SubShape> {
        descendants_of(self.topology.as_ref(), shape, kind)
    }

    /// Every entity of `ancestor` kind containing `shape`, in index order.
    pub fn find_ancestors(&self, shape: &SubShape, ancestor: ShapeKind) -> Vec<SubShape> {
        let index = self.index_of(shape);
        let Some(stored) = self.at(shape.kind, index) else {
            return Vec::new();
        };
        let delta = relocation(stored, shape);
        let table = self.ancestor_table(shape.kind, ancestor);
        table[index as usize - 1]
            .iter()
            .filter_map(|&i| self.at(ancestor, i))
            .map(|a| relocated(a, &delta))
            .collect()
    }

    /// 1-based indices of the `ancestor` entities containing the element at
    /// `index`.
    pub fn ancestor_indices(&self, kind: ShapeKind, index: u32, ancestor: ShapeKind) -> Vec<u32> {
        let table = self.ancestor_table(kind, ancestor);
        usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|slot| table.get(slot))
            .cloned()
            .unwrap_or_default()
    }

    fn ancestor_table(&self, kind: ShapeKind, ancestor: ShapeKind) -> Rc<Vec<Vec<u32>>> {
        if let Some(table) = self.ancestors.borrow().get(&(kind, ancestor)) {
            return table.clone();
        }
        let mut table = vec![Vec::new(); self.count_of(kind)];
        for (i, parent) in self.shapes(ancestor).iter().enumerate() {
            for child in self.descendants(parent, kind) {
                let index = self.index_of(&child);
                if index > 0 {
                    table[index as usize - 1].push(i as u32 + 1);
                }
            }
        }
        let table = Rc::new(table);
        self.ancestors
            .borrow_mut()
            .insert((kind, ancestor), table.clone());
        table
    }

    /// Entities of this shape geometrically identical to `candidate`, which
    /// belongs to another topology.
    ///
    /// Vertices match by position. Edges and faces match when their vertex
    /// sets coincide pairwise; with `check_geometry` their carriers must also
    /// coincide. No match yields an empty list.
    pub fn search_by_geometry(
        &self,
        candidate_topology: &dyn Topology,
        candidate: &SubShape,
        check_geometry: bool,
        tol: f64,
        angular_tol: f64,
    ) -> Vec<SubShape> {
        match candidate.kind {
            ShapeKind::Vertex => {
                let Some(Geometry::Point(p)) = candidate_topology.geometry(candidate) else {
                    return Vec::new();
                };
                self.shapes(ShapeKind::Vertex)
                    .iter()
                    .filter(|v| match self.topology.geometry(v) {
                        Some(Geometry::Point(q)) => (p - q).norm() <= tol,
                        _ => false,
                    })
                    .cloned()
                    .collect()
            }
            ShapeKind::Edge | ShapeKind::Face => {
                let wanted = vertex_points(candidate_topology, candidate);
                if wanted.is_empty() {
                    return Vec::new();
                }
                let carrier = candidate_topology.geometry(candidate);
                self.shapes(candidate.kind)
                    .iter()
                    .filter(|s| {
                        let points = vertex_points(self.topology.as_ref(), s);
                        points.len() == wanted.len()
                            && points
                                .iter()
                                .all(|p| wanted.iter().any(|q| (p - q).norm() <= tol))
                    })
                    .filter(|s| {
                        !check_geometry
                            || match (&carrier, self.topology.geometry(s)) {
                                (Some(a), Some(b)) => a.coincides(&b, tol, angular_tol),
                                _ => false,
                            }
                    })
                    .cloned()
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

fn descendants_of(topology: &dyn Topology, shape: &SubShape, kind: ShapeKind) -> Vec<SubShape> {
    let mut found: Vec<SubShape> = Vec::new();
    let mut stack = topology.children(shape);
    stack.reverse();
    while let Some(next) = stack.pop() {
        if next.kind == kind {
            if !found.iter().any(|f| f.is_partner(&next)) {
                found.push(next);
            }
            continue;
        }
        if next.kind.level() < kind.level() {
            continue;
        }
        let mut children = topology.children(&next);
        children.reverse();
        stack.extend(children);
    }
    found
}

fn vertex_points(topology: &dyn Topology, shape: &SubShape) -> Vec<Point3<f64>> {
    descendants_of(topology, shape, ShapeKind::Vertex)
        .iter()
        .filter_map(|v| match topology.geometry(v) {
            Some(Geometry::Point(p)) => Some(p),
            _ => None,
        })
        .collect()
}

// Placement that moves `stored` onto `actual`.
fn relocation(stored: &SubShape, actual: &SubShape) -> Location {
    actual.location.compose(&stored.location.inverse())
}

fn relocated(shape: &SubShape, delta: &Location) -> SubShape {
    if delta.is_identity() {
        shape.clone()
    } else {
        shape.located(delta)
    }
}
