//! Shape values: raw kernel topology plus the owning tag, hasher, element
//! map and lazily built index cache.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use naming_types::{ElementIdRefs, ElementMap, HasherRef, MappedName};
use tracing::warn;

use crate::geometry::Geometry;
use crate::index_cache::ShapeIndexCache;
use crate::traits::Topology;
use crate::types::{IndexedName, KernelError, Location, ShapeKind, SubShape};

/// A shape value as seen by the naming engine.
///
/// Cloning is cheap: topology, element map and index cache are shared.
/// Mutating the element map copies it first, and replacing the topology
/// gives the value a fresh, empty map and cache.
#[derive(Clone)]
pub struct TopoShape {
    topology: Option<Rc<dyn Topology>>,
    tag: i64,
    hasher: Option<HasherRef>,
    element_map: Rc<ElementMap>,
    cache: OnceCell<Rc<ShapeIndexCache>>,
}

impl fmt::Debug for TopoShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopoShape")
            .field("root", &self.root())
            .field("tag", &self.tag)
            .field("names", &self.element_map.name_count())
            .finish()
    }
}

impl Default for TopoShape {
    fn default() -> Self {
        Self::null()
    }
}

impl TopoShape {
    pub fn new(topology: Rc<dyn Topology>) -> Self {
        let element_map = ElementMap::new(topology.kernel_version());
        Self {
            topology: Some(topology),
            tag: 0,
            hasher: None,
            element_map: Rc::new(element_map),
            cache: OnceCell::new(),
        }
    }

    pub fn null() -> Self {
        Self {
            topology: None,
            tag: 0,
            hasher: None,
            element_map: Rc::new(ElementMap::default()),
            cache: OnceCell::new(),
        }
    }

    pub fn with_tag(mut self, tag: i64) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_hasher(mut self, hasher: HasherRef) -> Self {
        self.set_hasher(Some(hasher));
        self
    }

    pub fn tag(&self) -> i64 {
        self.tag
    }

    pub fn set_tag(&mut self, tag: i64) {
        self.tag = tag;
    }

    pub fn hasher(&self) -> Option<&HasherRef> {
        self.hasher.as_ref()
    }

    /// Set the shape's hasher. An element map without a hasher adopts it.
    pub fn set_hasher(&mut self, hasher: Option<HasherRef>) {
        if self.element_map.hasher().is_none() && hasher.is_some() {
            self.element_map_mut().set_hasher(hasher.clone());
        }
        self.hasher = hasher;
    }

    pub fn is_null(&self) -> bool {
        self.root().is_none()
    }

    pub fn root(&self) -> Option<SubShape> {
        self.topology.as_ref().and_then(|t| t.root())
    }

    pub fn topology(&self) -> Option<&Rc<dyn Topology>> {
        self.topology.as_ref()
    }

    pub fn kernel_version(&self) -> &str {
        self.topology.as_ref().map_or("", |t| t.kernel_version())
    }

    /// Replace the raw structure. The element map and index cache are reset.
    pub fn set_topology(&mut self, topology: Rc<dyn Topology>) {
        let mut map = ElementMap::new(topology.kernel_version());
        map.set_hasher(self.hasher.clone());
        self.topology = Some(topology);
        self.element_map = Rc::new(map);
        self.cache = OnceCell::new();
    }

    pub fn element_map(&self) -> &ElementMap {
        &self.element_map
    }

    /// Mutable access, copying the map first if another value shares it.
    pub fn element_map_mut(&mut self) -> &mut ElementMap {
        Rc::make_mut(&mut self.element_map)
    }

    pub fn set_element_map(&mut self, map: ElementMap) {
        self.element_map = Rc::new(map);
    }

    /// True if both values share one element map allocation.
    pub fn shares_element_map(&self, other: &TopoShape) -> bool {
        Rc::ptr_eq(&self.element_map, &other.element_map)
    }

    /// Index tables, built on first use. None for a null shape.
    pub fn index_cache(&self) -> Option<Rc<ShapeIndexCache>> {
        let topology = self.topology.as_ref()?;
        let root = topology.root()?;
        if let Some(cache) = self.cache.get() {
            if cache.root().is_equal(&root) {
                return Some(cache.clone());
            }
            // Raw structure moved under us: rebuild without touching the cell.
            return Some(Rc::new(ShapeIndexCache::build(topology.clone(), root)));
        }
        let cache = self
            .cache
            .get_or_init(|| Rc::new(ShapeIndexCache::build(topology.clone(), root)));
        Some(cache.clone())
    }

    pub fn count_of(&self, kind: ShapeKind) -> usize {
        self.index_cache().map_or(0, |c| c.count_of(kind))
    }

    pub fn element(&self, name: IndexedName) -> Option<SubShape> {
        self.index_cache()?.element(name).cloned()
    }

    pub fn index_of(&self, shape: &SubShape) -> Option<IndexedName> {
        let index = self.index_cache()?.index_of(shape);
        (index > 0).then(|| IndexedName::new(shape.kind, index))
    }

    pub fn geometry(&self, shape: &SubShape) -> Option<Geometry> {
        self.topology.as_ref()?.geometry(shape)
    }

    /// Primary name of the element at `index`.
    pub fn element_name(&self, index: IndexedName) -> Option<&MappedName> {
        self.element_map.get_name(index)
    }

    /// Resolve textual element reference: `Face3` style indexed names, or a
    /// mapped name prefixed with `;`.
    pub fn find_sub_shape(&self, text: &str) -> Option<IndexedName> {
        if let Some(mapped) = text.strip_prefix(';') {
            return self.element_map.get_index(mapped);
        }
        let index: IndexedName = text.parse().ok()?;
        (index.index as usize <= self.count_of(index.kind)).then_some(index)
    }

    /// One element as a shape of its own, carrying the names of its elements.
    pub fn sub_shape(&self, index: IndexedName) -> Result<TopoShape, KernelError> {
        let (Some(topology), Some(element)) = (self.topology.clone(), self.element(index)) else {
            return Err(KernelError::EntityNotFound {
                name: index.to_string(),
            });
        };
        let mut sub = TopoShape::new(Rc::new(SubTopology {
            inner: topology,
            root: element,
        }))
        .with_tag(self.tag);
        sub.set_hasher(self.hasher.clone());

        let (Some(parent_cache), Some(sub_cache)) = (self.index_cache(), sub.index_cache()) else {
            return Ok(sub);
        };
        let mut map = sub.element_map().clone();
        map.set_hasher(self.element_map.hasher().cloned());
        for kind in ShapeKind::ELEMENTS {
            for (i, shape) in sub_cache.shapes(kind).iter().enumerate() {
                let parent_index = IndexedName::new(kind, parent_cache.index_of(shape));
                for entry in self.element_map.names(parent_index) {
                    map.set_name(
                        IndexedName::new(kind, i as u32 + 1),
                        entry.name.clone(),
                        entry.refs.clone(),
                    );
                }
            }
        }
        sub.set_element_map(map);
        Ok(sub)
    }

    /// The same shape moved by `location`.
    ///
    /// Structure and element order are unchanged, so the element map is
    /// shared rather than rebuilt.
    pub fn relocated(&self, location: &Location) -> TopoShape {
        let (Some(topology), Some(root)) = (self.topology.clone(), self.root()) else {
            return self.clone();
        };
        TopoShape {
            topology: Some(Rc::new(SubTopology {
                inner: topology,
                root: root.located(location),
            })),
            tag: self.tag,
            hasher: self.hasher.clone(),
            element_map: self.element_map.clone(),
            cache: OnceCell::new(),
        }
    }

    /// Copy names from a structurally identical shape, e.g. after a pure
    /// transform, optionally appending `postfix` to every name.
    ///
    /// Per-kind count mismatches are reported and the names are copied over
    /// the common count.
    pub fn copy_element_map(&mut self, from: &TopoShape, postfix: Option<&str>) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut common = ElementMap::with_version(from.element_map.version());
        common.set_hasher(from.element_map.hasher().cloned());
        for kind in ShapeKind::ELEMENTS {
            let ours = self.count_of(kind);
            let theirs = from.count_of(kind);
            if ours != theirs {
                let msg = format!("{kind} count mismatch copying element map: {theirs} -> {ours}");
                warn!(%kind, ours, theirs, "element count mismatch copying element map");
                warnings.push(msg);
            }
            for i in 1..=ours.min(theirs) as u32 {
                let index = IndexedName::new(kind, i);
                for entry in from.element_map.names(index) {
                    common.set_name(index, entry.name.clone(), entry.refs.clone());
                }
            }
        }
        warnings.extend(self.element_map_mut().merge(&common, postfix));
        warnings
    }

    /// Elements of this shape geometrically identical to `candidate`, an
    /// element of `other`.
    pub fn search_by_geometry(
        &self,
        other: &TopoShape,
        candidate: &SubShape,
        check_geometry: bool,
        tol: f64,
        angular_tol: f64,
    ) -> Vec<SubShape> {
        match (self.index_cache(), other.topology()) {
            (Some(cache), Some(topology)) => cache.search_by_geometry(
                topology.as_ref(),
                candidate,
                check_geometry,
                tol,
                angular_tol,
            ),
            _ => Vec::new(),
        }
    }

    /// Give every element its indexed name (`Face1`, `Edge3`, ...) as mapped
    /// name. Used for primitives that start a naming history.
    pub fn name_elements_by_index(&mut self) {
        let Some(cache) = self.index_cache() else {
            return;
        };
        let map = self.element_map_mut();
        for kind in ShapeKind::ELEMENTS {
            for i in 1..=cache.count_of(kind) as u32 {
                let index = IndexedName::new(kind, i);
                map.set_name(index, MappedName::new(&index.to_string()), ElementIdRefs::new());
            }
        }
    }
}

/// View of one sub-entity of a larger topology, possibly relocated, as a
/// shape of its own.
#[derive(Debug)]
struct SubTopology {
    inner: Rc<dyn Topology>,
    root: SubShape,
}

impl Topology for SubTopology {
    fn root(&self) -> Option<SubShape> {
        Some(self.root.clone())
    }

    fn children(&self, shape: &SubShape) -> Vec<SubShape> {
        self.inner.children(shape)
    }

    fn geometry(&self, shape: &SubShape) -> Option<Geometry> {
        self.inner.geometry(shape)
    }

    fn kernel_version(&self) -> &str {
        self.inner.kernel_version()
    }
}
