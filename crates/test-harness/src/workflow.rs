//! ModelBuilder: fluent API for scripting feature histories in tests.
//!
//! Drives the real engine path (resolve inputs, run the kernel, commit the
//! named output). All methods accept labels instead of object ids.

use std::collections::HashMap;

use feature_engine::{Engine, ObjectId, ResolverConfig};
use file_format::{restore_element_map, save_element_map, LoadOutcome};
use naming_ops::{element_history, BuildReport, BuilderConfig};
use naming_types::{ElementMap, HasherRef, IndexedName, NameHistory};
use shape_kernel::{Location, MockKernel, TopoShape};
use tracing::debug;

use crate::helpers::*;
use crate::oracle::{self, OracleVerdict};

/// A fluent builder for feature histories over the mock kernel.
pub struct ModelBuilder {
    pub engine: Engine,
    kernel: MockKernel,
    named_features: HashMap<String, ObjectId>,
    history: Vec<(String, String)>,
    auto_check: bool,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::with_config(BuilderConfig::default())
    }

    pub fn with_config(config: BuilderConfig) -> Self {
        Self {
            engine: Engine::with_config(ResolverConfig::default(), config),
            kernel: MockKernel::new(),
            named_features: HashMap::new(),
            history: Vec::new(),
            auto_check: false,
        }
    }

    /// Enable auto-checking: after every commit, run the naming oracles.
    pub fn with_auto_check(mut self) -> Self {
        self.auto_check = true;
        self
    }

    // ── Sources ─────────────────────────────────────────────────────────

    /// Create or replace a planar sketch face. Its elements are named by index.
    pub fn sketch(
        &mut self,
        name: &str,
        outer: &[[f64; 3]],
        holes: &[Vec<[f64; 3]>],
    ) -> Result<ObjectId, HarnessError> {
        let mut face = self.kernel.polygon_face(outer, holes)?;
        face.name_elements_by_index();
        let id = match self.named_features.get(name) {
            Some(&id) => {
                self.engine.set_shape(id, face)?;
                id
            }
            None => {
                let id = self.engine.add_feature(name, Some(face));
                self.named_features.insert(name.to_string(), id);
                id
            }
        };
        self.history.push(("Sketch".into(), name.into()));
        Ok(id)
    }

    /// Rectangular sketch at height zero.
    pub fn rect_sketch(&mut self, name: &str, x: f64, y: f64, w: f64, h: f64) -> Result<ObjectId, HarnessError> {
        self.sketch(name, &rect_points(x, y, w, h, 0.0), &[])
    }

    // ── Features ────────────────────────────────────────────────────────

    /// Extrude `sketch` along +z. Recomputes `name` if it already exists.
    pub fn extrude(&mut self, name: &str, sketch: &str, height: f64) -> Result<BuildReport, HarnessError> {
        let profile = self.shape(sketch)?;
        let (solid, mapper) = self.kernel.prism(&profile, [0.0, 0.0, height])?;
        let id = self.feature_slot(name);
        let report = self.engine.commit(id, solid, &mapper, &[profile], "Extrude")?;
        self.after_commit(name, "Extrude", &report)?;
        Ok(report)
    }

    /// Fuse the shape of `keep` with the face of `split`, cut at `x = cut_x`.
    pub fn fuse(&mut self, name: &str, keep: &str, split: &str, cut_x: f64) -> Result<BuildReport, HarnessError> {
        let a = self.shape(keep)?;
        let b = self.shape(split)?;
        let (fused, mapper) = self.kernel.fuse_split(&a, &b, cut_x)?;
        let id = self.feature_slot(name);
        let report = self.engine.commit(id, fused, &mapper, &[a, b], "Fuse")?;
        self.after_commit(name, "Fuse", &report)?;
        Ok(report)
    }

    /// A link to `target`, optionally placed somewhere else.
    pub fn link(&mut self, name: &str, target: &str, placement: Option<Location>) -> Result<ObjectId, HarnessError> {
        self.check_name_available(name)?;
        let target = self.id(target)?;
        let id = self.engine.add_link(name, target, placement);
        self.named_features.insert(name.to_string(), id);
        self.history.push(("Link".into(), name.into()));
        Ok(id)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn id(&self, name: &str) -> Result<ObjectId, HarnessError> {
        self.named_features
            .get(name)
            .copied()
            .ok_or_else(|| HarnessError::FeatureNotFound { name: name.into() })
    }

    pub fn shape(&mut self, name: &str) -> Result<TopoShape, HarnessError> {
        self.element(name, "")
    }

    /// Resolve `subpath` inside the feature `name`.
    pub fn element(&mut self, name: &str, subpath: &str) -> Result<TopoShape, HarnessError> {
        let id = self.id(name)?;
        Ok(self.engine.get_shape(id, subpath)?)
    }

    pub fn names(&mut self, name: &str) -> Result<NameTable, HarnessError> {
        Ok(name_table(&self.shape(name)?))
    }

    pub fn history_of(&mut self, name: &str, index: IndexedName) -> Result<Option<NameHistory>, HarnessError> {
        let shape = self.shape(name)?;
        let max_depth = self.engine.resolver().config().max_depth;
        element_history(&shape, index, max_depth).map_err(|e| HarnessError::AssertionFailed {
            detail: format!("history of {index} in {name}: {e}"),
        })
    }

    /// Operations run so far, as (operation, label) pairs.
    pub fn history(&self) -> &[(String, String)] {
        &self.history
    }

    // ── Persistence ─────────────────────────────────────────────────────

    /// Save the names of `name` and load them into an unnamed copy of its shape.
    pub fn reload(&mut self, name: &str) -> Result<(TopoShape, LoadOutcome), HarnessError> {
        let hasher = self.shape(name)?.hasher().cloned();
        self.reload_into(name, hasher)
    }

    /// Like [`reload`](Self::reload), but the copy starts from `hasher`, as a
    /// freshly opened document would.
    pub fn reload_into(
        &mut self,
        name: &str,
        hasher: Option<HasherRef>,
    ) -> Result<(TopoShape, LoadOutcome), HarnessError> {
        let shape = self.shape(name)?;
        let json = save_element_map(shape.element_map())?;
        let mut fresh = shape.clone();
        let mut empty = ElementMap::new(shape.kernel_version());
        empty.set_hasher(hasher);
        fresh.set_element_map(empty);
        let outcome = restore_element_map(&mut fresh, &json)?;
        debug!(feature = name, bytes = json.len(), "reloaded element map");
        Ok((fresh, outcome))
    }

    // ── Checks ──────────────────────────────────────────────────────────

    /// Run the naming oracles on the shape of `name`.
    pub fn verify(&mut self, name: &str) -> Result<Vec<OracleVerdict>, HarnessError> {
        let shape = self.shape(name)?;
        let max_depth = self.engine.resolver().config().max_depth;
        Ok(vec![
            oracle::check_all_named(&shape),
            oracle::check_names_injective(&shape),
            oracle::check_histories_decode(&shape, max_depth),
        ])
    }

    /// Fail with the first failing oracle verdict.
    pub fn assert_consistent(&mut self, name: &str) -> Result<(), HarnessError> {
        match self.verify(name)?.into_iter().find(|v| !v.passed) {
            Some(verdict) => Err(HarnessError::OracleFailure {
                oracle: verdict.oracle_name,
                detail: format!("[{name}] {}", verdict.detail),
            }),
            None => Ok(()),
        }
    }

    pub fn assert_no_warnings(&self) -> Result<(), HarnessError> {
        if self.engine.warnings.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::AssertionFailed {
                detail: format!("engine warnings: {:?}", self.engine.warnings),
            })
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn check_name_available(&self, name: &str) -> Result<(), HarnessError> {
        if self.named_features.contains_key(name) {
            return Err(HarnessError::DuplicateName { name: name.into() });
        }
        Ok(())
    }

    // Existing feature `name`, or a new empty one.
    fn feature_slot(&mut self, name: &str) -> ObjectId {
        if let Some(&id) = self.named_features.get(name) {
            return id;
        }
        let id = self.engine.add_feature(name, None);
        self.named_features.insert(name.to_string(), id);
        id
    }

    fn after_commit(&mut self, name: &str, op: &str, report: &BuildReport) -> Result<(), HarnessError> {
        debug!(feature = name, op, named = report.named, unnamed = report.unnamed, "committed");
        self.history.push((op.into(), name.into()));
        if self.auto_check {
            self.assert_consistent(name)?;
        }
        Ok(())
    }
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
