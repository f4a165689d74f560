pub mod document;
pub mod resolve;
pub mod types;
pub mod value_cache;

pub use document::{Document, DocObject, FeatureObject, InMemoryDocument, Link, ObjectKind};
pub use resolve::{ResolverConfig, ShapeResolver};
pub use types::{ChangeKind, EngineError, ObjectId};
pub use value_cache::{EntryKey, ShapeValueCache};

use naming_ops::{BuildReport, BuilderConfig, ElementMapBuilder};
use shape_kernel::{Location, Mapper, TopoShape};
use tracing::{info, instrument};

/// The document side of the naming engine.
///
/// Owns the document, resolves references through the shape cache, and
/// names the output of every recomputed feature.
#[derive(Debug)]
pub struct Engine {
    /// The document.
    pub document: InMemoryDocument,
    resolver: ShapeResolver,
    builder: ElementMapBuilder,
    /// Warnings from the last recompute.
    pub warnings: Vec<String>,
}

impl Engine {
    /// Create an engine over an empty document.
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default(), BuilderConfig::default())
    }

    pub fn with_config(resolver: ResolverConfig, builder: BuilderConfig) -> Self {
        Self {
            document: InMemoryDocument::new(),
            resolver: ShapeResolver::new(resolver),
            builder: ElementMapBuilder::new(builder),
            warnings: Vec::new(),
        }
    }

    pub fn resolver(&self) -> &ShapeResolver {
        &self.resolver
    }

    pub fn add_feature(&mut self, label: &str, shape: Option<TopoShape>) -> ObjectId {
        self.document.add_feature(label, shape)
    }

    pub fn add_link(&mut self, label: &str, target: ObjectId, placement: Option<Location>) -> ObjectId {
        self.document.add_link(label, target, placement)
    }

    pub fn add_group(&mut self, label: &str, members: &[ObjectId]) -> Result<ObjectId, EngineError> {
        self.document.add_group(label, members)
    }

    /// Shape referenced by `subpath` inside `owner`.
    pub fn get_shape(&mut self, owner: ObjectId, subpath: &str) -> Result<TopoShape, EngineError> {
        self.resolver.get_shape(&self.document, owner, subpath)
    }

    /// Name `output`, the recomputed shape of `feature`, from its inputs and
    /// store it as the feature's shape.
    ///
    /// Cached shapes that went through `feature` are dropped.
    #[instrument(skip(self, output, mapper, inputs))]
    pub fn commit(
        &mut self,
        feature: ObjectId,
        mut output: TopoShape,
        mapper: &dyn Mapper,
        inputs: &[TopoShape],
        op: &str,
    ) -> Result<BuildReport, EngineError> {
        self.document.get(feature)?;
        output.set_tag(feature.0);
        if output.hasher().is_none() {
            output.set_hasher(Some(self.document.string_hasher()));
        }
        let report = self.builder.build(&mut output, mapper, inputs, op)?;
        self.document.set_shape(feature, output)?;
        let dropped = self.resolver.cache_mut().notify_changed(feature, ChangeKind::Shape);
        info!(%feature, op, unnamed = report.unnamed, dropped, "feature recomputed");

        self.warnings = report.diagnostics.warnings.clone();
        Ok(report)
    }

    /// Replace the shape of a source feature, keeping whatever names it carries.
    pub fn set_shape(&mut self, feature: ObjectId, shape: TopoShape) -> Result<(), EngineError> {
        self.document.set_shape(feature, shape)?;
        self.resolver.cache_mut().notify_changed(feature, ChangeKind::Shape);
        Ok(())
    }

    pub fn set_visible(&mut self, id: ObjectId, visible: bool) -> Result<(), EngineError> {
        self.document.set_visible(id, visible)?;
        self.resolver.cache_mut().notify_changed(id, ChangeKind::Visibility);
        Ok(())
    }

    pub fn add_to_group(&mut self, group: ObjectId, member: ObjectId) -> Result<(), EngineError> {
        self.document.add_to_group(group, member)?;
        self.resolver
            .cache_mut()
            .notify_changed(group, ChangeKind::GroupMembership);
        Ok(())
    }

    /// Mark `id` for recompute; everything cached through it is dropped.
    pub fn touch(&mut self, id: ObjectId) -> Result<(), EngineError> {
        self.document.get(id)?;
        self.resolver.cache_mut().notify_changed(id, ChangeKind::Touched);
        Ok(())
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
