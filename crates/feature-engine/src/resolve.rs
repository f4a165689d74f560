use shape_kernel::TopoShape;
use tracing::{debug, instrument};

use crate::document::Document;
use crate::types::{EngineError, ObjectId};
use crate::value_cache::ShapeValueCache;

/// Configuration of sub-path resolution.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Longest chain of objects a single reference may pass through.
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: naming_types::DEFAULT_MAX_DEPTH,
        }
    }
}

/// What a resolution touched, for caching.
#[derive(Debug, Clone, Default)]
struct Trace {
    through: Vec<ObjectId>,
    cacheable: bool,
}

/// Resolves (owner, sub-path) references to shapes, memoizing the results.
#[derive(Debug, Default)]
pub struct ShapeResolver {
    config: ResolverConfig,
    cache: ShapeValueCache,
}

impl ShapeResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cache: ShapeValueCache::new(),
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache(&self) -> &ShapeValueCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ShapeValueCache {
        &mut self.cache
    }

    /// Shape referenced by `subpath` inside `owner`.
    ///
    /// An empty sub-path is the owner's own shape. Otherwise the owner either
    /// links the reference on to another object, or the sub-path names one
    /// of its elements (`Face3`, or a mapped name after `;`).
    #[instrument(skip(self, doc))]
    pub fn get_shape(
        &mut self,
        doc: &dyn Document,
        owner: ObjectId,
        subpath: &str,
    ) -> Result<TopoShape, EngineError> {
        let mut chain = Vec::new();
        self.resolve(doc, owner, subpath, &mut chain)
            .map(|(shape, _)| shape)
    }

    fn resolve(
        &mut self,
        doc: &dyn Document,
        owner: ObjectId,
        subpath: &str,
        chain: &mut Vec<ObjectId>,
    ) -> Result<(TopoShape, Trace), EngineError> {
        if let Some(shape) = self.cache.get(owner, subpath) {
            debug!(%owner, subpath, "shape cache hit");
            return Ok((
                shape.clone(),
                Trace {
                    through: self.cache.dependencies(owner, subpath),
                    cacheable: true,
                },
            ));
        }
        if chain.len() >= self.config.max_depth {
            return Err(EngineError::DepthExceeded {
                limit: self.config.max_depth,
                chain: render_chain(doc, chain, owner),
            });
        }
        let object = doc
            .object(owner)
            .ok_or(EngineError::ObjectNotFound { id: owner })?;

        chain.push(owner);
        let (shape, mut trace) = match object.resolve(subpath) {
            Some(link) => {
                // Hidden members drop out of their group.
                if link.visibility_dependent
                    && !doc.object(link.target).is_some_and(|o| o.is_visible())
                {
                    return Err(EngineError::NoShape { id: link.target });
                }
                let (shape, mut trace) = self.resolve(doc, link.target, &link.remainder, chain)?;
                if link.visibility_dependent {
                    trace.cacheable = false;
                }
                let shape = match &link.placement {
                    Some(placement) => shape.relocated(placement),
                    None => shape,
                };
                (shape, trace)
            }
            None => {
                let mut shape = object.shape().ok_or(EngineError::NoShape { id: owner })?;
                if shape.hasher().is_none() {
                    shape.set_hasher(Some(doc.string_hasher()));
                }
                let shape = if subpath.is_empty() {
                    shape
                } else {
                    element_shape(&shape, owner, subpath)?
                };
                (
                    shape,
                    Trace {
                        through: Vec::new(),
                        cacheable: true,
                    },
                )
            }
        };
        chain.pop();

        trace.through.push(owner);
        self.cache.put(
            owner,
            subpath,
            shape.clone(),
            trace.cacheable,
            &trace.through,
        );
        Ok((shape, trace))
    }
}

fn element_shape(shape: &TopoShape, owner: ObjectId, element: &str) -> Result<TopoShape, EngineError> {
    let not_found = || EngineError::ElementNotFound {
        id: owner,
        element: element.to_string(),
    };
    let index = shape.find_sub_shape(element).ok_or_else(not_found)?;
    shape.sub_shape(index).map_err(|_| not_found())
}

// Labels of the objects on the chain, ending with the one that overflowed.
fn render_chain(doc: &dyn Document, chain: &[ObjectId], last: ObjectId) -> String {
    chain
        .iter()
        .chain(std::iter::once(&last))
        .map(|id| match doc.object(*id) {
            Some(object) => object.label().to_string(),
            None => id.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
