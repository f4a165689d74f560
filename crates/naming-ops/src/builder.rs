//! The element map builder: names the elements of an operation's output from
//! the names of its inputs and the kernel's correspondence report.
//!
//! Order of work:
//! 1. Literal carry-over: input elements present unchanged in the output keep
//!    their names.
//! 2. Correspondence pass: generated/modified targets are bucketed per output
//!    element and named after their sources. Targets reported at a coarser
//!    kind are exploded into delayed, lower-priority buckets.
//! 3. Upper->lower (`;:U`) and lower->upper (`;:L`) propagation, repeated until
//!    everything is named or a pass makes no progress. Delayed buckets are
//!    consumed once propagation stalls.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use naming_types::{
    decode_history, group_text, ElementIdRefs, ElementMap, HasherRef, HistoryError, IndexedName,
    MappedName, Marker, NameStep, ShapeKind, SourceGroup, StepIndex,
};
use shape_kernel::{relation, Mapper, Relation, ShapeIndexCache, TopoShape};
use tracing::{debug, info, instrument};

use crate::config::BuilderConfig;
use crate::types::{BuildReport, Diagnostics, NamingError, ShapeRole};

/// Characters with structural meaning inside encoded names.
const RESERVED: [char; 5] = [';', '(', ')', ',', '#'];

/// Check that `op` can be embedded in a name.
pub fn validate_op(op: &str) -> Result<(), NamingError> {
    let invalid = |reason: String| NamingError::InvalidOpCode {
        op: op.to_string(),
        reason,
    };
    if op.is_empty() {
        return Err(invalid("empty".into()));
    }
    if op.starts_with(':') {
        return Err(invalid("starts with ':'".into()));
    }
    if let Some(c) = op.chars().find(|c| RESERVED.contains(c)) {
        return Err(invalid(format!("contains reserved character {c:?}")));
    }
    Ok(())
}

/// Name the elements of `output` using the default configuration.
pub fn make_element_map(
    output: &mut TopoShape,
    mapper: &dyn Mapper,
    inputs: &[TopoShape],
    op: &str,
) -> Result<BuildReport, NamingError> {
    ElementMapBuilder::default().build(output, mapper, inputs, op)
}

/// Synthesizes the element map of an operation's output.
#[derive(Debug, Clone, Default)]
pub struct ElementMapBuilder {
    config: BuilderConfig,
}

impl ElementMapBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Replace the element map of `output` with one derived from `inputs`.
    ///
    /// Null output or input shapes are fatal and leave `output` untouched.
    /// Elements that cannot be named keep only their indexed name.
    #[instrument(skip(self, output, mapper, inputs), fields(inputs = inputs.len()))]
    pub fn build(
        &self,
        output: &mut TopoShape,
        mapper: &dyn Mapper,
        inputs: &[TopoShape],
        op: &str,
    ) -> Result<BuildReport, NamingError> {
        let cache = output.index_cache().ok_or(NamingError::NullShape {
            role: ShapeRole::Output,
        })?;
        if let Some(position) = inputs.iter().position(TopoShape::is_null) {
            return Err(NamingError::NullShape {
                role: ShapeRole::Input { position },
            });
        }
        validate_op(op)?;

        let hasher = output
            .hasher()
            .cloned()
            .or_else(|| inputs.iter().find_map(|input| input.hasher().cloned()));
        if output.hasher().is_none() {
            output.set_hasher(hasher.clone());
        }
        let mut map = ElementMap::new(output.kernel_version());
        map.set_hasher(hasher.clone());

        let mut run = Run {
            config: &self.config,
            op,
            tag: output.tag(),
            hasher,
            cache,
            map,
            diagnostics: Diagnostics::default(),
        };

        run.carry_literal(inputs);
        let (exact, delayed) = run.collect(mapper, inputs);
        run.name_buckets(&exact, inputs)?;

        let mut passes = 1;
        let mut delayed = Some(delayed);
        while run.unnamed() > 0 {
            passes += 1;
            let progress = run.upper_to_lower() + run.lower_to_upper()?;
            if progress > 0 {
                continue;
            }
            match delayed.take() {
                Some(buckets) if !buckets.is_empty() => {
                    debug!(buckets = buckets.len(), "consuming delayed correspondences");
                    if run.name_buckets(&buckets, inputs)? == 0 {
                        break;
                    }
                }
                _ => break,
            }
        }

        let unnamed = run.unnamed();
        let total: usize = ShapeKind::ELEMENTS
            .iter()
            .map(|&kind| run.cache.count_of(kind))
            .sum();
        let named = total - unnamed;
        info!(op, named, unnamed, passes, "element map built");

        output.set_element_map(run.map);
        Ok(BuildReport {
            named,
            unnamed,
            passes,
            diagnostics: run.diagnostics,
        })
    }
}

/// One named input element feeding an output element.
#[derive(Debug, Clone)]
struct Source {
    kind: ShapeKind,
    input: usize,
    tag: i64,
    /// Index of the source element in its input.
    element: IndexedName,
    name: MappedName,
    refs: ElementIdRefs,
    generated: bool,
}

impl Source {
    fn sort_key(&self) -> (u8, i64, &str, usize) {
        (self.kind.rank(), self.tag, self.name.as_str(), self.input)
    }
}

type Buckets = BTreeMap<IndexedName, Vec<Source>>;

/// A bucket ready to be named, before its disambiguation index is known.
struct Plan {
    target: IndexedName,
    first: MappedName,
    marker: Marker,
    group: SourceGroup,
    refs: ElementIdRefs,
    relation: Option<Relation>,
    index: StepIndex,
}

/// State of one build.
struct Run<'a> {
    config: &'a BuilderConfig,
    op: &'a str,
    tag: i64,
    hasher: Option<HasherRef>,
    cache: Rc<ShapeIndexCache>,
    map: ElementMap,
    diagnostics: Diagnostics,
}

impl Run<'_> {
    fn step(&self, marker: Marker, index: StepIndex, group: SourceGroup) -> NameStep<'_> {
        NameStep {
            marker,
            index,
            group,
            op: Some(self.op),
            tag: self.tag,
        }
    }

    /// Bring a name from `input` into the output's naming context.
    ///
    /// Hashed fragments interned by a foreign hasher are dropped. A name
    /// crossing from a differently tagged input records its origin tag.
    fn import(
        &mut self,
        position: usize,
        input: &TopoShape,
        name: &MappedName,
        refs: &ElementIdRefs,
    ) -> (MappedName, ElementIdRefs) {
        let foreign = !refs.is_empty()
            && match (input.element_map().hasher(), &self.hasher) {
                (Some(theirs), Some(ours)) => !theirs.same_as(ours),
                (Some(_), None) => true,
                (None, _) => false,
            };
        let (mut name, refs) = if foreign {
            self.diagnostics.warn(format!(
                "{}: dropping hashed fragments of {name} from input {position}: different string hasher",
                self.op
            ));
            (name.strip_hashed(), ElementIdRefs::new())
        } else {
            (name.clone(), refs.clone())
        };
        let tag = input.tag();
        if tag != 0 && tag != self.tag && !name.has_tag() {
            name = name.with_tag(tag);
        }
        (name, refs)
    }

    fn carry_literal(&mut self, inputs: &[TopoShape]) {
        let mut carried = 0usize;
        for (position, input) in inputs.iter().enumerate() {
            let Some(input_cache) = input.index_cache() else {
                continue;
            };
            for (index, entries) in input.element_map().iter() {
                let Some(shape) = input_cache.element(index) else {
                    continue;
                };
                let found = self.cache.index_of(shape);
                if found == 0 {
                    continue;
                }
                let target = IndexedName::new(index.kind, found);
                for entry in entries {
                    let (name, refs) = self.import(position, input, &entry.name, &entry.refs);
                    if !self.map.set_name(target, name, refs).is_empty() {
                        carried += 1;
                    }
                }
            }
        }
        debug!(carried, "carried literal names");
    }

    fn collect(&mut self, mapper: &dyn Mapper, inputs: &[TopoShape]) -> (Buckets, Buckets) {
        let mut exact = Buckets::new();
        let mut delayed = Buckets::new();
        let cache = self.cache.clone();
        for (position, input) in inputs.iter().enumerate() {
            let Some(input_cache) = input.index_cache() else {
                continue;
            };
            for kind in ShapeKind::ELEMENTS {
                for (i, shape) in input_cache.shapes(kind).iter().enumerate() {
                    let element = IndexedName::new(kind, i as u32 + 1);
                    let Some(entry) = input.element_map().names(element).first() else {
                        continue;
                    };
                    let (name, refs) = self.import(position, input, &entry.name, &entry.refs);
                    let source = Source {
                        kind,
                        input: position,
                        tag: input.tag(),
                        element,
                        name,
                        refs,
                        generated: false,
                    };
                    let reports = [(mapper.modified(shape), false), (mapper.generated(shape), true)];
                    for (targets, generated) in reports {
                        for target in targets {
                            let source = Source {
                                generated,
                                ..source.clone()
                            };
                            let found = cache.index_of(&target);
                            if found == 0 {
                                self.diagnostics.warn(format!(
                                    "{}: {} reported for {element} of input {position} is not part of the output",
                                    self.op, target.kind
                                ));
                                continue;
                            }
                            if target.kind.is_element() {
                                self.add(&mut exact, IndexedName::new(target.kind, found), source);
                            } else {
                                for part in cache.descendants(&target, kind) {
                                    let found = cache.index_of(&part);
                                    if found > 0 {
                                        self.add(
                                            &mut delayed,
                                            IndexedName::new(kind, found),
                                            source.clone(),
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        for bucket in exact.values_mut().chain(delayed.values_mut()) {
            bucket.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        }
        debug!(exact = exact.len(), delayed = delayed.len(), "collected correspondences");
        (exact, delayed)
    }

    fn add(&mut self, buckets: &mut Buckets, target: IndexedName, source: Source) {
        let bucket = buckets.entry(target).or_default();
        match bucket
            .iter_mut()
            .find(|s| s.input == source.input && s.name == source.name)
        {
            Some(existing) if existing.generated != source.generated => {
                self.diagnostics.warn(format!(
                    "{}: {target} is both generated and modified from {}; treating it as generated",
                    self.op, source.name
                ));
                existing.generated = true;
            }
            Some(_) => {}
            None => bucket.push(source),
        }
    }

    /// Name every still unnamed bucket target. Returns how many got a name.
    fn name_buckets(&mut self, buckets: &Buckets, inputs: &[TopoShape]) -> Result<usize, NamingError> {
        let mut plans = Vec::new();
        for (&target, sources) in buckets {
            if sources.is_empty() || self.map.is_named(target) {
                continue;
            }
            plans.push(self.plan(target, sources, inputs)?);
        }
        self.assign_indices(&mut plans);

        let mut named = 0;
        for plan in plans {
            let step = self.step(plan.marker, plan.index, plan.group);
            let name = plan.first.with_step(&step);
            if !self.map.set_name(plan.target, name, plan.refs).is_empty() {
                named += 1;
            }
        }
        Ok(named)
    }

    fn plan(
        &self,
        target: IndexedName,
        sources: &[Source],
        inputs: &[TopoShape],
    ) -> Result<Plan, NamingError> {
        let generated = sources.iter().filter(|s| s.generated).count();
        let marker = if generated == sources.len() {
            Marker::Generated
        } else if generated == 0 {
            Marker::Modified
        } else {
            Marker::ModGen
        };
        let relation = match sources {
            [single] if single.generated => self.relation_of(single, target, inputs),
            _ => None,
        };

        let mut refs = ElementIdRefs::new();
        for source in sources {
            refs.extend(&source.refs);
        }
        let rest: Vec<MappedName> = sources[1..].iter().map(|s| s.name.clone()).collect();
        let group = self.source_group(target, &rest, &mut refs)?;
        Ok(Plan {
            target,
            first: sources[0].name.clone(),
            marker,
            group,
            refs,
            relation,
            index: StepIndex::None,
        })
    }

    fn relation_of(&self, source: &Source, target: IndexedName, inputs: &[TopoShape]) -> Option<Relation> {
        let input = inputs.get(source.input)?;
        let from = input.element(source.element)?;
        let from = input.geometry(&from)?;
        let to = self.cache.element(target)?;
        let to = self.cache.topology().geometry(to)?;
        relation(&from, &to, self.config.tolerance, self.config.angular_tolerance)
    }

    /// Fixed coplanar/parallel indices where they are unambiguous, counters
    /// (in output index order) for everything else sharing a base name.
    fn assign_indices(&self, plans: &mut [Plan]) {
        let bases: Vec<(MappedName, ShapeKind)> = plans
            .iter()
            .map(|plan| {
                let step = self.step(plan.marker, StepIndex::None, plan.group.clone());
                (plan.first.with_step(&step), plan.target.kind)
            })
            .collect();

        let mut related: HashMap<(&MappedName, ShapeKind, Relation), usize> = HashMap::new();
        for (plan, (base, kind)) in plans.iter().zip(&bases) {
            if let Some(rel) = plan.relation {
                *related.entry((base, *kind, rel)).or_default() += 1;
            }
        }
        let mut fixed = vec![false; plans.len()];
        for (i, (plan, (base, kind))) in plans.iter_mut().zip(&bases).enumerate() {
            if let Some(rel) = plan.relation {
                if related.get(&(base, *kind, rel)) == Some(&1) {
                    plan.index = match rel {
                        Relation::Coplanar => StepIndex::Coplanar,
                        Relation::Parallel => StepIndex::Parallel,
                    };
                    fixed[i] = true;
                }
            }
        }

        let mut sizes: HashMap<(&MappedName, ShapeKind), u32> = HashMap::new();
        for (i, (base, kind)) in bases.iter().enumerate() {
            if !fixed[i] {
                *sizes.entry((base, *kind)).or_default() += 1;
            }
        }
        let mut next: HashMap<(&MappedName, ShapeKind), u32> = HashMap::new();
        for (i, (plan, (base, kind))) in plans.iter_mut().zip(&bases).enumerate() {
            if fixed[i] || sizes.get(&(base, *kind)).copied().unwrap_or(0) < 2 {
                continue;
            }
            let counter = next.entry((base, *kind)).or_default();
            *counter += 1;
            plan.index = StepIndex::Counter(*counter);
        }
    }

    /// Render secondary sources as a group, interning it when configured.
    fn source_group(
        &self,
        target: IndexedName,
        names: &[MappedName],
        refs: &mut ElementIdRefs,
    ) -> Result<SourceGroup, NamingError> {
        if names.is_empty() {
            return Ok(SourceGroup::None);
        }
        for name in names {
            self.check_depth(target, name)?;
        }
        let text = group_text(names);
        Ok(match (&self.hasher, self.config.hash_composites) {
            (Some(hasher), true) => {
                let id = hasher.intern(&text);
                refs.insert(id);
                SourceGroup::Hashed(id)
            }
            _ => SourceGroup::Inline(text),
        })
    }

    // Names are opaque to the builder; only runaway nesting is an error.
    fn check_depth(&self, target: IndexedName, name: &MappedName) -> Result<(), NamingError> {
        match decode_history(name, self.hasher.as_ref(), self.config.max_depth) {
            Err(HistoryError::DepthExceeded { depth, name: deepest }) => {
                Err(NamingError::DepthExceeded {
                    limit: depth,
                    chain: format!("{target} -> {name} -> ... -> {deepest}"),
                })
            }
            Ok(_) | Err(HistoryError::Malformed { .. }) => Ok(()),
        }
    }

    /// Name unnamed edges from their faces, then unnamed vertices from their
    /// edges. Returns how many elements got a name.
    fn upper_to_lower(&mut self) -> usize {
        let cache = self.cache.clone();
        let mut named = 0;
        for (upper, lower) in [(ShapeKind::Face, ShapeKind::Edge), (ShapeKind::Edge, ShapeKind::Vertex)] {
            let mut candidates: BTreeMap<u32, Vec<(MappedName, ElementIdRefs)>> = BTreeMap::new();
            for (i, parent) in cache.shapes(upper).iter().enumerate() {
                let Some(entry) = self.map.names(IndexedName::new(upper, i as u32 + 1)).first() else {
                    continue;
                };
                for (k, child) in cache.descendants(parent, lower).iter().enumerate() {
                    let index = cache.index_of(child);
                    if index == 0 || self.map.is_named(IndexedName::new(lower, index)) {
                        continue;
                    }
                    let name = entry.name.with_step(&NameStep {
                        marker: Marker::Upper,
                        index: StepIndex::Counter(k as u32 + 1),
                        group: SourceGroup::None,
                        op: None,
                        tag: 0,
                    });
                    candidates
                        .entry(index)
                        .or_default()
                        .push((name, entry.refs.clone()));
                }
            }

            let keep = if self.config.keep_upper_multiplicity {
                usize::MAX
            } else {
                1
            };
            for (index, mut names) in candidates {
                names.sort_by(|a, b| a.0.cmp(&b.0));
                names.dedup_by(|a, b| a.0 == b.0);
                let target = IndexedName::new(lower, index);
                let mut stored = false;
                for (name, refs) in names.into_iter().take(keep) {
                    stored |= !self.map.set_name(target, name, refs).is_empty();
                }
                if stored {
                    named += 1;
                }
            }
        }
        named
    }

    /// Name unnamed edges from their vertices, then unnamed faces from their
    /// edges, when every bounding element is named.
    fn lower_to_upper(&mut self) -> Result<usize, NamingError> {
        let cache = self.cache.clone();
        let mut named = 0;
        for (upper, lower) in [(ShapeKind::Edge, ShapeKind::Vertex), (ShapeKind::Face, ShapeKind::Edge)] {
            for (i, shape) in cache.shapes(upper).iter().enumerate() {
                let target = IndexedName::new(upper, i as u32 + 1);
                if self.map.is_named(target) {
                    continue;
                }
                let children = cache.descendants(shape, lower);
                if children.is_empty() {
                    continue;
                }
                let mut names = Vec::with_capacity(children.len());
                let mut refs = ElementIdRefs::new();
                for child in &children {
                    let index = IndexedName::new(lower, cache.index_of(child));
                    match self.map.names(index).first() {
                        Some(entry) => {
                            names.push(entry.name.clone());
                            refs.extend(&entry.refs);
                        }
                        None => break,
                    }
                }
                if names.len() < children.len() {
                    continue;
                }
                names.sort();
                let group = self.source_group(target, &names[1..], &mut refs)?;
                let step = self.step(Marker::Lower, StepIndex::None, group);
                let name = names[0].with_step(&step);
                if !self.map.set_name(target, name, refs).is_empty() {
                    named += 1;
                }
            }
        }
        Ok(named)
    }

    fn unnamed(&self) -> usize {
        ShapeKind::ELEMENTS
            .iter()
            .map(|&kind| {
                (1..=self.cache.count_of(kind) as u32)
                    .filter(|&i| !self.map.is_named(IndexedName::new(kind, i)))
                    .count()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_codes_are_validated() {
        assert!(validate_op("Fuse").is_ok());
        assert!(validate_op("Extrude-2").is_ok());
        for bad in ["", ":G", "a;b", "x(1)", "a,b", "h#1"] {
            assert!(
                matches!(validate_op(bad), Err(NamingError::InvalidOpCode { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
