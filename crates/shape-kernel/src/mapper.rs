use std::collections::HashMap;

use crate::traits::Mapper;
use crate::types::{PartnerId, ShapeKind, SubShape};

/// Correspondence report recorded while an operation runs.
///
/// Lookups ignore placement: any use of the same input entity hits the record.
#[derive(Debug, Clone, Default)]
pub struct RecordedMapper {
    generated: HashMap<(ShapeKind, PartnerId), Vec<SubShape>>,
    modified: HashMap<(ShapeKind, PartnerId), Vec<SubShape>>,
}

impl RecordedMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_generated(&mut self, input: &SubShape, output: SubShape) {
        push_unique(&mut self.generated, input, output);
    }

    pub fn record_modified(&mut self, input: &SubShape, output: SubShape) {
        push_unique(&mut self.modified, input, output);
    }

    pub fn is_empty(&self) -> bool {
        self.generated.is_empty() && self.modified.is_empty()
    }
}

fn push_unique(
    table: &mut HashMap<(ShapeKind, PartnerId), Vec<SubShape>>,
    input: &SubShape,
    output: SubShape,
) {
    let outputs = table.entry((input.kind, input.partner)).or_default();
    if !outputs.iter().any(|o| o.is_partner(&output)) {
        outputs.push(output);
    }
}

impl Mapper for RecordedMapper {
    fn generated(&self, input: &SubShape) -> Vec<SubShape> {
        self.generated
            .get(&(input.kind, input.partner))
            .cloned()
            .unwrap_or_default()
    }

    fn modified(&self, input: &SubShape) -> Vec<SubShape> {
        self.modified
            .get(&(input.kind, input.partner))
            .cloned()
            .unwrap_or_default()
    }
}

/// Report for operations with no correspondence at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMapping;

impl Mapper for NoMapping {
    fn generated(&self, _input: &SubShape) -> Vec<SubShape> {
        Vec::new()
    }

    fn modified(&self, _input: &SubShape) -> Vec<SubShape> {
        Vec::new()
    }
}
