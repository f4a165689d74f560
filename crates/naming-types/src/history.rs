//! Decoding of the provenance chain embedded in a [`MappedName`].
//!
//! Names grow at the end: every operation appends one step, so the last step
//! of the text is the most recent operation. Decoding walks the segments
//! forward and reports the steps newest first. Composite steps record further
//! source names; each of those is decoded as an independent branch.

use serde::{Deserialize, Serialize};

use crate::hasher::{HasherRef, StringId};
use crate::mapped::{
    parse_tag, split_group_entries, split_segments, MappedName, Marker, StepIndex,
    ELEMENT_SEPARATOR, HASH_PREFIX,
};

/// Default bound on nested branch decoding.
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// Errors from decoding a name's history.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    #[error("history of {name:?} nests deeper than {depth} levels")]
    DepthExceeded { depth: usize, name: String },

    #[error("malformed element name {name:?}: {reason}")]
    Malformed { name: String, reason: String },
}

/// One decoded naming step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStep {
    pub marker: Marker,
    pub index: StepIndex,
    pub op: Option<String>,
    /// Tag of the shape produced by this step, if recorded.
    pub tag: Option<i64>,
    /// Decoded secondary sources of a composite step, in recorded order.
    pub sources: Vec<NameHistory>,
    /// Hashed group id that could not be expanded (no or foreign hasher).
    pub unresolved: Option<StringId>,
    /// Duplicate counter the map appended after this step.
    pub duplicate: Option<u32>,
}

/// The decoded chain of a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameHistory {
    /// The name at the bottom of the chain, before any step.
    pub original: MappedName,
    /// Tag of the shape that owned `original`, when recorded.
    pub origin_tag: Option<i64>,
    /// Steps, most recent first.
    pub steps: Vec<HistoryStep>,
    /// Duplicate counter appended to `original` before any step.
    pub duplicate: Option<u32>,
}

impl NameHistory {
    /// Producing tags, most recent first.
    pub fn tags(&self) -> Vec<i64> {
        self.steps.iter().filter_map(|s| s.tag).collect()
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.steps.iter().map(|s| s.marker).collect()
    }

    pub fn ops(&self) -> Vec<&str> {
        self.steps.iter().filter_map(|s| s.op.as_deref()).collect()
    }

    /// True if some step recorded sources from more than one input.
    pub fn is_composite(&self) -> bool {
        self.steps
            .iter()
            .any(|s| !s.sources.is_empty() || s.unresolved.is_some())
    }
}

/// Decode the full history of `name`.
///
/// `hasher` expands hashed composite groups; without it those steps report
/// the raw id in [`HistoryStep::unresolved`].
pub fn decode_history(
    name: &MappedName,
    hasher: Option<&HasherRef>,
    max_depth: usize,
) -> Result<NameHistory, HistoryError> {
    decode_at(name.as_str(), hasher, 0, max_depth)
}

fn malformed(name: &str, reason: impl Into<String>) -> HistoryError {
    HistoryError::Malformed {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn decode_at(
    text: &str,
    hasher: Option<&HasherRef>,
    depth: usize,
    max_depth: usize,
) -> Result<NameHistory, HistoryError> {
    if depth > max_depth {
        return Err(HistoryError::DepthExceeded {
            depth: max_depth,
            name: text.to_string(),
        });
    }

    let segments = split_segments(text);
    let first_control = segments
        .iter()
        .skip(1)
        .position(|seg| seg.starts_with(':'))
        .map(|p| p + 1)
        .unwrap_or(segments.len());

    let original = segments[..first_control].join(&ELEMENT_SEPARATOR.to_string());
    let mut history = NameHistory {
        original: MappedName::from(original),
        origin_tag: None,
        steps: Vec::new(),
        duplicate: None,
    };

    let mut current: Option<HistoryStep> = None;
    for seg in &segments[first_control..] {
        if let Some(tag) = seg.strip_prefix(":H") {
            let tag = parse_tag(tag).ok_or_else(|| malformed(text, format!("bad tag {seg:?}")))?;
            match current.as_mut() {
                Some(step) if step.tag.is_none() => step.tag = Some(tag),
                None if history.steps.is_empty() && history.origin_tag.is_none() => {
                    history.origin_tag = Some(tag)
                }
                _ => return Err(malformed(text, format!("unexpected tag {seg:?}"))),
            }
        } else if let Some(counter) = seg.strip_prefix(":D") {
            let counter = counter
                .parse()
                .map_err(|_| malformed(text, format!("bad duplicate counter {seg:?}")))?;
            // A counter belongs to the step it follows; later steps may
            // build on the disambiguated name.
            let slot = match current.as_mut() {
                Some(step) => &mut step.duplicate,
                None => &mut history.duplicate,
            };
            if slot.replace(counter).is_some() {
                return Err(malformed(text, format!("repeated duplicate counter {seg:?}")));
            }
        } else if let Some(body) = seg.strip_prefix(':') {
            if let Some(step) = current.take() {
                history.steps.push(step);
            }
            current = Some(decode_step(text, body, hasher, depth, max_depth)?);
        } else {
            match current.as_mut() {
                Some(step) if step.op.is_none() && step.tag.is_none() => {
                    step.op = Some(seg.to_string())
                }
                _ => return Err(malformed(text, format!("unexpected segment {seg:?}"))),
            }
        }
    }
    if let Some(step) = current.take() {
        history.steps.push(step);
    }
    history.steps.reverse();
    Ok(history)
}

fn decode_step(
    text: &str,
    body: &str,
    hasher: Option<&HasherRef>,
    depth: usize,
    max_depth: usize,
) -> Result<HistoryStep, HistoryError> {
    let (marker, rest) =
        Marker::parse_prefix(body).ok_or_else(|| malformed(text, format!("unknown marker {body:?}")))?;
    let split = rest.find(['(', HASH_PREFIX]).unwrap_or(rest.len());
    let (index_text, group) = rest.split_at(split);
    let index = StepIndex::parse(index_text)
        .ok_or_else(|| malformed(text, format!("bad index {index_text:?}")))?;

    let mut step = HistoryStep {
        marker,
        index,
        op: None,
        tag: None,
        sources: Vec::new(),
        unresolved: None,
        duplicate: None,
    };

    let inline = if let Some(hex) = group.strip_prefix(HASH_PREFIX) {
        let id = u32::from_str_radix(hex, 16)
            .map(StringId)
            .map_err(|_| malformed(text, format!("bad hash id {hex:?}")))?;
        match hasher.and_then(|h| h.lookup(id)) {
            Some(expanded) => Some(expanded),
            None => {
                step.unresolved = Some(id);
                None
            }
        }
    } else if group.is_empty() {
        None
    } else {
        Some(group.to_string())
    };

    if let Some(inline) = inline {
        let inner = inline
            .strip_prefix('(')
            .and_then(|g| g.strip_suffix(')'))
            .ok_or_else(|| malformed(text, format!("bad source group {inline:?}")))?;
        for entry in split_group_entries(inner) {
            let (_, source) = entry
                .split_once(':')
                .ok_or_else(|| malformed(text, format!("bad group entry {entry:?}")))?;
            step.sources
                .push(decode_at(source, hasher, depth + 1, max_depth)?);
        }
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapped::{group_text, NameStep, SourceGroup};

    fn step<'a>(marker: Marker, index: StepIndex, op: &'a str, tag: i64) -> NameStep<'a> {
        NameStep {
            marker,
            index,
            group: SourceGroup::None,
            op: Some(op),
            tag,
        }
    }

    #[test]
    fn chained_steps_decode_newest_first() {
        let name = MappedName::new("Edge3")
            .with_tag(4)
            .with_step(&step(Marker::Generated, StepIndex::Coplanar, "Extrude", 5))
            .with_step(&step(Marker::Modified, StepIndex::Counter(2), "Fillet", 9));

        let history = decode_history(&name, None, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(history.original.as_str(), "Edge3");
        assert_eq!(history.origin_tag, Some(4));
        assert_eq!(history.tags(), vec![9, 5]);
        assert_eq!(history.ops(), vec!["Fillet", "Extrude"]);
        assert_eq!(history.markers(), vec![Marker::Modified, Marker::Generated]);
        assert_eq!(history.steps[1].index, StepIndex::Coplanar);
    }

    #[test]
    fn plain_name_has_no_history() {
        let history = decode_history(&MappedName::new("Face1"), None, 4).unwrap();
        assert_eq!(history.original.as_str(), "Face1");
        assert!(history.steps.is_empty());
        assert_eq!(history.origin_tag, None);
    }

    #[test]
    fn composite_branches_decode_independently() {
        let other = MappedName::new("Face2")
            .with_tag(3)
            .with_step(&step(Marker::Modified, StepIndex::None, "Cut", 6));
        let group = group_text(&[other, MappedName::new("Edge9")]);
        let name = MappedName::new("Face1").with_step(&NameStep {
            marker: Marker::ModGen,
            index: StepIndex::None,
            group: SourceGroup::Inline(group),
            op: Some("Fuse"),
            tag: 8,
        });

        let history = decode_history(&name, None, DEFAULT_MAX_DEPTH).unwrap();
        assert!(history.is_composite());
        let fuse = &history.steps[0];
        assert_eq!(fuse.sources.len(), 2);
        assert_eq!(fuse.sources[0].original.as_str(), "Face2");
        assert_eq!(fuse.sources[0].tags(), vec![6]);
        assert_eq!(fuse.sources[0].origin_tag, Some(3));
        assert_eq!(fuse.sources[1].original.as_str(), "Edge9");
    }

    #[test]
    fn hashed_group_needs_hasher() {
        let hasher = HasherRef::new();
        let id = hasher.intern(&group_text(&[MappedName::new("Edge2")]));
        let name = MappedName::new("Edge1").with_step(&NameStep {
            marker: Marker::Lower,
            index: StepIndex::None,
            group: SourceGroup::Hashed(id),
            op: Some("Pad"),
            tag: 0,
        });

        let blind = decode_history(&name, None, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(blind.steps[0].unresolved, Some(id));
        assert!(blind.steps[0].sources.is_empty());

        let seen = decode_history(&name, Some(&hasher), DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(seen.steps[0].sources[0].original.as_str(), "Edge2");
    }

    #[test]
    fn depth_limit_is_fatal() {
        let mut name = MappedName::new("Vertex1");
        for _ in 0..4 {
            let group = group_text(&[name.clone()]);
            name = MappedName::new("Vertex1").with_step(&NameStep {
                marker: Marker::Generated,
                index: StepIndex::None,
                group: SourceGroup::Inline(group),
                op: Some("Op"),
                tag: 0,
            });
        }
        assert!(decode_history(&name, None, 10).is_ok());
        assert!(matches!(
            decode_history(&name, None, 2),
            Err(HistoryError::DepthExceeded { .. })
        ));
    }

    #[test]
    fn duplicate_counter_is_reported() {
        let name = MappedName::new("Face1;:M;Fuse;:D2");
        let history = decode_history(&name, None, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(history.duplicate, None);
        assert_eq!(history.steps[0].duplicate, Some(2));
        assert_eq!(history.ops(), vec!["Fuse"]);
    }

    #[test]
    fn steps_after_a_duplicate_counter_decode() {
        let name = MappedName::new("X;:D1")
            .with_step(&step(Marker::Modified, StepIndex::None, "Cut", 5));
        assert_eq!(name.as_str(), "X;:D1;:M;Cut;:H5");
        let history = decode_history(&name, None, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(history.original.as_str(), "X");
        assert_eq!(history.duplicate, Some(1));
        assert_eq!(history.ops(), vec!["Cut"]);
        assert_eq!(history.tags(), vec![5]);

        let deeper = MappedName::new("Edge1;:H4;:D1;:GC;Extrude;:H9;:D2;:U3;:U2");
        let history = decode_history(&deeper, None, DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(history.origin_tag, Some(4));
        assert_eq!(history.duplicate, Some(1));
        assert_eq!(history.steps.len(), 3);
        assert_eq!(history.steps[2].op.as_deref(), Some("Extrude"));
        assert_eq!(history.steps[2].duplicate, Some(2));
        assert_eq!(history.tags(), vec![9]);
    }

    #[test]
    fn repeated_duplicate_counter_is_malformed() {
        let name = MappedName::new("Face1;:M;Fuse;:D1;:D2");
        assert!(matches!(
            decode_history(&name, None, DEFAULT_MAX_DEPTH),
            Err(HistoryError::Malformed { .. })
        ));
    }

    #[test]
    fn stray_segment_is_malformed() {
        let name = MappedName::new("Face1;:H1;:H2");
        assert!(matches!(
            decode_history(&name, None, DEFAULT_MAX_DEPTH),
            Err(HistoryError::Malformed { .. })
        ));
    }
}
