use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::hasher::StringId;

/// Separates postfix segments of an encoded name.
pub const ELEMENT_SEPARATOR: char = ';';
/// Owning tag segment, followed by the tag in hex.
pub const TAG_POSTFIX: &str = ";:H";
/// Appended by [`crate::ElementMap::set_name`] when a name is already taken.
pub const DUPLICATE_POSTFIX: &str = ";:D";
/// Introduces a hasher id in place of a composite source group.
pub const HASH_PREFIX: char = '#';

/// Provenance marker of one naming step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    Generated,
    Modified,
    /// Bucket mixing modified and generated sources.
    ModGen,
    /// Derived from a named higher-level entity.
    Upper,
    /// Derived from named lower-level entities.
    Lower,
}

impl Marker {
    pub fn code(self) -> &'static str {
        match self {
            Marker::Generated => "G",
            Marker::Modified => "M",
            Marker::ModGen => "MG",
            Marker::Upper => "U",
            Marker::Lower => "L",
        }
    }

    /// Split a control segment body (without the leading ':') into marker and rest.
    pub(crate) fn parse_prefix(body: &str) -> Option<(Marker, &str)> {
        // "MG" must be tried before "M".
        const ORDER: [Marker; 5] = [
            Marker::ModGen,
            Marker::Modified,
            Marker::Generated,
            Marker::Upper,
            Marker::Lower,
        ];
        ORDER
            .into_iter()
            .find_map(|m| body.strip_prefix(m.code()).map(|rest| (m, rest)))
    }
}

/// Disambiguation index of a naming step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepIndex {
    None,
    Counter(u32),
    /// Reserved: output lies in the plane of its single source.
    Coplanar,
    /// Reserved: output is parallel to its single source.
    Parallel,
}

impl fmt::Display for StepIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepIndex::None => Ok(()),
            StepIndex::Counter(n) => write!(f, "{n}"),
            StepIndex::Coplanar => f.write_str("C"),
            StepIndex::Parallel => f.write_str("P"),
        }
    }
}

impl StepIndex {
    pub(crate) fn parse(text: &str) -> Option<StepIndex> {
        match text {
            "" => Some(StepIndex::None),
            "C" => Some(StepIndex::Coplanar),
            "P" => Some(StepIndex::Parallel),
            digits => digits.parse().ok().map(StepIndex::Counter),
        }
    }
}

/// Secondary sources recorded by a composite step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceGroup {
    None,
    /// Rendered inline as `(1:name,2:name)`.
    Inline(String),
    /// The inline text was interned; only the id is embedded.
    Hashed(StringId),
}

/// Everything appended to a name by one naming step.
#[derive(Debug, Clone)]
pub struct NameStep<'a> {
    pub marker: Marker,
    pub index: StepIndex,
    pub group: SourceGroup,
    pub op: Option<&'a str>,
    pub tag: i64,
}

/// Persistent element name. Immutable and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MappedName(Arc<str>);

impl MappedName {
    pub fn new(text: &str) -> Self {
        Self(Arc::from(text))
    }

    pub fn empty() -> Self {
        Self::new("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn append(&self, postfix: &str) -> MappedName {
        let mut text = String::with_capacity(self.0.len() + postfix.len());
        text.push_str(&self.0);
        text.push_str(postfix);
        MappedName(Arc::from(text))
    }

    /// True if any top-level segment records an owning tag.
    pub fn has_tag(&self) -> bool {
        split_segments(&self.0)
            .iter()
            .skip(1)
            .any(|seg| seg.starts_with(":H"))
    }

    pub fn with_tag(&self, tag: i64) -> MappedName {
        self.append(&format!("{TAG_POSTFIX}{}", format_tag(tag)))
    }

    /// Append one naming step.
    pub fn with_step(&self, step: &NameStep<'_>) -> MappedName {
        let mut postfix = format!(";:{}{}", step.marker.code(), step.index);
        match &step.group {
            SourceGroup::None => {}
            SourceGroup::Inline(text) => postfix.push_str(text),
            SourceGroup::Hashed(id) => {
                postfix.push(HASH_PREFIX);
                postfix.push_str(&id.to_string());
            }
        }
        if let Some(op) = step.op {
            postfix.push(ELEMENT_SEPARATOR);
            postfix.push_str(op);
        }
        if step.tag != 0 {
            postfix.push_str(TAG_POSTFIX);
            postfix.push_str(&format_tag(step.tag));
        }
        self.append(&postfix)
    }

    /// Drop hashed group references, keeping the rest of the name.
    ///
    /// Used when a name must move to a map whose hasher cannot resolve the ids.
    pub fn strip_hashed(&self) -> MappedName {
        let segments = split_segments(&self.0);
        let mut out = String::with_capacity(self.0.len());
        for (i, seg) in segments.iter().enumerate() {
            if i > 0 {
                out.push(ELEMENT_SEPARATOR);
            }
            match seg.strip_prefix(':').and_then(|body| body.find(HASH_PREFIX)) {
                Some(pos) if i > 0 => out.push_str(&seg[..pos + 1]),
                _ => out.push_str(seg),
            }
        }
        MappedName::new(&out)
    }
}

impl fmt::Display for MappedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for MappedName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MappedName {
    fn from(text: &str) -> Self {
        MappedName::new(text)
    }
}

impl From<String> for MappedName {
    fn from(text: String) -> Self {
        MappedName(Arc::from(text))
    }
}

impl Serialize for MappedName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for MappedName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(MappedName::from)
    }
}

/// Ordered set of hasher ids referenced by a name's hashed fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementIdRefs(Vec<StringId>);

impl ElementIdRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: StringId) {
        if let Err(pos) = self.0.binary_search(&id) {
            self.0.insert(pos, id);
        }
    }

    pub fn extend(&mut self, other: &ElementIdRefs) {
        for id in &other.0 {
            self.insert(*id);
        }
    }

    pub fn contains(&self, id: StringId) -> bool {
        self.0.binary_search(&id).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = StringId> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<StringId> for ElementIdRefs {
    fn from_iter<I: IntoIterator<Item = StringId>>(iter: I) -> Self {
        let mut refs = ElementIdRefs::new();
        for id in iter {
            refs.insert(id);
        }
        refs
    }
}

pub fn format_tag(tag: i64) -> String {
    if tag < 0 {
        format!("-{:x}", tag.unsigned_abs())
    } else {
        format!("{tag:x}")
    }
}

pub fn parse_tag(text: &str) -> Option<i64> {
    match text.strip_prefix('-') {
        Some(rest) => i64::from_str_radix(rest, 16).ok().map(|t| -t),
        None => i64::from_str_radix(text, 16).ok(),
    }
}

/// Render composite sources as `(1:a,2:b)`; positions start at 1.
pub fn group_text(sources: &[MappedName]) -> String {
    let entries: Vec<String> = sources
        .iter()
        .enumerate()
        .map(|(k, name)| format!("{}:{}", k + 1, name))
        .collect();
    format!("({})", entries.join(","))
}

/// Split on `sep` at parenthesis depth 0.
fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == sep && depth == 0 => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

pub(crate) fn split_segments(text: &str) -> Vec<&str> {
    split_top_level(text, ELEMENT_SEPARATOR)
}

/// Split the inside of a `(...)` group into its entries.
pub(crate) fn split_group_entries(inner: &str) -> Vec<&str> {
    if inner.is_empty() {
        return Vec::new();
    }
    split_top_level(inner, ',')
}
