/// Configuration of the element map builder.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Keep every upper-derived name of an element shared by several
    /// parents instead of only the lexicographically first.
    pub keep_upper_multiplicity: bool,
    /// Distance tolerance for the coplanar/parallel classification.
    pub tolerance: f64,
    /// Angular tolerance for the coplanar/parallel classification.
    pub angular_tolerance: f64,
    /// Bound on nested source name decoding.
    pub max_depth: usize,
    /// Intern composite source groups into the hasher when one is available.
    pub hash_composites: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            keep_upper_multiplicity: false,
            tolerance: 1e-7,
            angular_tolerance: 1e-9,
            max_depth: naming_types::DEFAULT_MAX_DEPTH,
            hash_composites: true,
        }
    }
}

impl BuilderConfig {
    /// Retain every upper-derived name (edges shared by two faces get both).
    pub fn full_fidelity() -> Self {
        Self {
            keep_upper_multiplicity: true,
            ..Self::default()
        }
    }

    /// Always write composite groups inline, even with a hasher present.
    pub fn without_hashing() -> Self {
        Self {
            hash_composites: false,
            ..Self::default()
        }
    }
}
