//! Extension-specific build preparation.
//!
//! Most extensions build with a plain `make` against the resolved
//! `pg_config`. The exceptions live in one table keyed by extension name,
//! so supporting a new extension is a table edit, not a code change.

/// A preparatory step run in the source tree before the generic build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepStep {
    /// Clear host-specific compiler optimization flags so the produced
    /// binary runs on any CPU microarchitecture. Without this, an artifact
    /// built on a newer CPU faults with an illegal instruction elsewhere.
    SuppressOptFlags,
    /// `./autogen.sh` bootstrap for autotools trees.
    Autogen,
    /// `./configure` with the resolved pg_config.
    Configure,
    /// Generate build files with cmake in a dedicated `build/` subdirectory.
    CmakeConfigure,
}

const VARIANTS: &[(&str, &[PrepStep])] = &[
    ("pgvector", &[PrepStep::SuppressOptFlags]),
    ("postgis", &[PrepStep::Autogen, PrepStep::Configure]),
    ("pgrouting", &[PrepStep::CmakeConfigure]),
    ("h3-pg", &[PrepStep::CmakeConfigure]),
];

/// Prep steps for an extension, in execution order.
/// Unknown extensions get the plain build path.
pub fn prep_steps(name: &str) -> &'static [PrepStep] {
    VARIANTS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, steps)| *steps)
        .unwrap_or(&[])
}
