//! Equality comparison between packages.
//!
//! Package comparison is used to confirm that a written-then-read DCP is
//! the same composition, so it reports its findings through a note
//! callback rather than just a boolean, and a few fields can be declared
//! ignorable.

/// Severity of a note emitted during comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    /// A difference that makes the packages unequal.
    Error,
    /// An observation that does not affect equality.
    Note,
}

/// Callback receiving comparison notes.
pub type NoteHandler<'a> = &'a mut dyn FnMut(NoteKind, &str);

/// Which differences `equals` should tolerate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityOptions {
    /// Allow CPL annotation texts to differ.
    pub cpl_annotation_texts_can_differ: bool,
    /// Allow reel-level annotation texts to differ.
    pub reel_annotation_texts_can_differ: bool,
    /// Allow reel hashes to differ (e.g. when one side has not computed
    /// them).
    pub reel_hashes_can_differ: bool,
    /// Allow issue dates to differ.
    pub issue_dates_can_differ: bool,
}

impl EqualityOptions {
    /// Options tolerating nothing.
    pub fn strict() -> Self {
        Self::default()
    }
}
