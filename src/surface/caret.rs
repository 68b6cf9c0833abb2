//! Caret arithmetic over text runs.
//!
//! A rendered view is reduced to the ordered lengths of its text nodes
//! (in Unicode scalar values). Everything here is a pure function of that
//! sequence, so it can be tested without any rendering surface.

/// A caret location expressed as a text run and an offset inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunPosition {
    /// Index of the text run in document order.
    pub run: usize,
    /// Offset inside the run, in visible characters.
    pub local: usize,
}

impl RunPosition {
    pub const fn new(run: usize, local: usize) -> Self {
        Self { run, local }
    }
}

/// Total text length covered by `lengths`.
pub fn total_len(lengths: &[usize]) -> usize {
    lengths.iter().sum()
}

/// Linear offset of `pos` within the runs.
///
/// The local offset is clamped to its run's length, and a run index past
/// the end resolves to the total length.
pub fn offset_at(lengths: &[usize], pos: RunPosition) -> usize {
    let Some(run_len) = lengths.get(pos.run) else {
        return total_len(lengths);
    };
    total_len(&lengths[..pos.run]) + pos.local.min(*run_len)
}

/// Run position for a linear `offset`.
///
/// Picks the first non-empty run whose cumulative length reaches `offset`,
/// so boundary offsets land at the end of the earlier run. Offsets beyond
/// the text clamp to the end of the last non-empty run. Returns `None`
/// when no run carries any text.
pub fn position_at(lengths: &[usize], offset: usize) -> Option<RunPosition> {
    let mut consumed = 0;
    let mut last = None;
    for (run, &len) in lengths.iter().enumerate() {
        if len == 0 {
            continue;
        }
        let next = consumed + len;
        if offset <= next {
            return Some(RunPosition::new(run, offset.saturating_sub(consumed)));
        }
        consumed = next;
        last = Some(RunPosition::new(run, len));
    }
    last
}
