//! Cursor over the page sequence.
//!
//! ## States
//!
//! - `Unpositioned`: no current page (feature number -1)
//! - `Positioned(i)`: `i` is a valid index into the current page sequence
//!
//! Transitions are computed by [`CursorPosition`] as pure functions of the
//! page count; a failed transition returns `None` and the caller leaves the
//! state unchanged. There is no wraparound.

use crate::types::Feature;

/// Cursor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorPosition {
    /// No current page.
    #[default]
    Unpositioned,
    /// Current page index.
    Positioned(usize),
}

impl CursorPosition {
    /// Current index, if positioned.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Unpositioned => None,
            Self::Positioned(i) => Some(*i),
        }
    }

    /// 0-based index, or -1 when unpositioned.
    pub fn feature_number(&self) -> i64 {
        self.index().map_or(-1, |i| i as i64)
    }

    /// Target of `first()`.
    pub fn first(count: usize) -> Option<usize> {
        (count > 0).then_some(0)
    }

    /// Target of `last()`.
    pub fn last(count: usize) -> Option<usize> {
        count.checked_sub(1)
    }

    /// Target of `next()`. From unpositioned this is `first()`.
    pub fn next(&self, count: usize) -> Option<usize> {
        match self {
            Self::Unpositioned => Self::first(count),
            Self::Positioned(i) => Self::seek(i + 1, count),
        }
    }

    /// Target of `previous()`. Fails from unpositioned.
    pub fn previous(&self, count: usize) -> Option<usize> {
        match self {
            Self::Unpositioned => None,
            Self::Positioned(i) => i.checked_sub(1).and_then(|p| Self::seek(p, count)),
        }
    }

    /// Target of `seek_to(index)`.
    pub fn seek(index: usize, count: usize) -> Option<usize> {
        (index < count).then_some(index)
    }
}

/// Cursor state plus the payload materialized at the current page.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    position: CursorPosition,
    feature: Option<Feature>,
    filename: Option<String>,
}

impl Cursor {
    /// Create an unpositioned cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn position(&self) -> CursorPosition {
        self.position
    }

    /// Feature fetched at the last successful positioning or refresh.
    pub fn feature(&self) -> Option<&Feature> {
        self.feature.as_ref()
    }

    /// Evaluated filename for the current page, `None` when the default scheme applies.
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Move to a page. The feature must be the one at `index`.
    pub(crate) fn place(&mut self, index: usize, feature: Feature, filename: Option<String>) {
        self.position = CursorPosition::Positioned(index);
        self.feature = Some(feature);
        self.filename = filename;
    }

    /// Replace the payload without moving.
    pub(crate) fn refresh(&mut self, feature: Feature, filename: Option<String>) {
        self.feature = Some(feature);
        self.filename = filename;
    }

    /// Replace the filename without moving.
    pub(crate) fn set_filename(&mut self, filename: Option<String>) {
        self.filename = filename;
    }

    /// Back to unpositioned. Returns true if the cursor was positioned.
    pub(crate) fn reset(&mut self) -> bool {
        let was_positioned = self.position != CursorPosition::Unpositioned;
        *self = Self::default();
        was_positioned
    }
}
