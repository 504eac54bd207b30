//! # Atlas Module
//!
//! The stateful side of the crate: configuration, requery, cursor and the
//! render lifecycle.
//!
//! ## Components
//!
//! - [`AtlasEngine`]: owns configuration, page sequence and cursor
//! - [`CursorPosition`]: navigation state machine
//! - [`AtlasEvent`] / [`AtlasObserver`]: synchronous change notifications
//! - [`PageIterator`] / [`CoverageVisibility`]: render pipeline seams
//!
//! ## Lifecycle
//!
//! ```text
//! setters → dirty → begin_render() → requery → next()/seek_to() … → end_render()
//! ```

pub mod cursor;
pub mod engine;
pub mod error;
pub mod observer;
pub mod render;

pub use cursor::{Cursor, CursorPosition};
pub use engine::{AtlasEngine, NO_MATCHING_FEATURES};
pub use error::AtlasError;
pub use observer::{AtlasEvent, AtlasObserver, ObserverId, ObserverList, RecordingObserver};
pub use render::{CoverageVisibility, LayerVisibility, PageIterator};
