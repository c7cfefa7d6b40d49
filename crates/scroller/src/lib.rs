//! Virtualized section scroller.
//!
//! A scroller keeps a bounded, contiguous run of sections mounted in one
//! viewport and keeps it in step with the reader's scroll position. Load
//! and trim decisions are made only once scrolling has come to rest, one
//! decision per rest, and every structural change is compensated so the
//! reader's visible position doesn't move.
//!
//! Rendering is abstracted behind [`Viewport`]; time is injected by the host
//! through [`VirtualizedScroller::on_scroll`] and [`VirtualizedScroller::tick`].

mod buffer;
pub mod error;
mod events;
mod focus;
mod scroller;
mod timer;
mod viewport;

pub use crate::events::{GlobalMessage, LabelFormatter, LocationInfo, PlainLabels, ScrollerEvent};
pub use crate::scroller::{EdgeAction, LabelHandle, LoadKind, LoadOutcome, ScrollerState, VirtualizedScroller};
pub use crate::viewport::{Edge, FragmentLayout, SectionLayout, Viewport};
#[cfg(any(test, feature = "testing"))]
pub use crate::viewport::StackViewport;
