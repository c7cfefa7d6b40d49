//! The rendering surface a scroller drives.
//!
//! All offsets are measured in the viewport's content coordinates: `0.0` is
//! the top edge of the first mounted section and grows downwards.

use lectern_provider::{FragmentId, SectionContent, SectionId};

/// Which end of the mounted run a section is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Bottom,
}

/// Position of one rendered fragment, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentLayout {
    pub id: FragmentId,
    pub top: f64,
    pub height: f64,
}

/// Position of one rendered section wrapper, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionLayout {
    pub id: SectionId,
    pub top: f64,
    pub height: f64,
}

impl SectionLayout {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// A scrollable surface that renders section HTML.
///
/// Implementations own the rendered nodes; the scroller only tells them what
/// to attach or detach and reads back geometry. `mount` and `unmount` must
/// take effect synchronously so the geometry read right after reflects the
/// change.
pub trait Viewport {
    /// Current scroll position (distance from content top to viewport top).
    fn visible_top_offset(&self) -> f64;
    fn set_scroll_offset(&mut self, offset: f64);
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn resize(&mut self, width: f64, height: f64);
    /// Total height of everything mounted.
    fn content_height(&self) -> f64;
    fn fragments(&self) -> Vec<FragmentLayout>;
    fn sections(&self) -> Vec<SectionLayout>;
    fn mount(&mut self, edge: Edge, content: &SectionContent);
    fn unmount(&mut self, section_id: &SectionId);
    fn clear(&mut self);

    fn section_top(&self, section_id: &SectionId) -> Option<f64> {
        self.sections().into_iter().find(|s| &s.id == section_id).map(|s| s.top)
    }
}

#[cfg(any(test, feature = "testing"))]
pub use self::stack::StackViewport;

#[cfg(any(test, feature = "testing"))]
mod stack {
    use super::{Edge, FragmentLayout, SectionLayout, Viewport};
    use lectern_provider::{FragmentId, SectionContent, SectionId};
    use std::collections::{HashMap, VecDeque};

    /// Headless viewport that lays every fragment out as a fixed-height row.
    ///
    /// A section without fragments occupies a single row. Scroll offsets are
    /// clamped at the top only, as if the host always leaves enough bottom
    /// padding to bring the last fragment to the top edge.
    #[derive(Debug, Clone)]
    pub struct StackViewport {
        width: f64,
        height: f64,
        row_height: f64,
        row_overrides: HashMap<SectionId, f64>,
        offset: f64,
        mounted: VecDeque<(SectionId, Vec<FragmentId>)>,
    }

    impl StackViewport {
        pub fn new(width: f64, height: f64, row_height: f64) -> Self {
            Self {
                width,
                height,
                row_height,
                row_overrides: HashMap::new(),
                offset: 0.0,
                mounted: VecDeque::new(),
            }
        }

        /// Render the fragments of `section_id` with a different row height.
        pub fn with_row_height(mut self, section_id: impl Into<SectionId>, row_height: f64) -> Self {
            self.row_overrides.insert(section_id.into(), row_height);
            self
        }

        pub fn scroll_by(&mut self, delta: f64) {
            self.set_scroll_offset(self.offset + delta);
        }

        pub fn mounted(&self) -> Vec<SectionId> {
            self.mounted.iter().map(|(id, _)| id.clone()).collect()
        }

        fn row_height_for(&self, section_id: &SectionId) -> f64 {
            self.row_overrides.get(section_id).copied().unwrap_or(self.row_height)
        }
    }

    impl Viewport for StackViewport {
        fn visible_top_offset(&self) -> f64 {
            self.offset
        }

        fn set_scroll_offset(&mut self, offset: f64) {
            self.offset = offset.max(0.0);
        }

        fn width(&self) -> f64 {
            self.width
        }

        fn height(&self) -> f64 {
            self.height
        }

        fn resize(&mut self, width: f64, height: f64) {
            self.width = width;
            self.height = height;
        }

        fn content_height(&self) -> f64 {
            self.sections().iter().map(|s| s.height).sum()
        }

        fn fragments(&self) -> Vec<FragmentLayout> {
            let mut top = 0.0;
            let mut out = Vec::new();
            for (section_id, fragments) in &self.mounted {
                let row = self.row_height_for(section_id);
                if fragments.is_empty() {
                    top += row;
                    continue;
                }
                for id in fragments {
                    out.push(FragmentLayout { id: id.clone(), top, height: row });
                    top += row;
                }
            }
            out
        }

        fn sections(&self) -> Vec<SectionLayout> {
            let mut top = 0.0;
            self.mounted
                .iter()
                .map(|(id, fragments)| {
                    let height = self.row_height_for(id) * fragments.len().max(1) as f64;
                    let layout = SectionLayout { id: id.clone(), top, height };
                    top += height;
                    layout
                })
                .collect()
        }

        fn mount(&mut self, edge: Edge, content: &SectionContent) {
            let entry = (content.section_id.clone(), content.fragments.clone());
            match edge {
                Edge::Top => self.mounted.push_front(entry),
                Edge::Bottom => self.mounted.push_back(entry),
            }
        }

        fn unmount(&mut self, section_id: &SectionId) {
            self.mounted.retain(|(id, _)| id != section_id);
        }

        fn clear(&mut self) {
            self.mounted.clear();
            self.offset = 0.0;
        }
    }

}
