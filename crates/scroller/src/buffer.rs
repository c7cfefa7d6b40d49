//! The contiguous run of mounted sections.

use lectern_provider::{SectionContent, SectionId};
use std::collections::VecDeque;

/// Mounted sections, top to bottom.
///
/// Adjacent entries are always linked by their own `previous`/`next`
/// pointers; the insertion methods refuse anything that would break that.
#[derive(Debug, Default)]
pub(crate) struct Buffer {
    sections: VecDeque<SectionContent>,
}

impl Buffer {
    pub(crate) fn len(&self) -> usize {
        self.sections.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub(crate) fn first(&self) -> Option<&SectionContent> {
        self.sections.front()
    }

    pub(crate) fn last(&self) -> Option<&SectionContent> {
        self.sections.back()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&SectionContent> {
        self.sections.get(index)
    }

    pub(crate) fn contains(&self, section_id: &SectionId) -> bool {
        self.sections.iter().any(|s| &s.section_id == section_id)
    }

    pub(crate) fn ids(&self) -> Vec<SectionId> {
        self.sections.iter().map(|s| s.section_id.clone()).collect()
    }

    /// Drop everything and start over from `content`.
    pub(crate) fn reset(&mut self, content: SectionContent) {
        self.sections.clear();
        self.sections.push_back(content);
    }

    pub(crate) fn clear(&mut self) {
        self.sections.clear();
    }

    /// Whether `content` is what the last section points to as `next`.
    fn follows(&self, content: &SectionContent) -> bool {
        self.last().and_then(|s| s.next.as_ref()) == Some(&content.section_id)
    }

    /// Whether `content` is what the first section points to as `previous`.
    fn precedes(&self, content: &SectionContent) -> bool {
        self.first().and_then(|s| s.previous.as_ref()) == Some(&content.section_id)
    }

    /// Returns `false` (and keeps `content` out) unless it follows the last section.
    pub(crate) fn push_back(&mut self, content: SectionContent) -> bool {
        if !self.follows(&content) {
            return false;
        }
        self.sections.push_back(content);
        true
    }

    /// Returns `false` (and keeps `content` out) unless it precedes the first section.
    pub(crate) fn push_front(&mut self, content: SectionContent) -> bool {
        if !self.precedes(&content) {
            return false;
        }
        self.sections.push_front(content);
        true
    }

    pub(crate) fn pop_front(&mut self) -> Option<SectionContent> {
        self.sections.pop_front()
    }

    pub(crate) fn pop_back(&mut self) -> Option<SectionContent> {
        self.sections.pop_back()
    }
}
