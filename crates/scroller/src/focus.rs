//! Which fragment the reader is looking at.

use crate::viewport::{FragmentLayout, SectionLayout};
use lectern_provider::{FragmentId, SectionId};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Focus {
    pub fragment_id: FragmentId,
    pub section_id: SectionId,
    /// Distance from the viewport's top edge to the fragment's top edge.
    pub offset: f64,
}

/// Find the focused fragment for a viewport whose top edge sits at
/// `scroll_top`.
///
/// The focused fragment is the first one, in document order, whose top edge
/// is at or below the viewport top (within `epsilon`). Past the last fragment
/// the last one stays focused.
///
/// Fragment ids are only trusted when unique: if an earlier node carries the
/// same id, the section that owns the viewport top is reported instead.
pub(crate) fn detect(
    scroll_top: f64,
    epsilon: f64,
    fragments: &[FragmentLayout],
    sections: &[SectionLayout],
) -> Option<Focus> {
    let index = fragments
        .iter()
        .position(|f| f.top >= scroll_top - epsilon)
        .or_else(|| fragments.len().checked_sub(1));

    if let Some(index) = index {
        let found = &fragments[index];
        let first = fragments.iter().position(|f| f.id == found.id);
        if first == Some(index) {
            return Some(Focus {
                fragment_id: found.id.clone(),
                section_id: found.id.section_id(),
                offset: found.top - scroll_top,
            });
        }
    }

    by_section(scroll_top, epsilon, fragments, sections)
}

/// The section holding the viewport top reports its first uniquely-identified
/// fragment at or below that top, falling back to its first fragment and then
/// to the section itself.
fn by_section(scroll_top: f64, epsilon: f64, fragments: &[FragmentLayout], sections: &[SectionLayout]) -> Option<Focus> {
    let section = sections
        .iter()
        .find(|s| s.bottom() > scroll_top + epsilon)
        .or_else(|| sections.last())?;
    let owned: Vec<(usize, &FragmentLayout)> = fragments
        .iter()
        .enumerate()
        .filter(|(_, f)| f.top >= section.top && f.top < section.bottom() && f.id.section_id() == section.id)
        .collect();
    let is_first_of_id = |index: usize, fragment: &FragmentLayout| {
        fragments.iter().position(|f| f.id == fragment.id) == Some(index)
    };
    let chosen = owned
        .iter()
        .find(|(index, f)| f.top >= scroll_top - epsilon && is_first_of_id(*index, f))
        .or_else(|| owned.first())
        .map(|(_, f)| *f);

    Some(match chosen {
        Some(fragment) => Focus {
            fragment_id: fragment.id.clone(),
            section_id: section.id.clone(),
            offset: fragment.top - scroll_top,
        },
        None => Focus {
            fragment_id: FragmentId::new(section.id.as_str()),
            section_id: section.id.clone(),
            offset: section.top - scroll_top,
        },
    })
}
