//! In-memory content provider for testing.

use super::{ContentProvider, SearchEvent, SearchHit, SearchStream};
use crate::error::{ErrorKind, Result};
use crate::models::{FragmentId, ManifestEntry, SectionContent, SectionId, TextDescriptor};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory content provider for testing.
///
/// Texts and sections are fixed at construction time. Every trait method
/// bumps a counter so tests can assert how often the provider was actually
/// reached, and failures can be injected per operation.
///
/// # Examples
///
/// ```
/// use lectern_provider::{ContentProvider, TextDescriptor};
/// use lectern_provider::provider::MockProvider;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = MockProvider::default().with_linked_text(
///     TextDescriptor::new("eng_kjv", "mock").with_sections(["GN1", "GN2"]),
///     3,
/// );
/// let section = provider.load_section("eng_kjv", &"GN1".into()).await?.unwrap();
/// assert_eq!(section.fragments.len(), 3);
/// assert_eq!(provider.load_section_calls(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    texts: HashMap<String, TextDescriptor>,
    sections: HashMap<(String, SectionId), SectionContent>,
    manifest: Option<Vec<ManifestEntry>>,
    failing_manifest: bool,
    failing_sections: HashSet<SectionId>,
    text_info_calls: AtomicUsize,
    manifest_calls: AtomicUsize,
    load_section_calls: AtomicUsize,
}

impl MockProvider {
    /// Change the name of the mock provider.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Register a text with explicitly supplied sections.
    pub fn with_text(mut self, descriptor: TextDescriptor, sections: impl IntoIterator<Item = SectionContent>) -> Self {
        for section in sections {
            self.sections.insert((descriptor.id.clone(), section.section_id.clone()), section);
        }
        self.manifest.get_or_insert_with(Vec::new).push(ManifestEntry::new(descriptor.id.as_str()));
        self.texts.insert(descriptor.id.clone(), descriptor);
        self
    }

    /// Register a text and generate one section per declared section id,
    /// linked in declaration order, each holding `fragments` fragments
    /// named `{section}_{n}` (1-based).
    pub fn with_linked_text(self, descriptor: TextDescriptor, fragments: usize) -> Self {
        let ids = &descriptor.sections;
        let sections: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let fragment_ids: Vec<FragmentId> = (1..=fragments).map(|n| FragmentId::new(format!("{id}_{n}"))).collect();
                let html = fragment_ids
                    .iter()
                    .map(|f| format!(r#"<span class="v" data-id="{f}">{f} text</span>"#))
                    .collect::<String>();
                SectionContent::new(descriptor.id.as_str(), id.clone(), html)
                    .with_links(index.checked_sub(1).and_then(|i| ids.get(i)).cloned(), ids.get(index + 1).cloned())
                    .with_fragments(fragment_ids)
            })
            .collect();
        self.with_text(descriptor, sections)
    }

    /// Replace the catalog this provider reports.
    pub fn with_manifest(mut self, entries: impl IntoIterator<Item = ManifestEntry>) -> Self {
        self.manifest = Some(entries.into_iter().collect());
        self
    }

    /// Report no catalog at all.
    pub fn without_manifest(mut self) -> Self {
        self.manifest = None;
        self
    }

    /// Make every manifest request fail.
    pub fn failing_manifest(mut self) -> Self {
        self.failing_manifest = true;
        self
    }

    /// Make loads of `section` fail (for any text).
    pub fn failing_section(mut self, section: impl Into<SectionId>) -> Self {
        self.failing_sections.insert(section.into());
        self
    }

    pub fn text_info_calls(&self) -> usize {
        self.text_info_calls.load(Ordering::SeqCst)
    }

    pub fn manifest_calls(&self) -> usize {
        self.manifest_calls.load(Ordering::SeqCst)
    }

    pub fn load_section_calls(&self) -> usize {
        self.load_section_calls.load(Ordering::SeqCst)
    }
}
impl Default for MockProvider {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            texts: HashMap::new(),
            sections: HashMap::new(),
            manifest: None,
            failing_manifest: false,
            failing_sections: HashSet::new(),
            text_info_calls: AtomicUsize::new(0),
            manifest_calls: AtomicUsize::new(0),
            load_section_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ContentProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_text_info(&self, text_id: &str) -> Result<TextDescriptor> {
        self.text_info_calls.fetch_add(1, Ordering::SeqCst);
        self.texts.get(text_id).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(text_id.to_string())))
    }

    async fn get_text_manifest(&self) -> Result<Option<Vec<ManifestEntry>>> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_manifest {
            exn::bail!(ErrorKind::Network(format!("{}: manifest unavailable", self.name)));
        }
        Ok(self.manifest.clone())
    }

    async fn load_section(&self, text_id: &str, section_id: &SectionId) -> Result<Option<SectionContent>> {
        self.load_section_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_sections.contains(section_id) {
            exn::bail!(ErrorKind::Network(format!("{}: {section_id} unavailable", self.name)));
        }
        Ok(self.sections.get(&(text_id.to_string(), section_id.clone())).cloned())
    }

    fn start_search<'a>(&'a self, text_id: &'a str, divisions: &'a [String], terms: &'a str) -> SearchStream<'a> {
        Box::pin(stream! {
            let Some(descriptor) = self.texts.get(text_id) else {
                yield Err(exn::Exn::from(ErrorKind::NotFound(text_id.to_string())));
                return;
            };
            let needle = terms.to_lowercase();
            let candidates: Vec<&SectionContent> = descriptor
                .sections
                .iter()
                .filter(|id| divisions.is_empty() || id.book_code().is_some_and(|code| divisions.iter().any(|d| d == code)))
                .filter_map(|id| self.sections.get(&(text_id.to_string(), id.clone())))
                .collect();
            yield Ok(SearchEvent::IndexComplete(u64::try_from(candidates.len()).unwrap_or(0)));
            let mut total = 0usize;
            for section in candidates {
                let occurrences = section.html.to_lowercase().matches(needle.as_str()).count();
                if occurrences > 0 {
                    total += occurrences;
                    yield Ok(SearchEvent::Loaded(SearchHit { section_id: section.section_id.clone(), occurrences }));
                }
            }
            yield Ok(SearchEvent::Complete(u64::try_from(total).unwrap_or(0)));
        })
    }
}
