//! Content provider trait and implementations.
//!
//! This module defines the `ContentProvider` trait, the single seam through
//! which texts enter the application. A provider may be a directory of
//! files, a remote catalog, or an in-memory fixture; the cache above it
//! doesn't care which.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalProvider;
#[cfg(feature = "mock")]
pub use self::mock::MockProvider;
use crate::error::{ErrorKind, Result};
use crate::models::{ManifestEntry, SectionContent, SectionId, TextDescriptor};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub type SearchStream<'a> = Pin<Box<dyn Stream<Item = Result<SearchEvent>> + Send + 'a>>;

/// Sections of one text that matched a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub section_id: SectionId,
    /// Number of matches inside the section.
    pub occurrences: usize,
}

/// Progress events emitted by [`ContentProvider::start_search`].
///
/// Events follow a strict ordering:
/// 1. [`IndexComplete`](Self::IndexComplete): exactly once, with the number
///    of sections that will be searched.
/// 2. [`Loaded`](Self::Loaded): zero or more times, one per matching section.
/// 3. [`Complete`](Self::Complete): exactly once, with the total match count.
///
/// An error may terminate the stream early, in which case [`Complete`](Self::Complete)
/// is never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    IndexComplete(u64),
    Loaded(SearchHit),
    Complete(u64),
}

/// Unified interface for content providers.
///
/// Every method is asynchronous; providers are free to hit the network or
/// the filesystem. Providers are **not** expected to memoize anything, the
/// cache sitting in front of them does that.
///
/// # Examples
///
/// ```
/// use lectern_provider::{ContentProvider, SectionId, error::Result};
///
/// async fn first_section_html(provider: &dyn ContentProvider, text_id: &str) -> Result<Option<String>> {
///     let info = provider.get_text_info(text_id).await?;
///     let Some(first) = info.sections.first() else {
///         return Ok(None);
///     };
///     Ok(provider.load_section(text_id, first).await?.map(|section| section.html))
/// }
/// ```
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Name the provider is registered under. Used for provider-qualified
    /// text ids (`"{name}:{text}"`) and logging.
    fn name(&self) -> &str;

    /// Fetch the metadata for one text.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the
    /// provider doesn't serve `text_id`.
    async fn get_text_info(&self, text_id: &str) -> Result<TextDescriptor>;

    /// List every text this provider serves.
    ///
    /// `Ok(None)` means the provider has no catalog of its own and
    /// contributes nothing to the aggregate.
    async fn get_text_manifest(&self) -> Result<Option<Vec<ManifestEntry>>>;

    /// Load one section of one text.
    ///
    /// `Ok(None)` means the section is missing or could not be made sense
    /// of; callers treat it as "nothing arrived" rather than as a failure.
    async fn load_section(&self, text_id: &str, section_id: &SectionId) -> Result<Option<SectionContent>>;

    /// Search a text, restricted to `divisions` when non-empty.
    ///
    /// Default implementation yields a single
    /// [`SearchUnsupported`](crate::error::ErrorKind::SearchUnsupported) error.
    fn start_search<'a>(&'a self, _text_id: &'a str, _divisions: &'a [String], _terms: &'a str) -> SearchStream<'a> {
        let name = self.name().to_string();
        Box::pin(futures::stream::once(async move { Err(exn::Exn::from(ErrorKind::SearchUnsupported(name))) }))
    }
}
