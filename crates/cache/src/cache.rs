use crate::error::{ErrorKind, Result};
use crate::naming::DivisionNameRegistry;
use crate::text_ref::TextRef;
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use lectern_provider::{ManifestEntry, ProviderHandle, SearchEvent, SectionContent, SectionId, TextDescriptor};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock as SyncRwLock};
use tokio::sync::{OnceCell, RwLock};
use tracing::instrument;

/// Separates the provider name from the text id in qualified ids
/// (`"local:eng_kjv"`).
pub const DEFAULT_SEPARATOR: char = ':';

type SectionKey = (String, SectionId);

/// Provider registry plus memo of everything loaded through it.
///
/// Constructed once by the application root and shared (behind an [`Arc`])
/// with every scroller. Nothing is ever evicted; keeping a bounded number of
/// sections alive is the scrollers' concern, not the cache's.
///
/// # Examples
///
/// ```
/// use lectern_cache::ContentCache;
/// use lectern_provider::provider::LocalProvider;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = ContentCache::new("local");
/// cache.register_provider("local", Arc::new(LocalProvider::new("local", "/srv/texts")?));
/// assert_eq!(cache.resolve_provider_name("eng_kjv"), "local");
/// assert_eq!(cache.resolve_provider_name("remote:eng_kjv"), "remote");
/// # Ok(())
/// # }
/// ```
pub struct ContentCache {
    default_provider: String,
    separator: char,
    registry: SyncRwLock<Vec<(String, ProviderHandle)>>,
    manifest: OnceCell<Vec<ManifestEntry>>,
    texts: RwLock<HashMap<String, TextDescriptor>>,
    sections: RwLock<HashMap<SectionKey, SectionContent>>,
    naming: Option<Arc<dyn DivisionNameRegistry>>,
}

impl ContentCache {
    /// Create an empty cache. `default_provider` is where unqualified ids
    /// that the catalog doesn't know about end up.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            default_provider: default_provider.into(),
            separator: DEFAULT_SEPARATOR,
            registry: SyncRwLock::new(Vec::new()),
            manifest: OnceCell::new(),
            texts: RwLock::new(HashMap::new()),
            sections: RwLock::new(HashMap::new()),
            naming: None,
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Publish division names to `registry` whenever a descriptor carrying
    /// them is merged.
    pub fn with_naming(mut self, registry: Arc<dyn DivisionNameRegistry>) -> Self {
        self.naming = Some(registry);
        self
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Register a provider under `name`.
    ///
    /// Registration is write-once per name: registering a name a second time
    /// keeps the original provider.
    pub fn register_provider(&self, name: impl Into<String>, provider: ProviderHandle) {
        let name = name.into();
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.iter().any(|(existing, _)| *existing == name) {
            tracing::debug!(provider = %name, "Provider already registered; keeping the original");
            return;
        }
        tracing::info!(provider = %name, backend = provider.name(), "Registered content provider");
        registry.push((name, provider));
    }

    /// Names of every registered provider, in registration order.
    pub fn provider_names(&self) -> Vec<String> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.iter().map(|(name, _)| name.clone()).collect()
    }

    fn provider(&self, name: &str) -> Result<ProviderHandle> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        match registry.iter().find(|(registered, _)| registered == name) {
            Some((_, provider)) => Ok(Arc::clone(provider)),
            None => exn::bail!(ErrorKind::ProviderNotFound(name.to_string())),
        }
    }

    fn qualified<'a>(&self, input: &'a str) -> Option<(&'a str, &'a str)> {
        input.split_once(self.separator).filter(|(provider, text)| !provider.is_empty() && !text.is_empty())
    }

    /// The text id with any provider qualifier removed.
    pub fn bare_id<'a>(&self, input: &'a str) -> &'a str {
        self.qualified(input).map_or(input, |(_, text)| text)
    }

    /// Work out which provider serves `input`.
    ///
    /// In order: an explicit qualifier, the provider recorded against the id
    /// in an already-loaded catalog, then the configured default. Never
    /// fails; a name that isn't registered surfaces later as
    /// [`ProviderNotFound`](ErrorKind::ProviderNotFound).
    pub fn resolve_provider_name(&self, input: &str) -> String {
        if let Some((provider, _)) = self.qualified(input) {
            return provider.to_string();
        }
        if let Some(entries) = self.manifest.get()
            && let Some(provider) = entries.iter().find(|e| e.id == input).and_then(|e| e.provider_name.as_ref())
        {
            return provider.clone();
        }
        self.default_provider.clone()
    }

    // =========================================================================
    // Manifest
    // =========================================================================

    /// The aggregated catalog of every registered provider.
    ///
    /// Computed once. Concurrent callers arriving before it's ready all wait
    /// on the same aggregation; later callers get the stored catalog straight
    /// away. Providers are asked one after another, in registration order,
    /// and a provider that fails is skipped rather than failing the lot.
    #[instrument(skip(self))]
    pub async fn load_manifest(&self) -> &[ManifestEntry] {
        self.manifest.get_or_init(|| self.aggregate_manifest()).await.as_slice()
    }

    async fn aggregate_manifest(&self) -> Vec<ManifestEntry> {
        // Snapshot the registry; the lock must not be held across provider calls.
        let providers: Vec<(String, ProviderHandle)> =
            self.registry.read().unwrap_or_else(PoisonError::into_inner).clone();
        let mut catalog = Vec::new();
        for (name, provider) in providers {
            match provider.get_text_manifest().await {
                Ok(Some(entries)) => {
                    tracing::debug!(provider = %name, entries = entries.len(), "Provider manifest loaded");
                    catalog.extend(entries.into_iter().map(|entry| match entry.provider_name {
                        Some(_) => entry,
                        None => entry.with_provider(name.as_str()),
                    }));
                },
                Ok(None) => tracing::debug!(provider = %name, "Provider has no manifest"),
                Err(e) => {
                    let err = e.raise(ErrorKind::ManifestPartial(name.clone()));
                    tracing::warn!(provider = %name, error = ?err, "Provider manifest failed; continuing without it");
                },
            }
        }
        tracing::info!(entries = catalog.len(), "Text manifest aggregated");
        catalog
    }

    // =========================================================================
    // Texts
    // =========================================================================

    /// Fetch (or recall) the descriptor for a text.
    ///
    /// Catalog fields act as defaults; whatever the provider reports wins.
    /// The descriptor's `provider_name` is always the registered name it was
    /// fetched through.
    ///
    /// # Errors
    /// - [`ProviderNotFound`](ErrorKind::ProviderNotFound) when the resolved
    ///   provider isn't registered.
    /// - [`FetchFailed`](ErrorKind::FetchFailed) wrapping the provider's error.
    #[instrument(skip(self))]
    pub async fn get_text_info(&self, text_id: &str) -> Result<TextDescriptor> {
        if let Some(cached) = self.texts.read().await.get(text_id) {
            return Ok(cached.clone());
        }
        let manifest = self.load_manifest().await;
        let name = self.resolve_provider_name(text_id);
        let provider = self.provider(&name)?;
        let bare = self.bare_id(text_id);
        let mut descriptor = provider.get_text_info(bare).await.or_raise(|| ErrorKind::FetchFailed)?;
        if let Some(entry) = manifest.iter().find(|e| e.id == bare || e.id == descriptor.id) {
            descriptor = descriptor.with_defaults(entry);
        }
        descriptor.provider_name = name;
        self.publish_names(&descriptor);
        tracing::debug!(text = %descriptor.id, sections = descriptor.sections.len(), "Text info loaded");
        let mut texts = self.texts.write().await;
        Ok(texts.entry(text_id.to_string()).or_insert(descriptor).clone())
    }

    fn publish_names(&self, descriptor: &TextDescriptor) {
        if let (Some(naming), Some(names)) = (&self.naming, &descriptor.division_names) {
            naming.publish(&descriptor.id, &descriptor.divisions, names);
        }
    }

    // =========================================================================
    // Sections
    // =========================================================================

    /// Load one section, from memory when possible.
    ///
    /// A section id that isn't listed verbatim but matches a listed one under
    /// different chapter padding is swapped for the listed id. Every caller
    /// receives its own copy of the payload. On a miss the provider's result
    /// is stored before it's handed back.
    ///
    /// Two overlapping calls for the same section are **not** deduplicated.
    ///
    /// Returns `Ok(None)` when the provider has nothing for the section;
    /// nothing is cached in that case.
    #[instrument(skip(self, text), fields(section = %section_id))]
    pub async fn load_section(&self, text: impl Into<TextRef>, section_id: &SectionId) -> Result<Option<SectionContent>> {
        let descriptor = match text.into() {
            TextRef::ById(id) => self.get_text_info(&id).await?,
            TextRef::ByDescriptor(descriptor) => descriptor,
        };
        let resolved = match descriptor.resolve_section(section_id) {
            Some(known) => known.clone(),
            None => section_id.clone(),
        };
        if resolved != *section_id {
            tracing::debug!(requested = %section_id, resolved = %resolved, "Substituted differently padded section id");
        }
        let key = (descriptor.id.clone(), resolved);
        if let Some(hit) = self.sections.read().await.get(&key) {
            tracing::debug!(text = %key.0, section = %key.1, "Section cache hit");
            return Ok(Some(hit.clone()));
        }
        let name = match descriptor.provider_name.is_empty() {
            true => self.resolve_provider_name(&descriptor.id),
            false => descriptor.provider_name.clone(),
        };
        let provider = self.provider(&name)?;
        tracing::debug!(text = %key.0, section = %key.1, provider = %name, "Section cache miss");
        let Some(content) = provider.load_section(&descriptor.id, &key.1).await.or_raise(|| ErrorKind::FetchFailed)?
        else {
            tracing::debug!(text = %key.0, section = %key.1, "Provider has no such section");
            return Ok(None);
        };
        let mut sections = self.sections.write().await;
        Ok(Some(sections.entry(key).or_insert(content).clone()))
    }

    /// Number of memoized sections across all texts.
    pub async fn cached_sections(&self) -> usize {
        self.sections.read().await.len()
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Run a provider-side search over one text.
    ///
    /// See [`SearchEvent`] for the event ordering. A provider without search
    /// support yields a single [`Search`](ErrorKind::Search) error.
    pub fn start_search<'a>(
        &'a self,
        text_id: &'a str,
        divisions: &'a [String],
        terms: &'a str,
    ) -> impl Stream<Item = Result<SearchEvent>> + 'a {
        // `rustfmt` does not format macros that use braces. Wrap in parentheses!
        stream!({
            let provider = match self.provider(&self.resolve_provider_name(text_id)) {
                Ok(provider) => provider,
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            for await event in provider.start_search(self.bare_id(text_id), divisions, terms) {
                yield event.or_raise(|| ErrorKind::Search);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use lectern_provider::provider::MockProvider;
    use lectern_provider::{FragmentId, TextType};
    use rstest::rstest;
    use std::sync::Mutex;

    fn genesis() -> TextDescriptor {
        TextDescriptor::new("kjv", "mock").with_sections(["GN1", "GN2", "GN3"])
    }

    fn cache_with(provider: &Arc<MockProvider>) -> ContentCache {
        let cache = ContentCache::new("mock");
        cache.register_provider("mock", provider.clone());
        cache
    }

    #[derive(Default)]
    struct RecordingNames(Mutex<Vec<(String, Vec<String>)>>);
    impl DivisionNameRegistry for RecordingNames {
        fn publish(&self, text_id: &str, _divisions: &[String], names: &[String]) {
            self.0.lock().unwrap().push((text_id.to_string(), names.to_vec()));
        }
    }

    #[test]
    fn test_register_is_write_once() {
        let cache = ContentCache::new("a");
        cache.register_provider("a", Arc::new(MockProvider::default().with_name("first")));
        cache.register_provider("a", Arc::new(MockProvider::default().with_name("second")));
        cache.register_provider("b", Arc::new(MockProvider::default()));
        assert_eq!(cache.provider_names(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(cache.provider("a").unwrap().name(), "first");
    }

    #[rstest]
    #[case("kjv", "fallback")]
    #[case("remote:kjv", "remote")]
    #[case(":kjv", "fallback")]
    #[case("remote:", "fallback")]
    fn test_resolve_without_manifest(#[case] input: &str, #[case] expected: &str) {
        let cache = ContentCache::new("fallback");
        assert_eq!(cache.resolve_provider_name(input), expected);
    }

    #[tokio::test]
    async fn test_resolve_uses_loaded_manifest() {
        let cache = ContentCache::new("fallback");
        cache.register_provider("catalog", Arc::new(MockProvider::default().with_manifest([ManifestEntry::new("kjv")])));
        assert_eq!(cache.resolve_provider_name("kjv"), "fallback");
        cache.load_manifest().await;
        assert_eq!(cache.resolve_provider_name("kjv"), "catalog");
        assert_eq!(cache.resolve_provider_name("unknown"), "fallback");
    }

    #[test]
    fn test_custom_separator() {
        let cache = ContentCache::new("fallback").with_separator('/');
        assert_eq!(cache.resolve_provider_name("remote/kjv"), "remote");
        assert_eq!(cache.bare_id("remote/kjv"), "kjv");
        assert_eq!(cache.resolve_provider_name("remote:kjv"), "fallback");
    }

    #[tokio::test]
    async fn test_manifest_aggregation_survives_failures() {
        let cache = ContentCache::new("a");
        let entries = |ids: &[&str]| ids.iter().map(|id| ManifestEntry::new(*id)).collect::<Vec<_>>();
        cache.register_provider("a", Arc::new(MockProvider::default().with_manifest(entries(&["a1", "a2"]))));
        cache.register_provider("broken", Arc::new(MockProvider::default().failing_manifest()));
        cache.register_provider("empty", Arc::new(MockProvider::default().without_manifest()));
        cache.register_provider("c", Arc::new(MockProvider::default().with_manifest(entries(&["c1", "c2", "c3"]))));
        let manifest = cache.load_manifest().await;
        assert_eq!(manifest.len(), 5);
        let providers: Vec<_> = manifest.iter().map(|e| e.provider_name.as_deref().unwrap()).collect();
        assert_eq!(providers, vec!["a", "a", "c", "c", "c"]);
    }

    #[tokio::test]
    async fn test_manifest_is_computed_once() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 1));
        let cache = cache_with(&mock);
        let (first, second) = tokio::join!(cache.load_manifest(), cache.load_manifest());
        assert_eq!(first, second);
        cache.load_manifest().await;
        assert_eq!(mock.manifest_calls(), 1);
    }

    #[tokio::test]
    async fn test_text_info_is_memoized() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 1));
        let cache = cache_with(&mock);
        let first = cache.get_text_info("kjv").await.unwrap();
        let second = cache.get_text_info("kjv").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.text_info_calls(), 1);
    }

    #[tokio::test]
    async fn test_text_info_merges_manifest_defaults() {
        let mut descriptor = genesis();
        descriptor.abbr = Some("Provider".into());
        let entry = ManifestEntry {
            id: "kjv".into(),
            abbr: Some("Catalog".into()),
            lang: Some("eng".into()),
            text_type: Some(TextType::Bible),
            ..Default::default()
        };
        let mock = Arc::new(MockProvider::default().with_linked_text(descriptor, 1).with_manifest([entry]));
        let cache = cache_with(&mock);
        let info = cache.get_text_info("kjv").await.unwrap();
        assert_eq!(info.abbr.as_deref(), Some("Provider"));
        assert_eq!(info.lang.as_deref(), Some("eng"));
        assert_eq!(info.provider_name, "mock");
    }

    #[tokio::test]
    async fn test_text_info_qualified_id() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 1));
        let cache = ContentCache::new("nothing-here");
        cache.register_provider("remote", mock.clone());
        let info = cache.get_text_info("remote:kjv").await.unwrap();
        assert_eq!(info.id, "kjv");
        assert_eq!(info.provider_name, "remote");
    }

    #[tokio::test]
    async fn test_text_info_unknown_provider() {
        let cache = ContentCache::new("nowhere");
        let err = cache.get_text_info("kjv").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::ProviderNotFound(name) if name == "nowhere"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_text_info_publishes_division_names() {
        let mut descriptor = genesis();
        descriptor.divisions = vec!["GN".into()];
        descriptor.division_names = Some(vec!["Genesis".into()]);
        let names = Arc::new(RecordingNames::default());
        let cache = ContentCache::new("mock").with_naming(names.clone());
        cache.register_provider("mock", Arc::new(MockProvider::default().with_linked_text(descriptor, 1)));
        cache.get_text_info("kjv").await.unwrap();
        assert_eq!(*names.0.lock().unwrap(), vec![("kjv".to_string(), vec!["Genesis".to_string()])]);
    }

    #[tokio::test]
    async fn test_load_section_is_memoized() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 3));
        let cache = cache_with(&mock);
        let first = cache.load_section("kjv", &"GN2".into()).await.unwrap().unwrap();
        let second = cache.load_section(genesis(), &"GN2".into()).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.load_section_calls(), 1);
        assert_eq!(cache.cached_sections().await, 1);
    }

    #[tokio::test]
    async fn test_load_section_hands_out_copies() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 3));
        let cache = cache_with(&mock);
        let mut mine = cache.load_section("kjv", &"GN1".into()).await.unwrap().unwrap();
        mine.html.clear();
        mine.fragments.push(FragmentId::from("GN1_99"));
        let fresh = cache.load_section("kjv", &"GN1".into()).await.unwrap().unwrap();
        assert!(!fresh.html.is_empty());
        assert_eq!(fresh.fragments.len(), 3);
    }

    #[tokio::test]
    async fn test_load_section_tolerates_padding() {
        let descriptor = TextDescriptor::new("kjv", "mock").with_sections(["GN01", "GN02"]);
        let mock = Arc::new(MockProvider::default().with_linked_text(descriptor, 1));
        let cache = cache_with(&mock);
        let section = cache.load_section("kjv", &"GN2".into()).await.unwrap().unwrap();
        assert_eq!(section.section_id, SectionId::from("GN02"));
        cache.load_section("kjv", &"GN002".into()).await.unwrap().unwrap();
        assert_eq!(mock.load_section_calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_section_is_not_cached() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 1));
        let cache = cache_with(&mock);
        assert!(cache.load_section("kjv", &"RV22".into()).await.unwrap().is_none());
        assert!(cache.load_section("kjv", &"RV22".into()).await.unwrap().is_none());
        assert_eq!(mock.load_section_calls(), 2);
        assert_eq!(cache.cached_sections().await, 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_fetch_failed() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 1).failing_section("GN2"));
        let cache = cache_with(&mock);
        let err = cache.load_section("kjv", &"GN2".into()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::FetchFailed));
        assert_eq!(cache.cached_sections().await, 0);
    }

    #[tokio::test]
    async fn test_search_passthrough() {
        let mock = Arc::new(MockProvider::default().with_linked_text(genesis(), 2));
        let cache = cache_with(&mock);
        let events: Vec<_> = cache.start_search("kjv", &[], "GN3_2").collect().await;
        let events: Vec<_> = events.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events.first(), Some(&SearchEvent::IndexComplete(3)));
        // Once in the data-id attribute, once in the text.
        assert_eq!(events.last(), Some(&SearchEvent::Complete(2)));
    }

    #[tokio::test]
    async fn test_search_unknown_provider() {
        let cache = ContentCache::new("nowhere");
        let events: Vec<_> = cache.start_search("kjv", &[], "light").collect().await;
        assert_eq!(events.len(), 1);
        let err = events[0].as_ref().unwrap_err();
        assert!(matches!(&**err, ErrorKind::ProviderNotFound(_)));
    }
}
