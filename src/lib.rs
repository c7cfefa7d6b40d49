//! Multi-pane text reading.
//!
//! A [`Reader`] owns the one [`ContentCache`] of the process and opens any
//! number of windows on it. Each window is a [`VirtualizedScroller`] with its
//! own viewport and its own event channel; they share everything fetched.
//!
//! ```no_run
//! use lectern::Reader;
//! use lectern_config::Config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let reader = Reader::from_config(&config)?;
//! assert!(!reader.cache().provider_names().is_empty());
//! # Ok(())
//! # }
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lectern_cache::ContentCache;
use lectern_config::{Config, ScrollerConfig};
use lectern_provider::provider::LocalProvider;
use lectern_provider::{FragmentId, ProviderHandle, SectionId};
use lectern_scroller::{LoadKind, ScrollerEvent, Viewport, VirtualizedScroller};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub use lectern_cache as cache;
pub use lectern_config as config;
pub use lectern_provider as provider;
pub use lectern_scroller as scroller;

/// A window and the receiving end of its events.
pub type Window<V> = (VirtualizedScroller<V>, UnboundedReceiver<ScrollerEvent>);

/// Application root: one shared cache, any number of windows.
pub struct Reader {
    cache: Arc<ContentCache>,
    scroller: ScrollerConfig,
}

impl Reader {
    /// Build the cache described by `config` and register its providers.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().or_raise(|| ErrorKind::Config)?;
        let cache = ContentCache::new(config.default_provider.as_str()).with_separator(config.provider_separator);
        if let Some(local) = &config.local {
            let provider = LocalProvider::new(local.name.as_str(), &local.root)
                .or_raise(|| ErrorKind::Provider(local.name.clone()))?;
            cache.register_provider(local.name.as_str(), Arc::new(provider));
        }
        Ok(Self::new(cache, config.scroller.clone()))
    }

    /// Wrap an already assembled cache.
    pub fn new(cache: ContentCache, scroller: ScrollerConfig) -> Self {
        Self { cache: Arc::new(cache), scroller }
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Add a provider after construction. The first registration of a name wins.
    pub fn register_provider(&self, name: impl Into<String>, provider: ProviderHandle) {
        self.cache.register_provider(name, provider);
    }

    /// Open an empty window on `viewport`.
    pub fn open_window<V: Viewport>(&self, viewport: V) -> Window<V> {
        VirtualizedScroller::new(Arc::clone(&self.cache), viewport, self.scroller.clone())
    }

    /// Open a window already showing `section_id` of `text_id`.
    #[tracing::instrument(skip(self, viewport))]
    pub async fn open_text<V: Viewport>(
        &self,
        viewport: V,
        text_id: &str,
        section_id: &SectionId,
        fragment_id: Option<&FragmentId>,
    ) -> Result<Window<V>> {
        let text = self.cache.get_text_info(text_id).await.or_raise(|| ErrorKind::Text(text_id.to_string()))?;
        let (mut window, events) = self.open_window(viewport);
        let open_error = || ErrorKind::Open(section_id.to_string());
        window.set_text_info(text).or_raise(open_error)?;
        window.load(LoadKind::Text, section_id, fragment_id).await.or_raise(open_error)?;
        Ok((window, events))
    }
}
