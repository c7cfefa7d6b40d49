//! Local filesystem content provider.
//!
//! Texts live in a configured directory and are read via `tokio::fs`:
//!
//! ```text
//! <root>/texts.json              catalog (array of manifest entries)
//! <root>/<text>/info.json        text descriptor
//! <root>/<text>/<section>.html   one section payload
//! ```

use crate::error::{ErrorKind, Result};
use crate::models::{FragmentId, ManifestEntry, SectionContent, SectionId, TextDescriptor};
use crate::path::validate_segment;
use crate::provider::ContentProvider;
use async_trait::async_trait;
use exn::ResultExt;
use scraper::{Html, Selector};
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const MANIFEST_FILE: &str = "texts.json";
const INFO_FILE: &str = "info.json";
const SECTION_EXTENSION: &str = "html";
const FRAGMENT_ID_ATTR: &str = "data-id";

/// Local filesystem content provider.
///
/// # Examples
///
/// ```no_run
/// use lectern_provider::provider::LocalProvider;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = LocalProvider::new("local", "/srv/texts")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalProvider {
    name: String,
    root: PathBuf,
}
impl LocalProvider {
    /// Create a new local provider.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](ErrorKind::InvalidConfig) if `root` is not an
    /// absolute path to an existing directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::InvalidConfig(format!("not an absolute directory: {}", root.display())));
        }
        Ok(Self { name: name.into(), root })
    }

    fn text_dir(&self, text_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_segment(text_id)?))
    }

    /// Read a whole file, mapping "doesn't exist" to `None`.
    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).or_raise(|| ErrorKind::Io),
        }
    }

    /// Ids of the elements matched by the text's fragment selector, unique
    /// and in document order. Matches without an id are not navigable.
    fn scan_fragments(selector: &str, html: &str) -> Result<Vec<FragmentId>> {
        let Ok(selector) = Selector::parse(selector) else {
            exn::bail!(ErrorKind::InvalidData("fragment selector"));
        };
        let document = Html::parse_fragment(html);
        let mut fragments: Vec<FragmentId> = Vec::new();
        for element in document.select(&selector) {
            let Some(id) = element.value().attr(FRAGMENT_ID_ATTR) else {
                continue;
            };
            if !fragments.iter().any(|f| f.as_str() == id) {
                fragments.push(FragmentId::new(id));
            }
        }
        Ok(fragments)
    }
}

#[async_trait]
impl ContentProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_text_info(&self, text_id: &str) -> Result<TextDescriptor> {
        let path = self.text_dir(text_id)?.join(INFO_FILE);
        let bytes = Self::read_optional(&path).await?.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(text_id.to_string())))?;
        let mut descriptor: TextDescriptor =
            serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidData("text info"))?;
        if descriptor.id.is_empty() {
            descriptor.id = text_id.to_string();
        }
        if descriptor.provider_name.is_empty() {
            descriptor.provider_name = self.name.clone();
        }
        Ok(descriptor)
    }

    async fn get_text_manifest(&self) -> Result<Option<Vec<ManifestEntry>>> {
        let Some(bytes) = Self::read_optional(&self.root.join(MANIFEST_FILE)).await? else {
            tracing::debug!(provider = %self.name, "No catalog file present");
            return Ok(None);
        };
        let entries = serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidData("text manifest"))?;
        Ok(Some(entries))
    }

    async fn load_section(&self, text_id: &str, section_id: &SectionId) -> Result<Option<SectionContent>> {
        let info = self.get_text_info(text_id).await?;
        let file = format!("{}.{SECTION_EXTENSION}", validate_segment(section_id.as_str())?);
        let Some(bytes) = Self::read_optional(&self.text_dir(text_id)?.join(file)).await? else {
            tracing::debug!(provider = %self.name, text = text_id, section = %section_id, "Section file missing");
            return Ok(None);
        };
        let Ok(html) = String::from_utf8(bytes) else {
            tracing::warn!(provider = %self.name, text = text_id, section = %section_id, "Section is not valid UTF-8");
            return Ok(None);
        };
        let (previous, next) = match info.position(section_id) {
            Some(index) => (
                index.checked_sub(1).and_then(|i| info.sections.get(i)).cloned(),
                info.sections.get(index + 1).cloned(),
            ),
            None => (None, None),
        };
        let fragments = Self::scan_fragments(info.fragment_selector(), &html)?;
        Ok(Some(
            SectionContent::new(info.id, section_id.clone(), html).with_links(previous, next).with_fragments(fragments),
        ))
    }
}
