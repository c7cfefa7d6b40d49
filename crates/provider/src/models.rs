//! Content models shared by providers, the cache and scrollers.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Opaque key for one loadable unit of a text (for example, one chapter).
///
/// Ordering between sections is owned by the [`TextDescriptor`] that lists
/// them, never by the string itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);
impl SectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading two-character book code (`"GN"` for `"GN01"`).
    pub fn book_code(&self) -> Option<&str> {
        let (end, _) = self.0.char_indices().nth(2)?;
        Some(&self.0[..end])
    }

    /// Numeric chapter following the book code, ignoring zero padding.
    pub fn chapter(&self) -> Option<u32> {
        let code = self.book_code()?;
        let digits = &self.0[code.len()..];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        match digits.trim_start_matches('0') {
            "" => Some(0),
            trimmed => trimmed.parse().ok(),
        }
    }

    /// Same book code and same chapter number, regardless of how either side
    /// pads the chapter (`"GN1"`, `"GN01"` and `"GN001"` all match).
    pub fn loosely_matches(&self, other: &SectionId) -> bool {
        match (self.book_code(), other.book_code()) {
            (Some(a), Some(b)) if a == b => self.chapter().is_some() && self.chapter() == other.chapter(),
            _ => false,
        }
    }
}
impl Display for SectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl From<&str> for SectionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl From<String> for SectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
impl AsRef<str> for SectionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque key for one navigable sub-unit of a section (for example, one
/// verse), always written as `{section}_{index}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FragmentId(String);
impl FragmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The owning section, taken from the prefix before the last `_`.
    pub fn section_id(&self) -> SectionId {
        match self.0.rsplit_once('_') {
            Some((section, _)) => SectionId::new(section),
            None => SectionId::new(self.0.as_str()),
        }
    }
}
impl Display for FragmentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl From<&str> for FragmentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}
impl From<String> for FragmentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
impl AsRef<str> for FragmentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Category of a text. Affects how fine-grained its fragments are.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextType {
    /// Verse-level fragments.
    #[default]
    Bible,
    /// Comment-block fragments.
    Commentary,
    /// Paragraph-level fragments.
    Book,
}
impl TextType {
    /// Selector used for navigable fragments when a text doesn't declare one.
    pub fn default_fragment_selector(&self) -> &'static str {
        match self {
            Self::Bible => ".v",
            Self::Commentary => ".cmt",
            Self::Book => "p",
        }
    }
}

/// One entry of the aggregated text catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: String,
    /// Provider serving this text. Stamped by the cache when a provider
    /// leaves it blank.
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abbr: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default, rename = "type")]
    pub text_type: Option<TextType>,
}
impl ManifestEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

/// Metadata for one complete document.
///
/// Immutable once obtained; a text switch replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDescriptor {
    pub id: String,
    #[serde(default)]
    pub provider_name: String,
    /// Ordered sections; empty until the provider knows them.
    #[serde(default)]
    pub sections: Vec<SectionId>,
    #[serde(default)]
    pub fragment_selector: Option<String>,
    #[serde(default, rename = "type")]
    pub text_type: Option<TextType>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub abbr: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    /// Navigable divisions (books), in order.
    #[serde(default)]
    pub divisions: Vec<String>,
    /// Display names for `divisions`, index-aligned.
    #[serde(default)]
    pub division_names: Option<Vec<String>>,
}
impl TextDescriptor {
    pub fn new(id: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self { id: id.into(), provider_name: provider_name.into(), ..Default::default() }
    }

    pub fn with_sections(mut self, sections: impl IntoIterator<Item = impl Into<SectionId>>) -> Self {
        self.sections = sections.into_iter().map(Into::into).collect();
        self
    }

    /// Fill blanks from a catalog entry. Fields the provider set always win.
    pub fn with_defaults(mut self, entry: &ManifestEntry) -> Self {
        if self.provider_name.is_empty()
            && let Some(provider) = &entry.provider_name
        {
            self.provider_name = provider.clone();
        }
        self.name = self.name.or_else(|| entry.name.clone());
        self.abbr = self.abbr.or_else(|| entry.abbr.clone());
        self.lang = self.lang.or_else(|| entry.lang.clone());
        self.text_type = self.text_type.or(entry.text_type);
        self
    }

    pub fn fragment_selector(&self) -> &str {
        match &self.fragment_selector {
            Some(selector) => selector,
            None => self.text_type.unwrap_or_default().default_fragment_selector(),
        }
    }

    /// Position of `section` in the declared order.
    pub fn position(&self, section: &SectionId) -> Option<usize> {
        self.sections.iter().position(|s| s == section)
    }

    /// Exact match first, then the padding-tolerant match.
    pub fn resolve_section(&self, section: &SectionId) -> Option<&SectionId> {
        self.sections
            .iter()
            .find(|s| *s == section)
            .or_else(|| self.sections.iter().find(|s| s.loosely_matches(section)))
    }
}

/// One loaded section, ready to be mounted.
///
/// Adjacency (`previous`/`next`) is supplied with the content and is the
/// only authority on which sections border this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionContent {
    pub text_id: String,
    pub section_id: SectionId,
    pub previous: Option<SectionId>,
    pub next: Option<SectionId>,
    /// Rendered payload (an HTML fragment).
    pub html: String,
    /// Fragments in document order.
    pub fragments: Vec<FragmentId>,
}
impl SectionContent {
    pub fn new(text_id: impl Into<String>, section_id: impl Into<SectionId>, html: impl Into<String>) -> Self {
        Self {
            text_id: text_id.into(),
            section_id: section_id.into(),
            previous: None,
            next: None,
            html: html.into(),
            fragments: Vec::new(),
        }
    }

    pub fn with_links(mut self, previous: Option<SectionId>, next: Option<SectionId>) -> Self {
        self.previous = previous;
        self.next = next;
        self
    }

    pub fn with_fragments(mut self, fragments: impl IntoIterator<Item = impl Into<FragmentId>>) -> Self {
        self.fragments = fragments.into_iter().map(Into::into).collect();
        self
    }
}
