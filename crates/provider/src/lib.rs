//! Text content model and the provider seam.
//!
//! A provider supplies three things for the texts it knows about: a catalog
//! entry ([`ManifestEntry`]), the document metadata ([`TextDescriptor`]) and
//! the loadable units of content ([`SectionContent`]). Everything above this
//! crate talks to providers through [`ContentProvider`] trait objects.

pub mod error;
mod models;
mod path;
pub mod provider;

pub use crate::models::{FragmentId, ManifestEntry, SectionContent, SectionId, TextDescriptor, TextType};
pub use crate::path::validate_segment;
pub use crate::provider::{ContentProvider, SearchEvent, SearchHit, SearchStream};
use std::sync::Arc;

pub type ProviderHandle = Arc<dyn ContentProvider + Send + Sync>;
