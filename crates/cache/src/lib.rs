//! Provider registry and section cache.
//!
//! This crate is the single source of truth for "what texts exist" and
//! "what is section X of text Y", independent of which provider serves
//! them. The cache is a dumb memo: it never expires entries and it does not
//! deduplicate overlapping in-flight loads. Callers that need at-most-one
//! fetch per section (the scrollers) serialize their own requests.
//!
//! # Architecture
//! The cache keeps three pieces of state:
//! - **Registry**: provider name → [`ProviderHandle`](lectern_provider::ProviderHandle),
//!   in registration order. Written at startup, read-only afterwards.
//! - **Texts**: text id → merged [`TextDescriptor`](lectern_provider::TextDescriptor).
//! - **Sections**: `(text id, section id)` → [`SectionContent`](lectern_provider::SectionContent).
//!
//! The aggregated manifest is computed once and shared by every caller.

mod cache;
pub mod error;
mod naming;
mod text_ref;

pub use crate::cache::{ContentCache, DEFAULT_SEPARATOR};
pub use crate::naming::DivisionNameRegistry;
pub use crate::text_ref::TextRef;
