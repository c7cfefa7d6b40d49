//! Everything a scroller tells its host.
//!
//! Events serialize to the wire shape consumed by companion windows:
//! `{"type": "locationchange", "data": {...}}`.

use lectern_provider::{FragmentId, SectionId, TextDescriptor, TextType};
use serde::Serialize;

/// Where the reader is in the current text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationInfo {
    #[serde(rename = "fragmentid")]
    pub fragment_id: FragmentId,
    #[serde(rename = "sectionid")]
    pub section_id: SectionId,
    /// Distance from the viewport's top edge to the fragment's top edge.
    pub offset: f64,
    pub label: String,
    #[serde(rename = "labelLong")]
    pub label_long: String,
    #[serde(rename = "textid")]
    pub text_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ScrollerEvent {
    /// Raw scroll activity, forwarded as-is.
    Scroll { offset: f64 },
    /// The focused fragment changed.
    LocationChange(LocationInfo),
    GlobalMessage(GlobalMessage),
}

/// Broadcasts meant for every other window and plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "messagetype", rename_all = "lowercase")]
pub enum GlobalMessage {
    /// Coalesced navigation notice, at most once per settle cycle.
    Nav {
        #[serde(rename = "type")]
        text_type: Option<TextType>,
        #[serde(rename = "locationInfo")]
        location_info: LocationInfo,
    },
    /// A section was mounted; carries the raw payload for content plugins.
    TextLoad {
        #[serde(rename = "texttype")]
        text_type: Option<TextType>,
        #[serde(rename = "textid")]
        text_id: String,
        abbr: Option<String>,
        #[serde(rename = "sectionid")]
        section_id: SectionId,
        #[serde(rename = "fragmentid")]
        fragment_id: Option<FragmentId>,
        content: String,
    },
}

/// Turns fragment ids into something a reader recognises ("Genesis 1:1").
///
/// Called on every location change, so implementations should be cheap and
/// must not have side effects.
pub trait LabelFormatter {
    fn label(&self, text: &TextDescriptor, fragment_id: &FragmentId) -> String;

    fn label_long(&self, text: &TextDescriptor, fragment_id: &FragmentId) -> String {
        self.label(text, fragment_id)
    }
}

/// Echoes ids back; the long form is prefixed with the text's abbreviation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainLabels;

impl LabelFormatter for PlainLabels {
    fn label(&self, _text: &TextDescriptor, fragment_id: &FragmentId) -> String {
        fragment_id.to_string()
    }

    fn label_long(&self, text: &TextDescriptor, fragment_id: &FragmentId) -> String {
        match &text.abbr {
            Some(abbr) => format!("{abbr} {fragment_id}"),
            None => fragment_id.to_string(),
        }
    }
}
