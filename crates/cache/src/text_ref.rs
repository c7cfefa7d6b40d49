use lectern_provider::TextDescriptor;

/// A text, either by (optionally provider-qualified) id or by an already
/// resolved descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextRef {
    ById(String),
    ByDescriptor(TextDescriptor),
}
impl From<&str> for TextRef {
    fn from(id: &str) -> Self {
        Self::ById(id.to_string())
    }
}
impl From<String> for TextRef {
    fn from(id: String) -> Self {
        Self::ById(id)
    }
}
impl From<TextDescriptor> for TextRef {
    fn from(descriptor: TextDescriptor) -> Self {
        Self::ByDescriptor(descriptor)
    }
}
impl From<&TextDescriptor> for TextRef {
    fn from(descriptor: &TextDescriptor) -> Self {
        Self::ByDescriptor(descriptor.clone())
    }
}
