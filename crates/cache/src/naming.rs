/// Receives display names for a text's navigable divisions (books).
///
/// The cache publishes to it whenever it merges a descriptor that carries
/// `division_names`. Implementations must not block.
pub trait DivisionNameRegistry: Send + Sync {
    fn publish(&self, text_id: &str, divisions: &[String], names: &[String]);
}
