//! Translator port - メッセージの国際化

/// Message key used when an export is refused because of its row count.
/// The single argument is the threshold.
pub const EXPORT_COUNT_LIMIT: &str = "export.count.limit";

/// Looks up a user-facing message in the caller's language.
pub trait Translator: Send + Sync {
    /// Translate `key` for `language`, substituting positional `args`.
    fn translate(&self, language: &str, key: &str, args: &[String]) -> String;
}
