//! MessageCatalog - メッセージカタログによる Translator 実装
//!
//! Messages are looked up by `(language, key)`, then by key in the default
//! language, then fall back to the key itself. Placeholders are positional:
//! `{0}`, `{1}`, ...

use std::collections::HashMap;

use crate::ports::{EXPORT_COUNT_LIMIT, Translator};

const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone)]
pub struct MessageCatalog {
    default_language: String,
    messages: HashMap<(String, String), String>,
}

impl MessageCatalog {
    /// Catalog preloaded with the built-in English messages.
    pub fn new() -> Self {
        Self::empty(DEFAULT_LANGUAGE).with_message(
            DEFAULT_LANGUAGE,
            EXPORT_COUNT_LIMIT,
            "export row count exceeds the limit of {0}",
        )
    }

    pub fn empty(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            messages: HashMap::new(),
        }
    }

    pub fn with_message(
        mut self,
        language: impl Into<String>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.insert(language, key, template);
        self
    }

    pub fn insert(
        &mut self,
        language: impl Into<String>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) {
        self.messages
            .insert((language.into(), key.into()), template.into());
    }

    fn template(&self, language: &str, key: &str) -> Option<&str> {
        // "ja-JP" -> "ja"
        let primary = language.split(['-', '_']).next().unwrap_or(language);
        self.lookup(language, key)
            .or_else(|| self.lookup(primary, key))
            .or_else(|| self.lookup(&self.default_language, key))
    }

    fn lookup(&self, language: &str, key: &str) -> Option<&str> {
        self.messages
            .get(&(language.to_string(), key.to_string()))
            .map(String::as_str)
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Translator for MessageCatalog {
    fn translate(&self, language: &str, key: &str, args: &[String]) -> String {
        let template = self.template(language, key).unwrap_or(key);
        format_positional(template, args)
    }
}

fn format_positional(template: &str, args: &[String]) -> String {
    let mut out = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        out = out.replace(&format!("{{{i}}}"), arg);
    }
    out
}
