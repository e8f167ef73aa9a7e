//! The active substring filter.
//!
//! One predicate, [`matches`], is used both when listing the backlog and when
//! deciding whether a freshly ingested record is broadcast, so the replayed
//! and live views never disagree.

use parking_lot::RwLock;
use regex::RegexBuilder;
use tracing::debug;

use crate::subscriptions::SubscriberRegistry;

/// ANSI sequence opening a highlighted match (yellow background).
pub const HIGHLIGHT_START: &str = "\x1b[43m";

/// ANSI sequence closing a highlighted match.
pub const HIGHLIGHT_END: &str = "\x1b[0m";

/// Case-insensitive substring match. An empty filter matches everything.
pub fn matches(filter: &str, content: &str) -> bool {
    filter.is_empty() || content.to_lowercase().contains(&filter.to_lowercase())
}

/// Wrap every case-insensitive occurrence of `filter` in ANSI highlight
/// markers, keeping the original casing of the matched text.
pub fn highlight(content: &str, filter: &str) -> String {
    if filter.is_empty() {
        return content.to_string();
    }

    let Ok(re) = RegexBuilder::new(&regex::escape(filter))
        .case_insensitive(true)
        .build()
    else {
        return content.to_string();
    };

    let mut out = String::with_capacity(content.len() + 16);
    let mut last = 0;
    for m in re.find_iter(content) {
        out.push_str(&content[last..m.start()]);
        out.push_str(HIGHLIGHT_START);
        out.push_str(m.as_str());
        out.push_str(HIGHLIGHT_END);
        last = m.end();
    }
    out.push_str(&content[last..]);
    out
}

/// Holds the filter shared by every viewer.
#[derive(Default)]
pub struct FilterController {
    value: RwLock<String>,
}

impl FilterController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current filter value.
    pub fn get(&self) -> String {
        self.value.read().clone()
    }

    /// Evaluate `content` against the current filter.
    pub fn matches(&self, content: &str) -> bool {
        matches(&self.value.read(), content)
    }

    /// Replace the filter and post one reset notification per registered
    /// subscriber. Returns the number of subscribers notified.
    ///
    /// Never blocks: each subscriber has its own unbounded reset channel.
    pub fn set(&self, value: impl Into<String>, registry: &SubscriberRegistry) -> usize {
        let value = value.into();
        {
            let mut current = self.value.write();
            debug!(from = current.as_str(), to = value.as_str(), "filter changed");
            *current = value;
        }
        registry.notify_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(matches("", "anything"));
        assert!(matches("", ""));
    }

    #[test]
    fn test_case_insensitive_match() {
        assert!(matches("world", "Hello World"));
        assert!(matches("WORLD", "hello world"));
        assert!(!matches("xyz", "Hello World"));
    }

    #[test]
    fn test_highlight_keeps_original_case() {
        let out = highlight("Hello World, new world", "world");
        assert_eq!(
            out,
            format!(
                "Hello {s}World{e}, new {s}world{e}",
                s = HIGHLIGHT_START,
                e = HIGHLIGHT_END
            )
        );
    }

    #[test]
    fn test_highlight_escapes_regex_syntax() {
        let out = highlight("cost: $5.00 (approx)", "(approx)");
        assert!(out.contains(&format!("{}(approx){}", HIGHLIGHT_START, HIGHLIGHT_END)));
    }

    #[test]
    fn test_highlight_empty_filter_is_identity() {
        assert_eq!(highlight("plain", ""), "plain");
    }

    #[test]
    fn test_set_without_subscribers_notifies_nobody() {
        let controller = FilterController::new();
        let registry = SubscriberRegistry::default();

        assert_eq!(controller.set("error", &registry), 0);
        assert_eq!(controller.get(), "error");
        assert!(controller.matches("an ERROR occurred"));
        assert!(!controller.matches("all good"));
    }
}
