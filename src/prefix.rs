//! Task prefixes required by nomic-embed-text.
//!
//! The model was trained with a role marker in front of every text; callers
//! never see these, the pipeline adds them right before encoding.

pub const QUERY_PREFIX: &str = "search_query: ";
pub const DOCUMENT_PREFIX: &str = "search_document: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRole {
    Query,
    Document,
}

impl TextRole {
    pub fn prefix(&self) -> &'static str {
        match self {
            TextRole::Query => QUERY_PREFIX,
            TextRole::Document => DOCUMENT_PREFIX,
        }
    }
}

pub fn with_prefix(role: TextRole, text: &str) -> String {
    let prefix = role.prefix();
    let mut prefixed = String::with_capacity(prefix.len() + text.len());
    prefixed.push_str(prefix);
    prefixed.push_str(text);
    prefixed
}

pub fn prefix_all<S: AsRef<str>>(role: TextRole, texts: &[S]) -> Vec<String> {
    texts.iter().map(|t| with_prefix(role, t.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_use_distinct_prefixes() {
        assert_eq!(with_prefix(TextRole::Query, "mars"), "search_query: mars");
        assert_eq!(
            with_prefix(TextRole::Document, "mars"),
            "search_document: mars"
        );
    }

    #[test]
    fn test_prefix_all_keeps_order() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let prefixed = prefix_all(TextRole::Document, &texts);
        assert_eq!(prefixed, vec!["search_document: a", "search_document: b"]);
    }
}
