//! Record ID generation and resolution
//!
//! IDs use the format: `{8-char-hex}-{kind}-{slug}`
//! Example: `9f3c01ab-prospect-acme-corp`
//!
//! Records created optimistically on the client carry a temporary
//! `tmp-{uuid}` id until the store answers with the canonical record.

use std::collections::HashMap;

const TEMP_PREFIX: &str = "tmp-";

/// Generate a record ID from kind and title
pub fn generate_id(kind: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    // The leading hex of a v7 uuid is the timestamp; the tail is random
    let hex = &uuid[uuid.len() - 8..];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", hex, kind)
    } else {
        format!("{}-{}-{}", hex, kind, slug)
    }
}

/// Generate a placeholder ID for a record not yet confirmed by the store
pub fn temp_id() -> String {
    format!("{}{}", TEMP_PREFIX, uuid::Uuid::now_v7().simple())
}

/// Whether an ID is a client-side placeholder
pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_PREFIX)
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .take(6)
        .collect::<Vec<_>>()
        .join("-")
}

/// ID resolution for partial matches typed on the command line
pub struct IdResolver<'a> {
    ids: &'a HashMap<String, String>, // id -> display name
}

impl<'a> IdResolver<'a> {
    pub fn new(ids: &'a HashMap<String, String>) -> Self {
        Self { ids }
    }

    /// Resolve a partial reference to a full ID
    ///
    /// Returns:
    /// - Ok(Some(id)) if exactly one match
    /// - Ok(None) if no matches
    /// - Err with candidates if ambiguous
    pub fn resolve(&self, reference: &str) -> Result<Option<String>, Vec<String>> {
        if self.ids.contains_key(reference) {
            return Ok(Some(reference.to_string()));
        }

        let mut matches: Vec<String> = self
            .ids
            .iter()
            .filter(|(id, name)| Self::matches(id, name, reference))
            .map(|(id, _)| id.clone())
            .collect();
        matches.sort();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(matches),
        }
    }

    fn matches(id: &str, name: &str, reference: &str) -> bool {
        let reference = reference.to_lowercase();
        id.starts_with(&reference) || id.contains(&reference) || name.to_lowercase() == reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id("prospect", "Acme Corp");
        assert!(id.contains("-prospect-"));
        assert!(id.ends_with("acme-corp"));
        assert_eq!(id.split('-').next().unwrap().len(), 8);
    }

    #[test]
    fn test_generate_id_unique_for_same_title() {
        let a = generate_id("stage", "Proposta");
        let b = generate_id("stage", "Proposta");
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_id_empty_title() {
        let id = generate_id("interaction", "!!!");
        assert!(id.ends_with("-interaction"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Negociação Final"), "negociação-final");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("here's a test"), "heres-a-test");
    }

    #[test]
    fn test_temp_ids() {
        let id = temp_id();
        assert!(is_temp_id(&id));
        assert!(!is_temp_id(&generate_id("prospect", "x")));
    }

    #[test]
    fn test_resolver_exact_and_partial() {
        let mut ids = HashMap::new();
        ids.insert("aa11bb22-prospect-acme".to_string(), "Acme".to_string());
        ids.insert("cc33dd44-prospect-globex".to_string(), "Globex".to_string());
        let resolver = IdResolver::new(&ids);

        assert_eq!(
            resolver.resolve("aa11bb22-prospect-acme").unwrap(),
            Some("aa11bb22-prospect-acme".to_string())
        );
        assert_eq!(
            resolver.resolve("cc33").unwrap(),
            Some("cc33dd44-prospect-globex".to_string())
        );
        assert_eq!(
            resolver.resolve("globex").unwrap(),
            Some("cc33dd44-prospect-globex".to_string())
        );
        assert_eq!(resolver.resolve("zzz").unwrap(), None);
    }

    #[test]
    fn test_resolver_ambiguous() {
        let mut ids = HashMap::new();
        ids.insert("aa11bb22-prospect-acme".to_string(), "Acme".to_string());
        ids.insert("aa11ff00-prospect-acme-2".to_string(), "Acme 2".to_string());
        let resolver = IdResolver::new(&ids);

        let err = resolver.resolve("aa11").unwrap_err();
        assert_eq!(err.len(), 2);
    }
}
