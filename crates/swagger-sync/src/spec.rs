use std::fmt;

/// A lower-cased identifier that is safe to use as a single repository path
/// segment and as part of a branch name.
///
/// Anything outside `[a-z0-9._-]` is replaced with `-`, so the value can never
/// contain a separator. Values made only of dots are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(String);

impl Slug {
    pub fn new(raw: &str) -> Option<Self> {
        let slug: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '-'
                }
            })
            .collect();

        if slug.is_empty() || slug.chars().all(|c| c == '.') {
            return None;
        }

        Some(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fetched API specification together with the identity it will be
/// stored under in the target repository.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecItem {
    pub project: Slug,
    pub folder: Slug,
    pub raw_content: String,
    pub source_url: String,
}

impl SpecItem {
    /// `{project}/{folder}`, used in commit messages and to find stale pull
    /// requests for the same document.
    pub fn key(&self) -> String {
        format!("{}/{}", self.project, self.folder)
    }

    /// Repository path of the synced document.
    pub fn file_path(&self) -> String {
        format!("{}/{}/swagger.json", self.project, self.folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases() {
        assert_eq!(Slug::new("Orders").unwrap().as_str(), "orders");
        assert_eq!(Slug::new(" V2 ").unwrap().as_str(), "v2");
    }

    #[test]
    fn slug_keeps_dots_dashes_underscores() {
        assert_eq!(Slug::new("v1.0_beta-2").unwrap().as_str(), "v1.0_beta-2");
    }

    #[test]
    fn slug_replaces_separators() {
        assert_eq!(Slug::new("../etc/passwd").unwrap().as_str(), "..-etc-passwd");
        assert_eq!(Slug::new("a\\b").unwrap().as_str(), "a-b");
    }

    #[test]
    fn slug_rejects_empty_and_dot_only() {
        assert!(Slug::new("").is_none());
        assert!(Slug::new("   ").is_none());
        assert!(Slug::new(".").is_none());
        assert!(Slug::new("..").is_none());
    }

    #[test]
    fn item_paths() {
        let item = SpecItem {
            project: Slug::new("orders").unwrap(),
            folder: Slug::new("v2").unwrap(),
            raw_content: "{}".into(),
            source_url: "https://x".into(),
        };
        assert_eq!(item.key(), "orders/v2");
        assert_eq!(item.file_path(), "orders/v2/swagger.json");
    }
}
