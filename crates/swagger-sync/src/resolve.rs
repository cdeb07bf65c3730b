use std::path::{Path, PathBuf};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::fetch::{FetchError, SpecFetcher};
use crate::spec::{Slug, SpecItem};

pub const DEFAULT_KEY_PATTERN: &str = "atg-(.*?)-dev";
pub const DEFAULT_VERSION_PATTERN: &str = "swagger/(.*?)/swagger";

/// Project used when the key pattern does not match.
pub const FALLBACK_PROJECT: &str = "notfound";
/// Folder used when the version pattern does not match.
pub const FALLBACK_FOLDER: &str = "0.0";

/// Manifests may reference further manifests; nesting deeper than this is
/// reported as unresolvable instead of followed.
pub const MAX_MANIFEST_DEPTH: usize = 8;

/// Why a source could not be turned into a spec item.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("unusable project or folder name: {project:?}/{folder:?}")]
    UnusableName { project: String, folder: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("empty response")]
    EmptyResponse,

    #[error("failed to read manifest: {0}")]
    ManifestRead(String),

    #[error("invalid manifest: {0}")]
    ManifestParse(String),

    #[error("manifest nesting deeper than {} levels", MAX_MANIFEST_DEPTH)]
    TooDeep,

    #[error("entry has neither a url nor module parameters")]
    EmptyEntry,
}

/// Regex pair used to derive project and folder from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patterns {
    pub key: String,
    pub version: String,
}

impl Default for Patterns {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY_PATTERN.to_owned(),
            version: DEFAULT_VERSION_PATTERN.to_owned(),
        }
    }
}

/// How a single remote document is located and named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Fetch `url`; project and folder come from capture group 1 of each
    /// pattern applied to the URL.
    Pattern { url: String, patterns: Patterns },

    /// Fetch `{base_url}?module={module}&definition={definition}`; project and
    /// folder are given explicitly.
    Module {
        base_url: String,
        module: String,
        definition: String,
        project_name: String,
        folder_name: String,
    },
}

impl Locator {
    pub fn fetch_url(&self) -> String {
        match self {
            Self::Pattern { url, .. } => url.clone(),
            Self::Module {
                base_url,
                module,
                definition,
                ..
            } => format!("{base_url}?module={module}&definition={definition}"),
        }
    }

    /// Raw (unsanitised) project and folder names.
    pub fn identity(&self) -> Result<(String, String), ResolveError> {
        match self {
            Self::Pattern { url, patterns } => {
                let project = capture(&patterns.key, url)?
                    .unwrap_or_else(|| FALLBACK_PROJECT.to_owned());
                let folder = capture(&patterns.version, url)?
                    .unwrap_or_else(|| FALLBACK_FOLDER.to_owned());
                Ok((project, folder))
            }
            Self::Module {
                project_name,
                folder_name,
                ..
            } => Ok((project_name.clone(), folder_name.clone())),
        }
    }
}

/// First capture group of `pattern` in `haystack`; an empty capture counts as
/// no match.
fn capture(pattern: &str, haystack: &str) -> Result<Option<String>, ResolveError> {
    let re = Regex::new(pattern).map_err(|e| ResolveError::InvalidPattern {
        pattern: pattern.to_owned(),
        message: e.to_string(),
    })?;
    Ok(re
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_owned))
}

/// Where the specifications of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecSource {
    Remote(Locator),
    Manifest(PathBuf),
}

/// One entry of a manifest file.
///
/// An entry is a leaf (`url` or the five module parameters), a nested list
/// (`items`), a reference to another manifest (`file`), or a combination.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub url: Option<String>,
    #[serde(rename = "keyRegEx")]
    pub key_pattern: Option<String>,
    #[serde(rename = "verRegEx")]
    pub version_pattern: Option<String>,
    pub base_url: Option<String>,
    pub module: Option<String>,
    pub definition: Option<String>,
    pub project_name: Option<String>,
    pub folder_name: Option<String>,
    #[serde(default, alias = "atgList")]
    pub items: Vec<ManifestEntry>,
    pub file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(alias = "atgList")]
    items: Vec<ManifestEntry>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_owned)
}

impl ManifestEntry {
    /// The leaf locator of this entry, if it names a document.
    ///
    /// The module flow is chosen only when all five module parameters are
    /// present; otherwise `url` is used with the entry's patterns, falling
    /// back to `defaults` for any pattern it leaves out.
    pub fn locator(&self, defaults: &Patterns) -> Option<Locator> {
        if let (Some(base_url), Some(module), Some(definition), Some(project_name), Some(folder_name)) = (
            non_empty(&self.base_url),
            non_empty(&self.module),
            non_empty(&self.definition),
            non_empty(&self.project_name),
            non_empty(&self.folder_name),
        ) {
            return Some(Locator::Module {
                base_url,
                module,
                definition,
                project_name,
                folder_name,
            });
        }

        let url = non_empty(&self.url)?;
        Some(Locator::Pattern {
            url,
            patterns: Patterns {
                key: non_empty(&self.key_pattern).unwrap_or_else(|| defaults.key.clone()),
                version: non_empty(&self.version_pattern)
                    .unwrap_or_else(|| defaults.version.clone()),
            },
        })
    }
}

/// Result of resolving one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Ready(SpecItem),
    /// Placeholder for a document that could not be obtained. It is reported
    /// downstream instead of aborting the batch.
    Unavailable { source: String, reason: String },
}

impl Resolution {
    fn unavailable(source: impl Into<String>, reason: ResolveError) -> Self {
        Self::Unavailable {
            source: source.into(),
            reason: reason.to_string(),
        }
    }
}

/// Turns spec sources into fetched spec items.
pub struct Resolver<F> {
    fetcher: F,
    patterns: Patterns,
}

impl<F: SpecFetcher> Resolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            patterns: Patterns::default(),
        }
    }

    /// Patterns applied to manifest entries that do not set their own.
    pub fn with_patterns(mut self, patterns: Patterns) -> Self {
        self.patterns = patterns;
        self
    }

    pub async fn resolve(&self, source: &SpecSource) -> Vec<Resolution> {
        match source {
            SpecSource::Remote(locator) => vec![self.resolve_locator(locator).await],
            SpecSource::Manifest(path) => self.resolve_manifest(path, 0).await,
        }
    }

    async fn resolve_locator(&self, locator: &Locator) -> Resolution {
        let url = locator.fetch_url();

        let (project, folder) = match locator.identity() {
            Ok(identity) => identity,
            Err(e) => {
                error!(url = %url, error = %e, "cannot derive project and folder");
                return Resolution::unavailable(url, e);
            }
        };

        let (Some(project), Some(folder)) = (Slug::new(&project), Slug::new(&folder)) else {
            error!(url = %url, %project, %folder, "project or folder is not a usable path segment");
            return Resolution::unavailable(url, ResolveError::UnusableName { project, folder });
        };

        debug!(url = %url, %project, %folder, "fetching specification");

        match self.fetcher.fetch_text(&url).await {
            Ok(body) if body.is_empty() => {
                error!(url = %url, "empty response");
                Resolution::unavailable(url, ResolveError::EmptyResponse)
            }
            Ok(body) => {
                info!(url = %url, %project, %folder, bytes = body.len(), "specification fetched");
                Resolution::Ready(SpecItem {
                    project,
                    folder,
                    raw_content: body,
                    source_url: url,
                })
            }
            Err(e) => {
                error!(url = %url, error = %e, "failed to fetch specification");
                Resolution::unavailable(url, e.into())
            }
        }
    }

    fn resolve_manifest<'a>(&'a self, path: &'a Path, depth: usize) -> BoxFuture<'a, Vec<Resolution>> {
        async move {
            let source = path.display().to_string();

            if depth >= MAX_MANIFEST_DEPTH {
                error!(manifest = %source, depth, "manifest nesting too deep");
                return vec![Resolution::unavailable(source, ResolveError::TooDeep)];
            }

            let contents = match tokio::fs::read_to_string(path).await {
                Ok(c) => c,
                Err(e) => {
                    error!(manifest = %source, error = %e, "failed to read manifest");
                    return vec![Resolution::unavailable(source, ResolveError::ManifestRead(e.to_string()))];
                }
            };

            let manifest: Manifest = match serde_json::from_str(&contents) {
                Ok(m) => m,
                Err(e) => {
                    error!(manifest = %source, error = %e, "invalid manifest");
                    return vec![Resolution::unavailable(source, ResolveError::ManifestParse(e.to_string()))];
                }
            };

            info!(manifest = %source, entries = manifest.items.len(), "loaded manifest");

            let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
            self.resolve_entries(&manifest.items, &base_dir, depth).await
        }
        .boxed()
    }

    fn resolve_entries<'a>(
        &'a self,
        entries: &'a [ManifestEntry],
        base_dir: &'a Path,
        depth: usize,
    ) -> BoxFuture<'a, Vec<Resolution>> {
        async move {
            let resolved = join_all(
                entries
                    .iter()
                    .map(|entry| self.resolve_entry(entry, base_dir, depth)),
            )
            .await;
            resolved.into_iter().flatten().collect()
        }
        .boxed()
    }

    async fn resolve_entry(&self, entry: &ManifestEntry, base_dir: &Path, depth: usize) -> Vec<Resolution> {
        let mut out = Vec::new();
        let locator = entry.locator(&self.patterns);
        let has_children = !entry.items.is_empty() || entry.file.is_some();

        if let Some(locator) = &locator {
            out.push(self.resolve_locator(locator).await);
        }

        if !entry.items.is_empty() {
            if depth + 1 >= MAX_MANIFEST_DEPTH {
                error!(depth, "manifest nesting too deep");
                out.push(Resolution::unavailable("items", ResolveError::TooDeep));
            } else {
                out.extend(self.resolve_entries(&entry.items, base_dir, depth + 1).await);
            }
        }

        if let Some(file) = &entry.file {
            let nested = base_dir.join(file);
            out.extend(self.resolve_manifest(&nested, depth + 1).await);
        }

        if locator.is_none() && !has_children {
            warn!("manifest entry has neither a url nor module parameters");
            out.push(Resolution::unavailable("manifest entry", ResolveError::EmptyEntry));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(url: &str) -> Locator {
        Locator::Pattern {
            url: url.to_owned(),
            patterns: Patterns::default(),
        }
    }

    #[test]
    fn pattern_identity_from_url() {
        let locator = pattern("https://x/atg-orders-dev/swagger/v2/swagger.json");
        assert_eq!(
            locator.identity().unwrap(),
            ("orders".to_owned(), "v2".to_owned())
        );
    }

    #[test]
    fn pattern_identity_falls_back_when_unmatched() {
        let locator = pattern("https://example.com/openapi.json");
        assert_eq!(
            locator.identity().unwrap(),
            ("notfound".to_owned(), "0.0".to_owned())
        );
    }

    #[test]
    fn empty_capture_falls_back() {
        let locator = pattern("https://x/atg--dev/swagger//swagger.json");
        assert_eq!(
            locator.identity().unwrap(),
            ("notfound".to_owned(), "0.0".to_owned())
        );
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let locator = Locator::Pattern {
            url: "https://x".into(),
            patterns: Patterns {
                key: "(".into(),
                version: DEFAULT_VERSION_PATTERN.into(),
            },
        };
        assert!(matches!(
            locator.identity(),
            Err(ResolveError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn module_url_and_identity() {
        let locator = Locator::Module {
            base_url: "https://api.example.com/docs".into(),
            module: "sales".into(),
            definition: "v1".into(),
            project_name: "Sales".into(),
            folder_name: "V1".into(),
        };
        assert_eq!(
            locator.fetch_url(),
            "https://api.example.com/docs?module=sales&definition=v1"
        );
        assert_eq!(
            locator.identity().unwrap(),
            ("Sales".to_owned(), "V1".to_owned())
        );
    }

    #[test]
    fn entry_prefers_module_flow_when_complete() {
        let entry: ManifestEntry = serde_json::from_str(
            r#"{"url":"https://ignored","baseUrl":"https://b","module":"m","definition":"d","projectName":"p","folderName":"f"}"#,
        )
        .unwrap();
        assert!(matches!(
            entry.locator(&Patterns::default()),
            Some(Locator::Module { .. })
        ));
    }

    #[test]
    fn entry_with_partial_module_params_uses_url() {
        let entry: ManifestEntry = serde_json::from_str(
            r#"{"url":"https://u","module":"m","keyRegEx":"k-(.*)"}"#,
        )
        .unwrap();
        match entry.locator(&Patterns::default()) {
            Some(Locator::Pattern { url, patterns }) => {
                assert_eq!(url, "https://u");
                assert_eq!(patterns.key, "k-(.*)");
                assert_eq!(patterns.version, DEFAULT_VERSION_PATTERN);
            }
            other => panic!("expected pattern locator, got {other:?}"),
        }
    }

    #[test]
    fn entry_without_url_or_module_has_no_locator() {
        let entry = ManifestEntry::default();
        assert!(entry.locator(&Patterns::default()).is_none());
    }
}
