//! Build and release helpers for front-end apps: version bumps in the app
//! config, asset path derivation and the build descriptor consumed by the
//! deploy step.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

pub const DEFAULT_APP_CONFIG_PATH: &str = "public/app-config.json";
pub const DEFAULT_PACKAGE_PATH: &str = "package.json";
pub const DEFAULT_DESCRIPTOR_PATH: &str = "cicd.json";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReleaseError {
    #[error("failed to access {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid JSON in {path}: {message}")]
    InvalidJson { path: String, message: String },

    #[error("version is not found in {path}")]
    MissingVersion { path: String },

    #[error("{path} does not contain a JSON object")]
    NotAnObject { path: String },
}

fn io_error(path: &Path, e: std::io::Error) -> ReleaseError {
    ReleaseError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

fn read_json(path: &Path) -> Result<Value, ReleaseError> {
    let raw = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&raw).map_err(|e| ReleaseError::InvalidJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Set the top-level `version` of a JSON config file, keeping key order and
/// writing it back 2-space indented.
pub fn set_app_version(path: &Path, version: &str) -> Result<(), ReleaseError> {
    let mut config = read_json(path)?;

    let Some(fields) = config.as_object_mut() else {
        return Err(ReleaseError::NotAnObject {
            path: path.display().to_string(),
        });
    };
    fields.insert("version".to_owned(), Value::String(version.to_owned()));

    let rendered = serde_json::to_string_pretty(&config).map_err(|e| ReleaseError::InvalidJson {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    std::fs::write(path, rendered).map_err(|e| io_error(path, e))?;

    info!(path = %path.display(), %version, "app version updated");
    Ok(())
}

/// The `version` of a package manifest. Missing, null and empty values are
/// all reported as missing.
pub fn read_package_version(path: &Path) -> Result<String, ReleaseError> {
    let package = read_json(path)?;
    let version = match package.get("version") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ReleaseError::MissingVersion {
                path: path.display().to_string(),
            });
        }
    };
    debug!(path = %path.display(), %version, "package version read");
    Ok(version)
}

/// Deployment coordinates of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub domain: String,
    pub path: String,
    pub build_version: String,
    pub env: String,
}

/// Build descriptor handed from the build step to the deploy step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDescriptor {
    #[serde(rename = "publicPath")]
    pub public_path: String,
    #[serde(rename = "assetPath")]
    pub asset_path: String,
    #[serde(rename = "indexPath")]
    pub index_path: String,
    pub version: String,
    #[serde(rename = "APP_DOMAIN")]
    pub app_domain: String,
    #[serde(rename = "APP_PATH")]
    pub app_path: String,
    #[serde(rename = "APP_BUILD_VERSION")]
    pub app_build_version: String,
    #[serde(rename = "APP_ENV")]
    pub app_env: String,
    #[serde(rename = "APP_VERSION")]
    pub app_version: String,
}

impl BuildDescriptor {
    /// `1.4.2` deployed to `/apps/shop` in `uat` as build `77` lands under
    /// `/apps/shop/uat-1_4_2-77`.
    pub fn new(target: &BuildTarget, version: &str) -> Self {
        let app_version = version.replace('.', "_");
        let index_path = target.path.clone();
        let asset_path = format!(
            "{index_path}/{}-{app_version}-{}",
            target.env, target.build_version
        );
        let public_path = format!("{}{asset_path}", target.domain);

        Self {
            public_path,
            asset_path,
            index_path,
            version: version.to_owned(),
            app_domain: target.domain.clone(),
            app_path: target.path.clone(),
            app_build_version: target.build_version.clone(),
            app_env: target.env.clone(),
            app_version,
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ReleaseError> {
        let rendered = serde_json::to_string(self).map_err(|e| ReleaseError::InvalidJson {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, rendered).map_err(|e| io_error(path, e))
    }
}

/// Replace the first occurrence of `key` with the quoted public path
/// (`"{public_path}/"`). `None` when `key` does not occur.
pub fn rewrite_public_path(source: &str, key: &str, public_path: &str) -> Option<String> {
    if key.is_empty() || !source.contains(key) {
        return None;
    }
    Some(source.replacen(key, &format!("\"{public_path}/\""), 1))
}

/// Apply [`rewrite_public_path`] to a bundler config file in place. Returns
/// whether the file was modified.
pub fn patch_bundler_config(path: &Path, key: &str, public_path: &str) -> Result<bool, ReleaseError> {
    let source = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;

    match rewrite_public_path(&source, key, public_path) {
        Some(patched) => {
            std::fs::write(path, patched).map_err(|e| io_error(path, e))?;
            info!(path = %path.display(), %public_path, "public path written");
            Ok(true)
        }
        None => {
            warn!(path = %path.display(), %key, "replace key not found, config left unchanged");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> BuildTarget {
        BuildTarget {
            domain: "https://cdn.example.com".into(),
            path: "/apps/shop".into(),
            build_version: "77".into(),
            env: "uat".into(),
        }
    }

    #[test]
    fn descriptor_paths() {
        let d = BuildDescriptor::new(&target(), "1.4.2");
        assert_eq!(d.app_version, "1_4_2");
        assert_eq!(d.index_path, "/apps/shop");
        assert_eq!(d.asset_path, "/apps/shop/uat-1_4_2-77");
        assert_eq!(d.public_path, "https://cdn.example.com/apps/shop/uat-1_4_2-77");
    }

    #[test]
    fn descriptor_field_names() {
        let json = serde_json::to_value(BuildDescriptor::new(&target(), "1.0.0")).unwrap();
        for key in [
            "publicPath",
            "assetPath",
            "indexPath",
            "version",
            "APP_DOMAIN",
            "APP_PATH",
            "APP_BUILD_VERSION",
            "APP_ENV",
            "APP_VERSION",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn rewrite_replaces_first_occurrence_only() {
        let source = "publicPath: __PUBLIC__,\nother: __PUBLIC__";
        let patched = rewrite_public_path(source, "__PUBLIC__", "https://cdn/x").unwrap();
        assert_eq!(patched, "publicPath: \"https://cdn/x/\",\nother: __PUBLIC__");
    }

    #[test]
    fn rewrite_without_key() {
        assert_eq!(rewrite_public_path("module.exports = {}", "__PUBLIC__", "p"), None);
        assert_eq!(rewrite_public_path("abc", "", "p"), None);
    }

    #[test]
    fn set_app_version_keeps_other_fields_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app-config.json");
        std::fs::write(&path, r#"{"name":"shop","version":"0.1.0","api":"/api"}"#).unwrap();

        set_app_version(&path, "2.0.0").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "{\n  \"name\": \"shop\",\n  \"version\": \"2.0.0\",\n  \"api\": \"/api\"\n}"
        );
    }

    #[test]
    fn set_app_version_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app-config.json");
        std::fs::write(&path, "[1,2]").unwrap();

        assert!(matches!(
            set_app_version(&path, "2.0.0"),
            Err(ReleaseError::NotAnObject { .. })
        ));
    }

    #[test]
    fn package_version_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");

        std::fs::write(&path, r#"{"name":"shop","version":"3.1.0"}"#).unwrap();
        assert_eq!(read_package_version(&path).unwrap(), "3.1.0");

        std::fs::write(&path, r#"{"name":"shop","version":""}"#).unwrap();
        assert!(matches!(
            read_package_version(&path),
            Err(ReleaseError::MissingVersion { .. })
        ));

        assert!(matches!(
            read_package_version(&dir.path().join("absent.json")),
            Err(ReleaseError::Io { .. })
        ));
    }

    #[test]
    fn patch_and_descriptor_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("vue.config.js");
        std::fs::write(&config, "module.exports = { publicPath: PUBLIC_PATH }").unwrap();

        let descriptor = BuildDescriptor::new(&target(), "1.4.2");
        assert!(patch_bundler_config(&config, "PUBLIC_PATH", &descriptor.public_path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&config).unwrap(),
            "module.exports = { publicPath: \"https://cdn.example.com/apps/shop/uat-1_4_2-77/\" }"
        );
        assert!(!patch_bundler_config(&config, "PUBLIC_PATH", "x").unwrap());

        let out = dir.path().join("cicd.json");
        descriptor.write(&out).unwrap();
        let back: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(back["APP_VERSION"], "1_4_2");
        assert_eq!(back["assetPath"], "/apps/shop/uat-1_4_2-77");
    }
}
