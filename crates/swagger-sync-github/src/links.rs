//! Conversion of GitHub web and raw links into contents API URLs.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("malformed GitHub URL: {0}")]
    Malformed(String),
}

/// A file in a GitHub repository, optionally pinned to a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPath {
    pub owner: String,
    pub repo: String,
    pub branch: Option<String>,
    pub path: String,
}

impl RepoPath {
    /// `{api}/repos/{owner}/{repo}/contents/{path}[?ref={branch}]`, every
    /// component percent-encoded.
    pub fn contents_url(&self, api_base: &str) -> String {
        let base = format!(
            "{}/repos/{}/{}/contents/{}",
            api_base.trim_end_matches('/'),
            urlencoding::encode(&self.owner),
            urlencoding::encode(&self.repo),
            encode_path(&self.path)
        );
        match &self.branch {
            Some(branch) => format!("{base}?ref={}", urlencoding::encode(branch)),
            None => base,
        }
    }

    /// Recognise `github.com/{owner}/{repo}/blob/{branch}/{path}` and
    /// `raw.githubusercontent.com/{owner}/{repo}/{branch}/{path}`. Other hosts
    /// yield `Ok(None)`.
    pub fn parse(url: &str) -> Result<Option<Self>, LinkError> {
        let Ok(parsed) = reqwest::Url::parse(url) else {
            return Ok(None);
        };

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let malformed = || LinkError::Malformed(url.to_owned());

        match parsed.host_str() {
            Some("github.com") | Some("www.github.com") => match segments.as_slice() {
                [owner, repo, "blob", branch, path @ ..] if !path.is_empty() => Ok(Some(Self {
                    owner: decode_segment(owner, url)?,
                    repo: decode_segment(repo, url)?,
                    branch: Some(decode_segment(branch, url)?),
                    path: decode_segment(&path.join("/"), url)?,
                })),
                _ => Err(malformed()),
            },
            Some("raw.githubusercontent.com") => match segments.as_slice() {
                [owner, repo, branch, path @ ..] if !path.is_empty() => Ok(Some(Self {
                    owner: decode_segment(owner, url)?,
                    repo: decode_segment(repo, url)?,
                    branch: Some(decode_segment(branch, url)?),
                    path: decode_segment(&path.join("/"), url)?,
                })),
                _ => Err(malformed()),
            },
            _ => Ok(None),
        }
    }
}

fn decode_segment(segment: &str, url: &str) -> Result<String, LinkError> {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| LinkError::Malformed(url.to_owned()))
}

/// Percent-encode each `/`-separated part of `path`, keeping the separators.
/// Empty parts are dropped.
pub(crate) fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(urlencoding::encode)
        .collect::<Vec<_>>()
        .join("/")
}

/// The contents API URL for a GitHub link, or `url` unchanged when it is not
/// a GitHub link.
pub fn contents_api_url(url: &str, api_base: &str) -> Result<String, LinkError> {
    Ok(match RepoPath::parse(url)? {
        Some(path) => path.contents_url(api_base),
        None => url.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const API: &str = "https://api.github.com";

    #[test]
    fn blob_link() {
        assert_eq!(
            contents_api_url("https://github.com/acme/specs/blob/main/swagger/links.json", API).unwrap(),
            "https://api.github.com/repos/acme/specs/contents/swagger/links.json?ref=main"
        );
    }

    #[test]
    fn raw_link_drops_query() {
        assert_eq!(
            contents_api_url(
                "https://raw.githubusercontent.com/acme/specs/dev/a/b.json?token=XYZ",
                API
            )
            .unwrap(),
            "https://api.github.com/repos/acme/specs/contents/a/b.json?ref=dev"
        );
    }

    #[test]
    fn other_hosts_pass_through() {
        let url = "https://example.com/files/spec.json";
        assert_eq!(contents_api_url(url, API).unwrap(), url);
    }

    #[test]
    fn truncated_github_links_are_rejected() {
        assert!(contents_api_url("https://github.com/acme/specs", API).is_err());
        assert!(contents_api_url("https://github.com/acme/specs/tree/main/x", API).is_err());
        assert!(contents_api_url("https://raw.githubusercontent.com/acme/specs/main", API).is_err());
    }

    #[test]
    fn escaped_link_segments_are_encoded_once() {
        assert_eq!(
            contents_api_url(
                "https://github.com/acme/specs/blob/release%231/api%20docs/swagger.json",
                API
            )
            .unwrap(),
            "https://api.github.com/repos/acme/specs/contents/api%20docs/swagger.json?ref=release%231"
        );
    }

    #[test]
    fn path_parts_are_encoded_separately() {
        assert_eq!(encode_path("/orders/v2/1.0.0#rc1+b/swagger.json"), "orders/v2/1.0.0%23rc1%2Bb/swagger.json");
    }

    #[test]
    fn explicit_path_without_branch() {
        let path = RepoPath {
            owner: "acme".into(),
            repo: "specs".into(),
            branch: None,
            path: "/swagger.json".into(),
        };
        assert_eq!(
            path.contents_url("http://localhost:9000/"),
            "http://localhost:9000/repos/acme/specs/contents/swagger.json"
        );
    }
}
