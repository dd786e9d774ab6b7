//! Raw-content URL resolution.
//!
//! For each notebook two candidate URLs exist: one on the repository's
//! default branch (canonical, stable across commits) and one pinned to the
//! commit embedded in the search result's HTML URL (fallback). Missing
//! inputs yield missing URLs, never errors.

use std::sync::OnceLock;

use regex::Regex;

/// Host serving raw file content.
pub const RAW_HOST: &str = "https://raw.githubusercontent.com";

/// The two candidate raw-content URLs for a notebook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawUrls {
    /// Built from owner/repo/default_branch/filename; canonical when it
    /// serves the content.
    pub default_branch_url: Option<String>,
    /// Built from the commit SHA and path parsed out of the HTML URL.
    pub commit_url: Option<String>,
}

impl RawUrls {
    pub fn is_empty(&self) -> bool {
        self.default_branch_url.is_none() && self.commit_url.is_none()
    }
}

fn blob_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/blob/([0-9a-fA-F]{7,40})/(.+)$").unwrap())
}

/// Compute the candidate raw-content URLs for a notebook.
///
/// Total: empty/missing inputs produce `None` for the affected URL.
pub fn resolve(
    owner_login: &str,
    repo_name: &str,
    filename: &str,
    default_branch: Option<&str>,
    html_url: &str,
) -> RawUrls {
    if owner_login.is_empty() || repo_name.is_empty() {
        return RawUrls::default();
    }

    let default_branch_url = default_branch
        .filter(|b| !b.is_empty() && !filename.is_empty())
        .map(|branch| format!("{RAW_HOST}/{owner_login}/{repo_name}/{branch}/{filename}"));

    let commit_url = blob_re().captures(html_url).map(|caps| {
        let sha = &caps[1];
        let path = &caps[2];
        format!("{RAW_HOST}/{owner_login}/{repo_name}/{sha}/{path}")
    });

    RawUrls {
        default_branch_url,
        commit_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML_URL: &str =
        "https://github.com/livebook-dev/livebook/blob/3c38329d9e9e7a95011118e9974dfa40af28a714/guides/welcome.livemd";

    #[test]
    fn test_resolve_both_urls() {
        let urls = resolve(
            "livebook-dev",
            "livebook",
            "welcome.livemd",
            Some("main"),
            HTML_URL,
        );
        assert_eq!(
            urls.default_branch_url.as_deref(),
            Some("https://raw.githubusercontent.com/livebook-dev/livebook/main/welcome.livemd")
        );
        assert_eq!(
            urls.commit_url.as_deref(),
            Some("https://raw.githubusercontent.com/livebook-dev/livebook/3c38329d9e9e7a95011118e9974dfa40af28a714/guides/welcome.livemd")
        );
    }

    #[test]
    fn test_resolve_without_default_branch() {
        let urls = resolve("livebook-dev", "livebook", "welcome.livemd", None, HTML_URL);
        assert!(urls.default_branch_url.is_none());
        assert!(urls.commit_url.is_some());
        assert!(!urls.is_empty());
    }

    #[test]
    fn test_resolve_keeps_nested_path_from_html_url() {
        let urls = resolve(
            "livebook-dev",
            "livebook",
            "welcome.livemd",
            Some("main"),
            HTML_URL,
        );
        // The commit URL keeps the directory prefix; the branch URL uses the
        // bare filename reported by the search API.
        assert!(urls.commit_url.unwrap().contains("/guides/welcome.livemd"));
        assert!(!urls
            .default_branch_url
            .unwrap()
            .contains("/guides/"));
    }

    #[test]
    fn test_resolve_unparseable_html_url() {
        let urls = resolve(
            "jose",
            "demos",
            "intro.livemd",
            Some("master"),
            "https://github.com/jose/demos/tree/main",
        );
        assert!(urls.commit_url.is_none());
        assert!(urls.default_branch_url.is_some());
    }

    #[test]
    fn test_resolve_rejects_branch_named_blob_path() {
        // A /blob/<ref>/ segment whose ref is not hex-ish is not a commit
        let urls = resolve(
            "jose",
            "demos",
            "intro.livemd",
            None,
            "https://github.com/jose/demos/blob/my-branch/intro.livemd",
        );
        assert!(urls.commit_url.is_none());
        assert!(urls.is_empty());
    }

    #[test]
    fn test_resolve_missing_identity_is_total() {
        let urls = resolve("", "", "intro.livemd", Some("main"), HTML_URL);
        assert!(urls.is_empty());
    }

    #[test]
    fn test_resolve_short_sha_accepted() {
        let urls = resolve(
            "jose",
            "demos",
            "intro.livemd",
            None,
            "https://github.com/jose/demos/blob/3c38329/intro.livemd",
        );
        assert_eq!(
            urls.commit_url.as_deref(),
            Some("https://raw.githubusercontent.com/jose/demos/3c38329/intro.livemd")
        );
    }
}
