use std::sync::LazyLock;

use regex::Regex;

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

static RE_REPO_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"github\.com[/:]([^/\s]+)/([^/\s]+?)(?:\.git)?/?$").unwrap());

/// Extracts `owner/name` from an HTTPS or SSH GitHub URL.
pub fn parse_repo_url(url: &str) -> Option<RepoRef> {
    let caps = RE_REPO_URL.captures(url.trim())?;
    Some(RepoRef {
        owner: caps[1].to_string(),
        name: caps[2].to_string(),
    })
}

/// Embeds `token` into an `https://github.com/` URL. Other URLs are
/// returned unchanged.
pub fn embed_token(url: &str, token: &str) -> String {
    match url.strip_prefix("https://github.com/") {
        Some(rest) if !token.is_empty() => format!("https://{}@github.com/{}", token, rest),
        _ => url.to_string(),
    }
}

/// Push URL for `owner/repo`, authenticated when a token is given.
pub fn authenticated_remote_url(owner: &str, repo: &str, token: Option<&str>) -> String {
    match token {
        Some(token) if !token.is_empty() => {
            format!("https://{}@github.com/{}/{}.git", token, owner, repo)
        }
        _ => format!("https://github.com/{}/{}.git", owner, repo),
    }
}
