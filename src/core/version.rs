//! Module version identification
//!
//! Site module paths follow `<root>/<base>/modules/<name>/<tag>`. A path that
//! does not follow this layout is not a module dependency.

use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::config::defaults;

/// Name and tag of a cached module
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionInfo {
    /// Module name (`asyn`, `epics-base`, ...)
    pub name: String,
    /// Framework version the module was built against
    pub base: String,
    /// Module tag
    pub tag: String,
}

impl VersionInfo {
    /// Create version info
    pub fn new(name: impl Into<String>, base: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            tag: tag.into(),
        }
    }

    /// The framework itself at `tag`
    pub fn base(tag: &str) -> Self {
        Self::new(defaults::BASE_MODULE_NAME, tag, tag)
    }

    /// Directory name under `modules/` in the cache
    ///
    /// Branch-tracking tags (`R1.0-branch`) share the directory of the tag.
    pub fn cache_dir_name(&self) -> String {
        let tag = self.tag.replace("-branch", "");
        format!("{}-{tag}", self.name)
    }

    /// Repository name hosting this module
    pub fn repo_name(&self) -> &str {
        defaults::REPO_NAME_OVERRIDES
            .iter()
            .find(|(name, _)| *name == self.name)
            .map_or(self.name.as_str(), |(_, repo)| *repo)
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.tag)
    }
}

/// Recognizes module paths under the configured site roots
#[derive(Debug, Clone)]
pub struct ModulePathMatcher {
    patterns: Vec<Regex>,
}

impl ModulePathMatcher {
    /// Compile a matcher for `roots`
    pub fn new<S: AsRef<str>>(roots: &[S]) -> Self {
        let patterns = roots
            .iter()
            .filter_map(|root| {
                let root = root.as_ref().trim_end_matches('/');
                Regex::new(&format!(
                    r"^{}/(?P<base>[^/]+)/modules/(?P<name>[^/]+)/(?P<tag>[^/]+)/?",
                    regex::escape(root)
                ))
                .ok()
            })
            .collect();
        Self { patterns }
    }

    /// Version info for `path`, if it names a module
    pub fn parse(&self, path: &str) -> Option<VersionInfo> {
        let path = normalize(path);
        self.patterns.iter().find_map(|pattern| {
            pattern.captures(&path).map(|caps| {
                VersionInfo::new(&caps["name"], &caps["base"], &caps["tag"])
            })
        })
    }
}

/// Collapse `//` and `/./` so that textual matching sees one spelling
fn normalize(path: &str) -> String {
    let mut out = path.trim().to_string();
    loop {
        let next = out.replace("//", "/").replace("/./", "/");
        if next == out {
            return out;
        }
        out = next;
    }
}
