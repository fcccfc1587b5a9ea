//! Remote repository locations

/// Git host modules are cloned from
pub const GIT_HOST: &str = "https://github.com";

/// Clone URL for `<owner>/<repo>` on [`GIT_HOST`]
pub fn repo_url(owner: &str, repo: &str) -> String {
    format!("{GIT_HOST}/{owner}/{repo}.git")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_url() {
        assert_eq!(
            repo_url("slac-epics", "asyn"),
            "https://github.com/slac-epics/asyn.git"
        );
    }
}
