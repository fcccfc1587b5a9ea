//! Files handed to the preparation tool and to module builds
//!
//! The preparation tool (the EPICS CI scripts) reads a `.set` file naming
//! each module, its tag and where to clone it from. Module builds read
//! `RELEASE.local`, `RELEASE_SITE` and their own `configure/RELEASE*`, which
//! are pointed at the cache here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::{BASE_VARIABLE, EXTRA_PATCH_VARIABLES, SET_NAME_OVERRIDES};
use crate::config::urls;
use crate::core::cache::CacheDirectory;
use crate::core::dependency::{Dependency, DependencySet};
use crate::core::release::{pristine_path, PRISTINE_SUFFIX};
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Prefix of a dependency's entries in the set file
pub fn set_name(variable: &str) -> &str {
    SET_NAME_OVERRIDES
        .iter()
        .find(|(var, _)| *var == variable)
        .map_or(variable, |(_, name)| *name)
}

/// Set-file entries describing one dependency
pub fn settings_for(dep: &Dependency, owner: &str) -> Vec<(String, String)> {
    let prefix = set_name(&dep.variable);
    let tag = if dep.version.tag.is_empty() {
        "master"
    } else {
        dep.version.tag.as_str()
    };
    let repo = dep.version.repo_name();

    [
        ("", tag.to_string()),
        ("_DIRNAME", dep.version.name.clone()),
        ("_REPONAME", repo.to_string()),
        ("_REPOOWNER", owner.to_string()),
        ("_VARNAME", prefix.to_string()),
        ("_RECURSIVE", "YES".to_string()),
        ("_DEPTH", "-1".to_string()),
        ("_REPOURL", urls::repo_url(owner, repo)),
    ]
    .into_iter()
    .map(|(suffix, value)| (format!("{prefix}{suffix}"), value))
    .collect()
}

/// Set file listing the framework, then every module in build order
pub fn render_set_file(deps: &DependencySet, order: &[String], owner: &str) -> String {
    let mut lines = Vec::new();
    let mut modules = Vec::new();

    for variable in std::iter::once(BASE_VARIABLE).chain(order.iter().map(String::as_str)) {
        let Some(dep) = deps.get(variable) else {
            continue;
        };
        for (key, value) in settings_for(dep, owner) {
            lines.push(format!("{key}={value}"));
        }
        if variable != BASE_VARIABLE {
            modules.push(set_name(variable));
        }
    }

    lines.push(format!("MODULES={}", modules.join(" ")));
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Cache path of every dependency, by variable
pub fn dependency_paths(deps: &DependencySet, cache: &CacheDirectory) -> BTreeMap<String, PathBuf> {
    deps.iter()
        .map(|dep| (dep.variable.clone(), cache.module_path(&dep.version)))
        .collect()
}

/// `RELEASE.local` mapping each dependency variable to its cache path
pub fn render_release_local(deps: &DependencySet, cache: &CacheDirectory) -> String {
    dependency_paths(deps, cache)
        .iter()
        .map(|(var, path)| format!("{var}={}\n", path.display()))
        .collect()
}

/// `RELEASE_SITE` describing the cache as an EPICS site
pub fn render_release_site(cache: &CacheDirectory, base_tag: &str) -> String {
    format!(
        "EPICS_SITE_TOP={}\nBASE_MODULE_VERSION={base_tag}\nEPICS_MODULES=$(EPICS_SITE_TOP)/modules\n",
        cache.root().display()
    )
}

/// Variables rewritten in module RELEASE files
pub fn patch_variables(deps: &DependencySet, cache: &CacheDirectory) -> BTreeMap<String, String> {
    let mut vars: BTreeMap<String, String> = dependency_paths(deps, cache)
        .into_iter()
        .map(|(var, path)| (var, path.display().to_string()))
        .collect();
    for (var, value) in EXTRA_PATCH_VARIABLES {
        vars.insert((*var).to_string(), (*value).to_string());
    }
    vars
}

/// Point assignments of known variables at new values
///
/// Indented, commented and blank lines are kept. Returns `None` when no line
/// changed.
pub fn patch_release_text(text: &str, variables: &BTreeMap<String, String>) -> Option<String> {
    let mut changed = false;

    let lines: Vec<String> = text
        .lines()
        .map(|line| match patch_line(line, variables) {
            Some(patched) => {
                changed |= patched != line;
                patched
            }
            None => line.to_string(),
        })
        .collect();

    changed.then(|| {
        let mut out = lines.join("\n");
        out.push('\n');
        out
    })
}

fn patch_line(line: &str, variables: &BTreeMap<String, String>) -> Option<String> {
    if line.is_empty() || line.starts_with([' ', '\t', '#']) {
        return None;
    }

    ["?=", ":=", "="].into_iter().find_map(|separator| {
        let (var, _) = line.trim_end().split_once(separator)?;
        let var = var.trim();
        variables
            .get(var)
            .map(|value| format!("{var}{separator}{value}"))
    })
}

/// Patch `configure/RELEASE*` of every cached module
///
/// The first patch of a file keeps its original next to it so that
/// discovery keeps seeing the site paths. Returns the files changed.
pub fn patch_module_release_files(
    deps: &DependencySet,
    cache: &CacheDirectory,
    variables: &BTreeMap<String, String>,
) -> Vec<PathBuf> {
    let mut patched = Vec::new();

    for dep in deps.iter().filter(|d| d.variable != BASE_VARIABLE) {
        let configure = cache.module_path(&dep.version).join("configure");
        let Ok(entries) = std::fs::read_dir(&configure) else {
            continue;
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_release_file(p))
            .collect();
        files.sort();

        for file in files {
            match patch_file(&file, variables) {
                Ok(true) => patched.push(file),
                Ok(false) => tracing::debug!("Left unchanged: {}", file.display()),
                Err(e) => tracing::error!("Failed to patch {}: {e}", file.display()),
            }
        }
    }

    patched
}

fn is_release_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            name.starts_with("RELEASE") && !name.ends_with(PRISTINE_SUFFIX)
        })
}

fn patch_file(path: &Path, variables: &BTreeMap<String, String>) -> Result<bool, FilesystemError> {
    let text = filesystem::read_file(path)?;
    let Some(updated) = patch_release_text(&text, variables) else {
        return Ok(false);
    };

    let pristine = pristine_path(path);
    if !pristine.exists() {
        filesystem::write_file(&pristine, &text)?;
    }
    tracing::warn!("Patching {}", path.display());
    filesystem::write_file(path, &updated)?;
    Ok(true)
}
