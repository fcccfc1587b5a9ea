//! RELEASE file reading
//!
//! Understands the subset of make syntax that EPICS `configure/RELEASE*`
//! files use: assignments (`=`, `:=`, `?=`, `+=`), `include`, `-include` and
//! `sinclude`, `#` comments and `$(VAR)` / `${VAR}` references. Anything else
//! (conditionals, rules) is skipped.
//!
//! Values are expanded when assigned. Each variable keeps every value it was
//! assigned, in order, so that a site path assigned in `RELEASE` stays visible
//! after `RELEASE.local` points the same variable elsewhere.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::defaults::MAX_INCLUDE_DEPTH;
use crate::error::ResolveError;

/// Expansion passes before giving up on self-referencing values
const MAX_EXPANSION_PASSES: usize = 8;

/// Suffix of the untouched copy kept when a RELEASE file is patched
pub const PRISTINE_SUFFIX: &str = ".iocbuild-orig";

/// Location of the untouched copy of `path`
pub fn pristine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(PRISTINE_SUFFIX);
    path.with_file_name(name)
}

/// Variables collected while reading RELEASE files
#[derive(Debug, Clone, Default)]
pub struct ReleaseVariables {
    values: BTreeMap<String, Vec<String>>,
    assigned: Vec<String>,
    included: Vec<PathBuf>,
}

impl ReleaseVariables {
    /// Start from predefined variables
    ///
    /// Predefined variables can be referenced but are not reported by
    /// [`assigned`](Self::assigned) unless a file assigns them.
    pub fn with_initial<I, K, V>(initial: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: initial
                .into_iter()
                .map(|(k, v)| (k.into(), vec![v.into()]))
                .collect(),
            ..Self::default()
        }
    }

    /// Current value of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|history| history.last())
            .map(String::as_str)
    }

    /// Every value `name` was given, oldest first
    pub fn history(&self, name: &str) -> &[String] {
        self.values.get(name).map_or(&[], Vec::as_slice)
    }

    /// Variables assigned by the files read, in order of first assignment
    pub fn assigned(&self) -> impl Iterator<Item = &str> {
        self.assigned.iter().map(String::as_str)
    }

    /// Files pulled in by include directives
    pub fn included(&self) -> &[PathBuf] {
        &self.included
    }

    fn define(&mut self, name: &str, value: String) {
        if !self.assigned.iter().any(|n| n == name) {
            self.assigned.push(name.to_string());
        }
        self.values.entry(name.to_string()).or_default().push(value);
    }

    /// Replace `$(VAR)` and `${VAR}` references
    ///
    /// Undefined variables expand to nothing.
    pub fn expand(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_EXPANSION_PASSES {
            let next = self.expand_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn expand_once(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let close = match after.chars().next() {
                Some('(') => ')',
                Some('{') => '}',
                _ => {
                    out.push('$');
                    rest = after;
                    continue;
                }
            };

            match find_closing(&after[1..], close) {
                Some(end) => {
                    let name = self.expand_once(&after[1..1 + end]);
                    out.push_str(self.get(name.trim()).unwrap_or_default());
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[pos..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Position of the `close` matching an already consumed opener
fn find_closing(text: &str, close: char) -> Option<usize> {
    let open = if close == ')' { '(' } else { '{' };
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
    }
    None
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Assign {
        name: &'a str,
        op: AssignOp,
        value: &'a str,
    },
    Include {
        files: &'a str,
        optional: bool,
    },
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AssignOp {
    Set,
    SetIfUnset,
    Append,
}

fn classify(raw: &str) -> Line<'_> {
    let line = raw.split('#').next().unwrap_or_default().trim();
    if line.is_empty() {
        return Line::Other;
    }

    for (keyword, optional) in [("-include", true), ("sinclude", true), ("include", false)] {
        if let Some(files) = line.strip_prefix(keyword) {
            if files.starts_with(char::is_whitespace) {
                return Line::Include {
                    files: files.trim(),
                    optional,
                };
            }
        }
    }

    let Some(eq) = line.find('=') else {
        return Line::Other;
    };
    let (lhs, value) = (&line[..eq], line[eq + 1..].trim());
    let (name, op) = match lhs.chars().last() {
        Some(':') => (&lhs[..lhs.len() - 1], AssignOp::Set),
        Some('?') => (&lhs[..lhs.len() - 1], AssignOp::SetIfUnset),
        Some('+') => (&lhs[..lhs.len() - 1], AssignOp::Append),
        _ => (lhs, AssignOp::Set),
    };
    let name = name.trim();

    if is_variable_name(name) {
        Line::Assign { name, op, value }
    } else {
        Line::Other
    }
}

fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Read `path` into `vars`, following includes
///
/// Files patched by a previous prepare are read from their pristine copy.
pub fn read_release(path: &Path, vars: &mut ReleaseVariables) -> Result<(), ResolveError> {
    read_nested(path, vars, 0)
}

fn read_nested(path: &Path, vars: &mut ReleaseVariables, depth: usize) -> Result<(), ResolveError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(ResolveError::IncludeDepth {
            path: path.to_path_buf(),
        });
    }

    let pristine = pristine_path(path);
    let source = if pristine.is_file() { pristine.as_path() } else { path };
    let content = std::fs::read_to_string(source).map_err(|e| ResolveError::UnreadableRelease {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    tracing::debug!("Reading {}", source.display());

    for raw in content.lines() {
        match classify(raw) {
            Line::Assign { name, op, value } => {
                let value = vars.expand(value);
                match op {
                    AssignOp::Set => vars.define(name, value),
                    AssignOp::SetIfUnset => {
                        if vars.get(name).is_none() {
                            vars.define(name, value);
                        }
                    }
                    AssignOp::Append => {
                        let joined = match vars.get(name) {
                            Some(prev) if !prev.is_empty() => format!("{prev} {value}"),
                            _ => value,
                        };
                        vars.define(name, joined);
                    }
                }
            }
            Line::Include { files, optional } => {
                let expanded = vars.expand(files);
                for file in expanded.split_whitespace() {
                    let include = resolve_include(path, file);
                    if !include.is_file() {
                        if optional {
                            tracing::debug!("Skipping missing include {}", include.display());
                            continue;
                        }
                        return Err(ResolveError::UnreadableRelease {
                            path: include,
                            error: format!("included from {}", path.display()),
                        });
                    }
                    vars.included.push(include.clone());
                    read_nested(&include, vars, depth + 1)?;
                }
            }
            Line::Other => {}
        }
    }

    Ok(())
}

fn resolve_include(from: &Path, file: &str) -> PathBuf {
    let file = Path::new(file);
    if file.is_absolute() {
        return file.to_path_buf();
    }
    from.parent().map_or_else(|| file.to_path_buf(), |dir| dir.join(file))
}
