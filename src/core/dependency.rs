//! Dependency discovery and build ordering
//!
//! Dependencies are found by reading the target's RELEASE files and keeping
//! every variable whose value is a site module path. Modules already in the
//! cache are read the same way, so each prepare round can discover the next
//! layer of the dependency tree.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::config::defaults::BASE_VARIABLE;
use crate::core::cache::CacheDirectory;
use crate::core::release::{read_release, ReleaseVariables};
use crate::core::target::Target;
use crate::core::version::{ModulePathMatcher, VersionInfo};
use crate::error::ResolveError;

/// One dependency of the target, directly or through another module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    /// Build variable naming the module (`ASYN`, `EPICS_BASE`, ...)
    pub variable: String,
    /// Module and tag
    pub version: VersionInfo,
    /// Variables of the dependencies this module needs
    pub requires: BTreeSet<String>,
    /// Variable of the module that declared it; `None` for the target itself
    pub declared_by: Option<String>,
}

impl Dependency {
    /// Create a dependency with no known requirements
    pub fn new(variable: impl Into<String>, version: VersionInfo, declared_by: Option<String>) -> Self {
        Self {
            variable: variable.into(),
            version,
            requires: BTreeSet::new(),
            declared_by,
        }
    }
}

/// All dependencies of a target, keyed by variable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencySet {
    deps: BTreeMap<String, Dependency>,
}

impl DependencySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency, replacing one with the same variable
    pub fn insert(&mut self, dep: Dependency) {
        self.deps.insert(dep.variable.clone(), dep);
    }

    /// Look up a dependency by variable
    pub fn get(&self, variable: &str) -> Option<&Dependency> {
        self.deps.get(variable)
    }

    /// Whether `variable` is a known dependency
    pub fn contains(&self, variable: &str) -> bool {
        self.deps.contains_key(variable)
    }

    /// Number of dependencies, including the framework
    pub fn len(&self) -> usize {
        self.deps.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    /// Dependencies in variable order
    pub fn iter(&self) -> impl Iterator<Item = &Dependency> {
        self.deps.values()
    }

    /// Variables of dependencies not yet in `cache`
    pub fn missing(&self, cache: &CacheDirectory) -> Vec<String> {
        self.deps
            .values()
            .filter(|dep| !cache.has_module(&dep.version))
            .map(|dep| dep.variable.clone())
            .collect()
    }

    /// Order in which modules must be built, excluding the framework
    ///
    /// The framework always builds first. The rest is swept in sorted order,
    /// taking each module whose requirements are already placed. A cycle
    /// leaves modules unplaced; they are appended in sorted order with a
    /// warning.
    pub fn build_order(&self) -> Vec<String> {
        let mut order: Vec<String> = vec![BASE_VARIABLE.to_string()];
        let mut remaining: BTreeSet<&str> = self
            .deps
            .keys()
            .map(String::as_str)
            .filter(|v| *v != BASE_VARIABLE)
            .collect();

        while !remaining.is_empty() {
            let before = remaining.len();

            for variable in remaining.clone() {
                let ready = self.deps[variable]
                    .requires
                    .iter()
                    .filter(|req| self.deps.contains_key(*req))
                    .all(|req| order.contains(req));
                if ready {
                    order.push(variable.to_string());
                    remaining.remove(variable);
                }
            }

            if remaining.len() == before {
                let stuck: Vec<String> = remaining
                    .iter()
                    .map(|v| {
                        let reqs: Vec<&str> =
                            self.deps[*v].requires.iter().map(String::as_str).collect();
                        format!("{v} (requires {})", reqs.join(", "))
                    })
                    .collect();
                tracing::warn!(
                    "Unable to order dependencies; appending in sorted order: {}",
                    stuck.join("; ")
                );
                order.extend(remaining.iter().map(ToString::to_string));
                break;
            }
        }

        order.remove(0);
        order
    }
}

/// What discovery needs besides the target and cache
#[derive(Debug, Clone)]
pub struct DiscoveryContext {
    /// Recognizes module paths
    pub matcher: ModulePathMatcher,
    /// Variables predefined while reading RELEASE files
    pub introspection: BTreeMap<String, String>,
    /// Framework tag the target builds against
    pub base_tag: String,
}

/// Find every dependency reachable from `target` through the cache
pub fn discover(
    target: &Target,
    ctx: &DiscoveryContext,
    cache: &CacheDirectory,
) -> Result<DependencySet, ResolveError> {
    let mut set = DependencySet::new();
    set.insert(Dependency::new(
        BASE_VARIABLE,
        VersionInfo::base(&ctx.base_tag),
        None,
    ));

    let release = target.release_path();
    if !release.is_file() {
        return Err(ResolveError::MissingRelease {
            target: target.name.clone(),
            path: release,
        });
    }

    let mut vars = initial_variables(ctx, &target.path.display().to_string());
    read_release(&release, &mut vars)?;
    let local = target.release_local_path();
    if local.is_file() && !vars.included().contains(&local) {
        read_release(&local, &mut vars)?;
    }

    let (_, added) = collect(&vars, ctx, &mut set, None);
    let mut queue: VecDeque<String> = added.into();

    while let Some(variable) = queue.pop_front() {
        let Some(dep) = set.get(&variable) else {
            continue;
        };
        if !cache.has_module(&dep.version) {
            continue;
        }

        let module_path = cache.module_path(&dep.version);
        let release = module_path.join("configure").join("RELEASE");
        if !release.is_file() {
            tracing::debug!("{variable} has no configure/RELEASE");
            continue;
        }

        let mut vars = initial_variables(ctx, &module_path.display().to_string());
        if let Err(e) = read_release(&release, &mut vars) {
            tracing::warn!("Skipping dependencies of {variable}: {e}");
            continue;
        }

        let (requires, added) = collect(&vars, ctx, &mut set, Some(&variable));
        queue.extend(added);
        if let Some(dep) = set.deps.get_mut(&variable) {
            dep.requires = requires;
        }
    }

    tracing::debug!("Discovered {} dependencies for {}", set.len(), target.name);
    Ok(set)
}

fn initial_variables(ctx: &DiscoveryContext, top: &str) -> ReleaseVariables {
    ReleaseVariables::with_initial(
        ctx.introspection
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .chain(std::iter::once(("TOP".to_string(), top.to_string()))),
    )
}

/// Record module variables found in `vars`
///
/// Returns the variables the reader requires and those newly added to `set`.
fn collect(
    vars: &ReleaseVariables,
    ctx: &DiscoveryContext,
    set: &mut DependencySet,
    declared_by: Option<&str>,
) -> (BTreeSet<String>, Vec<String>) {
    let mut requires = BTreeSet::new();
    let mut added = Vec::new();

    for name in vars.assigned() {
        if name == "TOP" || Some(name) == declared_by {
            continue;
        }
        if name == BASE_VARIABLE {
            requires.insert(name.to_string());
            continue;
        }

        let Some(version) = vars
            .history(name)
            .iter()
            .find_map(|value| ctx.matcher.parse(value))
        else {
            continue;
        };

        requires.insert(name.to_string());
        if !set.contains(name) {
            tracing::info!(
                "Found dependency {name}={version} (declared by {})",
                declared_by.unwrap_or("the target")
            );
            set.insert(Dependency::new(
                name,
                version,
                declared_by.map(ToString::to_string),
            ));
            added.push(name.to_string());
        }
    }

    (requires, added)
}
