//! Test utilities
//!
//! Generators for proptest, a scripted [`ToolRunner`] standing in for the
//! external tools, and a fixture that lays out a target and its cache.

#[cfg(test)]
pub mod generators {
    use proptest::prelude::*;

    /// Generate a build variable name (`ASYN`, `STREAM_DEVICE`, ...)
    pub fn variable_name() -> impl Strategy<Value = String> {
        "[A-Z][A-Z0-9_]{0,15}".prop_filter("Not the framework variable", |s| s != "EPICS_BASE")
    }

    /// Generate a module tag (`R4.39-1.0.1`)
    pub fn module_tag() -> impl Strategy<Value = String> {
        (1u32..10, 0u32..100, proptest::option::of((0u32..5, 0u32..5, 0u32..5))).prop_map(
            |(major, minor, local)| match local {
                Some((a, b, c)) => format!("R{major}.{minor}-{a}.{b}.{c}"),
                None => format!("R{major}.{minor}"),
            },
        )
    }
}

#[cfg(test)]
pub mod runner {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::error::ToolError;
    use crate::infra::process::{ToolCommand, ToolOutcome, ToolRunner};

    /// What the scripted tool does on one invocation
    #[derive(Debug, Clone)]
    pub enum Step {
        /// Exit 0
        Succeed,
        /// Populate module directories, then exit 0
        Fetch(Vec<PathBuf>),
        /// Exit with a code, printing a diagnostic line
        Fail(i32, String),
    }

    /// Runner replaying scripted steps and recording every command
    #[derive(Debug, Default)]
    pub struct ScriptedRunner {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<ToolCommand>>,
    }

    impl ScriptedRunner {
        /// Runner whose tools always succeed
        pub fn new() -> Self {
            Self::default()
        }

        /// Runner replaying `steps`, then succeeding
        pub fn with_steps(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Commands run so far
        pub fn calls(&self) -> Vec<ToolCommand> {
            self.calls.lock().unwrap().clone()
        }

        /// Commands run so far whose program is `program`
        pub fn calls_to(&self, program: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.program == program)
                .count()
        }
    }

    impl ToolRunner for ScriptedRunner {
        async fn run(&self, command: &ToolCommand) -> Result<ToolOutcome, ToolError> {
            self.calls.lock().unwrap().push(command.clone());
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Succeed);

            match step {
                Step::Succeed => Ok(ToolOutcome::success()),
                Step::Fetch(dirs) => {
                    for dir in dirs {
                        std::fs::create_dir_all(&dir).unwrap();
                        std::fs::write(dir.join("Makefile"), "TOP = .\n").unwrap();
                    }
                    Ok(ToolOutcome::success())
                }
                Step::Fail(code, line) => Ok(ToolOutcome::failure(code, vec![line])),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::generators::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn test_variable_name_generator(name in variable_name()) {
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
        }

        #[test]
        fn test_module_tag_generator(tag in module_tag()) {
            prop_assert!(tag.starts_with('R'));
            prop_assert!(!tag.contains('/'));
        }
    }
}
