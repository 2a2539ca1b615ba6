// Shared helpers for integration tests.
//
// Provides a temporary directory holding a generated INI profile plus a
// scratch directory that sweep commands can write into, so each test can
// observe which items were swept without any mock.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use janitor::cli::Cli;
use janitor::commands;
use janitor::logging::Logger;

/// An isolated profile backed by a [`tempfile::TempDir`].
pub struct IntegrationTestContext {
    /// Temporary directory holding `profile.ini` and `out/`.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Path to the generated profile.
    pub fn profile_path(&self) -> PathBuf {
        self.root.path().join("profile.ini")
    }

    /// Scratch directory that sweep commands write into.
    pub fn out_dir(&self) -> PathBuf {
        self.root.path().join("out")
    }

    /// Whether a sweep (or list) command created `name` in the scratch directory.
    pub fn touched(&self, name: &str) -> bool {
        self.out_dir().join(name).exists()
    }

    /// Replace the generated profile with `text`, substituting `@OUT@`.
    pub fn write_profile(&self, text: &str) {
        let out = self.out_dir();
        let text = text.replace("@OUT@", out.to_str().expect("utf-8 temp path"));
        std::fs::write(self.profile_path(), text).expect("write profile");
    }

    /// Run the sweeper with `args` followed by the profile path.
    pub fn run(&self, args: &[&str]) -> (anyhow::Result<()>, Arc<Logger>) {
        let profile = self.profile_path();
        let mut argv = vec!["sweeper"];
        argv.extend_from_slice(args);
        argv.push(profile.to_str().expect("utf-8 temp path"));
        let cli = Cli::parse_from(argv);
        let log = Arc::new(Logger::new("integration"));
        let result = commands::run::run(&cli, &log);
        (result, log)
    }
}

/// Fluent builder for [`IntegrationTestContext`].
///
/// Occurrences of `@OUT@` in any value are replaced with the scratch
/// directory path.
#[derive(Default)]
pub struct TestContextBuilder {
    global: Vec<(String, String)>,
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl TestContextBuilder {
    /// Begin a profile with an empty `[sweeper]` section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key to the `[sweeper]` section.
    pub fn global(mut self, key: &str, value: &str) -> Self {
        self.global.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a section with the given entries.
    pub fn section(mut self, name: &str, entries: &[(&str, &str)]) -> Self {
        self.sections.push((
            name.to_string(),
            entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ));
        self
    }

    fn render(&self, out: &Path) -> String {
        let out = out.to_str().expect("utf-8 temp path");
        let mut text = String::from("[sweeper]\n");
        for (key, value) in &self.global {
            text.push_str(&format!("{key} = {}\n", value.replace("@OUT@", out)));
        }
        for (name, entries) in &self.sections {
            text.push_str(&format!("\n[{name}]\n"));
            for (key, value) in entries {
                text.push_str(&format!("{key} = {}\n", value.replace("@OUT@", out)));
            }
        }
        text
    }

    /// Write the profile and return the context.
    pub fn build(self) -> IntegrationTestContext {
        let root = tempfile::tempdir().expect("create temp dir");
        let ctx = IntegrationTestContext { root };
        std::fs::create_dir_all(ctx.out_dir()).expect("create out dir");
        std::fs::write(ctx.profile_path(), self.render(&ctx.out_dir())).expect("write profile");
        ctx
    }
}
