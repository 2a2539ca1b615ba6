//! The main run loop: list each section and optionally sweep it.
use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::Cli;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::{Log, Logger, SectionStatus};
use crate::sweeper::results::{CommandRecord, SectionState};
use crate::sweeper::{ActionOutcome, BashAction, Sweeper, SweeperOptions};

/// Run the sweeper against real processes.
///
/// # Errors
///
/// Returns an error if the profile is missing or malformed. Failing sections
/// are reported in the summary and do not make the run fail.
pub fn run(cli: &Cli, log: &Arc<Logger>) -> Result<()> {
    run_with_executor(cli, Arc::new(SystemExecutor), log)
}

/// Run the sweeper with an explicit [`Executor`].
///
/// # Errors
///
/// See [`run`].
pub fn run_with_executor(
    cli: &Cli,
    executor: Arc<dyn Executor>,
    log: &Arc<Logger>,
) -> Result<()> {
    let setup = CommandSetup::init(&cli.profile, log.as_ref())?;
    let profile = &setup.profile;

    if cli.list_sections {
        log.stage("Sections");
        for name in profile.section_names() {
            log.info(name);
        }
        return Ok(());
    }

    let names: Vec<String> = cli.section.as_ref().map_or_else(
        || {
            profile
                .section_names()
                .into_iter()
                .map(String::from)
                .collect()
        },
        |name| vec![name.clone()],
    );

    let options = SweeperOptions {
        filter_override: cli.filter_regex.clone(),
        bash_action: cli.bash_action,
    };
    let sweeper_log: Arc<dyn Log> = log.clone();
    let mut sweeper = Sweeper::new(profile, executor, sweeper_log, options)
        .context("compiling section filters")?;

    for name in &names {
        let _span = log.section_span(name).entered();
        run_section(&mut sweeper, name, cli, log.as_ref());
    }

    log.print_summary();

    let failed = log.failure_count();
    if failed > 0 {
        log.warn(&format!("{failed} section(s) failed"));
    }
    Ok(())
}

/// First list command that exited non-zero, searching the tree top-down.
fn failed_list_command(state: &SectionState) -> Option<&CommandRecord> {
    state
        .nodes
        .iter()
        .filter_map(|node| node.last_list_command())
        .find(|record| record.return_code != 0)
}

/// List and optionally sweep one section, recording its status.
fn run_section(sweeper: &mut Sweeper<'_>, name: &str, cli: &Cli, log: &dyn Log) {
    log.stage(&format!("Section '{name}'"));

    if !sweeper.is_section_present(name) {
        log.error(&format!("section '{name}' not present in profile"));
        log.record_section(name, SectionStatus::NotPresent, None);
        return;
    }

    if let Some(filter) = sweeper.filter(name) {
        log.debug(&format!("filter: {}", filter.pattern()));
    }

    match sweeper.list_action(name) {
        Err(e) => {
            log.error(&format!("{name}: {e}"));
            log.record_section(name, SectionStatus::Failed, Some(&e.to_string()));
            return;
        }
        Ok(ActionOutcome::Skipped) => {
            log.record_section(name, SectionStatus::Skipped, Some("protected run"));
            return;
        }
        Ok(ActionOutcome::Completed { return_code }) if return_code != 0 => {
            if let Some(record) = sweeper
                .results()
                .section(name)
                .and_then(failed_list_command)
            {
                log.error(&format!(
                    "({return_code}) '{}' ERROR: {}",
                    record.command,
                    record.stderr.trim_end()
                ));
            }
            log.record_section(
                name,
                SectionStatus::Failed,
                Some(&format!("list exited with {return_code}")),
            );
            return;
        }
        Ok(ActionOutcome::Completed { .. }) => {}
    }

    if cli.bash_action == Some(BashAction::List) {
        log.record_section(name, SectionStatus::DryRun, None);
        return;
    }

    let Some(state) = sweeper.results().section(name) else {
        return;
    };
    let counts = format!(
        "listed {}, matched {}",
        state.listed_count(),
        state.matched_count()
    );
    log.info(&counts);
    if !cli.stat_only
        && let Some(root) = state.root()
    {
        for scoped in &root.filtered_items {
            log.info(&format!("  {}", scoped.item));
        }
    }

    if cli.stat_only || !cli.sweep {
        log.record_section(name, SectionStatus::Ok, Some(&counts));
        return;
    }

    match sweeper.sweep_action(name) {
        Err(e) => {
            log.error(&format!("{name}: {e}"));
            log.record_section(name, SectionStatus::Failed, Some(&e.to_string()));
        }
        Ok(ActionOutcome::Skipped) => {
            log.record_section(name, SectionStatus::Skipped, Some("protected run"));
        }
        Ok(ActionOutcome::Completed { return_code: 0 }) => {
            let status = if cli.bash_action == Some(BashAction::Sweep) {
                SectionStatus::DryRun
            } else {
                SectionStatus::Ok
            };
            log.record_section(name, status, Some(&counts));
        }
        Ok(ActionOutcome::Completed { return_code }) => {
            log.record_section(
                name,
                SectionStatus::Failed,
                Some(&format!("sweep exited with {return_code}")),
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::ProcessLaunchError;
    use crate::exec::ExecResult;
    use crate::logging::isolated_logger;
    use clap::Parser;

    mockall::mock! {
        pub Exec {}
        impl Executor for Exec {
            fn run(&self, command_line: &str) -> Result<ExecResult, ProcessLaunchError>;
        }
    }

    fn ok(stdout: &str) -> ExecResult {
        ExecResult {
            stdout: stdout.to_string(),
            ..ExecResult::default()
        }
    }

    fn write_profile(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("profile.ini");
        std::fs::write(&path, content).unwrap();
        path
    }

    const PROFILE: &str = "[sweeper]\ncommon_filter = ^vol-\n\
        [volumes]\nlist_action = list-vols\nsweep_action = rm {}\nkey = name\n\
        [broken]\nlist_action = list-broken\nsweep_action = rm {}\nkey = name\n";

    #[test]
    fn missing_profile_is_an_error() {
        let (log, _tmp, _guard) = isolated_logger();
        let cli = Cli::parse_from(["sweeper", "/nonexistent/profile.ini"]);
        let err = run_with_executor(&cli, Arc::new(MockExec::new()), &Arc::new(log)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn sweeps_matched_items_and_records_failures() {
        let (log, tmp, _guard) = isolated_logger();
        let path = write_profile(&tmp, PROFILE);
        let mut exec = MockExec::new();
        exec.expect_run()
            .withf(|c| c == "list-vols")
            .times(1)
            .returning(|_| Ok(ok("vol-1\ntmp-1\n")));
        exec.expect_run()
            .withf(|c| c == "rm vol-1")
            .times(1)
            .returning(|_| Ok(ok("gone\n")));
        exec.expect_run()
            .withf(|c| c == "list-broken")
            .times(1)
            .returning(|_| {
                Ok(ExecResult {
                    code: 3,
                    stderr: "boom".into(),
                    ..ExecResult::default()
                })
            });

        let cli = Cli::parse_from(["sweeper", "--sweep", path.to_str().unwrap()]);
        let log = Arc::new(log);
        run_with_executor(&cli, Arc::new(exec), &log).unwrap();

        let entries = log.section_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, SectionStatus::Ok);
        assert_eq!(entries[0].message.as_deref(), Some("listed 2, matched 1"));
        assert_eq!(entries[1].status, SectionStatus::Failed);
        assert_eq!(log.failure_count(), 1);

        let contents = std::fs::read_to_string(log.log_path().unwrap()).unwrap();
        assert!(contents.contains("<volumes> [debug] filter: ^vol-"));
        assert!(contents.contains("<broken> [error] (3) 'list-broken' ERROR: boom"));
    }

    #[test]
    fn unknown_section_is_recorded_not_present() {
        let (log, tmp, _guard) = isolated_logger();
        let path = write_profile(&tmp, PROFILE);
        let cli = Cli::parse_from([
            "sweeper",
            "--section",
            "nope",
            path.to_str().unwrap(),
        ]);
        let log = Arc::new(log);
        run_with_executor(&cli, Arc::new(MockExec::new()), &log).unwrap();
        let entries = log.section_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, SectionStatus::NotPresent);
    }

    #[test]
    fn list_sections_runs_nothing() {
        let (log, tmp, _guard) = isolated_logger();
        let path = write_profile(&tmp, PROFILE);
        let cli = Cli::parse_from(["sweeper", "-l", path.to_str().unwrap()]);
        let log = Arc::new(log);
        run_with_executor(&cli, Arc::new(MockExec::new()), &log).unwrap();
        assert!(log.section_entries().is_empty());
    }

    #[test]
    fn stat_only_never_sweeps() {
        let (log, tmp, _guard) = isolated_logger();
        let path = write_profile(&tmp, PROFILE);
        let mut exec = MockExec::new();
        exec.expect_run()
            .withf(|c| c == "list-vols")
            .returning(|_| Ok(ok("vol-1\n")));
        let cli = Cli::parse_from([
            "sweeper",
            "-s",
            "--section",
            "volumes",
            path.to_str().unwrap(),
        ]);
        let log = Arc::new(log);
        run_with_executor(&cli, Arc::new(exec), &log).unwrap();
        assert_eq!(log.section_entries()[0].status, SectionStatus::Ok);
    }

    #[test]
    fn invalid_filter_override_fails_the_run() {
        let (log, tmp, _guard) = isolated_logger();
        let path = write_profile(&tmp, PROFILE);
        let cli = Cli::parse_from(["sweeper", "-f", "(", path.to_str().unwrap()]);
        let err = run_with_executor(&cli, Arc::new(MockExec::new()), &Arc::new(log)).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid filter pattern"));
    }

    #[test]
    fn bash_list_records_dry_run() {
        let (log, tmp, _guard) = isolated_logger();
        let path = write_profile(&tmp, PROFILE);
        let cli = Cli::parse_from([
            "sweeper",
            "--bash-action",
            "list",
            path.to_str().unwrap(),
        ]);
        let log = Arc::new(log);
        run_with_executor(&cli, Arc::new(MockExec::new()), &log).unwrap();
        let entries = log.section_entries();
        assert!(entries.iter().all(|e| e.status == SectionStatus::DryRun));
        let contents = std::fs::read_to_string(log.log_path().unwrap()).unwrap();
        assert!(contents.contains("[bash] list-vols"));
        assert!(contents.contains("[bash] list-broken"));
        assert!(contents.contains("<volumes> [bash] list-vols"));
    }
}
