#![cfg(unix)]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the sweeper run loop against real processes.
//!
//! Profiles list with `printf`/`echo` and sweep with `touch`, so each test
//! checks which items were swept by looking at the scratch directory.

mod common;

use janitor::logging::SectionStatus;

const VOLUMES_LIST: &str = r"printf vol-1\nvol-2\ntmp-1\n";

fn volumes() -> common::TestContextBuilder {
    common::TestContextBuilder::new()
        .global("common_filter", "^vol-")
        .section(
            "volumes",
            &[
                ("list_action", VOLUMES_LIST),
                ("sweep_action", "touch @OUT@/{}"),
                ("key", "name"),
            ],
        )
}

// ---------------------------------------------------------------------------
// Listing and sweeping
// ---------------------------------------------------------------------------

/// Without `--sweep` the matched items are only listed.
#[test]
fn list_only_does_not_sweep() {
    let ctx = volumes().build();
    let (result, log) = ctx.run(&[]);
    result.unwrap();
    assert!(!ctx.touched("vol-1"));
    let entries = log.section_entries();
    assert_eq!(entries[0].status, SectionStatus::Ok);
    assert_eq!(entries[0].message.as_deref(), Some("listed 3, matched 2"));
}

/// `--sweep` runs the sweep action for every matched raw line.
#[test]
fn sweep_runs_for_matched_lines_only() {
    let ctx = volumes().build();
    let (result, log) = ctx.run(&["--sweep"]);
    result.unwrap();
    assert!(ctx.touched("vol-1"));
    assert!(ctx.touched("vol-2"));
    assert!(!ctx.touched("tmp-1"), "filter is anchored at the start");
    assert!(!log.has_failures());
}

/// `--filter-regex` overrides the profile filter.
#[test]
fn filter_override_selects_other_items() {
    let ctx = volumes().build();
    let (result, _log) = ctx.run(&["--sweep", "-f", "tmp"]);
    result.unwrap();
    assert!(ctx.touched("tmp-1"));
    assert!(!ctx.touched("vol-1"));
}

/// JSON listings are filtered on the configured field.
#[test]
fn json_listing_filters_on_field() {
    let ctx = common::TestContextBuilder::new()
        .global("common_filter", "^x1$")
        .section(
            "servers",
            &[
                (
                    "list_action",
                    r#"echo [{"name":"x1","status":"ACTIVE"},{"name":"x2","status":"ERROR"}]"#,
                ),
                ("sweep_action", "touch @OUT@/{}"),
                ("key", "name"),
                ("output_format", "json"),
                ("filter_field", "name"),
            ],
        )
        .build();
    let (result, _log) = ctx.run(&["--sweep"]);
    result.unwrap();
    assert!(ctx.touched("x1"));
    assert!(!ctx.touched("x2"));
}

/// An action map lists children with parent values substituted in.
#[test]
fn action_map_sweeps_children_of_matched_parents() {
    let ctx = common::TestContextBuilder::new()
        .global("common_filter", "^srv-1")
        .section(
            "servers",
            &[
                ("action_map", "server.volume"),
                ("server_list_action", r"printf srv-1\nsrv-2\n"),
                ("server_sweep_action", "touch @OUT@/{}"),
                ("server_key", "name"),
                ("volume_list_action", "echo"),
                ("volume_sweep_action", "touch @OUT@/{}"),
                ("volume_key", "name"),
                ("volume_as_child_options", "{}-vol:item.server.raw"),
            ],
        )
        .build();
    let (result, log) = ctx.run(&["--sweep"]);
    result.unwrap();
    assert!(ctx.touched("srv-1"));
    assert!(ctx.touched("srv-1-vol"));
    assert!(!ctx.touched("srv-2"));
    assert!(!ctx.touched("srv-2-vol"));
    assert!(!log.has_failures());
}

/// Colon separators, `;` comments and continuation lines are understood,
/// and a `#` stays part of the command.
#[test]
fn configparser_style_profile_runs() {
    let ctx = common::TestContextBuilder::new().build();
    ctx.write_profile(
        "[sweeper]\n\
         common_filter: ^vol- ; volumes only\n\
         \n\
         [volumes]\n\
         list_action: printf\n\
         \tvol-1\\nvol-2\\ntmp-1\\n\n\
         sweep_action = touch @OUT@/{} @OUT@/#kept\n\
         key: name\n",
    );
    let (result, log) = ctx.run(&["--sweep"]);
    result.unwrap();
    assert!(ctx.touched("vol-1"));
    assert!(ctx.touched("vol-2"));
    assert!(!ctx.touched("tmp-1"));
    assert!(ctx.touched("#kept"));
    assert!(!log.has_failures());
}

// ---------------------------------------------------------------------------
// Failure policy
// ---------------------------------------------------------------------------

/// A failing section does not fail the run, but protected sections after it
/// are skipped without running anything.
#[test]
fn failure_skips_later_protected_sections() {
    let ctx = common::TestContextBuilder::new()
        .global("common_filter", ".")
        .section(
            "broken",
            &[
                ("list_action", "false"),
                ("sweep_action", "true {}"),
                ("key", "name"),
            ],
        )
        .section(
            "guarded",
            &[
                ("list_action", "touch @OUT@/guarded-listed"),
                ("sweep_action", "true {}"),
                ("key", "name"),
                ("protected_run", "true"),
            ],
        )
        .build();
    let (result, log) = ctx.run(&["--sweep"]);
    result.unwrap();
    assert!(!ctx.touched("guarded-listed"));
    let entries = log.section_entries();
    assert_eq!(entries[0].status, SectionStatus::Failed);
    assert_eq!(entries[1].status, SectionStatus::Skipped);
}

/// Sweep failures are retried and then reported in the summary.
#[test]
fn failing_sweep_is_retried_and_reported() {
    let ctx = common::TestContextBuilder::new()
        .global("common_filter", "^vol-")
        .section(
            "volumes",
            &[
                ("list_action", VOLUMES_LIST),
                ("sweep_action", "false {}"),
                ("key", "name"),
                ("retry", "1"),
                ("timeout", "1"),
            ],
        )
        .build();
    let (result, log) = ctx.run(&["--sweep"]);
    result.unwrap();
    let entries = log.section_entries();
    assert_eq!(entries[0].status, SectionStatus::Failed);
    assert_eq!(entries[0].message.as_deref(), Some("sweep exited with 1"));
}

/// A command that cannot be launched fails only its own section.
#[test]
fn unlaunchable_command_fails_section() {
    let ctx = volumes()
        .section(
            "ghost",
            &[
                ("list_action", "this-program-does-not-exist-12345"),
                ("sweep_action", "true {}"),
                ("key", "name"),
            ],
        )
        .build();
    let (result, log) = ctx.run(&[]);
    result.unwrap();
    let entries = log.section_entries();
    assert_eq!(entries[0].status, SectionStatus::Ok);
    assert_eq!(entries[1].status, SectionStatus::Failed);
    assert!(
        entries[1]
            .message
            .as_deref()
            .unwrap()
            .contains("FailedToOpenProcess")
    );
}

// ---------------------------------------------------------------------------
// Profile errors and modes
// ---------------------------------------------------------------------------

/// An action-map segment without keys is a configuration error.
#[test]
fn unresolved_segment_fails_the_run() {
    let ctx = common::TestContextBuilder::new()
        .global("common_filter", ".")
        .section(
            "x",
            &[
                ("action_map", "x.y"),
                ("x_list_action", "echo a"),
                ("x_sweep_action", "true {}"),
                ("x_key", "name"),
            ],
        )
        .build();
    let (result, _log) = ctx.run(&[]);
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("'y_*'"), "got {err:#}");
}

/// A missing profile is an error.
#[test]
fn missing_profile_fails() {
    let ctx = volumes().build();
    std::fs::remove_file(ctx.profile_path()).unwrap();
    let (result, _log) = ctx.run(&[]);
    assert!(result.unwrap_err().to_string().contains("not found"));
}

/// `--bash-action sweep` lists for real but only prints sweep commands.
#[test]
fn bash_sweep_does_not_run_sweep_commands() {
    let ctx = volumes().build();
    let (result, log) = ctx.run(&["--sweep", "--bash-action", "sweep"]);
    result.unwrap();
    assert!(!ctx.touched("vol-1"));
    assert_eq!(log.section_entries()[0].status, SectionStatus::DryRun);
}

/// `--section` restricts the run to one section.
#[test]
fn single_section_runs_alone() {
    let ctx = volumes()
        .section(
            "other",
            &[
                ("list_action", "touch @OUT@/other-listed"),
                ("sweep_action", "true {}"),
                ("key", "name"),
            ],
        )
        .build();
    let (result, log) = ctx.run(&["--section", "volumes"]);
    result.unwrap();
    assert!(!ctx.touched("other-listed"));
    assert_eq!(log.section_entries().len(), 1);
}
