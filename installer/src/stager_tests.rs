//! Unit tests for planning and committing payload files.

use super::*;
use keg::install_rule::Shell;
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Payload {
    _temp: TempDir,
    root: Utf8PathBuf,
    layout: PrefixLayout,
}

#[fixture]
fn payload() -> Payload {
    let temp = tempfile::tempdir().expect("temp dir");
    let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp dir");
    let root = base.join("payload");
    fs::create_dir_all(root.join("completions")).expect("payload dirs");
    fs::write(root.join("unity3d"), b"#!/bin/sh\n").expect("write binary");
    fs::write(root.join("completions/unity3d.zsh"), b"#compdef unity3d\n")
        .expect("write completion");
    Payload {
        _temp: temp,
        root,
        layout: PrefixLayout::new(base.join("prefix")),
    }
}

fn rules() -> Vec<InstallRule> {
    vec![
        InstallRule::new("unity3d", DestinationRole::ExecutableDir, None).expect("bin rule"),
        InstallRule::new(
            "completions/unity3d.zsh",
            DestinationRole::Completion(Shell::Zsh),
            Some("_unity3d"),
        )
        .expect("completion rule"),
    ]
}

fn leftovers(dir: &Utf8Path) -> Vec<String> {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .filter(|name| name.starts_with('.'))
                .collect()
        })
        .unwrap_or_default()
}

#[rstest]
fn plan_resolves_destinations_without_writing(payload: Payload) {
    let stager = Stager::plan(&rules(), &payload.root, &payload.layout).expect("plan");

    let destinations: Vec<_> = stager.files().iter().map(PlannedFile::destination).collect();
    assert_eq!(
        destinations,
        [
            payload.layout.bin_dir().join("unity3d"),
            payload
                .layout
                .completion_dir(Shell::Zsh)
                .join("_unity3d"),
        ]
    );
    assert!(!payload.layout.prefix().exists());
}

#[rstest]
fn plan_rejects_missing_source(payload: Payload) {
    let rule = InstallRule::new("unity3d-extra", DestinationRole::ExecutableDir, None)
        .expect("rule");

    let err = Stager::plan(&[rule], &payload.root, &payload.layout).expect_err("missing");

    assert!(
        matches!(&err, StageError::MissingSource { path } if path == "unity3d-extra"),
        "got {err}"
    );
}

#[rstest]
fn plan_rejects_directory_source(payload: Payload) {
    let rule = InstallRule::new("completions", DestinationRole::ExecutableDir, None)
        .expect("rule");

    let err = Stager::plan(&[rule], &payload.root, &payload.layout).expect_err("directory");

    assert!(matches!(err, StageError::NotAFile { .. }));
}

#[rstest]
fn plan_rejects_directory_at_destination(payload: Payload) {
    fs::create_dir_all(payload.layout.bin_dir().join("unity3d")).expect("occupy");

    let err = Stager::plan(&rules(), &payload.root, &payload.layout).expect_err("occupied");

    assert!(matches!(err, StageError::DestinationIsDirectory { .. }));
}

#[cfg(unix)]
#[rstest]
fn commit_applies_role_permissions(payload: Payload) {
    use std::os::unix::fs::PermissionsExt;

    let stager = Stager::plan(&rules(), &payload.root, &payload.layout).expect("plan");
    let installed = stager.commit().expect("commit");

    let modes: Vec<u32> = installed
        .iter()
        .map(|path| {
            fs::metadata(path)
                .expect("installed file")
                .permissions()
                .mode()
                & 0o777
        })
        .collect();
    assert_eq!(modes, [0o755, 0o644]);
}

#[rstest]
fn commit_leaves_no_staging_files(payload: Payload) {
    let stager = Stager::plan(&rules(), &payload.root, &payload.layout).expect("plan");
    stager.commit().expect("first commit");
    stager.commit().expect("second commit");

    assert!(leftovers(&payload.layout.bin_dir()).is_empty());
    assert!(leftovers(&payload.layout.completion_dir(Shell::Zsh)).is_empty());
    assert_eq!(
        fs::read(payload.layout.bin_dir().join("unity3d")).expect("read"),
        b"#!/bin/sh\n"
    );
}

#[rstest]
fn commit_replaces_existing_file(payload: Payload) {
    let target = payload.layout.bin_dir().join("unity3d");
    fs::create_dir_all(payload.layout.bin_dir()).expect("bin dir");
    fs::write(&target, b"old").expect("old binary");

    let stager = Stager::plan(&rules(), &payload.root, &payload.layout).expect("plan");
    stager.commit().expect("commit");

    assert_eq!(fs::read(&target).expect("read"), b"#!/bin/sh\n");
}

#[rstest]
fn failed_directory_creation_leaves_prefix_untouched(payload: Payload) {
    let bin = payload.layout.bin_dir();
    fs::create_dir_all(&bin).expect("bin dir");
    fs::write(bin.join("unity3d"), b"old").expect("old binary");
    // A file where the completion tree should be makes directory creation fail.
    let share = payload.layout.prefix().join("share");
    fs::write(&share, b"not a directory").expect("blocker");

    let stager = Stager::plan(&rules(), &payload.root, &payload.layout).expect("plan");
    let err = stager.commit().expect_err("commit fails");

    assert!(matches!(err, StageError::Io { .. }), "got {err}");
    assert_eq!(fs::read(bin.join("unity3d")).expect("read"), b"old");
    assert!(leftovers(&bin).is_empty());
    assert!(share.is_file());
}

#[rstest]
fn failed_swap_rolls_back_earlier_files(payload: Payload) {
    let bin = payload.layout.bin_dir();
    let zsh = payload.layout.completion_dir(Shell::Zsh);
    fs::create_dir_all(&bin).expect("bin dir");
    fs::create_dir_all(&zsh).expect("zsh dir");
    fs::write(bin.join("unity3d"), b"old binary").expect("old binary");
    fs::write(zsh.join("_unity3d"), b"old completion").expect("old completion");
    // A directory squatting on the completion's backup path cannot be
    // removed as a stale backup, so the second swap fails after the first
    // one has landed.
    let squatter = zsh.join("._unity3d.keg-backup");
    fs::create_dir_all(squatter.join("keep")).expect("squatter");

    let stager = Stager::plan(&rules(), &payload.root, &payload.layout).expect("plan");
    let err = stager.commit().expect_err("second swap fails");

    assert!(matches!(err, StageError::Io { .. }), "got {err}");
    assert_eq!(fs::read(bin.join("unity3d")).expect("read"), b"old binary");
    assert_eq!(fs::read(zsh.join("_unity3d")).expect("read"), b"old completion");
    assert!(leftovers(&bin).is_empty(), "left: {:?}", leftovers(&bin));
    assert_eq!(leftovers(&zsh), ["._unity3d.keg-backup"]);
}

#[rstest]
fn failed_commit_removes_created_directories(payload: Payload) {
    fs::create_dir_all(payload.layout.prefix()).expect("prefix");
    let share = payload.layout.prefix().join("share");
    fs::write(&share, b"not a directory").expect("blocker");

    let stager = Stager::plan(&rules(), &payload.root, &payload.layout).expect("plan");
    stager.commit().expect_err("commit fails");

    assert!(!payload.layout.bin_dir().exists());
    assert!(payload.layout.prefix().exists());
}
