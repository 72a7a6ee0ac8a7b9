// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line specs
//!
//! Verify how `wardend` flags turn into a daemon configuration.

use crate::prelude::*;
use clap::Parser;
use wd_daemon::{Args, Config};

fn parse(args: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("wardend").chain(args.iter().copied())).unwrap()
}

#[test]
fn config_dir_directory_becomes_toml_glob() {
    let project = Project::empty();
    let jobs = project.path().join("jobs");
    let state = project.state_path();
    let locks = project.lock_dir();

    let args = parse(&[
        "--config-dir",
        jobs.to_str().unwrap(),
        "--config-dir",
        "/etc/warden/extra/*.conf.toml",
        "--state-file",
        state.to_str().unwrap(),
        "--lock-dir",
        locks.to_str().unwrap(),
    ]);
    let config = Config::from_args(&args).unwrap();

    similar_asserts::assert_eq!(
        config.patterns,
        vec![format!("{}/*.toml", jobs.display()), "/etc/warden/extra/*.conf.toml".to_string()]
    );
    assert_eq!(config.state_path, state);
    assert_eq!(config.lock_dir, locks);
    assert!(!config.watch);
}

#[test]
fn modules_flag_accepts_comma_list() {
    let args = parse(&["--modules", "example,other", "--watch"]);
    assert_eq!(args.modules, vec!["example", "other"]);
    assert!(args.watch);
}

#[test]
fn unknown_flag_is_rejected() {
    assert!(Args::try_parse_from(["wardend", "--frobnicate"]).is_err());
}
