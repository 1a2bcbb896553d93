//! Tests for checksum, completions, man and global flags.

use super::parse;
use crate::cli::CliCommand;
use clap_complete::Shell;
use std::path::Path;

#[test]
fn cli_parse_checksum() {
    match parse(&["powerloader", "checksum", "/tmp/file.bin"]).command {
        CliCommand::Checksum { path } => assert_eq!(path, Path::new("/tmp/file.bin")),
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["powerloader", "completions", "bash"]).command {
        CliCommand::Completions { shell } => assert_eq!(shell, Shell::Bash),
        _ => panic!("expected Completions"),
    }
}

#[test]
fn cli_parse_man() {
    assert!(matches!(
        parse(&["powerloader", "man"]).command,
        CliCommand::Man
    ));
}

#[test]
fn cli_parse_global_flags_before_subcommand() {
    let cli = parse(&[
        "powerloader",
        "-v",
        "--config",
        "/etc/powerloader.toml",
        "checksum",
        "f",
    ]);
    assert!(cli.verbose);
    assert_eq!(cli.config.as_deref(), Some(Path::new("/etc/powerloader.toml")));
}

#[test]
fn cli_debug_assert() {
    use clap::CommandFactory;
    crate::cli::Cli::command().debug_assert();
}
