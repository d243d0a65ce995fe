use clap::Parser;
use soundboard::cli::{Cli, Cmd, ConfigCmd, ConfigField, ReplCommand};

#[test]
fn test_default_runs_board() {
    let cli = Cli::try_parse_from(["soundboard"]).unwrap();
    assert!(cli.cmd.is_none());
    assert_eq!(cli.capacity, None);
    assert!(!cli.allow_implicit_overwrite);
}

#[test]
fn test_board_flags() {
    let cli =
        Cli::try_parse_from(["soundboard", "--capacity", "12", "--allow-implicit-overwrite"])
            .unwrap();
    assert_eq!(cli.capacity, Some(12));
    assert!(cli.allow_implicit_overwrite);
}

#[test]
fn test_capacity_must_be_number() {
    assert!(Cli::try_parse_from(["soundboard", "--capacity", "many"]).is_err());
}

#[test]
fn test_config_set_fields() {
    let cases = [
        (vec!["capacity", "16"], ConfigField::Capacity { value: 16 }),
        (vec!["overwrite", "true"], ConfigField::Overwrite { enabled: true }),
        (
            vec!["recordings-dir", "/tmp/board"],
            ConfigField::RecordingsDir {
                path: "/tmp/board".into(),
            },
        ),
    ];

    for (args, expected) in cases {
        let argv = ["soundboard", "config", "set"].into_iter().chain(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.cmd {
            Some(Cmd::Config {
                action: ConfigCmd::Set { field },
            }) => assert_eq!(field, expected),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

#[test]
fn test_config_show() {
    let cli = Cli::try_parse_from(["soundboard", "config", "show"]).unwrap();
    assert!(matches!(
        cli.cmd,
        Some(Cmd::Config {
            action: ConfigCmd::Show
        })
    ));
}

#[test]
fn test_unknown_subcommand_rejected() {
    assert!(Cli::try_parse_from(["soundboard", "record"]).is_err());
}

#[test]
fn test_repl_commands() {
    assert_eq!(ReplCommand::parse("r"), Some(ReplCommand::Toggle));
    assert_eq!(ReplCommand::parse("  p 3 "), Some(ReplCommand::Press(3)));
    assert_eq!(ReplCommand::parse("clear 10"), Some(ReplCommand::Clear(10)));
    assert_eq!(ReplCommand::parse("s"), Some(ReplCommand::Status));
    assert_eq!(ReplCommand::parse("q"), Some(ReplCommand::Quit));
}

#[test]
fn test_repl_rejects_malformed_lines() {
    assert_eq!(ReplCommand::parse(""), None);
    assert_eq!(ReplCommand::parse("p"), None);
    assert_eq!(ReplCommand::parse("p x"), None);
    assert_eq!(ReplCommand::parse("p 1 2"), None);
    assert_eq!(ReplCommand::parse("r 1"), None);
    assert_eq!(ReplCommand::parse("dance"), None);
}
