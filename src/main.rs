//! soundboard: ターミナルから操作するサウンドボード。
//!
//! 標準入力の 1 行コマンドを録音トグル・スロット押下・長押しに変換して
//! `SoundboardController` に渡し、発行されたイベントを標準出力に表示します。
//! ログは標準エラーへ出力します (`RUST_LOG` で調整)。
use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use soundboard::{
    ServiceContainer, SoundboardEvent,
    application::{ControllerConfig, SlotPressOutcome, SoundboardController, ToggleOutcome},
    cli::{Cli, Cmd, ConfigCmd, ConfigField, REPL_HELP, ReplCommand},
    infrastructure::config::{AppConfig, config_path},
    utils::{config::EnvConfig, env::load_env},
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // .env 読み込み (SOUNDBOARD_ENV_PATH > .env)
    load_env();
    EnvConfig::init();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Some(Cmd::Config { action }) => handle_config(action),
        None => run_board(cli.capacity, cli.allow_implicit_overwrite).await,
    }
}

fn handle_config(action: ConfigCmd) -> Result<(), Box<dyn Error>> {
    let mut settings = AppConfig::load();
    match action {
        ConfigCmd::Show => {
            println!("config file: {}", config_path()?.display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
            let env = EnvConfig::get();
            println!(
                "recordings dir (effective): {}",
                settings.recordings_dir(&env).display()
            );
        }
        ConfigCmd::Set { field } => {
            match field {
                ConfigField::Capacity { value } => {
                    ControllerConfig {
                        capacity: value,
                        ..ControllerConfig::default()
                    }
                    .validate()?;
                    settings.capacity = Some(value);
                }
                ConfigField::Overwrite { enabled } => settings.allow_implicit_overwrite = enabled,
                ConfigField::RecordingsDir { path } => settings.recordings_dir = Some(path),
            }
            settings.save()?;
            println!("✅ saved");
        }
    }
    Ok(())
}

async fn run_board(
    capacity: Option<usize>,
    allow_implicit_overwrite: bool,
) -> Result<(), Box<dyn Error>> {
    let env = EnvConfig::get();
    let settings = AppConfig::load();

    let mut config = ControllerConfig::resolve(&settings, &env);
    if let Some(capacity) = capacity {
        config.capacity = capacity;
    }
    config.allow_implicit_overwrite |= allow_implicit_overwrite;

    let recordings_dir = settings.recordings_dir(&env);
    info!(
        capacity = config.capacity,
        overwrite = config.allow_implicit_overwrite,
        dir = %recordings_dir.display(),
        "starting soundboard"
    );

    let mut container = ServiceContainer::new(
        config,
        recordings_dir,
        env.input_device_priority.clone(),
    )?;
    let controller = container.controller.clone();

    if let Some(mut rx) = container.take_event_rx() {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                print_event(&event);
            }
        });
    }

    println!("{REPL_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(cmd) = ReplCommand::parse(&line) else {
            if !line.trim().is_empty() {
                println!("? {REPL_HELP}");
            }
            continue;
        };

        match cmd {
            ReplCommand::Status => match controller.snapshot() {
                Ok(snapshot) => print_grid(&snapshot.recorded_flags(), snapshot.recording),
                Err(e) => warn!(error = %e, "snapshot failed"),
            },
            ReplCommand::Help => println!("{REPL_HELP}"),
            ReplCommand::Quit => break,
            // デバイス待ちの間も次の行を受け付けるため、インテントは別タスクで処理する
            intent => {
                tokio::spawn(run_intent(controller.clone(), intent));
            }
        }
    }

    controller.shutdown().await?;
    info!("soundboard stopped");
    Ok(())
}

/// エラーはイベントとしても通知されるため、ここでは結果のみ扱う
async fn run_intent(controller: Arc<SoundboardController>, cmd: ReplCommand) {
    match cmd {
        ReplCommand::Toggle => match controller.on_record_toggle().await {
            Ok(ToggleOutcome::Started { slot, .. }) => println!("● recording → slot {slot}"),
            Ok(ToggleOutcome::Stopped { slot, .. }) => println!("■ saved to slot {slot}"),
            Err(e) => warn!(error = %e, "toggle failed"),
        },
        ReplCommand::Press(index) => match controller.on_slot_press(index).await {
            Ok(SlotPressOutcome::Playing { session_id }) => {
                println!("▶ slot {index} (session {session_id})")
            }
            Ok(SlotPressOutcome::RecordingStarted { slot, .. }) => {
                println!("● recording → slot {slot}")
            }
            Ok(SlotPressOutcome::Ignored) => println!("(ignored while recording)"),
            Err(e) => warn!(error = %e, "press failed"),
        },
        ReplCommand::Clear(index) => match controller.on_slot_long_press(index).await {
            Ok(true) => println!("✕ slot {index} cleared"),
            Ok(false) => println!("slot {index} is already empty"),
            Err(e) => warn!(error = %e, "clear failed"),
        },
        ReplCommand::Status | ReplCommand::Help | ReplCommand::Quit => {}
    }
}

fn print_event(event: &SoundboardEvent) {
    match event {
        SoundboardEvent::PlaybackFinished { session_id } => {
            println!("  playback {session_id} finished")
        }
        SoundboardEvent::Error(e) => println!("  ⚠ {e}"),
        _ => {}
    }
}

/// 9 列で表示。`#` 録音済み、`.` 空、`*` 録音先
fn print_grid(flags: &[bool], recording: Option<usize>) {
    for (row, chunk) in flags.chunks(9).enumerate() {
        let cells: String = chunk
            .iter()
            .enumerate()
            .map(|(col, &recorded)| {
                if recording == Some(row * 9 + col) {
                    '*'
                } else if recorded {
                    '#'
                } else {
                    '.'
                }
            })
            .collect();
        println!("{:>3} {cells}", row * 9);
    }
}
