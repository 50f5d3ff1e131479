//! cubesound - Interactive player
//!
//! Drives the audio subsystem from a line-based console, for trying sound
//! archives, music folders and soundpacks without a game.
//!
//! # Usage
//!
//! ```bash
//! cubesound-player
//! cubesound-player --config audio.toml --music-volume 0
//! cubesound-player --null          # no audio device
//! ```
//!
//! # Commands
//!
//! - `dig <group>` / `step <group>`: play a block sound (name or id)
//! - `play <channel> <id> [volume] [rate]`: server-style play request
//! - `sounds <0-100>` / `music <0-100>`: change volumes
//! - `chat <message>`: feed a chat line (`SOUNDPACK:<url>` triggers a pack)
//! - `pack <url>`: request a soundpack
//! - `yes|always|no|never <url>`: answer a soundpack prompt
//! - `focus on|off`, `save`, `quit`

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use cubesound::soundpack::PackPrompt;
use cubesound::{
    AudioConfig, AudioServices, AudioSystem, NullBackend, PromptChoice, RetrieveOutcome,
    find_group,
};

#[derive(Parser)]
#[command(name = "cubesound-player")]
#[command(author, version, about = "cubesound - interactive audio player")]
struct Args {
    /// Config file (default: platform config dir, audio.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the sounds volume (0-100)
    #[arg(long)]
    sounds_volume: Option<u8>,

    /// Override the music volume (0-100)
    #[arg(long)]
    music_volume: Option<u8>,

    /// Run without an audio device
    #[arg(long)]
    null: bool,
}

/// Asks on the console; the answer arrives as a later command
struct ConsolePrompt;

impl PackPrompt for ConsolePrompt {
    fn request(&self, url: &str) {
        println!("Server wants to use soundpack {}", url);
        println!("  answer with: yes|always|no|never {}", url);
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AudioConfig::load_from(path),
        None => AudioConfig::load(),
    };
    if let Some(volume) = args.sounds_volume {
        config.sounds_volume = volume;
    }
    if let Some(volume) = args.music_volume {
        config.music_volume = volume;
    }

    let mut services = AudioServices {
        prompt: Box::new(ConsolePrompt),
        ..AudioServices::default()
    };
    if args.null {
        services.backend = Box::new(NullBackend::new());
    }

    let mut audio = AudioSystem::new(config, services);
    audio.start();
    info!(
        "Sounds volume {}, music volume {}",
        audio.sounds_volume(),
        audio.music_volume()
    );

    let stdin = io::stdin();
    prompt_line()?;
    for line in stdin.lock().lines() {
        let line = line.context("failed to read command")?;
        match run_command(&mut audio, &args, line.trim()) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("error: {:#}", e),
        }
        prompt_line()?;
    }

    audio.shutdown();
    Ok(())
}

fn prompt_line() -> Result<()> {
    print!("> ");
    io::stdout().flush()?;
    Ok(())
}

/// Run one command; `Ok(false)` quits
fn run_command(audio: &mut AudioSystem, args: &Args, line: &str) -> Result<bool> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "" => {}
        "quit" | "exit" => return Ok(false),
        "dig" => audio.play_dig(parse_group(rest)?),
        "step" => audio.play_step(parse_group(rest)?),
        "play" => {
            let mut fields = rest.split_whitespace();
            let channel = parse_field(fields.next(), "channel")?;
            let id = parse_field(fields.next(), "id")?;
            let volume = fields.next().map_or(Ok(255), |v| parse_field(Some(v), "volume"))?;
            let rate = fields.next().map_or(Ok(100), |v| parse_field(Some(v), "rate"))?;
            audio.play_sound(channel, id, volume, rate);
        }
        "sounds" => {
            audio.set_sounds_volume(parse_field(Some(rest), "volume")?);
            println!("sounds volume {}", audio.sounds_volume());
        }
        "music" => {
            audio.set_music_volume(parse_field(Some(rest), "volume")?);
            println!("music volume {}", audio.music_volume());
        }
        "chat" => {
            if !audio.handle_chat_message(rest) {
                println!("(not a soundpack trigger)");
            }
        }
        "pack" => match audio.retrieve_sound_pack(rest) {
            RetrieveOutcome::Ignored(reason) => println!("ignored: {:?}", reason),
            RetrieveOutcome::AwaitingDecision => {}
            RetrieveOutcome::Extracted(result) => report_pack(result.map_err(Into::into)),
        },
        "yes" | "always" | "no" | "never" => {
            let choice = match command {
                "yes" => PromptChoice::Yes,
                "always" => PromptChoice::AlwaysYes,
                "no" => PromptChoice::No,
                _ => PromptChoice::AlwaysNo,
            };
            if let Some(result) = audio.resolve_prompt(rest, choice) {
                report_pack(result.map_err(Into::into));
            }
        }
        "focus" => audio.set_focus(rest != "off"),
        "save" => {
            let saved = match &args.config {
                Some(path) => audio.config().save_to(path),
                None => audio.config().save(),
            };
            saved.context("failed to save config")?;
            println!("saved");
        }
        other => bail!("unknown command '{}'", other),
    }
    Ok(true)
}

fn report_pack(result: Result<usize>) {
    match result {
        Ok(count) => println!("soundpack registered {} sounds", count),
        Err(e) => println!("soundpack failed: {:#}", e),
    }
}

/// Group by canonical name or numeric id
fn parse_group(text: &str) -> Result<u16> {
    if let Some(id) = find_group(text) {
        return Ok(id);
    }
    text.parse()
        .with_context(|| format!("unknown sound group '{}'", text))
}

fn parse_field<T: std::str::FromStr>(text: Option<&str>, name: &str) -> Result<T> {
    let text = text.filter(|t| !t.is_empty());
    let Some(text) = text else {
        bail!("missing {}", name);
    };
    match text.parse() {
        Ok(value) => Ok(value),
        Err(_) => bail!("invalid {} '{}'", name, text),
    }
}
