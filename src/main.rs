//! webpodcast command line
//!
//! Reads an article, turns it into a two-speaker dialogue and plays it with
//! live captions. While playing, single-letter commands on stdin control
//! playback: `p` pause, `r` resume, `s` stop, `+`/`-` speed, `q` quit.

use anyhow::{bail, Context};
use log::{debug, error, info, warn};
use std::path::Path;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines, Stdin};
use webpodcast::captions::CaptionPrinter;
use webpodcast::dialogue::{convert_to_dialogue, HttpGenerator, TextGenerator};
use webpodcast::playback::{follow_registry, DialogueSequencer, PauseMode};
use webpodcast::speech::channel::list_voices;
use webpodcast::speech::{create_channel, share};
use webpodcast::state::config::Config;
use webpodcast::state::{clamp_speed, Settings};

const SPEED_STEP: f32 = 0.25;

const USAGE: &str = "Usage: webpodcast [-d|--debug] [--title TITLE] [--speed X] [--list-voices] <FILE|->";

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    debug: bool,
    title: Option<String>,
    speed: Option<f32>,
    list_voices: bool,
    input: Option<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-d" | "--debug" => parsed.debug = true,
            "--list-voices" => parsed.list_voices = true,
            "--title" => {
                parsed.title = Some(args.next().ok_or("--title needs a value")?);
            }
            "--speed" => {
                let value = args.next().ok_or("--speed needs a value")?;
                let speed = value
                    .parse::<f32>()
                    .map_err(|_| format!("invalid speed '{}'", value))?;
                parsed.speed = Some(clamp_speed(speed));
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            "-" => parsed.input = Some(arg),
            flag if flag.starts_with('-') => return Err(format!("unknown option '{}'", flag)),
            _ if parsed.input.is_none() => parsed.input = Some(arg),
            _ => return Err(format!("unexpected argument '{}'", arg)),
        }
    }

    Ok(parsed)
}

fn init_logging(debug_mode: bool) {
    if debug_mode {
        // Debug mode: write to webpodcast.log
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("webpodcast.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open webpodcast.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "webpodcast version {} starting (debug mode, logging to webpodcast.log)",
            webpodcast::VERSION
        );
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Error)
            .parse_default_env()
            .init();
    }
}

#[tokio::main]
async fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            if message != USAGE {
                eprintln!("{}", USAGE);
            }
            process::exit(2);
        }
    };

    init_logging(args.debug);

    if let Err(e) = run(args).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = Config::load().context("loading configuration")?;
    info!("Config loaded from {:?}", config.path());

    let channel = share(create_channel(config.backend())?);

    if args.list_voices {
        for voice in list_voices(&channel)? {
            let marker = if voice.is_default { " (default)" } else { "" };
            println!("{}{}", voice, marker);
        }
        return Ok(());
    }

    let Some(input) = args.input.as_deref() else {
        bail!("no input given\n{}", USAGE);
    };
    let text = read_article(input).await?;
    let title = args.title.clone().unwrap_or_else(|| title_from(input));

    let mut settings = config.settings();
    if let Some(speed) = args.speed {
        settings.speed = speed;
    }

    let generator = config.generator().map(HttpGenerator::new).transpose()?;
    if let Some(generator) = &generator {
        tokio::spawn(report_load_progress(generator.progress()));
    }

    println!("Converting \"{}\"...", title);
    let segments = convert_to_dialogue(
        generator.as_ref().map(|g| g as &dyn TextGenerator),
        &text,
        &title,
    )
    .await?;
    info!("Dialogue has {} segments", segments.len());

    let sequencer = Arc::new(
        DialogueSequencer::new(Arc::clone(&channel), settings.playback())
            .with_speaker_pause(config.speaker_pause()),
    );
    tokio::spawn(follow_registry(Arc::clone(&sequencer)));

    // stdin carries the article when reading from '-'
    let mut commands = if input == "-" {
        None
    } else {
        println!("Commands: p pause, r resume, s stop, + faster, - slower, q quit");
        Some(BufReader::new(tokio::io::stdin()).lines())
    };

    let captions = CaptionPrinter::stdout(settings.theme);
    let playback = sequencer.speak_dialogue(segments, &captions);
    tokio::pin!(playback);

    let summary = loop {
        tokio::select! {
            summary = &mut playback => break summary,
            _ = tokio::signal::ctrl_c() => {
                debug!("Ctrl-C received");
                sequencer.stop();
            }
            Some(line) = next_command(&mut commands) => {
                handle_command(line.trim(), &sequencer, &mut settings, &mut config);
            }
        }
    };

    debug!("Playback summary: {:?}", summary);
    Ok(())
}

async fn read_article(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("reading article from stdin")?;
        Ok(text)
    } else {
        tokio::fs::read_to_string(input)
            .await
            .with_context(|| format!("reading article from {}", input))
    }
}

fn title_from(input: &str) -> String {
    if input == "-" {
        return String::new();
    }
    Path::new(input)
        .file_stem()
        .map(|stem| stem.to_string_lossy().replace(|c: char| c == '_' || c == '-', " "))
        .unwrap_or_default()
}

async fn report_load_progress(mut progress: tokio::sync::watch::Receiver<f32>) {
    while progress.changed().await.is_ok() {
        let fraction = *progress.borrow_and_update();
        eprintln!("Loading model: {:.0}%", fraction * 100.0);
        if fraction >= 1.0 {
            break;
        }
    }
}

/// Next stdin line; never resolves once stdin is closed or not used
async fn next_command(commands: &mut Option<Lines<BufReader<Stdin>>>) -> Option<String> {
    let Some(lines) = commands.as_mut() else {
        return std::future::pending().await;
    };
    match lines.next_line().await {
        Ok(Some(line)) => Some(line),
        Ok(None) | Err(_) => {
            debug!("stdin closed; playback commands disabled");
            *commands = None;
            None
        }
    }
}

fn handle_command(
    command: &str,
    sequencer: &DialogueSequencer,
    settings: &mut Settings,
    config: &mut Config,
) {
    match command {
        "p" => match sequencer.pause() {
            PauseMode::Suspended => println!("Paused."),
            PauseMode::Cancelled => println!("Paused. Playback resumes at the next segment."),
            PauseMode::NotPlaying => println!("Nothing is playing."),
        },
        "r" => {
            if sequencer.resume() {
                println!("Resumed.");
            }
        }
        "s" | "q" => {
            sequencer.stop();
        }
        "+" | "-" => {
            let step = if command == "+" { SPEED_STEP } else { -SPEED_STEP };
            settings.speed = sequencer.set_speed(settings.speed + step);
            println!("Speed {:.2}x", settings.speed);
            if let Err(e) = config.save_settings(settings) {
                warn!("Failed to save speed: {}", e);
            }
        }
        "" => {}
        other => println!("Unknown command '{}'. Use p, r, s, +, - or q.", other),
    }
}
