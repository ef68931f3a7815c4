//! DebateStream CLI - AI Team Debate Tool
//!
//! Runs a four-debater team debate with a judge and prints the live stream,
//! pacing each turn as if its audio were being played back.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use debatestream_core::{Config, DebateEvent, RunController, Side, default_config};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "debatestream",
    version,
    about = "AI Team Debate Tool - Watch two AI teams debate a motion",
    long_about = "A CLI tool for running paced team debates between AI debaters using OpenAI-compatible APIs."
)]
struct Cli {
    /// The motion to debate
    #[arg(value_name = "TOPIC", required_unless_present = "list_debaters")]
    topic: Option<String>,

    /// Position argued by the pro side (defaults to supporting the topic)
    #[arg(long, value_name = "POSITION")]
    pro: Option<String>,

    /// Position argued by the con side (defaults to opposing the topic)
    #[arg(long, value_name = "POSITION")]
    con: Option<String>,

    /// TOML config with providers and the lineup (built-in lineup if omitted)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of free-debate rounds
    #[arg(short, long, value_name = "ROUNDS")]
    rounds: Option<u32>,

    /// Overall time budget in seconds (0 for none)
    #[arg(long, value_name = "SECS")]
    time_limit: Option<u64>,

    /// Simulated playback speed in words per minute (0 advances immediately)
    #[arg(long, default_value = "180", value_name = "WPM")]
    playback_wpm: u32,

    /// Write the final transcript as JSON
    #[arg(long, value_name = "PATH")]
    transcript_out: Option<PathBuf>,

    /// Print the lineup and exit
    #[arg(long)]
    list_debaters: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    if let Some(rounds) = cli.rounds {
        config.debate.free_rounds = rounds;
    }
    if let Some(secs) = cli.time_limit {
        config.debate.time_limit_secs = secs;
    }
    info!(
        config = ?cli.config,
        free_rounds = config.debate.free_rounds,
        time_limit_secs = config.debate.time_limit_secs,
        "configuration loaded"
    );

    let controller = RunController::from_config(&config)?;

    if cli.list_debaters {
        print_lineup(&controller);
        return Ok(());
    }

    let topic = cli.topic.unwrap_or_default();
    let pro = cli
        .pro
        .unwrap_or_else(|| format!("In favor of: {}", topic.trim()));
    let con = cli
        .con
        .unwrap_or_else(|| format!("Against: {}", topic.trim()));

    // Print header
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - Team Debate", "DebateStream".bold())
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!("{} {}", "Pro:".green().bold(), pro);
    println!("{} {}", "Con:".red().bold(), con);
    let settings = controller.settings();
    let budget = match settings.time_limit() {
        Some(limit) => format!("{} min", limit.as_secs().div_ceil(60)),
        None => "none".to_string(),
    };
    println!(
        "{} {} free rounds, time limit {}",
        "Format:".bold(),
        settings.free_rounds,
        budget
    );
    println!();
    print_lineup(&controller);
    println!("{}", "─".repeat(70).dimmed());

    let mut subscription = controller.subscribe();
    controller.start(&topic, &pro, &con)?;

    {
        let controller = controller.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && controller.stop() {
                warn!("interrupted; stopping the debate");
                eprintln!();
                eprintln!(
                    "{}",
                    "Stopping after the current turn...".yellow()
                );
            }
        });
    }

    let mut total_turns = 0;
    while let Some(event) = subscription.next_event().await {
        print_event(&event);
        match event {
            DebateEvent::TurnComplete { text, .. } => {
                playback(&text, cli.playback_wpm).await;
                controller.advance();
            }
            DebateEvent::RunEnd {
                total_turns: turns, ..
            } => total_turns = turns,
            _ => {}
        }
    }
    controller.wait().await;

    let status = controller.status();
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!(
            "  Debate concluded: {} turns in {}.",
            total_turns, status.elapsed
        )
        .bright_green()
        .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    if let Some(path) = &cli.transcript_out {
        match controller.transcript() {
            Some(transcript) => {
                std::fs::write(path, serde_json::to_string_pretty(&*transcript)?)?;
                println!("{} {}", "Transcript written to".dimmed(), path.display());
            }
            None => eprintln!(
                "{}",
                "Warning: no transcript available to export.".yellow()
            ),
        }
    }

    Ok(())
}

fn print_lineup(controller: &RunController) {
    let roster = controller.roster();
    println!("{}", "Lineup:".bold());
    for d in roster.debaters() {
        let label = d.display_name_with_role();
        let label = match d.side {
            Side::Pro => label.green(),
            _ => label.red(),
        };
        println!(
            "  {} - using {}, voice {}",
            label,
            d.source.model_name().dimmed(),
            d.voice.dimmed()
        );
        if !d.personality.is_empty() {
            println!("      {}", d.personality.dimmed());
        }
    }
    let judge = roster.judge();
    println!(
        "  {} {} - using {}",
        judge.name.bright_magenta(),
        "Judge".yellow(),
        judge.source.model_name().dimmed()
    );
    println!();
}

/// Print one event to the console.
fn print_event(event: &DebateEvent) {
    match event {
        DebateEvent::PhaseChange {
            title, description, ..
        } => {
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!("{}", format!("  📢 {}", title).bright_magenta().bold());
            for line in textwrap(description, 66).lines() {
                println!("  {}", line.dimmed());
            }
            println!("{}", "═".repeat(70).bright_magenta());
            println!();
        }
        DebateEvent::SpeakerAnnounce {
            name, side, role, ..
        } => {
            let label = format!("({} {})", side.display_name(), role.display_name());
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                name.bright_cyan().bold(),
                label.yellow()
            );
            print!("  ");
        }
        DebateEvent::TokenFragment { fragment, .. } => {
            print!("{}", fragment);
            let _ = std::io::stdout().flush();
        }
        DebateEvent::TurnComplete { .. } => {
            println!();
            println!();
        }
        DebateEvent::JudgeResult { content, .. } => {
            for line in textwrap(content, 66).lines() {
                println!("  {}", line);
            }
            println!();
        }
        DebateEvent::RunEnd { .. } => {}
        DebateEvent::Error { message } => {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
    }
}

/// Wait as long as reading `text` aloud would take.
async fn playback(text: &str, wpm: u32) {
    let duration = playback_duration(text, wpm);
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Reading time at `wpm`. CJK characters count as one word each, since that
/// text has no spaces between words.
fn playback_duration(text: &str, wpm: u32) -> Duration {
    if wpm == 0 {
        return Duration::ZERO;
    }
    let words: usize = text
        .split_whitespace()
        .map(|token| token.chars().filter(|c| is_cjk(*c)).count().max(1))
        .sum();
    Duration::from_secs_f64(words as f64 * 60.0 / f64::from(wpm))
}

fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
    )
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();

    for paragraph in text.lines() {
        let mut current_line_len = 0;
        for word in paragraph.split_whitespace() {
            let len = word.chars().count();
            if current_line_len + len + 1 > width && current_line_len > 0 {
                result.push('\n');
                current_line_len = 0;
            }
            if current_line_len > 0 {
                result.push(' ');
                current_line_len += 1;
            }
            result.push_str(word);
            current_line_len += len;
        }
        result.push('\n');
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_counts_words() {
        let text = "one two three four five six";
        assert_eq!(playback_duration(text, 60), Duration::from_secs(6));
        assert_eq!(playback_duration(text, 0), Duration::ZERO);
    }

    #[test]
    fn test_playback_counts_cjk_characters() {
        // Six characters, no spaces.
        assert_eq!(playback_duration("我方认为应当", 60), Duration::from_secs(6));
        assert_eq!(playback_duration("AI 技术", 60), Duration::from_secs(3));
    }

    #[test]
    fn test_textwrap_keeps_paragraphs() {
        let wrapped = textwrap("alpha beta gamma\ndelta", 11);
        assert_eq!(wrapped, "alpha beta\ngamma\ndelta\n");
    }
}
