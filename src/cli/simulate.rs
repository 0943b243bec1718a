//! CLI handler for running a meeting in-process.
//!
//! Builds the same registry the service uses, runs one meeting to the end
//! and prints (or saves) its export.

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::app::build_registry;
use crate::cli::args::SimulateCliArgs;
use crate::cli::meeting::write_export;
use crate::config::Config;
use crate::events::EventKind;
use crate::meeting::{EntryKind, MeetingConfig, MeetingStatus, TranscriptEntry};

pub async fn handle_simulate_command(args: SimulateCliArgs, mut config: Config) -> Result<()> {
    if args.offline {
        config.llm.provider = "offline".to_string();
    }

    let registry = build_registry(&config)?;
    let meeting_config = MeetingConfig::from(args.setup);
    let total_turns = total_turns(&meeting_config);

    let started = registry
        .start(meeting_config)
        .await
        .context("Failed to start meeting")?;
    let handle = registry.get(started.session_id).await?;
    let (snapshot, mut rx) = handle.subscribe().await;

    let pb = if args.live {
        for entry in &snapshot.transcript {
            print_entry(entry);
        }
        None
    } else {
        let pb = create_progress_bar(total_turns);
        pb.set_position(spoken_turns(&snapshot.transcript));
        pb.set_message("Starting...");
        Some(pb)
    };

    let mut status = snapshot.status;
    while !status.is_terminal() {
        match rx.recv().await {
            Ok(event) => match event.kind {
                EventKind::EntryAppended { entry } => {
                    if let Some(pb) = &pb {
                        if counts_as_turn(entry.kind) {
                            pb.inc(1);
                        }
                    } else {
                        print_entry(&entry);
                    }
                }
                EventKind::TurnStarted { speaker, round } => {
                    if let Some(pb) = &pb {
                        match round {
                            Some(round) => pb.set_message(format!("Round {}: {}", round + 1, speaker)),
                            None => pb.set_message(speaker),
                        }
                    }
                }
                EventKind::SessionCompleted { .. } => status = MeetingStatus::Completed,
                EventKind::SessionFailed { .. } => status = MeetingStatus::Failed,
                _ => {}
            },
            Err(RecvError::Lagged(missed)) => {
                warn!("Progress display skipped {} event(s)", missed);
                let (snapshot, fresh) = handle.subscribe().await;
                rx = fresh;
                status = snapshot.status;
                if let Some(pb) = &pb {
                    pb.set_position(spoken_turns(&snapshot.transcript));
                }
            }
            Err(RecvError::Closed) => break,
        }
    }

    if let Some(pb) = pb {
        pb.finish_with_message(status.as_str());
    }

    let final_snapshot = handle.snapshot().await;
    let document = handle.export(args.export.format).await;
    write_export(&document, args.export.output.as_deref())?;

    if final_snapshot.status == MeetingStatus::Failed {
        bail!(
            "Meeting failed: {}",
            final_snapshot
                .failure_reason
                .unwrap_or_else(|| "unknown reason".to_string())
        );
    }
    if !final_snapshot.failed_turns.is_empty() {
        eprintln!(
            "{} turn(s) could not be generated and were recorded as placeholders",
            final_snapshot.failed_turns.len()
        );
    }

    Ok(())
}

/// Introductions, every discussion turn and the summary.
fn total_turns(config: &MeetingConfig) -> u64 {
    let participants = config.participants.len() as u64;
    participants + participants * u64::from(config.rounds) + 1
}

fn counts_as_turn(kind: EntryKind) -> bool {
    !matches!(kind, EntryKind::Opening | EntryKind::Framing)
}

fn spoken_turns(entries: &[TranscriptEntry]) -> u64 {
    entries.iter().filter(|e| counts_as_turn(e.kind)).count() as u64
}

fn print_entry(entry: &TranscriptEntry) {
    eprintln!("\n{}:\n{}", entry.speaker_label(), entry.text);
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} turns {msg}")
        .map(|style| style.progress_chars("━╸━"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_turns() {
        let config = MeetingConfig::new("t", 3, ["a", "b"]);
        assert_eq!(total_turns(&config), 2 + 6 + 1);
    }

    #[test]
    fn test_scripted_entries_do_not_count_as_turns() {
        assert!(!counts_as_turn(EntryKind::Opening));
        assert!(!counts_as_turn(EntryKind::Framing));
        assert!(counts_as_turn(EntryKind::Placeholder));
        assert!(counts_as_turn(EntryKind::Summary));
    }
}
