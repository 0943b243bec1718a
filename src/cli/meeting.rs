//! CLI handler for meeting commands.
//!
//! All commands talk to a running service over its HTTP API.

use anyhow::{bail, Context, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::api::CONTROL_TOKEN_HEADER;
use crate::cli::args::{ControlArgs, ExportArgs, MeetingCliArgs, MeetingCommand};
use crate::export::ExportFormat;
use crate::meeting::{
    ControlAck, ControlCommand, MeetingConfig, SessionSnapshot, SessionSummary, StartedMeeting,
};

/// Thin client for the meeting endpoints.
pub struct MeetingClient {
    client: reqwest::Client,
    base_url: String,
}

impl MeetingClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn start(&self, config: &MeetingConfig) -> Result<StartedMeeting> {
        let response = self
            .client
            .post(format!("{}/meetings", self.base_url))
            .json(config)
            .send()
            .await
            .context("Failed to connect to Roundtable service. Is it running?")?;
        read_json(response, "start meeting").await
    }

    pub async fn list(&self) -> Result<Vec<SessionSummary>> {
        let response = self
            .client
            .get(format!("{}/meetings", self.base_url))
            .send()
            .await
            .context("Failed to connect to Roundtable service. Is it running?")?;
        read_json(response, "list meetings").await
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<SessionSnapshot> {
        let response = self
            .client
            .get(format!("{}/meetings/{}", self.base_url, id))
            .send()
            .await
            .context("Failed to connect to Roundtable service. Is it running?")?;
        read_json(response, "get meeting").await
    }

    pub async fn control(&self, id: Uuid, token: &str, command: ControlCommand) -> Result<ControlAck> {
        let response = self
            .client
            .post(format!("{}/meetings/{}/{}", self.base_url, id, command.as_str()))
            .header(CONTROL_TOKEN_HEADER, token)
            .send()
            .await
            .context("Failed to connect to Roundtable service. Is it running?")?;
        read_json(response, command.as_str()).await
    }

    pub async fn heartbeat(&self, id: Uuid, token: &str) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/meetings/{}/heartbeat", self.base_url, id))
            .header(CONTROL_TOKEN_HEADER, token)
            .send()
            .await
            .context("Failed to connect to Roundtable service. Is it running?")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Failed to send heartbeat: {}", error_message(status, &body));
        }
        Ok(())
    }

    pub async fn export(&self, id: Uuid, format: ExportFormat) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/meetings/{}/export", self.base_url, id))
            .query(&[("format", format.as_str())])
            .send()
            .await
            .context("Failed to connect to Roundtable service. Is it running?")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read export")?;
        if !status.is_success() {
            bail!("Failed to export meeting: {}", error_message(status, &body));
        }
        Ok(body)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read response body")?;

    if !status.is_success() {
        bail!("Failed to {}: {}", action, error_message(status, &body));
    }

    serde_json::from_str(&body).with_context(|| format!("Unexpected response to {action}"))
}

/// The `message` of an API error body, else the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| json.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| format!("{status}: {body}"))
}

pub async fn handle_meeting_command(args: MeetingCliArgs) -> Result<()> {
    let client = MeetingClient::new(&args.url);

    match args.command {
        MeetingCommand::Start(setup) => start_meeting(&client, setup.into()).await,
        MeetingCommand::List => list_meetings(&client).await,
        MeetingCommand::Status { id } => show_status(&client, id).await,
        MeetingCommand::Pause(control) => send_control(&client, control, ControlCommand::Pause).await,
        MeetingCommand::Resume(control) => {
            send_control(&client, control, ControlCommand::Resume).await
        }
        MeetingCommand::Stop(control) => send_control(&client, control, ControlCommand::Stop).await,
        MeetingCommand::Skip(control) => send_control(&client, control, ControlCommand::Skip).await,
        MeetingCommand::Conclude(control) => {
            send_control(&client, control, ControlCommand::Conclude).await
        }
        MeetingCommand::Heartbeat(control) => {
            client.heartbeat(control.id, &control.token).await?;
            println!("Meeting {}: heartbeat sent", control.id);
            Ok(())
        }
        MeetingCommand::Export { id, export } => export_meeting(&client, id, export).await,
    }
}

async fn start_meeting(client: &MeetingClient, config: MeetingConfig) -> Result<()> {
    let started = client.start(&config).await?;

    println!("Meeting started: {}", started.session_id);
    println!("Control token: {}", started.control_token);
    println!(
        "\nPause with: roundtable meeting pause {} --token {}",
        started.session_id, started.control_token
    );

    Ok(())
}

async fn list_meetings(client: &MeetingClient) -> Result<()> {
    let meetings = client.list().await?;
    if meetings.is_empty() {
        println!("No meetings running or retained.");
        return Ok(());
    }

    for meeting in meetings {
        println!(
            "{} [{}] {} - {} entries, {} observer(s), started {}",
            meeting.session_id,
            meeting.status.as_str(),
            meeting.topic,
            meeting.entries,
            meeting.observers,
            meeting.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

async fn show_status(client: &MeetingClient, id: Uuid) -> Result<()> {
    let snapshot = client.snapshot(id).await?;

    println!("Meeting: {} ({})", snapshot.config.topic, snapshot.status.as_str());
    if let Some(phase) = snapshot.phase {
        match snapshot.round {
            Some(round) => println!("Phase: {} (round {})", phase.title(), round + 1),
            None => println!("Phase: {}", phase.title()),
        }
    }
    if let Some(speaker) = &snapshot.speaker {
        println!("Next speaker: {}", speaker);
    }
    println!("Entries: {}", snapshot.transcript.len());
    if !snapshot.failed_turns.is_empty() {
        println!("Failed turns: {}", snapshot.failed_turns.len());
    }
    if let Some(reason) = &snapshot.failure_reason {
        println!("Ended early: {}", reason);
    }
    if let Some(last) = snapshot.transcript.last() {
        println!("\nLast: {}: {}", last.speaker_label(), last.text);
    }

    Ok(())
}

async fn send_control(client: &MeetingClient, args: ControlArgs, command: ControlCommand) -> Result<()> {
    let ack = client.control(args.id, &args.token, command).await?;
    println!(
        "Meeting {}: {} accepted, now {}",
        ack.session_id,
        command.as_str(),
        ack.status.as_str()
    );
    Ok(())
}

async fn export_meeting(client: &MeetingClient, id: Uuid, args: ExportArgs) -> Result<()> {
    let document = client.export(id, args.format).await?;
    write_export(&document, args.output.as_deref())
}

/// Print a document, or write it to `output`.
pub fn write_export(document: &str, output: Option<&std::path::Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, document).context("Failed to write output file")?;
            eprintln!("Transcript saved to: {}", path.display());
        }
        None => println!("{}", document),
    }
    Ok(())
}
