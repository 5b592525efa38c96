//! Terminal front-end for the analyzer, the board and the team roster.
//!
//! Everything here talks to a running server through
//! [`VideoAnalysisClient`], the same way a browser would.

mod analysis_view;
mod output;

pub use analysis_view::AnalysisData;
pub use output::{render_table, TableRow};

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Args;
use colored::Colorize;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{AnalysisPoller, AnalyzerSession, PollOutcome, VideoAnalysis, VideoAnalysisClient};
use crate::database::entities::{team_members, ChatMessage};
use crate::http::LoggingInterceptor;
use crate::services::BoardColumn;
use output::{format_bytes, print_chat_message, print_progress, print_table, status_label};

const SESSION_ENV: &str = "BOSROLLER_SESSION";

/// How console commands reach the server.
#[derive(Debug, Clone, Args)]
pub struct ConnectionOptions {
    /// Base URL of the running server.
    #[clap(long, default_value = "http://localhost:3000")]
    pub server: String,
    /// Session token. Falls back to BOSROLLER_SESSION, then to --email/--password.
    #[clap(long)]
    pub session: Option<String>,
    #[clap(long)]
    pub email: Option<String>,
    #[clap(long)]
    pub password: Option<String>,
    /// Log outbound function and workflow calls.
    #[clap(long)]
    pub trace_network: bool,
}

pub async fn connect(options: &ConnectionOptions) -> Result<VideoAnalysisClient> {
    let mut client = VideoAnalysisClient::new(&options.server);
    if options.trace_network {
        client = client.with_interceptor(Arc::new(LoggingInterceptor::default()));
    }

    let session = options
        .session
        .clone()
        .or_else(|| std::env::var(SESSION_ENV).ok().filter(|s| !s.is_empty()));
    if let Some(session) = session {
        return Ok(client.with_session(session));
    }

    match (&options.email, &options.password) {
        (Some(email), Some(password)) => {
            let (client, session) = client
                .login(email, password)
                .await
                .context("Login failed")?;
            debug!("Session valid until {}", session.expires_at);
            Ok(client)
        }
        _ => Ok(client),
    }
}

/// Runs the whole analyzer flow for a local file: create the record,
/// upload, publish the URL, trigger, then poll until there is a result.
pub async fn analyze_video(
    client: &VideoAnalysisClient,
    path: &Path,
    duration: Option<i32>,
    wait: bool,
) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("File path has no usable file name")?
        .to_string();
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_size = i64::try_from(data.len()).context("File is too large")?;

    let existing = match client.list().await {
        Ok(videos) => videos,
        Err(e) => {
            warn!("Could not load previous analyses: {}", e);
            Vec::new()
        }
    };
    let mut session = AnalyzerSession::new(existing);

    let analysis = client
        .create(&file_name, file_size, duration)
        .await
        .context("Failed to create video analysis")?;
    session.push_front(analysis.clone());
    print_progress(20, "Record created");

    let url = client
        .upload(&analysis.id, &file_name, Bytes::from(data))
        .await
        .context("Upload failed")?;
    print_progress(60, "Video uploaded");

    let updated = client.set_url(&analysis.id, &url).await?;
    session.apply(&updated);
    print_progress(80, "Video URL saved");

    client
        .trigger(&analysis.id, &file_name, file_size)
        .await
        .context("Analysis failed to start")?;
    print_progress(100, "Analysis queued");
    println!("Your video is being analyzed. This may take a few minutes.");
    println!("Video id: {}", analysis.id.bold());

    if !wait {
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let poller = AnalysisPoller::new(cancel);
    let outcome = poller
        .poll(client, &analysis.id, |record| session.apply(record))
        .await;
    interrupt.abort();

    match outcome? {
        PollOutcome::Completed(record) => {
            println!("{}", "Analysis complete".green().bold());
            print_analysis(&record);
        }
        PollOutcome::Failed(record) => {
            println!("{}", "Analysis failed".red().bold());
            println!(
                "{}",
                record
                    .error_message
                    .as_deref()
                    .unwrap_or("An error occurred during analysis")
            );
        }
        PollOutcome::Exhausted(_) => {
            println!(
                "Still processing. Check again later with `bosroller video show {}`.",
                analysis.id
            );
        }
        PollOutcome::Missing => warn!("Video {} no longer exists", analysis.id),
        PollOutcome::Cancelled => println!("Stopped waiting for {}", analysis.id),
    }
    Ok(())
}

pub async fn list_videos(client: &VideoAnalysisClient) -> Result<()> {
    let videos = client.list().await?;
    if videos.is_empty() {
        println!("No videos analyzed yet.");
        return Ok(());
    }
    let rows = videos
        .iter()
        .map(|video| {
            TableRow::from(vec![
                video.id.clone(),
                video.file_name.clone(),
                video.file_size.map(format_bytes).unwrap_or_default(),
                status_label(&video.status),
                video.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ])
        })
        .collect::<Vec<_>>();
    print_table(&["ID", "File", "Size", "Status", "Created"], &rows);
    Ok(())
}

pub async fn show_video(client: &VideoAnalysisClient, id: &str) -> Result<()> {
    let Some(record) = client.get(id).await? else {
        bail!("Video {} not found", id);
    };
    println!("{} ({})", record.file_name.bold(), status_label(&record.status));
    if let Some(url) = &record.video_url {
        println!("URL: {}", url);
    }
    match record.status.as_str() {
        "completed" => print_analysis(&record),
        "failed" => println!(
            "{}",
            record.error_message.as_deref().unwrap_or("Analysis failed")
        ),
        _ => println!("Analysis in progress."),
    }
    Ok(())
}

fn print_analysis(record: &VideoAnalysis) {
    match &record.analysis_data {
        Some(data) => print!("{}", AnalysisData::from_value(data).render()),
        None => println!("No analysis details available."),
    }
}

/// Interactive chat about an analysed video. The transcript is saved after
/// every answer.
pub async fn chat(client: &VideoAnalysisClient, id: &str) -> Result<()> {
    let Some(record) = client.get(id).await? else {
        bail!("Video {} not found", id);
    };
    let mut history = record.chat_messages();
    for message in &history {
        print_chat_message(message);
    }
    println!("Ask about {}. Submit an empty line to exit.", record.file_name);

    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        match client
            .send_chat(id, question, record.analysis_data.as_ref(), &history)
            .await
        {
            Ok(answer) => {
                history.push(ChatMessage::user(question));
                let reply = ChatMessage::assistant(answer);
                print_chat_message(&reply);
                history.push(reply);
                if let Err(e) = client.update_chat_history(id, &history).await {
                    warn!("Could not save chat history: {}", e);
                }
            }
            Err(e) => eprintln!("{} {}", "error:".red(), e),
        }
    }
    Ok(())
}

pub async fn delete_video(client: &VideoAnalysisClient, id: &str) -> Result<()> {
    client.delete(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

pub async fn show_board(client: &VideoAnalysisClient) -> Result<()> {
    let columns: Vec<BoardColumn> = client.fetch("/api/v1/board").await?;
    for column in columns {
        println!(
            "{} ({})",
            column.status.as_str().bold(),
            column.projects.len()
        );
        for project in column.projects {
            let shoot = project
                .shoot_date
                .as_deref()
                .map(|date| format!(" shoot {}", date))
                .unwrap_or_default();
            println!("  #{} {}{}", project.id, project.title, shoot.dimmed());
        }
    }
    Ok(())
}

pub async fn list_team(client: &VideoAnalysisClient) -> Result<()> {
    let members: Vec<team_members::Model> = client.fetch("/api/v1/team").await?;
    let rows = members
        .iter()
        .map(|member| {
            TableRow::from(vec![
                member.id.to_string(),
                member.name.clone(),
                member.email.clone(),
                member.role.clone(),
            ])
        })
        .collect::<Vec<_>>();
    print_table(&["ID", "Name", "Email", "Role"], &rows);
    Ok(())
}
