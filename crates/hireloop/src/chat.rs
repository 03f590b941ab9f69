// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hireloop chat`: a line-based conversation about one job.
//!
//! Each stdin line is sent as a message. `/reconnect` retries a failed
//! channel and `/quit` (or EOF) leaves.

use std::collections::HashSet;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use hireloop_chat::{ConversationController, ConversationSnapshot, SendOutcome};
use hireloop_core::{ConnectionState, HireloopError, JobId, Message, MessageId, UserId};

use crate::credentials::Wiring;

pub async fn run_chat(
    wiring: Wiring,
    job_id: JobId,
    other_user_id: UserId,
    cancel: CancellationToken,
) -> Result<(), HireloopError> {
    let controller = ConversationController::new(wiring.viewer, wiring.api, wiring.context);
    let conversation = controller.open_for_job(job_id, other_user_id).await?;
    match conversation.id() {
        Some(id) => eprintln!("conversation {id} about job {job_id}"),
        None => eprintln!("no conversation about job {job_id} yet, the first message starts one"),
    }

    let mut snapshots = controller.watch();
    let mut transcript = Transcript::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                for line in transcript.render(&snapshot) {
                    println!("{line}");
                }
                controller.mark_all_read();
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match line.trim() {
                    "/quit" => break,
                    "/reconnect" => controller.reconnect(),
                    text => match controller.send_message(text).await {
                        Ok(SendOutcome::Sent | SendOutcome::Empty) => {}
                        Ok(SendOutcome::Disconnected) => eprintln!("not connected, message not sent"),
                        Ok(SendOutcome::Blocked) => eprintln!("conversation is blocked"),
                        Err(e) => eprintln!("send failed: {e}"),
                    },
                },
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            },
        }
    }

    controller.close();
    Ok(())
}

/// Turns successive snapshots into printable lines, each message once.
#[derive(Debug, Default)]
pub struct Transcript {
    printed: HashSet<MessageId>,
    connection: Option<ConnectionState>,
}

impl Transcript {
    pub fn render(&mut self, snapshot: &ConversationSnapshot) -> Vec<String> {
        let mut lines = Vec::new();
        if self.connection != Some(snapshot.connection) {
            self.connection = Some(snapshot.connection);
            lines.push(format!("-- {}", snapshot.connection));
        }
        for message in &snapshot.messages {
            if self.printed.insert(message.id) {
                lines.push(format_message(message));
            }
        }
        lines
    }
}

pub fn format_message(message: &Message) -> String {
    let who = message
        .sender_name
        .clone()
        .unwrap_or_else(|| message.sender.to_string());
    let stamp = message.display_timestamp();
    if stamp.is_empty() {
        format!("{who}: {}", message.content)
    } else {
        format!("[{stamp}] {who}: {}", message.content)
    }
}
