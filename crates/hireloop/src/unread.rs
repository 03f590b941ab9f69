// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hireloop unread`: follow the badge counts until interrupted.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use hireloop_config::HireloopConfig;
use hireloop_core::{ConnectionState, HireloopError};
use hireloop_unread::{UnreadSession, UnreadStore, UnreadTotals};

use crate::credentials::Wiring;

pub async fn run_unread(
    config: &HireloopConfig,
    wiring: Wiring,
    cancel: CancellationToken,
) -> Result<(), HireloopError> {
    let store = Arc::new(UnreadStore::new());
    let session = UnreadSession::start(
        wiring.viewer,
        Arc::clone(&store),
        wiring.api,
        wiring.context,
        &config.unread,
    )
    .await;

    let mut totals = store.subscribe();
    let mut channel = session.watch_channel();
    println!("{}", format_totals(*totals.borrow_and_update()));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = totals.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", format_totals(*totals.borrow_and_update()));
            }
            changed = channel.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *channel.borrow_and_update();
                eprintln!("notifications: {state}");
                if state == ConnectionState::Failed {
                    // Counts stay available through the REST poll.
                    info!("notification channel gave up, relying on polling");
                }
            }
        }
    }

    session.shutdown();
    Ok(())
}

pub fn format_totals(totals: UnreadTotals) -> String {
    format!(
        "unread: {} (chat {}, notifications {})",
        totals.total, totals.chat, totals.notifications
    )
}
