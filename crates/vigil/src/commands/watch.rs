//! Live feed watcher.
//!
//! One task per selected feed diffs successive cache snapshots and sends
//! each new or updated record, rendered, to the printing loop.

use std::collections::HashMap;
use std::sync::Arc;

use clap::ValueEnum;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use vigil_core::{FeedStream, Record, Session};

use crate::cli::{Feed, GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

type Line = Result<String, CliError>;

#[derive(Serialize)]
struct FeedEvent<'a, T> {
    feed: &'static str,
    record: &'a T,
}

pub async fn handle(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let feeds = if args.feed.is_empty() {
        Feed::value_variants().to_vec()
    } else {
        args.feed
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Line>();
    let mut tasks: Vec<JoinHandle<()>> = feeds
        .into_iter()
        .map(|feed| spawn_feed_for(session, feed, global.output, tx.clone()))
        .collect();
    drop(tx);
    tasks.push(spawn_state_logger(session));

    if let Err(e) = session.connect().await {
        tracing::warn!(error = %e, "realtime connect failed, retrying in the background");
    }
    if !args.no_load {
        session.load_initial().await;
    }

    let mut printed = 0_usize;
    let result = loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(Ok(line)) => {
                    output::print_output(&line, global.quiet);
                    printed += 1;
                    if args.count.is_some_and(|limit| printed >= limit) {
                        break Ok(());
                    }
                }
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break Ok(());
            }
        }
    };

    for task in tasks {
        task.abort();
    }
    result
}

fn spawn_feed_for(
    session: &Session,
    feed: Feed,
    format: OutputFormat,
    tx: mpsc::UnboundedSender<Line>,
) -> JoinHandle<()> {
    match feed {
        Feed::Sensors => spawn_feed("sensors", session.sensors(), format, tx),
        Feed::Cameras => spawn_feed("cameras", session.cameras(), format, tx),
        Feed::Incidents => spawn_feed("incidents", session.incidents(), format, tx),
        Feed::News => spawn_feed("news", session.news(), format, tx),
        Feed::Digests => spawn_feed("digests", session.digests(), format, tx),
        Feed::Alerts => spawn_feed("alerts", session.camera_alerts(), format, tx),
    }
}

fn spawn_feed<T: Record>(
    feed: &'static str,
    mut stream: FeedStream<T>,
    format: OutputFormat,
    tx: mpsc::UnboundedSender<Line>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut seen = index(stream.current());
        while let Some(snapshot) = stream.changed().await {
            // snapshots are newest-first; print in arrival order
            for record in fresh_records(&seen, &snapshot).into_iter().rev() {
                let line = output::render(format, &FeedEvent {
                    feed,
                    record: record.as_ref(),
                });
                if tx.send(line).is_err() {
                    return;
                }
            }
            seen = index(&snapshot);
        }
    })
}

fn spawn_state_logger(session: &Session) -> JoinHandle<()> {
    let mut state = session.connection_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            tracing::info!(state = ?current, "connection state");
        }
    })
}

fn index<T: Record>(items: &[Arc<T>]) -> HashMap<String, Arc<T>> {
    items
        .iter()
        .filter_map(|item| item.identity().map(|key| (key, Arc::clone(item))))
        .collect()
}

/// Records that are new, or replaced by a merge, since `seen`.
fn fresh_records<T: Record>(seen: &HashMap<String, Arc<T>>, snapshot: &[Arc<T>]) -> Vec<Arc<T>> {
    snapshot
        .iter()
        .filter(|item| {
            item.identity()
                .is_none_or(|key| seen.get(&key).is_none_or(|old| !Arc::ptr_eq(old, item)))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use vigil_core::Incident;

    use super::*;

    fn incident(id: &str) -> Arc<Incident> {
        Arc::new(serde_json::from_value(json!({ "id": id, "kind": "FIRE" })).unwrap())
    }

    #[test]
    fn only_new_or_replaced_records_are_fresh() {
        let kept = incident("a");
        let seen = index(&[Arc::clone(&kept), incident("b")]);

        let replaced_b = incident("b");
        let snapshot = vec![incident("c"), Arc::clone(&kept), Arc::clone(&replaced_b)];
        let fresh = fresh_records(&seen, &snapshot);

        let ids: Vec<_> = fresh.iter().map(|r| r.identity().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
