//! Node health command handlers.

use serde::Serialize;

use vigil_core::{NodeHealth, NodeStatus, NodeWatcher, NodeWatcherConfig, Session};

use crate::cli::{GlobalOpts, NodesArgs, NodesCommand};
use crate::error::CliError;
use crate::output;

/// A node plus its status as of rendering.
#[derive(Serialize)]
struct NodeRow<'a> {
    status: NodeStatus,
    #[serde(flatten)]
    health: &'a NodeHealth,
}

fn rows(nodes: &[NodeHealth]) -> Vec<NodeRow<'_>> {
    nodes
        .iter()
        .map(|health| NodeRow {
            status: health.status(),
            health,
        })
        .collect()
}

pub async fn handle(session: &Session, args: NodesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = NodeWatcherConfig::from_session(session.config()).with_nodes(args.nodes);

    match args.command {
        NodesCommand::Status => {
            config.events = false;
            let watcher = NodeWatcher::new(config)?;
            let nodes = watcher.poll_once().await;
            output::emit(global.output, &rows(&nodes), global.quiet)
        }

        NodesCommand::Watch { no_events } => {
            config.events = !no_events;
            let watcher = NodeWatcher::new(config)?;
            let mut changes = watcher.subscribe();
            watcher.start();

            let mut last = String::new();
            let result = loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break Ok(());
                        }
                        let nodes = changes.borrow_and_update().clone();
                        let rendered = match output::render(global.output, &rows(&nodes)) {
                            Ok(rendered) => rendered,
                            Err(e) => break Err(e),
                        };
                        if rendered != last {
                            output::print_output(&rendered, global.quiet);
                            last = rendered;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("interrupted");
                        break Ok(());
                    }
                }
            };

            watcher.stop();
            result
        }
    }
}
