//! Command dispatch: bridges CLI args -> session operations -> output.

pub mod cameras;
pub mod config_cmd;
pub mod digest;
pub mod incidents;
pub mod nodes;
pub mod sensors;
pub mod watch;

use serde::Serialize;

use vigil_core::{MergeStats, RecordId, Session, Snapshot};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a gateway-bound command to its handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(session, args, global).await,
        Command::Sensors(args) => sensors::handle(session, args, global).await,
        Command::Cameras(args) => cameras::handle(session, args, global).await,
        Command::Digest(args) => digest::handle(session, args, global).await,
        Command::Incidents(args) => incidents::handle(session, args, global).await,
        Command::Nodes(args) => nodes::handle(session, args, global).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions are handled before dispatch".into(),
        )),
    }
}

/// Open the realtime link before an admin action.
///
/// A failed connect is only logged; the action then goes over HTTP.
pub(crate) async fn connect_for_action(session: &Session) {
    if let Err(e) = session.connect().await {
        tracing::warn!(error = %e, "realtime connect failed, using HTTP");
    }
}

/// Result of an HTTP load: merge counts plus the cache contents.
#[derive(Serialize)]
pub(crate) struct Loaded<T: Serialize + Send + Sync + 'static> {
    #[serde(flatten)]
    pub stats: MergeStats,
    pub items: Snapshot<T>,
}

/// Ids typed on the command line: digits are numeric, anything else text.
pub(crate) fn parse_id(raw: &str) -> RecordId {
    raw.parse().unwrap_or_else(|never| match never {})
}
