//! Incident command handlers.

use vigil_core::{IncidentReport, Session};

use crate::cli::{GlobalOpts, IncidentsArgs, IncidentsCommand};
use crate::error::CliError;
use crate::output;

use super::connect_for_action;

pub async fn handle(session: &Session, args: IncidentsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        IncidentsCommand::Report {
            kind,
            level,
            reason,
            lat,
            lng,
        } => {
            let report = IncidentReport {
                kind,
                level,
                reason,
                lat,
                lng,
                ..IncidentReport::default()
            };
            connect_for_action(session).await;
            let outcome = session.report_incident(&report).await?;
            output::emit(global.output, &outcome, global.quiet)
        }
    }
}
