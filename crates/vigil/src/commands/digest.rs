//! Digest command handlers.

use vigil_core::Session;

use crate::cli::{DigestArgs, DigestCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{Loaded, connect_for_action};

pub async fn handle(session: &Session, args: DigestArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        DigestCommand::Load { page, size } => {
            let stats = session.load_digests(page, size).await?;
            let loaded = Loaded {
                stats,
                items: session.caches().digests().items(),
            };
            output::emit(global.output, &loaded, global.quiet)
        }

        DigestCommand::Run => {
            connect_for_action(session).await;
            let outcome = session.run_digest().await?;
            output::emit(global.output, &outcome, global.quiet)
        }
    }
}
