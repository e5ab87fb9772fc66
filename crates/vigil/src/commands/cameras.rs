//! Camera command handlers.

use vigil_core::{CameraPolicyUpdate, DetectRequest, Session};

use crate::cli::{CameraPolicyCommand, CamerasArgs, CamerasCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{Loaded, connect_for_action, parse_id};

pub async fn handle(session: &Session, args: CamerasArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        CamerasCommand::Load => {
            let stats = session.load_cameras().await?;
            let loaded = Loaded {
                stats,
                items: session.caches().cameras().items(),
            };
            output::emit(global.output, &loaded, global.quiet)
        }

        CamerasCommand::Scan { id } => {
            connect_for_action(session).await;
            let outcome = match id {
                Some(id) => session.scan_camera_now(&parse_id(&id)).await?,
                None => session.scan_all_cameras().await?,
            };
            output::emit(global.output, &outcome, global.quiet)
        }

        CamerasCommand::Detect {
            id,
            external_id,
            snapshot_url,
            no_incident,
        } => {
            if id.is_none() && external_id.is_none() && snapshot_url.is_none() {
                return Err(CliError::Validation {
                    field: "detect".into(),
                    reason: "one of --id, --external-id or --snapshot-url is required".into(),
                });
            }
            let request = DetectRequest {
                id: id.as_deref().map(parse_id),
                external_id,
                snapshot_url,
                create_incident: !no_incident,
            };
            connect_for_action(session).await;
            let outcome = session.detect(&request).await?;
            output::emit(global.output, &outcome, global.quiet)
        }

        CamerasCommand::Policy(policy) => match policy.command {
            CameraPolicyCommand::Get { id } => {
                connect_for_action(session).await;
                let outcome = session.camera_policy(&parse_id(&id)).await?;
                output::emit(global.output, &outcome, global.quiet)
            }
            CameraPolicyCommand::Set {
                id,
                disabled,
                mode,
                interval_sec,
                ok_regex,
                hit_regex,
                incident_kind,
                incident_level,
                ttl_sec,
            } => {
                let update = CameraPolicyUpdate {
                    enabled: !disabled,
                    mode,
                    interval_sec,
                    ok_regex,
                    hit_regex,
                    incident_kind,
                    incident_level,
                    ttl_sec,
                };
                connect_for_action(session).await;
                let outcome = session.save_camera_policy(&parse_id(&id), &update).await?;
                output::emit(global.output, &outcome, global.quiet)
            }
        },
    }
}
