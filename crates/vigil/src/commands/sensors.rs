//! Sensor command handlers.

use vigil_core::{RegisterSensorRequest, SensorPolicyUpdate, Session};

use crate::cli::{GlobalOpts, SensorPolicyCommand, SensorsArgs, SensorsCommand};
use crate::error::CliError;
use crate::output;

use super::{Loaded, connect_for_action, parse_id};

pub async fn handle(session: &Session, args: SensorsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        SensorsCommand::Load => {
            let stats = session.load_sensors().await?;
            let loaded = Loaded {
                stats,
                items: session.caches().sensors().items(),
            };
            output::emit(global.output, &loaded, global.quiet)
        }

        SensorsCommand::Register {
            name,
            external_id,
            region,
            lat,
            lng,
            meta,
        } => {
            let meta = meta.as_deref().map(parse_meta).transpose()?;
            let request = RegisterSensorRequest {
                name,
                external_id,
                region,
                lat,
                lng,
                meta,
                ..RegisterSensorRequest::default()
            };
            connect_for_action(session).await;
            let outcome = session.register_sensor(&request).await?;
            output::emit(global.output, &outcome, global.quiet)
        }

        SensorsCommand::Policy(policy) => match policy.command {
            SensorPolicyCommand::Get { id } => {
                connect_for_action(session).await;
                let outcome = session.sensor_policy(&parse_id(&id)).await?;
                output::emit(global.output, &outcome, global.quiet)
            }
            SensorPolicyCommand::Set {
                id,
                mode,
                alert_above,
                warn_above,
                clear_below,
                ttl_sec,
            } => {
                let update = SensorPolicyUpdate {
                    mode,
                    alert_above,
                    warn_above,
                    clear_below,
                    ttl_sec,
                };
                connect_for_action(session).await;
                let outcome = session.save_sensor_policy(&parse_id(&id), &update).await?;
                output::emit(global.output, &outcome, global.quiet)
            }
        },
    }
}

/// `--meta` must be JSON; a bare word is taken as a string.
fn parse_meta(raw: &str) -> Result<serde_json::Value, CliError> {
    match serde_json::from_str(raw) {
        Ok(value) => Ok(value),
        Err(_) if !raw.trim_start().starts_with(['{', '[']) => {
            Ok(serde_json::Value::String(raw.to_owned()))
        }
        Err(e) => Err(CliError::Validation {
            field: "meta".into(),
            reason: format!("invalid JSON: {e}"),
        }),
    }
}
