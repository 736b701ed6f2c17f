use super::types::{
    AppAction, OpReport, STOP_GRACE_SECS, app_label_filter, network_name, summary_ref,
};
use crate::lib::engine::types::{EngineClient, EngineError};

/// Apply a lifecycle action to every container currently labelled as
/// belonging to the app. Discovery goes through the engine, not the
/// catalog, so orphans left by a partial teardown are reached too.
pub async fn action_app(app_id: &str, action: AppAction) -> OpReport {
    match action_inner(app_id, action).await {
        Ok(message) => OpReport::success(message),
        Err(err) => OpReport::failure(err.to_string()),
    }
}

async fn action_inner(app_id: &str, action: AppAction) -> Result<String, EngineError> {
    let engine = EngineClient::acquire().await?;
    let containers = engine.list_by_labels(&app_label_filter(app_id)).await?;
    let count = containers.len();

    match action {
        AppAction::Start => {
            for summary in &containers {
                engine.start_container(&summary_ref(summary)).await?;
            }
            Ok(format!("started {} containers", count))
        }
        AppAction::Stop => {
            for summary in &containers {
                engine
                    .stop_container(&summary_ref(summary), STOP_GRACE_SECS)
                    .await?;
            }
            Ok(format!("stopped {} containers", count))
        }
        AppAction::Restart => {
            for summary in &containers {
                engine
                    .restart_container(&summary_ref(summary), STOP_GRACE_SECS as isize)
                    .await?;
            }
            Ok(format!("restarted {} containers", count))
        }
        AppAction::Down => {
            for summary in &containers {
                let target = summary_ref(summary);
                // The container may already be stopped or half-gone; a
                // rejected stop is discarded, the forced remove is not.
                match engine.stop_container(&target, STOP_GRACE_SECS).await {
                    Ok(()) | Err(EngineError::OperationFailed(_)) => {}
                    Err(EngineError::Unavailable) => return Err(EngineError::Unavailable),
                }
                engine.remove_container(&target).await?;
            }

            // The network may be referenced by something else or already
            // absent; either way teardown still counts as done.
            match engine.remove_network(&network_name(app_id)).await {
                Ok(()) | Err(EngineError::OperationFailed(_)) => {}
                Err(EngineError::Unavailable) => return Err(EngineError::Unavailable),
            }

            Ok(format!("removed {} containers", count))
        }
    }
}
