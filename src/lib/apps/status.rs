use bollard::secret::ContainerSummary;
use serde::Serialize;

use super::types::{app_label_filter, summary_name};
use crate::lib::engine::types::{EngineClient, EngineError};

#[derive(Debug, Clone, Serialize)]
pub struct ContainerRow {
    pub name: String,
    pub state: String,
    pub image: String,
}

/// Live view of one app, derived entirely from the engine. An empty
/// container list with `ok=true` means "not installed"; `ok=false`
/// means the engine itself could not answer.
#[derive(Debug, Clone, Serialize)]
pub struct AppStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub containers: Vec<ContainerRow>,
    pub running: bool,
}

impl AppStatus {
    fn engine_error(err: EngineError) -> Self {
        AppStatus {
            ok: false,
            error: Some(err.to_string()),
            containers: Vec::new(),
            running: false,
        }
    }
}

pub async fn app_status(app_id: &str) -> AppStatus {
    let engine = match EngineClient::acquire().await {
        Ok(engine) => engine,
        Err(err) => return AppStatus::engine_error(err),
    };

    match engine.list_by_labels(&app_label_filter(app_id)).await {
        Ok(containers) => {
            let rows: Vec<ContainerRow> = containers.iter().map(container_row).collect();
            let running = any_running(&rows);
            AppStatus {
                ok: true,
                error: None,
                containers: rows,
                running,
            }
        }
        Err(err) => AppStatus::engine_error(err),
    }
}

fn container_row(summary: &ContainerSummary) -> ContainerRow {
    ContainerRow {
        name: summary_name(summary),
        state: summary.state.clone().unwrap_or_default(),
        image: summary.image.clone().unwrap_or_default(),
    }
}

fn any_running(rows: &[ContainerRow]) -> bool {
    rows.iter().any(|row| row.state == "running")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_row_keeps_name_state_and_image() {
        let summary = ContainerSummary {
            names: Some(vec!["/dockhand-demo-web".to_string()]),
            state: Some("running".to_string()),
            image: Some("x:latest".to_string()),
            ..Default::default()
        };
        let row = container_row(&summary);
        assert_eq!(row.name, "dockhand-demo-web");
        assert_eq!(row.state, "running");
        assert_eq!(row.image, "x:latest");
    }

    #[test]
    fn stopped_containers_stay_visible_but_do_not_count_as_running() {
        let rows = vec![
            ContainerRow {
                name: "a".to_string(),
                state: "exited".to_string(),
                image: "x:latest".to_string(),
            },
            ContainerRow {
                name: "b".to_string(),
                state: "created".to_string(),
                image: "y:latest".to_string(),
            },
        ];
        assert!(!any_running(&rows));
    }

    #[test]
    fn one_running_container_flips_the_aggregate() {
        let rows = vec![
            ContainerRow {
                name: "a".to_string(),
                state: "exited".to_string(),
                image: "x:latest".to_string(),
            },
            ContainerRow {
                name: "b".to_string(),
                state: "running".to_string(),
                image: "y:latest".to_string(),
            },
        ];
        assert!(any_running(&rows));
    }
}
