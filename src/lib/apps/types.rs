use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use bollard::secret::ContainerSummary;

use crate::lib::engine::types::EngineError;

/// Fixed prefix for every resource this process owns.
pub const NAME_PREFIX: &str = "dockhand";

/// Grace period before stop/restart escalate to a forced signal.
pub const STOP_GRACE_SECS: i64 = 15;

/// Deterministic container name; the idempotence key for "does this
/// service already exist".
pub fn container_name(app_id: &str, service: &str) -> String {
    format!("{}-{}-{}", NAME_PREFIX, app_id, service)
}

/// Each app owns exactly one network, shared by all its services.
pub fn network_name(app_id: &str) -> String {
    format!("{}_{}_net", NAME_PREFIX, app_id)
}

/// Ownership labels attached at creation. The engine keeps them; we
/// never record container ids locally.
pub fn labels_for(app_id: &str, service: &str) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(format!("{}.managed", NAME_PREFIX), "true".to_string());
    labels.insert(format!("{}.app", NAME_PREFIX), app_id.to_string());
    labels.insert(format!("{}.service", NAME_PREFIX), service.to_string());
    labels
}

/// Filter matching every container of one app, whatever its run state.
pub fn app_label_filter(app_id: &str) -> Vec<String> {
    vec![
        format!("{}.managed=true", NAME_PREFIX),
        format!("{}.app={}", NAME_PREFIX, app_id),
    ]
}

/// Containers list their names with a leading slash.
pub fn summary_name(summary: &ContainerSummary) -> String {
    summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
        .unwrap_or_default()
}

/// Stable reference for engine calls against a listed container.
pub fn summary_ref(summary: &ContainerSummary) -> String {
    summary
        .id
        .clone()
        .unwrap_or_else(|| summary_name(summary))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    Start,
    Stop,
    Restart,
    Down,
}

impl AppAction {
    /// Anything else is rejected before a job is even created.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "start" => Some(AppAction::Start),
            "stop" => Some(AppAction::Stop),
            "restart" => Some(AppAction::Restart),
            "down" => Some(AppAction::Down),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppAction::Start => "start",
            AppAction::Stop => "stop",
            AppAction::Restart => "restart",
            AppAction::Down => "down",
        }
    }
}

/// Outcome of a provisioning or lifecycle run. These functions never
/// raise past their boundary; the report is all a caller sees.
#[derive(Debug, Clone)]
pub struct OpReport {
    pub ok: bool,
    pub message: String,
}

impl OpReport {
    pub fn success(message: impl Into<String>) -> Self {
        OpReport {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        OpReport {
            ok: false,
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum ProvisionError {
    Engine(EngineError),
    HostDir {
        service: String,
        source: std::io::Error,
    },
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::Engine(err) => write!(f, "{}", err),
            ProvisionError::HostDir { service, source } => {
                write!(f, "preparing volume dirs for {}: {}", service, source)
            }
        }
    }
}

impl Error for ProvisionError {}

impl From<EngineError> for ProvisionError {
    fn from(err: EngineError) -> Self {
        ProvisionError::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_deterministic() {
        assert_eq!(container_name("demo", "web"), "dockhand-demo-web");
        assert_eq!(container_name("demo", "web"), container_name("demo", "web"));
        assert_eq!(network_name("demo"), "dockhand_demo_net");
    }

    #[test]
    fn ownership_labels_carry_app_and_service() {
        let labels = labels_for("demo", "web");
        assert_eq!(labels.get("dockhand.managed"), Some(&"true".to_string()));
        assert_eq!(labels.get("dockhand.app"), Some(&"demo".to_string()));
        assert_eq!(labels.get("dockhand.service"), Some(&"web".to_string()));
    }

    #[test]
    fn label_filter_matches_the_app_not_the_service() {
        let filter = app_label_filter("demo");
        assert!(filter.contains(&"dockhand.managed=true".to_string()));
        assert!(filter.contains(&"dockhand.app=demo".to_string()));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn known_actions_parse_and_round_trip() {
        for raw in ["start", "stop", "restart", "down"] {
            let action = AppAction::parse(raw).unwrap();
            assert_eq!(action.as_str(), raw);
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert_eq!(AppAction::parse("explode"), None);
        assert_eq!(AppAction::parse(""), None);
        assert_eq!(AppAction::parse("Start"), None);
    }

    #[test]
    fn summary_name_strips_the_leading_slash() {
        let summary = ContainerSummary {
            names: Some(vec!["/dockhand-demo-web".to_string()]),
            ..Default::default()
        };
        assert_eq!(summary_name(&summary), "dockhand-demo-web");
        assert_eq!(summary_name(&ContainerSummary::default()), "");
    }

    #[test]
    fn summary_ref_prefers_the_id() {
        let summary = ContainerSummary {
            id: Some("abc123".to_string()),
            names: Some(vec!["/dockhand-demo-web".to_string()]),
            ..Default::default()
        };
        assert_eq!(summary_ref(&summary), "abc123");

        let unnamed = ContainerSummary {
            names: Some(vec!["/dockhand-demo-web".to_string()]),
            ..Default::default()
        };
        assert_eq!(summary_ref(&unnamed), "dockhand-demo-web");
    }
}
