use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One installable application: a titled group of services sharing a
/// dedicated network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub default_url: String,
    pub services: Vec<ServiceSpec>,
}

/// Declarative blueprint for one container of an application.
///
/// `volumes` maps a directory name relative to the app's data dir to an
/// absolute container path; `binds` maps absolute host paths directly.
/// `ports` is keyed "port/proto" the way the engine expects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    #[serde(default)]
    pub binds: BTreeMap<String, String>,
    #[serde(default)]
    pub cap_add: Vec<String>,
    #[serde(default)]
    pub sysctls: BTreeMap<String, String>,
}
