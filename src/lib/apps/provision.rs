use std::collections::BTreeMap;
use std::path::Path;

use super::types::{
    OpReport, ProvisionError, container_name, labels_for, network_name,
};
use crate::lib::catalog::types::{AppDefinition, ServiceSpec};
use crate::lib::engine::types::{CreateSpec, EngineClient, EngineError};

/// Provision every service of an application. Re-running on an already
/// provisioned app converges instead of erroring: existing containers
/// are reconnected and started, nothing is duplicated.
pub async fn install_app(app: &AppDefinition, apps_root: &Path) -> OpReport {
    match install_inner(app, apps_root).await {
        Ok(message) => OpReport::success(message),
        Err(err) => OpReport::failure(err.to_string()),
    }
}

async fn install_inner(app: &AppDefinition, apps_root: &Path) -> Result<String, ProvisionError> {
    let engine = EngineClient::acquire().await?;

    let network = network_name(&app.id);
    engine.ensure_network(&network).await?;

    // Pull everything up front and abort on the first failure.
    // Already-pulled images are left in place; re-running install picks
    // up where this left off.
    for svc in &app.services {
        engine.pull_image(&svc.image).await?;
    }

    for svc in &app.services {
        let name = container_name(&app.id, &svc.name);
        let binds =
            service_binds(apps_root, &app.id, svc).map_err(|source| ProvisionError::HostDir {
                service: svc.name.clone(),
                source,
            })?;

        if engine.container_exists(&name).await? {
            println!("Container {} already exists, reusing it", name);
            reconnect_existing(&engine, &network, &name, &svc.name).await?;
            engine.start_container(&name).await?;
            continue;
        }

        let spec = CreateSpec {
            name: name.clone(),
            image: svc.image.clone(),
            env: env_list(&svc.env),
            ports: svc.ports.clone(),
            binds,
            labels: labels_for(&app.id, &svc.name),
            cap_add: svc.cap_add.clone(),
            sysctls: svc.sysctls.clone(),
        };

        engine.create_container(&spec).await?;
        engine.connect_network(&network, &name, &svc.name).await?;
        engine.start_container(&name).await?;
    }

    Ok(format!("{} installed", app.id))
}

/// A survivor from an earlier install may still be attached to the app
/// network; the engine rejects the duplicate connect and that rejection
/// is discarded. Unreachability still aborts.
async fn reconnect_existing(
    engine: &EngineClient,
    network: &str,
    container: &str,
    alias: &str,
) -> Result<(), ProvisionError> {
    match engine.connect_network(network, container, alias).await {
        Ok(()) | Err(EngineError::OperationFailed(_)) => Ok(()),
        Err(EngineError::Unavailable) => Err(EngineError::Unavailable.into()),
    }
}

/// Create the host-side directory for every declared relative volume and
/// return the full bind list, declared binds included.
fn service_binds(
    apps_root: &Path,
    app_id: &str,
    svc: &ServiceSpec,
) -> std::io::Result<Vec<String>> {
    let base = apps_root.join(app_id);
    std::fs::create_dir_all(&base)?;

    let mut binds = Vec::new();
    for (host_dir, container_path) in &svc.volumes {
        let host_path = base.join(host_dir);
        std::fs::create_dir_all(&host_path)?;
        binds.push(format!("{}:{}", host_path.display(), container_path));
    }
    for (host_path, container_path) in &svc.binds {
        binds.push(format!("{}:{}", host_path, container_path));
    }

    Ok(binds)
}

fn env_list(env: &BTreeMap<String, String>) -> Vec<String> {
    env.iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_service() -> ServiceSpec {
        let mut volumes = BTreeMap::new();
        volumes.insert("data".to_string(), "/data".to_string());
        volumes.insert("config".to_string(), "/config".to_string());
        ServiceSpec {
            name: "web".to_string(),
            image: "x:latest".to_string(),
            env: BTreeMap::new(),
            ports: BTreeMap::new(),
            volumes,
            binds: BTreeMap::new(),
            cap_add: Vec::new(),
            sysctls: BTreeMap::new(),
        }
    }

    #[test]
    fn env_list_is_sorted_key_value_pairs() {
        let mut env = BTreeMap::new();
        env.insert("TZ".to_string(), "Etc/UTC".to_string());
        env.insert("PUID".to_string(), "1000".to_string());
        assert_eq!(env_list(&env), vec!["PUID=1000", "TZ=Etc/UTC"]);
    }

    #[test]
    fn service_binds_create_host_dirs_under_the_app_root() {
        let root = std::env::temp_dir().join(format!("dockhand-test-{}", uuid::Uuid::new_v4()));

        let binds = service_binds(&root, "demo", &demo_service()).unwrap();

        assert!(root.join("demo").join("data").is_dir());
        assert!(root.join("demo").join("config").is_dir());
        assert_eq!(binds.len(), 2);
        assert!(binds.iter().any(|b| b.ends_with(":/data")));
        assert!(binds.iter().any(|b| b.ends_with(":/config")));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn declared_binds_pass_through_untouched() {
        let root = std::env::temp_dir().join(format!("dockhand-test-{}", uuid::Uuid::new_v4()));
        let mut svc = demo_service();
        svc.volumes.clear();
        svc.binds
            .insert("/mnt/media".to_string(), "/media".to_string());

        let binds = service_binds(&root, "demo", &svc).unwrap();
        assert_eq!(binds, vec!["/mnt/media:/media"]);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
