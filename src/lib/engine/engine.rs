use std::collections::{BTreeMap, HashMap};

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use bollard::secret::{
    ContainerSummary, EndpointSettings, HostConfig, PortBinding, RestartPolicy,
    RestartPolicyNameEnum,
};
use futures_util::stream::StreamExt;

use super::types::{CreateSpec, EngineClient, EngineError, EngineResult};

fn classify(err: DockerError) -> EngineError {
    EngineError::OperationFailed(err.to_string())
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// The engine answers 304 when a container is already in the requested
/// run state; starting a running container and stopping a stopped one
/// are no-ops, not failures.
fn ok_if_not_modified(result: Result<(), DockerError>) -> EngineResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(DockerError::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        Err(err) => Err(classify(err)),
    }
}

impl EngineClient {
    /// Connect to the local control socket and verify it answers. The
    /// reachability check happens here, once per acquisition.
    pub async fn acquire() -> EngineResult<Self> {
        let client =
            Docker::connect_with_unix_defaults().map_err(|_| EngineError::Unavailable)?;
        client.ping().await.map_err(|_| EngineError::Unavailable)?;
        Ok(EngineClient { client })
    }

    pub async fn pull_image(&self, image: &str) -> EngineResult<()> {
        println!("Pulling image: {}", image);

        let mut stream = self.client.create_image(
            Some(CreateImageOptions {
                from_image: image.to_string(),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(msg) = stream.next().await {
            if let Err(err) = msg {
                eprintln!("Error pulling image {}: {}", image, err);
                return Err(classify(err));
            }
        }

        Ok(())
    }

    /// Get-or-create the named bridge network.
    pub async fn ensure_network(&self, name: &str) -> EngineResult<()> {
        match self
            .client
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => {
                self.client
                    .create_network(CreateNetworkOptions {
                        name: name.to_string(),
                        driver: "bridge".to_string(),
                        ..Default::default()
                    })
                    .await
                    .map(|_| ())
                    .map_err(classify)
            }
            Err(err) => Err(classify(err)),
        }
    }

    pub async fn connect_network(
        &self,
        network: &str,
        container: &str,
        alias: &str,
    ) -> EngineResult<()> {
        self.client
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container: container.to_string(),
                    endpoint_config: EndpointSettings {
                        aliases: Some(vec![alias.to_string()]),
                        ..Default::default()
                    },
                },
            )
            .await
            .map_err(classify)
    }

    pub async fn remove_network(&self, name: &str) -> EngineResult<()> {
        self.client.remove_network(name).await.map_err(classify)
    }

    pub async fn container_exists(&self, name: &str) -> EngineResult<bool> {
        match self
            .client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_not_found(&err) => Ok(false),
            Err(err) => Err(classify(err)),
        }
    }

    pub async fn create_container(&self, spec: &CreateSpec) -> EngineResult<String> {
        let host_config = HostConfig {
            binds: Some(spec.binds.clone()),
            port_bindings: Some(port_bindings(&spec.ports)),
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            cap_add: if spec.cap_add.is_empty() {
                None
            } else {
                Some(spec.cap_add.clone())
            },
            sysctls: if spec.sysctls.is_empty() {
                None
            } else {
                Some(spec.sysctls.clone().into_iter().collect())
            },
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            labels: Some(spec.labels.clone().into_iter().collect()),
            exposed_ports: Some(exposed_ports(&spec.ports)),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = Some(CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        });

        match self.client.create_container(options, config).await {
            Ok(resp) => {
                println!("Container created: {} ({})", spec.name, resp.id);
                Ok(resp.id)
            }
            Err(err) => {
                eprintln!("Error creating container {}: {}", spec.name, err);
                Err(classify(err))
            }
        }
    }

    pub async fn start_container(&self, name: &str) -> EngineResult<()> {
        ok_if_not_modified(
            self.client
                .start_container(name, None::<StartContainerOptions<String>>)
                .await,
        )
    }

    pub async fn stop_container(&self, name: &str, grace_secs: i64) -> EngineResult<()> {
        ok_if_not_modified(
            self.client
                .stop_container(name, Some(StopContainerOptions { t: grace_secs }))
                .await,
        )
    }

    pub async fn restart_container(&self, name: &str, grace_secs: isize) -> EngineResult<()> {
        ok_if_not_modified(
            self.client
                .restart_container(name, Some(RestartContainerOptions { t: grace_secs }))
                .await,
        )
    }

    pub async fn remove_container(&self, name: &str) -> EngineResult<()> {
        self.client
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(classify)
    }

    /// Label-filtered listing, stopped containers included. This query is
    /// the only ownership index: which containers belong to which app is
    /// recovered from the engine, never stored locally.
    pub async fn list_by_labels(&self, labels: &[String]) -> EngineResult<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), labels.to_vec());

        self.client
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(classify)
    }
}

fn port_bindings(ports: &BTreeMap<String, u16>) -> HashMap<String, Option<Vec<PortBinding>>> {
    ports
        .iter()
        .map(|(container_port, host_port)| {
            (
                container_port.clone(),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(host_port.to_string()),
                }]),
            )
        })
        .collect()
}

fn exposed_ports(ports: &BTreeMap<String, u16>) -> HashMap<String, HashMap<(), ()>> {
    ports
        .keys()
        .map(|container_port| (container_port.clone(), HashMap::new()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_ports() -> BTreeMap<String, u16> {
        let mut ports = BTreeMap::new();
        ports.insert("80/tcp".to_string(), 8080);
        ports.insert("53/udp".to_string(), 53);
        ports
    }

    #[test]
    fn port_bindings_publish_each_declared_port() {
        let bindings = port_bindings(&demo_ports());
        assert_eq!(bindings.len(), 2);
        let web = bindings.get("80/tcp").unwrap().as_ref().unwrap();
        assert_eq!(web.len(), 1);
        assert_eq!(web[0].host_port.as_deref(), Some("8080"));
        assert_eq!(web[0].host_ip, None);
    }

    #[test]
    fn exposed_ports_mirror_the_binding_keys() {
        let exposed = exposed_ports(&demo_ports());
        assert!(exposed.contains_key("80/tcp"));
        assert!(exposed.contains_key("53/udp"));
        assert!(exposed.values().all(|v| v.is_empty()));
    }

    #[test]
    fn rejected_calls_keep_the_engine_message() {
        let err = classify(DockerError::DockerResponseServerError {
            status_code: 500,
            message: "driver failed".to_string(),
        });
        assert!(matches!(&err, EngineError::OperationFailed(msg) if msg.contains("driver failed")));
    }

    #[test]
    fn not_modified_is_a_no_op_not_a_failure() {
        let already = Err(DockerError::DockerResponseServerError {
            status_code: 304,
            message: "container already started".to_string(),
        });
        assert_eq!(ok_if_not_modified(already), Ok(()));

        let rejected = Err(DockerError::DockerResponseServerError {
            status_code: 409,
            message: "removal in progress".to_string(),
        });
        assert!(ok_if_not_modified(rejected).is_err());
    }
}
