use std::collections::BTreeMap;
use std::path::Path;

use super::types::{AppDefinition, ServiceSpec};

/// Read-only id -> AppDefinition mapping, built once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    apps: BTreeMap<String, AppDefinition>,
}

impl Catalog {
    pub fn lookup(&self, app_id: &str) -> Option<&AppDefinition> {
        self.apps.get(app_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &AppDefinition> {
        self.apps.values()
    }

    /// Load the catalog from a JSON file if one exists, otherwise fall
    /// back to the built-in entries. A malformed file is logged and
    /// ignored rather than aborting startup.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<AppDefinition>>(&raw) {
                Ok(apps) => {
                    println!("Loaded catalog with {} apps from {}", apps.len(), path.display());
                    Self::from_definitions(apps)
                }
                Err(err) => {
                    eprintln!("Ignoring malformed catalog {}: {}", path.display(), err);
                    Self::built_in()
                }
            },
            Err(_) => Self::built_in(),
        }
    }

    pub fn from_definitions(apps: Vec<AppDefinition>) -> Self {
        Catalog {
            apps: apps.into_iter().map(|app| (app.id.clone(), app)).collect(),
        }
    }

    pub fn built_in() -> Self {
        Self::from_definitions(vec![
            AppDefinition {
                id: "qbittorrent".to_string(),
                title: "qBittorrent".to_string(),
                description: "Torrent client with a web UI".to_string(),
                default_url: "http://localhost:8080".to_string(),
                services: vec![ServiceSpec {
                    name: "qbittorrent".to_string(),
                    image: "linuxserver/qbittorrent:latest".to_string(),
                    env: string_map(&[
                        ("PUID", "1000"),
                        ("PGID", "1000"),
                        ("TZ", "Etc/UTC"),
                        ("WEBUI_PORT", "8080"),
                    ]),
                    ports: port_map(&[("8080/tcp", 8080), ("6881/tcp", 6881), ("6881/udp", 6881)]),
                    volumes: string_map(&[("config", "/config"), ("downloads", "/downloads")]),
                    binds: BTreeMap::new(),
                    cap_add: Vec::new(),
                    sysctls: BTreeMap::new(),
                }],
            },
            AppDefinition {
                id: "adguardhome".to_string(),
                title: "AdGuard Home".to_string(),
                description: "DNS server with ad and tracker blocking".to_string(),
                default_url: "http://localhost:3000".to_string(),
                services: vec![ServiceSpec {
                    name: "adguardhome".to_string(),
                    image: "adguard/adguardhome:latest".to_string(),
                    env: string_map(&[("TZ", "Etc/UTC")]),
                    ports: port_map(&[("53/tcp", 53), ("53/udp", 53), ("3000/tcp", 3000)]),
                    volumes: string_map(&[
                        ("work", "/opt/adguardhome/work"),
                        ("conf", "/opt/adguardhome/conf"),
                    ]),
                    binds: BTreeMap::new(),
                    cap_add: Vec::new(),
                    sysctls: BTreeMap::new(),
                }],
            },
            AppDefinition {
                id: "wg-easy".to_string(),
                title: "WireGuard Easy".to_string(),
                description: "WireGuard VPN with a web UI".to_string(),
                default_url: "http://localhost:51821".to_string(),
                services: vec![ServiceSpec {
                    name: "wg-easy".to_string(),
                    image: "ghcr.io/wg-easy/wg-easy:latest".to_string(),
                    env: string_map(&[
                        ("WG_HOST", "YOUR_SERVER_IP_OR_DDNS"),
                        ("PASSWORD", "change-me"),
                        ("WG_PORT", "51820"),
                    ]),
                    ports: port_map(&[("51820/udp", 51820), ("51821/tcp", 51821)]),
                    volumes: string_map(&[("config", "/etc/wireguard")]),
                    binds: BTreeMap::new(),
                    cap_add: vec!["NET_ADMIN".to_string(), "SYS_MODULE".to_string()],
                    sysctls: string_map(&[
                        ("net.ipv4.ip_forward", "1"),
                        ("net.ipv4.conf.all.src_valid_mark", "1"),
                    ]),
                }],
            },
        ])
    }
}

fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn port_map(pairs: &[(&str, u16)]) -> BTreeMap<String, u16> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_lookup_hits_and_misses() {
        let catalog = Catalog::built_in();
        assert!(catalog.lookup("qbittorrent").is_some());
        assert!(catalog.lookup("adguardhome").is_some());
        assert!(catalog.lookup("no-such-app").is_none());
    }

    #[test]
    fn service_names_are_unique_within_each_app() {
        let catalog = Catalog::built_in();
        for app in catalog.entries() {
            let mut names: Vec<&str> = app.services.iter().map(|s| s.name.as_str()).collect();
            names.sort();
            names.dedup();
            assert_eq!(names.len(), app.services.len(), "dup service in {}", app.id);
        }
    }

    #[test]
    fn definition_round_trips_through_json() {
        let raw = r#"[{
            "id": "demo",
            "title": "Demo",
            "description": "demo app",
            "default_url": "http://localhost:8080",
            "services": [{
                "name": "web",
                "image": "x:latest",
                "ports": {"80/tcp": 8080},
                "volumes": {"data": "/data"}
            }]
        }]"#;
        let apps: Vec<AppDefinition> = serde_json::from_str(raw).unwrap();
        let catalog = Catalog::from_definitions(apps);
        let app = catalog.lookup("demo").unwrap();
        assert_eq!(app.services.len(), 1);
        let svc = &app.services[0];
        assert_eq!(svc.ports.get("80/tcp"), Some(&8080));
        assert_eq!(svc.volumes.get("data"), Some(&"/data".to_string()));
        assert!(svc.env.is_empty());
        assert!(svc.cap_add.is_empty());
    }
}
