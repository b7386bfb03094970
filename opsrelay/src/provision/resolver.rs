//! Container identity resolution from hypervisor config records

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::ProvisionError;
use crate::provision::selector::{ContainerId, ContainerSelector};

/// The fields of one container config record the resolver cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRecord {
    /// `ip=` values of the `netN:` lines, as written
    pub ips: Vec<String>,
    pub hostname: Option<String>,
    /// Value of the `rootfs:` line
    pub rootfs: Option<String>,
}

impl ContainerRecord {
    /// Parse a Proxmox LXC config. Snapshot sections are skipped.
    pub fn parse(text: &str) -> Self {
        let mut record = ContainerRecord::default();

        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('[') {
                break;
            }
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "hostname" => record.hostname = Some(value.to_string()),
                "rootfs" => record.rootfs = Some(value.to_string()),
                k if k.starts_with("net") => {
                    record.ips.extend(
                        value
                            .split(',')
                            .filter_map(|opt| opt.strip_prefix("ip="))
                            .map(str::to_string),
                    );
                }
                _ => {}
            }
        }

        record
    }

    /// Case-sensitive substring match against the declared field, no IP normalization
    pub fn matches(&self, selector: &ContainerSelector) -> bool {
        match selector {
            ContainerSelector::Ip(ip) => self.ips.iter().any(|declared| declared.contains(ip.as_str())),
            ContainerSelector::Hostname(hostname) => self
                .hostname
                .as_deref()
                .is_some_and(|declared| declared.contains(hostname.as_str())),
            ContainerSelector::RawId(_) => false,
        }
    }

    pub fn container_id(&self) -> Option<ContainerId> {
        self.rootfs.as_deref().and_then(extract_container_id)
    }
}

/// Pull the VMID out of a rootfs volume string.
///
/// `local-lvm:vm-101-disk-0,size=8G` and `local:101/vm-101-disk-0.raw` both give `101`.
pub fn extract_container_id(rootfs: &str) -> Option<ContainerId> {
    let volume = rootfs.split(',').next()?;
    let (_storage, path) = volume.split_once(':')?;
    let segment = path.split('/').next()?;
    let id = segment.split('-').nth(1).unwrap_or(segment);

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(ContainerId::new(id))
}

/// Resolve `selector` against already loaded records
pub fn resolve_in<'a, I>(records: I, selector: &ContainerSelector) -> Result<ContainerId, ProvisionError>
where
    I: IntoIterator<Item = &'a ContainerRecord>,
{
    if let ContainerSelector::RawId(id) = selector {
        return Ok(ContainerId::new(id.trim()));
    }

    let not_found = || ProvisionError::NotFound(selector.to_string());

    let mut matches = records.into_iter().filter(|record| record.matches(selector));
    let record = matches.next().ok_or_else(not_found)?;
    if matches.next().is_some() {
        warn!("Ambiguous match for {}", selector);
        return Err(not_found());
    }

    record.container_id().ok_or_else(not_found)
}

/// Scans the per-container config directory for a selector's container
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    config_dir: PathBuf,
}

impl IdentityResolver {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub async fn resolve(&self, selector: &ContainerSelector) -> Result<ContainerId, ProvisionError> {
        if let ContainerSelector::RawId(_) = selector {
            return resolve_in(std::iter::empty(), selector);
        }

        let records = self.load_records().await.map_err(|e| ProvisionError::ExecutionError {
            message: format!(
                "failed to scan container configs in {}: {}",
                self.config_dir.display(),
                e
            ),
            partial_output: String::new(),
        })?;

        let id = resolve_in(records.iter(), selector)?;
        debug!("Resolved {} to container {}", selector, id);
        Ok(id)
    }

    async fn load_records(&self) -> Result<Vec<ContainerRecord>, std::io::Error> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.config_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "conf") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match tokio::fs::read_to_string(&path).await {
                Ok(text) => records.push(ContainerRecord::parse(&text)),
                Err(e) => warn!("Skipping unreadable config {}: {}", path.display(), e),
            }
        }
        Ok(records)
    }
}
