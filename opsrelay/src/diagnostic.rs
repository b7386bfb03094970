//! `--diagnostic`: a readable checklist of what the relay needs at runtime

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;

use crate::config::settings::Settings;
use crate::utils::version_info;

/// Result of one diagnostic check
#[derive(Debug)]
pub struct Check {
    pub name: &'static str,
    pub required: bool,
    pub result: anyhow::Result<String>,
}

impl Check {
    pub fn passed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every check against `settings`
pub async fn run_checks(settings: &Settings) -> Vec<Check> {
    let chat_needed = settings.enable_bot || settings.notify_server.enabled;
    let provision_needed = settings.provision_server.enabled;

    vec![
        Check {
            name: "bot token",
            required: chat_needed,
            result: check_present(&settings.telegram.token, "TELEGRAM_TOKEN")
                .map(|_| "set".to_string()),
        },
        Check {
            name: "operator chat",
            required: chat_needed,
            result: check_present(&settings.telegram.chat_id, "CHAT_ID"),
        },
        Check {
            name: "systemctl",
            required: settings.enable_bot,
            result: find_binary(&settings.deploy.systemctl_path)
                .map(|path| path.display().to_string()),
        },
        Check {
            name: "pct",
            required: provision_needed,
            result: find_binary(&settings.provision.pct_path)
                .map(|path| path.display().to_string()),
        },
        Check {
            name: "LXC config dir",
            required: provision_needed,
            result: check_config_dir(&settings.provision.lxc_config_dir).await,
        },
    ]
}

/// Print the checklist; returns false when a required check failed
pub async fn run_diagnostic(settings: &Settings) -> bool {
    let version = version_info();
    println!(
        "{} {} ({}, built {})",
        "opsrelay".bold(),
        version.version,
        version.git_hash,
        version.build_time
    );

    let mut healthy = true;
    for check in run_checks(settings).await {
        match &check.result {
            Ok(detail) => println!("  {} {}: {}", "✓".green(), check.name, detail),
            Err(e) if check.required => {
                healthy = false;
                println!("  {} {}: {:#}", "✗".red(), check.name, e);
            }
            Err(e) => println!("  {} {}: {:#} (unused)", "-".yellow(), check.name, e),
        }
    }
    healthy
}

fn check_present(value: &str, env: &str) -> anyhow::Result<String> {
    if value.trim().is_empty() {
        bail!("not set (settings file or {})", env);
    }
    Ok(value.to_string())
}

/// Resolve `program` the way the process spawner would
pub fn find_binary(program: &str) -> anyhow::Result<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        if path.is_file() {
            return Ok(path);
        }
        bail!("{} does not exist", program);
    }

    let search_path = std::env::var_os("PATH").context("PATH is not set")?;
    std::env::split_paths(&search_path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .with_context(|| format!("{} not found in PATH", program))
}

async fn check_config_dir(dir: &Path) -> anyhow::Result<String> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot read {}", dir.display()))?;

    let mut confs = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.path().extension().is_some_and(|ext| ext == "conf") {
            confs += 1;
        }
    }
    Ok(format!("{} ({} containers)", dir.display(), confs))
}
