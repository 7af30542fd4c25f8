use anyhow::{Context, Result};
use etude_infra_storage_fs::FsStorage;
use etude_ports::storage::{SettingsDto, StoragePort};
use etude_ports::types::{ReferenceId, Section, UserId};
use std::path::PathBuf;
use std::time::Duration;

pub struct Dirs {
    pub base: PathBuf,
}

impl Dirs {
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        let base = match explicit {
            Some(dir) => dir,
            None => FsStorage::default_base_dir().context("no config directory for this platform")?,
        };
        Ok(Self { base })
    }

    pub fn storage(&self) -> FsStorage {
        FsStorage::new(self.base.clone())
    }
}

/// Command-line values that win over `settings.json`.
#[derive(Default)]
pub struct Overrides {
    pub data_url: Option<String>,
    pub assistant_url: Option<String>,
    pub user: Option<String>,
    pub reference: Option<String>,
    pub section: Option<String>,
    pub offline: bool,
}

pub struct Resolved {
    pub settings: SettingsDto,
    pub user: Option<UserId>,
    pub reference: Option<ReferenceId>,
    pub timeout: Duration,
    pub offline: bool,
}

pub fn resolve(dirs: &Dirs, overrides: Overrides) -> Result<Resolved> {
    let mut settings = dirs.storage().load_settings().unwrap_or_else(|err| {
        tracing::warn!("ignoring unreadable settings: {}", err);
        SettingsDto::default()
    });

    if let Some(url) = overrides.data_url {
        settings.data_service_url = url;
    }
    if let Some(url) = overrides.assistant_url {
        settings.assistant_service_url = url;
    }
    if let Some(section) = overrides.section {
        settings.default_section = section
            .parse::<Section>()
            .map_err(anyhow::Error::msg)?;
    }

    let user = overrides
        .user
        .map(UserId::new)
        .or_else(|| settings.user_id.clone());
    let reference = overrides
        .reference
        .map(ReferenceId::new)
        .or_else(|| settings.default_reference_id.clone());

    Ok(Resolved {
        timeout: Duration::from_millis(settings.request_timeout_ms),
        settings,
        user,
        reference,
        offline: overrides.offline,
    })
}
