use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::{
    model::id::{ChannelId, GuildId},
    prelude::TypeMapKey,
};
use tracing::{info, warn};

/// On-disk layout of the config file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    /// Values are read leniently so one bad entry cannot hide the others.
    #[serde(default)]
    notification_channels: BTreeMap<String, Value>,
}

/// Keeps track of the text channel each guild wants voice notifications in.
#[derive(Debug, Default)]
pub struct NotificationChannels {
    channels: RwLock<BTreeMap<GuildId, ChannelId>>,

    /// `None` keeps everything in memory.
    config_file: Option<PathBuf>,
}

impl NotificationChannels {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the registry from `config_file`, falling back to an empty one.
    ///
    /// Later writes go back to the same file even if it could not be read.
    pub fn load(config_file: impl Into<PathBuf>) -> Self {
        let config_file = config_file.into();
        let channels = match read_config_file(&config_file) {
            Ok(Some(channels)) => {
                info!(
                    path = %config_file.display(),
                    count = channels.len(),
                    "Loaded config from file"
                );
                channels
            }
            Ok(None) => BTreeMap::new(),
            Err(e) => {
                warn!(path = %config_file.display(), "Error loading config: {e:?}");
                BTreeMap::new()
            }
        };
        Self {
            channels: RwLock::new(channels),
            config_file: Some(config_file),
        }
    }

    pub const fn is_persistent(&self) -> bool {
        self.config_file.is_some()
    }

    pub fn get(&self, guild_id: &GuildId) -> Option<ChannelId> {
        self.channels.read().get(guild_id).copied()
    }

    /// Overwrites the channel for `guild_id` and writes the file.
    ///
    /// A failed write is logged only; the new value stays in memory.
    pub fn set(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<ChannelId> {
        let mut channels = self.channels.write();
        let ret = channels.insert(guild_id, channel_id);
        if let Some(config_file) = &self.config_file {
            match save_config_file(config_file, &channels) {
                Ok(()) => info!(path = %config_file.display(), "Config saved"),
                Err(e) => warn!(path = %config_file.display(), "Error saving config: {e:?}"),
            }
        }
        ret
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<GuildId, ChannelId> {
        self.channels.read().clone()
    }
}

impl TypeMapKey for NotificationChannels {
    type Value = Arc<Self>;
}

fn read_config_file(path: &Path) -> anyhow::Result<Option<BTreeMap<GuildId, ChannelId>>> {
    let j = match fs::read_to_string(path) {
        Ok(j) => j,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).context("Failed to read config file"),
    };
    let file: ConfigFile = serde_json::from_str(&j).context("Failed to parse config file")?;

    let mut channels = BTreeMap::new();
    for (guild, channel) in file.notification_channels {
        match (parse_snowflake(&guild), snowflake_value(&channel)) {
            (Some(guild_id), Some(channel_id)) => {
                channels.insert(GuildId::new(guild_id), ChannelId::new(channel_id));
            }
            _ => warn!(%guild, %channel, "Skipping malformed notification channel entry"),
        }
    }
    Ok(Some(channels))
}

fn save_config_file(path: &Path, channels: &BTreeMap<GuildId, ChannelId>) -> anyhow::Result<()> {
    let file = ConfigFile {
        notification_channels: channels
            .iter()
            .map(|(guild_id, channel_id)| {
                (guild_id.to_string(), Value::String(channel_id.to_string()))
            })
            .collect(),
    };
    let j = serde_json::to_string_pretty(&file)?;
    fs::write(path, j).context("Failed to write config file")?;
    Ok(())
}

/// Discord IDs are never zero.
fn parse_snowflake(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|id| *id != 0)
}

/// Accepts a snowflake written either as a string or as a plain integer.
fn snowflake_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => parse_snowflake(s),
        Value::Number(n) => n.as_u64().filter(|id| *id != 0),
        _ => None,
    }
}
