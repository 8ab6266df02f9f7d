use crate::{
    alias::{builtin_artist_aliases, builtin_platform_aliases, AliasEntry, AliasTable},
    error::SettlementResult,
    profile::{PartnerProfile, ProfileRegistry},
};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::path::Path;

pub const DEFAULT_WORKSHEET: &str = "음원_정산내역(전체데이터)";

pub const PROFILES_FILE: &str = "partners/partner_profiles.json";
pub const PLATFORM_ALIASES_FILE: &str = "aliases/platform_aliases.json";
pub const ARTIST_ALIASES_FILE: &str = "aliases/artist_aliases.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfilesFile {
    profiles: Vec<PartnerProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AliasFile {
    aliases: Vec<AliasEntry>,
}

/// Everything the normalizer needs: partner profiles and both alias tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub profiles:  ProfileRegistry,
    pub platforms: AliasTable,
    pub artists:   AliasTable,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl IngestConfig {
    /// Production tables compiled into the binary.
    pub fn builtin() -> Self {
        Self {
            profiles:  ProfileRegistry::builtin(),
            platforms: builtin_platform_aliases(),
            artists:   builtin_artist_aliases(),
        }
    }

    /// Load overrides from a data directory. Each file is optional;
    /// an absent file keeps the built-in table.
    pub fn load(data_dir: &Path) -> SettlementResult<Self> {
        let mut config = Self::builtin();

        if let Some(file) = read_json::<ProfilesFile>(&data_dir.join(PROFILES_FILE))? {
            config.profiles = ProfileRegistry::new(file.profiles)?;
        }
        if let Some(file) = read_json::<AliasFile>(&data_dir.join(PLATFORM_ALIASES_FILE))? {
            config.platforms = AliasTable::new(file.aliases);
        }
        if let Some(file) = read_json::<AliasFile>(&data_dir.join(ARTIST_ALIASES_FILE))? {
            config.artists = AliasTable::new(file.aliases);
        }

        config.warn_on_shadowed_aliases();
        log::info!(
            "config loaded from {}: {} profiles, {} platforms, {} artists",
            data_dir.display(),
            config.profiles.profiles().len(),
            config.platforms.entries().len(),
            config.artists.entries().len()
        );
        Ok(config)
    }

    /// Render as the data-directory file set, keyed by relative path.
    pub fn to_files(&self) -> SettlementResult<Vec<(&'static str, String)>> {
        Ok(vec![
            (
                PROFILES_FILE,
                serde_json::to_string_pretty(&ProfilesFile {
                    profiles: self.profiles.profiles().to_vec(),
                })?,
            ),
            (
                PLATFORM_ALIASES_FILE,
                serde_json::to_string_pretty(&AliasFile {
                    aliases: self.platforms.entries().to_vec(),
                })?,
            ),
            (
                ARTIST_ALIASES_FILE,
                serde_json::to_string_pretty(&AliasFile {
                    aliases: self.artists.entries().to_vec(),
                })?,
            ),
        ])
    }

    fn warn_on_shadowed_aliases(&self) {
        for (name, table) in [("platform", &self.platforms), ("artist", &self.artists)] {
            for (earlier, later) in table.shadowed_canonicals() {
                log::warn!(
                    "{name} alias table: '{later}' contains an alias of earlier entry '{earlier}' \
                     and will resolve to it"
                );
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> SettlementResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
    let parsed = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
    Ok(Some(parsed))
}
