//! Alias tables for platform and artist names.
//!
//! Resolution is substring-based and case-sensitive: the first canonical
//! entry (declaration order) owning an alias contained in the input wins.
//! Unmatched input passes through unchanged.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTable {
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    pub fn new(entries: Vec<AliasEntry>) -> Self {
        Self { entries }
    }

    pub fn from_static(rows: &[(&str, &[&str])]) -> Self {
        Self::new(
            rows.iter()
                .map(|(canonical, aliases)| AliasEntry {
                    canonical: canonical.to_string(),
                    aliases: aliases.iter().map(|a| a.to_string()).collect(),
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.entries
            .iter()
            .find(|entry| entry.aliases.iter().any(|alias| name.contains(alias.as_str())))
            .map(|entry| entry.canonical.as_str())
            .unwrap_or(name)
    }

    /// Pairs (earlier canonical, later canonical) where an alias of the
    /// earlier entry occurs inside the later canonical name. Each pair
    /// breaks idempotence: resolving the later name yields the earlier one.
    pub fn shadowed_canonicals(&self) -> Vec<(&str, &str)> {
        let mut out = Vec::new();
        for (i, later) in self.entries.iter().enumerate() {
            for earlier in &self.entries[..i] {
                if earlier
                    .aliases
                    .iter()
                    .any(|alias| later.canonical.contains(alias.as_str()))
                {
                    out.push((earlier.canonical.as_str(), later.canonical.as_str()));
                }
            }
        }
        out
    }
}

pub fn builtin_platform_aliases() -> AliasTable {
    AliasTable::from_static(&[
        ("멜론", &["카카오", "MelOn", "멜론"]),
        ("지니", &["KT뮤직NewGenie", "지니", "지니뮤직", "Genie"]),
        ("벅스", &["벅스", "Bugs", "벅스뮤직", "BugsMusic", "벅스 뮤직", "Bugs Music"]),
        ("소리바다", &["소리바다", "SORIBADA", "SORI BADA"]),
        (
            "유튜브뮤직",
            &[
                "유튜브뮤직",
                "유튜브 뮤직",
                "Youtube",
                "유튜브",
                "유튜브레드",
                "Youtube Music",
                "YoutubeMusic",
                "YOUTUBE AD PARTNER",
                "YOUTUBE RED",
            ],
        ),
        ("애플뮤직", &["Apple", "애플뮤직", "애플", "Apple Music", "AppleMusic", "APPLE MUSIC"]),
        (
            "바이브",
            &["바이브", "VIBE", "네이버", "네이버뮤직", "Naver", "Naver Music", "NaverMusic"],
        ),
        ("플로", &["플로", "FLO"]),
        ("인스타그램", &["인스타그램", "Instagram"]),
        ("페이스북", &["페이스북", "Facebook"]),
        ("아마존", &["Amazon", "아마존", "Amazon Prime (USD)"]),
        ("Resso", &["Resso", "레쏘"]),
        ("Deezer", &["Deezer", "디저"]),
        ("Tidal", &["Tidal", "타이달"]),
        ("컬러링", &["V컬러링"]),
        ("틱톡", &["틱톡", "Tiktok", "TikTok"]),
        ("카톡", &["카톡", "카카오톡"]),
        ("웨이브", &["WAVVE", "웨이버"]),
        ("올레뮤직", &["KT뮤직유선ollehMusic", "올레뮤직", "ollehMusic"]),
        ("스포티파이", &["Spotify", "스포티파이"]),
    ])
}

pub fn builtin_artist_aliases() -> AliasTable {
    AliasTable::from_static(&[
        (
            "사운드힐즈",
            &["사운드힐즈", "사운드 힐즈", "Soundhills", "soundhills", "Sound Hills", "sound hills"],
        ),
        ("스원", &["스원", "Swon", "swon", "스원(Swon)", "스원 (Swon)"]),
        ("나노말", &["나노말", "NANOMAL", "nanomal", "Nanomal"]),
        ("이유카", &["이유카", "Lee Yuka", "LEE YUKA", "LeeYuKa"]),
        ("하예지", &["하예지", "하예지 (발라드)"]),
        ("유마", &["유마"]),
        ("동자동휘", &["동자동휘"]),
        ("이규소", &["이규소"]),
        ("임광균", &["임광균"]),
        ("안우", &["안우", "안우 (Ahnoo)", "안우(Ahnoo)"]),
        ("Aaron", &["Aaron (댄스)", "Aaron(댄스)", "Aaron", "aaron", "AARON"]),
        ("위시스", &["위시스", "Wiishes", "WIISHES", "wiishes"]),
    ])
}
