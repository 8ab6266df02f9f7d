//! Partner profile registry.
//!
//! An ordered list of profiles, each guarded by a validity predicate.
//! Resolution picks the first entry whose partner matches and whose
//! predicate accepts the settlement month. Adding a partner is a data
//! change: append an entry.

use crate::{
    error::{SettlementError, SettlementResult},
    types::{PartnerName, YearMonth},
};
use serde::{Deserialize, Serialize};

/// Where a variable output field comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<RawColumnSource>", into = "Option<RawColumnSource>")]
pub enum ColumnSource {
    Column(String),
    /// Sum of several columns; missing or null contributors count as zero.
    Sum(Vec<String>),
    #[default]
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawColumnSource {
    One(String),
    Many(Vec<String>),
}

impl From<Option<RawColumnSource>> for ColumnSource {
    fn from(raw: Option<RawColumnSource>) -> Self {
        match raw {
            None => ColumnSource::Absent,
            Some(RawColumnSource::One(name)) if name.is_empty() => ColumnSource::Absent,
            Some(RawColumnSource::One(name)) => ColumnSource::Column(name),
            Some(RawColumnSource::Many(names)) => ColumnSource::Sum(names),
        }
    }
}

impl From<ColumnSource> for Option<RawColumnSource> {
    fn from(source: ColumnSource) -> Self {
        match source {
            ColumnSource::Column(name) => Some(RawColumnSource::One(name)),
            ColumnSource::Sum(names) => Some(RawColumnSource::Many(names)),
            ColumnSource::Absent => None,
        }
    }
}

impl ColumnSource {
    pub fn column(name: &str) -> Self {
        ColumnSource::Column(name.to_string())
    }

    pub fn sum(names: &[&str]) -> Self {
        ColumnSource::Sum(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Source columns for the eight variable output fields.
/// Artist, album and track are mandatory single columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub artist_name: String,
    pub album_name: String,
    pub track_name: String,
    #[serde(default)]
    pub platform: ColumnSource,
    #[serde(default)]
    pub service_type: ColumnSource,
    #[serde(default)]
    pub sale_count: ColumnSource,
    #[serde(default)]
    pub revenue: ColumnSource,
    #[serde(default)]
    pub settlement_amount: ColumnSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "month", rename_all = "snake_case")]
pub enum Validity {
    #[default]
    Always,
    /// Settlement month at or after the cutoff.
    FromMonth(YearMonth),
}

impl Validity {
    pub fn accepts(&self, settlement_month: YearMonth) -> bool {
        match self {
            Validity::Always => true,
            Validity::FromMonth(cutoff) => settlement_month >= *cutoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerProfile {
    pub partner: PartnerName,
    #[serde(default)]
    pub valid: Validity,
    /// 0-based sheet row holding the column names.
    pub header_row: usize,
    /// 0-based sheet row where data begins; rows between are skipped.
    pub data_start_row: usize,
    pub lag_months: u32,
    #[serde(default)]
    pub worksheet: Option<String>,
    pub columns: ColumnMapping,
}

impl PartnerProfile {
    /// Data rows to discard after the header row.
    pub fn skip_rows(&self) -> usize {
        self.data_start_row.saturating_sub(self.header_row)
    }

    pub fn validate(&self) -> SettlementResult<()> {
        let invalid = |reason: String| SettlementError::InvalidProfile {
            partner: self.partner.clone(),
            reason,
        };
        if self.data_start_row < self.header_row {
            return Err(invalid(format!(
                "data_start_row {} is above header_row {}",
                self.data_start_row, self.header_row
            )));
        }
        let mandatory = [
            ("artist_name", &self.columns.artist_name),
            ("album_name", &self.columns.album_name),
            ("track_name", &self.columns.track_name),
        ];
        for (field, column) in mandatory {
            if column.is_empty() {
                return Err(invalid(format!("{field} must name a source column")));
            }
        }
        let text_fields = [
            ("platform", &self.columns.platform),
            ("service_type", &self.columns.service_type),
        ];
        for (field, source) in text_fields {
            if let ColumnSource::Sum(_) = source {
                return Err(invalid(format!("{field} is text and cannot be a column sum")));
            }
        }
        Ok(())
    }
}

/// Deserializes from a plain profile list and validates every entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<PartnerProfile>", into = "Vec<PartnerProfile>")]
pub struct ProfileRegistry {
    profiles: Vec<PartnerProfile>,
}

impl TryFrom<Vec<PartnerProfile>> for ProfileRegistry {
    type Error = SettlementError;

    fn try_from(profiles: Vec<PartnerProfile>) -> SettlementResult<Self> {
        Self::new(profiles)
    }
}

impl From<ProfileRegistry> for Vec<PartnerProfile> {
    fn from(registry: ProfileRegistry) -> Self {
        registry.profiles
    }
}

impl ProfileRegistry {
    pub fn new(profiles: Vec<PartnerProfile>) -> SettlementResult<Self> {
        for profile in &profiles {
            profile.validate()?;
        }
        Ok(Self { profiles })
    }

    pub fn profiles(&self) -> &[PartnerProfile] {
        &self.profiles
    }

    pub fn resolve(
        &self,
        partner: &str,
        settlement_month: YearMonth,
    ) -> SettlementResult<&PartnerProfile> {
        self.profiles
            .iter()
            .find(|p| p.partner == partner && p.valid.accepts(settlement_month))
            .ok_or_else(|| SettlementError::UnsupportedDistributor {
                name: partner.to_string(),
            })
    }

    /// Production profiles.
    pub fn builtin() -> Self {
        let line_m_cutoff = YearMonth::new(2024, 12).expect("valid cutoff month");
        Self {
            profiles: vec![
                // Report layout changed with the December 2024 settlement.
                PartnerProfile {
                    partner: "라인엠컴퍼니".into(),
                    valid: Validity::FromMonth(line_m_cutoff),
                    header_row: 12,
                    data_start_row: 12,
                    lag_months: 3,
                    worksheet: None,
                    columns: ColumnMapping {
                        artist_name: "아티스트".into(),
                        album_name: "앨범명".into(),
                        track_name: "곡명".into(),
                        platform: ColumnSource::column("서비스사"),
                        service_type: ColumnSource::column("서비스종류"),
                        sale_count: ColumnSource::column("HIT-s"),
                        revenue: ColumnSource::column("매출"),
                        settlement_amount: ColumnSource::column("아티스트정산금"),
                    },
                },
                PartnerProfile {
                    partner: "라인엠컴퍼니".into(),
                    valid: Validity::Always,
                    header_row: 10,
                    data_start_row: 10,
                    lag_months: 3,
                    worksheet: None,
                    columns: ColumnMapping {
                        artist_name: "아티스트명".into(),
                        album_name: "앨범명".into(),
                        track_name: "곡명".into(),
                        platform: ColumnSource::column("정산처"),
                        service_type: ColumnSource::column("서비스명"),
                        sale_count: ColumnSource::column("카운트"),
                        revenue: ColumnSource::column("정산"),
                        settlement_amount: ColumnSource::column("계약자정산"),
                    },
                },
                PartnerProfile {
                    partner: "뮤직앤뉴".into(),
                    valid: Validity::Always,
                    header_row: 0,
                    data_start_row: 0,
                    lag_months: 1,
                    worksheet: None,
                    columns: ColumnMapping {
                        artist_name: "아티스트".into(),
                        album_name: "앨범명".into(),
                        track_name: "곡명".into(),
                        platform: ColumnSource::column("사이트"),
                        service_type: ColumnSource::column("POC서비스명"),
                        sale_count: ColumnSource::column("판매횟수"),
                        revenue: ColumnSource::column("합계금액"),
                        settlement_amount: ColumnSource::column("권리사정산금액"),
                    },
                },
                PartnerProfile {
                    partner: "비스킷사운드".into(),
                    valid: Validity::Always,
                    header_row: 3,
                    data_start_row: 3,
                    lag_months: 1,
                    worksheet: Some("음원 상세내역".into()),
                    columns: ColumnMapping {
                        artist_name: "아티스트명".into(),
                        album_name: "앨범명".into(),
                        track_name: "트랙명".into(),
                        platform: ColumnSource::column("서비스사이트"),
                        service_type: ColumnSource::column("MEDIA"),
                        sale_count: ColumnSource::sum(&["스트리밍", "다운로드", "기타수량"]),
                        revenue: ColumnSource::column("저작인접권료"),
                        settlement_amount: ColumnSource::column("인세"),
                    },
                },
                PartnerProfile {
                    partner: "미러볼뮤직".into(),
                    valid: Validity::Always,
                    header_row: 0,
                    data_start_row: 0,
                    lag_months: 1,
                    worksheet: None,
                    columns: ColumnMapping {
                        artist_name: "아티스트".into(),
                        album_name: "앨범명".into(),
                        track_name: "곡명".into(),
                        platform: ColumnSource::Absent,
                        service_type: ColumnSource::Absent,
                        sale_count: ColumnSource::Absent,
                        revenue: ColumnSource::column("합계금액"),
                        settlement_amount: ColumnSource::column("정산금액"),
                    },
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(text: &str) -> YearMonth {
        YearMonth::parse(text).unwrap()
    }

    #[test]
    fn cutover_selects_profile_by_month() {
        let registry = ProfileRegistry::builtin();
        let at_cutoff = registry.resolve("라인엠컴퍼니", month("2024-12")).unwrap();
        assert_eq!(at_cutoff.header_row, 12);
        assert_eq!(at_cutoff.columns.artist_name, "아티스트");

        let before = registry.resolve("라인엠컴퍼니", month("2024-11")).unwrap();
        assert_eq!(before.header_row, 10);
        assert_eq!(before.columns.artist_name, "아티스트명");

        let after = registry.resolve("라인엠컴퍼니", month("2025-03")).unwrap();
        assert_eq!(after.header_row, 12);
    }

    #[test]
    fn unknown_partner_is_unsupported() {
        let registry = ProfileRegistry::builtin();
        let err = registry.resolve("없는유통사", month("2024-05")).unwrap_err();
        assert!(matches!(err, SettlementError::UnsupportedDistributor { name } if name == "없는유통사"));
    }

    #[test]
    fn biscuit_sound_reads_named_sheet() {
        let registry = ProfileRegistry::builtin();
        let profile = registry.resolve("비스킷사운드", month("2024-05")).unwrap();
        assert_eq!(profile.worksheet.as_deref(), Some("음원 상세내역"));
        assert_eq!(
            profile.columns.sale_count,
            ColumnSource::sum(&["스트리밍", "다운로드", "기타수량"])
        );
    }

    #[test]
    fn column_source_json_shapes() {
        let json = r#"{
            "artist_name": "A", "album_name": "B", "track_name": "C",
            "platform": "P", "service_type": null, "sale_count": ["x", "y"], "revenue": ""
        }"#;
        let mapping: ColumnMapping = serde_json::from_str(json).unwrap();
        assert_eq!(mapping.platform, ColumnSource::column("P"));
        assert_eq!(mapping.service_type, ColumnSource::Absent);
        assert_eq!(mapping.sale_count, ColumnSource::sum(&["x", "y"]));
        assert_eq!(mapping.revenue, ColumnSource::Absent);
        assert_eq!(mapping.settlement_amount, ColumnSource::Absent);
    }

    #[test]
    fn data_start_above_header_is_rejected() {
        let mut profile = ProfileRegistry::builtin().profiles()[2].clone();
        profile.header_row = 4;
        profile.data_start_row = 2;
        assert!(matches!(
            ProfileRegistry::new(vec![profile]),
            Err(SettlementError::InvalidProfile { .. })
        ));
    }

    #[test]
    fn registry_json_is_validated() {
        let mut profile = ProfileRegistry::builtin().profiles()[2].clone();
        profile.header_row = 4;
        profile.data_start_row = 2;
        // Unvalidated profiles never underflow.
        assert_eq!(profile.skip_rows(), 0);

        let json = serde_json::to_string(&vec![profile]).unwrap();
        let err = serde_json::from_str::<ProfileRegistry>(&json).unwrap_err();
        assert!(err.to_string().contains("data_start_row 2 is above header_row 4"));

        let builtin = ProfileRegistry::builtin();
        let round_trip: ProfileRegistry =
            serde_json::from_str(&serde_json::to_string(&builtin).unwrap()).unwrap();
        assert_eq!(round_trip, builtin);
    }
}
