use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::geo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardType {
    #[serde(rename = "AIR_RAID")]
    AirRaid,
    #[serde(rename = "DRONE")]
    Drone,
    #[serde(rename = "MISSILE")]
    Missile,
    #[serde(rename = "FLOOD")]
    Flood,
    #[serde(rename = "FIRE")]
    Fire,
    #[serde(rename = "INDUSTRIAL")]
    Industrial,
    #[serde(rename = "SHOOTING")]
    Shooting,
    #[serde(rename = "STORM")]
    Storm,
    #[serde(rename = "TSUNAMI")]
    Tsunami,
    #[serde(rename = "CHEMICAL WEAPON")]
    ChemicalWeapon,
    #[serde(rename = "BIOHAZARD")]
    Biohazard,
    #[serde(rename = "NUCLEAR")]
    Nuclear,
    #[serde(rename = "UNMARKED SOLDIERS")]
    UnmarkedSoldiers,
    #[serde(rename = "PANDEMIC")]
    Pandemic,
    #[serde(rename = "TERRORIST ATTACK")]
    TerroristAttack,
    #[serde(rename = "MASS POISONING")]
    MassPoisoning,
    #[serde(rename = "CYBER ATTACK")]
    CyberAttack,
    #[serde(rename = "EARTHQUAKE")]
    Earthquake,
}

impl HazardType {
    pub const ALL: [HazardType; 18] = [
        HazardType::AirRaid,
        HazardType::Drone,
        HazardType::Missile,
        HazardType::Flood,
        HazardType::Fire,
        HazardType::Industrial,
        HazardType::Shooting,
        HazardType::Storm,
        HazardType::Tsunami,
        HazardType::ChemicalWeapon,
        HazardType::Biohazard,
        HazardType::Nuclear,
        HazardType::UnmarkedSoldiers,
        HazardType::Pandemic,
        HazardType::TerroristAttack,
        HazardType::MassPoisoning,
        HazardType::CyberAttack,
        HazardType::Earthquake,
    ];

    /// Wire value, as used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardType::AirRaid => "AIR_RAID",
            HazardType::Drone => "DRONE",
            HazardType::Missile => "MISSILE",
            HazardType::Flood => "FLOOD",
            HazardType::Fire => "FIRE",
            HazardType::Industrial => "INDUSTRIAL",
            HazardType::Shooting => "SHOOTING",
            HazardType::Storm => "STORM",
            HazardType::Tsunami => "TSUNAMI",
            HazardType::ChemicalWeapon => "CHEMICAL WEAPON",
            HazardType::Biohazard => "BIOHAZARD",
            HazardType::Nuclear => "NUCLEAR",
            HazardType::UnmarkedSoldiers => "UNMARKED SOLDIERS",
            HazardType::Pandemic => "PANDEMIC",
            HazardType::TerroristAttack => "TERRORIST ATTACK",
            HazardType::MassPoisoning => "MASS POISONING",
            HazardType::CyberAttack => "CYBER ATTACK",
            HazardType::Earthquake => "EARTHQUAKE",
        }
    }

    /// Accepts the wire value, case-insensitively, with `_` or a space.
    pub fn parse(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|h| h.as_str() == wanted || h.as_str().replace(' ', "_") == wanted)
    }
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyState {
    #[default]
    Unknown,
    Ok,
    InShelter,
    NeedHelp,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub counts: HashMap<String, u64>,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NearbyShelter {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub distance_km: f64,
    pub eta_seconds: u64,
    #[serde(default)]
    pub is_open_now: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActiveAlert {
    pub id: i64,
    pub hazard_type: HazardType,
    pub severity: Severity,
    #[serde(deserialize_with = "decimal")]
    pub center_lat: f64,
    #[serde(deserialize_with = "decimal")]
    pub center_lon: f64,
    pub radius_m: u32,
    #[serde(default)]
    pub distance_km: Option<f64>,
    pub valid_until: DateTime<Utc>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl ActiveAlert {
    /// Whether the point lies inside the alert circle.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let distance_m = geo::haversine_km(self.center_lat, self.center_lon, lat, lon) * 1000.0;
        distance_m <= f64::from(self.radius_m)
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until >= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SafetyInstructions {
    pub title: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub do_not: Vec<String>,
    #[serde(default)]
    pub eta_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EducationTopic {
    pub hazard_type: HazardType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub practical_tips: Vec<String>,
    #[serde(default)]
    pub warning_signs: Vec<String>,
    #[serde(default)]
    pub preparation_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRegistration {
    pub device_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
}

impl DeviceRegistration {
    /// Registration under a freshly generated device id.
    pub fn generate() -> Self {
        Self {
            device_id: uuid::Uuid::new_v4().to_string(),
            push_token: None,
            lat: None,
            lon: None,
        }
    }

    pub fn with_location(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceAck {
    pub device_id: String,
    pub message: String,
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafetyStatusUpdate {
    pub device_id: String,
    pub status: SafetyState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shelter_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SafetyStatusAck {
    pub device_id: String,
    pub status: SafetyState,
    pub shelter_id: Option<i64>,
    pub updated_at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulateAlertRequest {
    pub hazard_type: HazardType,
    pub severity: Severity,
    pub center_lat: f64,
    pub center_lon: f64,
    pub radius_m: u32,
    pub valid_minutes: u32,
    pub source: String,
}

impl SimulateAlertRequest {
    pub const DEFAULT_VALID_MINUTES: u32 = 60;

    pub fn new(hazard_type: HazardType, center_lat: f64, center_lon: f64, radius_m: u32) -> Self {
        Self {
            hazard_type,
            severity: Severity::default(),
            center_lat,
            center_lon,
            radius_m,
            valid_minutes: Self::DEFAULT_VALID_MINUTES,
            source: "simulation".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SimulatedAlert {
    pub id: i64,
    pub hazard_type: HazardType,
    pub severity: Severity,
    #[serde(deserialize_with = "decimal")]
    pub center_lat: f64,
    #[serde(deserialize_with = "decimal")]
    pub center_lon: f64,
    pub radius_m: u32,
    pub valid_until: DateTime<Utc>,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// Decimal columns come back as strings unless the backend coerces them.
fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hazard_wire_names() {
        assert_eq!(serde_json::to_value(HazardType::ChemicalWeapon).unwrap(), json!("CHEMICAL WEAPON"));
        assert_eq!(serde_json::to_value(HazardType::AirRaid).unwrap(), json!("AIR_RAID"));
        for hazard in HazardType::ALL {
            let decoded: HazardType = serde_json::from_value(json!(hazard.as_str())).unwrap();
            assert_eq!(decoded, hazard);
        }
    }

    #[test]
    fn test_hazard_parse() {
        assert_eq!(HazardType::parse("air-raid"), Some(HazardType::AirRaid));
        assert_eq!(HazardType::parse("cyber_attack"), Some(HazardType::CyberAttack));
        assert_eq!(HazardType::parse("Terrorist Attack"), Some(HazardType::TerroristAttack));
        assert_eq!(HazardType::parse("meteor"), None);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
        assert_eq!(Severity::default(), Severity::Medium);
    }

    #[test]
    fn test_alert_decodes_decimal_strings() {
        let alert: ActiveAlert = serde_json::from_value(json!({
            "id": 7,
            "hazard_type": "FLOOD",
            "severity": "HIGH",
            "center_lat": "52.229700",
            "center_lon": 21.0122,
            "radius_m": 1000,
            "distance_km": 0.4,
            "valid_until": "2030-01-01T12:00:00Z",
            "source": "IMGW",
            "created_at": "2029-12-31T12:00:00Z"
        }))
        .unwrap();

        assert_eq!(alert.center_lat, 52.2297);
        assert!(alert.contains(52.2297, 21.0122));
        assert!(alert.contains(52.2350, 21.0122));
        assert!(!alert.contains(52.2500, 21.0122));
        assert!(alert.is_active_at(Utc::now()));
    }

    #[test]
    fn test_status_update_wire_format() {
        let update = SafetyStatusUpdate {
            device_id: "abc".into(),
            status: SafetyState::InShelter,
            shelter_id: Some(3),
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"device_id": "abc", "status": "IN_SHELTER", "shelter_id": 3})
        );
    }

    #[test]
    fn test_generated_device_ids_are_unique() {
        let a = DeviceRegistration::generate();
        let b = DeviceRegistration::generate().with_location(52.0, 21.0);
        assert_ne!(a.device_id, b.device_id);
        assert_eq!(b.lat, Some(52.0));
        assert_eq!(serde_json::to_value(&a).unwrap(), json!({"device_id": a.device_id}));
    }
}
