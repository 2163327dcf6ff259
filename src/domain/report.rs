/// Disaster report aggregate
use super::department::{Department, DepartmentStatusMap, ResponseStatus};
use crate::errors::{ApiError, ApiResult};
use crate::utils::parse_timestamp;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DisasterType {
    Wildfire,
    Hurricane,
    Earthquake,
    Flood,
    Landslide,
    Other,
}

impl DisasterType {
    pub fn as_str(self) -> &'static str {
        match self {
            DisasterType::Wildfire => "Wildfire",
            DisasterType::Hurricane => "Hurricane",
            DisasterType::Earthquake => "Earthquake",
            DisasterType::Flood => "Flood",
            DisasterType::Landslide => "Landslide",
            DisasterType::Other => "Other",
        }
    }

    /// Case-insensitive; anything unrecognised is `Other`
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        [
            DisasterType::Wildfire,
            DisasterType::Hurricane,
            DisasterType::Earthquake,
            DisasterType::Flood,
            DisasterType::Landslide,
        ]
        .into_iter()
        .find(|t| t.as_str().eq_ignore_ascii_case(label))
        .unwrap_or(DisasterType::Other)
    }
}

impl<'de> Deserialize<'de> for DisasterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(DisasterType::from_label(&label))
    }
}

impl fmt::Display for DisasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall lifecycle of a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [ReportStatus::Pending, ReportStatus::InProgress, ReportStatus::Resolved]
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown report status {:?}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityLabel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLabel {
    pub fn from_score(score: i32) -> Self {
        if score >= 8 {
            PriorityLabel::Critical
        } else if score >= 5 {
            PriorityLabel::High
        } else if score >= 3 {
            PriorityLabel::Medium
        } else {
            PriorityLabel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityLabel::Low => "Low",
            PriorityLabel::Medium => "Medium",
            PriorityLabel::High => "High",
            PriorityLabel::Critical => "Critical",
        }
    }
}

impl fmt::Display for PriorityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        [
            PriorityLabel::Low,
            PriorityLabel::Medium,
            PriorityLabel::High,
            PriorityLabel::Critical,
        ]
        .into_iter()
        .find(|p| p.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| format!("unknown priority {:?}", s))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WildfireDetails {
    pub fire_intensity: String,
    pub affected_area_size: String,
    pub nearby_infrastructure: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HurricaneDetails {
    pub wind_speed: String,
    pub flood_risk: bool,
    pub evacuation_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthquakeDetails {
    pub magnitude: String,
    pub depth: String,
    pub aftershocks_expected: bool,
    /// Dams nearby feed the cascading-effects bonus
    pub nearby_infrastructure: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodDetails {
    pub water_level: String,
    pub evacuation_status: String,
    pub infrastructure_damage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandslideDetails {
    pub slope_stability: String,
    pub blocked_roads: String,
    pub casualties_injuries: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherDetails {
    pub description: String,
    pub estimated_impact: String,
}

/// The one field set that is active for a report; its variant is the
/// report's disaster type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "disaster_type", content = "details")]
pub enum DisasterDetails {
    Wildfire(WildfireDetails),
    Hurricane(HurricaneDetails),
    Earthquake(EarthquakeDetails),
    Flood(FloodDetails),
    Landslide(LandslideDetails),
    Other(OtherDetails),
}

impl DisasterDetails {
    pub fn empty(kind: DisasterType) -> Self {
        match kind {
            DisasterType::Wildfire => DisasterDetails::Wildfire(Default::default()),
            DisasterType::Hurricane => DisasterDetails::Hurricane(Default::default()),
            DisasterType::Earthquake => DisasterDetails::Earthquake(Default::default()),
            DisasterType::Flood => DisasterDetails::Flood(Default::default()),
            DisasterType::Landslide => DisasterDetails::Landslide(Default::default()),
            DisasterType::Other => DisasterDetails::Other(Default::default()),
        }
    }

    /// Positional form used by submission clients; missing values stay
    /// empty and flags are true only for a literal "true".
    pub fn from_positional(kind: DisasterType, fields: &[&str]) -> Self {
        let at = |i: usize| fields.get(i).map(|s| s.trim().to_string()).unwrap_or_default();
        let flag = |i: usize| {
            fields
                .get(i)
                .map(|s| s.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false)
        };
        match kind {
            DisasterType::Wildfire => DisasterDetails::Wildfire(WildfireDetails {
                fire_intensity: at(0),
                affected_area_size: at(1),
                nearby_infrastructure: at(2),
            }),
            DisasterType::Hurricane => DisasterDetails::Hurricane(HurricaneDetails {
                wind_speed: at(0),
                flood_risk: flag(1),
                evacuation_status: at(2),
            }),
            DisasterType::Earthquake => DisasterDetails::Earthquake(EarthquakeDetails {
                magnitude: at(0),
                depth: at(1),
                aftershocks_expected: flag(2),
                nearby_infrastructure: at(3),
            }),
            DisasterType::Flood => DisasterDetails::Flood(FloodDetails {
                water_level: at(0),
                evacuation_status: at(1),
                infrastructure_damage: at(2),
            }),
            DisasterType::Landslide => DisasterDetails::Landslide(LandslideDetails {
                slope_stability: at(0),
                blocked_roads: at(1),
                casualties_injuries: at(2),
            }),
            DisasterType::Other => DisasterDetails::Other(OtherDetails {
                description: at(0),
                estimated_impact: at(1),
            }),
        }
    }

    pub fn kind(&self) -> DisasterType {
        match self {
            DisasterDetails::Wildfire(_) => DisasterType::Wildfire,
            DisasterDetails::Hurricane(_) => DisasterType::Hurricane,
            DisasterDetails::Earthquake(_) => DisasterType::Earthquake,
            DisasterDetails::Flood(_) => DisasterType::Flood,
            DisasterDetails::Landslide(_) => DisasterType::Landslide,
            DisasterDetails::Other(_) => DisasterType::Other,
        }
    }
}

/// A disaster report with its department response map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    id: i64,
    #[serde(flatten)]
    pub details: DisasterDetails,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date_time: String,
    pub reporter_name: String,
    pub contact_info: String,
    pub response_status: ReportStatus,
    pub resources_needed: String,
    pub communication_log: String,
    pub priority_level: Option<PriorityLabel>,
    pub departments: DepartmentStatusMap,
}

impl Report {
    /// Blank report carrying only identity and disaster variant
    pub fn new(id: i64, details: DisasterDetails) -> Self {
        Self {
            id,
            details,
            location: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            date_time: String::new(),
            reporter_name: String::new(),
            contact_info: String::new(),
            response_status: ReportStatus::Pending,
            resources_needed: String::new(),
            communication_log: String::new(),
            priority_level: None,
            departments: DepartmentStatusMap::new(),
        }
    }

    pub fn from_submission(id: i64, new: NewReport) -> Self {
        let mut report = Report::new(id, new.details);
        report.location = new.location;
        report.latitude = new.latitude;
        report.longitude = new.longitude;
        report.date_time = new.date_time;
        report.reporter_name = new.reporter_name;
        report.contact_info = new.contact_info;
        report
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn disaster_type(&self) -> DisasterType {
        self.details.kind()
    }

    /// Switching type resets the type-specific fields
    pub fn set_disaster_type(&mut self, kind: DisasterType) {
        if kind != self.disaster_type() {
            self.details = DisasterDetails::empty(kind);
        }
    }

    pub fn affected_area_size(&self) -> &str {
        match &self.details {
            DisasterDetails::Wildfire(w) => &w.affected_area_size,
            _ => "",
        }
    }

    pub fn nearby_infrastructure(&self) -> &str {
        match &self.details {
            DisasterDetails::Wildfire(w) => &w.nearby_infrastructure,
            DisasterDetails::Earthquake(e) => &e.nearby_infrastructure,
            _ => "",
        }
    }

    /// (0, 0) marks a report that has not been geocoded yet
    pub fn is_geocoded(&self) -> bool {
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }

    pub fn occurred_at(&self) -> ApiResult<NaiveDateTime> {
        parse_timestamp(&self.date_time)
            .ok_or_else(|| ApiError::MalformedTimestamp(self.date_time.clone()))
    }

    /// Update one named field through the dispatch tables
    pub fn set_field(&mut self, name: &str, value: &str) -> ApiResult<()> {
        if let Some((_, setter)) = COMMON_SETTERS
            .iter()
            .chain(DETAIL_SETTERS)
            .find(|(field, _)| *field == name)
        {
            return setter(self, value);
        }
        if let Some(department) = Department::ALL
            .into_iter()
            .find(|d| d.status_column() == name)
        {
            let status = value.parse::<ResponseStatus>().map_err(ApiError::InvalidInput)?;
            self.departments.set(department, status);
            return Ok(());
        }
        Err(ApiError::InvalidInput(format!("unknown field {:?}", name)))
    }
}

type FieldSetter = fn(&mut Report, &str) -> ApiResult<()>;

const COMMON_SETTERS: &[(&str, FieldSetter)] = &[
    ("disaster_type", |r, v| {
        r.set_disaster_type(DisasterType::from_label(v));
        Ok(())
    }),
    ("location", |r, v| {
        r.location = v.to_string();
        Ok(())
    }),
    ("latitude", |r, v| {
        r.latitude = parse_coordinate("latitude", v)?;
        Ok(())
    }),
    ("longitude", |r, v| {
        r.longitude = parse_coordinate("longitude", v)?;
        Ok(())
    }),
    ("date_time", |r, v| {
        r.date_time = v.to_string();
        Ok(())
    }),
    ("reporter_name", |r, v| {
        r.reporter_name = v.to_string();
        Ok(())
    }),
    ("contact_info", |r, v| {
        r.contact_info = v.to_string();
        Ok(())
    }),
    ("response_status", |r, v| {
        r.response_status = v.parse().map_err(ApiError::InvalidInput)?;
        Ok(())
    }),
    ("resources_needed", |r, v| {
        r.resources_needed = v.to_string();
        Ok(())
    }),
    ("communication_log", |r, v| {
        r.communication_log = v.to_string();
        Ok(())
    }),
    ("priority_level", |r, v| {
        r.priority_level = if v.trim().is_empty() {
            None
        } else {
            Some(v.parse().map_err(ApiError::InvalidInput)?)
        };
        Ok(())
    }),
];

/// Fields of the disaster variants
const DETAIL_SETTERS: &[(&str, FieldSetter)] = &[
    ("fire_intensity", |r, v| {
        wildfire(r, "fire_intensity")?.fire_intensity = v.to_string();
        Ok(())
    }),
    ("affected_area_size", |r, v| {
        wildfire(r, "affected_area_size")?.affected_area_size = v.to_string();
        Ok(())
    }),
    ("nearby_infrastructure", |r, v| {
        match &mut r.details {
            DisasterDetails::Wildfire(w) => w.nearby_infrastructure = v.to_string(),
            DisasterDetails::Earthquake(e) => e.nearby_infrastructure = v.to_string(),
            other => return Err(outside_variant("nearby_infrastructure", other.kind())),
        }
        Ok(())
    }),
    ("wind_speed", |r, v| {
        hurricane(r, "wind_speed")?.wind_speed = v.to_string();
        Ok(())
    }),
    ("flood_risk", |r, v| {
        hurricane(r, "flood_risk")?.flood_risk = parse_flag("flood_risk", v)?;
        Ok(())
    }),
    ("evacuation_status", |r, v| {
        match &mut r.details {
            DisasterDetails::Hurricane(h) => h.evacuation_status = v.to_string(),
            DisasterDetails::Flood(f) => f.evacuation_status = v.to_string(),
            other => return Err(outside_variant("evacuation_status", other.kind())),
        }
        Ok(())
    }),
    ("magnitude", |r, v| {
        earthquake(r, "magnitude")?.magnitude = v.to_string();
        Ok(())
    }),
    ("depth", |r, v| {
        earthquake(r, "depth")?.depth = v.to_string();
        Ok(())
    }),
    ("aftershocks_expected", |r, v| {
        earthquake(r, "aftershocks_expected")?.aftershocks_expected =
            parse_flag("aftershocks_expected", v)?;
        Ok(())
    }),
    ("water_level", |r, v| {
        flood(r, "water_level")?.water_level = v.to_string();
        Ok(())
    }),
    ("infrastructure_damage", |r, v| {
        flood(r, "infrastructure_damage")?.infrastructure_damage = v.to_string();
        Ok(())
    }),
    ("slope_stability", |r, v| {
        landslide(r, "slope_stability")?.slope_stability = v.to_string();
        Ok(())
    }),
    ("blocked_roads", |r, v| {
        landslide(r, "blocked_roads")?.blocked_roads = v.to_string();
        Ok(())
    }),
    ("casualties_injuries", |r, v| {
        landslide(r, "casualties_injuries")?.casualties_injuries = v.to_string();
        Ok(())
    }),
    ("disaster_description", |r, v| {
        other(r, "disaster_description")?.description = v.to_string();
        Ok(())
    }),
    ("estimated_impact", |r, v| {
        other(r, "estimated_impact")?.estimated_impact = v.to_string();
        Ok(())
    }),
];

fn outside_variant(field: &str, kind: DisasterType) -> ApiError {
    ApiError::InvalidInput(format!("field {} does not apply to {} reports", field, kind))
}

fn wildfire<'a>(r: &'a mut Report, field: &str) -> ApiResult<&'a mut WildfireDetails> {
    match &mut r.details {
        DisasterDetails::Wildfire(w) => Ok(w),
        other => Err(outside_variant(field, other.kind())),
    }
}

fn hurricane<'a>(r: &'a mut Report, field: &str) -> ApiResult<&'a mut HurricaneDetails> {
    match &mut r.details {
        DisasterDetails::Hurricane(h) => Ok(h),
        other => Err(outside_variant(field, other.kind())),
    }
}

fn earthquake<'a>(r: &'a mut Report, field: &str) -> ApiResult<&'a mut EarthquakeDetails> {
    match &mut r.details {
        DisasterDetails::Earthquake(e) => Ok(e),
        other => Err(outside_variant(field, other.kind())),
    }
}

fn flood<'a>(r: &'a mut Report, field: &str) -> ApiResult<&'a mut FloodDetails> {
    match &mut r.details {
        DisasterDetails::Flood(f) => Ok(f),
        other => Err(outside_variant(field, other.kind())),
    }
}

fn landslide<'a>(r: &'a mut Report, field: &str) -> ApiResult<&'a mut LandslideDetails> {
    match &mut r.details {
        DisasterDetails::Landslide(l) => Ok(l),
        other => Err(outside_variant(field, other.kind())),
    }
}

fn other<'a>(r: &'a mut Report, field: &str) -> ApiResult<&'a mut OtherDetails> {
    match &mut r.details {
        DisasterDetails::Other(o) => Ok(o),
        kind => Err(outside_variant(field, kind.kind())),
    }
}

fn parse_coordinate(field: &str, value: &str) -> ApiResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ApiError::InvalidInput(format!("{} must be a number, got {:?}", field, value)))
}

fn parse_flag(field: &str, value: &str) -> ApiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ApiError::InvalidInput(format!(
            "{} must be true or false, got {:?}",
            field, value
        ))),
    }
}

/// Submission payload for a new report. The JSON form names the type
/// case-insensitively and carries the type-specific fields, all optional,
/// under `details`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "SubmissionBody")]
pub struct NewReport {
    pub details: DisasterDetails,
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date_time: String,
    pub reporter_name: String,
    pub contact_info: String,
}

#[derive(Deserialize)]
struct SubmissionBody {
    disaster_type: DisasterType,
    #[serde(default)]
    details: Option<Map<String, Value>>,
    location: String,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
    date_time: String,
    reporter_name: String,
    contact_info: String,
}

impl TryFrom<SubmissionBody> for NewReport {
    type Error = String;

    fn try_from(body: SubmissionBody) -> Result<Self, Self::Error> {
        Ok(NewReport {
            details: DisasterDetails::merged(body.disaster_type, body.details.unwrap_or_default())?,
            location: body.location,
            latitude: body.latitude,
            longitude: body.longitude,
            date_time: body.date_time,
            reporter_name: body.reporter_name,
            contact_info: body.contact_info,
        })
    }
}

impl DisasterDetails {
    /// Empty fields of `kind` with each given detail applied. Null values
    /// are skipped; numbers and booleans are taken in their text form.
    pub fn merged(kind: DisasterType, fields: Map<String, Value>) -> Result<Self, String> {
        let mut scratch = Report::new(0, DisasterDetails::empty(kind));
        for (name, value) in fields {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => return Err(format!("detail {} must be a scalar, got {}", name, other)),
            };
            let (_, setter) = DETAIL_SETTERS
                .iter()
                .find(|(field, _)| *field == name)
                .ok_or_else(|| format!("unknown detail field {:?}", name))?;
            setter(&mut scratch, &text).map_err(|e| e.to_string())?;
        }
        Ok(scratch.details)
    }
}

impl NewReport {
    /// Mandatory fields must be present and the contact must be a
    /// 10-digit phone number (whitespace ignored).
    pub fn validate(&self) -> ApiResult<()> {
        if self.location.trim().is_empty() {
            return Err(ApiError::ValidationError("location is required".into()));
        }
        if self.date_time.trim().is_empty() {
            return Err(ApiError::ValidationError("date_time is required".into()));
        }
        if parse_timestamp(&self.date_time).is_none() {
            return Err(ApiError::ValidationError(format!(
                "date_time {:?} is not in YYYY-MM-DD HH:MM:SS form",
                self.date_time
            )));
        }
        if self.reporter_name.trim().is_empty() {
            return Err(ApiError::ValidationError("reporter_name is required".into()));
        }
        let digits: String = self.contact_info.split_whitespace().collect();
        if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::ValidationError(
                "contact_info must be a 10-digit phone number".into(),
            ));
        }
        Ok(())
    }
}

/// Status-in-set filter understood by every report store
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub statuses: Option<Vec<ReportStatus>>,
}

impl ReportFilter {
    pub fn all() -> Self {
        Self { statuses: None }
    }

    /// Reports still being worked: Pending or In Progress
    pub fn active() -> Self {
        Self::with_statuses(vec![ReportStatus::Pending, ReportStatus::InProgress])
    }

    pub fn with_statuses(statuses: Vec<ReportStatus>) -> Self {
        Self {
            statuses: Some(statuses),
        }
    }

    pub fn matches(&self, report: &Report) -> bool {
        match &self.statuses {
            Some(statuses) => statuses.contains(&report.response_status),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wildfire_report() -> Report {
        Report::new(
            1,
            DisasterDetails::from_positional(
                DisasterType::Wildfire,
                &["High", "1500", "near a hospital"],
            ),
        )
    }

    #[test]
    fn test_disaster_type_from_label() {
        assert_eq!(DisasterType::from_label("wildfire"), DisasterType::Wildfire);
        assert_eq!(DisasterType::from_label(" Flood "), DisasterType::Flood);
        assert_eq!(DisasterType::from_label("Tsunami"), DisasterType::Other);
    }

    #[test]
    fn test_priority_label_boundaries() {
        assert_eq!(PriorityLabel::from_score(8), PriorityLabel::Critical);
        assert_eq!(PriorityLabel::from_score(7), PriorityLabel::High);
        assert_eq!(PriorityLabel::from_score(5), PriorityLabel::High);
        assert_eq!(PriorityLabel::from_score(4), PriorityLabel::Medium);
        assert_eq!(PriorityLabel::from_score(3), PriorityLabel::Medium);
        assert_eq!(PriorityLabel::from_score(2), PriorityLabel::Low);
    }

    #[test]
    fn test_fields_outside_variant_read_empty() {
        let flood = Report::new(2, DisasterDetails::empty(DisasterType::Flood));
        assert_eq!(flood.affected_area_size(), "");
        assert_eq!(flood.nearby_infrastructure(), "");

        let report = wildfire_report();
        assert_eq!(report.affected_area_size(), "1500");
        assert_eq!(report.nearby_infrastructure(), "near a hospital");
    }

    #[test]
    fn test_set_field_dispatch() {
        let mut report = wildfire_report();
        report.set_field("location", "Brisbane Forest Park").unwrap();
        report.set_field("latitude", "-27.4").unwrap();
        report.set_field("fire_intensity", "Extreme").unwrap();
        report.set_field("response_status", "In Progress").unwrap();
        report.set_field("priority_level", "High").unwrap();
        report
            .set_field("fire_department_status", "MOBILIZING")
            .unwrap();

        assert_eq!(report.location, "Brisbane Forest Park");
        assert_eq!(report.latitude, -27.4);
        assert_eq!(report.response_status, ReportStatus::InProgress);
        assert_eq!(report.priority_level, Some(PriorityLabel::High));
        assert_eq!(
            report.departments.get(Department::FireDepartment),
            Some(ResponseStatus::Mobilizing)
        );
        match &report.details {
            DisasterDetails::Wildfire(w) => assert_eq!(w.fire_intensity, "Extreme"),
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_set_field_rejects_other_variant_and_unknown() {
        let mut report = wildfire_report();
        let before = report.clone();
        assert!(matches!(
            report.set_field("magnitude", "6.5"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            report.set_field("no_such_field", "x"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            report.set_field("latitude", "north"),
            Err(ApiError::InvalidInput(_))
        ));
        assert_eq!(report, before);
    }

    #[test]
    fn test_changing_type_resets_details() {
        let mut report = wildfire_report();
        report.set_field("disaster_type", "Earthquake").unwrap();
        assert_eq!(report.disaster_type(), DisasterType::Earthquake);
        assert_eq!(report.nearby_infrastructure(), "");
        report.set_field("nearby_infrastructure", "old dam").unwrap();
        assert_eq!(report.nearby_infrastructure(), "old dam");
    }

    #[test]
    fn test_occurred_at_malformed() {
        let mut report = wildfire_report();
        report.date_time = "last tuesday".into();
        assert!(matches!(
            report.occurred_at(),
            Err(ApiError::MalformedTimestamp(_))
        ));
        report.date_time = "2024-05-01 10:30:00".into();
        assert!(report.occurred_at().is_ok());
    }

    #[test]
    fn test_new_report_validation() {
        let mut new = NewReport {
            details: DisasterDetails::empty(DisasterType::Hurricane),
            location: "Cairns".into(),
            latitude: 0.0,
            longitude: 0.0,
            date_time: "2024-05-01 10:30:00".into(),
            reporter_name: "Jane Smith".into(),
            contact_info: "0423 456 789".into(),
        };
        assert!(new.validate().is_ok());

        new.contact_info = "123456".into();
        assert!(matches!(new.validate(), Err(ApiError::ValidationError(_))));

        new.contact_info = "0423456789".into();
        new.location = "".into();
        assert!(matches!(new.validate(), Err(ApiError::ValidationError(_))));
    }

    #[test]
    fn test_positional_hurricane_flag() {
        let details =
            DisasterDetails::from_positional(DisasterType::Hurricane, &["", "false", "Partial"]);
        match details {
            DisasterDetails::Hurricane(h) => {
                assert!(!h.flood_risk);
                assert_eq!(h.evacuation_status, "Partial");
            }
            other => panic!("unexpected details {:?}", other),
        }
    }

    #[test]
    fn test_report_serializes_type_and_details() {
        let json = serde_json::to_value(wildfire_report()).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["disaster_type"], "Wildfire");
        assert_eq!(json["details"]["affected_area_size"], "1500");
        assert_eq!(json["response_status"], "Pending");
    }

    #[test]
    fn test_filter_active() {
        let mut report = wildfire_report();
        assert!(ReportFilter::active().matches(&report));
        report.response_status = ReportStatus::Resolved;
        assert!(!ReportFilter::active().matches(&report));
        assert!(ReportFilter::all().matches(&report));
    }

    #[test]
    fn test_submission_json_type_is_lenient() {
        let base = serde_json::json!({
            "location": "Cairns",
            "date_time": "2024-05-01 10:30:00",
            "reporter_name": "Jane",
            "contact_info": "0423456789"
        });
        let with = |extra: Value| {
            let mut body = base.clone();
            if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
                body.extend(extra);
            }
            serde_json::from_value::<NewReport>(body)
        };

        let fire = with(serde_json::json!({
            "disaster_type": "wildfire",
            "details": {"affected_area_size": 1500, "nearby_infrastructure": "school"}
        }))
        .unwrap();
        assert_eq!(
            fire.details,
            DisasterDetails::Wildfire(WildfireDetails {
                fire_intensity: String::new(),
                affected_area_size: "1500".into(),
                nearby_infrastructure: "school".into(),
            })
        );

        let tsunami = with(serde_json::json!({"disaster_type": "Tsunami"})).unwrap();
        assert_eq!(tsunami.details, DisasterDetails::empty(DisasterType::Other));

        let storm = with(serde_json::json!({
            "disaster_type": "HURRICANE",
            "details": {"flood_risk": true, "wind_speed": null}
        }))
        .unwrap();
        match storm.details {
            DisasterDetails::Hurricane(h) => {
                assert!(h.flood_risk);
                assert_eq!(h.wind_speed, "");
            }
            other => panic!("unexpected details {:?}", other),
        }

        assert!(with(serde_json::json!({
            "disaster_type": "Flood",
            "details": {"magnitude": "6.1"}
        }))
        .is_err());
        assert!(with(serde_json::json!({
            "disaster_type": "Flood",
            "details": {"location": "elsewhere"}
        }))
        .is_err());
    }
}
