/// Responding departments and their per-report response status
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Responding agency. The four `Utility*` sub-departments sit under
/// `UtilityCompanies` but carry their own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    FireDepartment,
    HealthDepartment,
    LawEnforcement,
    Meteorology,
    Geoscience,
    UtilityCompanies,
    UtilityElectricity,
    UtilityWater,
    UtilityGas,
    UtilityTelecommunications,
}

impl Department {
    pub const COUNT: usize = 10;

    pub const ALL: [Department; Department::COUNT] = [
        Department::FireDepartment,
        Department::HealthDepartment,
        Department::LawEnforcement,
        Department::Meteorology,
        Department::Geoscience,
        Department::UtilityCompanies,
        Department::UtilityElectricity,
        Department::UtilityWater,
        Department::UtilityGas,
        Department::UtilityTelecommunications,
    ];

    /// Departments a coordinator assigns directly
    pub fn top_level() -> [Department; 6] {
        [
            Department::FireDepartment,
            Department::HealthDepartment,
            Department::LawEnforcement,
            Department::Meteorology,
            Department::Geoscience,
            Department::UtilityCompanies,
        ]
    }

    pub fn utility_sub_departments() -> [Department; 4] {
        [
            Department::UtilityElectricity,
            Department::UtilityWater,
            Department::UtilityGas,
            Department::UtilityTelecommunications,
        ]
    }

    pub fn is_utility_sub_department(self) -> bool {
        Self::utility_sub_departments().contains(&self)
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> &'static str {
        match self {
            Department::FireDepartment => "FIRE_DEPARTMENT",
            Department::HealthDepartment => "HEALTH_DEPARTMENT",
            Department::LawEnforcement => "LAW_ENFORCEMENT",
            Department::Meteorology => "METEOROLOGY",
            Department::Geoscience => "GEOSCIENCE",
            Department::UtilityCompanies => "UTILITY_COMPANIES",
            Department::UtilityElectricity => "UTILITY_ELECTRICITY",
            Department::UtilityWater => "UTILITY_WATER",
            Department::UtilityGas => "UTILITY_GAS",
            Department::UtilityTelecommunications => "UTILITY_TELECOMMUNICATIONS",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Department::FireDepartment => "Fire Department",
            Department::HealthDepartment => "Health Department",
            Department::LawEnforcement => "Law Enforcement",
            Department::Meteorology => "Meteorology",
            Department::Geoscience => "Geoscience",
            Department::UtilityCompanies => "Utility Companies",
            Department::UtilityElectricity => "Utility - Electricity",
            Department::UtilityWater => "Utility - Water",
            Department::UtilityGas => "Utility - Gas",
            Department::UtilityTelecommunications => "Utility - Telecommunications",
        }
    }

    /// Storage column holding this department's status
    pub fn status_column(self) -> String {
        format!("{}_status", self.code().to_ascii_lowercase())
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Department {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Department::ALL
            .into_iter()
            .find(|d| d.code().eq_ignore_ascii_case(s) || d.display_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown department {:?}", s))
    }
}

/// Stage of a department's response. Declaration order is the progression
/// order, so `Ord` compares how far a response has advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    NotResponsible,
    NotRespondedYet,
    WaitingAvailableResource,
    Mobilizing,
    DeployedField,
    Concluding,
    Completed,
}

impl ResponseStatus {
    pub const ALL: [ResponseStatus; 7] = [
        ResponseStatus::NotResponsible,
        ResponseStatus::NotRespondedYet,
        ResponseStatus::WaitingAvailableResource,
        ResponseStatus::Mobilizing,
        ResponseStatus::DeployedField,
        ResponseStatus::Concluding,
        ResponseStatus::Completed,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ResponseStatus::NotResponsible => "NOT_RESPONSIBLE",
            ResponseStatus::NotRespondedYet => "NOT_RESPONDED_YET",
            ResponseStatus::WaitingAvailableResource => "WAITING_AVAILABLE_RESOURCE",
            ResponseStatus::Mobilizing => "MOBILIZING",
            ResponseStatus::DeployedField => "DEPLOYED_FIELD",
            ResponseStatus::Concluding => "CONCLUDING",
            ResponseStatus::Completed => "COMPLETED",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ResponseStatus::NotResponsible => "N/A",
            ResponseStatus::NotRespondedYet => "Not Responded Yet",
            ResponseStatus::WaitingAvailableResource => "Waiting for available resources",
            ResponseStatus::Mobilizing => "Mobilizing",
            ResponseStatus::DeployedField => "Deployed In Field",
            ResponseStatus::Concluding => "Concluding Operations",
            ResponseStatus::Completed => "Response Completed",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ResponseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ResponseStatus::ALL
            .into_iter()
            .find(|r| r.code().eq_ignore_ascii_case(s) || r.display_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown response status {:?}", s))
    }
}

/// Per-report department statuses. A slot is `None` until a status has
/// been written, which is not the same as an explicit `NotResponsible`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentStatusMap {
    slots: [Option<ResponseStatus>; Department::COUNT],
}

impl DepartmentStatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicitly stored status, if any
    pub fn get(&self, department: Department) -> Option<ResponseStatus> {
        self.slots[department.index()]
    }

    pub fn set(&mut self, department: Department, status: ResponseStatus) {
        self.slots[department.index()] = Some(status);
    }

    /// A department works a report only when its status is present and not
    /// `NotResponsible`.
    pub fn is_active(&self, department: Department) -> bool {
        matches!(self.get(department), Some(s) if s != ResponseStatus::NotResponsible)
    }

    /// Present entries in department order
    pub fn entries(&self) -> impl Iterator<Item = (Department, ResponseStatus)> + '_ {
        Department::ALL
            .into_iter()
            .filter_map(move |d| self.get(d).map(|s| (d, s)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Worst case across the departments actually working the report
    pub fn least_advanced(&self) -> Option<ResponseStatus> {
        self.entries()
            .map(|(_, s)| s)
            .filter(|s| *s != ResponseStatus::NotResponsible)
            .min()
    }
}

impl Serialize for DepartmentStatusMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (department, status) in self.entries() {
            map.serialize_entry(&department, &status)?;
        }
        map.end()
    }
}

/// Checkbox semantics: each top-level department becomes `NotRespondedYet`
/// when selected and `NotResponsible` otherwise.
pub fn assignments_from_selection(selected: &[Department]) -> BTreeMap<Department, ResponseStatus> {
    Department::top_level()
        .into_iter()
        .map(|d| {
            let status = if selected.contains(&d) {
                ResponseStatus::NotRespondedYet
            } else {
                ResponseStatus::NotResponsible
            };
            (d, status)
        })
        .collect()
}
