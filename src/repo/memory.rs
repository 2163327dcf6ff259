/// In-process collaborators, used when no database is configured
use super::{within_tolerance, AccountDirectory, Geocoder, LoginOutcome, ReportStore, WeatherProvider};
use crate::domain::{
    Department, NewReport, PriorityLabel, Report, ReportFilter, ResponseStatus, WeatherSnapshot,
};
use crate::errors::{ApiError, ApiResult};
use crate::utils::append_entry;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

pub struct MemoryReportStore {
    reports: RwLock<BTreeMap<i64, Report>>,
    next_id: AtomicI64,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Store already-identified reports, keeping future ids above them
    pub async fn seed(&self, reports: impl IntoIterator<Item = Report>) {
        let mut map = self.reports.write().await;
        for report in reports {
            self.next_id.fetch_max(report.id() + 1, Ordering::SeqCst);
            map.insert(report.id(), report);
        }
    }

    /// Apply `change` under a single write guard. The stored report is
    /// replaced only when `change` succeeds.
    async fn modify<F>(&self, id: i64, change: F) -> ApiResult<Report>
    where
        F: FnOnce(&mut Report) -> ApiResult<()> + Send,
    {
        let mut map = self.reports.write().await;
        let slot = map
            .get_mut(&id)
            .ok_or_else(|| ApiError::report_not_found(id))?;
        let mut draft = slot.clone();
        change(&mut draft)?;
        *slot = draft.clone();
        Ok(draft)
    }
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn get(&self, id: i64) -> ApiResult<Report> {
        self.reports
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::report_not_found(id))
    }

    async fn get_all(&self, filter: &ReportFilter) -> ApiResult<Vec<Report>> {
        Ok(self
            .reports
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn insert(&self, new: NewReport) -> ApiResult<Report> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let report = Report::from_submission(id, new);
        self.reports.write().await.insert(id, report.clone());
        Ok(report)
    }

    async fn set_department_statuses(
        &self,
        id: i64,
        statuses: &BTreeMap<Department, ResponseStatus>,
    ) -> ApiResult<Report> {
        self.modify(id, |report| {
            for (department, status) in statuses {
                report.departments.set(*department, *status);
            }
            Ok(())
        })
        .await
    }

    async fn append_log(&self, id: i64, entry: &str) -> ApiResult<Report> {
        self.modify(id, |report| {
            report.communication_log = append_entry(&report.communication_log, entry);
            Ok(())
        })
        .await
    }

    async fn append_resource(&self, id: i64, entry: &str) -> ApiResult<Report> {
        self.modify(id, |report| {
            report.resources_needed = append_entry(&report.resources_needed, entry);
            Ok(())
        })
        .await
    }

    async fn set_coordinates(&self, id: i64, latitude: f64, longitude: f64) -> ApiResult<Report> {
        self.modify(id, |report| {
            report.latitude = latitude;
            report.longitude = longitude;
            Ok(())
        })
        .await
    }

    async fn set_priority(&self, id: i64, priority: PriorityLabel) -> ApiResult<Report> {
        self.modify(id, |report| {
            report.priority_level = Some(priority);
            Ok(())
        })
        .await
    }

    async fn update_field(&self, id: i64, field: &str, value: &str) -> ApiResult<Report> {
        self.modify(id, |report| report.set_field(field, value)).await
    }
}

#[derive(Default)]
pub struct MemoryWeatherProvider {
    snapshots: Vec<WeatherSnapshot>,
}

impl MemoryWeatherProvider {
    pub fn new(snapshots: Vec<WeatherSnapshot>) -> Self {
        Self { snapshots }
    }
}

#[async_trait]
impl WeatherProvider for MemoryWeatherProvider {
    async fn nearest(
        &self,
        latitude: f64,
        longitude: f64,
        tolerance: f64,
    ) -> ApiResult<Option<WeatherSnapshot>> {
        Ok(self
            .snapshots
            .iter()
            .filter_map(|w| {
                within_tolerance(latitude, longitude, (w.latitude, w.longitude), tolerance)
                    .map(|d| (d, w))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, w)| w.clone()))
    }
}

#[derive(Default)]
pub struct MemoryGeocoder {
    places: Vec<(String, f64, f64)>,
}

impl MemoryGeocoder {
    pub fn new(places: Vec<(String, f64, f64)>) -> Self {
        Self { places }
    }
}

#[async_trait]
impl Geocoder for MemoryGeocoder {
    async fn locate(&self, location: &str) -> ApiResult<Option<(f64, f64)>> {
        Ok(self
            .places
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(location.trim()))
            .map(|(_, lat, lon)| (*lat, *lon)))
    }
}

/// username → (password, role)
#[derive(Default)]
pub struct MemoryAccountDirectory {
    accounts: BTreeMap<String, (String, String)>,
}

impl MemoryAccountDirectory {
    pub fn new(accounts: impl IntoIterator<Item = (String, String, String)>) -> Self {
        Self {
            accounts: accounts
                .into_iter()
                .map(|(user, password, role)| (user, (password, role)))
                .collect(),
        }
    }
}

#[async_trait]
impl AccountDirectory for MemoryAccountDirectory {
    async fn verify(&self, username: &str, password: &str, role: &str) -> ApiResult<LoginOutcome> {
        Ok(match self.accounts.get(username) {
            Some((stored_password, stored_role)) => {
                LoginOutcome::evaluate(stored_password, stored_role, password, role)
            }
            None => LoginOutcome::UserNotFound,
        })
    }
}
