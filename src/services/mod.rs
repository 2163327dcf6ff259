/// Business logic services layer
mod priority;
mod weather;

pub use priority::{calculate_priority, PriorityAssessment};
pub use weather::analyze_weather_impact;

use crate::domain::{
    Department, Health, NewReport, Report, ReportFilter, ResponseStatus, WeatherImpact,
};
use crate::errors::{ApiError, ApiResult};
use crate::gate::{Availability, AvailabilityGate};
use crate::repo::{Geocoder, ReportStore, WeatherProvider};
use crate::utils::format_timestamp;
use chrono::{Local, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Source of "now" for log stamps and report age
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time, matching how reporters enter timestamps
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Coordination engine: every operation that touches the store passes the
/// availability gate first and writes nothing when it is closed.
pub struct CoordinationEngine {
    store: Arc<dyn ReportStore>,
    gate: AvailabilityGate,
    weather: Arc<dyn WeatherProvider>,
    geocoder: Arc<dyn Geocoder>,
    clock: Arc<dyn Clock>,
    weather_tolerance: f64,
}

impl CoordinationEngine {
    pub fn new(
        store: Arc<dyn ReportStore>,
        gate: AvailabilityGate,
        weather: Arc<dyn WeatherProvider>,
        geocoder: Arc<dyn Geocoder>,
        weather_tolerance: f64,
    ) -> Self {
        Self {
            store,
            gate,
            weather,
            geocoder,
            clock: Arc::new(SystemClock),
            weather_tolerance,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Liveness summary; the only operation that reports a closed gate
    /// instead of failing on it
    pub async fn health(&self) -> Health {
        Health {
            status: "ok",
            now: Utc::now(),
            backend_reachable: self.gate.check().await == Availability::Available,
        }
    }

    /// Validate and store a new submission
    pub async fn create_report(&self, new: NewReport) -> ApiResult<Report> {
        self.gate.ensure().await?;
        new.validate()?;
        let report = self.store.insert(new).await?;
        info!(
            report_id = report.id(),
            disaster_type = %report.disaster_type(),
            "Report created"
        );
        Ok(report)
    }

    pub async fn get_report(&self, id: i64) -> ApiResult<Report> {
        self.gate.ensure().await?;
        self.store.get(id).await
    }

    pub async fn list_reports(&self, filter: &ReportFilter) -> ApiResult<Vec<Report>> {
        self.gate.ensure().await?;
        self.store.get_all(filter).await
    }

    /// Reload a caller-held list. On failure the list keeps its previous
    /// contents unless `clear_on_failure` is set.
    pub async fn refresh_into(
        &self,
        target: &mut Vec<Report>,
        filter: &ReportFilter,
        clear_on_failure: bool,
    ) -> ApiResult<usize> {
        match self.list_reports(filter).await {
            Ok(reports) => {
                *target = reports;
                Ok(target.len())
            }
            Err(e) => {
                if clear_on_failure {
                    target.clear();
                }
                Err(e)
            }
        }
    }

    /// Write each given assignment; departments not named are untouched
    pub async fn assign_departments(
        &self,
        id: i64,
        assignments: &BTreeMap<Department, ResponseStatus>,
    ) -> ApiResult<Report> {
        self.gate.ensure().await?;
        let report = self.store.set_department_statuses(id, assignments).await?;
        info!(report_id = id, count = assignments.len(), "Departments assigned");
        Ok(report)
    }

    pub async fn update_department_status(
        &self,
        id: i64,
        department: Department,
        status: ResponseStatus,
    ) -> ApiResult<Report> {
        self.gate.ensure().await?;
        let report = self
            .store
            .set_department_statuses(id, &BTreeMap::from([(department, status)]))
            .await?;
        info!(
            report_id = id,
            department = department.code(),
            status = status.code(),
            "Department status updated"
        );
        Ok(report)
    }

    /// Only the four utility sub-departments are accepted
    pub async fn update_sub_department_status(
        &self,
        id: i64,
        department: Department,
        status: ResponseStatus,
    ) -> ApiResult<Report> {
        if !department.is_utility_sub_department() {
            return Err(ApiError::InvalidDepartment(department));
        }
        self.update_department_status(id, department, status).await
    }

    /// Append `[timestamp] actor: text` to the communication log
    pub async fn append_communication_log(
        &self,
        id: i64,
        actor: &str,
        text: &str,
    ) -> ApiResult<Report> {
        self.gate.ensure().await?;
        let line = format!(
            "[{}] {}: {}",
            format_timestamp(&self.clock.now()),
            actor,
            text
        );
        let report = self.store.append_log(id, &line).await?;
        info!(report_id = id, actor, "Communication log appended");
        Ok(report)
    }

    pub async fn append_resource_needed(&self, id: i64, text: &str) -> ApiResult<Report> {
        self.gate.ensure().await?;
        let report = self.store.append_resource(id, text).await?;
        info!(report_id = id, "Resource need recorded");
        Ok(report)
    }

    pub async fn update_coordinates(
        &self,
        id: i64,
        latitude: f64,
        longitude: f64,
    ) -> ApiResult<Report> {
        self.gate.ensure().await?;
        let report = self.store.set_coordinates(id, latitude, longitude).await?;
        info!(report_id = id, latitude, longitude, "Coordinates updated");
        Ok(report)
    }

    /// Resolve the report's location name and store the coordinates
    pub async fn locate_report(&self, id: i64) -> ApiResult<Report> {
        self.gate.ensure().await?;
        let location = self.store.get(id).await?.location;
        let (latitude, longitude) = self
            .geocoder
            .locate(&location)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("location {:?}", location)))?;
        let report = self.store.set_coordinates(id, latitude, longitude).await?;
        info!(report_id = id, latitude, longitude, "Report geocoded");
        Ok(report)
    }

    /// Set one named field through the store's dispatch
    pub async fn update_field(&self, id: i64, field: &str, value: &str) -> ApiResult<Report> {
        self.gate.ensure().await?;
        let report = self.store.update_field(id, field, value).await?;
        info!(report_id = id, field, "Report field updated");
        Ok(report)
    }

    /// Pending or In Progress reports that `department` is working
    pub async fn active_reports(&self, department: Department) -> ApiResult<Vec<Report>> {
        self.gate.ensure().await?;
        let reports = self.store.get_all(&ReportFilter::active()).await?;
        Ok(reports
            .into_iter()
            .filter(|r| r.departments.is_active(department))
            .collect())
    }

    pub async fn weather_impact(&self, id: i64) -> ApiResult<Option<WeatherImpact>> {
        self.gate.ensure().await?;
        let report = self.store.get(id).await?;
        self.impact_for(&report).await
    }

    /// Score a report without storing the label
    pub async fn assess_priority(&self, id: i64) -> ApiResult<PriorityAssessment> {
        self.gate.ensure().await?;
        let report = self.store.get(id).await?;
        self.score(&report).await
    }

    /// Score a report and persist the resulting label
    pub async fn recompute_priority(&self, id: i64) -> ApiResult<(Report, PriorityAssessment)> {
        self.gate.ensure().await?;
        let assessment = self.score(&self.store.get(id).await?).await?;
        let report = self.store.set_priority(id, assessment.label).await?;
        info!(
            report_id = id,
            score = assessment.score,
            priority = %assessment.label,
            "Priority recomputed"
        );
        Ok((report, assessment))
    }

    async fn score(&self, report: &Report) -> ApiResult<PriorityAssessment> {
        let impact = self.impact_for(report).await?;
        calculate_priority(report, self.clock.now(), impact.as_ref())
    }

    /// Weather is only looked up for geocoded reports
    async fn impact_for(&self, report: &Report) -> ApiResult<Option<WeatherImpact>> {
        if !report.is_geocoded() {
            return Ok(None);
        }
        let snapshot = self
            .weather
            .nearest(report.latitude, report.longitude, self.weather_tolerance)
            .await?;
        Ok(snapshot.map(|w| analyze_weather_impact(&w, report.disaster_type())))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{
        assignments_from_selection, DisasterDetails, DisasterType, PriorityLabel, ReportStatus,
        RiskLevel, WeatherSnapshot,
    };
    use crate::gate::tests::{test_target, ScriptedProbe};
    use crate::repo::{MemoryGeocoder, MemoryReportStore, MemoryWeatherProvider};
    use crate::utils::parse_timestamp;
    use std::sync::atomic::Ordering;

    pub(crate) struct FixedClock(pub NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    pub(crate) struct Fixture {
        pub engine: Arc<CoordinationEngine>,
        pub store: Arc<MemoryReportStore>,
        pub probe: Arc<ScriptedProbe>,
    }

    pub(crate) fn wildfire(id: i64) -> Report {
        let mut report = Report::new(
            id,
            DisasterDetails::from_positional(
                DisasterType::Wildfire,
                &["High", "1500", "near a hospital"],
            ),
        );
        report.location = "Blue Mountains".into();
        report.date_time = "2024-06-01 10:00:00".into();
        report.reporter_name = "Sam".into();
        report.contact_info = "0412345678".into();
        report
    }

    pub(crate) async fn fixture(reports: Vec<Report>) -> Fixture {
        let store = Arc::new(MemoryReportStore::new());
        store.seed(reports).await;
        let probe = ScriptedProbe::new(true);
        let gate = AvailabilityGate::new(probe.clone(), test_target());
        let weather = MemoryWeatherProvider::new(vec![WeatherSnapshot {
            location: "Katoomba".into(),
            latitude: -33.71,
            longitude: 150.31,
            temperature: 40.0,
            humidity: 15.0,
            wind_speed: 35.0,
            wind_direction: "NW".into(),
            condition: "Clear".into(),
        }]);
        let geocoder = MemoryGeocoder::new(vec![("Blue Mountains".into(), -33.71, 150.31)]);
        let engine = CoordinationEngine::new(
            store.clone(),
            gate,
            Arc::new(weather),
            Arc::new(geocoder),
            0.01,
        )
        .with_clock(Arc::new(FixedClock(
            parse_timestamp("2024-06-01 12:00:00").unwrap(),
        )));
        Fixture {
            engine: Arc::new(engine),
            store,
            probe,
        }
    }

    #[tokio::test]
    async fn test_assign_departments_is_idempotent() {
        let f = fixture(vec![wildfire(1)]).await;
        let assignments =
            assignments_from_selection(&[Department::FireDepartment, Department::HealthDepartment]);

        let once = f.engine.assign_departments(1, &assignments).await.unwrap();
        let twice = f.engine.assign_departments(1, &assignments).await.unwrap();
        assert_eq!(once.departments, twice.departments);
        assert_eq!(
            twice.departments.get(Department::FireDepartment),
            Some(ResponseStatus::NotRespondedYet)
        );
        assert_eq!(
            twice.departments.get(Department::LawEnforcement),
            Some(ResponseStatus::NotResponsible)
        );
    }

    #[tokio::test]
    async fn test_assign_leaves_unnamed_departments() {
        let mut report = wildfire(1);
        report
            .departments
            .set(Department::UtilityWater, ResponseStatus::DeployedField);
        let f = fixture(vec![report]).await;

        let updated = f
            .engine
            .assign_departments(1, &assignments_from_selection(&[]))
            .await
            .unwrap();
        assert_eq!(
            updated.departments.get(Department::UtilityWater),
            Some(ResponseStatus::DeployedField)
        );
    }

    #[tokio::test]
    async fn test_status_update_does_not_touch_log() {
        let f = fixture(vec![wildfire(1)]).await;
        let updated = f
            .engine
            .update_department_status(1, Department::FireDepartment, ResponseStatus::Mobilizing)
            .await
            .unwrap();
        assert_eq!(
            updated.departments.get(Department::FireDepartment),
            Some(ResponseStatus::Mobilizing)
        );
        assert!(updated.communication_log.is_empty());
        assert_eq!(f.store.get(1).await.unwrap(), updated);
    }

    fn flood_submission() -> NewReport {
        NewReport {
            details: DisasterDetails::empty(DisasterType::Flood),
            location: "Lismore".into(),
            latitude: 0.0,
            longitude: 0.0,
            date_time: "2024-06-01 09:00:00".into(),
            reporter_name: "Kim".into(),
            contact_info: "02 6622 1234".into(),
        }
    }

    #[tokio::test]
    async fn test_closed_gate_blocks_every_mutation() {
        let f = fixture(vec![wildfire(1)]).await;
        let before = f.store.get_all(&ReportFilter::all()).await.unwrap();
        f.probe.set_up(false);
        let calls_before = f.probe.calls.load(Ordering::SeqCst);
        let e = &f.engine;
        let selection = assignments_from_selection(&[Department::FireDepartment]);

        let outcomes: Vec<(&str, ApiResult<()>)> = vec![
            ("create_report", e.create_report(flood_submission()).await.map(drop)),
            ("assign_departments", e.assign_departments(1, &selection).await.map(drop)),
            (
                "update_department_status",
                e.update_department_status(1, Department::FireDepartment, ResponseStatus::Completed)
                    .await
                    .map(drop),
            ),
            (
                "update_sub_department_status",
                e.update_sub_department_status(1, Department::UtilityGas, ResponseStatus::Mobilizing)
                    .await
                    .map(drop),
            ),
            (
                "append_communication_log",
                e.append_communication_log(1, "Fire", "on scene").await.map(drop),
            ),
            ("append_resource_needed", e.append_resource_needed(1, "tankers").await.map(drop)),
            ("update_coordinates", e.update_coordinates(1, -33.7, 150.3).await.map(drop)),
            ("update_field", e.update_field(1, "location", "Katoomba").await.map(drop)),
            ("locate_report", e.locate_report(1).await.map(drop)),
            ("recompute_priority", e.recompute_priority(1).await.map(drop)),
        ];

        for (operation, outcome) in &outcomes {
            assert!(
                matches!(outcome, Err(ApiError::ServiceUnavailable(_))),
                "{} returned {:?}",
                operation,
                outcome
            );
        }
        assert_eq!(
            f.probe.calls.load(Ordering::SeqCst),
            calls_before + outcomes.len()
        );
        assert_eq!(f.store.get_all(&ReportFilter::all()).await.unwrap(), before);
    }

    /// Delays reads so concurrent writers interleave between read and write
    struct SlowStore(MemoryReportStore);

    #[async_trait::async_trait]
    impl ReportStore for SlowStore {
        async fn get(&self, id: i64) -> ApiResult<Report> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.get(id).await
        }

        async fn get_all(&self, filter: &ReportFilter) -> ApiResult<Vec<Report>> {
            self.0.get_all(filter).await
        }

        async fn insert(&self, new: NewReport) -> ApiResult<Report> {
            self.0.insert(new).await
        }

        async fn set_department_statuses(
            &self,
            id: i64,
            statuses: &BTreeMap<Department, ResponseStatus>,
        ) -> ApiResult<Report> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.set_department_statuses(id, statuses).await
        }

        async fn append_log(&self, id: i64, entry: &str) -> ApiResult<Report> {
            self.0.append_log(id, entry).await
        }

        async fn append_resource(&self, id: i64, entry: &str) -> ApiResult<Report> {
            self.0.append_resource(id, entry).await
        }

        async fn set_coordinates(&self, id: i64, latitude: f64, longitude: f64) -> ApiResult<Report> {
            self.0.set_coordinates(id, latitude, longitude).await
        }

        async fn set_priority(&self, id: i64, priority: PriorityLabel) -> ApiResult<Report> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.0.set_priority(id, priority).await
        }

        async fn update_field(&self, id: i64, field: &str, value: &str) -> ApiResult<Report> {
            self.0.update_field(id, field, value).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_department_writes_are_all_kept() {
        let inner = MemoryReportStore::new();
        inner.seed([wildfire(1)]).await;
        let store = Arc::new(SlowStore(inner));
        let engine = CoordinationEngine::new(
            store.clone(),
            AvailabilityGate::new(ScriptedProbe::new(true), test_target()),
            Arc::new(MemoryWeatherProvider::default()),
            Arc::new(MemoryGeocoder::default()),
            0.01,
        )
        .with_clock(Arc::new(FixedClock(
            parse_timestamp("2024-06-01 12:00:00").unwrap(),
        )));

        let (status, log, resource, priority) = tokio::join!(
            engine.update_department_status(1, Department::FireDepartment, ResponseStatus::Mobilizing),
            engine.append_communication_log(1, "Health Department", "triage set up"),
            engine.append_resource_needed(1, "water tankers"),
            engine.recompute_priority(1),
        );
        status.unwrap();
        log.unwrap();
        resource.unwrap();
        priority.unwrap();

        let stored = store.0.get(1).await.unwrap();
        assert_eq!(
            stored.departments.get(Department::FireDepartment),
            Some(ResponseStatus::Mobilizing)
        );
        assert_eq!(
            stored.communication_log,
            "[2024-06-01 12:00:00] Health Department: triage set up"
        );
        assert_eq!(stored.resources_needed, "water tankers");
        assert_eq!(stored.priority_level, Some(PriorityLabel::Critical));
    }

    #[tokio::test]
    async fn test_sub_department_rejects_other_departments() {
        let f = fixture(vec![wildfire(1)]).await;
        let result = f
            .engine
            .update_sub_department_status(1, Department::UtilityCompanies, ResponseStatus::Mobilizing)
            .await;
        assert!(matches!(
            result,
            Err(ApiError::InvalidDepartment(Department::UtilityCompanies))
        ));
        assert!(f.store.get(1).await.unwrap().departments.is_empty());
        assert_eq!(f.probe.calls.load(Ordering::SeqCst), 0);

        let updated = f
            .engine
            .update_sub_department_status(1, Department::UtilityGas, ResponseStatus::Concluding)
            .await
            .unwrap();
        assert_eq!(
            updated.departments.get(Department::UtilityGas),
            Some(ResponseStatus::Concluding)
        );
    }

    #[tokio::test]
    async fn test_log_appends_compose_by_newline() {
        let f = fixture(vec![wildfire(1)]).await;
        f.engine
            .append_communication_log(1, "Fire Department", "crews dispatched")
            .await
            .unwrap();
        let report = f
            .engine
            .append_communication_log(1, "Health Department", "triage set up")
            .await
            .unwrap();
        assert_eq!(
            report.communication_log,
            "[2024-06-01 12:00:00] Fire Department: crews dispatched\n\
             [2024-06-01 12:00:00] Health Department: triage set up"
        );
    }

    #[tokio::test]
    async fn test_resources_append() {
        let f = fixture(vec![wildfire(1)]).await;
        f.engine.append_resource_needed(1, "water tankers").await.unwrap();
        let report = f.engine.append_resource_needed(1, "medics").await.unwrap();
        assert_eq!(report.resources_needed, "water tankers\nmedics");
    }

    #[tokio::test]
    async fn test_active_reports_filter() {
        let mut excluded = wildfire(1);
        excluded
            .departments
            .set(Department::UtilityCompanies, ResponseStatus::NotResponsible);
        let mut included = wildfire(2);
        included.response_status = ReportStatus::InProgress;
        included
            .departments
            .set(Department::UtilityCompanies, ResponseStatus::Mobilizing);
        let mut resolved = wildfire(3);
        resolved.response_status = ReportStatus::Resolved;
        resolved
            .departments
            .set(Department::UtilityCompanies, ResponseStatus::Completed);
        let unassigned = wildfire(4);

        let f = fixture(vec![excluded, included, resolved, unassigned]).await;
        let active = f
            .engine
            .active_reports(Department::UtilityCompanies)
            .await
            .unwrap();
        let ids: Vec<i64> = active.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn test_active_reports_closed_gate_is_error() {
        let f = fixture(vec![]).await;
        assert!(f
            .engine
            .active_reports(Department::FireDepartment)
            .await
            .unwrap()
            .is_empty());
        f.probe.set_up(false);
        assert!(matches!(
            f.engine.active_reports(Department::FireDepartment).await,
            Err(ApiError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_keeps_list_unless_told_to_clear() {
        let f = fixture(vec![wildfire(1), wildfire(2)]).await;
        let mut shown = Vec::new();
        assert_eq!(
            f.engine
                .refresh_into(&mut shown, &ReportFilter::all(), false)
                .await
                .unwrap(),
            2
        );

        f.probe.set_up(false);
        assert!(f
            .engine
            .refresh_into(&mut shown, &ReportFilter::all(), false)
            .await
            .is_err());
        assert_eq!(shown.len(), 2);
        assert!(f
            .engine
            .refresh_into(&mut shown, &ReportFilter::all(), true)
            .await
            .is_err());
        assert!(shown.is_empty());
    }

    #[tokio::test]
    async fn test_create_report_validates_before_storing() {
        let f = fixture(vec![]).await;
        let mut new = NewReport {
            details: DisasterDetails::empty(DisasterType::Flood),
            location: "Lismore".into(),
            latitude: 0.0,
            longitude: 0.0,
            date_time: "2024-06-01 09:00:00".into(),
            reporter_name: "Kim".into(),
            contact_info: "12345".into(),
        };
        assert!(matches!(
            f.engine.create_report(new.clone()).await,
            Err(ApiError::ValidationError(_))
        ));
        assert!(f.store.get_all(&ReportFilter::all()).await.unwrap().is_empty());

        new.contact_info = "02 6622 1234".into();
        let report = f.engine.create_report(new).await.unwrap();
        assert_eq!(report.id(), 1);
        assert_eq!(report.response_status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn test_priority_without_coordinates_skips_weather() {
        let f = fixture(vec![wildfire(1)]).await;
        let assessment = f.engine.assess_priority(1).await.unwrap();
        assert_eq!(assessment.score, 15);
        assert!(f.engine.weather_impact(1).await.unwrap().is_none());
        assert_eq!(f.store.get(1).await.unwrap().priority_level, None);
    }

    #[tokio::test]
    async fn test_locate_then_recompute_uses_weather() {
        let f = fixture(vec![wildfire(1)]).await;
        let located = f.engine.locate_report(1).await.unwrap();
        assert_eq!((located.latitude, located.longitude), (-33.71, 150.31));

        let impact = f.engine.weather_impact(1).await.unwrap().unwrap();
        assert_eq!(impact.risk_level, RiskLevel::High);

        let (report, assessment) = f.engine.recompute_priority(1).await.unwrap();
        assert_eq!(assessment.score, 20);
        assert_eq!(report.priority_level, Some(PriorityLabel::Critical));
        assert_eq!(f.store.get(1).await.unwrap().priority_level, Some(PriorityLabel::Critical));
    }

    #[tokio::test]
    async fn test_locate_unknown_place() {
        let mut report = wildfire(1);
        report.location = "Nowhere".into();
        let f = fixture(vec![report]).await;
        assert!(matches!(
            f.engine.locate_report(1).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_field_and_coordinates() {
        let f = fixture(vec![wildfire(1)]).await;
        let report = f.engine.update_field(1, "fire_intensity", "Extreme").await.unwrap();
        match &report.details {
            DisasterDetails::Wildfire(w) => assert_eq!(w.fire_intensity, "Extreme"),
            other => panic!("unexpected details {:?}", other),
        }
        assert!(matches!(
            f.engine.update_field(1, "water_level", "3m").await,
            Err(ApiError::InvalidInput(_))
        ));
        let moved = f.engine.update_coordinates(1, -33.0, 151.0).await.unwrap();
        assert!(moved.is_geocoded());
    }

    #[tokio::test]
    async fn test_missing_report_is_not_found() {
        let f = fixture(vec![]).await;
        assert!(matches!(
            f.engine
                .update_department_status(9, Department::Geoscience, ResponseStatus::Mobilizing)
                .await,
            Err(ApiError::NotFound(_))
        ));
    }
}
