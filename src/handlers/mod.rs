/// HTTP request handlers
use crate::domain::{
    assignments_from_selection, Department, Health, NewReport, Report, ReportFilter,
    ReportStatus, ResponseStatus, WeatherImpact,
};
use crate::errors::{ApiError, ApiResult};
use crate::services::{CoordinationEngine, PriorityAssessment};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CoordinationEngine>,
}

/// Successful response wrapper
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub ok: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// The report plus the worst-case status across its working departments
fn report_response(report: Report) -> Json<Value> {
    let least_advanced = report.departments.least_advanced();
    Json(serde_json::json!(SuccessResponse::new(serde_json::json!({
        "report": report,
        "least_advanced": least_advanced
    }))))
}

fn reports_response(reports: Vec<Report>) -> Json<Value> {
    Json(serde_json::json!(SuccessResponse::new(serde_json::json!({
        "count": reports.len(),
        "reports": reports
    }))))
}

fn parse_department(raw: &str) -> ApiResult<Department> {
    raw.parse().map_err(ApiError::InvalidInput)
}

fn parse_status(raw: &str) -> ApiResult<ResponseStatus> {
    raw.parse().map_err(ApiError::InvalidInput)
}

/// Health check handler
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(state.engine.health().await)
}

/// List reports, optionally filtered by `?status=Pending,In Progress`
pub async fn list_reports(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let filter = match q.get("status").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(raw) => ReportFilter::with_statuses(
            raw.split(',')
                .map(|s| s.parse::<ReportStatus>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(ApiError::InvalidInput)?,
        ),
        None => ReportFilter::all(),
    };
    let reports = state.engine.list_reports(&filter).await?;
    Ok(reports_response(reports))
}

/// The body is decoded here so a bad submission gets the error envelope
pub async fn create_report(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let new: NewReport =
        serde_json::from_value(body).map_err(|e| ApiError::InvalidInput(e.to_string()))?;
    let report = state.engine.create_report(new).await?;
    Ok(report_response(report))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    Ok(report_response(state.engine.get_report(id).await?))
}

#[derive(Deserialize)]
pub struct FieldUpdate {
    pub field: String,
    pub value: String,
}

/// Update one named report field
pub async fn update_field(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<FieldUpdate>,
) -> Result<Json<Value>, ApiError> {
    let report = state.engine.update_field(id, &body.field, &body.value).await?;
    Ok(report_response(report))
}

/// Either a checkbox selection of top-level departments or explicit
/// department → status pairs
#[derive(Deserialize)]
pub struct AssignRequest {
    #[serde(default)]
    pub selected: Option<Vec<Department>>,
    #[serde(default)]
    pub assignments: Option<BTreeMap<Department, ResponseStatus>>,
}

pub async fn assign_departments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<AssignRequest>,
) -> Result<Json<Value>, ApiError> {
    let assignments = match (body.selected, body.assignments) {
        (Some(selected), None) => assignments_from_selection(&selected),
        (None, Some(assignments)) => assignments,
        _ => {
            return Err(ApiError::InvalidInput(
                "expected exactly one of `selected` or `assignments`".into(),
            ))
        }
    };
    let report = state.engine.assign_departments(id, &assignments).await?;
    Ok(report_response(report))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: String,
}

pub async fn update_department_status(
    State(state): State<AppState>,
    Path((id, department)): Path<(i64, String)>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Value>, ApiError> {
    let department = parse_department(&department)?;
    let status = parse_status(&body.status)?;
    let report = state
        .engine
        .update_department_status(id, department, status)
        .await?;
    Ok(report_response(report))
}

/// Status update restricted to utility sub-departments
pub async fn update_utility_status(
    State(state): State<AppState>,
    Path((id, department)): Path<(i64, String)>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Value>, ApiError> {
    let department = parse_department(&department)?;
    let status = parse_status(&body.status)?;
    let report = state
        .engine
        .update_sub_department_status(id, department, status)
        .await?;
    Ok(report_response(report))
}

#[derive(Deserialize)]
pub struct LogEntry {
    pub actor: String,
    pub text: String,
}

pub async fn append_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<LogEntry>,
) -> Result<Json<Value>, ApiError> {
    let report = state
        .engine
        .append_communication_log(id, &body.actor, &body.text)
        .await?;
    Ok(report_response(report))
}

#[derive(Deserialize)]
pub struct ResourceEntry {
    pub text: String,
}

pub async fn append_resource(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ResourceEntry>,
) -> Result<Json<Value>, ApiError> {
    let report = state.engine.append_resource_needed(id, &body.text).await?;
    Ok(report_response(report))
}

#[derive(Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn update_coordinates(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Coordinates>,
) -> Result<Json<Value>, ApiError> {
    let report = state
        .engine
        .update_coordinates(id, body.latitude, body.longitude)
        .await?;
    Ok(report_response(report))
}

/// Geocode a report from its location name
pub async fn locate_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    Ok(report_response(state.engine.locate_report(id).await?))
}

#[derive(Serialize)]
pub struct PriorityView {
    pub report_id: i64,
    #[serde(flatten)]
    pub assessment: PriorityAssessment,
    pub audit_trail: Vec<String>,
}

impl PriorityView {
    fn new(report_id: i64, assessment: PriorityAssessment) -> Self {
        let audit_trail = assessment.audit_trail();
        Self {
            report_id,
            assessment,
            audit_trail,
        }
    }
}

/// Score without persisting
pub async fn assess_priority(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse<PriorityView>>, ApiError> {
    let assessment = state.engine.assess_priority(id).await?;
    Ok(Json(SuccessResponse::new(PriorityView::new(id, assessment))))
}

/// Score and store the label
pub async fn recompute_priority(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse<PriorityView>>, ApiError> {
    let (_, assessment) = state.engine.recompute_priority(id).await?;
    Ok(Json(SuccessResponse::new(PriorityView::new(id, assessment))))
}

#[derive(Serialize)]
pub struct WeatherImpactView {
    pub report_id: i64,
    pub impact: Option<WeatherImpact>,
}

pub async fn weather_impact(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse<WeatherImpactView>>, ApiError> {
    let impact = state.engine.weather_impact(id).await?;
    Ok(Json(SuccessResponse::new(WeatherImpactView {
        report_id: id,
        impact,
    })))
}

/// Reports a department is actively working
pub async fn active_reports(
    State(state): State<AppState>,
    Path(department): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let department = parse_department(&department)?;
    let reports = state.engine.active_reports(department).await?;
    Ok(reports_response(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tests::{fixture, wildfire};

    #[tokio::test]
    async fn test_list_reports_status_query() {
        let mut resolved = wildfire(2);
        resolved.response_status = ReportStatus::Resolved;
        let f = fixture(vec![wildfire(1), resolved]).await;
        let state = AppState { engine: f.engine };

        let mut q = HashMap::new();
        q.insert("status".to_string(), "Pending,In Progress".to_string());
        let Json(body) = list_reports(State(state.clone()), Query(q)).await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["count"], 1);
        assert_eq!(body["reports"][0]["id"], 1);

        let mut bad = HashMap::new();
        bad.insert("status".to_string(), "Archived".to_string());
        assert!(matches!(
            list_reports(State(state), Query(bad)).await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_assign_request_needs_one_shape() {
        let f = fixture(vec![wildfire(1)]).await;
        let state = AppState { engine: f.engine };

        let body: AssignRequest =
            serde_json::from_value(serde_json::json!({"selected": ["FIRE_DEPARTMENT"]})).unwrap();
        let Json(out) = assign_departments(State(state.clone()), Path(1), Json(body))
            .await
            .unwrap();
        assert_eq!(out["report"]["departments"]["FIRE_DEPARTMENT"], "NOT_RESPONDED_YET");
        assert_eq!(out["report"]["departments"]["GEOSCIENCE"], "NOT_RESPONSIBLE");

        let empty: AssignRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(
            assign_departments(State(state), Path(1), Json(empty)).await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_utility_status_by_display_name() {
        let f = fixture(vec![wildfire(1)]).await;
        let state = AppState { engine: f.engine };

        let Json(out) = update_utility_status(
            State(state.clone()),
            Path((1, "Utility - Water".to_string())),
            Json(StatusUpdate {
                status: "Deployed In Field".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(out["report"]["departments"]["UTILITY_WATER"], "DEPLOYED_FIELD");

        let result = update_utility_status(
            State(state),
            Path((1, "LAW_ENFORCEMENT".to_string())),
            Json(StatusUpdate {
                status: "MOBILIZING".into(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::InvalidDepartment(_))));
    }

    #[tokio::test]
    async fn test_priority_view_carries_audit_trail() {
        let f = fixture(vec![wildfire(1)]).await;
        let state = AppState { engine: f.engine };
        let Json(view) = assess_priority(State(state), Path(1)).await.unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["score"], 15);
        assert_eq!(json["label"], "Critical");
        assert_eq!(
            json["audit_trail"].as_array().and_then(|t| t.last()).cloned(),
            Some(serde_json::json!("Priority: Critical"))
        );
    }

    #[tokio::test]
    async fn test_create_report_from_loose_json() {
        let f = fixture(vec![]).await;
        let state = AppState { engine: f.engine };

        let Json(out) = create_report(
            State(state.clone()),
            Json(serde_json::json!({
                "disaster_type": "earthquake",
                "details": {"magnitude": 6.4, "aftershocks_expected": true},
                "location": "Newcastle",
                "date_time": "2024-06-01 11:00:00",
                "reporter_name": "Ali",
                "contact_info": "0249 123 456"
            })),
        )
        .await
        .unwrap();
        assert_eq!(out["report"]["disaster_type"], "Earthquake");
        assert_eq!(out["report"]["details"]["magnitude"], "6.4");
        assert_eq!(out["report"]["details"]["aftershocks_expected"], true);

        let missing = create_report(
            State(state),
            Json(serde_json::json!({"disaster_type": "Flood"})),
        )
        .await;
        assert!(matches!(missing, Err(ApiError::InvalidInput(_))));
    }
}
