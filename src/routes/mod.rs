/// Application routes configuration
use crate::handlers::{
    active_reports, append_log, append_resource, assess_priority, assign_departments,
    create_report, get_report, health, list_reports, locate_report, recompute_priority,
    update_coordinates, update_department_status, update_field, update_utility_status,
    weather_impact, AppState,
};
use axum::{
    routing::{get, post, put},
    Router,
};

/// Build the application router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health))
        // Reports
        .route("/reports", get(list_reports).post(create_report))
        .route("/reports/:id", get(get_report))
        .route("/reports/:id/fields", put(update_field))
        .route("/reports/:id/coordinates", put(update_coordinates))
        .route("/reports/:id/locate", post(locate_report))
        .route("/reports/:id/log", post(append_log))
        .route("/reports/:id/resources", post(append_resource))
        // Department coordination
        .route("/reports/:id/departments", post(assign_departments))
        .route(
            "/reports/:id/departments/:dept",
            put(update_department_status),
        )
        .route("/reports/:id/utilities/:dept", put(update_utility_status))
        .route("/departments/:dept/active", get(active_reports))
        // Assessment
        .route(
            "/reports/:id/priority",
            get(assess_priority).post(recompute_priority),
        )
        .route("/reports/:id/weather-impact", get(weather_impact))
        .with_state(state)
}
