/// PostgreSQL-backed collaborators
use super::{AccountDirectory, Geocoder, LoginOutcome, ReportStore, WeatherProvider};
use crate::domain::{
    Department, DisasterDetails, DisasterType, EarthquakeDetails, FloodDetails, HurricaneDetails,
    LandslideDetails, NewReport, OtherDetails, PriorityLabel, Report, ReportFilter,
    ResponseStatus, WeatherSnapshot, WildfireDetails,
};
use crate::errors::{ApiError, ApiResult};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::collections::BTreeMap;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// One bindable report column
#[derive(Debug, Clone, PartialEq)]
enum Column {
    Text(Option<String>),
    Float(f64),
    Flag(Option<bool>),
}

fn text(value: &str) -> Column {
    Column::Text(Some(value.to_string()))
}

/// Every stored column except `id`, in a stable order. Columns belonging to
/// other disaster types are written as NULL.
fn columns(report: &Report) -> Vec<(String, Column)> {
    let mut cols: Vec<(String, Column)> = vec![
        ("disaster_type".into(), text(report.disaster_type().as_str())),
        ("location".into(), text(&report.location)),
        ("latitude".into(), Column::Float(report.latitude)),
        ("longitude".into(), Column::Float(report.longitude)),
        ("date_time".into(), text(&report.date_time)),
        ("reporter_name".into(), text(&report.reporter_name)),
        ("contact_info".into(), text(&report.contact_info)),
        ("response_status".into(), text(report.response_status.as_str())),
        ("resources_needed".into(), text(&report.resources_needed)),
        ("communication_log".into(), text(&report.communication_log)),
        (
            "priority_level".into(),
            Column::Text(report.priority_level.map(|p| p.as_str().to_string())),
        ),
    ];

    let null_text = [
        "fire_intensity",
        "affected_area_size",
        "nearby_infrastructure",
        "wind_speed",
        "evacuation_status",
        "magnitude",
        "depth",
        "water_level",
        "flood_evacuation_status",
        "infrastructure_damage",
        "slope_stability",
        "blocked_roads",
        "casualties_injuries",
        "disaster_description",
        "estimated_impact",
    ];
    let mut details: Vec<(&str, Column)> = null_text
        .iter()
        .map(|c| (*c, Column::Text(None)))
        .chain([
            ("flood_risk", Column::Flag(None)),
            ("aftershocks_expected", Column::Flag(None)),
        ])
        .collect();
    let mut put = |name: &str, value: Column| {
        if let Some(slot) = details.iter_mut().find(|(c, _)| *c == name) {
            slot.1 = value;
        }
    };
    match &report.details {
        DisasterDetails::Wildfire(w) => {
            put("fire_intensity", text(&w.fire_intensity));
            put("affected_area_size", text(&w.affected_area_size));
            put("nearby_infrastructure", text(&w.nearby_infrastructure));
        }
        DisasterDetails::Hurricane(h) => {
            put("wind_speed", text(&h.wind_speed));
            put("flood_risk", Column::Flag(Some(h.flood_risk)));
            put("evacuation_status", text(&h.evacuation_status));
        }
        DisasterDetails::Earthquake(e) => {
            put("magnitude", text(&e.magnitude));
            put("depth", text(&e.depth));
            put("aftershocks_expected", Column::Flag(Some(e.aftershocks_expected)));
            put("nearby_infrastructure", text(&e.nearby_infrastructure));
        }
        DisasterDetails::Flood(f) => {
            put("water_level", text(&f.water_level));
            put("flood_evacuation_status", text(&f.evacuation_status));
            put("infrastructure_damage", text(&f.infrastructure_damage));
        }
        DisasterDetails::Landslide(l) => {
            put("slope_stability", text(&l.slope_stability));
            put("blocked_roads", text(&l.blocked_roads));
            put("casualties_injuries", text(&l.casualties_injuries));
        }
        DisasterDetails::Other(o) => {
            put("disaster_description", text(&o.description));
            put("estimated_impact", text(&o.estimated_impact));
        }
    }
    cols.extend(details.into_iter().map(|(c, v)| (c.to_string(), v)));

    for department in Department::ALL {
        cols.push((
            department.status_column(),
            Column::Text(
                report
                    .departments
                    .get(department)
                    .map(|s| s.code().to_string()),
            ),
        ));
    }
    cols
}

fn bind_all(mut query: PgQuery<'_>, cols: Vec<(String, Column)>) -> PgQuery<'_> {
    for (_, value) in cols {
        query = match value {
            Column::Text(v) => query.bind(v),
            Column::Float(v) => query.bind(v),
            Column::Flag(v) => query.bind(v),
        };
    }
    query
}

fn get_text(row: &PgRow, column: &str) -> ApiResult<String> {
    Ok(row
        .try_get::<Option<String>, _>(column)?
        .unwrap_or_default())
}

fn get_flag(row: &PgRow, column: &str) -> ApiResult<bool> {
    Ok(row.try_get::<Option<bool>, _>(column)?.unwrap_or(false))
}

fn corrupt(column: &str, err: String) -> ApiError {
    ApiError::Internal(format!("unreadable value in column {}: {}", column, err))
}

fn report_from_row(row: &PgRow) -> ApiResult<Report> {
    let kind = DisasterType::from_label(&get_text(row, "disaster_type")?);
    let details = match kind {
        DisasterType::Wildfire => DisasterDetails::Wildfire(WildfireDetails {
            fire_intensity: get_text(row, "fire_intensity")?,
            affected_area_size: get_text(row, "affected_area_size")?,
            nearby_infrastructure: get_text(row, "nearby_infrastructure")?,
        }),
        DisasterType::Hurricane => DisasterDetails::Hurricane(HurricaneDetails {
            wind_speed: get_text(row, "wind_speed")?,
            flood_risk: get_flag(row, "flood_risk")?,
            evacuation_status: get_text(row, "evacuation_status")?,
        }),
        DisasterType::Earthquake => DisasterDetails::Earthquake(EarthquakeDetails {
            magnitude: get_text(row, "magnitude")?,
            depth: get_text(row, "depth")?,
            aftershocks_expected: get_flag(row, "aftershocks_expected")?,
            nearby_infrastructure: get_text(row, "nearby_infrastructure")?,
        }),
        DisasterType::Flood => DisasterDetails::Flood(FloodDetails {
            water_level: get_text(row, "water_level")?,
            evacuation_status: get_text(row, "flood_evacuation_status")?,
            infrastructure_damage: get_text(row, "infrastructure_damage")?,
        }),
        DisasterType::Landslide => DisasterDetails::Landslide(LandslideDetails {
            slope_stability: get_text(row, "slope_stability")?,
            blocked_roads: get_text(row, "blocked_roads")?,
            casualties_injuries: get_text(row, "casualties_injuries")?,
        }),
        DisasterType::Other => DisasterDetails::Other(OtherDetails {
            description: get_text(row, "disaster_description")?,
            estimated_impact: get_text(row, "estimated_impact")?,
        }),
    };

    let mut report = Report::new(row.try_get("id")?, details);
    report.location = get_text(row, "location")?;
    report.latitude = row.try_get("latitude")?;
    report.longitude = row.try_get("longitude")?;
    report.date_time = get_text(row, "date_time")?;
    report.reporter_name = get_text(row, "reporter_name")?;
    report.contact_info = get_text(row, "contact_info")?;
    report.response_status = get_text(row, "response_status")?
        .parse()
        .map_err(|e| corrupt("response_status", e))?;
    report.resources_needed = get_text(row, "resources_needed")?;
    report.communication_log = get_text(row, "communication_log")?;
    report.priority_level = match row.try_get::<Option<String>, _>("priority_level")? {
        Some(p) if !p.trim().is_empty() => {
            Some(p.parse().map_err(|e| corrupt("priority_level", e))?)
        }
        _ => None,
    };
    for department in Department::ALL {
        let column = department.status_column();
        if let Some(raw) = row.try_get::<Option<String>, _>(column.as_str())? {
            let status = raw.parse().map_err(|e| corrupt(&column, e))?;
            report.departments.set(department, status);
        }
    }
    Ok(report)
}

/// Sets only the named departments' columns; binds statuses in key order,
/// then the id
fn status_update_sql(statuses: &BTreeMap<Department, ResponseStatus>) -> String {
    let assignments: Vec<String> = statuses
        .keys()
        .enumerate()
        .map(|(i, d)| format!("{} = ${}", d.status_column(), i + 1))
        .collect();
    format!(
        "UPDATE reports SET {} WHERE id = ${} RETURNING *",
        assignments.join(", "),
        statuses.len() + 1
    )
}

/// Report repository
#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run an `UPDATE ... RETURNING *` and read back the row
    async fn returning(&self, query: PgQuery<'_>, id: i64) -> ApiResult<Report> {
        match query.fetch_optional(&self.pool).await? {
            Some(row) => report_from_row(&row),
            None => Err(ApiError::report_not_found(id)),
        }
    }

    /// Newline-joined append done by the database, so concurrent appends
    /// all land
    async fn append_to(&self, column: &str, id: i64, entry: &str) -> ApiResult<Report> {
        let sql = format!(
            "UPDATE reports SET {col} = CASE WHEN {col} = '' THEN $1 ELSE {col} || E'\\n' || $1 END
             WHERE id = $2 RETURNING *",
            col = column
        );
        self.returning(sqlx::query(&sql).bind(entry).bind(id), id).await
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn get(&self, id: i64) -> ApiResult<Report> {
        let row = sqlx::query("SELECT * FROM reports WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => report_from_row(&row),
            None => Err(ApiError::report_not_found(id)),
        }
    }

    async fn get_all(&self, filter: &ReportFilter) -> ApiResult<Vec<Report>> {
        let rows = match &filter.statuses {
            Some(statuses) => {
                let labels: Vec<String> =
                    statuses.iter().map(|s| s.as_str().to_string()).collect();
                sqlx::query("SELECT * FROM reports WHERE response_status = ANY($1) ORDER BY id")
                    .bind(labels)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM reports ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(report_from_row).collect()
    }

    async fn insert(&self, new: NewReport) -> ApiResult<Report> {
        let draft = Report::from_submission(0, new.clone());
        let cols = columns(&draft);
        let names: Vec<&str> = cols.iter().map(|(c, _)| c.as_str()).collect();
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("${}", i)).collect();
        let sql = format!(
            "INSERT INTO reports ({}) VALUES ({}) RETURNING id",
            names.join(", "),
            placeholders.join(", ")
        );
        let row = bind_all(sqlx::query(&sql), cols.clone())
            .fetch_one(&self.pool)
            .await?;
        let id: i64 = row.try_get("id")?;
        Ok(Report::from_submission(id, new))
    }

    async fn set_department_statuses(
        &self,
        id: i64,
        statuses: &BTreeMap<Department, ResponseStatus>,
    ) -> ApiResult<Report> {
        if statuses.is_empty() {
            return self.get(id).await;
        }
        let sql = status_update_sql(statuses);
        let mut query = sqlx::query(&sql);
        for status in statuses.values() {
            query = query.bind(status.code());
        }
        self.returning(query.bind(id), id).await
    }

    async fn append_log(&self, id: i64, entry: &str) -> ApiResult<Report> {
        self.append_to("communication_log", id, entry).await
    }

    async fn append_resource(&self, id: i64, entry: &str) -> ApiResult<Report> {
        self.append_to("resources_needed", id, entry).await
    }

    async fn set_coordinates(&self, id: i64, latitude: f64, longitude: f64) -> ApiResult<Report> {
        let query = sqlx::query(
            "UPDATE reports SET latitude = $1, longitude = $2 WHERE id = $3 RETURNING *",
        )
        .bind(latitude)
        .bind(longitude)
        .bind(id);
        self.returning(query, id).await
    }

    async fn set_priority(&self, id: i64, priority: PriorityLabel) -> ApiResult<Report> {
        let query = sqlx::query("UPDATE reports SET priority_level = $1 WHERE id = $2 RETURNING *")
            .bind(priority.as_str())
            .bind(id);
        self.returning(query, id).await
    }

    /// The row is locked while the field is applied, since changing the
    /// disaster type rewrites every type-specific column
    async fn update_field(&self, id: i64, field: &str, value: &str) -> ApiResult<Report> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT * FROM reports WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ApiError::report_not_found(id))?;
        let mut report = report_from_row(&row)?;
        report.set_field(field, value)?;

        let cols = columns(&report);
        let assignments: Vec<String> = cols
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{} = ${}", c, i + 1))
            .collect();
        let sql = format!(
            "UPDATE reports SET {} WHERE id = ${}",
            assignments.join(", "),
            cols.len() + 1
        );
        bind_all(sqlx::query(&sql), cols)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(report)
    }
}

/// Meteorology observations repository
#[derive(Clone)]
pub struct PgWeatherRepo {
    pool: PgPool,
}

impl PgWeatherRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeatherProvider for PgWeatherRepo {
    async fn nearest(
        &self,
        latitude: f64,
        longitude: f64,
        tolerance: f64,
    ) -> ApiResult<Option<WeatherSnapshot>> {
        let row = sqlx::query_as::<_, (String, f64, f64, f64, f64, f64, String, String)>(
            "SELECT location, latitude, longitude, temperature, humidity,
                    wind_speed, wind_direction, weather_condition
             FROM meteorology_data
             WHERE ABS(latitude - $1) < $3 AND ABS(longitude - $2) < $3
             ORDER BY POWER(latitude - $1, 2) + POWER(longitude - $2, 2)
             LIMIT 1",
        )
        .bind(latitude)
        .bind(longitude)
        .bind(tolerance)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(location, latitude, longitude, temperature, humidity, wind_speed, wind_direction, condition)| {
                WeatherSnapshot {
                    location,
                    latitude,
                    longitude,
                    temperature,
                    humidity,
                    wind_speed,
                    wind_direction,
                    condition,
                }
            },
        ))
    }
}

/// Named-place coordinates repository
#[derive(Clone)]
pub struct PgGeocoder {
    pool: PgPool,
}

impl PgGeocoder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Geocoder for PgGeocoder {
    async fn locate(&self, location: &str) -> ApiResult<Option<(f64, f64)>> {
        let row = sqlx::query_as::<_, (f64, f64)>(
            "SELECT latitude, longitude FROM geoscience_data
             WHERE LOWER(location) = LOWER($1) LIMIT 1",
        )
        .bind(location.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

/// User accounts repository
#[derive(Clone)]
pub struct PgAccountDirectory {
    pool: PgPool,
}

impl PgAccountDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountDirectory for PgAccountDirectory {
    async fn verify(&self, username: &str, password: &str, role: &str) -> ApiResult<LoginOutcome> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT password, role FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some((stored_password, stored_role)) => {
                LoginOutcome::evaluate(&stored_password, &stored_role, password, role)
            }
            None => LoginOutcome::UserNotFound,
        })
    }
}

/// Initialize database tables
pub async fn init_db(pool: &PgPool) -> ApiResult<()> {
    let department_columns: Vec<String> = Department::ALL
        .iter()
        .map(|d| format!("{} TEXT", d.status_column()))
        .collect();

    // Reports
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS reports(
            id BIGSERIAL PRIMARY KEY,
            disaster_type TEXT NOT NULL,
            location TEXT NOT NULL,
            latitude DOUBLE PRECISION NOT NULL DEFAULT 0,
            longitude DOUBLE PRECISION NOT NULL DEFAULT 0,
            date_time TEXT NOT NULL,
            reporter_name TEXT NOT NULL,
            contact_info TEXT NOT NULL,
            response_status TEXT NOT NULL DEFAULT 'Pending',
            resources_needed TEXT NOT NULL DEFAULT '',
            communication_log TEXT NOT NULL DEFAULT '',
            priority_level TEXT,
            fire_intensity TEXT,
            affected_area_size TEXT,
            nearby_infrastructure TEXT,
            wind_speed TEXT,
            flood_risk BOOLEAN,
            evacuation_status TEXT,
            magnitude TEXT,
            depth TEXT,
            aftershocks_expected BOOLEAN,
            water_level TEXT,
            flood_evacuation_status TEXT,
            infrastructure_damage TEXT,
            slope_stability TEXT,
            blocked_roads TEXT,
            casualties_injuries TEXT,
            disaster_description TEXT,
            estimated_impact TEXT,
            {}
        )",
        department_columns.join(",\n            ")
    ))
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS ix_reports_response_status
         ON reports(response_status)",
    )
    .execute(pool)
    .await?;

    // Weather observations
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS meteorology_data(
            id BIGSERIAL PRIMARY KEY,
            location TEXT NOT NULL,
            latitude DOUBLE PRECISION NOT NULL,
            longitude DOUBLE PRECISION NOT NULL,
            temperature DOUBLE PRECISION NOT NULL,
            humidity DOUBLE PRECISION NOT NULL,
            wind_speed DOUBLE PRECISION NOT NULL,
            wind_direction TEXT NOT NULL DEFAULT '',
            weather_condition TEXT NOT NULL DEFAULT ''
        )",
    )
    .execute(pool)
    .await?;

    // Place names
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS geoscience_data(
            id BIGSERIAL PRIMARY KEY,
            location TEXT NOT NULL,
            latitude DOUBLE PRECISION NOT NULL,
            longitude DOUBLE PRECISION NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users(
            username TEXT PRIMARY KEY,
            password TEXT NOT NULL,
            role TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
