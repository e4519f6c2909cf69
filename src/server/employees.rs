//! Employee CRUD endpoints.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;
use crate::records::{store, AuditEntry, Employee, EmployeeUpdate, NewEmployee};

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    #[serde(default)]
    pub name: String,
}

pub async fn create_employee(
    State(state): State<AppState>,
    payload: Result<Json<NewEmployee>, JsonRejection>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let Json(new) = payload?;
    let employee = state
        .with_db(move |conn| store::create_employee(conn, &new))
        .await?;
    tracing::info!(id = employee.id, "employee created");
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn list_employees(State(state): State<AppState>) -> Result<Json<Vec<Employee>>, ApiError> {
    let employees = state.with_db(|conn| store::list_employees(conn)).await?;
    Ok(Json(employees))
}

pub async fn get_employee(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Employee>, ApiError> {
    let Path(id) = id?;
    state
        .with_db(move |conn| store::get_employee(conn, id))
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

pub async fn update_employee(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<EmployeeUpdate>, JsonRejection>,
) -> Result<Json<Employee>, ApiError> {
    let Path(id) = id?;
    let Json(update) = payload?;
    if update.is_empty() {
        return Err(ApiError::BadRequest("update must set at least one field".into()));
    }
    let employee = state
        .with_db(move |conn| store::update_employee(conn, id, &update))
        .await?
        .ok_or_else(|| not_found(id))?;
    tracing::info!(id, "employee updated");
    Ok(Json(employee))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;
    let deleted = state
        .with_db(move |conn| store::delete_employee(conn, id))
        .await?;
    if !deleted {
        return Err(not_found(id));
    }
    tracing::info!(id, "employee deleted");
    Ok(Json(json!({ "message": "Employee deleted", "id": id })))
}

pub async fn search_by_name(
    State(state): State<AppState>,
    params: Result<Query<NameQuery>, QueryRejection>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    let Query(params) = params?;
    if params.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".into()));
    }
    let employees = state
        .with_db(move |conn| store::search_employees_by_name(conn, &params.name))
        .await?;
    Ok(Json(employees))
}

pub async fn employee_audit(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let Path(id) = id?;
    let entries = state
        .with_db(move |conn| store::audit_entries(conn, id))
        .await?;
    Ok(Json(entries))
}

pub async fn employee_count(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.with_db(|conn| store::count_employees(conn)).await?;
    Ok(Json(json!({ "count": count })))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("employee not found: {id}"))
}
