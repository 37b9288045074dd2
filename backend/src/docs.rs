#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    handlers::{admin::AdminSessionListResponse, health::HealthResponse},
    models::{
        AssignVehicleRequest, Driver, DriverLoginRequest, DriverLoginResponse,
        DriverPresenceResponse, DriverStatus, DriverStatusRequest, LiveBus, LivePosition,
        LocationReport, LocationStatus, LocationUpdateRequest, SessionRequest, SessionResponse,
        SessionStats,
    },
    services::audit_log::AuditLogEntry,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        driver_login_doc,
        driver_location_doc,
        driver_validate_session_doc,
        driver_logout_doc,
        driver_status_doc,
        driver_presence_doc,
        live_buses_doc,
        bus_history_doc,
        health_doc,
        admin_sessions_doc,
        admin_session_stats_doc,
        admin_force_end_session_doc,
        admin_assign_vehicle_doc,
        admin_audit_logs_doc
    ),
    components(
        schemas(
            // drivers
            Driver,
            DriverStatus,
            DriverLoginRequest,
            DriverLoginResponse,
            DriverStatusRequest,
            DriverPresenceResponse,
            AssignVehicleRequest,
            // sessions
            SessionRequest,
            SessionResponse,
            SessionStats,
            AdminSessionListResponse,
            // locations
            LocationStatus,
            LocationReport,
            LocationUpdateRequest,
            LivePosition,
            LiveBus,
            // misc
            AuditLogEntry,
            HealthResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Driver", description = "Driver login, sessions and location reporting"),
        (name = "Buses", description = "Live positions and history"),
        (name = "Admin", description = "Operator endpoints (bearer token)"),
        (name = "System", description = "Health")
    )
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "BearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[utoipa::path(
    post,
    path = "/api/driver/login",
    request_body = DriverLoginRequest,
    responses(
        (status = 200, description = "Session issued", body = DriverLoginResponse),
        (status = 401, description = "Unknown or deactivated driver"),
        (status = 409, description = "Active session bound to another device")
    ),
    tag = "Driver"
)]
fn driver_login_doc() {}

#[utoipa::path(
    post,
    path = "/api/driver/location",
    request_body = LocationUpdateRequest,
    params(("X-Device-Id" = Option<String>, Header, description = "Device binding check")),
    responses(
        (status = 200, description = "Report accepted", body = serde_json::Value),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Session not found, expired or owned by another driver"),
        (status = 409, description = "Device mismatch")
    ),
    tag = "Driver"
)]
fn driver_location_doc() {}

#[utoipa::path(
    post,
    path = "/api/driver/validate-session",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session is valid", body = serde_json::Value),
        (status = 401, description = "Session not found or expired")
    ),
    tag = "Driver"
)]
fn driver_validate_session_doc() {}

#[utoipa::path(
    post,
    path = "/api/driver/logout",
    request_body = SessionRequest,
    responses(
        (status = 200, description = "Session ended", body = serde_json::Value),
        (status = 401, description = "Session not found")
    ),
    tag = "Driver"
)]
fn driver_logout_doc() {}

#[utoipa::path(
    post,
    path = "/api/driver/status",
    request_body = DriverStatusRequest,
    responses((status = 200, body = serde_json::Value)),
    tag = "Driver"
)]
fn driver_status_doc() {}

#[utoipa::path(
    get,
    path = "/api/drivers/{driverId}/presence",
    params(("driverId" = String, Path, description = "Driver ID")),
    responses(
        (status = 200, body = DriverPresenceResponse),
        (status = 404, description = "Driver not found")
    ),
    tag = "Driver"
)]
fn driver_presence_doc() {}

#[utoipa::path(
    get,
    path = "/api/buses/live",
    responses((status = 200, body = [LiveBus])),
    tag = "Buses"
)]
fn live_buses_doc() {}

#[utoipa::path(
    get,
    path = "/api/buses/{busId}/history",
    params(("busId" = String, Path, description = "Bus ID")),
    responses(
        (status = 200, description = "Oldest first", body = [LocationReport]),
        (status = 404, description = "Bus has never reported")
    ),
    tag = "Buses"
)]
fn bus_history_doc() {}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, body = HealthResponse)),
    tag = "System"
)]
fn health_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/sessions",
    responses((status = 200, body = AdminSessionListResponse)),
    tag = "Admin",
    security(("BearerAuth" = []))
)]
fn admin_sessions_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/session-stats",
    responses((status = 200, body = SessionStats)),
    tag = "Admin",
    security(("BearerAuth" = []))
)]
fn admin_session_stats_doc() {}

#[utoipa::path(
    delete,
    path = "/api/admin/session/{sessionId}",
    params(("sessionId" = String, Path, description = "Session ID")),
    responses(
        (status = 200, body = serde_json::Value),
        (status = 404, description = "Session not found")
    ),
    tag = "Admin",
    security(("BearerAuth" = []))
)]
fn admin_force_end_session_doc() {}

#[utoipa::path(
    put,
    path = "/api/admin/drivers/{driverId}/assignment",
    params(("driverId" = String, Path, description = "Driver ID")),
    request_body = AssignVehicleRequest,
    responses(
        (status = 200, body = Driver),
        (status = 400, description = "Invalid payload or deactivated driver"),
        (status = 404, description = "Driver not found")
    ),
    tag = "Admin",
    security(("BearerAuth" = []))
)]
fn admin_assign_vehicle_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    params(("limit" = Option<usize>, Query, description = "Max entries, newest first")),
    responses((status = 200, body = [AuditLogEntry])),
    tag = "Admin",
    security(("BearerAuth" = []))
)]
fn admin_audit_logs_doc() {}
