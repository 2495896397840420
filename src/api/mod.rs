//! Typed access to the SafeNow resources: shelters, alerts, safety advice
//! and device status.
//!
//! Every call goes through [`ApiClient`], so the same bearer and refresh
//! rules apply as for the auth endpoints.

pub mod models;

use tracing::{debug, info};

use crate::error::{AppError, ValidationErrors};
use crate::geo;
use crate::http::{endpoints, ApiClient, ApiRequest};
use crate::Result;

pub use models::{
    ActiveAlert, DeviceAck, DeviceRegistration, EducationTopic, HazardType, Health, NearbyShelter,
    SafetyInstructions, SafetyState, SafetyStatusAck, SafetyStatusUpdate, Severity,
    SimulateAlertRequest, SimulatedAlert,
};

pub const DEFAULT_SHELTER_LIMIT: u32 = 3;
pub const MAX_SHELTER_LIMIT: u32 = 20;
pub const MAX_ALERT_RADIUS_M: u32 = 50_000;
pub const MAX_ALERT_VALID_MINUTES: u32 = 1440;

const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Clone)]
pub struct ResourceApi {
    client: ApiClient,
}

impl ResourceApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn health(&self) -> Result<Health> {
        self.client.send(ApiRequest::get(endpoints::HEALTH)).await
    }

    /// Closest shelters first. `limit` is clamped to 1..=20.
    pub async fn nearby_shelters(&self, lat: f64, lon: f64, limit: Option<u32>) -> Result<Vec<NearbyShelter>> {
        geo::validate_coordinates(lat, lon)?;
        let limit = limit.unwrap_or(DEFAULT_SHELTER_LIMIT).clamp(1, MAX_SHELTER_LIMIT);
        let request = ApiRequest::get(endpoints::NEARBY_SHELTERS)
            .query("lat", lat)
            .query("lon", lon)
            .query("limit", limit);
        let shelters: Vec<NearbyShelter> = self.client.send(request).await?;
        debug!("{} shelters near ({}, {})", shelters.len(), lat, lon);
        Ok(shelters)
    }

    /// Alerts whose radius covers the given point.
    pub async fn active_alerts(&self, lat: f64, lon: f64) -> Result<Vec<ActiveAlert>> {
        geo::validate_coordinates(lat, lon)?;
        let request = ApiRequest::get(endpoints::ACTIVE_ALERTS)
            .query("lat", lat)
            .query("lon", lon);
        self.client.send(request).await
    }

    pub async fn safety_instructions(&self, hazard: HazardType, eta_seconds: Option<u64>) -> Result<SafetyInstructions> {
        let mut request = ApiRequest::get(endpoints::SAFETY_INSTRUCTIONS).query("hazard_type", hazard);
        if let Some(eta) = eta_seconds {
            request = request.query("eta_seconds", eta);
        }
        self.client.send(request).await
    }

    pub async fn emergency_education(&self) -> Result<Vec<EducationTopic>> {
        self.client.send(ApiRequest::get(endpoints::EMERGENCY_EDUCATION)).await
    }

    pub async fn register_device(&self, registration: &DeviceRegistration) -> Result<DeviceAck> {
        validate_registration(registration)?;
        let ack: DeviceAck = self
            .client
            .send(ApiRequest::post(endpoints::DEVICE_REGISTER).json(registration)?)
            .await?;
        info!("Device {} registered", ack.device_id);
        Ok(ack)
    }

    pub async fn update_safety_status(&self, update: &SafetyStatusUpdate) -> Result<SafetyStatusAck> {
        validate_status_update(update)?;
        let ack: SafetyStatusAck = self
            .client
            .send(ApiRequest::post(endpoints::SAFETY_STATUS).json(update)?)
            .await?;
        info!("Device {} reported {:?}", ack.device_id, ack.status);
        Ok(ack)
    }

    /// The backend may require an `X-API-KEY` for simulations.
    pub async fn simulate_alert(&self, alert: &SimulateAlertRequest, api_key: Option<&str>) -> Result<SimulatedAlert> {
        validate_simulation(alert)?;
        let mut request = ApiRequest::post(endpoints::SIMULATE_ALERT).json(alert)?;
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let created: SimulatedAlert = self.client.send(request).await?;
        info!("Simulated {} alert {} created", created.hazard_type, created.id);
        Ok(created)
    }
}

fn validate_registration(registration: &DeviceRegistration) -> Result<()> {
    let mut errors = ValidationErrors::default();
    if registration.device_id.trim().is_empty() {
        errors.add("device_id", "Device ID cannot be empty or whitespace");
    }
    match (registration.lat, registration.lon) {
        (Some(lat), Some(lon)) => merge(&mut errors, geo::validate_coordinates(lat, lon)),
        (None, None) => {}
        _ => errors.add_general("Latitude and longitude must be provided together"),
    }
    errors.into_result()
}

fn validate_status_update(update: &SafetyStatusUpdate) -> Result<()> {
    let mut errors = ValidationErrors::default();
    if update.device_id.trim().is_empty() {
        errors.add("device_id", "Device ID cannot be empty or whitespace");
    }
    if update.status == SafetyState::InShelter && update.shelter_id.is_none() {
        errors.add_general("shelter_id is required when status is IN_SHELTER");
    }
    errors.into_result()
}

fn validate_simulation(alert: &SimulateAlertRequest) -> Result<()> {
    let mut errors = ValidationErrors::default();
    merge(&mut errors, geo::validate_coordinates(alert.center_lat, alert.center_lon));
    if !(1..=MAX_ALERT_RADIUS_M).contains(&alert.radius_m) {
        errors.add("radius_m", format!("Ensure this value is between 1 and {}.", MAX_ALERT_RADIUS_M));
    }
    if !(1..=MAX_ALERT_VALID_MINUTES).contains(&alert.valid_minutes) {
        errors.add(
            "valid_minutes",
            format!("Ensure this value is between 1 and {}.", MAX_ALERT_VALID_MINUTES),
        );
    }
    if alert.source.trim().is_empty() {
        errors.add("source", "Source cannot be empty or whitespace");
    }
    errors.into_result()
}

fn merge(errors: &mut ValidationErrors, result: Result<()>) {
    if let Err(AppError::ValidationError(other)) = result {
        errors.extend(other);
    }
}
