use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Failures loading visit metadata. These are blocking for the page; the
/// UI renders an error screen rather than retrying.
#[derive(Debug, Error)]
pub enum VisitError {
    #[error("invalid visit id: {0}")]
    InvalidId(String),
    #[error("visit not found: {0}")]
    NotFound(String),
    #[error("visit service error: {0}")]
    Http(String),
    #[error("invalid visit record: {0}")]
    InvalidRecord(String),
}

/// Read-only context for one consultation page, fetched once per load.
#[derive(Debug, Clone)]
pub struct VisitContext {
    pub visit_id: String,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub clinician_name: String,
    pub clinic_name: String,
    pub patient_first_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisitRecord {
    visit_id: String,
    #[serde(default)]
    visit_type: Option<String>,
    #[serde(default)]
    visit_mode: Option<String>,
    scheduled_date: String,
    scheduled_time: String,
    duration_minutes: u32,
    #[serde(default)]
    status: Option<String>,
    doctor: DoctorRecord,
    clinic: ClinicRecord,
    patient: PatientRecord,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DoctorRecord {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct ClinicRecord {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientRecord {
    first_name: String,
}

/// Fetches visit metadata from the clinic API.
pub struct VisitService {
    base_url: String,
    http: reqwest::Client,
}

impl VisitService {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Validate a visit identifier: lowercase alphanumerics and dashes,
    /// starting with an alphanumeric.
    pub fn validate_visit_id(input: &str) -> Result<String, VisitError> {
        let candidate = input.trim();
        let re = regex::Regex::new(r"^[a-z0-9][a-z0-9-]*$").unwrap();
        if re.is_match(candidate) {
            Ok(candidate.to_string())
        } else {
            Err(VisitError::InvalidId(format!(
                "expected lowercase id like 'v-123', got '{candidate}'"
            )))
        }
    }

    fn visit_url(&self, visit_id: &str) -> String {
        format!(
            "{}/api/v1/visits/{}",
            self.base_url,
            urlencoding::encode(visit_id)
        )
    }

    pub async fn fetch_visit(&self, visit_id: &str) -> Result<VisitContext, VisitError> {
        let visit_id = Self::validate_visit_id(visit_id)?;
        let url = self.visit_url(&visit_id);
        tracing::info!("fetching visit metadata for {visit_id}");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| VisitError::Http(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VisitError::NotFound(visit_id));
        }
        if !resp.status().is_success() {
            return Err(VisitError::Http(format!(
                "visit service returned status {}",
                resp.status()
            )));
        }

        let record: VisitRecord = resp
            .json()
            .await
            .map_err(|e| VisitError::InvalidRecord(e.to_string()))?;

        record.into_context()
    }
}

impl VisitRecord {
    fn into_context(self) -> Result<VisitContext, VisitError> {
        let scheduled_time = parse_schedule(&self.scheduled_date, &self.scheduled_time)?;
        Ok(VisitContext {
            visit_id: self.visit_id,
            scheduled_time,
            duration_minutes: self.duration_minutes,
            clinician_name: self.doctor.full_name,
            clinic_name: self.clinic.name,
            patient_first_name: self.patient.first_name,
        })
    }
}

fn parse_schedule(date: &str, time: &str) -> Result<DateTime<Utc>, VisitError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| VisitError::InvalidRecord(format!("bad scheduledDate '{date}': {e}")))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|e| VisitError::InvalidRecord(format!("bad scheduledTime '{time}': {e}")))?;
    Ok(Utc.from_utc_datetime(&date.and_time(time)))
}
