use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, DateTime, Document},
    options::FindOptions,
    ClientSession, Collection,
};
use serde::{Deserialize, Serialize};

use super::{
    control_measure, counter::Counter, department::Department, double_option,
    ImplementationStatus,
};
use crate::{
    database::Storage,
    error::{StoreError, StoreResult},
    risk::RiskAssessment,
};

pub const COLLECTION: &str = "hazard_entries";
pub const CODE_PREFIX: &str = "HIRAC-";

/// Likelihood or severity rating.
pub type Rating = i32;
pub const RATING_RANGE: std::ops::RangeInclusive<Rating> = 1..=5;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum HazardClass {
    Physical,
    Chemical,
    Biological,
    Mechanical,
    Electrical,
}

/// One HIRAC register row.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HazardEntry {
    pub _id: i64,
    pub department_id: i64,
    pub task: String,
    pub hazard: String,
    pub photo_url: Option<String>,
    pub hazard_class: HazardClass,
    pub hazardous_event: String,
    pub impact: String,
    pub initial_likelihood: Rating,
    pub initial_severity: Rating,
    pub residual_likelihood: Rating,
    pub residual_severity: Rating,
    pub status: Option<ImplementationStatus>,
    pub created_at: DateTime,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct HazardEntryRequest {
    pub department_id: i64,
    pub task: String,
    pub hazard: String,
    pub photo_url: Option<String>,
    pub hazard_class: HazardClass,
    pub hazardous_event: String,
    pub impact: String,
    pub initial_likelihood: Rating,
    pub initial_severity: Rating,
    pub residual_likelihood: Option<Rating>,
    pub residual_severity: Option<Rating>,
    pub status: Option<ImplementationStatus>,
}
/// Partial update; absent fields keep their stored values.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HazardEntryPatch {
    pub department_id: Option<i64>,
    pub task: Option<String>,
    pub hazard: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub photo_url: Option<Option<String>>,
    pub hazard_class: Option<HazardClass>,
    pub hazardous_event: Option<String>,
    pub impact: Option<String>,
    pub initial_likelihood: Option<Rating>,
    pub initial_severity: Option<Rating>,
    pub residual_likelihood: Option<Rating>,
    pub residual_severity: Option<Rating>,
    #[serde(default, deserialize_with = "double_option")]
    pub status: Option<Option<ImplementationStatus>>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct HazardEntryResponse {
    pub id: i64,
    pub code: String,
    pub department_id: i64,
    pub task: String,
    pub hazard: String,
    pub photo_url: Option<String>,
    pub hazard_class: HazardClass,
    pub hazardous_event: String,
    pub impact: String,
    pub initial_risk: RiskAssessment,
    pub residual_risk: RiskAssessment,
    pub status: Option<ImplementationStatus>,
    pub created_at: String,
}
/// What a cascading hazard entry delete removed.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct HazardEntryDeletion {
    pub hazard_entries: u64,
    pub control_measures: u64,
}

/// Renders an id the way the register shows it, e.g. `HIRAC-007`.
pub fn format_code(_id: i64) -> String {
    format!("{CODE_PREFIX}{_id:03}")
}

/// Accepts either a bare id (`7`) or a register code (`HIRAC-007`).
pub fn parse_code(value: &str) -> Option<i64> {
    let digits = value.strip_prefix(CODE_PREFIX).unwrap_or(value);
    digits.parse::<i64>().ok().filter(|id| *id > 0)
}

fn check_rating(field: &'static str, value: Rating) -> StoreResult<Rating> {
    if RATING_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(StoreError::validation(
            "RATING_OUT_OF_RANGE",
            format!(
                "{field} must be between {} and {}, got {value}",
                RATING_RANGE.start(),
                RATING_RANGE.end()
            ),
        ))
    }
}

impl HazardEntryRequest {
    /// Builds the stored entry. Residual ratings default to the initial ones.
    pub fn into_entry(self, _id: i64, created_at: DateTime) -> StoreResult<HazardEntry> {
        let initial_likelihood = check_rating("initial_likelihood", self.initial_likelihood)?;
        let initial_severity = check_rating("initial_severity", self.initial_severity)?;
        let residual_likelihood = check_rating(
            "residual_likelihood",
            self.residual_likelihood.unwrap_or(initial_likelihood),
        )?;
        let residual_severity = check_rating(
            "residual_severity",
            self.residual_severity.unwrap_or(initial_severity),
        )?;

        Ok(HazardEntry {
            _id,
            department_id: self.department_id,
            task: self.task,
            hazard: self.hazard,
            photo_url: self.photo_url,
            hazard_class: self.hazard_class,
            hazardous_event: self.hazardous_event,
            impact: self.impact,
            initial_likelihood,
            initial_severity,
            residual_likelihood,
            residual_severity,
            status: self.status,
            created_at,
        })
    }
}

impl From<HazardEntry> for HazardEntryResponse {
    fn from(entry: HazardEntry) -> Self {
        Self {
            id: entry._id,
            code: format_code(entry._id),
            initial_risk: entry.initial_risk(),
            residual_risk: entry.residual_risk(),
            department_id: entry.department_id,
            task: entry.task,
            hazard: entry.hazard,
            photo_url: entry.photo_url,
            hazard_class: entry.hazard_class,
            hazardous_event: entry.hazardous_event,
            impact: entry.impact,
            status: entry.status,
            created_at: entry.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

impl HazardEntry {
    fn collection(storage: &Storage) -> Collection<HazardEntry> {
        storage.collection::<HazardEntry>(COLLECTION)
    }

    pub fn initial_risk(&self) -> RiskAssessment {
        RiskAssessment::new(self.initial_likelihood, self.initial_severity)
    }
    pub fn residual_risk(&self) -> RiskAssessment {
        RiskAssessment::new(self.residual_likelihood, self.residual_severity)
    }

    pub fn apply(&mut self, patch: HazardEntryPatch) -> StoreResult<()> {
        if let Some(department_id) = patch.department_id {
            self.department_id = department_id;
        }
        if let Some(task) = patch.task {
            self.task = task;
        }
        if let Some(hazard) = patch.hazard {
            self.hazard = hazard;
        }
        if let Some(photo_url) = patch.photo_url {
            self.photo_url = photo_url;
        }
        if let Some(hazard_class) = patch.hazard_class {
            self.hazard_class = hazard_class;
        }
        if let Some(hazardous_event) = patch.hazardous_event {
            self.hazardous_event = hazardous_event;
        }
        if let Some(impact) = patch.impact {
            self.impact = impact;
        }
        if let Some(value) = patch.initial_likelihood {
            self.initial_likelihood = check_rating("initial_likelihood", value)?;
        }
        if let Some(value) = patch.initial_severity {
            self.initial_severity = check_rating("initial_severity", value)?;
        }
        if let Some(value) = patch.residual_likelihood {
            self.residual_likelihood = check_rating("residual_likelihood", value)?;
        }
        if let Some(value) = patch.residual_severity {
            self.residual_severity = check_rating("residual_severity", value)?;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        Ok(())
    }

    async fn ensure_department(storage: &Storage, department_id: i64) -> StoreResult<()> {
        match Department::find_by_id(storage, department_id).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::validation(
                "DEPARTMENT_NOT_FOUND",
                format!("department {department_id} does not exist"),
            )),
        }
    }

    pub async fn find_many(storage: &Storage) -> StoreResult<Vec<HazardEntry>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

        let mut cursor = Self::collection(storage).find(None, options).await?;
        let mut entries: Vec<HazardEntry> = Vec::new();
        while let Some(entry) = cursor.next().await {
            entries.push(entry?);
        }
        Ok(entries)
    }

    /// Lists every entry, degrading to an empty list when storage fails
    /// (e.g. before the collection exists). Other reads propagate errors.
    pub async fn find_many_or_empty(storage: &Storage) -> Vec<HazardEntry> {
        match Self::find_many(storage).await {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!("listing hazard entries failed, serving none: {error}");
                Vec::new()
            }
        }
    }

    pub async fn find_by_id(storage: &Storage, _id: i64) -> StoreResult<Option<HazardEntry>> {
        Ok(Self::collection(storage)
            .find_one(doc! { "_id": _id }, None)
            .await?)
    }

    pub async fn save(storage: &Storage, request: HazardEntryRequest) -> StoreResult<HazardEntry> {
        Self::ensure_department(storage, request.department_id).await?;
        let entry = request.into_entry(0, DateTime::now())?;
        let entry = HazardEntry {
            _id: Counter::next(storage, COLLECTION).await?,
            ..entry
        };
        Self::collection(storage).insert_one(&entry, None).await?;
        tracing::info!(
            hazard_entry = %format_code(entry._id),
            department_id = entry.department_id,
            "hazard entry created"
        );
        Ok(entry)
    }

    pub async fn update(
        storage: &Storage,
        _id: i64,
        patch: HazardEntryPatch,
    ) -> StoreResult<HazardEntry> {
        let mut entry = Self::find_by_id(storage, _id)
            .await?
            .ok_or_else(|| StoreError::not_found("hazard entry", _id))?;
        if let Some(department_id) = patch.department_id {
            Self::ensure_department(storage, department_id).await?;
        }
        entry.apply(patch)?;
        Self::collection(storage)
            .replace_one(doc! { "_id": _id }, &entry, None)
            .await?;
        tracing::info!(hazard_entry = %format_code(_id), "hazard entry updated");
        Ok(entry)
    }

    pub async fn set_photo_url(storage: &Storage, _id: i64, photo_url: &str) -> StoreResult<()> {
        let result = Self::collection(storage)
            .update_one(
                doc! { "_id": _id },
                doc! { "$set": { "photo_url": photo_url } },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(StoreError::not_found("hazard entry", _id));
        }
        Ok(())
    }

    /// Deletes the entry together with its control measures.
    pub async fn delete_by_id(storage: &Storage, _id: i64) -> StoreResult<HazardEntryDeletion> {
        let mut session = storage.start_session().await?;
        let result = Self::delete_cascade(storage, _id, &mut session).await;
        let deletion = storage.finish(&mut session, result).await?;
        tracing::info!(
            hazard_entry = %format_code(_id),
            control_measures = deletion.control_measures,
            "hazard entry deleted"
        );
        Ok(deletion)
    }

    async fn delete_cascade(
        storage: &Storage,
        _id: i64,
        session: &mut ClientSession,
    ) -> StoreResult<HazardEntryDeletion> {
        let control_measures = storage
            .collection::<Document>(control_measure::COLLECTION)
            .delete_many_with_session(doc! { "hazard_entry_id": _id }, None, session)
            .await?
            .deleted_count;
        let hazard_entries = Self::collection(storage)
            .delete_one_with_session(doc! { "_id": _id }, None, session)
            .await?
            .deleted_count;

        if hazard_entries == 0 {
            return Err(StoreError::not_found("hazard entry", _id));
        }
        Ok(HazardEntryDeletion {
            hazard_entries,
            control_measures,
        })
    }
}
