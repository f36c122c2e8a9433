use chrono::NaiveDate;
use futures::stream::StreamExt;
use mongodb::{bson::doc, options::FindOptions, Collection};
use serde::{Deserialize, Serialize};

use super::{counter::Counter, double_option, hazard_entry::HazardEntry, ImplementationStatus};
use crate::{
    database::Storage,
    error::{StoreError, StoreResult},
};

pub const COLLECTION: &str = "control_measures";

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum ControlType {
    Engineering,
    Administrative,
    #[serde(rename = "PPE")]
    Ppe,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ControlMeasure {
    pub _id: i64,
    pub hazard_entry_id: i64,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub description: String,
    pub person_in_charge: Option<String>,
    pub status: ImplementationStatus,
    pub completion_date: Option<NaiveDate>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ControlMeasureRequest {
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub description: String,
    pub person_in_charge: Option<String>,
    pub status: Option<ImplementationStatus>,
    pub completion_date: Option<NaiveDate>,
}
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ControlMeasurePatch {
    #[serde(rename = "type")]
    pub control_type: Option<ControlType>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub person_in_charge: Option<Option<String>>,
    pub status: Option<ImplementationStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub completion_date: Option<Option<NaiveDate>>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct ControlMeasureResponse {
    pub id: i64,
    pub hazard_entry_id: i64,
    #[serde(rename = "type")]
    pub control_type: ControlType,
    pub description: String,
    pub person_in_charge: Option<String>,
    pub status: ImplementationStatus,
    pub completion_date: Option<NaiveDate>,
}

impl From<ControlMeasure> for ControlMeasureResponse {
    fn from(measure: ControlMeasure) -> Self {
        Self {
            id: measure._id,
            hazard_entry_id: measure.hazard_entry_id,
            control_type: measure.control_type,
            description: measure.description,
            person_in_charge: measure.person_in_charge,
            status: measure.status,
            completion_date: measure.completion_date,
        }
    }
}

fn require_description(description: String) -> StoreResult<String> {
    let description = description.trim().to_string();
    if description.is_empty() {
        Err(StoreError::validation(
            "CONTROL_MEASURE_MUST_HAVE_DESCRIPTION",
            "control measure description must not be empty",
        ))
    } else {
        Ok(description)
    }
}

impl ControlMeasureRequest {
    /// New measures start as `Ongoing` unless a status is given.
    pub fn into_measure(self, _id: i64, hazard_entry_id: i64) -> StoreResult<ControlMeasure> {
        Ok(ControlMeasure {
            _id,
            hazard_entry_id,
            control_type: self.control_type,
            description: require_description(self.description)?,
            person_in_charge: self.person_in_charge,
            status: self.status.unwrap_or(ImplementationStatus::Ongoing),
            completion_date: self.completion_date,
        })
    }
}

impl ControlMeasure {
    fn collection(storage: &Storage) -> Collection<ControlMeasure> {
        storage.collection::<ControlMeasure>(COLLECTION)
    }

    pub fn apply(&mut self, patch: ControlMeasurePatch) -> StoreResult<()> {
        if let Some(control_type) = patch.control_type {
            self.control_type = control_type;
        }
        if let Some(description) = patch.description {
            self.description = require_description(description)?;
        }
        if let Some(person_in_charge) = patch.person_in_charge {
            self.person_in_charge = person_in_charge;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(completion_date) = patch.completion_date {
            self.completion_date = completion_date;
        }
        Ok(())
    }

    pub async fn find_by_hazard_entry(
        storage: &Storage,
        hazard_entry_id: i64,
    ) -> StoreResult<Vec<ControlMeasure>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

        let mut cursor = Self::collection(storage)
            .find(doc! { "hazard_entry_id": hazard_entry_id }, options)
            .await?;
        let mut measures: Vec<ControlMeasure> = Vec::new();
        while let Some(measure) = cursor.next().await {
            measures.push(measure?);
        }
        Ok(measures)
    }
    pub async fn find_by_id(storage: &Storage, _id: i64) -> StoreResult<Option<ControlMeasure>> {
        Ok(Self::collection(storage)
            .find_one(doc! { "_id": _id }, None)
            .await?)
    }

    pub async fn save(
        storage: &Storage,
        hazard_entry_id: i64,
        request: ControlMeasureRequest,
    ) -> StoreResult<ControlMeasure> {
        if HazardEntry::find_by_id(storage, hazard_entry_id).await?.is_none() {
            return Err(StoreError::not_found("hazard entry", hazard_entry_id));
        }
        let measure = request.into_measure(0, hazard_entry_id)?;
        let measure = ControlMeasure {
            _id: Counter::next(storage, COLLECTION).await?,
            ..measure
        };
        Self::collection(storage).insert_one(&measure, None).await?;
        tracing::info!(
            control_measure_id = measure._id,
            hazard_entry_id,
            "control measure created"
        );
        Ok(measure)
    }

    pub async fn update(
        storage: &Storage,
        _id: i64,
        patch: ControlMeasurePatch,
    ) -> StoreResult<ControlMeasure> {
        let mut measure = Self::find_by_id(storage, _id)
            .await?
            .ok_or_else(|| StoreError::not_found("control measure", _id))?;
        measure.apply(patch)?;
        Self::collection(storage)
            .replace_one(doc! { "_id": _id }, &measure, None)
            .await?;
        tracing::info!(control_measure_id = _id, "control measure updated");
        Ok(measure)
    }

    pub async fn delete_by_id(storage: &Storage, _id: i64) -> StoreResult<u64> {
        let result = Self::collection(storage)
            .delete_one(doc! { "_id": _id }, None)
            .await?;
        if result.deleted_count == 0 {
            return Err(StoreError::not_found("control measure", _id));
        }
        tracing::info!(control_measure_id = _id, "control measure deleted");
        Ok(result.deleted_count)
    }
}
