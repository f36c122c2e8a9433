use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, from_document, DateTime, Document},
    Collection,
};
use serde::{Deserialize, Serialize};

use super::{
    control_measure, counter::Counter, double_option, hazard_entry,
    user::{User, UserResponse},
};
use crate::{
    database::Storage,
    error::{StoreError, StoreResult},
};

pub const COLLECTION: &str = "departments";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Department {
    pub _id: i64,
    pub name: String,
    pub supervisor_id: Option<i64>,
    pub created_at: DateTime,
}
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DepartmentRequest {
    pub name: Option<String>,
    /// Absent keeps the current supervisor, `null` clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub supervisor_id: Option<Option<i64>>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct DepartmentResponse {
    pub id: i64,
    pub name: String,
    pub supervisor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor: Option<UserResponse>,
    pub created_at: String,
}
#[derive(Debug, Deserialize)]
struct DepartmentWithSupervisor {
    _id: i64,
    name: String,
    supervisor_id: Option<i64>,
    created_at: DateTime,
    supervisor: Option<User>,
}
/// What a cascading department delete removed.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DepartmentDeletion {
    pub departments: u64,
    pub hazard_entries: u64,
    pub control_measures: u64,
}

impl From<Department> for DepartmentResponse {
    fn from(department: Department) -> Self {
        Self {
            id: department._id,
            name: department.name,
            supervisor_id: department.supervisor_id,
            supervisor: None,
            created_at: department
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}

impl From<DepartmentWithSupervisor> for DepartmentResponse {
    fn from(row: DepartmentWithSupervisor) -> Self {
        Self {
            id: row._id,
            name: row.name,
            supervisor_id: row.supervisor_id,
            supervisor: row.supervisor.map(UserResponse::from),
            created_at: row.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

fn name_taken(name: &str) -> String {
    format!("a department named `{name}` already exists")
}

fn require_name(name: String) -> StoreResult<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        Err(StoreError::validation(
            "DEPARTMENT_MUST_HAVE_NAME",
            "department name must not be empty",
        ))
    } else {
        Ok(name)
    }
}

impl DepartmentRequest {
    pub fn into_department(self, _id: i64, created_at: DateTime) -> StoreResult<Department> {
        let name = match self.name {
            Some(name) => require_name(name)?,
            None => {
                return Err(StoreError::validation(
                    "DEPARTMENT_MUST_HAVE_NAME",
                    "department name is required",
                ))
            }
        };
        Ok(Department {
            _id,
            name,
            supervisor_id: self.supervisor_id.flatten(),
            created_at,
        })
    }
}

impl Department {
    fn collection(storage: &Storage) -> Collection<Department> {
        storage.collection::<Department>(COLLECTION)
    }

    pub fn apply(&mut self, request: DepartmentRequest) -> StoreResult<()> {
        if let Some(name) = request.name {
            self.name = require_name(name)?;
        }
        if let Some(supervisor_id) = request.supervisor_id {
            self.supervisor_id = supervisor_id;
        }
        Ok(())
    }

    /// Lists departments newest first, optionally resolving each supervisor.
    pub async fn find_many(
        storage: &Storage,
        include_supervisor: bool,
    ) -> StoreResult<Vec<DepartmentResponse>> {
        let mut pipeline: Vec<Document> = vec![doc! {
            "$sort": { "created_at": -1, "_id": -1 }
        }];

        if include_supervisor {
            pipeline.push(doc! {
                "$lookup": {
                    "from": super::user::COLLECTION,
                    "localField": "supervisor_id",
                    "foreignField": "_id",
                    "as": "supervisor",
                }
            });
            pipeline.push(doc! {
                "$unwind": {
                    "path": "$supervisor",
                    "preserveNullAndEmptyArrays": true,
                }
            });
        }

        let mut cursor = Self::collection(storage).aggregate(pipeline, None).await?;
        let mut departments: Vec<DepartmentResponse> = Vec::new();
        while let Some(doc) = cursor.next().await {
            let row = from_document::<DepartmentWithSupervisor>(doc?)?;
            departments.push(row.into());
        }
        Ok(departments)
    }
    pub async fn find_by_id(storage: &Storage, _id: i64) -> StoreResult<Option<Department>> {
        Ok(Self::collection(storage)
            .find_one(doc! { "_id": _id }, None)
            .await?)
    }
    pub async fn find_supervised_by(
        storage: &Storage,
        user_id: i64,
    ) -> StoreResult<Option<Department>> {
        Ok(Self::collection(storage)
            .find_one(doc! { "supervisor_id": user_id }, None)
            .await?)
    }

    async fn validate_references(&self, storage: &Storage) -> StoreResult<()> {
        if let Some(supervisor_id) = self.supervisor_id {
            if User::find_by_id(storage, supervisor_id).await?.is_none() {
                return Err(StoreError::validation(
                    "SUPERVISOR_NOT_FOUND",
                    format!("supervisor {supervisor_id} is not a known user"),
                ));
            }
        }
        if let Some(other) = Self::collection(storage)
            .find_one(doc! { "name": &self.name }, None)
            .await?
        {
            if other._id != self._id {
                return Err(StoreError::Duplicate {
                    code: "DEPARTMENT_ALREADY_EXIST",
                    message: name_taken(&self.name),
                });
            }
        }
        Ok(())
    }

    pub async fn upsert(
        storage: &Storage,
        _id: Option<i64>,
        request: DepartmentRequest,
    ) -> StoreResult<Department> {
        let collection = Self::collection(storage);

        match _id {
            None => {
                let mut department = request.into_department(0, DateTime::now())?;
                department.validate_references(storage).await?;
                department._id = Counter::next(storage, COLLECTION).await?;
                collection
                    .insert_one(&department, None)
                    .await
                    .map_err(StoreError::on_duplicate_key(
                        "DEPARTMENT_ALREADY_EXIST",
                        name_taken(&department.name),
                    ))?;
                tracing::info!(department_id = department._id, "department created");
                Ok(department)
            }
            Some(_id) => {
                let mut department = Self::find_by_id(storage, _id)
                    .await?
                    .ok_or_else(|| StoreError::not_found("department", _id))?;
                department.apply(request)?;
                department.validate_references(storage).await?;
                collection
                    .replace_one(doc! { "_id": _id }, &department, None)
                    .await
                    .map_err(StoreError::on_duplicate_key(
                        "DEPARTMENT_ALREADY_EXIST",
                        name_taken(&department.name),
                    ))?;
                tracing::info!(department_id = _id, "department updated");
                Ok(department)
            }
        }
    }

    /// Deletes the department, its hazard entries and their control measures.
    pub async fn delete_by_id(storage: &Storage, _id: i64) -> StoreResult<DepartmentDeletion> {
        let mut session = storage.start_session().await?;
        let result = Self::delete_cascade(storage, _id, &mut session).await;
        let deletion = storage.finish(&mut session, result).await?;
        tracing::info!(
            department_id = _id,
            hazard_entries = deletion.hazard_entries,
            control_measures = deletion.control_measures,
            "department deleted"
        );
        Ok(deletion)
    }

    async fn delete_cascade(
        storage: &Storage,
        _id: i64,
        session: &mut mongodb::ClientSession,
    ) -> StoreResult<DepartmentDeletion> {
        let entries = storage.collection::<Document>(hazard_entry::COLLECTION);
        let measures = storage.collection::<Document>(control_measure::COLLECTION);

        let entry_ids = entries
            .distinct_with_session("_id", doc! { "department_id": _id }, None, session)
            .await?;
        let control_measures = measures
            .delete_many_with_session(
                doc! { "hazard_entry_id": { "$in": entry_ids } },
                None,
                session,
            )
            .await?
            .deleted_count;
        let hazard_entries = entries
            .delete_many_with_session(doc! { "department_id": _id }, None, session)
            .await?
            .deleted_count;
        let departments = Self::collection(storage)
            .delete_one_with_session(doc! { "_id": _id }, None, session)
            .await?
            .deleted_count;

        if departments == 0 {
            return Err(StoreError::not_found("department", _id));
        }
        Ok(DepartmentDeletion {
            departments,
            hazard_entries,
            control_measures,
        })
    }
}
