use std::sync::OnceLock;

use futures::stream::StreamExt;
use mongodb::{
    bson::{doc, DateTime},
    options::FindOptions,
    Collection,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{counter::Counter, department::Department};
use crate::{
    database::Storage,
    error::{StoreError, StoreResult},
};

pub const COLLECTION: &str = "users";

fn email_taken(email: &str) -> String {
    format!("a user with email `{email}` already exists")
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum UserRole {
    Administrator,
    #[serde(rename = "Safety Officer")]
    SafetyOfficer,
    Viewer,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    pub _id: i64,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime,
}
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
}
#[derive(Debug, Deserialize, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user._id,
            name: user.name,
            email: user.email,
            role: user.role,
            created_at: user.created_at.try_to_rfc3339_string().unwrap_or_default(),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(
            r"^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([\-\.]{1}[a-z0-9]+)*\.[a-z]{2,6})$",
        )
        .expect("email pattern compiles")
    })
}

/// Lowercases and checks an email address.
pub fn normalize_email(email: &str) -> StoreResult<String> {
    let email = email.trim().to_lowercase();
    if email_pattern().is_match(&email) {
        Ok(email)
    } else {
        Err(StoreError::validation(
            "USER_MUST_HAVE_VALID_EMAIL",
            format!("`{email}` is not a valid email address"),
        ))
    }
}

fn require_name(name: String) -> StoreResult<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        Err(StoreError::validation(
            "USER_MUST_HAVE_NAME",
            "user name must not be empty",
        ))
    } else {
        Ok(name)
    }
}

impl UserRequest {
    /// Builds a new user; every field is required on insert.
    pub fn into_user(self, _id: i64, created_at: DateTime) -> StoreResult<User> {
        let name = match self.name {
            Some(name) => require_name(name)?,
            None => {
                return Err(StoreError::validation(
                    "USER_MUST_HAVE_NAME",
                    "user name is required",
                ))
            }
        };
        let email = match self.email {
            Some(email) => normalize_email(&email)?,
            None => {
                return Err(StoreError::validation(
                    "USER_MUST_HAVE_VALID_EMAIL",
                    "user email is required",
                ))
            }
        };
        let role = self.role.ok_or_else(|| {
            StoreError::validation("USER_MUST_HAVE_ROLE", "user role is required")
        })?;

        Ok(User {
            _id,
            name,
            email,
            role,
            created_at,
        })
    }
}

impl User {
    fn collection(storage: &Storage) -> Collection<User> {
        storage.collection::<User>(COLLECTION)
    }

    /// Overwrites the fields present in `request`, keeping the rest.
    pub fn apply(&mut self, request: UserRequest) -> StoreResult<()> {
        if let Some(name) = request.name {
            self.name = require_name(name)?;
        }
        if let Some(email) = request.email {
            self.email = normalize_email(&email)?;
        }
        if let Some(role) = request.role {
            self.role = role;
        }
        Ok(())
    }

    pub async fn find_many(storage: &Storage) -> StoreResult<Vec<User>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .build();

        let mut cursor = Self::collection(storage).find(None, options).await?;
        let mut users: Vec<User> = Vec::new();
        while let Some(user) = cursor.next().await {
            users.push(user?);
        }
        Ok(users)
    }
    pub async fn find_by_id(storage: &Storage, _id: i64) -> StoreResult<Option<User>> {
        Ok(Self::collection(storage)
            .find_one(doc! { "_id": _id }, None)
            .await?)
    }
    pub async fn find_by_email(storage: &Storage, email: &str) -> StoreResult<Option<User>> {
        Ok(Self::collection(storage)
            .find_one(doc! { "email": email }, None)
            .await?)
    }

    async fn ensure_email_free(storage: &Storage, email: &str, owner: Option<i64>) -> StoreResult<()> {
        match Self::find_by_email(storage, email).await? {
            Some(user) if Some(user._id) != owner => Err(StoreError::Duplicate {
                code: "USER_ALREADY_EXIST",
                message: email_taken(email),
            }),
            _ => Ok(()),
        }
    }

    /// Inserts when `_id` is `None`, otherwise merges `request` into the
    /// stored user and replaces it.
    pub async fn upsert(
        storage: &Storage,
        _id: Option<i64>,
        request: UserRequest,
    ) -> StoreResult<User> {
        let collection = Self::collection(storage);

        match _id {
            None => {
                if let Some(email) = &request.email {
                    Self::ensure_email_free(storage, &normalize_email(email)?, None).await?;
                }
                let mut user = request.into_user(0, DateTime::now())?;
                user._id = Counter::next(storage, COLLECTION).await?;
                collection
                    .insert_one(&user, None)
                    .await
                    .map_err(StoreError::on_duplicate_key(
                        "USER_ALREADY_EXIST",
                        email_taken(&user.email),
                    ))?;
                tracing::info!(user_id = user._id, "user created");
                Ok(user)
            }
            Some(_id) => {
                let mut user = Self::find_by_id(storage, _id)
                    .await?
                    .ok_or_else(|| StoreError::not_found("user", _id))?;
                user.apply(request)?;
                Self::ensure_email_free(storage, &user.email, Some(_id)).await?;
                collection
                    .replace_one(doc! { "_id": _id }, &user, None)
                    .await
                    .map_err(StoreError::on_duplicate_key(
                        "USER_ALREADY_EXIST",
                        email_taken(&user.email),
                    ))?;
                tracing::info!(user_id = _id, "user updated");
                Ok(user)
            }
        }
    }

    /// Deletes a user unless a department names them as supervisor.
    pub async fn delete_by_id(storage: &Storage, _id: i64) -> StoreResult<u64> {
        if let Some(department) = Department::find_supervised_by(storage, _id).await? {
            tracing::warn!(
                user_id = _id,
                department_id = department._id,
                "refusing to delete a department supervisor"
            );
            return Err(StoreError::ReferentialIntegrity {
                code: "USER_IS_SUPERVISOR",
                message: format!(
                    "user {_id} supervises department `{}`; reassign the supervisor first",
                    department.name
                ),
            });
        }

        let result = Self::collection(storage)
            .delete_one(doc! { "_id": _id }, None)
            .await?;
        if result.deleted_count == 0 {
            return Err(StoreError::not_found("user", _id));
        }
        tracing::info!(user_id = _id, "user deleted");
        Ok(result.deleted_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, role: UserRole) -> UserRequest {
        UserRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            role: Some(role),
        }
    }

    #[test]
    fn insert_requires_every_field() {
        let missing_role = UserRequest {
            role: None,
            ..request("Ana Reyes", "ana@plant.ph", UserRole::Viewer)
        };
        let error = missing_role.into_user(1, DateTime::now()).unwrap_err();
        assert_eq!(error.code(), "USER_MUST_HAVE_ROLE");

        let error = UserRequest::default()
            .into_user(1, DateTime::now())
            .unwrap_err();
        assert_eq!(error.code(), "USER_MUST_HAVE_NAME");
    }

    #[test]
    fn emails_are_normalized_and_checked() {
        let user = request("Ana Reyes", " Ana.Reyes@Plant.PH ", UserRole::SafetyOfficer)
            .into_user(3, DateTime::now())
            .unwrap();
        assert_eq!(user.email, "ana.reyes@plant.ph");
        assert_eq!(user._id, 3);

        let error = normalize_email("not-an-email").unwrap_err();
        assert_eq!(error.code(), "USER_MUST_HAVE_VALID_EMAIL");
    }

    #[test]
    fn update_keeps_unsupplied_fields() {
        let mut user = request("Ana Reyes", "ana@plant.ph", UserRole::Viewer)
            .into_user(1, DateTime::now())
            .unwrap();
        user.apply(UserRequest {
            role: Some(UserRole::Administrator),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(user.name, "Ana Reyes");
        assert_eq!(user.email, "ana@plant.ph");
        assert_eq!(user.role, UserRole::Administrator);
    }

    #[test]
    fn roles_use_display_names() {
        assert_eq!(
            serde_json::to_string(&UserRole::SafetyOfficer).unwrap(),
            r#""Safety Officer""#
        );
        assert!(serde_json::from_str::<UserRole>(r#""Owner""#).is_err());
    }
}
