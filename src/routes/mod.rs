use actix_web::{get, web, HttpResponse};
use mime_guess::from_path;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::StoreError;

pub const HAZARD_PHOTO_DIR: &str = "./files/hazards";

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    HazardPhoto,
}

#[derive(Deserialize)]
pub struct FileQueryParams {
    pub kind: FileKind,
    pub name: String,
}

pub mod assist;
pub mod control_measure;
pub mod dashboard;
pub mod department;
pub mod hazard_entry;
pub mod user;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Maps a store failure to its status code. Client errors carry the code
/// and a readable message as JSON, the rest only the code.
pub fn store_error_response(error: &StoreError) -> HttpResponse {
    let mut response = match error {
        StoreError::NotFound { .. } => return HttpResponse::NotFound().body(error.code()),
        StoreError::Validation { .. } => HttpResponse::BadRequest(),
        StoreError::ReferentialIntegrity { .. } | StoreError::Duplicate { .. } => {
            HttpResponse::Conflict()
        }
        StoreError::StorageUnavailable(_)
        | StoreError::Serialization(_)
        | StoreError::Deserialization(_)
        | StoreError::IdAllocation(_) => {
            tracing::error!("{error}");
            return HttpResponse::InternalServerError().body(error.code());
        }
    };
    response.json(ErrorBody {
        code: error.code(),
        message: error.to_string(),
    })
}

/// Rejects names that could escape the storage directory.
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.contains('\\')
        && Path::new(name)
            .components()
            .all(|component| matches!(component, std::path::Component::Normal(_)))
}

#[get("/files")]
pub async fn get_file(query: web::Query<FileQueryParams>) -> HttpResponse {
    if !is_safe_file_name(&query.name) {
        return HttpResponse::BadRequest().body("INVALID_FILE_NAME");
    }
    let path = match query.kind {
        FileKind::HazardPhoto => format!("{HAZARD_PHOTO_DIR}/{}", query.name),
    };
    if let Ok(file) = fs::read(&path) {
        let mime = from_path(&path).first_or_octet_stream();
        HttpResponse::Ok().content_type(mime).body(file)
    } else {
        HttpResponse::NotFound().body("CONTENT_NOT_FOUND")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, App};

    #[test]
    fn file_names_stay_inside_the_directory() {
        assert!(is_safe_file_name("7/6650a1c2e4b0.jpg"));
        assert!(!is_safe_file_name("../config.yaml"));
        assert!(!is_safe_file_name("7/../../etc/passwd"));
        assert!(!is_safe_file_name("/etc/passwd"));
        assert!(!is_safe_file_name(""));
    }

    #[test]
    fn store_errors_map_to_statuses() {
        let missing = store_error_response(&StoreError::not_found("department", 3));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let invalid = store_error_response(&StoreError::validation("RATING_OUT_OF_RANGE", "x"));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn conflicts_carry_a_readable_message() {
        let conflict = store_error_response(&StoreError::ReferentialIntegrity {
            code: "USER_IS_SUPERVISOR",
            message: "user 3 supervises department `Maintenance`; reassign the supervisor first"
                .to_string(),
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let body = actix_web::body::to_bytes(conflict.into_body()).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            ErrorBody {
                code: "USER_IS_SUPERVISOR".to_string(),
                message: "user 3 supervises department `Maintenance`; reassign the supervisor first"
                    .to_string(),
            }
        );
    }

    #[actix_web::test]
    async fn traversal_is_refused() {
        let app = actix_test::init_service(App::new().service(get_file)).await;
        let req = actix_test::TestRequest::get()
            .uri("/files?kind=hazard_photo&name=..%2Fsecret.txt")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = actix_test::TestRequest::get()
            .uri("/files?kind=hazard_photo&name=404%2Fmissing.png")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
