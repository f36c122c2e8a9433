use std::{fs::create_dir_all, path::PathBuf};

use actix_multipart::form::{tempfile::TempFile, MultipartForm};
use actix_web::{delete, get, post, put, web, HttpResponse};
use mime_guess::get_mime_extensions_str;
use mongodb::bson::oid::ObjectId;

use super::{store_error_response, HAZARD_PHOTO_DIR};
use crate::{
    database::Storage,
    models::hazard_entry::{
        parse_code, HazardEntry, HazardEntryPatch, HazardEntryRequest, HazardEntryResponse,
    },
};

#[derive(Debug, MultipartForm)]
pub struct HazardPhotoMultipartRequest {
    #[multipart(rename = "file")]
    pub file: TempFile,
}

#[get("/hazard-entries")]
pub async fn get_hazard_entries(storage: web::Data<Storage>) -> HttpResponse {
    let entries = HazardEntry::find_many_or_empty(&storage).await;
    HttpResponse::Ok().json(
        entries
            .into_iter()
            .map(HazardEntryResponse::from)
            .collect::<Vec<HazardEntryResponse>>(),
    )
}
#[get("/hazard-entries/{entry_id}")]
pub async fn get_hazard_entry(
    storage: web::Data<Storage>,
    entry_id: web::Path<String>,
) -> HttpResponse {
    let entry_id = match parse_code(&entry_id) {
        Some(entry_id) => entry_id,
        None => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match HazardEntry::find_by_id(&storage, entry_id).await {
        Ok(Some(entry)) => HttpResponse::Ok().json(HazardEntryResponse::from(entry)),
        Ok(None) => HttpResponse::NotFound().body("HAZARD_ENTRY_NOT_FOUND"),
        Err(error) => store_error_response(&error),
    }
}
#[post("/hazard-entries")]
pub async fn create_hazard_entry(
    storage: web::Data<Storage>,
    payload: web::Json<HazardEntryRequest>,
) -> HttpResponse {
    match HazardEntry::save(&storage, payload.into_inner()).await {
        Ok(entry) => HttpResponse::Created().json(HazardEntryResponse::from(entry)),
        Err(error) => store_error_response(&error),
    }
}
#[put("/hazard-entries/{entry_id}")]
pub async fn update_hazard_entry(
    storage: web::Data<Storage>,
    entry_id: web::Path<String>,
    payload: web::Json<HazardEntryPatch>,
) -> HttpResponse {
    let entry_id = match parse_code(&entry_id) {
        Some(entry_id) => entry_id,
        None => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match HazardEntry::update(&storage, entry_id, payload.into_inner()).await {
        Ok(entry) => HttpResponse::Ok().json(HazardEntryResponse::from(entry)),
        Err(error) => store_error_response(&error),
    }
}
#[delete("/hazard-entries/{entry_id}")]
pub async fn delete_hazard_entry(
    storage: web::Data<Storage>,
    entry_id: web::Path<String>,
) -> HttpResponse {
    let entry_id = match parse_code(&entry_id) {
        Some(entry_id) => entry_id,
        None => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match HazardEntry::delete_by_id(&storage, entry_id).await {
        Ok(deletion) => HttpResponse::Ok().json(deletion),
        Err(error) => store_error_response(&error),
    }
}
#[put("/hazard-entries/{entry_id}/photo")]
pub async fn update_hazard_photo(
    storage: web::Data<Storage>,
    entry_id: web::Path<String>,
    form: MultipartForm<HazardPhotoMultipartRequest>,
) -> HttpResponse {
    let entry_id = match parse_code(&entry_id) {
        Some(entry_id) => entry_id,
        None => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match HazardEntry::find_by_id(&storage, entry_id).await {
        Ok(Some(_)) => (),
        Ok(None) => return HttpResponse::NotFound().body("HAZARD_ENTRY_NOT_FOUND"),
        Err(error) => return store_error_response(&error),
    }

    let essence = match &form.file.content_type {
        Some(mime) if mime.type_() == mime_guess::mime::IMAGE => mime.essence_str().to_string(),
        _ => return HttpResponse::BadRequest().body("HAZARD_PHOTO_INVALID_MIME"),
    };
    let ext = match get_mime_extensions_str(&essence).and_then(|ext| ext.first()) {
        Some(ext) => *ext,
        None => return HttpResponse::BadRequest().body("HAZARD_PHOTO_INVALID_MIME"),
    };

    let save_dir = format!("{HAZARD_PHOTO_DIR}/{entry_id}/");
    if create_dir_all(&save_dir).is_err() {
        return HttpResponse::InternalServerError().body("DIRECTORY_CREATION_FAILED");
    }

    let name = format!("{entry_id}/{}.{ext}", ObjectId::new());
    let file_path = PathBuf::from(format!("{HAZARD_PHOTO_DIR}/{name}"));
    if let Err(error) = std::fs::copy(form.file.file.path(), &file_path) {
        tracing::error!(hazard_entry_id = entry_id, "storing photo failed: {error}");
        return HttpResponse::InternalServerError().body("HAZARD_PHOTO_STORE_FAILED");
    }

    let photo_url = format!("/files?kind=hazard_photo&name={name}");
    match HazardEntry::set_photo_url(&storage, entry_id, &photo_url).await {
        Ok(()) => HttpResponse::Ok().body(photo_url),
        Err(error) => {
            let _ = std::fs::remove_file(&file_path);
            store_error_response(&error)
        }
    }
}
