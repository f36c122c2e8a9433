use actix_web::{delete, get, post, put, web, HttpResponse};

use super::store_error_response;
use crate::{
    database::Storage,
    models::{
        control_measure::{
            ControlMeasure, ControlMeasurePatch, ControlMeasureRequest, ControlMeasureResponse,
        },
        hazard_entry::{parse_code, HazardEntry},
    },
};

#[get("/hazard-entries/{entry_id}/control-measures")]
pub async fn get_control_measures(
    storage: web::Data<Storage>,
    entry_id: web::Path<String>,
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
    match ControlMeasure::find_by_hazard_entry(&storage, entry_id).await {
        Ok(measures) => HttpResponse::Ok().json(
            measures
                .into_iter()
                .map(ControlMeasureResponse::from)
                .collect::<Vec<ControlMeasureResponse>>(),
        ),
        Err(error) => store_error_response(&error),
    }
}
#[post("/hazard-entries/{entry_id}/control-measures")]
pub async fn create_control_measure(
    storage: web::Data<Storage>,
    entry_id: web::Path<String>,
    payload: web::Json<ControlMeasureRequest>,
) -> HttpResponse {
    let entry_id = match parse_code(&entry_id) {
        Some(entry_id) => entry_id,
        None => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match ControlMeasure::save(&storage, entry_id, payload.into_inner()).await {
        Ok(measure) => HttpResponse::Created().json(ControlMeasureResponse::from(measure)),
        Err(error) => store_error_response(&error),
    }
}
#[put("/control-measures/{measure_id}")]
pub async fn update_control_measure(
    storage: web::Data<Storage>,
    measure_id: web::Path<String>,
    payload: web::Json<ControlMeasurePatch>,
) -> HttpResponse {
    let measure_id = match measure_id.parse() {
        Ok(measure_id) => measure_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match ControlMeasure::update(&storage, measure_id, payload.into_inner()).await {
        Ok(measure) => HttpResponse::Ok().json(ControlMeasureResponse::from(measure)),
        Err(error) => store_error_response(&error),
    }
}
#[delete("/control-measures/{measure_id}")]
pub async fn delete_control_measure(
    storage: web::Data<Storage>,
    measure_id: web::Path<String>,
) -> HttpResponse {
    let measure_id = match measure_id.parse() {
        Ok(measure_id) => measure_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match ControlMeasure::delete_by_id(&storage, measure_id).await {
        Ok(count) => HttpResponse::Ok().body(format!("Deleted {count} control measure")),
        Err(error) => store_error_response(&error),
    }
}
