use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::Deserialize;

use super::store_error_response;
use crate::{
    database::Storage,
    models::department::{Department, DepartmentRequest, DepartmentResponse},
};

#[derive(Deserialize)]
pub struct DepartmentQueryParams {
    #[serde(default)]
    pub include_supervisor: bool,
}

#[get("/departments")]
pub async fn get_departments(
    storage: web::Data<Storage>,
    query: web::Query<DepartmentQueryParams>,
) -> HttpResponse {
    match Department::find_many(&storage, query.include_supervisor).await {
        Ok(departments) => HttpResponse::Ok().json(departments),
        Err(error) => store_error_response(&error),
    }
}
#[post("/departments")]
pub async fn create_department(
    storage: web::Data<Storage>,
    payload: web::Json<DepartmentRequest>,
) -> HttpResponse {
    match Department::upsert(&storage, None, payload.into_inner()).await {
        Ok(department) => HttpResponse::Created().json(DepartmentResponse::from(department)),
        Err(error) => store_error_response(&error),
    }
}
#[put("/departments/{department_id}")]
pub async fn update_department(
    storage: web::Data<Storage>,
    department_id: web::Path<String>,
    payload: web::Json<DepartmentRequest>,
) -> HttpResponse {
    let department_id = match department_id.parse() {
        Ok(department_id) => department_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Department::upsert(&storage, Some(department_id), payload.into_inner()).await {
        Ok(department) => HttpResponse::Ok().json(DepartmentResponse::from(department)),
        Err(error) => store_error_response(&error),
    }
}
#[delete("/departments/{department_id}")]
pub async fn delete_department(
    storage: web::Data<Storage>,
    department_id: web::Path<String>,
) -> HttpResponse {
    let department_id = match department_id.parse() {
        Ok(department_id) => department_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match Department::delete_by_id(&storage, department_id).await {
        Ok(deletion) => HttpResponse::Ok().json(deletion),
        Err(error) => store_error_response(&error),
    }
}
