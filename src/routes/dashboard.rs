use actix_web::{get, web, HttpResponse};

use crate::{database::Storage, models::hazard_entry::HazardEntry, risk};

/// KPIs and chart buckets, recomputed from the full register on every call.
#[get("/dashboard")]
pub async fn get_dashboard(storage: web::Data<Storage>) -> HttpResponse {
    let entries = HazardEntry::find_many_or_empty(&storage).await;
    HttpResponse::Ok().json(risk::dashboard_data(&entries))
}
