use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use safetysight::{
    assist::{GeminiAssist, HazardAssist},
    config, database, routes, telemetry,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = config::build_config(std::env::args())?;
    telemetry::initialize_telemetry(&settings.telemetry)?;

    let storage = database::connect(&settings.database).await?;
    let assist: Arc<dyn HazardAssist> = Arc::new(GeminiAssist::new(&settings.assist)?);
    if settings.assist.api_key.is_empty() {
        tracing::warn!("assist.api_key is empty; hazardous event suggestions will fail");
    }

    tracing::info!(
        host = %settings.server.host,
        port = settings.server.port,
        "starting SafetySight server"
    );
    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_header()
            .allow_any_method()
            .max_age(86400);

        App::new()
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .app_data(web::Data::new(storage.clone()))
            .app_data(web::Data::from(assist.clone()))
            .service(routes::get_file)
            .service(routes::user::get_users)
            .service(routes::user::create_user)
            .service(routes::user::update_user)
            .service(routes::user::delete_user)
            .service(routes::department::get_departments)
            .service(routes::department::create_department)
            .service(routes::department::update_department)
            .service(routes::department::delete_department)
            .service(routes::hazard_entry::get_hazard_entries)
            .service(routes::hazard_entry::create_hazard_entry)
            .service(routes::hazard_entry::get_hazard_entry)
            .service(routes::hazard_entry::update_hazard_entry)
            .service(routes::hazard_entry::delete_hazard_entry)
            .service(routes::hazard_entry::update_hazard_photo)
            .service(routes::control_measure::get_control_measures)
            .service(routes::control_measure::create_control_measure)
            .service(routes::control_measure::update_control_measure)
            .service(routes::control_measure::delete_control_measure)
            .service(routes::dashboard::get_dashboard)
            .service(routes::assist::suggest_hazardous_event)
            .service(routes::assist::suggest_hazardous_event_upload)
    })
    .bind((settings.server.host.clone(), settings.server.port))?
    .run()
    .await?;
    Ok(())
}
