use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use actix_web::{post, web, HttpResponse};

use crate::assist::{encode_data_uri, AssistError, AssistRequest, HazardAssist};

#[derive(Debug, MultipartForm)]
pub struct AssistMultipartRequest {
    #[multipart(rename = "file")]
    pub file: TempFile,
    pub description: Text<String>,
}

fn assist_error_response(error: &AssistError) -> HttpResponse {
    match error {
        AssistError::InvalidPhoto(_) => HttpResponse::BadRequest().body(error.code()),
        _ => {
            tracing::error!("{error}");
            HttpResponse::BadGateway().body(error.code())
        }
    }
}

/// Picks the upload's declared type when it is an image, otherwise guesses
/// from the file name.
pub fn photo_mime_type(content_type: Option<&str>, file_name: Option<&str>) -> Option<String> {
    if let Some(content_type) = content_type.filter(|mime| mime.starts_with("image/")) {
        return Some(content_type.to_string());
    }
    file_name
        .and_then(|name| mime_guess::from_path(name).first())
        .filter(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .map(|mime| mime.essence_str().to_string())
}

#[post("/assist/hazardous-event")]
pub async fn suggest_hazardous_event(
    assist: web::Data<dyn HazardAssist>,
    payload: web::Json<AssistRequest>,
) -> HttpResponse {
    match assist.suggest_hazardous_event(&payload).await {
        Ok(suggestion) => HttpResponse::Ok().json(suggestion),
        Err(error) => assist_error_response(&error),
    }
}
#[post("/assist/hazardous-event/upload")]
pub async fn suggest_hazardous_event_upload(
    assist: web::Data<dyn HazardAssist>,
    form: MultipartForm<AssistMultipartRequest>,
) -> HttpResponse {
    let form = form.into_inner();
    let mime_type = match photo_mime_type(
        form.file.content_type.as_ref().map(|mime| mime.essence_str()),
        form.file.file_name.as_deref(),
    ) {
        Some(mime_type) => mime_type,
        None => return HttpResponse::BadRequest().body("INVALID_PHOTO"),
    };
    let bytes = match std::fs::read(form.file.file.path()) {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("reading uploaded photo failed: {error}");
            return HttpResponse::InternalServerError().body("PHOTO_READ_FAILED");
        }
    };

    let request = AssistRequest {
        photo: encode_data_uri(&mime_type, &bytes),
        description: form.description.into_inner(),
    };
    match assist.suggest_hazardous_event(&request).await {
        Ok(suggestion) => HttpResponse::Ok().json(suggestion),
        Err(error) => assist_error_response(&error),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::{http::StatusCode, test as actix_test, App};
    use async_trait::async_trait;

    use super::*;
    use crate::assist::{parse_data_uri, AssistResponse};

    struct EchoAssist;

    #[async_trait]
    impl HazardAssist for EchoAssist {
        async fn suggest_hazardous_event(
            &self,
            request: &AssistRequest,
        ) -> Result<AssistResponse, AssistError> {
            parse_data_uri(&request.photo)?;
            Ok(AssistResponse {
                suggested_event: format!("Event for: {}", request.description),
            })
        }
    }

    struct BrokenAssist;

    #[async_trait]
    impl HazardAssist for BrokenAssist {
        async fn suggest_hazardous_event(
            &self,
            _request: &AssistRequest,
        ) -> Result<AssistResponse, AssistError> {
            Err(AssistError::MalformedOutput("no text candidate".to_string()))
        }
    }

    fn assist_data(assist: Arc<dyn HazardAssist>) -> web::Data<dyn HazardAssist> {
        web::Data::from(assist)
    }

    #[actix_web::test]
    async fn suggestion_is_returned_as_json() {
        let app = actix_test::init_service(
            App::new()
                .app_data(assist_data(Arc::new(EchoAssist)))
                .service(suggest_hazardous_event),
        )
        .await;
        let req = actix_test::TestRequest::post()
            .uri("/assist/hazardous-event")
            .set_json(AssistRequest {
                photo: encode_data_uri("image/jpeg", b"jpeg-bytes"),
                description: "Exposed wiring".to_string(),
            })
            .to_request();
        let resp: AssistResponse = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.suggested_event, "Event for: Exposed wiring");
    }

    #[actix_web::test]
    async fn invalid_photo_is_a_client_error() {
        let app = actix_test::init_service(
            App::new()
                .app_data(assist_data(Arc::new(EchoAssist)))
                .service(suggest_hazardous_event),
        )
        .await;
        let req = actix_test::TestRequest::post()
            .uri("/assist/hazardous-event")
            .set_json(AssistRequest {
                photo: "not a data uri".to_string(),
                description: "Exposed wiring".to_string(),
            })
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn service_failures_propagate() {
        let app = actix_test::init_service(
            App::new()
                .app_data(assist_data(Arc::new(BrokenAssist)))
                .service(suggest_hazardous_event),
        )
        .await;
        let req = actix_test::TestRequest::post()
            .uri("/assist/hazardous-event")
            .set_json(AssistRequest {
                photo: encode_data_uri("image/png", b"png"),
                description: "Wet floor".to_string(),
            })
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = actix_test::read_body(resp).await;
        assert_eq!(body, "ASSIST_OUTPUT_MALFORMED");
    }

    #[test]
    fn mime_type_prefers_declared_image_type() {
        assert_eq!(
            photo_mime_type(Some("image/webp"), Some("shot.png")).as_deref(),
            Some("image/webp")
        );
        assert_eq!(
            photo_mime_type(Some("application/octet-stream"), Some("shot.png")).as_deref(),
            Some("image/png")
        );
        assert_eq!(photo_mime_type(None, Some("notes.txt")), None);
        assert_eq!(photo_mime_type(None, None), None);
    }
}
