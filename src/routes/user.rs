use actix_web::{delete, get, post, put, web, HttpResponse};

use super::store_error_response;
use crate::{
    database::Storage,
    models::user::{User, UserRequest, UserResponse},
};

#[get("/users")]
pub async fn get_users(storage: web::Data<Storage>) -> HttpResponse {
    match User::find_many(&storage).await {
        Ok(users) => HttpResponse::Ok().json(
            users
                .into_iter()
                .map(UserResponse::from)
                .collect::<Vec<UserResponse>>(),
        ),
        Err(error) => store_error_response(&error),
    }
}
#[post("/users")]
pub async fn create_user(
    storage: web::Data<Storage>,
    payload: web::Json<UserRequest>,
) -> HttpResponse {
    match User::upsert(&storage, None, payload.into_inner()).await {
        Ok(user) => HttpResponse::Created().json(UserResponse::from(user)),
        Err(error) => store_error_response(&error),
    }
}
#[put("/users/{user_id}")]
pub async fn update_user(
    storage: web::Data<Storage>,
    user_id: web::Path<String>,
    payload: web::Json<UserRequest>,
) -> HttpResponse {
    let user_id = match user_id.parse() {
        Ok(user_id) => user_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match User::upsert(&storage, Some(user_id), payload.into_inner()).await {
        Ok(user) => HttpResponse::Ok().json(UserResponse::from(user)),
        Err(error) => store_error_response(&error),
    }
}
#[delete("/users/{user_id}")]
pub async fn delete_user(storage: web::Data<Storage>, user_id: web::Path<String>) -> HttpResponse {
    let user_id = match user_id.parse() {
        Ok(user_id) => user_id,
        Err(_) => return HttpResponse::BadRequest().body("INVALID_ID"),
    };

    match User::delete_by_id(&storage, user_id).await {
        Ok(count) => HttpResponse::Ok().body(format!("Deleted {count} user")),
        Err(error) => store_error_response(&error),
    }
}
