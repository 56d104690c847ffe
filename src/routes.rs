use actix_web::http::StatusCode;
use actix_web::{get, patch, post, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::middleware::auth::verify_jwt;
use crate::models::{NewUser, UserPatch};
use crate::response::StdResponse;
use crate::services::ConversationUpdate;
use crate::state::AppState;
use crate::websocket::session::ws_handler;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(ws_handler)
        .service(create_user)
        .service(get_user)
        .service(update_user)
        .service(update_conversation)
        .route("/health", web::get().to(|| async { "OK" }));
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    name: String,
    phone: String,
    username: Option<String>,
    avatar: Option<String>,
    bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    name: Option<String>,
    avatar: Option<String>,
    bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateConversationRequest {
    name: Option<String>,
    image: Option<String>,
    description: Option<String>,
}

fn bearer_identity(req: &HttpRequest, secret: &str) -> Result<i64, AppError> {
    let token = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    let claims = verify_jwt(token, secret)?;
    claims.sub.parse().map_err(|_| AppError::Unauthorized)
}

fn ok_response<T: Serialize>(data: &T) -> HttpResponse {
    match serde_json::to_value(data) {
        Ok(value) => HttpResponse::Ok().json(StdResponse::success(value)),
        Err(e) => error_response(&AppError::Internal(format!("serialize response: {e}"))),
    }
}

fn error_response(err: &AppError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(StdResponse::failure(err))
}

/// Sign-up and sign-in collapsed into one call: a known phone gets its user
/// back, a new phone gets a fresh row.
#[post("/users")]
async fn create_user(
    state: web::Data<AppState>,
    body: web::Json<CreateUserRequest>,
) -> HttpResponse {
    let req = body.into_inner();

    match state.users.get_user_by_phone(&req.phone).await {
        Ok(existing) => return ok_response(&existing),
        Err(AppError::NotFound) => {}
        Err(e) => return error_response(&e),
    }

    let username = req.username.unwrap_or_else(|| req.name.to_lowercase());
    match state
        .users
        .create_user(NewUser {
            name: req.name,
            username,
            phone: req.phone,
            avatar: req.avatar,
            bio: req.bio,
        })
        .await
    {
        Ok(user) => ok_response(&user),
        Err(e) => error_response(&e),
    }
}

#[get("/users/{id}")]
async fn get_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> HttpResponse {
    if let Err(e) = bearer_identity(&req, &state.config.jwt_secret) {
        return error_response(&e);
    }

    match state.users.get_user_by_id(path.into_inner()).await {
        Ok(user) => ok_response(&user),
        Err(e) => error_response(&e),
    }
}

/// Profile update. Users can only change their own row.
#[patch("/users/{id}")]
async fn update_user(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> HttpResponse {
    let caller = match bearer_identity(&req, &state.config.jwt_secret) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let id = path.into_inner();
    if caller != id {
        return error_response(&AppError::Forbidden);
    }

    let patch = body.into_inner();
    match state
        .users
        .update_user(
            id,
            UserPatch {
                name: patch.name,
                avatar: patch.avatar,
                bio: patch.bio,
                last_online: None,
            },
        )
        .await
    {
        Ok(user) => ok_response(&user),
        Err(e) => error_response(&e),
    }
}

/// Conversation rename and re-description. Any participant may change these
/// fields; the activity timestamp is not one of them.
#[patch("/conversations/{id}")]
async fn update_conversation(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateConversationRequest>,
) -> HttpResponse {
    let caller = match bearer_identity(&req, &state.config.jwt_secret) {
        Ok(id) => id,
        Err(e) => return error_response(&e),
    };

    let update = body.into_inner();
    match state
        .engine
        .update_conversation(
            path.into_inner(),
            caller,
            ConversationUpdate {
                name: update.name,
                image: update.image,
                description: update.description,
            },
        )
        .await
    {
        Ok(view) => ok_response(&view),
        Err(e) => error_response(&e),
    }
}
