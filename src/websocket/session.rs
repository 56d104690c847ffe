use std::sync::Arc;
use std::time::{Duration, Instant};

use actix::{Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::{verify_jwt, Claims};
use crate::services::UserService;
use crate::state::AppState;
use crate::websocket::gateway::Gateway;
use crate::websocket::{RoomRegistry, SessionId};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

// Message type for pushing frames to the WebSocket actor
#[derive(ActixMessage)]
#[rtype(result = "()")]
pub struct BroadcastMessage(pub String);

// WebSocket Actor
pub struct WsSession {
    user_id: i64,
    session_id: SessionId,
    registry: RoomRegistry,
    gateway: Arc<Gateway>,
    users: UserService,
    hb: Instant,
}

impl WsSession {
    fn new(
        user_id: i64,
        session_id: SessionId,
        registry: RoomRegistry,
        gateway: Arc<Gateway>,
        users: UserService,
    ) -> Self {
        Self {
            user_id,
            session_id,
            registry,
            gateway,
            users,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(Duration::from_secs(5), |act, ctx| {
            if Instant::now().duration_since(act.hb) > Duration::from_secs(30) {
                tracing::warn!(
                    "WebSocket heartbeat failed for user {}, disconnecting",
                    act.user_id
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("WebSocket session started for user {}", self.user_id);
        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("WebSocket session stopped for user {}", self.user_id);

        // Cleanup: pull the session out of every room and stamp last_online
        let registry = self.registry.clone();
        let session_id = self.session_id;
        let users = self.users.clone();
        let user_id = self.user_id;

        actix::spawn(async move {
            registry.deregister_session(session_id).await;
            if let Err(e) = users.touch_last_online(user_id).await {
                tracing::warn!(error = %e, "failed to stamp last_online for user {}", user_id);
            }
        });
    }
}

// Handle frames broadcast into this session's rooms
impl Handler<BroadcastMessage> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

// Handle WebSocket protocol messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                let gateway = self.gateway.clone();
                let user_id = self.user_id;
                let session_id = self.session_id;
                let addr = ctx.address();

                actix::spawn(async move {
                    let reply = gateway.dispatch(user_id, session_id, &text).await;
                    addr.do_send(BroadcastMessage(reply.to_json()));
                });
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("WebSocket close message received: {:?}", reason);
                ctx.stop();
            }
            _ => {}
        }
    }
}

// Token validation: query parameter or Authorization header
fn validate_ws_token(
    params: &WsParams,
    req: &HttpRequest,
    secret: &str,
) -> Result<Claims, actix_web::http::StatusCode> {
    let token = params.token.clone().or_else(|| {
        req.headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.to_string())
    });

    match token {
        None => {
            tracing::warn!("WebSocket connection rejected: no token provided");
            Err(actix_web::http::StatusCode::UNAUTHORIZED)
        }
        Some(t) => verify_jwt(&t, secret).map_err(|e| {
            tracing::warn!(error = %e, "WebSocket connection rejected: invalid token");
            actix_web::http::StatusCode::UNAUTHORIZED
        }),
    }
}

// HTTP handler
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    query: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let params = query.into_inner();

    // Authentication
    let claims = match validate_ws_token(&params, &req, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(status) => return Ok(HttpResponse::build(status).finish()),
    };

    let user_id: i64 = match claims.sub.parse() {
        Ok(id) => id,
        Err(_) => {
            tracing::warn!(sub = %claims.sub, "WebSocket connection rejected: bad subject");
            return Ok(HttpResponse::Unauthorized().finish());
        }
    };

    // A token for a user that no longer exists gets no session
    match state.users.get_user_by_id(user_id).await {
        Ok(_) => {}
        Err(AppError::NotFound) => return Ok(HttpResponse::Unauthorized().finish()),
        Err(e) => {
            tracing::error!(error = %e, "failed to load user for WebSocket session");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    }

    // Every conversation the user belongs to becomes a room subscription
    let rooms: Vec<i64> = match state.engine.get_conversation_list(user_id).await {
        Ok(list) => list.iter().map(|view| view.conversation.id).collect(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load rooms for WebSocket session");
            return Ok(HttpResponse::InternalServerError().finish());
        }
    };

    let (session_id, mut rx) = state.registry.register_session(user_id, &rooms).await;

    if let Err(e) = state.users.touch_last_online(user_id).await {
        tracing::warn!(error = %e, "failed to stamp last_online for user {}", user_id);
    }

    let session = WsSession::new(
        user_id,
        session_id,
        state.registry.clone(),
        state.gateway.clone(),
        state.users.clone(),
    );

    let (addr, resp) = ws::WsResponseBuilder::new(session, &req, stream).start_with_addr()?;

    // Bridge the registry's receiver into the actor. The loop ends once the
    // session deregisters and its last room sender drops.
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            addr.do_send(BroadcastMessage(frame));
        }
    });

    Ok(resp)
}
