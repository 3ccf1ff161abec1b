use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRequest, FromRequestParts, State},
    http::{Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use studyhub_core::content::{CardPatch, NewCard, NewTopic, TopicPatch, TopicUpdate};
use studyhub_core::identity::Registration;
use studyhub_core::{content, identity, peers, shares, CoreError, CoreResult};
use studyhub_shared::{CardId, RelationshipId, TopicId, UserId};
use studyhub_store::Database;

use crate::auth::AuthUser;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::rate_limit::{limit_by_ip, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub config: Arc<ServerConfig>,
    pub auth_limiter: RateLimiter,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let auth_limiter = RateLimiter::new(config.auth_rate_per_sec, config.auth_rate_burst);
        Self {
            db: Arc::new(Mutex::new(db)),
            config: Arc::new(config),
            auth_limiter,
        }
    }

    /// Run one core operation against the database. The lock is held for
    /// the duration of `f` only, never across an await point. Password
    /// hashing stays outside it (see `off_lock`).
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> CoreResult<T>) -> Result<T, ApiError> {
        let db = self
            .db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".into()))?;
        Ok(f(&db)?)
    }
}

/// JSON body extractor whose rejections use the API error format.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Payload<T>(pub T);

/// Path parameters, rejected the same way.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct PathParam<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
    } else {
        CorsLayer::new()
    };

    let credentials = Router::new()
        .route("/user/register", post(register))
        .route("/token", post(obtain_token))
        .layer(middleware::from_fn_with_state(
            state.auth_limiter.clone(),
            limit_by_ip,
        ));

    let api = Router::new()
        .merge(credentials)
        .route("/token/revoke", post(revoke_token))
        .route("/user/profile", get(get_profile).delete(delete_profile))
        // topics
        .route("/topics", get(list_topics).post(create_topic))
        .route(
            "/topics/{id}",
            get(retrieve_topic)
                .put(update_topic)
                .patch(patch_topic)
                .delete(delete_topic),
        )
        .route("/topics/{id}/share", post(share_topic))
        .route("/topics/{id}/shares", get(list_topic_shares))
        .route("/topics/{id}/revoke", post(revoke_share))
        .route("/topics/{id}/accesses", get(list_topic_accesses))
        // cards
        .route("/cards", get(list_cards).post(create_card))
        .route(
            "/cards/{id}",
            get(retrieve_card)
                .put(update_card)
                .patch(patch_card)
                .delete(delete_card),
        )
        // peers
        .route("/peers", get(list_peers))
        .route("/peers/search", post(search_peers))
        .route("/peers/request", post(send_peer_request))
        .route("/peers/requests", get(list_peer_requests))
        .route("/peers/{id}/accept", post(accept_peer_request))
        .route("/peers/{id}/reject", post(reject_peer_request))
        .route("/peers/{id}", axum::routing::delete(remove_peer))
        // shared with me
        .route("/shared-topics", get(list_shared_topics))
        .route("/shared-topics/{id}", get(retrieve_shared_topic))
        .route("/shared-topics/{id}/leave", post(leave_shared_topic))
        .route("/shared-cards/{id}", get(retrieve_shared_card));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct PeerTarget {
    peer_id: UserId,
}

#[derive(Deserialize)]
struct PeerRequestBody {
    user_id: UserId,
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
}

#[derive(Deserialize)]
struct CardFilter {
    topic: Option<TopicId>,
}

type ApiResult<T> = Result<T, ApiError>;

fn created<T: Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}

// ---------------------------------------------------------------------------
// Health / identity
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn register(
    State(state): State<AppState>,
    Payload(reg): Payload<Registration>,
) -> ApiResult<Response> {
    if !state.config.registration_open {
        return Err(CoreError::Forbidden("Registration is closed on this server".into()).into());
    }
    let user = off_lock(move || identity::prepare_account(&reg)).await?;
    let user = state.with_db(|db| identity::create_account(db, user))?;
    Ok(created(user))
}

async fn obtain_token(
    State(state): State<AppState>,
    Payload(creds): Payload<Credentials>,
) -> ApiResult<Json<identity::IssuedToken>> {
    let ttl = state.config.token_ttl();
    let account = state.with_db(|db| identity::find_account(db, &creds.username))?;
    let user_id = off_lock(move || identity::check_password(&account, &creds.password)).await?;
    let token = state.with_db(|db| identity::open_session(db, user_id, ttl))?;
    Ok(Json(token))
}

/// Run password hashing on the blocking pool, outside the database lock.
async fn off_lock<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("password task failed: {e}")))?;
    Ok(result?)
}

async fn revoke_token(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    state.with_db(|db| identity::logout(db, &user.token))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let profile = state.with_db(|db| identity::profile(db, user.id))?;
    Ok(Json(profile).into_response())
}

async fn delete_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<StatusCode> {
    state.with_db(|db| identity::delete_account(db, user.id))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

async fn list_topics(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let topics = state.with_db(|db| content::list_topics(db, user.id))?;
    Ok(Json(topics).into_response())
}

async fn create_topic(
    State(state): State<AppState>,
    user: AuthUser,
    Payload(new): Payload<NewTopic>,
) -> ApiResult<Response> {
    let topic = state.with_db(|db| content::create_topic(db, user.id, new))?;
    Ok(created(topic))
}

async fn retrieve_topic(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
) -> ApiResult<Response> {
    let topic = state.with_db(|db| content::retrieve_topic(db, user.id, id))?;
    Ok(Json(topic).into_response())
}

async fn update_topic(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
    Payload(update): Payload<TopicUpdate>,
) -> ApiResult<Response> {
    let topic = state.with_db(|db| content::update_topic(db, user.id, id, update))?;
    Ok(Json(topic).into_response())
}

async fn patch_topic(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
    Payload(patch): Payload<TopicPatch>,
) -> ApiResult<Response> {
    let topic = state.with_db(|db| content::patch_topic(db, user.id, id, patch))?;
    Ok(Json(topic).into_response())
}

async fn delete_topic(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
) -> ApiResult<StatusCode> {
    state.with_db(|db| content::delete_topic(db, user.id, id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn share_topic(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
    Payload(target): Payload<PeerTarget>,
) -> ApiResult<Response> {
    let grant = state.with_db(|db| shares::share(db, user.id, id, target.peer_id))?;
    if grant.created {
        Ok(created(grant))
    } else {
        Ok(Json(grant).into_response())
    }
}

async fn list_topic_shares(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
) -> ApiResult<Response> {
    let list = state.with_db(|db| shares::list_shares(db, user.id, id))?;
    Ok(Json(list).into_response())
}

async fn revoke_share(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
    Payload(target): Payload<PeerTarget>,
) -> ApiResult<StatusCode> {
    state.with_db(|db| shares::revoke(db, user.id, id, target.peer_id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_topic_accesses(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
) -> ApiResult<Response> {
    let log = state.with_db(|db| shares::access_log(db, user.id, id))?;
    Ok(Json(log).into_response())
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

async fn list_cards(
    State(state): State<AppState>,
    user: AuthUser,
    QueryParams(filter): QueryParams<CardFilter>,
) -> ApiResult<Response> {
    let cards = state.with_db(|db| content::list_cards(db, user.id, filter.topic))?;
    Ok(Json(cards).into_response())
}

async fn create_card(
    State(state): State<AppState>,
    user: AuthUser,
    Payload(new): Payload<NewCard>,
) -> ApiResult<Response> {
    let card = state.with_db(|db| content::create_card(db, user.id, new))?;
    Ok(created(card))
}

async fn retrieve_card(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<CardId>,
) -> ApiResult<Response> {
    let card = state.with_db(|db| content::retrieve_card(db, user.id, id))?;
    Ok(Json(card).into_response())
}

async fn update_card(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<CardId>,
    Payload(update): Payload<NewCard>,
) -> ApiResult<Response> {
    let card = state.with_db(|db| content::update_card(db, user.id, id, update))?;
    Ok(Json(card).into_response())
}

async fn patch_card(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<CardId>,
    Payload(patch): Payload<CardPatch>,
) -> ApiResult<Response> {
    let card = state.with_db(|db| content::patch_card(db, user.id, id, patch))?;
    Ok(Json(card).into_response())
}

async fn delete_card(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<CardId>,
) -> ApiResult<StatusCode> {
    state.with_db(|db| content::delete_card(db, user.id, id))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Peers
// ---------------------------------------------------------------------------

async fn list_peers(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let list = state.with_db(|db| peers::list_accepted(db, user.id))?;
    Ok(Json(list).into_response())
}

async fn search_peers(
    State(state): State<AppState>,
    user: AuthUser,
    Payload(body): Payload<SearchBody>,
) -> ApiResult<Response> {
    let found = state.with_db(|db| peers::search(db, user.id, &body.query))?;
    Ok(Json(found).into_response())
}

async fn send_peer_request(
    State(state): State<AppState>,
    user: AuthUser,
    Payload(body): Payload<PeerRequestBody>,
) -> ApiResult<Response> {
    let rel = state.with_db(|db| peers::send_request(db, user.id, body.user_id))?;
    Ok(created(rel))
}

async fn list_peer_requests(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let list = state.with_db(|db| peers::list_pending_incoming(db, user.id))?;
    Ok(Json(list).into_response())
}

async fn accept_peer_request(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<RelationshipId>,
) -> ApiResult<Response> {
    let rel = state.with_db(|db| peers::accept(db, user.id, id))?;
    Ok(Json(rel).into_response())
}

async fn reject_peer_request(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<RelationshipId>,
) -> ApiResult<Response> {
    let rel = state.with_db(|db| peers::reject(db, user.id, id))?;
    Ok(Json(rel).into_response())
}

async fn remove_peer(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<RelationshipId>,
) -> ApiResult<StatusCode> {
    state.with_db(|db| peers::remove(db, user.id, id))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Shared with me
// ---------------------------------------------------------------------------

async fn list_shared_topics(State(state): State<AppState>, user: AuthUser) -> ApiResult<Response> {
    let list = state.with_db(|db| shares::list_shared_with_me(db, user.id))?;
    Ok(Json(list).into_response())
}

async fn retrieve_shared_topic(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
) -> ApiResult<Response> {
    let topic = state.with_db(|db| shares::retrieve_shared(db, user.id, id))?;
    Ok(Json(topic).into_response())
}

async fn leave_shared_topic(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<TopicId>,
) -> ApiResult<StatusCode> {
    state.with_db(|db| shares::leave(db, user.id, id))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn retrieve_shared_card(
    State(state): State<AppState>,
    user: AuthUser,
    PathParam(id): PathParam<CardId>,
) -> ApiResult<Response> {
    let card = state.with_db(|db| shares::retrieve_shared_card(db, user.id, id))?;
    Ok(Json(card).into_response())
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        let db = Database::open_in_memory().unwrap();
        build_router(AppState::new(db, ServerConfig::default()))
    }

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Register and log in; returns (user id, token).
    async fn signup(app: &Router, name: &str) -> (String, String) {
        let (status, user) = call(
            app,
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "username": name, "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, token) = call(
            app,
            Method::POST,
            "/api/token",
            None,
            Some(json!({ "username": name, "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        (
            user["id"].as_str().unwrap().to_string(),
            token["access"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let app = app();
        let (status, body) = call(&app, Method::GET, "/api/topics", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = call(&app, Method::GET, "/api/topics", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = app();
        let (_, token) = signup(&app, "alice").await;
        let (status, body) = call(
            &app,
            Method::POST,
            "/api/topics",
            Some(&token),
            Some(json!({ "collapsed": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn logout_invalidates_token() {
        let app = app();
        let (_, token) = signup(&app, "alice").await;

        let (status, profile) = call(&app, Method::GET, "/api/user/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["username"], "alice");
        assert!(profile.get("password_hash").is_none());

        let (status, _) = call(&app, Method::POST, "/api/token/revoke", Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, "/api/user/profile", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn closed_registration_is_forbidden() {
        let db = Database::open_in_memory().unwrap();
        let config = ServerConfig {
            registration_open: false,
            ..ServerConfig::default()
        };
        let app = build_router(AppState::new(db, config));
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "username": "alice", "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn topic_and_card_crud() {
        let app = app();
        let (_, token) = signup(&app, "alice").await;
        let auth = Some(token.as_str());

        let (status, topic) = call(
            &app,
            Method::POST,
            "/api/topics",
            auth,
            Some(json!({ "name": "Rust", "cards": [{ "name": "ownership" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let topic_id = topic["id"].as_str().unwrap().to_string();
        assert_eq!(topic["cards"][0]["collapsed"], true);

        let (status, card) = call(
            &app,
            Method::POST,
            "/api/cards",
            auth,
            Some(json!({ "topic": topic_id, "name": "borrowing", "progress": 30 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let card_uri = format!("/api/cards/{}", card["id"].as_str().unwrap());

        let (status, _) = call(
            &app,
            Method::PATCH,
            &card_uri,
            auth,
            Some(json!({ "progress": 150 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, patched) = call(
            &app,
            Method::PATCH,
            &card_uri,
            auth,
            Some(json!({ "starred": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["starred"], true);
        assert_eq!(patched["progress"], 30);

        let (_, cards) = call(
            &app,
            Method::GET,
            &format!("/api/cards?topic={topic_id}"),
            auth,
            None,
        )
        .await;
        assert_eq!(cards.as_array().unwrap().len(), 2);

        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/api/topics/{topic_id}"),
            auth,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, &card_uri, auth, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn sharing_flow_over_http() {
        let app = app();
        let (alice_id, alice) = signup(&app, "alice").await;
        let (bob_id, bob) = signup(&app, "bob").await;
        let (_, eve) = signup(&app, "eve").await;

        // bob finds alice and asks to be peers
        let (status, found) = call(
            &app,
            Method::POST,
            "/api/peers/search",
            Some(&bob),
            Some(json!({ "query": "ali" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found[0]["id"], alice_id.as_str());

        let (status, req) = call(
            &app,
            Method::POST,
            "/api/peers/request",
            Some(&bob),
            Some(json!({ "user_id": alice_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(req["status"], "pending");
        let rel_id = req["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::POST,
            "/api/peers/request",
            Some(&alice),
            Some(json!({ "user_id": bob_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, incoming) = call(&app, Method::GET, "/api/peers/requests", Some(&alice), None).await;
        assert_eq!(incoming[0]["requester"]["username"], "bob");

        let (status, _) = call(
            &app,
            Method::POST,
            &format!("/api/peers/{rel_id}/accept"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, accepted) = call(
            &app,
            Method::POST,
            &format!("/api/peers/{rel_id}/accept"),
            Some(&alice),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["status"], "accepted");

        // alice shares a topic with bob
        let (_, topic) = call(
            &app,
            Method::POST,
            "/api/topics",
            Some(&alice),
            Some(json!({ "name": "Rust", "cards": [{ "name": "traits" }] })),
        )
        .await;
        let topic_id = topic["id"].as_str().unwrap().to_string();
        let card_id = topic["cards"][0]["id"].as_str().unwrap().to_string();

        let (status, grant) = call(
            &app,
            Method::POST,
            &format!("/api/topics/{topic_id}/share"),
            Some(&alice),
            Some(json!({ "peer_id": bob_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(grant["created"], true);

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/shared-topics/{topic_id}"),
            Some(&eve),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, shared) = call(
            &app,
            Method::GET,
            &format!("/api/shared-topics/{topic_id}"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(shared["owner"]["username"], "alice");
        assert_eq!(shared["cards"][0]["name"], "traits");

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/shared-cards/{card_id}"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, log) = call(
            &app,
            Method::GET,
            &format!("/api/topics/{topic_id}/accesses"),
            Some(&alice),
            None,
        )
        .await;
        let kinds: Vec<_> = log
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["access_type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["view_card", "view_topic"]);

        // removing the relationship cuts the share
        let (status, _) = call(
            &app,
            Method::DELETE,
            &format!("/api/peers/{rel_id}"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(
            &app,
            Method::GET,
            &format!("/api/shared-topics/{topic_id}"),
            Some(&bob),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, shared) = call(&app, Method::GET, "/api/shared-topics", Some(&bob), None).await;
        assert!(shared.as_array().unwrap().is_empty());
        let (_, peers) = call(&app, Method::GET, "/api/peers", Some(&alice), None).await;
        assert!(peers.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sharing_with_non_peer_is_forbidden() {
        let app = app();
        let (_, alice) = signup(&app, "alice").await;
        let (bob_id, _) = signup(&app, "bob").await;

        let (_, topic) = call(
            &app,
            Method::POST,
            "/api/topics",
            Some(&alice),
            Some(json!({ "name": "Rust" })),
        )
        .await;
        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/api/topics/{}/share", topic["id"].as_str().unwrap()),
            Some(&alice),
            Some(json!({ "peer_id": bob_id })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["error"].as_str().unwrap().contains("accepted peers"));
    }

    #[tokio::test]
    async fn login_is_rate_limited_per_client() {
        let db = Database::open_in_memory().unwrap();
        let config = ServerConfig {
            auth_rate_per_sec: 0.001,
            auth_rate_burst: 2.0,
            ..ServerConfig::default()
        };
        let app = build_router(AppState::new(db, config));

        let attempt = || {
            Request::builder()
                .method(Method::POST)
                .uri("/api/token")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::from(
                    json!({ "username": "nobody", "password": "whatever1" }).to_string(),
                ))
                .unwrap()
        };

        for _ in 0..2 {
            let res = app.clone().oneshot(attempt()).await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        }
        let res = app.clone().oneshot(attempt()).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn rotating_forwarded_header_does_not_reset_limit() {
        let db = Database::open_in_memory().unwrap();
        let config = ServerConfig {
            auth_rate_per_sec: 0.001,
            auth_rate_burst: 2.0,
            ..ServerConfig::default()
        };
        let app = build_router(AppState::new(db, config));
        let peer: std::net::SocketAddr = "192.0.2.10:51000".parse().unwrap();

        let mut limited = 0;
        for i in 0..6 {
            let mut req = Request::builder()
                .method(Method::POST)
                .uri("/api/token")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", format!("10.0.0.{i}"))
                .body(Body::from(
                    json!({ "username": "nobody", "password": "whatever1" }).to_string(),
                ))
                .unwrap();
            req.extensions_mut().insert(axum::extract::ConnectInfo(peer));

            let res = app.clone().oneshot(req).await.unwrap();
            if res.status() == StatusCode::TOO_MANY_REQUESTS {
                limited += 1;
            }
        }
        assert_eq!(limited, 4);
    }

    #[tokio::test]
    async fn unusable_token_lifetime_does_not_wedge_server() {
        let db = Database::open_in_memory().unwrap();
        let config = ServerConfig {
            token_ttl_secs: 1_000_000_000_000_000,
            ..ServerConfig::default()
        };
        let app = build_router(AppState::new(db, config));
        let creds = json!({ "username": "alice", "password": "correct horse" });

        let (status, _) =
            call(&app, Method::POST, "/api/user/register", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&app, Method::POST, "/api/token", None, Some(creds)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());

        // the database is still usable afterwards
        let (status, _) = call(
            &app,
            Method::POST,
            "/api/user/register",
            None,
            Some(json!({ "username": "bob", "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn malformed_ids_get_json_errors() {
        let app = app();
        let (_, token) = signup(&app, "alice").await;

        let (status, body) =
            call(&app, Method::GET, "/api/topics/not-a-uuid", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, body) =
            call(&app, Method::GET, "/api/cards?topic=nope", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
