//! HTTP routes over the redemption engine.

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use loyalty_common::error::{Error, ErrorFamily};
use loyalty_common::models::{Actor, RedemptionStatus, RewardType};
use loyalty_core::services::ConfirmRequest;

use crate::context::AppContext;
use crate::identity::{PartnerIdentity, UserIdentity};

const DEFAULT_PAGE: i64 = 20;
const MAX_PAGE: i64 = 100;

pub fn router(ctx: AppContext) -> Router {
    let user_routes = Router::new()
        .route("/rewards", get(list_rewards))
        .route("/rewards/{reward_id}/reserve", post(reserve))
        .route("/points/balance", get(balance))
        .route("/points/history", get(points_history))
        .route("/redemptions", get(list_redemptions))
        .route("/redemptions/{id}", get(get_redemption))
        .route("/redemptions/{id}/token", post(reissue_token))
        .route("/redemptions/{id}/cancel", post(user_cancel));

    let partner_routes = Router::new()
        .route("/scan", post(scan))
        .route("/redemptions/{id}/calculate", post(calculate))
        .route("/redemptions/{id}/confirm", post(confirm))
        .route("/redemptions/{id}/cancel", post(partner_cancel))
        .route("/history", get(partner_history));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1", user_routes)
        .nest("/api/v1/partner", partner_routes)
        .with_state(ctx)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

// ------------------------------------------------------------------
// Errors
// ------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    MissingIdentity(&'static str),
    BadRequest(String),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err.family() {
        ErrorFamily::Authorization => match err {
            Error::PartnerMismatch(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        },
        ErrorFamily::Validation | ErrorFamily::Balance => StatusCode::BAD_REQUEST,
        ErrorFamily::Eligibility => match err {
            Error::RewardOrgRestricted => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        },
        ErrorFamily::Inventory | ErrorFamily::State => StatusCode::CONFLICT,
        ErrorFamily::NotFound => StatusCode::NOT_FOUND,
        ErrorFamily::System => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Core(e) => {
                let status = status_for(e);
                if status.is_server_error() {
                    error!("request failed: {:?}", e);
                } else {
                    debug!("request rejected: {} ({})", e, e.code());
                }
                (status, e.code(), e.to_string())
            }
            ApiError::MissingIdentity(header) => (
                StatusCode::UNAUTHORIZED,
                "AUTH-001",
                format!("missing {} header", header),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "VAL-001", msg.clone()),
        };

        let body = json!({
            "success": false,
            "error": { "code": code, "message": message },
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Response, ApiError>;

fn ok<T: Serialize>(status: StatusCode, data: T) -> ApiResult {
    Ok((status, Json(json!({ "success": true, "data": data }))).into_response())
}

/// Unparseable ids can never match a stored redemption.
fn redemption_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| Error::RedemptionNotFound(raw.to_string()).into())
}

/// An empty body deserializes to the type's default.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (
        limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE),
        offset.unwrap_or(0).max(0),
    )
}

// ------------------------------------------------------------------
// User routes
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RewardQuery {
    #[serde(rename = "type")]
    reward_type: Option<RewardType>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_rewards(
    State(ctx): State<AppContext>,
    user: UserIdentity,
    query: Result<Query<RewardQuery>, QueryRejection>,
) -> ApiResult {
    let Query(q) = query?;
    let (limit, offset) = page(q.limit, q.offset);
    let rewards = ctx
        .service
        .catalog()
        .list_available(user.org_id.as_deref(), q.reward_type, limit, offset, Utc::now())
        .await?;
    ok(StatusCode::OK, rewards)
}

async fn reserve(
    State(ctx): State<AppContext>,
    user: UserIdentity,
    Path(reward_id): Path<String>,
) -> ApiResult {
    let receipt = ctx
        .service
        .reserve(&user.user_id, user.org_id.as_deref(), &reward_id)
        .await?;
    ok(StatusCode::CREATED, receipt)
}

async fn balance(State(ctx): State<AppContext>, user: UserIdentity) -> ApiResult {
    let balance = ctx.service.ledger().get_balance(&user.user_id).await?;
    ok(StatusCode::OK, balance)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn points_history(
    State(ctx): State<AppContext>,
    user: UserIdentity,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult {
    let Query(q) = query?;
    let (limit, _) = page(q.limit, None);
    let entries = ctx.service.ledger().history(&user.user_id, limit).await?;
    ok(StatusCode::OK, entries)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedemptionQuery {
    status: Option<RedemptionStatus>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_redemptions(
    State(ctx): State<AppContext>,
    user: UserIdentity,
    query: Result<Query<RedemptionQuery>, QueryRejection>,
) -> ApiResult {
    let Query(q) = query?;
    let (limit, offset) = page(q.limit, q.offset);
    let redemptions = ctx
        .service
        .list_user_redemptions(&user.user_id, q.status, limit, offset)
        .await?;
    ok(StatusCode::OK, redemptions)
}

async fn get_redemption(
    State(ctx): State<AppContext>,
    user: UserIdentity,
    Path(id): Path<String>,
) -> ApiResult {
    let id = redemption_id(&id)?;
    let redemption = ctx.service.get_user_redemption(&user.user_id, id).await?;
    ok(StatusCode::OK, redemption)
}

async fn reissue_token(
    State(ctx): State<AppContext>,
    user: UserIdentity,
    Path(id): Path<String>,
) -> ApiResult {
    let id = redemption_id(&id)?;
    let issued = ctx.service.reissue_token(id, &user.user_id).await?;
    ok(
        StatusCode::OK,
        json!({ "redemptionId": id, "token": issued.token, "tokenExpiresAt": issued.expires_at }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody {
    reason: Option<String>,
}

async fn user_cancel(
    State(ctx): State<AppContext>,
    user: UserIdentity,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let id = redemption_id(&id)?;
    let CancelBody { reason } = optional_body(&body)?;
    let receipt = ctx.service.cancel(id, &Actor::User(user.user_id), reason).await?;
    ok(StatusCode::OK, receipt)
}

// ------------------------------------------------------------------
// Partner routes
// ------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ScanBody {
    token: String,
}

async fn scan(
    State(ctx): State<AppContext>,
    partner: PartnerIdentity,
    payload: Result<Json<ScanBody>, JsonRejection>,
) -> ApiResult {
    let Json(body) = payload?;
    let summary = ctx.service.scan(&body.token, &partner.partner_id).await?;
    ok(StatusCode::OK, summary)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculateBody {
    bill_amount: i64,
}

async fn calculate(
    State(ctx): State<AppContext>,
    _partner: PartnerIdentity,
    Path(id): Path<String>,
    payload: Result<Json<CalculateBody>, JsonRejection>,
) -> ApiResult {
    let id = redemption_id(&id)?;
    let Json(body) = payload?;
    let quote = ctx.service.calculate_discount(id, body.bill_amount).await?;
    ok(StatusCode::OK, quote)
}

async fn confirm(
    State(ctx): State<AppContext>,
    partner: PartnerIdentity,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let id = redemption_id(&id)?;
    let request: ConfirmRequest = optional_body(&body)?;
    let receipt = ctx.service.confirm(id, &partner.partner_id, request).await?;
    ok(StatusCode::OK, receipt)
}

async fn partner_cancel(
    State(ctx): State<AppContext>,
    partner: PartnerIdentity,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult {
    let id = redemption_id(&id)?;
    let CancelBody { reason } = optional_body(&body)?;
    let receipt = ctx
        .service
        .cancel(id, &Actor::Partner(partner.partner_id), reason)
        .await?;
    ok(StatusCode::OK, receipt)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn partner_history(
    State(ctx): State<AppContext>,
    partner: PartnerIdentity,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult {
    let Query(q) = query?;
    let (limit, offset) = page(q.limit, q.offset);
    let history = ctx
        .service
        .partner_history(&partner.partner_id, q.since, q.until, limit, offset)
        .await?;
    ok(StatusCode::OK, history)
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use loyalty_core::config::RedemptionConfig;
    use loyalty_core::test_utils::helpers::{coupon_reward, in_memory_engine, percent_off_reward};

    use crate::identity::{PARTNER_ID_HEADER, USER_ID_HEADER};

    async fn seeded_app() -> Router {
        let engine = in_memory_engine(RedemptionConfig::default());
        engine.ledger().open_account("u1", 500).await.unwrap();
        engine.catalog().upsert(&coupon_reward("latte", 100, 2)).await.unwrap();
        engine
            .catalog()
            .upsert(&percent_off_reward("pct20", 200, 20, Some(100), Some(200)))
            .await
            .unwrap();
        router(AppContext::from_service(engine.service.clone()))
    }

    async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn user_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(USER_ID_HEADER, "u1")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn partner_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(PARTNER_ID_HEADER, "p1")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn coupon_flow_over_http() {
        let app = seeded_app().await;

        let (status, body) = call(&app, user_post("/api/v1/rewards/latte/reserve", Value::Null)).await;
        assert_eq!(status, StatusCode::CREATED);
        let data = &body["data"];
        let id = data["redemptionId"].as_str().unwrap().to_string();
        let token = data["token"].as_str().unwrap().to_string();
        assert!(data["couponCode"].as_str().unwrap().starts_with("BR-"));

        let (status, body) = call(&app, partner_post("/api/v1/partner/scan", json!({ "token": token }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "active");
        assert_eq!(body["data"]["display"]["type"], "coupon");

        let uri = format!("/api/v1/partner/redemptions/{}/confirm", id);
        let (status, body) = call(&app, partner_post(&uri, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "redeemed");

        let req = Request::builder()
            .uri("/api/v1/points/balance")
            .header(USER_ID_HEADER, "u1")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["balance"], 400);
        assert_eq!(body["data"]["reserved"], 0);
    }

    #[tokio::test]
    async fn discount_confirm_over_http() {
        let app = seeded_app().await;

        let (_, body) = call(&app, user_post("/api/v1/rewards/pct20/reserve", Value::Null)).await;
        let id = body["data"]["redemptionId"].as_str().unwrap().to_string();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        call(&app, partner_post("/api/v1/partner/scan", json!({ "token": token }))).await;

        let uri = format!("/api/v1/partner/redemptions/{}/calculate", id);
        let (status, body) = call(&app, partner_post(&uri, json!({ "billAmount": 1000 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["appliedDiscount"], 100);

        let uri = format!("/api/v1/partner/redemptions/{}/confirm", id);
        let (status, body) = call(
            &app,
            partner_post(&uri, json!({ "billAmount": 1000, "appliedDiscount": 90 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VAL-011");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let app = seeded_app().await;
        let req = Request::builder()
            .uri("/api/v1/points/balance")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "AUTH-001");
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let app = seeded_app().await;
        for id in [Uuid::new_v4().to_string(), "not-a-uuid".to_string()] {
            let req = Request::builder()
                .uri(format!("/api/v1/redemptions/{}", id))
                .header(USER_ID_HEADER, "u1")
                .body(Body::empty())
                .unwrap();
            let (status, body) = call(&app, req).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["error"]["code"], "RDM-001");
        }
    }

    #[tokio::test]
    async fn tampered_token_is_unauthorized() {
        let app = seeded_app().await;
        let (status, body) =
            call(&app, partner_post("/api/v1/partner/scan", json!({ "token": "abc.def.ghi" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "RDM-010");
    }

    #[tokio::test]
    async fn out_of_stock_is_conflict() {
        let app = seeded_app().await;
        for _ in 0..2 {
            let (status, _) = call(&app, user_post("/api/v1/rewards/latte/reserve", Value::Null)).await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, body) = call(&app, user_post("/api/v1/rewards/latte/reserve", Value::Null)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "RWD-005");
    }
}
