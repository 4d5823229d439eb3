//! 示例服务：登录签发 token、鉴权接口与文件上传

use axum::{
    extract::{Multipart, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use backend_kit::auth::jwt::{JwtApi, JwtBody, TicketStore};
use backend_kit::core::context::{AuthUser, ValidatedJson};
use backend_kit::core::error::CoreResult;
use backend_kit::core::middleware::jwt_auth;
use backend_kit::core::response::ApiResponse;
use backend_kit::core::router::{serve, RouterHook};
use backend_kit::infrastructure::config::init_config;
use backend_kit::infrastructure::logger::init_logging;
use backend_kit::infrastructure::redis::RedisApi;
use backend_kit::storage::{LocalObjectClient, Object, ObjectClient, ResourceType, UploadRes};
use backend_kit::utils::file::file_upload;

#[derive(Clone)]
struct AppState {
    jwt: Arc<JwtApi<AuthUser>>,
    storage: Arc<LocalObjectClient>,
    upload_tmp: std::path::PathBuf,
}

#[derive(Debug, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    #[validate(length(min = 1, message = "账号不能为空"))]
    username: String,
    #[validate(range(min = 1))]
    user_id: u64,
}

#[derive(Debug, serde::Serialize)]
struct LoginResult {
    token: String,
    exp: i64,
}

async fn login(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> CoreResult<ApiResponse<LoginResult>> {
    let user = AuthUser {
        user_id: req.user_id,
        real_name: req.username,
        ..Default::default()
    };
    let (token, exp) = state
        .jwt
        .issued(JwtBody::new(user.user_id.to_string(), user))
        .await?;
    Ok(ApiResponse::success(LoginResult { token, exp }))
}

async fn me(user: AuthUser) -> ApiResponse<AuthUser> {
    ApiResponse::success(user)
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> CoreResult<ApiResponse<UploadRes>> {
    let info = file_upload(&state.upload_tmp, &mut multipart).await?;
    let resource_type = ResourceType::from_mime(&info.mimetype);
    let key = format!(
        "{}/{}",
        resource_type,
        backend_kit::utils::file::file_name(&info.realpath)
    );
    let res = state
        .storage
        .upload(
            &Object::new(key, info.mimetype.clone()),
            std::path::Path::new(&info.realpath),
        )
        .await?;
    if let Err(err) = tokio::fs::remove_file(&info.realpath).await {
        warn!("删除临时文件失败 {}: {}", info.realpath, err);
    }
    Ok(ApiResponse::success(res))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = init_config()?;
    init_logging(&config.logging)?;

    let tickets: Option<Arc<dyn TicketStore>> = match RedisApi::connect(&config.redis).await {
        Ok(redis) => Some(Arc::new(redis)),
        Err(err) => {
            warn!("Redis不可用，JWT票据校验已关闭: {}", err);
            None
        }
    };

    let state = AppState {
        jwt: Arc::new(JwtApi::new(config.jwt.secret.clone(), tickets)),
        storage: Arc::new(LocalObjectClient::from_config(&config.storage)),
        upload_tmp: std::env::temp_dir().join("backend-kit-upload"),
    };

    let protected = Router::new()
        .route("/me", get(me))
        .route("/upload", post(upload))
        .route_layer(middleware::from_fn_with_state(state.jwt.clone(), jwt_auth));

    let routes = Router::new()
        .route("/login", post(login))
        .merge(protected)
        .with_state(state);

    let hook = RouterHook {
        name: config.http.name.clone(),
        port: config.http.port,
        copyright: config.http.copyright.clone(),
        debug: config.http.debug,
        timeout_seconds: config.http.timeout_seconds,
        database: Some(config.database.display_addr()),
        redis: Some(config.redis.display_addr()),
    };
    info!("服务准备启动");
    serve(&hook, routes).await
}
