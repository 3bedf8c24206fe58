//! HTTP/WebSocket 服务 - 对外暴露文件列表、单文件操作与同步接口

use crate::error::SyncError;
use crate::models::{
    Device, FileListResponse, FileOperationRequest, SyncRequest,
};
use crate::service::SyncService;
use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

/// WebSocket 空闲读超时，超时后发送心跳帧而不是断开
const WS_HEARTBEAT_SECS: u64 = 60;

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = match &self {
            SyncError::Validation(_) => StatusCode::BAD_REQUEST,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.kind(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// 构建路由
pub fn router(service: Arc<SyncService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/files", get(list_files))
        .route("/upload", post(upload))
        .route("/op", post(file_operation))
        .route("/sync/plan", post(sync_plan))
        .route("/sync/execute", post(sync_execute))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct FilesQuery {
    device: Device,
}

async fn list_files(
    State(service): State<Arc<SyncService>>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<FileListResponse>, SyncError> {
    let files = service.list_files(query.device).await?;
    Ok(Json(FileListResponse {
        device: query.device,
        root: service.device_root(query.device).display().to_string(),
        files,
    }))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    device: Device,
    /// 相对设备根目录的路径
    path: String,
}

async fn upload(
    State(service): State<Arc<SyncService>>,
    Query(query): Query<UploadQuery>,
    body: Body,
) -> Result<Json<serde_json::Value>, SyncError> {
    let stream = body
        .into_data_stream()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    service
        .save_upload(query.device, &query.path, Box::pin(stream))
        .await?;
    Ok(Json(json!({"status": "ok"})))
}

async fn file_operation(
    State(service): State<Arc<SyncService>>,
    Json(req): Json<FileOperationRequest>,
) -> Result<Json<serde_json::Value>, SyncError> {
    service.apply_operation(&req).await?;
    Ok(Json(json!({"status": "ok"})))
}

async fn sync_plan(
    State(service): State<Arc<SyncService>>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<crate::models::SyncPlan>, SyncError> {
    let plan = service.compute_plan(req.direction).await?;
    Ok(Json(plan))
}

async fn sync_execute(
    State(service): State<Arc<SyncService>>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<serde_json::Value>, SyncError> {
    let (summary, report) = service.execute_plan(req.direction).await?;
    Ok(Json(json!({
        "status": "ok",
        "summary": summary,
        "report": report,
    })))
}

async fn ws_handler(
    State(service): State<Arc<SyncService>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

/// 事件流连接：转发广播事件，空闲时发送心跳保活
async fn handle_socket(mut socket: WebSocket, service: Arc<SyncService>) {
    let mut events = service.events().subscribe().await;
    info!("事件流客户端接入");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = tokio::time::timeout(
                Duration::from_secs(WS_HEARTBEAT_SECS),
                socket.recv(),
            ) => {
                match incoming {
                    // 客户端消息仅用于保活，内容忽略
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(_))) | Ok(None) => break,
                    Err(_) => {
                        // 读超时触发心跳，而不是断开
                        if socket.send(Message::Text("\n".to_string())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    debug!("事件流客户端断开");
}
