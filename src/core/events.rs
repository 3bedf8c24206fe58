//! 事件中心 - 向所有订阅者扇出广播结构化事件
//!
//! 投递是尽力而为：某个订阅者的通道已关闭时静默移除，
//! 不影响其他订阅者，也不向广播方传播错误。

use crate::models::{Device, OperationKind, PlanSummary, SyncDirection};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// 状态变化事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    FileUploaded {
        device: Device,
        path: String,
    },
    FileOperation {
        operation: OperationKind,
        device: Device,
        path: String,
        dest_path: Option<String>,
        recursive: bool,
    },
    SyncExecuted {
        direction: SyncDirection,
        summary: PlanSummary,
    },
}

/// 事件订阅句柄
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// 事件中心
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一个订阅者；丢弃返回的接收端即取消订阅
    pub async fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().await.push(tx);
        rx
    }

    /// 向所有存活的订阅者广播；按调用顺序为每个订阅者保序
    pub async fn broadcast(&self, event: Event) {
        let mut subscribers = self.subscribers.lock().await;
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        let dropped = before - subscribers.len();
        if dropped > 0 {
            debug!("移除 {} 个失效订阅者", dropped);
        }
    }

    /// 当前订阅者数量
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}
