//! # 协作式取消信号
//!
//! 基于 broadcast 通道的关闭信号，贯穿所有运行器与处理器。
//! 信号只会触发一次；触发后新订阅者立即观察到已关闭状态。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// 可克隆的关闭信号句柄
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 触发关闭，重复调用是幂等的
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // 可能没有任何订阅者，发送失败可以忽略
            let _ = self.tx.send(());
        }
    }

    /// 是否已经触发
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// 等待关闭信号；已触发时立即返回
    pub async fn cancelled(&self) {
        if self.is_triggered() {
            return;
        }
        let mut rx = self.tx.subscribe();
        // 订阅与触发之间存在窗口，订阅后需要再检查一次
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// 合并两个信号：任意一个触发时返回的信号也触发
    pub fn merged(first: &Shutdown, second: &Shutdown) -> Shutdown {
        let merged = Shutdown::new();
        let out = merged.clone();
        let first = first.clone();
        let second = second.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = first.cancelled() => {}
                _ = second.cancelled() => {}
            }
            out.trigger();
        });
        merged
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_is_observable() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());

        shutdown.trigger();
        assert!(shutdown.is_triggered());

        // 已触发后等待立即返回
        tokio::time::timeout(Duration::from_millis(100), shutdown.cancelled())
            .await
            .expect("cancelled() should return immediately after trigger");
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let shutdown = Shutdown::new();
        let clone = shutdown.clone();

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter should observe trigger")
            .unwrap();
    }
}
