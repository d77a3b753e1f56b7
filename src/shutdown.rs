//! # 信号桥接
//!
//! 把进程信号（Ctrl-C）转换为贯穿各运行器的关闭信号。

use tokio::signal;
use tracing::{info, warn};

use taskstore_common::Shutdown;

#[derive(Clone, Default)]
pub struct ShutdownManager {
    shutdown: Shutdown,
}

impl ShutdownManager {
    pub fn new() -> Self {
        Self {
            shutdown: Shutdown::new(),
        }
    }

    /// 各组件共享的关闭信号句柄
    pub fn handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// 监听 Ctrl-C 并在收到时触发关闭
    pub fn listen_for_signals(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到 Ctrl-C，触发关闭");
                    shutdown.trigger();
                }
                Err(err) => {
                    warn!("监听进程信号失败: {err}");
                }
            }
        });
    }

    pub fn trigger(&self) {
        self.shutdown.trigger();
    }
}
