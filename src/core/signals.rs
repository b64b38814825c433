use crate::domain::model::Pulse;
use std::sync::Arc;
use tokio::sync::watch;

/// LLM 閘門：生成期間關閉，上游階段等待其重新開啟
#[derive(Debug, Clone)]
pub struct LlmGate {
    tx: Arc<watch::Sender<bool>>,
}

impl LlmGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx: Arc::new(tx) }
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    /// 關閉閘門，guard 被丟棄時自動重新開啟
    pub fn close(&self) -> GateGuard {
        self.tx.send_replace(false);
        tracing::debug!("🚧 LLM gate closed, upstream stages paused");
        GateGuard { gate: self.clone() }
    }

    fn open(&self) {
        self.tx.send_replace(true);
        tracing::debug!("🟢 LLM gate open, upstream stages resumed");
    }

    pub async fn wait_open(&self) {
        let mut rx = self.tx.subscribe();
        // 發送端由自身持有，不會出錯
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for LlmGate {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use = "the gate reopens as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GateGuard {
    gate: LlmGate,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.open();
    }
}

/// 目前脈衝的共享狀態
#[derive(Debug, Clone)]
pub struct PulseSwitch {
    tx: Arc<watch::Sender<Pulse>>,
}

impl PulseSwitch {
    pub fn new(initial: Pulse) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Pulse {
        *self.tx.borrow()
    }

    /// 切換到另一種脈衝並回傳新值
    pub fn toggle(&self) -> Pulse {
        let mut next = self.current();
        self.tx.send_modify(|pulse| {
            *pulse = pulse.flipped();
            next = *pulse;
        });
        next
    }
}

pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待關閉訊號；觸發端被丟棄時也視為關閉
    pub async fn triggered(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}
