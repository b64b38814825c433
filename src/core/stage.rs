use crate::core::signals::{LlmGate, PulseSwitch, Shutdown};
use crate::core::stats::EngineStats;
use crate::utils::error::{EngineError, Result};
use std::sync::Arc;
use tokio::sync::mpsc;

/// 各階段共享的執行上下文
#[derive(Debug, Clone)]
pub struct StageContext {
    pub shutdown: Shutdown,
    pub gate: LlmGate,
    pub pulse: PulseSwitch,
    pub stats: Arc<EngineStats>,
}

/// 引擎中的一個並行階段
#[async_trait::async_trait]
pub trait Stage: Send {
    /// 用於標識階段名稱
    fn name(&self) -> &'static str;

    /// 執行直到收到關閉訊號或上游關閉
    async fn run(self: Box<Self>, ctx: StageContext) -> Result<()>;
}

/// 送往下游；Ok(false) 代表已收到關閉訊號
pub(crate) async fn forward<T: Send>(
    tx: &mpsc::Sender<T>,
    item: T,
    shutdown: &mut Shutdown,
    stage: &str,
) -> Result<bool> {
    tokio::select! {
        biased;
        _ = shutdown.triggered() => Ok(false),
        sent = tx.send(item) => match sent {
            Ok(()) => Ok(true),
            Err(_) if shutdown.is_triggered() => Ok(false),
            Err(_) => Err(EngineError::ChannelClosed {
                stage: stage.to_string(),
            }),
        },
    }
}

/// 在關閉前等待閘門開啟；回傳 false 代表應停止
pub(crate) async fn wait_for_gate(gate: &LlmGate, shutdown: &mut Shutdown) -> bool {
    if gate.is_open() {
        return !shutdown.is_triggered();
    }
    tokio::select! {
        biased;
        _ = shutdown.triggered() => false,
        _ = gate.wait_open() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signals::shutdown_channel;

    #[tokio::test]
    async fn test_forward_reports_closed_channel() {
        let (_trigger, mut shutdown) = shutdown_channel();
        let (tx, rx) = mpsc::channel::<u32>(1);
        drop(rx);

        let result = forward(&tx, 1, &mut shutdown, "test").await;
        assert!(matches!(result, Err(EngineError::ChannelClosed { .. })));
    }

    #[tokio::test]
    async fn test_forward_stops_on_shutdown_when_full() {
        let (trigger, mut shutdown) = shutdown_channel();
        let (tx, _rx) = mpsc::channel::<u32>(1);
        tx.send(0).await.unwrap();

        trigger.trigger();
        assert!(!forward(&tx, 1, &mut shutdown, "test").await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_gate() {
        let (trigger, mut shutdown) = shutdown_channel();
        let gate = LlmGate::new();
        assert!(wait_for_gate(&gate, &mut shutdown).await);

        let _guard = gate.close();
        trigger.trigger();
        assert!(!wait_for_gate(&gate, &mut shutdown).await);
    }
}
