use crate::core::stage::{forward, wait_for_gate, Stage, StageContext};
use crate::core::stats::bump;
use crate::domain::model::Envelope;
use crate::utils::error::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::mpsc;

/// 字母、數字、ASCII 標點與空白
pub const CHAOS_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~ ";

pub fn random_batch<R: Rng + ?Sized>(rng: &mut R, size: usize) -> String {
    (0..size)
        .map(|_| CHAOS_ALPHABET[rng.gen_range(0..CHAOS_ALPHABET.len())] as char)
        .collect()
}

/// 混沌來源：依目前脈衝持續產生隨機原始數據
pub struct Generator {
    output: mpsc::Sender<Envelope<String>>,
    batch_size: usize,
    interval: Duration,
    rng: StdRng,
}

impl Generator {
    pub fn new(
        output: mpsc::Sender<Envelope<String>>,
        batch_size: usize,
        interval: Duration,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            output,
            batch_size,
            interval,
            rng,
        }
    }
}

#[async_trait::async_trait]
impl Stage for Generator {
    fn name(&self) -> &'static str {
        "generator"
    }

    async fn run(mut self: Box<Self>, mut ctx: StageContext) -> Result<()> {
        tracing::info!("🌀 Generator entering main loop (batch size {})", self.batch_size);

        loop {
            if !wait_for_gate(&ctx.gate, &mut ctx.shutdown).await {
                break;
            }

            let pulse = ctx.pulse.current();
            let batch = random_batch(&mut self.rng, self.batch_size);
            tracing::debug!("Generated raw data (length {}). Pulse: {}", batch.len(), pulse);

            if !forward(&self.output, Envelope::new(pulse, batch), &mut ctx.shutdown, "generator").await? {
                break;
            }
            bump(&ctx.stats.batches_generated);

            tokio::select! {
                biased;
                _ = ctx.shutdown.triggered() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Generator shutting down");
        Ok(())
    }
}
