use crate::core::stage::{forward, wait_for_gate, Stage, StageContext};
use crate::core::stats::bump;
use crate::domain::model::{Envelope, Pulse};
use crate::utils::error::{EngineError, Result};
use regex::Regex;
use std::collections::BTreeSet;
use tokio::sync::mpsc;

/// SEO 模式下在原始數據中尋找的片段
pub const SEO_FRAGMENTS: &[&str] = &[
    "the", "and", "for", "with", "new", "best", "top", "online", "guide", "review", "how to",
    "what is", "seo", "digital", "marketing", "content", "strategy", "blog", "article",
    "website", "traffic", "rank", "google", "bing", "youtube", "facebook", "twitter", "inst",
    "gram", "insta", "instagram",
];

/// 將原始數據切成候選片段
pub struct FragmentExtractor {
    splitter: Regex,
}

impl FragmentExtractor {
    pub fn new() -> Result<Self> {
        let splitter = Regex::new(r"[ ._]+").map_err(|e| EngineError::ProcessingError {
            message: format!("Invalid fragment splitter: {}", e),
        })?;
        Ok(Self { splitter })
    }

    /// 結果去重並排序
    pub fn extract(&self, kind: Pulse, raw: &str) -> Vec<String> {
        let unique: BTreeSet<String> = match kind {
            Pulse::PythonScript => self
                .splitter
                .split(raw)
                .map(str::trim)
                .filter(|element| !element.is_empty())
                .map(str::to_string)
                .collect(),
            Pulse::SeoContent => {
                let lowered = raw.to_lowercase();
                SEO_FRAGMENTS
                    .iter()
                    .filter(|fragment| lowered.contains(*fragment))
                    .map(|fragment| fragment.to_string())
                    .collect()
            }
        };
        unique.into_iter().collect()
    }
}

pub struct Fragmenter {
    extractor: FragmentExtractor,
    input: mpsc::Receiver<Envelope<String>>,
    output: mpsc::Sender<Envelope<Vec<String>>>,
}

impl Fragmenter {
    pub fn new(
        input: mpsc::Receiver<Envelope<String>>,
        output: mpsc::Sender<Envelope<Vec<String>>>,
    ) -> Result<Self> {
        Ok(Self {
            extractor: FragmentExtractor::new()?,
            input,
            output,
        })
    }
}

#[async_trait::async_trait]
impl Stage for Fragmenter {
    fn name(&self) -> &'static str {
        "fragmenter"
    }

    async fn run(mut self: Box<Self>, mut ctx: StageContext) -> Result<()> {
        tracing::info!("✂️ Fragmenter entering main loop");

        loop {
            if !wait_for_gate(&ctx.gate, &mut ctx.shutdown).await {
                break;
            }

            let envelope = tokio::select! {
                biased;
                _ = ctx.shutdown.triggered() => break,
                received = self.input.recv() => match received {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let fragments = self.extractor.extract(envelope.kind, &envelope.content);
            tracing::debug!(
                "Filtered {} raw data (length {}). Found {} fragments",
                envelope.kind,
                envelope.content.len(),
                fragments.len()
            );
            bump(&ctx.stats.fragment_sets);

            if !forward(&self.output, envelope.map(fragments), &mut ctx.shutdown, "fragmenter").await? {
                break;
            }
        }

        tracing::info!("Fragmenter shutting down");
        Ok(())
    }
}
