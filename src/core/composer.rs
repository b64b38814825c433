use crate::core::stage::{forward, Stage, StageContext};
use crate::core::stats::bump;
use crate::domain::model::{Envelope, Feedback, Pulse, Stability};
use crate::domain::ports::TextGenerator;
use crate::utils::error::{EngineError, Result};
use regex::Regex;
use std::sync::Arc;
use tokio::sync::mpsc;

pub fn python_prompt(keywords: &[String], addendum: &str) -> String {
    let base_prompt = format!(
        "You are an expert Python programmer. Generate a complete, concise, and functional Python script based on the following keywords/requirements. \
         The script should be self-contained and ready to run. Include necessary imports. \
         Wrap the entire script in a single markdown code block with '```python' at the beginning and '```' at the end.\n\n\
         Keywords/Requirements: {}.\n\n\
         Example: If keywords are 'file io, read, write', generate a script that reads from one file and writes to another.",
        keywords.join(", ")
    );
    base_prompt + addendum
}

pub fn seo_prompt(keywords: &[String], addendum: &str) -> String {
    let base_prompt = format!(
        "You are an expert SEO content creator. Generate a concise, well-structured, and engaging piece of SEO-optimized content \
         based on the following keywords/phrases. Focus on natural language and incorporate keywords effectively. \
         Do not include any code blocks or special formatting outside of standard paragraphs. \
         Return only the content.\n\n\
         Keywords/Phrases: {}.\n\n\
         Example: If keywords are 'best coffee shop, downtown, reviews', generate a paragraph reviewing a coffee shop.",
        keywords.join(", ")
    );
    base_prompt + addendum
}

pub fn feedback_addendum(feedback: &Feedback) -> String {
    match feedback.status {
        Stability::Unstable => format!(
            "The previous attempt failed with error: '{}'. Please try to correct this and generate a working version.",
            feedback.error
        ),
        Stability::Stable => String::new(),
    }
}

/// 擷取第一個 ```python 區塊
pub struct CodeExtractor {
    pattern: Regex,
}

impl CodeExtractor {
    pub fn new() -> Result<Self> {
        let pattern = Regex::new(r"(?s)```python\s*\n(.*?)\n```").map_err(|e| {
            EngineError::ProcessingError {
                message: format!("Invalid code block pattern: {}", e),
            }
        })?;
        Ok(Self { pattern })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|code| code.as_str().trim().to_string())
    }
}

/// LLM 階段：把關鍵字交給模型並依回饋調整提示
pub struct Composer {
    generator: Arc<dyn TextGenerator>,
    python_model: String,
    seo_model: String,
    extractor: CodeExtractor,
    input: mpsc::Receiver<Envelope<Vec<String>>>,
    feedback: mpsc::UnboundedReceiver<Feedback>,
    output: mpsc::Sender<Envelope<String>>,
    addendum: String,
}

impl Composer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        python_model: String,
        seo_model: String,
        input: mpsc::Receiver<Envelope<Vec<String>>>,
        feedback: mpsc::UnboundedReceiver<Feedback>,
        output: mpsc::Sender<Envelope<String>>,
    ) -> Result<Self> {
        Ok(Self {
            generator,
            python_model,
            seo_model,
            extractor: CodeExtractor::new()?,
            input,
            feedback,
            output,
            addendum: String::new(),
        })
    }

    fn apply_feedback(&mut self, feedback: &Feedback) {
        tracing::info!(
            "Received feedback from {}: Status='{}', Error='{}'",
            feedback.source,
            feedback.status,
            feedback.error
        );
        self.addendum = feedback_addendum(feedback);
    }

    fn prompt_for(&self, kind: Pulse, keywords: &[String]) -> (&str, String) {
        match kind {
            Pulse::PythonScript => (&self.python_model, python_prompt(keywords, &self.addendum)),
            Pulse::SeoContent => (&self.seo_model, seo_prompt(keywords, &self.addendum)),
        }
    }

    /// 回傳 false 代表生成途中收到關閉訊號
    async fn compose(&mut self, envelope: Envelope<Vec<String>>, ctx: &mut StageContext) -> Result<bool> {
        let kind = envelope.kind;
        let (model, prompt) = self.prompt_for(kind, &envelope.content);
        let model = model.to_string();
        tracing::info!("🤖 Generating {} content using model '{}'...", kind, model);

        // 生成期間暫停上游階段，guard 丟棄時恢復
        let _gate = ctx.gate.close();

        let generated = tokio::select! {
            biased;
            _ = ctx.shutdown.triggered() => return Ok(false),
            generated = self.generator.generate(&model, &prompt) => generated,
        };

        let content = match generated {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("❌ Failed to generate {} content: {}", kind, e);
                bump(&ctx.stats.generation_failures);
                return Ok(true);
            }
        };

        let content = match kind {
            Pulse::PythonScript => match self.extractor.extract(&content) {
                Some(code) => {
                    tracing::debug!("Extracted Python code block successfully");
                    code
                }
                None => {
                    tracing::warn!("⚠️ Could not extract Python code block. Using full generated content");
                    content
                }
            },
            Pulse::SeoContent => content,
        };

        bump(&ctx.stats.generations);
        tracing::info!("Generated {} content (length: {})", kind, content.len());
        forward(&self.output, envelope.map(content), &mut ctx.shutdown, "composer").await
    }
}

#[async_trait::async_trait]
impl Stage for Composer {
    fn name(&self) -> &'static str {
        "composer"
    }

    async fn run(mut self: Box<Self>, mut ctx: StageContext) -> Result<()> {
        tracing::info!("✍️ Composer entering main loop");

        loop {
            tokio::select! {
                biased;
                _ = ctx.shutdown.triggered() => break,
                Some(feedback) = self.feedback.recv() => self.apply_feedback(&feedback),
                received = self.input.recv() => match received {
                    Some(envelope) => {
                        if !self.compose(envelope, &mut ctx).await? {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        tracing::info!("Composer shutting down");
        Ok(())
    }
}
