use crate::core::stage::{forward, wait_for_gate, Stage, StageContext};
use crate::core::stats::bump;
use crate::domain::model::{Envelope, JournalEntry, Pulse};
use crate::utils::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashSet};
use tokio::sync::mpsc;

pub const SEO_KEYWORDS: &[&str] = &[
    "digital marketing",
    "seo strategy",
    "content creation",
    "online business",
    "social media",
    "search engine optimization",
    "how to get more website traffic",
    "best marketing tools",
    "python programming tutorial",
    "machine learning basics",
];

pub const DEFAULT_PYTHON_KEYWORD: &str = "basic_script_idea";

/// 由片段組合出交給 LLM 的關鍵字
pub struct KeywordSynthesizer {
    max_keywords: usize,
    rng: StdRng,
}

impl KeywordSynthesizer {
    pub fn new(max_keywords: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { max_keywords, rng }
    }

    pub fn synthesize(&mut self, kind: Pulse, fragments: &[String]) -> Vec<String> {
        match kind {
            Pulse::PythonScript => {
                let picked = self.sample(fragments);
                if picked.is_empty() {
                    vec![DEFAULT_PYTHON_KEYWORD.to_string()]
                } else {
                    picked
                }
            }
            // 沒有命中時為空集合，照樣交給 composer
            Pulse::SeoContent => match_seo_keywords(fragments),
        }
    }

    fn sample(&mut self, fragments: &[String]) -> Vec<String> {
        let unique: Vec<&String> = fragments.iter().collect::<BTreeSet<_>>().into_iter().collect();
        let amount = unique.len().min(self.max_keywords);
        unique
            .choose_multiple(&mut self.rng, amount)
            .map(|fragment| fragment.to_string())
            .collect()
    }
}

/// 單一片段、有序兩兩與三三組合 (含空白與直接相連)
pub fn match_seo_keywords(fragments: &[String]) -> Vec<String> {
    let targets: HashSet<&str> = SEO_KEYWORDS.iter().copied().collect();
    let lowered: Vec<String> = fragments.iter().map(|f| f.to_lowercase()).collect();
    let mut found = BTreeSet::new();

    let mut check = |candidate: String| {
        if targets.contains(candidate.as_str()) {
            found.insert(candidate);
        }
    };

    for (i, first) in lowered.iter().enumerate() {
        check(first.clone());

        for (j, second) in lowered.iter().enumerate() {
            if j == i {
                continue;
            }
            check(format!("{} {}", first, second));
            check(format!("{}{}", first, second));

            for (k, third) in lowered.iter().enumerate() {
                if k == i || k == j {
                    continue;
                }
                check(format!("{} {} {}", first, second, third));
                check(format!("{}{}{}", first, second, third));
            }
        }
    }

    found.into_iter().collect()
}

pub struct Synthesizer {
    synthesizer: KeywordSynthesizer,
    input: mpsc::Receiver<Envelope<Vec<String>>>,
    output: mpsc::Sender<Envelope<Vec<String>>>,
    journal: mpsc::UnboundedSender<JournalEntry>,
}

impl Synthesizer {
    pub fn new(
        synthesizer: KeywordSynthesizer,
        input: mpsc::Receiver<Envelope<Vec<String>>>,
        output: mpsc::Sender<Envelope<Vec<String>>>,
        journal: mpsc::UnboundedSender<JournalEntry>,
    ) -> Self {
        Self {
            synthesizer,
            input,
            output,
            journal,
        }
    }
}

#[async_trait::async_trait]
impl Stage for Synthesizer {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    async fn run(mut self: Box<Self>, mut ctx: StageContext) -> Result<()> {
        tracing::info!("🔗 Synthesizer entering main loop");

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

            let keywords = self.synthesizer.synthesize(envelope.kind, &envelope.content);
            tracing::info!(
                "Synthesized {} keywords from {} fragments: {:?}",
                envelope.kind,
                envelope.content.len(),
                keywords
            );
            bump(&ctx.stats.keyword_sets);

            let entry = JournalEntry::Keywords {
                kind: envelope.kind,
                keywords: keywords.clone(),
            };
            if self.journal.send(entry).is_err() {
                tracing::debug!("Journal closed, keyword set not recorded");
            }

            if !forward(&self.output, envelope.map(keywords), &mut ctx.shutdown, "synthesizer").await? {
                break;
            }
        }

        tracing::info!("Synthesizer shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_python_keywords_are_capped_and_distinct() {
        let mut synthesizer = KeywordSynthesizer::new(5, Some(11));
        let fragments = strings(&["a", "b", "c", "d", "e", "f", "g", "a", "b"]);
        let keywords = synthesizer.synthesize(Pulse::PythonScript, &fragments);

        assert_eq!(keywords.len(), 5);
        let unique: HashSet<_> = keywords.iter().collect();
        assert_eq!(unique.len(), 5);
        assert!(keywords.iter().all(|k| fragments.contains(k)));
    }

    #[test]
    fn test_python_default_keyword() {
        let mut synthesizer = KeywordSynthesizer::new(5, Some(1));
        assert_eq!(
            synthesizer.synthesize(Pulse::PythonScript, &[]),
            vec![DEFAULT_PYTHON_KEYWORD.to_string()]
        );
    }

    #[test]
    fn test_seo_pairs_and_concatenations() {
        let fragments = strings(&["marketing", "digital", "seo", "strategy", "the"]);
        assert_eq!(
            match_seo_keywords(&fragments),
            vec!["digital marketing", "seo strategy"]
        );
    }

    #[test]
    fn test_seo_triples_and_order_matters() {
        let fragments = strings(&["basics", "machine", "learning"]);
        assert_eq!(match_seo_keywords(&fragments), vec!["machine learning basics"]);

        // 單一片段本身就是完整關鍵字
        let fragments = strings(&["Social Media"]);
        assert_eq!(match_seo_keywords(&fragments), vec!["social media"]);
    }

    #[test]
    fn test_seo_without_target_match_is_empty() {
        let mut synthesizer = KeywordSynthesizer::new(5, Some(1));
        let keywords = synthesizer.synthesize(Pulse::SeoContent, &strings(&["the", "and", "blog"]));
        assert!(keywords.is_empty());

        assert!(synthesizer.synthesize(Pulse::SeoContent, &[]).is_empty());

        let keywords = synthesizer.synthesize(Pulse::SeoContent, &strings(&["seo", "strategy", "blog"]));
        assert_eq!(keywords, strings(&["seo strategy"]));
    }
}
