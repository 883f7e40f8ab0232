//! The per-query state machine tying retrieval to an answer strategy.
//!
//! `Start → {Chitchat | Retrieving}`, `Retrieving → {Grounded | Fallback}`,
//! terminal once an answer is produced. One query per call; the only state
//! shared across queries lives in the injected collaborators. Hard provider
//! failures become an `Error`-mode answer instead of a crash.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lectern_core::traits::{Generator, Retriever};
use lectern_core::types::{Message, ScoredSegment};

use crate::chitchat::is_chitchat;
use crate::citation::{self, Citation};
use crate::expansion::expand_query;
use crate::prompts;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    Chitchat,
    Grounded,
    Fallback,
    Error,
}

impl fmt::Display for AnswerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AnswerMode::Chitchat => "chitchat",
            AnswerMode::Grounded => "grounded",
            AnswerMode::Fallback => "fallback",
            AnswerMode::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoResults,
    LowScores,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Timing {
    pub retrieval: Duration,
    pub generation: Duration,
    pub total: Duration,
}

/// Everything one query produces: the answer text, how it was made, and
/// the evidence behind it.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub mode: AnswerMode,
    pub sources: Vec<ScoredSegment>,
    pub citations: Vec<Citation>,
    pub citations_text: String,
    /// Arithmetic mean of the retrieved scores; grounded mode only.
    pub confidence: Option<f32>,
    pub fallback_reason: Option<FallbackReason>,
    pub backend: String,
    pub timing: Timing,
}

pub struct Orchestrator {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    score_threshold: f32,
}

impl Orchestrator {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        score_threshold: f32,
    ) -> Self {
        Self { retriever, generator, score_threshold }
    }

    /// Answer one query. Never returns `Err`: provider failures surface as
    /// an `Error`-mode answer with an explicit message.
    pub async fn answer(&self, question: &str) -> Answer {
        let started = Instant::now();

        if is_chitchat(question) {
            tracing::info!("chitchat detected, skipping retrieval");
            return self.chitchat(question, started).await;
        }

        let retrieval_query = expand_query(question);
        let retrieval_started = Instant::now();
        let retrieved = match self.retriever.retrieve(&retrieval_query).await {
            Ok(results) => results,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "retrieval failed");
                return self.error_answer(
                    format!("Error retrieving course material: {err:#}"),
                    Timing {
                        retrieval: retrieval_started.elapsed(),
                        generation: Duration::ZERO,
                        total: started.elapsed(),
                    },
                );
            }
        };
        let retrieval = retrieval_started.elapsed();

        let max_score =
            retrieved.iter().map(|s| s.score).fold(None, |best: Option<f32>, s| {
                Some(best.map_or(s, |b| b.max(s)))
            });

        match max_score {
            None => {
                tracing::warn!("no documents retrieved, entering fallback mode");
                self.fallback(question, FallbackReason::NoResults, retrieval, started).await
            }
            Some(best) if best < self.score_threshold => {
                tracing::warn!(
                    max_score = best,
                    threshold = self.score_threshold,
                    "all scores below threshold, entering fallback mode"
                );
                self.fallback(question, FallbackReason::LowScores, retrieval, started).await
            }
            Some(best) => {
                tracing::info!(
                    chunks = retrieved.len(),
                    max_score = best,
                    "answering in grounded mode"
                );
                self.grounded(question, retrieved, retrieval, started).await
            }
        }
    }

    async fn chitchat(&self, question: &str, started: Instant) -> Answer {
        let messages =
            [Message::system(prompts::SYSTEM_CHITCHAT), Message::user(question)];
        let generation_started = Instant::now();
        // Chitchat always produces an answer; a failed generation call falls
        // back to a canned greeting rather than the error mode.
        let text = match self.generator.generate(&messages).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "chitchat generation failed");
                prompts::CHITCHAT_RECOVERY.to_string()
            }
        };
        let generation = generation_started.elapsed();
        Answer {
            text,
            mode: AnswerMode::Chitchat,
            sources: Vec::new(),
            citations: Vec::new(),
            citations_text: String::new(),
            confidence: None,
            fallback_reason: None,
            backend: self.generator.backend_info(),
            timing: Timing { retrieval: Duration::ZERO, generation, total: started.elapsed() },
        }
    }

    async fn fallback(
        &self,
        question: &str,
        reason: FallbackReason,
        retrieval: Duration,
        started: Instant,
    ) -> Answer {
        let messages =
            [Message::system(prompts::SYSTEM_FALLBACK), Message::user(question)];
        let generation_started = Instant::now();
        match self.generator.generate(&messages).await {
            Ok(text) => Answer {
                text,
                mode: AnswerMode::Fallback,
                sources: Vec::new(),
                citations: Vec::new(),
                citations_text: String::new(),
                confidence: None,
                fallback_reason: Some(reason),
                backend: self.generator.backend_info(),
                timing: Timing {
                    retrieval,
                    generation: generation_started.elapsed(),
                    total: started.elapsed(),
                },
            },
            Err(err) => self.generation_error(err, retrieval, generation_started, started),
        }
    }

    async fn grounded(
        &self,
        question: &str,
        retrieved: Vec<ScoredSegment>,
        retrieval: Duration,
        started: Instant,
    ) -> Answer {
        let prompt = prompts::grounded_prompt(question, &retrieved);
        let messages = [Message::system(prompts::SYSTEM_GROUNDED), Message::user(prompt)];
        let generation_started = Instant::now();
        match self.generator.generate(&messages).await {
            Ok(text) => {
                let citations = citation::merge(&retrieved);
                let citations_text = citation::format_list(&citations);
                let confidence = retrieved.iter().map(|s| s.score).sum::<f32>()
                    / retrieved.len() as f32;
                Answer {
                    text,
                    mode: AnswerMode::Grounded,
                    citations_text,
                    citations,
                    sources: retrieved,
                    confidence: Some(confidence),
                    fallback_reason: None,
                    backend: self.generator.backend_info(),
                    timing: Timing {
                        retrieval,
                        generation: generation_started.elapsed(),
                        total: started.elapsed(),
                    },
                }
            }
            Err(err) => self.generation_error(err, retrieval, generation_started, started),
        }
    }

    fn generation_error(
        &self,
        err: anyhow::Error,
        retrieval: Duration,
        generation_started: Instant,
        started: Instant,
    ) -> Answer {
        tracing::error!(error = %format!("{err:#}"), "generation failed");
        self.error_answer(
            format!("Error generating answer: {err:#}"),
            Timing {
                retrieval,
                generation: generation_started.elapsed(),
                total: started.elapsed(),
            },
        )
    }

    fn error_answer(&self, text: String, timing: Timing) -> Answer {
        Answer {
            text,
            mode: AnswerMode::Error,
            sources: Vec::new(),
            citations: Vec::new(),
            citations_text: String::new(),
            confidence: None,
            fallback_reason: None,
            backend: self.generator.backend_info(),
            timing,
        }
    }
}
