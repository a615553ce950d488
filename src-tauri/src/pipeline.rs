//! Comparison and free-form chat runs over the two uploaded syllabi.

use crate::agents::assistant::AgentConfig;
use crate::agents::prompts::{
    comparison_problem, CHAT_ASSISTANT_NAME, CHAT_ASSISTANT_SYSTEM, FORMATTER_NAME,
    FORMATTER_SYSTEM, PROXY_NAME, SPECIALIST_NAME, SPECIALIST_SYSTEM,
};
use crate::agents::{
    run_round_robin, AgentRole, AssistantAgent, Participant, RetrieveConfig, RetrieveProxyAgent,
    Transcript,
};
use crate::config::ComparisonSettings;
use crate::db::Database;
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::llm::{ChatModel, LlmOptions};
use crate::scores::ScoreVector;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Slider weights, passed verbatim into the problem statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonWeights {
    pub topics_covered: u16,
    pub credits: u16,
    pub grading_criteria: u16,
}

impl Default for ComparisonWeights {
    fn default() -> Self {
        Self {
            topics_covered: 60,
            credits: 40,
            grading_criteria: 10,
        }
    }
}

impl ComparisonWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("topics covered", self.topics_covered),
            ("credits", self.credits),
            ("grading criteria", self.grading_criteria),
        ] {
            if value > 100 {
                return Err(Error::InvalidWeight { name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonOutcome {
    pub explanation: String,
    pub scores: ScoreVector,
    pub transcript: Transcript,
}

fn retrieve_config(settings: &ComparisonSettings, collection_name: String) -> RetrieveConfig {
    let mut config = RetrieveConfig::new(PROXY_NAME, collection_name);
    config.chunk_token_size = settings.chunk_token_size;
    config.n_results = settings.n_results;
    config
}

/// Proxy, specialist and formatter in a three-way round robin.
pub struct ComparisonPipeline {
    settings: ComparisonSettings,
    proxy: RetrieveProxyAgent,
    specialist: AssistantAgent,
    formatter: AssistantAgent,
}

impl ComparisonPipeline {
    pub fn new(
        settings: ComparisonSettings,
        model: Arc<dyn ChatModel>,
        db: Arc<Database>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let proxy = RetrieveProxyAgent::new(
            retrieve_config(&settings, settings.collection_name.clone()),
            db,
            embedder,
        );
        let specialist = AssistantAgent::new(
            AgentConfig {
                name: SPECIALIST_NAME.into(),
                system_message: SPECIALIST_SYSTEM.into(),
                description: "Decides if there's a match or not.".into(),
                options: LlmOptions {
                    timeout: Duration::from_secs(60),
                    temperature: Some(0.8),
                    seed: Some(1234),
                    cache_seed: None,
                },
            },
            AgentRole::Specialist,
            model.clone(),
        );
        let formatter = AssistantAgent::new(
            AgentConfig {
                name: FORMATTER_NAME.into(),
                system_message: FORMATTER_SYSTEM.into(),
                description: "Formats the scores as a list.".into(),
                options: LlmOptions {
                    temperature: Some(0.0),
                    cache_seed: Some(41),
                    ..LlmOptions::default()
                },
            },
            AgentRole::Formatter,
            model,
        );
        Self {
            settings,
            proxy,
            specialist,
            formatter,
        }
    }

    /// Run one comparison from a clean slate and extract the outcome by
    /// role: the first specialist turn explains, the first formatter turn
    /// carries the scores.
    pub async fn run(
        &mut self,
        weights: ComparisonWeights,
        documents: Vec<PathBuf>,
    ) -> Result<ComparisonOutcome> {
        weights.validate()?;
        self.proxy.reset();
        self.specialist.reset();
        self.formatter.reset();
        self.proxy.set_documents(documents);

        let problem = comparison_problem(
            &self.settings.source_course,
            &self.settings.target_course,
            weights.topics_covered,
            weights.credits,
            weights.grading_criteria,
        );
        tracing::info!(?weights, "starting comparison");
        let opening = self.proxy.initiate(&problem).await?;

        let run = run_round_robin(
            &mut [&mut self.proxy, &mut self.specialist, &mut self.formatter],
            0,
            opening,
            self.settings.max_round,
        )
        .await?;

        let explanation = run
            .transcript
            .first_from(AgentRole::Specialist)
            .ok_or_else(|| Error::Transcript("the specialist never replied".into()))?
            .content
            .clone();
        let raw_scores = &run
            .transcript
            .first_from(AgentRole::Formatter)
            .ok_or_else(|| Error::Transcript("no score list was produced".into()))?
            .content;
        let scores = ScoreVector::parse(raw_scores)?;
        tracing::info!(scores = ?scores.as_array(), stop = ?run.stop, "comparison finished");

        Ok(ComparisonOutcome {
            explanation,
            scores,
            transcript: run.transcript,
        })
    }
}

/// Proxy plus a general assistant for one question-answer exchange.
pub struct SyllabusChat {
    proxy: RetrieveProxyAgent,
    assistant: AssistantAgent,
}

impl SyllabusChat {
    pub fn new(
        settings: &ComparisonSettings,
        model: Arc<dyn ChatModel>,
        db: Arc<Database>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        // Chat keeps its own collection so re-indexing for a question never
        // disturbs a comparison that is still running.
        let proxy = RetrieveProxyAgent::new(
            retrieve_config(settings, format!("{}_chat", settings.collection_name)),
            db,
            embedder,
        );
        let assistant = AssistantAgent::new(
            AgentConfig {
                name: CHAT_ASSISTANT_NAME.into(),
                system_message: CHAT_ASSISTANT_SYSTEM.into(),
                description: "Answers questions about the syllabi.".into(),
                options: LlmOptions {
                    timeout: Duration::from_secs(600),
                    cache_seed: Some(42),
                    ..LlmOptions::default()
                },
            },
            AgentRole::Assistant,
            model,
        );
        Self { proxy, assistant }
    }

    pub async fn ask(&mut self, question: &str, documents: Vec<PathBuf>) -> Result<String> {
        self.proxy.reset();
        self.assistant.reset();
        self.proxy.set_documents(documents);

        let opening = self.proxy.initiate(question).await?;
        let run =
            run_round_robin(&mut [&mut self.proxy, &mut self.assistant], 0, opening, 2).await?;
        run.transcript
            .first_from(AgentRole::Assistant)
            .map(|m| m.content.clone())
            .ok_or_else(|| Error::Transcript("the assistant never replied".into()))
    }
}
