//! Retrieval-augmented chat.
//!
//! For each question [`ChatEngine`]:
//!
//! 1. classifies the question's language into a [`LanguageProfile`];
//! 2. condenses it against the session history into a standalone query
//!    (a non-streaming model call, skipped when history is empty);
//! 3. embeds the standalone query and retrieves the `top_k` nearest chunks;
//! 4. folds them into a bounded context and builds the prompt;
//! 5. streams the answer, opening with the profile's response prefix.
//!
//! The engine keeps no per-request state. The system prompt travels with
//! each model request, so one engine serves concurrent sessions in
//! different languages. History is owned by the caller.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use futures::StreamExt;
use tokio::io::AsyncBufReadExt;

use mishkat_core::context::assemble_context;
use mishkat_core::embedding::Embedder;
use mishkat_core::index::VectorIndex;
use mishkat_core::language::{LanguageClassifier, LanguageProfile};
use mishkat_core::llm::{CompletionRequest, LanguageModel};
use mishkat_core::models::{ChatTurn, ScoredChunk};
use mishkat_core::prompt::{condense_messages, ChatPrompt};
use mishkat_core::{RagError, Result};

use crate::config::Config;
use crate::providers;
use crate::stream::ResponseStream;

#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub top_k: usize,
    pub context_budget_tokens: usize,
    pub temperature: f32,
    pub condense_temperature: f32,
}

impl ChatSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            context_budget_tokens: config.retrieval.context_budget_tokens,
            temperature: config.llm.temperature,
            condense_temperature: config.llm.condense_temperature,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_budget_tokens: 3000,
            temperature: 0.7,
            condense_temperature: 0.0,
        }
    }
}

/// Everything decided before the answer is generated.
#[derive(Debug, Clone)]
pub struct PreparedChat {
    pub profile: LanguageProfile,
    pub standalone_query: String,
    /// Retrieved chunks, best match first.
    pub sources: Vec<ScoredChunk>,
    pub prompt: ChatPrompt,
}

pub struct ChatEngine {
    classifier: LanguageClassifier,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LanguageModel>,
    settings: ChatSettings,
}

impl ChatEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LanguageModel>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            classifier: LanguageClassifier::default(),
            embedder,
            index,
            llm,
            settings,
        }
    }

    pub fn with_classifier(mut self, classifier: LanguageClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Rewrite `question` as a standalone query given `history`.
    ///
    /// With empty history the question is returned unchanged and the model
    /// is not called. A blank rewrite also falls back to the question.
    pub async fn condense(&self, history: &[ChatTurn], question: &str) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }
        let request = CompletionRequest::new(
            condense_messages(history, question),
            self.settings.condense_temperature,
        );
        let rewritten = self.llm.complete(&request).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            return Ok(question.to_string());
        }
        tracing::debug!(original = question, condensed = rewritten, "condensed question");
        Ok(rewritten.to_string())
    }

    /// Classify, condense, retrieve, and build the prompt.
    pub async fn prepare(&self, question: &str, history: &[ChatTurn]) -> Result<PreparedChat> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput("question is empty".to_string()));
        }

        let profile = self.classifier.classify(question);
        let standalone_query = self.condense(history, question).await?;

        let vector = self.embedder.embed_query(&standalone_query).await?;
        let mut sources = self.index.query(&vector, self.settings.top_k).await?;
        sources.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let context = assemble_context(&sources, self.settings.context_budget_tokens);
        let prompt = ChatPrompt::build(profile, &context, &standalone_query);

        tracing::info!(
            language = profile.code(),
            matches = sources.len(),
            context_chars = context.chars().count(),
            "prepared chat request"
        );

        Ok(PreparedChat {
            profile,
            standalone_query,
            sources,
            prompt,
        })
    }

    /// Answer `question` as a lazy stream of text fragments.
    ///
    /// Setup failures (condensation, embedding, retrieval, opening the
    /// model stream) are returned here; failures after that arrive as the
    /// stream's last item.
    pub async fn get_response(&self, question: &str, history: &[ChatTurn]) -> Result<ResponseStream> {
        let prepared = self.prepare(question, history).await?;
        let request = CompletionRequest::new(prepared.prompt.messages(), self.settings.temperature);
        let upstream = self.llm.stream(&request).await?;

        Ok(ResponseStream::spawn(
            prepared.profile,
            prepared.standalone_query,
            prepared.sources,
            prepared.profile.response_prefix().to_string(),
            upstream,
        ))
    }

    /// Non-streaming answer. Equal to the concatenation of the fragments
    /// [`get_response`](Self::get_response) yields for the same model output.
    pub async fn answer(&self, question: &str, history: &[ChatTurn]) -> Result<String> {
        let prepared = self.prepare(question, history).await?;
        let request = CompletionRequest::new(prepared.prompt.messages(), self.settings.temperature);
        let answer = self.llm.complete(&request).await?;
        Ok(prepared.prompt.render_assistant(&answer))
    }
}

/// Build an engine with gateways from `config`.
pub async fn build_engine(config: &Config) -> anyhow::Result<ChatEngine> {
    let embedder = providers::build_query_embedder(config)?;
    let index = providers::build_index(config).await?;
    let llm = providers::build_llm(config)?;
    Ok(ChatEngine::new(
        embedder,
        index,
        llm,
        ChatSettings::from_config(config),
    ))
}

/// Print fragments to stdout as they arrive and return the full answer.
async fn print_stream(mut stream: ResponseStream) -> Result<String> {
    let mut answer = String::new();
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(text) => {
                print!("{}", text);
                let _ = stdout.flush();
                answer.push_str(&text);
            }
            Err(e) => {
                println!();
                return Err(e);
            }
        }
    }
    println!();
    Ok(answer)
}

/// `mishkat ask`: answer one question.
pub async fn run_ask(config: &Config, question: &str, show_sources: bool) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    let stream = engine
        .get_response(question, &[])
        .await
        .context("Chat request failed")?;
    let sources = stream.sources().to_vec();
    print_stream(stream).await.context("Answer interrupted")?;

    if show_sources {
        println!();
        println!("sources:");
        for s in &sources {
            println!("  {:.3}  {}", s.score, s.filename().unwrap_or(&s.id));
        }
    }
    Ok(())
}

/// `mishkat chat`: line-oriented session over stdin.
///
/// Each successful answer is appended to the in-memory history. A failed
/// answer is reported and left out of the history.
pub async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let engine = build_engine(config).await?;
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Ask a question (empty line or 'exit' to quit, '/reset' to clear history).");
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        match question {
            "" | "exit" | "quit" => break,
            "/reset" => {
                history.clear();
                eprintln!("history cleared");
                continue;
            }
            _ => {}
        }

        let stream = match engine.get_response(question, &history).await {
            Ok(stream) => stream,
            Err(e) => {
                eprintln!("error: {}", e);
                continue;
            }
        };
        match print_stream(stream).await {
            Ok(answer) => history.push(ChatTurn::new(question, answer)),
            Err(e) => eprintln!("error: {}", e),
        }
    }
    Ok(())
}
