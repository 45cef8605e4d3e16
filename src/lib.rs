//! # Mishkat
//!
//! Multilingual retrieval-augmented chat over a corpus of Islamic texts.
//!
//! Mishkat ingests PDF documents into a vector index and answers questions
//! in English, Arabic, or Urdu, streaming each answer in the language the
//! question was asked in.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ new_data/   │──▶│ Extract + Chunk   │──▶│ Vector index │
//! │ *.pdf       │   │ + Embed (batched) │   │ (Pinecone)   │
//! └─────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                 │ query
//!                   ┌──────────────────┐          │
//!   question ──────▶│ Classify, condense│◀─────────┘
//!                   │ retrieve, prompt  │──▶ LLM ──▶ fragment stream
//!                   └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mishkat sources                   # check source directories
//! mishkat ingest --dry-run          # count documents and chunks
//! mishkat ingest                    # embed and upsert
//! mishkat ask "What is the meaning of Khatam an-Nabiyyin?"
//! mishkat serve                     # HTTP + SSE chat endpoint
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Source-directory scanning |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`ingest`] | Batched ingestion pipeline |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`http`] | Shared HTTP error mapping and retry |
//! | [`embedding`] | OpenAI-compatible embeddings client |
//! | [`llm`] | OpenAI-compatible chat client with SSE streaming |
//! | [`pinecone`] | Pinecone data-plane client |
//! | [`local_index`] | JSON-file vector index |
//! | [`providers`] | Gateway construction from config |
//! | [`chat`] | Chat engine, `ask` and `chat` commands |
//! | [`stream`] | Cancellable answer stream |
//! | [`server`] | HTTP server |
//! | [`sources`] | `sources` command |
//! | [`stats`] | `stats` command |

pub mod chat;
pub mod config;
pub mod connector_fs;
pub mod embedding;
pub mod extract;
pub mod http;
pub mod ingest;
pub mod llm;
pub mod local_index;
pub mod pinecone;
pub mod progress;
pub mod providers;
pub mod server;
pub mod sources;
pub mod stats;
pub mod stream;
