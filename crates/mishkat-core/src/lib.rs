//! # Mishkat Core
//!
//! Domain logic for retrieval-augmented chat over a multilingual Islamic
//! text corpus. This crate owns everything that does not talk to the
//! network: the data model, chunking, language classification, prompt
//! assembly, context folding, error kinds, and the gateway traits the app
//! crate implements over HTTP.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Documents, chunks, index entries, chat turns and messages |
//! | [`chunk`] | Overlapping fixed-window chunker |
//! | [`language`] | English/Arabic/Urdu profiles and the query classifier |
//! | [`prompt`] | Injection-safe template substitution and chat prompts |
//! | [`context`] | Folding retrieved chunks into a bounded context string |
//! | [`embedding`] | [`Embedder`](embedding::Embedder) trait and cosine similarity |
//! | [`index`] | [`VectorIndex`](index::VectorIndex) trait and in-memory index |
//! | [`llm`] | [`LanguageModel`](llm::LanguageModel) trait |
//! | [`error`] | [`RagError`](error::RagError) kinds |

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod language;
pub mod llm;
pub mod models;
pub mod prompt;

pub use error::{RagError, Result};
