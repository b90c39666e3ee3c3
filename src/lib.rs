//! Koyu - Terminology-Preserving Transcript Translation
//!
//! A pipeline that standardizes domain terminology in meeting transcripts
//! and translates them into four target languages, protecting the
//! terminology from being reworded by the translation model. Detection
//! runs twice per language: a deterministic pattern pass over a CSV-loaded
//! terminology table, and a generative pass against an Ollama-compatible
//! endpoint, reconciled by a second pattern pass.

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod language;
pub mod llm;
pub mod matcher;
pub mod terminology;
pub mod translate;
pub mod workflow;
