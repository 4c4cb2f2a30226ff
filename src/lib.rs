//! # ChatGuard
//!
//! **Policy-enforcement gateway for outbound AI chat messages.**
//!
//! ChatGuard sits between employees and an AI chat backend. Every message is
//! inspected before it leaves; messages carrying forbidden terms, email
//! addresses, API keys, or source code are rejected, and every decision is
//! appended to a flat audit log that the dashboard aggregates on demand.
//!
//! ## Architecture
//!
//! - **[`detect`]** — ordered detectors mapping text to clear/blocked
//! - **[`pipeline`]** — runs detectors, writes the audit record, calls the responder
//! - **[`audit`]** — append-only text log writer and legacy-compatible parser
//! - **[`stats`]** — summary counts and per-reason ranking from audit records
//! - **[`responder`]** — AI backend abstraction (mock echo or HTTP)
//! - **[`web`]** — axum chat endpoint, dashboard, and JSON/SSE APIs
//! - **[`config`]** — TOML configuration with environment substitution
//! - **[`cli`]** — command-line interface (clap)
//! - **[`error`]** — unified error types using `thiserror`
//!
//! ## Quick Start
//!
//! ```bash
//! chatguard init     # write chatguard.toml
//! chatguard serve    # chat UI on http://127.0.0.1:8080/, dashboard on /admin
//! chatguard status   # block/allow counts and top reasons
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod responder;
pub mod stats;
pub mod web;
