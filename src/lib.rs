//! # ScopeForge
//!
//! Turns raw project-discussion notes into structured scope documents and
//! scores their maturity against a knowledge base of prior projects.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────┐
//! │ Seed / Ingest│──▶│ Chunk+Embed  │──▶│ VectorIndex│◀── SQLite
//! │  / Feedback  │   │              │   │ (snapshot) │
//! └──────────────┘   └──────────────┘   └─────┬──────┘
//!                                             │ retrieve
//!                     ┌───────────────────────┤
//!                     ▼                       ▼
//!               ┌───────────┐           ┌───────────┐
//!               │ Provider A│           │ Provider B│
//!               └─────┬─────┘           └─────┬─────┘
//!                     └──────► reconcile ◀────┘
//!                                 │
//!                               score ──▶ CLI (sfg) / HTTP
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sfg init                       # create database
//! sfg seed ./data                # index Example* directories
//! sfg analyze notes.txt          # draft + maturity score
//! sfg feedback --project acme "Missing footer links"
//! sfg serve                      # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite chunk persistence |
//! | [`embedding`] | Embedding providers |
//! | [`index`] | Vector Index Store |
//! | [`knowledge`] | Knowledge Base Manager |
//! | [`providers`] | HTTP reasoning backends |
//! | [`orchestrator`] | Retrieve, fan-out, reconcile, score |
//! | [`trace`] | Per-request step trace |
//! | [`seed`] | Example-corpus seeding |
//! | [`evaluate`] | Draft vs. expected-output evaluation |
//! | [`server`] | HTTP server |

pub mod config;
pub mod db;
pub mod embedding;
pub mod evaluate;
pub mod index;
pub mod knowledge;
pub mod migrate;
pub mod orchestrator;
pub mod providers;
pub mod seed;
pub mod server;
pub mod sqlite_store;
pub mod trace;

pub use scopeforge_core as core;
