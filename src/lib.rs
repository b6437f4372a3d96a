//! # WordPress to Orchard Core
//!
//! Migrates a WordPress WXR export into an Orchard Core recipe bundle.
//!
//! The migrator reads the export once, normalizes permalinks, downloads the
//! media library, converts posts and pages into content items for one of the
//! supported themes, and packages everything as a zip archive that Orchard
//! Core can import as a recipe.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐
//! │  Parser  │──▶│ Permalink │──▶│   Assets   │──────────────┐
//! │ (WXR)    │   │ rewrite   │   │  derive    │              ▼
//! └──────────┘   └───────────┘   └─────┬──────┘        ┌──────────┐
//!                                      │               │  Fetch   │
//!                                      ▼               │ (tokio)  │
//!                               ┌────────────┐         └────┬─────┘
//!                               │  Builders  │              │
//!                               │ taxonomy + │              │
//!                               │ blocks/md  │              │
//!                               └─────┬──────┘              │
//!                                     ▼                     ▼
//!                               ┌──────────────────────────────┐
//!                               │  Bundle: recipe.json + zip   │
//!                               └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! wp2oc inspect export.xml                       # summarize the export
//! wp2oc migrate export.xml                       # TheBlog bundle, no redirects
//! wp2oc migrate export.xml --theme etch-play --redirects
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Typed parse and download errors |
//! | [`models`] | Core data types |
//! | [`parser`] | Streaming WXR record parser |
//! | [`permalink`] | Slugs, permalink patterns, link rewriting |
//! | [`assets`] | Attachment to asset reference derivation |
//! | [`fetch`] | Concurrent asset downloads with retry |
//! | [`taxonomy`] | Category and tag resolution |
//! | [`blocks`] | HTML to editor.js block conversion |
//! | [`markdown`] | HTML to Markdown conversion |
//! | [`builders`] | Per-theme content item builders |
//! | [`bundle`] | Recipe assembly and archive packaging |
//! | [`pipeline`] | End-to-end migration run |

pub mod assets;
pub mod blocks;
pub mod builders;
pub mod bundle;
pub mod config;
pub mod error;
pub mod fetch;
pub mod markdown;
pub mod models;
pub mod parser;
pub mod permalink;
pub mod pipeline;
pub mod taxonomy;
