//! Tessera: a page-composition engine with typed content blocks, derived page
//! lifecycle, version history and coalesced autosave.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
