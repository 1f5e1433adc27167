//! Application services: page lifecycle, version history, ordering, edit sessions.

pub mod audit;
pub mod autosave;
pub mod editor;
pub mod error;
pub mod metrics;
pub mod ordering;
pub mod pages;
pub mod repos;
pub mod versions;
