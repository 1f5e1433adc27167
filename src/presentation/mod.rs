//! Askama views rendered by the editor.

pub mod editor;
