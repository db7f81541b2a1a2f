//! Editor-side types: the active document and the host view built from
//! editor notifications.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The document that currently has focus in the editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveDocument {
    /// Absolute path of the document
    pub file: PathBuf,
    /// Language identifier the editor associates with the document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ActiveDocument {
    pub fn new(file: impl Into<PathBuf>, language: Option<&str>) -> Self {
        Self {
            file: file.into(),
            language: language.map(str::to_string),
        }
    }
}

/// Which editor notification triggered an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorEventKind {
    SelectionChanged,
    ActiveEditorChanged,
}

/// Snapshot of editor state pushed by the editor plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorUpdate {
    /// Focused document, absent when no editor has focus
    #[serde(default)]
    pub active_document: Option<ActiveDocument>,
    /// Open workspace folders
    #[serde(default)]
    pub workspace_folders: Vec<PathBuf>,
}

/// Queries the core needs from the editor.
pub trait EditorHost {
    /// The focused document, or `None` if nothing is focused.
    fn active_document(&self) -> Option<ActiveDocument>;

    /// The workspace folder containing `path`, or `None`.
    fn workspace_folder_for(&self, path: &Path) -> Option<PathBuf>;
}

/// In-process view of the editor, kept current by [`EditorUpdate`]s.
#[derive(Debug, Clone, Default)]
pub struct EditorState {
    active_document: Option<ActiveDocument>,
    workspace_folders: Vec<PathBuf>,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the view with the latest snapshot from the editor.
    pub fn apply(&mut self, update: EditorUpdate) {
        self.active_document = update.active_document;
        self.workspace_folders = update.workspace_folders;
    }

    pub fn set_active_document(&mut self, document: Option<ActiveDocument>) {
        self.active_document = document;
    }

    pub fn add_workspace_folder(&mut self, folder: impl Into<PathBuf>) {
        self.workspace_folders.push(folder.into());
    }
}

impl EditorHost for EditorState {
    fn active_document(&self) -> Option<ActiveDocument> {
        self.active_document.clone()
    }

    fn workspace_folder_for(&self, path: &Path) -> Option<PathBuf> {
        // Path::starts_with compares whole components, so /a/bc is not inside /a/b.
        self.workspace_folders
            .iter()
            .filter(|folder| path.starts_with(folder))
            .max_by_key(|folder| folder.components().count())
            .cloned()
    }
}
