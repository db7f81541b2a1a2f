//! Resolves file, language and project for the focused document.

use crate::context::types::EditorHost;
use std::path::PathBuf;
use thiserror::Error;

/// Why the current editor state could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// No document is focused
    #[error("no active document")]
    NoActiveDocument,
    /// The focused document is outside every workspace folder
    #[error("couldn't resolve project for {}", .0.display())]
    UnresolvedProject(PathBuf),
}

/// Everything a heartbeat needs to know about the editor at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSnapshot {
    pub file_path: PathBuf,
    pub language: Option<String>,
    pub project_folder: PathBuf,
}

/// Reads context out of an [`EditorHost`].
///
/// Each query goes back to the host; nothing is cached since the active
/// document can change between calls.
pub struct ContextResolver<'a, H: EditorHost + ?Sized> {
    host: &'a H,
}

impl<'a, H: EditorHost + ?Sized> ContextResolver<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    pub fn file_path(&self) -> Result<PathBuf, ContextError> {
        self.host
            .active_document()
            .map(|doc| doc.file)
            .ok_or(ContextError::NoActiveDocument)
    }

    pub fn language(&self) -> Result<Option<String>, ContextError> {
        self.host
            .active_document()
            .map(|doc| doc.language)
            .ok_or(ContextError::NoActiveDocument)
    }

    pub fn project_folder(&self) -> Result<PathBuf, ContextError> {
        let file = self.file_path()?;
        self.host
            .workspace_folder_for(&file)
            .ok_or(ContextError::UnresolvedProject(file))
    }

    /// Run all three queries.
    pub fn resolve(&self) -> Result<ContextSnapshot, ContextError> {
        Ok(ContextSnapshot {
            language: self.language()?,
            project_folder: self.project_folder()?,
            file_path: self.file_path()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::types::{ActiveDocument, EditorState};

    fn state_with_project() -> EditorState {
        let mut state = EditorState::new();
        state.add_workspace_folder("/work/project");
        state
    }

    #[test]
    fn test_resolve_full_context() {
        let mut state = state_with_project();
        state.set_active_document(Some(ActiveDocument::new(
            "/work/project/src/lib.rs",
            Some("rust"),
        )));

        let snapshot = ContextResolver::new(&state).resolve().unwrap();
        assert_eq!(snapshot.file_path, PathBuf::from("/work/project/src/lib.rs"));
        assert_eq!(snapshot.language.as_deref(), Some("rust"));
        assert_eq!(snapshot.project_folder, PathBuf::from("/work/project"));
    }

    #[test]
    fn test_no_active_document() {
        let state = state_with_project();
        let resolver = ContextResolver::new(&state);

        assert_eq!(resolver.file_path(), Err(ContextError::NoActiveDocument));
        assert_eq!(resolver.language(), Err(ContextError::NoActiveDocument));
        assert_eq!(resolver.resolve(), Err(ContextError::NoActiveDocument));
    }

    #[test]
    fn test_file_outside_workspace() {
        let mut state = state_with_project();
        state.set_active_document(Some(ActiveDocument::new("/tmp/scratch.txt", None)));

        let err = ContextResolver::new(&state).resolve().unwrap_err();
        assert_eq!(
            err,
            ContextError::UnresolvedProject(PathBuf::from("/tmp/scratch.txt"))
        );
    }

    #[test]
    fn test_missing_language_is_not_an_error() {
        let mut state = state_with_project();
        state.set_active_document(Some(ActiveDocument::new("/work/project/Makefile", None)));

        let snapshot = ContextResolver::new(&state).resolve().unwrap();
        assert!(snapshot.language.is_none());
    }
}
