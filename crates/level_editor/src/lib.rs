//! Level document model and the interactive grid editor built on `engine`.

pub mod editor;
pub mod level;

pub use editor::{EditorScene, EditorSettings, InMemorySettings, LevelEditor, EDITOR_SCENE};
pub use level::{LevelDocument, LevelFile, LevelFileError};
