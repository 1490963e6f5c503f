//! Named instruction fragments that condition the model for each stage.
//!
//! Prompts live as markdown files on a search path. The shared prompting
//! guide sits at the root of a prompts directory; stage instructions live in
//! its `wct/` subdirectory:
//!
//! ```text
//! prompts/
//!   prompting-guide-sdxl.md   (guide)
//!   wct/
//!     wildcard_intro.md       (intro)
//!     categorize.md
//!     analyze.md
//!     cleanup.md
//!     output.md
//! ```

use std::path::{Path, PathBuf};

use crate::error::PipelineError;

pub const GUIDE: &str = "guide";
pub const INTRO: &str = "intro";
pub const CATEGORIZE: &str = "categorize";
pub const ANALYZE: &str = "analyze";
pub const CLEANUP: &str = "cleanup";
pub const OUTPUT: &str = "output";

/// Inserted between adjacent fragments by [`PromptLibrary::compose`].
pub const PROMPT_SEPARATOR: &str = "\n\n---\n\n";

const STAGE_SUBDIR: &str = "wct";

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    search_path: Vec<PathBuf>,
}

impl PromptLibrary {
    pub fn new(search_path: Vec<PathBuf>) -> Self {
        Self { search_path }
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    /// Location of `name` relative to a prompts directory.
    pub fn relative_path(name: &str) -> PathBuf {
        match name {
            GUIDE => PathBuf::from("prompting-guide-sdxl.md"),
            INTRO => Path::new(STAGE_SUBDIR).join("wildcard_intro.md"),
            other => Path::new(STAGE_SUBDIR).join(format!("{other}.md")),
        }
    }

    /// First file for `name` on the search path.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let rel = Self::relative_path(name);
        self.search_path
            .iter()
            .map(|dir| dir.join(&rel))
            .find(|p| p.is_file())
    }

    pub fn load(&self, name: &str) -> Result<String, PipelineError> {
        let path = self
            .resolve(name)
            .ok_or_else(|| PipelineError::PromptNotFound {
                name: name.to_string(),
                searched: self.searched_display(name),
            })?;
        let text = std::fs::read_to_string(&path)
            .map_err(|source| PipelineError::PromptUnreadable { path, source })?;
        Ok(text.trim().to_string())
    }

    pub fn compose(&self, names: &[&str]) -> Result<String, PipelineError> {
        let parts = names
            .iter()
            .map(|name| self.load(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts.join(PROMPT_SEPARATOR))
    }

    fn searched_display(&self, name: &str) -> String {
        if self.search_path.is_empty() {
            return "<empty search path>".to_string();
        }
        let rel = Self::relative_path(name);
        self.search_path
            .iter()
            .map(|dir| dir.join(&rel).display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
