use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::i18n::Language;

static STYLES_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/styles");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("style file {file}: {source}")]
    Parse { file: String, #[source] source: serde_json::Error },
    #[error("style file {0} is not valid UTF-8")]
    Encoding(String),
    #[error("duplicate style id: {0}")]
    DuplicateId(String),
    #[error("style {0} has an empty id or instruction text")]
    Incomplete(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StyleDefinition {
    pub id: String,
    pub name_en: String,
    pub name_cn: String,
    pub icon: String,
    pub prompt_en: String,
    pub prompt_cn: String,
}

impl StyleDefinition {
    pub fn display_name(&self, language: Language) -> &str {
        match language { Language::Cn => &self.name_cn, Language::En => &self.name_en }
    }

    pub fn instruction(&self, language: Language) -> &str {
        match language { Language::Cn => &self.prompt_cn, Language::En => &self.prompt_en }
    }
}

/// Ordered, immutable set of styles. Its length fixes how many tasks each
/// submission creates.
#[derive(Debug, Clone)]
pub struct StyleCatalog {
    styles: Vec<StyleDefinition>,
}

impl StyleCatalog {
    pub fn new(styles: Vec<StyleDefinition>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for s in &styles {
            if s.id.trim().is_empty() || s.prompt_en.trim().is_empty() || s.prompt_cn.trim().is_empty() {
                return Err(CatalogError::Incomplete(s.id.clone()));
            }
            if !seen.insert(s.id.as_str()) {
                return Err(CatalogError::DuplicateId(s.id.clone()));
            }
        }
        Ok(Self { styles })
    }

    /// Loads the styles bundled under `styles/`, ordered by file name.
    pub fn builtin() -> Result<Self, CatalogError> {
        let mut files: Vec<_> = STYLES_DIR
            .files()
            .filter(|f| f.path().extension().is_some_and(|e| e == "json"))
            .collect();
        files.sort_by(|a, b| a.path().cmp(b.path()));

        let mut styles = Vec::with_capacity(files.len());
        for f in files {
            let name = f.path().display().to_string();
            let text = f.contents_utf8().ok_or_else(|| CatalogError::Encoding(name.clone()))?;
            let style: StyleDefinition = serde_json::from_str(text)
                .map_err(|source| CatalogError::Parse { file: name, source })?;
            styles.push(style);
        }
        Self::new(styles)
    }

    pub fn list(&self) -> &[StyleDefinition] {
        &self.styles
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn get(&self, id: &str) -> Option<&StyleDefinition> {
        self.styles.iter().find(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.styles.iter().map(|s| s.id.clone()).collect()
    }

    pub fn instruction(&self, id: &str, language: Language) -> Option<&str> {
        self.get(id).map(|s| s.instruction(language))
    }
}

#[cfg(test)]
pub(crate) fn test_style(id: &str) -> StyleDefinition {
    StyleDefinition {
        id: id.to_string(),
        name_en: format!("{id} (en)"),
        name_cn: format!("{id} (cn)"),
        icon: "sun".to_string(),
        prompt_en: format!("render {id}"),
        prompt_cn: format!("渲染 {id}"),
    }
}
