use anyhow::{bail, Result};

/// A manga ready to be read: an ordered, non-empty list of page references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MangaItem {
    id: String,
    title: String,
    cover_reference: String,
    pages: Vec<String>,
}

impl MangaItem {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        cover_reference: impl Into<String>,
        pages: Vec<String>,
    ) -> Result<Self> {
        let title = title.into();
        if pages.is_empty() {
            bail!("Manga '{}' has no pages", title);
        }
        Ok(Self {
            id: id.into(),
            title,
            cover_reference: cover_reference.into(),
            pages,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// Index of the final page. Never underflows since `pages` is non-empty.
    pub fn last_index(&self) -> usize {
        self.pages.len() - 1
    }

    pub fn library_item(&self) -> LibraryItem {
        LibraryItem {
            id: self.id.clone(),
            title: self.title.clone(),
            cover_reference: self.cover_reference.clone(),
            is_demo: None,
        }
    }
}

/// Entry shown on the library screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    pub id: String,
    pub title: String,
    pub cover_reference: String,
    pub is_demo: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Library,
    Reader,
}
