//! Content layout trait and the built-in container layouts.
//!
//! Document pages come from a handful of sites with different markup. Each
//! layout knows where one of them keeps the substantive text; layouts are
//! probed in priority order and the first hit wins.

use scraper::{Html, Selector};

use regcrawler_shared::{RegCrawlerError, Result};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Locates the main text of a document in one known page layout.
pub trait ContentLayout: Send + Sync {
    /// Trimmed text of the layout's container, or `None` if the page does not
    /// use this layout.
    fn extract_text(&self, doc: &Html) -> Option<String>;

    /// Human-readable layout name for tracing.
    fn name(&self) -> &str;
}

/// A layout identified by a single CSS container selector.
pub struct ContainerLayout {
    name: String,
    selector: Selector,
}

impl ContainerLayout {
    /// Build a layout from a CSS selector.
    pub fn parse(name: impl Into<String>, css: &str) -> Result<Self> {
        let selector = Selector::parse(css)
            .map_err(|e| RegCrawlerError::parse(format!("invalid selector '{css}': {e}")))?;
        Ok(Self {
            name: name.into(),
            selector,
        })
    }
}

impl ContentLayout for ContainerLayout {
    fn extract_text(&self, doc: &Html) -> Option<String> {
        doc.select(&self.selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Built-in layouts, highest priority first.
const BUILTIN_LAYOUTS: [(&str, &str); 3] = [
    ("data-info", "div.Data_Info"),
    ("content-page", "div.ContentPage"),
    ("content", "div.content"),
];

/// Holds registered layouts in priority order.
pub struct LayoutRegistry {
    layouts: Vec<Box<dyn ContentLayout>>,
}

impl LayoutRegistry {
    /// Create a registry with the built-in container layouts.
    pub fn new() -> Self {
        let layouts = BUILTIN_LAYOUTS
            .iter()
            .map(|(name, css)| {
                let layout = ContainerLayout::parse(*name, css).expect("built-in selector is valid");
                Box::new(layout) as Box<dyn ContentLayout>
            })
            .collect();
        Self { layouts }
    }

    /// Create a registry from custom layouts.
    pub fn with_layouts(layouts: Vec<Box<dyn ContentLayout>>) -> Self {
        Self { layouts }
    }

    /// Text of the first layout that matches, with the layout's name.
    pub fn extract<'a>(&'a self, doc: &Html) -> Option<(&'a str, String)> {
        self.layouts
            .iter()
            .find_map(|layout| layout.extract_text(doc).map(|text| (layout.name(), text)))
    }
}

impl Default for LayoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}
