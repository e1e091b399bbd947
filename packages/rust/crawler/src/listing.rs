//! Parsing of the regulation listing table.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Minimum number of cells a qualifying row carries.
const MIN_CELLS: usize = 4;

static ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static CELL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static TITLE_LINK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a#hlkNAME").expect("valid selector"));

/// One qualifying listing row, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub title: String,
    /// Raw (ROC calendar) date text.
    pub date: String,
    pub category: String,
    /// Raw `href`, possibly relative.
    pub href: String,
}

/// Rows extracted from a listing page, in document order.
#[derive(Debug, Clone, Default)]
pub struct ParsedListing {
    pub rows: Vec<ListingRow>,
    /// Table rows that did not match the expected shape.
    pub skipped: usize,
}

/// Parse every qualifying `<tr>` of the listing page.
///
/// A row qualifies when it has at least four cells and its fourth cell holds
/// the title anchor with an `href`.
pub fn parse_listing(html: &str) -> ParsedListing {
    let doc = Html::parse_document(html);
    let mut listing = ParsedListing::default();

    for row in doc.select(&ROW_SEL) {
        match parse_row(row) {
            Some(parsed) => listing.rows.push(parsed),
            None => listing.skipped += 1,
        }
    }

    listing
}

fn parse_row(row: ElementRef<'_>) -> Option<ListingRow> {
    let cells: Vec<ElementRef<'_>> = row.select(&CELL_SEL).collect();
    if cells.len() < MIN_CELLS {
        return None;
    }

    let anchor = cells[3].select(&TITLE_LINK_SEL).next()?;
    let href = anchor.value().attr("href")?;

    Some(ListingRow {
        title: element_text(anchor),
        date: element_text(cells[1]),
        category: element_text(cells[2]),
        href: href.trim().to_string(),
    })
}

/// Concatenated, trimmed text of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
