//! Date and link normalization for listing rows.

/// Offset between the ROC (Minguo) calendar year and the Gregorian year.
const ROC_YEAR_OFFSET: i32 = 1911;

/// Convert an ROC calendar date (`113-05-01`) to a Gregorian one (`2024-05-01`).
///
/// Month and day are kept verbatim. Input that is not three dash-separated
/// parts with an all-digit year of at most three digits is returned unchanged;
/// a four-digit year is taken to be Gregorian already.
pub fn to_gregorian_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.split('-').collect();
    if parts.len() != 3 {
        return raw.to_string();
    }

    let year = parts[0];
    if year.is_empty() || year.len() > 3 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return raw.to_string();
    }

    match year.parse::<i32>() {
        Ok(roc) => format!("{}-{}-{}", roc + ROC_YEAR_OFFSET, parts[1], parts[2]),
        Err(_) => raw.to_string(),
    }
}

/// Resolve a listing `href` to an absolute URL.
///
/// - `/path` → `base_origin` + `/path`
/// - `http://…` / `https://…` → unchanged
/// - anything else → `base_origin` + `listing_dir` + href
pub fn resolve_link(href: &str, base_origin: &str, listing_dir: &str) -> String {
    let origin = base_origin.trim_end_matches('/');

    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }

    if href.starts_with('/') {
        return format!("{origin}{href}");
    }

    let dir = listing_dir.trim_matches('/');
    if dir.is_empty() {
        format!("{origin}/{href}")
    } else {
        format!("{origin}/{dir}/{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://example.test";

    #[test]
    fn converts_roc_dates() {
        assert_eq!(to_gregorian_date("113-05-01"), "2024-05-01");
        assert_eq!(to_gregorian_date("99-12-31"), "2010-12-31");
        assert_eq!(to_gregorian_date("114-1-7"), "2025-1-7");
    }

    #[test]
    fn passes_through_unconvertible_dates() {
        assert_eq!(to_gregorian_date("2024-05-01"), "2024-05-01");
        assert_eq!(to_gregorian_date("abc-05-01"), "abc-05-01");
        assert_eq!(to_gregorian_date("113/05/01"), "113/05/01");
        assert_eq!(to_gregorian_date("113-05"), "113-05");
        assert_eq!(to_gregorian_date("113-05-01-02"), "113-05-01-02");
        assert_eq!(to_gregorian_date(""), "");
        assert_eq!(to_gregorian_date("-05-01"), "-05-01");
    }

    #[test]
    fn resolves_root_relative_links() {
        assert_eq!(
            resolve_link("/News/x.aspx", ORIGIN, "/News/"),
            "https://example.test/News/x.aspx"
        );
    }

    #[test]
    fn resolves_bare_relative_links_under_listing_dir() {
        assert_eq!(
            resolve_link("x.aspx", ORIGIN, "/News/"),
            "https://example.test/News/x.aspx"
        );
        assert_eq!(
            resolve_link("NewsDetail.aspx?msgid=1", "https://example.test/", "News"),
            "https://example.test/News/NewsDetail.aspx?msgid=1"
        );
    }

    #[test]
    fn keeps_absolute_links() {
        assert_eq!(
            resolve_link("https://other.test/y", ORIGIN, "/News/"),
            "https://other.test/y"
        );
        assert_eq!(
            resolve_link("http://other.test/y", ORIGIN, "/News/"),
            "http://other.test/y"
        );
    }
}
