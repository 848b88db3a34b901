//! Pure document composition shared by the preview and the PDF export.

use crate::domain::document::SourceDocument;

/// Attribute marking chrome-only styling so it can be told apart from user CSS.
pub const CHROME_STYLE_MARKER: &str = "data-preview-chrome";

/// Assets injected into preview passes only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewAssets {
    pub pagination_script_url: String,
    pub chrome_stylesheet: String,
}

#[derive(Debug, Clone, Copy)]
pub enum ComposeTarget<'a> {
    /// On-screen preview: pagination polyfill and chrome styling are appended.
    Preview(&'a PreviewAssets),
    /// Document sent to a remote tool, which paginates on its own.
    Export,
}

/// Wrap the three buffers in a minimal HTML skeleton.
///
/// The user's sources are inserted verbatim.
pub fn compose(document: &SourceDocument, target: ComposeTarget<'_>) -> String {
    let extra = match target {
        ComposeTarget::Preview(assets) => {
            assets.pagination_script_url.len() + assets.chrome_stylesheet.len() + 96
        }
        ComposeTarget::Export => 0,
    };
    let mut out = String::with_capacity(
        document.markup.len() + document.style.len() + document.script.len() + 160 + extra,
    );

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>");
    out.push_str(&document.style);
    out.push_str("</style>\n</head>\n<body>\n");
    out.push_str(&document.markup);
    out.push_str("\n<script>");
    out.push_str(&document.script);
    out.push_str("</script>\n");

    if let ComposeTarget::Preview(assets) = target {
        // Pagination first, chrome styling last so it wins over polyfill defaults.
        if !assets.pagination_script_url.is_empty() {
            out.push_str("<script src=\"");
            out.push_str(&assets.pagination_script_url);
            out.push_str("\"></script>\n");
        }
        out.push_str("<style ");
        out.push_str(CHROME_STYLE_MARKER);
        out.push_str(" media=\"screen\">");
        out.push_str(&assets.chrome_stylesheet);
        out.push_str("</style>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assets() -> PreviewAssets {
        PreviewAssets {
            pagination_script_url: "https://unpkg.com/pagedjs/dist/paged.polyfill.js".into(),
            chrome_stylesheet: ".pagedjs_page{box-shadow:0 0 4px #000}".into(),
        }
    }

    fn sample() -> SourceDocument {
        SourceDocument::new("<p>hi</p>", "p{color:red}", "console.log(1)")
    }

    #[test]
    fn export_contains_sources_in_order() {
        let html = compose(&sample(), ComposeTarget::Export);
        let style = html.find("<style>p{color:red}</style>").expect("style");
        let body = html.find("<p>hi</p>").expect("markup");
        let script = html.find("<script>console.log(1)</script>").expect("script");
        assert!(style < body && body < script);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn export_never_carries_preview_assets() {
        let html = compose(&sample(), ComposeTarget::Export);
        assert!(!html.contains("paged.polyfill"));
        assert!(!html.contains(CHROME_STYLE_MARKER));
    }

    #[test]
    fn preview_injects_pagination_then_chrome_after_user_script() {
        let assets = assets();
        let html = compose(&sample(), ComposeTarget::Preview(&assets));
        let user_script = html.find("console.log(1)").expect("user script");
        let polyfill = html.find("paged.polyfill.js").expect("polyfill");
        let chrome = html.find(CHROME_STYLE_MARKER).expect("chrome");
        assert!(user_script < polyfill);
        assert!(polyfill < chrome);
        assert!(chrome < html.find("</body>").expect("body end"));
    }

    #[test]
    fn empty_pagination_url_skips_script_tag() {
        let assets = PreviewAssets {
            pagination_script_url: String::new(),
            chrome_stylesheet: String::new(),
        };
        let html = compose(&sample(), ComposeTarget::Preview(&assets));
        assert!(!html.contains("<script src="));
        assert!(html.contains(CHROME_STYLE_MARKER));
    }

    #[test]
    fn broken_markup_is_passed_through_verbatim() {
        let doc = SourceDocument::new("<div><p>unclosed", "p{", "if (");
        let html = compose(&doc, ComposeTarget::Export);
        assert!(html.contains("<div><p>unclosed"));
        assert!(html.contains("<style>p{</style>"));
        assert!(html.contains("<script>if (</script>"));
    }
}
