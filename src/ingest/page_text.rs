use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

const SKIPPED: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "svg", "iframe", "form", "button",
];

const BLOCKS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "br", "tr", "section",
    "article", "table", "blockquote", "pre", "dd", "dt",
];

fn body_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("body").expect("static selector"))
}

/// Readable text of a page, used when no structured recipe data is present.
///
/// Block elements become line breaks, page chrome is dropped and the result
/// is cut to `max_chars` characters.
pub fn visible_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    match document.select(body_selector()).next() {
        Some(body) => collect_text(body, &mut raw),
        None => collect_text(document.root_element(), &mut raw),
    }

    let text = raw
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&text, max_chars)
}

fn collect_text(element: ElementRef, out: &mut String) {
    let name = element.value().name();
    if SKIPPED.contains(&name) {
        return;
    }
    let is_block = BLOCKS.contains(&name);
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }

    if is_block {
        out.push('\n');
    }
}

pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_skips_chrome() {
        let html = r#"
            <html>
            <head><title>Ignored</title><style>body { color: red; }</style></head>
            <body>
                <nav>Home | Recipes</nav>
                <h1>Test   Recipe</h1>
                <script>var tracking = true;</script>
                <ul><li>2 eggs</li><li>1 cup flour</li></ul>
                <p>Mix and <b>bake</b>.</p>
                <footer>Copyright</footer>
            </body>
            </html>
        "#;

        let text = visible_text(html, 10_000);
        assert_eq!(text, "Test Recipe\n2 eggs\n1 cup flour\nMix and bake.");
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("crème brûlée", 5), "crème");
        assert_eq!(truncate_chars("short", 50), "short");
    }
}
