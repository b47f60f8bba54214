//! Content extraction from loaded pages.
//!
//! Pure functions over HTML, kept apart from navigation and retry logic so
//! the heuristics can be swapped or tested on fixtures alone.

mod launch_date;
mod listings;
mod signals;

pub use launch_date::{LabeledDateExtractor, LaunchDateExtractor};
pub use listings::{extract_categories, extract_listings, has_page_link, ExtractedListing};
pub use signals::{is_not_found, is_rate_limited};

use scraper::{ElementRef, Html, Selector};

/// Elements whose text never renders.
const HIDDEN: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start and end a line of rendered text.
const BLOCK: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "tfoot",
    "thead", "tr", "ul",
];

/// Approximate rendered text of the body, the way a browser's `innerText`
/// lays it out: inline content flows on one line, block elements and `<br>`
/// break lines, whitespace runs collapse, blank lines are dropped.
pub fn visible_text(document: &Html) -> String {
    let body_selector = Selector::parse("body").expect("valid selector");
    let Some(body) = document.select(&body_selector).next() else {
        return String::new();
    };

    let mut raw = String::new();
    render_text(body, &mut raw);
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            // Source line breaks inside text are plain whitespace when rendered.
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
            continue;
        }
        let Some(el) = ElementRef::wrap(child) else {
            continue;
        };
        let name = el.value().name();
        if HIDDEN.contains(&name) {
            continue;
        }
        match name {
            "br" => out.push('\n'),
            "td" | "th" => {
                out.push(' ');
                render_text(el, out);
                out.push(' ');
            }
            _ if BLOCK.contains(&name) => {
                out.push('\n');
                render_text(el, out);
                out.push('\n');
            }
            _ => render_text(el, out),
        }
    }
}

/// All text under an element with whitespace runs collapsed to single spaces.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(html: &str) -> String {
        visible_text(&Html::parse_document(html))
    }

    #[test]
    fn inline_markup_stays_on_one_line() {
        assert_eq!(
            text("<div><p>Launched <span>March</span> 3, 2025</p></div>"),
            "Launched March 3, 2025"
        );
        assert_eq!(text("<p>Launched<br>March 3, 2025</p>"), "Launched\nMarch 3, 2025");
    }

    #[test]
    fn blocks_break_lines_and_hidden_text_is_skipped() {
        let html = r#"<body>
            <h1>Judge.me
               Reviews</h1>
            <script>var launched = "May 1, 2020";</script>
            <ul><li>Free plan</li><li>4.9 <b>★</b></li></ul>
            <table><tr><td>Launched</td><td>June 12, 2019</td></tr></table>
        </body>"#;
        assert_eq!(
            text(html),
            "Judge.me Reviews\nFree plan\n4.9 ★\nLaunched June 12, 2019"
        );
    }
}
