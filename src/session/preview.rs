//! Markdown rendering for preview mode

use pulldown_cmark::{html, Options, Parser};

/// Render a markdown buffer to HTML
pub fn render_markdown(content: &str) -> String {
    let parser = Parser::new_ext(content, Options::all());
    let mut out = String::with_capacity(content.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
