//! Diagnostic text from backend error pages.
//!
//! Backend servers report failures as HTML with the interesting text wrapped
//! in `<pre>...</pre>`, usually a traceback whose last line is the message.
//! This is deliberately not an HTML parser.

const UNKNOWN: &str = "unknown error";

pub fn scrape_error(body: &str) -> String {
    let Some(start) = body.find("<pre>") else {
        return UNKNOWN.to_string();
    };
    let inner = &body[start + "<pre>".len()..];
    let Some(end) = inner.find("</pre>") else {
        return UNKNOWN.to_string();
    };

    inner[..end]
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(unescape)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
