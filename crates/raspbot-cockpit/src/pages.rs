//! HTML for the control page and the gallery.

use chrono::{DateTime, Local};
use raspbot_vision::GalleryEntry;

/// The compiled-in control page.
pub const COCKPIT_HTML: &str = include_str!("cockpit.html");

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Gallery page: one card per image, in the order given.
pub fn gallery(entries: &[GalleryEntry]) -> String {
    let mut cards = String::new();
    for entry in entries {
        let name = escape(&entry.name);
        let modified: DateTime<Local> = entry.modified.into();
        cards.push_str(&format!(
            "<figure class=\"card\"><a href=\"/img/{name}\" target=\"_blank\">\
             <img src=\"/img/{name}\" loading=\"lazy\" alt=\"{name}\"></a>\
             <figcaption>{name}<br><small>{} &middot; {} KiB</small></figcaption></figure>\n",
            modified.format("%Y-%m-%d %H:%M:%S"),
            entry.size.div_ceil(1024),
        ));
    }
    if entries.is_empty() {
        cards.push_str("<p>No pictures yet.</p>\n");
    }
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>Raspbot gallery</title><style>{GALLERY_CSS}</style></head>\n\
         <body><header><a href=\"/\">&larr; control</a> <h1>Gallery ({})</h1></header>\n\
         <main class=\"grid\">\n{cards}</main></body></html>\n",
        entries.len()
    )
}

const GALLERY_CSS: &str = "body{font-family:sans-serif;background:#111;color:#eee;margin:1rem}\
a{color:#8cf}.grid{display:grid;grid-template-columns:repeat(auto-fill,minmax(220px,1fr));gap:1rem}\
.card{margin:0;background:#222;padding:.5rem;border-radius:6px}.card img{width:100%}\
figcaption{font-size:.8rem;word-break:break-all}";
