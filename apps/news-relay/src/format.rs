use crate::models::{truncate_chars, TranslatedPost};

/// Telegram's limit for a single text message.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Optional decorations shared by every post.
#[derive(Debug, Clone, Default)]
pub struct PostStyle {
    /// Italic footer line, e.g. the channel's name.
    pub signature: Option<String>,
    pub max_chars: Option<usize>,
}

/// Render a post as Telegram HTML, bounded to the message limit. The title
/// and link always survive; the body is shortened first, then the signature
/// and points line are dropped, then the title is shortened.
pub fn render_post(post: &TranslatedPost, style: &PostStyle) -> String {
    let max_chars = style.max_chars.unwrap_or(TELEGRAM_MAX_MESSAGE_CHARS);

    let points = post.score.map(|score| format!("💬 {} points\n", score));
    let link = format!("🔗 <a href=\"{}\">Read more</a>", escape_html(&post.link));
    let signature = style
        .signature
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("\n\n<i>{}</i>", escape_html(s)));

    let title_markup = |title: &str| format!("🔥 <b>{}</b>\n\n", escape_html(title));
    let mut head = title_markup(&post.title);
    let head_len = head.chars().count();

    // Decorations in the order they are given up
    let footers = [
        [points.as_deref(), Some(link.as_str()), signature.as_deref()],
        [points.as_deref(), Some(link.as_str()), None],
        [None, Some(link.as_str()), None],
    ];
    let footer = footers
        .iter()
        .map(|parts| parts.iter().flatten().copied().collect::<String>())
        .find(|footer| head_len + footer.chars().count() <= max_chars)
        .unwrap_or_else(|| link.clone());
    let footer_len = footer.chars().count();

    if head_len + footer_len > max_chars {
        // Shrink the title until the fixed part fits; escaping may grow text so loop.
        let overflow = head_len + footer_len - max_chars;
        let mut budget = post.title.chars().count();
        while budget > 0 {
            budget = budget.saturating_sub(overflow.max(1));
            head = title_markup(&truncate_chars(&post.title, budget));
            if head.chars().count() + footer_len <= max_chars {
                break;
            }
        }
        return format!("{}{}", head, footer);
    }

    let Some(body) = post.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) else {
        return format!("{}{}", head, footer);
    };

    let available = max_chars - head_len - footer_len;
    let body_markup = fit_body(body, available);
    format!("{}{}{}", head, body_markup, footer)
}

/// Escaped body followed by a blank line, shortened so that it fits `available`.
fn fit_body(body: &str, available: usize) -> String {
    const SEP: usize = 2;
    if available <= SEP {
        return String::new();
    }

    let mut budget = body.chars().count();
    loop {
        let candidate = escape_html(&truncate_chars(body, budget));
        if candidate.is_empty() {
            return String::new();
        }
        let len = candidate.chars().count() + SEP;
        if len <= available {
            return format!("{}\n\n", candidate);
        }
        // Escaping inflates some characters, so shrink proportionally
        let scaled = budget * available / len;
        budget = scaled.min(budget - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, body: Option<&str>) -> TranslatedPost {
        TranslatedPost {
            title: title.to_string(),
            body: body.map(str::to_string),
            link: "https://example.com/a?b=1&c=2".to_string(),
            score: Some(321),
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && \"c\" > d"), "a &lt; b &amp;&amp; &quot;c&quot; &gt; d");
    }

    #[test]
    fn test_render_full_post() {
        let style = PostStyle { signature: Some("TechNewsBot".to_string()), max_chars: None };
        let rendered = render_post(&post("Rust <2024>", Some("Body text")), &style);
        assert_eq!(
            rendered,
            "🔥 <b>Rust &lt;2024&gt;</b>\n\nBody text\n\n💬 321 points\n🔗 <a href=\"https://example.com/a?b=1&amp;c=2\">Read more</a>\n\n<i>TechNewsBot</i>"
        );
    }

    #[test]
    fn test_render_without_body_or_score() {
        let mut p = post("Title", None);
        p.score = None;
        let rendered = render_post(&p, &PostStyle::default());
        assert_eq!(rendered, "🔥 <b>Title</b>\n\n🔗 <a href=\"https://example.com/a?b=1&amp;c=2\">Read more</a>");
    }

    #[test]
    fn test_long_body_is_truncated_keeping_title_and_link() {
        let body = "word ".repeat(2_000);
        let rendered = render_post(&post("Title", Some(&body)), &PostStyle::default());
        assert!(rendered.chars().count() <= TELEGRAM_MAX_MESSAGE_CHARS);
        assert!(rendered.starts_with("🔥 <b>Title</b>"));
        assert!(rendered.contains("…"));
        assert!(rendered.contains("Read more</a>"));
    }

    #[test]
    fn test_escaped_body_respects_limit() {
        let body = "&".repeat(500);
        let style = PostStyle { signature: None, max_chars: Some(300) };
        let rendered = render_post(&post("T", Some(&body)), &style);
        assert!(rendered.chars().count() <= 300);
        assert!(rendered.contains("Read more</a>"));
        assert!(!rendered.contains("&am…"));
    }

    #[test]
    fn test_oversized_title_is_shortened() {
        let title = "T".repeat(200);
        let style = PostStyle { signature: None, max_chars: Some(150) };
        let rendered = render_post(&post(&title, Some("body")), &style);
        assert!(rendered.chars().count() <= 150);
        assert!(rendered.contains("Read more</a>"));
        assert!(!rendered.contains("body"));
    }

    #[test]
    fn test_long_signature_is_dropped_to_fit() {
        let signature = "S".repeat(500);
        let style = PostStyle { signature: Some(signature), max_chars: Some(300) };
        let rendered = render_post(&post("Title", None), &style);
        assert!(rendered.chars().count() <= 300);
        assert!(rendered.starts_with("🔥 <b>Title</b>"));
        assert!(rendered.contains("💬 321 points"));
        assert!(rendered.contains("Read more</a>"));
        assert!(!rendered.contains("<i>"));
    }

    #[test]
    fn test_points_line_goes_before_title() {
        // Title markup plus link line is 75 chars, points line adds 13
        let style = PostStyle { signature: Some("Channel".to_string()), max_chars: Some(80) };
        let rendered = render_post(&post("Title", None), &style);
        assert_eq!(rendered, "🔥 <b>Title</b>\n\n🔗 <a href=\"https://example.com/a?b=1&amp;c=2\">Read more</a>");
    }

    #[test]
    fn test_fit_body_leaves_no_blank_line_when_nothing_fits() {
        assert_eq!(fit_body("&&&&", 3), "");
        assert_eq!(fit_body("abc", 5), "abc\n\n");
    }
}
