// src/render.rs
//! Wraps the finished issue body in a standalone HTML document.

use chrono::NaiveDate;

pub const DOCUMENT_TITLE: &str = "The Paddock Pub Chat";
pub const VOTE_URL: &str = "https://api.prixsix.com/vote";

const STYLE: &str = r#"  body {
    max-width: 680px; margin: 0 auto; padding: 24px;
    font-family: Georgia, 'Times New Roman', serif;
    background: #f9f9f9; color: #1a1a2e; line-height: 1.6;
  }
  h1 {
    text-align: center; color: #e10600;
    border-bottom: 3px solid #e10600; padding-bottom: 8px;
  }
  h3 { color: #15151e; margin-top: 28px; }
  b { color: #e10600; }
  ul { padding-left: 20px; }
  li { margin-bottom: 6px; }
  .date { text-align: center; color: #666; font-size: 14px; }
  .vote { text-align: center; margin-top: 40px; padding: 20px; border-top: 2px solid #e10600; }
  .vote p { font-size: 18px; font-weight: bold; color: #1a1a2e; }
  .vote a {
    display: inline-block; margin: 8px 12px; padding: 12px 28px;
    color: #fff; text-decoration: none; border-radius: 6px;
    font-weight: bold; font-size: 16px;
  }
  .vote a.love { background: #00d200; }
  .vote a.hate { background: #e10600; }
"#;

/// "Rate this issue" block with love / hate links.
pub fn voting_footer(vote_url: &str) -> String {
    let url = html_escape::encode_double_quoted_attribute(vote_url);
    format!(
        r#"<div class="vote">
  <p>Rate this issue</p>
  <a class="love" href="{url}?type=love">&#127937; Chequered Flag (Love it)</a>
  <a class="hate" href="{url}?type=hate">&#x1F3F4; Black Flag (Disqualified)</a>
</div>"#
    )
}

/// Full document: head with inline CSS, dated header, body as-is, footer.
/// The body is trusted HTML from the edit phase and is not escaped.
pub fn build_html(body: &str, date: NaiveDate) -> String {
    let date_str = date.format("%d %B %Y").to_string();
    let date_esc = html_escape::encode_text(&date_str);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{DOCUMENT_TITLE} - {date_esc}</title>\n<style>\n{STYLE}</style>\n</head>\n<body>\n\
         <h1>&#127937; {DOCUMENT_TITLE}</h1>\n<p class=\"date\">{date_esc}</p>\n\
         {body}\n{footer}\n</body>\n</html>\n",
        footer = voting_footer(VOTE_URL),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 6).unwrap()
    }

    #[test]
    fn document_has_date_body_and_footer() {
        let html = build_html("<h3>QUOTE OF THE DAY</h3>", d());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>The Paddock Pub Chat - 06 July 2025</title>"));
        assert!(html.contains("<p class=\"date\">06 July 2025</p>"));
        assert!(html.contains("<h3>QUOTE OF THE DAY</h3>"));
        assert!(html.contains("https://api.prixsix.com/vote?type=love"));
        assert!(html.contains("https://api.prixsix.com/vote?type=hate"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn body_precedes_footer() {
        let html = build_html("<p>BODY</p>", d());
        let b = html.find("<p>BODY</p>").unwrap();
        let f = html.find("Rate this issue").unwrap();
        assert!(b < f);
    }

    #[test]
    fn footer_escapes_url() {
        let f = voting_footer("https://x.test/v\"ote");
        assert!(!f.contains("v\"ote"));
    }
}
