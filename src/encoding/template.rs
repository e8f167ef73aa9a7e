use crate::types::LogRecord;

const LINE_PLACEHOLDER: &str = "{{line}}";
const TIMESTAMP_PLACEHOLDER: &str = "{{timestamp}}";

/// One piece of a parsed template.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Text(String),
    Line,
    Timestamp,
}

/// HTML fragment rendered once per record.
///
/// `{{line}}` and `{{timestamp}}` are replaced with the HTML-escaped record
/// content and RFC 3339 timestamp. Other text is copied as is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineTemplate {
    parts: Vec<Part>,
}

impl LineTemplate {
    pub fn new(source: &str) -> Self {
        let mut parts = Vec::new();
        let mut rest = source;

        while !rest.is_empty() {
            let next = [
                (rest.find(LINE_PLACEHOLDER), LINE_PLACEHOLDER, Part::Line),
                (
                    rest.find(TIMESTAMP_PLACEHOLDER),
                    TIMESTAMP_PLACEHOLDER,
                    Part::Timestamp,
                ),
            ]
            .into_iter()
            .filter_map(|(pos, token, part)| pos.map(|p| (p, token, part)))
            .min_by_key(|(pos, _, _)| *pos);

            match next {
                Some((pos, token, part)) => {
                    if pos > 0 {
                        parts.push(Part::Text(rest[..pos].to_string()));
                    }
                    parts.push(part);
                    rest = &rest[pos + token.len()..];
                }
                None => {
                    parts.push(Part::Text(rest.to_string()));
                    break;
                }
            }
        }

        Self { parts }
    }

    pub fn render(&self, record: &LogRecord) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Line => escape_html_into(&record.content, &mut out),
                Part::Timestamp => escape_html_into(&record.timestamp.to_rfc3339(), &mut out),
            }
        }
        out
    }
}

fn escape_html_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
