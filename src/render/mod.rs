//! Message-to-document assembly and PDF rendering.

pub mod inline;

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Result, bail};

use crate::domain::message::EmailMessage;
use crate::extract::format_date_time;

/// HTML-to-PDF capability. The core only ever hands over a complete,
/// self-contained document and takes back bytes.
pub trait DocumentRenderer {
    fn render_html(&self, html: &str) -> Result<Vec<u8>>;
}

/// Renders by piping the document through the `wkhtmltopdf` binary
/// (stdin → stdout). Page geometry comes from the document's @page rule.
pub struct WkhtmltopdfRenderer {
    binary: String,
}

impl WkhtmltopdfRenderer {
    pub fn new() -> Self {
        Self {
            binary: "wkhtmltopdf".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for WkhtmltopdfRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentRenderer for WkhtmltopdfRenderer {
    fn render_html(&self, html: &str) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.binary)
            .args(["--quiet", "--page-size", "A4", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(html.as_bytes())?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            bail!(
                "wkhtmltopdf failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }
}

/// Escape for an HTML text context.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Wrap a processed body and the message metadata in the fixed A4 page
/// template (18mm margins, page-break-avoidance on block content).
pub fn build_document_html(msg: &EmailMessage, body_html: &str) -> String {
    let cc_line = if msg.cc.is_empty() {
        String::new()
    } else {
        format!("<div><b>CC:</b> {}</div>", escape_html(&msg.cc))
    };

    format!(
        concat!(
            "<html><head><meta charset=\"UTF-8\" /><style>",
            "@page{{size:A4;margin:18mm;}}",
            "body{{font-family:Arial,sans-serif;font-size:12px;color:#222;}}",
            ".meta{{border-bottom:1px solid #ddd;margin-bottom:12px;padding-bottom:8px;}}",
            ".meta div{{margin:2px 0;}}",
            ".subject{{font-size:16px;font-weight:700;margin-bottom:6px;}}",
            "img{{max-width:100%;height:auto;}}",
            "a{{color:#1155cc;text-decoration:none;}}",
            "table{{border-collapse:collapse;}}",
            "td,th{{border:1px solid #e5e5e5;padding:4px 6px;vertical-align:top;}}",
            ".email-body,p,table,div{{page-break-inside:avoid;}}",
            "</style></head><body>",
            "<div class=\"meta\">",
            "<div class=\"subject\">{subject}</div>",
            "<div><b>From:</b> {from}</div>",
            "<div><b>To:</b> {to}</div>",
            "{cc_line}",
            "<div><b>Date:</b> {date}</div>",
            "<div><b>Message ID:</b> {id}</div>",
            "</div>",
            "<div class=\"email-body\">{body}</div>",
            "</body></html>",
        ),
        subject = escape_html(&msg.subject),
        from = escape_html(&msg.from),
        to = escape_html(&msg.to),
        cc_line = cc_line,
        date = escape_html(&format_date_time(msg.date_epoch)),
        id = escape_html(&msg.id),
        body = body_html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            id: "<order-1@mail>".into(),
            from: "\"Amazon.com\" <auto-confirm@amazon.com>".into(),
            to: "buyer@example.com".into(),
            cc: String::new(),
            subject: "Your order of \"Cable\" & more".into(),
            date_epoch: 1_714_564_800,
            plain_body: String::new(),
            html_body: "<p>hi</p>".into(),
            inline_attachments: vec![],
        }
    }

    #[test]
    fn escapes_markup_sensitive_characters() {
        assert_eq!(escape_html("a & <b>"), "a &amp; &lt;b&gt;");
    }

    #[test]
    fn document_embeds_escaped_metadata_and_body() {
        let msg = message();
        let doc = build_document_html(&msg, "<p>BODY</p>");

        assert!(doc.contains("Your order of \"Cable\" &amp; more"));
        assert!(doc.contains("&lt;auto-confirm@amazon.com&gt;"));
        assert!(doc.contains("&lt;order-1@mail&gt;"));
        assert!(doc.contains("<p>BODY</p>"));
        assert!(doc.contains("@page{size:A4;margin:18mm;}"));
        assert!(doc.contains("page-break-inside:avoid"));
    }

    #[test]
    fn cc_line_only_when_present() {
        let mut msg = message();
        assert!(!build_document_html(&msg, "").contains("<b>CC:</b>"));

        msg.cc = "other@example.com".into();
        assert!(build_document_html(&msg, "").contains("<b>CC:</b> other@example.com"));
    }
}
