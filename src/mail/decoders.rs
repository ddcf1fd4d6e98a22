//! Raw RFC822 → domain message decoding.

use anyhow::Result;
use mailparse::{MailHeaderMap, ParsedMail};

use crate::domain::message::{EmailMessage, InlineAttachment};

/// Parse a raw RFC822 message into the domain shape.
///
/// `fallback_id` is used when the message carries no Message-ID header,
/// so every message still has a stable dedup identity.
pub fn parse_message(raw: &[u8], fallback_id: &str) -> Result<EmailMessage> {
    let parsed = mailparse::parse_mail(raw)?;

    let id = parsed
        .headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback_id.to_string());

    let date_epoch = parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .unwrap_or(0);

    let header = |name: &str| {
        parsed
            .headers
            .get_first_value(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let html_body = extract_part(&parsed, "text/html").unwrap_or_default();
    let plain_body =
        extract_part(&parsed, "text/plain").unwrap_or_else(|| html_to_text(&html_body));

    let mut inline_attachments = Vec::new();
    collect_inline_attachments(&parsed, &mut inline_attachments);

    Ok(EmailMessage {
        id,
        from: header("From"),
        to: header("To"),
        cc: header("Cc"),
        subject: header("Subject"),
        date_epoch,
        plain_body,
        html_body,
        inline_attachments,
    })
}

/// Depth-first search for the first part of the given media type.
fn extract_part(p: &ParsedMail, mimetype: &str) -> Option<String> {
    if p.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return p.get_body().ok();
    }

    for sp in &p.subparts {
        if let Some(t) = extract_part(sp, mimetype) {
            return Some(t);
        }
    }

    None
}

/// Best-effort plain text for HTML-only messages.
fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    html2text::from_read(html.as_bytes(), 80).unwrap_or_default()
}

/// Collect every subpart that carries a Content-ID, with the transfer
/// encoding already decoded. Angle brackets are stripped from the id.
fn collect_inline_attachments(p: &ParsedMail, out: &mut Vec<InlineAttachment>) {
    for sp in &p.subparts {
        if let Some(cid) = sp.headers.get_first_value("Content-ID") {
            let content_id: String = cid
                .chars()
                .filter(|c| *c != '<' && *c != '>')
                .collect::<String>()
                .trim()
                .to_string();

            if !content_id.is_empty()
                && let Ok(data) = sp.get_body_raw()
            {
                out.push(InlineAttachment {
                    content_id,
                    content_type: sp.ctype.mimetype.clone(),
                    data,
                });
            }
        }
        collect_inline_attachments(sp, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = concat!(
        "Message-ID: <order-1@mailer.amazon.com>\r\n",
        "From: \"Amazon.com\" <auto-confirm@amazon.com>\r\n",
        "To: buyer@example.com\r\n",
        "Subject: Your Amazon.com order of \"USB C Cable\".\r\n",
        "Date: Wed, 01 May 2024 12:00:00 +0000\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/related; boundary=\"BOUND\"\r\n",
        "\r\n",
        "--BOUND\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "Order # 123-4567890-1234567\r\n",
        "Total\r\n",
        "$45.67\r\n",
        "--BOUND\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<html><body><img src=\"cid:logo\"></body></html>\r\n",
        "--BOUND\r\n",
        "Content-Type: image/png\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "Content-ID: <logo>\r\n",
        "\r\n",
        "iVBORw0KGgo=\r\n",
        "--BOUND--\r\n",
    );

    #[test]
    fn decodes_multipart_message() {
        let msg = parse_message(MULTIPART.as_bytes(), "uid:1").unwrap();

        assert_eq!(msg.id, "<order-1@mailer.amazon.com>");
        assert!(msg.from.contains("auto-confirm@amazon.com"));
        assert_eq!(msg.subject, "Your Amazon.com order of \"USB C Cable\".");
        assert_eq!(msg.date_epoch, 1_714_564_800);
        assert!(msg.plain_body.contains("Order # 123-4567890-1234567"));
        assert!(msg.html_body.contains("cid:logo"));
    }

    #[test]
    fn decodes_inline_attachment_with_stripped_cid() {
        let msg = parse_message(MULTIPART.as_bytes(), "uid:1").unwrap();

        assert_eq!(msg.inline_attachments.len(), 1);
        let att = &msg.inline_attachments[0];
        assert_eq!(att.content_id, "logo");
        assert_eq!(att.content_type, "image/png");
        // base64 "iVBORw0KGgo=" is the PNG signature
        assert_eq!(att.data, b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn html_only_message_gets_derived_plain_body() {
        let raw = concat!(
            "From: a@b.c\r\n",
            "Subject: hi\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<html><body><p>Total</p><p>$9.99</p></body></html>\r\n",
        );
        let msg = parse_message(raw.as_bytes(), "uid:7").unwrap();
        assert_eq!(msg.id, "uid:7");
        assert!(msg.plain_body.contains("Total"));
        assert!(msg.plain_body.contains("$9.99"));
    }

    #[test]
    fn missing_headers_default_to_empty() {
        let raw = "Content-Type: text/plain\r\n\r\nhello\r\n";
        let msg = parse_message(raw.as_bytes(), "uid:9").unwrap();
        assert_eq!(msg.subject, "");
        assert_eq!(msg.cc, "");
        assert_eq!(msg.date_epoch, 0);
        assert!(msg.plain_body.contains("hello"));
    }
}
