//! Text heuristics over order-confirmation emails.
//!
//! Everything here is a pure function over already-fetched text; no I/O.
//! The patterns are tuned to one vendor's confirmation templates and are
//! best-effort: a miss yields a sentinel or `None`, never an error.

use std::sync::LazyLock;

use chrono::{DateTime, Local};
use regex::Regex;

use crate::domain::message::EmailMessage;
use crate::domain::purchase::{ORDER_NUMBER_NOT_FOUND, Purchase};

static ORDER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Order #\s*(\d{3}-\d{7}-\d{7})").unwrap());

// Anchor line first, then the first numeric token after it. The token may
// be a subtotal if the template puts one between "Total" and the amount.
static TOTAL_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?im)^Total").unwrap());
static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$?([0-9,.]+)").unwrap());

static ILLEGAL_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|#]+"#).unwrap());
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Subject prefixes the vendor puts in front of the item title.
const TITLE_MARKERS: [&str; 2] = [
    "Your Amazon.com order of \"",
    "Your Amazon.com order for \"",
];

const MAX_SUBJECT_CHARS: usize = 120;

/// Extract a purchase record from a confirmation email.
///
/// Every field is best-effort: a missing order number becomes the
/// [`ORDER_NUMBER_NOT_FOUND`] sentinel and a missing total becomes `None`.
pub fn parse_purchase(msg: &EmailMessage) -> Option<Purchase> {
    log::debug!(
        "parsing message {} (body length {})",
        msg.id,
        msg.plain_body.len()
    );

    let order_number = extract_order_number(&msg.plain_body)
        .unwrap_or_else(|| ORDER_NUMBER_NOT_FOUND.to_string());
    let order_total = extract_order_total(&msg.plain_body);

    Some(Purchase {
        order_date: format_date(msg.date_epoch),
        order_number,
        item_title: clean_item_title(&msg.subject),
        order_total,
        message_id: msg.id.clone(),
    })
}

/// First `Order # ddd-ddddddd-ddddddd` occurrence in the body, if any.
pub fn extract_order_number(body: &str) -> Option<String> {
    ORDER_NUMBER
        .captures(body)
        .map(|caps| caps[1].to_string())
}

/// Two-phase total search: find the first line beginning with "Total",
/// then the first run of digits/commas/periods (optional `$` prefix) from
/// that point on. Missing anchor, missing token, or an unparseable token
/// all yield `None`, not zero.
pub fn extract_order_total(body: &str) -> Option<f64> {
    let anchor = TOTAL_LINE.find(body)?;
    let tail = &body[anchor.start()..];
    let caps = PRICE_TOKEN.captures(tail)?;
    let token = caps[1].replace(',', "");
    token.parse::<f64>().ok().map(round2)
}

/// Round to 2 decimal places with an epsilon correction so values that sit
/// just under a cent boundary due to binary representation round up.
pub fn round2(n: f64) -> f64 {
    ((n + f64::EPSILON) * 100.0).round() / 100.0
}

/// Item title from the subject line: strip the vendor phrase and the
/// closing `".`, fall back to the raw subject.
pub fn clean_item_title(subject: &str) -> String {
    for marker in TITLE_MARKERS {
        if let Some(pos) = subject.find(marker) {
            let rest = &subject[pos + marker.len()..];
            return rest.replacen("\".", "", 1).trim().to_string();
        }
    }
    subject.trim().to_string()
}

/// Epoch seconds as a local-time calendar date (yyyy-MM-dd).
pub fn format_date(epoch: i64) -> String {
    let utc = DateTime::from_timestamp(epoch, 0).unwrap_or_default();
    utc.with_timezone(&Local).format("%Y-%m-%d").to_string()
}

/// Epoch seconds as local date and time, used in the rendered header.
pub fn format_date_time(epoch: i64) -> String {
    let utc = DateTime::from_timestamp(epoch, 0).unwrap_or_default();
    utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Deterministic export filename: `<date> - Amazon Order <n>.pdf` when the
/// body carries an order number, else `<date> - <cleaned subject>.pdf`.
pub fn build_export_filename(msg: &EmailMessage) -> String {
    let date = format_date(msg.date_epoch);

    if let Some(number) = extract_order_number(&msg.plain_body) {
        return format!("{date} - Amazon Order {number}.pdf");
    }

    let subject = if msg.subject.is_empty() {
        "No Subject"
    } else {
        msg.subject.as_str()
    };
    format!("{date} - {}.pdf", sanitize_subject(subject))
}

/// Strip characters that are illegal in filenames, collapse whitespace
/// runs, trim, and cap the length.
fn sanitize_subject(subject: &str) -> String {
    let cleaned = ILLEGAL_FILENAME.replace_all(subject, " ");
    let collapsed = WHITESPACE_RUN.replace_all(&cleaned, " ");
    collapsed.trim().chars().take(MAX_SUBJECT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(subject: &str, plain_body: &str) -> EmailMessage {
        EmailMessage {
            id: "<test@mail>".into(),
            from: "auto-confirm@amazon.com".into(),
            to: "me@example.com".into(),
            cc: String::new(),
            subject: subject.into(),
            date_epoch: 1_714_564_800, // 2024-05-01 12:00 UTC
            plain_body: plain_body.into(),
            html_body: String::new(),
            inline_attachments: vec![],
        }
    }

    #[test]
    fn order_number_found() {
        let body = "Thanks!\nOrder # 123-4567890-1234567\nTotal\n$45.67";
        assert_eq!(
            extract_order_number(body).as_deref(),
            Some("123-4567890-1234567")
        );
    }

    #[test]
    fn order_number_case_insensitive_and_spaced() {
        let body = "your ORDER #  123-4567890-1234567 shipped";
        assert_eq!(
            extract_order_number(body).as_deref(),
            Some("123-4567890-1234567")
        );
    }

    #[test]
    fn order_number_missing_is_none() {
        assert_eq!(extract_order_number("no identifiers here"), None);
    }

    #[test]
    fn parse_maps_missing_order_number_to_sentinel() {
        let parsed = parse_purchase(&message("Hello", "nothing to see")).unwrap();
        assert_eq!(parsed.order_number, ORDER_NUMBER_NOT_FOUND);
        assert_eq!(parsed.order_total, None);
    }

    #[test]
    fn total_simple_dollar_amount() {
        assert_eq!(extract_order_total("Items\nTotal\n$45.67\nBye"), Some(45.67));
    }

    #[test]
    fn total_with_thousands_separator_no_symbol() {
        assert_eq!(extract_order_total("Total: 10,000.5"), Some(10000.5));
    }

    #[test]
    fn total_anchor_must_start_line() {
        // "Subtotal" does not anchor; no standalone Total line means None.
        assert_eq!(extract_order_total("Subtotal\n$9"), None);
    }

    #[test]
    fn total_line_without_numeric_token_is_none() {
        assert_eq!(extract_order_total("Total\nno numbers"), None);
    }

    #[test]
    fn total_missing_entirely_is_none() {
        assert_eq!(extract_order_total("just text"), None);
    }

    #[test]
    fn round2_epsilon_corrects_representation_error() {
        assert_eq!(round2(19.999999999998), 20.0);
        assert_eq!(round2(45.674), 45.67);
        assert_eq!(round2(45.675), 45.68);
    }

    #[test]
    fn title_stripped_from_order_of_phrase() {
        let s = "Your Amazon.com order of \"USB C Cable 2m\".";
        assert_eq!(clean_item_title(s), "USB C Cable 2m");
    }

    #[test]
    fn title_stripped_from_order_for_phrase() {
        let s = "Your Amazon.com order for \"Coffee Beans\".";
        assert_eq!(clean_item_title(s), "Coffee Beans");
    }

    #[test]
    fn title_falls_back_to_raw_subject() {
        assert_eq!(clean_item_title("  Shipping update  "), "Shipping update");
    }

    #[test]
    fn date_formats_as_calendar_date() {
        let d = format_date(1_714_564_800);
        assert_eq!(d.len(), 10);
        assert!(d.chars().nth(4) == Some('-') && d.chars().nth(7) == Some('-'));
    }

    #[test]
    fn filename_uses_order_number_when_found() {
        let msg = message("whatever", "Order # 123-4567890-1234567");
        let date = format_date(msg.date_epoch);
        assert_eq!(
            build_export_filename(&msg),
            format!("{date} - Amazon Order 123-4567890-1234567.pdf")
        );
    }

    #[test]
    fn filename_sanitizes_subject_when_no_order_number() {
        let msg = message("Re: invoice #42 <urgent?>", "plain text");
        let date = format_date(msg.date_epoch);
        assert_eq!(
            build_export_filename(&msg),
            format!("{date} - Re invoice 42 urgent.pdf")
        );
    }

    #[test]
    fn filename_truncates_long_subjects() {
        let msg = message(&"x".repeat(300), "plain text");
        let name = build_export_filename(&msg);
        // date + " - " + 120 chars + ".pdf"
        assert_eq!(name.len(), 10 + 3 + 120 + 4);
    }

    #[test]
    fn filename_empty_subject_fallback() {
        let msg = message("", "plain text");
        let date = format_date(msg.date_epoch);
        assert_eq!(build_export_filename(&msg), format!("{date} - No Subject.pdf"));
    }
}
