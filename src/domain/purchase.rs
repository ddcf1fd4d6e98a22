use crate::domain::message::MessageId;

/// Sentinel stored when no order number could be found in the body.
pub const ORDER_NUMBER_NOT_FOUND: &str = "Not Found";

/// One ledger row, extracted from a single confirmation email.
/// Rows are appended and never updated; re-runs are prevented by the
/// message-id dedup set, not by upserts.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    /// Calendar date (yyyy-MM-dd) in the local time zone.
    pub order_date: String,
    /// Vendor order id, or [`ORDER_NUMBER_NOT_FOUND`].
    pub order_number: String,
    pub item_title: String,
    /// Rounded to 2 decimal places; `None` when the body carried no total.
    pub order_total: Option<f64>,
    pub message_id: MessageId,
}
