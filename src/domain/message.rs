/// Opaque message identifier: the RFC 5322 Message-ID when the header is
/// present, otherwise a UID-derived fallback. Only membership matters.
pub type MessageId = String;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub id: MessageId,
    pub from: String,
    pub to: String,
    pub cc: String,
    pub subject: String,
    pub date_epoch: i64,
    pub plain_body: String,
    pub html_body: String,
    pub inline_attachments: Vec<InlineAttachment>,
}

/// An inline MIME part referenced from the HTML body via `cid:`.
#[derive(Debug, Clone)]
pub struct InlineAttachment {
    /// Content-ID with angle brackets already stripped.
    pub content_id: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A conversation thread in store-defined message order.
#[derive(Debug, Clone)]
pub struct MailThread {
    pub messages: Vec<EmailMessage>,
}
