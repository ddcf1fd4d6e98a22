//! Image inlining: rewrite a message body so every image reference the
//! renderer will see is a self-contained data URI.
//!
//! Two pattern classes are handled in single passes: `cid:` references
//! resolved against the message's inline attachments, and absolute
//! http(s) references fetched over the wire. Every failure keeps the
//! original reference in place; a broken image never aborts a render.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use base64::{Engine as _, engine::general_purpose};
use regex::{Captures, Regex};

use crate::domain::message::InlineAttachment;

/// References longer than this are never fetched.
pub const MAX_URL_CHARS: usize = 2000;
/// Fetched payloads above this are discarded and the reference kept.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

static CID_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)src\s*=\s*(?:"cid:([^"]+)"|'cid:([^']+)')"#).unwrap());

static LAZY_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(?:data-src|data-original)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

static SRCSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\ssrcset\s*=\s*(?:"[^"]*"|'[^']*')"#).unwrap());

static HTTP_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)src\s*=\s*(?:"(https?://[^"]+)"|'(https?://[^']+)')"#).unwrap()
});

/// Response from the HTTP capability. Transport failures surface as `Err`
/// from the adapter; HTTP-level failures travel in `status`.
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub trait Fetcher {
    fn get(&self, url: &str) -> Result<FetchResponse>;
}

/// Production fetcher: blocking client, redirects followed.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (purchase_ledger PDF embedder)")
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<FetchResponse> {
        let resp = self.client.get(url).send()?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = resp.bytes()?.to_vec();
        Ok(FetchResponse {
            status,
            content_type,
            bytes,
        })
    }
}

/// Why a remote reference was left untouched.
#[derive(Debug, PartialEq, Eq)]
pub enum KeepReason {
    UrlTooLong,
    Status(u16),
    TooLarge(usize),
    FetchFailed(String),
}

/// Outcome for a single remote image reference.
#[derive(Debug)]
pub enum ImageOutcome {
    Inlined {
        content_type: String,
        bytes: Vec<u8>,
    },
    /// Original reference stays in the document verbatim.
    Kept(KeepReason),
}

/// Resolve `src="cid:..."` references against the message's inline
/// attachments. Matching is case-insensitive with angle brackets
/// stripped; unmatched references stay unchanged.
pub fn inline_cid_images(html: &str, attachments: &[InlineAttachment]) -> String {
    if attachments.is_empty() {
        return html.to_string();
    }

    let mut by_cid: HashMap<String, String> = HashMap::new();
    for att in attachments {
        let key = att.content_id.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        let content_type = if att.content_type.is_empty() {
            "application/octet-stream"
        } else {
            att.content_type.as_str()
        };
        let data_uri = format!(
            "data:{};base64,{}",
            content_type,
            general_purpose::STANDARD.encode(&att.data)
        );
        by_cid.insert(key, data_uri);
    }

    CID_SRC
        .replace_all(html, |caps: &Captures| {
            let (cid, quote) = quoted_group(caps, 1, 2);
            let key: String = cid
                .chars()
                .filter(|c| *c != '<' && *c != '>')
                .collect::<String>()
                .trim()
                .to_lowercase();
            match by_cid.get(&key) {
                Some(uri) => format!("src={quote}{uri}{quote}"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Inline every absolute http(s) image reference as a data URI.
///
/// Lazy-loading attributes (`data-src`/`data-original`) are promoted to
/// `src` first and `srcset` attributes are dropped entirely (ambiguous,
/// unsupported by the renderer). Each fetch failure keeps the original
/// reference and is logged; nothing here is fatal.
pub fn inline_remote_images(html: &str, fetcher: &dyn Fetcher) -> String {
    let html = LAZY_SRC.replace_all(html, |caps: &Captures| {
        let (value, quote) = quoted_group(caps, 1, 2);
        format!(" src={quote}{value}{quote}")
    });
    let html = SRCSET.replace_all(&html, "");

    HTTP_SRC
        .replace_all(&html, |caps: &Captures| {
            let (raw_url, quote) = quoted_group(caps, 1, 2);
            let url = normalize_proxy_url(raw_url);
            match fetch_image(fetcher, url) {
                ImageOutcome::Inlined {
                    content_type,
                    bytes,
                } => {
                    let data_uri = format!(
                        "data:{};base64,{}",
                        content_type,
                        general_purpose::STANDARD.encode(&bytes)
                    );
                    format!("src={quote}{data_uri}{quote}")
                }
                ImageOutcome::Kept(reason) => {
                    log::debug!("keeping remote reference {url}: {reason:?}");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Fetch one image with all the guard rails applied.
pub fn fetch_image(fetcher: &dyn Fetcher, url: &str) -> ImageOutcome {
    if url.chars().count() > MAX_URL_CHARS {
        return ImageOutcome::Kept(KeepReason::UrlTooLong);
    }

    let resp = match fetcher.get(url) {
        Ok(r) => r,
        Err(e) => return ImageOutcome::Kept(KeepReason::FetchFailed(e.to_string())),
    };

    if resp.status != 200 {
        return ImageOutcome::Kept(KeepReason::Status(resp.status));
    }
    if resp.bytes.len() > MAX_IMAGE_BYTES {
        return ImageOutcome::Kept(KeepReason::TooLarge(resp.bytes.len()));
    }

    let content_type = resp
        .content_type
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| infer_content_type(url).to_string());

    ImageOutcome::Inlined {
        content_type,
        bytes: resp.bytes,
    }
}

/// Image proxies carry the real URL in the fragment; unwrap it so the
/// fetch hits the origin directly.
pub fn normalize_proxy_url(url: &str) -> &str {
    if url.to_lowercase().contains("googleusercontent.com/proxy/")
        && let Some(hash) = url.find('#')
    {
        return &url[hash + 1..];
    }
    url
}

/// Content type from the URL's path extension, for responses that omit
/// the header.
fn infer_content_type(raw: &str) -> &'static str {
    let path = match url::Url::parse(raw) {
        Ok(u) => u.path().to_lowercase(),
        Err(_) => raw.to_lowercase(),
    };

    if path.ends_with(".png") {
        "image/png"
    } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

fn quoted_group<'a>(caps: &'a Captures, double: usize, single: usize) -> (&'a str, char) {
    match caps.get(double) {
        Some(m) => (m.as_str(), '"'),
        None => (&caps[single], '\''),
    }
}
