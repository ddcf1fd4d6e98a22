use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose};
use native_tls::TlsConnector;

use crate::domain::message::MailThread;
use crate::mail::decoders::parse_message;
use crate::mail::{LabelRef, Mailbox};

/// How to authenticate the IMAP session: an app password for LOGIN, or a
/// pre-minted OAuth2 access token for XOAUTH2.
#[derive(Clone)]
pub enum Credential {
    Password(String),
    AccessToken(String),
}

/// Build canonical XOAUTH2 auth string as bytes.
fn build_xoauth2_bytes(user: &str, access_token: &str) -> Vec<u8> {
    let user_field = format!("user={}", user);
    let auth_field = format!("auth=Bearer {}", access_token);
    let auth_string = format!("{}{}{}{}{}", user_field, "\x01", auth_field, "\x01", "\x01");
    auth_string.into_bytes()
}

struct OAuth2Authenticator {
    response: Vec<u8>,
}

impl imap::Authenticator for OAuth2Authenticator {
    type Response = Vec<u8>;
    fn process(&self, _challenge: &[u8]) -> Self::Response {
        self.response.clone()
    }
}

type ImapSession = imap::Session<native_tls::TlsStream<std::net::TcpStream>>;

/// Blocking IMAP adapter behind the [`Mailbox`] capability.
///
/// Opens one session per call and logs out before returning; runs are
/// short and paginated, so no connection is held across calls.
pub struct ImapMailbox {
    server: String,
    user: String,
    credential: Credential,
}

impl ImapMailbox {
    pub fn new(
        server: impl Into<String>,
        user: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            server: server.into(),
            user: user.into(),
            credential,
        }
    }

    fn connect_and_auth(&self) -> Result<ImapSession> {
        let tls = TlsConnector::builder().build()?;
        let mut client = imap::connect((self.server.as_str(), 993), self.server.as_str(), &tls)?;

        match &self.credential {
            Credential::Password(password) => client
                .login(self.user.as_str(), password.as_str())
                .map_err(|(e, _)| anyhow!("LOGIN failed: {e}")),

            Credential::AccessToken(token) => {
                let raw_payload = build_xoauth2_bytes(&self.user, token);

                // Try RAW first
                let auth_raw = OAuth2Authenticator {
                    response: raw_payload.clone(),
                };
                match client.authenticate("XOAUTH2", &auth_raw) {
                    Ok(session) => return Ok(session),
                    Err((_e, returned_client)) => {
                        client = returned_client;
                    }
                }

                // Fallback BASE64
                let b64_bytes = general_purpose::STANDARD.encode(&raw_payload).into_bytes();
                let auth_b64 = OAuth2Authenticator {
                    response: b64_bytes,
                };
                match client.authenticate("XOAUTH2", &auth_b64) {
                    Ok(session) => Ok(session),
                    Err((e, _)) => Err(anyhow!("XOAUTH2 failed (raw+base64): {e}")),
                }
            }
        }
    }
}

impl Mailbox for ImapMailbox {
    fn find_label(&self, name: &str) -> Result<LabelRef> {
        let mut session = self.connect_and_auth()?;
        let examined = session.examine(name);
        session.logout()?;

        match examined {
            Ok(_) => Ok(LabelRef {
                name: name.to_string(),
            }),
            Err(e) => Err(anyhow!("mailbox label {name:?} not found: {e}")),
        }
    }

    /// Page of threads, newest first. IMAP folders are flat, so each
    /// message stands alone as its own single-message thread.
    fn list_threads(
        &self,
        label: &LabelRef,
        start: usize,
        page_size: usize,
    ) -> Result<Vec<MailThread>> {
        let mut session = self.connect_and_auth()?;
        session.select(label.name.as_str())?;

        let mut uids: Vec<u32> = session.uid_search("ALL")?.into_iter().collect();
        if uids.is_empty() {
            session.logout()?;
            return Ok(vec![]);
        }
        uids.sort_unstable_by(|a, b| b.cmp(a)); // descending UID ~ newest first

        let page_uids: Vec<u32> = uids.into_iter().skip(start).take(page_size).collect();

        let mut out = Vec::with_capacity(page_uids.len());
        for uid in page_uids {
            let fetches = session.uid_fetch(uid.to_string(), "(UID BODY.PEEK[])")?;
            let f = match fetches.iter().next() {
                Some(x) => x,
                None => continue,
            };

            let raw = match f.body() {
                Some(b) => b,
                None => {
                    log::warn!("UID {uid}: fetch returned no body, skipping");
                    continue;
                }
            };

            match parse_message(raw, &format!("uid:{uid}")) {
                Ok(msg) => out.push(MailThread {
                    messages: vec![msg],
                }),
                Err(e) => log::warn!("UID {uid}: undecodable message skipped: {e}"),
            }
        }

        session.logout()?;
        Ok(out)
    }
}
