use notify_rust::Notification;

/// Transient desktop notification carrying the run summary.
///
/// Best-effort: no notification server is a logged warning, never a
/// failed run.
pub fn notify_summary(title: &str, body: &str) {
    if let Err(e) = Notification::new().summary(title).body(body).show() {
        log::warn!("Notification error: {e}");
    }
}
