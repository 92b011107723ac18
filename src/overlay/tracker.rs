use std::thread;

use log::warn;

use super::{EventSink, TrackEvent};

/// Posts tracking events to the tracking endpoint from a detached thread.
/// Failures are logged and dropped; callers never wait on the network.
pub struct HttpTracker {
    endpoint: String,
    nonce: String,
}

impl HttpTracker {
    pub fn new(endpoint: impl Into<String>, nonce: impl Into<String>) -> Self {
        HttpTracker {
            endpoint: endpoint.into(),
            nonce: nonce.into(),
        }
    }

    pub fn form_params(&self, event: &TrackEvent) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("event", event.kind.as_str().to_string()),
            ("nonce", self.nonce.clone()),
            ("popover_id", event.popover_id.to_string()),
        ];
        if let Some(duration) = event.duration {
            params.push(("duration", format!("{:.3}", duration)));
        }
        params
    }
}

impl EventSink for HttpTracker {
    fn emit(&self, event: TrackEvent) {
        let url = self.endpoint.clone();
        let params = self.form_params(&event);

        thread::spawn(move || {
            let client = match reqwest::blocking::Client::builder().build() {
                Ok(c) => c,
                Err(e) => {
                    warn!("Tracking client unavailable: {}", e);
                    return;
                }
            };
            match client.post(&url).form(&params).send() {
                Ok(resp) if !resp.status().is_success() => {
                    warn!("Tracking call for {} rejected: {}", event.kind.as_str(), resp.status());
                }
                Ok(_) => {}
                Err(e) => warn!("Tracking call for {} failed: {}", event.kind.as_str(), e),
            }
        });
    }
}
