//! Notification routing for display nodes
//!
//! Maps a decoded request to the announcement shown to passengers. Only
//! arrivals and departures are announced; the remaining events are known but
//! produce nothing, so adding one means adding a match arm.

use tokio::sync::mpsc;

use crate::protocol::{Packet, TrainEvent};

/// Default platform announced by a display node
pub const DEFAULT_PLATFORM: &str = "1";

/// Announcement text with `{destination}` and `{platform}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementTemplates {
    pub platform: String,
    pub arriving: String,
    pub departing: String,
}

impl Default for AnnouncementTemplates {
    fn default() -> Self {
        Self {
            platform: DEFAULT_PLATFORM.to_string(),
            arriving: "Mohon perhatian, kereta tujuan {destination} akan tiba di Peron {platform}."
                .to_string(),
            departing:
                "Mohon perhatian, kereta tujuan {destination} akan diberangkatkan dari Peron {platform}."
                    .to_string(),
        }
    }
}

impl AnnouncementTemplates {
    /// Substitute placeholders in one pass; inserted values are never rescanned
    fn render(&self, template: &str, packet: &Packet) -> String {
        let mut out = String::with_capacity(template.len() + packet.destination().len());
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            if let Some(after) = tail.strip_prefix("{destination}") {
                out.push_str(packet.destination());
                rest = after;
            } else if let Some(after) = tail.strip_prefix("{platform}") {
                out.push_str(&self.platform);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Pure mapping from packet flags to announcement text
#[derive(Debug, Clone, Default)]
pub struct NotificationRouter {
    templates: AnnouncementTemplates,
}

impl NotificationRouter {
    pub fn new(templates: AnnouncementTemplates) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &AnnouncementTemplates {
        &self.templates
    }

    /// Announcement for a request, if its event has one
    pub fn route(&self, packet: &Packet) -> Option<String> {
        if packet.is_ack() {
            return None;
        }

        match packet.event() {
            Ok(Some(TrainEvent::Arriving)) => {
                Some(self.templates.render(&self.templates.arriving, packet))
            }
            Ok(Some(TrainEvent::Departing)) => {
                Some(self.templates.render(&self.templates.departing, packet))
            }
            Ok(Some(TrainEvent::New | TrainEvent::Update | TrainEvent::Delete)) => None,
            Ok(None) => None,
            Err(_) => None,
        }
    }
}

/// An announcement produced for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub transaction_id: u16,
    pub train_number: u16,
    pub message: String,
}

/// Where display nodes emit announcements
pub trait NotificationSink: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

/// Prints announcements to the operator console
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, notification: Notification) {
        println!("{}", notification.message);
    }
}

impl NotificationSink for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}
