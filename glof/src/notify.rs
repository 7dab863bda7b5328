//! Alert delivery.

use crate::error::AlertDeliveryError;
use log::info;
use std::{collections::HashSet, sync::Mutex};

/// Transport for hazard alerts (email, SMS, push, ...).
pub trait NotificationSink: Send + Sync {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AlertDeliveryError>;
}

/// Writes every alert to the log at `info` and never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AlertDeliveryError> {
        info!("alert; to: {recipient}, subject: {subject}, body: {}", body.trim());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Collects delivered alerts in memory.
///
/// Recipients registered with [MemorySink::failing_for] are refused.
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<Message>>,
    refuse: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_for(mut self, recipient: &str) -> Self {
        self.refuse.insert(recipient.to_owned());
        self
    }

    /// Returns a copy of every delivered message, in send order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for MemorySink {
    fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AlertDeliveryError> {
        if self.refuse.contains(recipient) {
            return Err(AlertDeliveryError {
                recipient: recipient.to_owned(),
                reason: "recipient refused".to_owned(),
            });
        }
        let mut sent = self.sent.lock().map_err(|_| AlertDeliveryError {
            recipient: recipient.to_owned(),
            reason: "sink poisoned".to_owned(),
        })?;
        sent.push(Message {
            recipient: recipient.to_owned(),
            subject: subject.to_owned(),
            body: body.to_owned(),
        });
        Ok(())
    }
}
