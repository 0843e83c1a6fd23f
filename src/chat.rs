use log::{info, warn};
use tokio::sync::mpsc;

use crate::api::models::{Notification, SendAck, TranscriptEntry};
use crate::api::{ApiClient, GatewayError, Instance};
use crate::config::{Contact, Settings};
use crate::poller::{PollEvent, PollHandle, Poller};

/// Shown in place of the chat once polling has given up.
pub const POLL_FAILED_MESSAGE: &str = "Application error, check the instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// Incoming only when the sender is exactly the contact's chat id.
    pub fn of(entry: &TranscriptEntry, contact_chat_id: &str) -> Self {
        if !contact_chat_id.is_empty() && entry.sender == contact_chat_id {
            Direction::Incoming
        } else {
            Direction::Outgoing
        }
    }
}

/// Messages in arrival order. Duplicates are kept.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the text carried by `notification`, if any.
    pub fn apply(&mut self, notification: Option<&Notification>) -> Option<&TranscriptEntry> {
        let entry = notification?.to_entry()?;
        self.entries.push(entry);
        self.entries.last()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Text the operator is composing.
#[derive(Debug, Default, Clone)]
pub struct Draft {
    text: String,
}

impl Draft {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Clears the draft and hands its text to a pending send. Blank drafts stay put.
    pub fn begin_send(&mut self) -> Option<PendingSend> {
        if self.text.trim().is_empty() {
            return None;
        }
        Some(PendingSend {
            text: std::mem::take(&mut self.text),
        })
    }

    /// Puts a failed send back, unless something new was typed meanwhile.
    pub fn rollback(&mut self, pending: PendingSend) -> bool {
        if self.text.is_empty() {
            self.text = pending.text;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct PendingSend {
    text: String,
}

impl PendingSend {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug)]
pub struct SendFailure {
    pub pending: PendingSend,
    pub error: GatewayError,
}

/// A send taken out of the draft. Owns everything the request needs, so
/// the session is not borrowed while it is in flight.
#[must_use]
#[derive(Debug)]
pub struct OutgoingSend {
    client: ApiClient,
    instance: Instance,
    chat_id: String,
    pending: PendingSend,
}

impl OutgoingSend {
    pub fn text(&self) -> &str {
        self.pending.text()
    }

    pub async fn deliver(self) -> Result<SendAck, SendFailure> {
        match self
            .client
            .send_message(&self.instance, &self.chat_id, self.pending.text())
            .await
        {
            Ok(ack) => {
                info!("sent message {}", ack.id_message.as_deref().unwrap_or("?"));
                Ok(ack)
            }
            Err(error) => {
                warn!("send failed: {error}");
                Err(SendFailure {
                    pending: self.pending,
                    error,
                })
            }
        }
    }
}

#[derive(Debug)]
pub enum SendOutcome {
    Sent(SendAck),
    /// `restored` tells whether the text went back into the draft.
    Failed { error: GatewayError, restored: bool },
}

#[derive(Debug)]
pub enum ChatUpdate {
    Appended {
        entry: TranscriptEntry,
        direction: Direction,
    },
    Ignored,
    Halted(GatewayError),
}

/// One contact's conversation: transcript, draft and the poller feeding them.
pub struct ChatSession {
    client: ApiClient,
    instance: Instance,
    contact: Contact,
    transcript: Transcript,
    draft: Draft,
    poller: Option<PollHandle>,
    halted: bool,
}

impl ChatSession {
    pub fn new(client: ApiClient, instance: Instance, contact: Contact) -> Self {
        Self {
            client,
            instance,
            contact,
            transcript: Transcript::new(),
            draft: Draft::default(),
            poller: None,
            halted: false,
        }
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut Draft {
        &mut self.draft
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Replaces any running poller.
    pub fn start_polling(&mut self, settings: &Settings) -> mpsc::UnboundedReceiver<PollEvent> {
        let poller = Poller::new(self.client.clone(), self.instance.clone(), settings);
        self.start_with(poller)
    }

    pub fn start_with(&mut self, poller: Poller) -> mpsc::UnboundedReceiver<PollEvent> {
        let (handle, rx) = poller.spawn();
        self.poller = Some(handle);
        self.halted = false;
        rx
    }

    pub fn stop_polling(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.stop();
        }
    }

    pub fn handle(&mut self, event: PollEvent) -> ChatUpdate {
        match event {
            PollEvent::Received(notification) => match self.transcript.apply(Some(&notification)) {
                Some(entry) => ChatUpdate::Appended {
                    direction: Direction::of(entry, &self.contact.chat_id),
                    entry: entry.clone(),
                },
                None => ChatUpdate::Ignored,
            },
            PollEvent::Failed(error) => {
                warn!("{POLL_FAILED_MESSAGE}: {error}");
                self.halted = true;
                self.stop_polling();
                ChatUpdate::Halted(error)
            }
        }
    }

    /// Takes the draft for sending and clears it. `None` for a blank draft.
    pub fn begin_send(&mut self) -> Option<OutgoingSend> {
        let pending = self.draft.begin_send()?;
        Some(OutgoingSend {
            client: self.client.clone(),
            instance: self.instance.clone(),
            chat_id: self.contact.chat_id.clone(),
            pending,
        })
    }

    /// Applies the result of [`OutgoingSend::deliver`]: a success triggers an
    /// immediate poll, a failure restores the text unless a new draft exists.
    pub fn finish_send(&mut self, result: Result<SendAck, SendFailure>) -> SendOutcome {
        match result {
            Ok(ack) => {
                if let Some(poller) = &self.poller {
                    poller.refresh();
                }
                SendOutcome::Sent(ack)
            }
            Err(failure) => {
                let restored = self.draft.rollback(failure.pending);
                SendOutcome::Failed {
                    error: failure.error,
                    restored,
                }
            }
        }
    }

    /// `begin_send`, `deliver` and `finish_send` in one go. `Ok(None)` means
    /// there was nothing to send.
    pub async fn send_draft(&mut self) -> Result<Option<SendAck>, GatewayError> {
        let Some(outgoing) = self.begin_send() else {
            return Ok(None);
        };
        let result = outgoing.deliver().await;
        match self.finish_send(result) {
            SendOutcome::Sent(ack) => Ok(Some(ack)),
            SendOutcome::Failed { error, .. } => Err(error),
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
