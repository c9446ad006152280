//! Per-chat mutable state: AI-chat mode and pending admin selections.
//!
//! The store is the only shared mutable resource in the router. The outer map
//! is locked just long enough to fetch or insert a per-chat cell; all state
//! reads and transitions then serialize on that chat's own mutex. A cell
//! mutex is never held across a collaborator call.

use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};

/// AI-chat mode state for one chat. Presence means `Active`.
#[derive(Debug, Clone)]
pub struct AiSession {
    /// Opaque continuity value handed back by the conversational
    /// collaborator; `None` until the first reply carries one.
    pub conversation_token: Option<String>,
    pub last_activity: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Enable,
    Disable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub id: String,
    pub display_name: String,
}

/// A pending multi-choice admin flow awaiting a 1-based numeric reply.
#[derive(Debug, Clone)]
pub struct SelectionSession {
    pub action: PolicyAction,
    pub candidates: Vec<Candidate>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Default)]
pub struct ChatState {
    pub ai: Option<AiSession>,
    pub selection: Option<SelectionSession>,
}

#[derive(Debug, Default)]
pub struct SessionStore {
    chats: RwLock<HashMap<String, Arc<Mutex<ChatState>>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-chat cell, created lazily.
    pub async fn chat(&self, chat_id: &str) -> Arc<Mutex<ChatState>> {
        {
            let chats = self.chats.read().await;
            if let Some(cell) = chats.get(chat_id) {
                return Arc::clone(cell);
            }
        }
        let mut chats = self.chats.write().await;
        Arc::clone(chats.entry(chat_id.to_owned()).or_default())
    }

    pub async fn activate_ai(&self, chat_id: &str, now: OffsetDateTime) {
        let cell = self.chat(chat_id).await;
        let mut state = cell.lock().await;
        // Activation always starts a fresh conversation.
        state.ai = Some(AiSession {
            conversation_token: None,
            last_activity: now,
        });
    }

    pub async fn deactivate_ai(&self, chat_id: &str) {
        let cell = self.chat(chat_id).await;
        cell.lock().await.ai = None;
    }

    pub async fn is_ai_active(&self, chat_id: &str) -> bool {
        let cell = self.chat(chat_id).await;
        let state = cell.lock().await;
        state.ai.is_some()
    }

    /// Refreshes the activity timestamp and returns the current continuation
    /// token, if AI mode is active.
    pub async fn touch_ai(&self, chat_id: &str, now: OffsetDateTime) -> Option<Option<String>> {
        let cell = self.chat(chat_id).await;
        let mut state = cell.lock().await;
        state.ai.as_mut().map(|ai| {
            ai.last_activity = now;
            ai.conversation_token.clone()
        })
    }

    /// Stores a new continuation token. `None` retains the previous token.
    pub async fn update_ai_token(&self, chat_id: &str, token: Option<String>) {
        if token.is_none() {
            return;
        }
        let cell = self.chat(chat_id).await;
        let mut state = cell.lock().await;
        if let Some(ai) = state.ai.as_mut() {
            ai.conversation_token = token;
        }
    }

    /// Lazy timeout monitor: deactivates an AI session whose idle time
    /// exceeds `timeout` and reports whether it fired.
    pub async fn expire_idle_ai(
        &self,
        chat_id: &str,
        timeout: Duration,
        now: OffsetDateTime,
    ) -> bool {
        let cell = self.chat(chat_id).await;
        let mut state = cell.lock().await;
        let expired = state
            .ai
            .as_ref()
            .is_some_and(|ai| now - ai.last_activity > timeout);
        if expired {
            state.ai = None;
        }
        expired
    }

    /// Starts a selection flow, replacing any unconsumed one for this chat.
    pub async fn begin_selection(&self, chat_id: &str, session: SelectionSession) {
        let cell = self.chat(chat_id).await;
        cell.lock().await.selection = Some(session);
    }

    pub async fn selection(&self, chat_id: &str) -> Option<SelectionSession> {
        let cell = self.chat(chat_id).await;
        let state = cell.lock().await;
        state.selection.clone()
    }

    pub async fn end_selection(&self, chat_id: &str) {
        let cell = self.chat(chat_id).await;
        cell.lock().await.selection = None;
    }
}
