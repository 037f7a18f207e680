//! Chat history read-through over the Durable Ledger.
//!
//! Live messages flow through the Presence Store; the ledger only keeps the
//! durable backup. These helpers page through that backup with the
//! configured page size, oldest-first within each page.

use chrono::{DateTime, Utc};

use studyhub_core::AppResult;
use studyhub_core::traits::ledger::ChatMessage;

use crate::session::SessionContext;

/// Read the newest page of the room's chat history.
pub async fn newest_page(ctx: &SessionContext) -> AppResult<Vec<ChatMessage>> {
    page_before(ctx, None).await
}

/// Read the page of history strictly older than `before`.
///
/// Pass the `sent_at` of the oldest message already loaded to scroll back;
/// an empty page means the history is exhausted.
pub async fn page_before(
    ctx: &SessionContext,
    before: Option<DateTime<Utc>>,
) -> AppResult<Vec<ChatMessage>> {
    ctx.ledger()
        .chat_history(ctx.room(), before, ctx.config().chat.history_page_size)
        .await
}

/// Back up a sent message to the ledger.
pub async fn backup_message(ctx: &SessionContext, text: &str) -> AppResult<()> {
    let message = ChatMessage {
        room: ctx.room(),
        sender: ctx.identity().uid,
        username: ctx.identity().username.clone(),
        text: text.to_string(),
        sent_at: ctx.store().server_now(),
    };
    ctx.ledger().send_chat(&message).await
}
