//! Telegram implementations of the pipeline's transport seams.

use std::path::Path;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile};
use tokio::fs::File;
use tracing::debug;

use maskclip_models::{SessionId, VolumeOption};
use maskclip_worker::{MediaSource, Transport, TransportError, TransportResult};

/// Sessions are chats; the session id is the chat id in decimal.
pub fn chat_of(session_id: &SessionId) -> TransportResult<ChatId> {
    session_id
        .as_str()
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| TransportError::send_failed(format!("not a chat id: {}", session_id)))
}

pub fn session_of(chat_id: ChatId) -> SessionId {
    SessionId::from(chat_id.0)
}

/// One inline row with a button per option.
pub fn option_keyboard(options: &[VolumeOption]) -> InlineKeyboardMarkup {
    let row: Vec<InlineKeyboardButton> = options
        .iter()
        .map(|option| InlineKeyboardButton::callback(option.label(), option.token()))
        .collect();
    InlineKeyboardMarkup::new(vec![row])
}

#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, session_id: &SessionId, text: &str) -> TransportResult<()> {
        self.bot
            .send_message(chat_of(session_id)?, text)
            .await
            .map_err(|e| TransportError::send_failed(e.to_string()))?;
        Ok(())
    }

    async fn present_options(
        &self,
        session_id: &SessionId,
        prompt: &str,
        options: &[VolumeOption],
    ) -> TransportResult<()> {
        self.bot
            .send_message(chat_of(session_id)?, prompt)
            .reply_markup(option_keyboard(options))
            .await
            .map_err(|e| TransportError::send_failed(e.to_string()))?;
        Ok(())
    }

    async fn deliver(&self, session_id: &SessionId, path: &Path) -> TransportResult<()> {
        debug!(session_id = %session_id, path = %path.display(), "Uploading video");
        self.bot
            .send_video(chat_of(session_id)?, InputFile::file(path))
            .await
            .map_err(|e| TransportError::send_failed(e.to_string()))?;
        Ok(())
    }
}

/// A file stored on Telegram's servers, downloaded on demand.
pub struct TelegramFile {
    bot: Bot,
    file_id: FileId,
}

impl TelegramFile {
    pub fn new(bot: Bot, file_id: FileId) -> Self {
        Self { bot, file_id }
    }
}

#[async_trait]
impl MediaSource for TelegramFile {
    async fn fetch_to(&self, dest: &Path) -> TransportResult<()> {
        let file = self
            .bot
            .get_file(self.file_id.clone())
            .await
            .map_err(|e| TransportError::download_failed(e.to_string()))?;

        let mut out = File::create(dest).await?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| TransportError::download_failed(e.to_string()))?;
        out.sync_all().await?;

        debug!(path = %dest.display(), bytes = file.size, "Downloaded upload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_chat_roundtrip() {
        let chat = ChatId(-100_123);
        assert_eq!(chat_of(&session_of(chat)).unwrap(), chat);
        assert!(chat_of(&SessionId::new("abc")).is_err());
    }

    #[test]
    fn test_option_keyboard_layout() {
        let keyboard = option_keyboard(&VolumeOption::ALL);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        let labels: Vec<_> = keyboard.inline_keyboard[0]
            .iter()
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(labels, vec!["25%", "50%", "75%", "100%"]);
    }
}
