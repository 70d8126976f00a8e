//! Telegram updates mapped onto pipeline events.

use std::fmt::Display;
use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::FileMeta;
use tracing::{debug, warn};

use maskclip_models::{MediaDescriptor, MediaKind};
use maskclip_worker::{EventDispatcher, InboundEvent, OptionSelectedEvent, UploadEvent};

use crate::telegram::{session_of, TelegramFile};

/// Handle an incoming message.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<EventDispatcher>,
) -> ResponseResult<()> {
    let event = message_event(&bot, &msg);
    spawn_dispatch(dispatcher, event);
    Ok(())
}

/// Handle a press on one of the volume buttons.
pub async fn handle_callback_query(
    bot: Bot,
    q: CallbackQuery,
    dispatcher: Arc<EventDispatcher>,
) -> ResponseResult<()> {
    // Stop the client's spinner before the slow part.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(error = %e, "Failed to answer callback query");
    }

    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));
    let Some(token) = q.data else {
        debug!(chat_id = %chat_id, "Callback query without data");
        return Ok(());
    };

    spawn_dispatch(
        dispatcher,
        InboundEvent::OptionSelected(OptionSelectedEvent {
            session_id: session_of(chat_id),
            token,
        }),
    );
    Ok(())
}

/// Run the event on its own task so a long pipeline never holds up the chat's update queue.
fn spawn_dispatch(dispatcher: Arc<EventDispatcher>, event: InboundEvent) {
    tokio::spawn(async move {
        // Errors are answered and logged by the dispatcher.
        let _ = dispatcher.dispatch(event).await;
    });
}

fn message_event(bot: &Bot, msg: &Message) -> InboundEvent {
    let session_id = session_of(msg.chat.id);

    if let Some((descriptor, file)) = upload_of(msg) {
        return InboundEvent::Upload(UploadEvent {
            session_id,
            descriptor,
            payload: Box::new(TelegramFile::new(bot.clone(), file.id.clone())),
        });
    }

    match msg.text() {
        Some(text) if is_start_command(text) => InboundEvent::Start { session_id },
        _ => InboundEvent::Other { session_id },
    }
}

/// Descriptor and file handle of any media attached to `msg`.
fn upload_of(msg: &Message) -> Option<(MediaDescriptor, &FileMeta)> {
    if let Some(video) = msg.video() {
        let descriptor = with_mime(
            MediaDescriptor::new(MediaKind::Video, video.file.size.into()),
            video.mime_type.as_ref(),
        );
        return Some((descriptor, &video.file));
    }
    if let Some(note) = msg.video_note() {
        return Some((
            MediaDescriptor::new(MediaKind::VideoNote, note.file.size.into()),
            &note.file,
        ));
    }
    if let Some(animation) = msg.animation() {
        return Some((
            MediaDescriptor::new(MediaKind::Animation, animation.file.size.into()),
            &animation.file,
        ));
    }
    if let Some(doc) = msg.document() {
        let mut descriptor = with_mime(
            MediaDescriptor::new(MediaKind::Document, doc.file.size.into()),
            doc.mime_type.as_ref(),
        );
        if let Some(name) = &doc.file_name {
            descriptor = descriptor.with_file_name(name.clone());
        }
        return Some((descriptor, &doc.file));
    }
    if let Some(audio) = msg.audio() {
        return Some((
            MediaDescriptor::new(MediaKind::Audio, audio.file.size.into()),
            &audio.file,
        ));
    }
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some((
            MediaDescriptor::new(MediaKind::Photo, photo.file.size.into()),
            &photo.file,
        ));
    }
    None
}

fn with_mime(descriptor: MediaDescriptor, mime: Option<impl Display>) -> MediaDescriptor {
    match mime {
        Some(mime) => descriptor.with_mime_type(mime.to_string()),
        None => descriptor,
    }
}

fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    command == "/start" || command.starts_with("/start@")
}
