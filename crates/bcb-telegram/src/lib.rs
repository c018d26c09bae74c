//! Telegram adapter (teloxide).
//!
//! This crate implements the `bcb-core` DeliveryGateway over the Telegram Bot
//! API and maps incoming updates to the core event taxonomy.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageEntity, Recipient},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use bcb_core::{
    domain::{ChatId, MessageId, MessageRef},
    draft::{ComposedPost, Destination, MediaKind},
    errors::Error,
    gateway::DeliveryGateway,
    Result,
};

/// Callback payloads for the preview control buttons.
pub const CONFIRM_CALLBACK: &str = "post:confirm";
pub const CANCEL_CALLBACK: &str = "post:cancel";

const PREVIEW_QUESTION: &str = "That's the post above. Send it?";

#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }

    /// One render path for previews and deliveries: the three post shapes
    /// (text, photo+caption, video+caption), each with the single URL button.
    async fn send_post(&self, to: Recipient, post: &ComposedPost) -> Result<()> {
        let markup = InlineKeyboardMarkup::new(vec![vec![url_button(post)?]]);
        let entities = parse_entities(&post.body.entities);
        let text = post.body.text.clone();

        match &post.media {
            None => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_message(to.clone(), text.clone())
                        .reply_markup(markup.clone());
                    if !entities.is_empty() {
                        req = req.entities(entities.clone());
                    }
                    req
                })
                .await?;
            }
            Some(media) => {
                let input = InputFile::file_id(media.handle.clone());
                match media.kind {
                    MediaKind::Photo => {
                        self.with_retry(|| {
                            let mut req = self
                                .bot
                                .send_photo(to.clone(), input.clone())
                                .caption(text.clone())
                                .reply_markup(markup.clone());
                            if !entities.is_empty() {
                                req = req.caption_entities(entities.clone());
                            }
                            req
                        })
                        .await?;
                    }
                    MediaKind::Video => {
                        self.with_retry(|| {
                            let mut req = self
                                .bot
                                .send_video(to.clone(), input.clone())
                                .caption(text.clone())
                                .reply_markup(markup.clone());
                            if !entities.is_empty() {
                                req = req.caption_entities(entities.clone());
                            }
                            req
                        })
                        .await?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryGateway for TelegramGateway {
    async fn deliver(&self, post: &ComposedPost) -> Result<()> {
        let to = resolve_destination(&post.destination)?;
        self.send_post(to, post).await.map_err(|e| {
            // Cause detail stays here; callers get one uniform failure kind.
            tracing::warn!(destination = %post.destination.0, error = %e, "send failed");
            Error::Delivery(format!("could not post to {}", post.destination.0))
        })
    }

    async fn render_preview(
        &self,
        owner_chat: ChatId,
        post: &ComposedPost,
    ) -> Result<MessageRef> {
        self.send_post(Recipient::Id(Self::tg_chat(owner_chat)), post)
            .await?;

        let controls = InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("✅ Send it", CONFIRM_CALLBACK),
            InlineKeyboardButton::callback("✖️ Cancel", CANCEL_CALLBACK),
        ]]);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(owner_chat), PREVIEW_QUESTION.to_string())
                    .reply_markup(controls.clone())
            })
            .await?;

        Ok(MessageRef {
            chat_id: owner_chat,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn edit_to_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot.edit_message_text(
                Self::tg_chat(msg.chat_id),
                Self::tg_msg_id(msg.message_id),
                text.to_string(),
            )
        })
        .await?;
        Ok(())
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| self.bot.send_message(Self::tg_chat(chat), text.to_string()))
            .await?;

        Ok(MessageRef {
            chat_id: chat,
            message_id: MessageId(msg.id.0),
        })
    }
}

/// Resolve a validated destination string to something the Bot API can send
/// to. `@name` goes through as-is; t.me / telegram.me links reduce to
/// `@name`. Anything else (invite links, unrelated URLs) is undeliverable and
/// fails like every other delivery error.
pub fn resolve_destination(dest: &Destination) -> Result<Recipient> {
    let raw = dest.0.trim();
    if raw.starts_with('@') {
        return Ok(Recipient::ChannelUsername(raw.to_string()));
    }

    let name = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .and_then(|rest| {
            rest.strip_prefix("t.me/")
                .or_else(|| rest.strip_prefix("telegram.me/"))
        })
        .map(|n| n.trim_end_matches('/'));

    match name {
        Some(n) if !n.is_empty() && !n.starts_with('+') && !n.contains('/') => {
            Ok(Recipient::ChannelUsername(format!("@{n}")))
        }
        _ => Err(Error::Delivery(format!("undeliverable destination: {raw}"))),
    }
}

/// Entities travel through the core as opaque JSON; anything that fails to
/// round-trip is dropped rather than failing the send.
fn parse_entities(raw: &[serde_json::Value]) -> Vec<MessageEntity> {
    raw.iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

fn url_button(post: &ComposedPost) -> Result<InlineKeyboardButton> {
    let url = reqwest::Url::parse(&post.button_url)
        .map_err(|e| Error::Delivery(format!("bad button url {}: {e}", post.button_url)))?;
    Ok(InlineKeyboardButton::url(post.button_label.clone(), url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dest(s: &str) -> Destination {
        Destination(s.to_string())
    }

    #[test]
    fn handles_pass_through_unchanged() {
        let Recipient::ChannelUsername(name) = resolve_destination(&dest("@mygroup")).unwrap()
        else {
            panic!("expected a username recipient");
        };
        assert_eq!(name, "@mygroup");
    }

    #[test]
    fn public_links_reduce_to_handles() {
        for raw in [
            "https://t.me/mygroup",
            "http://t.me/mygroup",
            "https://telegram.me/mygroup/",
        ] {
            let Recipient::ChannelUsername(name) = resolve_destination(&dest(raw)).unwrap()
            else {
                panic!("expected a username recipient for {raw}");
            };
            assert_eq!(name, "@mygroup", "from {raw}");
        }
    }

    #[test]
    fn unresolvable_links_fail_as_delivery_errors() {
        for raw in [
            "https://t.me/+AbCdEf123",
            "https://t.me/",
            "https://t.me/a/b",
            "https://example.com/mygroup",
        ] {
            assert!(
                matches!(resolve_destination(&dest(raw)), Err(Error::Delivery(_))),
                "{raw} should be undeliverable"
            );
        }
    }

    #[test]
    fn malformed_entities_are_dropped() {
        let raw = vec![
            json!({"type": "bold", "offset": 0, "length": 5}),
            json!({"something": "else"}),
        ];
        assert_eq!(parse_entities(&raw).len(), 1);
    }

    #[test]
    fn bad_button_urls_fail_before_any_send() {
        let post = ComposedPost {
            destination: dest("@mygroup"),
            body: Default::default(),
            button_label: "Open".to_string(),
            button_url: "https://".to_string(),
            media: None,
        };
        assert!(matches!(url_button(&post), Err(Error::Delivery(_))));
    }
}
