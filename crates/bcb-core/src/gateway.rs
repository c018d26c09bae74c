use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    draft::ComposedPost,
    Result,
};

/// Transport port for everything the bot says.
///
/// Telegram is the first implementation; the shape leaves room for other
/// messengers behind the same interface.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Send the finished post to its destination chat: text-only, photo with
    /// caption, or video with caption, each with exactly one inline URL
    /// button. All transport failures collapse into `Error::Delivery`; only
    /// the adapter distinguishes causes, and only for its logs.
    async fn deliver(&self, post: &ComposedPost) -> Result<()>;

    /// Echo the post to its owner exactly as it would be delivered, followed
    /// by a confirm/cancel control message. Returns the control message so
    /// the outcome can later be edited into it.
    async fn render_preview(&self, owner_chat: ChatId, post: &ComposedPost)
        -> Result<MessageRef>;

    /// Replace a previously sent control message with a status line.
    async fn edit_to_text(&self, msg: MessageRef, text: &str) -> Result<()>;

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MessageRef>;
}
