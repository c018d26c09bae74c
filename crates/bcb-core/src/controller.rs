use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::{
    composer::{advance, InboundEvent, OutputAction},
    domain::{ChatId, MessageRef, UserId},
    draft::ComposedPost,
    gateway::DeliveryGateway,
    store::DraftStore,
    Result,
};

/// Where replies for one inbound event should go.
#[derive(Clone, Copy, Debug)]
pub struct EventContext {
    pub owner: UserId,
    /// The owner's private chat.
    pub chat: ChatId,
    /// The preview control message, when the event came from its buttons.
    pub preview: Option<MessageRef>,
}

/// Serializes event handling per owner.
///
/// Two near-simultaneous events from the same user (a double-tapped confirm,
/// a message racing a button press) must not interleave their
/// read-modify-write cycles on the store.
#[derive(Default)]
pub struct OwnerLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    pub async fn lock_owner(&self, owner: UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(owner.0)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

mod replies {
    pub const CANCELLED: &str = "Cancelled. Send /start to compose a new post.";
    pub const GENERIC_ERROR: &str =
        "⚠️ Something went wrong and your draft was discarded. Send /start to begin again.";

    pub fn delivered(destination: &str) -> String {
        format!("✅ Posted to {destination}.")
    }

    pub fn delivery_failed(destination: &str) -> String {
        format!(
            "❌ Couldn't post to {destination}. Make sure the bot can write there, then /start again."
        )
    }
}

/// Orchestrates the read-decide-write-act cycle around the pure transition
/// function: load the draft fresh, advance it, persist or delete, then run
/// the side effects through the gateway.
pub struct SessionController {
    store: Arc<dyn DraftStore>,
    gateway: Arc<dyn DeliveryGateway>,
    draft_ttl: Duration,
    locks: OwnerLocks,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn DraftStore>,
        gateway: Arc<dyn DeliveryGateway>,
        draft_ttl: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            draft_ttl,
            locks: OwnerLocks::default(),
        }
    }

    /// Handle one inbound event end to end. Never surfaces an error to the
    /// transport: any failure discards the owner's draft and reports a
    /// generic failure, so a corrupt draft cannot be resumed.
    pub async fn handle_event(&self, ctx: EventContext, event: InboundEvent) {
        if let Err(e) = self.process(ctx, event).await {
            warn!(owner = ctx.owner.0, error = %e, "event handling failed; discarding draft");
            let _ = self.store.delete(ctx.owner).await;
            let _ = self.gateway.send_text(ctx.chat, replies::GENERIC_ERROR).await;
        }
    }

    async fn process(&self, ctx: EventContext, event: InboundEvent) -> Result<()> {
        // Decide and commit the next state under the owner lock, then release
        // it before any network sends. Deleting the draft before issuing
        // delivery is what makes a double-tapped confirm a no-op instead of a
        // double post.
        let action = {
            let _guard = self.locks.lock_owner(ctx.owner).await;
            let current = self.store.get(ctx.owner).await?;
            let next = advance(current, ctx.owner, event);
            match &next.draft {
                Some(draft) => self.store.put(draft.clone(), self.draft_ttl).await?,
                None => self.store.delete(ctx.owner).await?,
            }
            next.action
        };

        match action {
            OutputAction::Silent => Ok(()),
            OutputAction::Prompt(kind) => {
                self.gateway.send_text(ctx.chat, kind.text()).await?;
                Ok(())
            }
            OutputAction::Preview(post) => {
                self.gateway.render_preview(ctx.chat, &post).await?;
                Ok(())
            }
            OutputAction::Deliver(post) => self.deliver(ctx, post).await,
            OutputAction::Cancelled => self.report(ctx, replies::CANCELLED).await,
        }
    }

    async fn deliver(&self, ctx: EventContext, post: ComposedPost) -> Result<()> {
        let destination = post.destination.0.clone();
        match self.gateway.deliver(&post).await {
            Ok(()) => self.report(ctx, &replies::delivered(&destination)).await,
            Err(e) => {
                // The draft is already gone; the user restarts the flow.
                warn!(destination = %destination, error = %e, "delivery failed");
                self.report(ctx, &replies::delivery_failed(&destination)).await
            }
        }
    }

    /// Status lines land on the preview control message when there is one.
    async fn report(&self, ctx: EventContext, text: &str) -> Result<()> {
        if let Some(msg) = ctx.preview {
            if self.gateway.edit_to_text(msg, text).await.is_ok() {
                return Ok(());
            }
        }
        self.gateway.send_text(ctx.chat, text).await?;
        Ok(())
    }
}
