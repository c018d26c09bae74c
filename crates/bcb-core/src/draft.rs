use serde::{Deserialize, Serialize};

use crate::domain::UserId;

/// Target chat for a finished post: `@name` or an http(s) link.
///
/// Stored as the validated raw text; the transport adapter resolves it to a
/// concrete chat handle at delivery time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination(pub String);

/// Message text plus the formatting entities it arrived with.
///
/// Entities are opaque transport payloads, carried verbatim and handed back to
/// the adapter unchanged when the post is rendered.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyText {
    pub text: String,
    pub entities: Vec<serde_json::Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
}

/// Reference to an already-uploaded media file, by transport file id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub handle: String,
}

/// Where the draft is in the field-collection sequence.
///
/// Each variant carries exactly the fields collected so far, so a draft can
/// never claim to be further along than its data supports.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DraftStage {
    AwaitingDestination,
    AwaitingButtonUrl {
        destination: Destination,
    },
    AwaitingBodyText {
        destination: Destination,
        button_url: String,
    },
    AwaitingButtonLabel {
        destination: Destination,
        button_url: String,
        body: BodyText,
    },
    Ready {
        destination: Destination,
        button_url: String,
        body: BodyText,
        button_label: String,
    },
}

/// One user's in-progress post. At most one exists per owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub owner: UserId,
    /// Optional attachment; may arrive at any point before the draft is ready.
    pub media: Option<MediaRef>,
    pub stage: DraftStage,
}

impl Draft {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            media: None,
            stage: DraftStage::AwaitingDestination,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.stage, DraftStage::Ready { .. })
    }

    /// The finished post, if every required field has been collected.
    pub fn compose(&self) -> Option<ComposedPost> {
        let DraftStage::Ready {
            destination,
            button_url,
            body,
            button_label,
        } = &self.stage
        else {
            return None;
        };

        Some(ComposedPost {
            destination: destination.clone(),
            body: body.clone(),
            button_label: button_label.clone(),
            button_url: button_url.clone(),
            media: self.media.clone(),
        })
    }
}

/// A fully assembled post, ready to preview or deliver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComposedPost {
    pub destination: Destination,
    pub body: BodyText,
    pub button_label: String,
    pub button_url: String,
    pub media: Option<MediaRef>,
}
