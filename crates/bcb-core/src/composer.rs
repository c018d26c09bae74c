//! Draft transition logic.
//!
//! `advance` is a pure function from (current draft, inbound event) to (next
//! draft, output action). All I/O (loading, persisting, sending) happens in
//! the controller, which keeps this logic testable without any transport.

use regex::Regex;

use crate::{
    domain::UserId,
    draft::{BodyText, ComposedPost, Destination, Draft, DraftStage, MediaKind, MediaRef},
};

/// Inbound events, as normalized by the transport adapter.
#[derive(Clone, Debug)]
pub enum InboundEvent {
    Start,
    Text {
        content: String,
        entities: Vec<serde_json::Value>,
    },
    Photo {
        handle: String,
    },
    Video {
        handle: String,
    },
    Confirm,
    Cancel,
}

/// The instruction for the field currently being collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptKind {
    Destination,
    ButtonUrl,
    BodyText,
    ButtonLabel,
}

impl PromptKind {
    pub fn text(self) -> &'static str {
        match self {
            PromptKind::Destination => {
                "Where should this post go? Send the target group as @name or a link."
            }
            PromptKind::ButtonUrl => "Send the URL the inline button should open (https://...).",
            PromptKind::BodyText => "Send the post text.",
            PromptKind::ButtonLabel => "Send the label for the inline button.",
        }
    }
}

/// What the controller should do after a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum OutputAction {
    /// Nothing to send. Events outside a session stay silent.
    Silent,
    Prompt(PromptKind),
    /// Echo the finished draft back to the owner with confirm/cancel controls.
    Preview(ComposedPost),
    /// Send the finished post to its destination.
    Deliver(ComposedPost),
    Cancelled,
}

/// Result of one transition.
#[derive(Clone, Debug)]
pub struct Step {
    pub draft: Option<Draft>,
    pub action: OutputAction,
}

fn step(draft: Option<Draft>, action: OutputAction) -> Step {
    Step { draft, action }
}

pub fn advance(current: Option<Draft>, owner: UserId, event: InboundEvent) -> Step {
    match (current, event) {
        // Starting over always wins, even mid-flow: the fresh draft replaces
        // whatever was collected so far, attachment included.
        (_, InboundEvent::Start) => step(
            Some(Draft::new(owner)),
            OutputAction::Prompt(PromptKind::Destination),
        ),

        // Unsolicited events outside a session produce no chatter.
        (None, _) => step(None, OutputAction::Silent),

        (Some(_), InboundEvent::Cancel) => step(None, OutputAction::Cancelled),

        (Some(draft), InboundEvent::Confirm) => match draft.compose() {
            Some(post) => step(None, OutputAction::Deliver(post)),
            // Confirm is only meaningful once the draft is ready.
            None => step(Some(draft), OutputAction::Silent),
        },

        (Some(draft), InboundEvent::Photo { handle }) => {
            attach_media(draft, MediaKind::Photo, handle)
        }
        (Some(draft), InboundEvent::Video { handle }) => {
            attach_media(draft, MediaKind::Video, handle)
        }

        (Some(draft), InboundEvent::Text { content, entities }) => {
            fill_field(draft, content, entities)
        }
    }
}

/// Media may arrive at any point before the draft is ready, interleaved with
/// the text fields. Once the slot is filled the first upload wins; a stray
/// upload after Ready changes nothing.
fn attach_media(mut draft: Draft, kind: MediaKind, handle: String) -> Step {
    let Some(prompt) = current_prompt(&draft) else {
        return step(Some(draft), OutputAction::Silent);
    };

    if draft.media.is_none() {
        draft.media = Some(MediaRef { kind, handle });
    }
    step(Some(draft), OutputAction::Prompt(prompt))
}

fn current_prompt(draft: &Draft) -> Option<PromptKind> {
    match draft.stage {
        DraftStage::AwaitingDestination => Some(PromptKind::Destination),
        DraftStage::AwaitingButtonUrl { .. } => Some(PromptKind::ButtonUrl),
        DraftStage::AwaitingBodyText { .. } => Some(PromptKind::BodyText),
        DraftStage::AwaitingButtonLabel { .. } => Some(PromptKind::ButtonLabel),
        DraftStage::Ready { .. } => None,
    }
}

fn fill_field(draft: Draft, content: String, entities: Vec<serde_json::Value>) -> Step {
    let Draft {
        owner,
        media,
        stage,
    } = draft;

    let (stage, action) = match stage {
        DraftStage::AwaitingDestination => match parse_destination(content.trim()) {
            Some(destination) => (
                DraftStage::AwaitingButtonUrl { destination },
                OutputAction::Prompt(PromptKind::ButtonUrl),
            ),
            // Invalid input re-emits the same instruction; the stage does not move.
            None => (
                DraftStage::AwaitingDestination,
                OutputAction::Prompt(PromptKind::Destination),
            ),
        },

        DraftStage::AwaitingButtonUrl { destination } => {
            if is_http_url(content.trim()) {
                (
                    DraftStage::AwaitingBodyText {
                        destination,
                        button_url: content.trim().to_string(),
                    },
                    OutputAction::Prompt(PromptKind::BodyText),
                )
            } else {
                (
                    DraftStage::AwaitingButtonUrl { destination },
                    OutputAction::Prompt(PromptKind::ButtonUrl),
                )
            }
        }

        DraftStage::AwaitingBodyText {
            destination,
            button_url,
        } => (
            // Taken verbatim, formatting annotations included.
            DraftStage::AwaitingButtonLabel {
                destination,
                button_url,
                body: BodyText {
                    text: content,
                    entities,
                },
            },
            OutputAction::Prompt(PromptKind::ButtonLabel),
        ),

        DraftStage::AwaitingButtonLabel {
            destination,
            button_url,
            body,
        } => {
            let label = content.trim();
            if label.is_empty() {
                (
                    DraftStage::AwaitingButtonLabel {
                        destination,
                        button_url,
                        body,
                    },
                    OutputAction::Prompt(PromptKind::ButtonLabel),
                )
            } else {
                // Reaching Ready and emitting the preview happen together.
                let post = ComposedPost {
                    destination: destination.clone(),
                    body: body.clone(),
                    button_label: label.to_string(),
                    button_url: button_url.clone(),
                    media: media.clone(),
                };
                (
                    DraftStage::Ready {
                        destination,
                        button_url,
                        body,
                        button_label: label.to_string(),
                    },
                    OutputAction::Preview(post),
                )
            }
        }

        // Only confirm/cancel are meaningful once the draft is ready.
        ready @ DraftStage::Ready { .. } => (ready, OutputAction::Silent),
    };

    step(
        Some(Draft {
            owner,
            media,
            stage,
        }),
        action,
    )
}

/// Accepted destination shapes: `@name` with at least five alphanumeric or
/// underscore characters, or an http(s) link. Anything else is rejected and
/// the user is re-prompted rather than the input being coerced.
fn parse_destination(text: &str) -> Option<Destination> {
    if is_chat_handle(text) || is_http_url(text) {
        return Some(Destination(text.to_string()));
    }
    None
}

pub fn is_chat_handle(text: &str) -> bool {
    Regex::new(r"^@[A-Za-z0-9_]{5,}$")
        .expect("valid regex")
        .is_match(text)
}

pub fn is_http_url(text: &str) -> bool {
    Regex::new(r"^https?://\S+$")
        .expect("valid regex")
        .is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const OWNER: UserId = UserId(7);

    fn text(s: &str) -> InboundEvent {
        InboundEvent::Text {
            content: s.to_string(),
            entities: vec![],
        }
    }

    fn run(events: Vec<InboundEvent>) -> (Option<Draft>, Vec<OutputAction>) {
        let mut draft = None;
        let mut actions = Vec::new();
        for ev in events {
            let out = advance(draft, OWNER, ev);
            draft = out.draft;
            actions.push(out.action);
        }
        (draft, actions)
    }

    #[test]
    fn collects_fields_in_order_and_previews_once() {
        let (draft, actions) = run(vec![
            InboundEvent::Start,
            text("@mygroup"),
            text("https://example.com/app"),
            text("Hello world"),
            text("Open"),
        ]);

        assert_eq!(
            actions[..4],
            [
                OutputAction::Prompt(PromptKind::Destination),
                OutputAction::Prompt(PromptKind::ButtonUrl),
                OutputAction::Prompt(PromptKind::BodyText),
                OutputAction::Prompt(PromptKind::ButtonLabel),
            ]
        );

        let OutputAction::Preview(post) = &actions[4] else {
            panic!("expected a preview, got {:?}", actions[4]);
        };
        assert_eq!(post.destination, Destination("@mygroup".to_string()));
        assert_eq!(post.button_url, "https://example.com/app");
        assert_eq!(post.body.text, "Hello world");
        assert_eq!(post.button_label, "Open");
        assert_eq!(post.media, None);

        assert!(draft.unwrap().is_ready());
    }

    #[test]
    fn confirm_from_ready_delivers_and_ends_the_session() {
        let (draft, _) = run(vec![
            InboundEvent::Start,
            text("@mygroup"),
            text("https://example.com/app"),
            text("Hello world"),
            text("Open"),
        ]);

        let out = advance(draft, OWNER, InboundEvent::Confirm);
        assert!(out.draft.is_none());
        let OutputAction::Deliver(post) = out.action else {
            panic!("expected deliver");
        };
        assert_eq!(post.destination, Destination("@mygroup".to_string()));
        assert_eq!(post.media, None);

        // The session is gone, so a second confirm is a no-op.
        let again = advance(None, OWNER, InboundEvent::Confirm);
        assert!(again.draft.is_none());
        assert_eq!(again.action, OutputAction::Silent);
    }

    #[test]
    fn media_before_the_first_field_rides_along() {
        let (draft, actions) = run(vec![
            InboundEvent::Start,
            InboundEvent::Photo {
                handle: "h1".to_string(),
            },
            text("@mygroup"),
            text("https://example.com/app"),
            text("Hello world"),
            text("Open"),
        ]);

        // The photo re-prompts for the field still being collected.
        assert_eq!(actions[1], OutputAction::Prompt(PromptKind::Destination));

        let out = advance(draft, OWNER, InboundEvent::Confirm);
        let OutputAction::Deliver(post) = out.action else {
            panic!("expected deliver");
        };
        assert_eq!(
            post.media,
            Some(MediaRef {
                kind: MediaKind::Photo,
                handle: "h1".to_string(),
            })
        );
    }

    #[test]
    fn first_media_wins() {
        let (draft, _) = run(vec![
            InboundEvent::Start,
            InboundEvent::Photo {
                handle: "h1".to_string(),
            },
            text("@mygroup"),
            InboundEvent::Video {
                handle: "h2".to_string(),
            },
        ]);

        assert_eq!(
            draft.unwrap().media,
            Some(MediaRef {
                kind: MediaKind::Photo,
                handle: "h1".to_string(),
            })
        );
    }

    #[test]
    fn media_after_ready_is_ignored() {
        let (draft, mut actions) = run(vec![
            InboundEvent::Start,
            text("@mygroup"),
            text("https://example.com/app"),
            text("Hello world"),
            text("Open"),
            InboundEvent::Photo {
                handle: "late".to_string(),
            },
        ]);

        assert_eq!(actions.pop(), Some(OutputAction::Silent));
        let draft = draft.unwrap();
        assert!(draft.is_ready());
        assert_eq!(draft.media, None);
    }

    #[test]
    fn invalid_destination_reprompts_without_advancing() {
        let (draft, actions) = run(vec![InboundEvent::Start, text("not a url or handle")]);

        assert_eq!(
            actions[1],
            OutputAction::Prompt(PromptKind::Destination),
            "the same instruction is repeated"
        );
        assert_eq!(draft.unwrap().stage, DraftStage::AwaitingDestination);
    }

    #[test]
    fn invalid_button_url_reprompts_without_advancing() {
        let (draft, actions) = run(vec![
            InboundEvent::Start,
            text("@mygroup"),
            text("not a url or handle"),
        ]);

        assert_eq!(actions[2], OutputAction::Prompt(PromptKind::ButtonUrl));
        assert!(matches!(
            draft.unwrap().stage,
            DraftStage::AwaitingButtonUrl { .. }
        ));
    }

    #[test]
    fn blank_button_label_reprompts() {
        let (draft, actions) = run(vec![
            InboundEvent::Start,
            text("@mygroup"),
            text("https://example.com/app"),
            text("Hello world"),
            text("   "),
        ]);

        assert_eq!(actions[4], OutputAction::Prompt(PromptKind::ButtonLabel));
        assert!(matches!(
            draft.unwrap().stage,
            DraftStage::AwaitingButtonLabel { .. }
        ));
    }

    #[test]
    fn body_text_is_taken_verbatim_with_entities() {
        let entities = vec![json!({"type": "bold", "offset": 0, "length": 5})];
        let out = advance(
            Some(Draft {
                owner: OWNER,
                media: None,
                stage: DraftStage::AwaitingBodyText {
                    destination: Destination("@mygroup".to_string()),
                    button_url: "https://example.com".to_string(),
                },
            }),
            OWNER,
            InboundEvent::Text {
                content: "  Hello  ".to_string(),
                entities: entities.clone(),
            },
        );

        let DraftStage::AwaitingButtonLabel { body, .. } = out.draft.unwrap().stage else {
            panic!("expected the label stage");
        };
        assert_eq!(body.text, "  Hello  ", "no trimming, no coercion");
        assert_eq!(body.entities, entities);
    }

    #[test]
    fn events_without_a_session_are_silent() {
        for ev in [
            text("hello"),
            InboundEvent::Photo {
                handle: "h".to_string(),
            },
            InboundEvent::Confirm,
            InboundEvent::Cancel,
        ] {
            let out = advance(None, OWNER, ev);
            assert!(out.draft.is_none());
            assert_eq!(out.action, OutputAction::Silent);
        }
    }

    #[test]
    fn cancel_works_at_every_stage() {
        let mid = run(vec![InboundEvent::Start, text("@mygroup")]).0;
        let out = advance(mid, OWNER, InboundEvent::Cancel);
        assert!(out.draft.is_none());
        assert_eq!(out.action, OutputAction::Cancelled);

        let ready = run(vec![
            InboundEvent::Start,
            text("@mygroup"),
            text("https://example.com/app"),
            text("Hello world"),
            text("Open"),
        ])
        .0;
        let out = advance(ready, OWNER, InboundEvent::Cancel);
        assert!(out.draft.is_none());
        assert_eq!(out.action, OutputAction::Cancelled);
    }

    #[test]
    fn confirm_before_ready_is_ignored() {
        let mid = run(vec![InboundEvent::Start, text("@mygroup")]).0;
        let out = advance(mid, OWNER, InboundEvent::Confirm);
        assert_eq!(out.action, OutputAction::Silent);
        assert!(matches!(
            out.draft.unwrap().stage,
            DraftStage::AwaitingButtonUrl { .. }
        ));
    }

    #[test]
    fn start_replaces_an_existing_draft() {
        let (draft, _) = run(vec![
            InboundEvent::Start,
            InboundEvent::Photo {
                handle: "h1".to_string(),
            },
            text("@mygroup"),
            InboundEvent::Start,
        ]);

        let draft = draft.unwrap();
        assert_eq!(draft.stage, DraftStage::AwaitingDestination);
        assert_eq!(draft.media, None, "the attachment does not carry over");
    }

    #[test]
    fn destination_accepts_handles_and_links() {
        assert!(is_chat_handle("@mygroup"));
        assert!(is_chat_handle("@my_group_99"));
        assert!(!is_chat_handle("@four"), "too short after the @");
        assert!(!is_chat_handle("@my group"));
        assert!(!is_chat_handle("mygroup"));

        assert!(is_http_url("https://t.me/mygroup"));
        assert!(is_http_url("http://example.com"));
        assert!(!is_http_url("example.com"));
        assert!(!is_http_url("https:// spaced.example"));
        assert!(!is_http_url("ftp://example.com"));
    }
}
