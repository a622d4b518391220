//! Per-user conversation collecting a generation request
//!
//! A session walks `AwaitingMode -> AwaitingLyrics -> AwaitingTitle ->
//! [AwaitingTags] -> Ready`, one field per inbound message. Tags are only
//! collected in custom mode.

use std::sync::Arc;

use chorus_config::UnrecognizedModePolicy;
use chorus_suno::GenerationRequest;
use dashmap::DashMap;
use uuid::Uuid;

use crate::chat::ChannelRef;

pub const MODE_PROMPT: &str = "Select mode: custom or not. 🤔\nType \"custom\" or \"default\".";
pub const LYRICS_PROMPT: &str = "🎤 Send lyrics first.";
pub const DESCRIPTION_PROMPT: &str = "🎤 Send song description.";
pub const TITLE_PROMPT: &str = "🎼 Please provide a title for your song.";
pub const TAGS_PROMPT: &str = "🎹 Now send tags.\n\nExample: Classical";

/// Shape of the generation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plain song description
    Default,
    /// Lyrics plus style tags
    Custom,
}

impl Mode {
    fn parse(input: &str) -> Option<Self> {
        if input.eq_ignore_ascii_case("custom") {
            Some(Self::Custom)
        } else if input.eq_ignore_ascii_case("default") {
            Some(Self::Default)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingMode,
    AwaitingLyrics,
    AwaitingTitle,
    AwaitingTags,
    Ready,
}

/// Input that cannot fill the current field
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("empty input while {0:?}")]
    Empty(Stage),
}

impl ValidationError {
    /// Prompt to repeat so the user can try again
    pub const fn prompt(self, mode: Option<Mode>) -> &'static str {
        match self {
            Self::Empty(stage) => stage_prompt(stage, mode),
        }
    }
}

/// Result of feeding one message to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Field stored; ask for the next one
    Prompt(&'static str),
    /// Input not recognized and deliberately left unanswered
    Ignored,
    /// Input rejected; the stage did not advance
    Invalid(ValidationError),
    /// All fields collected
    Ready(CompletedRequest),
}

/// Every field of a finished conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRequest {
    pub mode: Mode,
    pub lyrics: String,
    pub title: String,
    pub tags: Option<String>,
}

impl CompletedRequest {
    /// Parameters for the remote generation call
    pub fn generation_request(&self) -> GenerationRequest {
        match self.mode {
            Mode::Default => GenerationRequest::describe(self.lyrics.clone()),
            Mode::Custom => GenerationRequest::custom(
                self.lyrics.clone(),
                self.tags.clone().unwrap_or_default(),
                Some(self.title.clone()),
            ),
        }
    }
}

/// One user's in-progress conversation
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    channel: ChannelRef,
    stage: Stage,
    mode: Option<Mode>,
    lyrics: Option<String>,
    title: Option<String>,
    tags: Option<String>,
}

impl Session {
    pub fn new(channel: ChannelRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            stage: Stage::AwaitingMode,
            mode: None,
            lyrics: None,
            title: None,
            tags: None,
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn channel(&self) -> &ChannelRef {
        &self.channel
    }

    pub const fn stage(&self) -> Stage {
        self.stage
    }

    pub const fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn lyrics(&self) -> Option<&str> {
        self.lyrics.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn tags(&self) -> Option<&str> {
        self.tags.as_deref()
    }

    /// Store `input` in the next unfilled field
    pub fn apply(&mut self, input: &str, policy: UnrecognizedModePolicy) -> Step {
        let input = input.trim();

        match self.stage {
            Stage::AwaitingMode => match Mode::parse(input) {
                Some(mode) => {
                    self.mode = Some(mode);
                    self.stage = Stage::AwaitingLyrics;
                    Step::Prompt(stage_prompt(Stage::AwaitingLyrics, Some(mode)))
                }
                None => match policy {
                    UnrecognizedModePolicy::Ignore => Step::Ignored,
                    UnrecognizedModePolicy::Reprompt => Step::Prompt(MODE_PROMPT),
                },
            },
            Stage::Ready => Step::Ignored,
            stage if input.is_empty() => Step::Invalid(ValidationError::Empty(stage)),
            Stage::AwaitingLyrics => {
                self.lyrics = Some(input.to_owned());
                self.stage = Stage::AwaitingTitle;
                Step::Prompt(TITLE_PROMPT)
            }
            Stage::AwaitingTitle => {
                self.title = Some(input.to_owned());
                if self.mode == Some(Mode::Custom) {
                    self.stage = Stage::AwaitingTags;
                    Step::Prompt(TAGS_PROMPT)
                } else {
                    self.finish()
                }
            }
            Stage::AwaitingTags => {
                self.tags = Some(input.to_owned());
                self.finish()
            }
        }
    }

    fn finish(&mut self) -> Step {
        let (Some(mode), Some(lyrics), Some(title)) = (self.mode, self.lyrics.clone(), self.title.clone()) else {
            return Step::Ignored;
        };

        self.stage = Stage::Ready;
        Step::Ready(CompletedRequest {
            mode,
            lyrics,
            title,
            tags: if mode == Mode::Custom { self.tags.clone() } else { None },
        })
    }
}

const fn stage_prompt(stage: Stage, mode: Option<Mode>) -> &'static str {
    match (stage, mode) {
        (Stage::AwaitingLyrics, Some(Mode::Custom)) => LYRICS_PROMPT,
        (Stage::AwaitingLyrics, _) => DESCRIPTION_PROMPT,
        (Stage::AwaitingTitle, _) => TITLE_PROMPT,
        (Stage::AwaitingTags, _) => TAGS_PROMPT,
        (Stage::AwaitingMode | Stage::Ready, _) => MODE_PROMPT,
    }
}

/// A session step together with where to answer
#[derive(Debug, Clone)]
pub struct Advance {
    pub session_id: Uuid,
    pub channel: ChannelRef,
    pub mode: Option<Mode>,
    pub step: Step,
}

/// Active sessions keyed by actor id
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a fresh session, discarding any previous one for this actor
    pub fn start(&self, actor_id: &str, channel: ChannelRef) -> Uuid {
        let session = Session::new(channel);
        let id = session.id();
        self.sessions.insert(actor_id.to_owned(), session);
        id
    }

    /// Feed a message to the actor's session, if there is one
    pub fn apply(&self, actor_id: &str, input: &str, policy: UnrecognizedModePolicy) -> Option<Advance> {
        let mut session = self.sessions.get_mut(actor_id)?;
        let step = session.apply(input, policy);

        Some(Advance {
            session_id: session.id(),
            channel: session.channel().clone(),
            mode: session.mode(),
            step,
        })
    }

    /// Drop the actor's session; returns whether one existed
    pub fn cancel(&self, actor_id: &str) -> bool {
        self.sessions.remove(actor_id).is_some()
    }

    /// Remove the session only if it is still the one identified by `session_id`
    pub fn finish(&self, actor_id: &str, session_id: Uuid) -> bool {
        self.sessions
            .remove_if(actor_id, |_, session| session.id() == session_id)
            .is_some()
    }

    pub fn get(&self, actor_id: &str) -> Option<Session> {
        self.sessions.get(actor_id).map(|s| s.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IGNORE: UnrecognizedModePolicy = UnrecognizedModePolicy::Ignore;

    fn channel() -> ChannelRef {
        ChannelRef {
            id: "room".to_string(),
            private: false,
        }
    }

    #[test]
    fn default_mode_collects_description_and_title() {
        let mut session = Session::new(channel());

        assert_eq!(session.apply("Default", IGNORE), Step::Prompt(DESCRIPTION_PROMPT));
        assert_eq!(session.apply("a song about rain", IGNORE), Step::Prompt(TITLE_PROMPT));

        let Step::Ready(request) = session.apply("Rain Song", IGNORE) else {
            panic!("expected ready");
        };
        assert_eq!(
            request,
            CompletedRequest {
                mode: Mode::Default,
                lyrics: "a song about rain".to_string(),
                title: "Rain Song".to_string(),
                tags: None,
            }
        );
        assert_eq!(session.stage(), Stage::Ready);

        let generation = request.generation_request();
        assert_eq!(generation.prompt, "a song about rain");
        assert_eq!(generation.tags, None);
        assert!(!generation.is_custom);
        assert!(generation.wait_for_completion);
    }

    #[test]
    fn custom_mode_collects_tags_last() {
        let mut session = Session::new(channel());

        assert_eq!(session.apply("CUSTOM", IGNORE), Step::Prompt(LYRICS_PROMPT));
        assert_eq!(session.apply("la la la", IGNORE), Step::Prompt(TITLE_PROMPT));
        assert_eq!(session.apply("Song", IGNORE), Step::Prompt(TAGS_PROMPT));
        assert_eq!(session.stage(), Stage::AwaitingTags);

        let Step::Ready(request) = session.apply("Classical", IGNORE) else {
            panic!("expected ready");
        };
        assert_eq!(request.mode, Mode::Custom);
        assert_eq!(request.tags.as_deref(), Some("Classical"));

        let generation = request.generation_request();
        assert!(generation.is_custom);
        assert_eq!(generation.tags.as_deref(), Some("Classical"));
        assert_eq!(generation.title.as_deref(), Some("Song"));
    }

    #[test]
    fn unrecognized_mode_does_not_advance() {
        let mut session = Session::new(channel());

        assert_eq!(session.apply("jazz please", IGNORE), Step::Ignored);
        assert_eq!(session.stage(), Stage::AwaitingMode);

        assert_eq!(
            session.apply("jazz please", UnrecognizedModePolicy::Reprompt),
            Step::Prompt(MODE_PROMPT)
        );
        assert_eq!(session.stage(), Stage::AwaitingMode);
        assert_eq!(session.mode(), None);
    }

    #[test]
    fn empty_input_is_rejected_without_advancing() {
        let mut session = Session::new(channel());
        session.apply("custom", IGNORE);

        let step = session.apply("   ", IGNORE);
        assert_eq!(step, Step::Invalid(ValidationError::Empty(Stage::AwaitingLyrics)));
        assert_eq!(ValidationError::Empty(Stage::AwaitingLyrics).prompt(Some(Mode::Custom)), LYRICS_PROMPT);
        assert_eq!(session.stage(), Stage::AwaitingLyrics);
        assert_eq!(session.lyrics(), None);
    }

    #[test]
    fn input_is_trimmed() {
        let mut session = Session::new(channel());
        session.apply("  default ", IGNORE);
        session.apply("  rain \n", IGNORE);
        assert_eq!(session.lyrics(), Some("rain"));
    }

    #[test]
    fn ready_session_ignores_further_input() {
        let mut session = Session::new(channel());
        for input in ["default", "rain", "Rain Song"] {
            session.apply(input, IGNORE);
        }

        assert_eq!(session.apply("more", IGNORE), Step::Ignored);
        assert_eq!(session.title(), Some("Rain Song"));
    }

    #[test]
    fn store_cancel_then_restart_is_fresh() {
        let store = SessionStore::new();
        store.start("u1", channel());
        store.apply("u1", "custom", IGNORE);
        store.apply("u1", "lyrics", IGNORE);

        assert!(store.cancel("u1"));
        assert!(!store.cancel("u1"));
        assert!(store.apply("u1", "custom", IGNORE).is_none());

        store.start("u1", channel());
        let session = store.get("u1").unwrap();
        assert_eq!(session.stage(), Stage::AwaitingMode);
        assert_eq!(session.mode(), None);
        assert_eq!(session.lyrics(), None);
    }

    #[test]
    fn finish_only_removes_matching_session() {
        let store = SessionStore::new();
        let old = store.start("u1", channel());
        let new = store.start("u1", channel());

        assert!(!store.finish("u1", old));
        assert_eq!(store.len(), 1);
        assert!(store.finish("u1", new));
        assert!(store.is_empty());
    }

    #[test]
    fn sessions_are_independent_per_actor() {
        let store = SessionStore::new();
        store.start("u1", channel());
        store.start("u2", channel());

        store.apply("u1", "custom", IGNORE);

        assert_eq!(store.get("u1").unwrap().stage(), Stage::AwaitingLyrics);
        assert_eq!(store.get("u2").unwrap().stage(), Stage::AwaitingMode);
    }
}
