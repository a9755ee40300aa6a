use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::classifier::IntentClassifier;
use crate::conversation::{ConversationStore, ConversationTurn, Role};
use crate::intents::{IntentFile, IntentStore};
use crate::llm::{GenerativeBackend, Prompt};
use crate::matching::{first_overlap, LexicalMatcher};
use crate::nlp::token_set;

/// Bottom of the fallback chain
pub const APOLOGY: &str = "Sorry, I couldn't process your request.";

/// Where a reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStage {
    LexicalMatch,
    StatisticalMatch,
    PermissiveLexicalFallback,
    GenerativeFallback,
    DefaultIntentFallback,
    HardFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub reply: String,
    pub stage: RouteStage,
}

impl RouteOutcome {
    fn new(reply: String, stage: RouteStage) -> Self {
        Self { reply, stage }
    }
}

fn non_blank(reply: Option<String>) -> Option<String> {
    reply.filter(|text| !text.trim().is_empty())
}

/// Multi-turn model input must open with a user turn
fn context_window(mut turns: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    let start = turns
        .iter()
        .position(|turn| turn.role == Role::User)
        .unwrap_or(turns.len());
    turns.drain(..start);
    turns
}

/// Decides which source answers a message.
///
/// Cheap deterministic stages run first, the model call last:
/// lexical match, classifier, permissive overlap, generative model,
/// `default` intent, apology. The first stage that produces a reply wins.
pub struct MessageRouter {
    intents: Arc<IntentStore>,
    matcher: LexicalMatcher,
    classifier: Option<Arc<dyn IntentClassifier>>,
    classifier_floor: f32,
    permissive_fallback: bool,
    generator: Arc<dyn GenerativeBackend>,
    conversations: ConversationStore,
    context_turns: usize,
}

impl MessageRouter {
    pub fn new(
        intents: Arc<IntentStore>,
        matcher: LexicalMatcher,
        generator: Arc<dyn GenerativeBackend>,
        conversations: ConversationStore,
    ) -> Self {
        let context_turns = conversations.max_turns();
        Self {
            intents,
            matcher,
            classifier: None,
            classifier_floor: 0.65,
            permissive_fallback: true,
            generator,
            conversations,
            context_turns,
        }
    }

    pub fn with_classifier(
        mut self,
        classifier: Option<Arc<dyn IntentClassifier>>,
        confidence_floor: f32,
    ) -> Self {
        self.classifier = classifier;
        self.classifier_floor = confidence_floor;
        self
    }

    pub fn with_permissive_fallback(mut self, enabled: bool) -> Self {
        self.permissive_fallback = enabled;
        self
    }

    pub fn with_context_turns(mut self, turns: usize) -> Self {
        self.context_turns = turns;
        self
    }

    pub fn classifier_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn intents(&self) -> &Arc<IntentStore> {
        &self.intents
    }

    /// Route one message. Never fails: the apology string is the last resort.
    pub async fn route(&self, message: &str, session_id: Option<&str>) -> RouteOutcome {
        self.route_with(message, session_id, false).await
    }

    /// Route one message, optionally dropping the session history first.
    ///
    /// Requests of the same session are handled one at a time, so a reset
    /// can never interleave with an in-flight exchange of that session.
    pub async fn route_with(
        &self,
        message: &str,
        session_id: Option<&str>,
        clear_history: bool,
    ) -> RouteOutcome {
        let _guard = match session_id {
            Some(id) => Some(self.conversations.serialize(id).await),
            None => None,
        };

        if clear_history {
            if let Some(id) = session_id {
                self.conversations.clear(id);
            }
        }

        let intents = self.intents.current().await;
        let tokens = token_set(message);

        let outcome = match self.match_locally(&tokens, &intents) {
            Some(outcome) => outcome,
            None => match self.generate(message, session_id).await {
                Some(reply) => RouteOutcome::new(reply, RouteStage::GenerativeFallback),
                None => self.last_resort(&intents),
            },
        };

        info!(
            "Routed message (len={}, session={:?}) via {:?}",
            message.len(),
            session_id,
            outcome.stage
        );
        outcome
    }

    /// Stages that need no I/O: lexical, classifier, permissive overlap
    fn match_locally(&self, tokens: &HashSet<String>, intents: &IntentFile) -> Option<RouteOutcome> {
        let mut rng = rand::rng();

        if let Some(reply) = non_blank(self.matcher.match_intent(tokens, &intents.intents, &mut rng)) {
            return Some(RouteOutcome::new(reply, RouteStage::LexicalMatch));
        }

        if let Some(classifier) = &self.classifier {
            if let Some(prediction) = classifier.classify(tokens) {
                if prediction.confidence > self.classifier_floor {
                    let reply = intents
                        .active()
                        .find(|intent| intent.tag == prediction.tag)
                        .and_then(|intent| intent.pick_response(&mut rng));
                    if let Some(reply) = non_blank(reply) {
                        return Some(RouteOutcome::new(reply, RouteStage::StatisticalMatch));
                    }
                } else {
                    debug!(
                        "Classifier confidence {:.3} below floor {:.3}",
                        prediction.confidence, self.classifier_floor
                    );
                }
            }
        }

        if self.permissive_fallback {
            if let Some(reply) = non_blank(first_overlap(tokens, &intents.intents, &mut rng)) {
                return Some(RouteOutcome::new(reply, RouteStage::PermissiveLexicalFallback));
            }
        }

        None
    }

    /// Call the model, with session history when there is any, and record
    /// the exchange on success. The caller holds the session gate.
    async fn generate(&self, message: &str, session_id: Option<&str>) -> Option<String> {
        let Some(session_id) = session_id else {
            return non_blank(
                self.generator
                    .generate(&Prompt::Message(message.to_string()))
                    .await,
            );
        };

        let history = context_window(self.conversations.get_recent(session_id, self.context_turns));
        let prompt = if history.is_empty() {
            Prompt::Message(message.to_string())
        } else {
            debug!("Sending {} turns of context for session {}", history.len(), session_id);
            let mut turns = history;
            turns.push(ConversationTurn::user(message));
            Prompt::Conversation(turns)
        };

        let reply = non_blank(self.generator.generate(&prompt).await)?;

        self.conversations.append(session_id, ConversationTurn::user(message));
        self.conversations
            .append(session_id, ConversationTurn::assistant(reply.clone()));

        Some(reply)
    }

    fn last_resort(&self, intents: &IntentFile) -> RouteOutcome {
        let reply = intents
            .default_intent()
            .and_then(|intent| intent.pick_response(&mut rand::rng()));

        match non_blank(reply) {
            Some(reply) => RouteOutcome::new(reply, RouteStage::DefaultIntentFallback),
            None => {
                warn!("No default intent available, replying with apology");
                RouteOutcome::new(APOLOGY.to_string(), RouteStage::HardFailure)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classification;
    use crate::intents::Intent;
    use crate::llm::MockGenerativeBackend;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    const INTENTS: &str = r#"{
        "intents": [
            {"tag": "greeting", "patterns": ["hello", "good morning"], "responses": ["Hi!", "Hello, how can I help?"]},
            {"tag": "office", "patterns": ["where is the department office"], "responses": ["Eshetu Chole Building, floors 1 to 6."]},
            {"tag": "default", "patterns": [], "responses": ["Please contact the department office."]}
        ]
    }"#;

    const INTENTS_NO_DEFAULT: &str = r#"{
        "intents": [
            {"tag": "greeting", "patterns": ["hello"], "responses": ["Hi!"]}
        ]
    }"#;

    async fn store(content: &str) -> (TempDir, Arc<IntentStore>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("intents.json");
        tokio::fs::write(&path, content).await.unwrap();
        (dir, Arc::new(IntentStore::open(&path).await.unwrap()))
    }

    fn failing_backend() -> Arc<dyn GenerativeBackend> {
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().returning(|_| None);
        Arc::new(mock)
    }

    fn router(intents: Arc<IntentStore>, generator: Arc<dyn GenerativeBackend>) -> MessageRouter {
        MessageRouter::new(
            intents,
            LexicalMatcher::new(0.85),
            generator,
            ConversationStore::new(10),
        )
    }

    /// Answers "reply N" and remembers every prompt it saw
    #[derive(Default)]
    struct RecordingBackend {
        prompts: Mutex<Vec<Prompt>>,
    }

    #[async_trait]
    impl GenerativeBackend for RecordingBackend {
        async fn generate(&self, prompt: &Prompt) -> Option<String> {
            let mut prompts = self.prompts.lock();
            prompts.push(prompt.clone());
            Some(format!("reply {}", prompts.len()))
        }
    }

    struct FixedClassifier(Classification);

    impl IntentClassifier for FixedClassifier {
        fn classify(&self, _tokens: &HashSet<String>) -> Option<Classification> {
            Some(self.0.clone())
        }
    }

    fn fixed(tag: &str, confidence: f32) -> Option<Arc<dyn IntentClassifier>> {
        Some(Arc::new(FixedClassifier(Classification {
            tag: tag.into(),
            confidence,
        })))
    }

    #[tokio::test]
    async fn test_exact_pattern_returns_canned_response() {
        let (_dir, intents) = store(INTENTS).await;
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().never();
        let router = router(intents, Arc::new(mock));

        let outcome = router.route("hello", None).await;
        assert_eq!(outcome.stage, RouteStage::LexicalMatch);
        assert!(["Hi!", "Hello, how can I help?"].contains(&outcome.reply.as_str()));
    }

    #[tokio::test]
    async fn test_no_overlap_and_failing_model_uses_default_intent() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, failing_backend());

        let outcome = router.route("scholarship deadlines", None).await;
        assert_eq!(outcome.stage, RouteStage::DefaultIntentFallback);
        assert_eq!(outcome.reply, "Please contact the department office.");
    }

    #[tokio::test]
    async fn test_no_default_intent_gives_apology() {
        let (_dir, intents) = store(INTENTS_NO_DEFAULT).await;
        let router = router(intents, failing_backend());

        let outcome = router.route("scholarship deadlines", None).await;
        assert_eq!(outcome.stage, RouteStage::HardFailure);
        assert_eq!(outcome.reply, APOLOGY);
    }

    #[tokio::test]
    async fn test_added_intent_is_matched_on_next_message() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents.clone(), failing_backend());

        intents
            .add_intent(Intent::new(
                "greeting_short",
                vec!["hi".into(), "hey".into()],
                vec!["Hello!".into()],
            ))
            .await
            .unwrap();

        let outcome = router.route("hey", None).await;
        assert_eq!(outcome.stage, RouteStage::LexicalMatch);
        assert_eq!(outcome.reply, "Hello!");
    }

    #[tokio::test]
    async fn test_session_history_sent_as_context() {
        let (_dir, intents) = store(INTENTS).await;
        let backend = Arc::new(RecordingBackend::default());
        let router = router(intents, backend.clone());

        let first = router.route("tell me about scholarships", Some("s1")).await;
        assert_eq!(first.stage, RouteStage::GenerativeFallback);
        let second = router.route("what about internships", Some("s1")).await;
        assert_eq!(second.reply, "reply 2");

        let prompts = backend.prompts.lock();
        assert_eq!(prompts[0], Prompt::Message("tell me about scholarships".into()));
        assert_eq!(
            prompts[1],
            Prompt::Conversation(vec![
                ConversationTurn::user("tell me about scholarships"),
                ConversationTurn::assistant("reply 1"),
                ConversationTurn::user("what about internships"),
            ])
        );
    }

    #[tokio::test]
    async fn test_cleared_session_sends_bare_message() {
        let (_dir, intents) = store(INTENTS).await;
        let backend = Arc::new(RecordingBackend::default());
        let router = router(intents, backend.clone());

        router.route("tell me about scholarships", Some("s1")).await;
        router.conversations().clear("s1");
        assert!(router.conversations().get_recent("s1", 10).is_empty());
        router.route("what about internships", Some("s1")).await;

        let prompts = backend.prompts.lock();
        assert_eq!(prompts[1], Prompt::Message("what about internships".into()));
    }

    /// Like `RecordingBackend`, but holds every call for a while
    #[derive(Default)]
    struct SlowBackend {
        prompts: Mutex<Vec<Prompt>>,
    }

    #[async_trait]
    impl GenerativeBackend for SlowBackend {
        async fn generate(&self, prompt: &Prompt) -> Option<String> {
            let n = {
                let mut prompts = self.prompts.lock();
                prompts.push(prompt.clone());
                prompts.len()
            };
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Some(format!("reply {}", n))
        }
    }

    #[tokio::test]
    async fn test_clear_history_waits_for_in_flight_exchange() {
        let (_dir, intents) = store(INTENTS).await;
        let backend = Arc::new(SlowBackend::default());
        let router = Arc::new(router(intents, backend.clone()));

        let first = {
            let router = router.clone();
            tokio::spawn(async move { router.route("tell me about scholarships", Some("s")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let second = router.route_with("and internships", Some("s"), true).await;
        let first = first.await.unwrap();

        assert_eq!(first.reply, "reply 1");
        assert_eq!(second.reply, "reply 2");

        let prompts = backend.prompts.lock();
        assert_eq!(prompts[1], Prompt::Message("and internships".into()));
        assert_eq!(
            router.conversations().get_recent("s", 10),
            vec![
                ConversationTurn::user("and internships"),
                ConversationTurn::assistant("reply 2"),
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_history_applies_to_canned_replies() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, Arc::new(RecordingBackend::default()));

        router.route("tell me about scholarships", Some("s")).await;
        let outcome = router.route_with("hello", Some("s"), true).await;

        assert_eq!(outcome.stage, RouteStage::LexicalMatch);
        assert!(router.conversations().get_recent("s", 10).is_empty());
    }

    #[tokio::test]
    async fn test_odd_context_window_starts_with_user_turn() {
        let (_dir, intents) = store(INTENTS).await;
        let backend = Arc::new(RecordingBackend::default());
        let router = MessageRouter::new(
            intents,
            LexicalMatcher::new(0.85),
            backend.clone(),
            ConversationStore::new(10),
        )
        .with_context_turns(3);

        router.route("scholarship question one", Some("s")).await;
        router.route("scholarship question two", Some("s")).await;
        router.route("scholarship question three", Some("s")).await;

        let prompts = backend.prompts.lock();
        assert_eq!(
            prompts[2],
            Prompt::Conversation(vec![
                ConversationTurn::user("scholarship question two"),
                ConversationTurn::assistant("reply 2"),
                ConversationTurn::user("scholarship question three"),
            ])
        );
    }

    #[test]
    fn test_context_window_drops_leading_assistant_turns() {
        let turns = vec![
            ConversationTurn::assistant("a"),
            ConversationTurn::user("u"),
            ConversationTurn::assistant("b"),
        ];
        assert_eq!(
            context_window(turns),
            vec![ConversationTurn::user("u"), ConversationTurn::assistant("b")]
        );
        assert!(context_window(vec![ConversationTurn::assistant("a")]).is_empty());
    }

    #[tokio::test]
    async fn test_off_topic_question_reaches_model_with_shipped_intents() {
        let (_dir, intents) = store(include_str!("../../data/intents.json")).await;
        let router = router(intents, Arc::new(RecordingBackend::default()));

        let outcome = router.route("What is the capital of France?", None).await;
        assert_eq!(outcome.stage, RouteStage::GenerativeFallback);
        assert_eq!(outcome.reply, "reply 1");

        let outcome = router.route("Where is the department office?", None).await;
        assert_eq!(outcome.stage, RouteStage::LexicalMatch);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_history() {
        let (_dir, intents) = store(INTENTS).await;
        let backend = Arc::new(RecordingBackend::default());
        let router = router(intents, backend.clone());

        router.route("tell me about scholarships", Some("a")).await;
        router.route("what about internships", Some("b")).await;

        let prompts = backend.prompts.lock();
        assert_eq!(prompts[1], Prompt::Message("what about internships".into()));
    }

    #[tokio::test]
    async fn test_no_session_leaves_store_untouched() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, Arc::new(RecordingBackend::default()));

        let outcome = router.route("tell me about scholarships", None).await;
        assert_eq!(outcome.stage, RouteStage::GenerativeFallback);
        assert_eq!(router.conversations().session_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_generation_does_not_record_turns() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, failing_backend());

        router.route("tell me about scholarships", Some("s1")).await;
        assert!(router.conversations().get_recent("s1", 10).is_empty());
    }

    #[tokio::test]
    async fn test_context_window_is_bounded() {
        let (_dir, intents) = store(INTENTS).await;
        let backend = Arc::new(RecordingBackend::default());
        let router = MessageRouter::new(
            intents,
            LexicalMatcher::new(0.85),
            backend.clone(),
            ConversationStore::new(4),
        )
        .with_context_turns(2);

        for i in 0..5 {
            router.route(&format!("scholarship question {}", i), Some("s1")).await;
        }

        assert_eq!(router.conversations().get_recent("s1", 100).len(), 4);
        let prompts = backend.prompts.lock();
        match prompts.last().unwrap() {
            Prompt::Conversation(turns) => assert_eq!(turns.len(), 3),
            other => panic!("expected conversation prompt, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permissive_overlap_before_model() {
        let (_dir, intents) = store(INTENTS).await;
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().never();
        let router = router(intents, Arc::new(mock));

        let outcome = router.route("is the library open on good friday", None).await;
        assert_eq!(outcome.stage, RouteStage::PermissiveLexicalFallback);
    }

    #[tokio::test]
    async fn test_permissive_overlap_can_be_disabled() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, Arc::new(RecordingBackend::default()))
            .with_permissive_fallback(false);

        let outcome = router.route("is the library open on good friday", None).await;
        assert_eq!(outcome.stage, RouteStage::GenerativeFallback);
    }

    #[tokio::test]
    async fn test_confident_classifier_answers() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, failing_backend())
            .with_classifier(fixed("office", 0.9), 0.65);

        let outcome = router.route("department location please", None).await;
        assert_eq!(outcome.stage, RouteStage::StatisticalMatch);
        assert_eq!(outcome.reply, "Eshetu Chole Building, floors 1 to 6.");
    }

    #[tokio::test]
    async fn test_unconfident_classifier_is_ignored() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, failing_backend())
            .with_classifier(fixed("office", 0.5), 0.65)
            .with_permissive_fallback(false);

        let outcome = router.route("department location please", None).await;
        assert_eq!(outcome.stage, RouteStage::DefaultIntentFallback);
    }

    #[tokio::test]
    async fn test_classifier_never_answers_with_default_intent() {
        let (_dir, intents) = store(INTENTS).await;
        let router = router(intents, failing_backend())
            .with_classifier(fixed("default", 0.99), 0.65)
            .with_permissive_fallback(false);

        let outcome = router.route("department location please", None).await;
        assert_eq!(outcome.stage, RouteStage::DefaultIntentFallback);
    }

    #[tokio::test]
    async fn test_blank_model_reply_treated_as_failure() {
        let (_dir, intents) = store(INTENTS).await;
        let mut mock = MockGenerativeBackend::new();
        mock.expect_generate().returning(|_| Some("   ".to_string()));
        let router = router(intents, Arc::new(mock));

        let outcome = router.route("scholarship deadlines", Some("s1")).await;
        assert_eq!(outcome.stage, RouteStage::DefaultIntentFallback);
        assert!(router.conversations().get_recent("s1", 10).is_empty());
    }

    #[tokio::test]
    async fn test_always_returns_non_empty_reply() {
        let (_dir, intents) = store(INTENTS_NO_DEFAULT).await;
        let router = router(intents, failing_backend());

        let messages = ["", "   ", "?!?", "hello", "random words here", "ünïcödé text", "hello hello hello"];
        for message in messages {
            let outcome = router.route(message, Some("s")).await;
            assert!(!outcome.reply.trim().is_empty(), "empty reply for {:?}", message);
        }
    }
}
