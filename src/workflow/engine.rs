//! The workflow coordinator
//!
//! Drives a turn through its phases and owns every recovery policy:
//! transient gateway failures are retried once with a bounded backoff and
//! then masked by the fallback reply, invalid model output goes straight
//! to the fallback reply, and commit conflicts replay the whole turn
//! (fresh snapshot, fresh model call) up to a configured bound. Only
//! `InvalidInput`, `Misconfigured`, and `TooManyConflicts` escape to the
//! caller.

use super::state::{TurnError, TurnOutcome, TurnPhase};
use crate::context;
use crate::conversation::{Message, Role};
use crate::llm::{GatewayErrorKind, GenerateRequest, GenerationParams, ModelGateway};
use crate::store::{SessionStore, StoreError};
use crate::validator::AckValidator;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for a turn, resolved from configuration at startup
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Max prior messages sent to the model (`H`)
    pub history_window: usize,
    pub params: GenerationParams,
    /// Max accepted user message length, in characters
    pub max_message_len: usize,
    /// Commit-conflict replays before giving up
    pub max_commit_retries: u32,
    /// Pause before the single transient-failure retry
    pub retry_backoff: Duration,
}

/// Sequences the components of a conversation turn
pub struct Coordinator {
    store: Arc<SessionStore>,
    gateway: Arc<dyn ModelGateway>,
    validator: AckValidator,
    settings: TurnSettings,
}

impl Coordinator {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn ModelGateway>,
        validator: AckValidator,
        settings: TurnSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            validator,
            settings,
        }
    }

    /// Process one conversation turn.
    ///
    /// On success the session history has grown by exactly one user message
    /// and one assistant message, committed atomically as a pair.
    pub async fn process_turn(
        &self,
        session_id: &str,
        user_message: &str,
        user_name: Option<&str>,
    ) -> Result<TurnOutcome, TurnError> {
        let text = user_message.trim();
        if text.is_empty() {
            return Err(TurnError::InvalidInput("message is empty".to_string()));
        }
        if text.chars().count() > self.settings.max_message_len {
            return Err(TurnError::InvalidInput(format!(
                "message exceeds {} characters",
                self.settings.max_message_len
            )));
        }
        tracing::debug!(session_id, phase = ?TurnPhase::Received, "turn accepted");

        let max_attempts = self.settings.max_commit_retries + 1;
        for attempt in 1..=max_attempts {
            let snapshot = self.store.load_or_create(session_id, user_name.unwrap_or(""));
            let name = context::resolve_user_name(
                user_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(&snapshot.user_name),
            )
            .to_string();

            let user_msg = Message::new(Role::User, text);
            let ctx = context::build(
                &snapshot.messages,
                &user_msg,
                &name,
                self.settings.history_window,
            );
            tracing::debug!(
                session_id,
                phase = ?TurnPhase::ContextBuilt,
                window = ctx.messages.len(),
                "context built"
            );

            let reply = self.obtain_reply(ctx, &name).await?;
            tracing::debug!(session_id, phase = ?TurnPhase::ModelInvoked, "model reply obtained");

            let validated = self.validator.enforce(&reply, &name);
            tracing::debug!(session_id, phase = ?TurnPhase::Validated, "reply validated");

            let assistant_msg = Message::new(Role::Assistant, validated);
            let outcome = TurnOutcome {
                response: assistant_msg.content.clone(),
                message_id: assistant_msg.message_id.clone(),
                timestamp: assistant_msg.timestamp,
                user_name: name,
            };

            match self.store.commit(
                session_id,
                snapshot.messages.len(),
                vec![user_msg, assistant_msg],
            ) {
                Ok(()) => {
                    tracing::info!(
                        session_id,
                        phase = ?TurnPhase::Committed,
                        message_id = %outcome.message_id,
                        "turn committed"
                    );
                    return Ok(outcome);
                }
                Err(StoreError::Conflict { expected, actual, .. }) => {
                    tracing::warn!(
                        session_id,
                        attempt,
                        expected,
                        actual,
                        "commit conflict, replaying turn"
                    );
                }
            }
        }

        Err(TurnError::TooManyConflicts {
            attempts: max_attempts,
        })
    }

    /// Invoke the gateway with the single-retry-then-fallback policy.
    ///
    /// Returns the model text, or the deterministic fallback reply when the
    /// model stays unreachable or produces an invalid payload. Only a
    /// credential failure escapes as an error.
    async fn obtain_reply(
        &self,
        ctx: context::BuiltContext,
        user_name: &str,
    ) -> Result<String, TurnError> {
        let request = GenerateRequest {
            system_instruction: ctx.system_instruction,
            messages: ctx.messages,
            params: self.settings.params,
        };

        let first = match self.gateway.generate(&request).await {
            Ok(completion) => return Ok(completion.text),
            Err(e) => e,
        };

        match first.kind {
            GatewayErrorKind::Unauthenticated => {
                tracing::error!(error = %first.message, "model credential rejected");
                Err(TurnError::Misconfigured)
            }
            GatewayErrorKind::InvalidResponse => {
                tracing::warn!(error = %first.message, "invalid model output, using fallback reply");
                Ok(self.validator.fallback_reply(user_name))
            }
            GatewayErrorKind::Unavailable | GatewayErrorKind::RateLimited => {
                tracing::warn!(
                    error = %first.message,
                    kind = ?first.kind,
                    "transient model failure, retrying once"
                );
                tokio::time::sleep(self.settings.retry_backoff).await;

                match self.gateway.generate(&request).await {
                    Ok(completion) => Ok(completion.text),
                    Err(e) if e.kind == GatewayErrorKind::Unauthenticated => {
                        tracing::error!(error = %e.message, "model credential rejected on retry");
                        Err(TurnError::Misconfigured)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e.message, "retry failed, using fallback reply");
                        Ok(self.validator.fallback_reply(user_name))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Completion, GatewayError, TokenUsage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    const ACK_TEXT: &str = "Thanks for your message, Sam. All good here.";

    fn settings() -> TurnSettings {
        TurnSettings {
            history_window: 5,
            params: GenerationParams {
                temperature: 0.7,
                max_output_tokens: 1000,
            },
            max_message_len: 4000,
            max_commit_retries: 3,
            retry_backoff: Duration::ZERO,
        }
    }

    /// Gateway that pops scripted results and counts calls
    struct ScriptedGateway {
        script: Mutex<VecDeque<Result<String, GatewayError>>>,
        calls: AtomicU32,
    }

    impl ScriptedGateway {
        fn new(script: Vec<Result<String, GatewayError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelGateway for ScriptedGateway {
        async fn generate(&self, _request: &GenerateRequest) -> Result<Completion, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::unavailable("script exhausted")));
            next.map(|text| Completion {
                text,
                usage: TokenUsage::default(),
            })
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    fn coordinator_with(
        gateway: Arc<dyn ModelGateway>,
        settings: TurnSettings,
    ) -> (Coordinator, Arc<SessionStore>) {
        let store = Arc::new(SessionStore::new(64));
        let coordinator = Coordinator::new(
            store.clone(),
            gateway,
            AckValidator::default(),
            settings,
        );
        (coordinator, store)
    }

    #[tokio::test]
    async fn test_successful_turn_commits_user_assistant_pair() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(ACK_TEXT.to_string())]));
        let (coordinator, store) = coordinator_with(gateway.clone(), settings());

        let outcome = coordinator
            .process_turn("s1", "hello", Some("Sam"))
            .await
            .unwrap();

        assert_eq!(outcome.response, ACK_TEXT);
        assert_eq!(outcome.user_name, "Sam");
        assert!(outcome.message_id.starts_with("isha_"));

        let state = store.snapshot("s1").unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, Role::User);
        assert_eq!(state.messages[0].content, "hello");
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(state.messages[1].content, ACK_TEXT);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_history_grows_by_one_pair_per_turn() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Ok(ACK_TEXT.to_string()),
            Ok(ACK_TEXT.to_string()),
            Ok(ACK_TEXT.to_string()),
        ]));
        let (coordinator, store) = coordinator_with(gateway, settings());

        for i in 0..3 {
            coordinator
                .process_turn("s1", &format!("message {i}"), Some("Sam"))
                .await
                .unwrap();
            let state = store.snapshot("s1").unwrap();
            assert_eq!(state.messages.len(), (i + 1) * 2);
        }
    }

    #[tokio::test]
    async fn test_empty_message_rejected_without_mutation() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let (coordinator, store) = coordinator_with(gateway.clone(), settings());

        let err = coordinator.process_turn("s1", "", Some("Sam")).await.unwrap_err();
        assert_eq!(err, TurnError::InvalidInput("message is empty".to_string()));

        let err = coordinator
            .process_turn("s1", "   \n ", Some("Sam"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::InvalidInput(_)));

        assert!(store.snapshot("s1").is_none());
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_oversized_message_rejected_without_model_call() {
        let gateway = Arc::new(ScriptedGateway::new(vec![]));
        let mut s = settings();
        s.max_message_len = 10;
        let (coordinator, store) = coordinator_with(gateway.clone(), s);

        let err = coordinator
            .process_turn("s1", "this is far too long", Some("Sam"))
            .await
            .unwrap_err();
        assert!(matches!(err, TurnError::InvalidInput(_)));
        assert!(store.snapshot("s1").is_none());
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_double_unavailable_masks_with_fallback() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(GatewayError::unavailable("down")),
            Err(GatewayError::unavailable("still down")),
        ]));
        let (coordinator, store) = coordinator_with(gateway.clone(), settings());

        let outcome = coordinator
            .process_turn("s1", "hello", Some("Sam"))
            .await
            .unwrap();

        let expected = AckValidator::default().fallback_reply("Sam");
        assert_eq!(outcome.response, expected);
        assert_eq!(gateway.calls(), 2);

        let state = store.snapshot("s1").unwrap();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[1].content, expected);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_once_then_succeeds() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(GatewayError::rate_limited("slow down")),
            Ok(ACK_TEXT.to_string()),
        ]));
        let (coordinator, _store) = coordinator_with(gateway.clone(), settings());

        let outcome = coordinator
            .process_turn("s1", "hello", Some("Sam"))
            .await
            .unwrap();
        assert_eq!(outcome.response, ACK_TEXT);
        assert_eq!(gateway.calls(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_fails_fast_without_retry() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Err(
            GatewayError::unauthenticated("bad key"),
        )]));
        let (coordinator, store) = coordinator_with(gateway.clone(), settings());

        let err = coordinator
            .process_turn("s1", "hello", Some("Sam"))
            .await
            .unwrap_err();
        assert_eq!(err, TurnError::Misconfigured);
        assert_eq!(gateway.calls(), 1);

        // No half-turn persisted.
        assert!(store.snapshot("s1").unwrap().messages.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_response_goes_straight_to_fallback() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Err(
            GatewayError::invalid_response("empty candidates"),
        )]));
        let (coordinator, _store) = coordinator_with(gateway.clone(), settings());

        let outcome = coordinator
            .process_turn("s1", "hello", Some("Sam"))
            .await
            .unwrap();
        assert_eq!(outcome.response, AckValidator::default().fallback_reply("Sam"));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test]
    async fn test_unacknowledged_reply_is_repaired() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(
            "I can help with that.".to_string(),
        )]));
        let (coordinator, _store) = coordinator_with(gateway, settings());

        let outcome = coordinator
            .process_turn("s1", "help me", Some("Sam"))
            .await
            .unwrap();
        assert_eq!(
            outcome.response,
            "Thanks for your message, Sam. I can help with that."
        );
    }

    #[tokio::test]
    async fn test_missing_user_name_defaults() {
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(
            "I can help with that.".to_string(),
        )]));
        let (coordinator, _store) = coordinator_with(gateway, settings());

        let outcome = coordinator.process_turn("s1", "hi", None).await.unwrap();
        assert_eq!(outcome.user_name, "there");
        assert!(outcome.response.starts_with("Thanks for your message, there."));
    }

    /// Gateway that commits a competing turn to the session on every call,
    /// so the coordinator's snapshot is always stale by commit time.
    struct UsurpingGateway {
        store: Arc<SessionStore>,
        session_id: String,
    }

    #[async_trait]
    impl ModelGateway for UsurpingGateway {
        async fn generate(&self, _request: &GenerateRequest) -> Result<Completion, GatewayError> {
            let state = self.store.load_or_create(&self.session_id, "rival");
            self.store
                .commit(
                    &self.session_id,
                    state.messages.len(),
                    vec![
                        Message::new(Role::User, "rival turn"),
                        Message::new(Role::Assistant, "rival reply"),
                    ],
                )
                .expect("rival commit");
            Ok(Completion {
                text: ACK_TEXT.to_string(),
                usage: TokenUsage::default(),
            })
        }

        fn model_id(&self) -> &str {
            "usurping"
        }
    }

    #[tokio::test]
    async fn test_exhausted_conflict_retries_surface_too_many_conflicts() {
        let store = Arc::new(SessionStore::new(64));
        let gateway = Arc::new(UsurpingGateway {
            store: store.clone(),
            session_id: "s1".to_string(),
        });
        let mut s = settings();
        s.max_commit_retries = 2;
        let coordinator = Coordinator::new(store, gateway, AckValidator::default(), s);

        let err = coordinator
            .process_turn("s1", "hello", Some("Sam"))
            .await
            .unwrap_err();
        assert_eq!(err, TurnError::TooManyConflicts { attempts: 3 });
    }

    /// Gateway that holds every call until two calls have arrived, so two
    /// concurrent turns are guaranteed to have loaded the same snapshot.
    struct RendezvousGateway {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ModelGateway for RendezvousGateway {
        async fn generate(&self, _request: &GenerateRequest) -> Result<Completion, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            while self.calls.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            Ok(Completion {
                text: ACK_TEXT.to_string(),
                usage: TokenUsage::default(),
            })
        }

        fn model_id(&self) -> &str {
            "rendezvous"
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_turns_serialize_without_interleaving() {
        let store = Arc::new(SessionStore::new(64));
        let gateway = Arc::new(RendezvousGateway {
            calls: AtomicU32::new(0),
        });
        let coordinator = Arc::new(Coordinator::new(
            store.clone(),
            gateway.clone(),
            AckValidator::default(),
            settings(),
        ));

        let a = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.process_turn("s1", "first", Some("Sam")).await })
        };
        let b = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.process_turn("s1", "second", Some("Sam")).await })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        // Exactly one turn conflicted and replayed its model call.
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 3);

        let state = store.snapshot("s1").unwrap();
        assert_eq!(state.messages.len(), 4);
        // Both turns landed whole: user then assistant, never interleaved.
        for pair in state.messages.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
        let user_texts: Vec<&str> = state
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect();
        assert!(user_texts.contains(&"first"));
        assert!(user_texts.contains(&"second"));
    }
}
