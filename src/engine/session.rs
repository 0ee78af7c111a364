use super::events::SessionEvent;
use super::runner::ScenarioEngine;
use crate::ads::{AdEvent, AdRequest, AdResponse, SharedAdProvider, preferred_formats};
use crate::config::DemoConfig;
use crate::message::ChatMessage;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 시나리오를 감지하지 못했을 때 보내는 안내 문구이다.
pub const CLARIFY_MESSAGE: &str =
    "I can assist with English learning, programming, or travel planning. Which one are you interested in?";

/// 시나리오가 끝난 뒤 보내는 마무리 문구이다.
pub const COMPLETION_MESSAGE: &str = "Thanks! Let me know if you need anything else.";

/// 사용자 입력을 받아 시나리오 응답과 광고 요청을 조율하는 대화 세션이다.
///
/// 응답 예약에 `tokio::spawn`을 사용하므로 Tokio 런타임 안에서 호출해야 한다.
pub struct ChatSession {
    /// 시나리오 상태 기계.
    engine: ScenarioEngine,
    /// 외부 광고 SDK.
    provider: SharedAdProvider,
    /// 세션 설정.
    config: DemoConfig,
    /// 대화 기록 이벤트 송신 채널.
    sender: UnboundedSender<SessionEvent>,
    /// 대기 중인 응답 취소 토큰.
    cancel: CancellationToken,
    /// 직전 응답 작업이 끝나면 닫히는 채널.
    previous_reply: Option<oneshot::Receiver<()>>,
}

impl ChatSession {
    /// 세션을 생성한다.
    pub fn new(
        engine: ScenarioEngine,
        provider: SharedAdProvider,
        config: DemoConfig,
        sender: UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            engine,
            provider,
            config,
            sender,
            cancel: CancellationToken::new(),
            previous_reply: None,
        }
    }

    /// SDK를 초기화한다. 실패해도 대화는 계속된다.
    pub async fn initialize(&self) {
        if let Err(err) = self.provider.initialize(&self.config.app_id).await {
            warn!(error = %err, "SDK 초기화 실패, 광고 없이 진행합니다.");
        }
    }

    /// 사용자 입력을 처리하고 응답 표시 작업을 예약한다.
    ///
    /// 공백뿐인 입력은 무시한다. 엔진 상태는 즉시 갱신되고 표시만 지연된다.
    /// 응답은 직전 응답(광고 포함)이 표시된 뒤에 차례로 표시된다.
    pub fn submit(&mut self, text: &str) -> Option<JoinHandle<()>> {
        let user_text = text.trim();
        if user_text.is_empty() {
            return None;
        }
        self.emit(SessionEvent::MessageAppended(ChatMessage::user(user_text)));
        let reply = self.resolve_reply(user_text)?;
        Some(self.schedule_reply(reply, user_text.to_string()))
    }

    /// 대기 중인 응답을 취소하고 시나리오 상태를 초기화한다.
    pub fn clear(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.previous_reply = None;
        self.engine.reset();
        self.emit(SessionEvent::Cleared);
    }

    /// 광고 카드에서 발생한 상호작용을 SDK로 보고한다.
    pub async fn track_ad_event(&self, event: AdEvent, ad_id: &str, request_id: Option<&str>) {
        if let Err(err) = self.provider.track_event(event, ad_id, request_id).await {
            warn!(error = %err, ?event, ad_id, "광고 이벤트 보고 실패");
        }
    }

    /// 세션이 사용하는 엔진이다.
    pub fn engine(&self) -> &ScenarioEngine {
        &self.engine
    }

    /// 세션 설정이다.
    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    /// 입력에 대한 응답 문구를 결정한다.
    fn resolve_reply(&mut self, user_text: &str) -> Option<String> {
        if !self.engine.has_active_scenario() {
            let Some(scenario) = self.engine.detect(user_text) else {
                return Some(CLARIFY_MESSAGE.to_string());
            };
            self.engine.start(scenario);
            let reply = self.engine.next_reply();
            if reply.is_none() {
                debug!(scenario = %scenario, "시작 직후 내보낼 AI 응답이 없습니다.");
            }
            return reply;
        }
        if self.engine.is_finished() {
            return Some(COMPLETION_MESSAGE.to_string());
        }
        self.engine.next_reply()
    }

    /// 지연 후 AI 메시지를 표시하고 광고를 요청하는 작업을 띄운다.
    fn schedule_reply(&mut self, reply: String, context_text: String) -> JoinHandle<()> {
        let delay = self.pick_delay();
        let message = ChatMessage::ai(reply);
        let request = AdRequest {
            conversation_id: self.config.conversation_id.clone(),
            message_id: message.id.to_string(),
            context_text,
            formats: preferred_formats(self.engine.active_scenario()),
        };
        let provider = self.provider.clone();
        let sender = self.sender.clone();
        let cancel = self.cancel.clone();
        let previous = self.previous_reply.take();
        let (done_tx, done_rx) = oneshot::channel::<()>();
        self.previous_reply = Some(done_rx);
        self.emit(SessionEvent::ThinkingStarted);
        tokio::spawn(async move {
            // 작업이 끝나면(취소 포함) done_tx가 drop되어 다음 응답이 진행된다.
            let _done = done_tx;
            let ready = async move {
                if let Some(previous) = previous {
                    let _ = previous.await;
                }
                sleep(delay).await;
            };
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("대기 중인 응답이 취소되었습니다.");
                    return;
                }
                _ = ready => {}
            }
            if cancel.is_cancelled() {
                return;
            }
            let _ = sender.send(SessionEvent::ThinkingFinished);
            let _ = sender.send(SessionEvent::MessageAppended(message));
            deliver_ad(provider, request, sender, cancel).await;
        })
    }

    fn pick_delay(&self) -> Duration {
        rand::thread_rng().gen_range(self.config.reply_delay_range())
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }
}

/// 광고를 요청하고 결과가 있으면 대화 기록에 추가한다.
///
/// 요청 실패는 광고 없음과 동일하게 취급하며 재시도하지 않는다.
async fn deliver_ad(
    provider: SharedAdProvider,
    request: AdRequest,
    sender: UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let response = match provider.request_ad(&request).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, message_id = %request.message_id, "광고 요청 실패, 광고 없이 진행합니다.");
            return;
        }
    };
    let AdResponse {
        ad: Some(ad),
        request_id,
    } = response
    else {
        debug!(message_id = %request.message_id, "표시할 광고가 없습니다.");
        return;
    };
    if cancel.is_cancelled() {
        return;
    }
    let ad_id = ad.id.clone();
    let _ = sender.send(SessionEvent::MessageAppended(ChatMessage::ad(
        ad,
        request_id.clone(),
    )));
    if let Err(err) = provider
        .track_event(AdEvent::Impression, &ad_id, request_id.as_deref())
        .await
    {
        warn!(error = %err, ad_id = %ad_id, "노출 이벤트 보고 실패");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ads::{AdFormat, AdProvider, AdRecord};
    use crate::message::MessageRole;
    use crate::scenario::{
        FallbackPolicy, KeywordRule, ScenarioCatalog, ScenarioDefinition, ScenarioId,
        ScenarioTurn, TurnRole,
    };
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{Mutex, Notify};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    /// 받은 요청과 이벤트를 누적 기록하는 목업 SDK이다.
    #[derive(Clone, Default)]
    struct RecordingProvider {
        /// 광고 요청 목록이다.
        requests: Arc<Mutex<Vec<AdRequest>>>,
        /// 보고된 이벤트 목록이다.
        events: Arc<Mutex<Vec<(AdEvent, String, Option<String>)>>>,
        /// 돌려줄 광고. `None`이면 광고 없음.
        ad: Option<AdRecord>,
        /// 요청을 실패시킬지 여부.
        fail: bool,
        /// 요청 진입을 알리고 해제 신호까지 응답을 붙잡는 (진입, 해제) 쌍.
        gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    #[async_trait]
    impl AdProvider for RecordingProvider {
        async fn initialize(&self, _app_id: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("초기화 실패");
            }
            Ok(())
        }

        /// 요청을 기록하고 설정된 응답을 돌려준다.
        async fn request_ad(&self, request: &AdRequest) -> anyhow::Result<AdResponse> {
            self.requests.lock().await.push(request.clone());
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail {
                anyhow::bail!("네트워크 오류");
            }
            Ok(AdResponse {
                ad: self.ad.clone(),
                request_id: self.ad.as_ref().map(|_| "req-1".to_string()),
            })
        }

        async fn track_event(
            &self,
            event: AdEvent,
            ad_id: &str,
            request_id: Option<&str>,
        ) -> anyhow::Result<()> {
            self.events.lock().await.push((
                event,
                ad_id.to_string(),
                request_id.map(str::to_string),
            ));
            Ok(())
        }
    }

    fn instant_config() -> DemoConfig {
        DemoConfig {
            reply_delay_min_ms: 0,
            reply_delay_max_ms: 0,
            ..DemoConfig::default()
        }
    }

    fn new_session(
        engine: ScenarioEngine,
        provider: RecordingProvider,
        config: DemoConfig,
    ) -> (ChatSession, UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(engine, Arc::new(provider), config, tx);
        (session, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// 추가된 메시지만 (역할, 본문) 쌍으로 추린다.
    fn appended(events: &[SessionEvent]) -> Vec<(MessageRole, String)> {
        events
            .iter()
            .filter_map(|event| match event {
                SessionEvent::MessageAppended(message) => {
                    Some((message.role, message.text.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn sample_ad() -> AdRecord {
        AdRecord {
            id: "ad-42".into(),
            title: "Learn Rust Today".into(),
            description: "Start your systems programming journey.".into(),
            image_url: None,
            action_url: "https://example.com".into(),
            format: AdFormat::ActionCard,
        }
    }

    #[tokio::test]
    async fn first_submission_detects_and_replies() {
        let provider = RecordingProvider::default();
        let (mut session, mut rx) =
            new_session(ScenarioEngine::default(), provider.clone(), instant_config());

        let handle = session
            .submit("  I want advice about tech careers ")
            .expect("응답이 예약되어야 합니다.");
        handle.await.expect("응답 작업 실패");

        let events = drain(&mut rx);
        assert!(matches!(events[1], SessionEvent::ThinkingStarted));
        assert!(matches!(events[2], SessionEvent::ThinkingFinished));
        assert_eq!(
            appended(&events),
            vec![
                (MessageRole::User, "I want advice about tech careers".to_string()),
                (
                    MessageRole::Ai,
                    "A good entry point is understanding basic problem-solving and logic. Many beginners start with simple tasks to build confidence."
                        .to_string()
                ),
            ]
        );
        assert_eq!(session.engine().active_scenario(), Some(ScenarioId::Programming));

        let requests = provider.requests.lock().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].conversation_id, "demo-conv");
        assert_eq!(requests[0].context_text, "I want advice about tech careers");
        assert_eq!(requests[0].formats, Some(vec![AdFormat::ActionCard]));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let (mut session, mut rx) = new_session(
            ScenarioEngine::default(),
            RecordingProvider::default(),
            instant_config(),
        );
        assert!(session.submit("   \n").is_none());
        assert!(drain(&mut rx).is_empty());
        assert!(!session.engine().has_active_scenario());
    }

    #[tokio::test]
    async fn finished_scenario_sends_completion_message() {
        let provider = RecordingProvider::default();
        let (mut session, mut rx) =
            new_session(ScenarioEngine::default(), provider.clone(), instant_config());

        for text in ["subscribe please", "ok", "sure", "thanks", "anything else?"] {
            if let Some(handle) = session.submit(text) {
                handle.await.expect("응답 작업 실패");
            }
        }

        let ai_replies: Vec<String> = appended(&drain(&mut rx))
            .into_iter()
            .filter(|(role, _)| *role == MessageRole::Ai)
            .map(|(_, text)| text)
            .collect();
        assert_eq!(ai_replies.len(), 5);
        assert_eq!(ai_replies[3], "Let me find some options for you.");
        assert_eq!(ai_replies[4], COMPLETION_MESSAGE);
        assert!(session.engine().is_finished());

        let requests = provider.requests.lock().await;
        assert_eq!(requests.len(), 5);
        assert!(
            requests
                .iter()
                .all(|r| r.formats == Some(vec![AdFormat::LeadGen]))
        );
    }

    #[tokio::test]
    async fn no_match_policy_sends_clarifying_message() {
        let mut scenarios = HashMap::new();
        scenarios.insert(
            ScenarioId::Travel,
            ScenarioDefinition {
                turns: vec![
                    ScenarioTurn {
                        role: TurnRole::User,
                        text: "beach?".into(),
                    },
                    ScenarioTurn {
                        role: TurnRole::Ai,
                        text: "Sure, beaches.".into(),
                    },
                ],
            },
        );
        let rules = vec![KeywordRule {
            scenario: ScenarioId::Travel,
            keywords: vec!["beach".into()],
        }];
        let catalog = ScenarioCatalog::new(rules, scenarios, FallbackPolicy::NoMatch)
            .expect("카탈로그 생성 실패");
        let provider = RecordingProvider::default();
        let (mut session, mut rx) = new_session(
            ScenarioEngine::new(Arc::new(catalog)),
            provider.clone(),
            instant_config(),
        );

        session.submit("hello").expect("응답 예약").await.expect("응답 작업 실패");
        assert!(!session.engine().has_active_scenario());
        session.submit("beach").expect("응답 예약").await.expect("응답 작업 실패");

        let ai_replies: Vec<String> = appended(&drain(&mut rx))
            .into_iter()
            .filter(|(role, _)| *role == MessageRole::Ai)
            .map(|(_, text)| text)
            .collect();
        assert_eq!(ai_replies, vec![CLARIFY_MESSAGE, "Sure, beaches."]);

        let requests = provider.requests.lock().await;
        assert_eq!(requests[0].formats, None);
        assert_eq!(requests[1].formats, Some(vec![AdFormat::ActionCard]));
    }

    #[tokio::test]
    async fn ad_is_appended_and_impression_tracked() {
        let provider = RecordingProvider {
            ad: Some(sample_ad()),
            ..RecordingProvider::default()
        };
        let (mut session, mut rx) =
            new_session(ScenarioEngine::default(), provider.clone(), instant_config());

        session.submit("tech").expect("응답 예약").await.expect("응답 작업 실패");

        let events = drain(&mut rx);
        let ad_message = events
            .iter()
            .find_map(|event| match event {
                SessionEvent::MessageAppended(m) if m.role == MessageRole::Ad => Some(m.clone()),
                _ => None,
            })
            .expect("광고 메시지가 추가되어야 합니다.");
        assert_eq!(ad_message.ad, Some(sample_ad()));
        assert_eq!(ad_message.request_id.as_deref(), Some("req-1"));
        assert!(ad_message.text.is_empty());

        let tracked = provider.events.lock().await;
        assert_eq!(
            *tracked,
            vec![(AdEvent::Impression, "ad-42".to_string(), Some("req-1".to_string()))]
        );
    }

    #[tokio::test]
    async fn failed_ad_request_is_swallowed() {
        let provider = RecordingProvider {
            ad: Some(sample_ad()),
            fail: true,
            ..RecordingProvider::default()
        };
        let (mut session, mut rx) =
            new_session(ScenarioEngine::default(), provider.clone(), instant_config());

        session.initialize().await;
        session.submit("tech").expect("응답 예약").await.expect("응답 작업 실패");

        let roles: Vec<MessageRole> = appended(&drain(&mut rx))
            .into_iter()
            .map(|(role, _)| role)
            .collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Ai]);
        assert_eq!(provider.requests.lock().await.len(), 1);
        assert!(provider.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn clear_cancels_pending_reply() {
        let config = DemoConfig {
            reply_delay_min_ms: 60_000,
            reply_delay_max_ms: 60_000,
            ..DemoConfig::default()
        };
        let provider = RecordingProvider::default();
        let (mut session, mut rx) =
            new_session(ScenarioEngine::default(), provider.clone(), config);

        let handle = session.submit("tech").expect("응답 예약");
        session.clear();
        handle.await.expect("응답 작업 실패");

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(SessionEvent::Cleared)));
        assert_eq!(appended(&events).len(), 1);
        assert!(provider.requests.lock().await.is_empty());
        assert!(!session.engine().has_active_scenario());
        assert!(session.engine().is_finished());
    }

    /// 응답을 기다리지 않고 연속 입력해도 AI 메시지가 시나리오 순서대로 도착하는지 검증한다.
    #[tokio::test(start_paused = true)]
    async fn rapid_submissions_keep_reply_order() {
        let (mut session, mut rx) = new_session(
            ScenarioEngine::default(),
            RecordingProvider::default(),
            DemoConfig::default(),
        );

        let handles: Vec<_> = ["tech", "ok", "ok", "ok", "ok"]
            .into_iter()
            .filter_map(|text| session.submit(text))
            .collect();
        assert_eq!(handles.len(), 5);
        for handle in handles {
            handle.await.expect("응답 작업 실패");
        }

        let expected: Vec<String> = {
            let catalog = session.engine().catalog();
            let definition = catalog
                .definition(ScenarioId::Programming)
                .expect("programming 누락");
            [1, 3, 5, 7, 9]
                .into_iter()
                .filter_map(|i| definition.turn(i).map(|t| t.text.clone()))
                .collect()
        };
        let ai_replies: Vec<String> = appended(&drain(&mut rx))
            .into_iter()
            .filter(|(role, _)| *role == MessageRole::Ai)
            .map(|(_, text)| text)
            .collect();
        assert_eq!(ai_replies, expected);
    }

    /// 최소 지연이 최대 지연보다 큰 설정으로도 응답이 정상 예약되는지 검증한다.
    #[tokio::test(start_paused = true)]
    async fn inverted_delay_config_still_replies() {
        let config = DemoConfig {
            reply_delay_min_ms: 900,
            reply_delay_max_ms: 100,
            ..DemoConfig::default()
        };
        let (mut session, mut rx) =
            new_session(ScenarioEngine::default(), RecordingProvider::default(), config);

        session.submit("tech").expect("응답 예약").await.expect("응답 작업 실패");

        let roles: Vec<MessageRole> = appended(&drain(&mut rx))
            .into_iter()
            .map(|(role, _)| role)
            .collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Ai]);
    }

    /// 광고 요청 중에 대화를 지우면 도착한 광고를 버리는지 검증한다.
    #[tokio::test]
    async fn ad_arriving_after_clear_is_discarded() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let provider = RecordingProvider {
            ad: Some(sample_ad()),
            gate: Some((entered.clone(), release.clone())),
            ..RecordingProvider::default()
        };
        let (mut session, mut rx) =
            new_session(ScenarioEngine::default(), provider.clone(), instant_config());

        let handle = session.submit("tech").expect("응답 예약");
        entered.notified().await;
        session.clear();
        release.notify_one();
        handle.await.expect("응답 작업 실패");

        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(SessionEvent::Cleared)));
        let roles: Vec<MessageRole> = appended(&events).into_iter().map(|(role, _)| role).collect();
        assert_eq!(roles, vec![MessageRole::User, MessageRole::Ai]);
        assert!(provider.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn track_ad_event_forwards_to_provider() {
        let provider = RecordingProvider::default();
        let (session, _rx) =
            new_session(ScenarioEngine::default(), provider.clone(), instant_config());
        session
            .track_ad_event(AdEvent::OptionTap, "ad-7", None)
            .await;
        assert_eq!(
            *provider.events.lock().await,
            vec![(AdEvent::OptionTap, "ad-7".to_string(), None)]
        );
    }
}
