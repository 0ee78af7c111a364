use crate::scenario::ScenarioId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// 광고 SDK에 요청할 광고 표시 형식이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdFormat {
    /// 기본 액션 카드.
    ActionCard,
    /// 이메일 수집 폼.
    LeadGen,
    /// 배너형 정적 광고.
    Static,
    /// 선택지형 후속 카드.
    Followup,
}

impl fmt::Display for AdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            AdFormat::ActionCard => "action_card",
            AdFormat::LeadGen => "lead_gen",
            AdFormat::Static => "static",
            AdFormat::Followup => "followup",
        };
        f.write_str(tag)
    }
}

/// 시나리오별로 선호하는 광고 형식을 반환한다.
///
/// 활성 시나리오가 없으면 형식을 제한하지 않는다.
pub fn preferred_formats(scenario: Option<ScenarioId>) -> Option<Vec<AdFormat>> {
    let format = match scenario? {
        ScenarioId::English
        | ScenarioId::Programming
        | ScenarioId::ProgrammingJa
        | ScenarioId::Travel => AdFormat::ActionCard,
        ScenarioId::LeadGen => AdFormat::LeadGen,
        ScenarioId::StaticAd => AdFormat::Static,
        ScenarioId::Followup => AdFormat::Followup,
    };
    Some(vec![format])
}

/// SDK가 돌려주는 광고 한 건이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdRecord {
    /// 광고 ID.
    pub id: String,
    /// 제목.
    pub title: String,
    /// 설명 문구.
    pub description: String,
    /// 이미지 URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// 클릭 시 이동할 URL.
    pub action_url: String,
    /// 표시 형식.
    pub format: AdFormat,
}

/// 광고 요청 파라미터이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdRequest {
    /// 대화 ID.
    pub conversation_id: String,
    /// 요청을 유발한 메시지 ID.
    pub message_id: String,
    /// 매칭에 사용할 최근 사용자 발화.
    pub context_text: String,
    /// 허용할 광고 형식. `None`이면 제한하지 않는다.
    pub formats: Option<Vec<AdFormat>>,
}

/// 광고 요청 응답이다.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdResponse {
    /// 매칭된 광고.
    pub ad: Option<AdRecord>,
    /// SDK가 발급한 요청 ID.
    pub request_id: Option<String>,
}

/// SDK로 보고하는 광고 상호작용 이벤트이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdEvent {
    /// 노출.
    Impression,
    /// 클릭.
    Click,
    /// lead_gen 폼 제출.
    Submit,
    /// followup 선택지 선택.
    OptionTap,
}

/// AdProvider는 외부 광고 SDK 호출을 위한 추상 계층을 정의한다.
#[async_trait]
pub trait AdProvider: Send + Sync {
    /// 앱 ID로 SDK를 초기화한다.
    async fn initialize(&self, app_id: &str) -> anyhow::Result<()>;

    /// 대화 문맥에 맞는 광고를 요청한다.
    async fn request_ad(&self, request: &AdRequest) -> anyhow::Result<AdResponse>;

    /// 광고 상호작용 이벤트를 보고한다.
    async fn track_event(
        &self,
        event: AdEvent,
        ad_id: &str,
        request_id: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// NoAdProvider는 SDK 연동 없이 호출 내용만 로그로 남기는 기본 구현이다.
#[derive(Debug, Default, Clone)]
pub struct NoAdProvider;

#[async_trait]
impl AdProvider for NoAdProvider {
    async fn initialize(&self, app_id: &str) -> anyhow::Result<()> {
        info!(app_id, "SDK initialize 호출");
        Ok(())
    }

    /// 광고는 항상 없다고 응답한다.
    async fn request_ad(&self, request: &AdRequest) -> anyhow::Result<AdResponse> {
        info!(
            conversation_id = %request.conversation_id,
            message_id = %request.message_id,
            context_text = %request.context_text,
            formats = ?request.formats,
            "SDK requestAd 호출"
        );
        Ok(AdResponse::default())
    }

    async fn track_event(
        &self,
        event: AdEvent,
        ad_id: &str,
        request_id: Option<&str>,
    ) -> anyhow::Result<()> {
        info!(?event, ad_id, ?request_id, "SDK trackEvent 호출");
        Ok(())
    }
}

/// AdProvider를 공유하기 위한 Arc 타입 별칭이다.
pub type SharedAdProvider = Arc<dyn AdProvider>;
