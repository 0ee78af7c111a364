use crate::ads::AdRecord;
use std::time::SystemTime;
use uuid::Uuid;

/// 대화 기록에 추가되는 메시지의 종류이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    /// 사용자 입력.
    User,
    /// 시나리오 AI 응답.
    Ai,
    /// 광고 카드.
    Ad,
}

/// 대화 기록의 메시지 한 건이다.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// 메시지 고유 ID.
    pub id: Uuid,
    /// 메시지 종류.
    pub role: MessageRole,
    /// 표시 텍스트. 광고 메시지는 비어 있다.
    pub text: String,
    /// 생성 시각.
    pub timestamp: SystemTime,
    /// 광고 데이터.
    pub ad: Option<AdRecord>,
    /// 광고 요청 ID.
    pub request_id: Option<String>,
}

impl ChatMessage {
    fn with_role(role: MessageRole, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            timestamp: SystemTime::now(),
            ad: None,
            request_id: None,
        }
    }

    /// 사용자 메시지를 생성한다.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, text.into())
    }

    /// AI 메시지를 생성한다.
    pub fn ai(text: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Ai, text.into())
    }

    /// 광고 메시지를 생성한다.
    pub fn ad(ad: AdRecord, request_id: Option<String>) -> Self {
        Self {
            ad: Some(ad),
            request_id,
            ..Self::with_role(MessageRole::Ad, String::new())
        }
    }
}
