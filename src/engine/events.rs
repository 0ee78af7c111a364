use crate::message::ChatMessage;

/// 세션에서 UI(대화 기록)로 전달되는 이벤트 모델이다.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// 대화 기록에 메시지를 추가한다.
    MessageAppended(ChatMessage),
    /// 응답 대기 표시 시작.
    ThinkingStarted,
    /// 응답 대기 표시 종료.
    ThinkingFinished,
    /// 대화 기록 전체 삭제.
    Cleared,
}
