use crate::scenario::ScenarioId;

/// 대화 세션 하나의 진행 커서이다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineState {
    /// 진행 중인 시나리오. 감지 전이거나 초기화 직후에는 `None`이다.
    pub active_scenario: Option<ScenarioId>,
    /// 시나리오 정의 내 위치. user/ai 한 쌍을 소비할 때마다 2씩 증가한다.
    pub turn_cursor: usize,
}

impl EngineState {
    /// 초기 상태를 생성한다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지정한 시나리오의 처음으로 이동한다.
    pub fn begin(&mut self, scenario: ScenarioId) {
        self.active_scenario = Some(scenario);
        self.turn_cursor = 0;
    }

    /// 다음 AI 턴의 위치를 반환한다.
    pub fn pending_ai_index(&self) -> usize {
        self.turn_cursor + 1
    }

    /// user/ai 한 쌍을 소비한다.
    pub fn advance(&mut self) {
        self.turn_cursor += 2;
    }

    /// `(None, 0)`으로 되돌린다.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
