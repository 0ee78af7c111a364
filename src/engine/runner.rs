use super::state::EngineState;
use crate::scenario::{
    FallbackPolicy, ScenarioCatalog, ScenarioDefinition, ScenarioId, builtin_catalog,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// 키워드로 시나리오를 선택하고 턴 단위로 AI 응답을 내보내는 상태 기계이다.
///
/// 동시 호출을 고려하지 않으므로 호출 측이 직렬화해야 한다.
#[derive(Debug, Clone)]
pub struct ScenarioEngine {
    /// 불변 시나리오 카탈로그.
    catalog: Arc<ScenarioCatalog>,
    /// 세션 진행 상태.
    state: EngineState,
}

impl ScenarioEngine {
    /// 카탈로그를 받아 초기 상태의 엔진을 생성한다.
    pub fn new(catalog: Arc<ScenarioCatalog>) -> Self {
        Self {
            catalog,
            state: EngineState::new(),
        }
    }

    /// 입력 문장에 해당하는 시나리오를 찾는다.
    ///
    /// 규칙은 선언 순서대로 검사하며 대소문자를 구분하지 않는다.
    /// 일치하는 규칙이 없으면 카탈로그의 fallback 정책을 따른다.
    pub fn detect(&self, text: &str) -> Option<ScenarioId> {
        let lowered = text.to_lowercase();
        if let Some(rule) = self.catalog.rules().iter().find(|r| r.matches(&lowered)) {
            debug!(scenario = %rule.scenario, "키워드 규칙 일치");
            return Some(rule.scenario);
        }
        match self.catalog.fallback() {
            FallbackPolicy::NoMatch => {
                debug!("일치하는 키워드 규칙 없음");
                None
            }
            FallbackPolicy::Scenario(id) => {
                debug!(scenario = %id, "fallback 시나리오 선택");
                Some(id)
            }
        }
    }

    /// 시나리오를 처음부터 시작한다. 진행 중이던 시나리오는 버려진다.
    pub fn start(&mut self, scenario: ScenarioId) {
        if self.catalog.definition(scenario).is_none() {
            warn!(scenario = %scenario, "카탈로그에 정의되지 않은 시나리오입니다.");
        }
        debug!(scenario = %scenario, "시나리오 시작");
        self.state.begin(scenario);
    }

    /// 다음 AI 응답을 반환하고 커서를 한 쌍만큼 전진시킨다.
    ///
    /// 호출할 때마다 턴을 소비하므로 멱등하지 않다.
    pub fn next_reply(&mut self) -> Option<String> {
        let definition = self.active_definition()?;
        let ai_index = self.state.pending_ai_index();
        let text = definition.turn(ai_index)?.text.clone();
        self.state.advance();
        debug!(ai_index, turn_cursor = self.state.turn_cursor, "AI 응답 반환");
        Some(text)
    }

    /// 더 이상 내보낼 AI 응답이 없는지 확인한다.
    pub fn is_finished(&self) -> bool {
        match self.active_definition() {
            Some(definition) => self.state.pending_ai_index() >= definition.len(),
            None => true,
        }
    }

    /// 상태를 `(None, 0)`으로 초기화한다.
    pub fn reset(&mut self) {
        debug!("시나리오 상태 초기화");
        self.state.clear();
    }

    /// 진행 중인 시나리오를 반환한다.
    pub fn active_scenario(&self) -> Option<ScenarioId> {
        self.state.active_scenario
    }

    /// 시나리오가 활성화되어 있는지 확인한다.
    pub fn has_active_scenario(&self) -> bool {
        self.state.active_scenario.is_some()
    }

    /// 현재 턴 커서를 반환한다.
    pub fn turn_cursor(&self) -> usize {
        self.state.turn_cursor
    }

    /// 현재 상태의 복사본을 반환한다.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// 엔진이 사용하는 카탈로그이다.
    pub fn catalog(&self) -> &Arc<ScenarioCatalog> {
        &self.catalog
    }

    fn active_definition(&self) -> Option<&ScenarioDefinition> {
        self.state
            .active_scenario
            .and_then(|id| self.catalog.definition(id))
    }
}

impl Default for ScenarioEngine {
    /// 내장 카탈로그를 사용하는 엔진을 생성한다.
    fn default() -> Self {
        Self::new(builtin_catalog())
    }
}
