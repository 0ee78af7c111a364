use crate::scenario::{ScenarioId, TurnRole};

/// 시나리오 카탈로그 검증 중 발생 가능한 오류를 표현한다.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    /// 대화 턴이 하나도 없는 시나리오이다.
    #[error("시나리오에 대화 턴이 없습니다: {0}")]
    EmptyScenario(ScenarioId),
    /// user/ai 순서가 교대로 이어지지 않는 경우이다.
    #[error("시나리오 {scenario}의 {index}번째 턴은 {expected} 역할이어야 합니다. (실제: {actual})")]
    RoleOutOfOrder {
        scenario: ScenarioId,
        index: usize,
        expected: TurnRole,
        actual: TurnRole,
    },
    /// 키워드가 비어 있는 규칙이다.
    #[error("키워드 규칙에 키워드가 없습니다: {0}")]
    EmptyKeywordRule(ScenarioId),
    /// 공백 키워드가 포함된 규칙이다.
    #[error("키워드 규칙에 빈 키워드가 포함되어 있습니다: {0}")]
    BlankKeyword(ScenarioId),
    /// 정의되지 않은 시나리오를 참조하는 키워드 규칙이다.
    #[error("키워드 규칙이 정의되지 않은 시나리오를 참조합니다: {0}")]
    UnknownRuleScenario(ScenarioId),
    /// 정의되지 않은 시나리오를 fallback으로 지정한 경우이다.
    #[error("fallback 시나리오가 정의되지 않았습니다: {0}")]
    UnknownFallbackScenario(ScenarioId),
}

/// 데모 설정 검증 중 발생 가능한 오류를 표현한다.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 응답 지연 범위가 뒤집힌 경우이다.
    #[error("응답 지연 범위가 잘못되었습니다: {min_ms}ms > {max_ms}ms")]
    InvalidDelayRange { min_ms: u64, max_ms: u64 },
    /// 필수 식별자 값이 비어 있는 경우이다.
    #[error("{0} 값이 비어 있습니다.")]
    BlankField(&'static str),
}
