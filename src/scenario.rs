use crate::error::CatalogError;
use anyhow::Context;
use once_cell::sync::Lazy;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// 기본 카탈로그 YAML 원문이다.
const BUILTIN_CATALOG_YAML: &str = include_str!("../scenarios/catalog.yaml");

/// 데모 대화 시나리오의 식별자이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// 영어 학습 대화.
    English,
    /// 프로그래밍 학습 대화(영어).
    Programming,
    /// 프로그래밍 학습 대화(일본어).
    ProgrammingJa,
    /// 여행 계획 대화.
    Travel,
    /// lead_gen 광고 포맷 테스트.
    LeadGen,
    /// static 광고 포맷 테스트.
    StaticAd,
    /// followup 광고 포맷 테스트.
    Followup,
}

impl ScenarioId {
    /// YAML 표기와 동일한 문자열을 반환한다.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioId::English => "english",
            ScenarioId::Programming => "programming",
            ScenarioId::ProgrammingJa => "programming_ja",
            ScenarioId::Travel => "travel",
            ScenarioId::LeadGen => "lead_gen",
            ScenarioId::StaticAd => "static_ad",
            ScenarioId::Followup => "followup",
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 시나리오 턴의 발화자이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    /// 사용자 발화.
    User,
    /// AI 응답.
    Ai,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => f.write_str("user"),
            TurnRole::Ai => f.write_str("ai"),
        }
    }
}

/// 시나리오 내 단일 메시지이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTurn {
    /// 발화자 역할.
    pub role: TurnRole,
    /// 메시지 본문.
    pub text: String,
}

/// user/ai가 교대로 이어지는 대화 정의이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioDefinition {
    /// 순서가 보장된 턴 목록.
    pub turns: Vec<ScenarioTurn>,
}

impl ScenarioDefinition {
    /// 전체 턴 수를 반환한다.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// 턴이 비었는지 여부를 확인한다.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// 지정한 위치의 턴을 반환한다.
    pub fn turn(&self, index: usize) -> Option<&ScenarioTurn> {
        self.turns.get(index)
    }

    /// 이 시나리오가 내보낼 AI 응답 수를 반환한다.
    pub fn ai_reply_count(&self) -> usize {
        self.turns.len() / 2
    }

    /// 교대 순서를 검증한다.
    fn validate(&self, id: ScenarioId) -> Result<(), CatalogError> {
        if self.turns.is_empty() {
            return Err(CatalogError::EmptyScenario(id));
        }
        for (index, turn) in self.turns.iter().enumerate() {
            let expected = if index % 2 == 0 {
                TurnRole::User
            } else {
                TurnRole::Ai
            };
            if turn.role != expected {
                return Err(CatalogError::RoleOutOfOrder {
                    scenario: id,
                    index,
                    expected,
                    actual: turn.role,
                });
            }
        }
        Ok(())
    }
}

/// 시나리오를 활성화하는 키워드 묶음이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// 활성화할 시나리오.
    pub scenario: ScenarioId,
    /// 부분 문자열로 비교할 키워드 목록(소문자).
    pub keywords: Vec<String>,
}

impl KeywordRule {
    /// 소문자로 변환된 입력에 키워드가 포함되는지 확인한다.
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// 어떤 키워드 규칙도 일치하지 않을 때의 처리 정책이다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// 시나리오를 선택하지 않는다. 호출 측이 안내 메시지를 보낸다.
    NoMatch,
    /// 지정한 시나리오를 기본값으로 선택한다.
    Scenario(ScenarioId),
}

impl Default for FallbackPolicy {
    /// 정책이 생략되면 시나리오를 선택하지 않는다.
    fn default() -> Self {
        FallbackPolicy::NoMatch
    }
}

impl<'de> Deserialize<'de> for FallbackPolicy {
    /// `no_match` 문자열 또는 `{ scenario: <id> }` 형태를 모두 지원한다.
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Helper {
            Simple(String),
            Detailed { scenario: ScenarioId },
        }

        match Helper::deserialize(deserializer)? {
            Helper::Simple(value) => match value.as_str() {
                "no_match" => Ok(FallbackPolicy::NoMatch),
                other => Err(de::Error::custom(format!(
                    "알 수 없는 fallback 정책: {other}"
                ))),
            },
            Helper::Detailed { scenario } => Ok(FallbackPolicy::Scenario(scenario)),
        }
    }
}

/// YAML 문서의 원형이다.
#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    fallback: FallbackPolicy,
    keyword_rules: Vec<KeywordRule>,
    scenarios: HashMap<ScenarioId, ScenarioDefinition>,
}

/// 검증이 끝난 불변 시나리오 카탈로그이다.
#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    /// 선언 순서대로 검사할 키워드 규칙.
    rules: Vec<KeywordRule>,
    /// 시나리오별 대화 정의.
    scenarios: HashMap<ScenarioId, ScenarioDefinition>,
    /// 불일치 시 처리 정책.
    fallback: FallbackPolicy,
}

impl ScenarioCatalog {
    /// 구성 요소를 검증한 뒤 카탈로그를 생성한다.
    ///
    /// 키워드는 소문자로 정규화된다.
    pub fn new(
        rules: Vec<KeywordRule>,
        scenarios: HashMap<ScenarioId, ScenarioDefinition>,
        fallback: FallbackPolicy,
    ) -> Result<Self, CatalogError> {
        for (id, definition) in &scenarios {
            definition.validate(*id)?;
        }
        let mut normalized = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.keywords.is_empty() {
                return Err(CatalogError::EmptyKeywordRule(rule.scenario));
            }
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(CatalogError::BlankKeyword(rule.scenario));
            }
            if !scenarios.contains_key(&rule.scenario) {
                return Err(CatalogError::UnknownRuleScenario(rule.scenario));
            }
            normalized.push(KeywordRule {
                scenario: rule.scenario,
                keywords: rule.keywords.iter().map(|k| k.to_lowercase()).collect(),
            });
        }
        if let FallbackPolicy::Scenario(id) = fallback {
            if !scenarios.contains_key(&id) {
                return Err(CatalogError::UnknownFallbackScenario(id));
            }
        }
        Ok(Self {
            rules: normalized,
            scenarios,
            fallback,
        })
    }

    /// YAML 문자열을 파싱하고 검증한다.
    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let doc: CatalogDocument =
            serde_yaml::from_str(text).context("시나리오 카탈로그 YAML 파싱 실패")?;
        let catalog = Self::new(doc.keyword_rules, doc.scenarios, doc.fallback)?;
        Ok(catalog)
    }

    /// 선언 순서가 유지된 키워드 규칙 목록이다.
    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// 시나리오 정의를 조회한다.
    pub fn definition(&self, id: ScenarioId) -> Option<&ScenarioDefinition> {
        self.scenarios.get(&id)
    }

    /// 불일치 처리 정책을 반환한다.
    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// 정의된 시나리오 수를 반환한다.
    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    /// 정의된 시나리오가 없는지 확인한다.
    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

static BUILTIN_CATALOG: Lazy<Arc<ScenarioCatalog>> = Lazy::new(|| {
    Arc::new(
        ScenarioCatalog::from_yaml_str(BUILTIN_CATALOG_YAML)
            .expect("내장 시나리오 카탈로그가 올바르지 않습니다."),
    )
});

/// 프로세스 전체에서 공유하는 내장 카탈로그를 반환한다.
pub fn builtin_catalog() -> Arc<ScenarioCatalog> {
    BUILTIN_CATALOG.clone()
}

/// YAML 파일을 읽어 카탈로그로 역직렬화한다.
pub fn load_catalog_from_file(path: &Path) -> anyhow::Result<ScenarioCatalog> {
    let mut file = File::open(path)
        .with_context(|| format!("카탈로그 파일을 열 수 없습니다: {}", path.display()))?;
    load_catalog_from_reader(&mut file)
}

/// Reader에서 YAML을 읽어 카탈로그로 파싱한다.
pub fn load_catalog_from_reader<R: Read>(reader: &mut R) -> anyhow::Result<ScenarioCatalog> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    ScenarioCatalog::from_yaml_str(&buf)
}
