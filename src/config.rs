use crate::error::ConfigError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 데모 채팅 세션 설정이다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// SDK 초기화에 사용할 앱 ID.
    pub app_id: String,
    /// 광고 요청에 사용할 대화 ID.
    pub conversation_id: String,
    /// 응답 표시 전 최소 지연(ms).
    pub reply_delay_min_ms: u64,
    /// 응답 표시 전 최대 지연(ms).
    pub reply_delay_max_ms: u64,
    /// 내장 카탈로그 대신 사용할 시나리오 YAML 경로.
    pub catalog_path: Option<PathBuf>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            app_id: "test-app".into(),
            conversation_id: "demo-conv".into(),
            reply_delay_min_ms: 700,
            reply_delay_max_ms: 1300,
            catalog_path: None,
        }
    }
}

impl DemoConfig {
    /// 값의 일관성을 검증한다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::BlankField("app_id"));
        }
        if self.conversation_id.trim().is_empty() {
            return Err(ConfigError::BlankField("conversation_id"));
        }
        if self.reply_delay_min_ms > self.reply_delay_max_ms {
            return Err(ConfigError::InvalidDelayRange {
                min_ms: self.reply_delay_min_ms,
                max_ms: self.reply_delay_max_ms,
            });
        }
        Ok(())
    }

    /// 응답 지연 범위를 반환한다.
    ///
    /// 최대값이 최소값보다 작으면 최소값으로 고정한다.
    pub fn reply_delay_range(&self) -> RangeInclusive<Duration> {
        let max_ms = self.reply_delay_max_ms.max(self.reply_delay_min_ms);
        Duration::from_millis(self.reply_delay_min_ms)..=Duration::from_millis(max_ms)
    }
}

/// YAML 파일을 읽어 설정으로 역직렬화한다.
pub fn load_config_from_file(path: &Path) -> anyhow::Result<DemoConfig> {
    let mut file = File::open(path)
        .with_context(|| format!("설정 파일을 열 수 없습니다: {}", path.display()))?;
    load_config_from_reader(&mut file)
}

/// Reader에서 YAML을 읽어 설정을 파싱하고 검증한다.
pub fn load_config_from_reader<R: Read>(reader: &mut R) -> anyhow::Result<DemoConfig> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf)?;
    let config: DemoConfig = serde_yaml::from_str(&buf).context("설정 YAML 파싱 실패")?;
    config.validate()?;
    Ok(config)
}
