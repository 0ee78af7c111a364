//! 스크립트 기반 데모 채팅에서 키워드로 시나리오를 고르고 턴 단위로 응답을 재생하는 엔진과,
//! 응답마다 외부 광고 SDK에 문맥 광고를 요청하는 대화 세션을 제공한다.

pub mod ads;
pub mod config;
pub mod engine;
pub mod error;
pub mod message;
pub mod scenario;

pub use ads::{AdEvent, AdFormat, AdProvider, AdRecord, AdRequest, AdResponse, NoAdProvider};
pub use config::DemoConfig;
pub use engine::{ChatSession, EngineState, ScenarioEngine, SessionEvent};
pub use error::{CatalogError, ConfigError};
pub use scenario::{FallbackPolicy, ScenarioCatalog, ScenarioId, builtin_catalog};
