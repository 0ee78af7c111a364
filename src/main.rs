use anyhow::Context;
use chat_scenario_demo::ads::{NoAdProvider, SharedAdProvider};
use chat_scenario_demo::config::{DemoConfig, load_config_from_file};
use chat_scenario_demo::engine::{ChatSession, ScenarioEngine, SessionEvent};
use chat_scenario_demo::message::{ChatMessage, MessageRole};
use chat_scenario_demo::scenario::{builtin_catalog, load_catalog_from_file};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::info;

/// 터미널에서 데모 대화를 실행하는 진입점입니다.
///
/// 첫 번째 인자로 설정 YAML 경로를 받을 수 있습니다.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => load_config_from_file(&path)?,
        None => DemoConfig::default(),
    };
    let catalog = match &config.catalog_path {
        Some(path) => Arc::new(
            load_catalog_from_file(path)
                .with_context(|| format!("카탈로그 로드 실패: {}", path.display()))?,
        ),
        None => builtin_catalog(),
    };
    info!(scenarios = catalog.len(), "시나리오 카탈로그 로드 완료");

    let (tx, rx) = mpsc::unbounded_channel();
    let provider: SharedAdProvider = Arc::new(NoAdProvider);
    let mut session = ChatSession::new(ScenarioEngine::new(catalog), provider, config, tx);
    session.initialize().await;
    info!(
        app_id = %session.config().app_id,
        conversation_id = %session.config().conversation_id,
        "데모 세션 준비 완료"
    );
    let printer = tokio::spawn(print_transcript(rx));

    println!("메시지를 입력하세요. /clear 로 대화를 지우고 /quit 로 종료합니다.");
    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    while let Some(line) = lines.next().await {
        let line = line.context("표준 입력 읽기 실패")?;
        match line.trim() {
            "/quit" => break,
            "/clear" => session.clear(),
            text => {
                if let Some(reply) = session.submit(text) {
                    reply.await.context("응답 작업 실패")?;
                }
            }
        }
    }

    drop(session);
    printer.await.context("출력 작업 실패")?;
    Ok(())
}

/// 세션 이벤트를 받아 대화 기록을 출력합니다.
async fn print_transcript(mut rx: UnboundedReceiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::MessageAppended(message) => print_message(&message),
            SessionEvent::ThinkingStarted => println!("ai> ..."),
            SessionEvent::ThinkingFinished => {}
            SessionEvent::Cleared => println!("--- 대화를 지웠습니다 ---"),
        }
    }
}

fn print_message(message: &ChatMessage) {
    match message.role {
        MessageRole::User => println!("you> {}", message.text),
        MessageRole::Ai => println!("ai> {}", message.text),
        MessageRole::Ad => {
            if let Some(ad) = &message.ad {
                println!(
                    "[Ad:{}] {} - {} ({})",
                    ad.format, ad.title, ad.description, ad.action_url
                );
            }
        }
    }
}
