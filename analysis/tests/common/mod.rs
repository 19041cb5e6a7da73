#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use analysis::{AnalysisSettings, Analyzer};
use chess::Position;
use engine::mock::MockLauncher;
use tokio::sync::watch;

pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_settings() -> AnalysisSettings {
    AnalysisSettings {
        restart_backoff: Duration::from_millis(50),
        handshake_timeout: Duration::from_millis(500),
        ..AnalysisSettings::default()
    }
}

pub fn analyzer(mock: &MockLauncher) -> Analyzer {
    init_tracing();
    Analyzer::with_launcher(fast_settings(), Arc::new(mock.clone()))
}

/// Fingerprint after playing `moves` (SAN) from the start.
pub fn fen_after(moves: &[&str]) -> String {
    let mut position = Position::starting();
    for mv in moves {
        position = position.play_san(mv).unwrap().0;
    }
    position.fingerprint()
}

pub async fn wait_for<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("sender dropped");
}

pub async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
