//! Analysis orchestration: drives two engine sessions, caches their
//! evaluations, and labels the moves of a game.
//!
//! [`Analyzer`] wires everything from [`AnalysisSettings`]. The live
//! controller and the game pipeline each own a separate engine session and
//! share one [`EvaluationCache`].

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod live;
pub mod pipeline;
pub mod summary;

use std::sync::Arc;

use engine::{EngineLauncher, EngineSession, Evaluation, StockfishLauncher};

pub use cache::EvaluationCache;
pub use classify::{classify, cp_loss, MoveClassification};
pub use config::AnalysisSettings;
pub use error::AnalysisError;
pub use live::{LiveAnalysis, LiveOptions, LiveState};
pub use pipeline::{AnalysisProgress, ClassifiedMove, GameAnalysis, GameRecord};
pub use summary::{compute_accuracy, GameSummary, SideSummary};

pub struct Analyzer {
    settings: AnalysisSettings,
    cache: EvaluationCache,
    live_session: EngineSession,
    sweep_session: EngineSession,
    live: LiveAnalysis,
    game: GameAnalysis,
}

impl Analyzer {
    /// Start both sessions against a Stockfish binary, from
    /// `settings.engine_path` or the usual install locations.
    pub fn new(settings: AnalysisSettings) -> Result<Self, AnalysisError> {
        let launcher = StockfishLauncher::discover(settings.engine_path.clone())?;
        tracing::info!(path = %launcher.path().display(), "Using engine");
        Ok(Self::with_launcher(settings, Arc::new(launcher)))
    }

    pub fn with_launcher(settings: AnalysisSettings, launcher: Arc<dyn EngineLauncher>) -> Self {
        let cache = EvaluationCache::new();
        let live_session = EngineSession::start(launcher.clone(), settings.live_session_config());
        let sweep_session = EngineSession::start(launcher, settings.sweep_session_config());
        let live = LiveAnalysis::new(
            live_session.clone(),
            cache.clone(),
            settings.max_live_depth,
        );
        let game = GameAnalysis::new(sweep_session.clone(), cache.clone(), settings.sweep_depth);

        Self {
            settings,
            cache,
            live_session,
            sweep_session,
            live,
            game,
        }
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn live(&self) -> &LiveAnalysis {
        &self.live
    }

    pub fn game(&self) -> &GameAnalysis {
        &self.game
    }

    pub fn cache(&self) -> &EvaluationCache {
        &self.cache
    }

    /// Analyze `fingerprint` live with the configured depth and line count.
    pub async fn analyze_live(&self, fingerprint: impl Into<String>) {
        self.live
            .analyze(fingerprint, self.settings.live_options())
            .await;
    }

    pub fn get_cached_evaluation(&self, fingerprint: &str) -> Option<Evaluation> {
        self.cache.get(fingerprint)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Summary of the moves classified so far.
    pub fn summary(&self) -> GameSummary {
        GameSummary::from_moves(&self.game.moves())
    }

    pub async fn shutdown(&self) {
        self.game.stop_analysis().await;
        self.live.stop().await;
        self.live_session.shutdown().await;
        self.sweep_session.shutdown().await;
    }
}
