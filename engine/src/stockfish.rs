use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

use crate::EngineError;

const IO_CHANNEL_CAPACITY: usize = 256;

/// Line-oriented pipe to a running engine.
///
/// `commands` accepts protocol lines without a trailing newline. `lines`
/// yields every line the engine prints and closes when its output ends,
/// which is how the session notices a crashed or exited process.
pub struct EngineIo {
    pub commands: mpsc::Sender<String>,
    pub lines: mpsc::Receiver<String>,
    child: Option<Child>,
}

impl EngineIo {
    pub fn new(
        commands: mpsc::Sender<String>,
        lines: mpsc::Receiver<String>,
        child: Option<Child>,
    ) -> Self {
        Self {
            commands,
            lines,
            child,
        }
    }

    /// Give the process a moment to exit on its own, then kill it.
    pub async fn close(mut self) {
        drop(self.commands);
        if let Some(mut child) = self.child.take() {
            if tokio::time::timeout(Duration::from_secs(1), child.wait())
                .await
                .is_err()
            {
                tracing::debug!("Engine did not exit in time, killing");
                let _ = child.kill().await;
            }
        }
    }
}

/// Starts engine processes. The session calls this on first use and again
/// after every failure.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self) -> Result<EngineIo, EngineError>;
}

/// Launches a Stockfish-compatible binary over stdin/stdout.
#[derive(Debug, Clone)]
pub struct StockfishLauncher {
    path: PathBuf,
}

impl StockfishLauncher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `path` when given, otherwise search the usual install locations.
    pub fn discover(path: Option<PathBuf>) -> Result<Self, EngineError> {
        path.or_else(find_stockfish_path)
            .map(Self::new)
            .ok_or(EngineError::NotFound)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EngineLauncher for StockfishLauncher {
    #[tracing::instrument(level = "info", skip(self), fields(path = %self.path.display()))]
    async fn launch(&self) -> Result<EngineIo, EngineError> {
        tracing::debug!("Spawning engine process");
        let mut child = tokio::process::Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                EngineError::Spawn(e)
            })?;

        let mut stdin = child.stdin.take().ok_or(EngineError::NoStdin)?;
        let stdout = child.stdout.take().ok_or(EngineError::NoStdout)?;

        let (line_tx, line_rx) = mpsc::channel::<String>(IO_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::warn!("Engine stdout EOF - engine closed");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        if line_tx.send(trimmed.to_string()).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Error reading from engine stdout: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!("Output reader task exiting");
        });

        let (cmd_tx, mut cmd_rx) = mpsc::channel::<String>(IO_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let mut bytes = cmd.into_bytes();
                bytes.push(b'\n');
                if let Err(e) = stdin.write_all(&bytes).await {
                    tracing::error!("Failed to write to engine stdin: {}", e);
                    break;
                }
                if let Err(e) = stdin.flush().await {
                    tracing::error!("Failed to flush engine stdin: {}", e);
                    break;
                }
            }
            tracing::debug!("Stdin writer task exiting");
        });

        tracing::info!("Engine process started");
        Ok(EngineIo::new(cmd_tx, line_rx, Some(child)))
    }
}

/// Find a Stockfish executable in common locations.
pub fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
        "stockfish", // In PATH
    ];

    paths.into_iter().find_map(|candidate| {
        let in_path = candidate == "stockfish";
        if !in_path && !Path::new(candidate).exists() {
            return None;
        }
        std::process::Command::new(candidate)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .ok()
            .map(|_| PathBuf::from(candidate))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_prefers_explicit_path() {
        let launcher = StockfishLauncher::discover(Some("/opt/engines/sf16".into())).unwrap();
        assert_eq!(launcher.path(), Path::new("/opt/engines/sf16"));
    }

    #[tokio::test]
    async fn test_launch_missing_binary_fails() {
        let launcher = StockfishLauncher::new("/nonexistent/definitely-not-an-engine");
        let result = launcher.launch().await;
        assert!(matches!(result, Err(EngineError::Spawn(_))));
    }
}
