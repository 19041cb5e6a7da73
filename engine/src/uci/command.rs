use std::fmt;

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    SetOption { name: String, value: Option<String> },
    IsReady,
    NewGame,
    SetPosition { fen: String },
    Go { depth: u32 },
    Stop,
    Quit,
}

impl EngineCommand {
    pub fn set_option(name: &str, value: impl ToString) -> Self {
        Self::SetOption {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// The command as a protocol line, without the trailing newline.
    pub fn to_uci_string(&self) -> String {
        match self {
            Self::Uci => "uci".to_string(),
            Self::SetOption { name, value } => match value {
                Some(val) => format!("setoption name {} value {}", name, val),
                None => format!("setoption name {}", name),
            },
            Self::IsReady => "isready".to_string(),
            Self::NewGame => "ucinewgame".to_string(),
            Self::SetPosition { fen } => format!("position fen {}", fen),
            Self::Go { depth } => format!("go depth {}", depth),
            Self::Stop => "stop".to_string(),
            Self::Quit => "quit".to_string(),
        }
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uci_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        assert_eq!(EngineCommand::Uci.to_uci_string(), "uci");
        assert_eq!(
            EngineCommand::set_option("MultiPV", 3).to_uci_string(),
            "setoption name MultiPV value 3"
        );
        assert_eq!(
            EngineCommand::SetOption {
                name: "Clear Hash".into(),
                value: None
            }
            .to_uci_string(),
            "setoption name Clear Hash"
        );
        assert_eq!(EngineCommand::NewGame.to_string(), "ucinewgame");
        assert_eq!(
            EngineCommand::SetPosition {
                fen: "8/8/8/8/8/8/8/K6k w - - 0 1".into()
            }
            .to_string(),
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1"
        );
        assert_eq!(EngineCommand::Go { depth: 18 }.to_string(), "go depth 18");
        assert_eq!(EngineCommand::Stop.to_string(), "stop");
        assert_eq!(EngineCommand::Quit.to_string(), "quit");
    }
}
