pub mod command;
pub mod parser;

pub use command::EngineCommand;
pub use parser::{parse_info_line, parse_uci_message, EngineInfo, UciMessage};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UciError {
    #[error("Malformed UCI message: {0}")]
    MalformedMessage(String),
    #[error("Unknown UCI message: {0}")]
    UnknownMessage(String),
}
