use std::{error::Error as StdError, fmt};

/// Inbound commands understood by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Technique,
    Pid,
    BeginPhase,
    Subblock,
    Trial,
    BeginExperiment,
    BeginBlock,
    EndTrial,
    EndBlock,
    EndExperiment,
    BeginLog,
    EndLog,
    Disconnect,
}

impl CommandKind {
    pub const ALL: [CommandKind; 13] = [
        Self::Technique,
        Self::Pid,
        Self::BeginPhase,
        Self::Subblock,
        Self::Trial,
        Self::BeginExperiment,
        Self::BeginBlock,
        Self::EndTrial,
        Self::EndBlock,
        Self::EndExperiment,
        Self::BeginLog,
        Self::EndLog,
        Self::Disconnect,
    ];

    /// Wire name of the command
    pub fn name(self) -> &'static str {
        match self {
            Self::Technique => "TECHNIQUE",
            Self::Pid => "PID",
            Self::BeginPhase => "BEG_PHS",
            Self::Subblock => "SBLK",
            Self::Trial => "TRL",
            Self::BeginExperiment => "BEG_EXP",
            Self::BeginBlock => "BEG_BLK",
            Self::EndTrial => "END_TRL",
            Self::EndBlock => "END_BLK",
            Self::EndExperiment => "END_EXP",
            Self::BeginLog => "BEG_LOG",
            Self::EndLog => "END_LOG",
            Self::Disconnect => "DISCONNECT",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// One `name<delim>param` line from the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolCommand {
    pub name: String,
    pub param: String,
}

impl ProtocolCommand {
    pub fn new(name: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param: param.into(),
        }
    }

    /// Split `line` into name and parameter.
    ///
    /// Known command names are matched as prefixes first, so names that
    /// contain the delimiter themselves (`BEG_EXP` with `_`) still split at
    /// the right place and the parameter may contain the delimiter. Other
    /// lines split at the first delimiter. A line without any delimiter is
    /// malformed, except for a bare `DISCONNECT`.
    pub fn parse(line: &str, delimiter: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);

        for kind in CommandKind::ALL {
            let param = line
                .strip_prefix(kind.name())
                .and_then(|rest| rest.strip_prefix(delimiter));
            if let Some(param) = param {
                return Ok(Self::new(kind.name(), param));
            }
        }

        if line == CommandKind::Disconnect.name() {
            return Ok(Self::new(line, ""));
        }

        if delimiter.is_empty() {
            return Err(ProtocolError::MalformedLine(line.to_string()));
        }

        line.split_once(delimiter)
            .map(|(name, param)| Self::new(name, param))
            .ok_or_else(|| ProtocolError::MalformedLine(line.to_string()))
    }

    pub fn kind(&self) -> Option<CommandKind> {
        CommandKind::from_name(&self.name)
    }

    /// Parse the parameter as a 32-bit integer
    pub fn int_param(&self) -> Result<i32, ProtocolError> {
        self.param
            .parse()
            .map_err(|_| ProtocolError::InvalidNumber {
                command: self.name.clone(),
                param: self.param.clone(),
            })
    }
}

impl fmt::Display for ProtocolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.param)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Line could not be split into name and parameter
    MalformedLine(String),
    /// A numeric command carried a non-numeric parameter
    InvalidNumber { command: String, param: String },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLine(line) => write!(f, "Malformed line: {line:?}"),
            Self::InvalidNumber { command, param } => {
                write!(f, "Invalid number for {command}: {param:?}")
            }
        }
    }
}

impl StdError for ProtocolError {}
