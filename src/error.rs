//! Errors returned by game operations.
//!
//! Every variant is an expected, user-facing condition. Handlers turn them into
//! short replies for the acting player; none of them are fatal to the server.

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("A game has already been started in this room")]
    AlreadyActive,

    #[error("No active game found")]
    NotFound,

    #[error("You're not in this game")]
    NotInGame,

    #[error("That player is not in the game")]
    InvalidTarget,

    #[error("You've already joined")]
    AlreadyJoined,

    #[error("You've already voted")]
    AlreadyVoted,

    #[error("You've already left the game")]
    AlreadyLeft,

    #[error("This player has already been kicked")]
    AlreadyKicked,

    #[error("Game has already started")]
    AlreadyStarted,

    #[error("Game is full! Maximum {0} players allowed")]
    GameFull(u32),

    #[error("Need at least {0} players to start")]
    NotEnoughPlayers(u32),

    #[error("{0}")]
    WrongPhase(&'static str),

    #[error("It's not your turn to describe")]
    NotYourTurn,

    #[error("No descriptions have been submitted yet")]
    NoDescriptions,

    #[error("Not enough players remaining")]
    InsufficientPlayers,

    #[error("{0}")]
    Validation(String),

    #[error("Word list unavailable: {0}")]
    WordSource(String),

    #[error("Failed to save settings: {0}")]
    Storage(String),
}

impl GameError {
    /// Stable machine-readable code for protocol replies
    pub fn code(&self) -> &'static str {
        match self {
            GameError::AlreadyActive => "ALREADY_ACTIVE",
            GameError::NotFound => "NOT_FOUND",
            GameError::NotInGame => "NOT_IN_GAME",
            GameError::InvalidTarget => "INVALID_TARGET",
            GameError::AlreadyJoined => "ALREADY_JOINED",
            GameError::AlreadyVoted => "ALREADY_VOTED",
            GameError::AlreadyLeft => "ALREADY_LEFT",
            GameError::AlreadyKicked => "ALREADY_KICKED",
            GameError::AlreadyStarted => "ALREADY_STARTED",
            GameError::GameFull(_) => "GAME_FULL",
            GameError::NotEnoughPlayers(_) => "NOT_ENOUGH_PLAYERS",
            GameError::WrongPhase(_) => "WRONG_PHASE",
            GameError::NotYourTurn => "NOT_YOUR_TURN",
            GameError::NoDescriptions => "NO_DESCRIPTIONS",
            GameError::InsufficientPlayers => "INSUFFICIENT_PLAYERS",
            GameError::Validation(_) => "VALIDATION_ERROR",
            GameError::WordSource(_) => "WORD_SOURCE",
            GameError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
