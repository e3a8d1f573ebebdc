//! TicTacToe environment for Mirage
//!
//! The two-player zero-sum reference game. Players alternate (`to_play` 0 is
//! X, 1 is O), and a win pays +1 to the player who completed the line.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::{create_environment, Environment};
//! use games_tictactoe::register_tictactoe;
//!
//! register_tictactoe();
//!
//! let mut env = create_environment("tictactoe").expect("tictactoe should be registered");
//! let obs = env.reset().unwrap();
//! assert_eq!(obs.len(), 29);
//! assert_eq!(env.legal_actions().len(), 9);
//! ```

use engine_core::{
    register_game, ActionId, Environment, EnvironmentError, GameMetadata, Observation, PlayerId,
    Step,
};

/// Observation layout: X cells (9), O cells (9), legal mask (9), player to move (2).
pub const OBSERVATION_SIZE: usize = 29;

/// Number of board cells, and of actions.
pub const NUM_CELLS: usize = 9;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8], // rows
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8], // columns
    [0, 4, 8],
    [2, 4, 6], // diagonals
];

/// Register TicTacToe with the global environment registry
pub fn register_tictactoe() {
    register_game("tictactoe".to_string(), || Box::new(TicTacToe::new()));
}

/// TicTacToe board state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct State {
    /// Board representation: 0=empty, 1=X, 2=O
    board: [u8; 9],
    /// Current player: 1=X, 2=O
    current_player: u8,
    /// Winner: 0=none/ongoing, 1=X, 2=O, 3=draw
    winner: u8,
}

impl State {
    pub fn new() -> Self {
        Self {
            board: [0; 9],
            current_player: 1, // X goes first
            winner: 0,
        }
    }

    pub fn board(&self) -> &[u8; 9] {
        &self.board
    }

    pub fn winner(&self) -> u8 {
        self.winner
    }

    pub fn is_done(&self) -> bool {
        self.winner != 0
    }

    /// Empty cells, ascending. Empty once the game is over.
    pub fn legal_moves(&self) -> Vec<ActionId> {
        if self.is_done() {
            return Vec::new();
        }
        (0..NUM_CELLS as ActionId)
            .filter(|&pos| self.board[pos as usize] == 0)
            .collect()
    }

    /// Player to move as a pipeline player index (X = 0, O = 1).
    pub fn to_play(&self) -> PlayerId {
        (self.current_player - 1) as PlayerId
    }

    /// Place the current player's mark. Returns `None` for an illegal move.
    pub fn make_move(&self, position: ActionId) -> Option<State> {
        let cell = position as usize;
        if self.is_done() || cell >= NUM_CELLS || self.board[cell] != 0 {
            return None;
        }

        let mut next = *self;
        next.board[cell] = self.current_player;
        next.winner = Self::check_winner(&next.board);
        if next.winner == 0 {
            next.current_player = if self.current_player == 1 { 2 } else { 1 };
        }
        Some(next)
    }

    fn check_winner(board: &[u8; 9]) -> u8 {
        for &[a, b, c] in &LINES {
            if board[a] != 0 && board[a] == board[b] && board[b] == board[c] {
                return board[a];
            }
        }
        if board.iter().all(|&cell| cell != 0) {
            return 3; // Draw
        }
        0
    }

    /// Cell that completes a line for `player`, if any.
    fn winning_cell(&self, player: u8) -> Option<usize> {
        LINES.iter().find_map(|line| {
            let mine = line.iter().filter(|&&i| self.board[i] == player).count();
            let empty: Vec<usize> = line.iter().copied().filter(|&i| self.board[i] == 0).collect();
            (mine == 2 && empty.len() == 1).then(|| empty[0])
        })
    }

    /// Flat observation of this state.
    pub fn observation(&self) -> Observation {
        let mut data = vec![0.0f32; OBSERVATION_SIZE];
        for (i, &cell) in self.board.iter().enumerate() {
            match cell {
                1 => data[i] = 1.0,
                2 => data[i + 9] = 1.0,
                _ => {}
            }
        }
        for pos in self.legal_moves() {
            data[18 + pos as usize] = 1.0;
        }
        data[27 + self.to_play() as usize] = 1.0;
        Observation::flat(data)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// TicTacToe environment
#[derive(Debug, Default)]
pub struct TicTacToe {
    state: State,
}

impl TicTacToe {
    pub fn new() -> Self {
        Self {
            state: State::new(),
        }
    }

    /// Start from an arbitrary position.
    pub fn from_state(state: State) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &State {
        &self.state
    }
}

impl Environment for TicTacToe {
    fn metadata(&self) -> GameMetadata {
        GameMetadata::new("tictactoe", "Tic-Tac-Toe")
            .with_actions(NUM_CELLS)
            .with_observation_shape(vec![OBSERVATION_SIZE])
            .with_players(2, vec!["X".to_string(), "O".to_string()])
            .with_action_names((0..NUM_CELLS).map(|i| format!("({},{})", i / 3, i % 3)).collect())
            .with_description("Get three in a row to win!")
    }

    fn reset(&mut self) -> Result<Observation, EnvironmentError> {
        self.state = State::new();
        Ok(self.state.observation())
    }

    fn step(&mut self, action: ActionId) -> Result<Step, EnvironmentError> {
        if self.state.is_done() {
            return Err(EnvironmentError::GameOver);
        }
        let mover = self.state.current_player;
        let next = self
            .state
            .make_move(action)
            .ok_or_else(|| EnvironmentError::IllegalAction {
                action,
                legal: self.state.legal_moves(),
            })?;
        self.state = next;

        let reward = if next.winner == mover { 1.0 } else { 0.0 };
        Ok(Step {
            observation: next.observation(),
            reward,
            done: next.is_done(),
        })
    }

    fn legal_actions(&self) -> Vec<ActionId> {
        self.state.legal_moves()
    }

    fn to_play(&self) -> PlayerId {
        self.state.to_play()
    }

    /// Win if possible, otherwise block, otherwise centre, otherwise the first
    /// free cell.
    fn expert_action(&mut self) -> Option<ActionId> {
        if self.state.is_done() {
            return None;
        }
        let me = self.state.current_player;
        let them = if me == 1 { 2 } else { 1 };
        self.state
            .winning_cell(me)
            .or_else(|| self.state.winning_cell(them))
            .or_else(|| (self.state.board[4] == 0).then_some(4))
            .map(|cell| cell as ActionId)
            .or_else(|| self.state.legal_moves().first().copied())
    }
}

#[cfg(test)]
mod tests;
