use super::*;

fn play(moves: &[ActionId]) -> State {
    moves
        .iter()
        .fold(State::new(), |s, &m| s.make_move(m).unwrap())
}

#[test]
fn test_initial_state() {
    let state = State::new();
    assert_eq!(state.board, [0; 9]);
    assert_eq!(state.current_player, 1);
    assert_eq!(state.winner, 0);
    assert_eq!(state.to_play(), 0);
    assert!(!state.is_done());
}

#[test]
fn test_legal_moves() {
    let state = State::new();
    assert_eq!(state.legal_moves(), (0..9).collect::<Vec<_>>());

    let state = state.make_move(4).unwrap();
    let legal = state.legal_moves();
    assert_eq!(legal.len(), 8);
    assert!(!legal.contains(&4));
    assert_eq!(state.to_play(), 1);
}

#[test]
fn test_occupied_cell_rejected() {
    let state = State::new().make_move(4).unwrap();
    assert!(state.make_move(4).is_none());
    assert!(state.make_move(9).is_none());
}

#[test]
fn test_winning_game() {
    // X wins with the top row
    let state = play(&[0, 3, 1, 4, 2]);
    assert_eq!(state.winner, 1);
    assert!(state.is_done());
    assert!(state.legal_moves().is_empty());
}

#[test]
fn test_draw_detection() {
    // X O X / O X O / O X O
    let board = [1, 2, 1, 2, 1, 2, 2, 1, 2];
    assert_eq!(State::check_winner(&board), 3);

    let state = play(&[0, 1, 2, 4, 3, 5, 7, 6, 8]);
    assert_eq!(state.winner, 3);
}

#[test]
fn test_all_winning_lines() {
    for line in LINES {
        let mut board = [0u8; 9];
        for i in line {
            board[i] = 2;
        }
        assert_eq!(State::check_winner(&board), 2, "line {line:?}");
    }
}

#[test]
fn test_observation_encoding() {
    let obs = State::new().observation();
    assert_eq!(obs.shape(), &[OBSERVATION_SIZE]);

    let data = obs.data();
    assert!(data[..18].iter().all(|&v| v == 0.0));
    assert!(data[18..27].iter().all(|&v| v == 1.0));
    assert_eq!(&data[27..], &[1.0, 0.0]);

    let data = State::new().make_move(4).unwrap().observation().data().to_vec();
    assert_eq!(data[4], 1.0);
    assert_eq!(data[18 + 4], 0.0);
    assert_eq!(&data[27..], &[0.0, 1.0]);
}

#[test]
fn test_environment_step_rewards_winner() {
    let mut env = TicTacToe::new();
    env.reset().unwrap();

    for &m in &[0, 3, 1, 4] {
        let step = env.step(m).unwrap();
        assert_eq!(step.reward, 0.0);
        assert!(!step.done);
    }
    assert_eq!(env.to_play(), 0);

    let step = env.step(2).unwrap();
    assert_eq!(step.reward, 1.0);
    assert!(step.done);
    assert!(env.legal_actions().is_empty());
}

#[test]
fn test_draw_rewards_nothing() {
    let mut env = TicTacToe::new();
    env.reset().unwrap();
    let moves = [0, 1, 2, 4, 3, 5, 7, 6, 8];
    let mut last = None;
    for m in moves {
        last = Some(env.step(m).unwrap());
    }
    let last = last.unwrap();
    assert!(last.done);
    assert_eq!(last.reward, 0.0);
}

#[test]
fn test_illegal_action_error() {
    let mut env = TicTacToe::new();
    env.reset().unwrap();
    env.step(4).unwrap();

    match env.step(4) {
        Err(EnvironmentError::IllegalAction { action, legal }) => {
            assert_eq!(action, 4);
            assert_eq!(legal.len(), 8);
        }
        other => panic!("expected IllegalAction, got {other:?}"),
    }
    // State unchanged after the rejected move
    assert_eq!(env.to_play(), 1);
}

#[test]
fn test_step_after_game_over() {
    let mut env = TicTacToe::from_state(play(&[0, 3, 1, 4, 2]));
    assert_eq!(env.step(5), Err(EnvironmentError::GameOver));
}

#[test]
fn test_reset_clears_board() {
    let mut env = TicTacToe::from_state(play(&[0, 3]));
    env.reset().unwrap();
    assert_eq!(*env.state(), State::new());
}

#[test]
fn test_metadata() {
    let meta = TicTacToe::new().metadata();
    assert_eq!(meta.env_id, "tictactoe");
    assert_eq!(meta.action_space_size, 9);
    assert_eq!(meta.observation_size(), OBSERVATION_SIZE);
    assert_eq!(meta.player_count, 2);
    assert_eq!(meta.action_name(4), "(1,1)");
}

#[test]
fn test_expert_takes_win_then_blocks() {
    // X: 0, 1; O: 3, 4; X to move wins at 2
    let mut env = TicTacToe::from_state(play(&[0, 3, 1, 4]));
    assert_eq!(env.expert_action(), Some(2));

    // X: 0, 8; O: 3, 4; O threatens 5 and X must block
    let mut env = TicTacToe::from_state(play(&[0, 3, 8, 4]));
    assert_eq!(env.expert_action(), Some(5));

    // Opening takes the centre
    let mut env = TicTacToe::new();
    assert_eq!(env.expert_action(), Some(4));
}

#[test]
fn test_registry_creates_tictactoe() {
    register_tictactoe();
    let env = engine_core::create_environment("tictactoe").unwrap();
    assert_eq!(env.metadata().display_name, "Tic-Tac-Toe");
}
