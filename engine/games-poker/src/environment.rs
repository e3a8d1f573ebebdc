//! [`Environment`] adapter over a [`PokerTransport`].

use std::time::Duration;

use engine_core::{ActionId, Environment, EnvironmentError, GameMetadata, Observation, Step};
use tracing::{debug, warn};

use crate::{
    ActionCodec, PokerClockSettings, PokerTransport, PokerUpdate, TransportError,
    ACTION_SPACE_SIZE,
};

/// Length of the encoded observation vector.
pub const OBSERVATION_SIZE: usize = 200;

/// Reward for a match that ends because the engine connection dropped.
pub const DISCONNECT_PENALTY: f32 = -1.0;

/// One agent seat in a heads-up match against an external poker engine.
///
/// The opponent lives behind the transport, so from the pipeline's point of
/// view this is a single-player game and `to_play` is always 0.
#[derive(Debug)]
pub struct PokerEnvironment<T: PokerTransport> {
    transport: T,
    codec: ActionCodec,
    clock: PokerClockSettings,
    last: Option<PokerUpdate>,
    done: bool,
    closed: bool,
}

impl<T: PokerTransport> PokerEnvironment<T> {
    pub fn new(transport: T, clock: PokerClockSettings) -> Self {
        Self {
            transport,
            codec: ActionCodec::default(),
            clock,
            last: None,
            done: true,
            closed: false,
        }
    }

    pub fn with_codec(mut self, codec: ActionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn codec(&self) -> &ActionCodec {
        &self.codec
    }

    pub fn clock(&self) -> &PokerClockSettings {
        &self.clock
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn map_error(err: TransportError) -> EnvironmentError {
        match err {
            TransportError::Timeout(after) => EnvironmentError::Timeout(after),
            TransportError::Protocol(message) => EnvironmentError::Protocol(message),
            TransportError::Disconnected(message) => {
                EnvironmentError::Other(format!("poker engine disconnected: {message}"))
            }
        }
    }

    fn last_observation(&self) -> Observation {
        self.last
            .as_ref()
            .map(|u| u.observation.clone())
            .unwrap_or_else(|| Observation::zeros(&[OBSERVATION_SIZE]))
    }

    /// Terminal step for a dropped connection.
    fn connection_lost(&mut self, message: &str) -> Step {
        warn!(error = %message, "Lost connection to poker engine, ending match");
        self.done = true;
        Step {
            observation: self.last_observation(),
            reward: DISCONNECT_PENALTY,
            done: true,
        }
    }
}

impl<T: PokerTransport> Environment for PokerEnvironment<T> {
    fn metadata(&self) -> GameMetadata {
        GameMetadata::new("poker", "Heads-Up Poker")
            .with_actions(ACTION_SPACE_SIZE)
            .with_observation_shape(vec![OBSERVATION_SIZE])
            .with_players(1, vec!["Agent".to_string()])
            .with_action_names(self.codec.action_names())
            .with_description("Heads-up no-limit hold'em against an external engine")
            .with_real_time(self.clock.enforce_clock)
    }

    fn reset(&mut self) -> Result<Observation, EnvironmentError> {
        if self.closed {
            return Err(EnvironmentError::Closed);
        }
        let update = self.transport.start(&self.clock).map_err(Self::map_error)?;
        debug!(
            time_remaining = ?update.time_remaining,
            "Poker match started"
        );
        let observation = update.observation.clone();
        self.done = update.game_over;
        self.last = Some(update);
        Ok(observation)
    }

    fn step(&mut self, action: ActionId) -> Result<Step, EnvironmentError> {
        if self.closed {
            return Err(EnvironmentError::Closed);
        }
        if self.done {
            return Err(EnvironmentError::GameOver);
        }
        let legal = self.legal_actions();
        let poker_action = match self.codec.decode(action) {
            Some(a) if legal.contains(&action) => a,
            _ => return Err(EnvironmentError::IllegalAction { action, legal }),
        };

        match self.transport.send_action(poker_action) {
            Ok(()) => {}
            Err(TransportError::Disconnected(message)) => return Ok(self.connection_lost(&message)),
            Err(err) => return Err(Self::map_error(err)),
        }

        let update = match self.transport.receive(self.clock.player_timeout) {
            Ok(update) => update,
            Err(TransportError::Disconnected(message)) => return Ok(self.connection_lost(&message)),
            Err(err) => return Err(Self::map_error(err)),
        };

        let reward = update.bankroll_delta as f32 / self.codec.max_raise as f32;
        self.done = update.game_over;
        let step = Step {
            observation: update.observation.clone(),
            reward,
            done: self.done,
        };
        self.last = Some(update);
        Ok(step)
    }

    fn legal_actions(&self) -> Vec<ActionId> {
        if self.done {
            return Vec::new();
        }
        match self.last.as_ref().and_then(|u| u.legal_actions.clone()) {
            Some(legal) => legal,
            None => (0..ACTION_SPACE_SIZE as ActionId).collect(),
        }
    }

    /// The engine's clock, when it is enforced.
    fn remaining_clock(&self) -> Option<Duration> {
        if !self.clock.enforce_clock {
            return None;
        }
        self.last.as_ref().and_then(|u| u.time_remaining)
    }

    fn close(&mut self) {
        if !self.closed {
            self.transport.close();
            self.closed = true;
            self.done = true;
        }
    }
}

impl<T: PokerTransport> Drop for PokerEnvironment<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::action::{CALL, CHECK, FOLD, LAST_RAISE};
    use crate::PokerAction;

    /// Transport replaying a fixed list of engine replies.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        replies: VecDeque<Result<PokerUpdate, TransportError>>,
        send_failure: Option<TransportError>,
        sent: Arc<Mutex<Vec<PokerAction>>>,
        closed: Arc<AtomicBool>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<PokerUpdate, TransportError>>) -> Self {
            Self {
                replies: replies.into(),
                ..Default::default()
            }
        }
    }

    impl PokerTransport for ScriptedTransport {
        fn start(&mut self, _clock: &PokerClockSettings) -> Result<PokerUpdate, TransportError> {
            self.receive(Duration::ZERO)
        }

        fn send_action(&mut self, action: PokerAction) -> Result<(), TransportError> {
            if let Some(err) = self.send_failure.clone() {
                return Err(err);
            }
            self.sent.lock().unwrap().push(action);
            Ok(())
        }

        fn receive(&mut self, _timeout: Duration) -> Result<PokerUpdate, TransportError> {
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Disconnected("script ended".into())))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn obs(marker: f32) -> Observation {
        let mut data = vec![0.0; OBSERVATION_SIZE];
        data[0] = marker;
        Observation::flat(data)
    }

    #[test]
    fn test_hand_plays_through() {
        let transport = ScriptedTransport::new(vec![
            Ok(PokerUpdate::new(obs(1.0)).with_time_remaining(Duration::from_secs(600))),
            Ok(PokerUpdate::new(obs(2.0)).with_time_remaining(Duration::from_secs(590))),
            Ok(PokerUpdate::new(obs(3.0)).with_bankroll_delta(40).finished()),
        ]);
        let sent = transport.sent.clone();
        let mut env = PokerEnvironment::new(transport, PokerClockSettings::training());

        assert_eq!(env.reset().unwrap().data()[0], 1.0);
        assert_eq!(env.legal_actions().len(), ACTION_SPACE_SIZE);

        let step = env.step(CALL).unwrap();
        assert_eq!(step.observation.data()[0], 2.0);
        assert_eq!(step.reward, 0.0);
        assert!(!step.done);

        let step = env.step(LAST_RAISE).unwrap();
        assert!(step.done);
        assert!((step.reward - 0.1).abs() < 1e-6);
        assert!(env.legal_actions().is_empty());
        assert_eq!(env.step(FOLD), Err(EnvironmentError::GameOver));

        assert_eq!(
            *sent.lock().unwrap(),
            vec![PokerAction::Call, PokerAction::Raise(400)]
        );
    }

    #[test]
    fn test_engine_legal_actions_are_enforced() {
        let transport = ScriptedTransport::new(vec![Ok(
            PokerUpdate::new(obs(1.0)).with_legal_actions(vec![FOLD, CALL])
        )]);
        let mut env = PokerEnvironment::new(transport, PokerClockSettings::training());
        env.reset().unwrap();

        assert_eq!(env.legal_actions(), vec![FOLD, CALL]);
        match env.step(CHECK) {
            Err(EnvironmentError::IllegalAction { action, legal }) => {
                assert_eq!(action, CHECK);
                assert_eq!(legal, vec![FOLD, CALL]);
            }
            other => panic!("expected IllegalAction, got {other:?}"),
        }
        assert!(matches!(
            env.step(500),
            Err(EnvironmentError::IllegalAction { action: 500, .. })
        ));
    }

    #[test]
    fn test_lost_connection_is_terminal_loss() {
        let transport = ScriptedTransport::new(vec![
            Ok(PokerUpdate::new(obs(1.0))),
            Err(TransportError::Disconnected("socket reset".into())),
        ]);
        let mut env = PokerEnvironment::new(transport, PokerClockSettings::competition());
        env.reset().unwrap();

        let step = env.step(CALL).unwrap();
        assert!(step.done);
        assert_eq!(step.reward, DISCONNECT_PENALTY);
        assert_eq!(step.observation.data()[0], 1.0);
        assert_eq!(env.step(CALL), Err(EnvironmentError::GameOver));
    }

    #[test]
    fn test_send_failure_is_terminal_loss() {
        let mut transport = ScriptedTransport::new(vec![Ok(PokerUpdate::new(obs(1.0)))]);
        transport.send_failure = Some(TransportError::Disconnected("broken pipe".into()));
        let mut env = PokerEnvironment::new(transport, PokerClockSettings::training());
        env.reset().unwrap();

        let step = env.step(FOLD).unwrap();
        assert!(step.done);
        assert_eq!(step.reward, -1.0);
    }

    #[test]
    fn test_timeout_and_protocol_errors_propagate() {
        let transport = ScriptedTransport::new(vec![
            Ok(PokerUpdate::new(obs(1.0))),
            Err(TransportError::Timeout(Duration::from_secs(120))),
        ]);
        let mut env = PokerEnvironment::new(transport, PokerClockSettings::competition());
        env.reset().unwrap();
        let err = env.step(CALL).unwrap_err();
        assert!(err.is_timeout());

        let transport = ScriptedTransport::new(vec![Err(TransportError::Protocol(
            "bad header".into(),
        ))]);
        let mut env = PokerEnvironment::new(transport, PokerClockSettings::training());
        assert_eq!(
            env.reset(),
            Err(EnvironmentError::Protocol("bad header".into()))
        );
    }

    #[test]
    fn test_clock_reported_only_when_enforced() {
        let update =
            || Ok(PokerUpdate::new(obs(1.0)).with_time_remaining(Duration::from_secs(42)));

        let mut env = PokerEnvironment::new(
            ScriptedTransport::new(vec![update()]),
            PokerClockSettings::training(),
        );
        env.reset().unwrap();
        assert_eq!(env.remaining_clock(), None);
        assert!(!env.metadata().real_time);

        let mut env = PokerEnvironment::new(
            ScriptedTransport::new(vec![update()]),
            PokerClockSettings::competition(),
        );
        env.reset().unwrap();
        assert_eq!(env.remaining_clock(), Some(Duration::from_secs(42)));
        assert!(env.metadata().real_time);
    }

    #[test]
    fn test_close_releases_transport_once() {
        let transport = ScriptedTransport::new(vec![Ok(PokerUpdate::new(obs(1.0)))]);
        let closed = transport.closed.clone();
        let mut env = PokerEnvironment::new(transport, PokerClockSettings::training());
        env.reset().unwrap();

        env.close();
        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(env.step(CALL), Err(EnvironmentError::Closed));
        assert_eq!(env.reset(), Err(EnvironmentError::Closed));
    }

    #[test]
    fn test_metadata() {
        let env = PokerEnvironment::new(ScriptedTransport::default(), PokerClockSettings::training());
        let meta = env.metadata();
        assert_eq!(meta.env_id, "poker");
        assert_eq!(meta.action_space_size, 103);
        assert_eq!(meta.observation_size(), OBSERVATION_SIZE);
        assert_eq!(meta.action_name(0), "Fold");
        assert_eq!(env.to_play(), 0);
    }
}
