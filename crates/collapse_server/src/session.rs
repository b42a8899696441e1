//! The game session actor.
//!
//! One task owns the [`Simulation`] and every client's outbound queue.
//! Ticks, broadcasts and client requests are multiplexed on that task, so
//! requests apply between ticks and nothing needs a lock.

use std::collections::BTreeMap;
use std::time::Duration;

use collapse_core::components::{PlayerId, WeaponKind};
use collapse_core::error::GameError;
use collapse_core::intent::{Intent, IntentOutcome};
use collapse_core::simulation::{Simulation, TickEvents};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::protocol::{ActionResult, ClientMsg, ServerMsg};

/// Messages buffered per connection. A client that falls this far behind
/// starts losing messages instead of growing the queue.
pub const OUTBOUND_QUEUE: usize = 64;

/// Outbound queue of one connection.
pub type Outbound = mpsc::Sender<ServerMsg>;

/// Queue `msg` without waiting on a slow socket.
fn deliver(id: PlayerId, outbound: &Outbound, msg: ServerMsg) {
    match outbound.try_send(msg) {
        // A closed queue means the connection is going away; its
        // disconnect event follows.
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(ServerMsg::GameUpdate(_))) => {
            tracing::trace!(connection = %id, "Outbound queue full, update dropped");
        }
        Err(TrySendError::Full(_)) => {
            tracing::warn!(connection = %id, "Outbound queue full, reply dropped");
        }
    }
}

/// What connection tasks tell the session.
#[derive(Debug)]
pub enum SessionEvent {
    /// A socket opened. The player does not exist until it joins.
    Connected {
        /// Id assigned to the connection.
        id: PlayerId,
        /// Queue the session pushes messages into.
        outbound: Outbound,
    },
    /// A parsed client request.
    Message {
        /// Sending connection.
        id: PlayerId,
        /// The request.
        msg: ClientMsg,
    },
    /// The socket closed.
    Disconnected {
        /// Closed connection.
        id: PlayerId,
    },
}

/// Owns the match and the connected clients.
#[derive(Debug)]
pub struct GameSession {
    sim: Simulation,
    clients: BTreeMap<PlayerId, Outbound>,
    tick_period: Duration,
    broadcast_period: Duration,
}

impl GameSession {
    /// Wrap a simulation; periods come from its `updates` settings.
    pub fn new(sim: Simulation) -> Self {
        let updates = &sim.config().updates;
        let tick_period = Duration::from_millis(updates.game_loop_tick);
        let broadcast_period = Duration::from_millis(updates.client_broadcast);
        Self {
            sim,
            clients: BTreeMap::new(),
            tick_period,
            broadcast_period,
        }
    }

    /// The match.
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Number of open connections, joined or not.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Advance the match one tick.
    pub fn step(&mut self) -> TickEvents {
        let events = self.sim.tick();
        if !events.deaths.is_empty() || !events.destroyed.is_empty() {
            tracing::debug!(
                tick = self.sim.get_tick(),
                deaths = events.deaths.len(),
                destroyed = events.destroyed.len(),
                "Combat losses"
            );
        }
        events
    }

    /// Push the current view to every joined client.
    pub fn broadcast(&self) {
        for (id, outbound) in &self.clients {
            if let Some(view) = self.sim.view_for(*id) {
                deliver(*id, outbound, ServerMsg::GameUpdate(Box::new(view)));
            }
        }
    }

    /// Apply one connection event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { id, outbound } => {
                tracing::debug!(connection = %id, "Connection opened");
                self.clients.insert(id, outbound);
            }
            SessionEvent::Message { id, msg } => self.handle_message(id, msg),
            SessionEvent::Disconnected { id } => {
                self.clients.remove(&id);
                if let Ok(IntentOutcome::Left(true)) = self.sim.apply_intent(id, Intent::Disconnect) {
                    self.send_to_others(id, &ServerMsg::PlayerLeft { id });
                }
                tracing::debug!(connection = %id, "Connection closed");
            }
        }
    }

    fn handle_message(&mut self, id: PlayerId, msg: ClientMsg) {
        let name = msg.name();
        let outcome = match self.sim.apply_intent(id, Intent::from(msg)) {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::debug!(connection = %id, request = name, %error, "Request refused");
                let message = match error {
                    GameError::PlayerNotFound(_) => "Join the game first".to_string(),
                    other => other.to_string(),
                };
                self.send(id, ServerMsg::error(message));
                return;
            }
        };

        match outcome {
            IntentOutcome::Joined(view) => {
                let username = view.player.name.clone();
                self.send(id, ServerMsg::Init(view));
                self.send_to_others(id, &ServerMsg::PlayerJoined { id, username });
            }
            IntentOutcome::Moved {
                accepted: true,
                destination,
            } => self.send(id, ServerMsg::MoveConfirmed { destination }),
            IntentOutcome::Moved { accepted: false, .. } => self.send(
                id,
                ServerMsg::MoveError {
                    message: "Invalid destination".to_string(),
                },
            ),
            IntentOutcome::Targeted(_) => {}
            IntentOutcome::Fired { weapon, result } => {
                let result = ActionResult::from_shot(&result);
                let msg = match weapon {
                    WeaponKind::Laser => ServerMsg::LaserResult(result),
                    WeaponKind::Lrm => ServerMsg::LrmResult(result),
                };
                self.send(id, msg);
            }
            IntentOutcome::Built(result) => {
                self.send(id, ServerMsg::BuildResult(ActionResult::from_build(&result)));
            }
            IntentOutcome::Reset => {
                for (client, outbound) in &self.clients {
                    deliver(*client, outbound, ServerMsg::GameReset);
                }
            }
            IntentOutcome::Left(_) => {}
        }
    }

    fn send(&self, id: PlayerId, msg: ServerMsg) {
        if let Some(outbound) = self.clients.get(&id) {
            deliver(id, outbound, msg);
        }
    }

    fn send_to_others(&self, id: PlayerId, msg: &ServerMsg) {
        for (other, outbound) in self.clients.iter().filter(|(other, _)| **other != id) {
            deliver(*other, outbound, msg.clone());
        }
    }

    /// Run until shutdown is signalled or every event sender is gone.
    ///
    /// Returns the final match state. A late tick is skipped rather than
    /// run in a burst.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<SessionEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Simulation {
        let start = Instant::now();
        let mut ticker = interval_at(start + self.tick_period, self.tick_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcaster = interval_at(start + self.broadcast_period, self.broadcast_period);
        broadcaster.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            tick_ms = self.tick_period.as_millis() as u64,
            broadcast_ms = self.broadcast_period.as_millis() as u64,
            "Session started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.step();
                }
                _ = broadcaster.tick() => self.broadcast(),
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            tick = self.sim.get_tick(),
            players = self.sim.player_count(),
            "Session stopped"
        );
        self.sim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collapse_core::components::Team;
    use collapse_core::config::GameConfig;
    use collapse_core::error::ActionError;
    use collapse_core::hex::HexCoord;
    use collapse_test_utils::fixtures::default_sim;

    fn connect(session: &mut GameSession, id: u64) -> mpsc::Receiver<ServerMsg> {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        session.handle_event(SessionEvent::Connected {
            id: PlayerId(id),
            outbound: tx,
        });
        rx
    }

    fn send(session: &mut GameSession, id: u64, msg: ClientMsg) {
        session.handle_event(SessionEvent::Message {
            id: PlayerId(id),
            msg,
        });
    }

    fn join(session: &mut GameSession, id: u64, team: Team) {
        send(
            session,
            id,
            ClientMsg::Join {
                username: format!("p{id}"),
                team: Some(team),
            },
        );
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut msgs = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            msgs.push(msg);
        }
        msgs
    }

    #[test]
    fn test_join_sends_init_and_notifies_others() {
        let mut session = GameSession::new(default_sim());
        let mut a = connect(&mut session, 1);
        let mut b = connect(&mut session, 2);

        join(&mut session, 1, Team::Green);

        let to_a = drain(&mut a);
        assert_eq!(to_a.len(), 1);
        assert!(matches!(&to_a[0], ServerMsg::Init(view) if view.player.id == PlayerId(1)));
        assert_eq!(
            drain(&mut b),
            vec![ServerMsg::PlayerJoined {
                id: PlayerId(1),
                username: "p1".to_string()
            }]
        );
    }

    #[test]
    fn test_requests_before_join_are_errors() {
        let mut session = GameSession::new(default_sim());
        let mut a = connect(&mut session, 1);

        send(&mut session, 1, ClientMsg::TargetTower { target: Some(4) });
        send(&mut session, 1, ClientMsg::FireLaser);
        send(&mut session, 1, ClientMsg::ResetGame);

        let msgs = drain(&mut a);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0], ServerMsg::error("Join the game first"));
        assert_eq!(msgs[2], ServerMsg::error("Join the game first"));
        assert_eq!(
            msgs[1],
            ServerMsg::LaserResult(ActionResult {
                success: false,
                message: Some("Player not found".to_string()),
                ..ActionResult::default()
            })
        );
    }

    #[test]
    fn test_move_replies() {
        let mut session = GameSession::new(default_sim());
        let mut a = connect(&mut session, 1);
        join(&mut session, 1, Team::Green);
        drain(&mut a);

        send(
            &mut session,
            1,
            ClientMsg::MoveTo {
                destination: HexCoord::new(0, 5),
            },
        );
        send(
            &mut session,
            1,
            ClientMsg::MoveTo {
                destination: HexCoord::new(0, 11),
            },
        );

        assert_eq!(
            drain(&mut a),
            vec![
                ServerMsg::MoveConfirmed {
                    destination: HexCoord::new(0, 5)
                },
                ServerMsg::MoveError {
                    message: "Invalid destination".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_fire_and_build_results() {
        let mut session = GameSession::new(default_sim());
        let mut a = connect(&mut session, 1);
        join(&mut session, 1, Team::Green);
        drain(&mut a);

        send(&mut session, 1, ClientMsg::FireLrm);
        send(
            &mut session,
            1,
            ClientMsg::BuildTower {
                position: HexCoord::ORIGIN,
            },
        );

        let msgs = drain(&mut a);
        assert_eq!(
            msgs[0],
            ServerMsg::LrmResult(ActionResult::refused(&ActionError::NoTarget))
        );
        let ServerMsg::BuildResult(result) = &msgs[1] else {
            panic!("expected a build result, got {:?}", msgs[1]);
        };
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("Not enough energy (need 50, have 0)"));
    }

    #[test]
    fn test_broadcast_only_reaches_joined_clients() {
        let mut session = GameSession::new(default_sim());
        let mut a = connect(&mut session, 1);
        let mut b = connect(&mut session, 2);
        join(&mut session, 1, Team::Blue);
        drain(&mut a);
        drain(&mut b);

        session.step();
        session.broadcast();

        let to_a = drain(&mut a);
        assert!(matches!(&to_a[..], [ServerMsg::GameUpdate(view)] if view.tick == 1));
        assert!(drain(&mut b).is_empty());
    }

    #[test]
    fn test_reset_notifies_everyone() {
        let mut session = GameSession::new(default_sim());
        let mut a = connect(&mut session, 1);
        let mut b = connect(&mut session, 2);
        join(&mut session, 1, Team::Blue);
        drain(&mut a);
        drain(&mut b);

        send(&mut session, 1, ClientMsg::ResetGame);

        assert_eq!(drain(&mut a), vec![ServerMsg::GameReset]);
        assert_eq!(drain(&mut b), vec![ServerMsg::GameReset]);
    }

    #[test]
    fn test_disconnect_removes_player() {
        let mut session = GameSession::new(default_sim());
        let _a = connect(&mut session, 1);
        let mut b = connect(&mut session, 2);
        join(&mut session, 1, Team::Green);
        drain(&mut b);

        session.handle_event(SessionEvent::Disconnected { id: PlayerId(1) });

        assert_eq!(session.client_count(), 1);
        assert_eq!(session.simulation().player_count(), 0);
        assert_eq!(drain(&mut b), vec![ServerMsg::PlayerLeft { id: PlayerId(1) }]);
    }

    #[test]
    fn test_stalled_client_queue_stays_bounded() {
        let mut session = GameSession::new(default_sim());
        let mut a = connect(&mut session, 1);
        join(&mut session, 1, Team::Green);

        for _ in 0..OUTBOUND_QUEUE * 3 {
            session.step();
            session.broadcast();
        }

        let backlog = drain(&mut a);
        assert_eq!(backlog.len(), OUTBOUND_QUEUE);
        assert!(matches!(backlog[0], ServerMsg::Init(_)));

        // Once drained, the client gets fresh updates again.
        session.step();
        session.broadcast();
        let fresh = drain(&mut a);
        let tick = session.simulation().get_tick();
        assert!(matches!(&fresh[..], [ServerMsg::GameUpdate(view)] if view.tick == tick));
    }

    #[test]
    fn test_disconnect_before_join_is_silent() {
        let mut session = GameSession::new(default_sim());
        let _a = connect(&mut session, 1);
        let mut b = connect(&mut session, 2);

        session.handle_event(SessionEvent::Disconnected { id: PlayerId(1) });

        assert!(drain(&mut b).is_empty());
    }

    #[tokio::test]
    async fn test_run_ticks_broadcasts_and_stops() {
        let mut config = GameConfig::default();
        config.updates.game_loop_tick = 5;
        config.updates.client_broadcast = 10;
        let session = GameSession::new(Simulation::new(config).unwrap());

        let (events_tx, events_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(session.run(events_rx, shutdown_rx));

        let (tx, mut rx) = mpsc::channel(OUTBOUND_QUEUE);
        events_tx
            .send(SessionEvent::Connected {
                id: PlayerId(1),
                outbound: tx,
            })
            .await
            .unwrap();
        events_tx
            .send(SessionEvent::Message {
                id: PlayerId(1),
                msg: ClientMsg::Join {
                    username: "ada".to_string(),
                    team: None,
                },
            })
            .await
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, ServerMsg::Init(ref view) if view.player.team == Team::Green));
        loop {
            if let ServerMsg::GameUpdate(view) = rx.recv().await.unwrap() {
                if view.tick > 0 {
                    break;
                }
            }
        }

        shutdown_tx.send(true).unwrap();
        let sim = handle.await.unwrap();
        assert!(sim.get_tick() > 0);
        assert_eq!(sim.player_count(), 1);
    }

    #[tokio::test]
    async fn test_run_ends_when_senders_drop() {
        let session = GameSession::new(default_sim());
        let (events_tx, events_rx) = mpsc::channel(1);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        drop(events_tx);
        let sim = session.run(events_rx, shutdown_rx).await;
        assert_eq!(sim.player_count(), 0);
    }
}
