//! Core simulation loop.
//!
//! The simulation owns every entity of a match and advances them one fixed
//! tick at a time. Player intents are applied between ticks as immediate,
//! synchronous mutations; nothing in here blocks, sleeps or reads a clock.
//!
//! # Determinism
//!
//! - Time is counted in ticks; cooldowns and respawns compare tick deltas.
//! - Entity collections are ordered maps, iterated in id order.
//! - Oil and energy use fixed-point math.
//! - The only randomness is the seeded [`SimRng`] stored in the state.
//!
//! # Example
//!
//! ```
//! use collapse_core::components::{PlayerId, Team};
//! use collapse_core::config::GameConfig;
//! use collapse_core::hex::HexCoord;
//! use collapse_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(GameConfig::default())?;
//! sim.add_player(PlayerId(1), "ada", Team::Green)?;
//! assert!(sim.set_destination(PlayerId(1), HexCoord::new(0, 5)));
//!
//! sim.tick();
//! assert_eq!(sim.get_tick(), 1);
//! # Ok::<(), collapse_core::error::GameError>(())
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::combat::{
    nearest_in_range, projectile_expired, projectile_lifetime_ms, Combatant, DamageEvent,
};
use crate::components::{
    Base, CombatStats, EntityId, Health, Landmark, LifeState, Player, PlayerId, Projectile,
    ProjectileSource, Team, Tower, TowerKind, WeaponKind, WeaponState, Weapons,
};
use crate::config::{GameConfig, TickSchedule};
use crate::economy::{self, CaptureRules};
use crate::error::{ActionError, GameError, Result};
use crate::hex::{HexCoord, HexGrid};
use crate::math::{fixed_from_u32, floor_to_u32, Fixed};
use crate::movement;
use crate::rng::SimRng;
use crate::view::{self, PlayerView};

/// Colours handed out to joining players.
pub const PLAYER_COLORS: [&str; 8] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#FFA07A", "#98D8C8", "#F7DC6F", "#BB8FCE", "#85C1E2",
];

/// Attempts at a random spawn hex before falling back to the zone centre.
const SPAWN_ATTEMPTS: u32 = 100;

/// Attempts at placing each landmark beyond the first.
const LANDMARK_ATTEMPTS: u32 = 200;

/// Mixed into the seed for world layout, which must not consume the
/// gameplay generator so that a reset rebuilds the same map.
const LAYOUT_SALT: u64 = 0x4C41_594F_5554;

/// An oil capture cycle that completed this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Player who captured.
    pub player: PlayerId,
    /// Landmark captured from.
    pub landmark: EntityId,
    /// Energy granted (and oil removed).
    pub granted: Fixed,
}

/// Events generated during a simulation tick.
///
/// The host uses these for logging; clients learn about them from the next
/// state view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// Every hit resolved this tick.
    pub damage_events: Vec<DamageEvent>,
    /// Players killed this tick.
    pub deaths: Vec<PlayerId>,
    /// Players back in play this tick.
    pub respawns: Vec<PlayerId>,
    /// Completed capture cycles.
    pub captures: Vec<CaptureEvent>,
    /// Towers and bases destroyed this tick.
    pub destroyed: Vec<Combatant>,
    /// Winner, if the match ended this tick.
    pub game_over: Option<Team>,
}

/// Outcome of a successful weapon shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireReport {
    /// Weapon fired.
    pub weapon: WeaponKind,
    /// Structure hit.
    pub target: Combatant,
    /// Health removed.
    pub damage: u32,
    /// Target health after the hit.
    pub target_health: u32,
    /// The hit destroyed the target.
    pub destroyed: bool,
    /// Winner, if the shot ended the match.
    pub game_over: Option<Team>,
}

/// The authoritative match state.
///
/// # Tick order
///
/// Each tick runs these steps in order; later steps see earlier mutations:
/// 1. Living players: movement, then capture, then weapon bookkeeping
///    (cooldown recovery and, when enabled, the basic auto-attack).
/// 2. Dead players: respawn once their respawn tick is reached.
/// 3. Towers: pick the nearest eligible player and shoot when ready.
/// 4. Bases: same as towers.
/// 5. Landmarks: regenerate oil.
/// 6. Projectiles: drop those whose animation has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    config: GameConfig,
    schedule: TickSchedule,
    grid: HexGrid,
    /// Number of ticks processed so far.
    tick: u64,
    rng: SimRng,
    next_entity_id: EntityId,
    next_projectile_id: u64,
    players: BTreeMap<PlayerId, Player>,
    landmarks: BTreeMap<EntityId, Landmark>,
    towers: BTreeMap<EntityId, Tower>,
    bases: BTreeMap<EntityId, Base>,
    projectiles: Vec<Projectile>,
    /// Set once by the first base destruction; cleared by reset.
    winner: Option<Team>,
}

impl Simulation {
    /// Create a match and build the world.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::InvalidConfig`] if the configuration fails
    /// validation.
    pub fn new(config: GameConfig) -> Result<Self> {
        config.validate()?;

        let mut sim = Self {
            schedule: config.schedule(),
            grid: config.grid(),
            tick: 0,
            rng: SimRng::new(config.seed),
            next_entity_id: 1,
            next_projectile_id: 1,
            players: BTreeMap::new(),
            landmarks: BTreeMap::new(),
            towers: BTreeMap::new(),
            bases: BTreeMap::new(),
            projectiles: Vec::new(),
            winner: None,
            config,
        };
        sim.init_world();
        Ok(sim)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Number of ticks processed.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.tick
    }

    /// Game milliseconds elapsed (`tick * tick_ms`).
    #[must_use]
    pub const fn now_ms(&self) -> u64 {
        self.schedule.ticks_to_ms(self.tick)
    }

    /// Configuration the match runs with.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Derived tick thresholds.
    #[must_use]
    pub const fn schedule(&self) -> &TickSchedule {
        &self.schedule
    }

    /// The map.
    #[must_use]
    pub const fn grid(&self) -> &HexGrid {
        &self.grid
    }

    /// Look up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Mutable access to a player, for scenario setup and tooling.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// All players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of connected players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Look up a landmark.
    #[must_use]
    pub fn landmark(&self, id: EntityId) -> Option<&Landmark> {
        self.landmarks.get(&id)
    }

    /// Mutable access to a landmark, for scenario setup and tooling.
    pub fn landmark_mut(&mut self, id: EntityId) -> Option<&mut Landmark> {
        self.landmarks.get_mut(&id)
    }

    /// All landmarks in id order.
    pub fn landmarks(&self) -> impl Iterator<Item = &Landmark> {
        self.landmarks.values()
    }

    /// Look up a tower.
    #[must_use]
    pub fn tower(&self, id: EntityId) -> Option<&Tower> {
        self.towers.get(&id)
    }

    /// Mutable access to a tower, for scenario setup and tooling.
    pub fn tower_mut(&mut self, id: EntityId) -> Option<&mut Tower> {
        self.towers.get_mut(&id)
    }

    /// All towers in id order, destroyed ones included.
    pub fn towers(&self) -> impl Iterator<Item = &Tower> {
        self.towers.values()
    }

    /// Look up a base.
    #[must_use]
    pub fn base(&self, id: EntityId) -> Option<&Base> {
        self.bases.get(&id)
    }

    /// Mutable access to a base, for scenario setup and tooling.
    pub fn base_mut(&mut self, id: EntityId) -> Option<&mut Base> {
        self.bases.get_mut(&id)
    }

    /// All bases in id order.
    pub fn bases(&self) -> impl Iterator<Item = &Base> {
        self.bases.values()
    }

    /// The base of `team`.
    #[must_use]
    pub fn base_of(&self, team: Team) -> Option<&Base> {
        self.bases.values().find(|base| base.team == team)
    }

    /// Projectiles still animating.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// Winning team once the match is over.
    #[must_use]
    pub const fn winner(&self) -> Option<Team> {
        self.winner
    }

    /// Whether a base has been destroyed since the last reset.
    #[must_use]
    pub const fn is_game_over(&self) -> bool {
        self.winner.is_some()
    }

    /// Build the state view sent to `player`.
    #[must_use]
    pub fn view_for(&self, player: PlayerId) -> Option<PlayerView> {
        view::build(self, player)
    }

    // ------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------

    /// Advance the simulation by one tick.
    ///
    /// The counter is incremented first, so every cooldown and respawn
    /// comparison inside the step sees the tick being processed.
    pub fn tick(&mut self) -> TickEvents {
        self.tick += 1;
        let now = self.tick;
        let mut events = TickEvents::default();

        // 1. Living players.
        let living: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.is_alive())
            .map(|p| p.id)
            .collect();
        for id in living {
            self.advance_player(id, &mut events);
            self.run_weapon_bookkeeping(id, now, &mut events);
        }

        // 2. Dead players.
        self.run_respawn_system(now, &mut events);

        // 3-4. Structures.
        self.run_tower_system(now, &mut events);
        self.run_base_system(now, &mut events);

        // 5. Landmarks.
        let regen = self.schedule.oil_regen_per_tick;
        for landmark in self.landmarks.values_mut() {
            economy::regenerate(landmark, regen);
        }

        // 6. Projectiles.
        let schedule = self.schedule;
        self.projectiles
            .retain(|p| !projectile_expired(p.created_tick, p.lifetime_ms, now, &schedule));

        #[cfg(feature = "debug-validation")]
        self.validate_invariants();

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        events
    }

    /// Panic if a bounded quantity left its range or a flag disagrees
    /// with the hit points behind it.
    #[cfg(feature = "debug-validation")]
    fn validate_invariants(&self) {
        let max_energy = self.config.max_energy();
        for player in self.players.values() {
            assert!(player.health.current <= player.health.max, "{} hp out of bounds", player.id);
            assert!(
                player.energy >= Fixed::ZERO && player.energy <= max_energy,
                "{} energy out of bounds",
                player.id
            );
            assert_eq!(player.is_alive(), player.health.current > 0, "{} life state", player.id);
        }
        for landmark in self.landmarks.values() {
            assert!(
                landmark.oil >= Fixed::ZERO && landmark.oil <= landmark.max_oil,
                "landmark {} oil out of bounds",
                landmark.id
            );
        }
        for tower in self.towers.values() {
            assert_eq!(tower.destroyed, tower.health.current == 0, "tower {} destroyed flag", tower.id);
        }
        for base in self.bases.values() {
            assert_eq!(base.destroyed, base.health.current == 0, "base {} destroyed flag", base.id);
        }
    }

    /// Movement then capture for one living player.
    fn advance_player(&mut self, id: PlayerId, events: &mut TickEvents) {
        let rules = CaptureRules {
            oil_per_capture: fixed_from_u32(self.config.landmarks.oil_per_capture),
            max_energy: self.config.max_energy(),
        };

        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        movement::advance(player, &self.schedule);

        let Some(landmark) = self
            .landmarks
            .values_mut()
            .find(|l| l.position == player.position)
        else {
            return;
        };
        if let Some(granted) = economy::advance_capture(player, landmark, rules, &self.schedule) {
            tracing::debug!(player = %id, landmark = landmark.id, granted = %granted, "Capture complete");
            events.captures.push(CaptureEvent {
                player: id,
                landmark: landmark.id,
                granted,
            });
        }
    }

    /// Cooldown recovery and the optional basic auto-attack.
    fn run_weapon_bookkeeping(&mut self, id: PlayerId, now: u64, events: &mut TickEvents) {
        let schedule = self.schedule;
        let auto_target = self.config.combat.auto_target_enabled;

        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        for kind in WeaponKind::ALL {
            recover_weapon(player.weapons.get_mut(kind), schedule.cooldown_ticks(kind), now, &schedule);
        }

        if !auto_target {
            player.auto_target = None;
            return;
        }

        let team = player.team;
        let position = player.position;
        let stats = player.stats;
        let last_attack = player.last_attack_tick;

        let towers = self
            .towers
            .values()
            .filter(|t| !t.destroyed && t.kind.team() != Some(team))
            .map(|t| (Combatant::Tower(t.id), t.position));
        let bases = self
            .bases
            .values()
            .filter(|b| !b.destroyed && b.team != team)
            .map(|b| (Combatant::Base(b.id), b.position));
        let target = nearest_in_range(position, stats.range, towers.chain(bases));

        if let Some(player) = self.players.get_mut(&id) {
            player.auto_target = target.map(|t| match t {
                Combatant::Tower(id) | Combatant::Base(id) => id,
                Combatant::Player(p) => p.0,
            });
        }

        if let Some(target) = target {
            if stats.ready(last_attack, now) {
                self.deal_damage(
                    Combatant::Player(id),
                    position,
                    target,
                    stats.damage,
                    ProjectileSource::Player,
                    events,
                );
                if let Some(player) = self.players.get_mut(&id) {
                    player.last_attack_tick = Some(now);
                }
            }
        }
    }

    fn run_respawn_system(&mut self, now: u64, events: &mut TickEvents) {
        let due: Vec<(PlayerId, Team)> = self
            .players
            .values()
            .filter(|p| p.respawn_at().is_some_and(|at| now >= at))
            .map(|p| (p.id, p.team))
            .collect();

        for (id, team) in due {
            let spawn = self.spawn_point(team);
            if let Some(player) = self.players.get_mut(&id) {
                player.health.refill();
                player.position = spawn;
                player.stop();
                player.life = LifeState::Alive;
                tracing::debug!(player = %id, position = %spawn, "Player respawned");
                events.respawns.push(id);
            }
        }
    }

    /// Nearest living player a structure may shoot.
    fn structure_target(&self, position: HexCoord, team: Option<Team>, range: u32) -> Option<PlayerId> {
        let candidates = self
            .players
            .values()
            .filter(|p| p.is_alive() && Some(p.team) != team)
            .map(|p| (p.id, p.position));
        nearest_in_range(position, range, candidates)
    }

    fn run_tower_system(&mut self, now: u64, events: &mut TickEvents) {
        let ids: Vec<EntityId> = self
            .towers
            .values()
            .filter(|t| !t.destroyed)
            .map(|t| t.id)
            .collect();

        for id in ids {
            let Some(tower) = self.towers.get(&id) else {
                continue;
            };
            let (position, stats, last_attack) = (tower.position, tower.stats, tower.last_attack_tick);
            let target = self.structure_target(position, tower.kind.team(), stats.range);

            let fire = target.filter(|_| stats.ready(last_attack, now));
            if let Some(tower) = self.towers.get_mut(&id) {
                tower.target = target;
                if fire.is_some() {
                    tower.last_attack_tick = Some(now);
                }
            }
            if let Some(player) = fire {
                self.deal_damage(
                    Combatant::Tower(id),
                    position,
                    Combatant::Player(player),
                    stats.damage,
                    ProjectileSource::Tower,
                    events,
                );
            }
        }
    }

    fn run_base_system(&mut self, now: u64, events: &mut TickEvents) {
        let ids: Vec<EntityId> = self
            .bases
            .values()
            .filter(|b| !b.destroyed)
            .map(|b| b.id)
            .collect();

        for id in ids {
            let Some(base) = self.bases.get(&id) else {
                continue;
            };
            let (position, stats, last_attack) = (base.position, base.stats, base.last_attack_tick);
            let target = self.structure_target(position, Some(base.team), stats.range);

            let fire = target.filter(|_| stats.ready(last_attack, now));
            if let Some(base) = self.bases.get_mut(&id) {
                base.target = target;
                if fire.is_some() {
                    base.last_attack_tick = Some(now);
                }
            }
            if let Some(player) = fire {
                self.deal_damage(
                    Combatant::Base(id),
                    position,
                    Combatant::Player(player),
                    stats.damage,
                    ProjectileSource::Base,
                    events,
                );
            }
        }
    }

    /// Apply a hit, emit its projectile and run any lethal transition.
    ///
    /// Returns `None` if the target is gone, dead or already destroyed.
    fn deal_damage(
        &mut self,
        attacker: Combatant,
        from: HexCoord,
        target: Combatant,
        amount: u32,
        source: ProjectileSource,
        events: &mut TickEvents,
    ) -> Option<DamageEvent> {
        let now = self.tick;
        let (to, dealt, lethal) = match target {
            Combatant::Player(id) => {
                let player = self.players.get_mut(&id).filter(|p| p.is_alive())?;
                let dealt = player.health.apply_damage(amount);
                let lethal = player.health.is_depleted();
                if lethal {
                    player.stop();
                    player.auto_target = None;
                    player.life = LifeState::Dead {
                        respawn_at: now + self.schedule.respawn_ticks,
                    };
                    tracing::debug!(player = %id, killer = ?attacker, "Player killed");
                    events.deaths.push(id);
                }
                (player.position, dealt, lethal)
            }
            Combatant::Tower(id) => {
                let tower = self.towers.get_mut(&id).filter(|t| !t.destroyed)?;
                let dealt = tower.health.apply_damage(amount);
                let lethal = tower.health.is_depleted();
                if lethal {
                    tower.destroyed = true;
                    tower.target = None;
                    tracing::debug!(tower = id, "Tower destroyed");
                    events.destroyed.push(target);
                }
                (tower.position, dealt, lethal)
            }
            Combatant::Base(id) => {
                let base = self.bases.get_mut(&id).filter(|b| !b.destroyed)?;
                let dealt = base.health.apply_damage(amount);
                let lethal = base.health.is_depleted();
                if lethal {
                    base.destroyed = true;
                    base.target = None;
                    events.destroyed.push(target);
                    if self.winner.is_none() {
                        let winner = base.team.opponent();
                        self.winner = Some(winner);
                        events.game_over = Some(winner);
                        tracing::info!(
                            loser = base.team.as_str(),
                            winner = winner.as_str(),
                            tick = now,
                            "Base destroyed, game over"
                        );
                    }
                }
                (base.position, dealt, lethal)
            }
        };

        self.emit_projectile(from, to, source);

        let event = DamageEvent {
            attacker,
            target,
            source,
            amount: dealt,
            lethal,
        };
        events.damage_events.push(event);
        Some(event)
    }

    fn emit_projectile(&mut self, from: HexCoord, to: HexCoord, source: ProjectileSource) {
        let id = self.next_projectile_id;
        self.next_projectile_id += 1;
        self.projectiles.push(Projectile {
            id,
            from,
            to,
            source,
            created_tick: self.tick,
            lifetime_ms: projectile_lifetime_ms(from, to, source, &self.schedule),
        });
    }

    // ------------------------------------------------------------------
    // Intents
    // ------------------------------------------------------------------

    /// Add a player to `team` at a random hex of the team's spawn zone.
    ///
    /// An empty name becomes `Player<id>`.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PlayerAlreadyJoined`] if `id` is already in play.
    pub fn add_player(&mut self, id: PlayerId, name: &str, team: Team) -> Result<&Player> {
        if self.players.contains_key(&id) {
            return Err(GameError::PlayerAlreadyJoined(id));
        }

        let name = match name.trim() {
            "" => format!("Player{}", id.0),
            trimmed => trimmed.to_string(),
        };
        let color = PLAYER_COLORS[self.rng.index(PLAYER_COLORS.len())].to_string();
        let position = self.spawn_point(team);
        let settings = &self.config.player;

        let player = Player {
            id,
            name,
            team,
            color,
            position,
            destination: None,
            path: std::collections::VecDeque::new(),
            travel_ms: 0,
            energy: fixed_from_u32(settings.starting_energy),
            health: Health::with_current(settings.starting_hp, settings.max_hp),
            stats: CombatStats::new(
                settings.attack_range,
                settings.damage,
                self.schedule.player_attack_ticks,
            ),
            auto_target: None,
            last_attack_tick: None,
            manual_target: None,
            weapons: Weapons::default(),
            life: LifeState::Alive,
        };

        tracing::info!(player = %id, name = %player.name, team = team.as_str(), position = %position, "Player joined");
        Ok(self.players.entry(id).or_insert(player))
    }

    /// Remove a player. Returns the removed record, if any.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;

        for landmark in self.landmarks.values_mut() {
            if landmark.capturing_player == Some(id) {
                landmark.capturing_player = None;
                landmark.capture_ms = 0;
            }
        }
        for tower in self.towers.values_mut() {
            if tower.target == Some(id) {
                tower.target = None;
            }
        }
        for base in self.bases.values_mut() {
            if base.target == Some(id) {
                base.target = None;
            }
        }

        tracing::info!(player = %id, name = %player.name, "Player left");
        Some(player)
    }

    /// Start moving toward `destination` along a straight hex line.
    ///
    /// Returns `false` without touching the player if the player is unknown
    /// or dead, or if `destination` is off the map.
    pub fn set_destination(&mut self, id: PlayerId, destination: HexCoord) -> bool {
        if !self.grid.is_valid(destination) {
            return false;
        }
        match self.players.get_mut(&id) {
            Some(player) if player.is_alive() => {
                movement::begin_move(player, destination);
                true
            }
            _ => false,
        }
    }

    /// Select (or clear) the structure the player's weapons fire at.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::PlayerNotFound`] for an unknown player.
    pub fn set_manual_target(&mut self, id: PlayerId, target: Option<EntityId>) -> Result<()> {
        let player = self
            .players
            .get_mut(&id)
            .ok_or(GameError::PlayerNotFound(id))?;
        player.manual_target = target;
        Ok(())
    }

    /// Fire a weapon at the player's manually selected target.
    ///
    /// # Errors
    ///
    /// Returns the first failed precondition, in this order: player
    /// unknown, player dead, weapon cooling down, no target selected,
    /// target missing or destroyed, own base, out of range. A refused shot
    /// changes nothing.
    pub fn fire_weapon(&mut self, id: PlayerId, weapon: WeaponKind) -> std::result::Result<FireReport, ActionError> {
        let player = self.players.get(&id).ok_or(ActionError::PlayerNotFound)?;
        if !player.is_alive() {
            return Err(ActionError::PlayerDead);
        }

        let settings = match weapon {
            WeaponKind::Laser => &self.config.weapons.laser,
            WeaponKind::Lrm => &self.config.weapons.lrm,
        };
        if !player.weapons.get(weapon).available {
            return Err(ActionError::WeaponCoolingDown {
                weapon: settings.name.clone(),
            });
        }

        let target_id = player.manual_target.ok_or(ActionError::NoTarget)?;
        let (target, position) = self.resolve_structure(target_id)?;
        if let Combatant::Base(base_id) = target {
            if self.bases.get(&base_id).is_some_and(|b| b.team == player.team) {
                return Err(ActionError::OwnBase);
            }
        }

        let distance = player.position.distance(position);
        if distance > settings.range {
            return Err(ActionError::OutOfRange {
                distance,
                range: settings.range,
            });
        }

        let from = player.position;
        let damage = settings.damage;
        let cooldown_ms = self.schedule.ticks_to_ms(self.schedule.cooldown_ticks(weapon));
        let now = self.tick;

        let mut events = TickEvents::default();
        let hit = self
            .deal_damage(
                Combatant::Player(id),
                from,
                target,
                damage,
                ProjectileSource::from(weapon),
                &mut events,
            )
            .ok_or(ActionError::TargetUnavailable(target_id))?;

        if let Some(player) = self.players.get_mut(&id) {
            let slot = player.weapons.get_mut(weapon);
            slot.available = false;
            slot.fired_tick = Some(now);
            slot.cooldown_remaining_ms = cooldown_ms;
        }

        let target_health = match target {
            Combatant::Tower(tid) => self.towers.get(&tid).map_or(0, |t| t.health.current),
            Combatant::Base(bid) => self.bases.get(&bid).map_or(0, |b| b.health.current),
            Combatant::Player(_) => 0,
        };

        Ok(FireReport {
            weapon,
            target,
            damage: hit.amount,
            target_health,
            destroyed: hit.lethal,
            game_over: events.game_over,
        })
    }

    /// Resolve a structure id, towers first, skipping destroyed ones.
    fn resolve_structure(&self, id: EntityId) -> std::result::Result<(Combatant, HexCoord), ActionError> {
        if let Some(tower) = self.towers.get(&id).filter(|t| !t.destroyed) {
            return Ok((Combatant::Tower(id), tower.position));
        }
        if let Some(base) = self.bases.get(&id).filter(|b| !b.destroyed) {
            return Ok((Combatant::Base(id), base.position));
        }
        Err(ActionError::TargetUnavailable(id))
    }

    /// Build a team tower at `position`, paying the build cost.
    ///
    /// # Errors
    ///
    /// Refuses (without changes) a dead or unknown player, an off-map hex,
    /// too little energy, a hex further than the build radius from both
    /// the builder and their base, or an occupied hex.
    pub fn build_tower(&mut self, id: PlayerId, position: HexCoord) -> std::result::Result<EntityId, ActionError> {
        let player = self.players.get(&id).ok_or(ActionError::PlayerNotFound)?;
        if !player.is_alive() {
            return Err(ActionError::PlayerDead);
        }
        if !self.grid.is_valid(position) {
            return Err(ActionError::InvalidHex);
        }

        let towers = &self.config.towers;
        let cost = fixed_from_u32(towers.build_cost);
        if player.energy < cost {
            return Err(ActionError::InsufficientEnergy {
                required: towers.build_cost,
                available: floor_to_u32(player.energy),
            });
        }

        let radius = towers.build_radius;
        let near_player = player.position.distance(position) <= radius;
        let near_base = self
            .base_of(player.team)
            .is_some_and(|base| base.position.distance(position) <= radius);
        if !near_player && !near_base {
            return Err(ActionError::OutOfBuildRadius { radius });
        }

        if self.is_occupied(position) {
            return Err(ActionError::HexOccupied);
        }

        let team = player.team;
        let builder = player.name.clone();
        let tower_id = self.spawn_tower(position, TowerKind::PlayerBuilt { team, builder });

        if let Some(player) = self.players.get_mut(&id) {
            player.energy -= cost;
        }

        tracing::info!(player = %id, tower = tower_id, position = %position, "Tower built");
        Ok(tower_id)
    }

    /// Rebuild the world and restore every player, keeping connections.
    ///
    /// Player-built towers and projectiles are dropped and the game-over
    /// latch is cleared. The tick counter keeps running.
    pub fn reset(&mut self) {
        self.init_world();
        self.projectiles.clear();
        self.winner = None;

        let ids: Vec<(PlayerId, Team)> = self.players.values().map(|p| (p.id, p.team)).collect();
        for (id, team) in ids {
            let spawn = self.spawn_point(team);
            let settings = &self.config.player;
            if let Some(player) = self.players.get_mut(&id) {
                player.health = Health::with_current(settings.starting_hp, settings.max_hp);
                player.energy = fixed_from_u32(settings.starting_energy);
                player.position = spawn;
                player.stop();
                player.weapons = Weapons::default();
                player.auto_target = None;
                player.manual_target = None;
                player.last_attack_tick = None;
                player.life = LifeState::Alive;
            }
        }

        tracing::info!(tick = self.tick, players = self.players.len(), "Game reset");
    }

    // ------------------------------------------------------------------
    // World construction
    // ------------------------------------------------------------------

    fn next_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    /// Bases, landmarks and their defence towers.
    fn init_world(&mut self) {
        self.bases.clear();
        self.landmarks.clear();
        self.towers.clear();
        self.next_entity_id = 1;

        let mut layout = SimRng::new(self.config.seed ^ LAYOUT_SALT);

        for team in Team::ALL {
            let id = self.next_id();
            let settings = &self.config.bases;
            let position = self.config.map.starting_zones.for_team(team).spawn_area.center();
            self.bases.insert(
                id,
                Base {
                    id,
                    team,
                    position,
                    health: Health::new(settings.max_hp),
                    stats: CombatStats::new(
                        settings.attack_range,
                        settings.damage,
                        self.schedule.base_attack_ticks,
                    ),
                    target: None,
                    last_attack_tick: None,
                    destroyed: false,
                },
            );
        }

        for index in 0..self.config.landmarks.count {
            let position = if index == 0 {
                Some(HexCoord::ORIGIN)
            } else {
                self.find_landmark_site(&mut layout)
            };
            let Some(position) = position else {
                tracing::warn!(index, "No free hex for landmark, skipping");
                continue;
            };

            let settings = &self.config.landmarks;
            let oil = layout.range_inclusive(settings.oil_min as i32, settings.oil_max as i32);
            let max_oil = fixed_from_u32(settings.max_oil);
            let id = self.next_id();
            self.landmarks.insert(
                id,
                Landmark {
                    id,
                    position,
                    oil: fixed_from_u32(oil.max(0) as u32).min(max_oil),
                    max_oil,
                    capturing_player: None,
                    capture_ms: 0,
                    defending_towers: Vec::new(),
                },
            );
            self.place_defenders(id, position);
        }

        tracing::debug!(
            bases = self.bases.len(),
            landmarks = self.landmarks.len(),
            towers = self.towers.len(),
            "World initialized"
        );
    }

    /// Random free hex outside every team's safe zone.
    fn find_landmark_site(&self, layout: &mut SimRng) -> Option<HexCoord> {
        (0..LANDMARK_ATTEMPTS)
            .map(|_| self.grid.random_hex(layout))
            .find(|&hex| {
                !self.has_structure(hex)
                    && self.bases.values().all(|base| {
                        let zone = self.config.map.starting_zones.for_team(base.team);
                        base.position.distance(hex) > zone.safe_radius
                    })
            })
    }

    /// Neutral towers evenly spaced on the placement ring.
    fn place_defenders(&mut self, landmark_id: EntityId, center: HexCoord) {
        let ring = self.grid.ring(center, self.config.towers.placement_radius);
        let count = self.config.towers.per_landmark as usize;
        if ring.is_empty() || count == 0 {
            return;
        }

        let mut defenders = Vec::with_capacity(count);
        for i in 0..count {
            let hex = ring[i * ring.len() / count];
            if self.has_structure(hex) {
                continue;
            }
            defenders.push(self.spawn_tower(hex, TowerKind::Defensive { landmark_id }));
        }

        if let Some(landmark) = self.landmarks.get_mut(&landmark_id) {
            landmark.defending_towers = defenders;
        }
    }

    fn spawn_tower(&mut self, position: HexCoord, kind: TowerKind) -> EntityId {
        let id = self.next_id();
        let settings = &self.config.towers;
        self.towers.insert(
            id,
            Tower {
                id,
                position,
                kind,
                health: Health::new(settings.max_hp),
                stats: CombatStats::new(
                    settings.attack_range,
                    settings.damage,
                    self.schedule.tower_attack_ticks,
                ),
                target: None,
                last_attack_tick: None,
                destroyed: false,
            },
        );
        id
    }

    /// Whether any player, tower, landmark or base stands on `hex`.
    #[must_use]
    pub fn is_occupied(&self, hex: HexCoord) -> bool {
        self.players.values().any(|p| p.position == hex) || self.has_structure(hex)
    }

    /// Whether a tower, landmark or base stands on `hex`.
    ///
    /// World construction ignores players.
    fn has_structure(&self, hex: HexCoord) -> bool {
        self.towers.values().any(|t| t.position == hex)
            || self.landmarks.values().any(|l| l.position == hex)
            || self.bases.values().any(|b| b.position == hex)
    }

    /// Random valid hex in the team's spawn area, or the zone centre.
    fn spawn_point(&mut self, team: Team) -> HexCoord {
        let area = self.config.map.starting_zones.for_team(team).spawn_area;
        for _ in 0..SPAWN_ATTEMPTS {
            let hex = HexCoord::new(
                self.rng.range_inclusive(area.q_min, area.q_max),
                self.rng.range_inclusive(area.r_min, area.r_max),
            );
            if self.grid.is_valid(hex) {
                return hex;
            }
        }
        area.center()
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Compute a hash of the current state for desync detection.
    ///
    /// Every collection is hashed in id order, so two simulations fed the
    /// same intents hash identically.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.rng.hash(&mut hasher);
        self.next_entity_id.hash(&mut hasher);
        self.next_projectile_id.hash(&mut hasher);
        self.winner.hash(&mut hasher);

        self.players.len().hash(&mut hasher);
        for player in self.players.values() {
            player.hash(&mut hasher);
        }
        for landmark in self.landmarks.values() {
            landmark.hash(&mut hasher);
        }
        for tower in self.towers.values() {
            tower.hash(&mut hasher);
        }
        for base in self.bases.values() {
            base.hash(&mut hasher);
        }
        self.projectiles.hash(&mut hasher);

        hasher.finish()
    }

    /// Serialize the full state to bytes.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::Serialization(format!("Failed to serialize simulation: {e}")))
    }

    /// Restore a state produced by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Serialization`] if decoding fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| GameError::Serialization(format!("Failed to deserialize simulation: {e}")))
    }
}

/// Recover a fired weapon once its cooldown has elapsed.
fn recover_weapon(slot: &mut WeaponState, cooldown_ticks: u64, now: u64, schedule: &TickSchedule) {
    if slot.available {
        return;
    }
    let elapsed = slot.fired_tick.map_or(cooldown_ticks, |fired| now.saturating_sub(fired));
    if elapsed >= cooldown_ticks {
        slot.available = true;
        slot.cooldown_remaining_ms = 0;
    } else {
        slot.cooldown_remaining_ms = schedule.ticks_to_ms(cooldown_ticks - elapsed);
    }
}
