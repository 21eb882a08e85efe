//! The world: owner of all simulation state and the tick loop.
//!
//! Exactly one logical driver calls [`World::tick`] on a fixed cadence.
//! A tick runs, in order: zone shrink and zone damage, periodic item
//! spawns, vote-window resolution (inner voices land before any
//! decision is made), the decision pass (concurrent fan-out, sequential
//! application in randomized agent order), the win check, and snapshot
//! production. The decision pass is the only concurrent step; every
//! mutation happens on the caller's task after the fan-in barrier.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use arena_types::{
    ActionState, AgentDelta, AgentDetail, AgentId, AgentPath, DecisionKind, EventKind, FullSync,
    GameEvent, GamePhase, Item, ItemId, MemoryKind, SessionId, VoteStateView, Waypoint,
    WorldStateView,
};
use arena_world::{find_path, mapgen, TileMap};

use crate::agent::{Agent, TEMPLATES};
use crate::config::SimulationConfig;
use crate::decision::{
    Decision, DecisionBackend, DecisionContext, ReflectionContext, TargetRef,
};
use crate::thinking::SharedThinkingStore;
use crate::vote::{Vote, VoteManager};

/// Damage per tick to agents caught outside the safe zone.
const ZONE_DAMAGE: i32 = 10;

/// Ticks between item spawn attempts.
const ITEM_SPAWN_INTERVAL: u64 = 10;

/// Items attempted per spawn batch (and at init).
const ITEM_BATCH: usize = 3;

/// Ticks between reflection passes.
const REFLECTION_INTERVAL: u64 = 5;

/// Importance assigned to stored reflections.
const REFLECTION_IMPORTANCE: u8 = 7;

/// How many recent memories a decision context carries.
const CONTEXT_MEMORIES: usize = 5;

/// Events retained for `sync.full`.
const MAX_SYNC_EVENTS: usize = 20;

/// Acceptance probability for an alliance offer.
const ALLY_ACCEPT_CHANCE: f64 = 0.6;

/// Maximum Manhattan distance for an alliance handshake.
const ALLY_RANGE: i32 = 2;

/// Weapon roster for spawned items.
const WEAPON_KINDS: &[&str] = &["sword", "axe", "bow", "dagger", "spear"];

/// Fatal world errors. Everything else is handled locally inside the
/// tick; these mean the configuration is unusable or state is corrupt.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Could not place an entity on a passable tile within the retry
    /// budget. The map is too crowded for the configuration.
    #[error("failed to place {what} after {attempts} attempts; lower obstacle_density or agent_count")]
    SpawnFailed {
        what: &'static str,
        attempts: usize,
    },

    /// A universal invariant no longer holds. The simulation must
    /// halt; continuing would publish corrupt state.
    #[error("invariant violation: {detail}")]
    InvariantViolation { detail: String },
}

/// Everything the publisher needs from one tick, as plain data.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub world: WorldStateView,
    /// Ordered event batch drained this tick.
    pub events: Vec<GameEvent>,
    /// Every agent, full form (for full-mode broadcast and followers).
    pub agents_full: Vec<AgentDetail>,
    /// Agents whose fingerprint changed since the previous tick.
    pub changed: Vec<AgentDelta>,
    /// Current pathfinding overlays.
    pub paths: Vec<AgentPath>,
    /// Vote window as of this tick.
    pub votes: VoteStateView,
}

/// Versioned on-disk/JSON form of the world, for the snapshot API.
#[derive(Debug, Serialize)]
struct SnapshotDoc<'a> {
    version: u32,
    tick: u64,
    phase: GamePhase,
    alive_count: u32,
    shrink_border: i32,
    zone_center: Waypoint,
    winner: Option<AgentId>,
    agents: Vec<&'a Agent>,
    items: &'a [Item],
    tile_map: &'a TileMap,
}

/// The authoritative world state.
pub struct World {
    config: SimulationConfig,
    pub tick: u64,
    phase: GamePhase,
    alive_count: u32,
    shrink_border: i32,
    zone_center: Waypoint,
    agents: BTreeMap<AgentId, Agent>,
    items: Vec<Item>,
    next_item_id: u64,
    map: TileMap,
    pending_events: Vec<GameEvent>,
    recent_events: VecDeque<GameEvent>,
    agent_paths: BTreeMap<AgentId, Vec<Waypoint>>,
    winner: Option<AgentId>,
    votes: VoteManager,
    thinking: SharedThinkingStore,
    session: SessionId,
    rng: StdRng,
    fingerprints: HashMap<AgentId, (i32, i32, i32, bool, ActionState)>,
}

impl World {
    /// Build an empty world. Call [`init`](Self::init) before ticking.
    pub fn new(config: SimulationConfig, thinking: SharedThinkingStore) -> Self {
        let grid = config.world.grid_size;
        let seed = config.world.seed;
        let window_ms = config.voting.window_ms;
        Self {
            config,
            tick: 0,
            phase: GamePhase::WaitingToStart,
            alive_count: 0,
            shrink_border: grid as i32,
            zone_center: Waypoint::new(grid as i32 / 2, grid as i32 / 2),
            agents: BTreeMap::new(),
            items: Vec::new(),
            next_item_id: 0,
            map: mapgen::create_empty(grid, grid),
            pending_events: Vec::new(),
            recent_events: VecDeque::new(),
            agent_paths: BTreeMap::new(),
            winner: None,
            votes: VoteManager::new(window_ms, Instant::now()),
            thinking,
            session: SessionId::new(),
            rng: StdRng::seed_from_u64(seed),
            fingerprints: HashMap::new(),
        }
    }

    /// Build the map, spawn the roster, seed initial items, and move
    /// to `Running`. Re-initializing discards the previous game and
    /// its thinking history.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SpawnFailed`] when the map is too crowded
    /// to place every agent.
    pub fn init(&mut self) -> Result<(), WorldError> {
        let grid = self.config.world.grid_size;

        self.thinking.clear_session(self.session);
        self.session = SessionId::new();

        self.map = mapgen::create_empty(grid, grid);
        mapgen::add_random_obstacles(
            &mut self.map,
            self.config.world.obstacle_density,
            Some(self.config.world.seed),
        );

        self.tick = 0;
        self.agents.clear();
        self.items.clear();
        self.next_item_id = 0;
        self.pending_events.clear();
        self.recent_events.clear();
        self.agent_paths.clear();
        self.fingerprints = HashMap::new();
        self.winner = None;
        self.shrink_border = grid as i32;
        self.zone_center = Waypoint::new(grid as i32 / 2, grid as i32 / 2);
        self.votes = VoteManager::new(self.config.voting.window_ms, Instant::now());

        for i in 0..self.config.world.agent_count {
            let (x, y) = self.random_free_tile().ok_or(WorldError::SpawnFailed {
                what: "agent",
                attempts: self.spawn_attempt_budget(),
            })?;

            let template = &TEMPLATES[(i as usize) % TEMPLATES.len()];
            let cycle = (i as usize) / TEMPLATES.len();
            let name = if cycle == 0 {
                template.name.to_owned()
            } else {
                format!("{} {}", template.name, cycle + 1)
            };

            let agent =
                Agent::from_template(AgentId(i), name, template, x, y, &mut self.rng);
            self.push_event(
                EventKind::AgentSpawn,
                format!("{} enters the arena", agent.name),
                vec![agent.id],
            );
            self.agents.insert(agent.id, agent);
        }
        self.alive_count = self.config.world.agent_count;

        self.spawn_items(ITEM_BATCH);
        for agent in self.agents.values() {
            self.fingerprints.insert(agent.id, agent.fingerprint());
        }

        self.phase = GamePhase::Running;
        info!(
            agents = self.alive_count,
            grid, session = %self.session, "World initialized"
        );
        Ok(())
    }

    pub const fn phase(&self) -> GamePhase {
        self.phase
    }

    pub const fn session(&self) -> SessionId {
        self.session
    }

    pub const fn winner(&self) -> Option<AgentId> {
        self.winner
    }

    /// Forward a spectator vote into the current window.
    pub fn submit_vote(&mut self, vote: Vote) {
        debug!(agent = %vote.agent_id, action = vote.action, "Vote submitted");
        self.votes.submit(vote);
    }

    // -----------------------------------------------------------------
    // The tick
    // -----------------------------------------------------------------

    /// Advance the simulation by one tick.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvariantViolation`] when post-tick state
    /// fails a universal invariant; the driver must halt.
    pub async fn tick<B: DecisionBackend>(
        &mut self,
        backend: &B,
    ) -> Result<TickReport, WorldError> {
        if self.phase != GamePhase::Running {
            return Ok(self.report(Vec::new()));
        }

        self.tick += 1;
        // pending_events is drained at the end of every tick, so it is
        // already empty here -- except for init's spawn events, which
        // ride out on the first tick.

        self.shrink_zone();
        if self.tick % ITEM_SPAWN_INTERVAL == 0 {
            self.spawn_items(ITEM_BATCH);
        }
        self.resolve_votes();

        self.decision_pass(backend).await;
        if self.tick % REFLECTION_INTERVAL == 0 {
            self.reflection_pass(backend).await;
        }

        self.check_winner();
        self.assert_invariants()?;

        let events = std::mem::take(&mut self.pending_events);
        for event in &events {
            self.recent_events.push_back(event.clone());
        }
        while self.recent_events.len() > MAX_SYNC_EVENTS {
            self.recent_events.pop_front();
        }

        Ok(self.report(events))
    }

    /// Step 2: decrement the border on schedule and hurt everyone
    /// loitering outside the safe square.
    fn shrink_zone(&mut self) {
        if self.tick % self.config.zone.shrink_interval_ticks == 0
            && self.shrink_border > self.config.zone.min_border
        {
            self.shrink_border -= 1;
            self.push_event(
                EventKind::ZoneShrink,
                format!("The zone tightens to {}", self.shrink_border),
                Vec::new(),
            );
        }

        let half = self.shrink_border / 2;
        let center = self.zone_center;
        let outside: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| {
                a.alive
                    && ((a.x - center.x).abs() > half || (a.y - center.y).abs() > half)
            })
            .map(|a| a.id)
            .collect();

        for id in outside {
            self.apply_damage(id, ZONE_DAMAGE, None, "the zone");
        }
    }

    /// Step 3: periodic item drops on random passable tiles.
    fn spawn_items(&mut self, count: usize) {
        for _ in 0..count {
            let Some((x, y)) = self.random_free_tile() else {
                warn!(tick = self.tick, "No free tile for item spawn, skipping");
                continue;
            };
            let kind = WEAPON_KINDS[self.rng.random_range(0..WEAPON_KINDS.len())];
            let item = Item {
                id: ItemId(self.next_item_id),
                x,
                y,
                kind: kind.to_owned(),
                bonus: self.rng.random_range(3..=8),
            };
            self.next_item_id += 1;
            debug!(tick = self.tick, item = %item.id, kind, x, y, "Item spawned");
            self.items.push(item);
        }
    }

    /// Step 4: resolve the vote window if it elapsed and whisper the
    /// winners to their (living) agents.
    fn resolve_votes(&mut self) {
        let Some(resolved) = self.votes.tick_at(Instant::now()) else {
            return;
        };
        for (agent_id, action) in resolved {
            let Some(agent) = self.agents.get_mut(&agent_id) else {
                continue;
            };
            if !agent.alive {
                continue;
            }
            agent.hear_inner_voice(&action);
            let name = agent.name.clone();
            self.push_event(
                EventKind::Vote,
                format!("The crowd urges {name}: {action}"),
                vec![agent_id],
            );
        }
    }

    /// Step 5: fan out decisions, fan in, apply in randomized order.
    async fn decision_pass<B: DecisionBackend>(&mut self, backend: &B) {
        let mut order: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| a.alive)
            .map(|a| a.id)
            .collect();
        order.shuffle(&mut self.rng);

        let now = Utc::now();
        let contexts: Vec<DecisionContext> = order
            .iter()
            .filter_map(|id| self.agents.get(id))
            .map(|agent| self.build_context(agent, now))
            .collect();

        let deadline = Duration::from_millis(self.config.world.decision_timeout_ms);
        let decisions: Vec<Decision> = join_all(contexts.iter().map(|ctx| async move {
            match tokio::time::timeout(deadline, backend.decide(ctx)).await {
                Ok(decision) => decision,
                Err(_) => {
                    warn!(agent = %ctx.agent_id, "Decision deadline missed, exploring");
                    Decision::new(DecisionKind::Explore, None, "decision deadline missed")
                }
            }
        }))
        .await;

        for (id, decision) in order.into_iter().zip(decisions) {
            self.apply_decision(id, decision);
        }
    }

    /// Every few ticks, let the backend distill memories.
    async fn reflection_pass<B: DecisionBackend>(&mut self, backend: &B) {
        let contexts: Vec<ReflectionContext> = self
            .agents
            .values()
            .filter(|a| a.alive)
            .map(|agent| ReflectionContext {
                agent_id: agent.id,
                name: agent.name.clone(),
                personality: agent.personality.clone(),
                hp: agent.hp,
                max_hp: agent.max_hp,
                recent_memories: agent
                    .memory
                    .recent(CONTEXT_MEMORIES)
                    .iter()
                    .map(|m| m.text.clone())
                    .collect(),
            })
            .collect();

        let reflections =
            join_all(contexts.iter().map(|ctx| backend.reflect(ctx))).await;

        for (ctx, reflection) in contexts.iter().zip(reflections) {
            let Some(text) = reflection else { continue };
            if let Some(agent) = self.agents.get_mut(&ctx.agent_id) {
                agent
                    .memory
                    .add(text, REFLECTION_IMPORTANCE, MemoryKind::Reflection);
            }
        }
    }

    /// Step 6: at most one agent standing ends the game.
    fn check_winner(&mut self) {
        if self.phase != GamePhase::Running {
            return;
        }
        let alive: Vec<AgentId> = self
            .agents
            .values()
            .filter(|a| a.alive)
            .map(|a| a.id)
            .collect();
        if alive.len() > 1 {
            return;
        }

        self.phase = GamePhase::Finished;
        self.winner = alive.first().copied();
        let message = match self.winner.and_then(|id| self.agents.get(&id)) {
            Some(agent) => format!("{} wins the arena", agent.name),
            None => String::from("Nobody survived the arena"),
        };
        info!(tick = self.tick, winner = ?self.winner, "Game over");
        self.push_event(EventKind::GameOver, message, alive);
    }

    // -----------------------------------------------------------------
    // Decision application
    // -----------------------------------------------------------------

    fn apply_decision(&mut self, id: AgentId, decision: Decision) {
        let Some(agent) = self.agents.get_mut(&id) else {
            return;
        };
        if !agent.alive {
            // Killed earlier this tick (zone or another agent's turn);
            // the pre-barrier decision is discarded.
            return;
        }

        let label = decision
            .thinking
            .as_ref()
            .map_or_else(|| decision.kind.as_str().to_owned(), |t| t.action.clone());
        agent.current_action = Some(label);
        agent.thinking = decision.thinking.clone();
        if let Some(thinking) = &decision.thinking {
            self.thinking.store(self.session, id, thinking.clone());
        }

        match (decision.kind, decision.target) {
            (DecisionKind::Attack, Some(TargetRef::Agent(target))) => {
                self.execute_attack(id, target);
            }
            (DecisionKind::Ally, Some(TargetRef::Agent(target))) => {
                self.execute_ally(id, target);
            }
            (DecisionKind::Betray, Some(TargetRef::Agent(target))) => {
                self.execute_betray(id, target);
            }
            (DecisionKind::Loot, Some(TargetRef::Item(item))) => {
                self.execute_loot(id, item);
            }
            (DecisionKind::Flee, _) => self.execute_flee(id),
            (DecisionKind::Rest, _) => self.execute_wander(id, ActionState::Idle),
            // Explore, and any decision whose target cannot be acted on.
            _ => self.execute_wander(id, ActionState::Exploring),
        }
    }

    fn execute_attack(&mut self, id: AgentId, target_id: AgentId) {
        let Some((tx, ty, t_alive, t_defense, t_name)) = self
            .agents
            .get(&target_id)
            .map(|t| (t.x, t.y, t.alive, t.defense, t.name.clone()))
        else {
            return self.execute_wander(id, ActionState::Exploring);
        };
        if !t_alive || target_id == id {
            return self.execute_wander(id, ActionState::Exploring);
        }

        let Some((ax, ay, attack, a_name)) = self
            .agents
            .get(&id)
            .map(|a| (a.x, a.y, a.attack, a.name.clone()))
        else {
            return;
        };

        if (ax - tx).abs() + (ay - ty).abs() <= 1 {
            // Integer halving of defense matches the reference combat math.
            let damage = (attack - t_defense / 2 + self.rng.random_range(0..=4)).max(1);

            if let Some(agent) = self.agents.get_mut(&id) {
                agent.action_state = ActionState::Fighting;
                agent.enemies.insert(target_id);
                agent.alliances.remove(&target_id);
                agent.memory.add(
                    format!("Struck {t_name} for {damage}"),
                    5,
                    MemoryKind::Observation,
                );
            }
            if let Some(target) = self.agents.get_mut(&target_id) {
                target.enemies.insert(id);
                target.alliances.remove(&id);
            }

            self.push_event(
                EventKind::Combat,
                format!("{a_name} hits {t_name} for {damage}"),
                vec![id, target_id],
            );
            let killed = self.apply_damage(target_id, damage, Some(id), &a_name);
            if killed {
                debug!(attacker = %id, target = %target_id, "Kill confirmed");
            }
        } else {
            if let Some(agent) = self.agents.get_mut(&id) {
                agent.action_state = ActionState::Fighting;
            }
            self.move_agent_toward(id, tx, ty);
        }
    }

    fn execute_ally(&mut self, id: AgentId, target_id: AgentId) {
        let Some((tx, ty, t_alive, t_hates_me, t_name)) = self
            .agents
            .get(&target_id)
            .map(|t| (t.x, t.y, t.alive, t.enemies.contains(&id), t.name.clone()))
        else {
            return self.execute_wander(id, ActionState::Exploring);
        };
        if !t_alive || target_id == id {
            return self.execute_wander(id, ActionState::Exploring);
        }

        let Some((ax, ay, a_name)) =
            self.agents.get(&id).map(|a| (a.x, a.y, a.name.clone()))
        else {
            return;
        };

        if let Some(agent) = self.agents.get_mut(&id) {
            agent.action_state = ActionState::Allying;
        }

        if (ax - tx).abs() + (ay - ty).abs() > ALLY_RANGE {
            return self.move_agent_toward(id, tx, ty);
        }

        let accepted = !t_hates_me && self.rng.random::<f64>() < ALLY_ACCEPT_CHANCE;
        if !accepted {
            debug!(from = %id, to = %target_id, "Alliance offer declined");
            return;
        }

        if let Some(agent) = self.agents.get_mut(&id) {
            agent.alliances.insert(target_id);
            agent.enemies.remove(&target_id);
            agent.memory.add(
                format!("Formed an alliance with {t_name}"),
                7,
                MemoryKind::Observation,
            );
        }
        if let Some(target) = self.agents.get_mut(&target_id) {
            target.alliances.insert(id);
            target.enemies.remove(&id);
            target.memory.add(
                format!("Formed an alliance with {a_name}"),
                7,
                MemoryKind::Observation,
            );
        }
        self.push_event(
            EventKind::Alliance,
            format!("{a_name} and {t_name} join forces"),
            vec![id, target_id],
        );
    }

    fn execute_betray(&mut self, id: AgentId, target_id: AgentId) {
        let Some((t_alive, t_defense, t_name)) = self
            .agents
            .get(&target_id)
            .map(|t| (t.alive, t.defense, t.name.clone()))
        else {
            return self.execute_wander(id, ActionState::Exploring);
        };
        if !t_alive || target_id == id {
            return self.execute_wander(id, ActionState::Exploring);
        }

        let Some((attack, a_name)) =
            self.agents.get(&id).map(|a| (a.attack, a.name.clone()))
        else {
            return;
        };

        // The knife in the back skips the damage roll entirely.
        let damage = (attack + 5 - t_defense / 2).max(1);

        if let Some(agent) = self.agents.get_mut(&id) {
            agent.action_state = ActionState::Betraying;
            agent.alliances.remove(&target_id);
            agent.enemies.insert(target_id);
            agent.memory.add(
                format!("Betrayed {t_name}"),
                8,
                MemoryKind::Observation,
            );
        }
        if let Some(target) = self.agents.get_mut(&target_id) {
            target.alliances.remove(&id);
            target.enemies.insert(id);
            target.memory.add(
                format!("Betrayed by {a_name}"),
                9,
                MemoryKind::Observation,
            );
        }

        self.push_event(
            EventKind::Betrayal,
            format!("{a_name} turns on {t_name}"),
            vec![id, target_id],
        );
        self.apply_damage(target_id, damage, Some(id), &a_name);
    }

    fn execute_loot(&mut self, id: AgentId, item_id: ItemId) {
        let Some(item) = self.items.iter().find(|i| i.id == item_id).cloned() else {
            // Someone else got there first this tick.
            return self.execute_wander(id, ActionState::Exploring);
        };

        let Some((ax, ay)) = self.agents.get(&id).map(|a| (a.x, a.y)) else {
            return;
        };

        if let Some(agent) = self.agents.get_mut(&id) {
            agent.action_state = ActionState::Looting;
        }

        if (ax - item.x).abs() + (ay - item.y).abs() > 1 {
            return self.move_agent_toward(id, item.x, item.y);
        }

        let Some(agent) = self.agents.get_mut(&id) else {
            return;
        };
        agent.attack += item.bonus;
        agent.weapon = Some(item.kind.clone());
        agent.memory.add(
            format!("Picked up a {} (+{} attack)", item.kind, item.bonus),
            6,
            MemoryKind::Observation,
        );
        let name = agent.name.clone();
        self.items.retain(|i| i.id != item_id);
        self.push_event(
            EventKind::Loot,
            format!("{name} picks up a {}", item.kind),
            vec![id],
        );
    }

    fn execute_flee(&mut self, id: AgentId) {
        let vision = self.config.world.vision_range;
        let Some((ax, ay)) = self.agents.get(&id).map(|a| (a.x, a.y)) else {
            return;
        };

        let threats: Vec<(i32, i32)> = self
            .agents
            .values()
            .filter(|a| {
                a.alive && a.id != id && (a.x - ax).abs() + (a.y - ay).abs() <= vision
            })
            .map(|a| (a.x, a.y))
            .collect();

        self.agent_paths.remove(&id);
        let map = &self.map;
        let rng = &mut self.rng;
        let Some(agent) = self.agents.get_mut(&id) else {
            return;
        };
        agent.action_state = ActionState::Fleeing;
        agent.clear_path();

        if threats.is_empty() {
            agent.move_random(map, rng);
        } else {
            let cx = threats.iter().map(|(x, _)| x).sum::<i32>() / threats.len() as i32;
            let cy = threats.iter().map(|(_, y)| y).sum::<i32>() / threats.len() as i32;
            agent.move_away_from(cx, cy, map);
        }
    }

    fn execute_wander(&mut self, id: AgentId, state: ActionState) {
        self.agent_paths.remove(&id);
        let map = &self.map;
        let rng = &mut self.rng;
        let Some(agent) = self.agents.get_mut(&id) else {
            return;
        };
        agent.action_state = state;
        agent.clear_path();
        agent.move_random(map, rng);
    }

    /// Route an agent toward a goal: A* when a path exists (published
    /// in `agent_paths`), greedy stepping otherwise.
    fn move_agent_toward(&mut self, id: AgentId, tx: i32, ty: i32) {
        let Some(start) = self.agents.get(&id).map(Agent::position) else {
            return;
        };

        match find_path(&self.map, start, Waypoint::new(tx, ty)) {
            Some(path) => {
                if let Some(agent) = self.agents.get_mut(&id) {
                    agent.set_path(path.waypoints.clone());
                    agent.follow_path(&self.map);
                }
                self.agent_paths.insert(id, path.waypoints);
            }
            None => {
                self.agent_paths.remove(&id);
                if let Some(agent) = self.agents.get_mut(&id) {
                    agent.clear_path();
                    agent.move_toward(tx, ty, &self.map);
                }
            }
        }
    }

    /// The single damage path shared by combat, betrayal, and the
    /// zone. Handles death bookkeeping: alive count, kill credit,
    /// alliance purge, path cleanup, events.
    fn apply_damage(
        &mut self,
        target_id: AgentId,
        amount: i32,
        attacker: Option<AgentId>,
        source: &str,
    ) -> bool {
        let Some(target) = self.agents.get_mut(&target_id) else {
            return false;
        };
        let killed = target.take_damage(amount, source);
        if !killed {
            return false;
        }

        let target_name = target.name.clone();
        target.clear_path();
        self.agent_paths.remove(&target_id);
        self.alive_count -= 1;

        // A dead agent is nobody's ally and nobody's pending business.
        for agent in self.agents.values_mut() {
            agent.alliances.remove(&target_id);
        }

        if let Some(attacker_id) = attacker
            && let Some(attacker_agent) = self.agents.get_mut(&attacker_id)
        {
            attacker_agent.kill_count += 1;
        }

        self.push_event(
            EventKind::Kill,
            format!("{target_name} is eliminated by {source}"),
            attacker.map_or_else(|| vec![target_id], |a| vec![a, target_id]),
        );
        true
    }

    // -----------------------------------------------------------------
    // Context assembly
    // -----------------------------------------------------------------

    fn build_context(&self, agent: &Agent, now: chrono::DateTime<Utc>) -> DecisionContext {
        let perception = agent.perceive(
            self.agents.values(),
            &self.items,
            self.config.world.vision_range,
        );
        DecisionContext {
            agent_id: agent.id,
            name: agent.name.clone(),
            personality: agent.personality.clone(),
            hp: agent.hp,
            max_hp: agent.max_hp,
            attack: agent.attack,
            defense: agent.defense,
            x: agent.x,
            y: agent.y,
            perception,
            world: self.world_state(),
            recent_memories: agent
                .memory
                .recent(CONTEXT_MEMORIES)
                .iter()
                .map(|m| m.text.clone())
                .collect(),
            inner_voice: agent.recent_inner_voice(now),
        }
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    pub fn world_state(&self) -> WorldStateView {
        WorldStateView {
            tick: self.tick,
            alive_count: self.alive_count,
            shrink_border: self.shrink_border,
            phase: self.phase,
            zone_center: self.zone_center,
            winner: self.winner,
        }
    }

    /// Complete snapshot for a newly connected (or resyncing)
    /// subscriber.
    pub fn full_sync(&self) -> FullSync {
        FullSync {
            world: self.world_state(),
            agents: self.agents.values().map(Agent::to_detail).collect(),
            items: self.items.clone(),
            votes: self.votes.state_at(Instant::now()),
            events: self.recent_events.iter().cloned().collect(),
            paths: self.paths_view(),
            tile_map: self.map.to_wire(),
        }
    }

    /// Versioned JSON bytes for future persistence.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if encoding fails.
    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&SnapshotDoc {
            version: 1,
            tick: self.tick,
            phase: self.phase,
            alive_count: self.alive_count,
            shrink_border: self.shrink_border,
            zone_center: self.zone_center,
            winner: self.winner,
            agents: self.agents.values().collect(),
            items: &self.items,
            tile_map: &self.map,
        })
    }

    fn paths_view(&self) -> Vec<AgentPath> {
        self.agent_paths
            .iter()
            .map(|(&agent_id, waypoints)| AgentPath {
                agent_id,
                waypoints: waypoints.clone(),
            })
            .collect()
    }

    fn report(&mut self, events: Vec<GameEvent>) -> TickReport {
        let mut changed = Vec::new();
        for agent in self.agents.values() {
            let fingerprint = agent.fingerprint();
            if self.fingerprints.get(&agent.id) != Some(&fingerprint) {
                changed.push(agent.to_delta());
                self.fingerprints.insert(agent.id, fingerprint);
            }
        }

        TickReport {
            tick: self.tick,
            world: self.world_state(),
            events,
            agents_full: self.agents.values().map(Agent::to_detail).collect(),
            changed,
            paths: self.paths_view(),
            votes: self.votes.state_at(Instant::now()),
        }
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn spawn_attempt_budget(&self) -> usize {
        let grid = self.config.world.grid_size as usize;
        2 * grid * grid
    }

    /// A random passable tile not occupied by a living agent, within
    /// the retry budget.
    fn random_free_tile(&mut self) -> Option<(i32, i32)> {
        let grid = self.config.world.grid_size as i32;
        for _ in 0..self.spawn_attempt_budget() {
            let x = self.rng.random_range(0..grid);
            let y = self.rng.random_range(0..grid);
            if !self.map.is_passable(x, y) {
                continue;
            }
            let occupied = self
                .agents
                .values()
                .any(|a| a.alive && a.x == x && a.y == y);
            if !occupied {
                return Some((x, y));
            }
        }
        None
    }

    fn push_event(&mut self, kind: EventKind, message: String, agent_ids: Vec<AgentId>) {
        debug!(tick = self.tick, ?kind, message, "Event");
        self.pending_events.push(GameEvent {
            kind,
            tick: self.tick,
            message,
            agent_ids,
            timestamp: Utc::now(),
        });
    }

    /// Universal invariants, checked at the end of every tick. A
    /// violation is fatal: the world must halt rather than publish
    /// corrupt state.
    fn assert_invariants(&self) -> Result<(), WorldError> {
        let fail = |detail: String| Err(WorldError::InvariantViolation { detail });

        let actually_alive =
            self.agents.values().filter(|a| a.alive).count() as u32;
        if actually_alive != self.alive_count {
            return fail(format!(
                "alive_count {} != |alive agents| {actually_alive}",
                self.alive_count
            ));
        }

        for agent in self.agents.values() {
            if !self.map.in_bounds(agent.x, agent.y) {
                return fail(format!("{} is off the map", agent.id));
            }
            if !self.map.is_passable(agent.x, agent.y) {
                return fail(format!("{} stands on a blocked tile", agent.id));
            }
            if agent.hp < 0 || agent.hp > agent.max_hp {
                return fail(format!("{} hp {} out of range", agent.id, agent.hp));
            }
            if agent.alive != (agent.hp > 0) {
                return fail(format!("{} alive flag disagrees with hp", agent.id));
            }
            if agent.alliances.contains(&agent.id) || agent.enemies.contains(&agent.id) {
                return fail(format!("{} lists itself in a relationship", agent.id));
            }
            if agent.alliances.intersection(&agent.enemies).next().is_some() {
                return fail(format!("{} has an ally who is also an enemy", agent.id));
            }
            for ally in &agent.alliances {
                if self.agents.get(ally).is_none_or(|a| !a.alive) {
                    return fail(format!("{} is allied to dead {ally}", agent.id));
                }
            }
        }

        for (agent_id, waypoints) in &self.agent_paths {
            for w in waypoints {
                if !self.map.is_passable(w.x, w.y) {
                    return fail(format!("path of {agent_id} crosses a blocked tile"));
                }
            }
            for pair in waypoints.windows(2) {
                if pair[0].manhattan(pair[1]) != 1 {
                    return fail(format!("path of {agent_id} is not 4-connected"));
                }
            }
        }

        Ok(())
    }
}
