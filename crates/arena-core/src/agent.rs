//! The agent entity: stats, relationships, perception, and movement.
//!
//! Agents never hold references to each other -- relationships are sets
//! of [`AgentId`], resolved through the world's agent table. All
//! movement is one step per tick, and every landing tile is checked for
//! passability before the move is committed.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use arena_types::{
    ActionState, AgentDelta, AgentDetail, AgentId, Item, MemoryKind, ThinkingProcess, Waypoint,
};
use arena_world::TileMap;

use crate::memory::MemoryStream;

/// Bracketed prefix on stored inner-voice memories. The decision
/// context receives the text with this prefix stripped.
const INNER_VOICE_PREFIX: &str = "[crowd]";

/// An inner voice older than this is ignored by the next decision.
const INNER_VOICE_TTL_SECONDS: i64 = 30;

/// Attempts made by [`Agent::move_random`] before giving up.
const RANDOM_MOVE_TRIES: usize = 8;

/// How an agent relates to another agent it can see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Ally,
    Enemy,
    Neutral,
}

/// A visible agent, as captured at perception time. Plain data so the
/// decision pass can run against a consistent pre-tick snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceivedAgent {
    pub id: AgentId,
    pub name: String,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub x: i32,
    pub y: i32,
    pub distance: i32,
    pub relation: Relation,
}

/// What an agent can see this tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    pub nearby_agents: Vec<PerceivedAgent>,
    pub nearby_items: Vec<Item>,
}

/// Immutable template agents are stamped from. Instances jitter their
/// stats so two agents from the same template are not identical.
#[derive(Debug, Clone)]
pub struct AgentTemplate {
    pub name: &'static str,
    pub personality: &'static str,
    pub description: &'static str,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
}

/// One combatant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub personality: String,
    pub description: String,

    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub weapon: Option<String>,
    pub kill_count: u32,

    pub x: i32,
    pub y: i32,
    pub alive: bool,
    pub action_state: ActionState,

    pub alliances: BTreeSet<AgentId>,
    pub enemies: BTreeSet<AgentId>,

    pub current_action: Option<String>,
    pub memory: MemoryStream,

    pub waypoints: Vec<Waypoint>,
    pub current_waypoint: usize,

    pub thinking: Option<ThinkingProcess>,
}

impl Agent {
    /// Stamp an agent from a template at a spawn position, with small
    /// random stat offsets.
    pub fn from_template(
        id: AgentId,
        name: String,
        template: &AgentTemplate,
        x: i32,
        y: i32,
        rng: &mut impl Rng,
    ) -> Self {
        let max_hp = (template.max_hp + rng.random_range(-10..=10)).max(10);
        let attack = (template.attack + rng.random_range(-3..=3)).max(1);
        let defense = (template.defense + rng.random_range(-2..=2)).max(0);

        let mut memory = MemoryStream::new();
        memory.add(
            format!(
                "I am {name}, {}. {}",
                template.personality, template.description
            ),
            8,
            MemoryKind::Observation,
        );

        Self {
            id,
            name,
            personality: template.personality.to_owned(),
            description: template.description.to_owned(),
            hp: max_hp,
            max_hp,
            attack,
            defense,
            weapon: None,
            kill_count: 0,
            x,
            y,
            alive: true,
            action_state: ActionState::Idle,
            alliances: BTreeSet::new(),
            enemies: BTreeSet::new(),
            current_action: None,
            memory,
            waypoints: Vec::new(),
            current_waypoint: 0,
            thinking: None,
        }
    }

    pub const fn position(&self) -> Waypoint {
        Waypoint::new(self.x, self.y)
    }

    /// Manhattan distance to a point.
    pub const fn distance_to(&self, x: i32, y: i32) -> i32 {
        (self.x - x).abs() + (self.y - y).abs()
    }

    // -----------------------------------------------------------------
    // Perception
    // -----------------------------------------------------------------

    /// Everything within `vision_range` (Manhattan), excluding self and
    /// the dead. Nearby agents are sorted closest-first.
    pub fn perceive<'a>(
        &self,
        others: impl Iterator<Item = &'a Self>,
        items: &[Item],
        vision_range: i32,
    ) -> Perception {
        let mut nearby_agents: Vec<PerceivedAgent> = others
            .filter(|other| other.id != self.id && other.alive)
            .filter_map(|other| {
                let distance = self.distance_to(other.x, other.y);
                (distance <= vision_range).then(|| PerceivedAgent {
                    id: other.id,
                    name: other.name.clone(),
                    hp: other.hp,
                    max_hp: other.max_hp,
                    attack: other.attack,
                    defense: other.defense,
                    x: other.x,
                    y: other.y,
                    distance,
                    relation: self.relation_to(other.id),
                })
            })
            .collect();
        nearby_agents.sort_by_key(|a| (a.distance, a.id));

        let nearby_items = items
            .iter()
            .filter(|item| self.distance_to(item.x, item.y) <= vision_range)
            .cloned()
            .collect();

        Perception {
            nearby_agents,
            nearby_items,
        }
    }

    fn relation_to(&self, other: AgentId) -> Relation {
        if self.alliances.contains(&other) {
            Relation::Ally
        } else if self.enemies.contains(&other) {
            Relation::Enemy
        } else {
            Relation::Neutral
        }
    }

    // -----------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------

    /// Step one cell toward `(tx, ty)` in each axis. The combined
    /// destination is clamped to the map and must be passable, else the
    /// agent stays put.
    pub fn move_toward(&mut self, tx: i32, ty: i32, map: &TileMap) {
        let dx = (tx - self.x).signum();
        let dy = (ty - self.y).signum();
        self.try_step(dx, dy, map);
    }

    /// Step one cell away from `(fx, fy)`. A zero component defaults to
    /// `+1` so the agent always tries to move.
    pub fn move_away_from(&mut self, fx: i32, fy: i32, map: &TileMap) {
        let away = |delta: i32| if delta == 0 { 1 } else { -delta.signum() };
        let dx = away(fx - self.x);
        let dy = away(fy - self.y);
        self.try_step(dx, dy, map);
    }

    /// Try up to [`RANDOM_MOVE_TRIES`] random offsets from
    /// `{-1, 0, 1}²` and take the first passable one; otherwise stay.
    pub fn move_random(&mut self, map: &TileMap, rng: &mut impl Rng) {
        for _ in 0..RANDOM_MOVE_TRIES {
            let dx = rng.random_range(-1..=1);
            let dy = rng.random_range(-1..=1);
            if self.try_step(dx, dy, map) {
                return;
            }
        }
    }

    fn try_step(&mut self, dx: i32, dy: i32, map: &TileMap) -> bool {
        let nx = (self.x + dx).clamp(0, map.width() as i32 - 1);
        let ny = (self.y + dy).clamp(0, map.height() as i32 - 1);
        if map.is_passable(nx, ny) {
            self.x = nx;
            self.y = ny;
            true
        } else {
            false
        }
    }

    // -----------------------------------------------------------------
    // Path following
    // -----------------------------------------------------------------

    /// Replace the current path. Index resets to the first waypoint.
    pub fn set_path(&mut self, waypoints: Vec<Waypoint>) {
        self.waypoints = waypoints;
        self.current_waypoint = 0;
    }

    pub fn clear_path(&mut self) {
        self.waypoints.clear();
        self.current_waypoint = 0;
    }

    pub fn has_path(&self) -> bool {
        self.current_waypoint < self.waypoints.len()
    }

    /// Advance one cell along the current path: x axis first, then y.
    /// Waypoints already reached are skipped; a blocked step clears the
    /// whole path and leaves the agent in place.
    pub fn follow_path(&mut self, map: &TileMap) {
        while self.current_waypoint < self.waypoints.len() {
            let target = self.waypoints[self.current_waypoint];
            if self.x == target.x && self.y == target.y {
                self.current_waypoint += 1;
                continue;
            }

            let (dx, dy) = if self.x != target.x {
                ((target.x - self.x).signum(), 0)
            } else {
                (0, (target.y - self.y).signum())
            };

            if !self.try_step(dx, dy, map) {
                self.clear_path();
            }
            return;
        }
    }

    // -----------------------------------------------------------------
    // Damage and voices
    // -----------------------------------------------------------------

    /// Apply damage, clamping hp at zero. Returns `true` when this
    /// killed the agent; death flips `alive` and pins the action state.
    pub fn take_damage(&mut self, amount: i32, source: &str) -> bool {
        if !self.alive {
            return false;
        }
        self.hp = (self.hp - amount).max(0);
        self.memory.add(
            format!("Took {amount} damage from {source}"),
            6,
            MemoryKind::Observation,
        );
        if self.hp == 0 {
            self.alive = false;
            self.action_state = ActionState::Dead;
            self.memory
                .add(format!("Slain by {source}"), 10, MemoryKind::Observation);
            true
        } else {
            false
        }
    }

    /// Deliver a resolved spectator vote as an elevated memory.
    pub fn hear_inner_voice(&mut self, message: &str) {
        self.memory.add(
            format!("{INNER_VOICE_PREFIX} {message}"),
            9,
            MemoryKind::InnerVoice,
        );
    }

    /// The freshest inner voice within the 30-second consumption
    /// window, with the bracketed prefix stripped.
    pub fn recent_inner_voice(&self, now: DateTime<Utc>) -> Option<String> {
        let entry = self.memory.latest_of_kind(MemoryKind::InnerVoice)?;
        if now - entry.timestamp > Duration::seconds(INNER_VOICE_TTL_SECONDS) {
            return None;
        }
        let stripped = entry
            .text
            .strip_prefix(INNER_VOICE_PREFIX)
            .map_or(entry.text.as_str(), str::trim_start);
        Some(stripped.trim_start().to_owned())
    }

    // -----------------------------------------------------------------
    // Published forms
    // -----------------------------------------------------------------

    /// The five-tuple used for delta detection.
    pub fn fingerprint(&self) -> (i32, i32, i32, bool, ActionState) {
        (self.x, self.y, self.hp, self.alive, self.action_state)
    }

    pub fn to_detail(&self) -> AgentDetail {
        AgentDetail {
            id: self.id,
            name: self.name.clone(),
            personality: self.personality.clone(),
            description: self.description.clone(),
            hp: self.hp,
            max_hp: self.max_hp,
            attack: self.attack,
            defense: self.defense,
            weapon: self.weapon.clone(),
            kill_count: self.kill_count,
            x: self.x,
            y: self.y,
            alive: self.alive,
            action_state: self.action_state,
            alliances: self.alliances.iter().copied().collect(),
            enemies: self.enemies.iter().copied().collect(),
            current_action: self.current_action.clone(),
            thinking: self.thinking.clone(),
        }
    }

    pub const fn to_delta(&self) -> AgentDelta {
        AgentDelta {
            id: self.id,
            x: self.x,
            y: self.y,
            hp: self.hp,
            alive: self.alive,
            action_state: self.action_state,
        }
    }
}

/// The built-in roster. World init cycles through these, numbering
/// repeats when `agent_count` exceeds the roster.
pub const TEMPLATES: &[AgentTemplate] = &[
    AgentTemplate {
        name: "Rex",
        personality: "aggressive",
        description: "A brawler who settles every question with his fists.",
        max_hp: 100,
        attack: 14,
        defense: 4,
    },
    AgentTemplate {
        name: "Sage",
        personality: "strategic",
        description: "Plays the long game, counting numbers before acting.",
        max_hp: 95,
        attack: 10,
        defense: 6,
    },
    AgentTemplate {
        name: "Vera",
        personality: "cautious",
        description: "Keeps her distance and her options open.",
        max_hp: 90,
        attack: 9,
        defense: 8,
    },
    AgentTemplate {
        name: "Loki",
        personality: "treacherous",
        description: "Every alliance is a weapon waiting to be used.",
        max_hp: 85,
        attack: 12,
        defense: 5,
    },
    AgentTemplate {
        name: "Finn",
        personality: "resourceful",
        description: "Finds friends and gear where others find nothing.",
        max_hp: 95,
        attack: 8,
        defense: 6,
    },
    AgentTemplate {
        name: "Nova",
        personality: "brave",
        description: "Charges first and asks questions never.",
        max_hp: 105,
        attack: 13,
        defense: 3,
    },
    AgentTemplate {
        name: "Ash",
        personality: "cunning",
        description: "Strikes only when the odds are already decided.",
        max_hp: 88,
        attack: 11,
        defense: 6,
    },
    AgentTemplate {
        name: "Ivy",
        personality: "loyal",
        description: "Stands by her allies to the last hit point.",
        max_hp: 100,
        attack: 9,
        defense: 7,
    },
    AgentTemplate {
        name: "Dash",
        personality: "impulsive",
        description: "Acts on the first idea that arrives.",
        max_hp: 92,
        attack: 12,
        defense: 4,
    },
    AgentTemplate {
        name: "Echo",
        personality: "curious",
        description: "Wanders toward whatever looks interesting.",
        max_hp: 90,
        attack: 10,
        defense: 5,
    },
];

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use arena_world::mapgen;
    use arena_world::TileKind;

    use super::*;

    fn make_agent(id: u32, x: i32, y: i32) -> Agent {
        let mut rng = SmallRng::seed_from_u64(7);
        Agent::from_template(
            AgentId(id),
            TEMPLATES[0].name.to_owned(),
            &TEMPLATES[0],
            x,
            y,
            &mut rng,
        )
    }

    #[test]
    fn template_jitter_stays_in_floors() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..50 {
            let agent = Agent::from_template(
                AgentId(0),
                String::from("X"),
                &TEMPLATES[3],
                0,
                0,
                &mut rng,
            );
            assert!(agent.max_hp >= 10);
            assert!(agent.attack >= 1);
            assert!(agent.defense >= 0);
            assert_eq!(agent.hp, agent.max_hp);
        }
    }

    #[test]
    fn spawn_seeds_identity_memory() {
        let agent = make_agent(0, 0, 0);
        assert_eq!(agent.memory.len(), 1);
        assert_eq!(agent.memory.recent(1)[0].importance, 8);
    }

    #[test]
    fn perceive_excludes_self_dead_and_far() {
        let me = make_agent(0, 5, 5);
        let near = make_agent(1, 6, 5);
        let mut dead = make_agent(2, 5, 6);
        dead.alive = false;
        dead.hp = 0;
        let far = make_agent(3, 15, 15);

        let others = [near.clone(), dead, far];
        let perception = me.perceive(others.iter(), &[], 4);
        assert_eq!(perception.nearby_agents.len(), 1);
        assert_eq!(perception.nearby_agents[0].id, near.id);
        assert_eq!(perception.nearby_agents[0].distance, 1);
    }

    #[test]
    fn move_toward_steps_diagonally() {
        let map = mapgen::create_empty(10, 10);
        let mut agent = make_agent(0, 2, 2);
        agent.move_toward(5, 7, &map);
        assert_eq!((agent.x, agent.y), (3, 3));
    }

    #[test]
    fn move_toward_blocked_stays() {
        let mut map = mapgen::create_empty(10, 10);
        map.set_kind(3, 3, TileKind::Blocked);
        let mut agent = make_agent(0, 2, 2);
        agent.move_toward(5, 7, &map);
        assert_eq!((agent.x, agent.y), (2, 2));
    }

    #[test]
    fn move_away_defaults_to_positive_on_zero() {
        let map = mapgen::create_empty(10, 10);
        let mut agent = make_agent(0, 4, 4);
        agent.move_away_from(4, 4, &map);
        assert_eq!((agent.x, agent.y), (5, 5));
    }

    #[test]
    fn move_away_is_clamped_at_edges() {
        let map = mapgen::create_empty(10, 10);
        let mut agent = make_agent(0, 0, 0);
        agent.move_away_from(3, 3, &map);
        // Both deltas point off-map and clamp back to the origin.
        assert_eq!((agent.x, agent.y), (0, 0));
    }

    #[test]
    fn follow_path_prioritizes_x_axis() {
        let map = mapgen::create_empty(10, 10);
        let mut agent = make_agent(0, 0, 0);
        agent.set_path(vec![Waypoint::new(2, 2)]);
        agent.follow_path(&map);
        assert_eq!((agent.x, agent.y), (1, 0));
        agent.follow_path(&map);
        assert_eq!((agent.x, agent.y), (2, 0));
        agent.follow_path(&map);
        assert_eq!((agent.x, agent.y), (2, 1));
    }

    #[test]
    fn follow_path_advances_past_reached_waypoints() {
        let map = mapgen::create_empty(10, 10);
        let mut agent = make_agent(0, 1, 0);
        agent.set_path(vec![Waypoint::new(1, 0), Waypoint::new(2, 0)]);
        agent.follow_path(&map);
        assert_eq!((agent.x, agent.y), (2, 0));
        assert_eq!(agent.current_waypoint, 1);
    }

    #[test]
    fn follow_path_clears_on_blocked_step() {
        let mut map = mapgen::create_empty(10, 10);
        map.set_kind(1, 0, TileKind::Blocked);
        let mut agent = make_agent(0, 0, 0);
        agent.set_path(vec![Waypoint::new(2, 0)]);
        agent.follow_path(&map);
        assert_eq!((agent.x, agent.y), (0, 0));
        assert!(!agent.has_path());
    }

    #[test]
    fn damage_clamps_and_kills_at_zero() {
        let mut agent = make_agent(0, 0, 0);
        let hp = agent.hp;
        assert!(!agent.take_damage(hp - 1, "test"));
        assert_eq!(agent.hp, 1);
        assert!(agent.alive);

        assert!(agent.take_damage(50, "test"));
        assert_eq!(agent.hp, 0);
        assert!(!agent.alive);
        assert_eq!(agent.action_state, ActionState::Dead);

        // Already dead: no further transition.
        assert!(!agent.take_damage(10, "test"));
    }

    #[test]
    fn inner_voice_is_stripped_and_expires() {
        let mut agent = make_agent(0, 0, 0);
        agent.hear_inner_voice("attack Rex");
        let now = Utc::now();
        assert_eq!(agent.recent_inner_voice(now).as_deref(), Some("attack Rex"));

        let later = now + Duration::seconds(INNER_VOICE_TTL_SECONDS + 5);
        assert!(agent.recent_inner_voice(later).is_none());
    }

    #[test]
    fn fingerprint_tracks_the_five_tuple() {
        let mut agent = make_agent(0, 3, 3);
        let before = agent.fingerprint();
        agent.kill_count += 1; // not part of the tuple
        assert_eq!(agent.fingerprint(), before);
        agent.x += 1;
        assert_ne!(agent.fingerprint(), before);
    }
}
