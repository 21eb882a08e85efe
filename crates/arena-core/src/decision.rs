//! The decision capability and its rule-based implementation.
//!
//! A [`DecisionBackend`] maps a per-agent [`DecisionContext`] to a
//! [`Decision`], and periodically distills memories via `reflect`. The
//! world fans `decide` calls out concurrently across agents, so
//! implementations take `&self` and must tolerate concurrent calls.
//!
//! The rule-based backend is the default and the fallback target of
//! the LLM backend. It is a priority list: spectator guidance first,
//! then loot, then self-preservation, then a personality-flavored
//! branch, and exploration as the catch-all.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use arena_types::{
    AgentId, DecisionKind, ItemId, ThinkingProcess, WorldStateView,
};

use crate::agent::{PerceivedAgent, Perception, Relation};

/// Flee when hp drops below this fraction of max and company is near.
const FLEE_HP_RATIO: f64 = 0.3;

/// Reflection flags survival worries below this hp fraction.
const REFLECT_HP_RATIO: f64 = 0.4;

/// A treacherous agent considers betrayal against allies under this hp.
const BETRAY_TARGET_HP: i32 = 40;

/// Chance a treacherous agent actually turns on a weakened ally.
const BETRAY_CHANCE: f64 = 0.2;

/// What a decision acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetRef {
    Agent(AgentId),
    Item(ItemId),
}

/// A typed action for one agent in one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionKind,
    pub target: Option<TargetRef>,
    pub reason: Option<String>,
    pub thinking: Option<ThinkingProcess>,
}

impl Decision {
    pub fn new(kind: DecisionKind, target: Option<TargetRef>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            reason: Some(reason.into()),
            thinking: None,
        }
    }

    /// Attach a reasoning artifact labeled `action`, carrying `reason`.
    pub fn with_rule_thinking(mut self, action_label: impl Into<String>) -> Self {
        self.thinking = Some(ThinkingProcess {
            action: action_label.into(),
            reasoning: self.reason.clone().unwrap_or_default(),
            prompt: None,
            raw_response: None,
            timestamp: Utc::now(),
        });
        self
    }
}

/// Everything a backend may consult when deciding for one agent.
/// Plain owned data: a consistent pre-tick snapshot, safe to read
/// concurrently with other agents' contexts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionContext {
    pub agent_id: AgentId,
    pub name: String,
    pub personality: String,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub x: i32,
    pub y: i32,
    pub perception: Perception,
    pub world: WorldStateView,
    pub recent_memories: Vec<String>,
    /// Resolved spectator guidance, already stripped of its prefix.
    /// Present only when fresher than the consumption window.
    pub inner_voice: Option<String>,
}

/// Context for the periodic reflection pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReflectionContext {
    pub agent_id: AgentId,
    pub name: String,
    pub personality: String,
    pub hp: i32,
    pub max_hp: i32,
    pub recent_memories: Vec<String>,
}

/// A source of decisions and reflections.
///
/// Both operations may be invoked concurrently across agents. `decide`
/// is total: implementations recover internally (the LLM variant falls
/// back to rules) and always produce a valid [`Decision`].
pub trait DecisionBackend: Send + Sync {
    /// Choose an action for one agent.
    fn decide(&self, ctx: &DecisionContext) -> impl Future<Output = Decision> + Send;

    /// Distill recent memories into a reflection, or `None` when
    /// nothing is worth noting.
    fn reflect(&self, ctx: &ReflectionContext) -> impl Future<Output = Option<String>> + Send;
}

// ---------------------------------------------------------------------------
// Rule-based backend
// ---------------------------------------------------------------------------

/// Deterministic priority rules. Stateless; the only randomness is the
/// betrayal roll, drawn from the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedBackend;

impl RuleBasedBackend {
    pub const fn new() -> Self {
        Self
    }

    fn decide_sync(&self, ctx: &DecisionContext) -> Decision {
        // 1. Spectator guidance overrides everything it can express.
        if let Some(voice) = &ctx.inner_voice
            && let Some(decision) = decision_from_voice(voice, ctx)
        {
            return decision;
        }

        // 2. Free gear is free.
        if let Some(item) = ctx.perception.nearby_items.first() {
            return Decision::new(
                DecisionKind::Loot,
                Some(TargetRef::Item(item.id)),
                format!("A {} is lying right there", item.kind),
            )
            .with_rule_thinking(format!("loot {}", item.kind));
        }

        // 3. Badly hurt with company around: run.
        if hp_ratio(ctx) < FLEE_HP_RATIO && !ctx.perception.nearby_agents.is_empty() {
            return Decision::new(
                DecisionKind::Flee,
                None,
                "Too wounded to risk a fight",
            )
            .with_rule_thinking("flee");
        }

        // 4. Personality branch.
        if let Some(decision) = personality_decision(ctx) {
            return decision;
        }

        // 5. Nothing pressing.
        Decision::new(DecisionKind::Explore, None, "Scouting for threats and loot")
            .with_rule_thinking("explore")
    }

    fn reflect_sync(ctx: &ReflectionContext) -> Option<String> {
        let mentions = |needles: &[&str]| {
            ctx.recent_memories
                .iter()
                .filter(|m| {
                    let m = m.to_lowercase();
                    needles.iter().any(|n| m.contains(n))
                })
                .count()
        };

        if mentions(&["damage", "attack", "slain"]) >= 3 {
            return Some(format!(
                "I have been trading blows constantly. Every fight I pick has to count, \
                 or I will bleed out long before the end. ({})",
                ctx.name
            ));
        }
        if mentions(&["alliance", "ally", "allied"]) >= 2 {
            return Some(String::from(
                "My alliances are carrying me through this. I should keep my partners \
                 close and watch for the moment they stop being useful.",
            ));
        }
        if f64::from(ctx.hp) < REFLECT_HP_RATIO * f64::from(ctx.max_hp) {
            return Some(String::from(
                "I am running out of blood to spend. Staying alive matters more than \
                 winning fights right now.",
            ));
        }
        None
    }
}

impl DecisionBackend for RuleBasedBackend {
    async fn decide(&self, ctx: &DecisionContext) -> Decision {
        self.decide_sync(ctx)
    }

    async fn reflect(&self, ctx: &ReflectionContext) -> Option<String> {
        Self::reflect_sync(ctx)
    }
}

// ---------------------------------------------------------------------------
// Rule helpers
// ---------------------------------------------------------------------------

fn hp_ratio(ctx: &DecisionContext) -> f64 {
    if ctx.max_hp <= 0 {
        return 0.0;
    }
    f64::from(ctx.hp) / f64::from(ctx.max_hp)
}

/// Interpret an inner voice as attack/flee/ally, matching an optional
/// target name against the visible agents. Intents that cannot be
/// grounded (no matching or visible target) yield `None` so the normal
/// priorities take over.
fn decision_from_voice(voice: &str, ctx: &DecisionContext) -> Option<Decision> {
    let lower = voice.to_lowercase();

    let named_target = || -> Option<&PerceivedAgent> {
        ctx.perception
            .nearby_agents
            .iter()
            .find(|a| lower.contains(&a.name.to_lowercase()))
    };

    if ["attack", "fight", "kill"].iter().any(|w| lower.contains(w)) {
        let target = named_target().or_else(|| {
            ctx.perception
                .nearby_agents
                .iter()
                .find(|a| a.relation != Relation::Ally)
        })?;
        return Some(
            Decision::new(
                DecisionKind::Attack,
                Some(TargetRef::Agent(target.id)),
                format!("The crowd wants {} down", target.name),
            )
            .with_rule_thinking(format!("attack {}", target.name)),
        );
    }

    if ["flee", "run", "escape", "hide"].iter().any(|w| lower.contains(w)) {
        return Some(
            Decision::new(DecisionKind::Flee, None, "The crowd says run")
                .with_rule_thinking("flee"),
        );
    }

    if ["ally", "befriend", "team"].iter().any(|w| lower.contains(w)) {
        let target = named_target().or_else(|| {
            ctx.perception
                .nearby_agents
                .iter()
                .find(|a| a.relation == Relation::Neutral)
        })?;
        return Some(
            Decision::new(
                DecisionKind::Ally,
                Some(TargetRef::Agent(target.id)),
                format!("The crowd wants me beside {}", target.name),
            )
            .with_rule_thinking(format!("ally {}", target.name)),
        );
    }

    None
}

fn weakest<'a>(
    agents: impl Iterator<Item = &'a PerceivedAgent>,
) -> Option<&'a PerceivedAgent> {
    agents.min_by_key(|a| (a.hp, a.distance, a.id))
}

fn personality_decision(ctx: &DecisionContext) -> Option<Decision> {
    let personality = ctx.personality.to_lowercase();
    let nearby = &ctx.perception.nearby_agents;
    if nearby.is_empty() {
        return None;
    }

    let allies = || nearby.iter().filter(|a| a.relation == Relation::Ally);
    let enemies = || nearby.iter().filter(|a| a.relation == Relation::Enemy);
    let neutrals = || nearby.iter().filter(|a| a.relation == Relation::Neutral);
    let non_allies = || nearby.iter().filter(|a| a.relation != Relation::Ally);

    let contains_any =
        |words: &[&str]| words.iter().any(|w| personality.contains(w));

    if contains_any(&["aggressive", "brave", "impulsive"]) {
        let target = weakest(non_allies())?;
        return Some(
            Decision::new(
                DecisionKind::Attack,
                Some(TargetRef::Agent(target.id)),
                format!("{} looks like the softest target here", target.name),
            )
            .with_rule_thinking(format!("attack {}", target.name)),
        );
    }

    if contains_any(&["cautious", "strategic", "loyal"]) {
        let ally_count = allies().count();
        let hostile_count = non_allies().count();
        if hostile_count > ally_count {
            if let Some(target) = neutrals().next() {
                return Some(
                    Decision::new(
                        DecisionKind::Ally,
                        Some(TargetRef::Agent(target.id)),
                        format!("Outnumbered; better with {} than against them", target.name),
                    )
                    .with_rule_thinking(format!("ally {}", target.name)),
                );
            }
        } else if let Some(target) = weakest(enemies()) {
            return Some(
                Decision::new(
                    DecisionKind::Attack,
                    Some(TargetRef::Agent(target.id)),
                    format!("The numbers favor us against {}", target.name),
                )
                .with_rule_thinking(format!("attack {}", target.name)),
            );
        }
        return None;
    }

    if contains_any(&["treacherous", "cunning"]) {
        let weakened_ally = allies().find(|a| a.hp < BETRAY_TARGET_HP);
        if let Some(target) = weakened_ally
            && rand::rng().random::<f64>() < BETRAY_CHANCE
        {
            return Some(
                Decision::new(
                    DecisionKind::Betray,
                    Some(TargetRef::Agent(target.id)),
                    format!("{} has outlived their usefulness", target.name),
                )
                .with_rule_thinking(format!("betray {}", target.name)),
            );
        }
        let target = neutrals().next()?;
        return Some(
            Decision::new(
                DecisionKind::Attack,
                Some(TargetRef::Agent(target.id)),
                format!("{} will not see it coming", target.name),
            )
            .with_rule_thinking(format!("attack {}", target.name)),
        );
    }

    if personality.contains("resourceful") {
        let target = neutrals().next()?;
        return Some(
            Decision::new(
                DecisionKind::Ally,
                Some(TargetRef::Agent(target.id)),
                format!("Another pair of hands: {}", target.name),
            )
            .with_rule_thinking(format!("ally {}", target.name)),
        );
    }

    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arena_types::{GamePhase, Item, Waypoint};

    use super::*;

    fn perceived(id: u32, name: &str, hp: i32, relation: Relation) -> PerceivedAgent {
        PerceivedAgent {
            id: AgentId(id),
            name: name.to_owned(),
            hp,
            max_hp: 100,
            attack: 10,
            defense: 5,
            x: 1,
            y: 0,
            distance: 1,
            relation,
        }
    }

    fn make_ctx(personality: &str) -> DecisionContext {
        DecisionContext {
            agent_id: AgentId(0),
            name: String::from("Tester"),
            personality: personality.to_owned(),
            hp: 100,
            max_hp: 100,
            attack: 10,
            defense: 5,
            x: 0,
            y: 0,
            perception: Perception::default(),
            world: WorldStateView {
                tick: 1,
                alive_count: 5,
                shrink_border: 20,
                phase: GamePhase::Running,
                zone_center: Waypoint::new(10, 10),
                winner: None,
            },
            recent_memories: Vec::new(),
            inner_voice: None,
        }
    }

    async fn decide(ctx: &DecisionContext) -> Decision {
        RuleBasedBackend::new().decide(ctx).await
    }

    #[tokio::test]
    async fn inner_voice_beats_loot() {
        let mut ctx = make_ctx("curious");
        ctx.perception.nearby_items.push(Item {
            id: ItemId(1),
            x: 0,
            y: 1,
            kind: String::from("sword"),
            bonus: 5,
        });
        ctx.inner_voice = Some(String::from("flee"));

        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Flee);
    }

    #[tokio::test]
    async fn inner_voice_attack_matches_named_target() {
        let mut ctx = make_ctx("cautious");
        ctx.perception.nearby_agents.push(perceived(1, "Rex", 80, Relation::Neutral));
        ctx.perception.nearby_agents.push(perceived(2, "Nova", 90, Relation::Neutral));
        ctx.inner_voice = Some(String::from("attack Nova"));

        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Attack);
        assert_eq!(decision.target, Some(TargetRef::Agent(AgentId(2))));
    }

    #[tokio::test]
    async fn ungroundable_voice_falls_through() {
        // Attack guidance with nobody visible: next priority (explore).
        let mut ctx = make_ctx("curious");
        ctx.inner_voice = Some(String::from("attack someone"));
        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Explore);
    }

    #[tokio::test]
    async fn loot_comes_before_personality() {
        let mut ctx = make_ctx("aggressive");
        ctx.perception.nearby_agents.push(perceived(1, "Rex", 50, Relation::Neutral));
        ctx.perception.nearby_items.push(Item {
            id: ItemId(9),
            x: 1,
            y: 1,
            kind: String::from("axe"),
            bonus: 4,
        });

        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Loot);
        assert_eq!(decision.target, Some(TargetRef::Item(ItemId(9))));
    }

    #[tokio::test]
    async fn low_hp_flees_from_company() {
        let mut ctx = make_ctx("aggressive");
        ctx.hp = 20;
        ctx.perception.nearby_agents.push(perceived(1, "Rex", 90, Relation::Enemy));
        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Flee);
    }

    #[tokio::test]
    async fn low_hp_alone_keeps_exploring() {
        let mut ctx = make_ctx("curious");
        ctx.hp = 10;
        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Explore);
    }

    #[tokio::test]
    async fn aggressive_attacks_weakest_non_ally() {
        let mut ctx = make_ctx("aggressive");
        ctx.perception.nearby_agents.push(perceived(1, "Rex", 70, Relation::Neutral));
        ctx.perception.nearby_agents.push(perceived(2, "Vera", 30, Relation::Enemy));
        ctx.perception.nearby_agents.push(perceived(3, "Ivy", 10, Relation::Ally));

        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Attack);
        assert_eq!(decision.target, Some(TargetRef::Agent(AgentId(2))));
    }

    #[tokio::test]
    async fn strategic_allies_when_outnumbered() {
        let mut ctx = make_ctx("strategic");
        ctx.perception.nearby_agents.push(perceived(1, "Rex", 90, Relation::Enemy));
        ctx.perception.nearby_agents.push(perceived(2, "Nova", 90, Relation::Neutral));

        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Ally);
        assert_eq!(decision.target, Some(TargetRef::Agent(AgentId(2))));
    }

    #[tokio::test]
    async fn strategic_attacks_with_numbers() {
        let mut ctx = make_ctx("strategic");
        ctx.perception.nearby_agents.push(perceived(1, "Ivy", 90, Relation::Ally));
        ctx.perception.nearby_agents.push(perceived(2, "Rex", 40, Relation::Enemy));

        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Attack);
        assert_eq!(decision.target, Some(TargetRef::Agent(AgentId(2))));
    }

    #[tokio::test]
    async fn resourceful_prefers_alliances() {
        let mut ctx = make_ctx("resourceful");
        ctx.perception.nearby_agents.push(perceived(1, "Echo", 90, Relation::Neutral));
        let decision = decide(&ctx).await;
        assert_eq!(decision.kind, DecisionKind::Ally);
    }

    #[tokio::test]
    async fn decisions_carry_thinking_artifacts() {
        let ctx = make_ctx("curious");
        let decision = decide(&ctx).await;
        let thinking = decision.thinking.unwrap();
        assert_eq!(thinking.action, "explore");
        assert!(thinking.prompt.is_none());
    }

    #[tokio::test]
    async fn reflection_flags_constant_combat() {
        let backend = RuleBasedBackend::new();
        let ctx = ReflectionContext {
            agent_id: AgentId(0),
            name: String::from("Rex"),
            personality: String::from("aggressive"),
            hp: 90,
            max_hp: 100,
            recent_memories: vec![
                String::from("Took 5 damage from Vera"),
                String::from("Took 8 damage from Vera"),
                String::from("attacked Nova"),
            ],
        };
        assert!(backend.reflect(&ctx).await.is_some());
    }

    #[tokio::test]
    async fn reflection_is_quiet_without_themes() {
        let backend = RuleBasedBackend::new();
        let ctx = ReflectionContext {
            agent_id: AgentId(0),
            name: String::from("Rex"),
            personality: String::from("aggressive"),
            hp: 90,
            max_hp: 100,
            recent_memories: vec![String::from("Wandered east")],
        };
        assert!(backend.reflect(&ctx).await.is_none());
    }

    #[tokio::test]
    async fn reflection_flags_low_hp() {
        let backend = RuleBasedBackend::new();
        let ctx = ReflectionContext {
            agent_id: AgentId(0),
            name: String::from("Vera"),
            personality: String::from("cautious"),
            hp: 20,
            max_hp: 100,
            recent_memories: Vec::new(),
        };
        assert!(backend.reflect(&ctx).await.is_some());
    }
}
