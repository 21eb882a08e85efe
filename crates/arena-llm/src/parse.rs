//! Tolerant parsing of LLM replies into typed decisions.
//!
//! The model is asked for two lines (`ACTION:`, `REASON:`) but gets no
//! benefit of the doubt beyond that: verb matching is case-insensitive
//! with common synonyms, targets match by substring against the names
//! the agent can actually see, and unmatched verbs degrade to Explore
//! carrying the model's own reason. Only a reply with no `ACTION:`
//! line at all is a parse failure (which the backend turns into a
//! rule-based fallback).

use arena_core::agent::{PerceivedAgent, Relation};
use arena_core::decision::{Decision, DecisionContext, TargetRef};
use arena_types::DecisionKind;

use crate::error::LlmError;

/// Parse a raw model reply against the context it was asked about.
///
/// # Errors
///
/// Returns [`LlmError::Parse`] when no `ACTION:` line is present.
pub fn parse_decision(raw: &str, ctx: &DecisionContext) -> Result<Decision, LlmError> {
    let action_line = find_tagged_line(raw, "ACTION:")
        .ok_or_else(|| LlmError::Parse(format!("no ACTION line in: {}", raw.trim())))?;
    let reason = find_tagged_line(raw, "REASON:")
        .unwrap_or_else(|| String::from("no reason given"));

    let mut parts = action_line.split_whitespace();
    let verb = parts.next().unwrap_or("").to_lowercase();
    let target_text = parts.collect::<Vec<_>>().join(" ");

    let decision = match verb.as_str() {
        "attack" | "fight" | "kill" | "strike" => {
            match match_agent(&target_text, ctx, |a| a.relation != Relation::Ally) {
                Some(target) => Decision::new(
                    DecisionKind::Attack,
                    Some(TargetRef::Agent(target.id)),
                    reason,
                ),
                None => explore(reason),
            }
        }
        "flee" | "run" | "escape" | "retreat" | "hide" => {
            Decision::new(DecisionKind::Flee, None, reason)
        }
        "ally" | "befriend" | "team" | "alliance" => {
            match match_agent(&target_text, ctx, |a| a.relation == Relation::Neutral) {
                Some(target) => Decision::new(
                    DecisionKind::Ally,
                    Some(TargetRef::Agent(target.id)),
                    reason,
                ),
                None => explore(reason),
            }
        }
        "betray" => {
            match match_agent(&target_text, ctx, |a| a.relation == Relation::Ally) {
                Some(target) => Decision::new(
                    DecisionKind::Betray,
                    Some(TargetRef::Agent(target.id)),
                    reason,
                ),
                None => explore(reason),
            }
        }
        "loot" | "grab" | "take" | "pick" => match match_item(&target_text, ctx) {
            Some(item_id) => {
                Decision::new(DecisionKind::Loot, Some(TargetRef::Item(item_id)), reason)
            }
            None => explore(reason),
        },
        "rest" | "wait" | "recover" => Decision::new(DecisionKind::Rest, None, reason),
        "explore" | "move" | "scout" | "wander" => {
            Decision::new(DecisionKind::Explore, None, reason)
        }
        // Unknown verbs keep the model's reasoning but go nowhere new.
        _ => explore(reason),
    };

    Ok(decision)
}

fn explore(reason: String) -> Decision {
    Decision::new(DecisionKind::Explore, None, reason)
}

/// First line carrying the tag (case-insensitive), without the tag.
fn find_tagged_line(raw: &str, tag: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let trimmed = line.trim();
        let head = trimmed.get(..tag.len())?;
        if head.eq_ignore_ascii_case(tag) {
            Some(trimmed[tag.len()..].trim().to_owned())
        } else {
            None
        }
    })
}

/// Match a target by name substring among visible agents; with no (or
/// an unmatched) name, fall back to the closest agent the predicate
/// accepts. Visible agents are already sorted closest-first.
fn match_agent<'a>(
    target_text: &str,
    ctx: &'a DecisionContext,
    fallback: impl Fn(&PerceivedAgent) -> bool,
) -> Option<&'a PerceivedAgent> {
    let lower = target_text.to_lowercase();
    if !lower.is_empty()
        && let Some(agent) = ctx
            .perception
            .nearby_agents
            .iter()
            .find(|a| lower.contains(&a.name.to_lowercase()))
    {
        return Some(agent);
    }
    ctx.perception.nearby_agents.iter().find(|&a| fallback(a))
}

/// Match an item by kind substring, else take the first visible item.
fn match_item(target_text: &str, ctx: &DecisionContext) -> Option<arena_types::ItemId> {
    let lower = target_text.to_lowercase();
    ctx.perception
        .nearby_items
        .iter()
        .find(|item| !lower.is_empty() && lower.contains(&item.kind.to_lowercase()))
        .or_else(|| ctx.perception.nearby_items.first())
        .map(|item| item.id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use arena_core::agent::Perception;
    use arena_types::{AgentId, GamePhase, Item, ItemId, Waypoint, WorldStateView};

    use super::*;

    fn perceived(id: u32, name: &str, relation: Relation) -> PerceivedAgent {
        PerceivedAgent {
            id: AgentId(id),
            name: name.to_owned(),
            hp: 50,
            max_hp: 100,
            attack: 10,
            defense: 5,
            x: 1,
            y: 1,
            distance: 2,
            relation,
        }
    }

    fn make_ctx() -> DecisionContext {
        DecisionContext {
            agent_id: AgentId(0),
            name: String::from("Rex"),
            personality: String::from("aggressive"),
            hp: 80,
            max_hp: 100,
            attack: 12,
            defense: 5,
            x: 0,
            y: 0,
            perception: Perception {
                nearby_agents: vec![
                    perceived(1, "Vera", Relation::Neutral),
                    perceived(2, "Ivy", Relation::Ally),
                ],
                nearby_items: vec![Item {
                    id: ItemId(4),
                    x: 1,
                    y: 0,
                    kind: String::from("sword"),
                    bonus: 5,
                }],
            },
            world: WorldStateView {
                tick: 3,
                alive_count: 7,
                shrink_border: 20,
                phase: GamePhase::Running,
                zone_center: Waypoint::new(10, 10),
                winner: None,
            },
            recent_memories: Vec::new(),
            inner_voice: None,
        }
    }

    #[test]
    fn parses_attack_with_named_target() {
        let ctx = make_ctx();
        let decision =
            parse_decision("ACTION: Attack Vera\nREASON: she is weak", &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Attack);
        assert_eq!(decision.target, Some(TargetRef::Agent(AgentId(1))));
        assert_eq!(decision.reason.as_deref(), Some("she is weak"));
    }

    #[test]
    fn verb_matching_is_case_insensitive() {
        let ctx = make_ctx();
        let decision = parse_decision("action: FLEE\nreason: danger", &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Flee);
    }

    #[test]
    fn attack_without_name_picks_closest_non_ally() {
        let ctx = make_ctx();
        let decision = parse_decision("ACTION: attack\nREASON: go", &ctx).unwrap();
        assert_eq!(decision.target, Some(TargetRef::Agent(AgentId(1))));
    }

    #[test]
    fn betray_only_matches_allies() {
        let ctx = make_ctx();
        let decision = parse_decision("ACTION: betray Ivy\nREASON: opportunity", &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Betray);
        assert_eq!(decision.target, Some(TargetRef::Agent(AgentId(2))));
    }

    #[test]
    fn loot_matches_item_kind_substring() {
        let ctx = make_ctx();
        let decision =
            parse_decision("ACTION: loot the sword\nREASON: need it", &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Loot);
        assert_eq!(decision.target, Some(TargetRef::Item(ItemId(4))));
    }

    #[test]
    fn unknown_verb_falls_through_to_explore_with_reason() {
        let ctx = make_ctx();
        let decision =
            parse_decision("ACTION: meditate\nREASON: inner peace", &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Explore);
        assert_eq!(decision.reason.as_deref(), Some("inner peace"));
    }

    #[test]
    fn attack_with_nobody_visible_explores() {
        let mut ctx = make_ctx();
        ctx.perception.nearby_agents.clear();
        let decision = parse_decision("ACTION: attack Vera\nREASON: hunt", &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Explore);
    }

    #[test]
    fn missing_action_line_is_a_parse_error() {
        let ctx = make_ctx();
        assert!(parse_decision("I think I will rest now.", &ctx).is_err());
    }

    #[test]
    fn missing_reason_defaults() {
        let ctx = make_ctx();
        let decision = parse_decision("ACTION: rest", &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Rest);
        assert_eq!(decision.reason.as_deref(), Some("no reason given"));
    }

    #[test]
    fn tags_found_amid_chatter() {
        let ctx = make_ctx();
        let raw = "Let me think.\n  ACTION: flee\nSome rambling.\n  REASON: too risky\n";
        let decision = parse_decision(raw, &ctx).unwrap();
        assert_eq!(decision.kind, DecisionKind::Flee);
        assert_eq!(decision.reason.as_deref(), Some("too risky"));
    }
}
