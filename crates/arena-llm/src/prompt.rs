//! Prompt rendering for decisions and reflections.
//!
//! Templates are embedded in the binary and compiled once at backend
//! construction. The decision context is fed to `minijinja` through
//! its `serde` integration, so the template sees exactly the fields
//! the rule backend sees.

use arena_core::decision::{DecisionContext, ReflectionContext};
use minijinja::Environment;

use crate::error::LlmError;

/// System template for decisions.
const DECISION_SYSTEM: &str = "\
You are {{ name }}, a {{ personality }} combatant in a battle-royale arena \
watched by a live audience. One action per turn. Reply with exactly two lines:
ACTION: <attack|flee|ally|betray|loot|explore|rest> [target name or item]
REASON: <one short sentence>";

/// User template for decisions.
const DECISION_USER: &str = "\
Tick {{ world.tick }}: {{ world.alive_count }} fighters remain and the safe \
zone is {{ world.shrink_border }} tiles wide.
Your status: hp {{ hp }}/{{ max_hp }}, attack {{ attack }}, defense {{ defense }}, \
position ({{ x }}, {{ y }}).
{% if perception.nearby_agents -%}
You can see:
{% for a in perception.nearby_agents -%}
- {{ a.name }} ({{ a.relation }}), hp {{ a.hp }}/{{ a.max_hp }}, distance {{ a.distance }}
{% endfor -%}
{% else -%}
Nobody is in sight.
{% endif -%}
{% if perception.nearby_items -%}
On the ground:
{% for item in perception.nearby_items -%}
- {{ item.kind }} (+{{ item.bonus }} attack)
{% endfor -%}
{% endif -%}
{% if recent_memories -%}
You remember:
{% for m in recent_memories -%}
- {{ m }}
{% endfor -%}
{% endif -%}
{% if inner_voice -%}
The crowd whispers: \"{{ inner_voice }}\"
{% endif -%}
What do you do?";

/// System template for reflections.
const REFLECTION_SYSTEM: &str = "\
You are {{ name }}, a {{ personality }} combatant in a battle-royale arena. \
Look back over your recent experiences and reply with a single sentence of \
reflection, or the single word NONE if nothing stands out.";

/// User template for reflections.
const REFLECTION_USER: &str = "\
Your status: hp {{ hp }}/{{ max_hp }}.
{% if recent_memories -%}
Recent experiences:
{% for m in recent_memories -%}
- {{ m }}
{% endfor -%}
{% else -%}
Nothing notable has happened.
{% endif %}";

/// A rendered prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// Compiled template environment.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    /// Compile the embedded templates.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] if a template fails to compile
    /// (a programming error caught at startup, not at decision time).
    pub fn new() -> Result<Self, LlmError> {
        let mut env = Environment::new();
        env.add_template("decision_system", DECISION_SYSTEM)?;
        env.add_template("decision_user", DECISION_USER)?;
        env.add_template("reflection_system", REFLECTION_SYSTEM)?;
        env.add_template("reflection_user", REFLECTION_USER)?;
        Ok(Self { env })
    }

    /// Render the decision prompt for one agent context.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on render failure.
    pub fn render_decision(&self, ctx: &DecisionContext) -> Result<RenderedPrompt, LlmError> {
        Ok(RenderedPrompt {
            system: self.env.get_template("decision_system")?.render(ctx)?,
            user: self.env.get_template("decision_user")?.render(ctx)?,
        })
    }

    /// Render the reflection prompt for one agent context.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Template`] on render failure.
    pub fn render_reflection(&self, ctx: &ReflectionContext) -> Result<RenderedPrompt, LlmError> {
        Ok(RenderedPrompt {
            system: self.env.get_template("reflection_system")?.render(ctx)?,
            user: self.env.get_template("reflection_user")?.render(ctx)?,
        })
    }
}
