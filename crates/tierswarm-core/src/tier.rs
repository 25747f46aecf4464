// ABOUTME: Tier and agent role definitions, plus roster construction per tier.
// ABOUTME: Higher tiers are strict supersets of lower ones, in fixed roster order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Size of the specialist roster dispatched for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Minimum,
    Medium,
    Full,
}

impl Tier {
    pub fn agent_count(self) -> usize {
        match self {
            Tier::Minimum => 2,
            Tier::Medium => 4,
            Tier::Full => 8,
        }
    }

    /// The ordered roster for this tier, each spec carrying the given turn budget.
    pub fn roster(self, max_turns: usize) -> Vec<AgentSpec> {
        AgentRole::ALL
            .iter()
            .take(self.agent_count())
            .map(|role| AgentSpec::new(*role, max_turns))
            .collect()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Minimum => "minimum",
            Tier::Medium => "medium",
            Tier::Full => "full",
        };
        write!(f, "{name} ({} agents)", self.agent_count())
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2" | "min" | "minimum" => Ok(Tier::Minimum),
            "4" | "med" | "medium" => Ok(Tier::Medium),
            "8" | "full" => Ok(Tier::Full),
            other => Err(CoreError::UnknownTier(other.to_string())),
        }
    }
}

/// The specialist roles, in roster order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Researcher,
    Planner,
    Coder,
    Tester,
    Optimizer,
    Security,
    Integrator,
    Qa,
}

impl AgentRole {
    pub const ALL: [AgentRole; 8] = [
        AgentRole::Researcher,
        AgentRole::Planner,
        AgentRole::Coder,
        AgentRole::Tester,
        AgentRole::Optimizer,
        AgentRole::Security,
        AgentRole::Integrator,
        AgentRole::Qa,
    ];

    /// Short lowercase label used in agent ids and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::Researcher => "researcher",
            AgentRole::Planner => "planner",
            AgentRole::Coder => "coder",
            AgentRole::Tester => "tester",
            AgentRole::Optimizer => "optimizer",
            AgentRole::Security => "security",
            AgentRole::Integrator => "integrator",
            AgentRole::Qa => "qa",
        }
    }

    /// Display name used in prompts and in the verifier's peer sections.
    pub fn title(&self) -> &'static str {
        match self {
            AgentRole::Researcher => "Researcher",
            AgentRole::Planner => "Planner",
            AgentRole::Coder => "Coder",
            AgentRole::Tester => "Tester",
            AgentRole::Optimizer => "Optimizer",
            AgentRole::Security => "Security",
            AgentRole::Integrator => "Integrator",
            AgentRole::Qa => "QA",
        }
    }

    /// The role's specialty, spliced into its system prompt.
    pub fn focus(&self) -> &'static str {
        match self {
            AgentRole::Researcher => {
                "Deep research, facts, references, vulnerability analysis, documentation lookup"
            }
            AgentRole::Planner => {
                "Architecture planning, steps, edge cases, project structure, dependencies"
            }
            AgentRole::Coder => "Code generation, scripts, implementations, algorithms",
            AgentRole::Tester => "Testing and QA, edge cases, adversarial testing, validation",
            AgentRole::Optimizer => "Performance, efficiency, complexity reduction, caching",
            AgentRole::Security => "Security audit, hardening, safe defaults",
            AgentRole::Integrator => "Merging components, resolving conflicts, compatibility",
            AgentRole::Qa => "Documentation, polish, completeness, standards compliance",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One roster entry: which role runs, with what specialty and turn budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: AgentRole,
    pub focus: String,
    pub max_turns: usize,
}

impl AgentSpec {
    pub fn new(role: AgentRole, max_turns: usize) -> Self {
        Self {
            role,
            focus: role.focus().to_string(),
            max_turns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_sizes_match_tier() {
        assert_eq!(Tier::Minimum.roster(5).len(), 2);
        assert_eq!(Tier::Medium.roster(5).len(), 4);
        assert_eq!(Tier::Full.roster(5).len(), 8);
    }

    #[test]
    fn higher_tiers_are_supersets() {
        let min = Tier::Minimum.roster(3);
        let med = Tier::Medium.roster(3);
        let full = Tier::Full.roster(3);

        assert_eq!(&med[..min.len()], &min[..]);
        assert_eq!(&full[..med.len()], &med[..]);
        assert_eq!(full.last().map(|s| s.role), Some(AgentRole::Qa));
    }

    #[test]
    fn roster_carries_turn_budget_and_focus() {
        let roster = Tier::Minimum.roster(7);
        assert!(roster.iter().all(|s| s.max_turns == 7));
        assert_eq!(roster[0].role, AgentRole::Researcher);
        assert_eq!(roster[0].focus, AgentRole::Researcher.focus());
    }

    #[test]
    fn parses_counts_and_names() {
        assert_eq!("2".parse::<Tier>().unwrap(), Tier::Minimum);
        assert_eq!("Medium".parse::<Tier>().unwrap(), Tier::Medium);
        assert_eq!(" full ".parse::<Tier>().unwrap(), Tier::Full);
        assert_eq!("8".parse::<Tier>().unwrap(), Tier::Full);
        assert!(matches!(
            "16".parse::<Tier>(),
            Err(CoreError::UnknownTier(s)) if s == "16"
        ));
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<&str> = AgentRole::ALL.iter().map(|r| r.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 8);
    }
}
