//! Minimal robots.txt parsing for the polite fetch path.
//!
//! Only the subset the pipeline enforces: per-agent allow/disallow
//! prefixes, with `Allow` taking precedence. Unknown directives are
//! ignored. An empty or unparseable file allows everything, which is
//! also the fail-open behavior when the robots fetch itself fails.

use std::collections::HashMap;

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default)]
pub struct RobotsPolicy {
    /// Rules per lowercased user-agent token.
    rules: HashMap<String, AgentRules>,

    /// Rules for the `*` wildcard agent.
    default_rules: AgentRules,
}

#[derive(Debug, Clone, Default)]
struct AgentRules {
    disallow: Vec<String>,
    allow: Vec<String>,
}

impl RobotsPolicy {
    /// Parse robots.txt content.
    pub fn parse(content: &str) -> Self {
        let mut policy = Self::default();
        let mut current_agents: Vec<String> = Vec::new();
        let mut current_rules = AgentRules::default();
        let mut in_rule_block = false;

        for line in content.lines() {
            // Strip inline comments, then surrounding whitespace.
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group.
                    if in_rule_block {
                        policy.flush_group(&mut current_agents, &mut current_rules);
                        in_rule_block = false;
                    }
                    current_agents.push(value.to_lowercase());
                }
                "disallow" => {
                    in_rule_block = true;
                    if !value.is_empty() {
                        current_rules.disallow.push(value.to_string());
                    }
                }
                "allow" => {
                    in_rule_block = true;
                    if !value.is_empty() {
                        current_rules.allow.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        policy.flush_group(&mut current_agents, &mut current_rules);
        policy
    }

    fn flush_group(&mut self, agents: &mut Vec<String>, rules: &mut AgentRules) {
        for agent in agents.drain(..) {
            if agent == "*" {
                self.default_rules = rules.clone();
            } else {
                self.rules.insert(agent, rules.clone());
            }
        }
        *rules = AgentRules::default();
    }

    /// Whether `user_agent` may fetch `path`.
    pub fn allows(&self, user_agent: &str, path: &str) -> bool {
        let agent_lower = user_agent.to_lowercase();

        let rules = self
            .rules
            .iter()
            .find(|(token, _)| agent_lower.contains(token.as_str()))
            .map(|(_, rules)| rules)
            .unwrap_or(&self.default_rules);

        for allow in &rules.allow {
            if path.starts_with(allow.as_str()) {
                return true;
            }
        }

        for disallow in &rules.disallow {
            if disallow == "/" || path.starts_with(disallow.as_str()) {
                return false;
            }
        }

        true
    }
}
