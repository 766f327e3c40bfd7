// Agent parameter lookup
// Agents ask for their oscillator parameters with "REQUEST_PARAM,agent=<id>"
// and get "PARAM,omega=..,kappa=..,alpha=.." or "ERROR, <message>" back.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sample::AgentId;

const REQUEST_PREFIX: &str = "REQUEST_PARAM";

/// Oscillator parameters handed to one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentParams {
    pub omega: f64,
    pub kappa: f64,
    pub alpha: f64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    #[error("agent id not found")]
    MissingAgent,
    #[error("invalid agent id {0:?}")]
    InvalidAgent(String),
}

/// Static table of per-agent parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamTable {
    agents: BTreeMap<AgentId, AgentParams>,
}

impl Default for ParamTable {
    // Agents are tuned against 3.14, not PI.
    #[allow(clippy::approx_constant)]
    fn default() -> Self {
        let mut agents = BTreeMap::new();
        agents.insert(1, AgentParams { omega: 3.14 * 6.2, kappa: 1.0, alpha: 0.5 });
        agents.insert(2, AgentParams { omega: 3.14 * 6.0, kappa: 1.0, alpha: 0.6 });
        agents.insert(3, AgentParams { omega: 3.14 * 6.0, kappa: 1.0, alpha: 0.7 });
        agents.insert(4, AgentParams { omega: 3.14 * 5.9, kappa: 1.0, alpha: 0.8 });
        ParamTable { agents }
    }
}

impl ParamTable {
    pub fn new(agents: BTreeMap<AgentId, AgentParams>) -> Self {
        ParamTable { agents }
    }

    /// Load a table from a JSON object keyed by agent id.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn get(&self, agent_id: AgentId) -> Option<&AgentParams> {
        self.agents.get(&agent_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Build the reply for one request datagram. None if it is not a parameter request.
    pub fn respond(&self, request: &str) -> Option<String> {
        let request = request.trim();
        if !request.starts_with(REQUEST_PREFIX) {
            return None;
        }
        let reply = match parse_request(request) {
            Err(e) => format!("ERROR, invalid request: {}", e),
            Ok(agent_id) => match self.get(agent_id) {
                Some(p) => format!("PARAM,omega={:?},kappa={:?},alpha={:?}", p.omega, p.kappa, p.alpha),
                None => format!("ERROR, unknown agent id {}", agent_id),
            },
        };
        Some(reply)
    }
}

/// Extract the agent id from the first `agent=` field of a request.
pub fn parse_request(request: &str) -> std::result::Result<AgentId, RequestError> {
    let value = request
        .split(',')
        .find_map(|part| part.trim().strip_prefix("agent="))
        .ok_or(RequestError::MissingAgent)?;
    value
        .trim()
        .parse()
        .map_err(|_| RequestError::InvalidAgent(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_agent() {
        let table = ParamTable::default();
        let reply = table.respond("REQUEST_PARAM,agent=2").unwrap();
        let omega = table.get(2).unwrap().omega;
        assert_eq!(reply, format!("PARAM,omega={:?},kappa=1.0,alpha=0.6", omega));
    }

    #[test]
    fn test_unknown_agent() {
        let table = ParamTable::default();
        assert_eq!(
            table.respond("REQUEST_PARAM,agent=42\n").unwrap(),
            "ERROR, unknown agent id 42"
        );
    }

    #[test]
    fn test_malformed_requests() {
        let table = ParamTable::default();
        assert_eq!(
            table.respond("REQUEST_PARAM").unwrap(),
            "ERROR, invalid request: agent id not found"
        );
        assert!(table
            .respond("REQUEST_PARAM,agent=two")
            .unwrap()
            .starts_with("ERROR, invalid request"));
        assert_eq!(table.respond("HELLO"), None);
    }

    #[test]
    fn test_parse_request() {
        assert_eq!(parse_request("REQUEST_PARAM,foo=1,agent=3"), Ok(3));
        assert_eq!(parse_request("REQUEST_PARAM"), Err(RequestError::MissingAgent));
    }

    #[test]
    fn test_table_from_json() {
        let table: ParamTable =
            serde_json::from_str(r#"{"7": {"omega": 1.0, "kappa": 2.0, "alpha": 0.25}}"#).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.respond("REQUEST_PARAM,agent=7").unwrap(), "PARAM,omega=1.0,kappa=2.0,alpha=0.25");
    }
}
