//! Agents of a project (group): monitoring, backup and automation.

use serde::{Deserialize, Serialize};

use crate::client::{RequestDoer, NO_BODY};
use crate::context::Context;
use crate::error::Error;
use crate::http::{HttpMethod, Response};
use crate::types::Paginated;

/// One agent process as reported by ops manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Agent {
    pub type_name: String,
    pub hostname: String,
    pub conf_count: i64,
    pub last_conf: String,
    pub state_name: String,
    pub ping_count: i64,
    pub is_managed: bool,
    pub last_ping: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

pub type Agents = Paginated<Agent>;

pub struct AgentsService<'a, D> {
    client: &'a D,
}

impl<'a, D: RequestDoer> AgentsService<'a, D> {
    pub fn new(client: &'a D) -> Self {
        Self { client }
    }

    /// Links to the agents of each type in the group; `results` is empty.
    ///
    /// `GET groups/{group_id}/agents`
    pub fn list_agent_links(&self, ctx: &Context, group_id: &str) -> Result<(Agents, Response), Error> {
        if group_id.is_empty() {
            return Err(Error::argument("group_id"));
        }
        let path = format!("groups/{group_id}/agents");
        let req = self.client.new_request(HttpMethod::Get, &path, NO_BODY)?;
        self.client.execute_json(ctx, &req)
    }

    /// Agents of one type, e.g. `MONITORING`, `BACKUP` or `AUTOMATION`.
    ///
    /// `GET groups/{group_id}/agents/{agent_type}`
    pub fn list_agents_by_type(
        &self,
        ctx: &Context,
        group_id: &str,
        agent_type: &str,
    ) -> Result<(Agents, Response), Error> {
        if group_id.is_empty() {
            return Err(Error::argument("group_id"));
        }
        if agent_type.is_empty() {
            return Err(Error::argument("agent_type"));
        }
        let path = format!("groups/{group_id}/agents/{agent_type}");
        let req = self.client.new_request(HttpMethod::Get, &path, NO_BODY)?;
        self.client.execute_json(ctx, &req)
    }
}
