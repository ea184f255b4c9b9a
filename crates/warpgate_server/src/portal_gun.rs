use std::sync::Arc;
use std::time::Duration;

use glam::DVec3;
use thiserror::Error;
use tracing::{info, warn};
use warpgate_shared::placement::{compute_placement, Placement};
use warpgate_shared::portal::{AgentId, Portal, PortalColor};
use warpgate_shared::registry::PortalRegistry;

use crate::config::PortalConfig;
use crate::host::{AgentDirectory, Host};

#[derive(Debug, Error, PartialEq)]
pub enum PortalError {
    #[error("No players connected")]
    NoAgents,
    #[error("Player '{0}' not found")]
    UnknownAgent(String),
    #[error("World '{0}' is not available")]
    WorldUnavailable(String),
}

/// Result of storing a portal in the registry.
#[derive(Debug, Clone)]
pub struct CreatedPortal {
    pub portal: Arc<Portal>,
    /// Same-color portal this one replaced; already released.
    pub replaced: Option<Arc<Portal>>,
}

#[derive(Debug, Clone)]
pub struct Shot {
    pub placement: Placement,
    pub created: CreatedPortal,
}

/// Creates portals where agents are looking.
pub struct PortalGun {
    registry: Arc<PortalRegistry>,
    host: Host,
    max_distance: f64,
    raycast_timeout: Duration,
    fallback_distance: i32,
}

impl PortalGun {
    pub fn new(registry: Arc<PortalRegistry>, host: Host, config: &PortalConfig) -> Self {
        Self {
            registry,
            host,
            max_distance: config.max_raycast_distance,
            raycast_timeout: config.raycast_timeout(),
            fallback_distance: config.fallback_forward_distance,
        }
    }

    /// Raycasts from `agent`'s eye and places a `color` portal on the surface
    /// it hits, or in front of the agent when nothing is hit in range.
    ///
    /// Blocks for at most the configured raycast timeout; a timeout counts as
    /// a miss.
    pub fn fire(&self, agent: AgentId, color: PortalColor) -> Result<Shot, PortalError> {
        let view = self
            .host
            .agents
            .agent(agent)
            .ok_or_else(|| PortalError::UnknownAgent(agent.to_string()))?;
        let world = self
            .host
            .worlds
            .world(&view.world)
            .ok_or_else(|| PortalError::WorldUnavailable(view.world.clone()))?;

        let max_distance = self.max_distance;
        let hit = match world.execute_and_wait(
            move |access| access.raycast_from_agent(agent, max_distance),
            self.raycast_timeout,
        ) {
            Some(hit) => hit,
            None => {
                warn!("Raycast for {agent} timed out, using fallback placement");
                None
            }
        };

        let placement = compute_placement(hit, view.position, view.look.yaw, self.fallback_distance);
        let created = self.place_at(agent, color, placement.anchor, placement.yaw, &view.world);
        Ok(Shot { placement, created })
    }

    /// Creates or replaces `owner`'s `color` portal at an explicit spot.
    pub fn place_at(
        &self,
        owner: AgentId,
        color: PortalColor,
        anchor: DVec3,
        yaw: f32,
        world: &str,
    ) -> CreatedPortal {
        let portal = Arc::new(Portal::new(owner, color, anchor, yaw, world));
        let replaced = self.registry.set_portal(Arc::clone(&portal));
        info!("Created {portal}");
        CreatedPortal { portal, replaced }
    }
}

/// Picks the named agent, or the lowest-id connected agent when no name is
/// given. Numeric names are tried as agent ids first.
pub fn resolve_agent(
    agents: &dyn AgentDirectory,
    target: Option<&str>,
) -> Result<AgentId, PortalError> {
    let Some(target) = target else {
        return agents
            .connected_agents()
            .into_iter()
            .min()
            .ok_or(PortalError::NoAgents);
    };

    if let Ok(raw) = target.parse::<u64>() {
        let id = AgentId(raw);
        if agents.agent(id).is_some() {
            return Ok(id);
        }
    }
    agents
        .find_by_name(target)
        .ok_or_else(|| PortalError::UnknownAgent(target.to_string()))
}
