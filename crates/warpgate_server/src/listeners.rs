use std::sync::Arc;

use tracing::{debug, info, warn};
use warpgate_shared::portal::{AgentId, Portal, PortalColor};
use warpgate_shared::registry::PortalRegistry;

use crate::host::{Notice, NoticeColor, Notifier};
use crate::portal_gun::PortalGun;
use crate::status::placement_notice;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InteractAction {
    /// Left click.
    Primary,
    /// Right click.
    Secondary,
    Use,
}

/// Host events routed to the plugin.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Interact {
        agent: AgentId,
        action: InteractAction,
        item: Option<String>,
    },
    Disconnected {
        agent: AgentId,
        name: String,
    },
}

/// Fires the portal gun when an agent clicks while holding it.
pub struct PortalGunListener {
    gun: Arc<PortalGun>,
    notifier: Arc<dyn Notifier>,
    item: String,
}

impl PortalGunListener {
    pub fn new(gun: Arc<PortalGun>, notifier: Arc<dyn Notifier>, item: impl Into<String>) -> Self {
        Self {
            gun,
            notifier,
            item: item.into(),
        }
    }

    pub fn color_for(action: InteractAction) -> Option<PortalColor> {
        match action {
            InteractAction::Primary => Some(PortalColor::Blue),
            InteractAction::Secondary => Some(PortalColor::Orange),
            InteractAction::Use => None,
        }
    }

    pub fn on_interact(
        &self,
        agent: AgentId,
        action: InteractAction,
        item: Option<&str>,
    ) -> Option<Arc<Portal>> {
        if item != Some(self.item.as_str()) {
            return None;
        }
        let color = Self::color_for(action)?;

        match self.gun.fire(agent, color) {
            Ok(shot) => {
                self.notifier.notify(agent, placement_notice(&shot));
                Some(shot.created.portal)
            }
            Err(err) => {
                warn!("Portal gun shot by {agent} failed: {err}");
                self.notifier
                    .notify(agent, Notice::new(err.to_string(), NoticeColor::Red));
                None
            }
        }
    }
}

/// Drops a departing agent's portals.
pub struct DisconnectListener {
    registry: Arc<PortalRegistry>,
}

impl DisconnectListener {
    pub fn new(registry: Arc<PortalRegistry>) -> Self {
        Self { registry }
    }

    pub fn on_disconnect(&self, agent: AgentId, name: &str) -> usize {
        let removed = self.registry.remove_all_portals(agent);
        if removed > 0 {
            info!("Removed {removed} portal(s) of disconnected player {name}");
        } else {
            debug!("{name} disconnected without portals");
        }
        removed
    }
}
