use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, info};
use warpgate_shared::portal::{AgentId, GeometrySink, PortalColor};
use warpgate_shared::registry::PortalRegistry;

use crate::config::PortalConfig;
use crate::decoration::{BlockPalette, DecorationLoop, WorldGeometry};
use crate::detector::TeleportLoop;
use crate::host::{Host, Notice, NoticeColor};
use crate::listeners::{DisconnectListener, HostEvent, PortalGunListener};
use crate::portal_gun::{resolve_agent, PortalError, PortalGun, Shot};
use crate::status::{fallback_notice, placement_notice, portal_gun_help, status_notices};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    Only(PortalColor),
    All,
}

impl ClearTarget {
    pub fn parse(input: &str) -> Option<Self> {
        match input.to_ascii_lowercase().as_str() {
            "blue" => Some(Self::Only(PortalColor::Blue)),
            "orange" => Some(Self::Only(PortalColor::Orange)),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Owns the portal registry and everything wired to it.
pub struct PortalPlugin {
    config: PortalConfig,
    host: Host,
    registry: Arc<PortalRegistry>,
    gun: Arc<PortalGun>,
    gun_listener: PortalGunListener,
    disconnect_listener: DisconnectListener,
    teleports: TeleportLoop,
    decoration: DecorationLoop,
}

impl PortalPlugin {
    pub fn setup(config: PortalConfig, host: Host) -> Self {
        let geometry: Arc<dyn GeometrySink> = Arc::new(WorldGeometry::new(
            Arc::clone(&host.worlds),
            BlockPalette::from_config(&config),
        ));
        let registry = Arc::new(PortalRegistry::new(Arc::clone(&geometry)));
        let gun = Arc::new(PortalGun::new(Arc::clone(&registry), host.clone(), &config));
        let gun_listener = PortalGunListener::new(
            Arc::clone(&gun),
            Arc::clone(&host.notifier),
            config.portal_gun_item.clone(),
        );
        let disconnect_listener = DisconnectListener::new(Arc::clone(&registry));
        let teleports = TeleportLoop::new(
            Arc::clone(&registry),
            host.clone(),
            config.teleport_cooldown(),
            config.tick_interval(),
        );
        let decoration =
            DecorationLoop::new(Arc::clone(&registry), geometry, config.decoration_interval());

        info!("Portal plugin set up (gun item: {})", config.portal_gun_item);
        Self {
            config,
            host,
            registry,
            gun,
            gun_listener,
            disconnect_listener,
            teleports,
            decoration,
        }
    }

    pub fn start(&self) -> io::Result<()> {
        self.start_loops()?;
        info!("Portal plugin started");
        Ok(())
    }

    /// Stops both loops, then clears the registry and its world geometry.
    pub fn shutdown(&self) -> usize {
        self.stop_loops();
        let cleared = self.registry.clear_all();
        info!("Portal plugin shut down, cleared {cleared} portal(s)");
        cleared
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PortalRegistry> {
        &self.registry
    }

    pub fn gun(&self) -> &PortalGun {
        &self.gun
    }

    /// Starts whichever loops are not running. Returns whether any started.
    pub fn start_loops(&self) -> io::Result<bool> {
        let teleports = self.teleports.start()?;
        let decoration = self.decoration.start()?;
        Ok(teleports || decoration)
    }

    pub fn stop_loops(&self) -> bool {
        let teleports = self.teleports.stop();
        let decoration = self.decoration.stop();
        teleports || decoration
    }

    pub fn teleport_loop_running(&self) -> bool {
        self.teleports.is_running()
    }

    pub fn decoration_loop_running(&self) -> bool {
        self.decoration.is_running()
    }

    pub fn active_agent_count(&self) -> usize {
        self.registry.active_agent_count()
    }

    pub fn total_portal_count(&self) -> usize {
        self.registry.total_portal_count()
    }

    pub fn handle_event(&self, event: HostEvent) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| match &event {
            HostEvent::Interact {
                agent,
                action,
                item,
            } => {
                self.gun_listener.on_interact(*agent, *action, item.as_deref());
            }
            HostEvent::Disconnected { agent, name } => {
                self.disconnect_listener.on_disconnect(*agent, name);
            }
        }));
        if outcome.is_err() {
            error!("Handling {event:?} panicked");
        }
    }

    pub fn resolve_agent(&self, target: Option<&str>) -> Result<AgentId, PortalError> {
        resolve_agent(self.host.agents.as_ref(), target)
    }

    /// `/p1` and `/p2`: fire the gun on behalf of `target`.
    pub fn create_portal(&self, target: Option<&str>, color: PortalColor) -> Result<Shot, PortalError> {
        let agent = self.resolve_agent(target)?;
        let shot = self.gun.fire(agent, color)?;
        if !shot.placement.found_surface() {
            self.host.notifier.notify(agent, fallback_notice());
        }
        self.host.notifier.notify(agent, placement_notice(&shot));
        Ok(shot)
    }

    pub fn portal_status(&self, target: Option<&str>) -> Result<Vec<Notice>, PortalError> {
        let agent = self.resolve_agent(target)?;
        let pair = self.registry.get_portal_pair(agent);
        let viewer = self.host.agents.agent(agent).map(|view| view.position);
        let lines = status_notices(pair.as_ref(), viewer);
        self.host.notify_all(agent, lines.clone());
        Ok(lines)
    }

    pub fn show_portal_gun_help(&self, target: Option<&str>) -> Result<AgentId, PortalError> {
        let agent = self.resolve_agent(target)?;
        self.host
            .notify_all(agent, portal_gun_help(&self.config.portal_gun_item));
        Ok(agent)
    }

    pub fn clear_portals(
        &self,
        target: Option<&str>,
        which: ClearTarget,
    ) -> Result<usize, PortalError> {
        let agent = self.resolve_agent(target)?;
        let removed = match which {
            ClearTarget::All => self.registry.remove_all_portals(agent),
            ClearTarget::Only(color) => {
                usize::from(self.registry.remove_portal(agent, color).is_some())
            }
        };
        let text = match removed {
            0 => "No portals to clear".to_string(),
            1 => "Cleared 1 portal".to_string(),
            n => format!("Cleared {n} portals"),
        };
        self.host
            .notifier
            .notify(agent, Notice::new(text, NoticeColor::Gray));
        Ok(removed)
    }

    pub fn summary(&self) -> Vec<String> {
        let state = |running: bool| if running { "running" } else { "stopped" };
        vec![
            format!(
                "{} portal(s) owned by {} player(s)",
                self.total_portal_count(),
                self.active_agent_count()
            ),
            format!("Teleport detection: {}", state(self.teleport_loop_running())),
            format!("Decoration: {}", state(self.decoration_loop_running())),
        ]
    }
}
