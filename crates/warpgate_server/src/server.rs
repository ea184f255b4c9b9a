use std::io::{self, BufRead};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{DVec3, IVec3};
use rayon::ThreadPoolBuildError;
use thiserror::Error;
use tracing::{error, info, warn};
use warpgate_core::events::{self, EventReceiver, EventSender};

use crate::commands::{self, Command, LoopAction};
use crate::config::{PortalConfig, ServerConfig};
use crate::host::{Host, Look};
use crate::listeners::HostEvent;
use crate::plugin::PortalPlugin;
use crate::world::{SimWorld, Universe};

const TICK_RATE: u32 = 20;
const TICK_DURATION: Duration = Duration::from_millis(1000 / TICK_RATE as u64);
const SPAWN_POSITION: DVec3 = DVec3::new(0.5, 64.0, 0.5);
const SPAWN_BLOCK: &str = "Rock_Stone";
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to start world thread: {0}")]
    WorldThread(#[from] ThreadPoolBuildError),
    #[error("failed to start portal loops: {0}")]
    Loops(#[from] io::Error),
}

pub struct Server {
    config: ServerConfig,
    universe: Arc<Universe>,
    plugin: PortalPlugin,
    event_tx: EventSender<HostEvent>,
    event_rx: EventReceiver<HostEvent>,
    command_rx: EventReceiver<Command>,
    running: Arc<AtomicBool>,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        portal_config: PortalConfig,
        running: Arc<AtomicBool>,
        command_rx: EventReceiver<Command>,
    ) -> Result<Self, ServerError> {
        let universe = Arc::new(Universe::new(config.min_y, config.max_y));
        let world = universe.create_world(&config.world_name)?;
        build_spawn_area(&world);

        let plugin = PortalPlugin::setup(portal_config, Host::from_shared(Arc::clone(&universe)));
        let (event_tx, event_rx) = events::channel();
        Ok(Self {
            config,
            universe,
            plugin,
            event_tx,
            event_rx,
            command_rx,
            running,
        })
    }

    pub fn run(&mut self) -> Result<(), ServerError> {
        info!(
            "Starting Warpgate host (world: {}, config: {})",
            self.config.world_name,
            self.config.config_path.display()
        );
        self.plugin.start()?;

        while self.running.load(Ordering::SeqCst) {
            let tick_start = Instant::now();

            self.handle_console_commands();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.handle_events();
            // Notices were already logged on delivery.
            self.universe.take_notices();

            let elapsed = tick_start.elapsed();
            if elapsed < TICK_DURATION {
                std::thread::sleep(TICK_DURATION - elapsed);
            }
        }

        self.disconnect_all_players();
        self.handle_events();
        info!("Server shutting down, clearing portals...");
        self.plugin.shutdown();
        if !self.universe.flush_worlds(SHUTDOWN_FLUSH_TIMEOUT) {
            warn!("World jobs did not drain within {SHUTDOWN_FLUSH_TIMEOUT:?}");
        }
        info!("Goodbye!");
        Ok(())
    }

    fn handle_console_commands(&self) {
        for command in self.command_rx.drain() {
            let label = format!("{command:?}");
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| self.execute_console_command(command)));
            if outcome.is_err() {
                error!("[CONSOLE] handler for {label} panicked");
            }
        }
    }

    fn handle_events(&self) {
        for event in self.event_rx.drain() {
            self.plugin.handle_event(event);
        }
    }

    fn execute_console_command(&self, command: Command) {
        match command {
            Command::Noop => {}
            Command::Stop => self.request_shutdown("console /stop"),
            Command::List => self.log_player_list(),
            Command::Help => self.log_help(),
            Command::Join { name, world } => {
                let world = world.unwrap_or_else(|| self.config.world_name.clone());
                match self.universe.join(&name, &world, SPAWN_POSITION) {
                    Ok(id) => info!("[CONSOLE] {name} joined '{world}' (id {})", id.0),
                    Err(err) => warn!("[CONSOLE] /join failed: {err}"),
                }
            }
            Command::Leave(target) => match self.plugin.resolve_agent(Some(&target)) {
                Ok(agent) => {
                    if let Some(player) = self.universe.leave(agent) {
                        self.queue_event(HostEvent::Disconnected {
                            agent,
                            name: player.username,
                        });
                    }
                }
                Err(err) => warn!("[CONSOLE] /leave failed: {err}"),
            },
            Command::Teleport { player, x, y, z } => {
                let moved = self.plugin.resolve_agent(Some(&player)).map(|agent| {
                    self.universe
                        .set_position(agent, DVec3::new(x, y, z))
                        .map(|()| agent)
                });
                match moved {
                    Ok(Ok(agent)) => info!("[CONSOLE] moved {player} ({agent}) to [{x}, {y}, {z}]"),
                    Ok(Err(err)) => warn!("[CONSOLE] /tp failed: {err}"),
                    Err(err) => warn!("[CONSOLE] /tp failed: {err}"),
                }
            }
            Command::Look { player, yaw, pitch } => match self.plugin.resolve_agent(Some(&player)) {
                Ok(agent) => {
                    if let Err(err) = self.universe.set_look(agent, Look { yaw, pitch }) {
                        warn!("[CONSOLE] /look failed: {err}");
                    }
                }
                Err(err) => warn!("[CONSOLE] /look failed: {err}"),
            },
            Command::Use { player, action } => match self.plugin.resolve_agent(Some(&player)) {
                Ok(agent) => {
                    let item = self
                        .universe
                        .player(agent)
                        .and_then(|player| player.held_item);
                    self.queue_event(HostEvent::Interact {
                        agent,
                        action,
                        item,
                    });
                }
                Err(err) => warn!("[CONSOLE] /use failed: {err}"),
            },
            Command::PlacePortal { color, player } => {
                match self.plugin.create_portal(player.as_deref(), color) {
                    Ok(shot) => {
                        info!("[CONSOLE] created {}", shot.created.portal);
                        if let Some(replaced) = &shot.created.replaced {
                            info!("[CONSOLE] replaced {replaced}");
                        }
                    }
                    Err(err) => warn!("[CONSOLE] {err}"),
                }
            }
            Command::PortalStatus(player) => {
                if let Err(err) = self.plugin.portal_status(player.as_deref()) {
                    warn!("[CONSOLE] {err}");
                }
            }
            Command::PortalGun(player) => match self.plugin.show_portal_gun_help(player.as_deref()) {
                Ok(agent) => {
                    let item = &self.plugin.config().portal_gun_item;
                    match self.universe.give(agent, item) {
                        Ok(()) => info!("[CONSOLE] gave {item} to {agent}"),
                        Err(err) => warn!("[CONSOLE] /portalgun failed: {err}"),
                    }
                }
                Err(err) => warn!("[CONSOLE] {err}"),
            },
            Command::PortalClear { player, target } => {
                match self.plugin.clear_portals(player.as_deref(), target) {
                    Ok(removed) => info!("[CONSOLE] cleared {removed} portal(s)"),
                    Err(err) => warn!("[CONSOLE] {err}"),
                }
            }
            Command::Portals => {
                for line in self.plugin.summary() {
                    info!("[CONSOLE] {line}");
                }
            }
            Command::Loops(LoopAction::Start) => match self.plugin.start_loops() {
                Ok(true) => info!("[CONSOLE] portal loops started"),
                Ok(false) => info!("[CONSOLE] portal loops already running"),
                Err(err) => warn!("[CONSOLE] failed to start portal loops: {err}"),
            },
            Command::Loops(LoopAction::Stop) => {
                if self.plugin.stop_loops() {
                    info!("[CONSOLE] portal loops stopped");
                } else {
                    info!("[CONSOLE] portal loops were not running");
                }
            }
            Command::InvalidUsage(message) => warn!("[CONSOLE] {message}"),
            Command::Unknown(input) => {
                warn!("[CONSOLE] unknown command '{input}' (try /help)")
            }
        }
    }

    fn queue_event(&self, event: HostEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("Host event queue is closed");
        }
    }

    fn request_shutdown(&self, source: &str) {
        info!("Shutdown requested via {source}");
        self.running.store(false, Ordering::SeqCst);
    }

    fn disconnect_all_players(&self) {
        let players = self.universe.players();
        if players.is_empty() {
            return;
        }

        info!("Disconnecting {} connected player(s)", players.len());
        for player in players {
            if self.universe.leave(player.id).is_some() {
                self.queue_event(HostEvent::Disconnected {
                    agent: player.id,
                    name: player.username,
                });
            }
        }
    }

    fn log_player_list(&self) {
        info!("[CONSOLE] worlds: {}", self.universe.world_names().join(", "));
        let players = self.universe.players();
        if players.is_empty() {
            info!("[CONSOLE] no connected players");
            return;
        }

        info!("[CONSOLE] connected players ({}):", players.len());
        for player in players {
            info!(
                "[CONSOLE] - {} (id: {}) in '{}' at [{:.1}, {:.1}, {:.1}]",
                player.username,
                player.id.0,
                player.world,
                player.position.x,
                player.position.y,
                player.position.z
            );
        }
    }

    fn log_help(&self) {
        info!("[CONSOLE] Available commands:");
        info!("[CONSOLE]   /help");
        info!("[CONSOLE]   /list");
        info!("[CONSOLE]   /join <name> [world]");
        info!("[CONSOLE]   /leave <player|id>");
        info!("[CONSOLE]   /tp <player|id> <x> <y> <z>");
        info!("[CONSOLE]   /look <player|id> <yaw> [pitch]");
        info!("[CONSOLE]   /use <player|id> <left|right|use>");
        info!("[CONSOLE]   /p1 [player], /p2 [player]");
        info!("[CONSOLE]   /portalstatus [player] (alias /pstatus)");
        info!("[CONSOLE]   /portalgun [player]");
        info!("[CONSOLE]   /portalclear [player] [blue|orange|all]");
        info!("[CONSOLE]   /portals");
        info!("[CONSOLE]   /loops <start|stop>");
        info!("[CONSOLE]   /stop");
    }
}

/// A stone floor under spawn and a wall in front of it to shoot at.
fn build_spawn_area(world: &SimWorld) {
    world.fill(IVec3::new(-16, 63, -16), IVec3::new(16, 63, 16), SPAWN_BLOCK);
    world.fill(IVec3::new(-8, 64, 12), IVec3::new(8, 72, 12), SPAWN_BLOCK);
    let blocks = world.with_state(|state| state.block_count());
    info!("Spawn area ready ({blocks} blocks)");
}

pub fn run(
    config: ServerConfig,
    portal_config: PortalConfig,
    running: Arc<AtomicBool>,
) -> Result<(), ServerError> {
    let (command_tx, command_rx) = events::channel();
    spawn_console_command_thread(command_tx);

    let mut server = Server::new(config, portal_config, running, command_rx)?;
    server.run()
}

fn spawn_console_command_thread(command_tx: EventSender<Command>) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line_result in stdin.lock().lines() {
            let line = match line_result {
                Ok(line) => line,
                Err(err) => {
                    warn!("Failed to read server console input: {err}");
                    break;
                }
            };

            let command = commands::parse_command(&line);
            if command_tx.send(command).is_err() {
                break;
            }
        }
    });
}
