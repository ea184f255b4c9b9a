//! Polling detection of agents stepping into portals.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::DVec3;
use rustc_hash::FxHashMap;
use tracing::{debug, error, info, warn};
use warpgate_core::periodic::{PeriodicTask, TaskSlot};
use warpgate_shared::portal::{AgentId, PortalColor};
use warpgate_shared::registry::PortalRegistry;

use crate::host::{Host, Notice, NoticeColor, WorldAccess};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AgentPhase {
    /// Free to teleport on the next entry.
    Eligible,
    /// Teleported less than one cooldown window ago.
    Cooldown,
}

/// A teleport triggered by one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Teleport {
    pub agent: AgentId,
    pub entered: PortalColor,
    pub destination: DVec3,
    pub world: String,
}

/// Scans agents against their portal pairs and moves them on entry.
///
/// Owns the cooldown table; dropping the detector forgets every cooldown.
pub struct TeleportDetector {
    registry: Arc<PortalRegistry>,
    host: Host,
    cooldown_ms: u64,
    last_teleport: FxHashMap<AgentId, u64>,
}

impl TeleportDetector {
    pub fn new(registry: Arc<PortalRegistry>, host: Host, cooldown: Duration) -> Self {
        Self {
            registry,
            host,
            cooldown_ms: u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX),
            last_teleport: FxHashMap::default(),
        }
    }

    pub fn phase(&self, agent: AgentId, now_ms: u64) -> AgentPhase {
        match self.last_teleport.get(&agent) {
            Some(&last) if now_ms.saturating_sub(last) < self.cooldown_ms => AgentPhase::Cooldown,
            _ => AgentPhase::Eligible,
        }
    }

    pub fn cooldown_count(&self) -> usize {
        self.last_teleport.len()
    }

    /// One detection pass over every connected agent at time `now_ms`.
    pub fn scan(&mut self, now_ms: u64) -> Vec<Teleport> {
        let mut teleports = Vec::new();
        for agent in self.host.agents.connected_agents() {
            match panic::catch_unwind(AssertUnwindSafe(|| self.check_agent(agent, now_ms))) {
                Ok(Some(teleport)) => teleports.push(teleport),
                Ok(None) => {}
                Err(_) => error!("Teleport check for {agent} panicked, continuing scan"),
            }
        }
        teleports
    }

    fn check_agent(&mut self, agent: AgentId, now_ms: u64) -> Option<Teleport> {
        if self.phase(agent, now_ms) == AgentPhase::Cooldown {
            return None;
        }

        let pair = self.registry.get_portal_pair(agent)?;
        if !pair.has_both() {
            return None;
        }

        let Some(view) = self.host.agents.agent(agent) else {
            debug!("{agent} vanished before its teleport check");
            return None;
        };
        if self.host.worlds.world(&view.world).is_none() {
            debug!("{agent} is in unresolved world '{}'", view.world);
            return None;
        }

        // Blue is checked first when the agent stands in both.
        let entered = PortalColor::ALL.into_iter().find(|&color| {
            pair.get(color)
                .is_some_and(|portal| portal.world() == view.world && portal.contains(view.position))
        })?;
        let destination = pair.opposite(entered)?;

        let Some(world) = self.host.worlds.world(destination.world()) else {
            warn!(
                "Destination world '{}' for {agent} is not available",
                destination.world()
            );
            return None;
        };

        self.last_teleport.insert(agent, now_ms);

        let target = destination.center();
        let fallback_look = view.look;
        world.execute(Box::new(move |access: &mut dyn WorldAccess| {
            let look = access.agent_look(agent).unwrap_or(fallback_look);
            if let Err(err) = access.move_agent(agent, target, look) {
                warn!("Teleport of {agent} failed: {err}");
            }
        }));
        self.host
            .notifier
            .notify(agent, Notice::new("*Whoosh*", NoticeColor::Aqua).italic());
        info!(
            "{} entered {entered} portal, teleporting to [{:.1}, {:.1}, {:.1}]",
            view.name, target.x, target.y, target.z
        );

        Some(Teleport {
            agent,
            entered,
            destination: target,
            world: destination.world().to_string(),
        })
    }
}

/// The detector driven at a fixed rate on its own thread.
///
/// Each start builds a fresh detector, so a restart begins with no cooldowns.
pub struct TeleportLoop {
    registry: Arc<PortalRegistry>,
    host: Host,
    cooldown: Duration,
    interval: Duration,
    slot: TaskSlot,
}

impl TeleportLoop {
    pub fn new(
        registry: Arc<PortalRegistry>,
        host: Host,
        cooldown: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            host,
            cooldown,
            interval,
            slot: TaskSlot::default(),
        }
    }

    pub fn start(&self) -> io::Result<bool> {
        let mut detector =
            TeleportDetector::new(Arc::clone(&self.registry), self.host.clone(), self.cooldown);
        let interval = self.interval;
        let started = self.slot.start_with(move || {
            let epoch = Instant::now();
            PeriodicTask::spawn("teleport-detection", interval, move || {
                let now_ms = u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
                detector.scan(now_ms);
            })
        })?;
        if started {
            info!(
                "Teleport detection started ({}ms interval, {}ms cooldown)",
                interval.as_millis(),
                self.cooldown.as_millis()
            );
        }
        Ok(started)
    }

    pub fn stop(&self) -> bool {
        let stopped = self.slot.stop();
        if stopped {
            info!("Teleport detection stopped");
        }
        stopped
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_running()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use glam::DVec3;
    use warpgate_shared::portal::{AgentId, GeometrySink, Portal, PortalColor};
    use warpgate_shared::registry::PortalRegistry;

    use super::{AgentPhase, TeleportDetector, TeleportLoop};
    use crate::host::{Host, Look, NoticeColor, WorldAccess, WorldContext};
    use crate::world::fixtures::{universe, TEST_WORLD, WAIT};
    use crate::world::Universe;

    struct NoGeometry;

    impl GeometrySink for NoGeometry {
        fn place(&self, _portal: &Portal) -> bool {
            true
        }

        fn remove(&self, _portal: &Portal) {}
    }

    fn linked_pair(universe: &Universe, registry: &PortalRegistry) -> AgentId {
        let agent = universe
            .join("Alice", TEST_WORLD, DVec3::new(0.5, 64.0, 0.5))
            .unwrap();
        for (color, x) in [(PortalColor::Blue, 10.0), (PortalColor::Orange, 20.0)] {
            registry.set_portal(Arc::new(Portal::new(
                agent,
                color,
                DVec3::new(x, 64.0, 10.0),
                0.0,
                TEST_WORLD,
            )));
        }
        agent
    }

    fn setup() -> (Arc<Universe>, Arc<PortalRegistry>, TeleportDetector) {
        let universe = universe();
        let registry = Arc::new(PortalRegistry::new(Arc::new(NoGeometry)));
        let detector = TeleportDetector::new(
            Arc::clone(&registry),
            Host::from_shared(Arc::clone(&universe)),
            Duration::from_millis(1000),
        );
        (universe, registry, detector)
    }

    #[test]
    fn entering_blue_moves_the_agent_to_orange_and_keeps_its_facing() {
        let (universe, registry, mut detector) = setup();
        let agent = linked_pair(&universe, &registry);
        universe
            .set_look(agent, Look { yaw: 37.0, pitch: -12.0 })
            .unwrap();
        universe
            .set_position(agent, DVec3::new(11.0, 65.5, 11.0))
            .unwrap();

        let teleports = detector.scan(0);
        assert_eq!(teleports.len(), 1);
        assert_eq!(teleports[0].entered, PortalColor::Blue);
        assert_eq!(teleports[0].destination, DVec3::new(21.0, 65.5, 11.0));
        assert!(universe.flush_worlds(WAIT));

        let player = universe.player(agent).unwrap();
        assert_eq!(player.position, DVec3::new(21.0, 65.5, 11.0));
        assert_eq!((player.yaw, player.pitch), (37.0, -12.0));

        let notices = universe.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].1.text, "*Whoosh*");
        assert!(notices[0].1.italic);
        assert_eq!(notices[0].1.color, NoticeColor::Aqua);
    }

    #[test]
    fn cooldown_blocks_the_bounce_back_until_it_expires() {
        let (universe, registry, mut detector) = setup();
        let agent = linked_pair(&universe, &registry);
        universe
            .set_position(agent, DVec3::new(11.0, 65.5, 11.0))
            .unwrap();

        assert_eq!(detector.scan(0).len(), 1);
        assert!(universe.flush_worlds(WAIT));
        assert_eq!(detector.phase(agent, 100), AgentPhase::Cooldown);

        assert!(detector.scan(100).is_empty());
        assert!(detector.scan(999).is_empty());
        assert!(universe.flush_worlds(WAIT));
        assert_eq!(
            universe.player(agent).unwrap().position,
            DVec3::new(21.0, 65.5, 11.0)
        );

        assert_eq!(detector.phase(agent, 1000), AgentPhase::Eligible);
        let back = detector.scan(1000);
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].entered, PortalColor::Orange);
        assert_eq!(back[0].destination, DVec3::new(11.0, 65.5, 11.0));
    }

    #[test]
    fn overlapping_portals_trigger_once_per_scan_through_blue() {
        let (universe, registry, mut detector) = setup();
        let agent = universe
            .join("Bob", TEST_WORLD, DVec3::new(1.0, 65.0, 1.0))
            .unwrap();
        for color in PortalColor::ALL {
            registry.set_portal(Arc::new(Portal::new(
                agent,
                color,
                DVec3::new(0.0, 64.0, 0.0),
                0.0,
                TEST_WORLD,
            )));
        }

        let teleports = detector.scan(0);
        assert_eq!(teleports.len(), 1);
        assert_eq!(teleports[0].entered, PortalColor::Blue);
        assert_eq!(detector.cooldown_count(), 1);
    }

    #[test]
    fn incomplete_pairs_and_other_worlds_are_ignored() {
        let (universe, registry, mut detector) = setup();
        let agent = universe
            .join("Carol", TEST_WORLD, DVec3::new(11.0, 65.5, 11.0))
            .unwrap();
        registry.set_portal(Arc::new(Portal::new(
            agent,
            PortalColor::Blue,
            DVec3::new(10.0, 64.0, 10.0),
            0.0,
            TEST_WORLD,
        )));
        assert!(detector.scan(0).is_empty());

        registry.set_portal(Arc::new(Portal::new(
            agent,
            PortalColor::Orange,
            DVec3::new(20.0, 64.0, 10.0),
            0.0,
            TEST_WORLD,
        )));
        universe.create_world("nether").unwrap();
        let nether = universe.sim_world("nether").unwrap();
        nether.execute(Box::new(move |access: &mut dyn WorldAccess| {
            let _ = access.move_agent(agent, DVec3::new(11.0, 65.5, 11.0), Look::default());
        }));
        assert!(nether.flush(WAIT));

        assert!(detector.scan(0).is_empty());
        assert_eq!(detector.cooldown_count(), 0);
    }

    #[test]
    fn destination_in_a_missing_world_is_skipped_without_cooldown() {
        let (universe, registry, mut detector) = setup();
        let agent = universe
            .join("Dave", TEST_WORLD, DVec3::new(11.0, 65.5, 11.0))
            .unwrap();
        registry.set_portal(Arc::new(Portal::new(
            agent,
            PortalColor::Blue,
            DVec3::new(10.0, 64.0, 10.0),
            0.0,
            TEST_WORLD,
        )));
        registry.set_portal(Arc::new(Portal::new(
            agent,
            PortalColor::Orange,
            DVec3::new(0.0, 64.0, 0.0),
            0.0,
            "unloaded",
        )));

        assert!(detector.scan(0).is_empty());
        assert_eq!(detector.phase(agent, 0), AgentPhase::Eligible);
    }

    #[test]
    fn loop_teleports_in_the_background_and_restarts_clean() {
        let universe = universe();
        let registry = Arc::new(PortalRegistry::new(Arc::new(NoGeometry)));
        let agent = linked_pair(&universe, &registry);
        let teleports = TeleportLoop::new(
            Arc::clone(&registry),
            Host::from_shared(Arc::clone(&universe)),
            Duration::from_secs(60),
            Duration::from_millis(10),
        );

        assert!(teleports.start().unwrap());
        assert!(teleports.is_running());
        universe
            .set_position(agent, DVec3::new(11.0, 65.5, 11.0))
            .unwrap();

        let orange_center = DVec3::new(21.0, 65.5, 11.0);
        let deadline = Instant::now() + WAIT;
        while universe.player(agent).unwrap().position != orange_center
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(universe.player(agent).unwrap().position, orange_center);

        assert!(teleports.stop());
        assert!(!teleports.is_running());

        // A fresh start has no memory of the 60 s cooldown.
        assert!(teleports.start().unwrap());
        let blue_center = DVec3::new(11.0, 65.5, 11.0);
        let deadline = Instant::now() + WAIT;
        while universe.player(agent).unwrap().position != blue_center
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(universe.player(agent).unwrap().position, blue_center);
        assert!(teleports.stop());
    }
}
