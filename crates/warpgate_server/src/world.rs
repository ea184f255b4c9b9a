use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glam::{DVec3, IVec3};
use parking_lot::{Mutex, RwLock};
use rayon::ThreadPoolBuildError;
use rustc_hash::FxHashMap;
use tracing::{debug, info};
use warpgate_core::jobs::WorldThread;
use warpgate_shared::physics::{raycast_blocks, Ray};
use warpgate_shared::portal::AgentId;

use crate::host::{
    AgentDirectory, AgentView, HostError, Look, Notice, Notifier, WorldAccess, WorldContext,
    WorldDirectory, WorldJob,
};
use crate::player::PlayerState;

const EYE_HEIGHT: f64 = 1.62;

type SharedPlayers = Arc<RwLock<FxHashMap<AgentId, PlayerState>>>;

/// Block storage of one world. Only touched from that world's thread.
pub struct WorldState {
    name: String,
    blocks: FxHashMap<IVec3, String>,
    min_y: i32,
    max_y: i32,
    players: SharedPlayers,
}

impl WorldState {
    fn new(name: String, min_y: i32, max_y: i32, players: SharedPlayers) -> Self {
        Self {
            name,
            blocks: FxHashMap::default(),
            min_y,
            max_y,
            players,
        }
    }

    pub fn block_at(&self, pos: IVec3) -> Option<&str> {
        self.blocks.get(&pos).map(String::as_str)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Fills the inclusive box between `min` and `max`, skipping cells outside
    /// the build height.
    pub fn fill(&mut self, min: IVec3, max: IVec3, block: &str) -> usize {
        let lo = min.min(max);
        let hi = min.max(max);
        let mut filled = 0;
        for y in lo.y.max(self.min_y)..=hi.y.min(self.max_y) {
            for z in lo.z..=hi.z {
                for x in lo.x..=hi.x {
                    self.blocks.insert(IVec3::new(x, y, z), block.to_string());
                    filled += 1;
                }
            }
        }
        filled
    }

    fn check_height(&self, pos: IVec3) -> Result<(), HostError> {
        if pos.y < self.min_y || pos.y > self.max_y {
            return Err(HostError::BlockRejected {
                pos,
                reason: format!("outside build height {}..={}", self.min_y, self.max_y),
            });
        }
        Ok(())
    }
}

impl WorldAccess for WorldState {
    fn name(&self) -> &str {
        &self.name
    }

    fn raycast_from_agent(&self, agent: AgentId, max_distance: f64) -> Option<IVec3> {
        let ray = {
            let players = self.players.read();
            let player = players.get(&agent).filter(|player| player.world == self.name)?;
            let eye = player.position + DVec3::Y * EYE_HEIGHT;
            Ray::from_look(eye, player.yaw, player.pitch)
        };
        raycast_blocks(&ray, max_distance)
            .map(|(cell, _)| cell)
            .find(|&cell| self.block_at(cell).is_some())
    }

    fn set_block(&mut self, pos: IVec3, block: &str) -> Result<(), HostError> {
        self.check_height(pos)?;
        if block.is_empty() {
            return Err(HostError::BlockRejected {
                pos,
                reason: "empty block name".to_string(),
            });
        }
        self.blocks.insert(pos, block.to_string());
        Ok(())
    }

    fn clear_block(&mut self, pos: IVec3) -> Result<(), HostError> {
        self.check_height(pos)?;
        self.blocks.remove(&pos);
        Ok(())
    }

    fn agent_look(&self, agent: AgentId) -> Option<Look> {
        self.players.read().get(&agent).map(PlayerState::look)
    }

    fn move_agent(&mut self, agent: AgentId, position: DVec3, look: Look) -> Result<(), HostError> {
        let mut players = self.players.write();
        let player = players
            .get_mut(&agent)
            .ok_or(HostError::UnknownAgent(agent))?;
        player.position = position;
        player.yaw = look.yaw;
        player.pitch = look.pitch;
        player.world.clone_from(&self.name);
        Ok(())
    }
}

/// A world paired with the thread that owns it.
pub struct SimWorld {
    thread: WorldThread,
    state: Arc<Mutex<WorldState>>,
}

impl SimWorld {
    pub fn flush(&self, timeout: Duration) -> bool {
        self.thread.flush(timeout)
    }

    /// Reads world state from the calling thread. Pair with `flush` to see
    /// the effect of queued jobs.
    pub fn with_state<R>(&self, read: impl FnOnce(&WorldState) -> R) -> R {
        read(&self.state.lock())
    }

    pub fn block_at(&self, pos: IVec3) -> Option<String> {
        self.with_state(|state| state.block_at(pos).map(str::to_string))
    }

    pub fn fill(&self, min: IVec3, max: IVec3, block: &str) -> usize {
        self.state.lock().fill(min, max, block)
    }
}

impl WorldContext for SimWorld {
    fn name(&self) -> &str {
        self.thread.name()
    }

    fn execute(&self, job: WorldJob) {
        let state = Arc::clone(&self.state);
        self.thread.execute(move || {
            let mut state = state.lock();
            let access: &mut dyn WorldAccess = &mut *state;
            job(access);
        });
    }
}

/// The in-memory host: connected players and named worlds.
pub struct Universe {
    players: SharedPlayers,
    worlds: RwLock<FxHashMap<String, Arc<SimWorld>>>,
    notices: Mutex<Vec<(AgentId, Notice)>>,
    next_agent_id: AtomicU64,
    min_y: i32,
    max_y: i32,
}

impl Universe {
    pub fn new(min_y: i32, max_y: i32) -> Self {
        Self {
            players: Arc::default(),
            worlds: RwLock::default(),
            notices: Mutex::default(),
            next_agent_id: AtomicU64::new(1),
            min_y,
            max_y,
        }
    }

    /// Creates `name` with its own world thread, or returns the existing world.
    pub fn create_world(&self, name: &str) -> Result<Arc<SimWorld>, ThreadPoolBuildError> {
        let mut worlds = self.worlds.write();
        if let Some(world) = worlds.get(name) {
            return Ok(Arc::clone(world));
        }
        let world = Arc::new(SimWorld {
            thread: WorldThread::new(name)?,
            state: Arc::new(Mutex::new(WorldState::new(
                name.to_string(),
                self.min_y,
                self.max_y,
                Arc::clone(&self.players),
            ))),
        });
        worlds.insert(name.to_string(), Arc::clone(&world));
        info!("Created world '{name}'");
        Ok(world)
    }

    pub fn sim_world(&self, name: &str) -> Option<Arc<SimWorld>> {
        self.worlds.read().get(name).cloned()
    }

    pub fn world_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.worlds.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn join(
        &self,
        username: &str,
        world: &str,
        position: DVec3,
    ) -> Result<AgentId, HostError> {
        if !self.worlds.read().contains_key(world) {
            return Err(HostError::UnknownWorld(world.to_string()));
        }
        let id = AgentId(self.next_agent_id.fetch_add(1, Ordering::Relaxed));
        let mut player = PlayerState::new(id, username, world);
        player.position = position;
        self.players.write().insert(id, player);
        info!("{username} joined '{world}' as {id}");
        Ok(id)
    }

    pub fn leave(&self, id: AgentId) -> Option<PlayerState> {
        let player = self.players.write().remove(&id)?;
        info!("{} left", player.username);
        Some(player)
    }

    pub fn player(&self, id: AgentId) -> Option<PlayerState> {
        self.players.read().get(&id).cloned()
    }

    /// Connected players ordered by id.
    pub fn players(&self) -> Vec<PlayerState> {
        let mut players: Vec<PlayerState> = self.players.read().values().cloned().collect();
        players.sort_by_key(|player| player.id);
        players
    }

    pub fn set_position(&self, id: AgentId, position: DVec3) -> Result<(), HostError> {
        self.update_player(id, |player| player.position = position)
    }

    pub fn set_look(&self, id: AgentId, look: Look) -> Result<(), HostError> {
        self.update_player(id, |player| {
            player.yaw = look.yaw;
            player.pitch = look.pitch;
        })
    }

    pub fn give(&self, id: AgentId, item: &str) -> Result<(), HostError> {
        self.update_player(id, |player| player.held_item = Some(item.to_string()))
    }

    pub fn take_notices(&self) -> Vec<(AgentId, Notice)> {
        std::mem::take(&mut *self.notices.lock())
    }

    /// Waits for every world's queued jobs. Returns `false` if any world
    /// did not drain within `timeout`.
    pub fn flush_worlds(&self, timeout: Duration) -> bool {
        let worlds: Vec<Arc<SimWorld>> = self.worlds.read().values().cloned().collect();
        worlds.iter().all(|world| world.flush(timeout))
    }

    fn update_player(
        &self,
        id: AgentId,
        update: impl FnOnce(&mut PlayerState),
    ) -> Result<(), HostError> {
        let mut players = self.players.write();
        let player = players.get_mut(&id).ok_or(HostError::UnknownAgent(id))?;
        update(player);
        Ok(())
    }
}

impl AgentDirectory for Universe {
    fn connected_agents(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.players.read().keys().copied().collect();
        ids.sort();
        ids
    }

    fn agent(&self, id: AgentId) -> Option<AgentView> {
        self.players.read().get(&id).map(PlayerState::view)
    }

    fn find_by_name(&self, name: &str) -> Option<AgentId> {
        self.players
            .read()
            .values()
            .filter(|player| player.username.eq_ignore_ascii_case(name))
            .map(|player| player.id)
            .min()
    }
}

impl WorldDirectory for Universe {
    fn world(&self, name: &str) -> Option<Arc<dyn WorldContext>> {
        self.sim_world(name)
            .map(|world| world as Arc<dyn WorldContext>)
    }
}

impl Notifier for Universe {
    fn notify(&self, agent: AgentId, notice: Notice) {
        let name = self
            .players
            .read()
            .get(&agent)
            .map(|player| player.username.clone())
            .unwrap_or_else(|| agent.to_string());
        info!("[{name}] {notice}");
        debug!(
            "Notice for {agent}: color={:?} bold={} italic={}",
            notice.color, notice.bold, notice.italic
        );
        self.notices.lock().push((agent, notice));
    }
}
