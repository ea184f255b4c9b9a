//! Services the portal plugin consumes from its host.
//!
//! World state is only reachable through a [`WorldJob`] running on that
//! world's own thread; everything else here is safe to call from any thread.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel;
use glam::{DVec3, IVec3};
use thiserror::Error;
use warpgate_shared::portal::{AgentId, PortalColor};

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Look {
    pub yaw: f32,
    pub pitch: f32,
}

/// A point-in-time copy of an agent's transform.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentView {
    pub id: AgentId,
    pub name: String,
    pub position: DVec3,
    pub look: Look,
    pub world: String,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown agent {0}")]
    UnknownAgent(AgentId),
    #[error("unknown world '{0}'")]
    UnknownWorld(String),
    #[error("block at {pos} rejected: {reason}")]
    BlockRejected { pos: IVec3, reason: String },
}

pub trait AgentDirectory: Send + Sync {
    fn connected_agents(&self) -> Vec<AgentId>;
    fn agent(&self, id: AgentId) -> Option<AgentView>;
    fn find_by_name(&self, name: &str) -> Option<AgentId>;
}

/// Mutable view of one world, handed to jobs on that world's thread.
pub trait WorldAccess {
    fn name(&self) -> &str;
    /// First solid cell along the agent's line of sight.
    fn raycast_from_agent(&self, agent: AgentId, max_distance: f64) -> Option<IVec3>;
    fn set_block(&mut self, pos: IVec3, block: &str) -> Result<(), HostError>;
    /// Clearing an empty cell succeeds.
    fn clear_block(&mut self, pos: IVec3) -> Result<(), HostError>;
    fn agent_look(&self, agent: AgentId) -> Option<Look>;
    fn move_agent(&mut self, agent: AgentId, position: DVec3, look: Look) -> Result<(), HostError>;
}

pub type WorldJob = Box<dyn FnOnce(&mut dyn WorldAccess) + Send + 'static>;

pub trait WorldContext: Send + Sync {
    fn name(&self) -> &str;
    /// Queues `job` on the world thread and returns immediately.
    fn execute(&self, job: WorldJob);
}

impl dyn WorldContext {
    /// Runs `query` on the world thread, waiting at most `timeout` for its
    /// result. A timeout yields `None`; the job still runs later.
    pub fn execute_and_wait<R, F>(&self, query: F, timeout: Duration) -> Option<R>
    where
        F: FnOnce(&mut dyn WorldAccess) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        self.execute(Box::new(move |access: &mut dyn WorldAccess| {
            let _ = tx.send(query(access));
        }));
        rx.recv_timeout(timeout).ok()
    }
}

pub trait WorldDirectory: Send + Sync {
    fn world(&self, name: &str) -> Option<Arc<dyn WorldContext>>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NoticeColor {
    White,
    Gray,
    Gold,
    Green,
    Red,
    Aqua,
    Blue,
    Orange,
}

impl From<PortalColor> for NoticeColor {
    fn from(color: PortalColor) -> Self {
        match color {
            PortalColor::Blue => NoticeColor::Blue,
            PortalColor::Orange => NoticeColor::Orange,
        }
    }
}

/// A formatted chat line for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    pub color: NoticeColor,
    pub bold: bool,
    pub italic: bool,
}

impl Notice {
    pub fn new(text: impl Into<String>, color: NoticeColor) -> Self {
        Self {
            text: text.into(),
            color,
            bold: false,
            italic: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, agent: AgentId, notice: Notice);
}

/// The host services the plugin is wired to.
#[derive(Clone)]
pub struct Host {
    pub agents: Arc<dyn AgentDirectory>,
    pub worlds: Arc<dyn WorldDirectory>,
    pub notifier: Arc<dyn Notifier>,
}

impl Host {
    pub fn from_shared<T>(host: Arc<T>) -> Self
    where
        T: AgentDirectory + WorldDirectory + Notifier + 'static,
    {
        Self {
            agents: host.clone(),
            worlds: host.clone(),
            notifier: host,
        }
    }

    pub fn notify_all(&self, agent: AgentId, notices: impl IntoIterator<Item = Notice>) {
        for notice in notices {
            self.notifier.notify(agent, notice);
        }
    }
}
