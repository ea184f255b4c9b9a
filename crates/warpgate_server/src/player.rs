use glam::DVec3;
use warpgate_shared::portal::AgentId;

use crate::host::{AgentView, Look};

#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: AgentId,
    pub username: String,
    pub world: String,
    pub position: DVec3,
    pub yaw: f32,
    pub pitch: f32,
    pub held_item: Option<String>,
}

impl PlayerState {
    pub fn new(id: AgentId, username: impl Into<String>, world: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            world: world.into(),
            position: DVec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            held_item: None,
        }
    }

    pub fn look(&self) -> Look {
        Look {
            yaw: self.yaw,
            pitch: self.pitch,
        }
    }

    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id,
            name: self.username.clone(),
            position: self.position,
            look: self.look(),
            world: self.world.clone(),
        }
    }
}
