use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use bevy_ecs::prelude::*;
use bevy_utils::HashMap;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::data::config::NavigationSettings;
use crate::pathfinding::astar::{PathError, Pathfinder};
use crate::pathfinding::grid::NavGrid;
use crate::simulation::rng::SimRng;

/// Attempts made before giving up on a target far from the player.
pub const AWAY_FROM_PLAYER_ATTEMPTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentHandle(pub usize);

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("failed to start path workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("unknown navigation agent {0}")]
    UnknownAgent(usize),
    #[error("navigation agent {0} is not in use")]
    AgentIdle(usize),
}

#[derive(Debug)]
struct PathResponse {
    agent: AgentHandle,
    owner: u32,
    generation: u64,
    result: Result<Vec<Vector3<f32>>, PathError>,
}

/// A finished search for a runner that still owns the requesting agent.
#[derive(Debug, Clone, PartialEq)]
pub struct PathDelivery {
    pub owner: u32,
    pub agent: AgentHandle,
    pub result: Result<Vec<Vector3<f32>>, PathError>,
}

/// Notice handed back when an agent is freed, so the caller can respawn its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentReleased {
    pub agent: AgentHandle,
    pub owner: Option<u32>,
}

/// Tracks the single in-flight search of one agent.
#[derive(Debug)]
pub struct PathRequestManager {
    agent: AgentHandle,
    owner: Option<u32>,
    generation: u64,
    cancel: Arc<AtomicBool>,
    active: bool,
}

impl PathRequestManager {
    fn new(agent: AgentHandle) -> Self {
        Self {
            agent,
            owner: None,
            generation: 0,
            cancel: Arc::new(AtomicBool::new(false)),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn owner(&self) -> Option<u32> {
        self.owner
    }

    /// Start a new search, cancelling the previous one if it is still running.
    fn request_path(
        &mut self,
        owner: u32,
        start: Vector3<f32>,
        end: Vector3<f32>,
        grid: &Arc<NavGrid>,
        pool: Option<&rayon::ThreadPool>,
        results: &Sender<PathResponse>,
    ) {
        if self.active {
            debug!(agent = self.agent.0, "cancelling in-flight path request");
            self.cancel.store(true, Ordering::Relaxed);
        }
        self.generation += 1;
        self.cancel = Arc::new(AtomicBool::new(false));
        self.active = true;

        let job = PathJob {
            agent: self.agent,
            owner,
            generation: self.generation,
            start,
            end,
            grid: Arc::clone(grid),
            cancel: Arc::clone(&self.cancel),
            results: results.clone(),
        };
        match pool {
            Some(pool) => pool.spawn(move || job.run()),
            None => job.run(),
        }
    }

    fn cancel(&mut self) {
        if self.active {
            self.cancel.store(true, Ordering::Relaxed);
            self.active = false;
        }
    }
}

struct PathJob {
    agent: AgentHandle,
    owner: u32,
    generation: u64,
    start: Vector3<f32>,
    end: Vector3<f32>,
    grid: Arc<NavGrid>,
    cancel: Arc<AtomicBool>,
    results: Sender<PathResponse>,
}

impl PathJob {
    fn run(self) {
        if self.cancel.load(Ordering::Relaxed) {
            return;
        }
        let result = Pathfinder::new(&self.grid).find_path(self.start, self.end, &self.cancel);
        if matches!(result, Err(PathError::Cancelled)) {
            return;
        }
        // The receiver is gone once the service shut down.
        let _ = self.results.send(PathResponse {
            agent: self.agent,
            owner: self.owner,
            generation: self.generation,
            result,
        });
    }
}

#[derive(Debug)]
struct RunnerAgent {
    manager: PathRequestManager,
    in_use: bool,
}

/// Shared grid, worker pool and the pool of per-runner request managers.
#[derive(Resource)]
pub struct NavigationService {
    grid: Arc<NavGrid>,
    pool: Option<rayon::ThreadPool>,
    sender: Sender<PathResponse>,
    receiver: Mutex<Receiver<PathResponse>>,
    agents: Vec<RunnerAgent>,
    owners: HashMap<u32, AgentHandle>,
}

impl NavigationService {
    pub fn new(grid: NavGrid, settings: &NavigationSettings) -> Result<Self, NavigationError> {
        let pool = if settings.worker_threads == 0 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(settings.worker_threads)
                    .thread_name(|index| format!("path-worker-{index}"))
                    .build()?,
            )
        };
        let (sender, receiver) = channel();
        let pool_size = settings.runners_always_active as usize + 1;
        let agents = (0..pool_size)
            .map(|index| RunnerAgent {
                manager: PathRequestManager::new(AgentHandle(index)),
                in_use: false,
            })
            .collect();

        info!(
            agents = pool_size,
            workers = settings.worker_threads,
            "navigation service ready"
        );
        Ok(Self {
            grid: Arc::new(grid),
            pool,
            sender,
            receiver: Mutex::new(receiver),
            agents,
            owners: HashMap::default(),
        })
    }

    pub fn grid(&self) -> &Arc<NavGrid> {
        &self.grid
    }

    /// Swap in a rebuilt grid. In-flight searches against the old one are cancelled.
    pub fn replace_grid(&mut self, grid: NavGrid) {
        for agent in &mut self.agents {
            agent.manager.cancel();
        }
        self.grid = Arc::new(grid);
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn agents_in_use(&self) -> usize {
        self.agents.iter().filter(|agent| agent.in_use).count()
    }

    pub fn active_requests(&self) -> usize {
        self.agents
            .iter()
            .filter(|agent| agent.manager.is_active())
            .count()
    }

    pub fn agent_for(&self, owner: u32) -> Option<AgentHandle> {
        self.owners.get(&owner).copied()
    }

    /// First free agent, without claiming it.
    pub fn acquire_agent(&self) -> Option<AgentHandle> {
        let found = self
            .agents
            .iter()
            .position(|agent| !agent.in_use)
            .map(AgentHandle);
        if found.is_none() {
            warn!("no free navigation agent available");
        }
        found
    }

    /// Claim an agent for `owner`, growing the pool when every agent is busy.
    pub fn register_runner(&mut self, owner: u32) -> AgentHandle {
        if let Some(existing) = self.owners.get(&owner) {
            return *existing;
        }
        let handle = match self.agents.iter().position(|agent| !agent.in_use) {
            Some(index) => AgentHandle(index),
            None => {
                let handle = AgentHandle(self.agents.len());
                self.agents.push(RunnerAgent {
                    manager: PathRequestManager::new(handle),
                    in_use: false,
                });
                handle
            }
        };
        let agent = &mut self.agents[handle.0];
        agent.in_use = true;
        agent.manager.owner = Some(owner);
        self.owners.insert(owner, handle);
        debug!(owner, agent = handle.0, "runner assigned navigation agent");
        handle
    }

    /// Free an agent and cancel its search. `None` when the agent was not in use.
    pub fn release_agent(&mut self, handle: AgentHandle) -> Option<AgentReleased> {
        let agent = self.agents.get_mut(handle.0)?;
        if !agent.in_use {
            return None;
        }
        agent.manager.cancel();
        agent.in_use = false;
        let owner = agent.manager.owner.take();
        if let Some(owner) = owner {
            self.owners.remove(&owner);
        }
        debug!(owner = ?owner, agent = handle.0, "navigation agent released");
        Some(AgentReleased {
            agent: handle,
            owner,
        })
    }

    /// Whether the agent has a search whose result has not been drained yet.
    pub fn is_request_pending(&self, handle: AgentHandle) -> bool {
        self.agents
            .get(handle.0)
            .is_some_and(|agent| agent.in_use && agent.manager.is_active())
    }

    pub fn request_path(
        &mut self,
        handle: AgentHandle,
        start: Vector3<f32>,
        end: Vector3<f32>,
    ) -> Result<(), NavigationError> {
        let agent = self
            .agents
            .get_mut(handle.0)
            .ok_or(NavigationError::UnknownAgent(handle.0))?;
        let owner = match (agent.in_use, agent.manager.owner) {
            (true, Some(owner)) => owner,
            _ => return Err(NavigationError::AgentIdle(handle.0)),
        };
        agent.manager.request_path(
            owner,
            start,
            end,
            &self.grid,
            self.pool.as_ref(),
            &self.sender,
        );
        Ok(())
    }

    pub fn cancel(&mut self, handle: AgentHandle) {
        if let Some(agent) = self.agents.get_mut(handle.0) {
            agent.manager.cancel();
        }
    }

    /// Collect finished searches without blocking. Results for released agents,
    /// reassigned agents or superseded requests are dropped.
    pub fn drain_results(&mut self) -> Vec<PathDelivery> {
        let responses: Vec<PathResponse> = {
            let receiver = match self.receiver.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            receiver.try_iter().collect()
        };

        let mut deliveries = Vec::with_capacity(responses.len());
        for response in responses {
            let Some(agent) = self.agents.get_mut(response.agent.0) else {
                continue;
            };
            let current = agent.in_use
                && agent.manager.active
                && agent.manager.owner == Some(response.owner)
                && agent.manager.generation == response.generation;
            if !current {
                debug!(
                    agent = response.agent.0,
                    owner = response.owner,
                    "dropping stale path result"
                );
                continue;
            }
            agent.manager.active = false;
            deliveries.push(PathDelivery {
                owner: response.owner,
                agent: response.agent,
                result: response.result,
            });
        }
        deliveries
    }

    /// Cancel all searches and forget every agent.
    pub fn shutdown(&mut self) {
        for agent in &mut self.agents {
            agent.manager.cancel();
        }
        self.agents.clear();
        self.owners.clear();
        info!("navigation service shut down");
    }

    /// Random walkable node farther than `min_distance` (2D) from the player.
    pub fn random_position_away_from(
        &self,
        player: &Vector3<f32>,
        min_distance: f32,
        rng: &mut SimRng,
    ) -> Vector3<f32> {
        for _ in 0..AWAY_FROM_PLAYER_ATTEMPTS {
            let candidate = self.grid.random_location(true, rng);
            if (candidate.xy() - player.xy()).norm() > min_distance {
                return candidate;
            }
        }
        debug!("no position far enough from player, using any walkable node");
        self.grid.random_location(true, rng)
    }
}

impl Drop for NavigationService {
    fn drop(&mut self) {
        for agent in &mut self.agents {
            agent.manager.cancel();
        }
    }
}
