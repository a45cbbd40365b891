//! # Movement System
//!
//! Integrates `Position += Velocity * dt` for every entity holding both.
//!
//! Chunk jobs only take the registry's read lock: positions are republished
//! through each entity's versioned cache, so readers in other jobs keep
//! seeing the previous frame's value until the new one is committed.

use std::sync::Arc;

use tracing::{trace, warn};

use tessera_core::{EcsError, Entity, Position, Velocity, DEFAULT_SLOTS};
use tessera_tasks::JobProxy;

use crate::chunk::submit_chunks;
use crate::system::System;
use crate::world::World;

/// Default number of entities per movement job.
pub const DEFAULT_CHUNK_SIZE: usize = 256;

/// Moves entities by their velocity.
#[derive(Debug)]
pub struct MovementSystem {
    world: Arc<World>,
    chunk_size: usize,
}

impl MovementSystem {
    /// System name.
    pub const NAME: &'static str = "movement";

    /// Movement over `world` with [`DEFAULT_CHUNK_SIZE`] chunks.
    #[must_use]
    pub fn new(world: Arc<World>) -> Self {
        Self::with_chunk_size(world, DEFAULT_CHUNK_SIZE)
    }

    /// Movement over `world` with custom chunks.
    #[must_use]
    pub fn with_chunk_size(world: Arc<World>, chunk_size: usize) -> Self {
        Self {
            world,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Integrates one chunk.
    fn integrate(world: &World, chunk: &[Entity], dt: f32) {
        let components = world.components();
        let (positions, velocities) = match (
            components.get::<Position, DEFAULT_SLOTS>(),
            components.get::<Velocity, DEFAULT_SLOTS>(),
        ) {
            (Ok(p), Ok(v)) => (p, v),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "movement arrays missing");
                return;
            }
        };

        for &entity in chunk {
            // Despawned between submission and execution.
            let Ok(velocity) = velocities.get(entity) else {
                continue;
            };
            let result = positions
                .get(entity)
                .and_then(|position| positions.set(entity, position.integrate(velocity, dt)));

            match result {
                Ok(()) | Err(EcsError::MissingComponent { .. }) => {}
                Err(e) => warn!(%entity, error = %e, "position not integrated"),
            }
        }
    }
}

impl System for MovementSystem {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn on_update(&mut self, dt: f32, jobs: &mut JobProxy) {
        let entities = self.world.query2::<Position, Velocity>();
        if entities.is_empty() {
            return;
        }

        let world = Arc::clone(&self.world);
        let submitted = submit_chunks(jobs, &entities, self.chunk_size, Self::NAME, move |chunk| {
            Self::integrate(&world, chunk, dt);
        });
        trace!(entities = entities.len(), jobs = submitted.len(), "movement submitted");
    }
}
