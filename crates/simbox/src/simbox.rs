//! The per-process partitioner.

use crate::exchange::Exchange;
use crate::state::wrap_into_domain;
use crate::{
    ForceReport, InitialState, MigrationReport, PhysicsEngine, PolymerRegistry, SetupError,
    SimBoxConfig, StepError,
};
use glam::DVec3;
use meso_messages::{
    Channel, Message, MessageError, MessageKind, MessageRegistry, ScalarAggregate,
    ValidationContext,
};
use meso_metrics::MetricsRecorder;
use meso_space::{clamp_into_frame, Partition, Space, SpaceGeometry};
use meso_transport::Transport;
use meso_types::{Bead, GridCoord, NeighbourTable, Pid};
use tracing::{debug, error, info};

/// Registry id of the neighbour-discovery handshake message.
pub const HANDSHAKE_ID: &str = "handshake";

/// Registry id of the global bead-total message.
pub const TOTALS_ID: &str = "totals";

pub(crate) struct Discovered {
    pub coord: GridCoord,
    pub neighbours: NeighbourTable,
}

pub(crate) struct Assembled {
    pub space: Space,
    pub partition: Partition,
    pub exchange: Exchange,
}

/// Results of one full step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub forces: ForceReport,
    pub migration: MigrationReport,
}

/// One process's share of the simulation.
///
/// Lifecycle: [`new`](Self::new), [`assemble`](Self::assemble) (neighbour
/// discovery then partitioning), [`load`](Self::load), then repeated
/// [`step`](Self::step)s. Every rank of the world must make the same calls in
/// the same order.
pub struct SimBox<T: Transport> {
    pub(crate) transport: T,
    pub(crate) config: SimBoxConfig,
    pub(crate) rank: Pid,
    pub(crate) registry: MessageRegistry,
    pub(crate) discovered: Option<Discovered>,
    pub(crate) assembled: Option<Assembled>,
    pub(crate) polymers: PolymerRegistry,
    pub(crate) assembly_failed: bool,
    pub(crate) step: u64,
}

impl<T: Transport> SimBox<T> {
    /// Create a SimBox for the rank behind `transport`.
    ///
    /// Checks the configuration alone; nothing is exchanged until
    /// [`assemble`](Self::assemble).
    pub fn new(transport: T, config: SimBoxConfig) -> Result<Self, SetupError> {
        let rank = transport.rank();
        let checked = Self::check_config(&config);
        if let Err(e) = &checked {
            error!(rank = rank.0, error = %e, "SimBox configuration rejected");
        }
        checked?;

        let mut registry = MessageRegistry::new(rank, config.capacities.clone());
        registry.register_alias(HANDSHAKE_ID, MessageKind::Scalar);
        registry.register_alias(TOTALS_ID, MessageKind::Scalar);

        Ok(Self {
            transport,
            config,
            rank,
            registry,
            discovered: None,
            assembled: None,
            polymers: PolymerRegistry::new(),
            assembly_failed: false,
            step: 0,
        })
    }

    fn check_config(config: &SimBoxConfig) -> Result<(), SetupError> {
        config.grid.validate()?;
        config.grid.topology()?;
        let domain = config.domain;
        if !(domain.is_finite() && domain.min_element() > 0.0) {
            return Err(SetupError::BadDomain(domain));
        }
        SpaceGeometry::new(
            DVec3::ZERO,
            config.space_extent(),
            config.cells_per_space,
            config.cutoff,
        )?;
        Ok(())
    }

    // ─── Assembly ───────────────────────────────────────────────────────

    /// Build the Bulk and border regions and the per-direction messages.
    ///
    /// Requires [`discover_neighbours`](Self::discover_neighbours) first.
    pub fn partition_space(&mut self) -> Result<(), SetupError> {
        let discovered = self.discovered.as_ref().ok_or(SetupError::NotDiscovered)?;
        let extent = self.config.space_extent();
        let [cx, cy, cz] = discovered.coord.as_array();
        let origin = DVec3::new(cx as f64, cy as f64, cz as f64) * extent;
        let geometry = SpaceGeometry::new(
            origin,
            extent,
            self.config.cells_per_space,
            self.config.cutoff,
        )?;
        let partition = Partition::build(&geometry, &discovered.neighbours, self.config.grid.split_axes());
        let exchange = Exchange::build(&self.registry, &partition, &discovered.neighbours)?;
        debug!(
            rank = self.rank.0,
            origin = %origin,
            lanes = exchange.lanes.len(),
            "Space partitioned"
        );
        self.assembled = Some(Assembled {
            space: Space::new(geometry),
            partition,
            exchange,
        });
        Ok(())
    }

    /// Neighbour discovery followed by partitioning.
    pub fn assemble(&mut self) -> Result<(), SetupError> {
        self.discover_neighbours()?;
        let result = self.partition_space();
        if let Err(e) = &result {
            self.assembly_failed = true;
            error!(rank = self.rank.0, error = %e, "Partitioning failed");
        }
        result
    }

    /// Insert the beads of `state` that lie in this Space.
    ///
    /// Returns the number of beads loaded.
    pub fn load(&mut self, state: &InitialState) -> Result<usize, SetupError> {
        let result = self.load_inner(state);
        if let Err(e) = &result {
            error!(rank = self.rank.0, error = %e, "Initial state rejected");
        }
        result
    }

    fn load_inner(&mut self, state: &InitialState) -> Result<usize, SetupError> {
        state.validate()?;
        let coord = self
            .discovered
            .as_ref()
            .map(|d| d.coord)
            .ok_or(SetupError::NotAssembled)?;
        let assembled = self.assembled.as_mut().ok_or(SetupError::NotAssembled)?;
        let geometry = assembled.space.geometry().clone();
        let extent = geometry.extent();
        let dims = self.config.grid.dims();
        let mine = coord.as_array();

        let mut loaded = 0;
        for bead in &state.beads {
            let global = wrap_into_domain(bead.position, self.config.domain);
            let owned = (0..3).all(|a| {
                let k = (global[a] / extent[a]).floor() as i64;
                k.clamp(0, dims[a] as i64 - 1) == mine[a] as i64
            });
            if !owned {
                continue;
            }
            let mut local = geometry.to_local(global);
            for a in 0..3 {
                local[a] = clamp_into_frame(local[a], extent[a]);
            }
            let mut bead = bead.clone();
            bead.position = local;
            assembled.space.insert(bead)?;
            loaded += 1;
        }

        for polymer in &state.polymers {
            if polymer.members.iter().any(|m| assembled.space.contains(*m)) {
                self.polymers.insert(polymer.clone());
                self.polymers.refresh(polymer.id, &assembled.space);
            }
        }
        info!(
            rank = self.rank.0,
            beads = loaded,
            polymers = self.polymers.len(),
            "Initial state loaded"
        );
        Ok(loaded)
    }

    // ─── Steps ──────────────────────────────────────────────────────────

    /// One full step: force sync, then position sync.
    pub fn step<E: PhysicsEngine, M: MetricsRecorder>(
        &mut self,
        engine: &E,
        metrics: &mut M,
    ) -> Result<StepReport, StepError> {
        let forces = self.sync_forces(engine, metrics)?;
        let migration = self.sync_positions(engine, metrics)?;
        Ok(StepReport { forces, migration })
    }

    /// Sum of bead counts over every rank, known to every rank.
    pub fn global_bead_total(&mut self) -> Result<u64, MessageError> {
        let world = self.transport.world_size();
        let ctx = ValidationContext::new(self.rank, world);
        let mut message = self.control_message(TOTALS_ID, Channel::Totals)?;
        let local = self.bead_count() as u64;

        if self.rank == Pid::ROOT {
            let mut total = local;
            for r in 1..world as u32 {
                message.receive_from(&self.transport, Pid(r), &ctx)?;
                total += message.payload().counts.first().copied().unwrap_or(0);
            }
            message.set_payload(ScalarAggregate::from_counts(vec![total]));
            message.validate(&ctx)?;
        } else {
            message.set_payload(ScalarAggregate::from_counts(vec![local]));
            message.validate(&ctx)?;
            message.send_to_root(&self.transport)?;
        }
        message.broadcast(&self.transport, Pid::ROOT, &ctx)?;
        let total = message.payload().counts.first().copied().unwrap_or(0);
        debug!(rank = self.rank.0, local, total, "Global bead total");
        Ok(total)
    }

    pub(crate) fn control_message(
        &self,
        id: &str,
        channel: Channel,
    ) -> Result<Message<ScalarAggregate>, MessageError> {
        self.registry
            .create(id, channel.control_tag())?
            .into_scalar()
            .ok_or_else(|| MessageError::UnknownMessageId(id.to_string()))
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    /// This process's rank.
    pub fn rank(&self) -> Pid {
        self.rank
    }

    /// Configuration in use.
    pub fn config(&self) -> &SimBoxConfig {
        &self.config
    }

    /// The transport endpoint.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Message registry of this process.
    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    /// Grid coordinate, once discovered.
    pub fn coord(&self) -> Option<GridCoord> {
        self.discovered.as_ref().map(|d| d.coord)
    }

    /// Neighbour table, once discovered.
    pub fn neighbours(&self) -> Option<&NeighbourTable> {
        self.discovered.as_ref().map(|d| &d.neighbours)
    }

    /// Whether assembly has completed.
    pub fn is_assembled(&self) -> bool {
        self.assembled.is_some()
    }

    /// Whether neighbour discovery or partitioning failed.
    pub fn assembly_failed(&self) -> bool {
        self.assembly_failed
    }

    /// Completed steps.
    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// The Space, once assembled.
    pub fn space(&self) -> Option<&Space> {
        self.assembled.as_ref().map(|a| &a.space)
    }

    /// The partition, once assembled.
    pub fn partition(&self) -> Option<&Partition> {
        self.assembled.as_ref().map(|a| &a.partition)
    }

    /// Polymer records held.
    pub fn polymers(&self) -> &PolymerRegistry {
        &self.polymers
    }

    /// Beads held locally.
    pub fn bead_count(&self) -> usize {
        self.space().map_or(0, Space::len)
    }

    /// Copies of the local beads with positions in global coordinates.
    pub fn global_beads(&self) -> Vec<Bead> {
        let Some(space) = self.space() else {
            return Vec::new();
        };
        space
            .iter()
            .map(|(_, bead)| {
                let mut bead = bead.clone();
                bead.position = space.geometry().to_global(bead.position);
                bead
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_transport_memory::{MemoryConfig, MemoryWorld};
    use meso_types::{BeadId, BeadKind, GridShape};
    use std::thread;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn planar_config() -> SimBoxConfig {
        SimBoxConfig::default()
            .with_grid(GridShape::new(2, 2, 1))
            .with_domain(DVec3::new(20.0, 20.0, 10.0))
    }

    fn quadrant_state() -> InitialState {
        let corners = [(5.0, 5.0), (15.0, 5.0), (5.0, 15.0), (15.0, 15.0), (19.5, 19.5)];
        let beads = corners
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Bead::new(BeadId(i as u64), BeadKind(0), DVec3::new(*x, *y, 5.0)))
            .collect();
        InitialState::new(beads, Vec::new())
    }

    #[traced_test]
    #[test]
    fn test_assemble_load_and_total() {
        let config = planar_config();
        let state = quadrant_state();
        let world = MemoryWorld::connect(
            4,
            MemoryConfig::default().with_wait_deadline(Duration::from_secs(10)),
        );

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = world
                .into_endpoints()
                .into_iter()
                .map(|transport| {
                    let (config, state) = (config.clone(), &state);
                    scope.spawn(move || {
                        let mut simbox = SimBox::new(transport, config).unwrap();
                        assert!(!simbox.is_assembled());
                        simbox.assemble().unwrap();
                        let loaded = simbox.load(state).unwrap();
                        let total = simbox.global_bead_total().unwrap();
                        (simbox.rank(), simbox.coord(), loaded, total, simbox.global_beads())
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let loaded: Vec<usize> = results.iter().map(|r| r.2).collect();
        assert_eq!(loaded, vec![1, 1, 1, 2]);
        assert!(results.iter().all(|r| r.3 == 5));

        let (rank, coord, ..) = &results[3];
        assert_eq!(*rank, Pid(3));
        assert_eq!(coord.map(|c| c.as_array()), Some([1, 1, 0]));

        // Loading converts to local coordinates and back without drift.
        let held = &results[3].4;
        assert!(held
            .iter()
            .any(|b| b.id == BeadId(4) && (b.position - DVec3::new(19.5, 19.5, 5.0)).length() < 1e-12));
    }

    #[traced_test]
    #[test]
    fn test_load_before_assembly_rejected() {
        let world = MemoryWorld::connect(4, MemoryConfig::default());
        let transport = world.into_endpoints().into_iter().next().unwrap();
        let mut simbox = SimBox::new(transport, planar_config()).unwrap();
        assert!(matches!(
            simbox.load(&quadrant_state()),
            Err(SetupError::NotAssembled)
        ));
        assert_eq!(simbox.bead_count(), 0);
        assert!(simbox.global_beads().is_empty());
    }
}
