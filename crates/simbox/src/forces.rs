//! Force sync: ghost exchange, pair and bond forces, force reconciliation.
//!
//! Pair forces use a half shell. Every real cell is paired with itself and
//! its 13 forward neighbours, so each unordered cell pair is visited once.
//! Pairs whose forward neighbour is a real cell are evaluated while ghost
//! coordinates are in flight; pairs reaching into the halo wait for the
//! ghosts. A force on a ghost is owed to whoever owns the bead: periodic
//! images pass it to the local bead, remote copies return it to their owner
//! summed per id.

use crate::error::Failure;
use crate::simbox::Assembled;
use crate::{Particle, PhysicsEngine, PolymerRegistry, ProtocolError, SetupError, SimBox, StepError};
use glam::DVec3;
use meso_messages::{Channel, Payload, ValidationContext};
use meso_metrics::MetricsRecorder;
use meso_space::{Ghost, Slot, Space};
use meso_transport::Transport;
use meso_types::{Bond, Direction};
use tracing::{debug, error, warn};

/// What one force sync did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForceReport {
    /// Remote copies staged into the halo.
    pub ghosts: usize,
    /// Periodic self-images created.
    pub images: usize,
    /// Pairs within the cutoff with both beads local.
    pub internal_pairs: usize,
    /// Pairs within the cutoff between a local bead and a ghost.
    pub shared_pairs: usize,
    /// Bonds evaluated.
    pub bonds: usize,
    /// Bonds skipped because the tail was nowhere to be found.
    pub missing_bond_partners: usize,
    /// Per-id force contributions returned to owners.
    pub replies_sent: usize,
    /// Per-id force contributions received from neighbours.
    pub replies_received: usize,
}

impl<T: Transport> SimBox<T> {
    /// Exchange ghosts with every neighbour and accumulate the forces on
    /// every local bead.
    pub fn sync_forces<E: PhysicsEngine, M: MetricsRecorder>(
        &mut self,
        engine: &E,
        metrics: &mut M,
    ) -> Result<ForceReport, StepError> {
        let step = self.step;
        self.exchange_forces(engine, metrics).map_err(|failure| {
            let e = failure.at(step);
            error!(rank = self.rank.0, step, class = e.class(), error = %e, "Force sync failed");
            e
        })
    }

    fn exchange_forces<E: PhysicsEngine, M: MetricsRecorder>(
        &mut self,
        engine: &E,
        metrics: &mut M,
    ) -> Result<ForceReport, Failure> {
        let rank = self.rank;
        let world = self.transport.world_size();
        let step = self.step;
        let transport = &self.transport;
        let polymers = &self.polymers;
        let Assembled {
            space,
            partition,
            exchange,
        } = self.assembled.as_mut().ok_or(SetupError::NotAssembled)?;

        let width = space.geometry().min_cell_width();
        if engine.cutoff() > width {
            return Err(SetupError::CutoffExceedsCell {
                cutoff: engine.cutoff(),
                width,
            }
            .into());
        }
        let extent = space.geometry().extent();
        let unsplit = partition.unsplit_axes();
        let mut report = ForceReport::default();

        space.zero_forces();
        partition.clear_external_cells(space)?;

        // Post every receive before sending anything.
        let mut coordinate_tokens = Vec::with_capacity(exchange.lanes.len());
        let mut reply_tokens = Vec::with_capacity(exchange.lanes.len());
        for lane in &exchange.lanes {
            coordinate_tokens.push(lane.coordinates_in.receive_async(transport, lane.neighbour)?);
            reply_tokens.push(lane.forces_in.receive_async(transport, lane.neighbour)?);
        }

        let mut send_tokens = Vec::with_capacity(exchange.lanes.len());
        for lane in &mut exchange.lanes {
            let region = partition.region_mut(lane.direction);
            let slots = region.collect_local_boundary_particles(space)?;
            let bundle = lane.coordinates_out.payload_mut();
            bundle.clear();
            for slot in slots {
                if let Some(bead) = space.bead(*slot) {
                    bundle.push(bead.id, bead.kind, bead.position, bead.velocity);
                }
            }
            region.remove_stale_external_references();

            let ctx = ValidationContext::new(rank, world)
                .with_peer(lane.neighbour)
                .with_extent(extent);
            lane.coordinates_out.validate(&ctx)?;
            send_tokens.push(lane.coordinates_out.send_async(transport, lane.neighbour)?);
            metrics.record_message_sent(
                Channel::GhostCoordinates.name(),
                lane.coordinates_out.payload().len(),
            );
        }
        partition.open_halos(space)?;

        // Local work while coordinates are in flight.
        report.internal_pairs = internal_pair_forces(space, engine);
        report.bonds += local_bond_forces(space, polymers, engine, unsplit, extent);

        for (lane, token) in exchange.lanes.iter_mut().zip(coordinate_tokens) {
            let ctx = ValidationContext::new(rank, world)
                .with_peer(lane.neighbour)
                .with_extent(extent);
            lane.coordinates_in.wait_receive(transport, token, &ctx)?;
            let side = lane.direction;
            let region = partition.region_mut(side);
            let mut staged = 0;
            for (id, kind, position, velocity) in lane.coordinates_in.payload().iter() {
                let local = space.geometry().from_neighbour_frame(position, side);
                let ghost = Ghost::remote(id, kind, local, velocity, side, lane.neighbour);
                region.stage_external_particle(space, ghost)?;
                staged += 1;
            }
            metrics.record_ghosts(side, staged);
            report.ghosts += staged;
        }
        for (lane, token) in exchange.lanes.iter().zip(send_tokens) {
            lane.coordinates_out.wait_send(transport, token)?;
        }

        report.images = space.add_periodic_images(unsplit)?;
        metrics.record_self_images(report.images);
        partition.mark_populated()?;

        report.shared_pairs = shared_pair_forces(space, engine);
        let (bonds, missing) = shared_bond_forces(space, polymers, engine);
        report.bonds += bonds;
        for (head, tail) in missing {
            warn!(rank = rank.0, step, head = %head, tail = %tail, "Bond partner not found, bond skipped");
            metrics.record_missing_bond_partner(head, tail);
            report.missing_bond_partners += 1;
        }
        partition.mark_consumed()?;

        // Return what remote ghosts accumulated.
        space.resolve_image_forces();
        let mut owed = space.remote_forces();
        let mut reply_send_tokens = Vec::with_capacity(exchange.lanes.len());
        for lane in &mut exchange.lanes {
            let bundle = lane.forces_out.payload_mut();
            bundle.clear();
            if let Some((_, forces)) = owed.remove(&lane.direction) {
                for (id, force) in forces {
                    bundle.push(id, force);
                }
            }
            let count = bundle.len();
            let ctx = ValidationContext::new(rank, world).with_peer(lane.neighbour);
            lane.forces_out.validate(&ctx)?;
            reply_send_tokens.push(lane.forces_out.send_async(transport, lane.neighbour)?);
            metrics.record_force_replies(lane.direction, count);
            metrics.record_message_sent(Channel::GhostForces.name(), count);
            report.replies_sent += count;
        }

        for (lane, token) in exchange.lanes.iter_mut().zip(reply_tokens) {
            let ctx = ValidationContext::new(rank, world).with_peer(lane.neighbour);
            lane.forces_in.wait_receive(transport, token, &ctx)?;
            for (id, force) in lane.forces_in.payload().iter() {
                let slot = space.slot_of(id).ok_or(ProtocolError::UnknownForceTarget {
                    id,
                    from: lane.neighbour,
                })?;
                space.add_force(slot, force);
                report.replies_received += 1;
            }
        }
        for (lane, token) in exchange.lanes.iter().zip(reply_send_tokens) {
            lane.forces_out.wait_send(transport, token)?;
        }

        debug!(
            rank = rank.0,
            step,
            ghosts = report.ghosts,
            images = report.images,
            pairs = report.internal_pairs + report.shared_pairs,
            bonds = report.bonds,
            "Forces synced"
        );
        Ok(report)
    }
}

// ─── Pair forces ────────────────────────────────────────────────────────

fn internal_pair_forces<E: PhysicsEngine>(space: &mut Space, engine: &E) -> usize {
    let geometry = space.geometry().clone();
    let cutoff_sq = engine.cutoff() * engine.cutoff();
    let mut pending: Vec<(Slot, Slot, DVec3)> = Vec::new();
    {
        let space = &*space;
        let mut evaluate = |a: Slot, b: Slot| {
            let (Some(x), Some(y)) = (space.bead(a), space.bead(b)) else {
                return;
            };
            let separation = x.position - y.position;
            if separation.length_squared() < cutoff_sq {
                let force = engine.pair_force(&Particle::from(x), &Particle::from(y), separation);
                pending.push((a, b, force));
            }
        };
        for coord in geometry.real_cells() {
            let here = space.cell_slots(geometry.index(coord));
            for (i, &a) in here.iter().enumerate() {
                for &b in &here[i + 1..] {
                    evaluate(a, b);
                }
            }
            for d in Direction::forward() {
                let other = coord.offset(d);
                if !geometry.is_real(other) {
                    continue;
                }
                for &a in here {
                    for &b in space.cell_slots(geometry.index(other)) {
                        evaluate(a, b);
                    }
                }
            }
        }
    }
    let count = pending.len();
    for (a, b, force) in pending {
        space.add_force(a, force);
        space.add_force(b, -force);
    }
    count
}

fn shared_pair_forces<E: PhysicsEngine>(space: &mut Space, engine: &E) -> usize {
    let geometry = space.geometry().clone();
    let cutoff_sq = engine.cutoff() * engine.cutoff();
    let mut pending: Vec<(Slot, usize, DVec3)> = Vec::new();
    for coord in geometry.real_cells() {
        let here = space.cell_slots(geometry.index(coord));
        if here.is_empty() {
            continue;
        }
        for d in Direction::forward() {
            let other = coord.offset(d);
            if geometry.is_real(other) {
                continue;
            }
            let ghosts = space.halo().cell(geometry.index(other));
            for &a in here {
                let Some(bead) = space.bead(a) else { continue };
                for &g in ghosts {
                    let Some(ghost) = space.halo().ghost(g) else { continue };
                    let separation = bead.position - ghost.position;
                    if separation.length_squared() < cutoff_sq {
                        let partner = Particle {
                            id: ghost.id,
                            kind: ghost.kind,
                            velocity: ghost.velocity,
                        };
                        let force = engine.pair_force(&Particle::from(bead), &partner, separation);
                        pending.push((a, g, force));
                    }
                }
            }
        }
    }
    let count = pending.len();
    for (a, g, force) in pending {
        space.add_force(a, force);
        space.add_ghost_force(g, -force);
    }
    count
}

// ─── Bond forces ────────────────────────────────────────────────────────

/// Shortest image of a separation along axes where the Space wraps onto itself.
fn minimum_image(mut separation: DVec3, unsplit: [bool; 3], extent: DVec3) -> DVec3 {
    for a in (0..3).filter(|a| unsplit[*a]) {
        let half = 0.5 * extent[a];
        if separation[a] > half {
            separation[a] -= extent[a];
        } else if separation[a] < -half {
            separation[a] += extent[a];
        }
    }
    separation
}

/// Bonds with both ends local.
fn local_bond_forces<E: PhysicsEngine>(
    space: &mut Space,
    polymers: &PolymerRegistry,
    engine: &E,
    unsplit: [bool; 3],
    extent: DVec3,
) -> usize {
    let mut pending: Vec<(Slot, Slot, DVec3)> = Vec::new();
    for bond in polymers.bonds() {
        let (Some(h), Some(t)) = (space.slot_of(bond.head), space.slot_of(bond.tail)) else {
            continue;
        };
        let (Some(head), Some(tail)) = (space.bead(h), space.bead(t)) else {
            continue;
        };
        let separation = minimum_image(head.position - tail.position, unsplit, extent);
        pending.push((h, t, engine.bond_force(bond, separation)));
    }
    let count = pending.len();
    for (h, t, force) in pending {
        space.add_force(h, force);
        space.add_force(t, -force);
    }
    count
}

/// Bonds with a local head and a tail held elsewhere, against the nearest
/// staged copy of the tail. Returns the count evaluated and the bonds whose
/// tail has no copy.
fn shared_bond_forces<E: PhysicsEngine>(
    space: &mut Space,
    polymers: &PolymerRegistry,
    engine: &E,
) -> (usize, Vec<(meso_types::BeadId, meso_types::BeadId)>) {
    let mut pending: Vec<(Slot, usize, DVec3)> = Vec::new();
    let mut missing = Vec::new();
    for bond in polymers.bonds() {
        let Some(h) = space.slot_of(bond.head) else {
            continue;
        };
        if space.contains(bond.tail) {
            continue;
        }
        let Some(head) = space.bead(h) else { continue };
        match nearest_copy(space, bond, head.position) {
            Some((g, separation)) => pending.push((h, g, engine.bond_force(bond, separation))),
            None => missing.push((bond.head, bond.tail)),
        }
    }
    let count = pending.len();
    for (h, g, force) in pending {
        space.add_force(h, force);
        space.add_ghost_force(g, -force);
    }
    (count, missing)
}

fn nearest_copy(space: &Space, bond: &Bond, head: DVec3) -> Option<(usize, DVec3)> {
    space
        .halo()
        .copies_of(bond.tail)
        .iter()
        .filter_map(|&g| space.halo().ghost(g).map(|ghost| (g, head - ghost.position)))
        .min_by(|a, b| a.1.length_squared().total_cmp(&b.1.length_squared()))
}
