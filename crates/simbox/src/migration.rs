//! Position sync: advance every bead and hand departing beads to their new
//! owner.
//!
//! Beads of external regions are advanced first, as copies, so that nothing
//! is lost if an outgoing bundle fails validation. Each copy either stays
//! (wrapping along single-process axes) or departs toward exactly one message
//! direction, already translated into the receiver's frame. Internal regions
//! and Bulk are advanced in place while relocations are in flight; none of
//! their beads may leave.

use crate::error::Failure;
use crate::simbox::Assembled;
use crate::{PhysicsEngine, ProtocolError, SetupError, SimBox, StepError};
use meso_messages::{Channel, Payload, ValidationContext};
use meso_metrics::MetricsRecorder;
use meso_space::{clamp_into_frame, Slot, SpaceGeometry};
use meso_transport::Transport;
use glam::DVec3;
use meso_types::{Bead, PolymerId};
use std::collections::BTreeSet;
use tracing::{debug, error, trace};

/// What one position sync did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// Beads handed to neighbours.
    pub departed: usize,
    /// Beads received from neighbours.
    pub arrived: usize,
    /// Beads wrapped in place along single-process axes.
    pub wrapped: usize,
    /// Staying beads that changed cell.
    pub rebinned: usize,
    /// Polymer records held with members elsewhere after the sync.
    pub extended_polymers: usize,
}

enum Fate {
    Stay { wrapped: bool },
    Depart(usize),
}

impl<T: Transport> SimBox<T> {
    /// Advance every local bead and transfer ownership of those that left.
    pub fn sync_positions<E: PhysicsEngine, M: MetricsRecorder>(
        &mut self,
        engine: &E,
        metrics: &mut M,
    ) -> Result<MigrationReport, StepError> {
        let step = self.step;
        self.exchange_positions(engine, metrics).map_err(|failure| {
            let e = failure.at(step);
            error!(rank = self.rank.0, step, class = e.class(), error = %e, "Position sync failed");
            e
        })
    }

    fn exchange_positions<E: PhysicsEngine, M: MetricsRecorder>(
        &mut self,
        engine: &E,
        metrics: &mut M,
    ) -> Result<MigrationReport, Failure> {
        let rank = self.rank;
        let world = self.transport.world_size();
        let step = self.step;
        let transport = &self.transport;
        let polymers = &mut self.polymers;
        let Assembled {
            space,
            partition,
            exchange,
        } = self.assembled.as_mut().ok_or(SetupError::NotAssembled)?;
        let geometry = space.geometry().clone();
        let extent = geometry.extent();
        let mut report = MigrationReport::default();

        // Advance copies of external-region beads and sort out where they go.
        let external: Vec<usize> = partition.external_cells().collect();
        let mut staying: Vec<(Slot, Bead)> = Vec::new();
        let mut departing: Vec<Vec<Bead>> = vec![Vec::new(); exchange.lanes.len()];
        for cell in external {
            for &slot in space.cell_slots(cell) {
                let Some(bead) = space.bead(slot) else { continue };
                let from = bead.position;
                let mut bead = bead.clone();
                engine.advance(&mut bead);
                match classify(&geometry, partition, exchange, from, &mut bead)? {
                    Fate::Stay { wrapped } => {
                        report.wrapped += usize::from(wrapped);
                        staying.push((slot, bead));
                    }
                    Fate::Depart(lane) => departing[lane].push(bead),
                }
            }
        }

        let mut receive_tokens = Vec::with_capacity(exchange.lanes.len());
        for lane in &exchange.lanes {
            receive_tokens.push(lane.relocation_in.receive_async(transport, lane.upstream)?);
        }

        // Every bundle must validate before anything leaves the store.
        for (lane, beads) in exchange.lanes.iter_mut().zip(&mut departing) {
            let bundle = lane.relocation_out.payload_mut();
            bundle.clear();
            for bead in beads.drain(..) {
                if let Some(record) = bead.polymer.and_then(|p| polymers.get(p)) {
                    bundle.push_polymer(record);
                }
                bundle.push_bead(bead);
            }
            let ctx = ValidationContext::new(rank, world)
                .with_peer(lane.neighbour)
                .with_extent(extent);
            lane.relocation_out.validate(&ctx)?;
        }

        let mut send_tokens = Vec::with_capacity(exchange.lanes.len());
        let mut touched: BTreeSet<PolymerId> = BTreeSet::new();
        for lane in &exchange.lanes {
            send_tokens.push(lane.relocation_out.send_async(transport, lane.neighbour)?);
            let bundle = lane.relocation_out.payload();
            for bead in &bundle.beads {
                space.remove(bead.id)?;
                touched.extend(bead.polymer);
                trace!(rank = rank.0, step, id = %bead.id, direction = %lane.direction, "Bead departed");
            }
            metrics.record_departures(lane.direction, bundle.beads.len());
            metrics.record_message_sent(Channel::Relocation.name(), bundle.len());
            report.departed += bundle.beads.len();
        }

        // Internal regions and Bulk, in place.
        let internal: Vec<usize> = partition.internal_cells().collect();
        for cell in internal {
            let slots = space.cell_slots(cell).to_vec();
            for slot in slots {
                let Some(bead) = space.bead_mut(slot) else { continue };
                let from = bead.position;
                engine.advance(bead);
                if let Some(axis) = geometry.escaped(from, bead.position) {
                    return Err(ProtocolError::Escaped {
                        id: bead.id,
                        axis,
                        position: bead.position,
                    }
                    .into());
                }
                let mut signs = geometry.exit_signs(bead.position);
                // A full cell-width step from the cell next to a split face
                // can round onto that face; keep such a bead on this side.
                for a in 0..3 {
                    let mut along = [0; 3];
                    along[a] = signs[a];
                    if signs[a] == 0 || partition.departure_direction(along).is_none() {
                        continue;
                    }
                    if !geometry.within_edge_slack(bead.position[a], a) {
                        return Err(ProtocolError::UnexpectedDeparture {
                            id: bead.id,
                            position: bead.position,
                        }
                        .into());
                    }
                    bead.position[a] = clamp_into_frame(bead.position[a], extent[a]);
                    signs[a] = 0;
                }
                if signs == [0; 3] {
                    continue;
                }
                bead.position = geometry.shift_into_frame(bead.position, signs);
                report.wrapped += 1;
            }
        }

        for (slot, bead) in staying {
            if let Some(held) = space.bead_mut(slot) {
                *held = bead;
            }
        }
        report.rebinned = space.rebin()?;

        for (lane, token) in exchange.lanes.iter_mut().zip(receive_tokens) {
            let ctx = ValidationContext::new(rank, world)
                .with_peer(lane.upstream)
                .with_extent(extent);
            lane.relocation_in.wait_receive(transport, token, &ctx)?;
            let bundle = lane.relocation_in.take_payload();
            for polymer in bundle.polymers {
                touched.insert(polymer.id);
                polymers.insert(polymer);
            }
            let arrived = bundle.beads.len();
            for bead in bundle.beads {
                if geometry.real_cell_of(bead.position).is_none() {
                    return Err(ProtocolError::ArrivalOutOfRange {
                        id: bead.id,
                        from: lane.upstream,
                        position: bead.position,
                    }
                    .into());
                }
                if space.contains(bead.id) {
                    return Err(ProtocolError::DuplicateOwnership {
                        id: bead.id,
                        from: lane.upstream,
                    }
                    .into());
                }
                touched.extend(bead.polymer);
                space.insert(bead)?;
            }
            metrics.record_arrivals(lane.direction, arrived);
            report.arrived += arrived;
        }
        for (lane, token) in exchange.lanes.iter().zip(send_tokens) {
            lane.relocation_out.wait_send(transport, token)?;
        }

        for id in touched {
            polymers.refresh(id, space);
        }
        report.extended_polymers = polymers
            .iter()
            .filter(|p| p.members.iter().any(|m| !space.contains(*m)))
            .count();

        metrics.record_migration(step, report.departed, report.arrived);
        debug!(
            rank = rank.0,
            step,
            departed = report.departed,
            arrived = report.arrived,
            wrapped = report.wrapped,
            "Positions synced"
        );
        self.step += 1;
        Ok(report)
    }
}

/// Decide where an advanced copy of an external-region bead goes.
///
/// A staying bead is shifted back into the frame; a departing one into the
/// frame of the neighbour it departs to.
fn classify(
    geometry: &SpaceGeometry,
    partition: &meso_space::Partition,
    exchange: &crate::exchange::Exchange,
    from: DVec3,
    bead: &mut Bead,
) -> Result<Fate, ProtocolError> {
    if let Some(axis) = geometry.escaped(from, bead.position) {
        return Err(ProtocolError::Escaped {
            id: bead.id,
            axis,
            position: bead.position,
        });
    }
    let signs = geometry.exit_signs(bead.position);
    if signs == [0; 3] {
        return Ok(Fate::Stay { wrapped: false });
    }
    bead.position = geometry.shift_into_frame(bead.position, signs);
    match partition.departure_direction(signs) {
        None => Ok(Fate::Stay { wrapped: true }),
        Some(direction) => match exchange.lane_index(direction) {
            Some(lane) => Ok(Fate::Depart(lane)),
            None => Err(ProtocolError::UnexpectedDeparture {
                id: bead.id,
                position: bead.position,
            }),
        },
    }
}
