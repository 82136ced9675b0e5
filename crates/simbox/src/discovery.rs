//! Neighbour discovery and the root handshake.
//!
//! Every rank checks locally that the configured grid tiles the world, then
//! reports `[rank, cx, cy, cz, px, py, pz]` to the root. The root compares
//! each report with what the grid predicts and broadcasts a verdict: `[1]`
//! when every rank agrees, `[0, rank]` naming the first rank that does not.

use crate::simbox::{Discovered, HANDSHAKE_ID};
use crate::{SetupError, SimBox};
use meso_messages::{Channel, ScalarAggregate, ValidationContext};
use meso_transport::Transport;
use meso_types::{GridCoord, GridShape, Pid};
use tracing::{error, info, warn};

impl<T: Transport> SimBox<T> {
    /// Check the grid, build the neighbour table and run the root handshake.
    ///
    /// Any failure sets [`assembly_failed`](Self::assembly_failed).
    pub fn discover_neighbours(&mut self) -> Result<(), SetupError> {
        if self.assembly_failed {
            return Err(SetupError::AssemblyFailed);
        }
        let result = self.try_discover();
        match &result {
            Ok(()) => {}
            Err(e) => {
                self.assembly_failed = true;
                error!(rank = self.rank.0, error = %e, "Neighbour discovery failed");
            }
        }
        result
    }

    fn try_discover(&mut self) -> Result<(), SetupError> {
        let grid = self.config.grid;
        grid.check_tiles(self.transport.world_size())?;
        let topology = grid.topology()?;
        let coord = grid.coord_of(self.rank)?;
        let neighbours = grid.neighbour_table(coord);
        self.handshake(grid, coord)?;

        info!(
            rank = self.rank.0,
            coord = %coord,
            topology = topology.name(),
            neighbours = neighbours.external_count(),
            "Neighbours discovered"
        );
        self.discovered = Some(Discovered { coord, neighbours });
        Ok(())
    }

    fn handshake(&self, grid: GridShape, coord: GridCoord) -> Result<(), SetupError> {
        let world = self.transport.world_size();
        let ctx = ValidationContext::new(self.rank, world);
        let mut message = self.control_message(HANDSHAKE_ID, Channel::Handshake)?;

        if self.rank == Pid::ROOT {
            let mut first_bad = None;
            for r in 1..world as u32 {
                let peer = Pid(r);
                message.receive_from(&self.transport, peer, &ctx)?;
                let report = &message.payload().counts;
                if !report_matches(grid, peer, report) {
                    warn!(rank = self.rank.0, peer = peer.0, ?report, "Handshake report disagrees with grid");
                    first_bad.get_or_insert(peer);
                }
            }
            let verdict = match first_bad {
                None => vec![1],
                Some(peer) => vec![0, peer.0 as u64],
            };
            message.set_payload(ScalarAggregate::from_counts(verdict));
            message.validate(&ctx)?;
        } else {
            message.set_payload(ScalarAggregate::from_counts(expected_report(grid, self.rank, coord)));
            message.validate(&ctx)?;
            message.send_to_root(&self.transport)?;
        }
        message.broadcast(&self.transport, Pid::ROOT, &ctx)?;

        match message.payload().counts.as_slice() {
            [1] => Ok(()),
            [0, bad] => Err(SetupError::HandshakeRejected(Pid(*bad as u32))),
            other => Err(SetupError::MalformedVerdict(other.to_vec())),
        }
    }
}

fn expected_report(grid: GridShape, rank: Pid, coord: GridCoord) -> Vec<u64> {
    vec![
        rank.0 as u64,
        coord.x as u64,
        coord.y as u64,
        coord.z as u64,
        grid.x as u64,
        grid.y as u64,
        grid.z as u64,
    ]
}

fn report_matches(grid: GridShape, peer: Pid, report: &[u64]) -> bool {
    match grid.coord_of(peer) {
        Ok(coord) => report == expected_report(grid, peer, coord).as_slice(),
        Err(_) => false,
    }
}
