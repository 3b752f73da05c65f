//! Network gap filling
//!
//! Replaces invalid slopes and temperatures with the mean of the same attribute
//! on the immediately adjacent reaches:
//!
//! - upstream neighbours: reaches whose `to_node` is the target's `from_node`
//! - downstream neighbours: reaches whose `from_node` is the target's `to_node`
//!
//! Imputation looks exactly one hop away and never uses basin-wide statistics.
//! Deciding which reaches are invalid is the caller's job; this module only
//! repairs the reaches it is told to.

use log::debug;
use rivco2_core::config::DEFAULT_SLOPE_FLOOR;
use rivco2_core::errors::RivCO2Result;
use rivco2_core::reach::{NodeId, ReachTable};
use rivco2_core::values::{nan_mean, FloatValue};
use std::collections::HashMap;

/// Values of the one-hop neighbours of a reach
///
/// The three columns are parallel and must have the same length.
fn neighbour_values(
    from_node: NodeId,
    to_node: NodeId,
    values: &[FloatValue],
    from_nodes: &[NodeId],
    to_nodes: &[NodeId],
) -> Vec<FloatValue> {
    debug_assert_eq!(values.len(), from_nodes.len(), "column length mismatch");
    debug_assert_eq!(values.len(), to_nodes.len(), "column length mismatch");
    values
        .iter()
        .zip(from_nodes.iter().zip(to_nodes.iter()))
        .filter(|(_, (from, to))| **to == from_node || **from == to_node)
        .map(|(value, _)| *value)
        .collect()
}

/// Mean of the positive neighbour slopes, or `floor` if there are none.
///
/// Zero and negative slopes on neighbours are themselves erroneous and are
/// dropped before averaging.
fn mean_positive_or_floor(values: &[FloatValue], floor: FloatValue) -> FloatValue {
    let valid: Vec<FloatValue> = values.iter().copied().filter(|s| *s > 0.0).collect();
    if valid.is_empty() {
        floor
    } else {
        nan_mean(&valid)
    }
}

/// Repair the slope of one reach from its one-hop neighbours
///
/// `slopes`, `from_nodes` and `to_nodes` are parallel columns of the same
/// reach table. Mismatched lengths panic in debug builds.
pub fn repair_slope(
    from_node: NodeId,
    to_node: NodeId,
    slopes: &[FloatValue],
    from_nodes: &[NodeId],
    to_nodes: &[NodeId],
    floor: FloatValue,
) -> FloatValue {
    let neighbours = neighbour_values(from_node, to_node, slopes, from_nodes, to_nodes);
    mean_positive_or_floor(&neighbours, floor)
}

/// Repair the water temperature of one reach from its one-hop neighbours.
///
/// Missing when no neighbour has a temperature. The columns follow the same
/// contract as [`repair_slope`].
pub fn repair_temperature(
    from_node: NodeId,
    to_node: NodeId,
    temperatures: &[FloatValue],
    from_nodes: &[NodeId],
    to_nodes: &[NodeId],
) -> FloatValue {
    nan_mean(&neighbour_values(
        from_node,
        to_node,
        temperatures,
        from_nodes,
        to_nodes,
    ))
}

/// Lookup from node id to the reaches that start or end there
#[derive(Debug, Clone, Default)]
pub struct NeighbourIndex {
    by_from_node: HashMap<NodeId, Vec<usize>>,
    by_to_node: HashMap<NodeId, Vec<usize>>,
}

impl NeighbourIndex {
    pub fn build(table: &ReachTable) -> Self {
        let mut index = Self::default();
        for (i, reach) in table.iter().enumerate() {
            index.by_from_node.entry(reach.from_node).or_default().push(i);
            index.by_to_node.entry(reach.to_node).or_default().push(i);
        }
        index
    }

    /// Reaches flowing into the reach that starts at `from_node`
    pub fn upstream(&self, from_node: NodeId) -> &[usize] {
        self.by_to_node
            .get(&from_node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Reaches receiving flow from the reach that ends at `to_node`
    pub fn downstream(&self, to_node: NodeId) -> &[usize] {
        self.by_from_node
            .get(&to_node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Upstream then downstream neighbours of a reach
    pub fn neighbours(
        &self,
        from_node: NodeId,
        to_node: NodeId,
    ) -> impl Iterator<Item = usize> + '_ {
        self.upstream(from_node)
            .iter()
            .chain(self.downstream(to_node).iter())
            .copied()
    }
}

/// Counts of what a gap filling pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GapFillReport {
    pub slopes_repaired: usize,
    /// Repaired slopes that fell back to the floor value
    pub slopes_floored: usize,
    pub temperatures_repaired: usize,
    /// Repaired temperatures left missing for lack of neighbours
    pub temperatures_missing: usize,
}

/// Batch gap filler for a whole basin
///
/// All attribute vectors are snapshotted before any reach is modified, so a
/// repaired value never feeds into the repair of another reach.
#[derive(Debug, Clone)]
pub struct GapFiller {
    slope_floor: FloatValue,
}

impl Default for GapFiller {
    fn default() -> Self {
        Self::new(DEFAULT_SLOPE_FLOOR)
    }
}

impl GapFiller {
    pub fn new(slope_floor: FloatValue) -> Self {
        Self { slope_floor }
    }

    /// Repair flagged slopes (river reaches only) and temperatures in place
    pub fn repair_table(
        &self,
        table: &mut ReachTable,
        invalid_slope: &[bool],
        invalid_temperature: &[bool],
    ) -> RivCO2Result<GapFillReport> {
        table.check_column_len("invalid_slope", invalid_slope.len())?;
        table.check_column_len("invalid_temperature", invalid_temperature.len())?;

        let index = NeighbourIndex::build(table);
        let slopes = table.slopes();
        let temperatures = table.water_temperatures();
        let mut report = GapFillReport::default();

        for (i, reach) in table.iter_mut().enumerate() {
            let neighbours: Vec<usize> =
                index.neighbours(reach.from_node, reach.to_node).collect();

            if invalid_slope[i] && reach.is_river() {
                let values: Vec<FloatValue> = neighbours.iter().map(|j| slopes[*j]).collect();
                reach.slope = mean_positive_or_floor(&values, self.slope_floor);
                report.slopes_repaired += 1;
                if reach.slope == self.slope_floor {
                    report.slopes_floored += 1;
                }
            }

            if invalid_temperature[i] {
                let values: Vec<FloatValue> =
                    neighbours.iter().map(|j| temperatures[*j]).collect();
                reach.water_temp_c = nan_mean(&values);
                report.temperatures_repaired += 1;
                if reach.water_temp_c.is_nan() {
                    report.temperatures_missing += 1;
                }
            }
        }

        debug!(
            "Gap filling repaired {} slopes ({} at floor) and {} temperatures ({} still missing)",
            report.slopes_repaired,
            report.slopes_floored,
            report.temperatures_repaired,
            report.temperatures_missing
        );
        Ok(report)
    }
}
