//! Cross-basin routing
//!
//! Each basin is modelled on its own. After a basin has been solved, the
//! [`BasinRouter`] identifies the reaches that carry its outflow into each
//! downstream basin and emits one [`ExportRecord`] per such reach. The
//! downstream basin's run then receives those records as boundary inflows.
//!
//! The router only identifies boundary reaches: the CO2 and discharge it
//! exports are exactly those of the exporting reach.
//!
//! Two situations are resolved without an error:
//!
//! - no reach of the downstream basin starts at an outflow node of this basin
//!   (typically an outlet into a large lake without a modelled connecting
//!   reach): a single fallback record uses the basin's maximum-discharge
//!   flowing reach as a proxy, with node and discharge left missing. A basin
//!   without any flowing reach exports nothing but the downstream code
//! - the basin has no downstream basin: a single all-missing record

use log::{debug, warn};
use rivco2_core::basin::{BasinCode, BasinLookup};
use rivco2_core::config::ModelConfig;
use rivco2_core::errors::{RivCO2Error, RivCO2Result};
use rivco2_core::reach::{NodeId, Reach, ReachId, ReachTable};
use rivco2_core::values::{nan_argmax, nan_mean, nan_sum, FloatValue, MISSING};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Flow divergence code of a hydrography flowline
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Divergence {
    /// Not part of a divergence
    None,
    /// Main path of a divergence
    Main,
    /// Minor path of a divergence
    Minor,
}

/// A flowline of the hydrography of a basin, as provided by the ingestion layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrographyReach {
    pub id: ReachId,
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub q_m3_s: FloatValue,
    /// Hydrologic sequence number
    pub hydro_seq: Option<u64>,
    pub divergence: Divergence,
    /// Stream level in the network hierarchy
    pub stream_level: Option<u32>,
}

impl HydrographyReach {
    /// Whether the flowline can receive routed flow.
    ///
    /// It must be flowing, sequenced and not a minor divergence. The stream
    /// level check can be skipped for hydrography that does not carry one.
    pub fn is_routable(&self, require_stream_level: bool) -> bool {
        self.q_m3_s > 0.0
            && self.hydro_seq.is_some()
            && self.divergence != Divergence::Minor
            && (!require_stream_level || self.stream_level.is_some())
    }
}

/// Source of basin hydrography
///
/// Reading geodatabases is the job of the ingestion layer; the router only
/// needs the flowlines of the downstream basins.
pub trait HydrographySource {
    fn load(&self, basin: &BasinCode) -> RivCO2Result<Vec<HydrographyReach>>;
}

/// Hydrography held in memory, keyed by basin
#[derive(Debug, Clone, Default)]
pub struct InMemoryHydrography {
    basins: HashMap<BasinCode, Vec<HydrographyReach>>,
}

impl InMemoryHydrography {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, basin: BasinCode, reaches: Vec<HydrographyReach>) {
        self.basins.insert(basin, reaches);
    }
}

impl HydrographySource for InMemoryHydrography {
    fn load(&self, basin: &BasinCode) -> RivCO2Result<Vec<HydrographyReach>> {
        self.basins
            .get(basin)
            .cloned()
            .ok_or_else(|| RivCO2Error::UnknownBasin(basin.to_string()))
    }
}

/// Flow and CO2 state handed from one basin to a downstream basin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub source_basin: BasinCode,
    pub downstream_basin: Option<BasinCode>,
    pub exported_co2_ppm: FloatValue,
    pub exported_to_node: Option<NodeId>,
    pub exported_q_m3_s: FloatValue,
    /// Reach that exported the flow, or the proxy reach for a fallback record
    pub exporting_reach: Option<ReachId>,
}

impl ExportRecord {
    /// Record for a basin with no downstream basin
    pub fn terminal(source_basin: BasinCode) -> Self {
        Self {
            source_basin,
            downstream_basin: None,
            exported_co2_ppm: MISSING,
            exported_to_node: None,
            exported_q_m3_s: MISSING,
            exporting_reach: None,
        }
    }

    fn from_reach(source_basin: &BasinCode, downstream_basin: &BasinCode, reach: &Reach) -> Self {
        Self {
            source_basin: source_basin.clone(),
            downstream_basin: Some(downstream_basin.clone()),
            exported_co2_ppm: reach.co2_ppm,
            exported_to_node: Some(reach.to_node),
            exported_q_m3_s: reach.q_m3_s,
            exporting_reach: Some(reach.id),
        }
    }

    fn fallback(source_basin: &BasinCode, downstream_basin: &BasinCode, proxy: &Reach) -> Self {
        Self {
            source_basin: source_basin.clone(),
            downstream_basin: Some(downstream_basin.clone()),
            exported_co2_ppm: proxy.co2_ppm,
            exported_to_node: None,
            exported_q_m3_s: MISSING,
            exporting_reach: Some(proxy.id),
        }
    }

    /// Whether this is the all-missing record of a terminal basin
    pub fn is_terminal(&self) -> bool {
        self.downstream_basin.is_none()
    }

    /// Whether this record came from the maximum-discharge fallback
    pub fn is_fallback(&self) -> bool {
        self.downstream_basin.is_some() && self.exported_to_node.is_none()
    }
}

/// Indices of the reaches that carry flow across the boundary.
///
/// A reach is a boundary outflow reach when it is flowing and its `to_node` is
/// the `from_node` of a routable downstream flowline.
pub fn boundary_reaches(table: &ReachTable, inflow_nodes: &HashSet<NodeId>) -> Vec<usize> {
    table
        .iter()
        .enumerate()
        .filter(|(_, r)| r.q_m3_s > 0.0 && inflow_nodes.contains(&r.to_node))
        .map(|(i, _)| i)
        .collect()
}

/// Resolves the export records of a basin
pub struct BasinRouter<'a, S: HydrographySource> {
    lookup: &'a BasinLookup,
    source: &'a S,
    config: &'a ModelConfig,
}

impl<'a, S: HydrographySource> BasinRouter<'a, S> {
    pub fn new(lookup: &'a BasinLookup, source: &'a S, config: &'a ModelConfig) -> Self {
        Self {
            lookup,
            source,
            config,
        }
    }

    /// Inflow nodes of the routable flowlines of a downstream basin
    pub fn inflow_nodes(&self, downstream: &BasinCode) -> RivCO2Result<HashSet<NodeId>> {
        let require_stream_level = !self.config.is_indiana_exception(downstream);
        Ok(self
            .source
            .load(downstream)?
            .into_iter()
            .filter(|r| r.is_routable(require_stream_level))
            .map(|r| r.from_node)
            .collect())
    }

    /// Export records of `basin` for every downstream basin
    pub fn route(&self, basin: &BasinCode, table: &ReachTable) -> RivCO2Result<Vec<ExportRecord>> {
        let targets = self.lookup.downstream_of(basin);
        if targets.is_empty() {
            debug!("Basin {} has no downstream basin", basin);
            return Ok(vec![ExportRecord::terminal(basin.clone())]);
        }

        let mut records = Vec::new();
        for downstream in targets {
            let inflow_nodes = self.inflow_nodes(downstream)?;
            let boundary = boundary_reaches(table, &inflow_nodes);

            if boundary.is_empty() {
                let flowing: Vec<FloatValue> = table
                    .iter()
                    .map(|r| if r.q_m3_s > 0.0 { r.q_m3_s } else { MISSING })
                    .collect();
                match nan_argmax(&flowing).and_then(|(i, _)| table.get(i)) {
                    Some(proxy) => {
                        warn!(
                            "No reach of {} starts at an outflow node of {}; using reach {} (max discharge) as proxy exporter",
                            downstream, basin, proxy.id
                        );
                        records.push(ExportRecord::fallback(basin, downstream, proxy));
                    }
                    None => {
                        warn!("Basin {} has no flowing reach to export to {}", basin, downstream);
                        records.push(ExportRecord {
                            downstream_basin: Some(downstream.clone()),
                            ..ExportRecord::terminal(basin.clone())
                        });
                    }
                }
                continue;
            }

            debug!(
                "Basin {} exports to {} through {} reaches",
                basin,
                downstream,
                boundary.len()
            );
            records.extend(
                boundary
                    .iter()
                    .filter_map(|i| table.get(*i))
                    .map(|reach| ExportRecord::from_reach(basin, downstream, reach)),
            );
        }
        Ok(records)
    }
}

/// Merge records addressed to, or coming from, lettered basin parts into
/// their parent code.
///
/// Records sharing source, downstream basin and node after renaming are
/// combined: discharge is summed over distinct exporting reaches and CO2 is
/// discharge-weighted. A reach that exports into more than one lettered part
/// is counted once.
pub fn merge_composite_exports(records: Vec<ExportRecord>) -> Vec<ExportRecord> {
    type Key = (BasinCode, Option<BasinCode>, Option<NodeId>);
    let mut groups: BTreeMap<Key, Vec<ExportRecord>> = BTreeMap::new();

    for record in records {
        let key = (
            record.source_basin.parent(),
            record.downstream_basin.as_ref().map(BasinCode::parent),
            record.exported_to_node,
        );
        groups.entry(key).or_default().push(record);
    }

    groups
        .into_iter()
        .map(|((source, downstream, node), group)| {
            // A reach feeding several parts of one basin exports its flow once
            let mut seen = HashSet::new();
            let group: Vec<ExportRecord> = group
                .into_iter()
                .filter(|r| r.exporting_reach.map_or(true, |id| seen.insert(id)))
                .collect();

            let flows: Vec<FloatValue> = group.iter().map(|r| r.exported_q_m3_s).collect();
            let (weighted, weight) = group
                .iter()
                .filter(|r| !r.exported_q_m3_s.is_nan() && !r.exported_co2_ppm.is_nan())
                .fold((0.0, 0.0), |(acc, w), r| {
                    (acc + r.exported_co2_ppm * r.exported_q_m3_s, w + r.exported_q_m3_s)
                });
            let co2 = if weight > 0.0 {
                weighted / weight
            } else {
                nan_mean(&group.iter().map(|r| r.exported_co2_ppm).collect::<Vec<_>>())
            };
            let exporting_reach = match group.as_slice() {
                [single] => single.exporting_reach,
                _ => None,
            };

            ExportRecord {
                source_basin: source,
                downstream_basin: downstream,
                exported_co2_ppm: co2,
                exported_to_node: node,
                exported_q_m3_s: nan_sum(&flows),
                exporting_reach,
            }
        })
        .collect()
}

/// Records addressed to `basin`
pub fn imports_for<'r>(basin: &BasinCode, exports: &'r [ExportRecord]) -> Vec<&'r ExportRecord> {
    exports
        .iter()
        .filter(|r| r.downstream_basin.as_ref() == Some(basin))
        .collect()
}
