//! Drainage basins and the basin-to-basin routing graph
//!
//! Each basin (a HUC4 hydrologic unit) is modelled independently and hands the
//! state of its boundary outflow to the basin(s) it drains into. The
//! [`BasinLookup`] records those links as read from the basin lookup table and
//! [`BasinGraph`] turns them into a directed acyclic graph so that basins can be
//! run in an order where every upstream contributor has finished first.

use crate::errors::{RivCO2Error, RivCO2Result};
use log::debug;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::{Direction, Graph};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// A HUC4 basin code such as `"0418"`
///
/// Some basins are split into lettered parts (`"1710a"`, `"1710b"`) that are
/// modelled separately but reported under their parent code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BasinCode(String);

impl BasinCode {
    pub fn new(code: &str) -> RivCO2Result<Self> {
        let code = code.trim();
        let bytes = code.as_bytes();
        let digits_ok = bytes.len() >= 4 && bytes[..4].iter().all(u8::is_ascii_digit);
        let suffix_ok = match bytes.len() {
            4 => true,
            5 => bytes[4].is_ascii_lowercase(),
            _ => false,
        };
        if !(digits_ok && suffix_ok) {
            return Err(RivCO2Error::InvalidBasinCode(code.to_string()));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is a lettered part of a split basin
    pub fn is_composite(&self) -> bool {
        self.0.len() == 5
    }

    /// The 4-digit parent code. Plain codes are their own parent.
    pub fn parent(&self) -> BasinCode {
        BasinCode(self.0[..4].to_string())
    }

    /// The 2-digit hydrologic region the basin belongs to
    pub fn region(&self) -> &str {
        &self.0[..2]
    }
}

impl fmt::Display for BasinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BasinCode {
    type Err = RivCO2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BasinCode {
    type Error = RivCO2Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<BasinCode> for String {
    fn from(value: BasinCode) -> Self {
        value.0
    }
}

/// Basin lookup table: which basins receive flow from which
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BasinLookup {
    downstream: BTreeMap<BasinCode, Vec<BasinCode>>,
}

impl BasinLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a lookup from `(basin, downstream)` rows.
    ///
    /// A basin may appear on several rows when it drains into more than one
    /// basin. A row with no downstream basin marks a terminal basin.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (BasinCode, Option<BasinCode>)>,
    {
        let mut lookup = Self::new();
        for (basin, downstream) in rows {
            lookup.add(basin, downstream);
        }
        lookup
    }

    /// Add a single lookup row
    pub fn add(&mut self, basin: BasinCode, downstream: Option<BasinCode>) {
        let targets = self.downstream.entry(basin).or_default();
        if let Some(target) = downstream {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    pub fn contains(&self, basin: &BasinCode) -> bool {
        self.downstream.contains_key(basin)
    }

    /// Downstream basins of `basin`. Empty for terminal or unknown basins.
    pub fn downstream_of(&self, basin: &BasinCode) -> &[BasinCode] {
        self.downstream
            .get(basin)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Basins with no recorded downstream basin
    pub fn terminal_basins(&self) -> impl Iterator<Item = &BasinCode> {
        self.downstream
            .iter()
            .filter(|(_, targets)| targets.is_empty())
            .map(|(basin, _)| basin)
    }

    pub fn basins(&self) -> impl Iterator<Item = &BasinCode> {
        self.downstream.keys()
    }
}

/// Directed acyclic graph of basins, with edges pointing downstream.
///
/// Basins are stored in an arena and connected by index. Building the graph
/// fails if the lookup describes a cycle, since no valid execution order exists
/// in that case.
#[derive(Debug, Clone)]
pub struct BasinGraph {
    graph: Graph<BasinCode, ()>,
    indexes: HashMap<BasinCode, NodeIndex>,
    order: Vec<NodeIndex>,
}

impl BasinGraph {
    pub fn from_lookup(lookup: &BasinLookup) -> RivCO2Result<Self> {
        let mut graph = Graph::new();
        let mut indexes = HashMap::new();

        let mut node_for = |graph: &mut Graph<BasinCode, ()>, code: &BasinCode| {
            *indexes
                .entry(code.clone())
                .or_insert_with(|| graph.add_node(code.clone()))
        };

        for basin in lookup.basins() {
            let upstream = node_for(&mut graph, basin);
            for target in lookup.downstream_of(basin) {
                let downstream = node_for(&mut graph, target);
                graph.update_edge(upstream, downstream, ());
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| RivCO2Error::CyclicBasinGraph(graph[cycle.node_id()].to_string()))?;

        debug!(
            "Built basin graph with {} basins and {} links",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(Self {
            graph,
            indexes,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, basin: &BasinCode) -> bool {
        self.indexes.contains_key(basin)
    }

    fn index(&self, basin: &BasinCode) -> RivCO2Result<NodeIndex> {
        self.indexes
            .get(basin)
            .copied()
            .ok_or_else(|| RivCO2Error::UnknownBasin(basin.to_string()))
    }

    /// Basins ordered so that every basin comes after all of its upstream contributors
    pub fn topological_order(&self) -> Vec<&BasinCode> {
        self.order.iter().map(|idx| &self.graph[*idx]).collect()
    }

    /// Basins that drain directly into `basin`
    pub fn upstream_of(&self, basin: &BasinCode) -> RivCO2Result<Vec<&BasinCode>> {
        let idx = self.index(basin)?;
        let mut upstream: Vec<&BasinCode> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| &self.graph[n])
            .collect();
        upstream.sort();
        Ok(upstream)
    }

    /// Basins that `basin` drains directly into
    pub fn downstream_of(&self, basin: &BasinCode) -> RivCO2Result<Vec<&BasinCode>> {
        let idx = self.index(basin)?;
        let mut downstream: Vec<&BasinCode> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| &self.graph[n])
            .collect();
        downstream.sort();
        Ok(downstream)
    }

    /// Group basins into waves that can be run concurrently.
    ///
    /// A basin's wave is one more than the latest wave among its upstream
    /// contributors, so no two basins in a wave depend on each other.
    pub fn waves(&self) -> Vec<Vec<&BasinCode>> {
        let mut level: HashMap<NodeIndex, usize> = HashMap::new();
        for idx in &self.order {
            let wave = self
                .graph
                .neighbors_directed(*idx, Direction::Incoming)
                .filter_map(|n| level.get(&n))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level.insert(*idx, wave);
        }

        let n_waves = level.values().max().map(|m| m + 1).unwrap_or(0);
        let mut waves: Vec<Vec<&BasinCode>> = vec![Vec::new(); n_waves];
        for idx in &self.order {
            waves[level[idx]].push(&self.graph[*idx]);
        }
        for wave in waves.iter_mut() {
            wave.sort();
        }
        waves
    }
}
