//! Reach data model
//!
//! A [`Reach`] is a single flowline segment or a fraction of a lake/reservoir
//! polygon. Which physical attributes are meaningful depends on its
//! [`Waterbody`]: rivers carry a length and a bed slope, lakes carry a volume and
//! a surface area. The attributes that do not apply are left [`MISSING`] rather
//! than zero.
//!
//! A [`ReachTable`] holds every reach of one basin. It is read once per basin
//! run, mutated in place by gap filling and the derived-property passes, and
//! discarded once the basin has been aggregated.

use crate::errors::{RivCO2Error, RivCO2Result};
use crate::values::{FloatValue, MISSING};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a node in the flowline network
pub type NodeId = u64;

/// Unique identifier of a reach
pub type ReachId = u64;

/// Kind of waterbody a reach represents
///
/// Every physical relationship in the model is defined separately for both
/// variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Waterbody {
    River,
    LakeReservoir,
}

impl Waterbody {
    pub const ALL: [Waterbody; 2] = [Waterbody::River, Waterbody::LakeReservoir];

    /// Tag used by the hydrography attribute tables
    pub fn tag(&self) -> &'static str {
        match self {
            Waterbody::River => "River",
            Waterbody::LakeReservoir => "Lake/Reservoir",
        }
    }
}

impl fmt::Display for Waterbody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for Waterbody {
    type Err = RivCO2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "River" => Ok(Waterbody::River),
            "Lake/Reservoir" | "LakeReservoir" => Ok(Waterbody::LakeReservoir),
            other => Err(RivCO2Error::UnknownWaterbody(other.to_string())),
        }
    }
}

fn missing() -> FloatValue {
    MISSING
}

/// At-a-station hydraulic geometry coefficients
///
/// Width is `exp(a) * Q^b` and depth is `exp(c) * Q^f`, so `a` and `c` are the
/// natural logs of the multiplicative coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AhgCoefficients {
    pub a: FloatValue,
    pub b: FloatValue,
    pub c: FloatValue,
    pub f: FloatValue,
}

impl Default for AhgCoefficients {
    fn default() -> Self {
        Self {
            a: MISSING,
            b: MISSING,
            c: MISSING,
            f: MISSING,
        }
    }
}

/// One modelled river segment or lake/reservoir fraction.
///
/// Fields below the "derived" marker are filled in by the hydraulic geometry,
/// gas exchange and flux passes and start out missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reach {
    pub id: ReachId,
    pub waterbody: Waterbody,
    /// Discharge (m^3/s)
    pub q_m3_s: FloatValue,
    /// Channel length (km), rivers only
    #[serde(default = "missing")]
    pub length_km: FloatValue,
    /// Bed slope (m/m), rivers only
    #[serde(default = "missing")]
    pub slope: FloatValue,
    /// Water temperature (degC)
    #[serde(default = "missing")]
    pub water_temp_c: FloatValue,
    /// Air temperature (degC)
    #[serde(default = "missing")]
    pub air_temp_c: FloatValue,
    /// Volume of this lake fraction (m^3), lakes only
    #[serde(default = "missing")]
    pub lake_volume_m3: FloatValue,
    /// Surface area of this lake fraction (m^2), lakes only
    #[serde(default = "missing")]
    pub lake_area_m2: FloatValue,
    #[serde(default)]
    pub ahg: AhgCoefficients,
    pub from_node: NodeId,
    pub to_node: NodeId,
    #[serde(default)]
    pub stream_order: Option<u32>,
    /// The reach crosses an international boundary
    #[serde(default)]
    pub international: bool,

    // derived
    #[serde(default = "missing")]
    pub width_m: FloatValue,
    #[serde(default = "missing")]
    pub depth_m: FloatValue,
    #[serde(default = "missing")]
    pub velocity_m_s: FloatValue,
    #[serde(default = "missing")]
    pub residence_time_s: FloatValue,
    /// Water surface area (m^2)
    #[serde(default = "missing")]
    pub surface_area_m2: FloatValue,
    /// Henry's law constant (mol L^-1 atm^-1)
    #[serde(default = "missing")]
    pub henry: FloatValue,
    #[serde(default = "missing")]
    pub schmidt: FloatValue,
    /// Gas transfer velocity normalised to Sc=600 (m/day)
    #[serde(default = "missing")]
    pub k600_m_d: FloatValue,
    /// CO2 gas transfer velocity (m/day)
    #[serde(default = "missing")]
    pub k_co2_m_d: FloatValue,
    /// Volumetric CO2 outgassing rate (s^-1)
    #[serde(default = "missing")]
    pub k_co2_s: FloatValue,
    /// Benthic exchange rate (s^-1)
    #[serde(default = "missing")]
    pub kbz_s: FloatValue,
    /// Steady-state dissolved CO2 (ppm), produced by the transport solver
    #[serde(default = "missing")]
    pub co2_ppm: FloatValue,
    /// Areal outgassing flux (g C m^-2 yr^-1)
    #[serde(default = "missing")]
    pub flux_g_m2_yr: FloatValue,
    /// Reach outgassing flux (g C yr^-1)
    #[serde(default = "missing")]
    pub flux_g_yr: FloatValue,
}

impl Reach {
    fn blank(id: ReachId, waterbody: Waterbody, q_m3_s: FloatValue) -> Self {
        Self {
            id,
            waterbody,
            q_m3_s,
            length_km: MISSING,
            slope: MISSING,
            water_temp_c: MISSING,
            air_temp_c: MISSING,
            lake_volume_m3: MISSING,
            lake_area_m2: MISSING,
            ahg: AhgCoefficients::default(),
            from_node: 0,
            to_node: 0,
            stream_order: None,
            international: false,
            width_m: MISSING,
            depth_m: MISSING,
            velocity_m_s: MISSING,
            residence_time_s: MISSING,
            surface_area_m2: MISSING,
            henry: MISSING,
            schmidt: MISSING,
            k600_m_d: MISSING,
            k_co2_m_d: MISSING,
            k_co2_s: MISSING,
            kbz_s: MISSING,
            co2_ppm: MISSING,
            flux_g_m2_yr: MISSING,
            flux_g_yr: MISSING,
        }
    }

    /// Create a river reach. Lake attributes are left missing.
    pub fn river(
        id: ReachId,
        q_m3_s: FloatValue,
        length_km: FloatValue,
        slope: FloatValue,
        ahg: AhgCoefficients,
    ) -> Self {
        Self {
            length_km,
            slope,
            ahg,
            ..Self::blank(id, Waterbody::River, q_m3_s)
        }
    }

    /// Create a lake/reservoir reach. River attributes are left missing.
    pub fn lake(
        id: ReachId,
        q_m3_s: FloatValue,
        lake_volume_m3: FloatValue,
        lake_area_m2: FloatValue,
    ) -> Self {
        Self {
            lake_volume_m3,
            lake_area_m2,
            ..Self::blank(id, Waterbody::LakeReservoir, q_m3_s)
        }
    }

    /// Set the topology of the reach
    pub fn with_nodes(mut self, from_node: NodeId, to_node: NodeId) -> Self {
        self.from_node = from_node;
        self.to_node = to_node;
        self
    }

    /// Set water and air temperature
    pub fn with_temperature(mut self, water_temp_c: FloatValue, air_temp_c: FloatValue) -> Self {
        self.water_temp_c = water_temp_c;
        self.air_temp_c = air_temp_c;
        self
    }

    /// Set the bed slope. Lake fractions may carry the slope of the flowline
    /// they sit on, which the benthic exchange rate uses.
    pub fn with_slope(mut self, slope: FloatValue) -> Self {
        self.slope = slope;
        self
    }

    pub fn with_stream_order(mut self, stream_order: u32) -> Self {
        self.stream_order = Some(stream_order);
        self
    }

    pub fn with_international(mut self, international: bool) -> Self {
        self.international = international;
        self
    }

    pub fn is_river(&self) -> bool {
        self.waterbody == Waterbody::River
    }

    pub fn is_lake(&self) -> bool {
        self.waterbody == Waterbody::LakeReservoir
    }

    /// Water volume of the reach (m^3)
    ///
    /// Rivers use the derived channel geometry, lakes their own volume.
    pub fn volume_m3(&self) -> FloatValue {
        match self.waterbody {
            Waterbody::River => self.width_m * self.depth_m * self.length_km * 1000.0,
            Waterbody::LakeReservoir => self.lake_volume_m3,
        }
    }
}

/// All reaches of one basin, in the order of the input attribute table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReachTable {
    reaches: Vec<Reach>,
}

impl ReachTable {
    pub fn new(reaches: Vec<Reach>) -> Self {
        Self { reaches }
    }

    pub fn len(&self) -> usize {
        self.reaches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reaches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reach> {
        self.reaches.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Reach> {
        self.reaches.iter_mut()
    }

    pub fn reaches(&self) -> &[Reach] {
        &self.reaches
    }

    pub fn get(&self, index: usize) -> Option<&Reach> {
        self.reaches.get(index)
    }

    /// Extract one attribute as a column vector
    pub fn column(&self, f: impl Fn(&Reach) -> FloatValue) -> Vec<FloatValue> {
        self.reaches.iter().map(f).collect()
    }

    pub fn slopes(&self) -> Vec<FloatValue> {
        self.column(|r| r.slope)
    }

    pub fn water_temperatures(&self) -> Vec<FloatValue> {
        self.column(|r| r.water_temp_c)
    }

    pub fn discharges(&self) -> Vec<FloatValue> {
        self.column(|r| r.q_m3_s)
    }

    pub fn from_nodes(&self) -> Vec<NodeId> {
        self.reaches.iter().map(|r| r.from_node).collect()
    }

    pub fn to_nodes(&self) -> Vec<NodeId> {
        self.reaches.iter().map(|r| r.to_node).collect()
    }

    /// Reaches of a single waterbody variant
    pub fn of_waterbody(&self, waterbody: Waterbody) -> impl Iterator<Item = &Reach> {
        self.reaches
            .iter()
            .filter(move |r| r.waterbody == waterbody)
    }

    /// Check that a per-reach column has one value per reach
    pub fn check_column_len(&self, column: &str, actual: usize) -> RivCO2Result<()> {
        if actual != self.reaches.len() {
            return Err(RivCO2Error::LengthMismatch {
                column: column.to_string(),
                expected: self.reaches.len(),
                actual,
            });
        }
        Ok(())
    }
}

impl From<Vec<Reach>> for ReachTable {
    fn from(reaches: Vec<Reach>) -> Self {
        Self::new(reaches)
    }
}

impl FromIterator<Reach> for ReachTable {
    fn from_iter<I: IntoIterator<Item = Reach>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ReachTable {
    type Item = &'a Reach;
    type IntoIter = std::slice::Iter<'a, Reach>;

    fn into_iter(self) -> Self::IntoIter {
        self.reaches.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::is_missing;

    #[test]
    fn test_waterbody_parse() {
        assert_eq!("River".parse::<Waterbody>().unwrap(), Waterbody::River);
        assert_eq!(
            "Lake/Reservoir".parse::<Waterbody>().unwrap(),
            Waterbody::LakeReservoir
        );
        assert!(matches!(
            "Canal".parse::<Waterbody>(),
            Err(RivCO2Error::UnknownWaterbody(_))
        ));
    }

    #[test]
    fn test_river_leaves_lake_fields_missing() {
        let reach = Reach::river(1, 2.0, 1.5, 0.001, AhgCoefficients::default());
        assert!(reach.is_river());
        assert!(is_missing(reach.lake_area_m2));
        assert!(is_missing(reach.lake_volume_m3));
        assert_eq!(reach.length_km, 1.5);
    }

    #[test]
    fn test_lake_leaves_river_fields_missing() {
        let reach = Reach::lake(2, 10.0, 5.0e6, 1.0e6);
        assert!(reach.is_lake());
        assert!(is_missing(reach.length_km));
        assert!(is_missing(reach.slope));
        assert_eq!(reach.volume_m3(), 5.0e6);
    }

    #[test]
    fn test_table_columns() {
        let table: ReachTable = vec![
            Reach::river(1, 1.0, 1.0, 0.01, AhgCoefficients::default()).with_nodes(1, 2),
            Reach::lake(2, 3.0, 1.0, 1.0).with_nodes(2, 3),
        ]
        .into();

        assert_eq!(table.len(), 2);
        assert_eq!(table.discharges(), vec![1.0, 3.0]);
        assert_eq!(table.from_nodes(), vec![1, 2]);
        assert_eq!(table.to_nodes(), vec![2, 3]);
        assert_eq!(table.of_waterbody(Waterbody::LakeReservoir).count(), 1);
        assert!(table.check_column_len("slope", 3).is_err());
    }

    #[test]
    fn test_deserialise_fills_missing_defaults() {
        let json = r#"{"id": 7, "waterbody": "River", "q_m3_s": 1.0, "from_node": 1, "to_node": 2}"#;
        let reach: Reach = serde_json::from_str(json).unwrap();
        assert_eq!(reach.id, 7);
        assert!(is_missing(reach.width_m));
        assert!(is_missing(reach.ahg.a));
        assert_eq!(reach.stream_order, None);
    }
}
