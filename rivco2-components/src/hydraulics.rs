//! Hydraulic geometry
//!
//! Channel width, depth, velocity and residence time from discharge using
//! at-a-station hydraulic geometry (AHG) power laws:
//!
//! $$W = e^{a} Q^{b}, \qquad D = e^{c} Q^{f}, \qquad v = \frac{Q}{W D}$$
//!
//! Lakes and reservoirs have no channel, so their width and velocity are
//! missing and their depth is the mean depth `volume / area`.
//!
//! All functions are pure and total over [`Waterbody`]. Inputs that make a
//! quantity undefined produce [`MISSING`] instead of an error so the reach is
//! simply left out of downstream aggregates.

use rivco2_core::reach::{Reach, Waterbody};
use rivco2_core::values::{FloatValue, MISSING};

/// Channel width (m)
pub fn width(waterbody: Waterbody, q: FloatValue, a: FloatValue, b: FloatValue) -> FloatValue {
    match waterbody {
        Waterbody::River => a.exp() * q.powf(b),
        Waterbody::LakeReservoir => MISSING,
    }
}

/// Mean depth (m)
pub fn depth(
    waterbody: Waterbody,
    q: FloatValue,
    lake_volume: FloatValue,
    lake_area: FloatValue,
    c: FloatValue,
    f: FloatValue,
) -> FloatValue {
    match waterbody {
        Waterbody::River => c.exp() * q.powf(f),
        Waterbody::LakeReservoir => lake_volume / lake_area,
    }
}

/// Mean flow velocity (m/s) from continuity
pub fn velocity(waterbody: Waterbody, q: FloatValue, w: FloatValue, d: FloatValue) -> FloatValue {
    match waterbody {
        Waterbody::River => q / (w * d),
        Waterbody::LakeReservoir => MISSING,
    }
}

/// Hydraulic residence time (s)
///
/// Undefined when there is no discharge. Lakes use `volume / Q`, rivers the
/// travel time `length / velocity`.
pub fn residence_time(
    volume: FloatValue,
    length_km: FloatValue,
    velocity: FloatValue,
    q: FloatValue,
    waterbody: Waterbody,
) -> FloatValue {
    if q == 0.0 {
        return MISSING;
    }
    match waterbody {
        Waterbody::River => length_km * 1000.0 / velocity,
        Waterbody::LakeReservoir => volume / q,
    }
}

/// Water surface area (m^2)
pub fn surface_area(
    waterbody: Waterbody,
    width: FloatValue,
    length_km: FloatValue,
    lake_area: FloatValue,
) -> FloatValue {
    match waterbody {
        Waterbody::River => width * length_km * 1000.0,
        Waterbody::LakeReservoir => lake_area,
    }
}

/// Fill the hydraulic geometry of a reach in place
pub fn derive_geometry(reach: &mut Reach) {
    let wb = reach.waterbody;
    let q = reach.q_m3_s;
    let ahg = reach.ahg;

    reach.width_m = width(wb, q, ahg.a, ahg.b);
    reach.depth_m = depth(wb, q, reach.lake_volume_m3, reach.lake_area_m2, ahg.c, ahg.f);
    reach.velocity_m_s = velocity(wb, q, reach.width_m, reach.depth_m);
    reach.residence_time_s = residence_time(
        reach.lake_volume_m3,
        reach.length_km,
        reach.velocity_m_s,
        q,
        wb,
    );
    reach.surface_area_m2 = surface_area(wb, reach.width_m, reach.length_km, reach.lake_area_m2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivco2_core::reach::AhgCoefficients;
    use rivco2_core::values::is_missing;

    fn ahg() -> AhgCoefficients {
        AhgCoefficients {
            a: 0.0,
            b: 0.5,
            c: 0.0,
            f: 0.4,
        }
    }

    #[test]
    fn test_river_width_power_law() {
        assert!((width(Waterbody::River, 4.0, 0.0, 0.5) - 2.0).abs() < 1e-12);
        let w = width(Waterbody::River, 10.0, 1.0, 0.5);
        assert!((w - 1.0_f64.exp() * 10.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_lake_width_and_velocity_not_applicable() {
        assert!(is_missing(width(Waterbody::LakeReservoir, 4.0, 0.0, 0.5)));
        assert!(is_missing(velocity(Waterbody::LakeReservoir, 4.0, 2.0, 1.0)));
    }

    #[test]
    fn test_lake_depth_is_volume_over_area() {
        let d = depth(Waterbody::LakeReservoir, 1.0, 2.0e6, 5.0e5, 0.0, 0.0);
        assert_eq!(d, 4.0);
    }

    #[test]
    fn test_velocity_from_continuity() {
        let v = velocity(Waterbody::River, 6.0, 3.0, 0.5);
        assert!((v - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_residence_time_zero_flow_is_missing() {
        assert!(is_missing(residence_time(
            1.0e6,
            MISSING,
            MISSING,
            0.0,
            Waterbody::LakeReservoir
        )));
        assert!(is_missing(residence_time(
            MISSING,
            1.0,
            0.5,
            0.0,
            Waterbody::River
        )));
    }

    #[test]
    fn test_residence_time_by_waterbody() {
        let lake = residence_time(1.0e6, MISSING, MISSING, 10.0, Waterbody::LakeReservoir);
        assert_eq!(lake, 1.0e5);
        let river = residence_time(MISSING, 2.0, 0.5, 1.0, Waterbody::River);
        assert_eq!(river, 4000.0);
    }

    #[test]
    fn test_derive_geometry_river() {
        let mut reach = Reach::river(1, 4.0, 1.0, 0.001, ahg());
        derive_geometry(&mut reach);

        assert!((reach.width_m - 2.0).abs() < 1e-12);
        let expected_depth = 4.0_f64.powf(0.4);
        assert!((reach.depth_m - expected_depth).abs() < 1e-12);
        assert!((reach.velocity_m_s - 4.0 / (2.0 * expected_depth)).abs() < 1e-12);
        assert!((reach.surface_area_m2 - 2000.0).abs() < 1e-9);
        assert!(reach.residence_time_s > 0.0);
    }

    #[test]
    fn test_derive_geometry_lake() {
        let mut reach = Reach::lake(2, 5.0, 1.0e6, 2.0e5);
        derive_geometry(&mut reach);

        assert!(is_missing(reach.width_m));
        assert!(is_missing(reach.velocity_m_s));
        assert_eq!(reach.depth_m, 5.0);
        assert_eq!(reach.residence_time_s, 2.0e5);
        assert_eq!(reach.surface_area_m2, 2.0e5);
    }
}
