use crate::parameters::{ParameterSet, Photoperiod, Temperature};

// Daily temperature and photoperiod response indices
#[derive(Debug, Clone, Copy)]
pub struct StressCalculator {
    temperature: Temperature,
    photoperiod: Photoperiod,
}

impl StressCalculator {
    pub fn new(params: &ParameterSet) -> Self {
        StressCalculator {
            temperature: params.temperature,
            photoperiod: params.photoperiod,
        }
    }

    /// Beta-shaped development response to mean temperature `tav`, 1 at `To`
    /// and 0 outside `[Tb, Tu]`.
    pub fn temperature_index(&self, tav: f64) -> f64 {
        let Temperature { tb, to, tu, a, .. } = self.temperature;
        if tav < tb || tav > tu {
            return 0.0;
        }
        let num = 2.0 * (tav - tb).powf(a) * (to - tb).powf(a) - (tav - tb).powf(2.0 * a);
        let den = (to - tb).powf(2.0 * a);
        num / den
    }

    // Day-length response, 1 up to the critical photoperiod
    pub fn photoperiod_index(&self, photoperiod: f64) -> f64 {
        let Photoperiod { pc, w } = self.photoperiod;
        if photoperiod > pc {
            (-w * (photoperiod - pc)).exp()
        } else {
            1.0
        }
    }

    // Linear decline from 1 at 20 °C to 0 at 35 °C
    pub fn heat_stress(&self, tav: f64) -> f64 {
        if tav <= 20.0 {
            1.0
        } else if tav >= 35.0 {
            0.0
        } else {
            -0.0667 * tav + 2.3333
        }
    }

    pub fn thermal_correction_factor(&self, tav: f64) -> f64 {
        0.992 - 0.0193 * tav
    }

    /**
    Frost factors for the day's minimum temperature.

    # Returns
    `(ccl, rf)`: canopy-loss fraction (1 below Tld, falling to 0 at Tcr) and
    regrowth fraction (0 up to Trg, rising to 1 at Tcr).
    */
    pub fn frost_stress_factors(&self, tmin: f64) -> (f64, f64) {
        let Temperature { tcr, tld, trg, .. } = self.temperature;
        let ccl = if tmin < tld {
            1.0
        } else if tmin < tcr {
            1.0 - (tld - tmin) / (tld - tcr)
        } else {
            0.0
        };
        let rf = if tmin <= trg {
            0.0
        } else if tmin < tcr {
            (trg - tmin) / (trg - tcr)
        } else {
            1.0
        };
        (ccl, rf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::tests::sample_parameters;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn calculator() -> StressCalculator {
        StressCalculator::new(&sample_parameters())
    }

    #[test]
    fn heat_stress_bounds_and_ramp() {
        let s = calculator();
        assert_eq!(s.heat_stress(15.0), 1.0);
        assert_eq!(s.heat_stress(20.0), 1.0);
        assert_eq!(s.heat_stress(40.0), 0.0);
        assert_abs_diff_eq!(s.heat_stress(27.5), 0.4996, epsilon = 1e-3);
    }

    #[test]
    fn temperature_index_peaks_at_optimum() {
        let s = calculator();
        assert_relative_eq!(s.temperature_index(15.0), 1.0, epsilon = 1e-12);
        assert!(s.temperature_index(10.0) < 1.0);
        assert!(s.temperature_index(25.0) < 1.0);
        assert_eq!(s.temperature_index(3.0), 0.0);
        assert_eq!(s.temperature_index(29.0), 0.0);
    }

    #[test]
    fn temperature_index_vanishes_at_cardinals() {
        let s = calculator();
        assert_abs_diff_eq!(s.temperature_index(4.0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(s.temperature_index(28.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn photoperiod_index_decays_above_critical() {
        let s = calculator();
        assert_eq!(s.photoperiod_index(11.0), 1.0);
        assert_eq!(s.photoperiod_index(12.0), 1.0);
        assert_relative_eq!(s.photoperiod_index(14.0), (-1.0f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn frost_factors_follow_thresholds() {
        // Tld = -4, Tcr = -1, Trg = 0
        let s = calculator();
        assert_eq!(s.frost_stress_factors(-6.0), (1.0, 0.0));
        let (ccl, rf) = s.frost_stress_factors(-2.5);
        assert_relative_eq!(ccl, 0.5, epsilon = 1e-12);
        assert_eq!(rf, 0.0);
        assert_eq!(s.frost_stress_factors(5.0), (0.0, 1.0));
    }

    #[test]
    fn regrowth_ramps_between_trg_and_tcr() {
        let mut params = sample_parameters();
        params.temperature.tld = -4.0;
        params.temperature.trg = 0.0;
        params.temperature.tcr = 2.0;
        let s = StressCalculator::new(&params);
        let (ccl, rf) = s.frost_stress_factors(1.0);
        assert_relative_eq!(ccl, 1.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(rf, 0.5, epsilon = 1e-12);
        assert_eq!(s.frost_stress_factors(0.0).1, 0.0);
        assert_eq!(s.frost_stress_factors(2.0), (0.0, 1.0));
    }

    #[test]
    fn thermal_correction_is_linear() {
        let s = calculator();
        assert_relative_eq!(s.thermal_correction_factor(30.0), 0.413, epsilon = 1e-9);
    }
}
