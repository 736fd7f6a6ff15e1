use crate::parameters::{Growth, ParameterSet};

// Water stress at which RUE and harvest index reach zero
const STRESS_THRESHOLD: f64 = 0.8;
// Mean temperature from which RUE is temperature-corrected [°C]
const RUE_HEAT_THRESHOLD: f64 = 25.0;

// Canopy development, partitioning and dry matter production
#[derive(Debug, Clone, Copy)]
pub struct CanopyGrowth {
    growth: Growth,
}

impl CanopyGrowth {
    pub fn new(params: &ParameterSet) -> Self {
        CanopyGrowth {
            growth: params.growth,
        }
    }

    /**
    Canopy cover at cumulative thermal time `tt`.

    Evaluates `wmax * exp(-tm / (tt * density)) * (1 + (te - tt) / (te - tm)) * (tt / te)^(te / (te - tm))`,
    scales it by `1 + variability` and clamps to `[0, wmax]`.

    # Returns
    0 when `tt <= 0`, and 0 when the curve cannot be evaluated: zero density,
    non-positive `te`, `te == tm`, or a non-finite result. A negative density
    is evaluated as given and ends up clamped.
    */
    pub fn canopy_cover(&self, tt: f64, plant_density: f64, variability: f64) -> f64 {
        let Growth { wmax, tm, te, .. } = self.growth;
        if tt <= 0.0 || plant_density == 0.0 || te <= 0.0 || te == tm {
            return 0.0;
        }

        let exp1 = (-tm / (tt * plant_density)).exp();
        let fac1 = 1.0 + (te - tt) / (te - tm);
        let exp2 = (tt / te).powf(te / (te - tm));
        let canopy = wmax * exp1 * fac1 * exp2;
        let canopy = variability * canopy + canopy;

        if !canopy.is_finite() {
            return 0.0;
        }
        canopy.min(wmax).max(0.0)
    }

    /// Gompertz harvest index at thermal time `tt`.
    ///
    /// `cum_heat_stress` is accepted for heat-stress modulation but does not
    /// affect the result.
    pub fn harvest_index(&self, tt: f64, _cum_heat_stress: f64) -> f64 {
        let Growth { hi_max, tu, b, .. } = self.growth;
        hi_max * (-(-(tt - tu) / b).exp()).exp()
    }

    /**
    Radiation use efficiency after temperature, water and CO2 adjustment.

    `base_rue` is multiplied by `0.992 - 0.0193 * tav` from 25 °C upwards and,
    under water stress, by `(0.8 - water_stress) / 0.8` floored at zero. The
    result is multiplied by `co2_effect` and floored at zero. `tt` does not
    branch the calculation.
    */
    pub fn effective_rue(
        &self,
        base_rue: f64,
        _tt: f64,
        tav: f64,
        co2_effect: f64,
        water_stress: f64,
    ) -> f64 {
        let rue_t = if tav >= RUE_HEAT_THRESHOLD {
            base_rue * (0.992 - 0.0193 * tav)
        } else {
            base_rue
        };
        let mut rue_w = rue_t;
        if water_stress > 0.0 {
            rue_w = ((rue_w * (STRESS_THRESHOLD - water_stress)) / STRESS_THRESHOLD).max(0.0);
        }
        (rue_w * co2_effect).max(0.0)
    }

    // RUE with no CO2 or water adjustment
    pub fn potential_rue(&self, base_rue: f64, tt: f64, tav: f64) -> f64 {
        self.effective_rue(base_rue, tt, tav, 1.0, 0.0)
    }

    pub fn effective_hi(&self, hi: f64, water_stress: f64, threshold: f64) -> f64 {
        (hi * (threshold - water_stress) / threshold).max(0.0)
    }

    // Dry matter produced from intercepted PAR [g/m²]
    pub fn biomass_increment(&self, par: f64, canopy_cover: f64, rue_eff: f64) -> f64 {
        if canopy_cover > 0.0 && rue_eff > 0.0 {
            (par * canopy_cover * rue_eff) / 100.0
        } else {
            0.0
        }
    }

    pub fn default_stress_threshold() -> f64 {
        STRESS_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::tests::sample_parameters;
    use approx::assert_relative_eq;

    fn canopy() -> CanopyGrowth {
        CanopyGrowth::new(&sample_parameters())
    }

    #[test]
    fn no_cover_without_thermal_time() {
        let c = canopy();
        for density in [0.5, 4.5, 12.0] {
            for variability in [-0.2, 0.0, 0.3] {
                assert_eq!(c.canopy_cover(0.0, density, variability), 0.0);
                assert_eq!(c.canopy_cover(-15.0, density, variability), 0.0);
            }
        }
    }

    #[test]
    fn cover_stays_within_bounds() {
        let c = canopy();
        let wmax = sample_parameters().growth.wmax;
        let mut tt = 1.0;
        while tt < 3000.0 {
            for variability in [-0.5, 0.0, 0.5] {
                let cover = c.canopy_cover(tt, 4.5, variability);
                assert!((0.0..=wmax).contains(&cover), "tt={} cover={}", tt, cover);
            }
            tt += 7.5;
        }
    }

    #[test]
    fn cover_reaches_maximum_near_te() {
        let c = canopy();
        let g = sample_parameters().growth;
        let at_te = c.canopy_cover(g.te, 4.5, 0.0);
        let expected = g.wmax * (-g.tm / (g.te * 4.5)).exp();
        assert_relative_eq!(at_te, expected, epsilon = 1e-12);
        // Senesced past 2te - tm
        assert_eq!(c.canopy_cover(2.0 * g.te - g.tm + 10.0, 4.5, 0.0), 0.0);
    }

    #[test]
    fn degenerate_curve_falls_back_to_zero() {
        let c = canopy();
        assert_eq!(c.canopy_cover(500.0, 0.0, 0.0), 0.0);

        let mut params = sample_parameters();
        params.growth.tm = params.growth.te;
        let flat = CanopyGrowth::new(&params);
        assert_eq!(flat.canopy_cover(500.0, 4.5, 0.0), 0.0);
    }

    #[test]
    fn negative_density_is_clamped_to_wmax() {
        // exp(-tm / (tt * density)) turns into e at tt = tm, density = -1
        let c = canopy();
        let wmax = sample_parameters().growth.wmax;
        assert_eq!(c.canopy_cover(500.0, -1.0, 0.0), wmax);
    }

    #[test]
    fn harvest_index_ignores_heat_stress() {
        let c = canopy();
        let g = sample_parameters().growth;
        assert_relative_eq!(c.harvest_index(g.tu, 0.0), g.hi_max * (-1.0f64).exp());
        assert_eq!(c.harvest_index(1200.0, 0.0), c.harvest_index(1200.0, 250.0));
        assert!(c.harvest_index(2500.0, 0.0) <= g.hi_max);
    }

    #[test]
    fn rue_is_corrected_for_heat_water_and_co2() {
        let c = canopy();
        assert_eq!(c.effective_rue(3.0, 100.0, 20.0, 1.0, 0.0), 3.0);
        assert_relative_eq!(
            c.effective_rue(3.0, 100.0, 30.0, 1.0, 0.0),
            3.0 * (0.992 - 0.0193 * 30.0)
        );
        assert_relative_eq!(c.effective_rue(3.0, 100.0, 20.0, 1.0, 0.4), 1.5, epsilon = 1e-12);
        assert_eq!(c.effective_rue(3.0, 100.0, 20.0, 1.0, 0.9), 0.0);
        assert_relative_eq!(c.effective_rue(3.0, 100.0, 20.0, 1.2, 0.0), 3.6, epsilon = 1e-12);
        assert_eq!(c.potential_rue(3.0, 100.0, 20.0), 3.0);
    }

    #[test]
    fn effective_hi_scales_with_stress() {
        let c = canopy();
        let threshold = CanopyGrowth::default_stress_threshold();
        assert_relative_eq!(c.effective_hi(0.6, 0.2, threshold), 0.45, epsilon = 1e-12);
        assert_eq!(c.effective_hi(0.6, 0.9, threshold), 0.0);
    }

    #[test]
    fn biomass_needs_cover_and_rue() {
        let c = canopy();
        assert_relative_eq!(c.biomass_increment(10.0, 0.5, 3.0), 0.15, epsilon = 1e-12);
        assert_eq!(c.biomass_increment(10.0, 0.0, 3.0), 0.0);
        assert_eq!(c.biomass_increment(10.0, 0.5, 0.0), 0.0);
    }
}
