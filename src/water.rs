use crate::parameters::ParameterSet;

// Minimum potential transpiration [mm/day]
const MIN_TRANSPIRATION: f64 = 0.0001;
// Canopy light extinction coefficient (0.7 * 4)
const EXTINCTION: f64 = 2.8;
// Cumulative water stress at which the water-limited canopy collapses
const CANOPY_STRESS_LIMIT: f64 = 75.0;

// Result of one daily bucket update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoilWaterUpdate {
    pub moisture: f64,        // Soil water after the update [mm]
    pub runoff: f64,          // Water lost above field capacity [mm]
    pub irrigation_need: f64, // Refill to field capacity once below the critical limit [mm]
}

// Single-bucket soil water balance between wilting point and field capacity
#[derive(Debug, Clone, Copy)]
pub struct WaterBalance {
    fc: f64,   // Field capacity [mm]
    wp: f64,   // Wilting point [mm]
    cl: f64,   // Critical limit [mm]
    wmax: f64, // Maximum canopy cover [-]
}

impl WaterBalance {
    pub fn new(fc: f64, wp: f64, cl: f64, wmax: f64) -> Self {
        WaterBalance { fc, wp, cl, wmax }
    }

    pub fn from_params(params: &ParameterSet) -> Self {
        let soil = &params.soil_water;
        Self::new(soil.fc, soil.wp, soil.cl, params.growth.wmax)
    }

    /// Crop transpiration demand scaled by light interception relative to a full canopy.
    pub fn potential_transpiration(&self, eto: f64, canopy_cover: f64) -> f64 {
        if canopy_cover <= 0.0 {
            return MIN_TRANSPIRATION;
        }
        let cover_extinction = (-EXTINCTION * canopy_cover).exp();
        let full_extinction = (-EXTINCTION * self.wmax).exp();
        if cover_extinction == 1.0 || full_extinction == 1.0 {
            return MIN_TRANSPIRATION;
        }
        let t0 = (self.wmax * eto * (1.0 - cover_extinction)) / (1.0 - full_extinction);
        t0.max(MIN_TRANSPIRATION)
    }

    pub fn potential_soil_evaporation(&self, eto: f64, pot_transp: f64) -> f64 {
        (eto - pot_transp).max(0.0)
    }

    // Zero below wilting point, linear ramp up to the critical limit, unrestricted above
    pub fn actual_transpiration(&self, pot_transp: f64, soil_water: f64) -> f64 {
        if soil_water < self.wp {
            return 0.0;
        }
        if soil_water <= self.cl {
            let rf = (self.wp - soil_water) / (self.wp - self.cl);
            return (pot_transp * rf).max(0.0);
        }
        pot_transp.max(0.0)
    }

    pub fn water_stress_factor(&self, actual_transp: f64, pot_transp: f64) -> f64 {
        if pot_transp <= 0.0 || actual_transp > 0.5 * pot_transp {
            return 0.0;
        }
        (0.5 * pot_transp - actual_transp) / pot_transp
    }

    pub fn canopy_cover_water_limited(&self, cum_water_stress: f64, canopy_pot: f64) -> f64 {
        if cum_water_stress > CANOPY_STRESS_LIMIT {
            return 0.0;
        }
        ((CANOPY_STRESS_LIMIT - cum_water_stress) / CANOPY_STRESS_LIMIT) * canopy_pot
    }

    /**
    Daily bucket update.

    Adds `precip + irrigation`, removes `soil_evap + transp`, then clamps to
    `[WP, FC]`. Water above field capacity leaves as runoff.

    # Returns
    The clamped soil water with runoff and the irrigation needed to refill to
    field capacity (zero unless the soil is at or below the critical limit).
    */
    pub fn update_soil_water_balance(
        &self,
        curr_water: f64,
        precip: f64,
        irrigation: f64,
        soil_evap: f64,
        transp: f64,
    ) -> SoilWaterUpdate {
        let water_in = precip + irrigation;
        let water_out = soil_evap + transp;
        let new_water = curr_water + water_in - water_out;

        let (moisture, runoff) = if new_water <= self.wp {
            (self.wp, 0.0)
        } else if new_water >= self.fc {
            (self.fc, new_water - self.fc)
        } else {
            (new_water, 0.0)
        };

        let irrigation_need = if moisture <= self.cl {
            (self.fc - moisture).max(0.0)
        } else {
            0.0
        };

        SoilWaterUpdate {
            moisture,
            runoff,
            irrigation_need,
        }
    }
}
