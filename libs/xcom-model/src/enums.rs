//! Known values of enumerated datapoints

use crate::datapoint::ValueTuple;

// Operating modes (VarioTrack 11016)
pub const MODE_NIGHT: ValueTuple = ValueTuple::new(0, "MODE_NIGHT");
pub const MODE_STARTUP: ValueTuple = ValueTuple::new(1, "MODE_STARTUP");
pub const MODE_CHARGER: ValueTuple = ValueTuple::new(3, "MODE_CHARGER");
pub const MODE_SECURITY: ValueTuple = ValueTuple::new(5, "MODE_SECURITY");
pub const MODE_OFF: ValueTuple = ValueTuple::new(6, "MODE_OFF");
pub const MODE_CHARGE: ValueTuple = ValueTuple::new(8, "MODE_CHARGE");
pub const MODE_CHARGE_V: ValueTuple = ValueTuple::new(9, "MODE_CHARGE_V");
pub const MODE_CHARGE_I: ValueTuple = ValueTuple::new(10, "MODE_CHARGE_I");
pub const MODE_CHARGE_T: ValueTuple = ValueTuple::new(11, "MODE_CHARGE_T");

pub const OPERATING_MODES: [ValueTuple; 9] = [
    MODE_NIGHT,
    MODE_STARTUP,
    MODE_CHARGER,
    MODE_SECURITY,
    MODE_OFF,
    MODE_CHARGE,
    MODE_CHARGE_V,
    MODE_CHARGE_I,
    MODE_CHARGE_T,
];

/// Modes in which the charger is actively charging
pub const MODE_CHARGING: [ValueTuple; 4] = [MODE_CHARGE, MODE_CHARGE_V, MODE_CHARGE_I, MODE_CHARGE_T];

// Battery cycle phases (BSP 11038)
pub const PHASE_BULK: ValueTuple = ValueTuple::new(0, "PHASE_BULK");
pub const PHASE_ABSORPT: ValueTuple = ValueTuple::new(1, "PHASE_ABSORPT");
pub const PHASE_EQUALIZE: ValueTuple = ValueTuple::new(2, "PHASE_EQUALIZE");
pub const PHASE_FLOATING: ValueTuple = ValueTuple::new(3, "PHASE_FLOATING");
pub const PHASE_R_FLOAT: ValueTuple = ValueTuple::new(6, "PHASE_R_FLOAT");
pub const PHASE_PER_ABS: ValueTuple = ValueTuple::new(7, "PHASE_PER_ABS");

pub const BATTERY_CYCLE_PHASES: [ValueTuple; 6] = [
    PHASE_BULK,
    PHASE_ABSORPT,
    PHASE_EQUALIZE,
    PHASE_FLOATING,
    PHASE_R_FLOAT,
    PHASE_PER_ABS,
];

pub fn is_charging(mode: i32) -> bool {
    MODE_CHARGING.iter().any(|m| *m == mode)
}

/// Find the labelled value for `id` in one of the tables above
pub fn label_for(table: &'static [ValueTuple], id: i32) -> Option<&'static ValueTuple> {
    table.iter().find(|v| **v == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_charging() {
        assert!(is_charging(8));
        assert!(is_charging(11));
        assert!(!is_charging(0));
        assert!(!is_charging(3));
    }

    #[test]
    fn test_label_for() {
        assert_eq!(label_for(&OPERATING_MODES, 5), Some(&MODE_SECURITY));
        assert_eq!(label_for(&BATTERY_CYCLE_PHASES, 3).map(|v| v.label), Some("PHASE_FLOATING"));
        assert!(label_for(&BATTERY_CYCLE_PHASES, 4).is_none());
    }
}
