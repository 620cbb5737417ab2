//! Parameter table
//!
//! Immutable set of known datapoints for an Xtender / VarioTrack / VarioString /
//! BSP installation. Built once at startup and shared by `Arc`.

use std::collections::BTreeMap;

use errors::{XcomError, XcomResult};

use crate::datapoint::{DataType, Datapoint, ValueTuple};
use crate::enums::{BATTERY_CYCLE_PHASES, OPERATING_MODES};

/// Metadata the session needs when it only knows an identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointInfo<'a> {
    pub data_type: DataType,
    pub unit: Option<&'a str>,
    pub writable: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    points: BTreeMap<u32, Datapoint>,
}

impl Dataset {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table built from arbitrary points; a later duplicate id replaces an earlier one
    pub fn from_points(points: impl IntoIterator<Item = Datapoint>) -> Self {
        Self {
            points: points.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// The datapoints documented for a standard Studer installation
    pub fn standard() -> Self {
        use DataType::{Bool, EnumShort, Float, Int32};

        Self::from_points([
            // Xtender parameters
            Datapoint::parameter(1107, "MAX_CURR_AC_SOURCE", Float).with_unit("A"),
            Datapoint::parameter(1126, "SMART_BOOST_ALLOWED", Bool),
            Datapoint::parameter(1138, "BATTERY_CHARGE_CURR", Float).with_unit("A"),
            Datapoint::parameter(1523, "MAX_GRID_FEEDING_CURR", Float).with_unit("A"),
            Datapoint::parameter(1607, "SMART_BOOST_LIMIT", Float).with_unit("%"),
            Datapoint::parameter(1550, "PARAMS_SAVED_IN_FLASH", Bool),
            // RCC parameters, not writable over SCOM
            Datapoint::parameter(5012, "USER_LEVEL", EnumShort).read_only(),
            // Xtender infos
            Datapoint::info(3081, "AC_ENERGY_IN_CURR_DAY", Float).with_unit("kWh"),
            Datapoint::info(3080, "AC_ENERGY_IN_PREV_DAY", Float).with_unit("kWh"),
            Datapoint::info(3083, "AC_ENERGY_OUT_CURR_DAY", Float).with_unit("kWh"),
            Datapoint::info(3082, "AC_ENERGY_OUT_PREV_DAY", Float).with_unit("kWh"),
            Datapoint::info(3084, "AC_FREQ_IN", Float).with_unit("Hz"),
            Datapoint::info(3085, "AC_FREQ_OUT", Float).with_unit("Hz"),
            Datapoint::info(3137, "AC_POWER_IN", Float).with_unit("kW"),
            Datapoint::info(3136, "AC_POWER_OUT", Float).with_unit("kW"),
            Datapoint::info(3011, "AC_VOLTAGE_IN", Float).with_unit("V"),
            Datapoint::info(3021, "AC_VOLTAGE_OUT", Float).with_unit("V"),
            Datapoint::info(3012, "AC_CURRENT_IN", Float).with_unit("A"),
            Datapoint::info(3022, "AC_CURRENT_OUT", Float).with_unit("A"),
            Datapoint::info(3010, "BATT_CYCLE_PHASE_XT", EnumShort),
            // Xcom-CAN BMS parameters
            Datapoint::parameter(6062, "SOC_LEVEL_FOR_BACKUP", Float).with_unit("%"),
            Datapoint::parameter(6063, "SOC_LEVEL_FOR_GRID_FEEDING", Float).with_unit("%"),
            // BSP infos
            Datapoint::info(7000, "BATT_VOLTAGE", Float).with_unit("V"),
            Datapoint::info(7001, "BATT_CURRENT", Float).with_unit("A"),
            Datapoint::info(7032, "BATT_SOC", Float).with_unit("%"),
            Datapoint::info(7029, "BATT_TEMP", Float).with_unit("°C"),
            Datapoint::info(11038, "BATT_CYCLE_PHASE", EnumShort),
            Datapoint::info(7003, "BATT_POWER", Float).with_unit("W"),
            Datapoint::info(7007, "BATT_CHARGE", Float).with_unit("Ah"),
            Datapoint::info(7008, "BATT_DISCHARGE", Float).with_unit("Ah"),
            Datapoint::info(7009, "BATT_CHARGE_PREV_DAY", Float).with_unit("Ah"),
            Datapoint::info(7010, "BATT_DISCHARGE_PREV_DAY", Float).with_unit("Ah"),
            // VarioTrack infos
            Datapoint::info(11041, "PV_VOLTAGE", Float).with_unit("V"),
            Datapoint::info(11043, "PV_POWER", Float).with_unit("W"),
            Datapoint::info(11007, "PV_ENERGY_CURR_DAY", Float).with_unit("kWh"),
            Datapoint::info(11011, "PV_ENERGY_PREV_DAY", Float).with_unit("kWh"),
            Datapoint::info(11009, "PV_ENERGY_TOTAL", Float).with_unit("MWh"),
            Datapoint::info(11025, "PV_SUN_HOURS_CURR_DAY", Float).with_unit("h"),
            Datapoint::info(11026, "PV_SUN_HOURS_PREV_DAY", Float).with_unit("h"),
            Datapoint::info(11016, "PV_OPERATION_MODE", EnumShort),
            Datapoint::info(11037, "PV_NEXT_EQUAL", Float).with_unit("d"),
            // VarioTrack parameters
            Datapoint::parameter(10029, "FORCE_NEW_CYCLE", Int32),
            // VarioString infos
            Datapoint::info(15010, "VS_PV_POWER", Float).with_unit("kW"),
            Datapoint::info(15017, "VS_PV_PROD", Float).with_unit("kWh"),
            Datapoint::info(15027, "VS_PV_ENERGY_PREV_DAY", Float).with_unit("kWh"),
        ])
    }

    pub fn get(&self, id: u32) -> Option<&Datapoint> {
        self.points.get(&id)
    }

    /// Type, unit and writability of a known identifier
    pub fn lookup(&self, id: u32) -> Option<PointInfo<'_>> {
        self.points.get(&id).map(|p| PointInfo {
            data_type: p.data_type,
            unit: p.unit.as_deref(),
            writable: p.writable,
        })
    }

    /// Case-insensitive lookup by symbolic name
    pub fn by_name(&self, name: &str) -> Option<&Datapoint> {
        self.points
            .values()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a CLI-style key: a numeric id or a symbolic name
    pub fn resolve(&self, key: &str) -> XcomResult<&Datapoint> {
        let found = match key.trim().parse::<u32>() {
            Ok(id) => self.get(id),
            Err(_) => self.by_name(key.trim()),
        };
        found.ok_or_else(|| XcomError::UnknownDatapoint(key.to_string()))
    }

    /// Datapoints ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &Datapoint> {
        self.points.values()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Label table for enumerated datapoints with known values
    pub fn enum_values(&self, id: u32) -> Option<&'static [ValueTuple]> {
        match id {
            11016 => Some(&OPERATING_MODES),
            3010 | 11038 => Some(&BATTERY_CYCLE_PHASES),
            _ => None,
        }
    }
}
