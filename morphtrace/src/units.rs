//! Physical units attached to scalar and array values.
//!
//! This is a deliberately small unit system: a [`Unit`] is a symbol, a scale factor to
//! the coherent SI unit and a [`Dimension`]. It is enough to rescale trace data between
//! compatible units (e.g., `V` and `mV`) and to refuse conversions between
//! incompatible ones.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::{Error, TraceResult};

/// Exponents over the SI base dimensions used by electrophysiology
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimension {
    /// Length (m)
    pub length: i8,
    /// Mass (kg)
    pub mass: i8,
    /// Time (s)
    pub time: i8,
    /// Electric current (A)
    pub current: i8,
}

impl Dimension {
    /// A dimensionless quantity
    pub const NONE: Self = Self::new(0, 0, 0, 0);
    /// Time
    pub const TIME: Self = Self::new(0, 0, 1, 0);
    /// Frequency
    pub const FREQUENCY: Self = Self::new(0, 0, -1, 0);
    /// Length
    pub const LENGTH: Self = Self::new(1, 0, 0, 0);
    /// Mass
    pub const MASS: Self = Self::new(0, 1, 0, 0);
    /// Current
    pub const CURRENT: Self = Self::new(0, 0, 0, 1);
    /// Voltage (kg m^2 s^-3 A^-1)
    pub const VOLTAGE: Self = Self::new(2, 1, -3, -1);
    /// Conductance (kg^-1 m^-2 s^3 A^2)
    pub const CONDUCTANCE: Self = Self::new(-2, -1, 3, 2);
    /// Resistance (kg m^2 s^-3 A^-2)
    pub const RESISTANCE: Self = Self::new(2, 1, -3, -2);
    /// Capacitance (kg^-1 m^-2 s^4 A^2)
    pub const CAPACITANCE: Self = Self::new(-2, -1, 4, 2);

    /// Create a dimension from its exponents
    pub const fn new(length: i8, mass: i8, time: i8, current: i8) -> Self {
        Self {
            length,
            mass,
            time,
            current,
        }
    }

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.length + rhs.length,
            self.mass + rhs.mass,
            self.time + rhs.time,
            self.current + rhs.current,
        )
    }

    fn div(self, rhs: Self) -> Self {
        Self::new(
            self.length - rhs.length,
            self.mass - rhs.mass,
            self.time - rhs.time,
            self.current - rhs.current,
        )
    }
}

const PREFIXES: &[(&str, f64)] = &[
    ("p", 1e-12),
    ("n", 1e-9),
    ("u", 1e-6),
    ("\u{00b5}", 1e-6), // µ
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
];

const BASE_UNITS: &[(&str, f64, Dimension)] = &[
    ("s", 1.0, Dimension::TIME),
    ("Hz", 1.0, Dimension::FREQUENCY),
    ("m", 1.0, Dimension::LENGTH),
    ("g", 1e-3, Dimension::MASS),
    ("A", 1.0, Dimension::CURRENT),
    ("V", 1.0, Dimension::VOLTAGE),
    ("S", 1.0, Dimension::CONDUCTANCE),
    ("Ohm", 1.0, Dimension::RESISTANCE),
    ("ohm", 1.0, Dimension::RESISTANCE),
    ("F", 1.0, Dimension::CAPACITANCE),
];

/// A physical unit
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    symbol: Cow<'static, str>,
    scale: f64,
    dim: Dimension,
}

impl Unit {
    /// Create a unit from a symbol, the factor converting it to the coherent SI unit, and
    /// its dimension.
    pub fn new(symbol: impl Into<Cow<'static, str>>, scale: f64, dim: Dimension) -> Self {
        Self {
            symbol: symbol.into(),
            scale,
            dim,
        }
    }

    /// The dimensionless unit
    pub fn dimensionless() -> Self {
        Self::new("dimensionless", 1.0, Dimension::NONE)
    }

    /// Seconds
    pub fn s() -> Self {
        Self::new("s", 1.0, Dimension::TIME)
    }

    /// Milliseconds
    pub fn ms() -> Self {
        Self::new("ms", 1e-3, Dimension::TIME)
    }

    /// Millivolts
    pub fn mv() -> Self {
        Self::new("mV", 1e-3, Dimension::VOLTAGE)
    }

    /// Nanoamperes
    pub fn na() -> Self {
        Self::new("nA", 1e-9, Dimension::CURRENT)
    }

    /// Hertz
    pub fn hz() -> Self {
        Self::new("Hz", 1.0, Dimension::FREQUENCY)
    }

    /// Parse a unit symbol such as `ms`, `mV`, `nA` or `uS`
    pub fn parse(symbol: &str) -> TraceResult<Self> {
        let symbol = symbol.trim();
        if symbol.is_empty() || symbol == "dimensionless" {
            return Ok(Self::dimensionless());
        }
        // Exact base units win over prefixed ones, so that `m` is a metre and not milli-nothing.
        if let Some((_, scale, dim)) = BASE_UNITS.iter().find(|(base, _, _)| *base == symbol) {
            return Ok(Self::new(symbol.to_string(), *scale, *dim));
        }
        for (prefix, factor) in PREFIXES {
            if let Some(rest) = symbol.strip_prefix(prefix) {
                if let Some((_, scale, dim)) = BASE_UNITS.iter().find(|(base, _, _)| *base == rest) {
                    return Ok(Self::new(symbol.to_string(), factor * scale, *dim));
                }
            }
        }
        Err(Error::UnknownUnit(symbol.to_string()))
    }

    /// The symbol of the unit
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The dimension of the unit
    pub fn dimension(&self) -> Dimension {
        self.dim
    }

    /// Check if values in `self` can be expressed in `other`
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.dim == other.dim
    }

    /// The factor to multiply a magnitude in `self` by to express it in `to`.
    pub fn conversion_factor(&self, to: &Unit) -> TraceResult<f64> {
        if !self.is_compatible(to) {
            return Err(Error::IncompatibleUnits {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        Ok(self.scale / to.scale)
    }

    /// The product of two units
    pub fn mul(&self, rhs: &Unit) -> Unit {
        if self.dim == Dimension::NONE && self.scale == 1.0 {
            return rhs.clone();
        }
        if rhs.dim == Dimension::NONE && rhs.scale == 1.0 {
            return self.clone();
        }
        Unit::new(format!("{}*{}", self.symbol, rhs.symbol), self.scale * rhs.scale, self.dim.mul(rhs.dim))
    }

    /// The quotient of two units
    pub fn div(&self, rhs: &Unit) -> Unit {
        if rhs.dim == Dimension::NONE && rhs.scale == 1.0 {
            return self.clone();
        }
        Unit::new(format!("{}/{}", self.symbol, rhs.symbol), self.scale / rhs.scale, self.dim.div(rhs.dim))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

/// A scalar value with a unit
#[derive(Clone, Debug, PartialEq)]
pub struct Quantity {
    /// Magnitude of the value in `unit`
    pub value: f64,
    /// Unit of the value
    pub unit: Unit,
}

impl Quantity {
    /// Create a new quantity
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Express the quantity in another (compatible) unit
    pub fn rescale(&self, unit: &Unit) -> TraceResult<Quantity> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(Quantity::new(self.value * factor, unit.clone()))
    }

    /// The magnitude of the quantity when expressed in `unit`
    pub fn magnitude_in(&self, unit: &Unit) -> TraceResult<f64> {
        Ok(self.value * self.unit.conversion_factor(unit)?)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

impl FromStr for Quantity {
    type Err = Error;

    /// Parse strings like `"10 ms"` or `"-65mV"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
            .map(|(idx, _)| idx)
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(split);
        let value = number
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::UnknownUnit(s.to_string()))?;
        Ok(Quantity::new(value, Unit::parse(unit)?))
    }
}

/// A sequence of values sharing one unit
#[derive(Clone, Debug, PartialEq)]
pub struct QuantityArray {
    /// Magnitudes in `unit`
    pub values: Vec<f64>,
    /// Unit shared by all values
    pub unit: Unit,
}

impl QuantityArray {
    /// Create a new array
    pub fn new(values: Vec<f64>, unit: Unit) -> Self {
        Self { values, unit }
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the array is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the value at `index` as a [`Quantity`]
    pub fn get(&self, index: usize) -> Option<Quantity> {
        self.values.get(index).map(|&v| Quantity::new(v, self.unit.clone()))
    }

    /// Express all values in another (compatible) unit
    pub fn rescale(&self, unit: &Unit) -> TraceResult<QuantityArray> {
        let factor = self.unit.conversion_factor(unit)?;
        Ok(QuantityArray::new(
            self.values.iter().map(|v| v * factor).collect(),
            unit.clone(),
        ))
    }

    /// Iterate over the values as [`Quantity`]s
    pub fn iter(&self) -> impl Iterator<Item = Quantity> + '_ {
        self.values.iter().map(|&v| Quantity::new(v, self.unit.clone()))
    }
}
