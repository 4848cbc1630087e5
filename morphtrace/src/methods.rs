//! Pluggable trace methods and operators
//!
//! Optional operations on traces (spectra, plotting hints, spike detection, arithmetic)
//! are not hard-wired into the trace types. Instead, they are registered at startup in
//! a [`TraceMethodCtrl`], keyed by the [`TraceKind`] they operate on and a method name.
//!
//! A method registered on fixed timestep traces may declare
//! [`RegisterOpts::fallback_to_fixed_dt`]: it then also serves the other trace kinds, by
//! first resampling them with the interval given in [`MethodArgs::with_resample_dt`].
//!
//! Once registration is over, [`TraceMethodCtrl::freeze`] turns the registry into a
//! read-only [`FrozenMethodCtrl`] that can be shared between threads.

mod arith;
mod fft;
mod plot;
mod spikes;

use std::ops::Deref;
use std::sync::Arc;

use hashbrown::HashMap;

pub use self::fft::{PowerSpectrum, Spectrum};
pub use self::plot::PlotPoints;
use crate::events::EventSet;
use crate::traces::{Trace, TraceKind};
use crate::units::Quantity;
use crate::{Error, TraceResult};

/// Implementation of a named method
pub type MethodFn = Arc<dyn Fn(&Trace, &MethodArgs) -> TraceResult<MethodOutput> + Send + Sync>;

/// Implementation of a binary operator
pub type OperatorFn = Arc<dyn Fn(Operand<'_>, Operand<'_>) -> TraceResult<Trace> + Send + Sync>;

/// A single named argument passed to a method
#[derive(Clone, Debug, PartialEq, derive_more::From)]
pub enum MethodArg {
    Bool(bool),
    Float(f64),
    Quantity(Quantity),
}

/// Named arguments for a method invocation.
///
/// Methods resolved through conversion to a fixed timestep additionally need the
/// resampling interval, set with [`MethodArgs::with_resample_dt`].
#[derive(Clone, Debug, Default)]
pub struct MethodArgs {
    args: HashMap<String, MethodArg>,
    resample_dt: Option<Quantity>,
}

impl MethodArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an argument
    pub fn with(mut self, name: impl Into<String>, arg: impl Into<MethodArg>) -> Self {
        self.args.insert(name.into(), arg.into());
        self
    }

    /// Set the timestep used when a trace must be converted to a fixed timestep first
    pub fn with_resample_dt(mut self, dt: Quantity) -> Self {
        self.resample_dt = Some(dt);
        self
    }

    pub fn get(&self, name: &str) -> Option<&MethodArg> {
        self.args.get(name)
    }

    pub fn resample_dt(&self) -> Option<&Quantity> {
        self.resample_dt.as_ref()
    }

    /// Get a boolean argument, or `default` if absent
    pub fn bool_or(&self, method: &str, name: &str, default: bool) -> TraceResult<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(MethodArg::Bool(value)) => Ok(*value),
            Some(_) => Err(invalid_argument(method, name, "a boolean")),
        }
    }

    /// Get a float argument, or `default` if absent
    pub fn float_or(&self, method: &str, name: &str, default: f64) -> TraceResult<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(MethodArg::Float(value)) => Ok(*value),
            Some(_) => Err(invalid_argument(method, name, "a float")),
        }
    }

    /// Get a quantity argument, or `default` if absent
    pub fn quantity_or(&self, method: &str, name: &str, default: Quantity) -> TraceResult<Quantity> {
        match self.get(name) {
            None => Ok(default),
            Some(MethodArg::Quantity(value)) => Ok(value.clone()),
            Some(_) => Err(invalid_argument(method, name, "a quantity")),
        }
    }
}

fn invalid_argument(method: &str, name: &str, expected: &'static str) -> Error {
    Error::InvalidArgument {
        method: method.to_string(),
        name: name.to_string(),
        expected,
    }
}

/// The result of a method invocation
#[derive(Debug, derive_more::From)]
pub enum MethodOutput {
    /// Points to draw the trace with
    PlotPoints(PlotPoints),
    /// Complex spectrum
    Spectrum(Spectrum),
    /// Power spectral density
    PowerSpectrum(PowerSpectrum),
    /// Detected events
    Events(EventSet),
    /// A derived trace
    Trace(Trace),
}

impl MethodOutput {
    pub fn into_plot_points(self) -> Option<PlotPoints> {
        match self {
            MethodOutput::PlotPoints(points) => Some(points),
            _ => None,
        }
    }

    pub fn into_spectrum(self) -> Option<Spectrum> {
        match self {
            MethodOutput::Spectrum(spectrum) => Some(spectrum),
            _ => None,
        }
    }

    pub fn into_power_spectrum(self) -> Option<PowerSpectrum> {
        match self {
            MethodOutput::PowerSpectrum(psd) => Some(psd),
            _ => None,
        }
    }

    pub fn into_events(self) -> Option<EventSet> {
        match self {
            MethodOutput::Events(events) => Some(events),
            _ => None,
        }
    }

    pub fn into_trace(self) -> Option<Trace> {
        match self {
            MethodOutput::Trace(trace) => Some(trace),
            _ => None,
        }
    }
}

/// Options for [`TraceMethodCtrl::register`]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterOpts {
    fallback_to_fixed_dt: bool,
    allow_override: bool,
}

impl RegisterOpts {
    /// Let traces of other kinds use this fixed timestep method after resampling
    pub fn fallback_to_fixed_dt(mut self) -> Self {
        self.fallback_to_fixed_dt = true;
        self
    }

    /// Replace an existing registration instead of failing
    pub fn allow_override(mut self) -> Self {
        self.allow_override = true;
        self
    }
}

#[derive(Clone)]
struct Registration {
    func: MethodFn,
    fallback_to_fixed_dt: bool,
}

/// How a [`Method`] reaches its implementation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Registered for the trace kind itself
    Direct,
    /// Registered for fixed timestep traces; the trace is resampled first
    ViaFixedDt,
}

/// A resolved method, ready to be called on traces of one kind
#[derive(Clone)]
pub struct Method {
    name: String,
    kind: TraceKind,
    resolution: Resolution,
    func: MethodFn,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The trace kind the method was resolved for
    pub fn kind(&self) -> TraceKind {
        self.kind
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Call the method on `trace`, which must be of the kind the method was resolved for.
    pub fn call(&self, trace: &Trace, args: &MethodArgs) -> TraceResult<MethodOutput> {
        if trace.kind() != self.kind {
            return Err(Error::WrongTraceKind {
                method: self.name.clone(),
                expected: self.kind,
                found: trace.kind(),
            });
        }
        match self.resolution {
            Resolution::Direct => (self.func)(trace, args),
            Resolution::ViaFixedDt => {
                let dt = args.resample_dt().ok_or_else(|| Error::MissingResampleInterval {
                    kind: self.kind,
                    method: self.name.clone(),
                })?;
                log::trace!("resampling {} to dt={} for `{}`", trace.id(), dt, self.name);
                let fixed = trace.to_fixed_dt(dt)?;
                (self.func)(&fixed, args)
            }
        }
    }
}

impl core::fmt::Debug for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

/// Binary arithmetic operators
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum BinOp {
    #[display(fmt = "+")]
    Add,
    #[display(fmt = "-")]
    Sub,
    #[display(fmt = "*")]
    Mul,
    #[display(fmt = "/")]
    Div,
}

/// What an operand is, as far as operator lookup is concerned
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, derive_more::Display)]
pub enum OperandKind {
    /// A trace of the given kind
    #[display(fmt = "{} trace", _0)]
    Trace(TraceKind),
    /// A quantity
    #[display(fmt = "scalar")]
    Scalar,
}

/// An operand of a binary operator
#[derive(Clone, Debug)]
pub enum Operand<'a> {
    Trace(&'a Trace),
    Scalar(Quantity),
}

impl<'a> Operand<'a> {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Trace(tr) => OperandKind::Trace(tr.kind()),
            Operand::Scalar(_) => OperandKind::Scalar,
        }
    }

    pub fn as_trace(&self) -> Option<&'a Trace> {
        match self {
            Operand::Trace(tr) => Some(tr),
            Operand::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Quantity> {
        match self {
            Operand::Trace(_) => None,
            Operand::Scalar(q) => Some(q),
        }
    }
}

impl<'a> From<&'a Trace> for Operand<'a> {
    fn from(value: &'a Trace) -> Self {
        Operand::Trace(value)
    }
}

impl From<Quantity> for Operand<'_> {
    fn from(value: Quantity) -> Self {
        Operand::Scalar(value)
    }
}

/// Registry of trace methods and operators.
///
/// This is the mutable, registration-phase form. Call [`TraceMethodCtrl::freeze`] before
/// sharing it.
#[derive(Clone, Default)]
pub struct TraceMethodCtrl {
    methods: HashMap<TraceKind, HashMap<String, Registration>>,
    operators: HashMap<(BinOp, OperandKind, OperandKind), OperatorFn>,
}

impl TraceMethodCtrl {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the standard methods and operators:
    ///
    /// - `plotpoints` for every trace kind;
    /// - `fft`, `psd` and `spikes` for fixed timestep traces, with fallback;
    /// - `+`, `-`, `*` and `/` between fixed timestep traces, between any trace and a
    ///   scalar, and between a scalar and a trace (except scalar `/` piecewise).
    pub fn with_std_methods() -> TraceResult<Self> {
        let mut ctrl = Self::new();
        plot::register(&mut ctrl)?;
        fft::register(&mut ctrl)?;
        spikes::register(&mut ctrl)?;
        arith::register(&mut ctrl)?;
        Ok(ctrl)
    }

    /// Register `func` as the method `name` for traces of `kind`.
    pub fn register<F>(&mut self, kind: TraceKind, name: impl Into<String>, func: F, opts: RegisterOpts) -> TraceResult<()>
    where
        F: Fn(&Trace, &MethodArgs) -> TraceResult<MethodOutput> + Send + Sync + 'static,
    {
        let name = name.into();
        if opts.fallback_to_fixed_dt && kind != TraceKind::FixedDt {
            return Err(Error::InvalidFallback { kind, method: name });
        }
        let table = self.methods.entry(kind).or_default();
        if !opts.allow_override && table.contains_key(&name) {
            return Err(Error::DuplicateMethod { kind, method: name });
        }
        log::debug!(
            "registering method `{}` for {} traces (fallback: {})",
            name,
            kind,
            opts.fallback_to_fixed_dt
        );
        table.insert(
            name,
            Registration {
                func: Arc::new(func),
                fallback_to_fixed_dt: opts.fallback_to_fixed_dt,
            },
        );
        Ok(())
    }

    fn registration(&self, kind: TraceKind, name: &str) -> Option<&Registration> {
        self.methods.get(&kind).and_then(|table| table.get(name))
    }

    fn fallback(&self, kind: TraceKind, name: &str) -> Option<&Registration> {
        if kind == TraceKind::FixedDt {
            return None;
        }
        self.registration(TraceKind::FixedDt, name)
            .filter(|reg| reg.fallback_to_fixed_dt)
    }

    /// Check if `name` can be called on traces of `kind`, directly or through fallback
    pub fn has_method(&self, kind: TraceKind, name: &str) -> bool {
        self.registration(kind, name).is_some() || self.fallback(kind, name).is_some()
    }

    /// Resolve the method `name` for traces of `kind`.
    ///
    /// A direct registration wins over a fixed timestep fallback.
    pub fn get_method(&self, kind: TraceKind, name: &str) -> TraceResult<Method> {
        let (reg, resolution) = if let Some(reg) = self.registration(kind, name) {
            (reg, Resolution::Direct)
        } else if let Some(reg) = self.fallback(kind, name) {
            (reg, Resolution::ViaFixedDt)
        } else {
            return Err(Error::MethodNotFound {
                kind,
                method: name.to_string(),
            });
        };
        log::trace!("resolved `{}` for {} traces: {:?}", name, kind, resolution);
        Ok(Method {
            name: name.to_string(),
            kind,
            resolution,
            func: Arc::clone(&reg.func),
        })
    }

    /// Resolve and call the method `name` on `trace`
    pub fn invoke(&self, trace: &Trace, name: &str, args: &MethodArgs) -> TraceResult<MethodOutput> {
        self.get_method(trace.kind(), name)?.call(trace, args)
    }

    /// Names of the methods callable on traces of `kind`, sorted
    pub fn method_names(&self, kind: TraceKind) -> Vec<&str> {
        let direct = self.methods.get(&kind).into_iter().flat_map(|table| table.keys());
        let fallback = self
            .methods
            .get(&TraceKind::FixedDt)
            .into_iter()
            .flat_map(|table| table.iter())
            .filter(|(_, reg)| kind != TraceKind::FixedDt && reg.fallback_to_fixed_dt)
            .map(|(name, _)| name);
        let mut names: Vec<&str> = direct.chain(fallback).map(String::as_str).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Register the implementation of `lhs op rhs` for these exact operand kinds.
    pub fn register_operator<F>(&mut self, op: BinOp, lhs: OperandKind, rhs: OperandKind, func: F) -> TraceResult<()>
    where
        F: Fn(Operand<'_>, Operand<'_>) -> TraceResult<Trace> + Send + Sync + 'static,
    {
        let key = (op, lhs, rhs);
        if self.operators.contains_key(&key) {
            return Err(Error::DuplicateOperator { op, lhs, rhs });
        }
        log::debug!("registering operator `{} {} {}`", lhs, op, rhs);
        self.operators.insert(key, Arc::new(func));
        Ok(())
    }

    /// Check if `lhs op rhs` has an implementation
    pub fn has_operator(&self, op: BinOp, lhs: OperandKind, rhs: OperandKind) -> bool {
        self.operators.contains_key(&(op, lhs, rhs))
    }

    /// Compute `lhs op rhs`.
    ///
    /// Lookup is exact: operands are never converted to another trace kind to find an
    /// implementation.
    pub fn apply_operator<'a>(
        &self,
        op: BinOp,
        lhs: impl Into<Operand<'a>>,
        rhs: impl Into<Operand<'a>>,
    ) -> TraceResult<Trace> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let key = (op, lhs.kind(), rhs.kind());
        let func = self.operators.get(&key).ok_or(Error::OperatorNotFound {
            op,
            lhs: key.1,
            rhs: key.2,
        })?;
        func(lhs, rhs)
    }

    /// Finish registration, producing a read-only, shareable registry
    pub fn freeze(self) -> FrozenMethodCtrl {
        FrozenMethodCtrl(Arc::new(self))
    }
}

impl core::fmt::Debug for TraceMethodCtrl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let methods: Vec<_> = self
            .methods
            .iter()
            .flat_map(|(kind, table)| table.keys().map(move |name| (*kind, name)))
            .collect();
        f.debug_struct("TraceMethodCtrl")
            .field("methods", &methods)
            .field("operators", &self.operators.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A read-only registry, cheap to clone and safe to share between threads.
///
/// It dereferences to [`TraceMethodCtrl`], but only lookups and calls are available.
#[derive(Clone, Debug)]
pub struct FrozenMethodCtrl(Arc<TraceMethodCtrl>);

impl Deref for FrozenMethodCtrl {
    type Target = TraceMethodCtrl;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
