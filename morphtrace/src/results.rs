//! The traces and event sets produced by one simulation run

use hashbrown::HashMap;

use crate::events::EventSet;
use crate::tags::TagSelector;
use crate::traces::Trace;
use crate::{Error, TraceResult};

/// Lookup of finished traces by name
pub trait TraceSource {
    /// Names of all named traces, in insertion order
    fn trace_names(&self) -> Vec<&str>;

    /// The trace called `name`, if any
    fn get_trace(&self, name: &str) -> Option<&Trace>;
}

/// Owns the traces and event sets of one simulation run, in insertion order.
///
/// Names are unique within a result set; unnamed traces and event sets can be added
/// freely and are only reachable through iteration and tag selection.
#[derive(Debug, Default)]
pub struct ResultSet {
    traces: Vec<Trace>,
    trace_index: HashMap<String, usize>,
    event_sets: Vec<EventSet>,
    event_set_index: HashMap<String, usize>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trace, failing if another trace already has its name
    pub fn add_trace(&mut self, trace: Trace) -> TraceResult<()> {
        if let Some(name) = trace.name() {
            if self.trace_index.contains_key(name) {
                return Err(Error::DuplicateTraceName(name.to_string()));
            }
            self.trace_index.insert(name.to_string(), self.traces.len());
        }
        log::trace!("adding {} ({:?}) to result set", trace.id(), trace.name());
        self.traces.push(trace);
        Ok(())
    }

    /// Add an event set, failing if another event set already has its name
    pub fn add_event_set(&mut self, event_set: EventSet) -> TraceResult<()> {
        if let Some(name) = event_set.name() {
            if self.event_set_index.contains_key(name) {
                return Err(Error::DuplicateTraceName(name.to_string()));
            }
            self.event_set_index.insert(name.to_string(), self.event_sets.len());
        }
        self.event_sets.push(event_set);
        Ok(())
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn event_sets(&self) -> &[EventSet] {
        &self.event_sets
    }

    pub fn get_event_set(&self, name: &str) -> Option<&EventSet> {
        self.event_set_index.get(name).map(|&idx| &self.event_sets[idx])
    }

    /// Traces matching `selector`, in insertion order
    pub fn select_traces(&self, selector: &TagSelector) -> Vec<&Trace> {
        selector.select(&self.traces)
    }

    /// Event sets matching `selector`, in insertion order
    pub fn select_event_sets(&self, selector: &TagSelector) -> Vec<&EventSet> {
        selector.select(&self.event_sets)
    }
}

impl TraceSource for ResultSet {
    fn trace_names(&self) -> Vec<&str> {
        self.traces.iter().filter_map(Trace::name).collect()
    }

    fn get_trace(&self, name: &str) -> Option<&Trace> {
        self.trace_index.get(name).map(|&idx| &self.traces[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::Tagged;
    use crate::traces::TraceFixedDt;
    use crate::units::{Quantity, QuantityArray, Unit};

    fn trace(name: &str, tags: &[&str]) -> Trace {
        Trace::new(
            TraceFixedDt::new(
                Quantity::new(0.0, Unit::ms()),
                Quantity::new(1.0, Unit::ms()),
                QuantityArray::new(vec![0.0], Unit::mv()),
            )
            .unwrap(),
        )
        .with_name(name)
        .with_tags(tags.iter().copied())
    }

    #[test]
    fn names_are_unique() {
        let mut results = ResultSet::new();
        results.add_trace(trace("soma", &["Voltage"])).unwrap();
        let err = results.add_trace(trace("soma", &["Current"])).unwrap_err();
        assert!(matches!(err, Error::DuplicateTraceName(name) if name == "soma"));
        assert_eq!(results.traces().len(), 1);

        results
            .add_event_set(EventSet::from_times(QuantityArray::new(vec![1.0], Unit::ms())).unwrap().with_name("soma"))
            .unwrap();
        assert!(results.get_event_set("soma").is_some());
    }

    #[test]
    fn lookup_and_selection() {
        let mut results = ResultSet::new();
        results.add_trace(trace("soma", &["Voltage", "SIM1"])).unwrap();
        results.add_trace(trace("axon", &["Current", "SIM1"])).unwrap();
        results.add_trace(trace("dend", &["Voltage", "SIM2"])).unwrap();

        assert_eq!(results.trace_names(), vec!["soma", "axon", "dend"]);
        assert!(results.get_trace("axon").unwrap().tags().contains("Current"));
        assert!(results.get_trace("nope").is_none());

        let selector = TagSelector::from_string("ALL{Voltage,SIM1}").unwrap();
        let picked: Vec<_> = results.select_traces(&selector).into_iter().filter_map(Trace::name).collect();
        assert_eq!(picked, vec!["soma"]);

        let selector = TagSelector::from_string("Voltage").unwrap();
        let picked: Vec<_> = results.select_traces(&selector).into_iter().filter_map(Trace::name).collect();
        assert_eq!(picked, vec!["soma", "dend"]);
    }
}
