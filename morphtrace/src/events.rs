//! Timestamped events and named collections of them
//!
//! An [`EventSet`] is typically produced by a spike detector or recorded directly by a
//! simulator. The set keeps its events in the order they were given; use
//! [`EventSet::is_sorted`] and [`EventSet::sorted`] when time order matters.

use crate::tags::{TagSet, Tagged};
use crate::units::{Quantity, QuantityArray, Unit};
use crate::TraceResult;

/// A single timestamped occurrence, with an optional value attached to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    time: Quantity,
    payload: Option<Quantity>,
}

impl Event {
    /// An event at `time` without payload
    pub fn new(time: Quantity) -> Self {
        Self { time, payload: None }
    }

    /// An event at `time` carrying `payload`, for example the peak voltage of a spike
    pub fn with_payload(time: Quantity, payload: Quantity) -> Self {
        Self {
            time,
            payload: Some(payload),
        }
    }

    pub fn time(&self) -> &Quantity {
        &self.time
    }

    pub fn payload(&self) -> Option<&Quantity> {
        self.payload.as_ref()
    }
}

/// An ordered collection of events sharing one time unit, with a name, a comment and
/// tags.
#[derive(Clone, Debug)]
pub struct EventSet {
    name: Option<String>,
    comment: Option<String>,
    tags: TagSet,
    time_unit: Unit,
    events: Vec<Event>,
}

impl EventSet {
    /// Build a set with one event per time point, in input order.
    ///
    /// Fails if `times` is not in a time unit.
    pub fn from_times(times: QuantityArray) -> TraceResult<Self> {
        times.unit.conversion_factor(&Unit::s())?;
        let events = times.iter().map(Event::new).collect();
        Ok(Self {
            name: None,
            comment: None,
            tags: TagSet::new(),
            time_unit: times.unit,
            events,
        })
    }

    /// Build a set from events, expressing every event time in `time_unit`.
    ///
    /// Fails if `time_unit` or any event time is not a time.
    pub fn from_events(events: impl IntoIterator<Item = Event>, time_unit: Unit) -> TraceResult<Self> {
        time_unit.conversion_factor(&Unit::s())?;
        let events = events
            .into_iter()
            .map(|ev| {
                Ok(Event {
                    time: ev.time.rescale(&time_unit)?,
                    payload: ev.payload,
                })
            })
            .collect::<TraceResult<Vec<_>>>()?;
        Ok(Self {
            name: None,
            comment: None,
            tags: TagSet::new(),
            time_unit,
            events,
        })
    }

    /// Set the name of the event set
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the comment of the event set
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Add the given tags to the event set
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    pub fn time_unit(&self) -> &Unit {
        &self.time_unit
    }

    /// Iterate over the events. Every call starts again from the first event.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event times, in the time unit of the set
    pub fn times(&self) -> QuantityArray {
        let times = self.events.iter().map(|ev| ev.time.value).collect();
        QuantityArray::new(times, self.time_unit.clone())
    }

    /// A new set with the events whose time lies in `[start, end]`.
    ///
    /// The new set keeps the metadata of `self` and the relative order of the events.
    pub fn window(&self, start: &Quantity, end: &Quantity) -> TraceResult<EventSet> {
        let start = start.magnitude_in(&self.time_unit)?;
        let end = end.magnitude_in(&self.time_unit)?;
        let events = self
            .events
            .iter()
            .filter(|ev| start <= ev.time.value && ev.time.value <= end)
            .cloned()
            .collect();
        Ok(EventSet { events, ..self.clone_metadata() })
    }

    /// Check if the events are in non-decreasing time order
    pub fn is_sorted(&self) -> bool {
        self.events.windows(2).all(|w| w[0].time.value <= w[1].time.value)
    }

    /// A copy with the events in time order; events at the same time keep their order.
    pub fn sorted(&self) -> EventSet {
        let mut events = self.events.clone();
        events.sort_by(|a, b| a.time.value.total_cmp(&b.time.value));
        EventSet { events, ..self.clone_metadata() }
    }

    fn clone_metadata(&self) -> EventSet {
        EventSet {
            name: self.name.clone(),
            comment: self.comment.clone(),
            tags: self.tags.clone(),
            time_unit: self.time_unit.clone(),
            events: Vec::new(),
        }
    }
}

impl<'a> IntoIterator for &'a EventSet {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Tagged for EventSet {
    fn tags(&self) -> &TagSet {
        &self.tags
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn ms(values: Vec<f64>) -> QuantityArray {
        QuantityArray::new(values, Unit::ms())
    }

    #[test]
    fn from_times_keeps_input_order() {
        let set = EventSet::from_times(ms(vec![3.0, 1.0, 2.0])).unwrap();
        assert_eq!(set.times().values, vec![3.0, 1.0, 2.0]);
        assert!(!set.is_sorted());
        let sorted = set.sorted();
        assert_eq!(sorted.times().values, vec![1.0, 2.0, 3.0]);
        assert!(sorted.is_sorted());
        // source untouched
        assert_eq!(set.times().values, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn iteration_restarts() {
        let set = EventSet::from_times(ms(vec![1.0, 2.0])).unwrap();
        assert_eq!(set.iter().count(), 2);
        assert_eq!(set.iter().count(), 2);
        assert_eq!((&set).into_iter().map(|ev| ev.time().value).sum::<f64>(), 3.0);
    }

    #[test]
    fn window_is_inclusive_and_unit_aware() {
        let set = EventSet::from_times(ms(vec![1.0, 5.0, 10.0, 15.0]))
            .unwrap()
            .with_name("spikes")
            .with_tags(["Spike"]);
        let win = set
            .window(&Quantity::new(0.005, Unit::s()), &Quantity::new(10.0, Unit::ms()))
            .unwrap();
        assert_eq!(win.times().values, vec![5.0, 10.0]);
        assert_eq!(win.name(), Some("spikes"));
        assert!(win.tags().contains("Spike"));
        assert_eq!(set.len(), 4);

        let err = set.window(&Quantity::new(0.0, Unit::mv()), &Quantity::new(1.0, Unit::ms()));
        assert!(matches!(err, Err(crate::Error::IncompatibleUnits { .. })));
    }

    #[test]
    fn from_events_rescales() {
        let events = vec![
            Event::with_payload(Quantity::new(0.002, Unit::s()), Quantity::new(30.0, Unit::mv())),
            Event::new(Quantity::new(3.0, Unit::ms())),
        ];
        let set = EventSet::from_events(events, Unit::ms()).unwrap();
        assert_eq!(set.times().values, vec![2.0, 3.0]);
        assert_eq!(set.iter().next().unwrap().payload(), Some(&Quantity::new(30.0, Unit::mv())));

        let bad = EventSet::from_events([Event::new(Quantity::new(1.0, Unit::mv()))], Unit::ms());
        assert!(bad.is_err());
        let bad = EventSet::from_events([Event::new(Quantity::new(1.0, Unit::mv()))], Unit::mv());
        assert!(matches!(bad, Err(crate::Error::IncompatibleUnits { .. })));
    }

    #[test]
    fn times_must_be_times() {
        let err = EventSet::from_times(QuantityArray::new(vec![1.0], Unit::mv())).unwrap_err();
        assert!(matches!(err, crate::Error::IncompatibleUnits { .. }));
        assert!(EventSet::from_times(QuantityArray::new(vec![0.5], Unit::s())).is_ok());
    }

    proptest! {
        #[test]
        fn window_selects_exactly_the_covered_events(
            times in prop::collection::vec(0.0..100.0f64, 0..50),
            a in 0.0..100.0f64,
            b in 0.0..100.0f64,
        ) {
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            let set = EventSet::from_times(ms(times.clone())).unwrap();
            let win = set.window(&Quantity::new(start, Unit::ms()), &Quantity::new(end, Unit::ms())).unwrap();
            let expected: Vec<_> = times.into_iter().filter(|t| start <= *t && *t <= end).collect();
            prop_assert_eq!(win.times().values, expected);
        }
    }
}
