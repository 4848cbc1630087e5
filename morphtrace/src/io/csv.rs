//! A self-describing, tab separated text format for traces and event sets
//!
//! ```text
//! !{"simulation":"sim1"}
//! #! COLUMN0: {"label":"soma","unit":"mV","tags":"Voltage,SIM1"}
//! #! COLUMN1: {"label":"dend","unit":"mV","tags":"Voltage"}
//! #@ EVENT {"label":"spikes","tags":"Spike"} 12.50 40.25
//! 0.000000  	-65.000000	    -
//! 1.000000  	-64.500000	-65.000000
//! ```
//!
//! The header has three parts, each starting on a new line: the `!` metadata line, one
//! `#! COLUMN<i>:` line per trace and one `#@ EVENT` line per event set (event times in
//! `ms`). A part with nothing in it is still written, as an empty line. Every following
//! line is
//! one of the requested sample times, then one cell per trace: the value in the unit of
//! the trace, or `-` where the trace does not cover that time.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::events::EventSet;
use crate::tags::Tagged;
use crate::traces::Trace;
use crate::units::{Quantity, QuantityArray, Unit};
use crate::{Error, TraceResult};

/// Minimum width of every cell
const COL_WIDTH: usize = 10;

const COLUMN_PREFIX: &str = "#! COLUMN";
const EVENT_PREFIX: &str = "#@ EVENT ";
const METADATA_PREFIX: &str = "!";

fn data_cell(value: f64) -> String {
    format!("{:<width$}", format!("{:.6}", value), width = COL_WIDTH)
}

fn missing_cell() -> String {
    format!("{:^width$}", "-", width = COL_WIDTH)
}

/// Description of one data column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHeader {
    /// Name of the trace
    pub label: Option<String>,
    /// Symbol of the data unit
    pub unit: String,
    /// Comma separated tags
    pub tags: String,
}

impl ColumnHeader {
    pub fn for_trace(trace: &Trace) -> Self {
        Self {
            label: trace.name().map(str::to_string),
            unit: trace.data_unit().symbol().to_string(),
            tags: trace.tags().to_string(),
        }
    }

    /// The header line for column `index`
    pub fn to_line(&self, index: usize) -> TraceResult<String> {
        Ok(format!("{}{}: {}", COLUMN_PREFIX, index, serde_json::to_string(self)?))
    }

    /// Read back a line written by [`ColumnHeader::to_line`], with its column index
    pub fn parse_line(line: &str) -> TraceResult<(usize, Self)> {
        let malformed = || Error::InvalidHeader(line.to_string());
        let (index, json) = line
            .strip_prefix(COLUMN_PREFIX)
            .and_then(|rest| rest.split_once(": "))
            .ok_or_else(malformed)?;
        let index = index.parse().map_err(|_| malformed())?;
        Ok((index, serde_json::from_str(json)?))
    }
}

/// Description of one event set, followed on the same line by its event times
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSetHeader {
    /// Name of the event set
    pub label: Option<String>,
    /// Comma separated tags
    pub tags: String,
}

impl EventSetHeader {
    pub fn for_event_set(event_set: &EventSet) -> Self {
        Self {
            label: event_set.name().map(str::to_string),
            tags: event_set.tags().to_string(),
        }
    }

    /// The header line for `event_set`, with the event times in `ms`
    pub fn to_line(&self, event_set: &EventSet) -> TraceResult<String> {
        let times = event_set.times().rescale(&Unit::ms())?;
        Ok(format!(
            "{}{} {}",
            EVENT_PREFIX,
            serde_json::to_string(self)?,
            times.values.iter().map(|t| format!("{:.2}", t)).join(" ")
        ))
    }

    /// Read back a line written by [`EventSetHeader::to_line`], with the event times
    pub fn parse_line(line: &str) -> TraceResult<(Self, QuantityArray)> {
        let malformed = || Error::InvalidHeader(line.to_string());
        let rest = line.strip_prefix(EVENT_PREFIX).ok_or_else(malformed)?;
        let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<EventSetHeader>();
        let header = stream.next().ok_or_else(malformed)??;
        let times = rest[stream.byte_offset()..]
            .split_whitespace()
            .map(|t| t.parse::<f64>().map_err(|_| malformed()))
            .collect::<TraceResult<Vec<_>>>()?;
        Ok((header, QuantityArray::new(times, Unit::ms())))
    }
}

/// Writes traces and event sets in the text format described in the
/// [module documentation](self).
///
/// Rows follow `time_indices` exactly as given; columns follow the order the traces
/// were added in.
#[derive(Debug)]
pub struct NeuroCsvWriter<'a> {
    time_indices: QuantityArray,
    traces: Vec<&'a Trace>,
    event_sets: Vec<&'a EventSet>,
    metadata: Option<serde_json::Value>,
}

impl<'a> NeuroCsvWriter<'a> {
    /// A writer sampling every trace at `time_indices`
    pub fn new(time_indices: QuantityArray) -> Self {
        Self {
            time_indices,
            traces: Vec::new(),
            event_sets: Vec::new(),
            metadata: None,
        }
    }

    /// Add data columns
    pub fn traces(mut self, traces: impl IntoIterator<Item = &'a Trace>) -> Self {
        self.traces.extend(traces);
        self
    }

    /// Add event set header lines
    pub fn event_sets(mut self, event_sets: impl IntoIterator<Item = &'a EventSet>) -> Self {
        self.event_sets.extend(event_sets);
        self
    }

    /// Set the metadata written on the first line
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The metadata, column and event parts of the header, joined by newlines
    fn header(&self) -> TraceResult<String> {
        let metadata = match &self.metadata {
            Some(metadata) => format!("{}{}", METADATA_PREFIX, serde_json::to_string(metadata)?),
            None => String::new(),
        };
        let columns = self
            .traces
            .iter()
            .enumerate()
            .map(|(index, trace)| ColumnHeader::for_trace(trace).to_line(index))
            .collect::<TraceResult<Vec<_>>>()?;
        let events = self
            .event_sets
            .iter()
            .map(|event_set| EventSetHeader::for_event_set(event_set).to_line(event_set))
            .collect::<TraceResult<Vec<_>>>()?;
        Ok([metadata, columns.join("\n"), events.join("\n")].join("\n"))
    }

    /// The cells of one column: times outside the trace get the placeholder, the others
    /// the value of the trace.
    fn column(&self, trace: &Trace) -> TraceResult<Vec<String>> {
        let within = trace.time_within_trace(&self.time_indices)?;
        let (rows, times): (Vec<usize>, Vec<f64>) = self
            .time_indices
            .values
            .iter()
            .zip(&within)
            .enumerate()
            .filter(|(_, (_, inside))| **inside)
            .map(|(row, (&time, _))| (row, time))
            .unzip();
        let values = trace.get_values(&QuantityArray::new(times, self.time_indices.unit.clone()))?;

        let mut cells = vec![missing_cell(); self.time_indices.len()];
        for (row, value) in rows.into_iter().zip(values) {
            if let Some(Quantity { value, .. }) = value {
                cells[row] = data_cell(value);
            }
        }
        Ok(cells)
    }

    /// Write the header and the data block to `out`
    pub fn write_to_buffer<W: Write>(&self, mut out: W) -> TraceResult<()> {
        log::debug!(
            "writing {} traces and {} event sets at {} time points",
            self.traces.len(),
            self.event_sets.len(),
            self.time_indices.len()
        );
        // Everything is formatted up front so that a unit error aborts before writing
        let header = self.header()?;
        let columns = self
            .traces
            .iter()
            .map(|trace| self.column(trace))
            .collect::<TraceResult<Vec<_>>>()?;

        writeln!(out, "{}", header)?;
        for (row, time) in self.time_indices.values.iter().enumerate() {
            let cells = std::iter::once(data_cell(*time)).chain(columns.iter().map(|col| col[row].clone()));
            writeln!(out, "{}", cells.format("\t"))?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write to the file at `path`, replacing it.
    ///
    /// On error, the file may be left partially written.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> TraceResult<()> {
        let path = path.as_ref();
        log::debug!("writing traces to {}", path.display());
        let file = File::create(path)?;
        self.write_to_buffer(BufWriter::new(file))
    }

    /// Write to a string
    pub fn write_to_string(&self) -> TraceResult<String> {
        let mut buffer = Vec::new();
        self.write_to_buffer(&mut buffer)?;
        // Only `format!` output and JSON go into the buffer
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::tags::TagSelector;
    use crate::traces::{Piece, TraceFixedDt, TracePiecewise, TraceVariableDt};

    fn ms(values: Vec<f64>) -> QuantityArray {
        QuantityArray::new(values, Unit::ms())
    }

    fn traces() -> Vec<Trace> {
        vec![
            Trace::new(
                TraceFixedDt::new(
                    Quantity::new(0.0, Unit::ms()),
                    Quantity::new(1.0, Unit::ms()),
                    QuantityArray::new(vec![-65.0, -64.5, -64.0, -63.5], Unit::mv()),
                )
                .unwrap(),
            )
            .with_name("soma")
            .with_tags(["Voltage", "SIM1"]),
            Trace::new(
                TraceVariableDt::new(ms(vec![0.0, 1.5]), QuantityArray::new(vec![0.1, 0.2], Unit::na())).unwrap(),
            )
            .with_name("stim")
            .with_tags(["Current"]),
            Trace::new(
                TracePiecewise::new(vec![Piece::linear(1.0, 2.0, -70.0, -60.0)], Unit::ms(), Unit::mv()).unwrap(),
            )
            .with_name("dend")
            .with_tags(["Voltage"]),
        ]
    }

    #[test]
    fn cell_formatting() {
        assert_eq!(data_cell(1.5), "1.500000  ");
        assert_eq!(data_cell(-65.0), "-65.000000");
        assert_eq!(data_cell(12345.0), "12345.000000");
        assert_eq!(missing_cell(), "    -     ");
    }

    #[test]
    fn selected_voltage_traces() {
        let traces = traces();
        let selector = TagSelector::from_string("Voltage").unwrap();
        let selected = selector.select(&traces);
        let out = NeuroCsvWriter::new(ms(vec![0.0, 1.0, 2.0, 3.0]))
            .traces(selected)
            .write_to_string()
            .unwrap();
        let expected = [
            "",
            r#"#! COLUMN0: {"label":"soma","unit":"mV","tags":"Voltage,SIM1"}"#,
            r#"#! COLUMN1: {"label":"dend","unit":"mV","tags":"Voltage"}"#,
            "",
            "0.000000  \t-65.000000\t    -     ",
            "1.000000  \t-64.500000\t-70.000000",
            "2.000000  \t-64.000000\t-60.000000",
            "3.000000  \t-63.500000\t    -     ",
        ];
        assert_eq!(out, expected.iter().map(|l| format!("{}\n", l)).collect::<String>());
    }

    #[test]
    fn rows_follow_time_indices_order() {
        let traces = traces();
        let out = NeuroCsvWriter::new(QuantityArray::new(vec![0.003, 0.0, 0.0015], Unit::s()))
            .traces(&traces[..2])
            .write_to_string()
            .unwrap();
        let rows: Vec<_> = out.lines().skip(4).collect();
        assert_eq!(rows[0], "0.003000  \t-63.500000\t    -     ");
        assert_eq!(rows[1], "0.000000  \t-65.000000\t0.100000  ");
        assert_eq!(rows[2], "0.001500  \t-64.500000\t0.200000  ");
    }

    #[test]
    fn metadata_and_event_headers() {
        let spikes = EventSet::from_times(QuantityArray::new(vec![0.0125, 0.04025], Unit::s()))
            .unwrap()
            .with_name("spikes")
            .with_tags(["Spike"]);
        let out = NeuroCsvWriter::new(ms(vec![]))
            .event_sets([&spikes])
            .metadata(json!({"simulation": "sim1"}))
            .write_to_string()
            .unwrap();
        assert_eq!(
            out,
            "!{\"simulation\":\"sim1\"}\n\n#@ EVENT {\"label\":\"spikes\",\"tags\":\"Spike\"} 12.50 40.25\n"
        );

        let line = out.lines().nth(2).unwrap();
        let (header, times) = EventSetHeader::parse_line(line).unwrap();
        assert_eq!(header, EventSetHeader::for_event_set(&spikes));
        assert_eq!(times.values, vec![12.5, 40.25]);
    }

    #[test]
    fn column_headers_read_back() {
        let traces = traces();
        let line = ColumnHeader::for_trace(&traces[1]).to_line(7).unwrap();
        let (index, header) = ColumnHeader::parse_line(&line).unwrap();
        assert_eq!(index, 7);
        assert_eq!(header.label.as_deref(), Some("stim"));
        assert_eq!(header.unit, "nA");
        assert_eq!(header.tags, "Current");

        assert!(matches!(
            ColumnHeader::parse_line("#! COLUMNx: {}"),
            Err(Error::InvalidHeader(_))
        ));
        assert!(matches!(ColumnHeader::parse_line("#! COLUMN0: {"), Err(Error::Json(_))));
    }

    #[test]
    fn unit_errors_abort_before_writing() {
        let traces = traces();
        let mut buffer = Vec::new();
        let err = NeuroCsvWriter::new(QuantityArray::new(vec![1.0], Unit::mv()))
            .traces(&traces)
            .write_to_buffer(&mut buffer)
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleUnits { .. }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_header_parts_are_blank_lines() {
        let traces = traces();
        let out = NeuroCsvWriter::new(ms(vec![0.0])).write_to_string().unwrap();
        assert_eq!(out, "\n\n\n0.000000  \n");

        let out = NeuroCsvWriter::new(ms(vec![]))
            .traces(&traces[..1])
            .metadata(json!({}))
            .write_to_string()
            .unwrap();
        assert_eq!(
            out,
            "!{}\n#! COLUMN0: {\"label\":\"soma\",\"unit\":\"mV\",\"tags\":\"Voltage,SIM1\"}\n\n"
        );
    }

    #[test]
    fn placeholder_exactly_outside_coverage() {
        let traces = traces();
        let out = NeuroCsvWriter::new(ms(vec![0.999, 1.0, 2.0, 2.001]))
            .traces(&traces[2..])
            .write_to_string()
            .unwrap();
        let cells: Vec<_> = out.lines().skip(3).map(|row| row.split('\t').nth(1).unwrap()).collect();
        assert_eq!(cells, vec!["    -     ", "-70.000000", "-60.000000", "    -     "]);
    }

    #[test]
    fn output_is_deterministic() {
        let traces = traces();
        let writer = NeuroCsvWriter::new(ms(vec![0.25, 1.75])).traces(&traces);
        assert_eq!(writer.write_to_string().unwrap(), writer.write_to_string().unwrap());
    }

    #[test]
    fn write_to_file() {
        let traces = traces();
        let path = std::env::temp_dir().join(format!("morphtrace-{}.csv", traces[0].id()));
        let writer = NeuroCsvWriter::new(ms(vec![0.0])).traces(&traces);
        writer.write_to_file(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(written, writer.write_to_string().unwrap());
    }
}
