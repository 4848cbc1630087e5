//! Parse a tag selector and print its canonical form, or report the parse errors.
//!
//! ```text
//! cargo run --example dump_selector --features reporting -- 'ALL{Voltage,SIM1} | !Current' Voltage SIM1
//! ```
//!
//! Any further arguments are treated as the tags of a subject to match against.
use std::env;

use ariadne::{sources, Color, Label, Report, ReportKind};
use morphtrace::{parse_str, TagSet};

fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let src = args.next().expect("Expected tag selector");
    let tags: TagSet = args.collect();

    match parse_str(&src) {
        Ok(selector) => {
            println!("{}", selector);
            if !tags.is_empty() {
                println!("[{}] -> {}", tags, selector.matches_tags(&tags));
            }
        }
        Err(errs) => {
            errs.into_iter().for_each(|e| {
                Report::build(ReportKind::Error, src.clone(), e.span().start)
                    .with_message(e.to_string())
                    .with_label(
                        Label::new((src.clone(), e.span().into_range()))
                            .with_message(e.reason().to_string())
                            .with_color(Color::Red),
                    )
                    .with_labels(e.contexts().map(|(label, span)| {
                        Label::new((src.clone(), span.into_range()))
                            .with_message(format!("while parsing this {}", label))
                            .with_color(Color::Yellow)
                    }))
                    .finish()
                    .eprint(sources([(src.clone(), src.clone())]))
                    .unwrap()
            });
        }
    }
}
