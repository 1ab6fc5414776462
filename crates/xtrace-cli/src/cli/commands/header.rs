use crate::cli::args::{HeaderArgs, HeaderSub};
use crate::exit_codes::SUCCESS;
use chrono::Utc;
use serde_json::json;
use xtrace_core::{SamplingRate, Trace};

pub fn run(args: HeaderArgs) -> anyhow::Result<i32> {
    match args.cmd {
        HeaderSub::Parse {
            value,
            sampling_rate,
        } => {
            let trace = Trace::from_header_value(&value, SamplingRate::new(sampling_rate)?);
            println!("{}", serde_json::to_string_pretty(&describe(&trace))?);
        }
        HeaderSub::Generate { sampling_rate } => {
            let trace = Trace::generate(Utc::now(), SamplingRate::new(sampling_rate)?);
            println!("{}", trace.to_header_value());
        }
    }
    Ok(SUCCESS)
}

fn describe(trace: &Trace) -> serde_json::Value {
    let extra: Vec<_> = trace
        .extra_fields()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();
    json!({
        "root": trace.root(),
        "well_formed_root": trace.has_well_formed_root(),
        "parent": trace.parent(),
        "sampled": trace.is_sampled(),
        "extra": extra,
        "header": trace.to_header_value(),
    })
}
