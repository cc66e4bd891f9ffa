use std::collections::VecDeque;
use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use netcost::dot::write_dot;
use netcost::model::load_network;
use netcost::{analyze, format_count, Analysis, AnalysisOptions};

mod config;

use config::Config;

#[derive(Clone, Debug, Default)]
struct Args {
    /// Network document to analyze.
    graph: Option<PathBuf>,

    /// Config file to load.
    config: Option<PathBuf>,

    /// Write the graph in DOT format.
    debug: bool,

    /// Path for the DOT output.
    dot: Option<PathBuf>,

    /// Output the report as JSON.
    json: bool,

    /// Print each node as it is built and computed.
    verbose: bool,
}

fn parse_args() -> Result<Args, lexopt::Error> {
    use lexopt::prelude::*;

    let mut values = VecDeque::new();
    let mut args = Args::default();

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Value(val) => values.push_back(val.string()?),
            Short('c') | Long("config") => args.config = Some(parser.value()?.into()),
            Short('d') | Long("debug") => args.debug = true,
            Long("dot") => args.dot = Some(parser.value()?.into()),
            Long("json") => args.json = true,
            Short('v') | Long("verbose") => args.verbose = true,
            Short('h') | Long("help") => {
                println!(
                    "Estimate the compute cost of a neural network.

Usage: {bin_name} [OPTIONS] [<graph>]

Args:

  <graph>
    Network document in JSON format. If not given, the `input_graph_json`
    value from the config file is used.

Options:

  -c, --config <path>  Config file [default: {default_config} if present]
  -d, --debug          Write the graph in DOT format
  --dot <path>         Path for DOT output [default: {default_dot}]
  --json               Output the report as JSON
  -v, --verbose        Print each node as it is built and computed
  -h, --help           Print help

Environment:

  NETCOST_DEBUG        Enable or disable DOT output (1/0)
  NETCOST_VERBOSE      Enable verbose output (1/0)
",
                    bin_name = parser.bin_name().unwrap_or("netcost"),
                    default_config = config::DEFAULT_CONFIG_FILE,
                    default_dot = config::DEFAULT_DOT_OUTPUT,
                );
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected()),
        }
    }

    if let Some(graph) = values.pop_front() {
        args.graph = Some(graph.into());
    }
    if let Some(extra) = values.pop_front() {
        return Err(lexopt::Error::UnexpectedArgument(extra.into()));
    }

    Ok(args)
}

/// Write the per-node report lines, a summary by operator kind and totals.
fn write_report(analysis: &Analysis, config: &Config, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let report = analysis.report();

    if config.json {
        writeln!(out, "{}", report.to_json()?)?;
        return Ok(());
    }

    // In verbose mode each line was printed as the node was computed.
    if !config.verbose() {
        write!(out, "{}", report)?;
    }

    writeln!(out)?;
    writeln!(out, "Cost by operator kind:")?;
    writeln!(out)?;
    write!(out, "{}", report.summary())?;
    writeln!(out)?;
    writeln!(
        out,
        "Total: {} nodes, {} MACs, {} ops, {} params",
        report.totals.nodes,
        format_count(report.totals.mac_count),
        format_count(report.totals.op_count),
        format_count(report.totals.params),
    )?;

    Ok(())
}

fn run(config: &Config, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let network = load_network(&config.input_graph_json)?;
    let analysis = analyze(
        &network,
        &AnalysisOptions {
            verbose: config.verbose(),
        },
    )?;

    for diagnostic in analysis.diagnostics() {
        eprintln!("warning: {}", diagnostic);
    }

    write_report(&analysis, config, out)?;

    if config.debug_graph {
        let mut dot_file = BufWriter::new(File::create(&config.dot_output)?);
        write_dot(&analysis.graph, &mut dot_file)?;
        dot_file.flush()?;
        eprintln!("Wrote graph to {}", config.dot_output.display());
    }

    Ok(())
}

/// Tool for estimating the compute cost of a network exported as JSON.
///
/// ```
/// netcost resnet18.json
/// ```
///
/// Options can also be set in a `netcost.json` config file. See `--help`.
fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    let config = Config::load(&args)?;
    let mut stdout = std::io::stdout().lock();
    run(&config, &mut stdout)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use netcost_testing::{network, NodeFixture};
    use serde_json::json;

    use super::run;
    use crate::config::Config;

    /// Write a small network to a temporary file and return a config for it.
    fn test_config(name: &str) -> Config {
        let doc = network([
            NodeFixture::new("data", "Input").output_with_shape("data", &[1, 3, 8, 8]),
            NodeFixture::new("conv1", "Convolution")
                .input("data")
                .output("conv1")
                .attr("num_output", json!(4))
                .attr("kernel_size", json!([3]))
                .attr("pad", json!([1])),
            NodeFixture::new("pool1", "Pooling")
                .input("conv1")
                .output("pool1")
                .attr("kernel_size", json!(2))
                .attr("stride", json!(2)),
        ]);
        let dir = std::env::temp_dir().join(format!("netcost-cli-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let graph_path = dir.join("network.json");
        fs::write(&graph_path, doc.to_string()).unwrap();

        Config {
            input_graph_json: graph_path,
            debug_graph: false,
            dot_output: dir.join("graph.dot"),
            json: false,
            verbose: false,
        }
    }

    #[test]
    fn test_run_text_report() {
        let config = test_config("text");
        let mut out = Vec::new();
        run(&config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[] 0 data [[1, 3, 8, 8]] 192 [[1, 3, 8, 8]]");
        assert_eq!(lines[1], "[0] 1 conv1 [[1, 3, 8, 8]] 13824 [[1, 4, 8, 8]]");
        assert_eq!(lines[2], "[1] 2 pool1 [[1, 4, 8, 8]] 64 [[1, 4, 4, 4]]");
        assert!(text.contains("Cost by operator kind:"));
        assert!(text.contains("Total: 3 nodes, 6.91 K MACs, 14.08 K ops, 108 params"));
        assert!(!config.dot_output.exists());
    }

    #[test]
    fn test_run_json_report() {
        let config = Config {
            json: true,
            ..test_config("json")
        };
        let mut out = Vec::new();
        run(&config, &mut out).unwrap();

        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["nodes"].as_array().unwrap().len(), 3);
        assert_eq!(report["totals"]["mac_count"], 6912);
    }

    #[test]
    fn test_run_json_report_with_debug_graph() {
        let config = Config {
            json: true,
            debug_graph: true,
            verbose: true,
            ..test_config("json-debug")
        };
        let mut out = Vec::new();
        run(&config, &mut out).unwrap();

        let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(report["nodes"].as_array().unwrap().len(), 3);
        assert!(config.dot_output.exists());
    }

    #[test]
    fn test_run_writes_dot() {
        let config = Config {
            debug_graph: true,
            ..test_config("dot")
        };
        let mut out = Vec::new();
        run(&config, &mut out).unwrap();

        let dot = fs::read_to_string(&config.dot_output).unwrap();
        assert!(dot.starts_with("digraph Network {"));
        assert!(dot.contains("n1 -> n2;"));
    }

    #[test]
    fn test_run_missing_graph() {
        let config = Config {
            input_graph_json: PathBuf::from("no-such-network.json"),
            ..test_config("missing")
        };
        let mut out = Vec::new();
        let err = run(&config, &mut out).unwrap_err();
        assert!(err.to_string().starts_with("failed to read network"));
    }
}
