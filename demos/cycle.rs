use std::path::PathBuf;

use clap::Parser;

use measure_rs::ctl::CtlFormula;
use measure_rs::engines::{builtin_session, BoundedReach, CtlQuery, Reachable};
use measure_rs::graph::ReachabilityGraph;
use measure_rs::measure::{MeasureDef, MeasureQueue, TimeOrderedQueue};
use measure_rs::model::{Model, Process};
use measure_rs::registry::{ModelType, Settings};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Number of states on the ring.
    #[arg(value_name = "INT", default_value = "16")]
    n: usize,

    /// CTL engine: EXPLICIT or SYMBOLIC.
    #[clap(long, value_name = "ENGINE", default_value = "SYMBOLIC")]
    ctl: String,

    /// AEF engine: ATTRACTOR or ITERATIVE.
    #[clap(long, value_name = "ENGINE", default_value = "ATTRACTOR")]
    aef: String,

    /// Settings file; the flags above override its engine choices.
    #[clap(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log every fixpoint round.
    #[clap(long)]
    fixpoints: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let level = if args.fixpoints {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();
    println!("args = {:?}", args);

    let mut settings = match &args.settings {
        Some(path) => Settings::from_file(path)?,
        None => Settings::default(),
    };
    settings.report.fixpoints |= args.fixpoints;
    let settings = settings
        .select("ctl", &args.ctl)
        .select("ctl_aef", &args.aef)
        .select("proc_generate", "MDD");

    let (mut session, builtin) = builtin_session(settings)?;
    for option in session.registry().options() {
        println!("{}: {} (of {})", option.category, option.selected, option.choices.len());
    }

    // A ring 0 -> 1 -> ... -> n-1 -> 0 where state 0 may also leave for a trap state n.
    let n = args.n;
    let edges = (0..n).map(|s| (s, (s + 1) % n)).chain([(0, n), (n, n)]);
    let process = Process::new(n + 1, [0], edges);
    let model = Model::new("ring", ModelType::Dsde, process)
        .with_label("start", [0])
        .with_label("half", [n / 2])
        .with_label("trap", [n]);
    let model = session.add_model(model);
    session.process_model(model, builtin.proc_generate)?;

    let mut queue = TimeOrderedQueue::new();
    let mut ids = Vec::new();

    let reach = session.define("reachable", model, MeasureDef::new(Reachable, builtin.reachable))?;
    ids.push(reach);

    let queries = [
        ("half_inevitable", CtlQuery::initially(CtlFormula::atom("half").af())),
        ("half_fairly_inevitable", CtlQuery::initially(CtlFormula::atom("half").af()).fair()),
        ("trap_avoidable", CtlQuery::initially(CtlFormula::atom("trap").not().eg())),
        (
            "half_controllable",
            CtlQuery::initially(CtlFormula::atom("start").aef(CtlFormula::atom("half"))),
        ),
    ];
    for (name, query) in queries {
        ids.push(session.define(name, model, query.into_def(builtin.ctl_check))?);
    }

    for t in (0..4).rev() {
        let def = MeasureDef::new(BoundedReach, builtin.bounded_reach).at(t as f64 * 2.0);
        ids.push(session.define(format!("reach_within_{}", t * 2), model, def)?);
    }

    for &id in &ids {
        queue.push(session.measures(), id);
    }
    let summary = session.solve_batch(&mut queue)?;
    println!("batch: {}", summary);

    let graph = session.model(model)?.primary_graph()?;
    for &id in &ids {
        let measure = session.measures().get(id)?;
        match measure.value() {
            Some(value) => match value.as_state_set() {
                Ok(set) => println!("{} = {} states", measure.name(), graph.cardinality(set)?),
                Err(_) => println!("{} = {}", measure.name(), value),
            },
            None => println!("{} is pending", measure.name()),
        }
    }
    println!("restarts of the incremental engine: {}", builtin.incremental.restarts());

    let time_total = time_total.elapsed();
    println!("Done in {:.2} s", time_total.as_secs_f64());

    Ok(())
}
