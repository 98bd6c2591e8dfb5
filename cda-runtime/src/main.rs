use anyhow::{anyhow, Result};
use cda_dynamics::{
    decimate, state::uniform_product_joint, DecimationParams, FmsRateTable, FmsRates,
    GraphDynamics, Heun, IntegratorConfig, MasterEquation, PopulationDynamics, PopulationParams,
    RateModel, WalkSatRates,
};
use cda_instances::{dimacs, FactorGraph, Instance, InstanceParams};
use cda_runtime::*;
use cda_utils::{load_json, u8s_from_u64, write_json};
use clap::{arg, parser::ValueSource, ArgMatches, Command};
use log::{info, warn};
use ndarray::Array2;
use std::{path::PathBuf, time::Instant};

fn common_args(cmd: Command) -> Command {
    cmd.arg(
        arg!(--tol [TOL] "Integrator error tolerance")
            .default_value("1e-2")
            .value_parser(clap::value_parser!(f64)),
    )
    .arg(
        arg!(--threads [THREADS] "Number of worker threads")
            .default_value("1")
            .value_parser(clap::value_parser!(usize)),
    )
    .arg(
        arg!(--output [OUTPUT_FILE] "Energy series file (default derived from the parameters)")
            .value_parser(clap::value_parser!(PathBuf)),
    )
    .arg(
        arg!(--config [CONFIG] "Integrator settings json string or path to json file")
            .value_parser(clap::value_parser!(String)),
    )
}

fn graph_args(cmd: Command) -> Command {
    cmd.arg(arg!(<N> "Number of variables").value_parser(clap::value_parser!(usize)))
        .arg(arg!(<M> "Number of clauses").value_parser(clap::value_parser!(usize)))
        .arg(arg!(<K> "Clause arity").value_parser(clap::value_parser!(usize)))
        .arg(arg!(<SEED> "Random seed").value_parser(clap::value_parser!(u64)))
}

fn instance_arg(cmd: Command) -> Command {
    cmd.arg(
        arg!(--instance [INSTANCE] "Read the instance from a DIMACS or json file instead")
            .value_parser(clap::value_parser!(PathBuf)),
    )
}

fn cli() -> Command {
    Command::new("cda-runtime")
        .about("Integrates CDA equations of local search on random K-SAT")
        .arg_required_else_help(true)
        .subcommand(common_args(instance_arg(graph_args(
            Command::new("walksat")
                .about("WalkSAT dynamics on a factor graph"),
        )))
        .arg(arg!(<Q> "Random walk probability").value_parser(clap::value_parser!(f64)))
        .arg(arg!(<HORIZON> "Simulated time horizon").value_parser(clap::value_parser!(f64))))
        .subcommand(common_args(instance_arg(graph_args(
            Command::new("fms").about("Focused Metropolis Search dynamics on a factor graph"),
        )))
        .arg(arg!(<ETA> "FMS acceptance parameter").value_parser(clap::value_parser!(f64)))
        .arg(arg!(<HORIZON> "Simulated time horizon").value_parser(clap::value_parser!(f64))))
        .subcommand(
            common_args(
                Command::new("population")
                    .about("FMS dynamics on a population of cavity replicas")
                    .arg(arg!(<POP_SIZE> "Replicas per class").value_parser(clap::value_parser!(usize)))
                    .arg(arg!(<ALPHA> "Clause density").value_parser(clap::value_parser!(f64)))
                    .arg(arg!(<K> "Clause arity").value_parser(clap::value_parser!(usize)))
                    .arg(arg!(<SEED> "Random seed").value_parser(clap::value_parser!(u64)))
                    .arg(arg!(<ETA> "FMS acceptance parameter").value_parser(clap::value_parser!(f64)))
                    .arg(arg!(<HORIZON> "Simulated time horizon").value_parser(clap::value_parser!(f64))),
            )
            .arg(
                arg!(--"eps-c" [EPS_C] "Poisson tail probability bounding cavity sizes")
                    .default_value("1e-4")
                    .value_parser(clap::value_parser!(f64)),
            ),
        )
        .subcommand(common_args(instance_arg(graph_args(
            Command::new("decimate").about("Decimation driven by FMS dynamics"),
        )))
        .arg(arg!(<ETA> "FMS acceptance parameter").value_parser(clap::value_parser!(f64)))
        .arg(arg!(<STEPS> "Accepted steps between fixings").value_parser(clap::value_parser!(usize))))
        .subcommand(
            graph_args(Command::new("generate").about("Writes a random K-SAT instance")).arg(
                arg!(<OUTPUT_FILE> "Destination (.cnf for DIMACS, .json for json)")
                    .value_parser(clap::value_parser!(PathBuf)),
            ),
        )
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = cli().get_matches();

    if let Err(e) = match matches.subcommand() {
        Some(("walksat", sub_m)) => with_pool(sub_m, || run_walksat(sub_m)),
        Some(("fms", sub_m)) => with_pool(sub_m, || run_fms(sub_m)),
        Some(("population", sub_m)) => with_pool(sub_m, || run_population(sub_m)),
        Some(("decimate", sub_m)) => with_pool(sub_m, || run_decimate(sub_m)),
        Some(("generate", sub_m)) => run_generate(sub_m),
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn with_pool<F>(sub_m: &ArgMatches, f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send,
{
    let threads = *sub_m.get_one::<usize>("threads").unwrap();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| anyhow!("Failed to build thread pool: {}", e))?;
    pool.install(f)
}

fn integrator_config(sub_m: &ArgMatches) -> Result<IntegratorConfig> {
    let mut config = match sub_m.get_one::<String>("config") {
        Some(input) => load_json::<IntegratorConfig>(input)?,
        None => IntegratorConfig::default(),
    };
    if sub_m.get_one::<String>("config").is_none()
        || sub_m.value_source("tol") == Some(ValueSource::CommandLine)
    {
        config.tolerance = *sub_m.get_one::<f64>("tol").unwrap();
    }
    Ok(config)
}

struct GraphArgs {
    n: usize,
    m: usize,
    k: usize,
    seed: u64,
}

fn graph_params(sub_m: &ArgMatches) -> GraphArgs {
    GraphArgs {
        n: *sub_m.get_one::<usize>("N").unwrap(),
        m: *sub_m.get_one::<usize>("M").unwrap(),
        k: *sub_m.get_one::<usize>("K").unwrap(),
        seed: *sub_m.get_one::<u64>("SEED").unwrap(),
    }
}

fn load_graph(sub_m: &ArgMatches, args: &GraphArgs) -> Result<FactorGraph> {
    let instance = match sub_m.get_one::<PathBuf>("instance") {
        Some(path) => {
            let instance = dimacs::load_instance(path)?;
            let params = instance.params;
            if (params.num_variables, params.num_clauses, params.arity) != (args.n, args.m, args.k) {
                warn!(
                    "Instance '{}' has N = {}, M = {}, K = {}; command line values ignored",
                    path.display(),
                    params.num_variables,
                    params.num_clauses,
                    params.arity
                );
            }
            instance
        }
        None => Instance::generate(
            &u8s_from_u64(args.seed),
            &InstanceParams {
                num_variables: args.n,
                num_clauses: args.m,
                arity: args.k,
            },
        )?,
    };
    let graph = instance.factor_graph()?;
    info!(
        "factor graph: N = {}, M = {}, K = {}, max degree {}",
        graph.num_variables(),
        graph.num_factors(),
        graph.arity(),
        graph.max_degree()
    );
    Ok(graph)
}

fn run_graph_series<R: RateModel>(
    graph: FactorGraph,
    rates: R,
    mut config: IntegratorConfig,
    horizon: f64,
    output: PathBuf,
) -> Result<()> {
    config.max_step.get_or_insert(graph.num_factors() as f64);
    let mut joint = uniform_product_joint(&graph, 0.5);
    let mut dynamics = GraphDynamics::new(graph, rates);
    run_series(&mut dynamics, &mut joint, config, horizon, output)
}

fn run_series<S: MasterEquation>(
    system: &mut S,
    joint: &mut Array2<f64>,
    config: IntegratorConfig,
    horizon: f64,
    output: PathBuf,
) -> Result<()> {
    let mut writer = SeriesWriter::create(&output, &["t", "e"])?;
    let mut heun = Heun::new(config);
    let summary = heun.integrate(system, joint, horizon, &mut |t, e| writer.record_point(t, e))?;
    info!(
        "wrote {} ({} points, final e = {:e})",
        output.display(),
        summary.accepted + 1,
        summary.energy
    );
    Ok(())
}

fn run_walksat(sub_m: &ArgMatches) -> Result<()> {
    let args = graph_params(sub_m);
    let q = *sub_m.get_one::<f64>("Q").unwrap();
    let horizon = *sub_m.get_one::<f64>("HORIZON").unwrap();
    let config = integrator_config(sub_m)?;
    let output = sub_m.get_one::<PathBuf>("output").cloned().unwrap_or_else(|| {
        walksat_series_name(args.k, args.n, args.m, q, horizon, args.seed, config.tolerance)
    });
    let graph = load_graph(sub_m, &args)?;
    let rates = WalkSatRates::new(graph.arity(), q, graph.max_degree(), graph.mean_degree());
    run_graph_series(graph, rates, config, horizon, output)
}

fn run_fms(sub_m: &ArgMatches) -> Result<()> {
    let args = graph_params(sub_m);
    let eta = *sub_m.get_one::<f64>("ETA").unwrap();
    let horizon = *sub_m.get_one::<f64>("HORIZON").unwrap();
    let config = integrator_config(sub_m)?;
    let output = sub_m.get_one::<PathBuf>("output").cloned().unwrap_or_else(|| {
        fms_series_name(args.k, args.n, args.m, eta, horizon, args.seed, config.tolerance)
    });
    let graph = load_graph(sub_m, &args)?;
    let table = FmsRateTable::new(graph.max_degree() + 1, graph.arity(), eta);
    run_graph_series(graph, FmsRates::new(table), config, horizon, output)
}

fn run_population(sub_m: &ArgMatches) -> Result<()> {
    let pop_size = *sub_m.get_one::<usize>("POP_SIZE").unwrap();
    let alpha = *sub_m.get_one::<f64>("ALPHA").unwrap();
    let k = *sub_m.get_one::<usize>("K").unwrap();
    let seed = *sub_m.get_one::<u64>("SEED").unwrap();
    let eta = *sub_m.get_one::<f64>("ETA").unwrap();
    let horizon = *sub_m.get_one::<f64>("HORIZON").unwrap();
    let eps_c = *sub_m.get_one::<f64>("eps-c").unwrap();
    let config = integrator_config(sub_m)?;
    let output = sub_m.get_one::<PathBuf>("output").cloned().unwrap_or_else(|| {
        population_series_name(k, alpha, eta, horizon, seed, config.tolerance, pop_size, eps_c)
    });

    let mut dynamics = PopulationDynamics::new(
        u8s_from_u64(seed),
        PopulationParams {
            pop_size,
            alpha,
            arity: k,
            eta,
            cavity_threshold: eps_c,
            p0: 0.5,
        },
    )?;
    info!(
        "population: {} classes x {} replicas, max cavity {}",
        dynamics.num_classes(),
        pop_size,
        dynamics.max_cavity()
    );
    let mut joint = dynamics.init_joint();
    run_series(&mut dynamics, &mut joint, config, horizon, output)
}

fn run_decimate(sub_m: &ArgMatches) -> Result<()> {
    let args = graph_params(sub_m);
    let eta = *sub_m.get_one::<f64>("ETA").unwrap();
    let steps = *sub_m.get_one::<usize>("STEPS").unwrap();
    let mut config = integrator_config(sub_m)?;
    let output = sub_m.get_one::<PathBuf>("output").cloned().unwrap_or_else(|| {
        decimation_series_name(args.k, args.n, args.m, eta, steps, args.seed, config.tolerance)
    });
    let start = Instant::now();
    let graph = load_graph(sub_m, &args)?;
    config.max_step.get_or_insert(graph.num_factors() as f64);
    let table = FmsRateTable::new(graph.max_degree() + 1, graph.arity(), eta);
    let mut dynamics = GraphDynamics::new(graph, FmsRates::new(table));
    let mut heun = Heun::new(config);

    let mut writer = SeriesWriter::create(&output, &["round", "accepted_steps", "energy"])?;
    let report = decimate(
        &mut dynamics,
        &mut heun,
        &DecimationParams {
            steps_per_round: steps,
            p0: 0.5,
        },
        &mut |round| {
            writer.record(&[
                round.round.to_string(),
                round.accepted_steps.to_string(),
                round.energy.to_string(),
            ])
        },
    )?;

    let final_path = final_report_path(&output);
    write_json(
        &FinalReport {
            assignment: report.assignment,
            residual_energy: report.residual_energy,
            accepted_steps: report.accepted_steps,
            energy: report.energy,
            runtime_secs: start.elapsed().as_secs_f64(),
        },
        &final_path,
    )?;
    info!(
        "residual energy {} after {} accepted steps, report in {}",
        report.residual_energy,
        report.accepted_steps,
        final_path.display()
    );
    Ok(())
}

fn run_generate(sub_m: &ArgMatches) -> Result<()> {
    let args = graph_params(sub_m);
    let output = sub_m.get_one::<PathBuf>("OUTPUT_FILE").unwrap();
    let instance = Instance::generate(
        &u8s_from_u64(args.seed),
        &InstanceParams {
            num_variables: args.n,
            num_clauses: args.m,
            arity: args.k,
        },
    )?;
    dimacs::save_instance(&instance, output)?;
    info!("wrote {}", output.display());
    Ok(())
}
