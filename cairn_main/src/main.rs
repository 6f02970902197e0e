// Cairn: Adaptive Greedy Routing in Vector Space
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use cairn::example_networks;
use cairn::geometry::Vector;
use cairn::net::{greedy_guarantee_check, Network, Role, TopologyMode};
use cairn::printer;
use cairn::routing::{Request, RouteExecutor, RoutingConfig};
use cairn::simulation::{Simulation, SimulationConfig};

use clap::{Parser, Subcommand};
use log::*;
use rand::prelude::*;
use std::error::Error;

#[derive(Parser)]
#[clap(name = "cairn", about = "Adaptive greedy routing in vector space")]
struct CommandLineArguments {
    #[clap(subcommand)]
    cmd: MainCommand,
}

#[derive(Subcommand)]
enum MainCommand {
    /// Route a single request through a seeded random network and print the full trace
    Route {
        /// Number of nodes
        #[clap(short, long, default_value = "20")]
        nodes: usize,
        /// Dimension of the vector space
        #[clap(short, long, default_value = "4")]
        dimensions: usize,
        /// Random seed
        #[clap(short, long, default_value = "42")]
        seed: u64,
        /// Topology mode (knn, delaunay, hybrid)
        #[clap(short, long, default_value = "delaunay")]
        mode: TopologyMode,
        /// Start node name (e.g. N000)
        #[clap(long, default_value = "N000")]
        start: String,
        /// Target coordinates; missing components are filled with the last value
        #[clap(long, allow_hyphen_values = true, use_value_delimiter = true)]
        target: Vec<f64>,
        /// Required role of the terminal node
        #[clap(long)]
        role: Option<String>,
    },
    /// Run the concurrent simulation and print the aggregate metrics
    Simulate {
        /// Number of nodes
        #[clap(short, long, default_value = "30")]
        nodes: usize,
        /// Number of requests
        #[clap(short, long, default_value = "200")]
        requests: usize,
        /// Random seed
        #[clap(short, long, default_value = "42")]
        seed: u64,
        /// Topology mode (knn, delaunay, hybrid)
        #[clap(short, long, default_value = "delaunay")]
        mode: TopologyMode,
        /// Fraction of nodes failed halfway through
        #[clap(short, long, default_value = "0.0")]
        fail_fraction: f64,
        /// Attach section-deriving request texts to every other request
        #[clap(long)]
        roles: bool,
        /// Run the background health monitor during the simulation
        #[clap(long)]
        monitor: bool,
        /// Worker threads (defaults to the number of CPUs)
        #[clap(short, long)]
        workers: Option<usize>,
    },
    /// Verify the greedy-progress guarantee on a seeded random network
    Check {
        /// Number of nodes
        #[clap(short, long, default_value = "30")]
        nodes: usize,
        /// Dimension of the vector space
        #[clap(short, long, default_value = "4")]
        dimensions: usize,
        /// Random seed
        #[clap(short, long, default_value = "42")]
        seed: u64,
        /// Topology mode (knn, delaunay, hybrid)
        #[clap(short, long, default_value = "delaunay")]
        mode: TopologyMode,
        /// Number of sampled targets
        #[clap(short, long, default_value = "10")]
        targets: usize,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    pretty_env_logger::init();
    let args = CommandLineArguments::parse();

    match args.cmd {
        MainCommand::Route { nodes, dimensions, seed, mode, start, target, role } => {
            let net = Network::generate(nodes, dimensions, seed, mode, 4);
            info!("{}", net.summary());

            let mut coords = target;
            if coords.is_empty() {
                coords.push(0.5);
            }
            while coords.len() < dimensions {
                coords.push(*coords.last().unwrap());
            }
            coords.truncate(dimensions);

            let mut request = Request::new(Vector::new(coords));
            if let Some(role) = role {
                request = request.with_role(Role::from(role.as_str()));
            }
            let start = net.node_id(&start)?;
            let config = RoutingConfig::default();
            let result = RouteExecutor::new(&net, &config).route(start, &request)?;
            println!("{}", printer::route_result(&net, &result)?);
            let metrics = net.node_metrics(result.final_node)?;
            println!(
                "terminal node {}: role={} load={:.1}/{:.1} trust={:.2} neighbors={}",
                metrics.name,
                metrics.role,
                metrics.load,
                metrics.capacity,
                metrics.trust,
                metrics.neighbors
            );
        }
        MainCommand::Simulate {
            nodes,
            requests,
            seed,
            mode,
            fail_fraction,
            roles,
            monitor,
            workers,
        } => {
            let net = if roles {
                example_networks::random_sections(nodes, 4, seed, mode)
            } else {
                Network::generate(nodes, 4, seed, mode, 4)
            };
            info!(
                "Simulating {} requests over {} nodes ({} edges, mode {})",
                requests,
                net.num_nodes(),
                net.num_edges(),
                net.mode()
            );

            let sim = Simulation::new(net, RoutingConfig::default());
            let sim_config = SimulationConfig {
                requests,
                workers,
                seed,
                use_roles: roles,
                fail_fraction,
                run_monitor: monitor,
                ..SimulationConfig::default()
            };
            let report = sim.run(&sim_config);

            let shared = sim.network();
            let net = shared.read().unwrap();
            println!("{}", printer::metrics(&net, &report.snapshot)?);
            if !report.injected_failures.is_empty() {
                let failed: Vec<&str> = report
                    .injected_failures
                    .iter()
                    .map(|id| net.node_name(*id))
                    .collect::<Result<_, _>>()?;
                println!("injected failures: {:?}", failed);
            }
        }
        MainCommand::Check { nodes, dimensions, seed, mode, targets } => {
            let net = Network::generate(nodes, dimensions, seed, mode, 4);
            println!(
                "network: {} nodes, {} edges, mode {} (requested {})",
                net.num_nodes(),
                net.num_edges(),
                net.mode(),
                mode
            );

            let mut rng = StdRng::seed_from_u64(seed);
            let mut total_violations = 0;
            for i in 0..targets {
                let target =
                    Vector::new((0..dimensions).map(|_| rng.gen_range(-1.0..1.0)).collect());
                let report = greedy_guarantee_check(&net, &target);
                if report.passed() {
                    println!("target {}: ok ({} nodes checked)", i, report.total_checked);
                } else {
                    total_violations += report.violations.len();
                    let names: Vec<&str> = report
                        .violations
                        .iter()
                        .map(|id| net.node_name(*id))
                        .collect::<Result<_, _>>()?;
                    println!("target {}: {} violations: {:?}", i, names.len(), names);
                }
            }
            if total_violations == 0 {
                println!("greedy-progress guarantee holds on all {} targets", targets);
            } else {
                warn!("{} guarantee violations in total", total_violations);
            }
        }
    }
    Ok(())
}
