//! # Telemetry pipeline
//!
//! Three plugins sharing one data network:
//! - `sampler`: per-core cycle counts from its own thread, completes after N rounds
//! - `normalizer`: turns counts into load figures and flags hotspots above a limit
//! - `reporter`: prints loads, raises a notification per hotspot, pushes the limit
//!
//! ```text
//! sampler ──CoreSample──► normalizer ──LoadReport──► reporter
//!                             ▲      └───Hotspot───► reporter ──notify──► host
//!                             └──────Limit (config)── reporter
//! ```
//!
//! Run with `RUST_LOG=pipevisor=debug` to see the lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pipevisor::{
    ChannelRegistry, Concurrency, ControlMessage, DataNetwork, DataSourceList, FunctionNode,
    Outcome, OutputPort, OwnThreadDataSource, PipelineBuilder, PipelineConfig, PipelineStatus,
    Plugin, PluginTypeRegistry, families, payload_types,
};
use tracing_subscriber::EnvFilter;

const CORES: usize = 4;
const MAX_CYCLES: u64 = 1_000_000;

#[derive(Clone, Debug)]
struct CoreSample {
    core: usize,
    cycles: u64,
}

#[derive(Clone, Debug)]
struct LoadReport {
    core: usize,
    load: f64,
}

#[derive(Clone, Debug)]
struct Hotspot {
    core: usize,
    load: f64,
}

#[derive(Clone, Debug)]
struct Limit(f64);

payload_types!(families::CORE_TELEMETRY => { CoreSample = 0 });
payload_types!(families::NORMALIZER => { LoadReport = 0 });
payload_types!(families::HOTSPOT_DETECTOR => { Hotspot = 0, Limit = 1 });

// ---- sampler ----

struct Sampler {
    rounds: u64,
}

impl Plugin for Sampler {
    fn id(&self) -> &str {
        "sampler"
    }

    fn description(&self) -> &str {
        "reads per-core cycle counters"
    }

    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        registry
            .register_as_source::<CoreSample>()
            .register_as_source::<ControlMessage>();
        Outcome::success()
    }

    fn init(
        &mut self,
        registry: &ChannelRegistry,
        network: &DataNetwork,
        sources: &mut DataSourceList,
    ) -> Outcome {
        if registry.sinks::<CoreSample>().is_empty() {
            return Outcome::failure("nobody consumes core samples");
        }

        let weak = network.downgrade();
        let total = self.rounds * CORES as u64;
        let mut seed = 0x2545_f491_u64;
        let mut emitted = 0u64;
        let body = move || {
            if emitted == total {
                if let Some(network) = weak.upgrade() {
                    let _ = network.push(ControlMessage::complete("sampler", "sampling finished"));
                }
                return None;
            }
            if emitted % CORES as u64 == 0 {
                std::thread::sleep(Duration::from_millis(20));
            }
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let sample = CoreSample {
                core: (emitted % CORES as u64) as usize,
                cycles: seed % MAX_CYCLES,
            };
            emitted += 1;
            Some(sample)
        };
        sources.push(OwnThreadDataSource::new("sampler", network, body));
        Outcome::success()
    }
}

// ---- normalizer ----

struct Normalizer {
    /// Current limit as `f64` bits; set by the config exchange.
    limit: Arc<AtomicU64>,
}

impl Plugin for Normalizer {
    fn id(&self) -> &str {
        "normalizer"
    }

    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        registry
            .register_as_sink::<CoreSample>()
            .register_as_sink::<Limit>()
            .register_as_source::<LoadReport>()
            .register_as_source::<Hotspot>();
        Outcome::success()
    }

    fn init(
        &mut self,
        _registry: &ChannelRegistry,
        network: &DataNetwork,
        _sources: &mut DataSourceList,
    ) -> Outcome {
        let mut out = Outcome::success();

        let limit = Arc::clone(&self.limit);
        let config = FunctionNode::new(network.graph(), Concurrency::Serial, move |l: Limit| {
            limit.store(l.0.to_bits(), Ordering::Relaxed);
        });
        out.merge(network.add_sink_node::<Limit, _>(config).into());

        let reports = OutputPort::<LoadReport>::new(network.graph());
        let hotspots = OutputPort::<Hotspot>::new(network.graph());
        let node = {
            let (reports, hotspots) = (reports.clone(), hotspots.clone());
            let limit = Arc::clone(&self.limit);
            FunctionNode::new(network.graph(), Concurrency::Unlimited, move |s: CoreSample| {
                let load = s.cycles as f64 / MAX_CYCLES as f64;
                reports.put(LoadReport { core: s.core, load });
                if load > f64::from_bits(limit.load(Ordering::Relaxed)) {
                    hotspots.put(Hotspot { core: s.core, load });
                }
            })
        };
        out.merge(network.add_sink_node::<CoreSample, _>(node.clone()).into());
        out.merge(network.add_multi_source_node(node.clone(), &reports).into());
        out.merge(network.add_multi_source_node(node, &hotspots).into());
        out
    }
}

// ---- reporter ----

struct Reporter {
    limit: f64,
}

impl Plugin for Reporter {
    fn id(&self) -> &str {
        "reporter"
    }

    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        registry
            .register_as_sink::<LoadReport>()
            .register_as_sink::<Hotspot>()
            .register_as_source::<Limit>()
            .register_as_source::<ControlMessage>();
        Outcome::success()
    }

    fn init(
        &mut self,
        _registry: &ChannelRegistry,
        network: &DataNetwork,
        _sources: &mut DataSourceList,
    ) -> Outcome {
        let mut out = Outcome::success();

        let loads = FunctionNode::new(network.graph(), Concurrency::Serial, |r: LoadReport| {
            println!("core {} load {:>5.1}%", r.core, r.load * 100.0);
        });
        out.merge(network.add_sink_node::<LoadReport, _>(loads).into());

        let weak = network.downgrade();
        let alerts = FunctionNode::new(network.graph(), Concurrency::Serial, move |h: Hotspot| {
            let Some(network) = weak.upgrade() else {
                return;
            };
            let text = format!("core {} is hot ({:.1}%)", h.core, h.load * 100.0);
            let _ = network.push(ControlMessage::notify("reporter", text));
        });
        out.merge(network.add_sink_node::<Hotspot, _>(alerts).into());
        out
    }

    fn push_configs(&mut self, network: &DataNetwork) -> Outcome {
        network.push(Limit(self.limit)).into()
    }
}

fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pipevisor=info")),
        )
        .init();

    let manager = PipelineBuilder::new(PipelineConfig::default())
        .with_plugin(Sampler { rounds: 10 })
        .with_plugin(Normalizer {
            limit: Arc::new(AtomicU64::new(1.0f64.to_bits())),
        })
        .with_plugin(Reporter { limit: 0.9 })
        .with_notification_callback(|text| println!("!! {text}"))
        .build()?;

    let started = manager.start();
    if started.is_failure() {
        eprintln!("pipeline failed to start: {started}");
        return Ok(());
    }

    let status = match manager.wait_for_stop(Duration::from_secs(10)) {
        PipelineStatus::Running => {
            manager.stop();
            manager.status()
        }
        other => other,
    };
    let exit = manager.exit_info();
    println!("pipeline {status}: {} ({})", exit.reason, exit.origin);
    Ok(())
}
