//! Plugin fixtures shared by the integration tests.

#![allow(dead_code)] // Not every test file uses every fixture

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;
use pipevisor::{
    ChannelRegistry, Concurrency, ControlMessage, DataNetwork, DataSource, DataSourceList,
    FunctionNode, Outcome, Phase, Plugin, PluginTypeRegistry, SimpleDataSource, families,
    payload_types,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reading(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Threshold(pub u64);

payload_types!(families::TEST => {
    Reading = 0,
    Threshold = 1,
});

/// Ordered record of plugin and source calls.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// What a [`Producer`] does once its readings are exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finish {
    /// Return `None`; the pipeline keeps running.
    Nothing,
    /// Push `complete`.
    Complete,
    /// Push `abort`.
    Abort,
    /// Push `complete`, then `abort`.
    CompleteThenAbort,
    /// Never run out.
    Endless,
}

/// Emits `Reading(1..=readings)` from a graph-scheduled data source.
pub struct Producer {
    pub id: String,
    pub journal: Journal,
    pub readings: u64,
    pub finish: Finish,
}

impl Producer {
    pub fn new(id: &str, journal: &Journal, readings: u64, finish: Finish) -> Self {
        Self {
            id: id.to_string(),
            journal: journal.clone(),
            readings,
            finish,
        }
    }
}

impl Plugin for Producer {
    fn id(&self) -> &str {
        &self.id
    }

    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        self.journal.record(format!("register:{}", self.id));
        registry
            .register_as_source::<Reading>()
            .register_as_source::<ControlMessage>();
        Outcome::success()
    }

    fn init(
        &mut self,
        _registry: &ChannelRegistry,
        network: &DataNetwork,
        sources: &mut DataSourceList,
    ) -> Outcome {
        self.journal.record(format!("init:{}", self.id));

        let weak = network.downgrade();
        let id = self.id.clone();
        let total = self.readings;
        let finish = self.finish;
        let mut next = 0u64;
        let body = move || {
            if finish == Finish::Endless {
                std::thread::sleep(Duration::from_millis(1));
                next += 1;
                return Some(Reading(next));
            }
            if next < total {
                next += 1;
                return Some(Reading(next));
            }
            let messages = match finish {
                Finish::Complete => {
                    vec![ControlMessage::complete(id.as_str(), "all readings sent")]
                }
                Finish::Abort => vec![ControlMessage::abort(id.as_str(), "sensor failure")],
                Finish::CompleteThenAbort => vec![
                    ControlMessage::complete(id.as_str(), "all readings sent"),
                    ControlMessage::abort(id.as_str(), "sensor failure"),
                ],
                _ => return None,
            };
            if let Some(network) = weak.upgrade() {
                for message in messages {
                    let _ = network.push(message);
                }
            }
            None
        };

        let source = match SimpleDataSource::new(network, body) {
            Ok(source) => source,
            Err(err) => return err.into(),
        };
        let on_start = (self.journal.clone(), format!("source-start:{}", self.id));
        let on_stop = (self.journal.clone(), format!("source-stop:{}", self.id));
        sources.push(
            source
                .on_start(move || {
                    on_start.0.record(on_start.1.as_str());
                    Outcome::success()
                })
                .on_stop(move || {
                    on_stop.0.record(on_stop.1.as_str());
                    Outcome::success()
                }),
        );
        Outcome::success()
    }

    fn deinit(&mut self, _network: &DataNetwork, canceled: bool) -> Outcome {
        self.journal.record(format!("deinit:{}:{canceled}", self.id));
        Outcome::success()
    }
}

/// Collects every `Reading`; optionally requires a producer to be registered.
pub struct Collector {
    pub id: String,
    pub journal: Journal,
    pub seen: Arc<Mutex<Vec<u64>>>,
    pub require_source: Arc<AtomicBool>,
}

impl Collector {
    pub fn new(id: &str, journal: &Journal) -> Self {
        Self {
            id: id.to_string(),
            journal: journal.clone(),
            seen: Arc::new(Mutex::new(Vec::new())),
            require_source: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Plugin for Collector {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        "records readings"
    }

    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        self.journal.record(format!("register:{}", self.id));
        registry.register_as_sink::<Reading>();
        Outcome::success()
    }

    fn init(
        &mut self,
        registry: &ChannelRegistry,
        network: &DataNetwork,
        _sources: &mut DataSourceList,
    ) -> Outcome {
        self.journal.record(format!("init:{}", self.id));
        self.journal
            .record(format!("sinks:{}", registry.sinks::<Reading>().len()));
        if self.require_source.load(Ordering::SeqCst) && registry.sources::<Reading>().is_empty()
        {
            return Outcome::failure("dependency missing");
        }

        let seen = Arc::clone(&self.seen);
        let node = FunctionNode::new(network.graph(), Concurrency::Serial, move |r: Reading| {
            seen.lock().push(r.0);
        });
        network.add_sink_node::<Reading, _>(node).into()
    }

    fn deinit(&mut self, _network: &DataNetwork, canceled: bool) -> Outcome {
        self.journal.record(format!("deinit:{}:{canceled}", self.id));
        Outcome::success()
    }
}

/// Fails on purpose in the given phase.
pub struct Faulty {
    pub id: String,
    pub journal: Journal,
    pub phase: Phase,
}

impl Faulty {
    pub fn new(id: &str, journal: &Journal, phase: Phase) -> Self {
        Self {
            id: id.to_string(),
            journal: journal.clone(),
            phase,
        }
    }
}

struct BrokenSource;

impl DataSource for BrokenSource {
    fn start(&mut self) -> Outcome {
        Outcome::failure("device busy")
    }

    fn stop(&mut self) -> Outcome {
        Outcome::success()
    }
}

impl Plugin for Faulty {
    fn id(&self) -> &str {
        &self.id
    }

    fn register_types(&mut self, _registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        if self.phase == Phase::Register {
            return Outcome::failure("bad registration");
        }
        Outcome::success()
    }

    fn init(
        &mut self,
        _registry: &ChannelRegistry,
        _network: &DataNetwork,
        sources: &mut DataSourceList,
    ) -> Outcome {
        self.journal.record(format!("init:{}", self.id));
        match self.phase {
            Phase::Init => Outcome::failure("bad init"),
            Phase::Run => {
                sources.push(BrokenSource);
                Outcome::success()
            }
            _ => Outcome::success(),
        }
    }

    fn push_configs(&mut self, _network: &DataNetwork) -> Outcome {
        if self.phase == Phase::ConfigPush {
            return Outcome::failure("bad config");
        }
        Outcome::success()
    }

    fn deinit(&mut self, _network: &DataNetwork, canceled: bool) -> Outcome {
        self.journal.record(format!("deinit:{}:{canceled}", self.id));
        Outcome::success()
    }
}

/// Pushes control messages while configs are exchanged.
pub struct Signaller {
    pub id: String,
    pub on_config: Vec<ControlMessage>,
}

impl Signaller {
    pub fn new(id: &str, on_config: Vec<ControlMessage>) -> Self {
        Self {
            id: id.to_string(),
            on_config,
        }
    }
}

impl Plugin for Signaller {
    fn id(&self) -> &str {
        &self.id
    }

    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        registry.register_as_source::<ControlMessage>();
        Outcome::success()
    }

    fn init(
        &mut self,
        _registry: &ChannelRegistry,
        _network: &DataNetwork,
        _sources: &mut DataSourceList,
    ) -> Outcome {
        Outcome::success()
    }

    fn push_configs(&mut self, network: &DataNetwork) -> Outcome {
        let mut out = Outcome::success();
        for message in &self.on_config {
            out.merge(network.push(message.clone()).into());
        }
        out
    }
}

/// Pushes `complete` from its first drained `deinit`, after the run already ended.
///
/// Announces on `entered` before pushing, then lingers so the request is queued behind
/// the teardown in progress.
pub struct LateCompleter {
    pub id: String,
    pub entered: Option<mpsc::Sender<()>>,
}

impl LateCompleter {
    pub fn new(id: &str) -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel();
        let plugin = Self {
            id: id.to_string(),
            entered: Some(tx),
        };
        (plugin, rx)
    }
}

impl Plugin for LateCompleter {
    fn id(&self) -> &str {
        &self.id
    }

    fn register_types(&mut self, registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        registry.register_as_source::<ControlMessage>();
        Outcome::success()
    }

    fn init(
        &mut self,
        _registry: &ChannelRegistry,
        _network: &DataNetwork,
        _sources: &mut DataSourceList,
    ) -> Outcome {
        Outcome::success()
    }

    fn deinit(&mut self, network: &DataNetwork, canceled: bool) -> Outcome {
        if canceled {
            return Outcome::success();
        }
        let Some(entered) = self.entered.take() else {
            return Outcome::success();
        };
        let _ = entered.send(());
        let out = network.push(ControlMessage::complete(self.id.as_str(), "run 1 done"));
        std::thread::sleep(Duration::from_millis(50));
        out.into()
    }
}

/// Panics in its first `deinit`.
pub struct Fragile {
    pub id: String,
    pub armed: bool,
}

impl Plugin for Fragile {
    fn id(&self) -> &str {
        &self.id
    }

    fn register_types(&mut self, _registry: &mut PluginTypeRegistry<'_>) -> Outcome {
        Outcome::success()
    }

    fn init(
        &mut self,
        _registry: &ChannelRegistry,
        _network: &DataNetwork,
        _sources: &mut DataSourceList,
    ) -> Outcome {
        Outcome::success()
    }

    fn deinit(&mut self, _network: &DataNetwork, _canceled: bool) -> Outcome {
        if std::mem::take(&mut self.armed) {
            panic!("deinit blew up");
        }
        Outcome::success()
    }
}

/// Waits until `cond` holds or two seconds passed.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
