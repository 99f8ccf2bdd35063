//! End-to-end graphs over the built-in nodes

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tripwire_engine::{
    ContextBuilder, EngineConfig, Event, EventKey, StructuredValue, Value, WorkflowContext,
    WorkflowEngine, WorkflowStore,
};
use tripwire_nodes::{builtin_registry, MessageSink};

/// Sink that remembers everything it was asked to send
#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl MessageSink for RecordingSink {
    fn send(&self, message: &str) -> tripwire_engine::Result<()> {
        self.messages.lock().push(message.to_string());
        Ok(())
    }

    fn send_to(&self, player: &str, message: &str) -> tripwire_engine::Result<()> {
        self.messages.lock().push(format!("@{}: {}", player, message));
        Ok(())
    }
}

#[derive(Debug)]
struct PlayerJoin {
    name: String,
}

impl StructuredValue for PlayerJoin {
    fn get_field(&self, name: &str) -> Option<Value> {
        (name == "name").then(|| Value::from(self.name.as_str()))
    }
}

impl Event for PlayerJoin {}

#[derive(Debug, Clone, Copy)]
enum GameEvent {
    Wave,
    GameOver,
}

impl StructuredValue for GameEvent {
    fn get_field(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl Event for GameEvent {
    fn key(&self) -> EventKey {
        match self {
            Self::Wave => EventKey::variant::<Self>("Wave"),
            Self::GameOver => EventKey::variant::<Self>("GameOver"),
        }
    }
}

fn engine(sink: Arc<RecordingSink>) -> WorkflowEngine {
    let registry = builtin_registry(sink).unwrap();
    let engine = WorkflowEngine::builder(EngineConfig::default())
        .registry(registry)
        .store(WorkflowStore::in_memory())
        .build()
        .unwrap();
    engine.register_event_type::<PlayerJoin>("PlayerJoin");
    engine
        .catalog_mut()
        .register_key("GameOver", EventKey::variant::<GameEvent>("GameOver"));
    engine
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

fn dice_graph(seconds: &str) -> WorkflowContext {
    ContextBuilder::new()
        .node("tick", "Interval")
        .consumer("interval", seconds)
        .output("Next", "roll")
        .node("roll", "MathRandom")
        .consumer("min", "1")
        .consumer("max", "1000000")
        .producer("result", "r")
        .output("Next", "say")
        .node("say", "SendChat")
        .consumer("message", "roll: {{r}}")
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interval_random_chat() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink.clone());
    engine.load(dice_graph("0.05")).unwrap();

    assert!(wait_until(|| sink.messages().len() >= 3).await);

    let messages = sink.messages();
    assert!(messages.iter().all(|m| m.starts_with("roll: ")));
    assert!(messages.iter().all(|m| m.len() > "roll: ".len()));
    assert_ne!(messages[0], messages[1]);
    assert_ne!(messages[1], messages[2]);

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reload_stops_old_timers() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink.clone());
    engine.load(dice_graph("0.05")).unwrap();
    assert!(wait_until(|| !sink.messages().is_empty()).await);

    engine.load(WorkflowContext::new()).unwrap();
    assert_eq!(engine.task_count(), 0);

    // Let any job already handed to a worker land
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = sink.messages().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(sink.messages().len(), settled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_event_listener_greets_player() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink.clone());
    let context = ContextBuilder::new()
        .node("join", "EventListener")
        .consumer("event", "PlayerJoin")
        .producer("event", "e")
        .output("Next", "greet")
        .node("greet", "SendChatToPlayer")
        .consumer("player", "{{ e.name }}")
        .consumer("message", "welcome {{e.name}}")
        .build();
    engine.load(context).unwrap();

    // Only the "after" broadcast reaches the default listener
    engine.fire(PlayerJoin { name: "ada".to_string() }, true);
    engine.fire(PlayerJoin { name: "ada".to_string() }, false);

    assert!(wait_until(|| !sink.messages().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.messages(), vec!["@ada: welcome ada"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_variant_keyed_listener() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink.clone());
    let context = ContextBuilder::new()
        .node("over", "EventListener")
        .consumer("event", "GameOver")
        .consumer("before", "TRUE")
        .output("Next", "say")
        .node("say", "SendChat")
        .consumer("message", "gg")
        .build();
    engine.load(context).unwrap();

    engine.fire(GameEvent::Wave, true);
    engine.fire(GameEvent::GameOver, false);
    engine.fire(GameEvent::GameOver, true);

    assert!(wait_until(|| !sink.messages().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.messages(), vec!["gg"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_resumes_with_variables() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink.clone());
    let context = ContextBuilder::new()
        .node("join", "EventListener")
        .consumer("event", "PlayerJoin")
        .producer("event", "e")
        .output("Next", "pause")
        .node("pause", "Wait")
        .consumer("delay", "0.1")
        .output("Next", "say")
        .node("say", "SendChat")
        .consumer("message", "{{e.name}} waited")
        .build();
    engine.load(context).unwrap();

    engine.fire(PlayerJoin { name: "lin".to_string() }, false);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(sink.messages().is_empty());

    assert!(wait_until(|| !sink.messages().is_empty()).await);
    assert_eq!(sink.messages(), vec!["lin waited"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wait_is_cancelled_by_reload() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink.clone());
    let context = ContextBuilder::new()
        .node("join", "EventListener")
        .consumer("event", "PlayerJoin")
        .output("Next", "pause")
        .node("pause", "Wait")
        .consumer("delay", "0.2")
        .output("Next", "say")
        .node("say", "SendChat")
        .build();
    engine.load(context).unwrap();

    engine.fire(PlayerJoin { name: "lin".to_string() }, false);
    assert_eq!(engine.task_count(), 1);
    engine.clear();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(sink.messages().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_event_type_fails_load() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink);
    let context = ContextBuilder::new()
        .node("join", "EventListener")
        .consumer("event", "Earthquake")
        .unlinked("Next")
        .build();

    let err = engine.load(context).unwrap_err();
    assert!(err.to_string().contains("Earthquake"));
    assert!(engine.node_ids().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_builder_example_graph_loads() {
    let engine = engine(Arc::new(RecordingSink::default()));
    let context = ContextBuilder::new()
        .node("tick", "Interval")
        .consumer("interval", "5")
        .output("Next", "roll")
        .node("roll", "MathRandom")
        .producer("result", "r")
        .build();

    engine.load(context).unwrap();
    assert_eq!(engine.node_ids(), vec!["tick", "roll"]);
    assert_eq!(engine.task_count(), 1);
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interval_beyond_clock_range_fails_load() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink);

    let err = engine.load(dice_graph("10000000000000000000")).unwrap_err();
    assert!(err.to_string().contains("Invalid period"));
    assert_eq!(engine.task_count(), 0);
    assert!(engine.node_ids().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_load_releases_partial_graph() {
    let sink = Arc::new(RecordingSink::default());
    let engine = engine(sink.clone());
    let baseline = Arc::strong_count(&sink);
    let context = ContextBuilder::new()
        .node("join", "EventListener")
        .consumer("event", "PlayerJoin")
        .output("Next", "say")
        .node("say", "SendChat")
        .node("quake", "EventListener")
        .consumer("event", "Earthquake")
        .unlinked("Next")
        .build();

    for _ in 0..3 {
        engine.load(context.clone()).unwrap_err();
    }
    assert_eq!(Arc::strong_count(&sink), baseline);

    engine.fire(PlayerJoin { name: "ada".to_string() }, false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.messages().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_round_trip_on_disk() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let registry = builtin_registry(sink).unwrap();
    let config = EngineConfig {
        data_dir: temp_dir.path().join("workflow"),
        ..EngineConfig::default()
    };
    let engine = WorkflowEngine::builder(config).registry(registry).build().unwrap();

    let context = dice_graph("60");
    engine.load(context.clone()).unwrap();
    engine.clear();
    assert!(engine.node_ids().is_empty());

    engine.load_from_store().unwrap();
    assert_eq!(engine.context(), context);
    assert_eq!(engine.node_ids(), vec!["tick", "roll", "say"]);
    engine.shutdown().await;
}

#[tokio::test]
async fn test_palette_lists_event_types() {
    let engine = engine(Arc::new(RecordingSink::default()));
    let palette = engine.node_types();

    let listener = palette.iter().find(|m| m.name == "EventListener").unwrap();
    let options: Vec<&str> = listener
        .find_field("event")
        .unwrap()
        .consumer()
        .unwrap()
        .option_list()
        .iter()
        .map(|o| o.value.as_str())
        .collect();
    assert_eq!(options, vec!["GameOver", "PlayerJoin"]);

    // The registry's own copy stays untouched
    let registered = engine.registry();
    let stored = registered.get_metadata("EventListener").unwrap();
    assert!(stored.find_field("event").unwrap().consumer().unwrap().option_list().is_empty());
}
