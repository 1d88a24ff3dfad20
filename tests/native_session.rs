//! End to end: the native output module against a local sample server.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use strudel_bridge::modules::{
    Module, OutputSink, PatternCore, Repl, ReplOptions, Synth, TimeSource, Transpiler, CORE, DRAW,
    MINI, SUPERDOUGH, TONAL, TRANSPILER,
};
use strudel_bridge::strudel_audio::{ContextState, SoundSource};
use strudel_bridge::{
    BridgeConfig, EvalScope, ExportTable, ModuleSet, NativeWebAudio, SampleBankSource, Session,
    StaticModules,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Triggers one event per whitespace separated token
struct TokenRepl {
    output: Arc<dyn OutputSink>,
    get_time: TimeSource,
}

#[async_trait]
impl Repl for TokenRepl {
    async fn evaluate(&self, code: &str) -> anyhow::Result<()> {
        if code == "hush()" {
            return Ok(());
        }
        for token in code.split_whitespace() {
            self.output.trigger(&Value::String(token.to_string()), (self.get_time)())?;
        }
        Ok(())
    }

    fn stop(&self) {}
}

struct TokenCore;

impl Module for TokenCore {
    fn name(&self) -> &str {
        CORE
    }

    fn exports(&self) -> Vec<String> {
        vec!["sequence".to_string(), "hush".to_string()]
    }
}

impl PatternCore for TokenCore {
    fn register_scope(&self, _scope: &EvalScope) -> anyhow::Result<()> {
        Ok(())
    }

    fn pattern_methods(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn repl(&self, options: ReplOptions) -> anyhow::Result<Arc<dyn Repl>> {
        Ok(Arc::new(TokenRepl {
            output: options.output,
            get_time: options.get_time,
        }))
    }
}

struct Passthrough;

impl Module for Passthrough {
    fn name(&self) -> &str {
        TRANSPILER
    }

    fn exports(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Transpiler for Passthrough {
    fn transpile(&self, code: &str) -> anyhow::Result<String> {
        Ok(code.to_string())
    }
}

struct NoAliases;

impl Module for NoAliases {
    fn name(&self) -> &str {
        SUPERDOUGH
    }

    fn exports(&self) -> Vec<String> {
        Vec::new()
    }
}

impl Synth for NoAliases {
    fn alias_bank_loader(&self) -> Option<Arc<dyn strudel_bridge::modules::AliasBankLoader>> {
        None
    }
}

async fn sample_server() -> MockServer {
    let server = MockServer::start().await;
    let manifests = [
        ("/drums.json", json!({ "bd": ["bd/0.wav", "bd/1.wav"], "sd": "sd/0.wav" })),
        (
            "/machines.json",
            json!({ "_base": "ignored/", "RolandTR909_hh": ["909/hh.wav"] }),
        ),
        ("/aliases.json", json!({ "RolandTR909": ["909", "tr909"] })),
    ];
    for (route, body) in manifests {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }
    server
}

fn config_for(server: &MockServer) -> BridgeConfig {
    BridgeConfig {
        cdn_base: server.uri(),
        sample_banks: vec![
            SampleBankSource::new("{cdn}/drums.json", None),
            SampleBankSource::new("{cdn}/machines.json", Some("{cdn}/tidal/")),
        ],
        alias_manifest: Some("{cdn}/aliases.json".to_string()),
        soundfonts: false,
        ..BridgeConfig::default()
    }
}

fn native_modules() -> (
    StaticModules,
    Arc<NativeWebAudio>,
    tokio::sync::mpsc::UnboundedReceiver<strudel_bridge::strudel_audio::Trigger>,
) {
    let (webaudio, triggers) = NativeWebAudio::new();
    let webaudio = Arc::new(webaudio);
    let modules = StaticModules {
        modules: ModuleSet {
            core: Arc::new(TokenCore),
            mini: Arc::new(ExportTable::new(MINI, ["mini", "m"])),
            webaudio: webaudio.clone(),
            tonal: Arc::new(ExportTable::new(TONAL, ["scale", "voicing"])),
            transpiler: Arc::new(Passthrough),
            superdough: Arc::new(NoAliases),
            draw: Arc::new(ExportTable::new(DRAW, ["pianoroll"])),
        },
        soundfonts: None,
    };
    (modules, webaudio, triggers)
}

#[tokio::test]
async fn test_native_session_routes_events_to_served_samples() {
    let server = sample_server().await;
    let (modules, webaudio, mut triggers) = native_modules();
    let session = Session::new(Arc::new(modules), config_for(&server));

    let report = session.ensure_initialized().await.unwrap();
    assert_eq!(
        report.alias_bank,
        Some(format!("{}/aliases.json", server.uri()))
    );

    let registry = webaudio.registry();
    assert!(registry.contains("bd"));
    assert!(registry.contains("sawtooth"));
    assert_eq!(registry.alias_count(), 2);

    session.evaluate("bd:1 sd 909_hh").await.unwrap();
    assert_eq!(webaudio.context().state(), ContextState::Running);

    let bd = triggers.recv().await.unwrap();
    assert_eq!(bd.sound, "bd");
    assert_eq!(bd.url, Some(format!("{}/bd/1.wav", server.uri())));

    let sd = triggers.recv().await.unwrap();
    assert_eq!(sd.url, Some(format!("{}/sd/0.wav", server.uri())));

    let hh = triggers.recv().await.unwrap();
    assert_eq!(hh.sound, "RolandTR909_hh");
    assert_eq!(hh.url, Some(format!("{}/tidal/909/hh.wav", server.uri())));
    assert!(matches!(hh.source, SoundSource::Samples { .. }));
}

#[tokio::test]
async fn test_unknown_sound_is_an_eval_error() {
    let server = sample_server().await;
    let (modules, _webaudio, _triggers) = native_modules();
    let session = Session::new(Arc::new(modules), config_for(&server));

    let err = session.evaluate("cowbell").await.unwrap_err();
    assert!(err.eval_error().is_some());
    assert_eq!(err.to_string(), "Sound not found: cowbell");

    session.hush().await;
}

#[tokio::test]
async fn test_missing_bank_fails_init_with_its_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let (modules, _webaudio, _triggers) = native_modules();
    let session = Session::new(Arc::new(modules), config_for(&server));

    let err = session.ensure_initialized().await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Failed to load sample bank"));
    assert!(message.contains(&server.uri()));
}
