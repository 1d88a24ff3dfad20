//! Example: Load a sample bank from the CDN and route a few events

use serde_json::json;
use std::sync::Arc;
use strudel_audio::{register_synth_sounds, SampleLoader, SampleRegistry, SoundRouter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manifest = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://strudel.b-cdn.net/uzu-drumkit.json".to_string());

    let registry = Arc::new(SampleRegistry::new());
    register_synth_sounds(&registry);

    let loader = SampleLoader::new(Arc::clone(&registry));
    let names = loader.load(&manifest, None).await?;
    println!("Loaded {} sounds from {}", names.len(), manifest);

    let (router, mut triggers) = SoundRouter::new(Arc::clone(&registry));
    let first = names.first().cloned().unwrap_or_else(|| "saw".to_string());
    router.trigger(&json!(first), 0.0)?;
    router.trigger(&json!({ "s": first, "n": 1 }), 0.5)?;
    router.trigger(&json!("saw"), 1.0)?;
    drop(router);

    while let Some(trigger) = triggers.recv().await {
        println!(
            "{:>5.2}s  {:<16} {}",
            trigger.time,
            trigger.sound,
            trigger.url.as_deref().unwrap_or("(synth)")
        );
    }
    Ok(())
}
