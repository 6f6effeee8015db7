//! Insight and model backend command implementations

use anyhow::{Context, Result};
use caselens_core::{Config, InsightEngine, ModelBackend};

/// Generate one insight from an objective and facts
pub async fn cmd_insight(engine: &InsightEngine, objective: &str, facts: &str) -> Result<()> {
    println!("🤖 Generating insight with {}...", engine.backend().name());
    let text = engine
        .generate(objective, facts)
        .await
        .context("Insight generation failed")?;

    println!();
    println!("{}", text);
    Ok(())
}

/// Show the configured backend chain and how each candidate fared
pub fn cmd_backends(config: &Config, engine: &InsightEngine) -> Result<()> {
    let chain: Vec<&str> = config.insight.backends.iter().map(|k| k.as_str()).collect();
    let chain = if chain.is_empty() {
        "(empty)".to_string()
    } else {
        chain.join(" → ")
    };

    println!();
    println!("🔌 Model Backends");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Chain: {}", chain);
    println!();

    for attempt in engine.attempts() {
        let marker = if attempt.selected { "✅" } else { "⏭️ " };
        println!("   {} {:6} {}", marker, attempt.kind, attempt.detail);
    }

    let params = engine.params();
    println!();
    println!(
        "   Generation: max_tokens={} temperature={} top_p={} top_k={} repeat_penalty={}",
        params.max_tokens, params.temperature, params.top_p, params.top_k, params.repeat_penalty
    );

    println!();
    if engine.is_available() {
        println!("✅ AI analysis enabled ({})", engine.backend().describe());
    } else {
        println!("⚠️  AI analysis unavailable. Reports still run without insights.");
        println!();
        println!("To enable it:");
        println!(
            "  - Cloud: export {}=<your key>",
            config.insight.cloud.api_key_env
        );
        println!(
            "  - Local: place {} in a models/ directory and install {}",
            config.insight.local.weights_file.display(),
            config.insight.local.server_binary.display()
        );
    }
    Ok(())
}
