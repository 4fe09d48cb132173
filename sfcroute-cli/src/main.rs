use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use sfcroute::input::{default_output_path, split_probe, write_document};
use sfcroute::{
    ComponentRulePlugin, LoaderOptions, OutputFormat, PluginConfig, RuleNormalizer, RuleSetNormalizer, RulesFile,
    TransformReport,
};

#[derive(Parser)]
#[command(name = "sfcroute")]
#[command(about = "Rewrites bundler rules so single-file component blocks reach your per-language rules")]
struct Args {
    /// Rules file: a rule list or a bundler config with module.rules (YAML or JSON)
    #[arg(short, long)]
    input: Option<String>,

    /// Path to plugin config file (YAML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Output file path (if not specified, auto-generated based on input)
    #[arg(short, long)]
    output: Option<String>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "json")]
    output_format: OutputFormat,

    /// Request to resolve against the rewritten rules, e.g. "src/App.vue?vue&lang=css" (repeatable)
    #[arg(long)]
    probe: Vec<String>,

    /// Write a transformation report (JSON) to this path
    #[arg(long)]
    report: Option<String>,

    /// Component file extension, overriding the config
    #[arg(long)]
    extension: Option<String>,

    /// Print the effective plugin config and exit
    #[arg(long)]
    show_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    println!("🦀 sfcroute rule rewriter");

    // Load config using the fallback pattern, then apply CLI overrides
    let mut config = PluginConfig::load_with_fallback(args.config.as_deref());
    if let Some(config_path) = &args.config {
        println!("📋 Loaded config from: {}", config_path);
    } else {
        println!("📋 Using default config");
    }
    if let Some(extension) = &args.extension {
        config.extension = extension.clone();
    }
    debug!(?config, "effective plugin config");

    if args.show_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let Some(input) = &args.input else {
        show_help();
        return Ok(());
    };

    if !Path::new(input).exists() {
        eprintln!("⚠️  Rules file not found at: {}", input);
        std::process::exit(1);
    }

    let plugin = ComponentRulePlugin::new(&config)?;
    let normalizer = RuleSetNormalizer::new();
    let file = RulesFile::load(input)?;
    println!(
        "📄 Processing: {} ({} rules{})",
        input,
        file.rules.len(),
        if file.is_config() { ", from module.rules" } else { "" }
    );

    let outcome = match plugin.transform(&file.rules, &normalizer) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    println!("✅ Rewrote rule set");
    println!("📊 Rule metrics:");
    println!("   - Component rule: #{}", outcome.summary.component_rule_index);
    println!("   - Compiler loader at use #{}", outcome.summary.compiler_use_index);
    println!("   - Cloned rules: {}", outcome.summary.cloned_rules);
    println!("   - Output rules: {}", outcome.summary.output_rules);

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(input, args.output_format));
    write_document(&file.with_rules(&outcome.rules)?, &output_path, args.output_format)?;
    println!("💾 Rewritten rules saved to: {}", output_path);

    if let Some(report_path) = &args.report {
        let settings = plugin.settings();
        let report = TransformReport::new(&settings.plugin_name, &settings.extension, &file.rules, outcome.summary.clone());
        std::fs::write(report_path, serde_json::to_string_pretty(&report)?)?;
        println!("💾 Report saved to: {}", report_path);
    }

    if !args.probe.is_empty() {
        let normalized = normalizer.normalize(&outcome.rules)?;
        println!("\n🔍 Probes:");
        for request in &args.probe {
            let (resource, query) = split_probe(request);
            println!("  {request}");
            let entries = normalized.loaders_for(resource, query);
            if entries.is_empty() {
                println!("    (no loaders)");
            }
            for entry in entries {
                match entry.options.as_ref() {
                    Some(LoaderOptions::Object(options)) => {
                        println!("    -> {} {}", entry.loader, serde_json::to_string(options)?)
                    }
                    Some(LoaderOptions::Query(query)) => println!("    -> {}?{}", entry.loader, query),
                    None => println!("    -> {}", entry.loader),
                }
            }
        }
    }

    Ok(())
}

fn show_help() {
    println!("\n📋 Available Options:");
    println!("  --input <path>          Rules file (rule list or config with module.rules)");
    println!("  --config <path>         Load plugin config file");
    println!("  --output <path>         Output file path (auto-generated if not specified)");
    println!("  --output-format <fmt>   Output format: json or yaml");
    println!("  --probe <request>       Show the loader chain for a request (repeatable)");
    println!("  --report <path>         Write a transformation report");
    println!("  --extension <ext>       Component file extension (default: vue)");
    println!("  --show-config           Print the effective plugin config");

    println!("\n📝 Usage Examples:");
    println!("  cargo run -- -i webpack.rules.yaml");
    println!("  cargo run -- -i webpack.config.json -o rules.out.json --report report.json");
    println!("  cargo run -- -i rules.yaml --probe 'src/App.vue?vue&type=style&index=0&lang=css'");
}
