//! AgentDock 命令行入口
//!
//! 载入配置与种子描述符、装配运行时并注册激活中的描述符，然后执行一条命令：
//!
//! ```text
//! agentdock agents | tools | logs | stats | schema
//! agentdock query <agentId> <userId> <text...>
//! agentdock exec <toolId> <action> <params-json> <userId>
//! ```
//!
//! 配置文件可由环境变量 AGENTDOCK_CONFIG 指定。

use std::path::PathBuf;

use anyhow::{bail, Context};
use serde_json::Value;

use agentdock::audit::AuditFilter;
use agentdock::config::load_config;
use agentdock::descriptor::{AgentFilter, ToolFilter};
use agentdock::dispatch::request::request_schemas_json;
use agentdock::management::ListOptions;
use agentdock::observability;
use agentdock::AgentDock;

const USAGE: &str = "usage: agentdock <agents|tools|logs|stats|schema|query <agent> <user> <text...>|exec <tool> <action> <json> <user>>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        bail!(USAGE);
    };

    // schema 不需要装配运行时
    if command == "schema" {
        println!("{}", request_schemas_json());
        return Ok(());
    }

    let config_path = std::env::var("AGENTDOCK_CONFIG").ok().map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let dock = AgentDock::from_config(&cfg).context("Failed to assemble runtime")?;
    let _lifecycle = observability::spawn_lifecycle_logger(&dock.registry);
    let report = dock.load_active().await.context("Failed to load descriptors")?;
    for failure in &report.failures {
        eprintln!("skipped {} {}: {}", failure.kind, failure.id, failure.reason);
    }

    match (command, &args[1..]) {
        ("agents", _) => {
            for d in dock.agents.list(&AgentFilter::default(), ListOptions::default()).await? {
                let live = if dock.registry.has_agent(&d.id) { "live" } else { "-" };
                println!("{}\t{}\t{}\t{}", d.id, d.kind, d.name, live);
            }
        }
        ("tools", _) => {
            for d in dock.tools.list(&ToolFilter::default(), ListOptions::default()).await? {
                let live = if dock.registry.has_tool(&d.id) { "live" } else { "-" };
                println!("{}\t{}\t{}\t{}", d.id, d.kind, d.name, live);
            }
        }
        ("query", [agent, user, text @ ..]) if !text.is_empty() => {
            let out = dock
                .agents
                .process_query(agent, user, &text.join(" "), Value::Object(Default::default()))
                .await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        ("exec", [tool, action, params, user]) => {
            let params: Value = serde_json::from_str(params).context("params must be JSON")?;
            let out = dock.tools.execute(tool, action, params, user).await?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        ("logs", _) => {
            for r in dock.logs.list(&AuditFilter::default(), ListOptions::paged(1, 50)).await? {
                println!("{}", serde_json::to_string(&r)?);
            }
        }
        ("stats", _) => {
            let stats = dock.logs.stats(&AuditFilter::default()).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        _ => bail!(USAGE),
    }

    dock.shutdown();
    Ok(())
}
