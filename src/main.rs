//! Quex - 定性计划反应执行器
//!
//! 入口：初始化日志、加载配置与小车计划，顺序执行多个回合并在回合间
//! 自适应，打印各回合残差与学到的模型参数。

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quex::adaptation::CampaignLoop;
use quex::config::load_config;
use quex::model::time_to_goal;
use quex::plan::load_plan_file;
use quex::plants::{cart_plan, CartPlant};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).context("Failed to load config")?;
    cfg.executor
        .validate()
        .context("Invalid [executor] config")?;
    cfg.adaptation
        .validate()
        .context("Invalid [adaptation] config")?;

    // 计划：优先用配置指定的文档，缺省退回内置小车计划
    let loaded = match &cfg.app.plan_file {
        Some(path) if path.exists() => {
            load_plan_file(path).context("Failed to load plan file")?
        }
        _ => cart_plan(10.0, 8.0).context("Failed to build cart plan")?,
    };

    // 满力界下的毛估到达时间（梯形剖面，无速度上限）
    let eta = time_to_goal(10.0, 0.0, f64::INFINITY, 10.0, 10.0);
    tracing::info!("Estimated time to reach goal region: {:.2}s", eta);

    let mut env = CartPlant::new(1.0, -10.0, cfg.executor.tick_period());
    let episodes = cfg.adaptation.max_episodes;
    let mut campaign = CampaignLoop::new(loaded, cfg.executor.clone(), cfg.adaptation.clone())
        .context("Failed to build campaign")?;

    let summaries = campaign.run(&mut env, episodes).await?;
    for s in &summaries {
        tracing::info!(
            "episode {:>2}: {:?}, residual {:.4}, {} ticks",
            s.episode,
            s.outcome,
            s.residual,
            s.ticks
        );
    }
    if let Some(params) = campaign.models().parameters("accelerate.stop") {
        tracing::info!("Learned stop-model parameters: {:?}", params);
    }
    if let Some(max_v) = campaign.envelope().max_rate("x", true) {
        tracing::info!("Peak observed speed: {:.2} m/s", max_v);
    }
    // 最终回合结果以 JSON 输出，供外部日志/绘图消费
    if let Some(result) = campaign.last_result() {
        let json = serde_json::to_string(result).context("Failed to serialize result")?;
        tracing::debug!("Final episode result: {}", json);
    }

    Ok(())
}
