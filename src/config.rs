//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `QUEX__*` 覆盖
//! （双下划线表示嵌套，如 `QUEX__EXECUTOR__MAX_TICKS=800`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::core::ExecutorError;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub executor: ExecutorSection,
    #[serde(default)]
    pub adaptation: AdaptationSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            executor: ExecutorSection::default(),
            adaptation: AdaptationSection::default(),
        }
    }
}

/// [app] 段：应用名与计划文档路径
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 计划文档路径，未设置时用内置小车计划
    pub plan_file: Option<PathBuf>,
}

/// [executor] 段：控制频率、拍数上限与比较容差
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// 控制频率（Hz），决定固定控制周期
    pub control_frequency_hz: u32,
    /// 单回合拍数上限；超限按 TIMED_OUT 收尾
    pub max_ticks: u64,
    /// 目标贴近谓词的残差容差
    pub goal_tolerance: f64,
    /// 触发比较的容差带，避免拍边界上的前/后策略振荡
    pub threshold_band: f64,
    /// 计划偏离的连续放宽重匹配次数上限
    pub violation_retries: u32,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            control_frequency_hz: default_control_frequency_hz(),
            max_ticks: default_max_ticks(),
            goal_tolerance: default_goal_tolerance(),
            threshold_band: default_threshold_band(),
            violation_retries: default_violation_retries(),
        }
    }
}

fn default_control_frequency_hz() -> u32 {
    100
}

fn default_max_ticks() -> u64 {
    400
}

fn default_goal_tolerance() -> f64 {
    0.05
}

fn default_threshold_band() -> f64 {
    1e-3
}

fn default_violation_retries() -> u32 {
    3
}

impl ExecutorSection {
    /// 固定控制周期（秒）
    pub fn tick_period(&self) -> f64 {
        1.0 / self.control_frequency_hz as f64
    }

    /// 加载期校验；失败时回合不会开始
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.control_frequency_hz == 0 {
            return Err(ExecutorError::ConfigError(
                "control_frequency_hz must be positive".to_string(),
            ));
        }
        if self.max_ticks == 0 {
            return Err(ExecutorError::ConfigError(
                "max_ticks must be positive".to_string(),
            ));
        }
        if !(self.goal_tolerance.is_finite() && self.goal_tolerance > 0.0) {
            return Err(ExecutorError::ConfigError(
                "goal_tolerance must be positive".to_string(),
            ));
        }
        if !(self.threshold_band.is_finite() && self.threshold_band >= 0.0) {
            return Err(ExecutorError::ConfigError(
                "threshold_band must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// [adaptation] 段：回合间参数修正与多回合运动
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdaptationSection {
    pub enabled: bool,
    /// 全局修正增益（与条目级增益相乘）
    pub gain: f64,
    /// 单回合参数调整量上限，防止发散
    pub step_cap: f64,
    /// 多回合运动的回合数上限
    pub max_episodes: usize,
    /// 残差降到该值以下即提前收束
    pub stop_residual: f64,
}

impl Default for AdaptationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            gain: default_gain(),
            step_cap: default_step_cap(),
            max_episodes: default_max_episodes(),
            stop_residual: default_stop_residual(),
        }
    }
}

fn default_gain() -> f64 {
    1.0
}

fn default_step_cap() -> f64 {
    1.0
}

fn default_max_episodes() -> usize {
    10
}

fn default_stop_residual() -> f64 {
    0.01
}

impl AdaptationSection {
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if !(self.step_cap.is_finite() && self.step_cap > 0.0) {
            return Err(ExecutorError::ConfigError(
                "step_cap must be positive".to_string(),
            ));
        }
        if !self.gain.is_finite() {
            return Err(ExecutorError::ConfigError(
                "gain must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 QUEX__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 QUEX__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("QUEX")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
