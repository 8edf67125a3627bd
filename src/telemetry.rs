// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 日志初始化: `RUST_LOG` 控制级别, 缺省 info

use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// 安装全局订阅者; 重复调用时保持第一次的设置
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::uptime())
                .with_filter(env_filter),
        )
        .try_init();
}
