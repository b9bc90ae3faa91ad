// ==========================================
// 检验验证与工作流状态引擎 - 主入口
// ==========================================
// 职责: 初始化日志与 AppState，启动定时自动保存，等待 Ctrl-C 退出
// 说明: 未配置外部服务时以离线模式运行，草稿仍可编辑
// ==========================================

use inspection_engine::app::{get_default_db_path, AppState};
use inspection_engine::{logging, InspectorContext, RemoteServices};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志系统
    logging::init();

    tracing::info!("==================================================");
    tracing::info!("{}", inspection_engine::APP_NAME);
    tracing::info!("系统版本: {}", inspection_engine::VERSION);
    tracing::info!("==================================================");

    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    let action_by = std::env::var("INSPECTION_ENGINE_USER").unwrap_or_else(|_| "SYSTEM".to_string());
    let ie_short_name = std::env::var("INSPECTION_ENGINE_IE_SHORT_NAME").unwrap_or_default();
    let inspector = InspectorContext::new(action_by, ie_short_name);

    let state = AppState::new(db_path, RemoteServices::unconfigured(), inspector)
        .await
        .map_err(anyhow::Error::msg)?;

    let now = chrono::Utc::now().naive_utc();
    let purged = state.inspection_api.purge_expired_drafts(now)?;
    let autosave = state.spawn_autosave();

    tracing::info!(
        db_path = %state.get_db_path(),
        default_model = %state.config.default_product_model,
        autosave_interval_secs = state.config.autosave_interval_secs,
        purged_drafts = purged,
        "检验引擎已就绪(外部服务未配置,离线模式)"
    );

    tokio::signal::ctrl_c().await?;
    if let Some(handle) = autosave {
        handle.abort();
    }
    let saved = state.inspection_api.autosave_loaded_sessions()?;
    tracing::info!(saved, "检验引擎退出");

    Ok(())
}
