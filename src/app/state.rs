// ==========================================
// 检验验证与工作流状态引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 职责: 按 autosave_interval_secs 定时自动保存已加载会话
// ==========================================

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{InspectionApi, InspectorContext, RemoteServices};
use crate::config::{ConfigManager, InspectionConfig};
use crate::db::{ensure_schema_version, open_sqlite_connection};
use crate::engine::events::OptionalEventPublisher;
use crate::repository::{CallStatusRepository, DraftSnapshotStore, SqliteDraftRepository};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 启动时加载的检验配置
    pub config: InspectionConfig,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 草稿快照服务
    pub draft_store: Arc<DraftSnapshotStore>,

    /// 报验单状态仓储
    pub call_status_repo: Arc<CallStatusRepository>,

    /// 检验业务API
    pub inspection_api: Arc<InspectionApi>,
}

impl AppState {
    /// 创建新的AppState实例（不发布事件）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - remote: 外部服务集合
    /// - inspector: 当前检验工程师
    ///
    /// # 返回
    /// - Ok(AppState): 成功创建
    /// - Err(String): 初始化错误
    pub async fn new(
        db_path: String,
        remote: RemoteServices,
        inspector: InspectorContext,
    ) -> Result<Self, String> {
        Self::with_event_publisher(db_path, remote, inspector, OptionalEventPublisher::none()).await
    }

    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会:
    /// 1. 打开共享连接并写入 schema_version
    /// 2. 从 config_kv 加载检验配置
    /// 3. 初始化所有Repository
    /// 4. 创建API实例
    pub async fn with_event_publisher(
        db_path: String,
        remote: RemoteServices,
        inspector: InspectorContext,
        event_publisher: OptionalEventPublisher,
    ) -> Result<Self, String> {
        tracing::info!("初始化AppState,数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        let schema_version =
            ensure_schema_version(&conn).map_err(|e| format!("schema_version 初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 配置
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config = InspectionConfig::load(config_manager.as_ref()).await?;

        // ==========================================
        // Repository
        // ==========================================
        let draft_repo = Arc::new(
            SqliteDraftRepository::new(conn.clone())
                .map_err(|e| format!("无法创建SqliteDraftRepository: {}", e))?,
        );
        let draft_store = Arc::new(DraftSnapshotStore::new(draft_repo));
        let call_status_repo = Arc::new(
            CallStatusRepository::new(conn)
                .map_err(|e| format!("无法创建CallStatusRepository: {}", e))?,
        );

        // ==========================================
        // API
        // ==========================================
        let inspection_api = Arc::new(InspectionApi::new(
            draft_store.clone(),
            call_status_repo.clone(),
            config.clone(),
            remote,
            event_publisher,
            inspector,
        ));

        tracing::info!(
            schema_version,
            autosave_interval_secs = config.autosave_interval_secs,
            draft_retention_days = config.draft_retention_days,
            "AppState初始化完成"
        );

        Ok(Self {
            db_path,
            config,
            config_manager,
            draft_store,
            call_status_repo,
            inspection_api,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }

    /// 启动定时自动保存任务
    ///
    /// # 返回
    /// - Some(JoinHandle): 任务句柄，丢弃句柄不会停止任务，需 abort
    /// - None: autosave_interval_secs 为 0，自动保存关闭
    pub fn spawn_autosave(&self) -> Option<JoinHandle<()>> {
        let secs = self.config.autosave_interval_secs;
        if secs == 0 {
            tracing::info!("自动保存已关闭");
            return None;
        }
        let api = self.inspection_api.clone();
        let period = Duration::from_secs(secs);

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 首个 tick 立即完成，跳过
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = api.autosave_loaded_sessions() {
                    tracing::warn!(error = %e, "定时自动保存失败");
                }
            }
        }))
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 INSPECTION_ENGINE_DB_PATH（非空时）
/// - 否则: 用户数据目录/inspection-engine/inspection_engine.db
/// - 无用户数据目录时: ./inspection_engine.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("INSPECTION_ENGINE_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./inspection_engine.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("inspection-engine");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("inspection_engine.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[tokio::test]
    async fn test_app_state_initializes_on_fresh_db() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        let state = AppState::new(
            db_path.clone(),
            RemoteServices::unconfigured(),
            InspectorContext::new("IE-1", "ABC"),
        )
        .await
        .unwrap();

        assert_eq!(state.get_db_path(), db_path);
        assert_eq!(state.config, InspectionConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_autosave_task_saves_on_interval() {
        use crate::domain::{Heat, InspectionCall, ProductType};

        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("autosave.db").to_string_lossy().to_string();
        let state = AppState::new(
            db_path,
            RemoteServices::unconfigured(),
            InspectorContext::new("IE-1", "ABC"),
        )
        .await
        .unwrap();

        let call = InspectionCall::new("C1", "PO1", ProductType::RawMaterial, 5.0);
        state
            .inspection_api
            .load_call(call, vec![Heat::new("H1", 5.0)])
            .unwrap();
        state.inspection_api.set_final_remarks("C1", "draft").unwrap();
        let version = |state: &AppState| {
            state
                .draft_store
                .load_snapshot("C1")
                .unwrap()
                .map(|snapshot| snapshot.version)
        };
        assert_eq!(version(&state), Some(1));

        let handle = state.spawn_autosave().unwrap();
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(version(&state), Some(1));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(version(&state), Some(2));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(version(&state), Some(3));
        handle.abort();
    }
}
