// ==========================================
// 检验验证与工作流状态引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供草稿与状态的数据访问接口，屏蔽数据库细节
// 约束: 所有查询使用参数化，防止 SQL 注入
// ==========================================

pub mod call_status_repo;
pub mod draft_repo;
pub mod draft_store;
pub mod error;

// 重导出核心仓储
pub use call_status_repo::{CallStatusRecord, CallStatusRepository};
pub use draft_repo::SqliteDraftRepository;
pub use draft_store::{DraftKey, DraftRecord, DraftSnapshotStore, DraftStore, InMemoryDraftStore};
pub use error::{RepositoryError, RepositoryResult};
