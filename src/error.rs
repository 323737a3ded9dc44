//! 统一错误处理
//!
//! 采集流程中的错误大多不致命：跳过的节点被静默忽略，
//! 加载超时会强制继续滚动，持久化失败只记录日志。

use thiserror::Error;

/// 采集错误类型
#[derive(Error, Debug)]
pub enum HarvestError {
    /// 节点不满足收录条件
    #[error("节点被跳过: {0}")]
    ExtractionSkipped(String),

    /// 加载指示器重试次数耗尽
    #[error("等待加载超时，已重试 {retries} 次")]
    LoadTimeout { retries: u32 },

    /// 存储读写失败
    #[error("持久化失败: {0}")]
    PersistenceFailure(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 选择器无法解析
    #[error("选择器错误: {0}")]
    Selector(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 页面宿主错误
    #[error("页面宿主错误: {0}")]
    Host(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// 采集流程能否在此错误之后继续
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, HarvestError::Config(_) | HarvestError::Selector(_))
    }

    /// 是否为被跳过的节点
    pub fn is_skip(&self) -> bool {
        matches!(self, HarvestError::ExtractionSkipped(_))
    }

    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        HarvestError::ExtractionSkipped(reason.into())
    }
}

impl From<redb::Error> for HarvestError {
    fn from(error: redb::Error) -> Self {
        HarvestError::PersistenceFailure(error.to_string())
    }
}

macro_rules! impl_persistence_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for HarvestError {
                fn from(error: $ty) -> Self {
                    HarvestError::PersistenceFailure(error.to_string())
                }
            }
        )*
    };
}

impl_persistence_from!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

/// 采集结果类型
pub type HarvestResult<T> = Result<T, HarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverability() {
        assert!(HarvestError::skipped("no link").is_recoverable());
        assert!(HarvestError::LoadTimeout { retries: 8 }.is_recoverable());
        assert!(HarvestError::PersistenceFailure("disk".into()).is_recoverable());
        assert!(!HarvestError::Config("bad".into()).is_recoverable());
        assert!(!HarvestError::Selector("bad".into()).is_recoverable());
    }

    #[test]
    fn messages() {
        assert_eq!(
            HarvestError::LoadTimeout { retries: 8 }.to_string(),
            "等待加载超时，已重试 8 次"
        );
        assert!(HarvestError::skipped("x").is_skip());
    }
}
