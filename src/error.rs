//! 统一错误类型模块
//!
//! 提供 rolegate 库中所有操作的错误类型定义：
//!
//! - [`Error`]: 启动期（配置、打补丁）错误，出现即终止启动
//! - [`ViewError`]: 单次请求内由视图调用返回的错误
//! - [`PredicateError`]: 谓词求值失败，只在本地恢复，不会中断请求

use std::fmt;

/// rolegate 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// 单次视图调用的结果类型
pub type ViewResult<T> = std::result::Result<T, ViewError>;

/// rolegate 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 配置错误
    Config(ConfigError),

    /// 同一目标被重复包装
    DoublePatch {
        /// 被重复包装的目标
        target: String,
    },
}

impl Error {
    /// 创建一个未知角色错误
    pub fn unknown_role(role: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        Error::Config(ConfigError::UnknownRole {
            role: role.into(),
            referenced_by: referenced_by.into(),
        })
    }

    /// 创建一个重复包装错误
    pub fn double_patch(target: impl Into<String>) -> Self {
        Error::DoublePatch {
            target: target.into(),
        }
    }

    /// 是否为配置错误
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// 配置相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// 权限规则引用了未定义的角色
    UnknownRole {
        role: String,
        referenced_by: String,
    },
    /// 角色重复定义
    DuplicateRole(String),
    /// 声明了权限的类找不到任何插入点
    MissingInsertionPoint { class: String, methods: Vec<String> },
    /// 类继承关系无法线性化
    InconsistentHierarchy(String),
    /// 全局策略注册表已初始化
    AlreadyInitialized,
    /// 无效的配置值
    InvalidValue { key: String, message: String },
}

/// 单次请求中视图调用返回的错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    /// 权限不足
    PermissionDenied,
    /// 请求方法不被视图支持
    MethodNotAllowed { method: String, allowed: Vec<String> },
    /// 路由未找到
    NotFound(String),
    /// 视图内部错误
    Handler(String),
}

impl ViewError {
    /// 创建视图内部错误
    pub fn handler(msg: impl Into<String>) -> Self {
        ViewError::Handler(msg.into())
    }

    /// 对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ViewError::PermissionDenied => 403,
            ViewError::MethodNotAllowed { .. } => 405,
            ViewError::NotFound(_) => 404,
            ViewError::Handler(_) => 500,
        }
    }

    /// 是否为权限拒绝
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, ViewError::PermissionDenied)
    }
}

/// 谓词求值错误
///
/// 角色成员谓词或权限规则谓词失败时返回，按“条件不满足”处理
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateError {
    message: String,
}

impl PredicateError {
    /// 创建新的谓词错误
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// 错误信息
    pub fn message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Config error: {}", e),
            Error::DoublePatch { target } => {
                write!(f, "Double patch attempt: '{}' is already guarded", target)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownRole {
                role,
                referenced_by,
            } => write!(f, "unknown role '{}' referenced by '{}'", role, referenced_by),
            ConfigError::DuplicateRole(role) => write!(f, "role '{}' is defined twice", role),
            ConfigError::MissingInsertionPoint { class, methods } => write!(
                f,
                "class '{}' declares permissions for [{}] but defines no such view method",
                class,
                methods.join(", ")
            ),
            ConfigError::InconsistentHierarchy(class) => {
                write!(f, "cannot linearize the bases of class '{}'", class)
            }
            ConfigError::AlreadyInitialized => {
                write!(f, "the global policy registry is already initialized")
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "invalid configuration value for '{}': {}", key, message)
            }
        }
    }
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewError::PermissionDenied => {
                write!(f, "You do not have permission to perform this action.")
            }
            ViewError::MethodNotAllowed { method, .. } => {
                write!(f, "Method \"{}\" not allowed.", method)
            }
            ViewError::NotFound(path) => write!(f, "Not found: {}", path),
            ViewError::Handler(msg) => write!(f, "Handler error: {}", msg),
        }
    }
}

impl fmt::Display for PredicateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "predicate evaluation failed: {}", self.message)
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for ViewError {}
impl std::error::Error for PredicateError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(ConfigError::InvalidValue {
            key: "permissions".to_string(),
            message: err.to_string(),
        })
    }
}

impl From<&str> for PredicateError {
    fn from(msg: &str) -> Self {
        PredicateError::new(msg)
    }
}

impl From<String> for PredicateError {
    fn from(msg: String) -> Self {
        PredicateError::new(msg)
    }
}
