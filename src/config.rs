//! 守卫行为配置模块
//!
//! [`GuardConfig`] 描述分发约定（哪些方法名是视图方法）以及几处需要产品决策的行为开关。
//! 所有字段都有默认值，可以直接从 JSON 等格式反序列化。

use serde::{Deserialize, Serialize};

/// 默认的视图方法名：HTTP 动词加上 viewset 风格的动作名
pub const DEFAULT_VIEW_METHODS: &[&str] = &[
    "get",
    "post",
    "put",
    "patch",
    "delete",
    "head",
    "options",
    "trace",
    "list",
    "create",
    "retrieve",
    "update",
    "partial_update",
    "destroy",
];

/// 未声明权限的视图如何处理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndeclaredPolicy {
    /// 不做限制，直接调用视图
    #[default]
    PassThrough,
    /// 默认拒绝
    Deny,
}

/// 配置问题的严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSeverity {
    /// 记录警告并继续
    #[default]
    Warn,
    /// 视为配置错误，终止启动
    Error,
}

/// 守卫配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// 分发约定认可的视图方法名
    pub view_methods: Vec<String>,
    /// 未声明权限的视图的处理方式
    pub undeclared: UndeclaredPolicy,
    /// 类声明了权限却找不到插入点时的处理方式
    pub missing_insertion_point: ConfigSeverity,
    /// 检测到重复包装时是否直接报错（开发环境默认开启）
    pub strict: bool,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            view_methods: DEFAULT_VIEW_METHODS.iter().map(|m| m.to_string()).collect(),
            undeclared: UndeclaredPolicy::default(),
            missing_insertion_point: ConfigSeverity::default(),
            strict: cfg!(debug_assertions),
        }
    }
}

impl GuardConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 替换视图方法名列表
    pub fn view_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// 设置未声明权限的处理方式
    pub fn undeclared(mut self, policy: UndeclaredPolicy) -> Self {
        self.undeclared = policy;
        self
    }

    /// 设置缺少插入点时的严重程度
    pub fn missing_insertion_point(mut self, severity: ConfigSeverity) -> Self {
        self.missing_insertion_point = severity;
        self
    }

    /// 设置严格模式
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// 方法名是否属于分发约定
    pub fn is_view_method(&self, name: &str) -> bool {
        self.view_methods.iter().any(|m| m == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert!(config.is_view_method("get"));
        assert!(config.is_view_method("partial_update"));
        assert!(!config.is_view_method("not_a_view"));
        assert_eq!(config.undeclared, UndeclaredPolicy::PassThrough);
        assert_eq!(config.missing_insertion_point, ConfigSeverity::Warn);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: GuardConfig =
            serde_json::from_str(r#"{"view_methods": ["get", "post"], "undeclared": "deny"}"#)
                .unwrap();

        assert_eq!(config.view_methods, vec!["get", "post"]);
        assert_eq!(config.undeclared, UndeclaredPolicy::Deny);
        // 未给出的字段使用默认值
        assert_eq!(config.missing_insertion_point, ConfigSeverity::Warn);
    }

    #[test]
    fn test_builder_methods() {
        let config = GuardConfig::new()
            .view_methods(["get"])
            .missing_insertion_point(ConfigSeverity::Error)
            .strict(false);

        assert!(!config.is_view_method("post"));
        assert_eq!(config.missing_insertion_point, ConfigSeverity::Error);
        assert!(!config.strict);
    }
}
