//! 访问主体模块
//!
//! [`Principal`] 表示认证子系统给出的已认证实体；匿名请求用 `None` 表示。
//! 认证本身不在本库范围内，库只通过 [`PrincipalProvider`] 读取当前主体。

use crate::view::Request;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 访问主体
///
/// 表示发起请求的已认证实体（通常是用户）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// 主体 ID
    pub id: String,
    /// 所属分组
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
    /// 是否为工作人员
    #[serde(default)]
    pub is_staff: bool,
    /// 是否为超级管理员
    #[serde(default)]
    pub is_superuser: bool,
    /// 主体属性
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Principal {
    /// 创建新的主体
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// 添加分组
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    /// 添加多个分组
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// 标记为工作人员
    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }

    /// 标记为超级管理员
    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    /// 添加属性
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// 获取主体 ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 是否属于某个分组
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// 获取属性值
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }
}

/// 主体提供者 trait
///
/// 由认证子系统实现，返回当前请求的主体；`None` 表示匿名
pub trait PrincipalProvider: Send + Sync {
    /// 获取当前主体
    fn current_principal(&self, request: &Request) -> Option<Principal>;
}

/// 默认主体提供者：读取请求上已附加的主体
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestPrincipal;

impl PrincipalProvider for RequestPrincipal {
    fn current_principal(&self, request: &Request) -> Option<Principal> {
        request.principal().cloned()
    }
}

impl<F> PrincipalProvider for F
where
    F: Fn(&Request) -> Option<Principal> + Send + Sync,
{
    fn current_principal(&self, request: &Request) -> Option<Principal> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_builder() {
        let principal = Principal::new("u1")
            .with_group("editors")
            .staff()
            .with_attribute("department", "engineering");

        assert_eq!(principal.id(), "u1");
        assert!(principal.in_group("editors"));
        assert!(!principal.in_group("admins"));
        assert!(principal.is_staff);
        assert!(!principal.is_superuser);
        assert_eq!(principal.get_attribute("department"), Some("engineering"));
    }

    #[test]
    fn test_request_principal_provider() {
        let anonymous = Request::get("/");
        assert_eq!(RequestPrincipal.current_principal(&anonymous), None);

        let authenticated = Request::get("/").with_principal(Principal::new("u1"));
        let principal = RequestPrincipal.current_principal(&authenticated);
        assert_eq!(principal.map(|p| p.id), Some("u1".to_string()));
    }

    #[test]
    fn test_closure_provider() {
        let provider = |request: &Request| {
            request
                .header("x-user")
                .map(|id| Principal::new(id.to_string()))
        };

        let request = Request::get("/").with_header("x-user", "alice");
        assert_eq!(
            provider.current_principal(&request).map(|p| p.id),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_principal_serde() {
        let principal = Principal::new("u1").with_group("ops").superuser();
        let json = serde_json::to_string(&principal).unwrap();
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, principal);
    }
}
