//! 角色定义模块
//!
//! 角色是一个命名的成员测试：给定主体和请求，判断主体是否持有该角色。
//! [`RoleResolver`] 对所有角色逐一求值，得到当前请求持有的完整角色集合。

use crate::error::PredicateError;
use crate::rbac::predicate::PredicateFailure;
use crate::rbac::principal::Principal;
use crate::view::Request;
use std::fmt;
use std::sync::Arc;

/// 内置匿名角色名
pub const ANON: &str = "anon";
/// 内置登录用户角色名
pub const USER: &str = "user";
/// 内置工作人员角色名
pub const STAFF: &str = "staff";
/// 内置管理员角色名
pub const ADMIN: &str = "admin";

type MembershipFn = dyn Fn(Option<&Principal>, &Request) -> Result<bool, PredicateError> + Send + Sync;

/// 角色定义
///
/// # 示例
///
/// ```rust
/// use rolegate::rbac::{Principal, RoleDefinition};
/// use rolegate::view::Request;
///
/// let editor = RoleDefinition::group("editor", "editors");
/// let request = Request::get("/");
/// let alice = Principal::new("alice").with_group("editors");
///
/// assert_eq!(editor.is_member(Some(&alice), &request), Ok(true));
/// assert_eq!(editor.is_member(None, &request), Ok(false));
/// ```
#[derive(Clone)]
pub struct RoleDefinition {
    name: String,
    description: Option<String>,
    membership: Arc<MembershipFn>,
}

impl RoleDefinition {
    /// 创建新角色
    pub fn new<F>(name: impl Into<String>, membership: F) -> Self
    where
        F: Fn(Option<&Principal>, &Request) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            membership: Arc::new(membership),
        }
    }

    /// 设置描述
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// 匿名角色：没有主体
    pub fn anon() -> Self {
        Self::new(ANON, |principal, _| Ok(principal.is_none()))
            .description("Unauthenticated requests")
    }

    /// 登录用户角色：任何已认证主体
    pub fn user() -> Self {
        Self::new(USER, |principal, _| Ok(principal.is_some())).description("Authenticated users")
    }

    /// 工作人员角色
    pub fn staff() -> Self {
        Self::new(STAFF, |principal, _| Ok(principal.is_some_and(|p| p.is_staff)))
            .description("Staff members")
    }

    /// 管理员角色：超级管理员
    pub fn admin() -> Self {
        Self::new(ADMIN, |principal, _| {
            Ok(principal.is_some_and(|p| p.is_superuser))
        })
        .description("Superusers")
    }

    /// 分组角色：主体属于指定分组
    pub fn group(name: impl Into<String>, group: impl Into<String>) -> Self {
        let group = group.into();
        Self::new(name, move |principal, _| {
            Ok(principal.is_some_and(|p| p.in_group(&group)))
        })
    }

    /// 角色名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 角色描述
    pub fn get_description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// 判断主体是否持有该角色
    pub fn is_member(
        &self,
        principal: Option<&Principal>,
        request: &Request,
    ) -> Result<bool, PredicateError> {
        (self.membership)(principal, request)
    }
}

impl fmt::Debug for RoleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

// ============================================================================
// RoleSet
// ============================================================================

/// 持有的角色集合
///
/// 保持角色注册顺序，不含重复项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    roles: Vec<String>,
}

impl RoleSet {
    /// 创建空集合
    pub fn new() -> Self {
        Self { roles: Vec::new() }
    }

    /// 添加角色（已存在时忽略）
    pub fn insert(&mut self, role: impl Into<String>) -> bool {
        let role = role.into();
        if self.contains(&role) {
            return false;
        }
        self.roles.push(role);
        true
    }

    /// 是否持有角色
    pub fn contains(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// 遍历角色
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    /// 角色数量
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = RoleSet::new();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.roles.join(", "))
    }
}

// ============================================================================
// RoleResolver
// ============================================================================

/// 角色解析结果
#[derive(Debug, Clone, Default)]
pub struct RoleResolution {
    /// 持有的角色
    pub roles: RoleSet,
    /// 求值失败的角色谓词
    pub failures: Vec<PredicateFailure>,
}

/// 角色解析器
///
/// 对每个角色定义求值，不在第一次命中时停止，因为权限优先级需要完整的角色集合。
/// 某个谓词失败时视为未持有该角色，错误记入 [`RoleResolution::failures`]。
#[derive(Debug, Clone, Copy)]
pub struct RoleResolver<'a> {
    roles: &'a [RoleDefinition],
}

impl<'a> RoleResolver<'a> {
    /// 基于角色定义创建解析器
    pub fn new(roles: &'a [RoleDefinition]) -> Self {
        Self { roles }
    }

    /// 解析当前主体持有的角色
    pub fn resolve(&self, principal: Option<&Principal>, request: &Request) -> RoleResolution {
        let mut resolution = RoleResolution::default();

        for role in self.roles {
            match role.is_member(principal, request) {
                Ok(true) => {
                    resolution.roles.insert(role.name());
                }
                Ok(false) => {}
                Err(error) => {
                    tracing::warn!(
                        role = role.name(),
                        error = %error,
                        "role membership predicate failed, treating role as not held"
                    );
                    resolution
                        .failures
                        .push(PredicateFailure::new(role.name(), error));
                }
            }
        }

        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin_roles() -> Vec<RoleDefinition> {
        vec![
            RoleDefinition::anon(),
            RoleDefinition::user(),
            RoleDefinition::staff(),
            RoleDefinition::admin(),
        ]
    }

    #[test]
    fn test_anonymous_resolution() {
        let roles = builtin_roles();
        let resolver = RoleResolver::new(&roles);
        let request = Request::get("/");

        let resolution = resolver.resolve(None, &request);
        assert_eq!(resolution.roles, RoleSet::from_iter([ANON]));
        assert!(resolution.failures.is_empty());
    }

    #[test]
    fn test_principal_holds_multiple_roles() {
        let roles = builtin_roles();
        let resolver = RoleResolver::new(&roles);
        let request = Request::get("/");
        let admin = Principal::new("root").staff().superuser();

        let resolution = resolver.resolve(Some(&admin), &request);
        // 不会在第一次命中时停止
        assert_eq!(resolution.roles, RoleSet::from_iter([USER, STAFF, ADMIN]));
    }

    #[test]
    fn test_failing_predicate_is_not_held() {
        let roles = vec![
            RoleDefinition::user(),
            RoleDefinition::new("broken", |_, _| Err(PredicateError::new("lookup failed"))),
            RoleDefinition::group("editor", "editors"),
        ];
        let resolver = RoleResolver::new(&roles);
        let request = Request::get("/");
        let principal = Principal::new("u1").with_group("editors");

        let resolution = resolver.resolve(Some(&principal), &request);
        assert_eq!(resolution.roles, RoleSet::from_iter([USER, "editor"]));
        assert_eq!(resolution.failures.len(), 1);
        assert_eq!(resolution.failures[0].subject, "broken");
    }

    #[test]
    fn test_role_membership_may_use_request() {
        let internal = RoleDefinition::new("internal", |_, request| {
            Ok(request.header("x-forwarded-for").is_none())
        });
        let request = Request::get("/").with_header("x-forwarded-for", "10.0.0.1");
        assert_eq!(internal.is_member(None, &request), Ok(false));
    }

    #[test]
    fn test_role_set_keeps_order_and_dedupes() {
        let mut set = RoleSet::new();
        assert!(set.insert("user"));
        assert!(set.insert("admin"));
        assert!(!set.insert("user"));

        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["user", "admin"]);
        assert_eq!(set.to_string(), "{user, admin}");
    }
}
