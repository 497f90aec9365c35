//! 策略注册表模块
//!
//! [`PolicyRegistry`] 保存角色定义与按选择器声明的视图权限，在启动时构建一次，
//! 之后只读。构建时校验所有规则引用的角色都已定义。

use crate::config::GuardConfig;
use crate::error::{ConfigError, Error, Result};
use crate::rbac::permission::RoleRules;
use crate::rbac::principal::Principal;
use crate::rbac::role::{RoleDefinition, RoleResolution, RoleResolver};
use crate::view::{CallableMeta, FunctionView, Request, ViewClass};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// 匹配类中所有视图方法的通配符
pub const ANY_METHOD: &str = "*";

static GLOBAL_REGISTRY: OnceLock<Arc<PolicyRegistry>> = OnceLock::new();

/// 视图选择器
///
/// - `Path("app.views.list_users")`：函数视图的完整路径
/// - `Path("app.views.UserView.get")`：类视图方法，`app.views.UserView.*` 匹配所有方法
/// - `Path("app.views.UserView")`：类路径本身同样匹配所有方法
/// - `Method { class, method }`：按类名与方法名匹配
///
/// 类选择器对具体类 MRO 中的任一类生效
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    /// 点分路径
    Path(String),
    /// 类名加方法名
    Method { class: String, method: String },
}

impl Selector {
    /// 点分路径选择器
    pub fn path(path: impl Into<String>) -> Self {
        Selector::Path(path.into())
    }

    /// 类名加方法名选择器
    pub fn method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Selector::Method {
            class: class.into(),
            method: method.into(),
        }
    }

    /// 是否选中函数视图
    pub fn matches_function(&self, meta: &CallableMeta) -> bool {
        match self {
            Selector::Path(path) => *path == meta.path(),
            Selector::Method { .. } => false,
        }
    }

    /// 是否选中某个类（不考虑方法名）；返回选择器指定的方法名
    pub fn selected_method(&self, class: &ViewClass) -> Option<&str> {
        match self {
            Selector::Path(path) => {
                // 路径即类路径时选中全部方法（含 `api_view` 生成的类）
                if class.mro().iter().any(|c| c.path() == *path) {
                    return Some(ANY_METHOD);
                }
                let (class_path, method) = path.rsplit_once('.')?;
                class
                    .mro()
                    .iter()
                    .any(|c| c.path() == class_path)
                    .then_some(method)
            }
            Selector::Method { class: name, method } => class
                .mro()
                .iter()
                .any(|c| c.name() == name)
                .then_some(method.as_str()),
        }
    }

    /// 是否选中类视图方法
    pub fn matches_method(&self, class: &ViewClass, method: &str) -> bool {
        self.selected_method(class)
            .is_some_and(|m| m == method || m == ANY_METHOD)
    }
}

impl From<&str> for Selector {
    fn from(path: &str) -> Self {
        Selector::Path(path.to_string())
    }
}

impl From<String> for Selector {
    fn from(path: String) -> Self {
        Selector::Path(path)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Path(path) => write!(f, "{}", path),
            Selector::Method { class, method } => write!(f, "{}.{}", class, method),
        }
    }
}

/// 静态权限声明
///
/// 用于从 JSON 等外部配置加载权限，只支持静态布尔规则
///
/// ```json
/// [{"view": "app.views.list_users", "permissions": {"admin": true, "anon": false}}]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSpec {
    /// 视图选择器
    pub view: Selector,
    /// 角色到布尔规则的映射
    pub permissions: BTreeMap<String, bool>,
}

// ============================================================================
// PolicyRegistry
// ============================================================================

/// 策略注册表
///
/// # 示例
///
/// ```rust
/// use rolegate::rbac::{PolicyRegistry, RoleRules};
///
/// let registry = PolicyRegistry::builder()
///     .default_roles()
///     .permission("app.views.list_users", RoleRules::allowed(["admin"]))
///     .build()
///     .unwrap();
///
/// assert!(registry.has_role("admin"));
/// assert_eq!(registry.permissions().len(), 1);
///
/// // 引用未定义角色是配置错误
/// let invalid = PolicyRegistry::builder()
///     .default_roles()
///     .permission("app.views.list_users", RoleRules::allowed(["owner"]))
///     .build();
/// assert!(invalid.is_err());
/// ```
pub struct PolicyRegistry {
    roles: Vec<RoleDefinition>,
    permissions: Vec<(Selector, RoleRules)>,
    config: GuardConfig,
}

impl PolicyRegistry {
    /// 创建注册表构建器
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::new()
    }

    /// 角色定义（注册顺序）
    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    /// 角色是否已定义
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name() == name)
    }

    /// 按选择器声明的权限（声明顺序）
    pub fn permissions(&self) -> &[(Selector, RoleRules)] {
        &self.permissions
    }

    /// 守卫配置
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// 角色解析器
    pub fn resolver(&self) -> RoleResolver<'_> {
        RoleResolver::new(&self.roles)
    }

    /// 解析当前主体持有的角色
    pub fn resolve_roles(&self, principal: Option<&Principal>, request: &Request) -> RoleResolution {
        self.resolver().resolve(principal, request)
    }

    /// 校验规则引用的角色都已定义
    pub fn validate_rules(&self, rules: &RoleRules, origin: &str) -> Result<()> {
        match rules.roles().find(|role| !self.has_role(role)) {
            Some(role) => Err(Error::unknown_role(role, origin)),
            None => Ok(()),
        }
    }

    /// 函数视图的声明权限
    ///
    /// 装饰器声明在前，注册表选择器按声明顺序覆盖同名角色
    pub fn declared_for_function(&self, view: &FunctionView) -> Option<RoleRules> {
        let mut declared = view.declared_permissions().cloned();
        for (selector, rules) in &self.permissions {
            if selector.matches_function(view.meta()) {
                declared.get_or_insert_with(RoleRules::new).merge(rules);
            }
        }
        declared
    }

    /// 类视图方法的声明权限
    ///
    /// 合并顺序（后者覆盖同名角色）：方法装饰器、类属性 `view_permissions`、注册表选择器
    pub fn declared_for_method(&self, class: &ViewClass, method: &str) -> Option<RoleRules> {
        let mut declared: Option<RoleRules> = None;

        if let Some(rules) = class
            .resolve_method(method)
            .and_then(|(_, m)| m.declared_permissions())
        {
            declared.get_or_insert_with(RoleRules::new).merge(rules);
        }

        if let Some(rules) = class.view_permissions().and_then(|p| p.get(method)) {
            declared.get_or_insert_with(RoleRules::new).merge(rules);
        }

        for (selector, rules) in &self.permissions {
            if selector.matches_method(class, method) {
                declared.get_or_insert_with(RoleRules::new).merge(rules);
            }
        }

        declared
    }

    /// 类上声明了权限的具体方法名（不含通配符）
    pub fn declared_methods(&self, class: &ViewClass) -> BTreeSet<String> {
        let mut methods: BTreeSet<String> = class
            .view_permissions()
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default();

        methods.extend(
            self.permissions
                .iter()
                .filter_map(|(selector, _)| selector.selected_method(class))
                .filter(|m| *m != ANY_METHOD)
                .map(str::to_string),
        );
        methods
    }

    /// 安装为进程级全局注册表，只能安装一次
    pub fn install_global(registry: Arc<PolicyRegistry>) -> Result<Arc<PolicyRegistry>> {
        GLOBAL_REGISTRY
            .set(Arc::clone(&registry))
            .map_err(|_| Error::Config(ConfigError::AlreadyInitialized))?;
        tracing::info!(
            roles = registry.roles.len(),
            permissions = registry.permissions.len(),
            "global policy registry installed"
        );
        Ok(registry)
    }

    /// 获取全局注册表
    pub fn global() -> Option<Arc<PolicyRegistry>> {
        GLOBAL_REGISTRY.get().cloned()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("roles", &self.roles)
            .field("permissions", &self.permissions)
            .field("config", &self.config)
            .finish()
    }
}

// ============================================================================
// PolicyRegistryBuilder
// ============================================================================

/// 策略注册表构建器
#[derive(Debug, Default)]
pub struct PolicyRegistryBuilder {
    roles: Vec<RoleDefinition>,
    permissions: Vec<(Selector, RoleRules)>,
    config: GuardConfig,
}

impl PolicyRegistryBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加角色
    pub fn role(mut self, role: RoleDefinition) -> Self {
        self.roles.push(role);
        self
    }

    /// 添加多个角色
    pub fn roles(mut self, roles: impl IntoIterator<Item = RoleDefinition>) -> Self {
        self.roles.extend(roles);
        self
    }

    /// 添加内置角色：`anon`、`user`、`staff`、`admin`
    pub fn default_roles(self) -> Self {
        self.roles([
            RoleDefinition::anon(),
            RoleDefinition::user(),
            RoleDefinition::staff(),
            RoleDefinition::admin(),
        ])
    }

    /// 声明视图权限
    pub fn permission(mut self, selector: impl Into<Selector>, rules: RoleRules) -> Self {
        self.permissions.push((selector.into(), rules));
        self
    }

    /// 从 JSON 加载静态权限声明
    pub fn permissions_from_json(mut self, json: &str) -> Result<Self> {
        let specs: Vec<PermissionSpec> = serde_json::from_str(json)?;
        for entry in specs {
            let rules = entry.permissions.into_iter().collect();
            self.permissions.push((entry.view, rules));
        }
        Ok(self)
    }

    /// 设置守卫配置
    pub fn config(mut self, config: GuardConfig) -> Self {
        self.config = config;
        self
    }

    /// 构建注册表
    pub fn build(self) -> Result<PolicyRegistry> {
        let mut seen = BTreeSet::new();
        for role in &self.roles {
            if !seen.insert(role.name()) {
                return Err(ConfigError::DuplicateRole(role.name().to_string()).into());
            }
        }

        for (selector, rules) in &self.permissions {
            if let Some(role) = rules.roles().find(|role| !seen.contains(role)) {
                return Err(Error::unknown_role(role, selector.to_string()));
            }
        }

        if self.config.view_methods.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "view_methods".to_string(),
                message: "at least one view method name is required".to_string(),
            }
            .into());
        }

        Ok(PolicyRegistry {
            roles: self.roles,
            permissions: self.permissions,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::Rule;
    use crate::view::Response;

    fn index_view() -> FunctionView {
        FunctionView::new("app.views", "index", |_| Ok(Response::ok("index")))
    }

    #[test]
    fn test_duplicate_role_is_config_error() {
        let result = PolicyRegistry::builder()
            .default_roles()
            .role(RoleDefinition::anon())
            .build();

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::DuplicateRole(ref role))) if role == "anon"
        ));
    }

    #[test]
    fn test_unknown_role_is_config_error() {
        let result = PolicyRegistry::builder()
            .default_roles()
            .permission("app.views.index", RoleRules::allowed(["owner"]))
            .build();

        match result {
            Err(Error::Config(ConfigError::UnknownRole {
                role,
                referenced_by,
            })) => {
                assert_eq!(role, "owner");
                assert_eq!(referenced_by, "app.views.index");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_function_selector() {
        let view = index_view();
        assert!(Selector::from("app.views.index").matches_function(view.meta()));
        assert!(!Selector::from("app.views.other").matches_function(view.meta()));
        assert!(!Selector::method("index", "get").matches_function(view.meta()));
    }

    #[test]
    fn test_class_path_selects_every_method() {
        let class = ViewClass::builder("app.views", "reports")
            .method("get", |_| Ok(Response::ok("")))
            .method("post", |_| Ok(Response::ok("")))
            .build()
            .unwrap();

        let selector = Selector::from("app.views.reports");
        assert_eq!(selector.selected_method(&class), Some(ANY_METHOD));
        assert!(selector.matches_method(&class, "get"));
        assert!(selector.matches_method(&class, "post"));

        let single = Selector::from("app.views.reports.get");
        assert!(single.matches_method(&class, "get"));
        assert!(!single.matches_method(&class, "post"));

        assert!(Selector::from("app.views.other").selected_method(&class).is_none());
    }

    #[test]
    fn test_declared_for_function_merges_sources() {
        let registry = PolicyRegistry::builder()
            .default_roles()
            .permission("app.views.index", RoleRules::disallowed(["user"]))
            .build()
            .unwrap();

        // 没有任何声明
        let undeclared = FunctionView::new("app.views", "other", |_| Ok(Response::ok("")));
        assert!(registry.declared_for_function(&undeclared).is_none());

        // 装饰器声明 + 注册表覆盖
        let view = index_view().allowed(["admin", "user"]);
        let declared = registry.declared_for_function(&view).unwrap();
        assert!(matches!(declared.get("admin"), Some(Rule::Static(true))));
        assert!(matches!(declared.get("user"), Some(Rule::Static(false))));
    }

    #[test]
    fn test_permissions_from_json() {
        let registry = PolicyRegistry::builder()
            .default_roles()
            .permissions_from_json(
                r#"[
                    {"view": "app.views.index", "permissions": {"admin": true, "anon": false}},
                    {"view": {"class": "UserView", "method": "get"}, "permissions": {"user": true}}
                ]"#,
            )
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(registry.permissions().len(), 2);
        assert_eq!(registry.permissions()[1].0, Selector::method("UserView", "get"));
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let result = PolicyRegistry::builder().permissions_from_json("{not json");
        assert!(matches!(result, Err(Error::Config(ConfigError::InvalidValue { .. }))));
    }

    #[test]
    fn test_empty_view_methods_rejected() {
        let result = PolicyRegistry::builder()
            .default_roles()
            .config(GuardConfig::new().view_methods(Vec::<String>::new()))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rules() {
        let registry = PolicyRegistry::builder().default_roles().build().unwrap();
        assert!(registry
            .validate_rules(&RoleRules::allowed(["admin"]), "x")
            .is_ok());
        assert!(registry
            .validate_rules(&RoleRules::allowed(["auditor"]), "x")
            .is_err());
    }
}
