//! 权限检查模块
//!
//! 视图声明一组 `角色 → 规则` 映射（[`RoleRules`]），[`PermissionChecker`]
//! 结合当前持有的角色做出允许或拒绝的决策。
//!
//! ## 决策逻辑
//!
//! 1. 按声明顺序遍历规则，跳过未持有的角色（其规则不会被求值）
//! 2. 任一持有角色的规则允许，立即允许
//! 3. 否则若有持有角色被显式拒绝，拒绝
//! 4. 没有任何适用规则时默认拒绝

use crate::rbac::predicate::{PredicateFailure, Rule, RuleContext, RuleOutcome};
use crate::rbac::role::RoleSet;

/// 角色规则映射
///
/// 保持声明顺序；对同一角色重复设置时后者覆盖前者
///
/// # 示例
///
/// ```rust
/// use rolegate::rbac::{RoleRules, Rule};
///
/// let rules = RoleRules::allowed(["admin", "staff"])
///     .deny("anon")
///     .rule("user", Rule::principal_matches_arg("user_id"));
///
/// assert_eq!(rules.len(), 4);
/// assert!(rules.get("admin").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoleRules {
    rules: Vec<(String, Rule)>,
}

impl RoleRules {
    /// 创建空映射
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// 允许列出的角色
    pub fn allowed<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        roles
            .into_iter()
            .fold(Self::new(), |rules, role| rules.allow(role))
    }

    /// 拒绝列出的角色
    pub fn disallowed<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        roles
            .into_iter()
            .fold(Self::new(), |rules, role| rules.deny(role))
    }

    /// 允许角色
    pub fn allow(self, role: impl Into<String>) -> Self {
        self.rule(role, Rule::allow())
    }

    /// 拒绝角色
    pub fn deny(self, role: impl Into<String>) -> Self {
        self.rule(role, Rule::deny())
    }

    /// 为角色设置规则
    pub fn rule(mut self, role: impl Into<String>, rule: impl Into<Rule>) -> Self {
        self.set(role, rule);
        self
    }

    /// 为角色设置规则（原地）
    pub fn set(&mut self, role: impl Into<String>, rule: impl Into<Rule>) {
        let role = role.into();
        let rule = rule.into();
        match self.rules.iter_mut().find(|(r, _)| *r == role) {
            Some(entry) => entry.1 = rule,
            None => self.rules.push((role, rule)),
        }
    }

    /// 合并另一组规则，同名角色以 `other` 为准
    pub fn merge(&mut self, other: &RoleRules) {
        for (role, rule) in &other.rules {
            self.set(role.clone(), rule.clone());
        }
    }

    /// 获取角色的规则
    pub fn get(&self, role: &str) -> Option<&Rule> {
        self.rules.iter().find(|(r, _)| r == role).map(|(_, rule)| rule)
    }

    /// 遍历规则
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Rule)> {
        self.rules.iter().map(|(role, rule)| (role.as_str(), rule))
    }

    /// 规则中引用的角色
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(role, _)| role.as_str())
    }

    /// 规则数量
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<S: Into<String>, R: Into<Rule>> FromIterator<(S, R)> for RoleRules {
    fn from_iter<I: IntoIterator<Item = (S, R)>>(iter: I) -> Self {
        let mut rules = RoleRules::new();
        for (role, rule) in iter {
            rules.set(role, rule);
        }
        rules
    }
}

/// 权限决策
///
/// 每次请求临时生成，`reason` 仅用于内部诊断，不会出现在响应中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionDecision {
    /// 是否允许
    pub allowed: bool,
    /// 决定结果的角色
    pub matched_role: Option<String>,
    /// 决策原因
    pub reason: String,
    /// 决策过程中求值失败的规则
    pub failures: Vec<PredicateFailure>,
}

impl PermissionDecision {
    /// 创建允许决策
    pub fn allow(role: impl Into<String>) -> Self {
        let role = role.into();
        Self {
            allowed: true,
            reason: format!("role '{}' is allowed", role),
            matched_role: Some(role),
            failures: Vec::new(),
        }
    }

    /// 创建拒绝决策
    pub fn deny(role: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            matched_role: role,
            reason: reason.into(),
            failures: Vec::new(),
        }
    }

    /// 检查是否允许
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    /// 检查是否拒绝
    pub fn is_denied(&self) -> bool {
        !self.allowed
    }

    fn with_failures(mut self, failures: Vec<PredicateFailure>) -> Self {
        self.failures = failures;
        self
    }
}

/// 权限检查器
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissionChecker;

impl PermissionChecker {
    /// 根据声明的规则与持有的角色做出决策
    pub fn check(
        declared: &RoleRules,
        held: &RoleSet,
        ctx: &RuleContext<'_>,
    ) -> PermissionDecision {
        let mut denied_by: Option<&str> = None;
        let mut failures = Vec::new();

        for (role, rule) in declared.iter() {
            if !held.contains(role) {
                continue;
            }

            match rule.evaluate(ctx) {
                RuleOutcome::Allowed => {
                    return PermissionDecision::allow(role).with_failures(failures);
                }
                RuleOutcome::Denied => {
                    denied_by.get_or_insert(role);
                }
                RuleOutcome::EvaluationFailed(error) => {
                    tracing::warn!(
                        role,
                        rule = %rule.describe(),
                        error = %error,
                        "permission rule failed, treating it as not met"
                    );
                    failures.push(PredicateFailure::new(
                        format!("{}:{}", role, rule.describe()),
                        error,
                    ));
                }
            }
        }

        let decision = match denied_by {
            Some(role) => PermissionDecision::deny(
                Some(role.to_string()),
                format!("role '{}' is explicitly denied", role),
            ),
            None if !failures.is_empty() => PermissionDecision::deny(
                None,
                format!("rule evaluation failed for held roles {}", held),
            ),
            None => PermissionDecision::deny(
                None,
                format!("no rule declared for held roles {}", held),
            ),
        };
        decision.with_failures(failures)
    }
}
